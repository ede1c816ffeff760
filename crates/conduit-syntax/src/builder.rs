//! Node construction.
//!
//! [`AstBuilder`] owns the string interner and the node-id source and
//! provides one constructor per node kind. The parser builds the tree
//! through it; tests use it to assemble programs directly.
//!
//! # Examples
//!
//! ```
//! use conduit_syntax::builder::AstBuilder;
//!
//! let b = AstBuilder::new();
//! // bit<8> x = 3;
//! let decl = b.variable("x", b.ty_bits(8, false), Some(b.constant(3)));
//! assert!(decl.name().is_some());
//! ```

use crate::ast::decl::{ActionListElement, KeyElement, StructField};
use crate::ast::expr::{BinaryOp, SelectCase, UnaryOp};
use crate::ast::stmt::{SwitchCase, SwitchLabel};
use crate::ast::{
    AstType, AstTypeKind, Decl, DeclKind, Direction, Expr, ExprKind, NodeId, NodeIdGen, Path,
    Program, Stmt, StmtKind,
};
use crate::span::Span;
use conduit_mem::{StringInterner, Symbol};
use std::cell::RefCell;
use std::rc::Rc;

/// Builder for AST nodes.
///
/// All nodes built through one builder share its id space; ids are unique
/// within a compilation.
pub struct AstBuilder {
    interner: Rc<RefCell<StringInterner>>,
    ids: Rc<NodeIdGen>,
}

impl AstBuilder {
    /// Creates a builder with a fresh interner and id source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interner: Rc::new(RefCell::new(StringInterner::new())),
            ids: Rc::new(NodeIdGen::new()),
        }
    }

    /// The shared node-id source, for passes that synthesize nodes.
    #[must_use]
    pub fn ids(&self) -> Rc<NodeIdGen> {
        Rc::clone(&self.ids)
    }

    /// The shared interner, for passes that resolve names in diagnostics.
    #[must_use]
    pub fn interner(&self) -> Rc<RefCell<StringInterner>> {
        Rc::clone(&self.interner)
    }

    /// Interns a name.
    pub fn sym(&self, s: &str) -> Symbol {
        self.interner.borrow_mut().intern(s)
    }

    /// Resolves a symbol back to its string.
    pub fn name_of(&self, sym: Symbol) -> String {
        self.interner
            .borrow()
            .resolve(sym)
            .unwrap_or("<unknown>")
            .to_string()
    }

    /// Runs `f` with the interner borrowed immutably.
    pub fn with_interner<R>(&self, f: impl FnOnce(&StringInterner) -> R) -> R {
        f(&self.interner.borrow())
    }

    fn next(&self) -> NodeId {
        self.ids.next()
    }

    // ----- paths -----

    /// A path node referring to `name`.
    pub fn path(&self, name: &str) -> Rc<Path> {
        Rc::new(Path {
            id: self.next(),
            span: Span::dummy(),
            name: self.sym(name),
        })
    }

    // ----- surface types -----

    fn ty(&self, kind: AstTypeKind) -> Rc<AstType> {
        Rc::new(AstType {
            id: self.next(),
            span: Span::dummy(),
            kind,
        })
    }

    /// `bit<width>` / `int<width>`.
    pub fn ty_bits(&self, width: u32, signed: bool) -> Rc<AstType> {
        self.ty(AstTypeKind::Bits { width, signed })
    }

    /// `varbit<max_width>`.
    pub fn ty_varbits(&self, max_width: u32) -> Rc<AstType> {
        self.ty(AstTypeKind::Varbits { max_width })
    }

    /// `bool`.
    pub fn ty_bool(&self) -> Rc<AstType> {
        self.ty(AstTypeKind::Bool)
    }

    /// `string`.
    pub fn ty_string(&self) -> Rc<AstType> {
        self.ty(AstTypeKind::String)
    }

    /// `void`.
    pub fn ty_void(&self) -> Rc<AstType> {
        self.ty(AstTypeKind::Void)
    }

    /// `tuple<components>`.
    pub fn ty_tuple(&self, components: Vec<Rc<AstType>>) -> Rc<AstType> {
        self.ty(AstTypeKind::Tuple(components))
    }

    /// Header stack `element[size]`.
    pub fn ty_stack(&self, element: Rc<AstType>, size: Rc<Expr>) -> Rc<AstType> {
        self.ty(AstTypeKind::Stack { element, size })
    }

    /// A named type.
    pub fn ty_name(&self, name: &str) -> Rc<AstType> {
        let path = self.path(name);
        self.ty(AstTypeKind::Name(path))
    }

    /// A specialized named type `name<args>`.
    pub fn ty_specialized(&self, name: &str, args: Vec<Rc<AstType>>) -> Rc<AstType> {
        let base = self.path(name);
        self.ty(AstTypeKind::Specialized { base, args })
    }

    /// The don't-care type `_`.
    pub fn ty_dontcare(&self) -> Rc<AstType> {
        self.ty(AstTypeKind::Dontcare)
    }

    // ----- expressions -----

    fn expr(&self, kind: ExprKind) -> Rc<Expr> {
        Rc::new(Expr {
            id: self.next(),
            span: Span::dummy(),
            kind,
        })
    }

    /// A width-free integer literal.
    pub fn constant(&self, value: i128) -> Rc<Expr> {
        self.expr(ExprKind::Constant { value, width: None })
    }

    /// A width-annotated integer literal (`8w3`).
    pub fn constant_width(&self, value: i128, width: u32, signed: bool) -> Rc<Expr> {
        self.expr(ExprKind::Constant {
            value,
            width: Some((width, signed)),
        })
    }

    /// A boolean literal.
    pub fn bool_lit(&self, value: bool) -> Rc<Expr> {
        self.expr(ExprKind::Bool(value))
    }

    /// A string literal.
    pub fn string_lit(&self, value: &str) -> Rc<Expr> {
        let sym = self.sym(value);
        self.expr(ExprKind::StringLit(sym))
    }

    /// A path expression.
    pub fn path_expr(&self, name: &str) -> Rc<Expr> {
        let path = self.path(name);
        self.expr(ExprKind::PathRef(path))
    }

    /// A path expression over an existing path node.
    pub fn path_expr_of(&self, path: Rc<Path>) -> Rc<Expr> {
        self.expr(ExprKind::PathRef(path))
    }

    /// Member access `base.member`.
    pub fn member(&self, base: Rc<Expr>, member: &str) -> Rc<Expr> {
        let member = self.sym(member);
        self.expr(ExprKind::Member { base, member })
    }

    /// Indexing `base[index]`.
    pub fn index(&self, base: Rc<Expr>, index: Rc<Expr>) -> Rc<Expr> {
        self.expr(ExprKind::Index { base, index })
    }

    /// Slice `base[msb:lsb]`.
    pub fn slice(&self, base: Rc<Expr>, msb: Rc<Expr>, lsb: Rc<Expr>) -> Rc<Expr> {
        self.expr(ExprKind::Slice { base, msb, lsb })
    }

    /// Cast `(target) expr`.
    pub fn cast(&self, target: Rc<AstType>, expr: Rc<Expr>) -> Rc<Expr> {
        self.expr(ExprKind::Cast { target, expr })
    }

    /// A unary operation.
    pub fn unary(&self, op: UnaryOp, expr: Rc<Expr>) -> Rc<Expr> {
        self.expr(ExprKind::Unary { op, expr })
    }

    /// A binary operation.
    pub fn binary(&self, op: BinaryOp, left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        self.expr(ExprKind::Binary { op, left, right })
    }

    /// Conditional `cond ? a : b`.
    pub fn mux(&self, cond: Rc<Expr>, then_expr: Rc<Expr>, else_expr: Rc<Expr>) -> Rc<Expr> {
        self.expr(ExprKind::Mux {
            cond,
            then_expr,
            else_expr,
        })
    }

    /// List `{ components }`.
    pub fn list(&self, components: Vec<Rc<Expr>>) -> Rc<Expr> {
        self.expr(ExprKind::List { components })
    }

    /// Call `method(args)`.
    pub fn call(&self, method: Rc<Expr>, args: Vec<Rc<Expr>>) -> Rc<Expr> {
        self.call_generic(method, Vec::new(), args)
    }

    /// Call `method<type_args>(args)`.
    pub fn call_generic(
        &self,
        method: Rc<Expr>,
        type_args: Vec<Rc<AstType>>,
        args: Vec<Rc<Expr>>,
    ) -> Rc<Expr> {
        self.expr(ExprKind::Call {
            method,
            type_args,
            args,
        })
    }

    /// Constructor call `ty(args)`.
    pub fn constructor_call(&self, ty: Rc<AstType>, args: Vec<Rc<Expr>>) -> Rc<Expr> {
        self.expr(ExprKind::ConstructorCall { ty, args })
    }

    /// A select expression over `select` components.
    pub fn select(&self, components: Vec<Rc<Expr>>, cases: Vec<SelectCase>) -> Rc<Expr> {
        let select = self.list(components);
        self.expr(ExprKind::Select { select, cases })
    }

    /// One select case.
    pub fn select_case(&self, keyset: Rc<Expr>, state: &str) -> SelectCase {
        SelectCase {
            id: self.next(),
            span: Span::dummy(),
            keyset,
            state: self.path_expr(state),
        }
    }

    /// The `default` / `_` expression.
    pub fn default_expr(&self) -> Rc<Expr> {
        self.expr(ExprKind::Default)
    }

    /// `this`.
    pub fn this_expr(&self) -> Rc<Expr> {
        self.expr(ExprKind::This)
    }

    // ----- statements -----

    fn stmt(&self, kind: StmtKind) -> Rc<Stmt> {
        Rc::new(Stmt {
            id: self.next(),
            span: Span::dummy(),
            kind,
        })
    }

    /// A block statement.
    pub fn block(&self, stmts: Vec<Rc<Stmt>>) -> Rc<Stmt> {
        self.stmt(StmtKind::Block(stmts))
    }

    /// An if statement.
    pub fn if_stmt(
        &self,
        condition: Rc<Expr>,
        then_branch: Rc<Stmt>,
        else_branch: Option<Rc<Stmt>>,
    ) -> Rc<Stmt> {
        self.stmt(StmtKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// A switch statement.
    pub fn switch(&self, expression: Rc<Expr>, cases: Vec<SwitchCase>) -> Rc<Stmt> {
        self.stmt(StmtKind::Switch { expression, cases })
    }

    /// One switch case with an action label.
    pub fn switch_case(&self, action: &str, body: Option<Rc<Stmt>>) -> SwitchCase {
        SwitchCase {
            id: self.next(),
            span: Span::dummy(),
            label: SwitchLabel::Action(self.path(action)),
            body,
        }
    }

    /// The default switch case.
    pub fn switch_default(&self, body: Option<Rc<Stmt>>) -> SwitchCase {
        SwitchCase {
            id: self.next(),
            span: Span::dummy(),
            label: SwitchLabel::Default,
            body,
        }
    }

    /// A return statement.
    pub fn return_stmt(&self, value: Option<Rc<Expr>>) -> Rc<Stmt> {
        self.stmt(StmtKind::Return(value))
    }

    /// An assignment statement.
    pub fn assign(&self, target: Rc<Expr>, value: Rc<Expr>) -> Rc<Stmt> {
        self.stmt(StmtKind::Assign { target, value })
    }

    /// A call statement.
    pub fn call_stmt(&self, call: Rc<Expr>) -> Rc<Stmt> {
        self.stmt(StmtKind::Call(call))
    }

    /// A local declaration statement.
    pub fn decl_stmt(&self, decl: Rc<Decl>) -> Rc<Stmt> {
        self.stmt(StmtKind::Decl(decl))
    }

    /// The empty statement.
    pub fn empty_stmt(&self) -> Rc<Stmt> {
        self.stmt(StmtKind::Empty)
    }

    // ----- declarations -----

    fn decl(&self, kind: DeclKind) -> Rc<Decl> {
        Rc::new(Decl {
            id: self.next(),
            span: Span::dummy(),
            kind,
        })
    }

    /// `const ty name = initializer;`
    pub fn constant_decl(&self, name: &str, ty: Rc<AstType>, initializer: Rc<Expr>) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Constant {
            name,
            ty,
            initializer,
        })
    }

    /// `ty name;` / `ty name = initializer;`
    pub fn variable(&self, name: &str, ty: Rc<AstType>, initializer: Option<Rc<Expr>>) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Variable {
            name,
            ty,
            initializer,
        })
    }

    /// `ty(args) name;` with an optional initializer block.
    pub fn instance(
        &self,
        name: &str,
        ty: Rc<AstType>,
        args: Vec<Rc<Expr>>,
        initializer: Option<Vec<Rc<Decl>>>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Instance {
            name,
            ty,
            args,
            initializer,
        })
    }

    /// A parameter.
    pub fn param(&self, name: &str, direction: Direction, ty: Rc<AstType>) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Param {
            name,
            direction,
            ty,
            default: None,
        })
    }

    /// A type parameter.
    pub fn type_param(&self, name: &str) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::TypeParam { name })
    }

    /// A struct field.
    pub fn field(&self, name: &str, ty: Rc<AstType>) -> StructField {
        StructField {
            id: self.next(),
            span: Span::dummy(),
            name: self.sym(name),
            ty,
        }
    }

    /// `struct name { fields }`
    pub fn struct_decl(&self, name: &str, fields: Vec<StructField>) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Struct { name, fields })
    }

    /// `header name { fields }`
    pub fn header(&self, name: &str, fields: Vec<StructField>) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Header { name, fields })
    }

    /// `header_union name { fields }`
    pub fn union(&self, name: &str, fields: Vec<StructField>) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Union { name, fields })
    }

    /// A member of an enum-like declaration.
    pub fn member_decl(&self, name: &str) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Member { name })
    }

    /// `enum name { members }`
    pub fn enum_decl(&self, name: &str, members: Vec<Rc<Decl>>) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Enum { name, members })
    }

    /// `error { members }`
    pub fn errors(&self, members: Vec<Rc<Decl>>) -> Rc<Decl> {
        self.decl(DeclKind::Errors { members })
    }

    /// `match_kind { members }`
    pub fn match_kinds(&self, members: Vec<Rc<Decl>>) -> Rc<Decl> {
        self.decl(DeclKind::MatchKinds { members })
    }

    /// `typedef ty name;`
    pub fn typedef(&self, name: &str, ty: Rc<AstType>) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Typedef { name, ty })
    }

    /// An extern method (or top-level extern function).
    pub fn method(
        &self,
        name: &str,
        type_params: Vec<Rc<Decl>>,
        return_type: Option<Rc<AstType>>,
        params: Vec<Rc<Decl>>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Method {
            name,
            type_params,
            return_type,
            params,
            is_abstract: false,
        })
    }

    /// An abstract extern method.
    pub fn abstract_method(
        &self,
        name: &str,
        return_type: Option<Rc<AstType>>,
        params: Vec<Rc<Decl>>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Method {
            name,
            type_params: Vec::new(),
            return_type,
            params,
            is_abstract: true,
        })
    }

    /// `extern name<type_params> { methods }`
    pub fn extern_decl(
        &self,
        name: &str,
        type_params: Vec<Rc<Decl>>,
        methods: Vec<Rc<Decl>>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Extern {
            name,
            type_params,
            methods,
        })
    }

    /// `parser name<type_params>(apply_params);`
    pub fn parser_type(
        &self,
        name: &str,
        type_params: Vec<Rc<Decl>>,
        apply_params: Vec<Rc<Decl>>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::ParserType {
            name,
            type_params,
            apply_params,
        })
    }

    /// `control name<type_params>(apply_params);`
    pub fn control_type(
        &self,
        name: &str,
        type_params: Vec<Rc<Decl>>,
        apply_params: Vec<Rc<Decl>>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::ControlType {
            name,
            type_params,
            apply_params,
        })
    }

    /// `package name<type_params>(ctor_params);`
    pub fn package(
        &self,
        name: &str,
        type_params: Vec<Rc<Decl>>,
        ctor_params: Vec<Rc<Decl>>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Package {
            name,
            type_params,
            ctor_params,
        })
    }

    /// A parser implementation.
    pub fn parser(
        &self,
        name: &str,
        apply_params: Vec<Rc<Decl>>,
        ctor_params: Vec<Rc<Decl>>,
        locals: Vec<Rc<Decl>>,
        states: Vec<Rc<Decl>>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Parser {
            name,
            type_params: Vec::new(),
            apply_params,
            ctor_params,
            locals,
            states,
        })
    }

    /// A control implementation.
    pub fn control(
        &self,
        name: &str,
        apply_params: Vec<Rc<Decl>>,
        ctor_params: Vec<Rc<Decl>>,
        locals: Vec<Rc<Decl>>,
        body: Rc<Stmt>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Control {
            name,
            type_params: Vec::new(),
            apply_params,
            ctor_params,
            locals,
            body,
        })
    }

    /// A parser state.
    pub fn state(&self, name: &str, body: Vec<Rc<Stmt>>, transition: Option<Rc<Expr>>) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::State {
            name,
            body,
            transition,
        })
    }

    /// A function.
    pub fn function(
        &self,
        name: &str,
        type_params: Vec<Rc<Decl>>,
        return_type: Option<Rc<AstType>>,
        params: Vec<Rc<Decl>>,
        body: Rc<Stmt>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Function {
            name,
            type_params,
            return_type,
            params,
            body,
        })
    }

    /// An action.
    pub fn action(&self, name: &str, params: Vec<Rc<Decl>>, body: Rc<Stmt>) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Action { name, params, body })
    }

    /// A table key element.
    pub fn key(&self, expr: Rc<Expr>, match_kind: &str) -> KeyElement {
        KeyElement {
            id: self.next(),
            span: Span::dummy(),
            expr,
            match_kind: self.path_expr(match_kind),
        }
    }

    /// One entry of a table's actions list.
    pub fn action_ref(&self, expr: Rc<Expr>) -> ActionListElement {
        ActionListElement {
            id: self.next(),
            span: Span::dummy(),
            expr,
        }
    }

    /// A table.
    pub fn table(
        &self,
        name: &str,
        keys: Vec<KeyElement>,
        actions: Vec<ActionListElement>,
        default_action: Option<Rc<Expr>>,
    ) -> Rc<Decl> {
        let name = self.sym(name);
        self.decl(DeclKind::Table {
            name,
            keys,
            actions,
            default_action,
        })
    }

    /// A program from top-level declarations.
    pub fn program(&self, decls: Vec<Rc<Decl>>) -> Program {
        Program::new(decls)
    }
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct() {
        let b = AstBuilder::new();
        let a = b.constant(1);
        let c = b.constant(1);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_symbols_are_shared() {
        let b = AstBuilder::new();
        let x1 = b.sym("x");
        let x2 = b.sym("x");
        assert_eq!(x1, x2);
        assert_eq!(b.name_of(x1), "x");
    }

    #[test]
    fn test_variable_shape() {
        let b = AstBuilder::new();
        let v = b.variable("x", b.ty_bits(8, false), Some(b.constant(3)));
        match &v.kind {
            DeclKind::Variable { initializer, .. } => assert!(initializer.is_some()),
            _ => panic!("expected variable"),
        }
    }
}
