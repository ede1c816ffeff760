//! The reference map: path → declaration.
//!
//! Name resolution is a separate pass (outside this crate's scope); its
//! product is a [`ReferenceMap`] binding every path node in the tree to
//! the declaration it names. The type checker only reads the map.
//!
//! [`ReferenceMap::validate_map`] checks coverage: every path node
//! reachable from a program must have a binding before inference starts.

use crate::ast::stmt::SwitchLabel;
use crate::ast::{AstType, AstTypeKind, Decl, DeclKind, Expr, ExprKind, NodeId, Program, Stmt, StmtKind};
use crate::span::Span;
use conduit_mem::{StringInterner, Symbol};
use fxhash::FxHashMap;
use std::cell::Cell;
use std::rc::Rc;

/// Map from path nodes to the declarations they refer to.
#[derive(Debug, Default)]
pub struct ReferenceMap {
    decls: FxHashMap<NodeId, Rc<Decl>>,
    next_name: Cell<u32>,
}

impl ReferenceMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decls: FxHashMap::default(),
            next_name: Cell::new(0),
        }
    }

    /// Binds a path node to a declaration. Re-binding to the same
    /// declaration is idempotent.
    pub fn declare(&mut self, path: NodeId, decl: Rc<Decl>) {
        self.decls.insert(path, decl);
    }

    /// Looks up the declaration a path refers to.
    #[must_use]
    pub fn get_declaration(&self, path: NodeId) -> Option<&Rc<Decl>> {
        self.decls.get(&path)
    }

    /// Mints a fresh name from a hint, unique among names produced by this
    /// map. Used by passes that synthesize declarations.
    pub fn new_name(&self, hint: &str, interner: &mut StringInterner) -> Symbol {
        let n = self.next_name.get();
        self.next_name.set(n + 1);
        interner.intern(&format!("{hint}_{n}"))
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Returns `true` if the map has no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Checks that every path node reachable from `program` has a binding.
    ///
    /// Returns the spans of unbound paths on failure. The pipeline treats
    /// a failure as an internal invariant violation: resolution must run
    /// (and succeed) before inference.
    pub fn validate_map(&self, program: &Program) -> Result<(), Vec<Span>> {
        let mut missing = Vec::new();
        visit_paths(program, &mut |id, span| {
            if !self.decls.contains_key(&id) {
                missing.push(span);
            }
        });
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

/// Calls `f` with the node id and span of every path node in the program.
pub fn visit_paths(program: &Program, f: &mut dyn FnMut(NodeId, Span)) {
    for decl in &program.decls {
        walk_decl(decl, f);
    }
}

fn walk_decl(decl: &Decl, f: &mut dyn FnMut(NodeId, Span)) {
    match &decl.kind {
        DeclKind::Constant { ty, initializer, .. } => {
            walk_type(ty, f);
            walk_expr(initializer, f);
        }
        DeclKind::Variable { ty, initializer, .. } => {
            walk_type(ty, f);
            if let Some(init) = initializer {
                walk_expr(init, f);
            }
        }
        DeclKind::Instance {
            ty,
            args,
            initializer,
            ..
        } => {
            walk_type(ty, f);
            for arg in args {
                walk_expr(arg, f);
            }
            if let Some(decls) = initializer {
                for d in decls {
                    walk_decl(d, f);
                }
            }
        }
        DeclKind::Param { ty, default, .. } => {
            walk_type(ty, f);
            if let Some(d) = default {
                walk_expr(d, f);
            }
        }
        DeclKind::TypeParam { .. } | DeclKind::Member { .. } => {}
        DeclKind::Struct { fields, .. }
        | DeclKind::Header { fields, .. }
        | DeclKind::Union { fields, .. } => {
            for field in fields {
                walk_type(&field.ty, f);
            }
        }
        DeclKind::Enum { members, .. }
        | DeclKind::Errors { members }
        | DeclKind::MatchKinds { members } => {
            for m in members {
                walk_decl(m, f);
            }
        }
        DeclKind::Typedef { ty, .. } => walk_type(ty, f),
        DeclKind::Extern {
            type_params,
            methods,
            ..
        } => {
            for tp in type_params {
                walk_decl(tp, f);
            }
            for m in methods {
                walk_decl(m, f);
            }
        }
        DeclKind::Method {
            type_params,
            return_type,
            params,
            ..
        } => {
            for tp in type_params {
                walk_decl(tp, f);
            }
            if let Some(rt) = return_type {
                walk_type(rt, f);
            }
            for p in params {
                walk_decl(p, f);
            }
        }
        DeclKind::ParserType {
            type_params,
            apply_params,
            ..
        }
        | DeclKind::ControlType {
            type_params,
            apply_params,
            ..
        } => {
            for tp in type_params {
                walk_decl(tp, f);
            }
            for p in apply_params {
                walk_decl(p, f);
            }
        }
        DeclKind::Package {
            type_params,
            ctor_params,
            ..
        } => {
            for tp in type_params {
                walk_decl(tp, f);
            }
            for p in ctor_params {
                walk_decl(p, f);
            }
        }
        DeclKind::Parser {
            type_params,
            apply_params,
            ctor_params,
            locals,
            states,
            ..
        } => {
            for d in type_params
                .iter()
                .chain(apply_params)
                .chain(ctor_params)
                .chain(locals)
                .chain(states)
            {
                walk_decl(d, f);
            }
        }
        DeclKind::Control {
            type_params,
            apply_params,
            ctor_params,
            locals,
            body,
            ..
        } => {
            for d in type_params
                .iter()
                .chain(apply_params)
                .chain(ctor_params)
                .chain(locals)
            {
                walk_decl(d, f);
            }
            walk_stmt(body, f);
        }
        DeclKind::State {
            body, transition, ..
        } => {
            for s in body {
                walk_stmt(s, f);
            }
            if let Some(t) = transition {
                walk_expr(t, f);
            }
        }
        DeclKind::Function {
            type_params,
            return_type,
            params,
            body,
            ..
        } => {
            for tp in type_params {
                walk_decl(tp, f);
            }
            if let Some(rt) = return_type {
                walk_type(rt, f);
            }
            for p in params {
                walk_decl(p, f);
            }
            walk_stmt(body, f);
        }
        DeclKind::Action { params, body, .. } => {
            for p in params {
                walk_decl(p, f);
            }
            walk_stmt(body, f);
        }
        DeclKind::Table {
            keys,
            actions,
            default_action,
            ..
        } => {
            for key in keys {
                walk_expr(&key.expr, f);
                walk_expr(&key.match_kind, f);
            }
            for a in actions {
                walk_expr(&a.expr, f);
            }
            if let Some(d) = default_action {
                walk_expr(d, f);
            }
        }
    }
}

fn walk_stmt(stmt: &Stmt, f: &mut dyn FnMut(NodeId, Span)) {
    match &stmt.kind {
        StmtKind::Block(stmts) => {
            for s in stmts {
                walk_stmt(s, f);
            }
        }
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            walk_expr(condition, f);
            walk_stmt(then_branch, f);
            if let Some(e) = else_branch {
                walk_stmt(e, f);
            }
        }
        StmtKind::Switch { expression, cases } => {
            walk_expr(expression, f);
            for case in cases {
                if let SwitchLabel::Action(path) = &case.label {
                    f(path.id, path.span);
                }
                if let Some(body) = &case.body {
                    walk_stmt(body, f);
                }
            }
        }
        StmtKind::Return(value) => {
            if let Some(v) = value {
                walk_expr(v, f);
            }
        }
        StmtKind::Assign { target, value } => {
            walk_expr(target, f);
            walk_expr(value, f);
        }
        StmtKind::Call(call) => walk_expr(call, f),
        StmtKind::Decl(decl) => walk_decl(decl, f),
        StmtKind::Empty => {}
    }
}

fn walk_expr(expr: &Expr, f: &mut dyn FnMut(NodeId, Span)) {
    match &expr.kind {
        ExprKind::Constant { .. }
        | ExprKind::Bool(_)
        | ExprKind::StringLit(_)
        | ExprKind::Default
        | ExprKind::This => {}
        ExprKind::PathRef(path) => f(path.id, path.span),
        ExprKind::Member { base, .. } => walk_expr(base, f),
        ExprKind::Index { base, index } => {
            walk_expr(base, f);
            walk_expr(index, f);
        }
        ExprKind::Slice { base, msb, lsb } => {
            walk_expr(base, f);
            walk_expr(msb, f);
            walk_expr(lsb, f);
        }
        ExprKind::Cast { target, expr } => {
            walk_type(target, f);
            walk_expr(expr, f);
        }
        ExprKind::Unary { expr, .. } => walk_expr(expr, f),
        ExprKind::Binary { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        ExprKind::Mux {
            cond,
            then_expr,
            else_expr,
        } => {
            walk_expr(cond, f);
            walk_expr(then_expr, f);
            walk_expr(else_expr, f);
        }
        ExprKind::List { components } => {
            for c in components {
                walk_expr(c, f);
            }
        }
        ExprKind::Call {
            method,
            type_args,
            args,
        } => {
            walk_expr(method, f);
            for t in type_args {
                walk_type(t, f);
            }
            for a in args {
                walk_expr(a, f);
            }
        }
        ExprKind::ConstructorCall { ty, args } => {
            walk_type(ty, f);
            for a in args {
                walk_expr(a, f);
            }
        }
        ExprKind::Select { select, cases } => {
            walk_expr(select, f);
            for case in cases {
                walk_expr(&case.keyset, f);
                walk_expr(&case.state, f);
            }
        }
    }
}

fn walk_type(ty: &AstType, f: &mut dyn FnMut(NodeId, Span)) {
    match &ty.kind {
        AstTypeKind::Bits { .. }
        | AstTypeKind::Varbits { .. }
        | AstTypeKind::Bool
        | AstTypeKind::String
        | AstTypeKind::Void
        | AstTypeKind::Dontcare => {}
        AstTypeKind::Tuple(components) => {
            for c in components {
                walk_type(c, f);
            }
        }
        AstTypeKind::Stack { element, size } => {
            walk_type(element, f);
            walk_expr(size, f);
        }
        AstTypeKind::Name(path) => f(path.id, path.span),
        AstTypeKind::Specialized { base, args } => {
            f(base.id, base.span);
            for a in args {
                walk_type(a, f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::AstBuilder;

    #[test]
    fn test_declare_and_lookup() {
        let b = AstBuilder::new();
        let decl = b.variable("x", b.ty_bits(8, false), None);
        let path = b.path("x");
        let mut map = ReferenceMap::new();
        map.declare(path.id, Rc::clone(&decl));
        assert!(Rc::ptr_eq(map.get_declaration(path.id).unwrap(), &decl));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_new_name_is_unique() {
        let map = ReferenceMap::new();
        let mut interner = StringInterner::new();
        let a = map.new_name("R", &mut interner);
        let b = map.new_name("R", &mut interner);
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), Some("R_0"));
        assert_eq!(interner.resolve(b), Some("R_1"));
    }

    #[test]
    fn test_validate_map_reports_unbound_paths() {
        let b = AstBuilder::new();
        let decl = b.variable("y", b.ty_name("h_t"), None);
        let program = b.program(vec![decl]);
        let map = ReferenceMap::new();
        let missing = map.validate_map(&program).unwrap_err();
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn test_validate_map_accepts_covered_tree() {
        let b = AstBuilder::new();
        let hdr = b.header("h_t", vec![b.field("x", b.ty_bits(8, false))]);
        let ty = b.ty_name("h_t");
        let path_id = match &ty.kind {
            AstTypeKind::Name(p) => p.id,
            _ => unreachable!(),
        };
        let decl = b.variable("y", ty, None);
        let program = b.program(vec![Rc::clone(&hdr), decl]);
        let mut map = ReferenceMap::new();
        map.declare(path_id, hdr);
        assert!(map.validate_map(&program).is_ok());
    }
}
