//! Declaration nodes.
//!
//! Everything a path can resolve to is a declaration: top-level items,
//! parameters, type parameters, extern methods, parser states, and the
//! members of enum-like declarations. This mirrors how the reference map
//! works — it maps path nodes to `Rc<Decl>`, whatever the kind.

use super::expr::Expr;
use super::stmt::Stmt;
use super::ty::AstType;
use super::{NodeId, Path};
use crate::span::{Span, Spanned};
use conduit_mem::Symbol;
use std::rc::Rc;

/// Parameter passing directions.
///
/// `None` means the parameter is bound at instantiation time to a
/// compile-time constant (for actions: bound by the control plane).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Directionless; compile-time or control-plane bound.
    None,
    /// Read-only input.
    In,
    /// Output; the argument must be a left-value.
    Out,
    /// In-out; the argument must be a left-value.
    InOut,
}

impl Direction {
    /// Source syntax for diagnostics; the empty string for `None`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::None => "",
            Direction::In => "in",
            Direction::Out => "out",
            Direction::InOut => "inout",
        }
    }
}

/// A declaration.
#[derive(Debug, Clone)]
pub struct Decl {
    /// Node identity; named types use it as their identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The declaration form.
    pub kind: DeclKind,
}

/// A field of a struct, header, or header union.
#[derive(Debug, Clone)]
pub struct StructField {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// Field name.
    pub name: Symbol,
    /// Field type.
    pub ty: Rc<AstType>,
}

/// A table key element: an expression matched with a given match kind.
#[derive(Debug, Clone)]
pub struct KeyElement {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The matched expression.
    pub expr: Rc<Expr>,
    /// The match kind (a path to a `match_kind` member).
    pub match_kind: Rc<Expr>,
}

/// An entry of a table's `actions` list: a path to an action or a call
/// that partially applies one.
#[derive(Debug, Clone)]
pub struct ActionListElement {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The action reference (path or call expression).
    pub expr: Rc<Expr>,
}

/// The forms a declaration can take.
#[derive(Debug, Clone)]
pub enum DeclKind {
    /// `const T name = value;`
    Constant {
        /// Declared name.
        name: Symbol,
        /// Declared type.
        ty: Rc<AstType>,
        /// Initializer; must be a compile-time constant.
        initializer: Rc<Expr>,
    },
    /// `T name;` / `T name = value;`
    Variable {
        /// Declared name.
        name: Symbol,
        /// Declared type.
        ty: Rc<AstType>,
        /// Optional initializer.
        initializer: Option<Rc<Expr>>,
    },
    /// `Type(args) name;` — instantiation of an extern or container, with
    /// an optional initializer block providing abstract-method overrides.
    Instance {
        /// Instance name.
        name: Symbol,
        /// The instantiated type.
        ty: Rc<AstType>,
        /// Constructor arguments.
        args: Vec<Rc<Expr>>,
        /// Abstract-method overrides (function declarations), if any.
        initializer: Option<Vec<Rc<Decl>>>,
    },
    /// A parameter of a method, action, function, or container.
    Param {
        /// Parameter name.
        name: Symbol,
        /// Passing direction.
        direction: Direction,
        /// Declared type.
        ty: Rc<AstType>,
        /// Optional default value.
        default: Option<Rc<Expr>>,
    },
    /// A type parameter of a generic declaration.
    TypeParam {
        /// Parameter name.
        name: Symbol,
    },
    /// `struct name { fields }`
    Struct {
        /// Type name.
        name: Symbol,
        /// Fields in source order.
        fields: Vec<StructField>,
    },
    /// `header name { fields }`
    Header {
        /// Type name.
        name: Symbol,
        /// Fields in source order; field types must be `bit`/`varbit`.
        fields: Vec<StructField>,
    },
    /// `header_union name { fields }`
    Union {
        /// Type name.
        name: Symbol,
        /// Fields in source order; field types must be headers.
        fields: Vec<StructField>,
    },
    /// `enum name { members }`
    Enum {
        /// Type name.
        name: Symbol,
        /// Member declarations ([`DeclKind::Member`]).
        members: Vec<Rc<Decl>>,
    },
    /// `error { members }` — extends the error namespace.
    Errors {
        /// Member declarations ([`DeclKind::Member`]).
        members: Vec<Rc<Decl>>,
    },
    /// `match_kind { members }` — extends the match-kind namespace.
    MatchKinds {
        /// Member declarations ([`DeclKind::Member`]).
        members: Vec<Rc<Decl>>,
    },
    /// A member of an enum, `error`, or `match_kind` declaration.
    Member {
        /// Member name.
        name: Symbol,
    },
    /// `typedef T name;`
    Typedef {
        /// Alias name.
        name: Symbol,
        /// The aliased type.
        ty: Rc<AstType>,
    },
    /// `extern name<Ts> { methods }`
    Extern {
        /// Type name.
        name: Symbol,
        /// Type parameters ([`DeclKind::TypeParam`]).
        type_params: Vec<Rc<Decl>>,
        /// Method declarations ([`DeclKind::Method`]); a method with the
        /// extern's own name is a constructor.
        methods: Vec<Rc<Decl>>,
    },
    /// An extern method or a top-level extern function.
    Method {
        /// Method name.
        name: Symbol,
        /// Type parameters ([`DeclKind::TypeParam`]).
        type_params: Vec<Rc<Decl>>,
        /// Return type; `None` for constructors.
        return_type: Option<Rc<AstType>>,
        /// Parameters ([`DeclKind::Param`]).
        params: Vec<Rc<Decl>>,
        /// `true` for abstract methods, overridden per instance.
        is_abstract: bool,
    },
    /// `parser name<Ts>(params);` — a parser type.
    ParserType {
        /// Type name.
        name: Symbol,
        /// Type parameters ([`DeclKind::TypeParam`]).
        type_params: Vec<Rc<Decl>>,
        /// Apply parameters ([`DeclKind::Param`]).
        apply_params: Vec<Rc<Decl>>,
    },
    /// `control name<Ts>(params);` — a control type.
    ControlType {
        /// Type name.
        name: Symbol,
        /// Type parameters ([`DeclKind::TypeParam`]).
        type_params: Vec<Rc<Decl>>,
        /// Apply parameters ([`DeclKind::Param`]).
        apply_params: Vec<Rc<Decl>>,
    },
    /// `package name<Ts>(params);`
    Package {
        /// Type name.
        name: Symbol,
        /// Type parameters ([`DeclKind::TypeParam`]).
        type_params: Vec<Rc<Decl>>,
        /// Constructor parameters ([`DeclKind::Param`]).
        ctor_params: Vec<Rc<Decl>>,
    },
    /// A parser implementation with states.
    Parser {
        /// Parser name.
        name: Symbol,
        /// Type parameters ([`DeclKind::TypeParam`]).
        type_params: Vec<Rc<Decl>>,
        /// Apply parameters ([`DeclKind::Param`]).
        apply_params: Vec<Rc<Decl>>,
        /// Constructor parameters ([`DeclKind::Param`]).
        ctor_params: Vec<Rc<Decl>>,
        /// Local declarations.
        locals: Vec<Rc<Decl>>,
        /// States ([`DeclKind::State`]).
        states: Vec<Rc<Decl>>,
    },
    /// A control implementation with an apply body.
    Control {
        /// Control name.
        name: Symbol,
        /// Type parameters ([`DeclKind::TypeParam`]).
        type_params: Vec<Rc<Decl>>,
        /// Apply parameters ([`DeclKind::Param`]).
        apply_params: Vec<Rc<Decl>>,
        /// Constructor parameters ([`DeclKind::Param`]).
        ctor_params: Vec<Rc<Decl>>,
        /// Local declarations (variables, actions, tables, instances).
        locals: Vec<Rc<Decl>>,
        /// The apply block.
        body: Rc<Stmt>,
    },
    /// A parser state.
    State {
        /// State name.
        name: Symbol,
        /// Statements executed on entry.
        body: Vec<Rc<Stmt>>,
        /// The transition: a select expression or a state path; `None`
        /// means the implicit transition to the accept state.
        transition: Option<Rc<Expr>>,
    },
    /// A function.
    Function {
        /// Function name.
        name: Symbol,
        /// Type parameters ([`DeclKind::TypeParam`]).
        type_params: Vec<Rc<Decl>>,
        /// Return type; `None` means `void`.
        return_type: Option<Rc<AstType>>,
        /// Parameters ([`DeclKind::Param`]).
        params: Vec<Rc<Decl>>,
        /// The body.
        body: Rc<Stmt>,
    },
    /// An action.
    Action {
        /// Action name.
        name: Symbol,
        /// Parameters ([`DeclKind::Param`]); directionless parameters must
        /// come last.
        params: Vec<Rc<Decl>>,
        /// The body.
        body: Rc<Stmt>,
    },
    /// A match-action table.
    Table {
        /// Table name.
        name: Symbol,
        /// Key elements.
        keys: Vec<KeyElement>,
        /// The `actions` list.
        actions: Vec<ActionListElement>,
        /// The `default_action` property, if present.
        default_action: Option<Rc<Expr>>,
    },
}

impl Decl {
    /// Returns the declared name, if this kind of declaration has one.
    #[must_use]
    pub fn name(&self) -> Option<Symbol> {
        match &self.kind {
            DeclKind::Constant { name, .. }
            | DeclKind::Variable { name, .. }
            | DeclKind::Instance { name, .. }
            | DeclKind::Param { name, .. }
            | DeclKind::TypeParam { name }
            | DeclKind::Struct { name, .. }
            | DeclKind::Header { name, .. }
            | DeclKind::Union { name, .. }
            | DeclKind::Enum { name, .. }
            | DeclKind::Member { name }
            | DeclKind::Typedef { name, .. }
            | DeclKind::Extern { name, .. }
            | DeclKind::Method { name, .. }
            | DeclKind::ParserType { name, .. }
            | DeclKind::ControlType { name, .. }
            | DeclKind::Package { name, .. }
            | DeclKind::Parser { name, .. }
            | DeclKind::Control { name, .. }
            | DeclKind::State { name, .. }
            | DeclKind::Function { name, .. }
            | DeclKind::Action { name, .. }
            | DeclKind::Table { name, .. } => Some(*name),
            DeclKind::Errors { .. } | DeclKind::MatchKinds { .. } => None,
        }
    }

    /// Returns the parameter fields if this is a [`DeclKind::Param`].
    #[must_use]
    pub fn as_param(&self) -> Option<(Symbol, Direction, &Rc<AstType>)> {
        match &self.kind {
            DeclKind::Param {
                name,
                direction,
                ty,
                ..
            } => Some((*name, *direction, ty)),
            _ => None,
        }
    }
}

impl Spanned for Decl {
    fn span(&self) -> Span {
        self.span
    }
}

/// Convenience accessor for a path expression's path, used when a
/// declaration site requires one (switch labels, action references).
#[must_use]
pub fn expr_path(expr: &Expr) -> Option<&Rc<Path>> {
    match &expr.kind {
        super::ExprKind::PathRef(path) => Some(path),
        _ => None,
    }
}
