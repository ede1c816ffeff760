//! Expression nodes.
//!
//! Expressions are post-order typed by the inference pass: every node ends
//! up with an entry in the type map, plus the compile-time-constant and
//! left-value flags where they apply.

use super::ty::AstType;
use super::{NodeId, Path};
use crate::span::{Span, Spanned};
use conduit_mem::Symbol;
use std::fmt;
use std::rc::Rc;

/// An expression.
#[derive(Debug, Clone)]
pub struct Expr {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The expression form.
    pub kind: ExprKind,
}

/// The forms an expression can take.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Integer literal. `width` is `Some` for width-annotated literals
    /// (`8w3`) and for literals the checker has re-widthed; `None` means
    /// the literal has the infinite-precision integer type.
    Constant {
        /// The literal value.
        value: i128,
        /// Annotated or inferred `(width, signed)`.
        width: Option<(u32, bool)>,
    },
    /// `true` / `false`.
    Bool(bool),
    /// String literal.
    StringLit(Symbol),
    /// Reference to a declaration.
    PathRef(Rc<Path>),
    /// Member access `base.member`.
    Member {
        /// The receiver.
        base: Rc<Expr>,
        /// The member name.
        member: Symbol,
    },
    /// Header-stack indexing `base[index]`.
    Index {
        /// The stack expression.
        base: Rc<Expr>,
        /// The index.
        index: Rc<Expr>,
    },
    /// Bit slice `base[msb:lsb]`.
    Slice {
        /// The sliced expression.
        base: Rc<Expr>,
        /// Most-significant bit index (constant).
        msb: Rc<Expr>,
        /// Least-significant bit index (constant).
        lsb: Rc<Expr>,
    },
    /// Explicit cast `(T) e`.
    Cast {
        /// Cast target type.
        target: Rc<AstType>,
        /// The operand.
        expr: Rc<Expr>,
    },
    /// Unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        expr: Rc<Expr>,
    },
    /// Binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Rc<Expr>,
        /// Right operand.
        right: Rc<Expr>,
    },
    /// Conditional `cond ? then : else`.
    Mux {
        /// The selector; must be `bool`.
        cond: Rc<Expr>,
        /// Value when true.
        then_expr: Rc<Expr>,
        /// Value when false.
        else_expr: Rc<Expr>,
    },
    /// List `{ e1, ..., en }`; typed as a tuple.
    List {
        /// The components.
        components: Vec<Rc<Expr>>,
    },
    /// Call `method<TypeArgs>(args)`.
    Call {
        /// The callee (a path or member access).
        method: Rc<Expr>,
        /// Explicit type arguments, possibly empty.
        type_args: Vec<Rc<AstType>>,
        /// The arguments.
        args: Vec<Rc<Expr>>,
    },
    /// Constructor call `Type(args)`.
    ConstructorCall {
        /// The constructed type.
        ty: Rc<AstType>,
        /// Constructor arguments; must be compile-time constants.
        args: Vec<Rc<Expr>>,
    },
    /// Parser transition select: `select (e1, ..., en) { keyset: state; }`.
    Select {
        /// The selector; always a list expression.
        select: Rc<Expr>,
        /// The cases in source order.
        cases: Vec<SelectCase>,
    },
    /// The `default` / `_` keyset expression.
    Default,
    /// `this`; legal only inside an abstract-method override.
    This,
}

/// One arm of a select expression.
#[derive(Debug, Clone)]
pub struct SelectCase {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The keyset matched against the selector.
    pub keyset: Rc<Expr>,
    /// The target state (a path expression).
    pub state: Rc<Expr>,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation `-`.
    Neg,
    /// Bitwise complement `~`.
    Cmpl,
    /// Logical not `!`.
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/` (unsigned operands only)
    Div,
    /// `%` (unsigned operands only)
    Mod,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `++` bit concatenation
    Concat,
    /// `..` range (produces a set)
    Range,
    /// `&&&` mask (produces a set)
    Mask,
}

impl BinaryOp {
    /// The operator as written in the source, for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Concat => "++",
            BinaryOp::Range => "..",
            BinaryOp::Mask => "&&&",
        }
    }
}

impl UnaryOp {
    /// The operator as written in the source, for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Cmpl => "~",
            UnaryOp::Not => "!",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Expr {
    /// Returns the constant value if this node is an integer literal.
    #[must_use]
    pub fn as_constant(&self) -> Option<i128> {
        match self.kind {
            ExprKind::Constant { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl Spanned for Expr {
    fn span(&self) -> Span {
        self.span
    }
}
