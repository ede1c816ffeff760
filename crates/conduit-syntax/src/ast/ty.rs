//! Surface type syntax.
//!
//! These nodes are what the parser produces for type positions: `bit<8>`,
//! `int<4>`, `tuple<bit<8>, bool>`, a header stack `h_t[4]`, a named type,
//! or a specialization `reg<bit<32>>`. The type checker maps each of them
//! to a value of the internal type algebra and records the association in
//! the type map.

use super::{NodeId, Path};
use crate::span::{Span, Spanned};
use std::rc::Rc;

/// A type as written in the source.
#[derive(Debug, Clone)]
pub struct AstType {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The type form.
    pub kind: AstTypeKind,
}

/// The forms a surface type can take.
#[derive(Debug, Clone)]
pub enum AstTypeKind {
    /// Fixed-width integer: `bit<W>` (unsigned) or `int<W>` (signed).
    Bits {
        /// Bit width; must be positive.
        width: u32,
        /// `true` for `int<W>`.
        signed: bool,
    },
    /// Variable-length bitstring `varbit<W>`; only legal in headers.
    Varbits {
        /// Maximum width.
        max_width: u32,
    },
    /// `bool`.
    Bool,
    /// `string` (diagnostic annotations only).
    String,
    /// `void`.
    Void,
    /// `tuple<T1, ..., Tn>`.
    Tuple(Vec<Rc<AstType>>),
    /// Header stack `T[size]`; the size expression must be a compile-time
    /// constant.
    Stack {
        /// Element type; must canonicalize to a header or header union.
        element: Rc<AstType>,
        /// Stack size expression.
        size: Rc<super::Expr>,
    },
    /// A named type.
    Name(Rc<Path>),
    /// Specialization of a generic named type: `Name<T1, ..., Tn>`.
    Specialized {
        /// The generic base.
        base: Rc<Path>,
        /// Type arguments.
        args: Vec<Rc<AstType>>,
    },
    /// The don't-care type `_`.
    Dontcare,
}

impl Spanned for AstType {
    fn span(&self) -> Span {
        self.span
    }
}
