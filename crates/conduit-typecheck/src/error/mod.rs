//! Type checking errors.
//!
//! [`TypeError`] is the internal error currency of the unifier and the
//! canonicalizer. The inference visitor converts these into reporter
//! diagnostics (attached to source positions) and keeps going; nothing in
//! the core propagates errors past the pass boundary.

use crate::types::display::short;
use crate::types::TyRef;
use conduit_syntax::Span;
use std::fmt;

/// Errors produced while solving constraints or canonicalizing types.
#[derive(Debug, Clone)]
pub enum TypeError {
    /// Two types could not be made equal.
    Mismatch {
        /// The type required by the context.
        expected: TyRef,
        /// The type found.
        found: TyRef,
        /// Source location.
        span: Span,
    },
    /// A call supplied the wrong number of arguments.
    ArityMismatch {
        /// Expected argument count.
        expected: usize,
        /// Found argument count.
        found: usize,
        /// Source location.
        span: Span,
    },
    /// A specialization or call supplied the wrong number of type
    /// arguments.
    TypeArgArity {
        /// Expected type-argument count.
        expected: usize,
        /// Found type-argument count.
        found: usize,
        /// Source location.
        span: Span,
    },
    /// An `out`/`inout` argument does not denote a storage location.
    NotLeftValue {
        /// Source location of the argument.
        span: Span,
    },
    /// A directionless argument is not a compile-time constant.
    NotCompileTimeConstant {
        /// Source location of the argument.
        span: Span,
    },
    /// Two parameters differ in direction where identical signatures are
    /// required.
    DirectionMismatch {
        /// Source location.
        span: Span,
    },
    /// The occurs check failed; binding would build an infinite type.
    InfiniteType {
        /// Source location.
        span: Span,
    },
    /// Type arguments were supplied for a type that is not generic.
    NotGeneric {
        /// The non-generic type.
        found: TyRef,
        /// Source location.
        span: Span,
    },
}

impl TypeError {
    /// The source position of this error.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            TypeError::Mismatch { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::TypeArgArity { span, .. }
            | TypeError::NotLeftValue { span }
            | TypeError::NotCompileTimeConstant { span }
            | TypeError::DirectionMismatch { span }
            | TypeError::InfiniteType { span }
            | TypeError::NotGeneric { span, .. } => *span,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch {
                expected, found, ..
            } => write!(
                f,
                "type mismatch: expected {}, found {}",
                short(expected),
                short(found)
            ),
            TypeError::ArityMismatch {
                expected, found, ..
            } => write!(
                f,
                "wrong number of arguments: expected {expected}, found {found}"
            ),
            TypeError::TypeArgArity {
                expected, found, ..
            } => write!(
                f,
                "wrong number of type arguments: expected {expected}, found {found}"
            ),
            TypeError::NotLeftValue { .. } => write!(f, "must be a left-value"),
            TypeError::NotCompileTimeConstant { .. } => {
                write!(f, "cannot evaluate to a compile-time constant")
            }
            TypeError::DirectionMismatch { .. } => {
                write!(f, "parameter directions do not match")
            }
            TypeError::InfiniteType { .. } => {
                write!(f, "cannot construct an infinite type")
            }
            TypeError::NotGeneric { found, .. } => write!(
                f,
                "type {} is not generic and cannot be specialized with type arguments",
                short(found)
            ),
        }
    }
}

impl std::error::Error for TypeError {}

/// Result alias for fallible type operations.
pub type Result<T> = std::result::Result<T, TypeError>;
