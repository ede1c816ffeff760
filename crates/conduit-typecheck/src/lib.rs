//! Conduit type inference and checking core.
//!
//! This crate consumes a parsed, name-resolved program (from
//! `conduit-syntax`) and produces:
//!
//! - a [`TypeMap`] associating every node with its inferred type, plus
//!   the compile-time-constant and left-value sets,
//! - a possibly-rewritten program with explicit coercions inserted and
//!   width-free integer literals re-typed to their inferred widths,
//! - type errors, reported through the shared diagnostic sink.
//!
//! The engine is a constraint-based unifier over a type algebra with
//! unification variables ([`types`]), a canonicalizer that hash-conses
//! structural types and expands generic specializations ([`canon`]), and
//! a bottom-up rewriting inference visitor ([`check`]).
//!
//! # Pipeline
//!
//! [`TypeChecking::run`] is the fixed composition: validate the reference
//! map, run inference, and (when the pass reported no errors) apply the
//! accumulated substitution so every recorded type is ground. Callers
//! consult the reporter's error count; no error escapes as a Rust error.
//!
//! ```
//! use conduit_syntax::{AstBuilder, ReferenceMap, Reporter};
//! use conduit_typecheck::{Mode, TypeChecking, TypeMap};
//!
//! let b = AstBuilder::new();
//! let x = b.variable("x", b.ty_bits(8, false), Some(b.constant(3)));
//! let program = b.program(vec![x]);
//!
//! let ref_map = ReferenceMap::new();
//! let mut type_map = TypeMap::new();
//! let reporter = Reporter::new();
//! let checking = TypeChecking {
//!     ref_map: &ref_map,
//!     type_map: &mut type_map,
//!     reporter: &reporter,
//!     ids: b.ids(),
//!     interner: b.interner(),
//!     mode: Mode::Mutating,
//! };
//! let checked = checking.run(&program);
//! assert_eq!(reporter.error_count(), 0);
//! assert_eq!(checked.decls.len(), 1);
//! ```

#![warn(missing_docs)]

pub mod canon;
pub mod check;
pub mod context;
pub mod error;
pub mod infer;
pub mod types;

pub use check::{Mode, TypeInference, WellKnown};
pub use context::{TypeMap, TypeVarSubst};
pub use error::{Result, TypeError};
pub use infer::{Constraint, ConstraintSet};
pub use types::{DisplayTy, Ty, TyRef};

use conduit_mem::StringInterner;
use conduit_syntax::ast::{NodeIdGen, Program};
use conduit_syntax::{ReferenceMap, Reporter};
use std::cell::RefCell;
use std::rc::Rc;

/// The type-checking pass composition.
///
/// Owns nothing: the reference map, type map, and reporter are shared
/// with the surrounding front-end, which runs resolution before and
/// re-runs it after when the tree was rewritten.
pub struct TypeChecking<'a> {
    /// The resolved reference map; must cover the program.
    pub ref_map: &'a ReferenceMap,
    /// The result store.
    pub type_map: &'a mut TypeMap,
    /// The diagnostic sink.
    pub reporter: &'a Reporter,
    /// Node-id source shared with the builder.
    pub ids: Rc<NodeIdGen>,
    /// Interner shared with the builder.
    pub interner: Rc<RefCell<StringInterner>>,
    /// Whether rewrites are retained.
    pub mode: Mode,
}

impl TypeChecking<'_> {
    /// Runs the pass. Returns the (possibly rewritten) program; in
    /// read-only mode the result is node-for-node the input.
    ///
    /// # Panics
    ///
    /// Panics if the reference map does not cover the program — the
    /// resolver must run first — or on an internal invariant violation.
    pub fn run(self, program: &Program) -> Program {
        if let Err(missing) = self.ref_map.validate_map(program) {
            panic!(
                "BUG: reference map does not cover the program; {} unresolved path(s), first at {}",
                missing.len(),
                missing[0]
            );
        }
        let errors_before = self.reporter.error_count();
        let mut inference = TypeInference::new(
            self.ref_map,
            self.type_map,
            self.reporter,
            self.ids,
            self.interner,
            self.mode,
        );
        let result = inference.run(program);
        if self.reporter.error_count() == errors_before {
            self.type_map.apply_substitutions();
        }
        result
    }
}
