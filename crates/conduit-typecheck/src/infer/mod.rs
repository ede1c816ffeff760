//! Unification and constraints.

pub mod constraints;

pub use constraints::{Constraint, ConstraintSet};
