//! Constraint sets and the unification solver.
//!
//! A constraint is an equality between two types. [`ConstraintSet::solve`]
//! runs first-order unification with an occurs check over the type
//! algebra, producing the most general substitution or the most specific
//! mismatch. Constraints are processed in arrival order.
//!
//! Two shapes get special treatment:
//!
//! - `InfInt ≡ Bits` binds the literal's unification id to the concrete
//!   width; callers then rewrite the literal.
//! - `Method ≡ MethodCall` matches a call site against a (possibly
//!   generic) method type: explicit type arguments bind the method's type
//!   parameters, each argument unifies with its parameter with direction
//!   compatibility enforced, and the return slot is equated.
//!
//! Named types unify by declaration identity only; a failed identity
//! check is a type error, not a structural descent.

use crate::context::TypeVarSubst;
use crate::error::{Result, TypeError};
use crate::types::ty::{ActionType, MethodCallShape, MethodType, Ty, TyRef};
use conduit_syntax::{Direction, Span};
use std::rc::Rc;

/// A single constraint.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// The two types must be equal.
    Equal {
        /// The type required by the context.
        dest: TyRef,
        /// The type found.
        src: TyRef,
    },
}

/// An ordered set of constraints.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality constraint.
    pub fn add_equality(&mut self, dest: TyRef, src: TyRef) {
        self.constraints.push(Constraint::Equal { dest, src });
    }

    /// Number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Returns `true` if no constraints were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Solves the constraints in arrival order, producing the most
    /// general substitution. `span` locates errors that have no better
    /// position of their own.
    pub fn solve(&self, span: Span) -> Result<TypeVarSubst> {
        let mut unifier = Unifier {
            subst: TypeVarSubst::new(),
            span,
        };
        for constraint in &self.constraints {
            let Constraint::Equal { dest, src } = constraint;
            unifier.unify(dest, src)?;
        }
        Ok(unifier.subst)
    }
}

struct Unifier {
    subst: TypeVarSubst,
    span: Span,
}

impl Unifier {
    fn unify(&mut self, dest: &TyRef, src: &TyRef) -> Result<()> {
        let dest = self.subst.apply(dest);
        let src = self.subst.apply(src);
        if dest == src {
            return Ok(());
        }
        conduit_log::trace!(
            "unify {} with {}",
            crate::types::display::short(&dest),
            crate::types::display::short(&src)
        );
        match (&*dest, &*src) {
            (Ty::Var(v), _) => self.bind(v.id, &src),
            (_, Ty::Var(v)) => self.bind(v.id, &dest),

            (Ty::Dontcare, _) | (_, Ty::Dontcare) => Ok(()),

            (Ty::InfInt { id }, Ty::Bits { .. }) => self.bind(*id, &src),
            (Ty::Bits { .. }, Ty::InfInt { id }) => self.bind(*id, &dest),
            (Ty::InfInt { id }, Ty::InfInt { .. }) => self.bind(*id, &src),

            (Ty::TypeOf(a), Ty::TypeOf(b)) => self.unify(a, b),
            (Ty::Set(a), Ty::Set(b)) => self.unify(a, b),

            (
                Ty::Stack {
                    element: ea,
                    size: sa,
                },
                Ty::Stack {
                    element: eb,
                    size: sb,
                },
            ) if sa == sb => self.unify(ea, eb),

            (Ty::Tuple(a), Ty::Tuple(b)) => {
                if a.len() != b.len() {
                    return Err(self.mismatch(&dest, &src));
                }
                for (ta, tb) in a.iter().zip(b) {
                    self.unify(ta, tb)?;
                }
                Ok(())
            }

            (Ty::Method(m), Ty::MethodCall(c)) => self.unify_call(m, c),
            (Ty::MethodCall(c), Ty::Method(m)) => self.unify_call(m, c),

            // A parser/control implementation satisfies a parser/control
            // type with the same apply signature; the two come from
            // different declarations, so this is a structural match on
            // the apply parameters, not an identity check.
            (Ty::Parser(a), Ty::Parser(b)) | (Ty::Control(a), Ty::Control(b)) => {
                if a.apply_params.len() != b.apply_params.len() {
                    return Err(self.mismatch(&dest, &src));
                }
                for (pa, pb) in a.apply_params.iter().zip(&b.apply_params) {
                    if pa.direction != pb.direction {
                        return Err(TypeError::DirectionMismatch { span: self.span });
                    }
                    self.unify(&pa.ty, &pb.ty)?;
                }
                Ok(())
            }

            (Ty::Method(a), Ty::Method(b)) => self.unify_methods(&dest, &src, a, b),
            (Ty::Action(a), Ty::Action(b)) => self.unify_actions(&dest, &src, a, b),

            (
                Ty::SpecializedCanonical {
                    base: ba, args: aa, ..
                },
                Ty::SpecializedCanonical {
                    base: bb, args: ab, ..
                },
            ) => {
                self.unify(ba, bb)?;
                if aa.len() != ab.len() {
                    return Err(self.mismatch(&dest, &src));
                }
                for (ta, tb) in aa.iter().zip(ab) {
                    self.unify(ta, tb)?;
                }
                Ok(())
            }

            // Everything else, including mismatched named types and
            // `Bits` of different width or signedness, is an error.
            _ => Err(self.mismatch(&dest, &src)),
        }
    }

    fn bind(&mut self, id: u32, ty: &TyRef) -> Result<()> {
        if ty.contains_var(id) {
            return Err(TypeError::InfiniteType { span: self.span });
        }
        let bound = self.subst.bind(id, Rc::clone(ty));
        debug_assert!(bound, "binding an already-substituted variable");
        Ok(())
    }

    fn mismatch(&self, dest: &TyRef, src: &TyRef) -> TypeError {
        TypeError::Mismatch {
            expected: Rc::clone(dest),
            found: Rc::clone(src),
            span: self.span,
        }
    }

    /// Matches a call shape against a method type.
    fn unify_call(&mut self, method: &MethodType, call: &MethodCallShape) -> Result<()> {
        if !call.type_args.is_empty() {
            if call.type_args.len() != method.type_params.len() {
                return Err(TypeError::TypeArgArity {
                    expected: method.type_params.len(),
                    found: call.type_args.len(),
                    span: self.span,
                });
            }
            for (tp, ta) in method.type_params.iter().zip(&call.type_args) {
                self.bind(tp.id, ta)?;
            }
        }

        if method.params.len() != call.args.len() {
            return Err(TypeError::ArityMismatch {
                expected: method.params.len(),
                found: call.args.len(),
                span: self.span,
            });
        }

        for (param, arg) in method.params.iter().zip(&call.args) {
            match param.direction {
                Direction::Out | Direction::InOut if !arg.is_left_value => {
                    return Err(TypeError::NotLeftValue { span: arg.span });
                }
                Direction::None if !arg.is_constant => {
                    return Err(TypeError::NotCompileTimeConstant { span: arg.span });
                }
                _ => {}
            }
            self.unify(&param.ty, &arg.ty)?;
        }

        let ret = method
            .return_type
            .clone()
            .unwrap_or_else(|| Rc::new(Ty::Void));
        self.unify(&ret, &call.return_type)
    }

    /// Structural method-against-method unification, used to match
    /// abstract-method overrides against their declarations.
    fn unify_methods(
        &mut self,
        dest: &TyRef,
        src: &TyRef,
        a: &MethodType,
        b: &MethodType,
    ) -> Result<()> {
        if a.type_params.len() != b.type_params.len() {
            return Err(self.mismatch(dest, src));
        }
        if a.params.len() != b.params.len() {
            return Err(TypeError::ArityMismatch {
                expected: a.params.len(),
                found: b.params.len(),
                span: self.span,
            });
        }
        for (pa, pb) in a.params.iter().zip(&b.params) {
            if pa.direction != pb.direction {
                return Err(TypeError::DirectionMismatch { span: self.span });
            }
            self.unify(&pa.ty, &pb.ty)?;
        }
        match (&a.return_type, &b.return_type) {
            (None, None) => Ok(()),
            (Some(ra), Some(rb)) => self.unify(ra, rb),
            _ => Err(self.mismatch(dest, src)),
        }
    }

    fn unify_actions(
        &mut self,
        dest: &TyRef,
        src: &TyRef,
        a: &ActionType,
        b: &ActionType,
    ) -> Result<()> {
        if a.params.len() != b.params.len() {
            return Err(self.mismatch(dest, src));
        }
        for (pa, pb) in a.params.iter().zip(&b.params) {
            if pa.direction != pb.direction {
                return Err(TypeError::DirectionMismatch { span: self.span });
            }
            self.unify(&pa.ty, &pb.ty)?;
        }
        Ok(())
    }
}
