//! The type map.
//!
//! Process-scoped result store of the inference pass: a map from node
//! identity to inferred type, the compile-time-constant and left-value
//! sets, the accumulated global substitution, the hash-consing store for
//! structural types, and the counter unification ids are drawn from.

use crate::context::subst::TypeVarSubst;
use crate::types::display::short;
use crate::types::ty::{Ty, TyRef, TypeVar};
use conduit_mem::Symbol;
use conduit_syntax::ast::NodeId;
use fxhash::{FxHashMap, FxHashSet};
use std::collections::HashMap;
use std::rc::Rc;

/// Result store of the inference pass.
#[derive(Debug, Default)]
pub struct TypeMap {
    types: FxHashMap<NodeId, TyRef>,
    compile_time_constants: FxHashSet<NodeId>,
    left_values: FxHashSet<NodeId>,
    substitutions: TypeVarSubst,
    canonical: HashMap<Ty, TyRef>,
    next_var: u32,
}

impl TypeMap {
    /// Creates an empty type map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The inferred type of a node, if recorded.
    #[must_use]
    pub fn get_type(&self, node: NodeId) -> Option<&TyRef> {
        self.types.get(&node)
    }

    /// Returns `true` if the node already has a type. This is the
    /// `done()` entry guard of the inference visitor.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.types.contains_key(&node)
    }

    /// Records the type of a node.
    ///
    /// Re-recording the same type is idempotent. Recording a *different*
    /// type for a node is an invariant violation, except for the
    /// structurally equivalent `TypeOf` lift of an existing entry (or the
    /// unlifted form of an existing `TypeOf` entry), which is kept as
    /// first recorded.
    ///
    /// # Panics
    ///
    /// Panics on a conflicting re-insertion; this is an internal bug, not
    /// a user error.
    pub fn set_type(&mut self, node: NodeId, ty: TyRef) {
        if let Some(existing) = self.types.get(&node) {
            if Self::equivalent(existing, &ty) || Self::lift_agrees(existing, &ty) {
                return;
            }
            panic!(
                "BUG: conflicting types for {node}: had {}, now {}",
                short(existing),
                short(&ty)
            );
        }
        conduit_log::trace!("type of {node} is {}", short(&ty));
        self.types.insert(node, ty);
    }

    fn lift_agrees(a: &TyRef, b: &TyRef) -> bool {
        match (&**a, &**b) {
            (Ty::TypeOf(inner), _) => Self::equivalent(inner, b),
            (_, Ty::TypeOf(inner)) => Self::equivalent(a, inner),
            _ => false,
        }
    }

    /// Marks a node as a compile-time constant.
    pub fn set_compile_time_constant(&mut self, node: NodeId) {
        self.compile_time_constants.insert(node);
    }

    /// Whether the node is a compile-time constant.
    #[must_use]
    pub fn is_compile_time_constant(&self, node: NodeId) -> bool {
        self.compile_time_constants.contains(&node)
    }

    /// Marks a node as a left-value.
    pub fn set_left_value(&mut self, node: NodeId) {
        self.left_values.insert(node);
    }

    /// Whether the node denotes a storage location.
    #[must_use]
    pub fn is_left_value(&self, node: NodeId) -> bool {
        self.left_values.contains(&node)
    }

    /// Copies the type and flags of `from` to `to`. Used when a rewrite
    /// replaces a node: the replacement keeps the original's results.
    pub fn copy_entry(&mut self, from: NodeId, to: NodeId) {
        if let Some(ty) = self.types.get(&from).cloned() {
            self.set_type(to, ty);
        }
        if self.compile_time_constants.contains(&from) {
            self.compile_time_constants.insert(to);
        }
        if self.left_values.contains(&from) {
            self.left_values.insert(to);
        }
    }

    /// Composes a local solver result into the global substitution.
    pub fn add_substitutions(&mut self, tvs: &TypeVarSubst) {
        self.substitutions.compose(tvs);
    }

    /// The accumulated global substitution.
    #[must_use]
    pub fn substitutions(&self) -> &TypeVarSubst {
        &self.substitutions
    }

    /// Applies the accumulated substitution to every recorded type,
    /// making inferred types ground. Run once after a successful pass.
    pub fn apply_substitutions(&mut self) {
        if self.substitutions.is_identity() {
            return;
        }
        for ty in self.types.values_mut() {
            *ty = self.substitutions.apply(ty);
        }
    }

    /// The hash-consed representative of a structural type. Two
    /// structurally equivalent types map to the same `Rc`, so
    /// representatives can be compared by pointer.
    pub fn get_canonical(&mut self, ty: &TyRef) -> TyRef {
        if let Some(existing) = self.canonical.get(&**ty) {
            return Rc::clone(existing);
        }
        self.canonical.insert((**ty).clone(), Rc::clone(ty));
        Rc::clone(ty)
    }

    /// The canonical `bit<width>` / `int<width>` type.
    pub fn bits(&mut self, width: u32, signed: bool) -> TyRef {
        self.get_canonical(&Rc::new(Ty::Bits { width, signed }))
    }

    /// Mints a fresh unification variable.
    pub fn fresh_var(&mut self, name: Option<Symbol>) -> TypeVar {
        let id = self.next_var;
        self.next_var += 1;
        TypeVar { id, name }
    }

    /// Mints a fresh unification id for a width-free integer literal.
    /// `InfInt` ids share the `Var` id pool.
    pub fn fresh_inf_int(&mut self) -> TyRef {
        let id = self.next_var;
        self.next_var += 1;
        Rc::new(Ty::InfInt { id })
    }

    /// Structural equivalence modulo named-declaration identity: named
    /// types compare by declaring node, everything else pointwise.
    #[must_use]
    pub fn equivalent(a: &TyRef, b: &TyRef) -> bool {
        a == b
    }

    /// Number of nodes with recorded types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits_ty(width: u32) -> TyRef {
        Rc::new(Ty::Bits {
            width,
            signed: false,
        })
    }

    #[test]
    fn test_set_and_get() {
        let mut map = TypeMap::new();
        let node = NodeId::from_raw(1);
        map.set_type(node, bits_ty(8));
        assert!(map.contains(node));
        assert_eq!(map.get_type(node).unwrap().as_bits(), Some((8, false)));
    }

    #[test]
    fn test_set_same_type_is_idempotent() {
        let mut map = TypeMap::new();
        let node = NodeId::from_raw(1);
        map.set_type(node, bits_ty(8));
        map.set_type(node, bits_ty(8));
        assert_eq!(map.len(), 1);
    }

    #[test]
    #[should_panic(expected = "conflicting types")]
    fn test_set_conflicting_type_panics() {
        let mut map = TypeMap::new();
        let node = NodeId::from_raw(1);
        map.set_type(node, bits_ty(8));
        map.set_type(node, bits_ty(16));
    }

    #[test]
    fn test_type_of_lift_agrees() {
        let mut map = TypeMap::new();
        let node = NodeId::from_raw(1);
        let inner = bits_ty(8);
        map.set_type(node, Rc::new(Ty::TypeOf(Rc::clone(&inner))));
        // The unlifted form agrees with the recorded lift.
        map.set_type(node, inner);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_flags() {
        let mut map = TypeMap::new();
        let node = NodeId::from_raw(4);
        assert!(!map.is_compile_time_constant(node));
        assert!(!map.is_left_value(node));
        map.set_compile_time_constant(node);
        map.set_left_value(node);
        assert!(map.is_compile_time_constant(node));
        assert!(map.is_left_value(node));
    }

    #[test]
    fn test_copy_entry() {
        let mut map = TypeMap::new();
        let from = NodeId::from_raw(1);
        let to = NodeId::from_raw(2);
        map.set_type(from, bits_ty(8));
        map.set_compile_time_constant(from);
        map.copy_entry(from, to);
        assert_eq!(map.get_type(to).unwrap().as_bits(), Some((8, false)));
        assert!(map.is_compile_time_constant(to));
        assert!(!map.is_left_value(to));
    }

    #[test]
    fn test_canonical_bits_are_shared() {
        let mut map = TypeMap::new();
        let a = map.bits(8, false);
        let b = map.bits(8, false);
        let c = map.bits(8, true);
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_canonical_tuple() {
        let mut map = TypeMap::new();
        let t1 = Rc::new(Ty::Tuple(vec![map.bits(8, false), Rc::new(Ty::Bool)]));
        let t2 = Rc::new(Ty::Tuple(vec![map.bits(8, false), Rc::new(Ty::Bool)]));
        let c1 = map.get_canonical(&t1);
        let c2 = map.get_canonical(&t2);
        assert!(Rc::ptr_eq(&c1, &c2));
    }

    #[test]
    fn test_fresh_vars_are_distinct() {
        let mut map = TypeMap::new();
        let a = map.fresh_var(None);
        let b = map.fresh_var(None);
        assert_ne!(a.id, b.id);
        let inf = map.fresh_inf_int();
        match &*inf {
            Ty::InfInt { id } => assert!(*id > b.id),
            other => panic!("expected InfInt, got {other:?}"),
        }
    }

    #[test]
    fn test_apply_substitutions_grounds_types() {
        let mut map = TypeMap::new();
        let v = map.fresh_var(None);
        let node = NodeId::from_raw(9);
        map.set_type(node, Rc::new(Ty::Var(v)));

        let mut tvs = TypeVarSubst::new();
        tvs.bind(v.id, bits_ty(8));
        map.add_substitutions(&tvs);
        map.apply_substitutions();

        assert_eq!(map.get_type(node).unwrap().as_bits(), Some((8, false)));
    }
}
