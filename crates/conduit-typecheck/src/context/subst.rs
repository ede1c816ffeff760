//! Type-variable substitutions.
//!
//! A [`TypeVarSubst`] maps unification ids (of `Var`s and `InfInt`s) to
//! types. The solver produces one per constraint set; the type map
//! accumulates them all into the global substitution that makes every
//! inferred type ground at the end of the pass.
//!
//! [`TypeVarSubst::apply`] is the substitution-applying visitor over the
//! type algebra: it replaces every bound variable by its binding,
//! returning the input `Rc` untouched when nothing changed.

use crate::types::ty::{
    ActionType, ArgInfo, ContainerType, ExternMethod, ExternType, Field, MethodCallShape,
    MethodType, Param, StructType, Ty, TyRef, TypeVar,
};
use fxhash::FxHashMap;
use std::rc::Rc;

/// A substitution from unification ids to types.
#[derive(Debug, Clone, Default)]
pub struct TypeVarSubst {
    bindings: FxHashMap<u32, TyRef>,
}

impl TypeVarSubst {
    /// Creates the identity substitution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this substitution binds nothing.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if no variable is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Binds a variable. Returns `false` (and leaves the substitution
    /// unchanged) if the variable is already bound.
    pub fn bind(&mut self, id: u32, ty: TyRef) -> bool {
        if self.bindings.contains_key(&id) {
            return false;
        }
        self.bindings.insert(id, ty);
        true
    }

    /// Looks up the direct binding of a variable.
    #[must_use]
    pub fn lookup(&self, id: u32) -> Option<&TyRef> {
        self.bindings.get(&id)
    }

    /// Looks up a variable and resolves through the substitution, so the
    /// result contains no variable this substitution binds.
    #[must_use]
    pub fn resolve(&self, id: u32) -> Option<TyRef> {
        self.bindings.get(&id).map(|ty| self.apply(ty))
    }

    /// Binds each type parameter to the corresponding argument. Returns
    /// `false` if the lengths differ or any parameter is already bound.
    pub fn set_bindings(&mut self, params: &[TypeVar], args: &[TyRef]) -> bool {
        if params.len() != args.len() {
            return false;
        }
        for (param, arg) in params.iter().zip(args) {
            if !self.bind(param.id, Rc::clone(arg)) {
                return false;
            }
        }
        true
    }

    /// Composes `other` into this substitution: existing bindings are
    /// rewritten through `other`, then `other`'s bindings are added for
    /// ids not already bound.
    pub fn compose(&mut self, other: &TypeVarSubst) {
        if other.is_identity() {
            return;
        }
        for ty in self.bindings.values_mut() {
            *ty = other.apply(ty);
        }
        for (&id, ty) in &other.bindings {
            self.bindings.entry(id).or_insert_with(|| Rc::clone(ty));
        }
    }

    /// Applies the substitution to a type, replacing every bound `Var`
    /// and `InfInt` by its (recursively substituted) binding. Returns the
    /// same `Rc` when nothing changes.
    #[must_use]
    pub fn apply(&self, ty: &TyRef) -> TyRef {
        if self.bindings.is_empty() {
            return Rc::clone(ty);
        }
        self.apply_inner(ty)
    }

    fn apply_inner(&self, ty: &TyRef) -> TyRef {
        match &**ty {
            Ty::Var(v) => match self.bindings.get(&v.id) {
                Some(bound) => self.apply_inner(bound),
                None => Rc::clone(ty),
            },
            Ty::InfInt { id } => match self.bindings.get(id) {
                Some(bound) => self.apply_inner(bound),
                None => Rc::clone(ty),
            },
            Ty::TypeOf(inner) => {
                let new = self.apply_inner(inner);
                if Rc::ptr_eq(&new, inner) {
                    Rc::clone(ty)
                } else {
                    Rc::new(Ty::TypeOf(new))
                }
            }
            Ty::Set(inner) => {
                let new = self.apply_inner(inner);
                if Rc::ptr_eq(&new, inner) {
                    Rc::clone(ty)
                } else {
                    Rc::new(Ty::Set(new))
                }
            }
            Ty::Tuple(components) => match self.apply_vec(components) {
                Some(new) => Rc::new(Ty::Tuple(new)),
                None => Rc::clone(ty),
            },
            Ty::Stack { element, size } => {
                let new = self.apply_inner(element);
                if Rc::ptr_eq(&new, element) {
                    Rc::clone(ty)
                } else {
                    Rc::new(Ty::Stack {
                        element: new,
                        size: *size,
                    })
                }
            }
            Ty::Struct(s) => match self.apply_struct(s) {
                Some(new) => Rc::new(Ty::Struct(new)),
                None => Rc::clone(ty),
            },
            Ty::Header(s) => match self.apply_struct(s) {
                Some(new) => Rc::new(Ty::Header(new)),
                None => Rc::clone(ty),
            },
            Ty::Union(s) => match self.apply_struct(s) {
                Some(new) => Rc::new(Ty::Union(new)),
                None => Rc::clone(ty),
            },
            Ty::Method(m) => match self.apply_method(m) {
                Some(new) => Rc::new(Ty::Method(new)),
                None => Rc::clone(ty),
            },
            Ty::Action(a) => match self.apply_params(&a.params) {
                Some(params) => Rc::new(Ty::Action(Rc::new(ActionType { params }))),
                None => Rc::clone(ty),
            },
            Ty::Extern(e) => {
                let mut changed = false;
                let methods: Vec<ExternMethod> = e
                    .methods
                    .iter()
                    .map(|m| match self.apply_method(&m.ty) {
                        Some(new) => {
                            changed = true;
                            ExternMethod {
                                name: m.name,
                                ty: new,
                                is_abstract: m.is_abstract,
                            }
                        }
                        None => m.clone(),
                    })
                    .collect();
                if changed {
                    Rc::new(Ty::Extern(Rc::new(ExternType {
                        def: e.def,
                        name: e.name,
                        type_params: self.surviving_params(&e.type_params),
                        methods,
                    })))
                } else {
                    Rc::clone(ty)
                }
            }
            Ty::Parser(c) => match self.apply_container(c) {
                Some(new) => Rc::new(Ty::Parser(new)),
                None => Rc::clone(ty),
            },
            Ty::Control(c) => match self.apply_container(c) {
                Some(new) => Rc::new(Ty::Control(new)),
                None => Rc::clone(ty),
            },
            Ty::Package(c) => match self.apply_container(c) {
                Some(new) => Rc::new(Ty::Package(new)),
                None => Rc::clone(ty),
            },
            Ty::Specialized { base, args } => {
                let new_base = self.apply_inner(base);
                let new_args = self.apply_vec(args);
                if Rc::ptr_eq(&new_base, base) && new_args.is_none() {
                    Rc::clone(ty)
                } else {
                    Rc::new(Ty::Specialized {
                        base: new_base,
                        args: new_args.unwrap_or_else(|| args.clone()),
                    })
                }
            }
            Ty::SpecializedCanonical {
                base,
                args,
                substituted,
            } => {
                let new_base = self.apply_inner(base);
                let new_args = self.apply_vec(args);
                let new_subst = self.apply_inner(substituted);
                if Rc::ptr_eq(&new_base, base)
                    && new_args.is_none()
                    && Rc::ptr_eq(&new_subst, substituted)
                {
                    Rc::clone(ty)
                } else {
                    Rc::new(Ty::SpecializedCanonical {
                        base: new_base,
                        args: new_args.unwrap_or_else(|| args.clone()),
                        substituted: new_subst,
                    })
                }
            }
            Ty::MethodCall(call) => {
                let ret = self.apply_inner(&call.return_type);
                let type_args = self.apply_vec(&call.type_args);
                let mut args_changed = false;
                let args: Vec<ArgInfo> = call
                    .args
                    .iter()
                    .map(|a| {
                        let new = self.apply_inner(&a.ty);
                        if !Rc::ptr_eq(&new, &a.ty) {
                            args_changed = true;
                        }
                        ArgInfo {
                            ty: new,
                            is_left_value: a.is_left_value,
                            is_constant: a.is_constant,
                            span: a.span,
                        }
                    })
                    .collect();
                if Rc::ptr_eq(&ret, &call.return_type) && type_args.is_none() && !args_changed {
                    Rc::clone(ty)
                } else {
                    Rc::new(Ty::MethodCall(Rc::new(MethodCallShape {
                        type_args: type_args.unwrap_or_else(|| call.type_args.clone()),
                        return_type: ret,
                        args,
                    })))
                }
            }
            Ty::Bits { .. }
            | Ty::Bool
            | Ty::String
            | Ty::Void
            | Ty::State
            | Ty::MatchKind
            | Ty::Error
            | Ty::Dontcare
            | Ty::Varbits { .. }
            | Ty::Enum(_)
            | Ty::ActionEnum(_)
            | Ty::Table(_) => Rc::clone(ty),
        }
    }

    /// Applies to a vector; `None` means nothing changed.
    fn apply_vec(&self, types: &[TyRef]) -> Option<Vec<TyRef>> {
        let mut changed = false;
        let new: Vec<TyRef> = types
            .iter()
            .map(|t| {
                let applied = self.apply_inner(t);
                if !Rc::ptr_eq(&applied, t) {
                    changed = true;
                }
                applied
            })
            .collect();
        changed.then_some(new)
    }

    fn apply_params(&self, params: &[Param]) -> Option<Vec<Param>> {
        let mut changed = false;
        let new: Vec<Param> = params
            .iter()
            .map(|p| {
                let applied = self.apply_inner(&p.ty);
                if !Rc::ptr_eq(&applied, &p.ty) {
                    changed = true;
                }
                Param {
                    name: p.name,
                    direction: p.direction,
                    ty: applied,
                }
            })
            .collect();
        changed.then_some(new)
    }

    fn apply_struct(&self, s: &Rc<StructType>) -> Option<Rc<StructType>> {
        let mut changed = false;
        let fields: Vec<Field> = s
            .fields
            .iter()
            .map(|f| {
                let applied = self.apply_inner(&f.ty);
                if !Rc::ptr_eq(&applied, &f.ty) {
                    changed = true;
                }
                Field {
                    name: f.name,
                    ty: applied,
                }
            })
            .collect();
        changed.then(|| {
            Rc::new(StructType {
                def: s.def,
                name: s.name,
                fields,
            })
        })
    }

    fn apply_method(&self, m: &Rc<MethodType>) -> Option<Rc<MethodType>> {
        let ret = m.return_type.as_ref().map(|r| self.apply_inner(r));
        let ret_changed = match (&ret, &m.return_type) {
            (Some(new), Some(old)) => !Rc::ptr_eq(new, old),
            _ => false,
        };
        let params = self.apply_params(&m.params);
        if !ret_changed && params.is_none() {
            return None;
        }
        Some(Rc::new(MethodType {
            type_params: self.surviving_params(&m.type_params),
            return_type: ret,
            params: params.unwrap_or_else(|| m.params.clone()),
        }))
    }

    fn apply_container(&self, c: &Rc<ContainerType>) -> Option<Rc<ContainerType>> {
        let apply_params = self.apply_params(&c.apply_params);
        let ctor_params = match &c.ctor_params {
            Some(ps) => self.apply_params(ps).map(Some),
            None => None,
        };
        if apply_params.is_none() && ctor_params.is_none() {
            return None;
        }
        Some(Rc::new(ContainerType {
            def: c.def,
            name: c.name,
            type_params: self.surviving_params(&c.type_params),
            apply_params: apply_params.unwrap_or_else(|| c.apply_params.clone()),
            ctor_params: ctor_params.unwrap_or_else(|| c.ctor_params.clone()),
        }))
    }

    /// Type parameters that remain unbound under this substitution.
    fn surviving_params(&self, params: &[TypeVar]) -> Vec<TypeVar> {
        params
            .iter()
            .filter(|tp| !self.bindings.contains_key(&tp.id))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_mem::Symbol;
    use conduit_syntax::Direction;

    fn bits(width: u32) -> TyRef {
        Rc::new(Ty::Bits {
            width,
            signed: false,
        })
    }

    fn var(id: u32) -> TyRef {
        Rc::new(Ty::Var(TypeVar { id, name: None }))
    }

    #[test]
    fn test_identity() {
        let subst = TypeVarSubst::new();
        assert!(subst.is_identity());
        let ty = bits(8);
        assert!(Rc::ptr_eq(&subst.apply(&ty), &ty));
    }

    #[test]
    fn test_bind_and_apply() {
        let mut subst = TypeVarSubst::new();
        assert!(subst.bind(0, bits(8)));
        assert!(!subst.bind(0, bits(16)), "double bind must fail");
        assert_eq!(subst.apply(&var(0)).as_bits(), Some((8, false)));
    }

    #[test]
    fn test_apply_preserves_unchanged_rc() {
        let mut subst = TypeVarSubst::new();
        subst.bind(0, bits(8));
        let ty = Rc::new(Ty::Tuple(vec![bits(4), bits(2)]));
        assert!(Rc::ptr_eq(&subst.apply(&ty), &ty));
    }

    #[test]
    fn test_apply_nested() {
        let mut subst = TypeVarSubst::new();
        subst.bind(1, bits(8));
        let ty = Rc::new(Ty::Tuple(vec![var(1), Rc::new(Ty::Set(var(1)))]));
        let applied = subst.apply(&ty);
        match &*applied {
            Ty::Tuple(components) => {
                assert_eq!(components[0].as_bits(), Some((8, false)));
                match &*components[1] {
                    Ty::Set(inner) => assert_eq!(inner.as_bits(), Some((8, false))),
                    other => panic!("expected set, got {other:?}"),
                }
            }
            other => panic!("expected tuple, got {other:?}"),
        }
    }

    #[test]
    fn test_apply_chases_var_chains() {
        let mut subst = TypeVarSubst::new();
        subst.bind(0, var(1));
        subst.bind(1, bits(32));
        assert_eq!(subst.apply(&var(0)).as_bits(), Some((32, false)));
    }

    #[test]
    fn test_inf_int_binding() {
        let mut subst = TypeVarSubst::new();
        subst.bind(5, bits(8));
        let lit = Rc::new(Ty::InfInt { id: 5 });
        assert_eq!(subst.apply(&lit).as_bits(), Some((8, false)));
    }

    #[test]
    fn test_compose() {
        let mut a = TypeVarSubst::new();
        a.bind(0, var(1));
        let mut b = TypeVarSubst::new();
        b.bind(1, bits(8));
        a.compose(&b);
        assert_eq!(a.resolve(0).unwrap().as_bits(), Some((8, false)));
        assert_eq!(a.resolve(1).unwrap().as_bits(), Some((8, false)));
    }

    #[test]
    fn test_set_bindings() {
        let tparams = [
            TypeVar {
                id: 0,
                name: Some(Symbol::new(0)),
            },
            TypeVar {
                id: 1,
                name: Some(Symbol::new(1)),
            },
        ];
        let mut subst = TypeVarSubst::new();
        assert!(subst.set_bindings(&tparams, &[bits(8), bits(16)]));
        assert!(!subst.set_bindings(&tparams[..1], &[]), "length mismatch");
    }

    #[test]
    fn test_method_substitution_drops_bound_params() {
        let tv = TypeVar {
            id: 7,
            name: Some(Symbol::new(0)),
        };
        let method = Rc::new(MethodType {
            type_params: vec![tv],
            return_type: Some(var(7)),
            params: vec![Param {
                name: Symbol::new(1),
                direction: Direction::In,
                ty: var(7),
            }],
        });
        let mut subst = TypeVarSubst::new();
        subst.bind(7, bits(8));
        let applied = subst.apply(&Rc::new(Ty::Method(method)));
        match &*applied {
            Ty::Method(m) => {
                assert!(m.type_params.is_empty());
                assert_eq!(m.return_type.as_ref().unwrap().as_bits(), Some((8, false)));
                assert_eq!(m.params[0].ty.as_bits(), Some((8, false)));
            }
            other => panic!("expected method, got {other:?}"),
        }
    }
}
