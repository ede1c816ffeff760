//! Type canonicalization.
//!
//! `canonicalize` folds structurally equivalent types to a single
//! representative: `Bits` and the structural composites (`Tuple`, `Set`,
//! `Stack`) are hash-consed through the type map, parameter lists are
//! canonicalized pointwise, and `Specialized` types expand to
//! `SpecializedCanonical` by binding the base's type parameters to the
//! arguments.
//!
//! Canonicalization is partial: a well-formedness violation reports a
//! diagnostic and yields `None`, and the caller leaves its result unset.

use crate::check::TypeInference;
use crate::context::TypeVarSubst;
use crate::error::TypeError;
use crate::types::display::short;
use crate::types::ty::{
    ContainerType, ExternMethod, ExternType, Field, MethodLookup, MethodType, Param, StructType,
    Ty, TyRef,
};
use conduit_syntax::{Direction, Span};
use std::rc::Rc;

impl TypeInference<'_> {
    /// Canonicalizes a type. Returns `None` after reporting on a type
    /// error.
    pub(crate) fn canonicalize(&mut self, span: Span, ty: &TyRef) -> Option<TyRef> {
        match &**ty {
            // Base singletons and already-canonical forms.
            Ty::InfInt { .. }
            | Ty::Bool
            | Ty::String
            | Ty::Void
            | Ty::State
            | Ty::MatchKind
            | Ty::Error
            | Ty::Dontcare
            | Ty::Varbits { .. }
            | Ty::Var(_)
            | Ty::Enum(_)
            | Ty::ActionEnum(_)
            | Ty::Table(_)
            | Ty::SpecializedCanonical { .. } => Some(Rc::clone(ty)),

            Ty::Bits { .. } => Some(self.type_map.get_canonical(ty)),

            Ty::Set(element) => {
                let canon = self.canonicalize(span, element)?;
                let set = if Rc::ptr_eq(&canon, element) {
                    Rc::clone(ty)
                } else {
                    Rc::new(Ty::Set(canon))
                };
                Some(self.type_map.get_canonical(&set))
            }

            Ty::Stack { element, size } => {
                let canon = self.canonicalize(span, element)?;
                let stack = if Rc::ptr_eq(&canon, element) {
                    Rc::clone(ty)
                } else {
                    Rc::new(Ty::Stack {
                        element: canon,
                        size: *size,
                    })
                };
                Some(self.type_map.get_canonical(&stack))
            }

            Ty::Tuple(components) => {
                // tuple<set<a>, b> = set<tuple<a, b>>
                let mut any_set = false;
                let mut fields = Vec::with_capacity(components.len());
                for component in components {
                    let unwrapped = match &**component {
                        Ty::Set(element) => {
                            any_set = true;
                            Rc::clone(element)
                        }
                        _ => Rc::clone(component),
                    };
                    fields.push(self.canonicalize(span, &unwrapped)?);
                }
                let tuple = self.type_map.get_canonical(&Rc::new(Ty::Tuple(fields)));
                if any_set {
                    Some(self.type_map.get_canonical(&Rc::new(Ty::Set(tuple))))
                } else {
                    Some(tuple)
                }
            }

            Ty::Struct(s) => self
                .canonicalize_fields(span, s)
                .map(|s| rebuild(ty, s, Ty::Struct)),
            Ty::Header(s) => self
                .canonicalize_fields(span, s)
                .map(|s| rebuild(ty, s, Ty::Header)),
            Ty::Union(s) => self
                .canonicalize_fields(span, s)
                .map(|s| rebuild(ty, s, Ty::Union)),

            Ty::Method(m) => {
                let canon = self.canonicalize_method(span, m)?;
                if !self.check_parameters(span, &canon.params, false) {
                    return None;
                }
                Some(match canon {
                    new if Rc::ptr_eq(&new, m) => Rc::clone(ty),
                    new => Rc::new(Ty::Method(new)),
                })
            }

            Ty::Action(a) => {
                let params = self.canonicalize_params(span, &a.params)?;
                Some(match params {
                    None => Rc::clone(ty),
                    Some(params) => Rc::new(Ty::Action(Rc::new(
                        crate::types::ty::ActionType { params },
                    ))),
                })
            }

            Ty::Extern(e) => self.canonicalize_extern(span, ty, e),

            Ty::Parser(c) => self.canonicalize_container(span, ty, c, Ty::Parser),
            Ty::Control(c) => self.canonicalize_container(span, ty, c, Ty::Control),
            Ty::Package(c) => self.canonicalize_container(span, ty, c, Ty::Package),

            Ty::Specialized { base, args } => self.canonicalize_specialized(span, base, args),

            Ty::TypeOf(_) | Ty::MethodCall(_) => {
                panic!("BUG: canonicalize does not accept {}", short(ty))
            }
        }
    }

    fn canonicalize_fields(&mut self, span: Span, s: &Rc<StructType>) -> Option<Rc<StructType>> {
        let mut changed = false;
        let mut fields = Vec::with_capacity(s.fields.len());
        for field in &s.fields {
            let canon = self.canonicalize(span, &field.ty)?;
            changed |= !Rc::ptr_eq(&canon, &field.ty);
            fields.push(Field {
                name: field.name,
                ty: canon,
            });
        }
        if changed {
            Some(Rc::new(StructType {
                def: s.def,
                name: s.name,
                fields,
            }))
        } else {
            Some(Rc::clone(s))
        }
    }

    /// Canonicalizes a parameter list; `None` on error, `Some(None)` when
    /// nothing changed.
    #[allow(clippy::option_option)]
    fn canonicalize_params(&mut self, span: Span, params: &[Param]) -> Option<Option<Vec<Param>>> {
        let mut changed = false;
        let mut result = Vec::with_capacity(params.len());
        for p in params {
            let canon = self.canonicalize(span, &p.ty)?;
            changed |= !Rc::ptr_eq(&canon, &p.ty);
            result.push(Param {
                name: p.name,
                direction: p.direction,
                ty: canon,
            });
        }
        Some(changed.then_some(result))
    }

    fn canonicalize_method(&mut self, span: Span, m: &Rc<MethodType>) -> Option<Rc<MethodType>> {
        let ret = match &m.return_type {
            Some(r) => Some(self.canonicalize(span, r)?),
            None => None,
        };
        let ret_changed = match (&ret, &m.return_type) {
            (Some(new), Some(old)) => !Rc::ptr_eq(new, old),
            _ => false,
        };
        let params = self.canonicalize_params(span, &m.params)?;
        if !ret_changed && params.is_none() {
            return Some(Rc::clone(m));
        }
        Some(Rc::new(MethodType {
            type_params: m.type_params.clone(),
            return_type: ret,
            params: params.unwrap_or_else(|| m.params.clone()),
        }))
    }

    /// Directional parameters cannot have extern types; when
    /// `forbid_containers` (container boundaries), parameters cannot have
    /// container types either.
    pub(crate) fn check_parameters(
        &mut self,
        span: Span,
        params: &[Param],
        forbid_containers: bool,
    ) -> bool {
        for p in params {
            let ty = p.ty.substituted();
            if p.direction != Direction::None && matches!(&**ty, Ty::Extern(_)) {
                self.type_error(
                    span,
                    format!(
                        "parameter {}: a parameter with an extern type cannot have a direction",
                        self.name_of(p.name)
                    ),
                );
                return false;
            }
            if forbid_containers && ty.is_container() {
                self.type_error(
                    span,
                    format!(
                        "parameter {} cannot have type {}",
                        self.name_of(p.name),
                        short(ty)
                    ),
                );
                return false;
            }
        }
        true
    }

    fn canonicalize_extern(
        &mut self,
        span: Span,
        ty: &TyRef,
        e: &Rc<ExternType>,
    ) -> Option<TyRef> {
        let mut changed = false;
        let mut methods = Vec::with_capacity(e.methods.len());
        for method in &e.methods {
            if method.name == e.name && !method.ty.type_params.is_empty() {
                self.type_error(span, "constructors cannot have type parameters");
                return None;
            }
            let canon = self.canonicalize_method(span, &method.ty)?;
            changed |= !Rc::ptr_eq(&canon, &method.ty);
            methods.push(ExternMethod {
                name: method.name,
                ty: canon,
                is_abstract: method.is_abstract,
            });
        }
        let result = if changed {
            Rc::new(Ty::Extern(Rc::new(ExternType {
                def: e.def,
                name: e.name,
                type_params: e.type_params.clone(),
                methods,
            })))
        } else {
            Rc::clone(ty)
        };
        // Every (name, arity) pair must resolve to exactly one method.
        if let Ty::Extern(canon) = &*result {
            for method in &canon.methods {
                if canon.lookup_method(method.name, method.ty.params.len()) == MethodLookup::Ambiguous
                {
                    self.type_error(
                        span,
                        format!(
                            "extern {} has duplicate methods named {} with {} parameters",
                            self.name_of(canon.name),
                            self.name_of(method.name),
                            method.ty.params.len()
                        ),
                    );
                    return None;
                }
            }
        }
        Some(result)
    }

    fn canonicalize_container(
        &mut self,
        span: Span,
        ty: &TyRef,
        c: &Rc<ContainerType>,
        make: fn(Rc<ContainerType>) -> Ty,
    ) -> Option<TyRef> {
        let apply_params = self.canonicalize_params(span, &c.apply_params)?;
        let ctor_params = match &c.ctor_params {
            Some(ps) => Some(self.canonicalize_params(span, ps)?),
            None => None,
        };
        // Parsers and controls may not take container-typed parameters;
        // packages exist to wire containers together, so theirs may.
        let forbid = !matches!(&**ty, Ty::Package(_));
        let check = apply_params.as_deref().unwrap_or(&c.apply_params);
        if !self.check_parameters(span, check, forbid) {
            return None;
        }
        let ctor_changed = matches!(&ctor_params, Some(Some(_)));
        if apply_params.is_none() && !ctor_changed {
            return Some(Rc::clone(ty));
        }
        Some(Rc::new(make(Rc::new(ContainerType {
            def: c.def,
            name: c.name,
            type_params: c.type_params.clone(),
            apply_params: apply_params.unwrap_or_else(|| c.apply_params.clone()),
            ctor_params: match (ctor_params, &c.ctor_params) {
                (Some(Some(new)), _) => Some(new),
                (_, old) => old.clone(),
            },
        }))))
    }

    fn canonicalize_specialized(
        &mut self,
        span: Span,
        base: &TyRef,
        args: &[TyRef],
    ) -> Option<TyRef> {
        let base_canon = self.canonicalize(span, base)?;

        let Some(type_params) = base_canon.type_params().map(<[_]>::to_vec) else {
            self.report(&TypeError::NotGeneric {
                found: Rc::clone(&base_canon),
                span,
            });
            return None;
        };
        if type_params.is_empty() {
            self.report(&TypeError::NotGeneric {
                found: Rc::clone(&base_canon),
                span,
            });
            return None;
        }
        if type_params.len() != args.len() {
            self.report(&TypeError::TypeArgArity {
                expected: type_params.len(),
                found: args.len(),
                span,
            });
            return None;
        }

        let mut canon_args = Vec::with_capacity(args.len());
        for arg in args {
            canon_args.push(self.canonicalize(span, arg)?);
        }

        let mut bindings = TypeVarSubst::new();
        if !bindings.set_bindings(&type_params, &canon_args) {
            panic!("BUG: specialization arity checked above");
        }
        conduit_log::debug!(
            "specializing {} with {} argument(s)",
            short(&base_canon),
            canon_args.len()
        );
        let substituted = bindings.apply(&base_canon);

        Some(Rc::new(Ty::SpecializedCanonical {
            base: base_canon,
            args: canon_args,
            substituted,
        }))
    }
}

fn rebuild(original: &TyRef, s: Rc<StructType>, make: fn(Rc<StructType>) -> Ty) -> TyRef {
    match &**original {
        Ty::Struct(old) | Ty::Header(old) | Ty::Union(old) if Rc::ptr_eq(old, &s) => {
            Rc::clone(original)
        }
        _ => Rc::new(make(s)),
    }
}
