//! Declaration checking.
//!
//! Declarations introduce the named types and callable entities the rest
//! of the program refers to. Each declaration kind computes its type,
//! validates the kind-specific well-formedness rules (field whitelists,
//! parameter directions, abstract-method overrides), and records the
//! result under the declaration's node id — which is also the identity
//! of the named type it introduces.

use crate::check::{ContextFrame, TypeInference};
use crate::types::display::short;
use crate::types::ty::{
    ActionEnumType, ActionType, ContainerType, EnumType, ExternMethod, ExternType, Field,
    MethodType, Param, StructType, TableType, Ty, TypeVar,
};
use conduit_mem::Symbol;
use conduit_syntax::ast::decl::{ActionListElement, KeyElement, StructField};
use conduit_syntax::ast::{Decl, DeclKind, Expr, ExprKind};
use conduit_syntax::{Direction, Span};
use std::rc::Rc;

impl TypeInference<'_> {
    /// Checks a declaration, returning the possibly-rewritten node.
    pub(crate) fn infer_decl(&mut self, decl: &Rc<Decl>) -> Rc<Decl> {
        if self.done(decl.id) {
            return Rc::clone(decl);
        }
        conduit_log::trace!("visiting declaration {}", decl.id);
        match &decl.kind {
            DeclKind::Constant {
                name,
                ty,
                initializer,
            } => self.check_constant_decl(decl, *name, &Rc::clone(ty), &Rc::clone(initializer)),
            DeclKind::Variable {
                name,
                ty,
                initializer,
            } => self.check_variable_decl(decl, *name, &Rc::clone(ty), initializer.clone()),
            DeclKind::Instance { .. } => self.check_instance(decl),
            DeclKind::Param { .. } => self.check_param(decl),
            DeclKind::TypeParam { name } => {
                let v = self.type_map.fresh_var(Some(*name));
                self.set_type(decl.id, Rc::new(Ty::TypeOf(Rc::new(Ty::Var(v)))));
                Rc::clone(decl)
            }
            DeclKind::Struct { name, fields } => {
                self.check_struct_like(decl, *name, fields, StructLikeKind::Struct)
            }
            DeclKind::Header { name, fields } => {
                self.check_struct_like(decl, *name, fields, StructLikeKind::Header)
            }
            DeclKind::Union { name, fields } => {
                self.check_struct_like(decl, *name, fields, StructLikeKind::Union)
            }
            DeclKind::Enum { name, members } => {
                let member_names: Vec<Symbol> =
                    members.iter().filter_map(|m| m.name()).collect();
                let ty = Rc::new(Ty::Enum(Rc::new(EnumType {
                    def: decl.id,
                    name: *name,
                    members: member_names,
                })));
                for member in members {
                    self.set_type(member.id, Rc::clone(&ty));
                }
                self.set_type(decl.id, Rc::new(Ty::TypeOf(ty)));
                Rc::clone(decl)
            }
            DeclKind::Errors { members } => {
                for member in members {
                    self.set_type(member.id, Rc::new(Ty::Error));
                }
                self.set_type(decl.id, Rc::new(Ty::TypeOf(Rc::new(Ty::Error))));
                Rc::clone(decl)
            }
            DeclKind::MatchKinds { members } => {
                for member in members {
                    self.set_type(member.id, Rc::new(Ty::MatchKind));
                }
                self.set_type(decl.id, Rc::new(Ty::TypeOf(Rc::new(Ty::MatchKind))));
                Rc::clone(decl)
            }
            DeclKind::Member { .. } => Rc::clone(decl),
            DeclKind::Typedef { ty, .. } => {
                if let Some(t) = self.infer_ast_type(&Rc::clone(ty)) {
                    self.set_type(decl.id, Rc::new(Ty::TypeOf(t)));
                }
                Rc::clone(decl)
            }
            DeclKind::Method {
                type_params,
                return_type,
                params,
                ..
            } => {
                let Some(mt) =
                    self.method_type_of(&type_params.clone(), return_type.clone(), &params.clone())
                else {
                    return Rc::clone(decl);
                };
                let ty = Rc::new(Ty::Method(mt));
                if let Some(canon) = self.canonicalize(decl.span, &ty) {
                    self.set_type(decl.id, canon);
                }
                Rc::clone(decl)
            }
            DeclKind::Extern {
                name,
                type_params,
                methods,
            } => self.check_extern(decl, *name, &type_params.clone(), &methods.clone()),
            DeclKind::ParserType {
                name,
                type_params,
                apply_params,
            } => self.check_container_type(
                decl,
                *name,
                &type_params.clone(),
                &apply_params.clone(),
                ContainerKind::Parser,
            ),
            DeclKind::ControlType {
                name,
                type_params,
                apply_params,
            } => self.check_container_type(
                decl,
                *name,
                &type_params.clone(),
                &apply_params.clone(),
                ContainerKind::Control,
            ),
            DeclKind::Package {
                name,
                type_params,
                ctor_params,
            } => self.check_package(decl, *name, &type_params.clone(), &ctor_params.clone()),
            DeclKind::Parser { .. } => self.check_parser(decl),
            DeclKind::Control { .. } => self.check_control(decl),
            DeclKind::State { .. } => self.check_state(decl),
            DeclKind::Function { .. } => self.check_function(decl),
            DeclKind::Action { .. } => self.check_action(decl),
            DeclKind::Table { .. } => self.check_table(decl),
        }
    }

    fn finalize_decl(&mut self, old: &Rc<Decl>, changed: bool, kind: DeclKind) -> Rc<Decl> {
        if !changed {
            return Rc::clone(old);
        }
        self.mark_rewrite();
        let node = Rc::new(Decl {
            id: self.ids.next(),
            span: old.span,
            kind,
        });
        self.type_map.copy_entry(old.id, node.id);
        node
    }

    // ----- simple declarations -----

    fn check_constant_decl(
        &mut self,
        decl: &Rc<Decl>,
        name: Symbol,
        ty: &Rc<conduit_syntax::ast::AstType>,
        initializer: &Rc<Expr>,
    ) -> Rc<Decl> {
        let Some(declared) = self.infer_ast_type(ty) else {
            return Rc::clone(decl);
        };
        if matches!(&**declared.substituted(), Ty::Extern(_)) {
            self.type_error(decl.span, "cannot declare constants of extern types");
            return Rc::clone(decl);
        }
        let init = self.infer_expr(initializer);
        if !self.type_map.is_compile_time_constant(init.id) {
            self.type_error(
                init.span,
                "cannot evaluate initializer to a compile-time constant",
            );
        }
        let coerced = self.assignment(decl.span, &declared, &init);
        self.set_type(decl.id, declared);
        let changed = !Rc::ptr_eq(&coerced, initializer);
        self.finalize_decl(
            decl,
            changed,
            DeclKind::Constant {
                name,
                ty: Rc::clone(ty),
                initializer: coerced,
            },
        )
    }

    fn check_variable_decl(
        &mut self,
        decl: &Rc<Decl>,
        name: Symbol,
        ty: &Rc<conduit_syntax::ast::AstType>,
        initializer: Option<Rc<Expr>>,
    ) -> Rc<Decl> {
        let Some(declared) = self.infer_ast_type(ty) else {
            return Rc::clone(decl);
        };
        if declared.is_generic() {
            self.type_error(
                decl.span,
                format!("unspecified type parameters for {}", self.name_of(name)),
            );
            return Rc::clone(decl);
        }
        let new_init = initializer.as_ref().map(|init| {
            let visited = self.infer_expr(init);
            self.assignment(decl.span, &declared, &visited)
        });
        self.set_type(decl.id, declared);
        let changed = match (&new_init, &initializer) {
            (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
            _ => false,
        };
        self.finalize_decl(
            decl,
            changed,
            DeclKind::Variable {
                name,
                ty: Rc::clone(ty),
                initializer: new_init,
            },
        )
    }

    fn check_param(&mut self, decl: &Rc<Decl>) -> Rc<Decl> {
        let DeclKind::Param {
            name,
            direction,
            ty,
            default,
        } = &decl.kind
        else {
            unreachable!();
        };
        let Some(declared) = self.infer_ast_type(&Rc::clone(ty)) else {
            return Rc::clone(decl);
        };
        if declared.is_generic() {
            self.type_error(
                decl.span,
                format!("type parameters needed for {}", self.name_of(*name)),
            );
            return Rc::clone(decl);
        }
        let new_default = default.as_ref().map(|d| {
            let visited = self.infer_expr(d);
            if !self.type_map.is_compile_time_constant(visited.id) {
                self.type_error(d.span, "default values must be compile-time constants");
            }
            self.assignment(decl.span, &declared, &visited)
        });
        self.set_type(decl.id, declared);
        let changed = match (&new_default, default) {
            (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
            _ => false,
        };
        self.finalize_decl(
            decl,
            changed,
            DeclKind::Param {
                name: *name,
                direction: *direction,
                ty: Rc::clone(ty),
                default: new_default,
            },
        )
    }

    // ----- struct-like types -----

    fn check_struct_like(
        &mut self,
        decl: &Rc<Decl>,
        name: Symbol,
        fields: &[StructField],
        kind: StructLikeKind,
    ) -> Rc<Decl> {
        let mut field_tys = Vec::with_capacity(fields.len());
        for field in fields {
            let Some(ft) = self.infer_ast_type(&field.ty) else {
                return Rc::clone(decl);
            };
            self.set_type(field.id, Rc::clone(&ft));
            field_tys.push(Field {
                name: field.name,
                ty: ft,
            });
        }
        let data = Rc::new(StructType {
            def: decl.id,
            name,
            fields: field_tys,
        });
        let ty = Rc::new(match kind {
            StructLikeKind::Struct => Ty::Struct(data),
            StructLikeKind::Header => Ty::Header(data),
            StructLikeKind::Union => Ty::Union(data),
        });
        let Some(canon) = self.canonicalize(decl.span, &ty) else {
            return Rc::clone(decl);
        };

        let (Ty::Struct(s) | Ty::Header(s) | Ty::Union(s)) = &*canon else {
            unreachable!();
        };
        for field in &s.fields {
            let ft = field.ty.substituted();
            if !kind.allows_field(ft) {
                self.type_error(
                    decl.span,
                    format!(
                        "field {} of {} cannot have type {}",
                        self.name_of(field.name),
                        self.name_of(name),
                        short(ft)
                    ),
                );
            }
        }

        self.set_type(decl.id, Rc::new(Ty::TypeOf(canon)));
        Rc::clone(decl)
    }

    // ----- methods, externs, containers -----

    /// Builds a method type from its syntactic parts: type parameters
    /// become fresh unification variables, parameters and the return
    /// type are resolved through the type map.
    fn method_type_of(
        &mut self,
        type_params: &[Rc<Decl>],
        return_type: Option<Rc<conduit_syntax::ast::AstType>>,
        params: &[Rc<Decl>],
    ) -> Option<Rc<MethodType>> {
        let tvs = self.visit_type_params(type_params)?;
        let ret = match return_type {
            Some(ast) => Some(self.infer_ast_type(&ast)?),
            None => None,
        };
        let ps = self.visit_params(params)?;
        Some(Rc::new(MethodType {
            type_params: tvs,
            return_type: ret,
            params: ps,
        }))
    }

    fn visit_type_params(&mut self, type_params: &[Rc<Decl>]) -> Option<Vec<TypeVar>> {
        let mut tvs = Vec::with_capacity(type_params.len());
        for tp in type_params {
            self.infer_decl(tp);
            let var_ty = self.get_type_type(tp.id, tp.span)?;
            let Ty::Var(v) = &*var_ty else {
                panic!("BUG: type parameter bound to {}", short(&var_ty));
            };
            tvs.push(*v);
        }
        Some(tvs)
    }

    fn visit_params(&mut self, params: &[Rc<Decl>]) -> Option<Vec<Param>> {
        let mut ps = Vec::with_capacity(params.len());
        for param in params {
            self.infer_decl(param);
            let (name, direction, _) = param.as_param()?;
            let ty = self.get_type_opt(param.id)?;
            ps.push(Param {
                name,
                direction,
                ty,
            });
        }
        Some(ps)
    }

    fn check_extern(
        &mut self,
        decl: &Rc<Decl>,
        name: Symbol,
        type_params: &[Rc<Decl>],
        methods: &[Rc<Decl>],
    ) -> Rc<Decl> {
        let Some(tvs) = self.visit_type_params(type_params) else {
            return Rc::clone(decl);
        };
        let mut extern_methods = Vec::with_capacity(methods.len());
        for method in methods {
            self.infer_decl(method);
            let Some(method_ty) = self.get_type_opt(method.id) else {
                return Rc::clone(decl);
            };
            let Ty::Method(mt) = &*method_ty else {
                panic!("BUG: extern method with type {}", short(&method_ty));
            };
            let is_abstract = matches!(
                &method.kind,
                DeclKind::Method {
                    is_abstract: true,
                    ..
                }
            );
            extern_methods.push(ExternMethod {
                name: method.name().expect("methods are named"),
                ty: Rc::clone(mt),
                is_abstract,
            });
        }
        let ty = Rc::new(Ty::Extern(Rc::new(ExternType {
            def: decl.id,
            name,
            type_params: tvs,
            methods: extern_methods,
        })));
        if let Some(canon) = self.canonicalize(decl.span, &ty) {
            self.set_type(decl.id, Rc::new(Ty::TypeOf(canon)));
        }
        Rc::clone(decl)
    }

    fn check_container_type(
        &mut self,
        decl: &Rc<Decl>,
        name: Symbol,
        type_params: &[Rc<Decl>],
        apply_params: &[Rc<Decl>],
        kind: ContainerKind,
    ) -> Rc<Decl> {
        let Some(tvs) = self.visit_type_params(type_params) else {
            return Rc::clone(decl);
        };
        let Some(params) = self.visit_params(apply_params) else {
            return Rc::clone(decl);
        };
        let container = Rc::new(ContainerType {
            def: decl.id,
            name,
            type_params: tvs,
            apply_params: params,
            ctor_params: None,
        });
        let ty = Rc::new(match kind {
            ContainerKind::Parser => Ty::Parser(container),
            ContainerKind::Control => Ty::Control(container),
        });
        if let Some(canon) = self.canonicalize(decl.span, &ty) {
            self.set_type(decl.id, Rc::new(Ty::TypeOf(canon)));
        }
        Rc::clone(decl)
    }

    fn check_package(
        &mut self,
        decl: &Rc<Decl>,
        name: Symbol,
        type_params: &[Rc<Decl>],
        ctor_params: &[Rc<Decl>],
    ) -> Rc<Decl> {
        let Some(tvs) = self.visit_type_params(type_params) else {
            return Rc::clone(decl);
        };
        let Some(params) = self.visit_params(ctor_params) else {
            return Rc::clone(decl);
        };
        // Package parameters may have container *types*, but not
        // instantiated parser or control implementations.
        for p in &params {
            if let Ty::Parser(c) | Ty::Control(c) = &**p.ty.substituted() {
                if c.ctor_params.is_some() {
                    self.type_error(
                        decl.span,
                        format!("invalid package parameter type for {}", self.name_of(p.name)),
                    );
                }
            }
        }
        let container = Rc::new(ContainerType {
            def: decl.id,
            name,
            type_params: tvs,
            apply_params: Vec::new(),
            ctor_params: Some(params),
        });
        let ty = Rc::new(Ty::Package(container));
        if let Some(canon) = self.canonicalize(decl.span, &ty) {
            self.set_type(decl.id, Rc::new(Ty::TypeOf(canon)));
        }
        Rc::clone(decl)
    }

    // ----- parser and control implementations -----

    fn check_parser(&mut self, decl: &Rc<Decl>) -> Rc<Decl> {
        let DeclKind::Parser {
            name,
            type_params,
            apply_params,
            ctor_params,
            locals,
            states,
        } = &decl.kind
        else {
            unreachable!();
        };
        let (name, type_params, apply_params, ctor_params, locals, states) = (
            *name,
            type_params.clone(),
            apply_params.clone(),
            ctor_params.clone(),
            locals.clone(),
            states.clone(),
        );

        let Some(container) =
            self.container_of(decl, name, &type_params, &apply_params, Some(&ctor_params))
        else {
            return Rc::clone(decl);
        };
        let ty = Rc::new(Ty::Parser(container));
        let Some(canon) = self.canonicalize(decl.span, &ty) else {
            return Rc::clone(decl);
        };
        self.set_type(decl.id, Rc::new(Ty::TypeOf(canon)));

        self.push_context(ContextFrame::Parser(decl.id));
        let (new_locals, locals_changed) = self.visit_decls(&locals);
        let (new_states, states_changed) = self.visit_decls(&states);
        self.pop_context();

        self.finalize_decl(
            decl,
            locals_changed || states_changed,
            DeclKind::Parser {
                name,
                type_params,
                apply_params,
                ctor_params,
                locals: new_locals,
                states: new_states,
            },
        )
    }

    fn check_control(&mut self, decl: &Rc<Decl>) -> Rc<Decl> {
        let DeclKind::Control {
            name,
            type_params,
            apply_params,
            ctor_params,
            locals,
            body,
        } = &decl.kind
        else {
            unreachable!();
        };
        let (name, type_params, apply_params, ctor_params, locals, body) = (
            *name,
            type_params.clone(),
            apply_params.clone(),
            ctor_params.clone(),
            locals.clone(),
            Rc::clone(body),
        );

        let Some(container) =
            self.container_of(decl, name, &type_params, &apply_params, Some(&ctor_params))
        else {
            return Rc::clone(decl);
        };
        let ty = Rc::new(Ty::Control(container));
        let Some(canon) = self.canonicalize(decl.span, &ty) else {
            return Rc::clone(decl);
        };
        self.set_type(decl.id, Rc::new(Ty::TypeOf(canon)));

        self.push_context(ContextFrame::Control(decl.id));
        let (new_locals, locals_changed) = self.visit_decls(&locals);
        let new_body = self.infer_stmt(&body);
        self.pop_context();

        let body_changed = !Rc::ptr_eq(&new_body, &body);
        self.finalize_decl(
            decl,
            locals_changed || body_changed,
            DeclKind::Control {
                name,
                type_params,
                apply_params,
                ctor_params,
                locals: new_locals,
                body: new_body,
            },
        )
    }

    fn container_of(
        &mut self,
        decl: &Rc<Decl>,
        name: Symbol,
        type_params: &[Rc<Decl>],
        apply_params: &[Rc<Decl>],
        ctor_params: Option<&Vec<Rc<Decl>>>,
    ) -> Option<Rc<ContainerType>> {
        let tvs = self.visit_type_params(type_params)?;
        let aps = self.visit_params(apply_params)?;
        let cps = match ctor_params {
            Some(decls) => Some(self.visit_params(decls)?),
            None => None,
        };
        Some(Rc::new(ContainerType {
            def: decl.id,
            name,
            type_params: tvs,
            apply_params: aps,
            ctor_params: cps,
        }))
    }

    fn visit_decls(&mut self, decls: &[Rc<Decl>]) -> (Vec<Rc<Decl>>, bool) {
        let mut changed = false;
        let new: Vec<_> = decls
            .iter()
            .map(|d| {
                let n = self.infer_decl(d);
                changed |= !Rc::ptr_eq(&n, d);
                n
            })
            .collect();
        (new, changed)
    }

    fn check_state(&mut self, decl: &Rc<Decl>) -> Rc<Decl> {
        let DeclKind::State {
            name,
            body,
            transition,
        } = &decl.kind
        else {
            unreachable!();
        };
        let (name, body, transition) = (*name, body.clone(), transition.clone());

        self.set_type(decl.id, Rc::new(Ty::State));

        let mut changed = false;
        let new_body: Vec<_> = body
            .iter()
            .map(|s| {
                let n = self.infer_stmt(s);
                changed |= !Rc::ptr_eq(&n, s);
                n
            })
            .collect();
        let new_transition = transition.as_ref().map(|t| {
            let n = self.infer_expr(t);
            changed |= !Rc::ptr_eq(&n, t);
            if let Some(ty) = self.get_type_opt(n.id) {
                if !matches!(&*ty, Ty::State) {
                    self.type_error(t.span, "transition must go to a state");
                }
            }
            n
        });

        self.finalize_decl(
            decl,
            changed,
            DeclKind::State {
                name,
                body: new_body,
                transition: new_transition,
            },
        )
    }

    // ----- functions, actions, tables -----

    fn check_function(&mut self, decl: &Rc<Decl>) -> Rc<Decl> {
        let DeclKind::Function {
            name,
            type_params,
            return_type,
            params,
            body,
        } = &decl.kind
        else {
            unreachable!();
        };
        let (name, type_params, return_type, params, body) = (
            *name,
            type_params.clone(),
            return_type.clone(),
            params.clone(),
            Rc::clone(body),
        );

        let Some(mt) = self.method_type_of(&type_params, return_type.clone(), &params) else {
            return Rc::clone(decl);
        };
        // A function without a return annotation returns void.
        let mt = if mt.return_type.is_none() {
            Rc::new(MethodType {
                type_params: mt.type_params.clone(),
                return_type: Some(Rc::new(Ty::Void)),
                params: mt.params.clone(),
            })
        } else {
            mt
        };
        self.set_type(decl.id, Rc::new(Ty::Method(mt)));

        self.push_context(ContextFrame::Function(decl.id));
        let new_body = self.infer_stmt(&body);
        self.pop_context();

        let changed = !Rc::ptr_eq(&new_body, &body);
        self.finalize_decl(
            decl,
            changed,
            DeclKind::Function {
                name,
                type_params,
                return_type,
                params,
                body: new_body,
            },
        )
    }

    fn check_action(&mut self, decl: &Rc<Decl>) -> Rc<Decl> {
        let DeclKind::Action { name, params, body } = &decl.kind else {
            unreachable!();
        };
        let (name, params, body) = (*name, params.clone(), Rc::clone(body));

        let Some(ps) = self.visit_params(&params) else {
            return Rc::clone(decl);
        };
        let mut found_directionless = false;
        for p in &ps {
            if matches!(&**p.ty.substituted(), Ty::Extern(_)) {
                self.type_error(decl.span, "action parameters cannot have extern types");
            }
            if p.direction == Direction::None {
                found_directionless = true;
            } else if found_directionless {
                self.type_error(
                    decl.span,
                    format!(
                        "direction-less action parameters have to be at the end; {} is not",
                        self.name_of(p.name)
                    ),
                );
            }
        }
        self.set_type(
            decl.id,
            Rc::new(Ty::Action(Rc::new(ActionType { params: ps }))),
        );

        self.push_context(ContextFrame::Action(decl.id));
        let new_body = self.infer_stmt(&body);
        self.pop_context();

        let changed = !Rc::ptr_eq(&new_body, &body);
        self.finalize_decl(
            decl,
            changed,
            DeclKind::Action {
                name,
                params,
                body: new_body,
            },
        )
    }

    fn check_table(&mut self, decl: &Rc<Decl>) -> Rc<Decl> {
        let DeclKind::Table {
            name,
            keys,
            actions,
            default_action,
        } = &decl.kind
        else {
            unreachable!();
        };
        let (name, keys, actions, default_action) = (
            *name,
            keys.clone(),
            actions.clone(),
            default_action.clone(),
        );

        let mut changed = false;

        // Keys: scalar expressions matched with a match kind.
        let mut new_keys = Vec::with_capacity(keys.len());
        for key in &keys {
            let expr = self.infer_expr(&key.expr);
            let match_kind = self.infer_expr(&key.match_kind);
            if let Some(key_ty) = self.get_type_opt(expr.id) {
                let scalar = matches!(
                    &**key_ty.substituted(),
                    Ty::Bits { .. } | Ty::Bool | Ty::Enum(_) | Ty::Error
                );
                if !scalar {
                    self.type_error(
                        key.expr.span,
                        format!(
                            "key field type must be a scalar type; it cannot be {}",
                            short(&key_ty)
                        ),
                    );
                }
            }
            if let Some(mk_ty) = self.get_type_opt(match_kind.id) {
                if !matches!(&*mk_ty, Ty::MatchKind) {
                    self.type_error(key.match_kind.span, "key match type must be a match_kind");
                }
            }
            changed |=
                !Rc::ptr_eq(&expr, &key.expr) || !Rc::ptr_eq(&match_kind, &key.match_kind);
            new_keys.push(KeyElement {
                id: key.id,
                span: key.span,
                expr,
                match_kind,
            });
        }

        // The actions list; partial application is legal here.
        self.push_context(ContextFrame::ActionsProperty);
        let mut new_actions = Vec::with_capacity(actions.len());
        let mut action_names = Vec::with_capacity(actions.len());
        for element in &actions {
            let expr = self.infer_expr(&element.expr);
            if let Some(ty) = self.get_type_opt(expr.id) {
                if !matches!(&*ty, Ty::Action(_)) {
                    self.type_error(element.span, "actions list entries must be actions");
                } else {
                    self.set_type(element.id, ty);
                }
            }
            if let Some(name) = self.action_ref_name(&expr) {
                action_names.push(name);
            }
            changed |= !Rc::ptr_eq(&expr, &element.expr);
            new_actions.push(ActionListElement {
                id: element.id,
                span: element.span,
                expr,
            });
        }
        self.pop_context();

        let action_enum = Rc::new(ActionEnumType {
            table: decl.id,
            members: action_names,
        });
        self.set_type(
            decl.id,
            Rc::new(Ty::Table(Rc::new(TableType {
                def: decl.id,
                name,
                action_enum,
            }))),
        );

        // The default action must be a fully-applied action that appears
        // in the actions list.
        let new_default = default_action.as_ref().map(|da| {
            let nda = self.infer_expr(da);
            changed |= !Rc::ptr_eq(&nda, da);
            self.check_default_action(decl.span, &nda, &new_actions);
            nda
        });

        self.finalize_decl(
            decl,
            changed,
            DeclKind::Table {
                name,
                keys: new_keys,
                actions: new_actions,
                default_action: new_default,
            },
        )
    }

    /// The declaration an actions-list entry (path or call) refers to.
    fn action_ref_decl(&self, expr: &Expr) -> Option<Rc<Decl>> {
        let path = match &expr.kind {
            ExprKind::PathRef(path) => path,
            ExprKind::Call { method, .. } => match &method.kind {
                ExprKind::PathRef(path) => path,
                _ => return None,
            },
            _ => return None,
        };
        self.ref_map.get_declaration(path.id).cloned()
    }

    fn action_ref_name(&self, expr: &Expr) -> Option<Symbol> {
        self.action_ref_decl(expr).and_then(|d| d.name())
    }

    fn check_default_action(
        &mut self,
        span: Span,
        default: &Rc<Expr>,
        actions: &[ActionListElement],
    ) {
        let Some(ty) = self.get_type_opt(default.id) else {
            return;
        };
        let Ty::Action(at) = &*ty else {
            self.type_error(span, "default_action table property should be an action");
            return;
        };
        if !at.params.is_empty() {
            self.type_error(span, "default action has some unbound arguments");
        }

        let Some(default_decl) = self.action_ref_decl(default) else {
            self.type_error(span, "default_action table property should be an action");
            return;
        };
        let listed = actions
            .iter()
            .find(|e| {
                self.action_ref_decl(&e.expr)
                    .is_some_and(|d| Rc::ptr_eq(&d, &default_decl))
            })
            .cloned();
        let Some(entry) = listed else {
            self.type_error(span, "default action not present in the actions list");
            return;
        };

        // The default action cannot drop arguments the actions-list
        // entry already binds.
        let list_args = match &entry.expr.kind {
            ExprKind::Call { args, .. } => args.len(),
            _ => 0,
        };
        let default_args = match &default.kind {
            ExprKind::Call { args, .. } => args.len(),
            _ => 0,
        };
        if list_args > default_args {
            self.type_error(span, "not enough arguments for the default action");
        }
    }

    // ----- instances -----

    fn check_instance(&mut self, decl: &Rc<Decl>) -> Rc<Decl> {
        let DeclKind::Instance {
            name,
            ty,
            args,
            initializer,
        } = &decl.kind
        else {
            unreachable!();
        };
        let (name, ty, args, initializer) =
            (*name, Rc::clone(ty), args.clone(), initializer.clone());

        let Some(declared) = self.infer_ast_type(&ty) else {
            return Rc::clone(decl);
        };
        let mut nargs: Vec<_> = args.iter().map(|a| self.infer_expr(a)).collect();
        let simple = Rc::clone(declared.substituted());

        let mut new_initializer = initializer.clone();
        match &*simple {
            Ty::Extern(ext) => {
                let ext = Rc::clone(ext);
                self.set_type(decl.id, Rc::clone(&declared));

                // Abstract-method overrides are checked against the
                // instance, so the instance type must be known first.
                if let Some(init) = &initializer {
                    self.push_context(ContextFrame::Instance(decl.id));
                    let (visited, _) = self.visit_decls(init);
                    self.pop_context();
                    new_initializer = Some(visited);
                }
                let overrides_ok =
                    self.check_abstract_methods(decl.span, &ext, new_initializer.as_deref());
                if overrides_ok {
                    if let Some(new_args) = self.check_extern_constructor(decl.span, &ext, &nargs)
                    {
                        nargs = new_args;
                    }
                }
            }
            Ty::Parser(c) | Ty::Control(c) | Ty::Package(c) if c.ctor_params.is_some() => {
                let c = Rc::clone(c);
                if initializer.is_some() {
                    self.type_error(
                        decl.span,
                        "initializers only allowed for extern instances",
                    );
                }
                match self.container_instantiation(decl.span, &simple, &c, &nargs) {
                    Some((cont_ty, new_args)) => {
                        nargs = new_args;
                        let final_ty = match &*declared {
                            Ty::SpecializedCanonical { base, args, .. } => {
                                Rc::new(Ty::SpecializedCanonical {
                                    base: Rc::clone(base),
                                    args: args.clone(),
                                    substituted: cont_ty,
                                })
                            }
                            _ => cont_ty,
                        };
                        self.set_type(decl.id, final_ty);
                    }
                    None => return Rc::clone(decl),
                }
            }
            other => {
                self.type_error(
                    decl.span,
                    format!("cannot allocate objects of type {}", short(other)),
                );
                return Rc::clone(decl);
            }
        }

        let changed = nargs.iter().zip(&args).any(|(a, b)| !Rc::ptr_eq(a, b))
            || match (&new_initializer, &initializer) {
                (Some(a), Some(b)) => {
                    a.len() != b.len() || a.iter().zip(b).any(|(x, y)| !Rc::ptr_eq(x, y))
                }
                _ => false,
            };
        self.finalize_decl(
            decl,
            changed,
            DeclKind::Instance {
                name,
                ty,
                args: nargs,
                initializer: new_initializer,
            },
        )
    }

    /// Every abstract method of the extern must be overridden exactly
    /// once by a non-generic function with an identical signature; an
    /// initializer block on an extern without abstract methods is an
    /// error.
    fn check_abstract_methods(
        &mut self,
        span: Span,
        ext: &Rc<ExternType>,
        initializer: Option<&[Rc<Decl>]>,
    ) -> bool {
        let mut pending: Vec<&ExternMethod> = ext.abstract_methods().collect();
        match (pending.is_empty(), initializer) {
            (true, None) => return true,
            (true, Some(_)) => {
                self.type_error(
                    span,
                    "instance initializers are only allowed for externs with abstract methods",
                );
                return false;
            }
            (false, None) => {
                self.type_error(
                    span,
                    format!(
                        "must declare abstract methods for {}",
                        self.name_of(ext.name)
                    ),
                );
                return false;
            }
            (false, Some(_)) => {}
        }

        for item in initializer.unwrap_or(&[]) {
            let DeclKind::Function {
                name, type_params, ..
            } = &item.kind
            else {
                continue;
            };
            if !type_params.is_empty() {
                self.type_error(
                    item.span,
                    "abstract method implementations cannot be generic",
                );
                return false;
            }
            let Some(override_ty) = self.get_type_opt(item.id) else {
                return false;
            };
            let Some(position) = pending.iter().position(|m| m.name == *name) else {
                self.type_error(
                    item.span,
                    format!(
                        "no matching abstract method for {} in {}",
                        self.name_of(*name),
                        self.name_of(ext.name)
                    ),
                );
                return false;
            };
            let declared = Rc::new(Ty::Method(Rc::clone(&pending[position].ty)));
            pending.remove(position);
            let Some(tvs) = self.unify(item.span, &declared, &override_ty, true) else {
                return false;
            };
            assert!(
                tvs.is_identity(),
                "BUG: abstract override unification produced bindings"
            );
        }

        if let Some(missing) = pending.first() {
            self.type_error(
                span,
                format!(
                    "abstract method {} not implemented",
                    self.name_of(missing.name)
                ),
            );
            return false;
        }
        true
    }
}

/// Which struct-like kind is being checked, with its field whitelist.
#[derive(Clone, Copy)]
enum StructLikeKind {
    Struct,
    Header,
    Union,
}

impl StructLikeKind {
    fn allows_field(self, ty: &Ty) -> bool {
        match self {
            StructLikeKind::Header => matches!(ty, Ty::Bits { .. } | Ty::Varbits { .. }),
            StructLikeKind::Struct => matches!(
                ty,
                Ty::Bits { .. }
                    | Ty::Bool
                    | Ty::Struct(_)
                    | Ty::Header(_)
                    | Ty::Union(_)
                    | Ty::Enum(_)
                    | Ty::Error
                    | Ty::Stack { .. }
                    | Ty::ActionEnum(_)
                    | Ty::Tuple(_)
            ),
            StructLikeKind::Union => matches!(ty, Ty::Header(_)),
        }
    }
}

#[derive(Clone, Copy)]
enum ContainerKind {
    Parser,
    Control,
}
