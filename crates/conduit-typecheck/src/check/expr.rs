//! Expression inference.
//!
//! One entry point per expression form, each following the same contract:
//! fetch child types from the type map, check local well-formedness,
//! synthesize the node's type, rewrite the node if a coercion or constant
//! re-widthing was needed, and record the result. A form whose check
//! fails leaves its result type unset; the parent short-circuits.

use crate::check::TypeInference;
use crate::context::TypeMap;
use crate::infer::ConstraintSet;
use crate::types::display::short;
use crate::types::ty::{
    ActionType, ArgInfo, MethodCallShape, MethodLookup, MethodType, Param, Ty, TyRef,
};
use conduit_mem::Symbol;
use conduit_syntax::ast::expr::{BinaryOp, SelectCase, UnaryOp};
use conduit_syntax::ast::{DeclKind, Expr, ExprKind, Path};
use conduit_syntax::Direction;
use std::rc::Rc;

impl TypeInference<'_> {
    /// Infers an expression bottom-up, returning the possibly-rewritten
    /// node.
    pub(crate) fn infer_expr(&mut self, expr: &Rc<Expr>) -> Rc<Expr> {
        if self.done(expr.id) {
            return Rc::clone(expr);
        }
        conduit_log::trace!("visiting expression {}", expr.id);
        match &expr.kind {
            ExprKind::Constant { width, .. } => {
                let ty = match width {
                    Some((w, s)) => self.type_map.bits(*w, *s),
                    None => self.type_map.fresh_inf_int(),
                };
                self.set_type(expr.id, ty);
                self.type_map.set_compile_time_constant(expr.id);
                Rc::clone(expr)
            }
            ExprKind::Bool(_) => {
                self.set_type(expr.id, Rc::new(Ty::Bool));
                self.type_map.set_compile_time_constant(expr.id);
                Rc::clone(expr)
            }
            ExprKind::StringLit(_) => {
                self.set_type(expr.id, Rc::new(Ty::String));
                Rc::clone(expr)
            }
            ExprKind::Default => {
                self.set_type(expr.id, Rc::new(Ty::Dontcare));
                self.type_map.set_compile_time_constant(expr.id);
                Rc::clone(expr)
            }
            ExprKind::PathRef(path) => self.check_path(expr, &Rc::clone(path)),
            ExprKind::Member { base, member } => {
                self.check_member(expr, &Rc::clone(base), *member)
            }
            ExprKind::Index { base, index } => {
                self.check_index(expr, &Rc::clone(base), &Rc::clone(index))
            }
            ExprKind::Slice { base, msb, lsb } => {
                self.check_slice(expr, &Rc::clone(base), &Rc::clone(msb), &Rc::clone(lsb))
            }
            ExprKind::Cast { target, expr: inner } => {
                self.check_cast(expr, &Rc::clone(target), &Rc::clone(inner))
            }
            ExprKind::Unary { op, expr: inner } => self.check_unary(expr, *op, &Rc::clone(inner)),
            ExprKind::Binary { op, left, right } => {
                self.check_binary(expr, *op, &Rc::clone(left), &Rc::clone(right))
            }
            ExprKind::Mux {
                cond,
                then_expr,
                else_expr,
            } => self.check_mux(
                expr,
                &Rc::clone(cond),
                &Rc::clone(then_expr),
                &Rc::clone(else_expr),
            ),
            ExprKind::List { components } => self.check_list(expr, &components.clone()),
            ExprKind::Call {
                method,
                type_args,
                args,
            } => self.check_call(expr, &Rc::clone(method), &type_args.clone(), &args.clone()),
            ExprKind::ConstructorCall { ty, args } => {
                self.check_constructor_call(expr, &Rc::clone(ty), &args.clone())
            }
            ExprKind::Select { select, cases } => {
                self.check_select(expr, &Rc::clone(select), &cases.clone())
            }
            ExprKind::This => self.check_this(expr),
        }
    }

    // ----- paths -----

    fn check_path(&mut self, expr: &Rc<Expr>, path: &Rc<Path>) -> Rc<Expr> {
        let Some(decl) = self.ref_map.get_declaration(path.id).cloned() else {
            panic!("BUG: unresolved path {}", self.name_of(path.name));
        };

        let mut ty: Option<TyRef> = None;
        match &decl.kind {
            DeclKind::State { .. } => ty = Some(Rc::new(Ty::State)),
            DeclKind::Variable { .. } => {
                self.type_map.set_left_value(expr.id);
            }
            DeclKind::Param { direction, .. } => match direction {
                Direction::Out | Direction::InOut => self.type_map.set_left_value(expr.id),
                Direction::None => self.type_map.set_compile_time_constant(expr.id),
                Direction::In => {}
            },
            DeclKind::Constant { .. } | DeclKind::Instance { .. } => {
                self.type_map.set_compile_time_constant(expr.id);
            }
            DeclKind::Method { .. } => {
                // Each method invocation uses fresh type variables.
                let Some(method_ty) = self.get_type(decl.id, expr.span) else {
                    return Rc::clone(expr);
                };
                match &*method_ty {
                    Ty::Method(m) => {
                        ty = Some(Rc::new(Ty::Method(self.clone_with_fresh_type_vars(m))));
                    }
                    other => panic!("BUG: method declared with type {}", short(other)),
                }
            }
            // A type name in expression position (enum or error access).
            DeclKind::Struct { .. }
            | DeclKind::Header { .. }
            | DeclKind::Union { .. }
            | DeclKind::Enum { .. }
            | DeclKind::Errors { .. }
            | DeclKind::MatchKinds { .. }
            | DeclKind::Typedef { .. }
            | DeclKind::Extern { .. }
            | DeclKind::ParserType { .. }
            | DeclKind::ControlType { .. }
            | DeclKind::Package { .. } => {
                self.type_map.set_compile_time_constant(expr.id);
            }
            _ => {}
        }

        let ty = match ty {
            Some(ty) => ty,
            None => match self.get_type(decl.id, expr.span) {
                Some(ty) => ty,
                None => return Rc::clone(expr),
            },
        };
        self.set_type(expr.id, ty);
        Rc::clone(expr)
    }

    // ----- member access -----

    fn check_member(&mut self, expr: &Rc<Expr>, base: &Rc<Expr>, member: Symbol) -> Rc<Expr> {
        let new_base = self.infer_expr(base);
        let node = if Rc::ptr_eq(&new_base, base) {
            Rc::clone(expr)
        } else {
            self.rebuild_expr(
                expr,
                ExprKind::Member {
                    base: Rc::clone(&new_base),
                    member,
                },
            )
        };

        let Some(base_ty) = self.get_type(new_base.id, new_base.span) else {
            return node;
        };
        let ty = Rc::clone(base_ty.substituted());

        match &*ty {
            Ty::Extern(ext) => {
                let Some(&arg_count) = self.method_args.last() else {
                    self.type_error(expr.span, "methods can only be called");
                    return node;
                };
                match ext.lookup_method(member, arg_count) {
                    MethodLookup::Found(m) => {
                        let fresh = self.clone_with_fresh_type_vars(&m.ty);
                        self.set_type(node.id, Rc::new(Ty::Method(fresh)));
                        self.type_map.set_compile_time_constant(node.id);
                    }
                    MethodLookup::NotFound | MethodLookup::Ambiguous => {
                        self.type_error(
                            expr.span,
                            format!(
                                "extern {} does not have a method named {} with {} arguments",
                                self.name_of(ext.name),
                                self.name_of(member),
                                arg_count
                            ),
                        );
                    }
                }
                node
            }

            Ty::Header(s) => {
                if member == self.wk.is_valid {
                    let builtin = Rc::new(Ty::Method(Rc::new(MethodType {
                        type_params: Vec::new(),
                        return_type: Some(Rc::new(Ty::Bool)),
                        params: Vec::new(),
                    })));
                    self.set_type(node.id, builtin);
                    return node;
                }
                if member == self.wk.set_valid || member == self.wk.set_invalid {
                    if !self.type_map.is_left_value(new_base.id) {
                        self.type_error(expr.span, "must be applied to a left-value");
                    }
                    let builtin = Rc::new(Ty::Method(Rc::new(MethodType {
                        type_params: Vec::new(),
                        return_type: Some(Rc::new(Ty::Void)),
                        params: Vec::new(),
                    })));
                    self.set_type(node.id, builtin);
                    return node;
                }
                self.struct_field_access(expr, &node, &new_base, s, member);
                node
            }

            Ty::Struct(s) | Ty::Union(s) => {
                self.struct_field_access(expr, &node, &new_base, s, member);
                node
            }

            Ty::Stack { element, size } => {
                self.stack_member(expr, &node, &new_base, element, *size, member);
                node
            }

            Ty::Parser(c) | Ty::Control(c) if member == self.wk.apply => {
                let apply = Rc::new(Ty::Method(Rc::new(c.apply_method())));
                self.set_type(node.id, apply);
                node
            }

            Ty::Table(t) if member == self.wk.apply => {
                let apply = Rc::new(Ty::Method(Rc::new(MethodType {
                    type_params: Vec::new(),
                    return_type: Some(Rc::new(Ty::ActionEnum(Rc::clone(&t.action_enum)))),
                    params: Vec::new(),
                })));
                self.set_type(node.id, apply);
                node
            }

            Ty::TypeOf(inner) => {
                self.namespace_member(expr, &node, &new_base, inner, member);
                node
            }

            _ => {
                self.type_error(
                    expr.span,
                    format!(
                        "cannot extract member {} from expression of type {}",
                        self.name_of(member),
                        short(&ty)
                    ),
                );
                node
            }
        }
    }

    fn struct_field_access(
        &mut self,
        expr: &Rc<Expr>,
        node: &Rc<Expr>,
        base: &Rc<Expr>,
        s: &Rc<crate::types::ty::StructType>,
        member: Symbol,
    ) {
        let Some(field) = s.field(member) else {
            self.type_error(
                expr.span,
                format!(
                    "{} does not have a field {}",
                    self.name_of(s.name),
                    self.name_of(member)
                ),
            );
            return;
        };
        self.set_type(node.id, Rc::clone(&field.ty));
        if self.type_map.is_left_value(base.id) {
            self.type_map.set_left_value(node.id);
        }
        if self.type_map.is_compile_time_constant(base.id) {
            self.type_map.set_compile_time_constant(node.id);
        }
    }

    fn stack_member(
        &mut self,
        expr: &Rc<Expr>,
        node: &Rc<Expr>,
        base: &Rc<Expr>,
        element: &TyRef,
        _size: u32,
        member: Symbol,
    ) {
        if member == self.wk.next || member == self.wk.last {
            if self.in_control() {
                self.type_error(
                    expr.span,
                    "'last' and 'next' for stacks cannot be used in a control",
                );
            }
            self.set_type(node.id, Rc::clone(element));
            if member == self.wk.next && self.type_map.is_left_value(base.id) {
                self.type_map.set_left_value(node.id);
            }
        } else if member == self.wk.size {
            let ty = self.type_map.bits(32, false);
            self.set_type(node.id, ty);
        } else if member == self.wk.last_index {
            let ty = self.type_map.bits(32, true);
            self.set_type(node.id, ty);
        } else if member == self.wk.push_front || member == self.wk.pop_front {
            if self.in_parser() {
                self.type_error(
                    expr.span,
                    "'push_front' and 'pop_front' for stacks cannot be used in a parser",
                );
            }
            if !self.type_map.is_left_value(base.id) {
                self.type_error(expr.span, "must be applied to a left-value");
            }
            let count = self.type_map.fresh_inf_int();
            let builtin = Rc::new(Ty::Method(Rc::new(MethodType {
                type_params: Vec::new(),
                return_type: Some(Rc::new(Ty::Void)),
                params: vec![Param {
                    name: self.wk.count,
                    direction: Direction::In,
                    ty: count,
                }],
            })));
            self.set_type(node.id, builtin);
        } else {
            self.type_error(
                expr.span,
                format!("header stacks do not have a member {}", self.name_of(member)),
            );
        }
    }

    /// Member lookup inside a type namespace: enum tags and error tags.
    fn namespace_member(
        &mut self,
        expr: &Rc<Expr>,
        node: &Rc<Expr>,
        base: &Rc<Expr>,
        inner: &TyRef,
        member: Symbol,
    ) {
        match &**inner {
            Ty::Enum(e) => {
                if e.members.contains(&member) {
                    self.set_type(node.id, Rc::clone(inner));
                    if self.type_map.is_compile_time_constant(base.id) {
                        self.type_map.set_compile_time_constant(node.id);
                    }
                } else {
                    self.type_error(
                        expr.span,
                        format!(
                            "{} is not a tag of enum {}",
                            self.name_of(member),
                            self.name_of(e.name)
                        ),
                    );
                }
            }
            Ty::Error => {
                let members_have = match &base.kind {
                    ExprKind::PathRef(path) => self
                        .ref_map
                        .get_declaration(path.id)
                        .map(|decl| match &decl.kind {
                            DeclKind::Errors { members } => members
                                .iter()
                                .any(|m| m.name() == Some(member)),
                            _ => false,
                        })
                        .unwrap_or(false),
                    _ => false,
                };
                if members_have {
                    self.set_type(node.id, Rc::new(Ty::Error));
                    if self.type_map.is_compile_time_constant(base.id) {
                        self.type_map.set_compile_time_constant(node.id);
                    }
                } else {
                    self.type_error(
                        expr.span,
                        format!("{} is not an error tag", self.name_of(member)),
                    );
                }
            }
            other => {
                self.type_error(
                    expr.span,
                    format!(
                        "cannot extract member {} from type {}",
                        self.name_of(member),
                        short(other)
                    ),
                );
            }
        }
    }

    // ----- indexing and slicing -----

    fn check_index(&mut self, expr: &Rc<Expr>, base: &Rc<Expr>, index: &Rc<Expr>) -> Rc<Expr> {
        let nb = self.infer_expr(base);
        let ni = self.infer_expr(index);
        let node = if Rc::ptr_eq(&nb, base) && Rc::ptr_eq(&ni, index) {
            Rc::clone(expr)
        } else {
            self.rebuild_expr(
                expr,
                ExprKind::Index {
                    base: Rc::clone(&nb),
                    index: Rc::clone(&ni),
                },
            )
        };

        let Some(lt) = self.get_type(nb.id, nb.span) else {
            return node;
        };
        let Some(rt) = self.get_type(ni.id, ni.span) else {
            return node;
        };

        let Ty::Stack { element, size } = &*lt else {
            self.type_error(
                expr.span,
                format!("array indexing applied to non-array type {}", short(&lt)),
            );
            return node;
        };

        let index_const = ni.as_constant();
        if !rt.is_bits() && index_const.is_none() {
            self.type_error(
                ni.span,
                format!("array index must be an integer, but it has type {}", short(&rt)),
            );
            return node;
        }

        if self.type_map.is_left_value(nb.id) {
            self.type_map.set_left_value(node.id);
        }

        if let Some(value) = index_const {
            if value < 0 {
                self.type_error(ni.span, format!("negative array index {value}"));
                return node;
            }
            if value >= i128::from(*size) {
                self.type_error(
                    ni.span,
                    format!("array index {value} larger or equal to array size {size}"),
                );
                return node;
            }
        }
        self.set_type(node.id, Rc::clone(element));
        node
    }

    fn check_slice(
        &mut self,
        expr: &Rc<Expr>,
        base: &Rc<Expr>,
        msb: &Rc<Expr>,
        lsb: &Rc<Expr>,
    ) -> Rc<Expr> {
        let nb = self.infer_expr(base);
        let nm = self.infer_expr(msb);
        let nl = self.infer_expr(lsb);
        let node = if Rc::ptr_eq(&nb, base) && Rc::ptr_eq(&nm, msb) && Rc::ptr_eq(&nl, lsb) {
            Rc::clone(expr)
        } else {
            self.rebuild_expr(
                expr,
                ExprKind::Slice {
                    base: Rc::clone(&nb),
                    msb: Rc::clone(&nm),
                    lsb: Rc::clone(&nl),
                },
            )
        };

        let Some(base_ty) = self.get_type(nb.id, nb.span) else {
            return node;
        };
        let Some((width, signed)) = base_ty.as_bits() else {
            self.type_error(expr.span, "bit extraction only defined for bit<> types");
            return node;
        };

        let (Some(m), Some(l)) = (nm.as_constant(), nl.as_constant()) else {
            self.type_error(expr.span, "bit index values must be constants");
            return node;
        };
        if m < 0 || l < 0 {
            self.type_error(expr.span, "negative bit index");
            return node;
        }
        if m >= i128::from(width) || l >= i128::from(width) {
            self.type_error(
                expr.span,
                format!("bit index larger than type width {width}"),
            );
            return node;
        }
        if l > m {
            self.type_error(
                expr.span,
                format!("LSB index {l} greater than MSB index {m}"),
            );
            return node;
        }

        let result = self.type_map.bits((m - l + 1) as u32, signed);
        self.set_type(node.id, result);
        if self.type_map.is_left_value(nb.id) {
            self.type_map.set_left_value(node.id);
        }
        if self.type_map.is_compile_time_constant(nb.id) {
            self.type_map.set_compile_time_constant(node.id);
        }
        node
    }

    // ----- casts -----

    fn check_cast(
        &mut self,
        expr: &Rc<Expr>,
        target: &Rc<conduit_syntax::ast::AstType>,
        inner: &Rc<Expr>,
    ) -> Rc<Expr> {
        let mut new_inner = self.infer_expr(inner);
        let Some(cast_ty) = self.infer_ast_type(target) else {
            return Rc::clone(expr);
        };
        let Some(mut source_ty) = self.get_type(new_inner.id, new_inner.span) else {
            return Rc::clone(expr);
        };

        if !self.can_cast_between(&cast_ty, &source_ty) {
            // The cast is not legal as written; see whether the
            // assignment rules (unification, constant re-widthing) make
            // the operand fit.
            let rhs = self.assignment(expr.span, &cast_ty, &new_inner);
            if !Rc::ptr_eq(&rhs, &new_inner) {
                new_inner = rhs;
                source_ty = Rc::clone(&cast_ty);
            }
            if !self.can_cast_between(&cast_ty, &source_ty) {
                self.type_error(
                    expr.span,
                    format!(
                        "Illegal cast from {} to {}",
                        short(&source_ty),
                        short(&cast_ty)
                    ),
                );
            }
        }

        let node = if Rc::ptr_eq(&new_inner, inner) {
            Rc::clone(expr)
        } else {
            self.rebuild_expr(
                expr,
                ExprKind::Cast {
                    target: Rc::clone(target),
                    expr: Rc::clone(&new_inner),
                },
            )
        };
        self.set_type(node.id, cast_ty);
        if self.type_map.is_compile_time_constant(new_inner.id) {
            self.type_map.set_compile_time_constant(node.id);
        }
        node
    }

    // ----- unary operators -----

    fn check_unary(&mut self, expr: &Rc<Expr>, op: UnaryOp, inner: &Rc<Expr>) -> Rc<Expr> {
        let ni = self.infer_expr(inner);
        let node = if Rc::ptr_eq(&ni, inner) {
            Rc::clone(expr)
        } else {
            self.rebuild_expr(
                expr,
                ExprKind::Unary {
                    op,
                    expr: Rc::clone(&ni),
                },
            )
        };
        let Some(ty) = self.get_type(ni.id, ni.span) else {
            return node;
        };

        match op {
            UnaryOp::Not => {
                if matches!(&*ty, Ty::Bool) {
                    self.set_type(node.id, Rc::new(Ty::Bool));
                } else {
                    self.type_error(
                        expr.span,
                        format!("cannot apply ! to a value of type {}", short(&ty)),
                    );
                }
            }
            UnaryOp::Neg => {
                if ty.is_inf_int() || ty.is_bits() {
                    self.set_type(node.id, ty);
                } else {
                    self.type_error(
                        expr.span,
                        format!("cannot apply - to a value of type {}", short(&ty)),
                    );
                }
            }
            UnaryOp::Cmpl => {
                if ty.is_inf_int() {
                    self.type_error(
                        expr.span,
                        "~ cannot be applied to an operand with an unknown width",
                    );
                } else if ty.is_bits() {
                    self.set_type(node.id, ty);
                } else {
                    self.type_error(
                        expr.span,
                        format!("cannot apply ~ to a value of type {}", short(&ty)),
                    );
                }
            }
        }
        if self.type_map.is_compile_time_constant(ni.id) {
            self.type_map.set_compile_time_constant(node.id);
        }
        node
    }

    // ----- binary operators -----

    fn check_binary(
        &mut self,
        expr: &Rc<Expr>,
        op: BinaryOp,
        left: &Rc<Expr>,
        right: &Rc<Expr>,
    ) -> Rc<Expr> {
        let nl = self.infer_expr(left);
        let nr = self.infer_expr(right);
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => self.binary_arith(expr, op, nl, nr),
            BinaryOp::Div | BinaryOp::Mod => self.uns_binary_arith(expr, op, nl, nr),
            BinaryOp::Shl | BinaryOp::Shr => self.shift(expr, op, nl, nr),
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                self.bitwise(expr, op, nl, nr)
            }
            BinaryOp::And | BinaryOp::Or => self.binary_bool(expr, op, nl, nr),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                self.relational(expr, op, nl, nr)
            }
            BinaryOp::Eq | BinaryOp::Ne => self.equality(expr, op, nl, nr),
            BinaryOp::Concat => self.concat(expr, op, nl, nr),
            BinaryOp::Range | BinaryOp::Mask => self.type_set(expr, op, nl, nr),
        }
    }

    fn finalize_binary(
        &mut self,
        old: &Rc<Expr>,
        op: BinaryOp,
        nl: Rc<Expr>,
        nr: Rc<Expr>,
    ) -> Rc<Expr> {
        match &old.kind {
            ExprKind::Binary { left, right, .. }
                if Rc::ptr_eq(&nl, left) && Rc::ptr_eq(&nr, right) =>
            {
                Rc::clone(old)
            }
            _ => self.rebuild_expr(
                old,
                ExprKind::Binary {
                    op,
                    left: nl,
                    right: nr,
                },
            ),
        }
    }

    fn propagate_binary_constant(&mut self, node: &Rc<Expr>) {
        if let ExprKind::Binary { left, right, .. } = &node.kind {
            if self.type_map.is_compile_time_constant(left.id)
                && self.type_map.is_compile_time_constant(right.id)
            {
                self.type_map.set_compile_time_constant(node.id);
            }
        }
    }

    /// Rewrites a width-free operand to the concrete `Bits` type of the
    /// other side: literals are replaced in place, other expressions are
    /// rewritten through a solved substitution.
    fn coerce_inf_int(&mut self, operand: &Rc<Expr>, target: &TyRef) -> Rc<Expr> {
        if let ExprKind::Constant { value, width: None } = operand.kind {
            let (w, s) = target
                .as_bits()
                .expect("BUG: widening a literal to a non-bits type");
            let node = self.new_expr(
                operand.span,
                ExprKind::Constant {
                    value,
                    width: Some((w, s)),
                },
            );
            let bits = self.type_map.bits(w, s);
            self.set_type(node.id, bits);
            self.type_map.set_compile_time_constant(node.id);
            return node;
        }
        let Some(ty) = self.get_type_opt(operand.id) else {
            return Rc::clone(operand);
        };
        match self.unify(operand.span, target, &ty, true) {
            Some(tvs) if !tvs.is_identity() => self.apply_subst_to_expr(&tvs, operand),
            _ => Rc::clone(operand),
        }
    }

    fn binary_arith(
        &mut self,
        expr: &Rc<Expr>,
        op: BinaryOp,
        mut nl: Rc<Expr>,
        mut nr: Rc<Expr>,
    ) -> Rc<Expr> {
        let (Some(lt), Some(rt)) = (
            self.get_type(nl.id, nl.span),
            self.get_type(nr.id, nr.span),
        ) else {
            return self.finalize_binary(expr, op, nl, nr);
        };

        if !lt.is_bits() && !lt.is_inf_int() {
            self.type_error(
                expr.span,
                format!("{op} cannot be applied to an operand of type {}", short(&lt)),
            );
            return self.finalize_binary(expr, op, nl, nr);
        }
        if !rt.is_bits() && !rt.is_inf_int() {
            self.type_error(
                expr.span,
                format!("{op} cannot be applied to an operand of type {}", short(&rt)),
            );
            return self.finalize_binary(expr, op, nl, nr);
        }

        let result = match (lt.as_bits(), rt.as_bits()) {
            (Some((lw, ls)), Some((rw, rs))) => {
                if lw != rw {
                    self.type_error(
                        expr.span,
                        format!("{op}: cannot operate on values with different widths {lw} and {rw}"),
                    );
                    return self.finalize_binary(expr, op, nl, nr);
                }
                if ls != rs {
                    self.type_error(
                        expr.span,
                        format!("{op}: cannot operate on values with different signs"),
                    );
                    return self.finalize_binary(expr, op, nl, nr);
                }
                lt
            }
            (None, Some(_)) => {
                nl = self.coerce_inf_int(&nl, &rt);
                rt
            }
            (Some(_), None) => {
                nr = self.coerce_inf_int(&nr, &lt);
                lt
            }
            (None, None) => lt,
        };

        let node = self.finalize_binary(expr, op, nl, nr);
        self.set_type(node.id, result);
        self.propagate_binary_constant(&node);
        node
    }

    fn uns_binary_arith(
        &mut self,
        expr: &Rc<Expr>,
        op: BinaryOp,
        nl: Rc<Expr>,
        nr: Rc<Expr>,
    ) -> Rc<Expr> {
        for operand in [nl.clone(), nr.clone()] {
            if let Some(ty) = self.get_type_opt(operand.id) {
                if matches!(ty.as_bits(), Some((_, true))) {
                    self.type_error(expr.span, format!("{op}: cannot operate on signed values"));
                    return self.finalize_binary(expr, op, nl, nr);
                }
            }
            if let Some(value) = operand.as_constant() {
                if value < 0 {
                    self.type_error(expr.span, format!("{op} is not defined on negative numbers"));
                    return self.finalize_binary(expr, op, nl, nr);
                }
            }
        }
        self.binary_arith(expr, op, nl, nr)
    }

    fn shift(&mut self, expr: &Rc<Expr>, op: BinaryOp, nl: Rc<Expr>, nr: Rc<Expr>) -> Rc<Expr> {
        let (Some(lt), Some(rt)) = (
            self.get_type(nl.id, nl.span),
            self.get_type(nr.id, nr.span),
        ) else {
            return self.finalize_binary(expr, op, nl, nr);
        };

        let Some((width, _)) = lt.as_bits() else {
            self.type_error(
                expr.span,
                format!(
                    "left operand of shift must be a numeric type, not {}",
                    short(&lt)
                ),
            );
            return self.finalize_binary(expr, op, nl, nr);
        };

        if let Some(amount) = nr.as_constant() {
            if amount < 0 {
                self.type_error(expr.span, format!("negative shift amount {amount}"));
                return self.finalize_binary(expr, op, nl, nr);
            }
            if amount >= i128::from(width) {
                self.reporter.warning(
                    expr.span,
                    format!("shifting a value with {width} bits by {amount}"),
                );
            }
        } else if !matches!(rt.as_bits(), Some((_, false))) {
            self.type_error(nr.span, "shift amount must be an unsigned number");
            return self.finalize_binary(expr, op, nl, nr);
        }

        let node = self.finalize_binary(expr, op, nl, nr);
        self.set_type(node.id, lt);
        self.propagate_binary_constant(&node);
        node
    }

    fn bitwise(
        &mut self,
        expr: &Rc<Expr>,
        op: BinaryOp,
        mut nl: Rc<Expr>,
        mut nr: Rc<Expr>,
    ) -> Rc<Expr> {
        let (Some(lt), Some(rt)) = (
            self.get_type(nl.id, nl.span),
            self.get_type(nr.id, nr.span),
        ) else {
            return self.finalize_binary(expr, op, nl, nr);
        };

        if !lt.is_bits() && !lt.is_inf_int() {
            self.type_error(
                expr.span,
                format!("{op} cannot be applied to an operand of type {}", short(&lt)),
            );
            return self.finalize_binary(expr, op, nl, nr);
        }
        if !rt.is_bits() && !rt.is_inf_int() {
            self.type_error(
                expr.span,
                format!("{op} cannot be applied to an operand of type {}", short(&rt)),
            );
            return self.finalize_binary(expr, op, nl, nr);
        }

        let result = match (lt.is_bits(), rt.is_bits()) {
            (true, true) => {
                if !TypeMap::equivalent(&lt, &rt) {
                    self.type_error(
                        expr.span,
                        format!(
                            "{op}: cannot operate on values with different types {} and {}",
                            short(&lt),
                            short(&rt)
                        ),
                    );
                    return self.finalize_binary(expr, op, nl, nr);
                }
                lt
            }
            (false, true) => {
                nl = self.coerce_inf_int(&nl, &rt);
                rt
            }
            (true, false) => {
                nr = self.coerce_inf_int(&nr, &lt);
                lt
            }
            (false, false) => lt,
        };

        let node = self.finalize_binary(expr, op, nl, nr);
        self.set_type(node.id, result);
        self.propagate_binary_constant(&node);
        node
    }

    fn binary_bool(
        &mut self,
        expr: &Rc<Expr>,
        op: BinaryOp,
        nl: Rc<Expr>,
        nr: Rc<Expr>,
    ) -> Rc<Expr> {
        let (Some(lt), Some(rt)) = (
            self.get_type(nl.id, nl.span),
            self.get_type(nr.id, nr.span),
        ) else {
            return self.finalize_binary(expr, op, nl, nr);
        };
        if !matches!(&*lt, Ty::Bool) || !matches!(&*rt, Ty::Bool) {
            self.type_error(
                expr.span,
                format!("{op} is not defined on {} and {}", short(&lt), short(&rt)),
            );
            return self.finalize_binary(expr, op, nl, nr);
        }
        let node = self.finalize_binary(expr, op, nl, nr);
        self.set_type(node.id, Rc::new(Ty::Bool));
        self.propagate_binary_constant(&node);
        node
    }

    /// Rewrites an `InfInt` operand toward the `Bits` type of the other
    /// side, as relational and equality comparisons require.
    fn balance_widths(&mut self, nl: &mut Rc<Expr>, nr: &mut Rc<Expr>) -> Option<(TyRef, TyRef)> {
        let lt = self.get_type(nl.id, nl.span)?;
        let rt = self.get_type(nr.id, nr.span)?;
        if lt.is_inf_int() && rt.is_bits() {
            *nl = self.coerce_inf_int(nl, &rt);
            return Some((Rc::clone(&rt), rt));
        }
        if rt.is_inf_int() && lt.is_bits() {
            *nr = self.coerce_inf_int(nr, &lt);
            return Some((Rc::clone(&lt), lt));
        }
        Some((lt, rt))
    }

    fn relational(
        &mut self,
        expr: &Rc<Expr>,
        op: BinaryOp,
        mut nl: Rc<Expr>,
        mut nr: Rc<Expr>,
    ) -> Rc<Expr> {
        let Some((lt, rt)) = self.balance_widths(&mut nl, &mut nr) else {
            return self.finalize_binary(expr, op, nl, nr);
        };
        if !lt.is_bits() || !rt.is_bits() || !TypeMap::equivalent(&lt, &rt) {
            self.type_error(
                expr.span,
                format!("{op} is not defined on {} and {}", short(&lt), short(&rt)),
            );
            return self.finalize_binary(expr, op, nl, nr);
        }
        let node = self.finalize_binary(expr, op, nl, nr);
        self.set_type(node.id, Rc::new(Ty::Bool));
        self.propagate_binary_constant(&node);
        node
    }

    fn equality(
        &mut self,
        expr: &Rc<Expr>,
        op: BinaryOp,
        mut nl: Rc<Expr>,
        mut nr: Rc<Expr>,
    ) -> Rc<Expr> {
        let Some((lt, rt)) = self.balance_widths(&mut nl, &mut nr) else {
            return self.finalize_binary(expr, op, nl, nr);
        };
        // Two width-free literals compare fine; distinct unification ids
        // do not make them different types.
        let defined = (lt.is_inf_int() && rt.is_inf_int())
            || (TypeMap::equivalent(&lt, &rt)
                && !matches!(&*lt, Ty::Void | Ty::Varbits { .. }));
        if !defined {
            self.type_error(
                expr.span,
                format!("{op} is not defined on {} and {}", short(&lt), short(&rt)),
            );
            return self.finalize_binary(expr, op, nl, nr);
        }
        let node = self.finalize_binary(expr, op, nl, nr);
        self.set_type(node.id, Rc::new(Ty::Bool));
        self.propagate_binary_constant(&node);
        node
    }

    fn concat(&mut self, expr: &Rc<Expr>, op: BinaryOp, nl: Rc<Expr>, nr: Rc<Expr>) -> Rc<Expr> {
        let (Some(lt), Some(rt)) = (
            self.get_type(nl.id, nl.span),
            self.get_type(nr.id, nr.span),
        ) else {
            return self.finalize_binary(expr, op, nl, nr);
        };
        if lt.is_inf_int() {
            self.type_error(
                nl.span,
                "please specify a width for the operand of a concatenation",
            );
            return self.finalize_binary(expr, op, nl, nr);
        }
        if rt.is_inf_int() {
            self.type_error(
                nr.span,
                "please specify a width for the operand of a concatenation",
            );
            return self.finalize_binary(expr, op, nl, nr);
        }
        let (Some((lw, ls)), Some((rw, _))) = (lt.as_bits(), rt.as_bits()) else {
            self.type_error(
                expr.span,
                format!(
                    "concatenation not defined on {} and {}",
                    short(&lt),
                    short(&rt)
                ),
            );
            return self.finalize_binary(expr, op, nl, nr);
        };
        let result = self.type_map.bits(lw + rw, ls);
        let node = self.finalize_binary(expr, op, nl, nr);
        self.set_type(node.id, result);
        self.propagate_binary_constant(&node);
        node
    }

    /// Range `..` and mask `&&&`: the operands determine a common element
    /// type; the result is a set over it.
    fn type_set(
        &mut self,
        expr: &Rc<Expr>,
        op: BinaryOp,
        mut nl: Rc<Expr>,
        mut nr: Rc<Expr>,
    ) -> Rc<Expr> {
        let (Some(lt), Some(rt)) = (
            self.get_type(nl.id, nl.span),
            self.get_type(nr.id, nr.span),
        ) else {
            return self.finalize_binary(expr, op, nl, nr);
        };

        if !lt.is_bits() && !lt.is_inf_int() {
            self.type_error(
                expr.span,
                format!("{op} cannot be applied to an operand of type {}", short(&lt)),
            );
            return self.finalize_binary(expr, op, nl, nr);
        }
        if !rt.is_bits() && !rt.is_inf_int() {
            self.type_error(
                expr.span,
                format!("{op} cannot be applied to an operand of type {}", short(&rt)),
            );
            return self.finalize_binary(expr, op, nl, nr);
        }

        let element = match (lt.is_bits(), rt.is_bits()) {
            (true, true) => {
                if !TypeMap::equivalent(&lt, &rt) {
                    self.type_error(
                        expr.span,
                        format!(
                            "{op}: cannot operate on values with different types {} and {}",
                            short(&lt),
                            short(&rt)
                        ),
                    );
                    return self.finalize_binary(expr, op, nl, nr);
                }
                lt
            }
            (false, true) => {
                nl = self.coerce_inf_int(&nl, &rt);
                rt
            }
            (true, false) => {
                nr = self.coerce_inf_int(&nr, &lt);
                lt
            }
            (false, false) => lt,
        };

        let node = self.finalize_binary(expr, op, nl, nr);
        self.set_type(node.id, Rc::new(Ty::Set(element)));
        node
    }

    // ----- conditional -----

    fn check_mux(
        &mut self,
        expr: &Rc<Expr>,
        cond: &Rc<Expr>,
        then_expr: &Rc<Expr>,
        else_expr: &Rc<Expr>,
    ) -> Rc<Expr> {
        let nc = self.infer_expr(cond);
        let mut nt = self.infer_expr(then_expr);
        let mut ne = self.infer_expr(else_expr);

        let finalize = |this: &mut Self, nc: Rc<Expr>, nt: Rc<Expr>, ne: Rc<Expr>| {
            if Rc::ptr_eq(&nc, cond) && Rc::ptr_eq(&nt, then_expr) && Rc::ptr_eq(&ne, else_expr) {
                Rc::clone(expr)
            } else {
                this.rebuild_expr(
                    expr,
                    ExprKind::Mux {
                        cond: nc,
                        then_expr: nt,
                        else_expr: ne,
                    },
                )
            }
        };

        let (Some(ct), Some(tt), Some(et)) = (
            self.get_type(nc.id, nc.span),
            self.get_type(nt.id, nt.span),
            self.get_type(ne.id, ne.span),
        ) else {
            return finalize(self, nc, nt, ne);
        };

        if !matches!(&*ct, Ty::Bool) {
            self.type_error(
                nc.span,
                format!("selector of ?: must be bool, not {}", short(&ct)),
            );
            return finalize(self, nc, nt, ne);
        }
        if tt.is_inf_int() && et.is_inf_int() {
            self.type_error(
                expr.span,
                "width must be specified for at least one branch of ?:",
            );
            return finalize(self, nc, nt, ne);
        }

        let Some(tvs) = self.unify(expr.span, &tt, &et, true) else {
            return finalize(self, nc, nt, ne);
        };
        let mut result = tt;
        if !tvs.is_identity() {
            nt = self.apply_subst_to_expr(&tvs, &nt);
            ne = self.apply_subst_to_expr(&tvs, &ne);
            if let Some(t) = self.get_type_opt(nt.id) {
                result = t;
            }
        }

        let node = finalize(self, nc.clone(), nt.clone(), ne.clone());
        self.set_type(node.id, result);
        if self.type_map.is_compile_time_constant(nc.id)
            && self.type_map.is_compile_time_constant(nt.id)
            && self.type_map.is_compile_time_constant(ne.id)
        {
            self.type_map.set_compile_time_constant(node.id);
        }
        node
    }

    // ----- lists -----

    fn check_list(&mut self, expr: &Rc<Expr>, components: &[Rc<Expr>]) -> Rc<Expr> {
        let mut changed = false;
        let mut constant = true;
        let mut failed = false;
        let mut new_components = Vec::with_capacity(components.len());
        let mut tys = Vec::with_capacity(components.len());
        for component in components {
            let nc = self.infer_expr(component);
            changed |= !Rc::ptr_eq(&nc, component);
            if !self.type_map.is_compile_time_constant(nc.id) {
                constant = false;
            }
            match self.get_type(nc.id, nc.span) {
                Some(ty) => tys.push(ty),
                None => failed = true,
            }
            new_components.push(nc);
        }
        if failed {
            return self.finalize_list(expr, changed, new_components);
        }

        let tuple = Rc::new(Ty::Tuple(tys));
        let Some(canon) = self.canonicalize(expr.span, &tuple) else {
            return self.finalize_list(expr, changed, new_components);
        };

        let node = self.finalize_list(expr, changed, new_components);
        self.set_type(node.id, canon);
        if constant {
            self.type_map.set_compile_time_constant(node.id);
        }
        node
    }

    fn finalize_list(
        &mut self,
        old: &Rc<Expr>,
        changed: bool,
        new_components: Vec<Rc<Expr>>,
    ) -> Rc<Expr> {
        if changed {
            self.rebuild_expr(
                old,
                ExprKind::List {
                    components: new_components,
                },
            )
        } else {
            Rc::clone(old)
        }
    }

    // ----- calls -----

    fn check_call(
        &mut self,
        expr: &Rc<Expr>,
        method: &Rc<Expr>,
        type_args: &[Rc<conduit_syntax::ast::AstType>],
        args: &[Rc<Expr>],
    ) -> Rc<Expr> {
        // Enable extern-method resolution by argument count while the
        // callee is visited.
        self.method_args.push(args.len());
        let nm = self.infer_expr(method);
        let mut nargs: Vec<_> = args.iter().map(|a| self.infer_expr(a)).collect();
        self.method_args.pop();

        let mut type_arg_tys = Vec::with_capacity(type_args.len());
        let mut type_args_ok = true;
        for t in type_args {
            match self.infer_ast_type(t) {
                Some(ty) => type_arg_tys.push(ty),
                None => type_args_ok = false,
            }
        }

        let finalize = |this: &mut Self, nm: Rc<Expr>, nargs: Vec<Rc<Expr>>| {
            let unchanged = Rc::ptr_eq(&nm, method)
                && nargs.len() == args.len()
                && nargs.iter().zip(args).all(|(a, b)| Rc::ptr_eq(a, b));
            if unchanged {
                Rc::clone(expr)
            } else {
                this.rebuild_expr(
                    expr,
                    ExprKind::Call {
                        method: nm,
                        type_args: type_args.to_vec(),
                        args: nargs,
                    },
                )
            }
        };

        if !type_args_ok {
            return finalize(self, nm, nargs);
        }
        let Some(method_ty) = self.get_type(nm.id, nm.span) else {
            return finalize(self, nm, nargs);
        };

        match &*method_ty {
            Ty::Action(action) => {
                let node = finalize(self, nm, nargs);
                self.action_call(expr.span, &node, action, !type_args.is_empty())
            }
            Ty::Method(_) => {
                conduit_log::debug!("solving method call at {}", expr.span);
                let ret = self.fresh_var_ty();
                let mut infos = Vec::with_capacity(nargs.len());
                let mut args_ok = true;
                for arg in &nargs {
                    match self.get_type(arg.id, arg.span) {
                        Some(arg_ty) => infos.push(ArgInfo {
                            ty: arg_ty,
                            is_left_value: self.type_map.is_left_value(arg.id),
                            is_constant: self.type_map.is_compile_time_constant(arg.id),
                            span: arg.span,
                        }),
                        None => args_ok = false,
                    }
                }
                if !args_ok {
                    return finalize(self, nm, nargs);
                }
                let shape = Rc::new(Ty::MethodCall(Rc::new(MethodCallShape {
                    type_args: type_arg_tys,
                    return_type: Rc::clone(&ret),
                    args: infos,
                })));

                let mut constraints = ConstraintSet::new();
                constraints.add_equality(Rc::clone(&method_ty), shape);
                let tvs = match constraints.solve(expr.span) {
                    Ok(tvs) => tvs,
                    Err(err) => {
                        self.report(&err);
                        return finalize(self, nm, nargs);
                    }
                };
                self.type_map.add_substitutions(&tvs);

                let Ty::Var(ret_var) = &*ret else {
                    unreachable!("return slot is always a fresh variable");
                };
                let Some(return_ty) = tvs.resolve(ret_var.id) else {
                    self.type_error(expr.span, "cannot infer the return type of this call");
                    return finalize(self, nm, nargs);
                };

                if !tvs.is_identity() {
                    nargs = nargs
                        .iter()
                        .map(|a| self.apply_subst_to_expr(&tvs, a))
                        .collect();
                }

                // Calling a table's apply from inside an action is
                // forbidden.
                if self.in_action() {
                    if let ExprKind::Member { base, member } = &nm.kind {
                        let base_is_table = self
                            .get_type_opt(base.id)
                            .is_some_and(|t| matches!(&**t.substituted(), Ty::Table(_)));
                        if *member == self.wk.apply && base_is_table {
                            self.type_error(expr.span, "tables cannot be invoked from actions");
                        }
                    }
                }

                let node = finalize(self, nm, nargs);
                self.set_type(node.id, return_ty);
                node
            }
            other => {
                self.type_error(
                    expr.span,
                    format!("expression of type {} is not a method", short(other)),
                );
                finalize(self, nm, nargs)
            }
        }
    }

    /// An action invocation. Inside a table's `actions` property,
    /// trailing directionless parameters may stay unbound (the control
    /// plane binds them); the result is an action over the unbound
    /// suffix.
    fn action_call(
        &mut self,
        span: conduit_syntax::Span,
        node: &Rc<Expr>,
        action: &Rc<ActionType>,
        has_type_args: bool,
    ) -> Rc<Expr> {
        conduit_log::debug!("processing action call at {span}");
        let in_actions_list = self.in_actions_property();
        if has_type_args {
            self.type_error(span, "cannot supply type parameters for an action invocation");
        }
        let ExprKind::Call { args, .. } = &node.kind else {
            unreachable!("action calls are call expressions");
        };

        let mut constraints = ConstraintSet::new();
        let mut remaining = Vec::new();
        for (i, param) in action.params.iter().enumerate() {
            match args.get(i) {
                None => {
                    // Inside a table's actions list the unbound suffix
                    // becomes the partially-applied action's parameters;
                    // anywhere else every parameter must be bound.
                    if !in_actions_list {
                        self.type_error(
                            span,
                            format!("parameter {} must be bound", self.name_of(param.name)),
                        );
                    }
                    remaining.push(param.clone());
                }
                Some(arg) => {
                    let Some(arg_ty) = self.get_type(arg.id, arg.span) else {
                        return Rc::clone(node);
                    };
                    constraints.add_equality(Rc::clone(&param.ty), arg_ty);
                    match param.direction {
                        Direction::None => {
                            if in_actions_list {
                                self.type_error(
                                    arg.span,
                                    format!(
                                        "parameter {} cannot be bound: it is set by the control plane",
                                        self.name_of(param.name)
                                    ),
                                );
                            }
                            // Called directly, directionless action
                            // parameters act as plain inputs.
                        }
                        Direction::Out | Direction::InOut => {
                            if !self.type_map.is_left_value(arg.id) {
                                self.type_error(arg.span, "must be a left-value");
                            }
                        }
                        Direction::In => {}
                    }
                }
            }
        }
        if args.len() > action.params.len() {
            self.type_error(span, "too many arguments for action");
            return Rc::clone(node);
        }

        let result = Rc::new(Ty::Action(Rc::new(ActionType { params: remaining })));
        let tvs = match constraints.solve(span) {
            Ok(tvs) => tvs,
            Err(err) => {
                self.report(&err);
                return Rc::clone(node);
            }
        };
        self.type_map.add_substitutions(&tvs);

        let node = if tvs.is_identity() {
            Rc::clone(node)
        } else {
            let new_args: Vec<_> = args
                .iter()
                .map(|a| self.apply_subst_to_expr(&tvs, a))
                .collect();
            if new_args.iter().zip(args).all(|(a, b)| Rc::ptr_eq(a, b)) {
                Rc::clone(node)
            } else {
                let ExprKind::Call {
                    method, type_args, ..
                } = &node.kind
                else {
                    unreachable!();
                };
                let kind = ExprKind::Call {
                    method: Rc::clone(method),
                    type_args: type_args.clone(),
                    args: new_args,
                };
                self.rebuild_expr(node, kind)
            }
        };
        self.set_type(node.id, result);
        node
    }

    // ----- constructor calls -----

    fn check_constructor_call(
        &mut self,
        expr: &Rc<Expr>,
        ty: &Rc<conduit_syntax::ast::AstType>,
        args: &[Rc<Expr>],
    ) -> Rc<Expr> {
        let mut nargs: Vec<_> = args.iter().map(|a| self.infer_expr(a)).collect();

        let finalize = |this: &mut Self, nargs: Vec<Rc<Expr>>| {
            let unchanged = nargs.iter().zip(args).all(|(a, b)| Rc::ptr_eq(a, b));
            if unchanged {
                Rc::clone(expr)
            } else {
                this.rebuild_expr(
                    expr,
                    ExprKind::ConstructorCall {
                        ty: Rc::clone(ty),
                        args: nargs,
                    },
                )
            }
        };

        let Some(declared) = self.infer_ast_type(ty) else {
            return finalize(self, nargs);
        };
        let simple = Rc::clone(declared.substituted());

        let result_ty = match &*simple {
            Ty::Extern(ext) => {
                match self.check_extern_constructor(expr.span, &ext.clone(), &nargs) {
                    Some(new_args) => {
                        nargs = new_args;
                        Some(declared)
                    }
                    None => None,
                }
            }
            Ty::Parser(c) | Ty::Control(c) | Ty::Package(c) if c.ctor_params.is_some() => {
                match self.container_instantiation(expr.span, &simple, &c.clone(), &nargs) {
                    Some((cont_ty, new_args)) => {
                        nargs = new_args;
                        match &*declared {
                            Ty::SpecializedCanonical { base, args, .. } => {
                                Some(Rc::new(Ty::SpecializedCanonical {
                                    base: Rc::clone(base),
                                    args: args.clone(),
                                    substituted: cont_ty,
                                }))
                            }
                            _ => Some(cont_ty),
                        }
                    }
                    None => None,
                }
            }
            other => {
                self.type_error(
                    expr.span,
                    format!("cannot invoke a constructor on type {}", short(other)),
                );
                None
            }
        };

        let node = finalize(self, nargs);
        if let Some(result) = result_ty {
            self.set_type(node.id, result);
        }
        self.type_map.set_compile_time_constant(node.id);
        node
    }

    /// Checks an extern constructor invocation: the extern must be fully
    /// specialized, the constructor is looked up by arity, and each
    /// argument must be a compile-time constant assignable to its
    /// parameter. Returns the possibly-rewritten arguments.
    pub(crate) fn check_extern_constructor(
        &mut self,
        span: conduit_syntax::Span,
        ext: &Rc<crate::types::ty::ExternType>,
        args: &[Rc<Expr>],
    ) -> Option<Vec<Rc<Expr>>> {
        if !ext.type_params.is_empty() {
            self.type_error(span, "type parameters must be supplied for constructor");
            return None;
        }
        let constructor = match ext.lookup_method(ext.name, args.len()) {
            MethodLookup::Found(m) => Rc::clone(&m.ty),
            MethodLookup::NotFound | MethodLookup::Ambiguous => {
                self.type_error(
                    span,
                    format!(
                        "type {} has no constructor with {} arguments",
                        self.name_of(ext.name),
                        args.len()
                    ),
                );
                return None;
            }
        };
        let constructor = self.clone_with_fresh_type_vars(&constructor);

        let mut result = Vec::with_capacity(args.len());
        for (param, arg) in constructor.params.iter().zip(args) {
            if !self.type_map.is_compile_time_constant(arg.id) {
                self.type_error(arg.span, "cannot evaluate to a compile-time constant");
            }
            let arg_ty = self.get_type(arg.id, arg.span)?;
            let tvs = self.unify(span, &param.ty, &arg_ty, true)?;
            if tvs.is_identity() {
                result.push(Rc::clone(arg));
            } else {
                let new_arg = self.apply_subst_to_expr(&tvs, arg);
                result.push(new_arg);
            }
        }
        Some(result)
    }

    /// Instantiates a container (parser/control implementation or
    /// package): the constructor method is cloned with fresh variables
    /// and unified against the argument shape; every argument must be a
    /// compile-time constant.
    pub(crate) fn container_instantiation(
        &mut self,
        span: conduit_syntax::Span,
        container_ty: &TyRef,
        container: &Rc<crate::types::ty::ContainerType>,
        args: &[Rc<Expr>],
    ) -> Option<(TyRef, Vec<Rc<Expr>>)> {
        let constructor = container
            .constructor_method(Rc::clone(container_ty))
            .expect("BUG: instantiation of a container without a constructor");
        let constructor = self.clone_with_fresh_type_vars(&Rc::new(constructor));

        let mut infos = Vec::with_capacity(args.len());
        for arg in args {
            if !self.type_map.is_compile_time_constant(arg.id) {
                self.type_error(arg.span, "cannot evaluate to a compile-time constant");
            }
            let arg_ty = self.get_type(arg.id, arg.span)?;
            infos.push(ArgInfo {
                ty: arg_ty,
                is_left_value: false,
                is_constant: true,
                span: arg.span,
            });
        }

        let ret = self.fresh_var_ty();
        let shape = Rc::new(Ty::MethodCall(Rc::new(MethodCallShape {
            type_args: Vec::new(),
            return_type: Rc::clone(&ret),
            args: infos,
        })));
        let mut constraints = ConstraintSet::new();
        constraints.add_equality(Rc::new(Ty::Method(constructor)), shape);
        let tvs = match constraints.solve(span) {
            Ok(tvs) => tvs,
            Err(err) => {
                self.report(&err);
                return None;
            }
        };
        self.type_map.add_substitutions(&tvs);

        let Ty::Var(ret_var) = &*ret else {
            unreachable!("return slot is always a fresh variable");
        };
        let Some(return_ty) = tvs.resolve(ret_var.id) else {
            self.type_error(span, "cannot infer the constructor result type");
            return None;
        };

        let new_args = args
            .iter()
            .map(|a| self.apply_subst_to_expr(&tvs, a))
            .collect();
        Some((return_ty, new_args))
    }

    // ----- select expressions -----

    fn check_select(
        &mut self,
        expr: &Rc<Expr>,
        select: &Rc<Expr>,
        cases: &[SelectCase],
    ) -> Rc<Expr> {
        let ns = self.infer_expr(select);
        let mut changed = !Rc::ptr_eq(&ns, select);
        let mut new_cases = Vec::with_capacity(cases.len());
        for case in cases {
            let keyset = self.infer_expr(&case.keyset);
            let state = self.infer_expr(&case.state);
            if let Some(state_ty) = self.get_type_opt(state.id) {
                if !matches!(&*state_ty, Ty::State) {
                    self.type_error(case.span, "select case target must be a state");
                }
            }
            changed |= !Rc::ptr_eq(&keyset, &case.keyset) || !Rc::ptr_eq(&state, &case.state);
            new_cases.push(SelectCase {
                id: case.id,
                span: case.span,
                keyset,
                state,
            });
        }

        let Some(select_ty) = self.get_type(ns.id, ns.span) else {
            return self.finalize_select(expr, changed, ns, new_cases);
        };
        let Ty::Tuple(components) = &*select_ty else {
            panic!(
                "BUG: expected a tuple type for the select expression, got {}",
                short(&select_ty)
            );
        };
        for component in components {
            if matches!(&**component, Ty::Var(_) | Ty::InfInt { .. }) {
                self.type_error(ns.span, "cannot infer the type of the selector");
                return self.finalize_select(expr, changed, ns, new_cases);
            }
        }

        let components = components.clone();
        for case in &mut new_cases {
            let Some(new_keyset) = self.match_case(&select_ty, &components, case) else {
                continue;
            };
            if !Rc::ptr_eq(&new_keyset, &case.keyset) {
                changed = true;
                case.keyset = new_keyset;
            }
        }

        let node = self.finalize_select(expr, changed, ns, new_cases);
        self.set_type(node.id, Rc::new(Ty::State));
        node
    }

    fn finalize_select(
        &mut self,
        old: &Rc<Expr>,
        changed: bool,
        select: Rc<Expr>,
        cases: Vec<SelectCase>,
    ) -> Rc<Expr> {
        if changed {
            self.rebuild_expr(old, ExprKind::Select { select, cases })
        } else {
            Rc::clone(old)
        }
    }

    /// Unifies one select case's keyset with the selector type. Returns
    /// the possibly-rewritten keyset, or `None` when the case does not
    /// participate (don't-care) or an error was reported.
    fn match_case(
        &mut self,
        select_ty: &TyRef,
        components: &[TyRef],
        case: &SelectCase,
    ) -> Option<Rc<Expr>> {
        let keyset_ty = self.get_type_opt(case.keyset.id)?;
        let mut case_ty = keyset_ty;
        if let Ty::Set(element) = &*case_ty {
            case_ty = Rc::clone(element);
        }
        if matches!(&*case_ty, Ty::Dontcare) {
            return None;
        }

        let use_sel = if matches!(&*case_ty, Ty::Tuple(_)) {
            Rc::clone(select_ty)
        } else {
            if components.len() != 1 {
                self.type_error(
                    case.span,
                    format!(
                        "keyset of type {} does not match selector of type {}",
                        short(&case_ty),
                        short(select_ty)
                    ),
                );
                return None;
            }
            Rc::clone(&components[0])
        };

        let tvs = self.unify(case.span, &use_sel, &case_ty, true)?;
        if tvs.is_identity() {
            None
        } else {
            Some(self.apply_subst_to_expr(&tvs, &case.keyset))
        }
    }

    // ----- this -----

    fn check_this(&mut self, expr: &Rc<Expr>) -> Rc<Expr> {
        let instance = self.enclosing_instance();
        if instance.is_none() || self.enclosing_function().is_none() {
            self.type_error(
                expr.span,
                "'this' can only be used in the definition of an abstract method",
            );
        }
        if let Some(instance) = instance {
            if let Some(ty) = self.get_type_opt(instance) {
                self.set_type(expr.id, ty);
            }
        }
        Rc::clone(expr)
    }
}
