//! The inference visitor.
//!
//! [`TypeInference`] is a bottom-up rewriting traversal over the AST: for
//! every expression and declaration it computes the type, checks local
//! well-formedness, inserts implicit coercions, propagates the left-value
//! and compile-time-constant flags, and records the result in the type
//! map. Rewrites construct new nodes (sharing unchanged children); in
//! read-only mode any rewrite is an invariant violation.
//!
//! The traversal is split by node family:
//!
//! - [`ty`] - type-denoting positions (surface types → `TypeOf` entries)
//! - [`expr`] - expressions
//! - [`stmt`] - statements
//! - [`decl`] - declarations
//!
//! plus the canonicalizer in [`crate::canon`].

pub mod decl;
pub mod expr;
pub mod stmt;
pub mod ty;

use crate::context::{TypeMap, TypeVarSubst};
use crate::error::TypeError;
use crate::infer::ConstraintSet;
use crate::types::display::short;
use crate::types::ty::{MethodType, Ty, TyRef};
use conduit_mem::{StringInterner, Symbol};
use conduit_syntax::ast::{AstType, AstTypeKind, Expr, ExprKind, NodeId, NodeIdGen, Program};
use conduit_syntax::{Reporter, Span};
use conduit_syntax::ReferenceMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Pass mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Rewrites (inserted casts, re-widthed constants) are retained.
    Mutating,
    /// The output tree must be node-for-node identical to the input;
    /// a needed rewrite aborts the pass.
    ReadOnly,
}

/// Syntactic context the traversal is inside of, for checks that depend
/// on the enclosing construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContextFrame {
    /// Inside a parser implementation.
    Parser(NodeId),
    /// Inside a control implementation.
    Control(NodeId),
    /// Inside a function body.
    Function(NodeId),
    /// Inside an action body.
    Action(NodeId),
    /// Inside an instance initializer block.
    Instance(NodeId),
    /// Inside a table's `actions` property.
    ActionsProperty,
}

/// Builtin member names the checker compares against.
#[derive(Debug, Clone, Copy)]
pub struct WellKnown {
    /// `isValid`
    pub is_valid: Symbol,
    /// `setValid`
    pub set_valid: Symbol,
    /// `setInvalid`
    pub set_invalid: Symbol,
    /// `next`
    pub next: Symbol,
    /// `last`
    pub last: Symbol,
    /// `size`
    pub size: Symbol,
    /// `lastIndex`
    pub last_index: Symbol,
    /// `push_front`
    pub push_front: Symbol,
    /// `pop_front`
    pub pop_front: Symbol,
    /// `apply`
    pub apply: Symbol,
    /// `count` (the parameter of `push_front`/`pop_front`)
    pub count: Symbol,
}

impl WellKnown {
    /// Interns the builtin names.
    pub fn intern(interner: &mut StringInterner) -> Self {
        Self {
            is_valid: interner.intern("isValid"),
            set_valid: interner.intern("setValid"),
            set_invalid: interner.intern("setInvalid"),
            next: interner.intern("next"),
            last: interner.intern("last"),
            size: interner.intern("size"),
            last_index: interner.intern("lastIndex"),
            push_front: interner.intern("push_front"),
            pop_front: interner.intern("pop_front"),
            apply: interner.intern("apply"),
            count: interner.intern("count"),
        }
    }
}

/// The type inference pass.
pub struct TypeInference<'a> {
    pub(crate) ref_map: &'a ReferenceMap,
    pub(crate) type_map: &'a mut TypeMap,
    pub(crate) reporter: &'a Reporter,
    pub(crate) ids: Rc<NodeIdGen>,
    pub(crate) interner: Rc<RefCell<StringInterner>>,
    pub(crate) mode: Mode,
    pub(crate) wk: WellKnown,
    pub(crate) context: Vec<ContextFrame>,
    /// Argument counts of enclosing calls, innermost last; used to
    /// disambiguate extern method lookup by arity.
    pub(crate) method_args: Vec<usize>,
    rewrote: bool,
}

impl<'a> TypeInference<'a> {
    /// Creates the pass over the given collaborators.
    pub fn new(
        ref_map: &'a ReferenceMap,
        type_map: &'a mut TypeMap,
        reporter: &'a Reporter,
        ids: Rc<NodeIdGen>,
        interner: Rc<RefCell<StringInterner>>,
        mode: Mode,
    ) -> Self {
        let wk = WellKnown::intern(&mut interner.borrow_mut());
        Self {
            ref_map,
            type_map,
            reporter,
            ids,
            interner,
            mode,
            wk,
            context: Vec::new(),
            method_args: Vec::new(),
            rewrote: false,
        }
    }

    /// Runs inference over a whole program, returning the (possibly
    /// rewritten) program.
    ///
    /// # Panics
    ///
    /// Panics if a rewrite was needed in read-only mode.
    pub fn run(&mut self, program: &Program) -> Program {
        conduit_log::debug!("type inference over {} declarations", program.decls.len());
        let mut changed = false;
        let mut decls = Vec::with_capacity(program.decls.len());
        for decl in &program.decls {
            let new = self.infer_decl(decl);
            changed |= !Rc::ptr_eq(&new, decl);
            decls.push(new);
        }
        assert!(
            !(self.mode == Mode::ReadOnly && self.rewrote),
            "BUG: type inference mutated the tree in read-only mode"
        );
        if changed {
            Program::new(decls)
        } else {
            program.clone()
        }
    }

    // ----- core operations -----

    /// Entry guard: a node is visited at most once per pass.
    pub(crate) fn done(&self, node: NodeId) -> bool {
        self.type_map.contains(node)
    }

    pub(crate) fn mark_rewrite(&mut self) {
        self.rewrote = true;
    }

    /// The recorded type of a node; reports an error when missing.
    pub(crate) fn get_type(&self, node: NodeId, span: Span) -> Option<TyRef> {
        let result = self.type_map.get_type(node).cloned();
        if result.is_none() {
            self.type_error(span, "could not find type of expression");
        }
        result
    }

    /// The recorded type of a node without reporting; used where a
    /// missing child type means an error was already signalled.
    pub(crate) fn get_type_opt(&self, node: NodeId) -> Option<TyRef> {
        self.type_map.get_type(node).cloned()
    }

    /// Unwraps the `TypeOf` lift of a type-denoting node.
    ///
    /// # Panics
    ///
    /// Panics if the recorded entry is not a `TypeOf`; type-denoting
    /// positions always record lifted entries.
    pub(crate) fn get_type_type(&self, node: NodeId, span: Span) -> Option<TyRef> {
        let ty = self.get_type(node, span)?;
        match &*ty {
            Ty::TypeOf(inner) => Some(Rc::clone(inner)),
            other => panic!("BUG: expected a type-denoting entry, got {}", short(other)),
        }
    }

    pub(crate) fn set_type(&mut self, node: NodeId, ty: TyRef) {
        self.type_map.set_type(node, ty);
    }

    /// Reports a type error and continues.
    pub(crate) fn type_error(&self, span: Span, message: impl Into<String>) {
        self.reporter.error(span, message);
    }

    /// Reports a solver/canonicalizer error at its own position.
    pub(crate) fn report(&self, err: &TypeError) {
        self.reporter.error(err.span(), err.to_string());
    }

    /// Resolves a symbol for diagnostics.
    pub(crate) fn name_of(&self, sym: Symbol) -> String {
        self.interner
            .borrow()
            .resolve(sym)
            .unwrap_or("<unknown>")
            .to_string()
    }

    /// Unifies `dest` with `src`, composing the result into the global
    /// substitution. Returns `None` after reporting (when `report`) on
    /// failure.
    pub(crate) fn unify(
        &mut self,
        span: Span,
        dest: &TyRef,
        src: &TyRef,
        report: bool,
    ) -> Option<TypeVarSubst> {
        if Rc::ptr_eq(dest, src) || dest == src {
            return Some(TypeVarSubst::new());
        }
        let mut constraints = ConstraintSet::new();
        constraints.add_equality(Rc::clone(dest), Rc::clone(src));
        match constraints.solve(span) {
            Ok(tvs) => {
                self.type_map.add_substitutions(&tvs);
                Some(tvs)
            }
            Err(err) => {
                if report {
                    self.report(&err);
                }
                None
            }
        }
    }

    /// The explicit-cast table: identity, `Bits`→`Bits` of the same width
    /// or the same signedness, and `bit<1>` ↔ `bool`.
    pub(crate) fn can_cast_between(&self, dest: &TyRef, src: &TyRef) -> bool {
        if TypeMap::equivalent(dest, src) {
            return true;
        }
        match (&**src, &**dest) {
            (
                Ty::Bits {
                    width: fw,
                    signed: fs,
                },
                Ty::Bits {
                    width: tw,
                    signed: ts,
                },
            ) => fw == tw || fs == ts,
            (Ty::Bits { width, signed }, Ty::Bool) => *width == 1 && !signed,
            (Ty::Bool, Ty::Bits { width, signed }) => *width == 1 && !signed,
            _ => false,
        }
    }

    /// Assignment-style coercion of `expr` to `dest`: identity, then an
    /// implicit cast where the cast table allows, then unification with
    /// constant re-widthing. Used for initializers, `return`,
    /// assignments, and call arguments.
    pub(crate) fn assignment(
        &mut self,
        error_span: Span,
        dest: &TyRef,
        expr: &Rc<Expr>,
    ) -> Rc<Expr> {
        let Some(init_ty) = self.get_type_opt(expr.id) else {
            return Rc::clone(expr);
        };
        if TypeMap::equivalent(&init_ty, dest) {
            return Rc::clone(expr);
        }

        if self.can_cast_between(dest, &init_ty) {
            conduit_log::debug!("inserting cast to {}", short(dest));
            let is_const = self.type_map.is_compile_time_constant(expr.id);
            let Some(target) = self.synth_ast_type(expr.span, dest) else {
                return Rc::clone(expr);
            };
            let cast = self.new_expr(
                expr.span,
                ExprKind::Cast {
                    target,
                    expr: Rc::clone(expr),
                },
            );
            self.set_type(cast.id, Rc::clone(dest));
            if is_const {
                self.type_map.set_compile_time_constant(cast.id);
            }
            return cast;
        }

        match self.unify(error_span, dest, &init_ty, true) {
            Some(tvs) if !tvs.is_identity() => self.apply_subst_to_expr(&tvs, expr),
            Some(_) => Rc::clone(expr),
            None => Rc::clone(expr),
        }
    }

    /// Mints a synthesized expression node.
    pub(crate) fn new_expr(&mut self, span: Span, kind: ExprKind) -> Rc<Expr> {
        self.mark_rewrite();
        Rc::new(Expr {
            id: self.ids.next(),
            span,
            kind,
        })
    }

    /// Rebuilds a node around changed children, copying the original's
    /// type and flags to the replacement.
    pub(crate) fn rebuild_expr(&mut self, old: &Rc<Expr>, kind: ExprKind) -> Rc<Expr> {
        let node = self.new_expr(old.span, kind);
        self.type_map.copy_entry(old.id, node.id);
        node
    }

    /// A surface type node for an implicitly inserted cast target. Only
    /// the castable types (`Bits`, `Bool`) need a surface form.
    pub(crate) fn synth_ast_type(&mut self, span: Span, ty: &TyRef) -> Option<Rc<AstType>> {
        let kind = match &**ty {
            Ty::Bits { width, signed } => AstTypeKind::Bits {
                width: *width,
                signed: *signed,
            },
            Ty::Bool => AstTypeKind::Bool,
            other => panic!("BUG: no surface syntax for cast target {}", short(other)),
        };
        let node = Rc::new(AstType {
            id: self.ids.next(),
            span,
            kind,
        });
        self.set_type(node.id, Rc::new(Ty::TypeOf(Rc::clone(ty))));
        Some(node)
    }

    /// Clones a method type, replacing its type parameters with fresh
    /// unification variables. Every generic invocation gets its own set.
    pub(crate) fn clone_with_fresh_type_vars(&mut self, method: &Rc<MethodType>) -> Rc<MethodType> {
        if method.type_params.is_empty() {
            return Rc::clone(method);
        }
        let mut tvs = TypeVarSubst::new();
        let fresh: Vec<_> = method
            .type_params
            .iter()
            .map(|tp| {
                let nv = self.type_map.fresh_var(tp.name);
                tvs.bind(tp.id, Rc::new(Ty::Var(nv)));
                nv
            })
            .collect();
        let applied = tvs.apply(&Rc::new(Ty::Method(Rc::clone(method))));
        match &*applied {
            Ty::Method(m) => Rc::new(MethodType {
                type_params: fresh,
                return_type: m.return_type.clone(),
                params: m.params.clone(),
            }),
            other => panic!("BUG: substitution changed a method into {}", short(other)),
        }
    }

    /// A fresh unification variable as a type.
    pub(crate) fn fresh_var_ty(&mut self) -> TyRef {
        let v = self.type_map.fresh_var(None);
        Rc::new(Ty::Var(v))
    }

    /// Applies a solver result to an expression tree: integer literals
    /// whose type resolved to a concrete width are replaced by re-typed
    /// constants; rebuilt parents inherit the substituted type and the
    /// original's flags.
    pub(crate) fn apply_subst_to_expr(&mut self, tvs: &TypeVarSubst, expr: &Rc<Expr>) -> Rc<Expr> {
        if tvs.is_identity() {
            return Rc::clone(expr);
        }
        self.apply_subst_inner(tvs, expr)
    }

    fn apply_subst_inner(&mut self, tvs: &TypeVarSubst, expr: &Rc<Expr>) -> Rc<Expr> {
        match &expr.kind {
            ExprKind::Constant { value, width: None } => {
                let Some(ty) = self.get_type_opt(expr.id) else {
                    return Rc::clone(expr);
                };
                let resolved = tvs.apply(&ty);
                let Some((w, s)) = resolved.as_bits() else {
                    // The substitution could not infer a width.
                    return Rc::clone(expr);
                };
                conduit_log::debug!("inferred bit<{w}> for literal {value}");
                let node = self.new_expr(
                    expr.span,
                    ExprKind::Constant {
                        value: *value,
                        width: Some((w, s)),
                    },
                );
                let bits = self.type_map.bits(w, s);
                self.set_type(node.id, bits);
                self.type_map.set_compile_time_constant(node.id);
                node
            }
            ExprKind::Unary { op, expr: inner } => {
                let new = self.apply_subst_inner(tvs, inner);
                if Rc::ptr_eq(&new, inner) {
                    Rc::clone(expr)
                } else {
                    self.rebuild_substituted(
                        tvs,
                        expr,
                        ExprKind::Unary {
                            op: *op,
                            expr: new,
                        },
                    )
                }
            }
            ExprKind::Binary { op, left, right } => {
                let nl = self.apply_subst_inner(tvs, left);
                let nr = self.apply_subst_inner(tvs, right);
                if Rc::ptr_eq(&nl, left) && Rc::ptr_eq(&nr, right) {
                    Rc::clone(expr)
                } else {
                    self.rebuild_substituted(
                        tvs,
                        expr,
                        ExprKind::Binary {
                            op: *op,
                            left: nl,
                            right: nr,
                        },
                    )
                }
            }
            ExprKind::Mux {
                cond,
                then_expr,
                else_expr,
            } => {
                let nc = self.apply_subst_inner(tvs, cond);
                let nt = self.apply_subst_inner(tvs, then_expr);
                let ne = self.apply_subst_inner(tvs, else_expr);
                if Rc::ptr_eq(&nc, cond) && Rc::ptr_eq(&nt, then_expr) && Rc::ptr_eq(&ne, else_expr)
                {
                    Rc::clone(expr)
                } else {
                    self.rebuild_substituted(
                        tvs,
                        expr,
                        ExprKind::Mux {
                            cond: nc,
                            then_expr: nt,
                            else_expr: ne,
                        },
                    )
                }
            }
            ExprKind::List { components } => {
                let mut changed = false;
                let new: Vec<_> = components
                    .iter()
                    .map(|c| {
                        let n = self.apply_subst_inner(tvs, c);
                        changed |= !Rc::ptr_eq(&n, c);
                        n
                    })
                    .collect();
                if changed {
                    self.rebuild_substituted(tvs, expr, ExprKind::List { components: new })
                } else {
                    Rc::clone(expr)
                }
            }
            ExprKind::Cast { target, expr: inner } => {
                let new = self.apply_subst_inner(tvs, inner);
                if Rc::ptr_eq(&new, inner) {
                    Rc::clone(expr)
                } else {
                    self.rebuild_substituted(
                        tvs,
                        expr,
                        ExprKind::Cast {
                            target: Rc::clone(target),
                            expr: new,
                        },
                    )
                }
            }
            ExprKind::Call {
                method,
                type_args,
                args,
            } => {
                let mut changed = false;
                let new_args: Vec<_> = args
                    .iter()
                    .map(|a| {
                        let n = self.apply_subst_inner(tvs, a);
                        changed |= !Rc::ptr_eq(&n, a);
                        n
                    })
                    .collect();
                if changed {
                    self.rebuild_substituted(
                        tvs,
                        expr,
                        ExprKind::Call {
                            method: Rc::clone(method),
                            type_args: type_args.clone(),
                            args: new_args,
                        },
                    )
                } else {
                    Rc::clone(expr)
                }
            }
            // Remaining forms either cannot contain a width-free literal
            // in a coercible position or are rewritten by their own
            // checks; the final substitution grounds their recorded
            // types.
            _ => Rc::clone(expr),
        }
    }

    fn rebuild_substituted(
        &mut self,
        tvs: &TypeVarSubst,
        old: &Rc<Expr>,
        kind: ExprKind,
    ) -> Rc<Expr> {
        let node = self.new_expr(old.span, kind);
        if let Some(ty) = self.get_type_opt(old.id) {
            self.set_type(node.id, tvs.apply(&ty));
        }
        if self.type_map.is_compile_time_constant(old.id) {
            self.type_map.set_compile_time_constant(node.id);
        }
        if self.type_map.is_left_value(old.id) {
            self.type_map.set_left_value(node.id);
        }
        node
    }

    // ----- context stack -----

    pub(crate) fn push_context(&mut self, frame: ContextFrame) {
        self.context.push(frame);
    }

    pub(crate) fn pop_context(&mut self) {
        self.context.pop();
    }

    pub(crate) fn in_parser(&self) -> bool {
        self.context
            .iter()
            .any(|f| matches!(f, ContextFrame::Parser(_)))
    }

    pub(crate) fn in_control(&self) -> bool {
        self.context
            .iter()
            .any(|f| matches!(f, ContextFrame::Control(_)))
    }

    pub(crate) fn in_action(&self) -> bool {
        self.context
            .iter()
            .any(|f| matches!(f, ContextFrame::Action(_)))
    }

    pub(crate) fn in_actions_property(&self) -> bool {
        self.context
            .iter()
            .any(|f| matches!(f, ContextFrame::ActionsProperty))
    }

    /// The innermost enclosing function, if any.
    pub(crate) fn enclosing_function(&self) -> Option<NodeId> {
        self.context.iter().rev().find_map(|f| match f {
            ContextFrame::Function(id) => Some(*id),
            _ => None,
        })
    }

    /// The innermost enclosing instance initializer, if any.
    pub(crate) fn enclosing_instance(&self) -> Option<NodeId> {
        self.context.iter().rev().find_map(|f| match f {
            ContextFrame::Instance(id) => Some(*id),
            _ => None,
        })
    }
}
