//! Statement checking.
//!
//! Statements are not typed themselves; checking them types their
//! expressions, enforces the statement-level rules (boolean conditions,
//! left-value assignment targets, return/function agreement, switch
//! labels), and rewrites coerced children.

use crate::check::TypeInference;
use crate::types::display::short;
use crate::types::ty::Ty;
use conduit_syntax::ast::stmt::{SwitchCase, SwitchLabel};
use conduit_syntax::ast::{Stmt, StmtKind};
use std::collections::HashSet;
use std::rc::Rc;

impl TypeInference<'_> {
    /// Checks a statement, returning the possibly-rewritten node.
    pub(crate) fn infer_stmt(&mut self, stmt: &Rc<Stmt>) -> Rc<Stmt> {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                let mut changed = false;
                let new: Vec<_> = stmts
                    .iter()
                    .map(|s| {
                        let n = self.infer_stmt(s);
                        changed |= !Rc::ptr_eq(&n, s);
                        n
                    })
                    .collect();
                self.finalize_stmt(stmt, changed, StmtKind::Block(new))
            }

            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let nc = self.infer_expr(condition);
                if let Some(ty) = self.get_type_opt(nc.id) {
                    if !matches!(&*ty, Ty::Bool) {
                        self.type_error(
                            condition.span,
                            format!(
                                "condition of if does not evaluate to bool but {}",
                                short(&ty)
                            ),
                        );
                    }
                }
                let nt = self.infer_stmt(then_branch);
                let ne = else_branch.as_ref().map(|e| self.infer_stmt(e));
                let changed = !Rc::ptr_eq(&nc, condition)
                    || !Rc::ptr_eq(&nt, then_branch)
                    || match (&ne, else_branch) {
                        (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
                        _ => false,
                    };
                self.finalize_stmt(
                    stmt,
                    changed,
                    StmtKind::If {
                        condition: nc,
                        then_branch: nt,
                        else_branch: ne,
                    },
                )
            }

            StmtKind::Switch { expression, cases } => self.check_switch(stmt, expression, cases),

            StmtKind::Return(value) => self.check_return(stmt, value.as_ref()),

            StmtKind::Assign { target, value } => {
                let nt = self.infer_expr(target);
                let nv = self.infer_expr(value);
                let Some(target_ty) = self.get_type_opt(nt.id) else {
                    return self.finalize_stmt(
                        stmt,
                        !Rc::ptr_eq(&nt, target) || !Rc::ptr_eq(&nv, value),
                        StmtKind::Assign {
                            target: nt,
                            value: nv,
                        },
                    );
                };
                if !self.type_map.is_left_value(nt.id) {
                    self.type_error(
                        target.span,
                        "expression cannot be the target of an assignment",
                    );
                    return self.finalize_stmt(
                        stmt,
                        !Rc::ptr_eq(&nt, target) || !Rc::ptr_eq(&nv, value),
                        StmtKind::Assign {
                            target: nt,
                            value: nv,
                        },
                    );
                }
                let coerced = self.assignment(stmt.span, &target_ty, &nv);
                let changed = !Rc::ptr_eq(&nt, target) || !Rc::ptr_eq(&coerced, value);
                self.finalize_stmt(
                    stmt,
                    changed,
                    StmtKind::Assign {
                        target: nt,
                        value: coerced,
                    },
                )
            }

            StmtKind::Call(call) => {
                let nc = self.infer_expr(call);
                let changed = !Rc::ptr_eq(&nc, call);
                self.finalize_stmt(stmt, changed, StmtKind::Call(nc))
            }

            StmtKind::Decl(decl) => {
                let nd = self.infer_decl(decl);
                let changed = !Rc::ptr_eq(&nd, decl);
                self.finalize_stmt(stmt, changed, StmtKind::Decl(nd))
            }

            StmtKind::Empty => Rc::clone(stmt),
        }
    }

    fn finalize_stmt(&mut self, old: &Rc<Stmt>, changed: bool, kind: StmtKind) -> Rc<Stmt> {
        if !changed {
            return Rc::clone(old);
        }
        self.mark_rewrite();
        Rc::new(Stmt {
            id: self.ids.next(),
            span: old.span,
            kind,
        })
    }

    /// A switch scrutinee must be the action enum a table's `apply()`
    /// produces; labels name its actions, without duplicates.
    fn check_switch(
        &mut self,
        stmt: &Rc<Stmt>,
        expression: &Rc<conduit_syntax::Expr>,
        cases: &[SwitchCase],
    ) -> Rc<Stmt> {
        let ne = self.infer_expr(expression);
        let mut changed = !Rc::ptr_eq(&ne, expression);

        let action_enum = match self.get_type_opt(ne.id) {
            Some(ty) => match &*ty {
                Ty::ActionEnum(ae) => Some(Rc::clone(ae)),
                _ => {
                    self.type_error(
                        expression.span,
                        "switch condition can only be produced by table.apply()",
                    );
                    None
                }
            },
            None => None,
        };

        let mut seen = HashSet::new();
        let mut new_cases = Vec::with_capacity(cases.len());
        for case in cases {
            if let SwitchLabel::Action(path) = &case.label {
                if !seen.insert(path.name) {
                    self.type_error(case.span, "duplicate switch label");
                }
                if let Some(ae) = &action_enum {
                    if !ae.contains(path.name) {
                        self.type_error(
                            case.span,
                            format!(
                                "{} is not a legal label (action name)",
                                self.name_of(path.name)
                            ),
                        );
                    }
                }
            }
            let body = case.body.as_ref().map(|b| self.infer_stmt(b));
            changed |= match (&body, &case.body) {
                (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
                _ => false,
            };
            new_cases.push(SwitchCase {
                id: case.id,
                span: case.span,
                label: case.label.clone(),
                body,
            });
        }

        self.finalize_stmt(
            stmt,
            changed,
            StmtKind::Switch {
                expression: ne,
                cases: new_cases,
            },
        )
    }

    /// Return agreement with the enclosing function: a bare `return`
    /// requires a void function, a valued `return` coerces to the
    /// declared return type, and valued returns outside functions are
    /// errors.
    fn check_return(
        &mut self,
        stmt: &Rc<Stmt>,
        value: Option<&Rc<conduit_syntax::Expr>>,
    ) -> Rc<Stmt> {
        let new_value = value.map(|v| self.infer_expr(v));

        let Some(function) = self.enclosing_function() else {
            if value.is_some() {
                self.type_error(
                    stmt.span,
                    "return with expression can only be used in a function",
                );
            }
            return self.finalize_return(stmt, value, new_value);
        };

        let Some(function_ty) = self.get_type_opt(function) else {
            return self.finalize_return(stmt, value, new_value);
        };
        let Ty::Method(method) = &*function_ty else {
            panic!(
                "BUG: expected a method type for a function, got {}",
                short(&function_ty)
            );
        };
        let return_ty = method
            .return_type
            .clone()
            .unwrap_or_else(|| Rc::new(Ty::Void));

        if matches!(&*return_ty, Ty::Void) {
            if value.is_some() {
                self.type_error(stmt.span, "return with expression in a function returning void");
            }
            return self.finalize_return(stmt, value, new_value);
        }

        let Some(nv) = new_value else {
            self.type_error(
                stmt.span,
                format!(
                    "return with no expression in a function returning {}",
                    short(&return_ty)
                ),
            );
            return self.finalize_return(stmt, value, None);
        };

        let coerced = self.assignment(stmt.span, &return_ty, &nv);
        self.finalize_return(stmt, value, Some(coerced))
    }

    fn finalize_return(
        &mut self,
        old: &Rc<Stmt>,
        old_value: Option<&Rc<conduit_syntax::Expr>>,
        new_value: Option<Rc<conduit_syntax::Expr>>,
    ) -> Rc<Stmt> {
        let changed = match (&new_value, old_value) {
            (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
            (None, None) => false,
            _ => true,
        };
        self.finalize_stmt(old, changed, StmtKind::Return(new_value))
    }
}
