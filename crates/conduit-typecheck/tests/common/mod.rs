//! Test support: a minimal name resolver.
//!
//! Resolution is not part of the type core; production front-ends run
//! their own resolver pass before type checking. The tests use this small
//! scope-stack resolver to populate the reference map for programs built
//! with `AstBuilder`.

use conduit_mem::Symbol;
use conduit_syntax::ast::stmt::SwitchLabel;
use conduit_syntax::ast::{
    AstType, AstTypeKind, Decl, DeclKind, Expr, ExprKind, Program, Stmt, StmtKind,
};
use conduit_syntax::{AstBuilder, ReferenceMap};
use std::collections::HashMap;
use std::rc::Rc;

/// Resolves every path in `program`, populating `map`.
pub fn resolve(builder: &AstBuilder, program: &Program, map: &mut ReferenceMap) {
    let mut resolver = Resolver {
        map,
        error_sym: builder.sym("error"),
        scopes: vec![HashMap::new()],
    };
    // Top-level declarations are mutually visible.
    for decl in &program.decls {
        resolver.declare(decl);
    }
    for decl in &program.decls {
        resolver.walk_decl(decl);
    }
}

struct Resolver<'a> {
    map: &'a mut ReferenceMap,
    error_sym: Symbol,
    scopes: Vec<HashMap<Symbol, Rc<Decl>>>,
}

impl Resolver<'_> {
    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, decl: &Rc<Decl>) {
        match &decl.kind {
            DeclKind::Errors { members } => {
                // The namespace itself is named by the `error` keyword.
                self.scopes
                    .last_mut()
                    .unwrap()
                    .insert(self.error_sym, Rc::clone(decl));
                for member in members {
                    self.declare(member);
                }
            }
            DeclKind::MatchKinds { members } => {
                for member in members {
                    self.declare(member);
                }
            }
            _ => {
                if let Some(name) = decl.name() {
                    self.scopes.last_mut().unwrap().insert(name, Rc::clone(decl));
                }
            }
        }
    }

    fn lookup(&self, name: Symbol) -> Option<Rc<Decl>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).cloned())
    }

    fn bind(&mut self, path: &conduit_syntax::Path) {
        match self.lookup(path.name) {
            Some(decl) => self.map.declare(path.id, decl),
            None => panic!("test resolver: unresolved name at {}", path.span),
        }
    }

    fn walk_decl(&mut self, decl: &Rc<Decl>) {
        match &decl.kind {
            DeclKind::Constant {
                ty, initializer, ..
            } => {
                self.walk_type(ty);
                self.walk_expr(initializer);
            }
            DeclKind::Variable {
                ty, initializer, ..
            } => {
                self.walk_type(ty);
                if let Some(init) = initializer {
                    self.walk_expr(init);
                }
            }
            DeclKind::Instance {
                ty,
                args,
                initializer,
                ..
            } => {
                self.walk_type(ty);
                for arg in args {
                    self.walk_expr(arg);
                }
                if let Some(decls) = initializer {
                    self.push();
                    for d in decls {
                        self.declare(d);
                    }
                    for d in decls {
                        self.walk_decl(d);
                    }
                    self.pop();
                }
            }
            DeclKind::Param { ty, default, .. } => {
                self.walk_type(ty);
                if let Some(d) = default {
                    self.walk_expr(d);
                }
            }
            DeclKind::TypeParam { .. } | DeclKind::Member { .. } => {}
            DeclKind::Struct { fields, .. }
            | DeclKind::Header { fields, .. }
            | DeclKind::Union { fields, .. } => {
                for field in fields {
                    self.walk_type(&field.ty);
                }
            }
            DeclKind::Enum { .. } | DeclKind::Errors { .. } | DeclKind::MatchKinds { .. } => {}
            DeclKind::Typedef { ty, .. } => self.walk_type(ty),
            DeclKind::Extern {
                type_params,
                methods,
                ..
            } => {
                self.push();
                for tp in type_params {
                    self.declare(tp);
                }
                for method in methods {
                    self.walk_decl(method);
                }
                self.pop();
            }
            DeclKind::Method {
                type_params,
                return_type,
                params,
                ..
            } => {
                self.push();
                for tp in type_params {
                    self.declare(tp);
                }
                if let Some(rt) = return_type {
                    self.walk_type(rt);
                }
                for p in params {
                    self.declare(p);
                    self.walk_decl(p);
                }
                self.pop();
            }
            DeclKind::ParserType {
                type_params,
                apply_params,
                ..
            }
            | DeclKind::ControlType {
                type_params,
                apply_params,
                ..
            } => {
                self.push();
                for tp in type_params {
                    self.declare(tp);
                }
                for p in apply_params {
                    self.declare(p);
                    self.walk_decl(p);
                }
                self.pop();
            }
            DeclKind::Package {
                type_params,
                ctor_params,
                ..
            } => {
                self.push();
                for tp in type_params {
                    self.declare(tp);
                }
                for p in ctor_params {
                    self.declare(p);
                    self.walk_decl(p);
                }
                self.pop();
            }
            DeclKind::Parser {
                type_params,
                apply_params,
                ctor_params,
                locals,
                states,
                ..
            } => {
                self.push();
                for d in type_params.iter().chain(apply_params).chain(ctor_params) {
                    self.declare(d);
                    self.walk_decl(d);
                }
                for d in locals.iter().chain(states) {
                    self.declare(d);
                }
                for d in locals.iter().chain(states) {
                    self.walk_decl(d);
                }
                self.pop();
            }
            DeclKind::Control {
                type_params,
                apply_params,
                ctor_params,
                locals,
                body,
                ..
            } => {
                self.push();
                for d in type_params.iter().chain(apply_params).chain(ctor_params) {
                    self.declare(d);
                    self.walk_decl(d);
                }
                for d in locals {
                    self.declare(d);
                }
                for d in locals {
                    self.walk_decl(d);
                }
                self.walk_stmt(body);
                self.pop();
            }
            DeclKind::State {
                body, transition, ..
            } => {
                self.push();
                for s in body {
                    self.walk_stmt(s);
                }
                if let Some(t) = transition {
                    self.walk_expr(t);
                }
                self.pop();
            }
            DeclKind::Function {
                type_params,
                return_type,
                params,
                body,
                ..
            } => {
                self.push();
                for tp in type_params {
                    self.declare(tp);
                }
                if let Some(rt) = return_type {
                    self.walk_type(rt);
                }
                for p in params {
                    self.declare(p);
                    self.walk_decl(p);
                }
                self.walk_stmt(body);
                self.pop();
            }
            DeclKind::Action { params, body, .. } => {
                self.push();
                for p in params {
                    self.declare(p);
                    self.walk_decl(p);
                }
                self.walk_stmt(body);
                self.pop();
            }
            DeclKind::Table {
                keys,
                actions,
                default_action,
                ..
            } => {
                for key in keys {
                    self.walk_expr(&key.expr);
                    self.walk_expr(&key.match_kind);
                }
                for a in actions {
                    self.walk_expr(&a.expr);
                }
                if let Some(d) = default_action {
                    self.walk_expr(d);
                }
            }
        }
    }

    fn walk_stmt(&mut self, stmt: &Rc<Stmt>) {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                self.push();
                for s in stmts {
                    // Local declarations are visible from their statement on.
                    if let StmtKind::Decl(d) = &s.kind {
                        self.declare(d);
                    }
                    self.walk_stmt(s);
                }
                self.pop();
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.walk_expr(condition);
                self.walk_stmt(then_branch);
                if let Some(e) = else_branch {
                    self.walk_stmt(e);
                }
            }
            StmtKind::Switch { expression, cases } => {
                self.walk_expr(expression);
                for case in cases {
                    if let SwitchLabel::Action(path) = &case.label {
                        self.bind(&path.clone());
                    }
                    if let Some(body) = &case.body {
                        self.walk_stmt(body);
                    }
                }
            }
            StmtKind::Return(value) => {
                if let Some(v) = value {
                    self.walk_expr(v);
                }
            }
            StmtKind::Assign { target, value } => {
                self.walk_expr(target);
                self.walk_expr(value);
            }
            StmtKind::Call(call) => self.walk_expr(call),
            StmtKind::Decl(decl) => self.walk_decl(decl),
            StmtKind::Empty => {}
        }
    }

    fn walk_expr(&mut self, expr: &Rc<Expr>) {
        match &expr.kind {
            ExprKind::Constant { .. }
            | ExprKind::Bool(_)
            | ExprKind::StringLit(_)
            | ExprKind::Default
            | ExprKind::This => {}
            ExprKind::PathRef(path) => self.bind(&path.clone()),
            ExprKind::Member { base, .. } => self.walk_expr(base),
            ExprKind::Index { base, index } => {
                self.walk_expr(base);
                self.walk_expr(index);
            }
            ExprKind::Slice { base, msb, lsb } => {
                self.walk_expr(base);
                self.walk_expr(msb);
                self.walk_expr(lsb);
            }
            ExprKind::Cast { target, expr } => {
                self.walk_type(target);
                self.walk_expr(expr);
            }
            ExprKind::Unary { expr, .. } => self.walk_expr(expr),
            ExprKind::Binary { left, right, .. } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            ExprKind::Mux {
                cond,
                then_expr,
                else_expr,
            } => {
                self.walk_expr(cond);
                self.walk_expr(then_expr);
                self.walk_expr(else_expr);
            }
            ExprKind::List { components } => {
                for c in components {
                    self.walk_expr(c);
                }
            }
            ExprKind::Call {
                method,
                type_args,
                args,
            } => {
                self.walk_expr(method);
                for t in type_args {
                    self.walk_type(t);
                }
                for a in args {
                    self.walk_expr(a);
                }
            }
            ExprKind::ConstructorCall { ty, args } => {
                self.walk_type(ty);
                for a in args {
                    self.walk_expr(a);
                }
            }
            ExprKind::Select { select, cases } => {
                self.walk_expr(select);
                for case in cases {
                    self.walk_expr(&case.keyset);
                    self.walk_expr(&case.state);
                }
            }
        }
    }

    fn walk_type(&mut self, ty: &Rc<AstType>) {
        match &ty.kind {
            AstTypeKind::Bits { .. }
            | AstTypeKind::Varbits { .. }
            | AstTypeKind::Bool
            | AstTypeKind::String
            | AstTypeKind::Void
            | AstTypeKind::Dontcare => {}
            AstTypeKind::Tuple(components) => {
                for c in components {
                    self.walk_type(c);
                }
            }
            AstTypeKind::Stack { element, size } => {
                self.walk_type(element);
                self.walk_expr(size);
            }
            AstTypeKind::Name(path) => self.bind(&path.clone()),
            AstTypeKind::Specialized { base, args } => {
                self.bind(&base.clone());
                for a in args {
                    self.walk_type(a);
                }
            }
        }
    }
}
