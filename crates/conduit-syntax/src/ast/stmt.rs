//! Statement nodes.

use super::decl::Decl;
use super::expr::Expr;
use super::{NodeId, Path};
use crate::span::{Span, Spanned};
use std::rc::Rc;

/// A statement.
#[derive(Debug, Clone)]
pub struct Stmt {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The statement form.
    pub kind: StmtKind,
}

/// The forms a statement can take.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `{ ... }`
    Block(Vec<Rc<Stmt>>),
    /// `if (cond) then else other`
    If {
        /// The condition; must be `bool`.
        condition: Rc<Expr>,
        /// The then branch.
        then_branch: Rc<Stmt>,
        /// The optional else branch.
        else_branch: Option<Rc<Stmt>>,
    },
    /// `switch (t.apply()) { label: { ... } }`
    Switch {
        /// The scrutinee; must be a table's action enum.
        expression: Rc<Expr>,
        /// The cases in source order.
        cases: Vec<SwitchCase>,
    },
    /// `return;` / `return e;`
    Return(Option<Rc<Expr>>),
    /// `target = value;`
    Assign {
        /// The assignment target; must be a left-value.
        target: Rc<Expr>,
        /// The assigned value.
        value: Rc<Expr>,
    },
    /// An expression statement; the expression is a call.
    Call(Rc<Expr>),
    /// A local declaration (variable or constant).
    Decl(Rc<Decl>),
    /// `;`
    Empty,
}

/// One case of a switch statement.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The case label.
    pub label: SwitchLabel,
    /// The case body; `None` for fall-through labels.
    pub body: Option<Rc<Stmt>>,
}

/// A switch-case label.
#[derive(Debug, Clone)]
pub enum SwitchLabel {
    /// `default:`
    Default,
    /// An action name.
    Action(Rc<Path>),
}

impl Spanned for Stmt {
    fn span(&self) -> Span {
        self.span
    }
}
