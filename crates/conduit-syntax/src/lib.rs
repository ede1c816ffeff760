//! Conduit syntax: AST, spans, reference map, and diagnostics.
//!
//! This crate is the front-end substrate the type checker consumes:
//!
//! - [`span`] — source location tracking
//! - [`ast`] — the immutable, `Rc`-shared syntax tree with per-node ids
//! - [`builder`] — node construction primitives
//! - [`refs`] — the path → declaration reference map
//! - [`diagnostic`] — the error/warning sink
//!
//! Parsing and name resolution live outside this crate; they produce the
//! [`ast::Program`] and the [`refs::ReferenceMap`] the rest of the
//! front-end operates on.

#![warn(missing_docs)]

pub mod ast;
pub mod builder;
pub mod diagnostic;
pub mod refs;
pub mod span;

pub use ast::{Decl, DeclKind, Direction, Expr, ExprKind, NodeId, NodeIdGen, Path, Program, Stmt};
pub use builder::AstBuilder;
pub use diagnostic::{Diagnostic, Level, Reporter};
pub use refs::ReferenceMap;
pub use span::{LineCol, Span, Spanned};
