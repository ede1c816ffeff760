//! Core type representation.
//!
//! This module defines [`Ty`], the internal type algebra the checker
//! infers over. It is distinct from `conduit_syntax::ast::AstType`, which
//! is the type syntax as written; the inference visitor maps surface
//! syntax to values of this algebra and records the association in the
//! type map.
//!
//! # Design
//!
//! - Types are immutable and shared via [`TyRef`] (`Rc<Ty>`). The
//!   canonicalizer hash-conses structural types so that representatives
//!   can be compared by pointer.
//! - [`TypeVar`] and width-free integer literals (`InfInt`) are the
//!   unification variables; both draw ids from the type map's counter and
//!   are bound by the constraint solver.
//! - Named types (structs, headers, unions, enums, externs, containers)
//!   carry the `NodeId` of their declaration; two named types are the
//!   same type exactly when they come from the same declaration.

use conduit_mem::Symbol;
use conduit_syntax::ast::NodeId;
use conduit_syntax::{Direction, Span};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Shared reference to a type.
pub type TyRef = Rc<Ty>;

/// A unification variable.
///
/// Equality and hashing are by `id` only; `name` is advisory (the source
/// type-parameter name the variable was cloned from, if any).
#[derive(Debug, Clone, Copy, Eq)]
pub struct TypeVar {
    /// Unique id, from the type map's counter.
    pub id: u32,
    /// Originating type-parameter name, if any.
    pub name: Option<Symbol>,
}

impl PartialEq for TypeVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for TypeVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A field of a struct-like type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    /// Field name.
    pub name: Symbol,
    /// Field type.
    pub ty: TyRef,
}

/// Payload of `Struct`, `Header`, and `Union` types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    /// The declaring node; the type's identity.
    pub def: NodeId,
    /// Type name.
    pub name: Symbol,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
}

impl StructType {
    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: Symbol) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Payload of `Enum` types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    /// The declaring node; the type's identity.
    pub def: NodeId,
    /// Type name.
    pub name: Symbol,
    /// Member names in declaration order.
    pub members: Vec<Symbol>,
}

/// Payload of `ActionEnum` types, synthesized per table from its actions
/// list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionEnumType {
    /// The declaring table node.
    pub table: NodeId,
    /// The action names.
    pub members: Vec<Symbol>,
}

impl ActionEnumType {
    /// Returns `true` if `name` is one of the table's actions.
    #[must_use]
    pub fn contains(&self, name: Symbol) -> bool {
        self.members.contains(&name)
    }
}

/// Payload of `Table` types, synthesized per table declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableType {
    /// The declaring node; the type's identity.
    pub def: NodeId,
    /// Table name.
    pub name: Symbol,
    /// The action enum `apply()` produces.
    pub action_enum: Rc<ActionEnumType>,
}

/// A parameter of a method, action, or container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    /// Parameter name.
    pub name: Symbol,
    /// Passing direction.
    pub direction: Direction,
    /// Parameter type.
    pub ty: TyRef,
}

/// A method or function type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodType {
    /// Generic parameters; empty for non-generic methods.
    pub type_params: Vec<TypeVar>,
    /// Return type; `None` for constructors.
    pub return_type: Option<TyRef>,
    /// Parameters in declaration order.
    pub params: Vec<Param>,
}

/// An action type: no return, no generics. The result of partially
/// applying an action is another `ActionType` holding the unbound suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionType {
    /// The (remaining) parameters.
    pub params: Vec<Param>,
}

/// One method of an extern type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternMethod {
    /// Method name; equal to the extern's name for constructors.
    pub name: Symbol,
    /// The method type.
    pub ty: Rc<MethodType>,
    /// `true` if the method must be overridden per instance.
    pub is_abstract: bool,
}

/// Result of an extern method lookup by name and argument count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodLookup<'a> {
    /// Exactly one method matched.
    Found(&'a ExternMethod),
    /// No method matched.
    NotFound,
    /// More than one method matched; the call is ambiguous.
    Ambiguous,
}

/// Payload of `Extern` types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternType {
    /// The declaring node; the type's identity.
    pub def: NodeId,
    /// Type name.
    pub name: Symbol,
    /// Generic parameters.
    pub type_params: Vec<TypeVar>,
    /// Methods, including constructors and abstract methods.
    pub methods: Vec<ExternMethod>,
}

impl ExternType {
    /// Looks up a method by name, disambiguated by argument count.
    #[must_use]
    pub fn lookup_method(&self, name: Symbol, arg_count: usize) -> MethodLookup<'_> {
        let mut found = None;
        for m in &self.methods {
            if m.name == name && m.ty.params.len() == arg_count {
                if found.is_some() {
                    return MethodLookup::Ambiguous;
                }
                found = Some(m);
            }
        }
        match found {
            Some(m) => MethodLookup::Found(m),
            None => MethodLookup::NotFound,
        }
    }

    /// The abstract methods of this extern.
    pub fn abstract_methods(&self) -> impl Iterator<Item = &ExternMethod> {
        self.methods.iter().filter(|m| m.is_abstract)
    }
}

/// Payload of `Parser`, `Control`, and `Package` types.
///
/// For parser/control *types*, `ctor_params` is `None` (they cannot be
/// instantiated); parser/control *implementations* and packages carry
/// their constructor parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerType {
    /// The declaring node; the type's identity.
    pub def: NodeId,
    /// Type name.
    pub name: Symbol,
    /// Generic parameters.
    pub type_params: Vec<TypeVar>,
    /// Apply parameters (empty for packages).
    pub apply_params: Vec<Param>,
    /// Constructor parameters, when the container can be instantiated.
    pub ctor_params: Option<Vec<Param>>,
}

impl ContainerType {
    /// The constructor method type, when this container can be
    /// instantiated. `self_ty` is the container's own type, used as the
    /// constructor's return type.
    #[must_use]
    pub fn constructor_method(&self, self_ty: TyRef) -> Option<MethodType> {
        self.ctor_params.as_ref().map(|params| MethodType {
            type_params: self.type_params.clone(),
            return_type: Some(self_ty),
            params: params.clone(),
        })
    }

    /// The `apply` method type.
    #[must_use]
    pub fn apply_method(&self) -> MethodType {
        MethodType {
            type_params: Vec::new(),
            return_type: Some(Rc::new(Ty::Void)),
            params: self.apply_params.clone(),
        }
    }
}

/// Per-argument information in a call shape: the argument type plus the
/// left-value and compile-time-constant flags the solver enforces
/// directions with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgInfo {
    /// The argument's type.
    pub ty: TyRef,
    /// Whether the argument denotes a storage location.
    pub is_left_value: bool,
    /// Whether the argument is a compile-time constant.
    pub is_constant: bool,
    /// The argument's source location.
    pub span: Span,
}

/// The shape of a call site, unified against a `Method` type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodCallShape {
    /// Explicit type arguments; empty when omitted.
    pub type_args: Vec<TyRef>,
    /// A fresh variable the solver binds to the return type.
    pub return_type: TyRef,
    /// The arguments.
    pub args: Vec<ArgInfo>,
}

/// The type algebra.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    /// Fixed-width integer `bit<W>` / `int<W>`. Hash-consed: the
    /// canonical representative per `(width, signed)` is unique.
    Bits {
        /// Bit width; positive.
        width: u32,
        /// Signedness.
        signed: bool,
    },
    /// Width-free integer literal. The id makes each literal its own
    /// unification variable, bound when the literal meets a `Bits` type.
    InfInt {
        /// Unification id, from the same pool as `Var` ids.
        id: u32,
    },
    /// `bool`.
    Bool,
    /// `string`.
    String,
    /// `void`.
    Void,
    /// The type of parser states.
    State,
    /// The type of `match_kind` members.
    MatchKind,
    /// The error namespace type.
    Error,
    /// The don't-care type `_`.
    Dontcare,
    /// Variable-length bitstring; only legal as a header field type.
    Varbits {
        /// Maximum width.
        max_width: u32,
    },
    /// A unification variable.
    Var(TypeVar),
    /// The type of an expression that denotes a type. Never nests.
    TypeOf(TyRef),
    /// A match set over the element type.
    Set(TyRef),
    /// An ordered tuple.
    Tuple(Vec<TyRef>),
    /// A header stack of fixed size.
    Stack {
        /// Element type; a header or header union.
        element: TyRef,
        /// Number of elements.
        size: u32,
    },
    /// A struct type.
    Struct(Rc<StructType>),
    /// A header type.
    Header(Rc<StructType>),
    /// A header-union type.
    Union(Rc<StructType>),
    /// An enum type.
    Enum(Rc<EnumType>),
    /// The action enum a table's `apply()` produces.
    ActionEnum(Rc<ActionEnumType>),
    /// A method or function type.
    Method(Rc<MethodType>),
    /// An action type.
    Action(Rc<ActionType>),
    /// An extern object type.
    Extern(Rc<ExternType>),
    /// A parser type or implementation.
    Parser(Rc<ContainerType>),
    /// A control type or implementation.
    Control(Rc<ContainerType>),
    /// A package type.
    Package(Rc<ContainerType>),
    /// A table type, synthesized per table declaration.
    Table(Rc<TableType>),
    /// A not-yet-canonicalized specialization of a generic type.
    Specialized {
        /// The generic base.
        base: TyRef,
        /// Type arguments; as many as the base has type parameters.
        args: Vec<TyRef>,
    },
    /// A canonicalized specialization.
    SpecializedCanonical {
        /// The generic base.
        base: TyRef,
        /// Canonical type arguments.
        args: Vec<TyRef>,
        /// The base with its type parameters bound to the arguments.
        substituted: TyRef,
    },
    /// A call-site shape; exists only inside the constraint solver.
    MethodCall(Rc<MethodCallShape>),
}

impl Ty {
    /// Returns `(width, signed)` if this is a `Bits` type.
    #[must_use]
    pub fn as_bits(&self) -> Option<(u32, bool)> {
        match self {
            Ty::Bits { width, signed } => Some((*width, *signed)),
            _ => None,
        }
    }

    /// Returns `true` for `Bits`.
    #[must_use]
    pub fn is_bits(&self) -> bool {
        matches!(self, Ty::Bits { .. })
    }

    /// Returns `true` for the width-free integer literal type.
    #[must_use]
    pub fn is_inf_int(&self) -> bool {
        matches!(self, Ty::InfInt { .. })
    }

    /// Returns `true` for headers and header unions — the legal header
    /// stack element types.
    #[must_use]
    pub fn is_stack_element(&self) -> bool {
        matches!(self, Ty::Header(_) | Ty::Union(_))
    }

    /// Returns `true` for the base (scalar/builtin) types.
    #[must_use]
    pub fn is_base(&self) -> bool {
        matches!(
            self,
            Ty::Bits { .. }
                | Ty::InfInt { .. }
                | Ty::Bool
                | Ty::String
                | Ty::Void
                | Ty::Varbits { .. }
        )
    }

    /// Returns `true` for container types (parser, control, package).
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Ty::Parser(_) | Ty::Control(_) | Ty::Package(_))
    }

    /// The type parameters, for the generic kinds.
    #[must_use]
    pub fn type_params(&self) -> Option<&[TypeVar]> {
        match self {
            Ty::Extern(e) => Some(&e.type_params),
            Ty::Parser(c) | Ty::Control(c) | Ty::Package(c) => Some(&c.type_params),
            Ty::Method(m) => Some(&m.type_params),
            _ => None,
        }
    }

    /// Returns `true` if the type is generic with unbound type
    /// parameters.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.type_params().is_some_and(|tps| !tps.is_empty())
    }

    /// For `SpecializedCanonical`, the substituted type; otherwise the
    /// type itself.
    #[must_use]
    pub fn substituted(self: &Rc<Self>) -> &Rc<Ty> {
        match &**self {
            Ty::SpecializedCanonical { substituted, .. } => substituted,
            _ => self,
        }
    }

    /// Occurs check: does the type mention the unification id `var`
    /// (either as a `Var` or an `InfInt`)?
    #[must_use]
    pub fn contains_var(&self, var: u32) -> bool {
        match self {
            Ty::Var(v) => v.id == var,
            Ty::InfInt { id } => *id == var,
            Ty::TypeOf(inner) | Ty::Set(inner) => inner.contains_var(var),
            Ty::Stack { element, .. } => element.contains_var(var),
            Ty::Tuple(components) => components.iter().any(|t| t.contains_var(var)),
            Ty::Struct(s) | Ty::Header(s) | Ty::Union(s) => {
                s.fields.iter().any(|f| f.ty.contains_var(var))
            }
            Ty::Method(m) => {
                m.return_type.as_ref().is_some_and(|r| r.contains_var(var))
                    || m.params.iter().any(|p| p.ty.contains_var(var))
            }
            Ty::Action(a) => a.params.iter().any(|p| p.ty.contains_var(var)),
            Ty::Extern(e) => e.methods.iter().any(|m| {
                m.ty.return_type.as_ref().is_some_and(|r| r.contains_var(var))
                    || m.ty.params.iter().any(|p| p.ty.contains_var(var))
            }),
            Ty::Parser(c) | Ty::Control(c) | Ty::Package(c) => {
                c.apply_params.iter().any(|p| p.ty.contains_var(var))
                    || c.ctor_params
                        .as_ref()
                        .is_some_and(|ps| ps.iter().any(|p| p.ty.contains_var(var)))
            }
            Ty::Specialized { base, args } => {
                base.contains_var(var) || args.iter().any(|t| t.contains_var(var))
            }
            Ty::SpecializedCanonical {
                base,
                args,
                substituted,
            } => {
                base.contains_var(var)
                    || args.iter().any(|t| t.contains_var(var))
                    || substituted.contains_var(var)
            }
            Ty::MethodCall(call) => {
                call.return_type.contains_var(var)
                    || call.type_args.iter().any(|t| t.contains_var(var))
                    || call.args.iter().any(|a| a.ty.contains_var(var))
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
            | Ty::Table(_) => false,
        }
    }

    /// Collects every unification id (`Var` and `InfInt`) the type
    /// mentions.
    pub fn collect_vars(&self, vars: &mut HashSet<u32>) {
        match self {
            Ty::Var(v) => {
                vars.insert(v.id);
            }
            Ty::InfInt { id } => {
                vars.insert(*id);
            }
            Ty::TypeOf(inner) | Ty::Set(inner) => inner.collect_vars(vars),
            Ty::Stack { element, .. } => element.collect_vars(vars),
            Ty::Tuple(components) => {
                for t in components {
                    t.collect_vars(vars);
                }
            }
            Ty::Struct(s) | Ty::Header(s) | Ty::Union(s) => {
                for f in &s.fields {
                    f.ty.collect_vars(vars);
                }
            }
            Ty::Method(m) => {
                if let Some(r) = &m.return_type {
                    r.collect_vars(vars);
                }
                for p in &m.params {
                    p.ty.collect_vars(vars);
                }
            }
            Ty::Action(a) => {
                for p in &a.params {
                    p.ty.collect_vars(vars);
                }
            }
            Ty::Extern(e) => {
                for m in &e.methods {
                    if let Some(r) = &m.ty.return_type {
                        r.collect_vars(vars);
                    }
                    for p in &m.ty.params {
                        p.ty.collect_vars(vars);
                    }
                }
            }
            Ty::Parser(c) | Ty::Control(c) | Ty::Package(c) => {
                for p in &c.apply_params {
                    p.ty.collect_vars(vars);
                }
                if let Some(ps) = &c.ctor_params {
                    for p in ps {
                        p.ty.collect_vars(vars);
                    }
                }
            }
            Ty::Specialized { base, args } => {
                base.collect_vars(vars);
                for t in args {
                    t.collect_vars(vars);
                }
            }
            Ty::SpecializedCanonical {
                base,
                args,
                substituted,
            } => {
                base.collect_vars(vars);
                for t in args {
                    t.collect_vars(vars);
                }
                substituted.collect_vars(vars);
            }
            Ty::MethodCall(call) => {
                call.return_type.collect_vars(vars);
                for t in &call.type_args {
                    t.collect_vars(vars);
                }
                for a in &call.args {
                    a.ty.collect_vars(vars);
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
            | Ty::Table(_) => {}
        }
    }

    /// Returns `true` if the type mentions any unification variable.
    /// Generic declarations legitimately mention their own type
    /// parameters, so this is only meaningful on instantiated types.
    #[must_use]
    pub fn has_vars(&self) -> bool {
        let mut vars = HashSet::new();
        self.collect_vars(&mut vars);
        !vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_syntax::ast::NodeId;

    fn bits(width: u32, signed: bool) -> TyRef {
        Rc::new(Ty::Bits { width, signed })
    }

    fn var(id: u32) -> TyRef {
        Rc::new(Ty::Var(TypeVar { id, name: None }))
    }

    #[test]
    fn test_bits_equality() {
        assert_eq!(*bits(8, false), *bits(8, false));
        assert_ne!(*bits(8, false), *bits(8, true));
        assert_ne!(*bits(8, false), *bits(16, false));
    }

    #[test]
    fn test_type_var_equality_ignores_name() {
        let a = TypeVar {
            id: 1,
            name: Some(Symbol::new(0)),
        };
        let b = TypeVar {
            id: 1,
            name: Some(Symbol::new(9)),
        };
        assert_eq!(a, b);
        assert_ne!(a, TypeVar { id: 2, name: None });
    }

    #[test]
    fn test_named_identity() {
        let s1 = Rc::new(StructType {
            def: NodeId::from_raw(1),
            name: Symbol::new(0),
            fields: vec![],
        });
        let s2 = Rc::new(StructType {
            def: NodeId::from_raw(2),
            name: Symbol::new(0),
            fields: vec![],
        });
        // Same name, different declaration: different types.
        assert_ne!(Ty::Struct(s1), Ty::Struct(s2));
    }

    #[test]
    fn test_contains_var() {
        let t = Ty::Tuple(vec![bits(8, false), var(3)]);
        assert!(t.contains_var(3));
        assert!(!t.contains_var(4));

        let inf = Ty::Set(Rc::new(Ty::InfInt { id: 7 }));
        assert!(inf.contains_var(7));
    }

    #[test]
    fn test_collect_vars() {
        let m = Ty::Method(Rc::new(MethodType {
            type_params: vec![],
            return_type: Some(var(1)),
            params: vec![Param {
                name: Symbol::new(0),
                direction: Direction::In,
                ty: var(2),
            }],
        }));
        let mut vars = HashSet::new();
        m.collect_vars(&mut vars);
        assert_eq!(vars.len(), 2);
        assert!(vars.contains(&1) && vars.contains(&2));
    }

    #[test]
    fn test_extern_method_lookup() {
        let mk_method = |nparams: usize| {
            Rc::new(MethodType {
                type_params: vec![],
                return_type: None,
                params: (0..nparams)
                    .map(|i| Param {
                        name: Symbol::new(i as u32),
                        direction: Direction::In,
                        ty: bits(8, false),
                    })
                    .collect(),
            })
        };
        let write = Symbol::new(10);
        let ext = ExternType {
            def: NodeId::from_raw(0),
            name: Symbol::new(9),
            type_params: vec![],
            methods: vec![
                ExternMethod {
                    name: write,
                    ty: mk_method(1),
                    is_abstract: false,
                },
                ExternMethod {
                    name: write,
                    ty: mk_method(2),
                    is_abstract: false,
                },
            ],
        };
        assert!(matches!(ext.lookup_method(write, 1), MethodLookup::Found(m) if m.ty.params.len() == 1));
        assert_eq!(ext.lookup_method(write, 3), MethodLookup::NotFound);
        assert_eq!(ext.lookup_method(Symbol::new(11), 1), MethodLookup::NotFound);
    }

    #[test]
    fn test_substituted_projection() {
        let base = bits(8, false);
        let spec = Rc::new(Ty::SpecializedCanonical {
            base: Rc::clone(&base),
            args: vec![],
            substituted: bits(16, false),
        });
        assert_eq!(spec.substituted().as_bits(), Some((16, false)));
        assert_eq!(base.substituted().as_bits(), Some((8, false)));
    }
}
