//! The type algebra.
//!
//! - [`ty`] - the `Ty` sum and its payload types
//! - [`display`] - pretty-printing for diagnostics

pub mod display;
pub mod ty;

pub use display::DisplayTy;
pub use ty::{
    ActionEnumType, ActionType, ArgInfo, ContainerType, EnumType, ExternMethod, ExternType, Field,
    MethodCallShape, MethodLookup, MethodType, Param, StructType, TableType, Ty, TyRef, TypeVar,
};
