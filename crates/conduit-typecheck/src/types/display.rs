//! Type pretty-printing for diagnostics.
//!
//! [`DisplayTy`] renders a type with an interner for name resolution:
//! `bit<8>`, `int<4>`, `tuple<bit<8>, bool>`, `h_t[4]`, method
//! signatures, and `?N` for unification variables.

use crate::types::ty::{MethodType, Param, Ty};
use conduit_mem::{StringInterner, Symbol};
use std::fmt;

/// Wrapper that implements `fmt::Display` for a type.
pub struct DisplayTy<'a> {
    ty: &'a Ty,
    interner: &'a StringInterner,
}

impl<'a> DisplayTy<'a> {
    /// Creates a display wrapper for `ty`.
    #[must_use]
    pub fn new(ty: &'a Ty, interner: &'a StringInterner) -> Self {
        Self { ty, interner }
    }

    fn name(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym).unwrap_or("<unknown>")
    }

    fn fmt_ty(&self, ty: &Ty, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match ty {
            Ty::Bits { width, signed } => {
                if *signed {
                    write!(f, "int<{width}>")
                } else {
                    write!(f, "bit<{width}>")
                }
            }
            Ty::InfInt { .. } => write!(f, "int"),
            Ty::Bool => write!(f, "bool"),
            Ty::String => write!(f, "string"),
            Ty::Void => write!(f, "void"),
            Ty::State => write!(f, "state"),
            Ty::MatchKind => write!(f, "match_kind"),
            Ty::Error => write!(f, "error"),
            Ty::Dontcare => write!(f, "_"),
            Ty::Varbits { max_width } => write!(f, "varbit<{max_width}>"),
            Ty::Var(v) => match v.name {
                Some(name) => write!(f, "{}", self.name(name)),
                None => write!(f, "?{}", v.id),
            },
            Ty::TypeOf(inner) => {
                write!(f, "type ")?;
                self.fmt_ty(inner, f)
            }
            Ty::Set(inner) => {
                write!(f, "set<")?;
                self.fmt_ty(inner, f)?;
                write!(f, ">")
            }
            Ty::Tuple(components) => {
                write!(f, "tuple<")?;
                for (i, t) in components.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.fmt_ty(t, f)?;
                }
                write!(f, ">")
            }
            Ty::Stack { element, size } => {
                self.fmt_ty(element, f)?;
                write!(f, "[{size}]")
            }
            Ty::Struct(s) | Ty::Header(s) | Ty::Union(s) => write!(f, "{}", self.name(s.name)),
            Ty::Enum(e) => write!(f, "{}", self.name(e.name)),
            Ty::ActionEnum(_) => write!(f, "action_enum"),
            Ty::Method(m) => self.fmt_method(m, f),
            Ty::Action(a) => {
                write!(f, "action")?;
                self.fmt_params(&a.params, f)
            }
            Ty::Extern(e) => write!(f, "{}", self.name(e.name)),
            Ty::Parser(c) => write!(f, "parser {}", self.name(c.name)),
            Ty::Control(c) => write!(f, "control {}", self.name(c.name)),
            Ty::Package(c) => write!(f, "package {}", self.name(c.name)),
            Ty::Table(t) => write!(f, "table {}", self.name(t.name)),
            Ty::Specialized { base, args } | Ty::SpecializedCanonical { base, args, .. } => {
                self.fmt_ty(base, f)?;
                write!(f, "<")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.fmt_ty(a, f)?;
                }
                write!(f, ">")
            }
            Ty::MethodCall(call) => {
                write!(f, "call(")?;
                for (i, a) in call.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.fmt_ty(&a.ty, f)?;
                }
                write!(f, ") -> ")?;
                self.fmt_ty(&call.return_type, f)
            }
        }
    }

    fn fmt_method(&self, m: &MethodType, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !m.type_params.is_empty() {
            write!(f, "<")?;
            for (i, tp) in m.type_params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                match tp.name {
                    Some(name) => write!(f, "{}", self.name(name))?,
                    None => write!(f, "?{}", tp.id)?,
                }
            }
            write!(f, ">")?;
        }
        self.fmt_params(&m.params, f)?;
        write!(f, " -> ")?;
        match &m.return_type {
            Some(r) => self.fmt_ty(r, f),
            None => write!(f, "_"),
        }
    }

    fn fmt_params(&self, params: &[Param], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let dir = p.direction.as_str();
            if !dir.is_empty() {
                write!(f, "{dir} ")?;
            }
            self.fmt_ty(&p.ty, f)?;
            write!(f, " {}", self.name(p.name))?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for DisplayTy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_ty(self.ty, f)
    }
}

/// Fallback rendering without an interner, used inside the checker where
/// only ids are available. Named types print their declaration id.
pub(crate) fn short(ty: &Ty) -> String {
    match ty {
        Ty::Bits { width, signed } => {
            if *signed {
                format!("int<{width}>")
            } else {
                format!("bit<{width}>")
            }
        }
        Ty::InfInt { .. } => "int".into(),
        Ty::Bool => "bool".into(),
        Ty::String => "string".into(),
        Ty::Void => "void".into(),
        Ty::State => "state".into(),
        Ty::MatchKind => "match_kind".into(),
        Ty::Error => "error".into(),
        Ty::Dontcare => "_".into(),
        Ty::Varbits { max_width } => format!("varbit<{max_width}>"),
        Ty::Var(v) => format!("?{}", v.id),
        Ty::TypeOf(inner) => format!("type {}", short(inner)),
        Ty::Set(inner) => format!("set<{}>", short(inner)),
        Ty::Tuple(components) => {
            let inner: Vec<String> = components.iter().map(|t| short(t)).collect();
            format!("tuple<{}>", inner.join(", "))
        }
        Ty::Stack { element, size } => format!("{}[{size}]", short(element)),
        Ty::Struct(s) => format!("struct {}", s.def),
        Ty::Header(s) => format!("header {}", s.def),
        Ty::Union(s) => format!("header_union {}", s.def),
        Ty::Enum(e) => format!("enum {}", e.def),
        Ty::ActionEnum(_) => "action_enum".into(),
        Ty::Method(m) => {
            let params: Vec<String> = m.params.iter().map(|p| short(&p.ty)).collect();
            let ret = m.return_type.as_ref().map_or("_".into(), |r| short(r));
            format!("({}) -> {}", params.join(", "), ret)
        }
        Ty::Action(a) => {
            let params: Vec<String> = a.params.iter().map(|p| short(&p.ty)).collect();
            format!("action({})", params.join(", "))
        }
        Ty::Extern(e) => format!("extern {}", e.def),
        Ty::Parser(c) => format!("parser {}", c.def),
        Ty::Control(c) => format!("control {}", c.def),
        Ty::Package(c) => format!("package {}", c.def),
        Ty::Table(t) => format!("table {}", t.def),
        Ty::Specialized { base, args } | Ty::SpecializedCanonical { base, args, .. } => {
            let args: Vec<String> = args.iter().map(|t| short(t)).collect();
            format!("{}<{}>", short(base), args.join(", "))
        }
        Ty::MethodCall(call) => {
            let args: Vec<String> = call.args.iter().map(|a| short(&a.ty)).collect();
            format!("call({})", args.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_display_bits() {
        let interner = StringInterner::new();
        let ty = Ty::Bits {
            width: 8,
            signed: false,
        };
        assert_eq!(DisplayTy::new(&ty, &interner).to_string(), "bit<8>");
        let ty = Ty::Bits {
            width: 4,
            signed: true,
        };
        assert_eq!(DisplayTy::new(&ty, &interner).to_string(), "int<4>");
    }

    #[test]
    fn test_display_tuple_and_stack() {
        let interner = StringInterner::new();
        let tuple = Ty::Tuple(vec![
            Rc::new(Ty::Bits {
                width: 8,
                signed: false,
            }),
            Rc::new(Ty::Bool),
        ]);
        assert_eq!(
            DisplayTy::new(&tuple, &interner).to_string(),
            "tuple<bit<8>, bool>"
        );
    }

    #[test]
    fn test_short_matches_display_for_scalars() {
        let ty = Ty::Bits {
            width: 16,
            signed: false,
        };
        assert_eq!(short(&ty), "bit<16>");
        assert_eq!(short(&Ty::Bool), "bool");
    }
}
