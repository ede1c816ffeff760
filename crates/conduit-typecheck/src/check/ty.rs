//! Type-denoting positions.
//!
//! Surface types (`bit<8>`, a named type, a specialization) denote types
//! rather than values. Each gets the canonicalized type it denotes,
//! recorded in the type map under the `TypeOf` lift; the inner type is
//! returned for the enclosing check to use.

use crate::check::TypeInference;
use crate::types::display::short;
use crate::types::ty::{Ty, TyRef};
use conduit_syntax::ast::{AstType, AstTypeKind, Path};
use std::rc::Rc;

impl TypeInference<'_> {
    /// Maps a surface type to the (canonical) type it denotes and
    /// records the `TypeOf` lift. Returns `None` after reporting on a
    /// type error.
    pub(crate) fn infer_ast_type(&mut self, t: &Rc<AstType>) -> Option<TyRef> {
        if let Some(existing) = self.get_type_opt(t.id) {
            return match &*existing {
                Ty::TypeOf(inner) => Some(Rc::clone(inner)),
                other => panic!("BUG: type position recorded {}", short(other)),
            };
        }

        let ty: TyRef = match &t.kind {
            AstTypeKind::Bits { width, signed } => {
                if *width == 0 {
                    self.type_error(t.span, "bit width must be positive");
                    return None;
                }
                self.type_map.bits(*width, *signed)
            }
            AstTypeKind::Varbits { max_width } => Rc::new(Ty::Varbits {
                max_width: *max_width,
            }),
            AstTypeKind::Bool => Rc::new(Ty::Bool),
            AstTypeKind::String => Rc::new(Ty::String),
            AstTypeKind::Void => Rc::new(Ty::Void),
            AstTypeKind::Dontcare => Rc::new(Ty::Dontcare),
            AstTypeKind::Tuple(components) => {
                let mut tys = Vec::with_capacity(components.len());
                for component in components {
                    tys.push(self.infer_ast_type(component)?);
                }
                Rc::new(Ty::Tuple(tys))
            }
            AstTypeKind::Stack { element, size } => {
                let element_ty = self.infer_ast_type(element)?;
                let size_expr = self.infer_expr(size);
                let Some(value) = size_expr.as_constant() else {
                    self.type_error(size.span, "size of a header stack must be a constant");
                    return None;
                };
                if value <= 0 {
                    self.type_error(size.span, format!("illegal header stack size {value}"));
                    return None;
                }
                Rc::new(Ty::Stack {
                    element: element_ty,
                    size: value as u32,
                })
            }
            AstTypeKind::Name(path) => self.resolve_type_name(path)?,
            AstTypeKind::Specialized { base, args } => {
                let base_ty = self.resolve_type_name(base)?;
                let mut arg_tys = Vec::with_capacity(args.len());
                for arg in args {
                    arg_tys.push(self.infer_ast_type(arg)?);
                }
                Rc::new(Ty::Specialized {
                    base: base_ty,
                    args: arg_tys,
                })
            }
        };

        let canon = self.canonicalize(t.span, &ty)?;

        if let Ty::Stack { element, .. } = &*canon {
            if !element.substituted().is_stack_element() {
                self.type_error(
                    t.span,
                    format!(
                        "header stack used with non-header type {}",
                        short(element)
                    ),
                );
                return None;
            }
        }

        self.set_type(t.id, Rc::new(Ty::TypeOf(Rc::clone(&canon))));
        Some(canon)
    }

    /// Resolves a named type through the reference map. The declaration
    /// must already carry a `TypeOf` entry (declaration before use).
    fn resolve_type_name(&mut self, path: &Rc<Path>) -> Option<TyRef> {
        let Some(decl) = self.ref_map.get_declaration(path.id).cloned() else {
            panic!("BUG: unresolved type name {}", self.name_of(path.name));
        };
        let Some(decl_ty) = self.get_type_opt(decl.id) else {
            self.type_error(
                path.span,
                format!("could not find type of {}", self.name_of(path.name)),
            );
            return None;
        };
        match &*decl_ty {
            Ty::TypeOf(inner) => {
                let inner = Rc::clone(inner);
                if !self.done(path.id) {
                    self.set_type(path.id, Rc::clone(&inner));
                }
                Some(inner)
            }
            other => {
                self.type_error(
                    path.span,
                    format!("{} does not denote a type", short(other)),
                );
                None
            }
        }
    }
}
