//! Named types defined by the host.
//!
//! A named type is registered under `(pkg_path, name)` and gets its body
//! exactly once. `declare` hands out the handle early so a definition can
//! refer to itself, e.g. through `*T` or `[]T`.

use vo_common_core::Kind;

use crate::error::{OrRaise, ReflectError, Result};
use crate::factory::{build_struct, embedded_name, starts_unexported};
use crate::func::Code;
use crate::registry::{named, named_body};
use crate::rtype::{is_exported_name, DeclMethod, RType, StructField, Type, TypeName};

enum Underlying {
    Type(Type),
    Fields(Vec<StructField>),
}

/// Builder for a named type and its declared methods.
pub struct TypeDef {
    pkg_path: String,
    name: String,
    underlying: Underlying,
    methods: Vec<DeclMethod>,
}

/// The named type `(pkg_path, name)`, registering it without a definition
/// if it is new.
pub fn declare(pkg_path: &str, name: &str) -> Type {
    named(pkg_path, name, || {
        let repr = match pkg_path.rsplit('/').next() {
            Some(last) if !last.is_empty() => format!("{last}.{name}"),
            _ => name.to_string(),
        };
        RType::new(Some(TypeName { pkg_path: pkg_path.to_string(), name: name.to_string() }), repr, None)
    })
}

impl TypeDef {
    pub fn new(pkg_path: impl Into<String>, name: impl Into<String>, underlying: Type) -> Self {
        Self { pkg_path: pkg_path.into(), name: name.into(), underlying: Underlying::Type(underlying), methods: Vec::new() }
    }

    /// A named struct. Unexported fields without a package path get this
    /// type's package, and any field may embed a type with methods.
    pub fn with_fields(pkg_path: impl Into<String>, name: impl Into<String>, fields: Vec<StructField>) -> Self {
        Self { pkg_path: pkg_path.into(), name: name.into(), underlying: Underlying::Fields(fields), methods: Vec::new() }
    }

    /// Declare a method with a value receiver. `ftyp` excludes the receiver.
    pub fn method(self, name: impl Into<String>, ftyp: Type, code: Code) -> Self {
        self.push(name.into(), ftyp, code, false)
    }

    /// Declare a method with a pointer receiver.
    pub fn ptr_method(self, name: impl Into<String>, ftyp: Type, code: Code) -> Self {
        self.push(name.into(), ftyp, code, true)
    }

    fn push(mut self, name: String, typ: Type, code: Code, ptr_recv: bool) -> Self {
        let pkg_path = if is_exported_name(&name) { String::new() } else { self.pkg_path.clone() };
        self.methods.push(DeclMethod { name, pkg_path, typ, code, ptr_recv });
        self
    }

    #[track_caller]
    pub fn build(self) -> Type {
        self.define().or_raise()
    }

    /// Register the type, or return the existing one when it was already
    /// defined the same way.
    pub fn define(self) -> Result<Type> {
        let t = declare(&self.pkg_path, &self.name);
        self.fill(t)
    }

    /// Give a type obtained from `declare` its definition.
    pub fn complete(self, declared: Type) -> Result<Type> {
        if declared.name() != self.name || declared.pkg_path() != self.pkg_path {
            return Err(ReflectError::TypeRedefined(declared.string()));
        }
        self.fill(declared)
    }

    fn fill(mut self, t: Type) -> Result<Type> {
        for m in &self.methods {
            if m.typ.kind() != Kind::Func {
                return Err(ReflectError::NotKindType { op: "reflect: method type", kind: Kind::Func, typ: m.typ.string() });
            }
        }
        let underlying = match self.underlying {
            Underlying::Type(u) => u,
            Underlying::Fields(fields) => {
                let fields: Vec<StructField> = fields
                    .into_iter()
                    .map(|mut f| {
                        let name = if f.name.is_empty() && f.anonymous { embedded_name(f.typ) } else { f.name.as_str() };
                        if f.pkg_path.is_empty() && starts_unexported(name) {
                            f.pkg_path = self.pkg_path.clone();
                        }
                        f
                    })
                    .collect();
                build_struct(&fields, false)?
            }
        };
        self.methods.sort_by(|a, b| a.name.cmp(&b.name));
        if self.methods.windows(2).any(|w| w[0].name == w[1].name) {
            return Err(ReflectError::TypeRedefined(t.string()));
        }
        if !t.is_complete() {
            let rt: &'static RType = t.0;
            let methods = std::mem::take(&mut self.methods);
            match rt.body.set(named_body(underlying, methods)) {
                Ok(()) => {
                    tracing::debug!(target: "vo::types", typ = %t, "defined named type");
                    return Ok(t);
                }
                Err(lost) => self.methods = lost.declared,
            }
        }
        if t.underlying() == underlying.underlying() && same_methods(&t.body().declared, &self.methods) {
            Ok(t)
        } else {
            Err(ReflectError::TypeRedefined(t.string()))
        }
    }
}

/// Same names, signatures and receiver kinds; both lists are sorted by name.
fn same_methods(have: &[DeclMethod], want: &[DeclMethod]) -> bool {
    have.len() == want.len()
        && have
            .iter()
            .zip(want)
            .all(|(a, b)| a.name == b.name && a.pkg_path == b.pkg_path && a.typ == b.typ && a.ptr_recv == b.ptr_recv)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::abi::Frame;
    use crate::registry::{basic, ptr_to};

    #[test]
    fn test_named_type_string_uses_last_path_segment() {
        let t = TypeDef::new("example.com/units", "Meters", basic(Kind::Float64)).build();
        assert_eq!(t.string(), "units.Meters");
        assert_eq!(t.name(), "Meters");
        assert_eq!(t.pkg_path(), "example.com/units");
        assert_eq!(t.kind(), Kind::Float64);
        assert_ne!(t, basic(Kind::Float64));
    }

    #[test]
    fn test_redefinition_is_rejected() {
        let t = TypeDef::new("typedef_test", "Twice", basic(Kind::Int)).build();
        assert_eq!(TypeDef::new("typedef_test", "Twice", basic(Kind::Int)).define(), Ok(t));
        assert!(TypeDef::new("typedef_test", "Twice", basic(Kind::String)).define().is_err());
    }

    #[test]
    fn test_redefinition_with_other_methods_is_rejected() {
        let sig = crate::factory::func_of(&[], &[], false);
        let noop = || -> Code { Arc::new(|_: &mut Frame<'_>| {}) };
        let def = |name: &str, ptr: bool| {
            let d = TypeDef::new("typedef_test", "WithMethods", basic(Kind::Int));
            if ptr {
                d.ptr_method(name, sig, noop())
            } else {
                d.method(name, sig, noop())
            }
        };
        let t = def("A", false).build();
        assert_eq!(def("A", false).define(), Ok(t));
        assert_eq!(def("B", false).define(), Err(ReflectError::TypeRedefined(t.string())));
        assert_eq!(def("A", true).define(), Err(ReflectError::TypeRedefined(t.string())));
        let bare = TypeDef::new("typedef_test", "WithMethods", basic(Kind::Int));
        assert_eq!(bare.define(), Err(ReflectError::TypeRedefined(t.string())));
        assert_eq!(t.num_method(), 1);
        assert_eq!(t.method(0).name, "A");
    }

    #[test]
    fn test_recursive_list_node() {
        let node = declare("typedef_test", "Node");
        let t = TypeDef::with_fields(
            "typedef_test",
            "Node",
            vec![StructField::new("Val", basic(Kind::Int)), StructField::new("next", ptr_to(node))],
        )
        .complete(node)
        .unwrap();
        assert_eq!(t, node);
        assert_eq!(t.field(1).typ, ptr_to(t));
        assert_eq!(t.field(1).pkg_path, "typedef_test");
    }
}
