//! The identity cache.
//!
//! One process-wide table maps every structural shape to its canonical
//! descriptor, and every `(package path, name)` to its named type. Entries
//! are leaked and never evicted: the table grows with the number of distinct
//! shapes a program mentions, which is what keeps `Type` equality a pointer
//! comparison.
//!
//! Builders passed to `intern` run under the table lock and must not call
//! back into the registry.

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use vo_common_core::{ChanDir, Kind, PTR_SIZE};
use vo_runtime::objects::{interface, slice, string};
use vo_runtime::GcLayout;

use crate::error::{OrRaise, ReflectError, Result};
use crate::rtype::{signature_repr, Alg, Body, Detail, IMethod, RType, Type, TypeName};

#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct FieldKey {
    pub name: String,
    pub pkg_path: String,
    pub typ: Type,
    pub tag: String,
    pub embedded: bool,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) enum TypeKey {
    Ptr(Type),
    Slice(Type),
    Array(Type, usize),
    Chan(ChanDir, Type),
    Map(Type, Type),
    Func(Vec<Type>, Vec<Type>, bool),
    Struct(Vec<FieldKey>),
    Interface(Vec<(String, String, Type)>),
}

#[derive(Default)]
struct Registry {
    shapes: HashMap<TypeKey, Type>,
    named: HashMap<(String, String), Type>,
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::default()));

pub(crate) fn leak(rt: RType) -> Type {
    Type(Box::leak(Box::new(rt)))
}

/// Return the canonical type for `key`, building it on first use.
pub(crate) fn intern(key: TypeKey, build: impl FnOnce() -> RType) -> Type {
    let mut reg = REGISTRY.lock();
    if let Some(&t) = reg.shapes.get(&key) {
        tracing::trace!(target: "vo::types", typ = %t, "identity cache hit");
        return t;
    }
    let t = leak(build());
    tracing::debug!(target: "vo::types", typ = %t, "synthesized type");
    reg.shapes.insert(key, t);
    t
}

/// Look up or register the named type `(pkg_path, name)`.
pub(crate) fn named(pkg_path: &str, name: &str, build: impl FnOnce() -> RType) -> Type {
    let mut reg = REGISTRY.lock();
    let key = (pkg_path.to_string(), name.to_string());
    if let Some(&t) = reg.named.get(&key) {
        return t;
    }
    let t = leak(build());
    tracing::debug!(target: "vo::types", typ = %t, "declared named type");
    reg.named.insert(key, t);
    t
}

pub(crate) fn pointer_body(kind: Kind, detail: Detail) -> Body {
    Body {
        kind,
        size: PTR_SIZE,
        align: PTR_SIZE,
        gc: GcLayout::pointer(),
        alg: if matches!(kind, Kind::Func | Kind::Map) { Alg::NotComparable } else { Alg::Mem },
        detail,
        declared: Vec::new(),
        underlying: None,
    }
}

fn basic_body(kind: Kind) -> Body {
    let (size, align) = kind.basic_layout().unwrap_or((0, 1));
    let gc = match kind {
        Kind::String => string::layout(),
        Kind::UnsafePointer => GcLayout::pointer(),
        _ => GcLayout::scalar(size, align),
    };
    let alg = match kind {
        Kind::Float32 | Kind::Float64 | Kind::Complex64 | Kind::Complex128 | Kind::String => Alg::Walk,
        _ => Alg::Mem,
    };
    Body { kind, size, align, gc, alg, detail: Detail::Basic, declared: Vec::new(), underlying: None }
}

const BASIC_KINDS: [Kind; 18] = [
    Kind::Bool,
    Kind::Int,
    Kind::Int8,
    Kind::Int16,
    Kind::Int32,
    Kind::Int64,
    Kind::Uint,
    Kind::Uint8,
    Kind::Uint16,
    Kind::Uint32,
    Kind::Uint64,
    Kind::Uintptr,
    Kind::Float32,
    Kind::Float64,
    Kind::Complex64,
    Kind::Complex128,
    Kind::String,
    Kind::UnsafePointer,
];

static BASICS: Lazy<HashMap<Kind, Type>> = Lazy::new(|| {
    BASIC_KINDS
        .iter()
        .map(|&k| {
            let name = match k {
                Kind::UnsafePointer => TypeName { pkg_path: "unsafe".into(), name: "Pointer".into() },
                _ => TypeName { pkg_path: String::new(), name: k.name().into() },
            };
            (k, leak(RType::new(Some(name), k.name().into(), Some(basic_body(k)))))
        })
        .collect()
});

/// The predeclared type of a basic kind (`int`, `string`, `unsafe.Pointer`, ...).
pub fn basic(kind: Kind) -> Type {
    match BASICS.get(&kind) {
        Some(&t) => t,
        None => panic!("reflect: {kind} is not a basic kind"),
    }
}

/// The empty interface type `interface {}`.
pub fn empty_interface() -> Type {
    interface_of(Vec::new())
}

/// The predeclared `error` interface.
pub fn error_type() -> Type {
    static ERROR: Lazy<Type> = Lazy::new(|| {
        let sig = crate::factory::func_of(&[], &[basic(Kind::String)], false);
        let iface = interface_of(vec![("Error".to_string(), sig)]);
        named("", "error", || {
            RType::new(
                Some(TypeName { pkg_path: String::new(), name: "error".into() }),
                "error".into(),
                Some(named_body(iface, Vec::new())),
            )
        })
    });
    *ERROR
}

/// Body of a named type defined from `underlying`.
pub(crate) fn named_body(underlying: Type, declared: Vec<crate::rtype::DeclMethod>) -> Body {
    let ub = underlying.body();
    Body {
        kind: ub.kind,
        size: ub.size,
        align: ub.align,
        gc: ub.gc.clone(),
        alg: ub.alg,
        detail: ub.detail.clone(),
        declared,
        underlying: Some(underlying.underlying()),
    }
}

/// An interface type with the given methods.
///
/// Method names starting with a lower-case letter must be given as
/// `pkgpath.name`.
#[track_caller]
pub fn interface_of(methods: Vec<(String, Type)>) -> Type {
    try_interface_of(methods).or_raise()
}

pub fn try_interface_of(methods: Vec<(String, Type)>) -> Result<Type> {
    let mut ims: Vec<IMethod> = Vec::with_capacity(methods.len());
    for (full, typ) in methods {
        if typ.kind() != Kind::Func {
            return Err(ReflectError::NotKindType { op: "reflect.InterfaceOf", kind: Kind::Func, typ: typ.string() });
        }
        let typ = typ.underlying();
        let m = match full.rsplit_once('.') {
            Some((pkg, name)) => IMethod { name: name.to_string(), pkg_path: pkg.to_string(), typ },
            None => IMethod { name: full, pkg_path: String::new(), typ },
        };
        ims.push(m);
    }
    ims.sort_by(|a, b| a.name.cmp(&b.name));
    for w in ims.windows(2) {
        if w[0].name == w[1].name && (w[0].pkg_path != w[1].pkg_path || w[0].typ != w[1].typ) {
            return Err(ReflectError::DuplicateMethod(w[0].name.clone()));
        }
    }
    ims.dedup_by(|a, b| a.name == b.name);
    let key = TypeKey::Interface(ims.iter().map(|m| (m.name.clone(), m.pkg_path.clone(), m.typ)).collect());
    let repr = if ims.is_empty() {
        "interface {}".to_string()
    } else {
        let parts: Vec<String> = ims.iter().map(|m| format!("{}{}", m.name, method_signature(m.typ))).collect();
        format!("interface {{ {} }}", parts.join("; "))
    };
    Ok(intern(key, move || {
        let body = Body {
            kind: Kind::Interface,
            size: 2 * PTR_SIZE,
            align: PTR_SIZE,
            gc: interface::layout(),
            alg: Alg::Walk,
            detail: Detail::Interface { methods: ims },
            declared: Vec::new(),
            underlying: None,
        };
        RType::new(None, repr, Some(body))
    }))
}

/// Signature of a method type as written in an interface.
fn method_signature(t: Type) -> String {
    signature_repr(t.ins(), t.outs(), t.is_variadic())
}

/// `*t`, cached on the element's descriptor.
pub fn ptr_to(t: Type) -> Type {
    if let Some(&p) = t.0.ptr_to_this.get() {
        return p;
    }
    let p = intern(TypeKey::Ptr(t), || {
        RType::new(None, format!("*{}", t.0.repr), Some(pointer_body(Kind::Ptr, Detail::Ptr { elem: t })))
    });
    let _ = t.0.ptr_to_this.set(p);
    p
}

pub(crate) fn slice_body(elem: Type) -> Body {
    Body {
        kind: Kind::Slice,
        size: 3 * PTR_SIZE,
        align: PTR_SIZE,
        gc: slice::layout(),
        alg: Alg::NotComparable,
        detail: Detail::Slice { elem },
        declared: Vec::new(),
        underlying: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_types_are_named() {
        let int = basic(Kind::Int);
        assert_eq!(int.name(), "int");
        assert_eq!(int.pkg_path(), "");
        assert_eq!(int.size(), 8);
        let up = basic(Kind::UnsafePointer);
        assert_eq!(up.string(), "unsafe.Pointer");
        assert_eq!(up.pkg_path(), "unsafe");
        assert_eq!(basic(Kind::Complex64).align(), 4);
    }

    #[test]
    fn test_ptr_to_is_cached() {
        let p1 = ptr_to(basic(Kind::Int8));
        let p2 = ptr_to(basic(Kind::Int8));
        assert_eq!(p1, p2);
        assert_eq!(p1.string(), "*int8");
        assert_eq!(p1.elem(), basic(Kind::Int8));
    }

    #[test]
    fn test_error_interface() {
        let e = error_type();
        assert_eq!(e.kind(), Kind::Interface);
        assert_eq!(e.string(), "error");
        assert_eq!(e.underlying().string(), "interface { Error() string }");
        assert_eq!(empty_interface().string(), "interface {}");
    }

    #[test]
    fn test_interface_method_of_named_func_type() {
        let sig = crate::factory::func_of(&[basic(Kind::Int)], &[basic(Kind::Bool)], false);
        let named_sig = crate::typedef::TypeDef::new("a", "F", sig).build();
        assert_eq!(named_sig.string(), "a.F");
        let i = interface_of(vec![("Check".to_string(), named_sig)]);
        assert_eq!(i.string(), "interface { Check(int) bool }");
    }

    #[test]
    fn test_interface_duplicate_methods() {
        let a = crate::factory::func_of(&[], &[], false);
        let b = crate::factory::func_of(&[basic(Kind::Int)], &[], false);
        let same = interface_of(vec![("M".to_string(), a), ("M".to_string(), a)]);
        assert_eq!(same, interface_of(vec![("M".to_string(), a)]));
        assert_eq!(
            try_interface_of(vec![("M".to_string(), a), ("M".to_string(), b)]),
            Err(ReflectError::DuplicateMethod("M".to_string()))
        );
        assert!(try_interface_of(vec![("M".to_string(), basic(Kind::Int))]).is_err());
    }
}
