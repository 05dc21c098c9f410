//! Type descriptors.
//!
//! Every type the engine knows is an immutable, leaked `RType`. A `Type` is a
//! copyable handle to one; equality and hashing are by descriptor address,
//! which the registry makes equivalent to structural identity.
//!
//! Named types may be declared before they are defined (for recursion), so
//! everything but the name and string form lives in a `Body` that is filled
//! exactly once.

use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::OnceCell;
use vo_common_core::{ChanDir, Kind};
use vo_runtime::GcLayout;

use crate::error::ReflectError;
use crate::func::Code;
use crate::resolve::MethodSet;
use crate::tag::StructTag;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TypeName {
    pub pkg_path: String,
    pub name: String,
}

/// How values of a type are compared and hashed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Alg {
    /// Plain byte equality over the whole value.
    Mem,
    /// Structural comparison (floats, strings, interfaces, padded aggregates).
    Walk,
    NotComparable,
}

#[derive(Clone, Debug)]
pub(crate) struct FieldDesc {
    pub name: String,
    pub pkg_path: String,
    pub typ: Type,
    pub tag: String,
    pub offset: usize,
    pub embedded: bool,
}

impl FieldDesc {
    pub fn is_exported(&self) -> bool {
        self.pkg_path.is_empty()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct IMethod {
    pub name: String,
    pub pkg_path: String,
    pub typ: Type,
}

pub(crate) struct DeclMethod {
    pub name: String,
    pub pkg_path: String,
    pub typ: Type,
    pub code: Code,
    pub ptr_recv: bool,
}

#[derive(Clone, Debug)]
pub(crate) enum Detail {
    Basic,
    Array { elem: Type, len: usize },
    Chan { elem: Type, dir: ChanDir },
    Func { ins: Vec<Type>, outs: Vec<Type>, variadic: bool },
    Interface { methods: Vec<IMethod> },
    Map { key: Type, elem: Type },
    Ptr { elem: Type },
    Slice { elem: Type },
    Struct { fields: Vec<FieldDesc>, pkg_path: String },
}

pub(crate) struct Body {
    pub kind: Kind,
    pub size: usize,
    pub align: usize,
    pub gc: GcLayout,
    pub alg: Alg,
    pub detail: Detail,
    /// Methods declared on a named type, sorted by name.
    pub declared: Vec<DeclMethod>,
    /// Unnamed type a named type was defined from.
    pub underlying: Option<Type>,
}

pub(crate) struct RType {
    pub name: Option<TypeName>,
    pub repr: String,
    pub body: OnceCell<Body>,
    pub ptr_to_this: OnceCell<Type>,
    pub methods: OnceCell<MethodSet>,
}

impl RType {
    pub fn new(name: Option<TypeName>, repr: String, body: Option<Body>) -> Self {
        let cell = OnceCell::new();
        if let Some(b) = body {
            let _ = cell.set(b);
        }
        Self { name, repr, body: cell, ptr_to_this: OnceCell::new(), methods: OnceCell::new() }
    }
}

/// Handle to a canonical type descriptor.
#[derive(Clone, Copy)]
pub struct Type(pub(crate) &'static RType);

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.repr)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.repr)
    }
}

/// A struct field as seen by callers and as accepted by `StructOf`.
#[derive(Clone, Debug, PartialEq)]
pub struct StructField {
    pub name: String,
    /// Empty for exported fields.
    pub pkg_path: String,
    pub typ: Type,
    pub tag: StructTag,
    pub offset: usize,
    /// Index path for `FieldByIndex`.
    pub index: Vec<usize>,
    pub anonymous: bool,
}

impl StructField {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        Self {
            name: name.into(),
            pkg_path: String::new(),
            typ,
            tag: StructTag::default(),
            offset: 0,
            index: Vec::new(),
            anonymous: false,
        }
    }

    /// An embedded field; an empty name takes the type's name.
    pub fn embedded(name: impl Into<String>, typ: Type) -> Self {
        Self { anonymous: true, ..Self::new(name, typ) }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = StructTag::new(tag);
        self
    }

    pub fn with_pkg_path(mut self, pkg_path: impl Into<String>) -> Self {
        self.pkg_path = pkg_path.into();
        self
    }

    pub fn is_exported(&self) -> bool {
        self.pkg_path.is_empty()
    }
}

pub(crate) fn is_exported_name(name: &str) -> bool {
    name.chars().next().map_or(false, char::is_uppercase)
}

impl Type {
    #[inline]
    pub(crate) fn addr(&self) -> usize {
        self.0 as *const RType as usize
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.0 as *const RType as *const u8
    }

    /// # Safety
    /// `p` must be null or the address of a type descriptor.
    pub(crate) unsafe fn from_ptr(p: *const u8) -> Option<Type> {
        (!p.is_null()).then(|| Type(&*(p as *const RType)))
    }

    #[track_caller]
    pub(crate) fn body(&self) -> &'static Body {
        let rt: &'static RType = self.0;
        match rt.body.get() {
            Some(b) => b,
            None => ReflectError::Incomplete(rt.repr.clone()).raise(),
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.0.body.get().is_some()
    }

    pub(crate) fn detail(&self) -> &'static Detail {
        &self.body().detail
    }

    pub(crate) fn gc(&self) -> &'static GcLayout {
        &self.body().gc
    }

    pub(crate) fn alg(&self) -> Alg {
        self.body().alg
    }

    pub(crate) fn has_name(&self) -> bool {
        self.0.name.is_some()
    }

    pub fn kind(&self) -> Kind {
        self.body().kind
    }

    /// Name within its package; empty for unnamed types.
    pub fn name(&self) -> &str {
        self.0.name.as_ref().map_or("", |n| n.name.as_str())
    }

    /// Defining package path; empty for predeclared and unnamed types.
    pub fn pkg_path(&self) -> &str {
        self.0.name.as_ref().map_or("", |n| n.pkg_path.as_str())
    }

    pub fn string(&self) -> String {
        self.0.repr.clone()
    }

    pub fn size(&self) -> usize {
        self.body().size
    }

    pub fn align(&self) -> usize {
        self.body().align
    }

    pub fn field_align(&self) -> usize {
        self.body().align
    }

    /// Size in bits of a numeric type.
    pub fn bits(&self) -> usize {
        let k = self.kind();
        if !k.is_numeric() {
            ReflectError::TypeKind { method: "Bits", what: "arithmetic", typ: self.string() }.raise();
        }
        self.size() * 8
    }

    pub fn comparable(&self) -> bool {
        self.alg() != Alg::NotComparable
    }

    /// Element type of an array, chan, map, pointer or slice type.
    pub fn elem(&self) -> Type {
        match self.detail() {
            Detail::Array { elem, .. }
            | Detail::Chan { elem, .. }
            | Detail::Map { elem, .. }
            | Detail::Ptr { elem }
            | Detail::Slice { elem } => *elem,
            _ => ReflectError::TypeKind { method: "Elem", what: "container", typ: self.string() }.raise(),
        }
    }

    pub fn key(&self) -> Type {
        match self.detail() {
            Detail::Map { key, .. } => *key,
            _ => ReflectError::TypeKind { method: "Key", what: "map", typ: self.string() }.raise(),
        }
    }

    pub fn len(&self) -> usize {
        match self.detail() {
            Detail::Array { len, .. } => *len,
            _ => ReflectError::TypeKind { method: "Len", what: "array", typ: self.string() }.raise(),
        }
    }

    pub fn chan_dir(&self) -> ChanDir {
        match self.detail() {
            Detail::Chan { dir, .. } => *dir,
            _ => ReflectError::TypeKind { method: "ChanDir", what: "chan", typ: self.string() }.raise(),
        }
    }

    fn func_parts(&self, method: &'static str) -> (&'static [Type], &'static [Type], bool) {
        match self.detail() {
            Detail::Func { ins, outs, variadic } => (ins, outs, *variadic),
            _ => ReflectError::TypeKind { method, what: "func", typ: self.string() }.raise(),
        }
    }

    pub fn is_variadic(&self) -> bool {
        self.func_parts("IsVariadic").2
    }

    pub fn num_in(&self) -> usize {
        self.func_parts("NumIn").0.len()
    }

    pub fn in_(&self, i: usize) -> Type {
        self.func_parts("In").0[i]
    }

    pub fn ins(&self) -> &'static [Type] {
        self.func_parts("In").0
    }

    pub fn num_out(&self) -> usize {
        self.func_parts("NumOut").1.len()
    }

    pub fn out(&self, i: usize) -> Type {
        self.func_parts("Out").1[i]
    }

    pub fn outs(&self) -> &'static [Type] {
        self.func_parts("Out").1
    }

    pub(crate) fn fields(&self) -> &'static [FieldDesc] {
        match self.detail() {
            Detail::Struct { fields, .. } => fields,
            _ => ReflectError::TypeKind { method: "Field", what: "struct", typ: self.string() }.raise(),
        }
    }

    pub fn num_field(&self) -> usize {
        self.fields().len()
    }

    pub fn field(&self, i: usize) -> StructField {
        let fields = self.fields();
        let f = fields.get(i).unwrap_or_else(|| ReflectError::FieldIndex("Field index out of range").raise());
        StructField {
            name: f.name.clone(),
            pkg_path: f.pkg_path.clone(),
            typ: f.typ,
            tag: StructTag::new(f.tag.clone()),
            offset: f.offset,
            index: vec![i],
            anonymous: f.embedded,
        }
    }

    pub(crate) fn imethods(&self) -> &'static [IMethod] {
        match self.detail() {
            Detail::Interface { methods } => methods,
            _ => &[],
        }
    }

    /// The unnamed type this type was defined from (itself when unnamed).
    pub(crate) fn underlying(&self) -> Type {
        self.body().underlying.unwrap_or(*self)
    }
}

/// Go-style rendering of a function signature without the `func` keyword.
pub(crate) fn signature_repr(ins: &[Type], outs: &[Type], variadic: bool) -> String {
    let mut s = String::from("(");
    for (i, t) in ins.iter().enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        if variadic && i == ins.len() - 1 {
            s.push_str("...");
            s.push_str(&t.elem().0.repr);
        } else {
            s.push_str(&t.0.repr);
        }
    }
    s.push(')');
    match outs {
        [] => {}
        [one] => {
            s.push(' ');
            s.push_str(&one.0.repr);
        }
        many => {
            s.push_str(" (");
            let parts: Vec<&str> = many.iter().map(|t| t.0.repr.as_str()).collect();
            s.push_str(&parts.join(", "));
            s.push(')');
        }
    }
    s
}
