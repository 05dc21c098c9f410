//! Boxed values crossing the API boundary.
//!
//! An `Any` is the in-memory form of an empty interface: a dynamic type and
//! a pointer to an immutable heap copy of the value.

use std::fmt;

use vo_common_core::Kind;
use vo_runtime::gc_global;
use vo_runtime::objects::string;

use crate::registry::basic;
use crate::rtype::Type;
use crate::value::{Flag, Value};

#[derive(Clone, Copy)]
pub struct Any {
    pub(crate) typ: Option<Type>,
    pub(crate) data: *mut u8,
}

// SAFETY: the data block is never written after boxing.
unsafe impl Send for Any {}
unsafe impl Sync for Any {}

impl Any {
    pub const NIL: Any = Any { typ: None, data: std::ptr::null_mut() };

    pub fn is_nil(&self) -> bool {
        self.typ.is_none()
    }

    /// Dynamic type, `None` for a nil interface.
    pub fn typ(&self) -> Option<Type> {
        self.typ
    }

    /// The boxed value if its dynamic type is exactly `T`'s predeclared type.
    pub fn downcast<T: Native>(&self) -> Option<T> {
        if self.typ != Some(T::native_type()) {
            return None;
        }
        // SAFETY: the box holds a value of T's layout.
        Some(unsafe { std::ptr::read(self.data as *const T) })
    }

    /// The boxed string, if the dynamic type is `string`.
    pub fn as_string(&self) -> Option<String> {
        if self.typ != Some(basic(Kind::String)) {
            return None;
        }
        // SAFETY: the box holds a string header.
        let bytes = unsafe { string::as_bytes(string::read(self.data)) };
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

impl fmt::Debug for Any {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.typ {
            None => f.write_str("Any(nil)"),
            Some(t) => write!(f, "Any({t})"),
        }
    }
}

/// Rust scalars with a predeclared counterpart.
pub trait Native: Copy + Send + Sync + 'static {
    const KIND: Kind;

    fn native_type() -> Type {
        basic(Self::KIND)
    }
}

/// `complex64` storage.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct C64 {
    pub re: f32,
    pub im: f32,
}

/// `complex128` storage.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct C128 {
    pub re: f64,
    pub im: f64,
}

macro_rules! native {
    ($($t:ty => $k:ident),* $(,)?) => {
        $(impl Native for $t {
            const KIND: Kind = Kind::$k;
        })*
    };
}

native! {
    bool => Bool,
    isize => Int,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    usize => Uint,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
    C64 => Complex64,
    C128 => Complex128,
}

pub(crate) fn box_native<T: Native>(x: T) -> *mut u8 {
    let t = T::native_type();
    let p = gc_global::alloc(t.gc(), 1);
    // SAFETY: fresh block sized and aligned for T.
    unsafe { std::ptr::write(p as *mut T, x) };
    p
}

pub(crate) fn box_str(s: &[u8]) -> *mut u8 {
    let t = basic(Kind::String);
    let h = gc_global::with_gc(|gc| string::create(gc, s));
    let p = gc_global::alloc(t.gc(), 1);
    // SAFETY: fresh string header block.
    unsafe { string::write(p, h) };
    p
}

impl<T: Native> From<T> for Any {
    fn from(x: T) -> Self {
        Any { typ: Some(T::native_type()), data: box_native(x) }
    }
}

impl From<&str> for Any {
    fn from(s: &str) -> Self {
        Any { typ: Some(basic(Kind::String)), data: box_str(s.as_bytes()) }
    }
}

impl From<String> for Any {
    fn from(s: String) -> Self {
        Any::from(s.as_str())
    }
}

impl From<Value> for Any {
    fn from(v: Value) -> Self {
        v.interface()
    }
}

impl From<&Value> for Any {
    fn from(v: &Value) -> Self {
        v.interface()
    }
}

/// Dynamic type of `x`; `None` for nil.
pub fn type_of(x: impl Into<Any>) -> Option<Type> {
    x.into().typ
}

/// A value viewing `x`'s boxed copy. Nil yields the invalid value.
pub fn value_of(x: impl Into<Any>) -> Value {
    let a = x.into();
    match a.typ {
        None => Value::invalid(),
        Some(t) => Value::from_parts(t, a.data, Flag::NONE),
    }
}
