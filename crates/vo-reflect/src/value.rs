//! Values.
//!
//! A `Value` is a type, the address of the storage holding a value of that
//! type, and access flags. For pointer-shaped kinds the address is that of
//! the pointer word, never the pointee.
//!
//! Flags:
//! - `ADDR`: the storage is a stable location, so `addr` and `set*` apply.
//! - `STICKY_RO` / `EMBED_RO`: reached through an unexported field. The
//!   embedded variant is dropped again when an exported field is selected
//!   from it, which is how promoted exported fields stay usable.
//! - `METHOD`: a method value; bits 8.. hold the method index and the type is
//!   the receiver's.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use vo_common_core::Kind;
use vo_runtime::gc_global;
use vo_runtime::objects::{interface, slice, string};
use vo_runtime::GcLayout;

use crate::alg;
use crate::any::{box_str, Any, C128, C64};
use crate::error::{OrRaise, ReflectError, Result};
use crate::registry::{basic, ptr_to};
use crate::resolve;
use crate::rtype::{Detail, Type};

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub(crate) struct Flag(u32);

impl Flag {
    pub const NONE: Flag = Flag(0);
    pub const ADDR: Flag = Flag(1);
    pub const STICKY_RO: Flag = Flag(1 << 1);
    pub const EMBED_RO: Flag = Flag(1 << 2);
    pub const RO: Flag = Flag(Self::STICKY_RO.0 | Self::EMBED_RO.0);
    pub const METHOD: Flag = Flag(1 << 3);
    const METHOD_SHIFT: u32 = 8;

    #[inline]
    pub fn has(self, f: Flag) -> bool {
        self.0 & f.0 != 0
    }

    /// Read-only state to carry into derived values.
    #[inline]
    pub fn ro(self) -> Flag {
        if self.has(Self::RO) {
            Self::STICKY_RO
        } else {
            Self::NONE
        }
    }

    pub fn with_method(self, index: usize) -> Flag {
        Flag(self.0 | Self::METHOD.0 | ((index as u32) << Self::METHOD_SHIFT))
    }

    pub fn method_index(self) -> usize {
        (self.0 >> Self::METHOD_SHIFT) as usize
    }
}

impl BitOr for Flag {
    type Output = Flag;
    fn bitor(self, rhs: Flag) -> Flag {
        Flag(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flag {
    fn bitor_assign(&mut self, rhs: Flag) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Flag {
    type Output = Flag;
    fn bitand(self, rhs: Flag) -> Flag {
        Flag(self.0 & rhs.0)
    }
}

#[derive(Clone, Copy)]
pub struct Value {
    pub(crate) typ: Option<Type>,
    pub(crate) ptr: *mut u8,
    pub(crate) flag: Flag,
}

// SAFETY: a Value is an address plus metadata; concurrent writes through
// values are the caller's to serialize, as with any shared memory.
unsafe impl Send for Value {}
unsafe impl Sync for Value {}

impl Default for Value {
    fn default() -> Self {
        Value::invalid()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.typ {
            None => f.write_str("<invalid Value>"),
            Some(_) => write!(f, "<{} Value>", self.typ()),
        }
    }
}

/// Allocate zeroed storage for one value of `t`.
pub(crate) fn alloc_of(t: Type) -> *mut u8 {
    gc_global::alloc(t.gc(), 1)
}

/// Copy a value of `t` from `src` to `dst`.
///
/// # Safety
/// Both must address storage for a `t`; they may overlap.
#[inline]
pub(crate) unsafe fn typed_copy(t: Type, dst: *mut u8, src: *const u8) {
    if t.size() > 0 && dst as *const u8 != src {
        std::ptr::copy(src, dst, t.size());
    }
}

/// A one-word cell holding `target`, typed `*t`.
pub(crate) fn pointer_cell(t: Type, target: *mut u8, flag: Flag) -> Value {
    let cell = gc_global::alloc(&GcLayout::pointer(), 1);
    // SAFETY: fresh pointer-sized block.
    unsafe { *(cell as *mut *mut u8) = target };
    Value::from_parts(ptr_to(t), cell, flag)
}

/// Load a signed integer of `size` bytes.
pub(crate) unsafe fn load_int(p: *const u8, size: usize) -> i64 {
    match size {
        1 => *(p as *const i8) as i64,
        2 => *(p as *const i16) as i64,
        4 => *(p as *const i32) as i64,
        _ => *(p as *const i64),
    }
}

pub(crate) unsafe fn load_uint(p: *const u8, size: usize) -> u64 {
    match size {
        1 => *p as u64,
        2 => *(p as *const u16) as u64,
        4 => *(p as *const u32) as u64,
        _ => *(p as *const u64),
    }
}

/// Store the low `size` bytes of `bits`.
pub(crate) unsafe fn store_bits(p: *mut u8, size: usize, bits: u64) {
    match size {
        1 => *p = bits as u8,
        2 => *(p as *mut u16) = bits as u16,
        4 => *(p as *mut u32) = bits as u32,
        _ => *(p as *mut u64) = bits,
    }
}

pub(crate) unsafe fn load_float(p: *const u8, size: usize) -> f64 {
    if size == 4 {
        *(p as *const f32) as f64
    } else {
        *(p as *const f64)
    }
}

pub(crate) unsafe fn store_float(p: *mut u8, size: usize, x: f64) {
    if size == 4 {
        *(p as *mut f32) = x as f32;
    } else {
        *(p as *mut f64) = x;
    }
}

pub(crate) unsafe fn load_complex(p: *const u8, size: usize) -> C128 {
    if size == 8 {
        let c = *(p as *const C64);
        C128 { re: c.re as f64, im: c.im as f64 }
    } else {
        *(p as *const C128)
    }
}

pub(crate) unsafe fn store_complex(p: *mut u8, size: usize, c: C128) {
    if size == 8 {
        *(p as *mut C64) = C64 { re: c.re as f32, im: c.im as f32 };
    } else {
        *(p as *mut C128) = c;
    }
}

/// A pointer to a fresh `*T` object.
pub fn new(t: Type) -> Value {
    let obj = alloc_of(t);
    pointer_cell(t, obj, Flag::NONE)
}

/// A fresh, addressable zero value of `t`.
pub fn zero(t: Type) -> Value {
    Value::from_parts(t, alloc_of(t), Flag::ADDR)
}

/// A zero value of `t` that is never written through.
pub(crate) fn zero_temp(t: Type) -> Value {
    Value::from_parts(t, alloc_of(t), Flag::NONE)
}

/// The value `v` points to, or `v` itself when it is not a pointer.
pub fn indirect(v: Value) -> Value {
    if v.kind() != Kind::Ptr {
        return v;
    }
    v.elem()
}

/// A `*t` pointing at `p`.
///
/// # Safety
/// `p` must address a live value of type `t` for as long as the result and
/// anything derived from it are used.
pub unsafe fn new_at(t: Type, p: *mut u8) -> Value {
    pointer_cell(t, p, Flag::NONE)
}

impl Value {
    pub const fn invalid() -> Value {
        Value { typ: None, ptr: std::ptr::null_mut(), flag: Flag::NONE }
    }

    #[inline]
    pub(crate) fn from_parts(t: Type, ptr: *mut u8, flag: Flag) -> Value {
        Value { typ: Some(t), ptr, flag }
    }

    /// The type and storage address behind this value.
    pub fn into_raw_parts(self) -> (Option<Type>, *mut u8) {
        (self.typ, self.ptr)
    }

    /// Reinterpret the storage at `ptr` as an addressable value of `t`.
    ///
    /// # Safety
    /// `ptr` must address a live, properly aligned value whose layout is
    /// exactly `t`'s.
    pub unsafe fn from_raw_parts(t: Type, ptr: *mut u8) -> Value {
        Value::from_parts(t, ptr, Flag::ADDR)
    }

    pub fn is_valid(&self) -> bool {
        self.typ.is_some()
    }

    pub fn kind(&self) -> Kind {
        match self.typ {
            None => Kind::Invalid,
            Some(_) if self.flag.has(Flag::METHOD) => Kind::Func,
            Some(t) => t.kind(),
        }
    }

    #[track_caller]
    pub(crate) fn valid_type(&self, method: &'static str) -> Type {
        match self.typ {
            Some(t) => t,
            None => ReflectError::ZeroValue { method }.raise(),
        }
    }

    /// The value's type; for a method value, the method's signature.
    #[track_caller]
    pub fn typ(&self) -> Type {
        let t = self.valid_type("reflect.Value.Type");
        if self.flag.has(Flag::METHOD) {
            return resolve::method_entry(t, self.flag.method_index()).mtyp;
        }
        t
    }

    #[track_caller]
    pub(crate) fn must_be(&self, method: &'static str, kind: Kind) {
        let k = self.kind();
        if k == Kind::Invalid {
            ReflectError::ZeroValue { method }.raise();
        }
        if k != kind {
            ReflectError::WrongKind { method, kind: k }.raise();
        }
    }

    pub(crate) fn check_exported(&self, method: &'static str) -> Result<()> {
        if !self.is_valid() {
            return Err(ReflectError::ZeroValue { method });
        }
        if self.flag.has(Flag::RO) {
            return Err(ReflectError::Unexported { method });
        }
        Ok(())
    }

    #[track_caller]
    pub(crate) fn must_be_exported(&self, method: &'static str) {
        self.check_exported(method).or_raise()
    }

    pub(crate) fn check_assignable(&self, method: &'static str) -> Result<()> {
        self.check_exported(method)?;
        if !self.flag.has(Flag::ADDR) {
            return Err(ReflectError::Unaddressable { method });
        }
        Ok(())
    }

    #[track_caller]
    pub(crate) fn must_be_assignable(&self, method: &'static str) {
        self.check_assignable(method).or_raise()
    }

    pub fn can_addr(&self) -> bool {
        self.flag.has(Flag::ADDR)
    }

    pub fn can_set(&self) -> bool {
        self.flag.has(Flag::ADDR) && !self.flag.has(Flag::RO)
    }

    #[track_caller]
    pub fn can_interface(&self) -> bool {
        self.valid_type("reflect.Value.CanInterface");
        !self.flag.has(Flag::RO)
    }

    /// Box the value for use outside the engine.
    #[track_caller]
    pub fn interface(&self) -> Any {
        self.valid_type("reflect.Value.Interface");
        if self.flag.has(Flag::RO) {
            ReflectError::CannotInterface.raise();
        }
        self.pack_any()
    }

    /// Interface words of the value, boxing it when it is not an interface.
    pub(crate) fn pack_any(&self) -> Any {
        let v = if self.flag.has(Flag::METHOD) { crate::func::make_method_value("Interface", *self) } else { *self };
        let Some(t) = v.typ else { return Any::NIL };
        if t.kind() == Kind::Interface {
            // SAFETY: interface storage.
            let w = unsafe { interface::read(v.ptr) };
            // SAFETY: the type word is null or a descriptor.
            return Any { typ: unsafe { Type::from_ptr(w.typ) }, data: w.data };
        }
        Any { typ: Some(t), data: v.boxed_data() }
    }

    /// Storage that will never be written again: the value's own storage
    /// when it is already immutable, otherwise a copy.
    pub(crate) fn boxed_data(&self) -> *mut u8 {
        let t = self.valid_type("reflect.Value.Interface");
        if !self.flag.has(Flag::ADDR) {
            return self.ptr;
        }
        let p = alloc_of(t);
        // SAFETY: fresh storage of t.
        unsafe { typed_copy(t, p, self.ptr) };
        p
    }

    /// Address of the value as a `*T`.
    #[track_caller]
    pub fn addr(&self) -> Value {
        let t = self.valid_type("reflect.Value.Addr");
        if !self.flag.has(Flag::ADDR) {
            ReflectError::Unaddressable { method: "reflect.Value.Addr" }.raise();
        }
        pointer_cell(t, self.ptr, self.flag.ro())
    }

    /// The pointee of a pointer or the dynamic value of an interface.
    ///
    /// A nil pointer or nil interface yields the invalid value.
    #[track_caller]
    pub fn elem(&self) -> Value {
        match self.kind() {
            Kind::Interface => {
                // SAFETY: interface storage.
                let w = unsafe { interface::read(self.ptr) };
                // SAFETY: the type word is null or a descriptor.
                match unsafe { Type::from_ptr(w.typ) } {
                    None => Value::invalid(),
                    Some(dt) => Value::from_parts(dt, w.data, self.flag.ro()),
                }
            }
            Kind::Ptr => {
                // SAFETY: pointer storage.
                let p = unsafe { *(self.ptr as *const *mut u8) };
                if p.is_null() {
                    return Value::invalid();
                }
                let elem = self.typ().elem();
                Value::from_parts(elem, p, (self.flag & Flag::RO) | Flag::ADDR)
            }
            Kind::Invalid => ReflectError::ZeroValue { method: "reflect.Value.Elem" }.raise(),
            k => ReflectError::WrongKind { method: "reflect.Value.Elem", kind: k }.raise(),
        }
    }

    #[track_caller]
    pub fn num_field(&self) -> usize {
        self.must_be("reflect.Value.NumField", Kind::Struct);
        self.typ().num_field()
    }

    /// The `i`th field of a struct.
    #[track_caller]
    pub fn field(&self, i: usize) -> Value {
        self.must_be("reflect.Value.Field", Kind::Struct);
        let t = self.typ();
        let Some(f) = t.fields().get(i) else {
            ReflectError::FieldIndex("Field index out of range").raise()
        };
        let mut fl = self.flag & (Flag::ADDR | Flag::STICKY_RO);
        if !f.is_exported() {
            fl |= if f.embedded { Flag::EMBED_RO } else { Flag::STICKY_RO };
        }
        // SAFETY: the offset lies within the struct.
        Value::from_parts(f.typ, unsafe { self.ptr.add(f.offset) }, fl)
    }

    /// Field reached by the index path, dereferencing embedded pointers.
    #[track_caller]
    pub fn field_by_index(&self, index: &[usize]) -> Value {
        self.try_field_by_index(index).or_raise()
    }

    pub fn try_field_by_index(&self, index: &[usize]) -> Result<Value> {
        if index.len() == 1 {
            return Ok(self.field(index[0]));
        }
        self.must_be("reflect.Value.FieldByIndex", Kind::Struct);
        let mut v = *self;
        for (i, &x) in index.iter().enumerate() {
            if i > 0 && v.kind() == Kind::Ptr && v.typ().elem().kind() == Kind::Struct {
                if v.is_nil() {
                    return Err(ReflectError::NilEmbeddedPointer);
                }
                v = v.elem();
            }
            v = v.field(x);
        }
        Ok(v)
    }

    /// Like `field_by_index`, returning an error on nil embedded pointers.
    pub fn field_by_index_err(&self, index: &[usize]) -> Result<Value> {
        self.try_field_by_index(index)
    }

    /// Field with the given name, or the invalid value when there is none.
    #[track_caller]
    pub fn field_by_name(&self, name: &str) -> Value {
        self.must_be("reflect.Value.FieldByName", Kind::Struct);
        match self.typ().field_by_name(name) {
            Some(f) => self.field_by_index(&f.index),
            None => Value::invalid(),
        }
    }

    #[track_caller]
    pub fn field_by_name_func(&self, matches: impl Fn(&str) -> bool) -> Value {
        self.must_be("reflect.Value.FieldByNameFunc", Kind::Struct);
        match self.typ().field_by_name_func(matches) {
            Some(f) => self.field_by_index(&f.index),
            None => Value::invalid(),
        }
    }

    #[track_caller]
    pub fn bool(&self) -> bool {
        self.must_be("reflect.Value.Bool", Kind::Bool);
        // SAFETY: bool storage.
        unsafe { *self.ptr != 0 }
    }

    #[track_caller]
    pub fn int(&self) -> i64 {
        match self.kind() {
            k if k.is_signed_int() => unsafe { load_int(self.ptr, self.typ().size()) },
            k => ReflectError::WrongKind { method: "reflect.Value.Int", kind: k }.raise(),
        }
    }

    #[track_caller]
    pub fn uint(&self) -> u64 {
        match self.kind() {
            k if k.is_unsigned_int() => unsafe { load_uint(self.ptr, self.typ().size()) },
            k => ReflectError::WrongKind { method: "reflect.Value.Uint", kind: k }.raise(),
        }
    }

    #[track_caller]
    pub fn float(&self) -> f64 {
        match self.kind() {
            k if k.is_float() => unsafe { load_float(self.ptr, self.typ().size()) },
            k => ReflectError::WrongKind { method: "reflect.Value.Float", kind: k }.raise(),
        }
    }

    #[track_caller]
    pub fn complex(&self) -> C128 {
        match self.kind() {
            k if k.is_complex() => unsafe { load_complex(self.ptr, self.typ().size()) },
            k => ReflectError::WrongKind { method: "reflect.Value.Complex", kind: k }.raise(),
        }
    }

    /// Contents of a string value; other kinds render as `<T Value>`.
    pub fn string(&self) -> String {
        match self.kind() {
            Kind::Invalid => "<invalid Value>".to_string(),
            Kind::String => String::from_utf8_lossy(self.str_bytes()).into_owned(),
            _ => format!("<{} Value>", self.typ()),
        }
    }

    pub(crate) fn str_bytes(&self) -> &[u8] {
        // SAFETY: caller checked the kind; string bytes are immutable.
        unsafe { string::as_bytes(string::read(self.ptr)) }
    }

    /// Raw pointer word of a pointer-shaped value.
    #[track_caller]
    pub fn pointer(&self) -> usize {
        match self.kind() {
            Kind::Func if self.flag.has(Flag::METHOD) => {
                crate::func::make_method_value("Pointer", *self).pointer()
            }
            k if k.is_pointer_shaped() || k == Kind::Slice => {
                // SAFETY: the first word of each of these kinds is the pointer.
                unsafe { *(self.ptr as *const usize) }
            }
            k => ReflectError::WrongKind { method: "reflect.Value.Pointer", kind: k }.raise(),
        }
    }

    #[track_caller]
    pub fn unsafe_pointer(&self) -> *mut u8 {
        self.pointer() as *mut u8
    }

    #[track_caller]
    pub fn is_nil(&self) -> bool {
        match self.kind() {
            Kind::Func if self.flag.has(Flag::METHOD) => false,
            Kind::Chan | Kind::Func | Kind::Map | Kind::Ptr | Kind::UnsafePointer | Kind::Slice | Kind::Interface => {
                // SAFETY: the first word of each of these kinds is null for nil.
                unsafe { (*(self.ptr as *const usize)) == 0 }
            }
            k => ReflectError::WrongKind { method: "reflect.Value.IsNil", kind: k }.raise(),
        }
    }

    /// Whether the value is its type's zero value. `-0.0` is not zero.
    #[track_caller]
    pub fn is_zero(&self) -> bool {
        let t = self.valid_type("reflect.Value.IsZero");
        if self.flag.has(Flag::METHOD) {
            return false;
        }
        match t.detail() {
            Detail::Array { len, .. } => (0..*len).all(|i| self.index(i).is_zero()),
            Detail::Struct { fields, .. } => (0..fields.len()).all(|i| self.field(i).is_zero()),
            _ if t.kind() == Kind::String => self.len() == 0,
            // SAFETY: the value's storage is t.size() bytes.
            _ => unsafe { std::slice::from_raw_parts(self.ptr, t.size()) }.iter().all(|&b| b == 0),
        }
    }

    #[track_caller]
    pub fn set_zero(&self) {
        self.must_be_assignable("reflect.Value.SetZero");
        let t = self.typ();
        // SAFETY: settable storage of t.
        unsafe { std::ptr::write_bytes(self.ptr, 0, t.size()) };
    }

    /// Assign `x` to the value.
    #[track_caller]
    pub fn set(&self, x: Value) {
        self.try_set(x).or_raise()
    }

    pub fn try_set(&self, x: Value) -> Result<()> {
        self.check_assignable("reflect.Set")?;
        x.check_exported("reflect.Set")?;
        let t = self.typ();
        let x = x.assign_to("reflect.Set", t)?;
        // SAFETY: both hold values of t.
        unsafe { typed_copy(t, self.ptr, x.ptr) };
        Ok(())
    }

    #[track_caller]
    pub fn set_bool(&self, x: bool) {
        self.must_be_assignable("reflect.Value.SetBool");
        self.must_be("reflect.Value.SetBool", Kind::Bool);
        // SAFETY: settable bool storage.
        unsafe { *self.ptr = x as u8 };
    }

    #[track_caller]
    pub fn set_int(&self, x: i64) {
        self.must_be_assignable("reflect.Value.SetInt");
        match self.kind() {
            k if k.is_signed_int() => unsafe { store_bits(self.ptr, self.typ().size(), x as u64) },
            k => ReflectError::WrongKind { method: "reflect.Value.SetInt", kind: k }.raise(),
        }
    }

    #[track_caller]
    pub fn set_uint(&self, x: u64) {
        self.must_be_assignable("reflect.Value.SetUint");
        match self.kind() {
            k if k.is_unsigned_int() => unsafe { store_bits(self.ptr, self.typ().size(), x) },
            k => ReflectError::WrongKind { method: "reflect.Value.SetUint", kind: k }.raise(),
        }
    }

    #[track_caller]
    pub fn set_float(&self, x: f64) {
        self.must_be_assignable("reflect.Value.SetFloat");
        match self.kind() {
            k if k.is_float() => unsafe { store_float(self.ptr, self.typ().size(), x) },
            k => ReflectError::WrongKind { method: "reflect.Value.SetFloat", kind: k }.raise(),
        }
    }

    #[track_caller]
    pub fn set_complex(&self, x: C128) {
        self.must_be_assignable("reflect.Value.SetComplex");
        match self.kind() {
            k if k.is_complex() => unsafe { store_complex(self.ptr, self.typ().size(), x) },
            k => ReflectError::WrongKind { method: "reflect.Value.SetComplex", kind: k }.raise(),
        }
    }

    #[track_caller]
    pub fn set_string(&self, x: &str) {
        self.must_be_assignable("reflect.Value.SetString");
        self.must_be("reflect.Value.SetString", Kind::String);
        let h = gc_global::with_gc(|gc| string::create(gc, x.as_bytes()));
        // SAFETY: settable string storage.
        unsafe { string::write(self.ptr, h) };
    }

    #[track_caller]
    pub fn set_pointer(&self, x: *mut u8) {
        self.must_be_assignable("reflect.Value.SetPointer");
        self.must_be("reflect.Value.SetPointer", Kind::UnsafePointer);
        // SAFETY: settable pointer storage.
        unsafe { *(self.ptr as *mut *mut u8) = x };
    }

    /// Number of elements of an array, chan, map, slice or string, or of the
    /// array a pointer points to.
    #[track_caller]
    pub fn len(&self) -> usize {
        match self.kind() {
            Kind::Array => self.typ().len(),
            Kind::Slice => unsafe { slice::read(self.ptr).len },
            Kind::String => unsafe { string::read(self.ptr).len },
            Kind::Map => crate::map_ops::map_len(self),
            Kind::Chan => crate::chan::chan_obj(self).map_or(0, |c| c.len()),
            Kind::Ptr if self.typ().elem().kind() == Kind::Array => self.typ().elem().len(),
            k => ReflectError::WrongKind { method: "reflect.Value.Len", kind: k }.raise(),
        }
    }

    #[track_caller]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[track_caller]
    pub fn cap(&self) -> usize {
        match self.kind() {
            Kind::Array => self.typ().len(),
            Kind::Slice => unsafe { slice::read(self.ptr).cap },
            Kind::Chan => crate::chan::chan_obj(self).map_or(0, |c| c.cap()),
            Kind::Ptr if self.typ().elem().kind() == Kind::Array => self.typ().elem().len(),
            k => ReflectError::WrongKind { method: "reflect.Value.Cap", kind: k }.raise(),
        }
    }

    /// Whether `==` on this value can succeed, looking through interfaces.
    pub fn comparable(&self) -> bool {
        match self.typ {
            None => true,
            Some(_) if self.flag.has(Flag::METHOD) => false,
            // SAFETY: the value's storage holds a t.
            Some(t) => unsafe { alg::value_comparable(t, self.ptr) },
        }
    }

    /// `==` between two values of the same type.
    #[track_caller]
    pub fn equal(&self, u: &Value) -> bool {
        if self.kind() == Kind::Interface {
            return self.elem().equal(u);
        }
        if u.kind() == Kind::Interface {
            return self.equal(&u.elem());
        }
        match (self.typ, u.typ) {
            (None, None) => return true,
            (None, _) | (_, None) => return false,
            _ => {}
        }
        let t = self.typ();
        if t != u.typ() {
            return false;
        }
        match unsafe { alg::equal(t, self.ptr, u.ptr) } {
            Ok(eq) => eq,
            Err(_) => ReflectError::NotComparable(t.string()).raise(),
        }
    }
}

pub(crate) fn string_value(s: &[u8], flag: Flag) -> Value {
    Value::from_parts(basic(Kind::String), box_str(s), flag)
}

/// Valid Go identifier: a letter or `_` followed by letters, digits or `_`.
pub(crate) fn is_valid_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphabetic() || c.is_numeric())
}
