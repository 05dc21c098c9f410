//! Assignability, interface satisfaction and conversion.

use vo_common_core::Kind;
use vo_runtime::gc_global;
use vo_runtime::objects::interface::{self, IfaceWords};
use vo_runtime::objects::slice;

use crate::any::C128;
use crate::error::{OrRaise, ReflectError, Result};
use crate::resolve;
use crate::rtype::{Detail, Type};
use crate::value::{alloc_of, store_bits, store_complex, store_float, string_value, typed_copy, Flag, Value};

/// Whether a value of type `v` may be assigned to a variable of type `t`
/// without an interface conversion.
pub(crate) fn directly_assignable(t: Type, v: Type) -> bool {
    if t == v {
        return true;
    }
    if (t.has_name() && v.has_name()) || t.kind() != v.kind() {
        return false;
    }
    if t.kind() == Kind::Chan && special_channel_assignability(t, v) {
        return true;
    }
    have_identical_underlying_type(t, v, true)
}

/// A bidirectional channel narrows to a directional one of the same element.
fn special_channel_assignability(t: Type, v: Type) -> bool {
    v.chan_dir() == vo_common_core::ChanDir::Both
        && (!t.has_name() || !v.has_name())
        && have_identical_type(t.elem(), v.elem(), true)
}

fn have_identical_type(t: Type, v: Type, cmp_tags: bool) -> bool {
    if cmp_tags {
        return t == v;
    }
    if t.name() != v.name() || t.kind() != v.kind() || t.pkg_path() != v.pkg_path() {
        return false;
    }
    have_identical_underlying_type(t, v, false)
}

pub(crate) fn have_identical_underlying_type(t: Type, v: Type, cmp_tags: bool) -> bool {
    if t == v {
        return true;
    }
    let kind = t.kind();
    if kind != v.kind() {
        return false;
    }
    if kind.is_basic() {
        return true;
    }
    match (t.detail(), v.detail()) {
        (Detail::Array { elem: te, len: tl }, Detail::Array { elem: ve, len: vl }) => {
            tl == vl && have_identical_type(*te, *ve, cmp_tags)
        }
        (Detail::Chan { elem: te, dir: td }, Detail::Chan { elem: ve, dir: vd }) => {
            td == vd && have_identical_type(*te, *ve, cmp_tags)
        }
        (
            Detail::Func { ins: ti, outs: to, variadic: tv },
            Detail::Func { ins: vi, outs: vo, variadic: vv },
        ) => {
            tv == vv
                && ti.len() == vi.len()
                && to.len() == vo.len()
                && ti.iter().zip(vi).all(|(a, b)| have_identical_type(*a, *b, cmp_tags))
                && to.iter().zip(vo).all(|(a, b)| have_identical_type(*a, *b, cmp_tags))
        }
        // Interfaces with methods may still need a dynamic check.
        (Detail::Interface { methods: tm }, Detail::Interface { methods: vm }) => tm.is_empty() && vm.is_empty(),
        (Detail::Map { key: tk, elem: te }, Detail::Map { key: vk, elem: ve }) => {
            have_identical_type(*tk, *vk, cmp_tags) && have_identical_type(*te, *ve, cmp_tags)
        }
        (Detail::Ptr { elem: te }, Detail::Ptr { elem: ve }) | (Detail::Slice { elem: te }, Detail::Slice { elem: ve }) => {
            have_identical_type(*te, *ve, cmp_tags)
        }
        (Detail::Struct { fields: tf, pkg_path: tp }, Detail::Struct { fields: vf, pkg_path: vp }) => {
            tf.len() == vf.len()
                && tp == vp
                && tf.iter().zip(vf).all(|(a, b)| {
                    a.name == b.name
                        && have_identical_type(a.typ, b.typ, cmp_tags)
                        && (!cmp_tags || a.tag == b.tag)
                        && a.offset == b.offset
                        && a.embedded == b.embedded
                })
        }
        _ => false,
    }
}

/// Whether `v` satisfies interface type `t`.
pub(crate) fn implements(t: Type, v: Type) -> bool {
    if t.kind() != Kind::Interface {
        return false;
    }
    let want = t.imethods();
    if want.is_empty() {
        return true;
    }
    if v.kind() == Kind::Interface {
        let have = v.imethods();
        return want.iter().all(|m| {
            have.iter().any(|h| h.name == m.name && h.typ == m.typ && (m.pkg_path.is_empty() || h.pkg_path == m.pkg_path))
        });
    }
    let set = resolve::method_set(v);
    want.iter().all(|m| match set.find(&m.name) {
        Some(e) => e.mtyp == m.typ && (m.pkg_path.is_empty() || e.pkg_path == m.pkg_path),
        None => false,
    })
}

impl Type {
    pub fn assignable_to(&self, u: Type) -> bool {
        directly_assignable(u, *self) || implements(u, *self)
    }

    pub fn convertible_to(&self, u: Type) -> bool {
        convert_op(u, *self).is_some()
    }

    /// Whether the type satisfies interface type `u`.
    #[track_caller]
    pub fn implements(&self, u: Type) -> bool {
        if u.kind() != Kind::Interface {
            ReflectError::NotKindType { op: "reflect.Type.Implements", kind: Kind::Interface, typ: u.string() }.raise();
        }
        implements(u, *self)
    }
}

impl Value {
    /// The value as it would be stored in a variable of type `dst`.
    pub(crate) fn assign_to(self, op: &'static str, dst: Type) -> Result<Value> {
        let v = if self.flag.has(Flag::METHOD) { crate::func::make_method_value(op, self) } else { self };
        let vt = v.typ();
        if directly_assignable(dst, vt) {
            return Ok(Value::from_parts(dst, v.ptr, v.flag & (Flag::ADDR | Flag::RO)));
        }
        if implements(dst, vt) {
            if v.kind() == Kind::Interface && v.is_nil() {
                return Ok(crate::value::zero_temp(dst));
            }
            return Ok(to_interface(v, dst));
        }
        Err(ReflectError::NotAssignable { op, from: vt.string(), to: dst.string() })
    }

    /// The value converted to `t`.
    #[track_caller]
    pub fn convert(&self, t: Type) -> Value {
        self.try_convert(t).or_raise()
    }

    pub fn try_convert(&self, t: Type) -> Result<Value> {
        let v = if self.flag.has(Flag::METHOD) { crate::func::make_method_value("Convert", *self) } else { *self };
        let vt = v.typ();
        match convert_op(t, vt) {
            Some(op) => Ok(op(v, t)),
            None => Err(ReflectError::NotConvertible { from: vt.string(), to: t.string() }),
        }
    }

    /// Whether `convert(t)` would succeed for this particular value.
    pub fn can_convert(&self, t: Type) -> bool {
        self.is_valid() && self.typ().convertible_to(t)
    }
}

/// Store `v` in fresh interface storage of type `dst`.
fn to_interface(v: Value, dst: Type) -> Value {
    let words = if v.kind() == Kind::Interface {
        // SAFETY: interface storage.
        unsafe { interface::read(v.ptr) }
    } else {
        IfaceWords { typ: v.typ().as_ptr(), data: v.boxed_data() }
    };
    let p = alloc_of(dst);
    // SAFETY: fresh interface storage.
    unsafe { interface::write(p, words) };
    Value::from_parts(dst, p, v.flag.ro())
}

type ConvertOp = fn(Value, Type) -> Value;

fn convert_op(dst: Type, src: Type) -> Option<ConvertOp> {
    let (sk, dk) = (src.kind(), dst.kind());
    if sk.is_signed_int() {
        if dk.is_integer() {
            return Some(cvt_int);
        }
        if dk.is_float() {
            return Some(cvt_int_float);
        }
        if dk == Kind::String {
            return Some(cvt_int_string);
        }
    } else if sk.is_unsigned_int() {
        if dk.is_integer() {
            return Some(cvt_uint);
        }
        if dk.is_float() {
            return Some(cvt_uint_float);
        }
        if dk == Kind::String {
            return Some(cvt_uint_string);
        }
    } else if sk.is_float() {
        if dk.is_signed_int() {
            return Some(cvt_float_int);
        }
        if dk.is_unsigned_int() {
            return Some(cvt_float_uint);
        }
        if dk.is_float() {
            return Some(cvt_float);
        }
    } else if sk.is_complex() {
        if dk.is_complex() {
            return Some(cvt_complex);
        }
    } else if sk == Kind::String {
        if dk == Kind::Slice && dst.elem().pkg_path().is_empty() {
            match dst.elem().kind() {
                Kind::Uint8 => return Some(cvt_string_bytes),
                Kind::Int32 => return Some(cvt_string_runes),
                _ => {}
            }
        }
    } else if sk == Kind::Slice {
        if dk == Kind::String && src.elem().pkg_path().is_empty() {
            match src.elem().kind() {
                Kind::Uint8 => return Some(cvt_bytes_string),
                Kind::Int32 => return Some(cvt_runes_string),
                _ => {}
            }
        }
    } else if sk == Kind::Chan && dk == Kind::Chan && special_channel_assignability(dst, src) {
        return Some(cvt_direct);
    }

    if have_identical_underlying_type(dst, src, false) {
        return Some(cvt_direct);
    }
    if dk == Kind::Ptr
        && !dst.has_name()
        && sk == Kind::Ptr
        && !src.has_name()
        && have_identical_underlying_type(dst.elem().underlying(), src.elem().underlying(), false)
    {
        return Some(cvt_direct);
    }
    if implements(dst, src) {
        return Some(if sk == Kind::Interface { cvt_i2i } else { cvt_t2i });
    }
    None
}

fn make_bits(t: Type, bits: u64, flag: Flag) -> Value {
    let p = alloc_of(t);
    // SAFETY: fresh storage of t.
    unsafe { store_bits(p, t.size(), bits) };
    Value::from_parts(t, p, flag)
}

fn make_float(t: Type, x: f64, flag: Flag) -> Value {
    let p = alloc_of(t);
    // SAFETY: fresh storage of t.
    unsafe { store_float(p, t.size(), x) };
    Value::from_parts(t, p, flag)
}

fn make_complex(t: Type, c: C128, flag: Flag) -> Value {
    let p = alloc_of(t);
    // SAFETY: fresh storage of t.
    unsafe { store_complex(p, t.size(), c) };
    Value::from_parts(t, p, flag)
}

fn make_string(t: Type, s: &[u8], flag: Flag) -> Value {
    let v = string_value(s, flag);
    Value::from_parts(t, v.ptr, flag)
}

fn cvt_int(v: Value, t: Type) -> Value {
    make_bits(t, v.int() as u64, v.flag.ro())
}

fn cvt_uint(v: Value, t: Type) -> Value {
    make_bits(t, v.uint(), v.flag.ro())
}

fn cvt_float_int(v: Value, t: Type) -> Value {
    make_bits(t, v.float() as i64 as u64, v.flag.ro())
}

fn cvt_float_uint(v: Value, t: Type) -> Value {
    make_bits(t, v.float() as u64, v.flag.ro())
}

fn cvt_int_float(v: Value, t: Type) -> Value {
    make_float(t, v.int() as f64, v.flag.ro())
}

fn cvt_uint_float(v: Value, t: Type) -> Value {
    make_float(t, v.uint() as f64, v.flag.ro())
}

fn cvt_float(v: Value, t: Type) -> Value {
    if v.kind() == Kind::Float32 && t.kind() == Kind::Float32 {
        // Keep the exact bits of a float32, NaN payloads included.
        // SAFETY: float32 storage.
        let bits = unsafe { *(v.ptr as *const u32) };
        return make_bits(t, bits as u64, v.flag.ro());
    }
    make_float(t, v.float(), v.flag.ro())
}

fn cvt_complex(v: Value, t: Type) -> Value {
    make_complex(t, v.complex(), v.flag.ro())
}

fn code_point_string(c: Option<char>) -> String {
    c.unwrap_or(char::REPLACEMENT_CHARACTER).to_string()
}

fn cvt_int_string(v: Value, t: Type) -> Value {
    let c = i32::try_from(v.int()).ok().and_then(|r| u32::try_from(r).ok()).and_then(char::from_u32);
    make_string(t, code_point_string(c).as_bytes(), v.flag.ro())
}

fn cvt_uint_string(v: Value, t: Type) -> Value {
    let c = u32::try_from(v.uint()).ok().filter(|&r| r <= i32::MAX as u32).and_then(char::from_u32);
    make_string(t, code_point_string(c).as_bytes(), v.flag.ro())
}

fn new_slice_of(t: Type, len: usize) -> (Value, *mut u8) {
    let h = gc_global::with_gc(|gc| slice::create(gc, t.elem().gc(), len, len));
    let p = alloc_of(t);
    // SAFETY: fresh slice header storage.
    unsafe { slice::write(p, h) };
    (Value::from_parts(t, p, Flag::NONE), h.data)
}

fn cvt_string_bytes(v: Value, t: Type) -> Value {
    let bytes = v.str_bytes();
    let (mut out, data) = new_slice_of(t, bytes.len());
    // SAFETY: the backing array holds bytes.len() bytes.
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), data, bytes.len()) };
    out.flag = v.flag.ro();
    out
}

/// Decode UTF-8 the way a Go range loop does: each invalid byte is U+FFFD.
pub(crate) fn decode_runes(mut rest: &[u8]) -> Vec<i32> {
    let mut out = Vec::with_capacity(rest.len());
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                out.extend(s.chars().map(|c| c as i32));
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                if let Ok(s) = std::str::from_utf8(valid) {
                    out.extend(s.chars().map(|c| c as i32));
                }
                out.push(char::REPLACEMENT_CHARACTER as i32);
                rest = &after[1..];
            }
        }
    }
    out
}

fn cvt_string_runes(v: Value, t: Type) -> Value {
    let runes = decode_runes(v.str_bytes());
    let (mut out, data) = new_slice_of(t, runes.len());
    // SAFETY: the backing array holds runes.len() int32s.
    unsafe { std::ptr::copy_nonoverlapping(runes.as_ptr(), data as *mut i32, runes.len()) };
    out.flag = v.flag.ro();
    out
}

fn cvt_bytes_string(v: Value, t: Type) -> Value {
    // SAFETY: []byte storage.
    let h = unsafe { slice::read(v.ptr) };
    let bytes: &[u8] = if h.len == 0 { &[] } else { unsafe { std::slice::from_raw_parts(h.data, h.len) } };
    make_string(t, bytes, v.flag.ro())
}

fn cvt_runes_string(v: Value, t: Type) -> Value {
    // SAFETY: []rune storage.
    let h = unsafe { slice::read(v.ptr) };
    let runes: &[i32] = if h.len == 0 { &[] } else { unsafe { std::slice::from_raw_parts(h.data as *const i32, h.len) } };
    let s: String = runes
        .iter()
        .map(|&r| u32::try_from(r).ok().and_then(char::from_u32).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    make_string(t, s.as_bytes(), v.flag.ro())
}

fn cvt_direct(v: Value, t: Type) -> Value {
    if v.flag.has(Flag::ADDR) {
        // Detach from the addressable original.
        let p = alloc_of(t);
        // SAFETY: same layout on both sides.
        unsafe { typed_copy(t, p, v.ptr) };
        return Value::from_parts(t, p, v.flag.ro());
    }
    Value::from_parts(t, v.ptr, v.flag.ro())
}

fn cvt_t2i(v: Value, t: Type) -> Value {
    to_interface(v, t)
}

fn cvt_i2i(v: Value, t: Type) -> Value {
    if v.is_nil() {
        let mut z = crate::value::zero_temp(t);
        z.flag = v.flag.ro();
        return z;
    }
    to_interface(v.elem(), t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_runes_replaces_each_invalid_byte() {
        assert_eq!(decode_runes("héllo".as_bytes()), vec![104, 233, 108, 108, 111]);
        assert_eq!(decode_runes(b"a\xff\xfeb"), vec![97, 0xFFFD, 0xFFFD, 98]);
        assert!(decode_runes(b"").is_empty());
    }
}
