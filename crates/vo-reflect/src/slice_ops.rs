//! Indexing, slicing and the slice builtins.

use vo_common_core::Kind;
use vo_runtime::objects::{slice, string};
use vo_runtime::with_gc;

use crate::error::{OrRaise, ReflectError, Result};
use crate::factory::slice_of;
use crate::rtype::Type;
use crate::value::{alloc_of, Flag, Value};

fn slice_value(t: Type, h: slice::SliceHeader, flag: Flag) -> Value {
    let cell = alloc_of(t);
    // SAFETY: fresh slice storage.
    unsafe { slice::write(cell, h) };
    Value::from_parts(t, cell, flag)
}

/// A new zeroed slice of type `t`.
#[track_caller]
pub fn make_slice(t: Type, len: usize, cap: usize) -> Value {
    try_make_slice(t, len, cap).or_raise()
}

pub fn try_make_slice(t: Type, len: usize, cap: usize) -> Result<Value> {
    if t.kind() != Kind::Slice {
        return Err(ReflectError::NotKindType { op: "reflect.MakeSlice", kind: Kind::Slice, typ: t.string() });
    }
    if len > cap {
        return Err(ReflectError::LenGreaterThanCap);
    }
    let h = with_gc(|gc| slice::create(gc, t.elem().gc(), len, cap));
    Ok(slice_value(t, h, Flag::NONE))
}

/// Start, length and capacity of the elements behind an array, slice or
/// string value.
fn elems(v: &Value) -> (*mut u8, usize, usize) {
    match v.kind() {
        Kind::Array => (v.ptr, v.typ().len(), v.typ().len()),
        Kind::Slice => {
            // SAFETY: slice storage.
            let h = unsafe { slice::read(v.ptr) };
            (h.data, h.len, h.cap)
        }
        _ => {
            // SAFETY: string storage.
            let h = unsafe { string::read(v.ptr) };
            (h.data as *mut u8, h.len, h.len)
        }
    }
}

/// Grow `s` by `extra` zeroed elements into a fresh backing array.
#[track_caller]
fn extend(op: &'static str, s: Value, extra: usize) -> Value {
    s.must_be_exported(op);
    s.must_be(op, Kind::Slice);
    let t = s.typ();
    let et = t.elem();
    let (data, len, cap) = elems(&s);
    let need = len + extra;
    let h = with_gc(|gc| slice::create(gc, et.gc(), need, slice::grow_cap(cap, need)));
    if len > 0 && et.size() > 0 {
        // SAFETY: the new array holds at least len elements; arrays are distinct.
        unsafe { std::ptr::copy_nonoverlapping(data, h.data, len * et.size()) };
    }
    slice_value(t, h, Flag::NONE)
}

/// `append(s, xs...)`. The result never shares storage with `s`.
#[track_caller]
pub fn append(s: Value, xs: &[Value]) -> Value {
    let n = s.len();
    let r = extend("reflect.Append", s, xs.len());
    for (i, x) in xs.iter().enumerate() {
        r.index(n + i).set(*x);
    }
    r
}

/// `append(s, t...)`.
#[track_caller]
pub fn append_slice(s: Value, t: Value) -> Value {
    s.must_be("reflect.AppendSlice", Kind::Slice);
    t.must_be("reflect.AppendSlice", Kind::Slice);
    let (se, te) = (s.typ().elem(), t.typ().elem());
    if se != te {
        ReflectError::TypeMismatch { op: "reflect.AppendSlice", a: se.string(), b: te.string() }.raise();
    }
    t.must_be_exported("reflect.AppendSlice");
    let n = s.len();
    let (src, m, _) = elems(&t);
    let r = extend("reflect.AppendSlice", s, m);
    if m > 0 && se.size() > 0 {
        let (dst, _, _) = elems(&r);
        // SAFETY: r has room for n + m elements and a fresh array.
        unsafe { std::ptr::copy_nonoverlapping(src, dst.add(n * se.size()), m * se.size()) };
    }
    r
}

/// Copy elements from `src` into `dst`, returning how many were copied.
///
/// `dst` must be a slice or an assignable array; `src` may also be a
/// string when `dst` holds bytes.
#[track_caller]
pub fn copy(dst: Value, src: Value) -> usize {
    let dk = dst.kind();
    if dk != Kind::Array && dk != Kind::Slice {
        ReflectError::WrongKind { method: "reflect.Copy", kind: dk }.raise();
    }
    if dk == Kind::Array {
        dst.must_be_assignable("reflect.Copy");
    }
    dst.must_be_exported("reflect.Copy");
    let de = dst.typ().elem();
    let sk = src.kind();
    match sk {
        Kind::Array | Kind::Slice => {
            let se = src.typ().elem();
            if de != se {
                ReflectError::TypeMismatch { op: "reflect.Copy", a: de.string(), b: se.string() }.raise();
            }
        }
        Kind::String if de.kind() == Kind::Uint8 => {}
        _ => ReflectError::WrongKind { method: "reflect.Copy", kind: sk }.raise(),
    }
    src.must_be_exported("reflect.Copy");
    let (d, dlen, _) = elems(&dst);
    let (s, slen, _) = elems(&src);
    let n = dlen.min(slen);
    if n > 0 && de.size() > 0 {
        // SAFETY: both ranges hold at least n elements; they may overlap.
        unsafe { std::ptr::copy(s, d, n * de.size()) };
    }
    n
}

/// A function swapping two elements of the slice `v`.
#[track_caller]
pub fn swapper(v: Value) -> Box<dyn Fn(usize, usize) + Send + Sync> {
    v.must_be("reflect.Swapper", Kind::Slice);
    let (data, len, _) = elems(&v);
    let size = v.typ().elem().size();
    let base = data as usize;
    Box::new(move |i, j| {
        if i >= len || j >= len {
            ReflectError::IndexOutOfRange { what: "slice" }.raise();
        }
        if i != j && size > 0 {
            let p = base as *mut u8;
            // SAFETY: distinct in-bounds elements of the slice.
            unsafe { std::ptr::swap_nonoverlapping(p.add(i * size), p.add(j * size), size) };
        }
    })
}

impl Value {
    /// The `i`th element of an array, slice or string.
    #[track_caller]
    pub fn index(&self, i: usize) -> Value {
        match self.kind() {
            Kind::Array => {
                let t = self.typ();
                if i >= t.len() {
                    ReflectError::IndexOutOfRange { what: "array" }.raise();
                }
                let et = t.elem();
                let fl = (self.flag & Flag::ADDR) | self.flag.ro();
                // SAFETY: in bounds.
                Value::from_parts(et, unsafe { self.ptr.add(i * et.size()) }, fl)
            }
            Kind::Slice => {
                // SAFETY: slice storage.
                let h = unsafe { slice::read(self.ptr) };
                if i >= h.len {
                    ReflectError::IndexOutOfRange { what: "slice" }.raise();
                }
                let et = self.typ().elem();
                // SAFETY: in bounds.
                Value::from_parts(et, unsafe { h.data.add(i * et.size()) }, Flag::ADDR | self.flag.ro())
            }
            Kind::String => {
                // SAFETY: string storage.
                let h = unsafe { string::read(self.ptr) };
                if i >= h.len {
                    ReflectError::IndexOutOfRange { what: "string" }.raise();
                }
                // String bytes are immutable, so the element is never addressable.
                let p = unsafe { h.data.add(i) } as *mut u8;
                Value::from_parts(crate::registry::basic(Kind::Uint8), p, self.flag.ro())
            }
            k => ReflectError::WrongKind { method: "reflect.Value.Index", kind: k }.raise(),
        }
    }

    /// `v[i:j]`. Slicing an array requires it to be addressable.
    #[track_caller]
    pub fn slice(&self, i: usize, j: usize) -> Value {
        const OP: &str = "reflect.Value.Slice";
        match self.kind() {
            Kind::String => {
                // SAFETY: string storage.
                let h = unsafe { string::read(self.ptr) };
                if i > j || j > h.len {
                    ReflectError::OutOfBounds { op: OP, what: "string slice" }.raise();
                }
                let sub = string::StringHeader {
                    data: if j > i { unsafe { h.data.add(i) } } else { std::ptr::null() },
                    len: j - i,
                };
                let cell = alloc_of(self.typ());
                // SAFETY: fresh string storage.
                unsafe { string::write(cell, sub) };
                Value::from_parts(self.typ(), cell, self.flag.ro())
            }
            _ => self.slice_impl(OP, i, j, None),
        }
    }

    /// `v[i:j:k]`.
    #[track_caller]
    pub fn slice3(&self, i: usize, j: usize, k: usize) -> Value {
        if self.kind() == Kind::String {
            ReflectError::WrongKind { method: "reflect.Value.Slice3", kind: Kind::String }.raise();
        }
        self.slice_impl("reflect.Value.Slice3", i, j, Some(k))
    }

    #[track_caller]
    fn slice_impl(&self, op: &'static str, i: usize, j: usize, k: Option<usize>) -> Value {
        let t = match self.kind() {
            Kind::Array => {
                if !self.flag.has(Flag::ADDR) {
                    ReflectError::Unaddressable { method: op }.raise();
                }
                slice_of(self.typ().elem())
            }
            Kind::Slice => self.typ(),
            kind => ReflectError::WrongKind { method: op, kind }.raise(),
        };
        let (data, _, cap) = elems(self);
        let k = k.unwrap_or(cap);
        if i > j || j > k || k > cap {
            ReflectError::OutOfBounds { op, what: "slice" }.raise();
        }
        let esize = t.elem().size();
        let h = slice::SliceHeader {
            // SAFETY: i <= cap, so the offset stays within or one past the array.
            data: if k > i { unsafe { data.add(i * esize) } } else { data },
            len: j - i,
            cap: k - i,
        };
        slice_value(t, h, self.flag.ro())
    }

    #[track_caller]
    pub fn set_len(&self, n: usize) {
        self.must_be_assignable("reflect.Value.SetLen");
        self.must_be("reflect.Value.SetLen", Kind::Slice);
        // SAFETY: settable slice storage.
        let mut h = unsafe { slice::read(self.ptr) };
        if n > h.cap {
            ReflectError::LenOutOfRange { what: "slice length", method: "SetLen" }.raise();
        }
        h.len = n;
        unsafe { slice::write(self.ptr, h) };
    }

    #[track_caller]
    pub fn set_cap(&self, n: usize) {
        self.must_be_assignable("reflect.Value.SetCap");
        self.must_be("reflect.Value.SetCap", Kind::Slice);
        // SAFETY: settable slice storage.
        let mut h = unsafe { slice::read(self.ptr) };
        if n < h.len || n > h.cap {
            ReflectError::LenOutOfRange { what: "slice capacity", method: "SetCap" }.raise();
        }
        h.cap = n;
        unsafe { slice::write(self.ptr, h) };
    }

    /// Contents of a byte slice, or of an addressable byte array.
    #[track_caller]
    pub fn bytes(&self) -> &[u8] {
        let k = self.kind();
        match k {
            Kind::Slice => {}
            Kind::Array if self.flag.has(Flag::ADDR) => {}
            Kind::Array => ReflectError::Unaddressable { method: "reflect.Value.Bytes" }.raise(),
            _ => ReflectError::WrongKind { method: "reflect.Value.Bytes", kind: k }.raise(),
        }
        let et = self.typ().elem();
        if et.kind() != Kind::Uint8 {
            ReflectError::NotKindType { op: "reflect.Value.Bytes", kind: Kind::Uint8, typ: et.string() }.raise();
        }
        let (data, len, _) = elems(self);
        if len == 0 {
            return &[];
        }
        // SAFETY: len initialized bytes.
        unsafe { std::slice::from_raw_parts(data, len) }
    }

    /// Point a byte slice at a heap copy of `x`.
    #[track_caller]
    pub fn set_bytes(&self, x: &[u8]) {
        self.must_be_assignable("reflect.Value.SetBytes");
        self.must_be("reflect.Value.SetBytes", Kind::Slice);
        let et = self.typ().elem();
        if et.kind() != Kind::Uint8 {
            ReflectError::NotKindType { op: "reflect.Value.SetBytes", kind: Kind::Uint8, typ: et.string() }.raise();
        }
        let h = with_gc(|gc| {
            let h = slice::create(gc, et.gc(), x.len(), x.len());
            if !x.is_empty() {
                // SAFETY: fresh array of x.len() bytes.
                unsafe { std::ptr::copy_nonoverlapping(x.as_ptr(), h.data, x.len()) };
            }
            h
        });
        // SAFETY: settable slice storage.
        unsafe { slice::write(self.ptr, h) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any::value_of;
    use crate::registry::basic;

    fn ints(xs: &[i64]) -> Value {
        let s = make_slice(slice_of(basic(Kind::Int64)), xs.len(), xs.len());
        for (i, &x) in xs.iter().enumerate() {
            s.index(i).set_int(x);
        }
        s
    }

    fn collect(v: Value) -> Vec<i64> {
        (0..v.len()).map(|i| v.index(i).int()).collect()
    }

    #[test]
    fn test_append_leaves_original_untouched() {
        let s = ints(&[1, 2, 3]);
        let short = s.slice3(0, 2, 3);
        let r = append(short, &[value_of(9i64)]);
        assert_eq!(collect(r), vec![1, 2, 9]);
        assert_eq!(collect(s), vec![1, 2, 3]);
        assert_eq!((short.len(), short.cap()), (2, 3));
    }

    #[test]
    fn test_copy_overlapping_ranges() {
        let s = ints(&[1, 2, 3, 4, 5]);
        let n = copy(s.slice(1, 5), s.slice(0, 4));
        assert_eq!(n, 4);
        assert_eq!(collect(s), vec![1, 1, 2, 3, 4]);
    }

    #[test]
    fn test_swapper() {
        let s = ints(&[1, 2, 3]);
        let swap = swapper(s);
        swap(0, 2);
        assert_eq!(collect(s), vec![3, 2, 1]);
    }

    #[test]
    #[should_panic(expected = "reflect: slice index out of range")]
    fn test_swapper_out_of_range() {
        let swap = swapper(ints(&[1]));
        swap(0, 1);
    }

    #[test]
    fn test_string_index_and_slice() {
        let v = value_of("hello");
        assert_eq!(v.index(1).uint(), b'e' as u64);
        assert_eq!(v.slice(1, 4).string(), "ell");
        assert!(!v.index(0).can_set());
    }
}
