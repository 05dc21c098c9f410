//! Equality and hashing derived from type structure.
//!
//! Values whose `Alg` is `Mem` compare and hash as raw bytes; everything else
//! walks the descriptor. Interfaces defer to their dynamic type and fail on
//! dynamic types that are not comparable.

use std::hash::Hasher;

use rustc_hash::FxHasher;
use vo_common_core::Kind;
use vo_runtime::objects::interface::{self, IfaceWords};
use vo_runtime::objects::map::KeyAlg;
use vo_runtime::objects::string;

use crate::error::{ReflectError, Result};
use crate::rtype::{Alg, Detail, Type};

unsafe fn bytes<'a>(p: *const u8, n: usize) -> &'a [u8] {
    if n == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(p, n)
    }
}

/// Compare two values of type `t`.
///
/// # Safety
/// Both pointers must address live values of type `t`.
pub(crate) unsafe fn equal(t: Type, a: *const u8, b: *const u8) -> Result<bool> {
    match t.alg() {
        Alg::Mem => return Ok(bytes(a, t.size()) == bytes(b, t.size())),
        Alg::NotComparable => return Err(ReflectError::Uncomparable(t.string())),
        Alg::Walk => {}
    }
    Ok(match t.kind() {
        Kind::Float32 => *(a as *const f32) == *(b as *const f32),
        Kind::Float64 => *(a as *const f64) == *(b as *const f64),
        Kind::Complex64 => {
            let (x, y) = (a as *const f32, b as *const f32);
            *x == *y && *x.add(1) == *y.add(1)
        }
        Kind::Complex128 => {
            let (x, y) = (a as *const f64, b as *const f64);
            *x == *y && *x.add(1) == *y.add(1)
        }
        Kind::String => string::as_bytes(string::read(a)) == string::as_bytes(string::read(b)),
        Kind::Interface => {
            let (x, y) = (interface::read(a), interface::read(b));
            if x.typ != y.typ {
                return Ok(false);
            }
            match Type::from_ptr(x.typ) {
                None => true,
                Some(dt) => equal(dt, x.data, y.data)?,
            }
        }
        Kind::Array => {
            let elem = t.elem();
            for i in 0..t.len() {
                let off = i * elem.size();
                if !equal(elem, a.add(off), b.add(off))? {
                    return Ok(false);
                }
            }
            true
        }
        Kind::Struct => {
            for f in t.fields() {
                if f.name == "_" {
                    continue;
                }
                if !equal(f.typ, a.add(f.offset), b.add(f.offset))? {
                    return Ok(false);
                }
            }
            true
        }
        _ => bytes(a, t.size()) == bytes(b, t.size()),
    })
}

unsafe fn hash_into(t: Type, p: *const u8, h: &mut FxHasher) -> Result<()> {
    match t.alg() {
        Alg::Mem => {
            h.write(bytes(p, t.size()));
            return Ok(());
        }
        Alg::NotComparable => return Err(ReflectError::Unhashable(t.string())),
        Alg::Walk => {}
    }
    match t.kind() {
        Kind::Float32 => hash_float(*(p as *const f32) as f64, h),
        Kind::Float64 => hash_float(*(p as *const f64), h),
        Kind::Complex64 => {
            hash_float(*(p as *const f32) as f64, h);
            hash_float(*(p as *const f32).add(1) as f64, h);
        }
        Kind::Complex128 => {
            hash_float(*(p as *const f64), h);
            hash_float(*(p as *const f64).add(1), h);
        }
        Kind::String => {
            let s = string::as_bytes(string::read(p));
            h.write_usize(s.len());
            h.write(s);
        }
        Kind::Interface => {
            let w: IfaceWords = interface::read(p);
            h.write_usize(w.typ as usize);
            if let Some(dt) = Type::from_ptr(w.typ) {
                hash_into(dt, w.data, h)?;
            }
        }
        Kind::Array => {
            let elem = t.elem();
            for i in 0..t.len() {
                hash_into(elem, p.add(i * elem.size()), h)?;
            }
        }
        Kind::Struct => {
            for f in t.fields() {
                if f.name != "_" {
                    hash_into(f.typ, p.add(f.offset), h)?;
                }
            }
        }
        _ => h.write(bytes(p, t.size())),
    }
    Ok(())
}

fn hash_float(f: f64, h: &mut FxHasher) {
    if f == 0.0 {
        // +0 and -0 are equal keys.
        h.write_u64(0);
    } else if f.is_nan() {
        // NaN never equals itself; spread NaN keys out.
        h.write_u64(fastrand::u64(..));
    } else {
        h.write_u64(f.to_bits());
    }
}

/// Hash a value of type `t`.
///
/// # Safety
/// `p` must address a live value of type `t`.
pub(crate) unsafe fn hash(t: Type, p: *const u8, seed: u64) -> Result<u64> {
    let mut h = FxHasher::default();
    h.write_u64(seed);
    hash_into(t, p, &mut h)?;
    Ok(h.finish())
}

/// Map key algorithm for keys of a given type.
///
/// Keys are validated with `hash` before reaching the map, so the runtime
/// callbacks never see an unhashable dynamic type.
pub(crate) struct TypeAlg(pub Type);

impl KeyAlg for TypeAlg {
    unsafe fn hash(&self, key: *const u8, seed: u64) -> u64 {
        hash(self.0, key, seed).unwrap_or_default()
    }

    unsafe fn equal(&self, a: *const u8, b: *const u8) -> bool {
        equal(self.0, a, b).unwrap_or(false)
    }
}

/// Derive the comparison algorithm of an aggregate from its parts.
pub(crate) fn aggregate_alg(parts: impl IntoIterator<Item = Type>, padded: bool) -> Alg {
    let mut alg = if padded { Alg::Walk } else { Alg::Mem };
    for p in parts {
        match p.alg() {
            Alg::NotComparable => return Alg::NotComparable,
            Alg::Walk => alg = Alg::Walk,
            Alg::Mem => {}
        }
    }
    alg
}

/// Comparability of a specific value, looking through interfaces.
///
/// # Safety
/// `p` must address a live value of type `t`.
pub(crate) unsafe fn value_comparable(t: Type, p: *const u8) -> bool {
    match t.detail() {
        Detail::Interface { .. } => {
            let w = interface::read(p);
            match Type::from_ptr(w.typ) {
                None => true,
                Some(dt) => value_comparable(dt, w.data),
            }
        }
        Detail::Array { elem, len } => {
            if elem.kind() != Kind::Interface {
                return t.comparable();
            }
            (0..*len).all(|i| value_comparable(*elem, p.add(i * elem.size())))
        }
        Detail::Struct { fields, .. } => fields.iter().all(|f| value_comparable(f.typ, p.add(f.offset))),
        _ => t.comparable(),
    }
}
