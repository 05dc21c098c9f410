//! Deep equality.

use hashbrown::HashSet;
use vo_common_core::Kind;

use crate::alg;
use crate::any::{value_of, Any};
use crate::rtype::Type;
use crate::value::Value;

/// Comparisons already in progress, keyed by ordered address pair and type.
/// Revisiting one means a cycle, which counts as equal.
type Visited = HashSet<(usize, usize, Type)>;

/// Whether `x` and `y` are deeply equal.
///
/// Values of different dynamic types are never deeply equal. Pointers are
/// equal when they are identical or point to deeply equal values; slices and
/// maps compare elementwise, with nil distinct from empty. Funcs are equal
/// only when both are nil. Floats compare by `==`, so NaN is never equal to
/// itself.
pub fn deep_equal(x: impl Into<Any>, y: impl Into<Any>) -> bool {
    let (x, y) = (x.into(), y.into());
    if x.is_nil() || y.is_nil() {
        return x.is_nil() && y.is_nil();
    }
    let (v1, v2) = (value_of(x), value_of(y));
    if v1.typ() != v2.typ() {
        return false;
    }
    deep_value_equal(v1, v2, &mut Visited::new())
}

/// Address identifying a possibly cyclic value for the visited set.
fn identity(v: &Value) -> usize {
    match v.kind() {
        Kind::Map | Kind::Ptr => v.pointer(),
        _ => v.ptr as usize,
    }
}

fn deep_value_equal(v1: Value, v2: Value, visited: &mut Visited) -> bool {
    if !v1.is_valid() || !v2.is_valid() {
        return v1.is_valid() == v2.is_valid();
    }
    let t = v1.typ();
    if t != v2.typ() {
        return false;
    }

    let hard = matches!(t.kind(), Kind::Map | Kind::Slice | Kind::Ptr | Kind::Interface)
        && !v1.is_nil()
        && !v2.is_nil();
    if hard {
        let (a, b) = (identity(&v1), identity(&v2));
        let key = if a <= b { (a, b, t) } else { (b, a, t) };
        if !visited.insert(key) {
            return true;
        }
    }

    match t.kind() {
        Kind::Array => (0..v1.len()).all(|i| deep_value_equal(v1.index(i), v2.index(i), visited)),
        Kind::Slice => {
            if v1.is_nil() != v2.is_nil() || v1.len() != v2.len() {
                return false;
            }
            if v1.pointer() == v2.pointer() {
                return true;
            }
            (0..v1.len()).all(|i| deep_value_equal(v1.index(i), v2.index(i), visited))
        }
        Kind::Interface => {
            if v1.is_nil() || v2.is_nil() {
                return v1.is_nil() == v2.is_nil();
            }
            deep_value_equal(v1.elem(), v2.elem(), visited)
        }
        Kind::Ptr => v1.pointer() == v2.pointer() || deep_value_equal(v1.elem(), v2.elem(), visited),
        Kind::Struct => (0..v1.num_field()).all(|i| deep_value_equal(v1.field(i), v2.field(i), visited)),
        Kind::Map => {
            if v1.is_nil() != v2.is_nil() || v1.len() != v2.len() {
                return false;
            }
            if v1.pointer() == v2.pointer() {
                return true;
            }
            v1.map_keys().into_iter().all(|k| {
                let (e1, e2) = (v1.map_index(k), v2.map_index(k));
                e1.is_valid() && e2.is_valid() && deep_value_equal(e1, e2, visited)
            })
        }
        Kind::Func => v1.is_nil() && v2.is_nil(),
        Kind::String => v1.str_bytes() == v2.str_bytes(),
        k if k.is_float() => v1.float() == v2.float(),
        k if k.is_complex() => v1.complex() == v2.complex(),
        // SAFETY: both hold values of t.
        _ => unsafe { alg::equal(t, v1.ptr, v2.ptr) }.unwrap_or(false),
    }
}
