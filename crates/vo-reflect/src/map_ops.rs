//! Map values and iteration.
//!
//! Layout: a map value is one word holding the address of a native heap
//! `MapObject` (null = nil map). Hashing and equality come from the key
//! type's algorithm.

use vo_common_core::Kind;
use vo_runtime::objects::map::MapObject;
use vo_runtime::{with_gc, Gc};

use crate::alg::{self, TypeAlg};
use crate::error::{OrRaise, ReflectError};
use crate::rtype::{Alg, Type};
use crate::value::{alloc_of, Flag, Value};

fn map_obj<'a>(v: &Value) -> Option<&'a MapObject> {
    // SAFETY: map storage.
    let p = unsafe { *(v.ptr as *const *mut u8) };
    // SAFETY: non-null map words address MapObjects.
    (!p.is_null()).then(|| unsafe { Gc::native::<MapObject>(p) })
}

pub(crate) fn map_len(v: &Value) -> usize {
    map_obj(v).map_or(0, MapObject::len)
}

/// A new empty map of type `t`.
#[track_caller]
pub fn make_map(t: Type) -> Value {
    make_map_with_size(t, 0)
}

/// A new empty map with room for about `n` entries.
#[track_caller]
pub fn make_map_with_size(t: Type, n: usize) -> Value {
    if t.kind() != Kind::Map {
        ReflectError::NotKindType { op: "reflect.MakeMapWithSize", kind: Kind::Map, typ: t.string() }.raise();
    }
    let obj = MapObject::new(t.key().gc().clone(), t.elem().gc().clone(), n);
    let p = with_gc(|gc| gc.alloc_native(obj));
    let cell = alloc_of(t);
    // SAFETY: fresh map storage.
    unsafe { *(cell as *mut *mut u8) = p };
    Value::from_parts(t, cell, Flag::NONE)
}

/// Convert `key` to the map's key type and make sure it can be hashed.
#[track_caller]
fn prepare_key(op: &'static str, kt: Type, key: Value) -> Value {
    let key = key.assign_to(op, kt).or_raise();
    if kt.alg() == Alg::Walk {
        // SAFETY: key holds a kt.
        unsafe { alg::hash(kt, key.ptr, 0) }.or_raise();
    }
    key
}

impl Value {
    /// The element stored under `key`, or the invalid value when the key is
    /// absent or the map is nil.
    #[track_caller]
    pub fn map_index(&self, key: Value) -> Value {
        self.must_be("reflect.Value.MapIndex", Kind::Map);
        let t = self.typ();
        let key = prepare_key("reflect.Value.MapIndex", t.key(), key);
        let Some(m) = map_obj(self) else { return Value::invalid() };
        let et = t.elem();
        let out = alloc_of(et);
        // SAFETY: key holds a key; out is fresh storage of the element type.
        if !unsafe { m.get(&TypeAlg(t.key()), key.ptr, out) } {
            return Value::invalid();
        }
        Value::from_parts(et, out, (self.flag | key.flag).ro())
    }

    /// Every key in the map, in iteration order.
    #[track_caller]
    pub fn map_keys(&self) -> Vec<Value> {
        self.must_be("reflect.Value.MapKeys", Kind::Map);
        let t = self.typ();
        let Some(m) = map_obj(self) else { return Vec::new() };
        let (kt, et) = (t.key(), t.elem());
        let scratch = alloc_of(et);
        let mut keys = Vec::with_capacity(m.len());
        let mut pos = 0;
        loop {
            let k = alloc_of(kt);
            // SAFETY: fresh storage of the key and element types.
            let Some(idx) = (unsafe { m.next_entry(pos, k, scratch) }) else { break };
            keys.push(Value::from_parts(kt, k, self.flag.ro()));
            pos = idx + 1;
        }
        keys
    }

    /// Store `elem` under `key`. The invalid value as `elem` deletes the key.
    #[track_caller]
    pub fn set_map_index(&self, key: Value, elem: Value) {
        const OP: &str = "reflect.Value.SetMapIndex";
        self.must_be(OP, Kind::Map);
        self.must_be_exported(OP);
        key.must_be_exported(OP);
        let t = self.typ();
        let key = prepare_key(OP, t.key(), key);
        let m = map_obj(self);
        if !elem.is_valid() {
            if let Some(m) = m {
                // SAFETY: key holds a key.
                unsafe { m.remove(&TypeAlg(t.key()), key.ptr) };
            }
            return;
        }
        elem.must_be_exported(OP);
        let elem = elem.assign_to(OP, t.elem()).or_raise();
        let Some(m) = m else { ReflectError::NilMapWrite.raise() };
        // SAFETY: key and elem hold values of the map's key and element types.
        unsafe { m.insert(&TypeAlg(t.key()), key.ptr, elem.ptr) };
    }

    /// A live iterator over the map's entries.
    #[track_caller]
    pub fn map_range(&self) -> MapIter {
        if self.kind() != Kind::Map {
            ReflectError::WrongKind { method: "reflect.Value.MapRange", kind: self.kind() }.raise();
        }
        MapIter { m: *self, state: IterState::Fresh }
    }
}

#[derive(Clone, Copy, Default)]
enum IterState {
    #[default]
    Fresh,
    Active {
        pos: usize,
        key: Value,
        val: Value,
    },
    Exhausted,
}

/// Cursor over a map's entries. Entries added or removed while iterating
/// may or may not be visited; a removed entry that has not been reached is
/// not.
#[derive(Clone, Copy, Default)]
pub struct MapIter {
    m: Value,
    state: IterState,
}

impl MapIter {
    /// Advance to the next entry; false once the map is exhausted.
    #[track_caller]
    pub fn next(&mut self) -> bool {
        if !self.m.is_valid() {
            ReflectError::MapIter { method: "Next", detail: "called on an iterator that does not have an associated map Value" }.raise();
        }
        let start = match self.state {
            IterState::Fresh => 0,
            IterState::Active { pos, .. } => pos + 1,
            IterState::Exhausted => ReflectError::MapIter { method: "Next", detail: "called on exhausted iterator" }.raise(),
        };
        let t = self.m.typ();
        let Some(m) = map_obj(&self.m) else {
            self.state = IterState::Exhausted;
            return false;
        };
        let (kt, et) = (t.key(), t.elem());
        let (k, v) = (alloc_of(kt), alloc_of(et));
        // SAFETY: fresh storage of the key and element types.
        match unsafe { m.next_entry(start, k, v) } {
            Some(pos) => {
                let ro = self.m.flag.ro();
                self.state = IterState::Active {
                    pos,
                    key: Value::from_parts(kt, k, ro),
                    val: Value::from_parts(et, v, ro),
                };
                true
            }
            None => {
                self.state = IterState::Exhausted;
                false
            }
        }
    }

    /// Key of the current entry.
    #[track_caller]
    pub fn key(&self) -> Value {
        match self.state {
            IterState::Active { key, .. } => key,
            IterState::Fresh => ReflectError::MapIter { method: "Key", detail: "called before Next" }.raise(),
            IterState::Exhausted => ReflectError::MapIter { method: "Key", detail: "called on exhausted iterator" }.raise(),
        }
    }

    /// Element of the current entry.
    #[track_caller]
    pub fn value(&self) -> Value {
        match self.state {
            IterState::Active { val, .. } => val,
            IterState::Fresh => ReflectError::MapIter { method: "Value", detail: "called before Next" }.raise(),
            IterState::Exhausted => {
                ReflectError::MapIter { method: "Value", detail: "called on exhausted iterator" }.raise()
            }
        }
    }

    /// Restart iteration over `v`, or detach from any map when `v` is invalid.
    #[track_caller]
    pub fn reset(&mut self, v: Value) {
        if v.is_valid() && v.kind() != Kind::Map {
            ReflectError::WrongKind { method: "reflect.MapIter.Reset", kind: v.kind() }.raise();
        }
        self.m = v;
        self.state = IterState::Fresh;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any::value_of;
    use crate::factory::map_of;
    use crate::registry::basic;

    fn string_int_map() -> Value {
        make_map(map_of(basic(Kind::String), basic(Kind::Int)))
    }

    #[test]
    fn test_nil_map_reads() {
        let m = crate::value::zero(map_of(basic(Kind::String), basic(Kind::Int)));
        assert!(m.is_nil());
        assert_eq!(m.len(), 0);
        assert!(!m.map_index(value_of("a")).is_valid());
        assert!(m.map_keys().is_empty());
        // Deleting from a nil map is a no-op.
        m.set_map_index(value_of("a"), Value::invalid());
    }

    #[test]
    #[should_panic(expected = "assignment to entry in nil map")]
    fn test_nil_map_write() {
        let m = crate::value::zero(map_of(basic(Kind::String), basic(Kind::Int)));
        m.set_map_index(value_of("a"), value_of(1isize));
    }

    #[test]
    fn test_delete_during_iteration() {
        let m = string_int_map();
        for (k, v) in [("a", 1isize), ("b", 2), ("c", 3)] {
            m.set_map_index(value_of(k), value_of(v));
        }
        let mut it = m.map_range();
        assert!(it.next());
        let first = it.key().string();
        for k in ["a", "b", "c"] {
            if k != first {
                m.set_map_index(value_of(k), Value::invalid());
            }
        }
        assert!(!it.next());
        assert_eq!(m.len(), 1);
    }

    #[test]
    #[should_panic(expected = "MapIter.Key called before Next")]
    fn test_key_before_next() {
        string_int_map().map_range().key();
    }
}
