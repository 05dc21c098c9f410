//! Field and method promotion through embedded fields.
//!
//! Both searches walk the embedding tree breadth first. A name found at a
//! shallower depth hides deeper ones; two occurrences at the same depth
//! cancel each other out and hide the name from deeper levels as well.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use vo_common_core::Kind;

use crate::error::ReflectError;
use crate::factory::func_of;
use crate::rtype::{Detail, StructField, Type};
use crate::value::{Flag, Value};

#[derive(Clone, Debug)]
pub(crate) enum Target {
    /// Declared on the receiver's own named type (or on `T` for `*T`).
    Declared { index: usize, ptr_recv: bool },
    /// Found on the embedded field at `path`; resolved by name there.
    Promoted { path: Vec<usize> },
    /// An interface method, dispatched on the dynamic type.
    Interface,
}

#[derive(Clone, Debug)]
pub(crate) struct MethodEntry {
    pub name: String,
    pub pkg_path: String,
    /// Signature without the receiver.
    pub mtyp: Type,
    pub target: Target,
}

/// Every method of a type sorted by name, plus the indices callers can see:
/// all of them for interfaces, the exported ones otherwise.
#[derive(Default)]
pub(crate) struct MethodSet {
    pub all: Vec<MethodEntry>,
    pub visible: Vec<usize>,
}

impl MethodSet {
    pub fn find(&self, name: &str) -> Option<&MethodEntry> {
        self.all.binary_search_by(|e| e.name.as_str().cmp(name)).ok().map(|i| &self.all[i])
    }

    pub fn find_visible(&self, name: &str) -> Option<usize> {
        self.visible.iter().position(|&i| self.all[i].name == name)
    }
}

/// A method as reported by `Type::method`.
#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    /// Empty for exported methods.
    pub pkg_path: String,
    /// For concrete types the receiver is the first parameter.
    pub typ: Type,
    /// Callable taking the receiver first; invalid for interface types.
    pub func: Value,
    pub index: usize,
}

pub(crate) fn method_set(t: Type) -> &'static MethodSet {
    let rt: &'static crate::rtype::RType = t.0;
    rt.methods.get_or_init(|| compute_method_set(t))
}

/// Entry for the `i`th visible method of `t`.
#[track_caller]
pub(crate) fn method_entry(t: Type, i: usize) -> &'static MethodEntry {
    let set = method_set(t);
    match set.visible.get(i) {
        Some(&idx) => &set.all[idx],
        None => ReflectError::MethodIndex.raise(),
    }
}

enum Candidate {
    Field,
    Method(MethodEntry, bool),
}

fn compute_method_set(t: Type) -> MethodSet {
    if t.kind() == Kind::Interface {
        let all: Vec<MethodEntry> = t
            .imethods()
            .iter()
            .map(|m| MethodEntry { name: m.name.clone(), pkg_path: m.pkg_path.clone(), mtyp: m.typ, target: Target::Interface })
            .collect();
        let visible = (0..all.len()).collect();
        return MethodSet { all, visible };
    }
    let (base, ptr_ctx) = match t.detail() {
        Detail::Ptr { elem } if !t.has_name() => (*elem, true),
        _ => (t, false),
    };
    if ptr_ctx && matches!(base.kind(), Kind::Ptr | Kind::Interface) {
        return MethodSet::default();
    }

    let mut all = Vec::new();
    let mut decided: HashSet<String> = HashSet::new();
    let mut visited: HashSet<Type> = HashSet::new();
    let mut level: Vec<(Type, bool, Vec<usize>)> = vec![(base, ptr_ctx, Vec::new())];
    let mut depth = 0usize;

    while !level.is_empty() {
        // The same type reached twice at one depth collides with itself.
        let mut multiplicity: HashMap<Type, usize> = HashMap::new();
        let mut scan = Vec::new();
        for (ty, pctx, path) in level.drain(..) {
            if visited.contains(&ty) {
                continue;
            }
            let n = multiplicity.entry(ty).or_insert(0);
            *n += 1;
            if *n == 1 {
                scan.push((ty, pctx, path));
            }
        }

        let mut found: BTreeMap<String, (usize, Candidate)> = BTreeMap::new();
        let mut add = |name: &str, c: Candidate, n: usize| {
            found.entry(name.to_string()).and_modify(|e| e.0 += n).or_insert((n, c));
        };
        let mut next = Vec::new();
        for (ty, pctx, path) in scan {
            visited.insert(ty);
            let n = multiplicity[&ty];
            for (i, m) in ty.body().declared.iter().enumerate() {
                let target = if depth == 0 {
                    Target::Declared { index: i, ptr_recv: m.ptr_recv }
                } else {
                    Target::Promoted { path: path.clone() }
                };
                let e = MethodEntry { name: m.name.clone(), pkg_path: m.pkg_path.clone(), mtyp: m.typ, target };
                add(&m.name, Candidate::Method(e, !m.ptr_recv || pctx), n);
            }
            match ty.detail() {
                Detail::Interface { methods } if depth > 0 => {
                    for m in methods {
                        let e = MethodEntry {
                            name: m.name.clone(),
                            pkg_path: m.pkg_path.clone(),
                            mtyp: m.typ,
                            target: Target::Promoted { path: path.clone() },
                        };
                        add(&m.name, Candidate::Method(e, true), n);
                    }
                }
                Detail::Struct { fields, .. } => {
                    for (i, f) in fields.iter().enumerate() {
                        add(&f.name, Candidate::Field, n);
                        if !f.embedded {
                            continue;
                        }
                        let mut sub = path.clone();
                        sub.push(i);
                        match f.typ.detail() {
                            Detail::Ptr { elem } if !f.typ.has_name() => next.push((*elem, true, sub)),
                            _ => next.push((f.typ, pctx, sub)),
                        }
                    }
                }
                _ => {}
            }
        }

        for (name, (count, cand)) in found {
            if !decided.insert(name) {
                continue;
            }
            if let (1, Candidate::Method(e, true)) = (count, cand) {
                all.push(e);
            }
        }
        level = next;
        depth += 1;
    }

    all.sort_by(|a, b| a.name.cmp(&b.name));
    let visible = all.iter().enumerate().filter(|(_, e)| e.pkg_path.is_empty()).map(|(i, _)| i).collect();
    MethodSet { all, visible }
}

impl Type {
    /// Number of methods in the method set (exported only, except for
    /// interface types).
    pub fn num_method(&self) -> usize {
        method_set(*self).visible.len()
    }

    #[track_caller]
    pub fn method(&self, i: usize) -> Method {
        let e = method_entry(*self, i);
        if self.kind() == Kind::Interface {
            return Method { name: e.name.clone(), pkg_path: e.pkg_path.clone(), typ: e.mtyp, func: Value::invalid(), index: i };
        }
        let mut ins = vec![*self];
        ins.extend_from_slice(e.mtyp.ins());
        let ftyp = func_of(&ins, e.mtyp.outs(), e.mtyp.is_variadic());
        Method {
            name: e.name.clone(),
            pkg_path: e.pkg_path.clone(),
            typ: ftyp,
            func: crate::func::method_func(*self, i, ftyp),
            index: i,
        }
    }

    pub fn method_by_name(&self, name: &str) -> Option<Method> {
        method_set(*self).find_visible(name).map(|i| self.method(i))
    }

    /// Field with the given name, searching embedded structs breadth first.
    #[track_caller]
    pub fn field_by_name(&self, name: &str) -> Option<StructField> {
        let fields = self.fields();
        if !name.is_empty() {
            let mut has_embeds = false;
            for (i, f) in fields.iter().enumerate() {
                if f.name == name {
                    return Some(self.field(i));
                }
                has_embeds |= f.embedded;
            }
            if !has_embeds {
                return None;
            }
        }
        self.field_by_name_func(|s| s == name)
    }

    /// First field, breadth first, whose name satisfies `matches`.
    ///
    /// A match that occurs more than once at the shallowest depth where it
    /// occurs at all is ambiguous and reported as absent.
    #[track_caller]
    pub fn field_by_name_func(&self, matches: impl Fn(&str) -> bool) -> Option<StructField> {
        self.fields();
        let mut next: Vec<(Type, Vec<usize>)> = vec![(*self, Vec::new())];
        let mut next_count: HashMap<Type, usize> = HashMap::new();
        let mut visited: HashSet<Type> = HashSet::new();
        let mut result: Option<StructField> = None;

        while !next.is_empty() {
            let current = std::mem::take(&mut next);
            let count = std::mem::take(&mut next_count);
            for (t, index) in current {
                if !visited.insert(t) {
                    continue;
                }
                let multiple = count.get(&t).copied().unwrap_or(0) > 1;
                for (i, f) in t.fields().iter().enumerate() {
                    if matches(&f.name) {
                        if multiple || result.is_some() {
                            return None;
                        }
                        let mut sf = t.field(i);
                        sf.index = index.clone();
                        sf.index.push(i);
                        result = Some(sf);
                        continue;
                    }
                    if result.is_some() || !f.embedded {
                        continue;
                    }
                    let ntyp = match f.typ.detail() {
                        Detail::Ptr { elem } => *elem,
                        _ => f.typ,
                    };
                    if ntyp.kind() != Kind::Struct {
                        continue;
                    }
                    if let Some(n) = next_count.get_mut(&ntyp) {
                        *n = 2;
                        continue;
                    }
                    next_count.insert(ntyp, if multiple { 2 } else { 1 });
                    let mut sub = index.clone();
                    sub.push(i);
                    next.push((ntyp, sub));
                }
            }
            if result.is_some() {
                break;
            }
        }
        result
    }

    /// Nested field reached by `index`, looking through embedded pointers.
    #[track_caller]
    pub fn field_by_index(&self, index: &[usize]) -> StructField {
        let mut t = *self;
        let mut f: Option<StructField> = None;
        for (i, &x) in index.iter().enumerate() {
            if i > 0 {
                if let Some(prev) = &f {
                    t = prev.typ;
                    if t.kind() == Kind::Ptr && t.elem().kind() == Kind::Struct {
                        t = t.elem();
                    }
                }
            }
            f = Some(t.field(x));
        }
        match f {
            Some(mut sf) => {
                sf.index = index.to_vec();
                sf
            }
            None => ReflectError::FieldIndex("FieldByIndex with empty index").raise(),
        }
    }
}

impl Value {
    #[track_caller]
    pub fn num_method(&self) -> usize {
        let t = self.valid_type("reflect.Value.NumMethod");
        if self.flag.has(Flag::METHOD) {
            return 0;
        }
        method_set(t).visible.len()
    }

    /// The `i`th method bound to this value.
    #[track_caller]
    pub fn method(&self, i: usize) -> Value {
        let t = self.valid_type("reflect.Value.Method");
        if self.flag.has(Flag::METHOD) || i >= method_set(t).visible.len() {
            ReflectError::MethodIndex.raise();
        }
        if t.kind() == Kind::Interface && self.is_nil() {
            ReflectError::NilInterfaceMethod.raise();
        }
        Value::from_parts(t, self.ptr, self.flag.ro().with_method(i))
    }

    /// The method with the given name bound to this value, or the invalid
    /// value when there is none.
    #[track_caller]
    pub fn method_by_name(&self, name: &str) -> Value {
        let t = self.valid_type("reflect.Value.MethodByName");
        if self.flag.has(Flag::METHOD) {
            ReflectError::MethodIndex.raise();
        }
        if t.kind() == Kind::Interface && self.is_nil() {
            ReflectError::NilInterfaceMethod.raise();
        }
        match method_set(t).find_visible(name) {
            Some(i) => self.method(i),
            None => Value::invalid(),
        }
    }
}
