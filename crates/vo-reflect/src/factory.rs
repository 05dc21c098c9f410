//! Composite types built at run time.
//!
//! Each constructor consults the identity cache first, so building the same
//! shape twice yields the same descriptor. New descriptors derive their
//! comparison algorithm and pointer map from their parts.

use vo_common_core::{align_up, ChanDir, Kind};
use vo_runtime::LayoutBuilder;

use crate::alg::aggregate_alg;
use crate::error::{OrRaise, ReflectError, Result};
use crate::registry::{intern, pointer_body, slice_body, FieldKey, TypeKey};
use crate::resolve::method_set;
use crate::rtype::{signature_repr, Body, Detail, FieldDesc, RType, StructField, Type};
use crate::tag::quote;
use crate::value::is_valid_ident;

/// Largest channel element in bytes.
const MAX_CHAN_ELEM: usize = 1 << 16;

/// `[len]elem`.
#[track_caller]
pub fn array_of(len: usize, elem: Type) -> Type {
    try_array_of(len, elem).or_raise()
}

pub fn try_array_of(len: usize, elem: Type) -> Result<Type> {
    let size = elem
        .size()
        .checked_mul(len)
        .filter(|&s| s <= isize::MAX as usize)
        .ok_or(ReflectError::ArrayTooLarge)?;
    let repr = format!("[{len}]{elem}");
    Ok(intern(TypeKey::Array(elem, len), || {
        let body = Body {
            kind: Kind::Array,
            size,
            align: elem.align(),
            gc: elem.gc().repeat(len),
            alg: aggregate_alg([elem], false),
            detail: Detail::Array { elem, len },
            declared: Vec::new(),
            underlying: None,
        };
        RType::new(None, repr, Some(body))
    }))
}

/// `[]elem`. The element may still be incomplete.
pub fn slice_of(elem: Type) -> Type {
    let repr = format!("[]{elem}");
    intern(TypeKey::Slice(elem), || RType::new(None, repr, Some(slice_body(elem))))
}

#[track_caller]
pub fn chan_of(dir: ChanDir, elem: Type) -> Type {
    try_chan_of(dir, elem).or_raise()
}

pub fn try_chan_of(dir: ChanDir, elem: Type) -> Result<Type> {
    if elem.size() >= MAX_CHAN_ELEM {
        return Err(ReflectError::ChanElemTooLarge);
    }
    let es = elem.string();
    let repr = match dir {
        ChanDir::Send => format!("chan<- {es}"),
        ChanDir::Recv => format!("<-chan {es}"),
        // `<-` binds to the leftmost chan.
        ChanDir::Both if es.starts_with('<') => format!("chan ({es})"),
        ChanDir::Both => format!("chan {es}"),
    };
    Ok(intern(TypeKey::Chan(dir, elem), || {
        RType::new(None, repr, Some(pointer_body(Kind::Chan, Detail::Chan { elem, dir })))
    }))
}

/// `map[key]elem`. The key type must be comparable.
#[track_caller]
pub fn map_of(key: Type, elem: Type) -> Type {
    try_map_of(key, elem).or_raise()
}

pub fn try_map_of(key: Type, elem: Type) -> Result<Type> {
    if !key.comparable() {
        return Err(ReflectError::InvalidMapKey(key.string()));
    }
    let repr = format!("map[{key}]{elem}");
    Ok(intern(TypeKey::Map(key, elem), || {
        RType::new(None, repr, Some(pointer_body(Kind::Map, Detail::Map { key, elem })))
    }))
}

/// A function type. When `variadic`, the last input must be a slice.
#[track_caller]
pub fn func_of(ins: &[Type], outs: &[Type], variadic: bool) -> Type {
    try_func_of(ins, outs, variadic).or_raise()
}

pub fn try_func_of(ins: &[Type], outs: &[Type], variadic: bool) -> Result<Type> {
    if variadic && ins.last().map_or(true, |t| t.kind() != Kind::Slice) {
        return Err(ReflectError::VariadicNotSlice);
    }
    let repr = format!("func{}", signature_repr(ins, outs, variadic));
    let key = TypeKey::Func(ins.to_vec(), outs.to_vec(), variadic);
    Ok(intern(key, || {
        let detail = Detail::Func { ins: ins.to_vec(), outs: outs.to_vec(), variadic };
        RType::new(None, repr, Some(pointer_body(Kind::Func, detail)))
    }))
}

/// A struct type with the given fields, laid out as a compiler would.
///
/// Methods are promoted from the first field only; a later embedded field
/// whose type has methods is rejected.
#[track_caller]
pub fn struct_of(fields: &[StructField]) -> Type {
    try_struct_of(fields).or_raise()
}

pub fn try_struct_of(fields: &[StructField]) -> Result<Type> {
    build_struct(fields, true)
}

/// Name an embedded field takes when none is given.
pub(crate) fn embedded_name(t: Type) -> &'static str {
    let rt: &'static RType = t.0;
    match &rt.name {
        Some(n) => n.name.as_str(),
        None => match t.detail() {
            Detail::Ptr { elem } => {
                let ert: &'static RType = elem.0;
                ert.name.as_ref().map_or("", |n| n.name.as_str())
            }
            _ => "",
        },
    }
}

pub(crate) fn starts_unexported(name: &str) -> bool {
    matches!(name.as_bytes().first(), Some(b'a'..=b'z' | b'_'))
}

pub(crate) fn build_struct(fields: &[StructField], restrict_methods: bool) -> Result<Type> {
    let mut descs: Vec<FieldDesc> = Vec::with_capacity(fields.len());
    let mut size = 0usize;
    let mut align = 1usize;
    let mut padded = false;
    let mut last_zero = false;
    let mut pkg_path = String::new();

    for (i, f) in fields.iter().enumerate() {
        let name = if f.name.is_empty() && f.anonymous { embedded_name(f.typ).to_string() } else { f.name.clone() };
        if name.is_empty() {
            return Err(ReflectError::NoFieldName { index: i });
        }
        if !is_valid_ident(&name) {
            return Err(ReflectError::InvalidFieldName { name });
        }
        if f.pkg_path.is_empty() && starts_unexported(&name) {
            return Err(ReflectError::MissingPkgPath { name });
        }
        if descs.iter().any(|d| d.name == name) {
            return Err(ReflectError::DuplicateField { name });
        }
        if restrict_methods && f.anonymous && i > 0 && !method_set(f.typ).visible.is_empty() {
            return Err(ReflectError::EmbeddedMethods);
        }
        if pkg_path.is_empty() {
            pkg_path = f.pkg_path.clone();
        }

        let offset = align_up(size, f.typ.align());
        padded |= offset != size || name == "_";
        size = offset + f.typ.size();
        align = align.max(f.typ.align());
        last_zero = f.typ.size() == 0;
        descs.push(FieldDesc {
            name,
            pkg_path: f.pkg_path.clone(),
            typ: f.typ,
            tag: f.tag.as_str().to_string(),
            offset,
            embedded: f.anonymous,
        });
    }
    if size > 0 && last_zero {
        // Keep a pointer to the trailing field from addressing the next object.
        size += 1;
        padded = true;
    }
    let total = align_up(size, align);
    padded |= total != size;

    let repr = struct_repr(&descs);
    let key = TypeKey::Struct(
        descs
            .iter()
            .map(|d| FieldKey {
                name: d.name.clone(),
                pkg_path: d.pkg_path.clone(),
                typ: d.typ,
                tag: d.tag.clone(),
                embedded: d.embedded,
            })
            .collect(),
    );
    let mut gc = LayoutBuilder::new();
    for d in &descs {
        gc.copy_at(d.offset, d.typ.gc(), 1);
    }
    let gc = gc.finish(total, align);
    let alg = aggregate_alg(descs.iter().map(|d| d.typ), padded);
    Ok(intern(key, || {
        let body = Body {
            kind: Kind::Struct,
            size: total,
            align,
            gc,
            alg,
            detail: Detail::Struct { fields: descs, pkg_path },
            declared: Vec::new(),
            underlying: None,
        };
        RType::new(None, repr, Some(body))
    }))
}

fn struct_repr(fields: &[FieldDesc]) -> String {
    if fields.is_empty() {
        return "struct {}".to_string();
    }
    let parts: Vec<String> = fields
        .iter()
        .map(|f| {
            let mut s = String::new();
            if !f.embedded {
                s.push_str(&f.name);
                s.push(' ');
            }
            s.push_str(&f.typ.0.repr);
            if !f.tag.is_empty() {
                s.push(' ');
                s.push_str(&quote(&f.tag));
            }
            s
        })
        .collect();
    format!("struct {{ {} }}", parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{basic, ptr_to};

    #[test]
    fn test_struct_layout_matches_compiler() {
        let t = struct_of(&[
            StructField::new("A", basic(Kind::Int8)),
            StructField::new("B", basic(Kind::Int64)),
            StructField::new("C", basic(Kind::Int16)),
        ]);
        let offsets: Vec<usize> = (0..3).map(|i| t.field(i).offset).collect();
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(t.size(), 24);
        assert_eq!(t.align(), 8);
    }

    #[test]
    fn test_trailing_zero_sized_field_gets_a_byte() {
        let empty = array_of(0, basic(Kind::Int64));
        let t = struct_of(&[StructField::new("A", basic(Kind::Int32)), StructField::new("Z", empty)]);
        assert_eq!(t.field(1).offset, 8);
        assert_eq!(t.size(), 16);
        let u = struct_of(&[StructField::new("Z", empty)]);
        assert_eq!(u.size(), 0);
    }

    #[test]
    fn test_pointer_bitmap_of_nested_arrays() {
        let p = ptr_to(basic(Kind::Int));
        let arr = array_of(2, p);
        let t = struct_of(&[
            StructField::new("N", basic(Kind::Int)),
            StructField::new("P", arr),
            StructField::new("S", basic(Kind::String)),
        ]);
        let words: Vec<usize> = t.gc().pointer_words().collect();
        assert_eq!(words, vec![1, 2, 3]);
    }

    #[test]
    fn test_chan_repr_parenthesizes_recv_elem() {
        let inner = chan_of(ChanDir::Recv, basic(Kind::Int));
        assert_eq!(chan_of(ChanDir::Both, inner).string(), "chan (<-chan int)");
        assert_eq!(chan_of(ChanDir::Send, basic(Kind::Int)).string(), "chan<- int");
    }
}
