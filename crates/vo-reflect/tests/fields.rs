//! Field lookup through embedded structs.

use pretty_assertions::assert_eq;
use vo_reflect::{basic, new, ptr_to, struct_of, Kind, StructField, Type, TypeDef};

fn named_struct(pkg: &str, name: &str, fields: Vec<StructField>) -> Type {
    TypeDef::with_fields(pkg, name, fields).build()
}

#[test]
fn test_shallower_field_wins() {
    let inner = named_struct("fields_test_a", "Inner", vec![StructField::new("X", basic(Kind::Int))]);
    let outer = struct_of(&[StructField::embedded("", inner), StructField::new("X", basic(Kind::String))]);
    let f = outer.field_by_name("X").map(|f| (f.index, f.typ));
    assert_eq!(f, Some((vec![1], basic(Kind::String))));
}

#[test]
fn test_ambiguous_fields_at_same_depth_are_hidden() {
    let a = named_struct("fields_test_b", "A", vec![StructField::new("X", basic(Kind::Int))]);
    let b = named_struct("fields_test_b", "B", vec![StructField::new("X", basic(Kind::Int))]);
    let c = struct_of(&[StructField::embedded("", a), StructField::embedded("", b)]);
    assert!(c.field_by_name("X").is_none());
    assert!(!new(c).elem().field_by_name("X").is_valid());
}

#[test]
fn test_deeper_field_through_embedded_pointer() {
    let leaf = named_struct("fields_test_c", "Leaf", vec![StructField::new("Deep", basic(Kind::Int))]);
    let mid = named_struct("fields_test_c", "Mid", vec![StructField::embedded("", ptr_to(leaf))]);
    let top = struct_of(&[StructField::new("Other", basic(Kind::Int)), StructField::embedded("", mid)]);
    let f = top.field_by_name("Deep").map(|f| f.index);
    assert_eq!(f, Some(vec![1, 0, 0]));
    assert_eq!(top.field_by_index(&[1, 0, 0]).name, "Deep");

    let v = new(top).elem();
    assert!(v.try_field_by_index(&[1, 0, 0]).is_err());
    v.field(1).field(0).set(new(leaf));
    let deep = v.field_by_name("Deep");
    deep.set_int(12);
    assert_eq!(v.field(1).field(0).elem().field(0).int(), 12);
}

#[test]
#[should_panic(expected = "reflect: indirection through nil pointer to embedded struct")]
fn test_field_by_index_nil_embedded_pointer() {
    let leaf = named_struct("fields_test_d", "Leaf", vec![StructField::new("V", basic(Kind::Int))]);
    let top = struct_of(&[StructField::embedded("", ptr_to(leaf))]);
    new(top).elem().field_by_index(&[0, 0]);
}

#[test]
fn test_field_by_name_func() {
    let t = struct_of(&[
        StructField::new("Alpha", basic(Kind::Int)),
        StructField::new("Beta", basic(Kind::Int)),
    ]);
    let f = t.field_by_name_func(|n| n.starts_with('B')).map(|f| f.name);
    assert_eq!(f.as_deref(), Some("Beta"));
    assert!(t.field_by_name_func(|n| n.len() > 10).is_none());
}
