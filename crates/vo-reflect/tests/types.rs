//! Type identity, synthesized composite types and their string forms.

use pretty_assertions::assert_eq;
use vo_reflect::{
    array_of, basic, chan_of, error_type, func_of, interface_of, map_of, ptr_to, slice_of, struct_of, try_func_of,
    try_map_of, try_struct_of, ChanDir, Kind, ReflectError, StructField, TypeDef,
};

#[test]
fn test_structural_identity() {
    let int = basic(Kind::Int);
    assert_eq!(slice_of(int), slice_of(int));
    assert_eq!(ptr_to(ptr_to(int)), ptr_to(ptr_to(int)));
    assert_eq!(map_of(basic(Kind::String), int), map_of(basic(Kind::String), int));
    assert_eq!(array_of(4, int), array_of(4, int));
    assert_ne!(array_of(4, int), array_of(5, int));
    assert_eq!(func_of(&[int], &[int], false), func_of(&[int], &[int], false));
    assert_ne!(chan_of(ChanDir::Send, int), chan_of(ChanDir::Recv, int));

    let fields = || vec![StructField::new("A", int), StructField::new("B", basic(Kind::String)).with_tag(r#"json:"b""#)];
    assert_eq!(struct_of(&fields()), struct_of(&fields()));
    let untagged = struct_of(&[StructField::new("A", int), StructField::new("B", basic(Kind::String))]);
    assert_ne!(struct_of(&fields()), untagged);
}

#[test]
fn test_type_strings() {
    let int = basic(Kind::Int);
    let string = basic(Kind::String);
    assert_eq!(map_of(string, int).string(), "map[string]int");
    assert_eq!(chan_of(ChanDir::Send, int).string(), "chan<- int");
    assert_eq!(chan_of(ChanDir::Recv, int).string(), "<-chan int");
    assert_eq!(array_of(3, ptr_to(int)).string(), "[3]*int");
    assert_eq!(
        func_of(&[int, slice_of(string)], &[int, error_type()], true).string(),
        "func(int, ...string) (int, error)"
    );
    assert_eq!(func_of(&[], &[], false).string(), "func()");
    assert_eq!(struct_of(&[]).string(), "struct {}");

    let s = struct_of(&[
        StructField::new("S", string).with_tag("s"),
        StructField::new("X", basic(Kind::Uint8)).with_tag("x"),
        StructField::new("Y", basic(Kind::Uint64)),
        StructField::new("Z", array_of(3, basic(Kind::Uint16))),
    ]);
    assert_eq!(s.string(), r#"struct { S string "s"; X uint8 "x"; Y uint64; Z [3]uint16 }"#);

    let named = TypeDef::new("github.com/acme/geo", "Point", basic(Kind::Int)).build();
    assert_eq!(slice_of(named).string(), "[]geo.Point");
}

#[test]
fn test_struct_of_unicode_field_names() {
    let string = basic(Kind::String);
    let s = struct_of(&[
        StructField::new("φ", string),
        StructField::new("ValidName", string),
        StructField::new("Val1dNam5", string),
    ]);
    assert_eq!(s.string(), "struct { φ string; ValidName string; Val1dNam5 string }");
    assert_eq!(s.field(2).offset, 32);
}

#[test]
fn test_struct_of_rejects_bad_fields() {
    let int = basic(Kind::Int);
    for bad in ["1nvalid", "+"] {
        match try_struct_of(&[StructField::new(bad, int)]) {
            Err(ReflectError::InvalidFieldName { name }) => assert_eq!(name, bad),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(try_struct_of(&[StructField::new("", int)]), Err(ReflectError::NoFieldName { index: 0 }));
    assert_eq!(
        try_struct_of(&[StructField::new("lower", int)]),
        Err(ReflectError::MissingPkgPath { name: "lower".into() })
    );
    assert!(try_struct_of(&[StructField::new("lower", int).with_pkg_path("main")]).is_ok());
    assert_eq!(
        try_struct_of(&[StructField::new("A", int), StructField::new("A", int)]),
        Err(ReflectError::DuplicateField { name: "A".into() })
    );
}

#[test]
#[should_panic(expected = "has invalid name")]
fn test_struct_of_panics_on_invalid_name() {
    struct_of(&[StructField::new("1nvalid", basic(Kind::Int))]);
}

#[test]
fn test_embedded_field_takes_type_name() {
    let point = TypeDef::new("types_test", "Point", struct_of(&[StructField::new("X", basic(Kind::Int))])).build();
    let s = struct_of(&[StructField::embedded("", ptr_to(point)), StructField::new("Y", basic(Kind::Int))]);
    let f = s.field(0);
    assert_eq!(f.name, "Point");
    assert!(f.anonymous);
    assert_eq!(s.field_by_name("X").map(|f| f.index), Some(vec![0, 0]));
}

#[test]
fn test_factory_errors() {
    assert_eq!(
        try_map_of(slice_of(basic(Kind::Int)), basic(Kind::Int)),
        Err(ReflectError::InvalidMapKey("[]int".into()))
    );
    assert_eq!(try_func_of(&[basic(Kind::Int)], &[], true), Err(ReflectError::VariadicNotSlice));
}

#[test]
fn test_comparability() {
    let int = basic(Kind::Int);
    assert!(int.comparable());
    assert!(!slice_of(int).comparable());
    assert!(!map_of(int, int).comparable());
    assert!(!func_of(&[], &[], false).comparable());
    assert!(array_of(2, basic(Kind::String)).comparable());
    assert!(!struct_of(&[StructField::new("S", slice_of(int))]).comparable());
    assert!(ptr_to(slice_of(int)).comparable());
}

#[test]
fn test_interface_types() {
    let stringer = interface_of(vec![("String".into(), func_of(&[], &[basic(Kind::String)], false))]);
    assert_eq!(stringer.string(), "interface { String() string }");
    assert_eq!(stringer.num_method(), 1);
    assert_eq!(error_type().num_method(), 1);
    assert_eq!(error_type().method(0).name, "Error");
    assert!(!basic(Kind::Int).implements(stringer));
}

#[test]
fn test_struct_tags() {
    let s = struct_of(&[StructField::new("F", basic(Kind::Int)).with_tag(r#"json:"f,omitempty" xml:"a\"b" empty:"""#)]);
    let tag = s.field(0).tag;
    assert_eq!(tag.get("json"), "f,omitempty");
    assert_eq!(tag.get("xml"), "a\"b");
    assert_eq!(tag.lookup("empty"), Some(String::new()));
    assert_eq!(tag.lookup("missing"), None);
}
