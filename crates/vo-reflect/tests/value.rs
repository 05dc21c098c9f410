//! Value access, settability rules and conversions.

use pretty_assertions::assert_eq;
use vo_reflect::{
    basic, indirect, make_slice, new, ptr_to, slice_of, struct_of, type_of, value_of, zero, Any, Kind, StructField,
    TypeDef, C128, C64,
};

#[test]
fn test_new_is_settable_through_elem() {
    let p = new(basic(Kind::Int32));
    assert_eq!(p.typ(), ptr_to(basic(Kind::Int32)));
    let v = p.elem();
    assert!(v.can_set());
    v.set_int(-7);
    assert_eq!(v.int(), -7);
    assert_eq!(indirect(p).int(), -7);
    assert_eq!(v.addr().pointer(), p.pointer());
}

#[test]
fn test_value_of_is_not_addressable() {
    let v = value_of(3.5f64);
    assert!(!v.can_addr());
    assert!(!v.can_set());
    assert_eq!(v.float(), 3.5);
    assert_eq!(v.kind(), Kind::Float64);
}

#[test]
#[should_panic(expected = "reflect: reflect.Value.SetInt using unaddressable value")]
fn test_set_on_unaddressable_panics() {
    value_of(1isize).set_int(2);
}

#[test]
#[should_panic(expected = "reflect: call of reflect.Value.Bool on int Value")]
fn test_wrong_kind_accessor_panics() {
    value_of(1isize).bool();
}

#[test]
fn test_unexported_fields_are_read_only() {
    let t = struct_of(&[
        StructField::new("Pub", basic(Kind::Int)),
        StructField::new("priv", basic(Kind::Int)).with_pkg_path("value_test"),
    ]);
    let v = new(t).elem();
    assert!(v.field(0).can_set());
    let hidden = v.field(1);
    assert!(hidden.can_addr());
    assert!(!hidden.can_set());
    assert!(!hidden.can_interface());
    assert_eq!(hidden.int(), 0);
    assert!(v.field_by_name("priv").is_valid());
    assert!(!v.field_by_name("nope").is_valid());
}

#[test]
#[should_panic(expected = "cannot return value obtained from unexported field or method")]
fn test_interface_of_unexported_field_panics() {
    let t = struct_of(&[StructField::new("hidden", basic(Kind::Int)).with_pkg_path("value_test")]);
    zero(t).field(0).interface();
}

#[test]
fn test_exported_field_of_unexported_embedded_struct_is_settable() {
    let inner = TypeDef::with_fields("value_test", "inner", vec![StructField::new("X", basic(Kind::Int))]).build();
    let outer = struct_of(&[StructField::embedded("", inner).with_pkg_path("value_test")]);
    let v = new(outer).elem();
    assert!(!v.field(0).can_set());
    let x = v.field_by_name("X");
    assert!(x.can_set());
    x.set_int(9);
    assert_eq!(v.field(0).field(0).int(), 9);
}

#[test]
fn test_set_assigns_across_identical_underlying_types() {
    let ints = slice_of(basic(Kind::Int));
    let dst = new(ints).elem();
    dst.set(make_slice(ints, 2, 4));
    assert_eq!((dst.len(), dst.cap()), (2, 4));
    dst.set_len(3);
    assert_eq!(dst.len(), 3);
}

#[test]
#[should_panic(expected = "reflect.Set: value of type string is not assignable to type int")]
fn test_set_type_mismatch() {
    new(basic(Kind::Int)).elem().set(value_of("x"));
}

#[test]
fn test_numeric_conversions() {
    assert_eq!(value_of(300isize).convert(basic(Kind::Uint8)).uint(), 44);
    assert_eq!(value_of(-1i8).convert(basic(Kind::Uint16)).uint(), 0xffff);
    assert_eq!(value_of(2.9f64).convert(basic(Kind::Int)).int(), 2);
    assert_eq!(value_of(7u32).convert(basic(Kind::Float32)).float(), 7.0);
    let c = value_of(C64 { re: 1.5, im: -2.0 }).convert(basic(Kind::Complex128));
    assert_eq!(c.complex(), C128 { re: 1.5, im: -2.0 });
    assert!(!value_of(1.5f32).can_convert(basic(Kind::Complex128)));
}

#[test]
fn test_string_conversions() {
    assert_eq!(value_of(-2i8).convert(basic(Kind::String)).string(), "\u{FFFD}");
    assert_eq!(value_of(0x4e16isize).convert(basic(Kind::String)).string(), "世");

    let bytes = slice_of(basic(Kind::Uint8));
    let b = value_of("héllo").convert(bytes);
    assert_eq!(b.len(), 6);
    assert_eq!(b.bytes(), "héllo".as_bytes());
    assert_eq!(b.convert(basic(Kind::String)).string(), "héllo");

    let runes = slice_of(basic(Kind::Int32));
    let r = value_of("héllo").convert(runes);
    assert_eq!(r.len(), 5);
    assert_eq!(r.index(1).int(), 'é' as i64);
}

#[test]
fn test_named_conversion_and_can_convert() {
    let celsius = TypeDef::new("value_test", "Celsius", basic(Kind::Float64)).build();
    let v = value_of(21.5f64).convert(celsius);
    assert_eq!(v.typ(), celsius);
    assert_eq!(v.float(), 21.5);
    assert!(value_of(1isize).can_convert(basic(Kind::Float32)));
    assert!(!value_of("s").can_convert(basic(Kind::Int)));
    assert!(!basic(Kind::Float64).assignable_to(celsius));
    assert!(basic(Kind::Float64).convertible_to(celsius));
}

#[test]
fn test_zero_and_is_zero() {
    let t = struct_of(&[StructField::new("A", basic(Kind::Float64)), StructField::new("S", basic(Kind::String))]);
    let v = new(t).elem();
    assert!(v.is_zero());
    v.field(0).set_float(-0.0);
    assert!(!v.is_zero());
    v.set_zero();
    assert!(v.is_zero());
    v.field(1).set_string("x");
    assert!(!v.is_zero());
}

#[test]
fn test_zero_is_addressable_and_settable() {
    let v = zero(basic(Kind::Int));
    assert!(v.can_addr());
    assert!(v.can_set());
    assert!(v.is_zero());
    v.set_int(42);
    assert_eq!(v.int(), 42);
    assert_eq!(v.addr().elem().int(), 42);

    let z = zero(basic(Kind::Int));
    assert_eq!(z.int(), 0);
}

#[test]
fn test_conversion_results_are_not_addressable() {
    let v = value_of(7i32).convert(basic(Kind::Int64));
    assert!(!v.can_addr());
    assert_eq!(v.int(), 7);
}

#[test]
fn test_interface_round_trip() {
    let any: Any = value_of(42u16).interface();
    assert_eq!(any.downcast::<u16>(), Some(42));
    assert_eq!(any.downcast::<u32>(), None);
    assert_eq!(type_of(42u16), Some(basic(Kind::Uint16)));
    assert_eq!(type_of(Any::NIL), None);
    assert!(!value_of(Any::NIL).is_valid());
    assert_eq!(value_of("s").interface().as_string().as_deref(), Some("s"));
}

#[test]
fn test_string_of_non_string_values() {
    assert_eq!(value_of(1isize).string(), "<int Value>");
    assert_eq!(vo_reflect::Value::invalid().string(), "<invalid Value>");
}

#[test]
fn test_equal_and_comparable() {
    assert!(value_of(3isize).equal(&value_of(3isize)));
    assert!(!value_of(3isize).equal(&value_of(4isize)));
    assert!(!value_of(f64::NAN).equal(&value_of(f64::NAN)));
    assert!(!make_slice(slice_of(basic(Kind::Int)), 0, 0).comparable());
}
