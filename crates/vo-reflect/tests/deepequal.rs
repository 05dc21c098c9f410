//! Deep equality over composite and cyclic values.

use vo_reflect::{
    basic, declare, deep_equal, func_of, make_func, make_map, make_slice, map_of, new, ptr_to, slice_of, value_of,
    zero, Kind, StructField, Type, TypeDef, Value,
};

fn int_slice(xs: &[i64]) -> Value {
    let s = make_slice(slice_of(basic(Kind::Int)), xs.len(), xs.len());
    for (i, &x) in xs.iter().enumerate() {
        s.index(i).set_int(x);
    }
    s
}

/// `type Node struct { V int; Next *Node }`
fn node_type() -> Type {
    let node = declare("deepequal_test", "Node");
    TypeDef::with_fields(
        "deepequal_test",
        "Node",
        vec![StructField::new("V", basic(Kind::Int)), StructField::new("Next", ptr_to(node))],
    )
    .complete(node)
    .unwrap()
}

fn ring(node: Type, values: &[i64]) -> Value {
    let ptrs: Vec<Value> = values.iter().map(|_| new(node)).collect();
    for (i, (p, &v)) in ptrs.iter().zip(values).enumerate() {
        p.elem().field(0).set_int(v);
        p.elem().field(1).set(ptrs[(i + 1) % ptrs.len()]);
    }
    ptrs[0]
}

#[test]
fn test_slices() {
    assert!(deep_equal(int_slice(&[1, 2, 3]), int_slice(&[1, 2, 3])));
    assert!(!deep_equal(int_slice(&[1, 2, 3]), int_slice(&[1, 2, 4])));
    assert!(!deep_equal(int_slice(&[1]), int_slice(&[1, 1])));

    let nil = zero(slice_of(basic(Kind::Int)));
    assert!(!deep_equal(nil, int_slice(&[])));
    assert!(deep_equal(nil, zero(slice_of(basic(Kind::Int)))));
}

#[test]
fn test_maps() {
    let t = map_of(basic(Kind::String), slice_of(basic(Kind::Int)));
    let (a, b) = (make_map(t), make_map(t));
    a.set_map_index(value_of("k"), int_slice(&[1, 2]));
    b.set_map_index(value_of("k"), int_slice(&[1, 2]));
    assert!(deep_equal(a, b));
    b.set_map_index(value_of("j"), int_slice(&[]));
    assert!(!deep_equal(a, b));
    assert!(!deep_equal(zero(t), make_map(t)));
}

#[test]
fn test_cyclic_structures_terminate() {
    let node = node_type();
    assert!(deep_equal(ring(node, &[1]), ring(node, &[1])));
    assert!(deep_equal(ring(node, &[1, 2, 3]), ring(node, &[1, 2, 3])));
    assert!(!deep_equal(ring(node, &[1, 2, 3]), ring(node, &[1, 2, 4])));
}

#[test]
fn test_funcs_are_equal_only_when_nil() {
    let ft = func_of(&[], &[], false);
    let f = make_func(ft, |_| vec![]);
    assert!(!deep_equal(f, f));
    assert!(deep_equal(zero(ft), zero(ft)));
}

#[test]
fn test_different_types_are_unequal() {
    let meters = TypeDef::new("deepequal_test", "Meters", basic(Kind::Int)).build();
    assert!(!deep_equal(value_of(3isize).convert(meters), 3isize));
    assert!(deep_equal(value_of(3isize).convert(meters), value_of(3isize).convert(meters)));
}
