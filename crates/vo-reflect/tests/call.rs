//! Dynamic calls: native code, MakeFunc closures, methods and method values.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use vo_reflect::{
    basic, error_type, func_of, func_value, interface_of, make_func, make_slice, new, ptr_to, slice_of, value_of,
    Code, Frame, Kind, StructField, Type, TypeDef, Value,
};

fn int() -> Type {
    basic(Kind::Int)
}

/// `type Counter struct { N int }` with `Get() int` on the value and
/// `Add(int)` on the pointer.
fn counter_type(pkg: &str) -> Type {
    let get: Code = Arc::new(|f: &mut Frame<'_>| {
        let n = f.receiver_value().field(0).int();
        f.set_ret::<isize>(0, n as isize);
    });
    let add: Code = Arc::new(|f: &mut Frame<'_>| {
        let by = f.arg::<isize>(0) as i64;
        let n = f.receiver_value().elem().field(0);
        n.set_int(n.int() + by);
    });
    TypeDef::with_fields(pkg, "Counter", vec![StructField::new("N", int())])
        .method("Get", func_of(&[], &[int()], false), get)
        .ptr_method("Add", func_of(&[int()], &[], false), add)
        .build()
}

fn ints(v: &[Value]) -> Vec<i64> {
    v.iter().map(|x| x.int()).collect()
}

#[test]
fn test_make_func_swap() {
    let swap = make_func(func_of(&[int(), int()], &[int(), int()], false), |args| vec![args[1], args[0]]);
    let out = swap.call(&[value_of(1isize), value_of(2isize)]);
    assert_eq!(ints(&out), vec![2, 1]);
}

#[test]
fn test_native_frame_access() {
    let ftyp = func_of(&[basic(Kind::Int64), basic(Kind::String)], &[basic(Kind::Int64)], false);
    let f = func_value(
        ftyp,
        Arc::new(|fr: &mut Frame<'_>| {
            let n = fr.arg::<i64>(0);
            let s = fr.arg_str(1);
            fr.set_ret(0, n + s.len() as i64);
        }),
    );
    assert_eq!(f.call(&[value_of(40i64), value_of("ab")])[0].int(), 42);
}

#[test]
fn test_variadic_call_and_call_slice() {
    let ftyp = func_of(&[basic(Kind::String), slice_of(int())], &[int()], true);
    let f = make_func(ftyp, |args| {
        let sum: i64 = (0..args[1].len()).map(|i| args[1].index(i).int()).sum();
        vec![value_of(sum as isize)]
    });
    let s = value_of("x");
    assert_eq!(f.call(&[s, value_of(1isize), value_of(2isize), value_of(3isize)])[0].int(), 6);
    assert_eq!(f.call(&[s])[0].int(), 0);

    let packed = make_slice(slice_of(int()), 2, 2);
    packed.index(0).set_int(10);
    packed.index(1).set_int(5);
    assert_eq!(f.call_slice(&[s, packed])[0].int(), 15);
}

#[test]
#[should_panic(expected = "reflect: Call with too few input arguments")]
fn test_call_with_too_few_args() {
    let f = make_func(func_of(&[int()], &[], false), |_| vec![]);
    f.call(&[]);
}

#[test]
#[should_panic(expected = "reflect: Call using string as type int")]
fn test_call_with_wrong_arg_type() {
    let f = make_func(func_of(&[int()], &[], false), |_| vec![]);
    f.call(&[value_of("no")]);
}

#[test]
#[should_panic(expected = "wrong return count from function created by MakeFunc")]
fn test_make_func_result_count_is_checked() {
    let f = make_func(func_of(&[], &[int()], false), |_| vec![]);
    f.call(&[]);
}

#[test]
fn test_try_call_reports_errors() {
    let f = make_func(func_of(&[int()], &[], false), |_| vec![]);
    assert!(f.try_call(&[]).is_err());
    assert!(value_of(1isize).try_call(&[]).is_err());
    assert!(f.try_call_slice(&[value_of(1isize)]).is_err());
}

#[test]
fn test_method_sets_of_value_and_pointer() {
    let counter = counter_type("call_test_sets");
    assert_eq!(counter.num_method(), 1);
    assert_eq!(ptr_to(counter).num_method(), 2);
    assert_eq!(ptr_to(counter).method(0).name, "Add");
    let m = counter.method_by_name("Get").map(|m| m.typ.string());
    assert_eq!(m.as_deref(), Some("func(call_test_sets.Counter) int"));
    assert!(counter.method_by_name("Add").is_none());
}

#[test]
fn test_pointer_method_mutates_receiver() {
    let counter = counter_type("call_test_ptr");
    let p = new(counter);
    p.method_by_name("Add").call(&[value_of(5isize)]);
    p.method_by_name("Add").call(&[value_of(2isize)]);
    assert_eq!(p.elem().field(0).int(), 7);
    assert_eq!(p.method_by_name("Get").call(&[])[0].int(), 7);
    assert_eq!(p.elem().method_by_name("Get").call(&[])[0].int(), 7);
}

#[test]
fn test_method_value_binds_receiver_copy() {
    let counter = counter_type("call_test_bound");
    let v = new(counter).elem();
    v.field(0).set_int(3);
    let get = v.method_by_name("Get");
    assert_eq!(get.kind(), Kind::Func);
    assert_eq!(get.typ(), func_of(&[], &[int()], false));
    let f = get.interface();
    v.field(0).set_int(100);
    assert_eq!(value_of(f).call(&[])[0].int(), 3);
}

#[test]
fn test_method_expression_takes_receiver_first() {
    let counter = counter_type("call_test_expr");
    let v = new(counter).elem();
    v.field(0).set_int(11);
    let m = counter.method(0);
    assert_eq!(m.func.call(&[v])[0].int(), 11);
}

#[test]
fn test_promoted_methods_through_embedding() {
    let counter = counter_type("call_test_promo");
    let outer = TypeDef::with_fields(
        "call_test_promo",
        "Outer",
        vec![StructField::new("Name", basic(Kind::String)), StructField::embedded("", counter)],
    )
    .build();
    assert_eq!(outer.num_method(), 1);
    assert_eq!(ptr_to(outer).num_method(), 2);

    let p = new(outer);
    p.method_by_name("Add").call(&[value_of(4isize)]);
    assert_eq!(p.elem().field_by_name("N").int(), 4);
    assert_eq!(p.elem().method_by_name("Get").call(&[])[0].int(), 4);
}

#[test]
fn test_interface_dispatch() {
    let counter = counter_type("call_test_iface");
    let getter = interface_of(vec![("Get".into(), func_of(&[], &[int()], false))]);
    assert!(counter.implements(getter));
    assert!(ptr_to(counter).implements(getter));

    let c = new(counter).elem();
    c.field(0).set_int(8);
    let iv = new(getter).elem();
    iv.set(c);
    assert_eq!(iv.elem().typ(), counter);
    assert_eq!(iv.num_method(), 1);
    assert_eq!(iv.method(0).call(&[])[0].int(), 8);
}

#[test]
#[should_panic(expected = "reflect: Method on nil interface value")]
fn test_method_on_nil_interface() {
    let getter = interface_of(vec![("Get".into(), func_of(&[], &[int()], false))]);
    new(getter).elem().method(0);
}

#[test]
fn test_error_interface_implementation() {
    let code: Code = Arc::new(|f: &mut Frame<'_>| {
        let msg = format!("failed: {}", f.receiver_value().int());
        f.set_ret_value(0, value_of(msg));
    });
    let code_err = TypeDef::new("call_test_err", "CodeErr", int())
        .method("Error", func_of(&[], &[basic(Kind::String)], false), code)
        .build();
    assert!(code_err.implements(error_type()));

    let e = new(error_type()).elem();
    let v = new(code_err).elem();
    v.set_int(5);
    e.set(v);
    assert_eq!(e.method_by_name("Error").call(&[])[0].string(), "failed: 5");
}
