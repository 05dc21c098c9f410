//! Function values and dynamic calls.
//!
//! Layout: a func value is one word holding the address of a native heap
//! `FuncObject` (null = nil func). Every callable, whether compiled code, a
//! `MakeFunc` closure or a bound method, is a `Code` run against a frame laid
//! out by `abi`.

use std::sync::Arc;

use vo_common_core::Kind;
use vo_runtime::{gc_global, with_gc, Gc, Trace};

use crate::abi::{self, Frame};
use crate::error::{OrRaise, ReflectError, Result};
use crate::registry::ptr_to;
use crate::resolve::{method_entry, method_set, MethodEntry, Target};
use crate::rtype::{Detail, Type};
use crate::slice_ops::make_slice;
use crate::value::{alloc_of, pointer_cell, Flag, Value};

/// Native code behind a function value.
pub type Code = Arc<dyn Fn(&mut Frame<'_>) + Send + Sync>;

pub(crate) struct FuncObject {
    pub code: Code,
    /// Receiver copy kept alive by a method value.
    pub bound: Option<usize>,
}

impl Trace for FuncObject {
    fn trace(&self, visit: &mut dyn FnMut(usize)) {
        if let Some(addr) = self.bound {
            visit(addr);
        }
    }
}

/// Keeps a heap block alive while a call runs.
struct Pinned(usize);

impl Pinned {
    fn new(addr: usize) -> Self {
        gc_global::pin(addr);
        Pinned(addr)
    }
}

impl Drop for Pinned {
    fn drop(&mut self) {
        gc_global::unpin(self.0);
    }
}

fn func_cell(ftyp: Type, obj: FuncObject, flag: Flag) -> Value {
    let p = with_gc(|gc| gc.alloc_native(obj));
    let cell = alloc_of(ftyp);
    // SAFETY: fresh func storage.
    unsafe { *(cell as *mut *mut u8) = p };
    Value::from_parts(ftyp, cell, flag)
}

/// Wrap native code as a function value of type `ftyp`.
#[track_caller]
pub fn func_value(ftyp: Type, code: Code) -> Value {
    if ftyp.kind() != Kind::Func {
        ReflectError::NotKindType { op: "reflect.FuncValue", kind: Kind::Func, typ: ftyp.string() }.raise();
    }
    func_cell(ftyp, FuncObject { code, bound: None }, Flag::NONE)
}

/// A function of type `ftyp` that runs `f` on its arguments.
///
/// `f` receives fresh copies of the arguments and must return exactly one
/// value assignable to each result type.
#[track_caller]
pub fn make_func<F>(ftyp: Type, f: F) -> Value
where
    F: Fn(&[Value]) -> Vec<Value> + Send + Sync + 'static,
{
    if ftyp.kind() != Kind::Func {
        ReflectError::NotKindType { op: "reflect.MakeFunc", kind: Kind::Func, typ: ftyp.string() }.raise();
    }
    let code: Code = Arc::new(move |frame: &mut Frame<'_>| {
        let args = frame.arg_values();
        let results = f(&args);
        if results.len() != frame.num_results() {
            ReflectError::MakeFuncResultCount.raise();
        }
        for (i, v) in results.into_iter().enumerate() {
            if !v.is_valid() {
                ReflectError::MakeFuncResult("zero Value").raise();
            }
            if v.flag.has(Flag::RO) {
                ReflectError::MakeFuncResult("value obtained from unexported field").raise();
            }
            frame.set_ret_value(i, v);
        }
    });
    tracing::debug!(target: "vo::call", func = %ftyp, "MakeFunc trampoline created");
    func_cell(ftyp, FuncObject { code, bound: None }, Flag::NONE)
}

/// Run `code` on a fresh frame and copy the results out.
fn invoke(ftyp: Type, code: &Code, rcvr: Option<(Type, *const u8)>, args: &[Value]) -> Vec<Value> {
    let layout = abi::frame_layout(ftyp, rcvr.map(|r| r.0));
    tracing::trace!(target: "vo::call", func = %ftyp, args = args.len(), "dynamic call");
    let base = gc_global::alloc(&layout.gc, 1);
    let _frame = Pinned::new(base as usize);
    // SAFETY: base is a zeroed frame of `layout`; args have the parameter types.
    unsafe { abi::marshal_args(&layout, base, rcvr.map(|r| r.1), args) };
    code(&mut Frame::new(base, &layout));
    // SAFETY: the code has run; results are in place.
    unsafe { abi::unmarshal_results(&layout, base) }
}

/// Check `args` against `ftyp` and convert them to the parameter types,
/// packing variadic trailing arguments unless `is_slice`.
fn prepare_args(op: &'static str, ftyp: Type, args: &[Value], is_slice: bool) -> Result<Vec<Value>> {
    let variadic = ftyp.is_variadic();
    let mut n = ftyp.num_in();
    if is_slice {
        if !variadic {
            return Err(ReflectError::CallSliceNonVariadic);
        }
        if args.len() < n {
            return Err(ReflectError::TooFewArgs { op });
        }
        if args.len() > n {
            return Err(ReflectError::TooManyArgs { op });
        }
    } else {
        if variadic {
            n -= 1;
        }
        if args.len() < n {
            return Err(ReflectError::TooFewArgs { op });
        }
        if !variadic && args.len() > n {
            return Err(ReflectError::TooManyArgs { op });
        }
    }
    if args.iter().any(|a| !a.is_valid()) {
        return Err(ReflectError::ZeroArgument { op });
    }
    for (i, a) in args.iter().take(n).enumerate() {
        let (xt, targ) = (a.typ(), ftyp.in_(i));
        if !xt.assignable_to(targ) {
            return Err(ReflectError::BadArgument { op, from: xt.string(), to: targ.string() });
        }
    }

    let mut out = Vec::with_capacity(ftyp.num_in());
    for (i, a) in args.iter().take(n).enumerate() {
        a.check_exported(call_method_name(op))?;
        out.push(a.assign_to(call_method_name(op), ftyp.in_(i))?);
    }
    if !is_slice && variadic {
        let st = ftyp.in_(n);
        let elem = st.elem();
        let extra = &args[n..];
        let packed = make_slice(st, extra.len(), extra.len());
        for (i, x) in extra.iter().enumerate() {
            let xt = x.typ();
            if !xt.assignable_to(elem) {
                return Err(ReflectError::BadArgument { op, from: xt.string(), to: elem.string() });
            }
            packed.index(i).try_set(*x)?;
        }
        out.push(packed);
    }
    Ok(out)
}

fn call_method_name(op: &'static str) -> &'static str {
    if op == "CallSlice" {
        "reflect.Value.CallSlice"
    } else {
        "reflect.Value.Call"
    }
}

impl Value {
    /// Call the function with `args`, packing trailing variadic arguments.
    #[track_caller]
    pub fn call(&self, args: &[Value]) -> Vec<Value> {
        self.must_be("reflect.Value.Call", Kind::Func);
        self.must_be_exported("reflect.Value.Call");
        self.call_impl("Call", args).or_raise()
    }

    /// Call a variadic function whose last argument is already a slice.
    #[track_caller]
    pub fn call_slice(&self, args: &[Value]) -> Vec<Value> {
        self.must_be("reflect.Value.CallSlice", Kind::Func);
        self.must_be_exported("reflect.Value.CallSlice");
        self.call_impl("CallSlice", args).or_raise()
    }

    pub fn try_call(&self, args: &[Value]) -> Result<Vec<Value>> {
        self.check_func("reflect.Value.Call")?;
        self.call_impl("Call", args)
    }

    pub fn try_call_slice(&self, args: &[Value]) -> Result<Vec<Value>> {
        self.check_func("reflect.Value.CallSlice")?;
        self.call_impl("CallSlice", args)
    }

    fn check_func(&self, method: &'static str) -> Result<()> {
        match self.kind() {
            Kind::Invalid => return Err(ReflectError::ZeroValue { method }),
            Kind::Func => {}
            k => return Err(ReflectError::WrongKind { method, kind: k }),
        }
        self.check_exported(method)
    }

    fn call_impl(&self, op: &'static str, args: &[Value]) -> Result<Vec<Value>> {
        if self.flag.has(Flag::METHOD) {
            let (rcvr, i) = (self.receiver(), self.flag.method_index());
            let ftyp = self.typ();
            let args = prepare_args(op, ftyp, args, op == "CallSlice")?;
            return Ok(call_method(rcvr, i, &args));
        }
        let ftyp = self.typ();
        // SAFETY: func storage.
        let obj = unsafe { *(self.ptr as *const *mut u8) };
        if obj.is_null() {
            return Err(ReflectError::NilFunc);
        }
        let args = prepare_args(op, ftyp, args, op == "CallSlice")?;
        // SAFETY: non-null func words address FuncObjects.
        let f: &FuncObject = unsafe { Gc::native(obj) };
        let code = f.code.clone();
        Ok(invoke(ftyp, &code, None, &args))
    }

    /// The receiver of a method value, without the method bits.
    pub(crate) fn receiver(&self) -> Value {
        Value { typ: self.typ, ptr: self.ptr, flag: self.flag & (Flag::ADDR | Flag::RO) }
    }
}

/// Call visible method `i` of `rcvr`'s type with prepared arguments.
#[track_caller]
pub(crate) fn call_method(rcvr: Value, i: usize, args: &[Value]) -> Vec<Value> {
    let t = rcvr.typ();
    let e = method_entry(t, i);
    if !e.pkg_path.is_empty() {
        ReflectError::UnexportedMethod { op: "Call" }.raise();
    }
    dispatch(rcvr, e, args)
}

#[track_caller]
fn dispatch(rcvr: Value, e: &MethodEntry, args: &[Value]) -> Vec<Value> {
    let t = rcvr.typ();
    match &e.target {
        Target::Interface => {
            let dynv = rcvr.elem();
            if !dynv.is_valid() {
                ReflectError::NilInterfaceMethod.raise();
            }
            let dt = dynv.typ();
            match method_set(dt).find(&e.name) {
                Some(de) => dispatch(dynv, de, args),
                None => ReflectError::MethodIndex.raise(),
            }
        }
        Target::Declared { index, ptr_recv } => {
            let (named, via_ptr) = match t.detail() {
                Detail::Ptr { elem } if !t.has_name() => (*elem, true),
                _ => (t, false),
            };
            let decl = &named.body().declared[*index];
            let src: *const u8 = match (ptr_recv, via_ptr) {
                (true, true) => rcvr.ptr,
                (true, false) => pointer_cell(named, rcvr.ptr, Flag::NONE).ptr,
                (false, true) => {
                    // SAFETY: pointer storage.
                    let p = unsafe { *(rcvr.ptr as *const *mut u8) };
                    if p.is_null() {
                        ReflectError::NilReceiver { method: format!("{}.{}", named, e.name) }.raise();
                    }
                    p
                }
                (false, false) => rcvr.ptr,
            };
            let rtyp = if *ptr_recv { ptr_to(named) } else { named };
            let _rcvr = Pinned::new(src as usize);
            invoke(decl.typ, &decl.code, Some((rtyp, src)), args)
        }
        Target::Promoted { path } => {
            let mut cur = rcvr.receiver();
            for &x in path {
                if cur.kind() == Kind::Ptr {
                    if cur.is_nil() {
                        ReflectError::NilEmbeddedPointer.raise();
                    }
                    cur = cur.elem();
                }
                cur = raw_field(cur, x);
            }
            let target = match cur.kind() {
                Kind::Ptr | Kind::Interface => cur,
                _ => pointer_cell(cur.typ(), cur.ptr, Flag::NONE),
            };
            match method_set(target.typ()).find(&e.name) {
                Some(de) => dispatch(target, de, args),
                None => ReflectError::MethodIndex.raise(),
            }
        }
    }
}

/// Field access that ignores export restrictions; method dispatch may walk
/// through unexported embedded fields.
fn raw_field(v: Value, i: usize) -> Value {
    let f = &v.typ().fields()[i];
    // SAFETY: the offset lies within the struct.
    Value::from_parts(f.typ, unsafe { v.ptr.add(f.offset) }, Flag::ADDR)
}

/// Materialize a method value as a func value bound to a copy of its
/// receiver.
pub(crate) fn make_method_value(op: &'static str, v: Value) -> Value {
    let i = v.flag.method_index();
    let rcvr = v.receiver();
    let rt = rcvr.typ();
    let e = method_entry(rt, i);
    if !e.pkg_path.is_empty() {
        ReflectError::UnexportedMethod { op }.raise();
    }
    let copy = alloc_of(rt);
    // SAFETY: fresh storage of the receiver type.
    unsafe { crate::value::typed_copy(rt, copy, rcvr.ptr) };
    let bound = Value::from_parts(rt, copy, Flag::NONE);
    let code: Code = Arc::new(move |frame: &mut Frame<'_>| {
        let args = frame.arg_values();
        let _rcvr = Pinned::new(bound.ptr as usize);
        let results = call_method(bound, i, &args);
        frame.set_results(&results);
    });
    tracing::debug!(target: "vo::call", method = %e.name, receiver = %rt, "method value created");
    func_cell(e.mtyp, FuncObject { code, bound: Some(copy as usize) }, v.flag.ro())
}

/// `Type::method(i).func`: the method with its receiver as first argument.
pub(crate) fn method_func(t: Type, i: usize, ftyp: Type) -> Value {
    let code: Code = Arc::new(move |frame: &mut Frame<'_>| {
        let args = frame.arg_values();
        let results = call_method(args[0], i, &args[1..]);
        frame.set_results(&results);
    });
    tracing::debug!(target: "vo::call", typ = %t, index = i, "method expression created");
    func_cell(ftyp, FuncObject { code, bound: None }, Flag::NONE)
}
