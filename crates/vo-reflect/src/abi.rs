//! Argument frames.
//!
//! Every dynamic call goes through one frame: a heap block holding the
//! receiver, the arguments and the results, laid out by the active
//! `CallConv`. Native code reads and writes the frame through `Frame`; the
//! engine moves values in and out with `marshal_args` / `unmarshal_results`
//! (callers) and `unmarshal_args` / `marshal_results` (trampolines).
//!
//! Layout (StackAbi): [receiver] [arg0] [arg1] ... | pad to word | [res0] ...

use std::sync::Arc;

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use vo_common_core::{align_up, Kind, PTR_SIZE};
use vo_runtime::{GcLayout, LayoutBuilder};

use crate::any::Native;
use crate::error::{OrRaise, ReflectError};
use crate::rtype::Type;
use crate::value::{alloc_of, typed_copy, Flag, Value};

/// One value's position in a frame.
#[derive(Clone, Copy, Debug)]
pub struct ArgSlot {
    pub offset: usize,
    pub typ: Type,
}

#[derive(Clone, Debug)]
pub struct FrameLayout {
    pub func: Type,
    pub rcvr: Option<ArgSlot>,
    pub args: Vec<ArgSlot>,
    pub results: Vec<ArgSlot>,
    /// Offset of the first result.
    pub ret_offset: usize,
    pub size: usize,
    pub gc: GcLayout,
}

/// Placement of a call's values for one target.
pub trait CallConv: Send + Sync {
    fn frame_layout(&self, func: Type, rcvr: Option<Type>) -> FrameLayout;
}

/// Everything in memory, in declaration order, each value at its natural
/// alignment.
pub struct StackAbi;

impl CallConv for StackAbi {
    fn frame_layout(&self, func: Type, rcvr: Option<Type>) -> FrameLayout {
        let mut off = 0;
        let rcvr = rcvr.map(|t| place(&mut off, t));
        let args: Vec<ArgSlot> = func.ins().iter().map(|&t| place(&mut off, t)).collect();
        off = align_up(off, PTR_SIZE);
        let ret_offset = off;
        let results: Vec<ArgSlot> = func.outs().iter().map(|&t| place(&mut off, t)).collect();
        let size = align_up(off, PTR_SIZE);

        let mut b = LayoutBuilder::new();
        for s in rcvr.iter().chain(&args).chain(&results) {
            b.copy_at(s.offset, s.typ.gc(), 1);
        }
        FrameLayout { func, rcvr, args, results, ret_offset, size, gc: b.finish(size, PTR_SIZE) }
    }
}

fn place(off: &mut usize, t: Type) -> ArgSlot {
    *off = align_up(*off, t.align());
    let slot = ArgSlot { offset: *off, typ: t };
    *off += t.size();
    slot
}

#[cfg(target_pointer_width = "64")]
static ACTIVE: StackAbi = StackAbi;

static LAYOUTS: Lazy<Mutex<HashMap<(Type, Option<Type>), Arc<FrameLayout>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Cached frame layout of `func` called with receiver type `rcvr`.
pub(crate) fn frame_layout(func: Type, rcvr: Option<Type>) -> Arc<FrameLayout> {
    if let Some(l) = LAYOUTS.lock().get(&(func, rcvr)) {
        return l.clone();
    }
    let conv: &dyn CallConv = &ACTIVE;
    let l = Arc::new(conv.frame_layout(func, rcvr));
    LAYOUTS.lock().entry((func, rcvr)).or_insert(l).clone()
}

/// Copy the receiver and `args` (already of the parameter types) into the
/// frame.
///
/// # Safety
/// `base` must be a frame of `layout`; `rcvr` must address a value of the
/// receiver type when the layout has one.
pub(crate) unsafe fn marshal_args(layout: &FrameLayout, base: *mut u8, rcvr: Option<*const u8>, args: &[Value]) {
    if let (Some(slot), Some(src)) = (layout.rcvr, rcvr) {
        typed_copy(slot.typ, base.add(slot.offset), src);
    }
    for (slot, v) in layout.args.iter().zip(args) {
        typed_copy(slot.typ, base.add(slot.offset), v.ptr);
    }
}

unsafe fn copy_out(slot: &ArgSlot, base: *const u8) -> Value {
    let p = alloc_of(slot.typ);
    typed_copy(slot.typ, p, base.add(slot.offset));
    Value::from_parts(slot.typ, p, Flag::NONE)
}

/// Copy the results out of the frame as fresh, non-addressable values.
///
/// # Safety
/// `base` must be a frame of `layout` whose results were written.
pub(crate) unsafe fn unmarshal_results(layout: &FrameLayout, base: *const u8) -> Vec<Value> {
    layout.results.iter().map(|s| copy_out(s, base)).collect()
}

/// # Safety
/// `base` must be a frame of `layout` whose arguments were written.
pub(crate) unsafe fn unmarshal_args(layout: &FrameLayout, base: *const u8) -> Vec<Value> {
    layout.args.iter().map(|s| copy_out(s, base)).collect()
}

/// # Safety
/// `base` must be a frame of `layout`; `results` must already have the
/// result types.
pub(crate) unsafe fn marshal_results(layout: &FrameLayout, base: *mut u8, results: &[Value]) {
    for (slot, v) in layout.results.iter().zip(results) {
        typed_copy(slot.typ, base.add(slot.offset), v.ptr);
    }
}

/// Native code's view of its call frame.
pub struct Frame<'a> {
    base: *mut u8,
    layout: &'a FrameLayout,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(base: *mut u8, layout: &'a FrameLayout) -> Self {
        Self { base, layout }
    }

    /// Signature of the function being called.
    pub fn func_type(&self) -> Type {
        self.layout.func
    }

    pub fn num_args(&self) -> usize {
        self.layout.args.len()
    }

    pub fn num_results(&self) -> usize {
        self.layout.results.len()
    }

    #[track_caller]
    fn arg_slot(&self, i: usize) -> ArgSlot {
        match self.layout.args.get(i) {
            Some(s) => *s,
            None => ReflectError::IndexOutOfRange { what: "argument" }.raise(),
        }
    }

    #[track_caller]
    fn result_slot(&self, i: usize) -> ArgSlot {
        match self.layout.results.get(i) {
            Some(s) => *s,
            None => ReflectError::IndexOutOfRange { what: "result" }.raise(),
        }
    }

    #[track_caller]
    fn check_native<T: Native>(slot: &ArgSlot, what: String) {
        if slot.typ.kind() != T::KIND {
            ReflectError::FrameSlotType { slot: what, want: T::native_type().string(), have: slot.typ.string() }
                .raise();
        }
    }

    /// Argument `i` read as a Rust scalar of the same kind.
    #[track_caller]
    pub fn arg<T: Native>(&self, i: usize) -> T {
        let slot = self.arg_slot(i);
        Self::check_native::<T>(&slot, format!("argument {i}"));
        // SAFETY: the slot holds a value of T's kind and layout.
        unsafe { std::ptr::read_unaligned(self.base.add(slot.offset) as *const T) }
    }

    /// Argument `i` as a string.
    #[track_caller]
    pub fn arg_str(&self, i: usize) -> String {
        let v = self.arg_value(i);
        if v.kind() != Kind::String {
            ReflectError::FrameSlotType { slot: format!("argument {i}"), want: "string".into(), have: v.typ().string() }
                .raise();
        }
        v.string()
    }

    /// A copy of argument `i`.
    #[track_caller]
    pub fn arg_value(&self, i: usize) -> Value {
        let slot = self.arg_slot(i);
        // SAFETY: the slot lies within the frame.
        unsafe { copy_out(&slot, self.base) }
    }

    pub fn arg_values(&self) -> Vec<Value> {
        // SAFETY: the arguments were marshalled before the code ran.
        unsafe { unmarshal_args(self.layout, self.base) }
    }

    /// A copy of the receiver, or the invalid value for plain functions.
    pub fn receiver_value(&self) -> Value {
        match &self.layout.rcvr {
            // SAFETY: the slot lies within the frame.
            Some(slot) => unsafe { copy_out(slot, self.base) },
            None => Value::invalid(),
        }
    }

    #[track_caller]
    pub fn set_ret<T: Native>(&mut self, i: usize, x: T) {
        let slot = self.result_slot(i);
        Self::check_native::<T>(&slot, format!("result {i}"));
        // SAFETY: the slot holds a value of T's kind and layout.
        unsafe { std::ptr::write_unaligned(self.base.add(slot.offset) as *mut T, x) };
    }

    /// Store `v` as result `i`, converting it as an assignment would.
    #[track_caller]
    pub fn set_ret_value(&mut self, i: usize, v: Value) {
        let slot = self.result_slot(i);
        let v = v.assign_to("reflect.MakeFunc", slot.typ).or_raise();
        // SAFETY: v now has the slot's type.
        unsafe { typed_copy(slot.typ, self.base.add(slot.offset), v.ptr) };
    }

    pub(crate) fn set_results(&mut self, results: &[Value]) {
        // SAFETY: results were converted to the result types by the caller.
        unsafe { marshal_results(self.layout, self.base, results) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::func_of;
    use crate::registry::basic;

    #[test]
    fn test_stack_abi_alignment_and_result_word() {
        let f = func_of(&[basic(Kind::Int8), basic(Kind::Int64), basic(Kind::Int16)], &[basic(Kind::Uint8)], false);
        let l = StackAbi.frame_layout(f, None);
        let offs: Vec<usize> = l.args.iter().map(|s| s.offset).collect();
        assert_eq!(offs, vec![0, 8, 16]);
        assert_eq!(l.ret_offset, 24);
        assert_eq!(l.results[0].offset, 24);
        assert_eq!(l.size, 32);
    }

    #[test]
    fn test_frame_gc_bitmap_marks_pointer_slots() {
        let s = basic(Kind::String);
        let f = func_of(&[basic(Kind::Bool), s], &[s], false);
        let l = StackAbi.frame_layout(f, Some(basic(Kind::Int32)));
        assert_eq!(l.rcvr.map(|r| r.offset), Some(0));
        assert_eq!(l.args[0].offset, 4);
        assert_eq!(l.args[1].offset, 8);
        assert_eq!(l.results[0].offset, 24);
        let words: Vec<usize> = l.gc.pointer_words().collect();
        assert_eq!(words, vec![1, 3]);
    }

    #[test]
    fn test_frame_layout_is_cached() {
        let f = func_of(&[basic(Kind::Int)], &[], false);
        assert!(Arc::ptr_eq(&frame_layout(f, None), &frame_layout(f, None)));
    }
}
