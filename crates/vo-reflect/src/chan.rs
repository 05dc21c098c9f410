//! Channel operations and multi-way select.
//!
//! Layout: a channel value is one word holding the address of a native heap
//! `ChanObject` (null = nil channel). Elements cross into the channel as
//! word copies. A nil channel is never ready.

use vo_common_core::{ChanDir, Kind};
use vo_runtime::objects::channel::{self, CaseOp, ChanObject, Outcome, Selected, Words};
use vo_runtime::slot::{words_from, words_into};
use vo_runtime::{with_gc, Gc};

use crate::error::{OrRaise, ReflectError};
use crate::rtype::Type;
use crate::value::{alloc_of, Flag, Value};

pub(crate) fn chan_obj<'a>(v: &Value) -> Option<&'a ChanObject> {
    // SAFETY: chan storage.
    let p = unsafe { *(v.ptr as *const *mut u8) };
    // SAFETY: non-null chan words address ChanObjects.
    (!p.is_null()).then(|| unsafe { Gc::native::<ChanObject>(p) })
}

fn block_forever() -> ! {
    loop {
        let _ = channel::select(vec![CaseOp::Never], true);
    }
}

/// A new bidirectional channel of type `t` with the given buffer size.
#[track_caller]
pub fn make_chan(t: Type, buffer: usize) -> Value {
    if t.kind() != Kind::Chan {
        ReflectError::NotKindType { op: "reflect.MakeChan", kind: Kind::Chan, typ: t.string() }.raise();
    }
    if t.chan_dir() != ChanDir::Both {
        ReflectError::UnidirectionalChan.raise();
    }
    let obj = ChanObject::new(t.elem().gc().clone(), buffer);
    let p = with_gc(|gc| gc.alloc_native(obj));
    let cell = alloc_of(t);
    // SAFETY: fresh chan storage.
    unsafe { *(cell as *mut *mut u8) = p };
    tracing::debug!(target: "vo::chan", typ = %t, buffer, "made channel");
    Value::from_parts(t, cell, Flag::NONE)
}

/// Copy `x`, converted to the element type, into channel words.
#[track_caller]
fn to_words(op: &'static str, elem: Type, x: Value) -> Words {
    x.must_be_exported(op);
    let x = x.assign_to(op, elem).or_raise();
    // SAFETY: x holds an elem.
    unsafe { words_from(x.ptr, elem.size()) }
}

fn from_words(elem: Type, w: &Words) -> Value {
    let out = alloc_of(elem);
    // SAFETY: fresh storage of elem.
    unsafe { words_into(w, out, elem.size()) };
    Value::from_parts(elem, out, Flag::NONE)
}

impl Value {
    /// Send `x`, blocking until the channel accepts it.
    #[track_caller]
    pub fn send(&self, x: Value) {
        self.send_impl(x, true);
    }

    /// Send `x` if that can be done without blocking.
    #[track_caller]
    pub fn try_send(&self, x: Value) -> bool {
        self.send_impl(x, false)
    }

    #[track_caller]
    fn send_impl(&self, x: Value, block: bool) -> bool {
        self.must_be("reflect.Value.Send", Kind::Chan);
        self.must_be_exported("reflect.Value.Send");
        let t = self.typ();
        if t.chan_dir() == ChanDir::Recv {
            ReflectError::ChanDirection { op: "send", dir: "recv-only" }.raise();
        }
        let words = to_words("reflect.Value.Send", t.elem(), x);
        match chan_obj(self) {
            Some(c) => c.send(words, block).map_err(ReflectError::from).or_raise(),
            None if block => block_forever(),
            None => false,
        }
    }

    /// Receive a value, blocking until one is available. The flag is false
    /// when the channel is closed and drained.
    #[track_caller]
    pub fn recv(&self) -> (Value, bool) {
        self.recv_impl(true)
    }

    /// Receive without blocking; yields the invalid value when nothing is
    /// ready.
    #[track_caller]
    pub fn try_recv(&self) -> (Value, bool) {
        self.recv_impl(false)
    }

    #[track_caller]
    fn recv_impl(&self, block: bool) -> (Value, bool) {
        self.must_be("reflect.Value.Recv", Kind::Chan);
        self.must_be_exported("reflect.Value.Recv");
        let t = self.typ();
        if t.chan_dir() == ChanDir::Send {
            ReflectError::ChanDirection { op: "recv", dir: "send-only" }.raise();
        }
        let Some(c) = chan_obj(self) else {
            if block {
                block_forever();
            }
            return (Value::invalid(), false);
        };
        match c.recv(block) {
            Some((w, ok)) => (from_words(t.elem(), &w), ok),
            None => (Value::invalid(), false),
        }
    }

    #[track_caller]
    pub fn close(&self) {
        self.must_be("reflect.Value.Close", Kind::Chan);
        self.must_be_exported("reflect.Value.Close");
        if self.typ().chan_dir() == ChanDir::Recv {
            ReflectError::ChanDirection { op: "close", dir: "recv-only" }.raise();
        }
        match chan_obj(self) {
            Some(c) => c.close().map_err(ReflectError::from).or_raise(),
            None => ReflectError::CloseOfNil.raise(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SelectDir {
    Send = 1,
    Recv,
    Default,
}

/// One case of `select`. An invalid `chan` is never ready.
#[derive(Clone, Copy, Debug)]
pub struct SelectCase {
    pub dir: SelectDir,
    pub chan: Value,
    pub send: Value,
}

impl SelectCase {
    pub fn send(chan: Value, x: Value) -> Self {
        Self { dir: SelectDir::Send, chan, send: x }
    }

    pub fn recv(chan: Value) -> Self {
        Self { dir: SelectDir::Recv, chan, send: Value::invalid() }
    }

    pub fn default_case() -> Self {
        Self { dir: SelectDir::Default, chan: Value::invalid(), send: Value::invalid() }
    }
}

/// Run the select described by `cases`.
///
/// Returns the index of the chosen case and, for a receive, the value
/// received and whether it came from a send. With no default case this
/// blocks until some case can proceed.
#[track_caller]
pub fn select(cases: &[SelectCase]) -> (usize, Value, bool) {
    let mut ops: Vec<CaseOp<'_>> = Vec::with_capacity(cases.len());
    let mut default = None;
    for (i, c) in cases.iter().enumerate() {
        match c.dir {
            SelectDir::Default => {
                if default.is_some() {
                    ReflectError::BadSelect("multiple default cases").raise();
                }
                if c.chan.is_valid() {
                    ReflectError::BadSelect("default case has Chan value").raise();
                }
                if c.send.is_valid() {
                    ReflectError::BadSelect("default case has Send value").raise();
                }
                default = Some(i);
                ops.push(CaseOp::Never);
            }
            SelectDir::Send => {
                if !c.chan.is_valid() {
                    ops.push(CaseOp::Never);
                    continue;
                }
                c.chan.must_be("reflect.Select", Kind::Chan);
                c.chan.must_be_exported("reflect.Select");
                let t = c.chan.typ();
                if t.chan_dir() == ChanDir::Recv {
                    ReflectError::BadSelect("SendDir case using recv-only channel").raise();
                }
                if !c.send.is_valid() {
                    ReflectError::BadSelect("SendDir case missing Send value").raise();
                }
                let words = to_words("reflect.Select", t.elem(), c.send);
                ops.push(chan_obj(&c.chan).map_or(CaseOp::Never, |ch| CaseOp::Send(ch, words)));
            }
            SelectDir::Recv => {
                if c.send.is_valid() {
                    ReflectError::BadSelect("RecvDir case has Send value").raise();
                }
                if !c.chan.is_valid() {
                    ops.push(CaseOp::Never);
                    continue;
                }
                c.chan.must_be("reflect.Select", Kind::Chan);
                c.chan.must_be_exported("reflect.Select");
                if c.chan.typ().chan_dir() == ChanDir::Send {
                    ReflectError::BadSelect("RecvDir case using send-only channel").raise();
                }
                ops.push(chan_obj(&c.chan).map_or(CaseOp::Never, CaseOp::Recv));
            }
        }
    }

    tracing::trace!(target: "vo::chan", cases = cases.len(), has_default = default.is_some(), "select");
    match channel::select(ops, default.is_none()).map_err(ReflectError::from).or_raise() {
        None => (default.unwrap_or_default(), Value::invalid(), false),
        Some(Selected { index, outcome: Outcome::Sent }) => (index, Value::invalid(), false),
        Some(Selected { index, outcome: Outcome::Received(w, ok) }) => {
            (index, from_words(cases[index].chan.typ().elem(), &w), ok)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any::value_of;
    use crate::factory::chan_of;
    use crate::registry::basic;

    fn int_chan(buffer: usize) -> Value {
        make_chan(chan_of(ChanDir::Both, basic(Kind::Int)), buffer)
    }

    #[test]
    fn test_buffered_send_recv_close() {
        let c = int_chan(2);
        c.send(value_of(7isize));
        assert!(c.try_send(value_of(8isize)));
        assert!(!c.try_send(value_of(9isize)));
        assert_eq!((c.len(), c.cap()), (2, 2));
        c.close();
        assert_eq!(c.recv().0.int(), 7);
        assert_eq!(c.recv().0.int(), 8);
        let (v, ok) = c.recv();
        assert!(!ok);
        assert_eq!(v.int(), 0);
    }

    #[test]
    fn test_try_recv_on_empty_and_nil() {
        let (v, ok) = int_chan(0).try_recv();
        assert!(!v.is_valid() && !ok);
        let nil = crate::value::zero(chan_of(ChanDir::Both, basic(Kind::Int)));
        assert!(!nil.try_send(value_of(1isize)));
        assert!(!nil.try_recv().0.is_valid());
    }

    #[test]
    #[should_panic(expected = "send on closed channel")]
    fn test_send_on_closed() {
        let c = int_chan(1);
        c.close();
        c.send(value_of(1isize));
    }

    #[test]
    fn test_select_default_when_nothing_ready() {
        let c = int_chan(0);
        let (i, v, ok) = select(&[SelectCase::recv(c), SelectCase::default_case()]);
        assert_eq!(i, 1);
        assert!(!v.is_valid() && !ok);
    }
}
