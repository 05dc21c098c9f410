//! Channel object and multi-way select.
//!
//! Layout: a native heap object; the channel value is one word holding its
//! address (null = nil channel).
//!
//! Elements are stored as word arrays. Blocked operations park on a
//! `Waiter`; whoever completes a parked operation fires the waiter with the
//! outcome, so a waiter registered on several channels completes exactly once.
//! Channels involved in one select are locked together in address order.

use std::collections::VecDeque;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex, MutexGuard};
use thiserror::Error;

use crate::config;
use crate::gc_types::{scan_words, GcLayout, Trace};
use crate::slot::{slots_for_bytes, Slot};

pub type Words = Box<[Slot]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChanError {
    #[error("send on closed channel")]
    SendOnClosed,
    #[error("close of closed channel")]
    CloseOfClosed,
}

/// How a parked case completed.
enum Completion {
    Sent,
    Received(Words, bool),
    SendClosed,
}

#[derive(Default)]
struct Waiter {
    fired: Mutex<Option<(usize, Completion)>>,
    cond: Condvar,
}

impl Waiter {
    /// Complete `case` unless another case already completed this waiter.
    fn fire(&self, case: usize, completion: Completion) -> bool {
        let mut fired = self.fired.lock();
        if fired.is_some() {
            return false;
        }
        *fired = Some((case, completion));
        self.cond.notify_one();
        true
    }

    fn wait(&self) -> (usize, Completion) {
        let mut fired = self.fired.lock();
        loop {
            if let Some(done) = fired.take() {
                return done;
            }
            self.cond.wait(&mut fired);
        }
    }
}

struct SendWaiter {
    waiter: Arc<Waiter>,
    case: usize,
    value: Words,
}

struct RecvWaiter {
    waiter: Arc<Waiter>,
    case: usize,
}

#[derive(Default)]
struct ChanState {
    buffer: VecDeque<Words>,
    closed: bool,
    waiting_senders: VecDeque<SendWaiter>,
    waiting_receivers: VecDeque<RecvWaiter>,
}

pub struct ChanObject {
    elem: GcLayout,
    cap: usize,
    state: Mutex<ChanState>,
}

/// One case of a select. `Never` stands for a nil channel.
pub enum CaseOp<'a> {
    Send(&'a ChanObject, Words),
    Recv(&'a ChanObject),
    Never,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    /// Received element and whether it came from a send (false once closed).
    Received(Words, bool),
}

#[derive(Debug, PartialEq, Eq)]
pub struct Selected {
    pub index: usize,
    pub outcome: Outcome,
}

static SELECT_RNG: Lazy<Mutex<fastrand::Rng>> = Lazy::new(|| {
    let rng = match config::get().select_seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    Mutex::new(rng)
});

impl ChanObject {
    pub fn new(elem: GcLayout, cap: usize) -> Self {
        Self { elem, cap, state: Mutex::new(ChanState::default()) }
    }

    pub fn elem_layout(&self) -> &GcLayout {
        &self.elem
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn zero(&self) -> Words {
        vec![0; slots_for_bytes(self.elem.size)].into_boxed_slice()
    }

    fn try_send(&self, st: &mut ChanState, value: &Words) -> Result<bool, ChanError> {
        if st.closed {
            return Err(ChanError::SendOnClosed);
        }
        while let Some(r) = st.waiting_receivers.pop_front() {
            if r.waiter.fire(r.case, Completion::Received(value.clone(), true)) {
                return Ok(true);
            }
        }
        if st.buffer.len() < self.cap {
            st.buffer.push_back(value.clone());
            return Ok(true);
        }
        Ok(false)
    }

    fn try_recv(&self, st: &mut ChanState) -> Option<(Words, bool)> {
        if let Some(v) = st.buffer.pop_front() {
            while let Some(s) = st.waiting_senders.pop_front() {
                if s.waiter.fire(s.case, Completion::Sent) {
                    st.buffer.push_back(s.value);
                    break;
                }
            }
            return Some((v, true));
        }
        while let Some(s) = st.waiting_senders.pop_front() {
            if s.waiter.fire(s.case, Completion::Sent) {
                return Some((s.value, true));
            }
        }
        if st.closed {
            return Some((self.zero(), false));
        }
        None
    }

    pub fn send(&self, value: Words, block: bool) -> Result<bool, ChanError> {
        Ok(select(vec![CaseOp::Send(self, value)], block)?.is_some())
    }

    /// Receive one element; `None` when non-blocking and nothing is ready.
    pub fn recv(&self, block: bool) -> Option<(Words, bool)> {
        // A lone receive cannot fail.
        match select(vec![CaseOp::Recv(self)], block) {
            Ok(Some(Selected { outcome: Outcome::Received(v, ok), .. })) => Some((v, ok)),
            _ => None,
        }
    }

    pub fn close(&self) -> Result<(), ChanError> {
        let mut st = self.state.lock();
        if st.closed {
            return Err(ChanError::CloseOfClosed);
        }
        st.closed = true;
        for r in st.waiting_receivers.drain(..) {
            r.waiter.fire(r.case, Completion::Received(self.zero(), false));
        }
        for s in st.waiting_senders.drain(..) {
            s.waiter.fire(s.case, Completion::SendClosed);
        }
        Ok(())
    }
}

impl Trace for ChanObject {
    fn trace(&self, visit: &mut dyn FnMut(usize)) {
        if !self.elem.has_pointers() {
            return;
        }
        let st = self.state.lock();
        for v in &st.buffer {
            scan_words(v, &self.elem, visit);
        }
        for s in &st.waiting_senders {
            scan_words(&s.value, &self.elem, visit);
        }
    }
}

/// Locks of every distinct channel in a select, in address order.
struct LockSet<'a> {
    guards: Vec<(usize, MutexGuard<'a, ChanState>)>,
}

impl<'a> LockSet<'a> {
    fn acquire(cases: &[CaseOp<'a>]) -> Self {
        let mut chans: Vec<&'a ChanObject> = cases
            .iter()
            .filter_map(|c| match c {
                CaseOp::Send(ch, _) | CaseOp::Recv(ch) => Some(*ch),
                CaseOp::Never => None,
            })
            .collect();
        chans.sort_by_key(|c| *c as *const ChanObject as usize);
        chans.dedup_by_key(|c| *c as *const ChanObject as usize);
        let guards = chans.into_iter().map(|c| (c as *const ChanObject as usize, c.state.lock())).collect();
        Self { guards }
    }

    fn state(&mut self, ch: &ChanObject) -> &mut ChanState {
        let addr = ch as *const ChanObject as usize;
        match self.guards.binary_search_by_key(&addr, |(a, _)| *a) {
            Ok(i) => &mut self.guards[i].1,
            Err(_) => unreachable!("channel not locked by this select"),
        }
    }
}

/// Run a select over `cases`.
///
/// Ready cases are polled in a uniformly shuffled order. Returns `Ok(None)`
/// when nothing is ready and `block` is false. Blocks forever if every case
/// is `Never`.
pub fn select(cases: Vec<CaseOp<'_>>, block: bool) -> Result<Option<Selected>, ChanError> {
    let mut order: Vec<usize> = (0..cases.len()).collect();
    SELECT_RNG.lock().shuffle(&mut order);

    let waiter = {
        let mut locks = LockSet::acquire(&cases);
        for &i in &order {
            match &cases[i] {
                CaseOp::Send(ch, value) => {
                    if ch.try_send(locks.state(ch), value)? {
                        return Ok(Some(Selected { index: i, outcome: Outcome::Sent }));
                    }
                }
                CaseOp::Recv(ch) => {
                    if let Some((v, ok)) = ch.try_recv(locks.state(ch)) {
                        return Ok(Some(Selected { index: i, outcome: Outcome::Received(v, ok) }));
                    }
                }
                CaseOp::Never => {}
            }
        }
        if !block {
            return Ok(None);
        }

        let waiter = Arc::new(Waiter::default());
        for &i in &order {
            match &cases[i] {
                CaseOp::Send(ch, value) => locks.state(ch).waiting_senders.push_back(SendWaiter {
                    waiter: waiter.clone(),
                    case: i,
                    value: value.clone(),
                }),
                CaseOp::Recv(ch) => locks
                    .state(ch)
                    .waiting_receivers
                    .push_back(RecvWaiter { waiter: waiter.clone(), case: i }),
                CaseOp::Never => {}
            }
        }
        waiter
    };

    tracing::trace!(target: "vo::chan", cases = cases.len(), "select parked");
    let (index, completion) = waiter.wait();
    tracing::trace!(target: "vo::chan", index, "select woken");

    {
        let mut locks = LockSet::acquire(&cases);
        for case in &cases {
            if let CaseOp::Send(ch, _) | CaseOp::Recv(ch) = case {
                let st = locks.state(ch);
                st.waiting_senders.retain(|s| !Arc::ptr_eq(&s.waiter, &waiter));
                st.waiting_receivers.retain(|r| !Arc::ptr_eq(&r.waiter, &waiter));
            }
        }
    }

    let outcome = match completion {
        Completion::Sent => Outcome::Sent,
        Completion::Received(v, ok) => Outcome::Received(v, ok),
        Completion::SendClosed => return Err(ChanError::SendOnClosed),
    };
    Ok(Some(Selected { index, outcome }))
}
