//! Process-wide heap.
//!
//! Every value the reflection engine creates lives in this heap. All
//! access goes through the mutex; callers must not re-enter `with_gc`
//! from inside the closure.

use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};

use crate::gc::{Gc, GcRef, GcStats};
use crate::gc_types::GcLayout;

/// SAFETY: Gc holds raw pointers to heap blocks; the mutex serializes all
/// access to the bookkeeping, and block contents follow the host's rules.
struct SyncGc(Mutex<Gc>);
unsafe impl Send for SyncGc {}
unsafe impl Sync for SyncGc {}

impl SyncGc {
    fn lock(&self) -> MutexGuard<'_, Gc> {
        self.0.lock()
    }
}

static GLOBAL_GC: Lazy<SyncGc> = Lazy::new(|| SyncGc(Mutex::new(Gc::new())));

/// Run `f` with exclusive access to the global heap.
pub fn with_gc<R>(f: impl FnOnce(&mut Gc) -> R) -> R {
    f(&mut GLOBAL_GC.lock())
}

/// Allocate `count` zeroed elements in the global heap.
pub fn alloc(layout: &GcLayout, count: usize) -> GcRef {
    with_gc(|gc| gc.alloc(layout, count))
}

pub fn pin(addr: usize) {
    with_gc(|gc| gc.pin(addr))
}

pub fn unpin(addr: usize) {
    with_gc(|gc| gc.unpin(addr))
}

/// Collect the global heap.
///
/// # Safety
/// See `Gc::collect`: the world must be stopped and `roots` complete.
pub unsafe fn collect(roots: &[usize]) -> GcStats {
    let mut gc = GLOBAL_GC.lock();
    gc.collect(roots)
}

/// Collect the global heap once `RuntimeConfig::gc_threshold_bytes` have
/// been allocated since the last collection.
///
/// # Safety
/// Same contract as `collect`.
pub unsafe fn collect_if_due(roots: &[usize]) -> Option<GcStats> {
    let mut gc = GLOBAL_GC.lock();
    gc.collect_if_due(roots)
}
