//! Mark-sweep collector over a heap of raw blocks and native objects.
//!
//! Raw blocks are zeroed allocations described by a `GcLayout` repeated
//! `count` times. Native objects are boxed Rust values implementing
//! `Trace`; their address is the `GcRef` handed to callers.
//!
//! Blocks are indexed by base address so interior pointers (struct fields,
//! slice elements) keep their whole block alive.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::BTreeMap;

use crate::config;
use crate::gc_types::{scan_block, GcLayout, Trace};

pub type GcRef = *mut u8;

/// Shared address of every zero-sized allocation.
static ZERO_BASE: u64 = 0;

/// Address returned for zero-sized allocations. Never written.
#[inline]
pub fn zero_base() -> GcRef {
    &ZERO_BASE as *const u64 as GcRef
}

enum ObjKind {
    Raw { layout: GcLayout, count: usize },
    Native(*mut dyn Trace),
}

struct ObjInfo {
    size: usize,
    align: usize,
    kind: ObjKind,
    marked: bool,
    pins: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub objects: usize,
    pub bytes: usize,
    pub freed_objects: usize,
    pub freed_bytes: usize,
}

pub struct Gc {
    objects: BTreeMap<usize, ObjInfo>,
    live_bytes: usize,
    since_collect: usize,
    threshold: usize,
    gray: Vec<usize>,
}

impl Default for Gc {
    fn default() -> Self {
        Self::new()
    }
}

impl Gc {
    pub fn new() -> Self {
        Self::with_threshold(config::get().gc_threshold_bytes)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            objects: BTreeMap::new(),
            live_bytes: 0,
            since_collect: 0,
            threshold,
            gray: Vec::new(),
        }
    }

    /// Allocate `count` zeroed elements of `layout`.
    pub fn alloc(&mut self, layout: &GcLayout, count: usize) -> GcRef {
        let size = layout.size * count;
        if size == 0 {
            return zero_base();
        }
        let align = layout.align.max(1);
        let ptr = match Layout::from_size_align(size, align) {
            // SAFETY: size is non-zero.
            Ok(l) => unsafe { alloc_zeroed(l) },
            Err(_) => panic!("gc: invalid allocation of {size} bytes aligned to {align}"),
        };
        if ptr.is_null() {
            std::alloc::handle_alloc_error(Layout::from_size_align(size, align).unwrap_or(Layout::new::<u8>()));
        }
        let kind = ObjKind::Raw { layout: layout.clone(), count };
        self.track(ptr, size, align, kind);
        ptr
    }

    /// Allocate a pointer-free block of `size` bytes.
    pub fn alloc_bytes(&mut self, size: usize) -> GcRef {
        self.alloc(&GcLayout::scalar(size, 1), 1)
    }

    /// Move a native object onto the heap.
    pub fn alloc_native<T: Trace>(&mut self, obj: T) -> GcRef {
        let size = core::mem::size_of::<T>().max(1);
        let align = core::mem::align_of::<T>();
        let raw: *mut T = Box::into_raw(Box::new(obj));
        let dyn_ptr: *mut dyn Trace = raw;
        self.track(raw as GcRef, size, align, ObjKind::Native(dyn_ptr));
        raw as GcRef
    }

    fn track(&mut self, ptr: GcRef, size: usize, align: usize, kind: ObjKind) {
        self.live_bytes += size;
        self.since_collect += size;
        self.objects.insert(ptr as usize, ObjInfo { size, align, kind, marked: false, pins: 0 });
    }

    /// Borrow the native object behind `obj`.
    ///
    /// # Safety
    /// `obj` must have been returned by `alloc_native::<T>` and still be live.
    #[inline]
    pub unsafe fn native<'a, T: Trace>(obj: GcRef) -> &'a T {
        &*(obj as *const T)
    }

    /// Base address of the block containing `addr`.
    pub fn find_base(&self, addr: usize) -> Option<usize> {
        let (&base, info) = self.objects.range(..=addr).next_back()?;
        (addr < base + info.size).then_some(base)
    }

    pub fn contains(&self, addr: usize) -> bool {
        self.find_base(addr).is_some()
    }

    /// Keep the block containing `addr` alive until a matching `unpin`.
    pub fn pin(&mut self, addr: usize) {
        if let Some(base) = self.find_base(addr) {
            if let Some(info) = self.objects.get_mut(&base) {
                info.pins += 1;
            }
        }
    }

    pub fn unpin(&mut self, addr: usize) {
        if let Some(base) = self.find_base(addr) {
            if let Some(info) = self.objects.get_mut(&base) {
                info.pins = info.pins.saturating_sub(1);
            }
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// Whether `threshold` bytes were allocated since the last collection.
    pub fn should_collect(&self) -> bool {
        self.since_collect >= self.threshold
    }

    /// Collect only when `should_collect` reports true.
    ///
    /// # Safety
    /// Same contract as `collect`.
    pub unsafe fn collect_if_due(&mut self, roots: &[usize]) -> Option<GcStats> {
        self.should_collect().then(|| self.collect(roots))
    }

    fn mark_gray(&mut self, addr: usize) {
        if let Some(base) = self.find_base(addr) {
            if let Some(info) = self.objects.get_mut(&base) {
                if !info.marked {
                    info.marked = true;
                    self.gray.push(base);
                }
            }
        } else {
            #[cfg(feature = "gc-debug")]
            tracing::warn!(target: "vo::gc", addr = format_args!("{addr:#x}"), "traced word is not a live object");
        }
    }

    /// Collect every block unreachable from `roots` and pinned blocks.
    ///
    /// # Safety
    /// No other thread may touch heap memory during the call, and every
    /// block still in use must be reachable from `roots` or pinned.
    pub unsafe fn collect(&mut self, roots: &[usize]) -> GcStats {
        let before = (self.objects.len(), self.live_bytes);
        let pinned: Vec<usize> = self.objects.iter().filter(|(_, i)| i.pins > 0).map(|(&b, _)| b).collect();
        for addr in roots.iter().copied().chain(pinned) {
            self.mark_gray(addr);
        }

        let mut children = Vec::new();
        while let Some(base) = self.gray.pop() {
            if let Some(info) = self.objects.get(&base) {
                let mut visit = |p: usize| children.push(p);
                match &info.kind {
                    ObjKind::Raw { layout, count } => scan_block(base as *const u8, layout, *count, &mut visit),
                    ObjKind::Native(obj) => (**obj).trace(&mut visit),
                }
            }
            for child in children.drain(..) {
                self.mark_gray(child);
            }
        }

        let dead: Vec<usize> = self.objects.iter().filter(|(_, i)| !i.marked).map(|(&b, _)| b).collect();
        let mut stats = GcStats::default();
        for base in dead {
            if let Some(info) = self.objects.remove(&base) {
                stats.freed_objects += 1;
                stats.freed_bytes += info.size;
                self.live_bytes -= info.size;
                free_object(base, info);
            }
        }
        for info in self.objects.values_mut() {
            info.marked = false;
        }
        self.since_collect = 0;
        stats.objects = self.objects.len();
        stats.bytes = self.live_bytes;
        tracing::debug!(
            target: "vo::gc",
            objects_before = before.0,
            bytes_before = before.1,
            objects_after = stats.objects,
            bytes_after = stats.bytes,
            freed = stats.freed_objects,
            "collection finished"
        );
        stats
    }
}

/// Finalize and release one block.
unsafe fn free_object(base: usize, info: ObjInfo) {
    match info.kind {
        ObjKind::Raw { .. } => {
            if let Ok(l) = Layout::from_size_align(info.size, info.align) {
                dealloc(base as *mut u8, l);
            }
        }
        ObjKind::Native(obj) => drop(Box::from_raw(obj)),
    }
}

impl Drop for Gc {
    fn drop(&mut self) {
        for (base, info) in core::mem::take(&mut self.objects) {
            // SAFETY: the heap is going away with all of its blocks.
            unsafe { free_object(base, info) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc_types::LayoutBuilder;
    use pretty_assertions::assert_eq;
    use crate::slot::write_slot;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Holder {
        refs: Mutex<Vec<usize>>,
        dropped: Arc<Mutex<bool>>,
    }

    impl Trace for Holder {
        fn trace(&self, visit: &mut dyn FnMut(usize)) {
            for &r in self.refs.lock().iter() {
                visit(r);
            }
        }
    }

    impl Drop for Holder {
        fn drop(&mut self) {
            *self.dropped.lock() = true;
        }
    }

    fn ptr_layout() -> GcLayout {
        let mut b = LayoutBuilder::new();
        b.set_ptr(0);
        b.finish(16, 8)
    }

    #[test]
    fn test_alloc_zeroed_and_find_interior() {
        let mut gc = Gc::with_threshold(1 << 20);
        let p = gc.alloc(&GcLayout::scalar(8, 8), 4);
        let bytes = unsafe { core::slice::from_raw_parts(p, 32) };
        assert!(bytes.iter().all(|&b| b == 0));
        assert_eq!(gc.find_base(p as usize + 17), Some(p as usize));
        assert_eq!(gc.find_base(p as usize + 32), None);
        assert_eq!(gc.alloc(&GcLayout::scalar(0, 1), 10), zero_base());
    }

    #[test]
    fn test_collect_keeps_reachable_chain() {
        let mut gc = Gc::with_threshold(1 << 20);
        let leaf = gc.alloc_bytes(24);
        let node = gc.alloc(&ptr_layout(), 1);
        unsafe { write_slot(node, 0, leaf as u64 + 8) };
        let garbage = gc.alloc(&ptr_layout(), 2);
        unsafe { write_slot(garbage, 2, node as u64) };
        assert_eq!(gc.object_count(), 3);

        let stats = unsafe { gc.collect(&[node as usize]) };
        assert_eq!(stats.freed_objects, 1);
        assert_eq!(stats.objects, 2);
        assert!(gc.contains(leaf as usize));
        assert!(!gc.contains(garbage as usize));
    }

    #[test]
    fn test_native_objects_are_traced_and_finalized() {
        let mut gc = Gc::with_threshold(1 << 20);
        let leaf = gc.alloc_bytes(8);
        let dropped = Arc::new(Mutex::new(false));
        let holder = gc.alloc_native(Holder { refs: Mutex::new(vec![leaf as usize]), dropped: dropped.clone() });

        unsafe { gc.collect(&[holder as usize]) };
        assert!(gc.contains(leaf as usize));
        assert!(!*dropped.lock());

        unsafe { gc.collect(&[]) };
        assert!(*dropped.lock());
        assert_eq!(gc.object_count(), 0);
    }

    #[test]
    fn test_pinned_blocks_survive() {
        let mut gc = Gc::with_threshold(64);
        let p = gc.alloc_bytes(100);
        assert!(gc.should_collect());
        gc.pin(p as usize + 3);
        unsafe { gc.collect(&[]) };
        assert!(gc.contains(p as usize));
        gc.unpin(p as usize);
        unsafe { gc.collect(&[]) };
        assert!(!gc.contains(p as usize));
        assert_eq!(gc.live_bytes(), 0);
    }

    #[test]
    fn test_collect_if_due_follows_threshold() {
        let mut gc = Gc::with_threshold(256);
        let kept = gc.alloc_bytes(100);
        assert_eq!(unsafe { gc.collect_if_due(&[kept as usize]) }, None);
        gc.alloc_bytes(200);
        let stats = unsafe { gc.collect_if_due(&[kept as usize]) };
        assert_eq!(stats.map(|s| (s.objects, s.freed_objects)), Some((1, 1)));
        assert!(!gc.should_collect());
        assert_eq!(unsafe { gc.collect_if_due(&[]) }, None);
    }
}
