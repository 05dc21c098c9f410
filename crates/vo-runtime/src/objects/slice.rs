//! Slice representation.
//!
//! Layout: SliceHeader { data, len, cap } inline in the owning value; the
//! backing array is a heap block of `cap` elements sharing the element's
//! pointer map.

use crate::gc::{Gc, GcRef};
use crate::gc_types::{GcLayout, LayoutBuilder};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceHeader {
    pub data: GcRef,
    pub len: usize,
    pub cap: usize,
}

const _: () = assert!(core::mem::size_of::<SliceHeader>() == 24);

impl SliceHeader {
    pub const NIL: SliceHeader = SliceHeader { data: core::ptr::null_mut(), len: 0, cap: 0 };

    #[inline]
    pub fn is_nil(&self) -> bool {
        self.data.is_null()
    }
}

/// Pointer map of a slice header.
pub fn layout() -> GcLayout {
    let mut b = LayoutBuilder::new();
    b.set_ptr(0);
    b.finish(24, 8)
}

/// Create a slice with a fresh zeroed backing array.
pub fn create(gc: &mut Gc, elem: &GcLayout, len: usize, cap: usize) -> SliceHeader {
    debug_assert!(len <= cap);
    let data = gc.alloc(elem, cap);
    SliceHeader { data, len, cap }
}

/// Capacity for a slice of `old_cap` that must hold `needed` elements.
///
/// Doubles small slices and grows large ones by a quarter.
pub fn grow_cap(old_cap: usize, needed: usize) -> usize {
    let mut cap = old_cap;
    let doubled = cap.saturating_mul(2);
    if needed > doubled {
        return needed;
    }
    const THRESHOLD: usize = 256;
    if cap < THRESHOLD {
        return doubled.max(needed);
    }
    while cap < needed {
        cap += (cap + 3 * THRESHOLD) / 4;
    }
    cap
}

/// # Safety
/// `p` must address a slice header.
#[inline]
pub unsafe fn read(p: *const u8) -> SliceHeader {
    *(p as *const SliceHeader)
}

/// # Safety
/// `p` must address writable slice header storage.
#[inline]
pub unsafe fn write(p: *mut u8, h: SliceHeader) {
    *(p as *mut SliceHeader) = h;
}
