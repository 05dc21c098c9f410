//! String representation.
//!
//! Layout: StringHeader { data, len } inline in the owning value; the bytes
//! live in an immutable pointer-free heap block. The empty string has a
//! null data pointer.

use crate::gc::Gc;
use crate::gc_types::{GcLayout, LayoutBuilder};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringHeader {
    pub data: *const u8,
    pub len: usize,
}

const _: () = assert!(core::mem::size_of::<StringHeader>() == 16);

impl StringHeader {
    pub const EMPTY: StringHeader = StringHeader { data: core::ptr::null(), len: 0 };
}

/// Pointer map of a string header.
pub fn layout() -> GcLayout {
    let mut b = LayoutBuilder::new();
    b.set_ptr(0);
    b.finish(16, 8)
}

/// Copy `bytes` into the heap.
pub fn create(gc: &mut Gc, bytes: &[u8]) -> StringHeader {
    if bytes.is_empty() {
        return StringHeader::EMPTY;
    }
    let data = gc.alloc_bytes(bytes.len());
    // SAFETY: freshly allocated block of exactly bytes.len() bytes.
    unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), data, bytes.len()) };
    StringHeader { data, len: bytes.len() }
}

/// Borrow the bytes of a string.
///
/// # Safety
/// The header must describe a live string block.
pub unsafe fn as_bytes<'a>(h: StringHeader) -> &'a [u8] {
    if h.len == 0 {
        &[]
    } else {
        core::slice::from_raw_parts(h.data, h.len)
    }
}

/// # Safety
/// `p` must address a string header.
#[inline]
pub unsafe fn read(p: *const u8) -> StringHeader {
    *(p as *const StringHeader)
}

/// # Safety
/// `p` must address writable string header storage.
#[inline]
pub unsafe fn write(p: *mut u8, h: StringHeader) {
    *(p as *mut StringHeader) = h;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_read_back() {
        let mut gc = Gc::with_threshold(1 << 20);
        let h = create(&mut gc, "héllo".as_bytes());
        assert_eq!(h.len, 6);
        assert_eq!(unsafe { as_bytes(h) }, "héllo".as_bytes());
        assert_eq!(create(&mut gc, b""), StringHeader::EMPTY);
        assert_eq!(gc.object_count(), 1);
    }
}
