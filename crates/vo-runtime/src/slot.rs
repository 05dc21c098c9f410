//! Word-level access to heap memory.
//!
//! Values stored outside the raw heap (map entries, channel buffers) are
//! kept as `Box<[u64]>` word arrays so every element is 8-byte aligned.

use vo_common_core::PTR_SIZE;

pub type Slot = u64;
pub const SLOT_BYTES: usize = PTR_SIZE;

/// Number of words needed to hold `bytes` bytes.
#[inline]
pub const fn slots_for_bytes(bytes: usize) -> usize {
    (bytes + SLOT_BYTES - 1) / SLOT_BYTES
}

/// Copy `size` bytes at `src` into a fresh word array.
///
/// # Safety
/// `src` must be valid for reads of `size` bytes.
pub unsafe fn words_from(src: *const u8, size: usize) -> Box<[Slot]> {
    let mut words = vec![0 as Slot; slots_for_bytes(size)].into_boxed_slice();
    if size > 0 {
        core::ptr::copy_nonoverlapping(src, words.as_mut_ptr() as *mut u8, size);
    }
    words
}

/// Copy the first `size` bytes of `words` to `dst`.
///
/// # Safety
/// `dst` must be valid for writes of `size` bytes.
pub unsafe fn words_into(words: &[Slot], dst: *mut u8, size: usize) {
    debug_assert!(words.len() * SLOT_BYTES >= size);
    if size > 0 {
        core::ptr::copy_nonoverlapping(words.as_ptr() as *const u8, dst, size);
    }
}

/// Read the `idx`th word of the block at `base`.
///
/// # Safety
/// The word must lie inside a live, 8-byte aligned block.
#[inline]
pub unsafe fn read_slot(base: *const u8, idx: usize) -> Slot {
    *(base.add(idx * SLOT_BYTES) as *const Slot)
}

#[inline]
pub unsafe fn write_slot(base: *mut u8, idx: usize, val: Slot) {
    *(base.add(idx * SLOT_BYTES) as *mut Slot) = val;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_roundtrip_partial_word() {
        let src = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
        let words = unsafe { words_from(src.as_ptr(), src.len()) };
        assert_eq!(words.len(), 2);
        let mut out = [0u8; 11];
        unsafe { words_into(&words, out.as_mut_ptr(), out.len()) };
        assert_eq!(out, src);
    }
}
