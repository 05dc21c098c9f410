//! Pointer layouts and object scanning.
//!
//! Every raw heap block carries the `GcLayout` of its element type: a bitmap
//! with one bit per word of the element's pointer-bearing prefix. Native
//! objects (maps, channels, functions) describe their references through
//! `Trace` instead.

use std::sync::Arc;

use crate::slot::{read_slot, Slot, SLOT_BYTES};

/// Size, alignment and pointer map of one element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcLayout {
    pub size: usize,
    pub align: usize,
    /// Length in bytes of the prefix that may hold pointers.
    pub ptrdata: usize,
    /// Bit `w` set means word `w` holds a heap pointer.
    pub bitmap: Arc<[u8]>,
}

impl GcLayout {
    /// A layout with no pointer words.
    pub fn scalar(size: usize, align: usize) -> Self {
        Self { size, align: align.max(1), ptrdata: 0, bitmap: Arc::from(Vec::new()) }
    }

    /// A single pointer word.
    pub fn pointer() -> Self {
        let mut b = LayoutBuilder::new();
        b.set_ptr(0);
        b.finish(SLOT_BYTES, SLOT_BYTES)
    }

    #[inline]
    pub fn has_pointers(&self) -> bool {
        self.ptrdata != 0
    }

    /// Number of words covered by the pointer map.
    #[inline]
    pub fn ptr_words(&self) -> usize {
        self.ptrdata / SLOT_BYTES
    }

    #[inline]
    pub fn is_ptr_word(&self, word: usize) -> bool {
        self.bitmap.get(word / 8).map_or(false, |b| b & (1 << (word % 8)) != 0)
    }

    /// Word indices holding pointers.
    pub fn pointer_words(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.ptr_words()).filter(move |&w| self.is_ptr_word(w))
    }

    /// Layout of `count` consecutive elements of `self`.
    pub fn repeat(&self, count: usize) -> GcLayout {
        let size = self.size * count;
        if !self.has_pointers() || count == 0 {
            return GcLayout::scalar(size, self.align);
        }
        let mut b = LayoutBuilder::new();
        b.copy_at(0, self, count);
        b.finish(size, self.align)
    }
}

/// Incremental construction of a pointer bitmap.
#[derive(Default)]
pub struct LayoutBuilder {
    bits: Vec<u8>,
    words: usize,
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ptr(&mut self, word: usize) {
        if self.bits.len() <= word / 8 {
            self.bits.resize(word / 8 + 1, 0);
        }
        self.bits[word / 8] |= 1 << (word % 8);
        self.words = self.words.max(word + 1);
    }

    /// Copy `count` repetitions of `elem`'s map starting at byte `offset`.
    pub fn copy_at(&mut self, offset: usize, elem: &GcLayout, count: usize) {
        if !elem.has_pointers() {
            return;
        }
        debug_assert!(offset % SLOT_BYTES == 0);
        for i in 0..count {
            let base = (offset + i * elem.size) / SLOT_BYTES;
            for w in elem.pointer_words() {
                self.set_ptr(base + w);
            }
        }
    }

    pub fn finish(self, size: usize, align: usize) -> GcLayout {
        GcLayout {
            size,
            align: align.max(1),
            ptrdata: self.words * SLOT_BYTES,
            bitmap: Arc::from(self.bits),
        }
    }
}

/// Reference reporting for native heap objects.
pub trait Trace: Send + Sync + 'static {
    /// Report every word that may address a heap object.
    fn trace(&self, visit: &mut dyn FnMut(usize));
}

/// Visit the pointer words of `count` elements laid out at `base`.
///
/// # Safety
/// `base` must address `count * layout.size` readable, 8-byte aligned bytes.
pub unsafe fn scan_block(base: *const u8, layout: &GcLayout, count: usize, visit: &mut dyn FnMut(usize)) {
    if !layout.has_pointers() {
        return;
    }
    for i in 0..count {
        let elem = base.add(i * layout.size);
        for w in layout.pointer_words() {
            let child = read_slot(elem, w);
            if child != 0 {
                visit(child as usize);
            }
        }
    }
}

/// Visit the pointer words of one element stored as a word array.
pub fn scan_words(words: &[Slot], layout: &GcLayout, visit: &mut dyn FnMut(usize)) {
    for w in layout.pointer_words() {
        if let Some(&child) = words.get(w) {
            if child != 0 {
                visit(child as usize);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_ptrdata_to_last_pointer() {
        let mut b = LayoutBuilder::new();
        b.set_ptr(0);
        b.set_ptr(3);
        let l = b.finish(48, 8);
        assert_eq!(l.ptrdata, 32);
        let words: Vec<usize> = l.pointer_words().collect();
        assert_eq!(words, vec![0, 3]);
    }

    #[test]
    fn test_repeat_array_of_strings() {
        // string = {data, len}
        let mut b = LayoutBuilder::new();
        b.set_ptr(0);
        let s = b.finish(16, 8);
        let arr = s.repeat(3);
        assert_eq!(arr.size, 48);
        assert_eq!(arr.ptrdata, 40);
        assert_eq!(arr.pointer_words().collect::<Vec<_>>(), vec![0, 2, 4]);
    }

    #[test]
    fn test_scan_words() {
        let l = GcLayout::pointer();
        let mut seen = Vec::new();
        scan_words(&[0x1000], &l, &mut |p| seen.push(p));
        scan_words(&[0], &l, &mut |p| seen.push(p));
        assert_eq!(seen, vec![0x1000]);
    }
}
