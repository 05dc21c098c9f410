//! Interface representation.
//!
//! Layout: IfaceWords { typ, data }. `typ` is the address of a static type
//! descriptor (never a heap block); `data` points to an immutable boxed copy
//! of the dynamic value. A nil interface has a null `typ`.

use crate::gc_types::{GcLayout, LayoutBuilder};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfaceWords {
    pub typ: *const u8,
    pub data: *mut u8,
}

const _: () = assert!(core::mem::size_of::<IfaceWords>() == 16);

impl IfaceWords {
    pub const NIL: IfaceWords = IfaceWords { typ: core::ptr::null(), data: core::ptr::null_mut() };

    #[inline]
    pub fn is_nil(&self) -> bool {
        self.typ.is_null()
    }
}

/// Pointer map of an interface value: only the data word is a heap pointer.
pub fn layout() -> GcLayout {
    let mut b = LayoutBuilder::new();
    b.set_ptr(1);
    b.finish(16, 8)
}

/// # Safety
/// `p` must address interface storage.
#[inline]
pub unsafe fn read(p: *const u8) -> IfaceWords {
    *(p as *const IfaceWords)
}

/// # Safety
/// `p` must address writable interface storage.
#[inline]
pub unsafe fn write(p: *mut u8, w: IfaceWords) {
    *(p as *mut IfaceWords) = w;
}
