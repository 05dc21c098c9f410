//! Type classification shared by the runtime and the reflection engine.

use core::fmt;
use num_enum::TryFromPrimitive;

/// Size in bytes of a machine word / pointer.
pub const PTR_SIZE: usize = 8;

/// Round `n` up to a multiple of `align` (a power of two).
#[inline]
pub const fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

/// Kind - the coarse storage/structural category of a type.
///
/// Unlike a full type descriptor which carries names, fields and methods,
/// `Kind` is a flat tag used to pick layouts, conversions and accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive)]
#[repr(u8)]
pub enum Kind {
    Invalid = 0,
    Bool = 1,
    Int = 2,
    Int8 = 3,
    Int16 = 4,
    Int32 = 5,
    Int64 = 6,
    Uint = 7,
    Uint8 = 8,
    Uint16 = 9,
    Uint32 = 10,
    Uint64 = 11,
    Uintptr = 12,
    Float32 = 13,
    Float64 = 14,
    Complex64 = 15,
    Complex128 = 16,
    Array = 17,
    Chan = 18,
    Func = 19,
    Interface = 20,
    Map = 21,
    Ptr = 22,
    Slice = 23,
    String = 24,
    Struct = 25,
    UnsafePointer = 26,
}

impl Kind {
    #[inline]
    pub fn from_u8(v: u8) -> Self {
        Self::try_from(v).unwrap_or(Kind::Invalid)
    }

    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::Int | Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_unsigned_int(&self) -> bool {
        matches!(
            self,
            Self::Uint | Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64 | Self::Uintptr
        )
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    /// Kinds that have no structural payload and a fixed layout.
    pub fn is_basic(&self) -> bool {
        matches!(self, Self::Bool | Self::String | Self::UnsafePointer) || self.is_numeric()
    }

    /// Kinds whose whole representation is a single pointer word.
    pub fn is_pointer_shaped(&self) -> bool {
        matches!(self, Self::Ptr | Self::Map | Self::Chan | Self::Func | Self::UnsafePointer)
    }

    /// Size and alignment of the basic kinds, `None` for composite kinds.
    pub fn basic_layout(&self) -> Option<(usize, usize)> {
        Some(match self {
            Self::Bool | Self::Int8 | Self::Uint8 => (1, 1),
            Self::Int16 | Self::Uint16 => (2, 2),
            Self::Int32 | Self::Uint32 | Self::Float32 => (4, 4),
            Self::Int | Self::Int64 | Self::Uint | Self::Uint64 | Self::Uintptr | Self::Float64 => (8, 8),
            Self::Complex64 => (8, 4),
            Self::Complex128 => (16, 8),
            Self::String => (2 * PTR_SIZE, PTR_SIZE),
            Self::UnsafePointer => (PTR_SIZE, PTR_SIZE),
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Uintptr => "uintptr",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
            Self::Array => "array",
            Self::Chan => "chan",
            Self::Func => "func",
            Self::Interface => "interface",
            Self::Map => "map",
            Self::Ptr => "ptr",
            Self::Slice => "slice",
            Self::String => "string",
            Self::Struct => "struct",
            Self::UnsafePointer => "unsafe.Pointer",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum ChanDir {
    Recv = 1,
    Send = 2,
    Both = 3,
}

impl ChanDir {
    #[inline]
    pub fn can_send(&self) -> bool {
        (*self as u8) & (ChanDir::Send as u8) != 0
    }

    #[inline]
    pub fn can_recv(&self) -> bool {
        (*self as u8) & (ChanDir::Recv as u8) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip_u8() {
        assert_eq!(Kind::from_u8(Kind::Struct as u8), Kind::Struct);
        assert_eq!(Kind::from_u8(200), Kind::Invalid);
    }

    #[test]
    fn test_basic_layout() {
        assert_eq!(Kind::Complex64.basic_layout(), Some((8, 4)));
        assert_eq!(Kind::String.basic_layout(), Some((16, 8)));
        assert_eq!(Kind::Struct.basic_layout(), None);
        assert!(Kind::Uintptr.is_unsigned_int());
        assert!(!Kind::Float32.is_integer());
    }

    #[test]
    fn test_chan_dir() {
        assert!(ChanDir::Both.can_send() && ChanDir::Both.can_recv());
        assert!(!ChanDir::Recv.can_send());
        assert!(!ChanDir::Send.can_recv());
        assert_eq!(align_up(9, 8), 16);
        assert_eq!(align_up(0, 4), 0);
    }
}
