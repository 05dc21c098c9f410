//! Runtime object representations.

pub mod channel;
pub mod interface;
pub mod map;
pub mod slice;
pub mod string;
