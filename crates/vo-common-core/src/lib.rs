//! # vo-common-core
//!
//! Core types for Vo that are `no_std` compatible.
//!
//! This crate provides the vocabulary shared by the runtime heap and the
//! reflection engine:
//! - `Kind` - storage/structural category of a type
//! - `ChanDir` - channel direction
//! - word-size constants used by every layout computation

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(target_pointer_width = "64"))]
compile_error!("vo layouts assume 64-bit words");

pub mod types;

pub use types::{align_up, ChanDir, Kind, PTR_SIZE};
