//! # vo-runtime
//!
//! Managed memory and runtime objects shared by the Vo reflection engine.
//!
//! - `gc` - mark-sweep heap with per-block pointer maps
//! - `gc_types` - pointer layouts and object scanning
//! - `gc_global` - the process-wide heap instance
//! - `objects` - string, slice, interface, map and channel representations
//! - `config` - runtime tunables

pub mod config;
pub mod gc;
pub mod gc_global;
pub mod gc_types;
pub mod objects;
pub mod slot;

pub use gc::{Gc, GcRef, GcStats};
pub use gc_global::with_gc;
pub use gc_types::{GcLayout, LayoutBuilder, Trace};
