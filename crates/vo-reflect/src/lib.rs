//! # vo-reflect
//!
//! Runtime type introspection and dynamic invocation for Vo values.
//!
//! - `registry` - canonical type descriptors and the identity cache
//! - `value` - typed views of managed memory with access flags
//! - `convert` - assignability and conversion rules
//! - `resolve` - field and method promotion through embedding
//! - `abi` / `func` - call frames, `Call`, `MakeFunc` and method values
//! - `factory` / `typedef` - synthesized composite and named types
//! - `chan` - channel operations and `select`
//! - `deepequal` - cycle-safe structural equality

mod abi;
mod alg;
mod any;
mod chan;
mod convert;
mod deepequal;
mod error;
mod factory;
mod func;
mod map_ops;
mod registry;
mod resolve;
mod rtype;
mod slice_ops;
mod tag;
mod typedef;
mod value;

pub use vo_common_core::{ChanDir, Kind};

pub use abi::{ArgSlot, CallConv, Frame, FrameLayout, StackAbi};
pub use any::{type_of, value_of, Any, Native, C128, C64};
pub use chan::{make_chan, select, SelectCase, SelectDir};
pub use deepequal::deep_equal;
pub use error::{ReflectError, Result};
pub use factory::{
    array_of, chan_of, func_of, map_of, slice_of, struct_of, try_array_of, try_chan_of, try_func_of, try_map_of,
    try_struct_of,
};
pub use func::{func_value, make_func, Code};
pub use map_ops::{make_map, make_map_with_size, MapIter};
pub use registry::{basic, empty_interface, error_type, interface_of, ptr_to, try_interface_of};
pub use resolve::Method;
pub use rtype::{StructField, Type};
pub use slice_ops::{append, append_slice, copy, make_slice, swapper};
pub use tag::StructTag;
pub use typedef::{declare, TypeDef};
pub use value::{indirect, new, new_at, zero, Value};

/// Collect the managed heap, keeping everything reachable from `roots`.
///
/// Returns the collector's statistics.
///
/// # Safety
/// No other thread may use managed memory during the call, and every value
/// still in use must be reachable from `roots` (or be pinned by an ongoing
/// call). Values not reachable are freed and must not be touched again.
pub unsafe fn collect_garbage(roots: &[Value]) -> vo_runtime::GcStats {
    vo_runtime::gc_global::collect(&root_addrs(roots))
}

/// Like `collect_garbage`, but only once the configured allocation volume
/// (`RuntimeConfig::gc_threshold_bytes`) has been reached since the last
/// collection. Hosts call this at their own safe points.
///
/// # Safety
/// Same contract as `collect_garbage`.
pub unsafe fn collect_garbage_if_due(roots: &[Value]) -> Option<vo_runtime::GcStats> {
    vo_runtime::gc_global::collect_if_due(&root_addrs(roots))
}

fn root_addrs(roots: &[Value]) -> Vec<usize> {
    roots.iter().filter(|v| v.is_valid()).map(|v| v.ptr as usize).collect()
}
