//! Collection keeps everything reachable from the given roots.
//!
//! Kept in its own test binary: collecting the global heap while other
//! tests hold unrooted values would free them.

use vo_reflect::{
    basic, collect_garbage, collect_garbage_if_due, func_of, make_func, make_map, make_slice, map_of, new, slice_of,
    value_of, Kind,
};

#[test]
fn test_collect_keeps_roots_and_frees_garbage() {
    let strings = slice_of(basic(Kind::String));
    let s = make_slice(strings, 2, 2);
    s.index(0).set_string("kept");
    s.index(1).set_string("also kept");

    let m = make_map(map_of(basic(Kind::String), strings));
    m.set_map_index(value_of("list"), s);

    let cell = new(basic(Kind::Int));
    cell.elem().set_int(99);
    let f = make_func(func_of(&[], &[basic(Kind::Int)], false), |_| vec![value_of(1isize)]);

    for i in 0..100usize {
        new(strings).elem().set(make_slice(strings, i % 8, 8));
    }

    // SAFETY: single-threaded test; every value used below is a root.
    let stats = unsafe { collect_garbage(&[m, cell, f]) };
    assert!(stats.freed_objects > 0);

    let list = m.map_index(value_of("list"));
    assert_eq!(list.index(0).string(), "kept");
    assert_eq!(list.index(1).string(), "also kept");
    assert_eq!(cell.elem().int(), 99);
    assert_eq!(f.call(&[])[0].int(), 1);

    // SAFETY: as above.
    assert_eq!(unsafe { collect_garbage_if_due(&[m, cell, f]) }, None);
    // Unrooted, so the collection it triggers frees it.
    make_slice(slice_of(basic(Kind::Uint8)), 9 << 20, 9 << 20);
    // SAFETY: as above.
    let due = unsafe { collect_garbage_if_due(&[m, cell, f]) };
    assert!(due.map_or(false, |s| s.freed_bytes >= 9 << 20), "{due:?}");
    assert_eq!(cell.elem().int(), 99);
}
