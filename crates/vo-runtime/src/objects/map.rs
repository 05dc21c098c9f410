//! Map object.
//!
//! Layout: a native heap object; the map value itself is one word holding
//! the object's address (null = nil map).
//!
//! Entries live in an insertion-ordered table with tombstones. Every entry
//! carries an insertion sequence number, and a cursor is a sequence number,
//! so cursors stay meaningful while the map is mutated and the table is
//! compacted. The hash index stores table positions; hashing and equality
//! come from the key type through `KeyAlg`.

use hashbrown::HashTable;
use parking_lot::Mutex;

use crate::gc_types::{scan_words, GcLayout, Trace};
use crate::slot::{words_from, words_into, Slot};

/// Hash and equality of a key type.
pub trait KeyAlg {
    /// # Safety
    /// `key` must address a value of the key type.
    unsafe fn hash(&self, key: *const u8, seed: u64) -> u64;
    /// # Safety
    /// Both pointers must address values of the key type.
    unsafe fn equal(&self, a: *const u8, b: *const u8) -> bool;
}

struct Entry {
    hash: u64,
    key: Box<[Slot]>,
    val: Box<[Slot]>,
}

/// Tombstones are dropped once they outnumber live entries in a table at
/// least this long.
const COMPACT_MIN_LEN: usize = 8;

#[derive(Default)]
struct MapState {
    /// `(seq, entry)` in ascending `seq`; `None` marks a deleted entry.
    entries: Vec<(usize, Option<Entry>)>,
    index: HashTable<usize>,
    live: usize,
    next_seq: usize,
}

impl MapState {
    fn compact(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|(_, e)| e.is_some());
        self.index.clear();
        let MapState { entries, index, .. } = self;
        for (i, (_, e)) in entries.iter().enumerate() {
            if let Some(e) = e {
                index.insert_unique(e.hash, i, |&j| entries[j].1.as_ref().map_or(0, |e| e.hash));
            }
        }
        tracing::trace!(target: "vo::gc", before, after = self.entries.len(), "compacted map table");
    }

    unsafe fn find(&self, alg: &dyn KeyAlg, hash: u64, key: *const u8) -> Option<usize> {
        let entries = &self.entries;
        self.index
            .find(hash, |&i| match &entries[i].1 {
                Some(e) => e.hash == hash && alg.equal(key, e.key.as_ptr() as *const u8),
                None => false,
            })
            .copied()
    }
}

pub struct MapObject {
    key: GcLayout,
    val: GcLayout,
    seed: u64,
    state: Mutex<MapState>,
}

impl MapObject {
    pub fn new(key: GcLayout, val: GcLayout, hint: usize) -> Self {
        let state = MapState {
            entries: Vec::with_capacity(hint),
            index: HashTable::with_capacity(hint),
            live: 0,
            next_seq: 0,
        };
        Self { key, val, seed: fastrand::u64(..), state: Mutex::new(state) }
    }

    pub fn key_layout(&self) -> &GcLayout {
        &self.key
    }

    pub fn val_layout(&self) -> &GcLayout {
        &self.val
    }

    pub fn len(&self) -> usize {
        self.state.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the value stored under `key` into `out`.
    ///
    /// # Safety
    /// `key` addresses a key value; `out` is writable for the value size.
    pub unsafe fn get(&self, alg: &dyn KeyAlg, key: *const u8, out: *mut u8) -> bool {
        let hash = alg.hash(key, self.seed);
        let st = self.state.lock();
        match st.find(alg, hash, key).and_then(|i| st.entries[i].1.as_ref()) {
            Some(e) => {
                words_into(&e.val, out, self.val.size);
                true
            }
            None => false,
        }
    }

    /// # Safety
    /// `key` addresses a key value.
    pub unsafe fn contains(&self, alg: &dyn KeyAlg, key: *const u8) -> bool {
        let hash = alg.hash(key, self.seed);
        self.state.lock().find(alg, hash, key).is_some()
    }

    /// Insert or overwrite the entry for `key`.
    ///
    /// # Safety
    /// `key` and `val` address values of the key and value types.
    pub unsafe fn insert(&self, alg: &dyn KeyAlg, key: *const u8, val: *const u8) {
        let hash = alg.hash(key, self.seed);
        let key_words = words_from(key, self.key.size);
        let val_words = words_from(val, self.val.size);
        let mut st = self.state.lock();
        if let Some(i) = st.find(alg, hash, key) {
            if let Some(e) = st.entries[i].1.as_mut() {
                e.key = key_words;
                e.val = val_words;
            }
            return;
        }
        let idx = st.entries.len();
        let seq = st.next_seq;
        st.next_seq += 1;
        st.entries.push((seq, Some(Entry { hash, key: key_words, val: val_words })));
        st.live += 1;
        let MapState { entries, index, .. } = &mut *st;
        index.insert_unique(hash, idx, |&i| entries[i].1.as_ref().map_or(0, |e| e.hash));
    }

    /// Delete the entry for `key`; absent keys are a no-op.
    ///
    /// # Safety
    /// `key` addresses a key value.
    pub unsafe fn remove(&self, alg: &dyn KeyAlg, key: *const u8) -> bool {
        let hash = alg.hash(key, self.seed);
        let mut st = self.state.lock();
        let MapState { entries, index, live, .. } = &mut *st;
        let found = index.find_entry(hash, |&i| match &entries[i].1 {
            Some(e) => e.hash == hash && alg.equal(key, e.key.as_ptr() as *const u8),
            None => false,
        });
        let Ok(slot) = found else { return false };
        let (idx, _) = slot.remove();
        entries[idx].1 = None;
        *live -= 1;
        if *live == 0 {
            entries.clear();
            index.clear();
        } else if entries.len() >= COMPACT_MIN_LEN && entries.len() - *live > *live {
            st.compact();
        }
        true
    }

    /// Length of the entry table, tombstones included.
    pub fn table_len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Copy out the first live entry inserted at or after cursor `pos`,
    /// returning its cursor. Pass the returned cursor plus one to continue.
    ///
    /// # Safety
    /// `key_out` and `val_out` are writable for the key and value sizes.
    pub unsafe fn next_entry(&self, pos: usize, key_out: *mut u8, val_out: *mut u8) -> Option<usize> {
        let st = self.state.lock();
        let start = st.entries.partition_point(|&(seq, _)| seq < pos);
        let (seq, e) = st.entries[start..].iter().find_map(|(seq, e)| e.as_ref().map(|e| (*seq, e)))?;
        words_into(&e.key, key_out, self.key.size);
        words_into(&e.val, val_out, self.val.size);
        Some(seq)
    }
}

impl Trace for MapObject {
    fn trace(&self, visit: &mut dyn FnMut(usize)) {
        if !self.key.has_pointers() && !self.val.has_pointers() {
            return;
        }
        let st = self.state.lock();
        for e in st.entries.iter().filter_map(|(_, e)| e.as_ref()) {
            scan_words(&e.key, &self.key, visit);
            scan_words(&e.val, &self.val, visit);
        }
    }
}
