//! Fixed-capacity MRU cache of id → order-index mappings
//!
//! The stage driver and the read-only probes resolve symbol ids to dynamic
//! item slots once per symbol per pass; a handful of symbols tend to be
//! probed repeatedly (dependency edges, composite queries). This cache keeps
//! those lookups to a short array scan instead of a hash lookup. A miss
//! always falls back to the exact map in the order snapshot, so the cache is
//! never correctness-critical.

use crate::registry::SymbolId;

pub(super) const CACHE_SLOTS: usize = 4;

/// Most-recently-used id→index pairs, most recent at slot 0
#[derive(Debug, Default)]
pub(super) struct IdIndexCache {
    slots: [Option<(SymbolId, usize)>; CACHE_SLOTS],
}

impl IdIndexCache {
    pub fn new() -> Self {
        Self {
            slots: [None; CACHE_SLOTS],
        }
    }

    /// Scan for `id` front to back, stopping at the first empty slot. A hit
    /// does not reorder the slots.
    pub fn lookup(&self, id: SymbolId) -> Option<usize> {
        for slot in &self.slots {
            match slot {
                None => break,
                Some((cached, index)) if *cached == id => return Some(*index),
                Some(_) => {}
            }
        }
        None
    }

    /// Insert a mapping at the front. The displaced front entry moves to the
    /// first slot past the populated run, overwriting the tail slot when the
    /// cache is full.
    pub fn insert(&mut self, id: SymbolId, index: usize) {
        let displaced = self.slots[0].take();
        self.slots[0] = Some((id, index));

        if displaced.is_none() {
            return;
        }

        // Slot 0 was just populated, so the scan terminates at the latest
        // when i reaches 0.
        let mut i = CACHE_SLOTS - 1;
        loop {
            if self.slots[i].is_some() {
                if i < CACHE_SLOTS - 1 {
                    i += 1;
                }
                break;
            }
            i -= 1;
        }
        self.slots[i] = displaced;
    }
}
