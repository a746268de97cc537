//! Block-keyed slice storage bounded by the cache window.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::block::BlockWindow;
use crate::model::Slice;

/// A stored slice plus the generation stamp of the `put` that stored it
#[derive(Debug, Clone)]
pub struct CachedSlice {
    pub slice: Arc<Slice>,
    pub generation: u64,
}

/// Slices by block index, iterated in ascending block order.
///
/// `put` never evicts. Entries only leave through [`SliceCache::evict_outside`],
/// so a late arrival may sit outside the window until the next recompute.
#[derive(Debug, Default)]
pub struct SliceCache {
    entries: BTreeMap<usize, CachedSlice>,
    next_generation: u64,
}

impl SliceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, block: usize) -> Option<&CachedSlice> {
        self.entries.get(&block)
    }

    pub fn contains(&self, block: usize) -> bool {
        self.entries.contains_key(&block)
    }

    /// Store a slice, replacing any previous one for the block
    pub fn put(&mut self, block: usize, slice: Arc<Slice>) {
        self.next_generation += 1;
        self.entries.insert(
            block,
            CachedSlice {
                slice,
                generation: self.next_generation,
            },
        );
    }

    /// Drop every block outside `window`, returning the dropped indices
    pub fn evict_outside(&mut self, window: BlockWindow) -> Vec<usize> {
        let evicted: Vec<usize> = self
            .entries
            .keys()
            .copied()
            .filter(|block| !window.contains(*block))
            .collect();

        for block in &evicted {
            self.entries.remove(block);
        }

        if !evicted.is_empty() {
            tracing::debug!(
                count = evicted.len(),
                first = window.first,
                last = window.last,
                "Evicted slices outside cache window"
            );
        }

        evicted
    }

    /// Drop every block from `first` on, returning the dropped indices
    pub fn evict_from(&mut self, first: usize) -> Vec<usize> {
        let evicted: Vec<usize> = self.entries.split_off(&first).into_keys().collect();
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), first, "Evicted slices past table end");
        }
        evicted
    }

    /// Cached entries whose block lies in `window`, ascending
    pub fn in_window(&self, window: BlockWindow) -> impl Iterator<Item = (usize, &CachedSlice)> {
        self.entries
            .range(window.blocks())
            .map(|(block, entry)| (*block, entry))
    }

    pub fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
