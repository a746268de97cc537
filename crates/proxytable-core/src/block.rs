//! Row index ⇄ block index arithmetic.

use std::num::NonZeroUsize;
use std::ops::{Range, RangeInclusive};

/// Maps rows onto fixed-size blocks. The block size never changes for the
/// lifetime of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMapper {
    row_block_size: NonZeroUsize,
}

impl BlockMapper {
    pub fn new(row_block_size: NonZeroUsize) -> Self {
        Self { row_block_size }
    }

    pub fn row_block_size(&self) -> usize {
        self.row_block_size.get()
    }

    /// Block containing `row`
    #[inline]
    pub fn block_of(&self, row: usize) -> usize {
        row / self.row_block_size.get()
    }

    /// Rows covered by `block`
    #[inline]
    pub fn row_range_of(&self, block: usize) -> Range<usize> {
        let size = self.row_block_size.get();
        let start = block.saturating_mul(size);
        start..start.saturating_add(size)
    }

    /// Rows covered by `block`, truncated at the end of the table
    pub fn clamped_row_range_of(&self, block: usize, row_count: usize) -> Range<usize> {
        let range = self.row_range_of(block);
        range.start.min(row_count)..range.end.min(row_count)
    }

    /// Number of blocks needed to cover `row_count` rows
    pub fn block_count(&self, row_count: usize) -> usize {
        row_count.div_ceil(self.row_block_size.get())
    }
}

/// Inclusive range of block indices, e.g. the cache window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockWindow {
    pub first: usize,
    pub last: usize,
}

impl BlockWindow {
    pub fn new(first: usize, last: usize) -> Self {
        debug_assert!(first <= last, "window [{first}, {last}] is inverted");
        Self { first, last }
    }

    /// `[center - radius, center + radius]`, clamped at zero
    pub fn around(center: usize, radius: usize) -> Self {
        Self {
            first: center.saturating_sub(radius),
            last: center.saturating_add(radius),
        }
    }

    #[inline]
    pub fn contains(&self, block: usize) -> bool {
        self.first <= block && block <= self.last
    }

    pub fn blocks(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }

    /// Number of blocks in the window (never zero)
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    /// Always `false`: a window holds at least its center block
    pub fn is_empty(&self) -> bool {
        false
    }
}
