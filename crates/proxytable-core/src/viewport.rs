//! Viewport tracking: which block sits in the middle of the visible area.

use crate::block::{BlockMapper, BlockWindow};

/// Scroll position and row metrics of the visible area.
///
/// All distances are in the host's coordinate space (pixels for a canvas,
/// cells for a terminal). The row height starts as an estimate and is replaced
/// by measured values from the render callback.
#[derive(Debug, Clone)]
pub struct ViewportTracker {
    mapper: BlockMapper,
    scroll_offset: f64,
    container_height: f64,
    row_height: Option<f64>,
    default_row_height: f64,
    row_count: Option<usize>,
}

impl ViewportTracker {
    pub fn new(mapper: BlockMapper, default_row_height: f64) -> Self {
        Self {
            mapper,
            scroll_offset: 0.0,
            container_height: 0.0,
            row_height: None,
            default_row_height: if default_row_height.is_finite() && default_row_height > 0.0 {
                default_row_height
            } else {
                1.0
            },
            row_count: None,
        }
    }

    pub fn mapper(&self) -> &BlockMapper {
        &self.mapper
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    /// Returns `true` if the offset changed
    pub fn set_scroll_offset(&mut self, offset: f64) -> bool {
        let offset = if offset.is_finite() { offset.max(0.0) } else { 0.0 };
        if offset != self.scroll_offset {
            self.scroll_offset = offset;
            true
        } else {
            false
        }
    }

    pub fn container_height(&self) -> f64 {
        self.container_height
    }

    /// Returns `true` if the height changed
    pub fn set_container_height(&mut self, height: f64) -> bool {
        let height = if height.is_finite() { height.max(0.0) } else { 0.0 };
        if height != self.container_height {
            self.container_height = height;
            true
        } else {
            false
        }
    }

    /// Effective row height, falling back to the default while unmeasured
    pub fn row_height(&self) -> f64 {
        self.row_height.unwrap_or(self.default_row_height)
    }

    /// Returns `true` if the height changed. Non-positive values are ignored.
    pub fn set_row_height(&mut self, height: f64) -> bool {
        if !height.is_finite() || height <= 0.0 || self.row_height == Some(height) {
            return false;
        }
        self.row_height = Some(height);
        true
    }

    pub fn row_count(&self) -> Option<usize> {
        self.row_count
    }

    pub fn set_row_count(&mut self, row_count: usize) {
        self.row_count = Some(row_count);
    }

    /// Rows that fit in the container
    pub fn visible_row_count(&self) -> usize {
        (self.container_height / self.row_height()).ceil() as usize
    }

    /// Row at the vertical middle of the viewport
    pub fn middle_row(&self) -> usize {
        let visible = self.visible_row_count() as f64;
        let middle = (self.scroll_offset / self.row_height() + visible / 2.0).round();
        middle.max(0.0) as usize
    }

    /// Exclusive upper bound on block indices, when the row count is known
    fn block_limit(&self) -> Option<usize> {
        self.row_count.map(|rows| self.mapper.block_count(rows))
    }

    /// Block under the middle of the viewport
    pub fn center_block(&self) -> usize {
        let block = self.mapper.block_of(self.middle_row());
        match self.block_limit() {
            Some(limit) => block.min(limit.saturating_sub(1)),
            None => block,
        }
    }

    /// Blocks within `radius` of the center, nearest first:
    /// `[c, c+1, c-1, c+2, c-2, ...]`. Indices below zero or past the end of
    /// the table are skipped.
    pub fn needed_blocks(&self, radius: usize) -> Vec<usize> {
        let limit = self.block_limit();
        if limit == Some(0) {
            return Vec::new();
        }

        let in_table = |block: usize| limit.map_or(true, |l| block < l);
        let center = self.center_block();
        let mut blocks = vec![center];

        for i in 1..=radius {
            let after = center.checked_add(i).filter(|b| in_table(*b));
            let before = center.checked_sub(i);
            if after.is_none() && before.is_none() {
                break;
            }
            blocks.extend(after);
            blocks.extend(before);
        }

        blocks
    }

    /// `[center - radius, center + radius]`, clamped at zero and at the last
    /// block of the table
    pub fn window(&self, radius: usize) -> BlockWindow {
        let window = BlockWindow::around(self.center_block(), radius);
        match self.block_limit() {
            // the center block is already clamped, so `first` never passes `last`
            Some(limit) => BlockWindow::new(window.first, window.last.min(limit.saturating_sub(1))),
            None => window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn tracker(block_size: usize, row_height: f64) -> ViewportTracker {
        ViewportTracker::new(
            BlockMapper::new(NonZeroUsize::new(block_size).unwrap()),
            row_height,
        )
    }

    #[test]
    fn test_center_block_for_deep_scroll() {
        let mut viewport = tracker(100, 20.0);
        viewport.set_row_count(1_000_000);
        viewport.set_container_height(400.0);
        viewport.set_scroll_offset(250_000.0 * 20.0);

        assert_eq!(viewport.visible_row_count(), 20);
        assert_eq!(viewport.middle_row(), 250_010);
        assert_eq!(viewport.center_block(), 2500);
    }

    #[test]
    fn test_needed_blocks_alternate_outward() {
        let mut viewport = tracker(100, 20.0);
        viewport.set_scroll_offset(500.0 * 20.0);

        assert_eq!(viewport.center_block(), 5);
        assert_eq!(viewport.needed_blocks(2), vec![5, 6, 4, 7, 3]);
        assert_eq!(viewport.needed_blocks(0), vec![5]);
    }

    #[test]
    fn test_needed_blocks_clamped_at_zero() {
        let viewport = tracker(100, 20.0);
        assert_eq!(viewport.center_block(), 0);
        assert_eq!(viewport.needed_blocks(3), vec![0, 1, 2, 3]);

        let mut viewport = tracker(100, 20.0);
        viewport.set_scroll_offset(100.0 * 20.0);
        assert_eq!(viewport.needed_blocks(2), vec![1, 2, 0, 3]);
    }

    #[test]
    fn test_needed_blocks_are_distinct_and_sized() {
        let mut viewport = tracker(10, 1.0);
        viewport.set_scroll_offset(10_000.0);
        for radius in 0..8 {
            let blocks = viewport.needed_blocks(radius);
            let mut unique = blocks.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(blocks.len(), 2 * radius + 1);
            assert_eq!(unique.len(), blocks.len());
            assert_eq!(blocks[0], viewport.center_block());
        }
    }

    #[test]
    fn test_needed_blocks_stop_at_table_end() {
        let mut viewport = tracker(100, 20.0);
        viewport.set_row_count(950);
        viewport.set_scroll_offset(10_000.0 * 20.0);

        assert_eq!(viewport.center_block(), 9);
        assert_eq!(viewport.needed_blocks(2), vec![9, 8, 7]);

        assert_eq!(viewport.needed_blocks(usize::MAX).len(), 10);

        viewport.set_row_count(0);
        assert!(viewport.needed_blocks(2).is_empty());
    }

    #[test]
    fn test_window_stops_at_table_end() {
        let mut viewport = tracker(100, 20.0);
        viewport.set_row_count(150);
        assert_eq!(viewport.window(2), BlockWindow::new(0, 1));

        viewport.set_row_count(1_000);
        viewport.set_scroll_offset(950.0 * 20.0);
        assert_eq!(viewport.window(2), BlockWindow::new(7, 9));

        viewport.set_row_count(0);
        assert_eq!(viewport.window(2), BlockWindow::new(0, 0));
    }

    #[test]
    fn test_unset_row_height_uses_default() {
        let mut viewport = tracker(100, 20.0);
        assert_eq!(viewport.row_height(), 20.0);
        assert!(!viewport.set_row_height(0.0));
        assert!(!viewport.set_row_height(f64::NAN));
        assert!(viewport.set_row_height(32.0));
        assert!(!viewport.set_row_height(32.0));
        assert_eq!(viewport.row_height(), 32.0);
    }

    #[test]
    fn test_negative_scroll_is_clamped() {
        let mut viewport = tracker(100, 20.0);
        viewport.set_scroll_offset(-500.0);
        assert_eq!(viewport.scroll_offset(), 0.0);
        assert_eq!(viewport.center_block(), 0);
    }
}
