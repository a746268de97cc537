//! The table: single owner of viewport, cache, fetch bookkeeping and
//! dimension estimates.
//!
//! Nothing in here performs I/O. The caller issues the [`FetchRequest`]s it
//! gets back, reports results through [`Table::receive`] and renders whatever
//! [`Table::assemble`] returns. [`crate::scheduler::TableService`] does exactly
//! that on a tokio task.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::assemble::{Assembler, Assembly};
use crate::block::{BlockMapper, BlockWindow};
use crate::cache::SliceCache;
use crate::config::TableConfig;
use crate::dimensions::{DimensionFeedback, Dimensions};
use crate::model::{ColumnInfo, Configuration, Query, Slice};
use crate::scheduler::FetchScheduler;
use crate::viewport::ViewportTracker;
use crate::{Error, Result};

/// Validated engine settings for one table instance
#[derive(Debug, Clone)]
pub struct TableSettings {
    pub row_block_size: NonZeroUsize,
    pub buffered_blocks: usize,
    pub render_radius: usize,
    pub max_in_flight: usize,
    pub render_interval: Duration,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl TableSettings {
    pub fn from_config(config: &TableConfig) -> Result<Self> {
        let row_block_size = NonZeroUsize::new(config.row_block_size)
            .ok_or_else(|| Error::Settings("row_block_size must be positive".to_string()))?;

        for (name, value) in [("cell_width", config.cell_width), ("cell_height", config.cell_height)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Settings(format!("{} must be positive, got {}", name, value)));
            }
        }

        Ok(Self {
            row_block_size,
            buffered_blocks: config.buffered_blocks,
            render_radius: config.render_radius.min(config.buffered_blocks),
            max_in_flight: config.max_in_flight,
            render_interval: Duration::from_millis(config.render_interval_ms),
            cell_width: config.cell_width,
            cell_height: config.cell_height,
        })
    }
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            row_block_size: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
            buffered_blocks: 10,
            render_radius: 1,
            max_in_flight: 1,
            render_interval: Duration::ZERO,
            cell_width: 100.0,
            cell_height: 20.0,
        }
    }
}

/// A block fetch the caller must issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub block: usize,
    /// Table epoch the request belongs to; hand it back to [`Table::receive`]
    pub epoch: u64,
    pub query: Query,
}

/// What happened to a fetch result
#[derive(Debug)]
pub enum Arrival {
    /// Slice validated and cached
    Stored {
        block: usize,
        /// The slice carried a different total row count
        row_count_changed: bool,
        /// The slice carried a different column list
        columns_changed: bool,
    },
    /// Provider error or integrity failure; the block is marked failed
    Failed { block: usize, error: Error },
    /// Result of a request issued before the last reset, or for a block the
    /// table no longer reaches; dropped
    Stale,
}

#[derive(Debug)]
pub struct Table {
    settings: TableSettings,
    viewport: ViewportTracker,
    cache: SliceCache,
    scheduler: FetchScheduler,
    assembler: Assembler,
    feedback: DimensionFeedback,
    columns: Vec<ColumnInfo>,
    columns_generation: u64,
    row_count: usize,
    epoch: u64,
}

impl Table {
    /// Create a table for a dataset. Fails with [`Error::Configuration`] when
    /// the configuration has no columns.
    pub fn new(settings: TableSettings, configuration: Configuration) -> Result<Self> {
        configuration.validate()?;

        let mapper = BlockMapper::new(settings.row_block_size);
        let mut viewport = ViewportTracker::new(mapper, settings.cell_height);
        viewport.set_row_count(configuration.row_count);

        info!(
            columns = configuration.columns.len(),
            rows = configuration.row_count,
            block_size = mapper.row_block_size(),
            "Table configured"
        );

        Ok(Self {
            feedback: DimensionFeedback::new(
                settings.cell_width,
                settings.cell_height,
                configuration.columns.len(),
            ),
            scheduler: FetchScheduler::new(settings.max_in_flight),
            assembler: Assembler::new(mapper),
            cache: SliceCache::new(),
            viewport,
            columns: configuration.columns,
            columns_generation: 0,
            row_count: configuration.row_count,
            epoch: 0,
            settings,
        })
    }

    /// Start over with a new dataset configuration. Cached slices are dropped
    /// and results of outstanding fetches will be ignored. Measured sizes and
    /// the scroll position are kept.
    pub fn reset(&mut self, configuration: Configuration) -> Result<()> {
        configuration.validate()?;

        self.epoch += 1;
        self.cache.clear();
        self.scheduler.reset();
        self.assembler.invalidate();
        self.columns = configuration.columns;
        self.columns_generation += 1;
        self.row_count = configuration.row_count;
        self.viewport.set_row_count(configuration.row_count);

        info!(
            epoch = self.epoch,
            columns = self.columns.len(),
            rows = self.row_count,
            "Table reset"
        );
        Ok(())
    }

    pub fn settings(&self) -> &TableSettings {
        &self.settings
    }

    pub fn viewport(&self) -> &ViewportTracker {
        &self.viewport
    }

    pub fn cache(&self) -> &SliceCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &FetchScheduler {
        &self.scheduler
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn mapper(&self) -> &BlockMapper {
        self.viewport.mapper()
    }

    /// Current row height estimate
    pub fn row_height(&self) -> f64 {
        self.viewport.row_height()
    }

    /// Returns `true` if the offset changed
    pub fn scroll_to(&mut self, offset: f64) -> bool {
        self.viewport.set_scroll_offset(offset)
    }

    /// Returns `true` if the container height changed
    pub fn resize(&mut self, container_height: f64) -> bool {
        self.viewport.set_container_height(container_height)
    }

    /// Blocks retained by the cache
    pub fn cache_window(&self) -> BlockWindow {
        self.viewport.window(self.settings.buffered_blocks)
    }

    /// Blocks handed to the render callback
    pub fn render_window(&self) -> BlockWindow {
        self.viewport.window(self.settings.render_radius)
    }

    /// Viewport-triggered pass: evict outside the cache window and queue
    /// every missing block, failed ones included. Returns the fetches that
    /// can start now.
    pub fn reconcile(&mut self) -> Vec<FetchRequest> {
        self.evict();
        let needed = self.viewport.needed_blocks(self.settings.buffered_blocks);
        self.scheduler.reconcile(&needed);
        self.dispatch()
    }

    /// Arrival-triggered pass: same as [`Table::reconcile`] but failed blocks
    /// wait for the next viewport change.
    pub fn recompute(&mut self) -> Vec<FetchRequest> {
        self.evict();
        let needed = self.viewport.needed_blocks(self.settings.buffered_blocks);
        self.scheduler.requeue(&needed);
        self.dispatch()
    }

    fn evict(&mut self) {
        let evicted = self.cache.evict_outside(self.cache_window());
        self.scheduler.forget(&evicted);
    }

    /// Fetches that can start with the current queue and free slots
    pub fn dispatch(&mut self) -> Vec<FetchRequest> {
        self.scheduler
            .drain_dispatchable()
            .into_iter()
            .map(|block| FetchRequest {
                block,
                epoch: self.epoch,
                query: self.query_for(block),
            })
            .collect()
    }

    fn query_for(&self, block: usize) -> Query {
        let range = self.mapper().row_range_of(block);
        Query::new(
            range.start,
            range.end,
            self.columns.iter().map(|c| c.id.clone()).collect(),
        )
    }

    /// Record the result of a fetch.
    ///
    /// A valid slice is cached even if its block has left the window; the
    /// next pass prunes it. Row count and column list updates carried by the
    /// slice replace the current ones.
    pub fn receive(&mut self, block: usize, epoch: u64, result: Result<Slice>) -> Arrival {
        if epoch != self.epoch {
            self.scheduler.settle_stale();
            debug!(block, epoch, current = self.epoch, "Dropping result from previous epoch");
            return Arrival::Stale;
        }

        if block >= self.mapper().block_count(self.row_count) {
            self.scheduler.discard(block);
            debug!(block, rows = self.row_count, "Dropping result past table end");
            return Arrival::Stale;
        }

        let slice = match result.and_then(|slice| self.validate(block, slice)) {
            Ok(slice) => slice,
            Err(error) => {
                self.scheduler.fail(block);
                warn!(block, error = %error, "Block fetch failed");
                return Arrival::Failed { block, error };
            }
        };

        let columns_changed = match &slice.columns {
            Some(columns) if *columns != self.columns => {
                self.columns = columns.clone();
                self.columns_generation += 1;
                info!(columns = self.columns.len(), "Column list replaced by slice");
                true
            }
            _ => false,
        };

        let row_count_changed = match slice.row_count {
            Some(rows) if rows != self.row_count => {
                // blocks that reach past the smaller of the two counts were
                // cut for a different table length
                let first_stale = self.mapper().block_of(rows.min(self.row_count));
                let evicted = self.cache.evict_from(first_stale);
                self.scheduler.forget(&evicted);
                self.assembler.invalidate();

                self.row_count = rows;
                self.viewport.set_row_count(rows);
                info!(rows, "Row count updated by slice");
                true
            }
            _ => false,
        };

        debug!(block, rows = slice.len(), "Block cached");
        self.cache.put(block, Arc::new(slice));
        self.scheduler.complete(block);

        Arrival::Stored {
            block,
            row_count_changed,
            columns_changed,
        }
    }

    fn validate(&self, block: usize, mut slice: Slice) -> Result<Slice> {
        let query = self.query_for(block);
        slice.check(&query, Some(self.row_count), self.columns.len())?;
        slice.begin_row = Some(query.begin_row);
        Ok(slice)
    }

    /// Assemble the render window, or `None` if it has not changed
    pub fn assemble(&mut self) -> Option<Assembly> {
        let window = self.render_window();
        self.assembler
            .assemble(&self.cache, window, &self.columns, self.columns_generation)
    }

    /// Feed a render measurement back. Returns the new canvas size when the
    /// row or column estimate changed; the center block may have moved, so
    /// the caller should run [`Table::recompute`].
    pub fn apply_measurement(&mut self, measured: Option<Dimensions>, assembly: &Assembly) -> Option<Dimensions> {
        let measured = measured?;
        if !self
            .feedback
            .observe(measured, assembly.rows.len(), assembly.columns.len())
        {
            return None;
        }

        self.viewport.set_row_height(self.feedback.row_height());
        let canvas = self.canvas();
        info!(
            row_height = self.feedback.row_height(),
            row_width = self.feedback.row_width(),
            canvas_height = canvas.height,
            "Row dimensions updated from render"
        );
        Some(canvas)
    }

    /// Size of the virtual canvas for the whole table
    pub fn canvas(&self) -> Dimensions {
        self.feedback.canvas(self.row_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowInfo;
    use crate::scheduler::BlockState;
    use serde_json::json;

    fn settings(buffered_blocks: usize, max_in_flight: usize) -> TableSettings {
        TableSettings {
            buffered_blocks,
            max_in_flight,
            ..TableSettings::default()
        }
    }

    fn configuration(rows: usize) -> Configuration {
        Configuration::new(vec![ColumnInfo::new("a"), ColumnInfo::new("b")], rows)
    }

    fn slice_for(request: &FetchRequest) -> Slice {
        let q = &request.query;
        Slice::new(
            q.begin_row,
            (q.begin_row..q.end_row).map(|r| RowInfo::new(r.to_string())).collect(),
            (q.begin_row..q.end_row).map(|r| vec![json!(r), json!(-(r as i64))]).collect(),
        )
    }

    fn serve(table: &mut Table, requests: Vec<FetchRequest>) {
        for request in requests {
            let slice = slice_for(&request);
            table.receive(request.block, request.epoch, Ok(slice));
        }
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = TableConfig::default();
        config.render_radius = 50;
        let settings = TableSettings::from_config(&config).unwrap();
        assert_eq!(settings.render_radius, config.buffered_blocks);

        config.row_block_size = 0;
        assert!(matches!(TableSettings::from_config(&config), Err(Error::Settings(_))));

        let mut config = TableConfig::default();
        config.cell_height = 0.0;
        assert!(matches!(TableSettings::from_config(&config), Err(Error::Settings(_))));
    }

    #[test]
    fn test_configuration_without_columns_is_fatal() {
        let result = Table::new(TableSettings::default(), Configuration::new(vec![], 10));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_first_reconcile_requests_center_first() {
        let mut table = Table::new(settings(2, 8), configuration(1_000_000)).unwrap();
        table.resize(400.0);
        table.scroll_to(250_000.0 * 20.0);

        let blocks: Vec<usize> = table.reconcile().iter().map(|r| r.block).collect();
        assert_eq!(blocks, vec![2500, 2501, 2499, 2502, 2498]);
    }

    #[test]
    fn test_sequential_requests_chain() {
        let mut table = Table::new(settings(1, 1), configuration(1_000)).unwrap();
        table.scroll_to(500.0 * 20.0);

        let first = table.reconcile();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].block, 5);
        assert_eq!(first[0].query, Query::new(500, 600, vec!["a".into(), "b".into()]));

        serve(&mut table, first);
        let next = table.dispatch();
        assert_eq!(next.iter().map(|r| r.block).collect::<Vec<_>>(), vec![6]);
    }

    #[test]
    fn test_reconcile_twice_no_duplicates() {
        let mut table = Table::new(settings(2, 3), configuration(1_000_000)).unwrap();
        table.scroll_to(10_000.0);

        let first = table.reconcile();
        let second = table.reconcile();
        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
    }

    #[test]
    fn test_failed_block_refetched_on_next_reconcile() {
        let mut table = Table::new(settings(0, 1), configuration(1_000)).unwrap();
        table.scroll_to(700.0 * 20.0);

        let requests = table.reconcile();
        assert_eq!(requests[0].block, 7);

        let arrival = table.receive(7, 0, Err(Error::Provider("boom".into())));
        assert!(matches!(arrival, Arrival::Failed { block: 7, .. }));
        assert_eq!(table.scheduler().state(7), Some(BlockState::Failed));

        // arrival-triggered passes leave it alone
        assert!(table.recompute().is_empty());

        let retry = table.reconcile();
        assert_eq!(retry.iter().filter(|r| r.block == 7).count(), 1);
    }

    #[test]
    fn test_integrity_failure_marks_block_failed() {
        let mut table = Table::new(settings(0, 1), configuration(1_000)).unwrap();
        let request = table.reconcile().remove(0);

        let mut slice = slice_for(&request);
        slice.values.pop();
        let arrival = table.receive(request.block, request.epoch, Ok(slice));

        assert!(matches!(
            arrival,
            Arrival::Failed { error: Error::Integrity(_), .. }
        ));
        assert!(table.cache().is_empty());
    }

    #[test]
    fn test_stale_arrival_is_pruned_on_next_pass() {
        let mut table = Table::new(settings(1, 8), configuration(1_000_000)).unwrap();
        let requests = table.reconcile();
        assert_eq!(requests.iter().map(|r| r.block).collect::<Vec<_>>(), vec![0, 1]);

        // viewport moves far away before anything arrives
        table.scroll_to(500_000.0 * 20.0);
        serve(&mut table, requests);
        assert!(table.cache().contains(0));

        table.recompute();
        let window = table.cache_window();
        assert!(table.cache().keys().all(|b| window.contains(b)));
        assert!(!table.cache().contains(0));
        assert_eq!(table.scheduler().state(0), None);
    }

    #[test]
    fn test_slice_updates_row_count_and_columns() {
        let mut table = Table::new(settings(0, 1), configuration(1_000)).unwrap();
        let request = table.reconcile().remove(0);

        let slice = slice_for(&request)
            .with_row_count(5_000)
            .with_columns(vec![ColumnInfo::new("x"), ColumnInfo::new("y")]);
        let arrival = table.receive(request.block, request.epoch, Ok(slice));

        assert!(matches!(
            arrival,
            Arrival::Stored {
                row_count_changed: true,
                columns_changed: true,
                ..
            }
        ));
        assert_eq!(table.row_count(), 5_000);
        assert_eq!(table.columns()[0].id, "x");
        assert_eq!(table.canvas().height, 5_000.0 * 20.0);
    }

    #[test]
    fn test_shrinking_row_count_drops_rows_past_end() {
        let mut table = Table::new(settings(2, 8), configuration(1_000)).unwrap();
        table.scroll_to(90.0 * 20.0);

        let requests = table.reconcile();
        assert_eq!(requests.iter().map(|r| r.block).collect::<Vec<_>>(), vec![0, 1, 2]);
        let (head, rest): (Vec<_>, Vec<_>) = requests.into_iter().partition(|r| r.block == 0);
        serve(&mut table, rest);
        assert!(table.cache().contains(2));

        let request = &head[0];
        let slice = slice_for(request).with_row_count(150);
        let arrival = table.receive(request.block, request.epoch, Ok(slice));
        assert!(matches!(arrival, Arrival::Stored { row_count_changed: true, .. }));
        assert_eq!(table.cache().keys().collect::<Vec<_>>(), vec![0]);
        assert_eq!(table.scheduler().state(2), None);

        // block 1 is fetched again, cut at the new end
        let refetch = table.recompute();
        assert_eq!(refetch.iter().map(|r| r.block).collect::<Vec<_>>(), vec![1]);

        assert_eq!(table.render_window(), BlockWindow::new(0, 1));
        let assembly = table.assemble().unwrap();
        assert_eq!(assembly.row_span(), Some((0, 99)));
    }

    #[test]
    fn test_result_past_table_end_is_dropped() {
        let mut table = Table::new(settings(2, 8), configuration(1_000)).unwrap();
        let requests = table.reconcile();
        assert_eq!(table.scheduler().in_flight(), 3);

        let first = &requests[0];
        let slice = slice_for(first).with_row_count(150);
        table.receive(first.block, first.epoch, Ok(slice));

        let late = &requests[2];
        assert_eq!(late.block, 2);
        let arrival = table.receive(late.block, late.epoch, Ok(slice_for(late)));
        assert!(matches!(arrival, Arrival::Stale));
        assert!(!table.cache().contains(2));
        assert_eq!(table.scheduler().state(2), None);
        assert_eq!(table.scheduler().in_flight(), 1);
    }

    #[test]
    fn test_final_partial_block() {
        let mut table = Table::new(settings(0, 1), configuration(950)).unwrap();
        table.scroll_to(940.0 * 20.0);
        let request = table.reconcile().remove(0);
        assert_eq!(request.block, 9);

        let mut slice = slice_for(&request);
        slice.rows.truncate(50);
        slice.values.truncate(50);
        let arrival = table.receive(request.block, request.epoch, Ok(slice));
        assert!(matches!(arrival, Arrival::Stored { .. }));
    }

    #[test]
    fn test_assemble_render_window_and_suppress() {
        let mut table = Table::new(settings(2, 8), configuration(1_000_000)).unwrap();
        table.resize(400.0);
        table.scroll_to(490.0 * 20.0);
        assert_eq!(table.render_window(), BlockWindow::new(4, 6));

        let requests = table.reconcile();
        serve(&mut table, requests);

        let assembly = table.assemble().unwrap();
        assert_eq!(assembly.rows.len(), 300);
        assert_eq!(assembly.rows[0].id, "400");
        assert_eq!(assembly.cells.len(), 600);
        assert!(table.assemble().is_none());
    }

    #[test]
    fn test_measurement_moves_center_block() {
        let mut table = Table::new(settings(1, 8), configuration(1_000_000)).unwrap();
        table.resize(400.0);
        table.scroll_to(20_000.0);
        // 20px estimate: row 1000 + 10
        assert_eq!(table.viewport().center_block(), 10);

        let requests = table.reconcile();
        serve(&mut table, requests);
        let assembly = table.assemble().unwrap();

        // rows actually render at 40px
        let measured = Dimensions::new(250.0, assembly.rows.len() as f64 * 40.0);
        let canvas = table.apply_measurement(Some(measured), &assembly).unwrap();
        assert_eq!(canvas, Dimensions::new(250.0, 40_000_000.0));
        assert_eq!(table.row_height(), 40.0);
        assert_eq!(table.viewport().center_block(), 5);

        // same measurement: nothing to do
        assert!(table.apply_measurement(Some(measured), &assembly).is_none());
        assert!(table.apply_measurement(None, &assembly).is_none());
    }

    #[test]
    fn test_reset_drops_old_epoch() {
        let mut table = Table::new(settings(0, 1), configuration(1_000)).unwrap();
        let request = table.reconcile().remove(0);

        table.reset(configuration(2_000)).unwrap();
        assert_eq!(table.epoch(), 1);

        let arrival = table.receive(request.block, request.epoch, Ok(slice_for(&request)));
        assert!(matches!(arrival, Arrival::Stale));
        assert!(table.cache().is_empty());

        let fresh = table.reconcile();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].epoch, 1);
    }
}
