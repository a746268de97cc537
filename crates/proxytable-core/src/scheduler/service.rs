use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::pacing::{MinInterval, RenderPacing};
use crate::dimensions::Dimensions;
use crate::layout::Layout;
use crate::model::{ColumnInfo, Configuration, Slice};
use crate::provider::DataProvider;
use crate::table::{Arrival, FetchRequest, Table, TableSettings};
use crate::{Error, Result};

/// Viewport changes sent to a running [`TableService`]
#[derive(Debug, Clone, PartialEq)]
pub enum TableCommand {
    /// New vertical scroll offset of the container
    Scroll(f64),
    /// New visible height of the container
    Resize(f64),
    /// Request the configuration again and start over
    Reload,
}

/// Events emitted by the table service to notify the UI of changes
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    /// Columns or row count are known (at start, after reload, or when a
    /// slice replaced the column list or the row count)
    Configured { columns: Vec<ColumnInfo>, row_count: usize },
    /// The virtual canvas for the whole table changed size
    CanvasResized(Dimensions),
    /// The layout was handed a new assembly
    Rendered {
        first_row: Option<usize>,
        last_row: Option<usize>,
        rows: usize,
        columns: usize,
    },
    /// A block could not be fetched; it is retried on the next viewport change
    FetchFailed { block: usize, message: String },
    /// An error occurred outside of block fetching
    Error { task: String, message: String },
}

/// Cloneable handle for driving a [`TableService`] from the UI
#[derive(Debug, Clone)]
pub struct TableHandle {
    tx: mpsc::UnboundedSender<TableCommand>,
}

impl TableHandle {
    fn send(&self, command: TableCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| Error::Other("table service has stopped".to_string()))
    }

    pub fn scroll_to(&self, offset: f64) -> Result<()> {
        self.send(TableCommand::Scroll(offset))
    }

    pub fn resize(&self, container_height: f64) -> Result<()> {
        self.send(TableCommand::Resize(container_height))
    }

    pub fn reload(&self) -> Result<()> {
        self.send(TableCommand::Reload)
    }
}

/// Aborts the wrapped task when dropped, so aborting the outer `JoinSet`
/// task also cancels the provider call it is waiting on
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct FetchOutcome {
    block: usize,
    epoch: u64,
    result: Result<Slice>,
}

/// Drives a [`Table`]: issues its fetches against a provider, feeds results
/// back and hands assemblies to the layout.
///
/// Passes triggered by viewport commands run `reconcile`, passes triggered by
/// arrivals run `recompute`. Both are coalesced and paced by the
/// [`RenderPacing`] policy. Fetch completions dispatch the next queued block
/// right away.
pub struct TableService {
    table: Table,
    provider: Arc<dyn DataProvider>,
    layout: Box<dyn Layout>,
    pacing: Box<dyn RenderPacing>,
    event_tx: Option<mpsc::UnboundedSender<TableEvent>>,
    commands: mpsc::UnboundedReceiver<TableCommand>,
    fetches: JoinSet<FetchOutcome>,
    viewport_dirty: bool,
    arrival_dirty: bool,
}

impl TableService {
    /// Request the configuration and build the table. A failed or empty
    /// configuration is returned as an error.
    pub async fn start(
        settings: TableSettings,
        provider: Arc<dyn DataProvider>,
        layout: impl Layout + 'static,
    ) -> Result<(Self, TableHandle)> {
        let configuration = provider.request_configuration().await?;
        Self::with_configuration(settings, provider, configuration, layout)
    }

    /// Build the service from a configuration the caller already requested
    pub fn with_configuration(
        settings: TableSettings,
        provider: Arc<dyn DataProvider>,
        configuration: Configuration,
        layout: impl Layout + 'static,
    ) -> Result<(Self, TableHandle)> {
        let pacing = MinInterval::new(settings.render_interval);
        let table = Table::new(settings, configuration)?;
        let (tx, commands) = mpsc::unbounded_channel();

        let service = Self {
            table,
            provider,
            layout: Box::new(layout),
            pacing: Box::new(pacing),
            event_tx: None,
            commands,
            fetches: JoinSet::new(),
            viewport_dirty: true,
            arrival_dirty: false,
        };

        Ok((service, TableHandle { tx }))
    }

    /// Set the event sender for UI notifications
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<TableEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Replace the default minimum-interval pacing
    pub fn with_pacing(mut self, pacing: impl RenderPacing + 'static) -> Self {
        self.pacing = Box::new(pacing);
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Send an event to the UI (if event channel is configured)
    fn send_event(&self, event: TableEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                warn!("Failed to send table event: receiver dropped");
            }
        }
    }

    fn announce_configuration(&mut self) {
        self.send_event(TableEvent::Configured {
            columns: self.table.columns().to_vec(),
            row_count: self.table.row_count(),
        });
        self.announce_canvas();
    }

    fn announce_canvas(&mut self) {
        let canvas = self.table.canvas();
        self.layout.resize_canvas(canvas);
        self.send_event(TableEvent::CanvasResized(canvas));
    }

    fn is_dirty(&self) -> bool {
        self.viewport_dirty || self.arrival_dirty
    }

    /// Run until shutdown is signalled or every [`TableHandle`] is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            provider = %self.provider.describe(),
            max_in_flight = self.table.scheduler().max_in_flight(),
            buffered_blocks = self.table.settings().buffered_blocks,
            "Table service started"
        );
        self.announce_configuration();

        loop {
            if self.is_dirty() && self.pacing.is_ready(Instant::now()) {
                self.pass();
            }

            let deadline = if self.is_dirty() {
                self.pacing.ready_at()
            } else {
                None
            };

            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Table service received shutdown signal");
                        break;
                    }
                }

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        info!("All table handles dropped, stopping");
                        break;
                    };
                    self.handle_command(command).await;
                    while let Ok(command) = self.commands.try_recv() {
                        self.handle_command(command).await;
                    }
                }

                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    self.handle_arrival(joined);
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
            }
        }

        self.fetches.abort_all();
    }

    async fn handle_command(&mut self, command: TableCommand) {
        match command {
            TableCommand::Scroll(offset) => {
                if self.table.scroll_to(offset) {
                    self.viewport_dirty = true;
                }
            }
            TableCommand::Resize(height) => {
                if self.table.resize(height) {
                    self.viewport_dirty = true;
                }
            }
            TableCommand::Reload => self.reload().await,
        }
    }

    async fn reload(&mut self) {
        info!("Reloading table configuration");
        let result = match self.provider.request_configuration().await {
            Ok(configuration) => self.table.reset(configuration),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.announce_configuration();
                self.viewport_dirty = true;
            }
            Err(e) => {
                error!("Reload failed: {}", e);
                self.send_event(TableEvent::Error {
                    task: "reload".to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// One recompute and render pass
    fn pass(&mut self) {
        let requests = if self.viewport_dirty {
            self.table.reconcile()
        } else {
            self.table.recompute()
        };
        self.viewport_dirty = false;
        self.arrival_dirty = false;
        self.pacing.record(Instant::now());

        self.spawn_fetches(requests);
        self.render();
    }

    fn render(&mut self) {
        let Some(assembly) = self.table.assemble() else {
            return;
        };

        let measured = self.layout.render(&assembly);
        let span = assembly.row_span();
        self.send_event(TableEvent::Rendered {
            first_row: span.map(|(first, _)| first),
            last_row: span.map(|(_, last)| last),
            rows: assembly.rows.len(),
            columns: assembly.columns.len(),
        });

        if self.table.apply_measurement(measured, &assembly).is_some() {
            // row height changed, so the center block may have moved
            self.announce_canvas();
            self.viewport_dirty = true;
        }
    }

    fn spawn_fetches(&mut self, requests: Vec<FetchRequest>) {
        for FetchRequest { block, epoch, query } in requests {
            debug!(block, begin = query.begin_row, end = query.end_row, "Fetching block");
            let provider = Arc::clone(&self.provider);

            self.fetches.spawn(async move {
                // a panicking provider must still report which block it held
                let mut fetch = AbortOnDrop(tokio::spawn(async move {
                    provider.request_slice(&query).await
                }));
                let result = match (&mut fetch.0).await {
                    Ok(result) => result,
                    Err(e) => Err(Error::Provider(format!("fetch task failed: {}", e))),
                };
                FetchOutcome { block, epoch, result }
            });
        }
    }

    fn handle_arrival(&mut self, joined: std::result::Result<FetchOutcome, JoinError>) {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Fetch task aborted: {}", e);
                return;
            }
        };

        match self.table.receive(outcome.block, outcome.epoch, outcome.result) {
            Arrival::Stored {
                row_count_changed,
                columns_changed,
                ..
            } => {
                if columns_changed || row_count_changed {
                    self.announce_configuration();
                }
            }
            Arrival::Failed { block, error } => {
                self.send_event(TableEvent::FetchFailed {
                    block,
                    message: error.to_string(),
                });
            }
            Arrival::Stale => {}
        }

        let requests = self.table.dispatch();
        self.spawn_fetches(requests);
        self.arrival_dirty = true;
    }
}
