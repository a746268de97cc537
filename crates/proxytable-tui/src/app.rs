use std::sync::Arc;

use proxytable_core::{AppConfig, Assembly, ColumnInfo, Dimensions, TableEvent};
use tokio::sync::watch;

use crate::input::Action;

/// Terminal application state.
///
/// The table service renders into a [`crate::TerminalLayout`], which publishes
/// each assembly on a watch channel; the app only keeps the scroll position in
/// rows and what it has heard about the table.
pub struct App {
    pub config: Arc<AppConfig>,
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
    pub canvas: Dimensions,
    /// First table row shown at the top of the grid
    pub top_row: usize,
    /// Number of data rows that fit in the grid area
    pub viewport_rows: usize,
    /// Rows covered by the last assembly the service rendered
    pub rendered_span: Option<(usize, usize)>,
    pub status_message: Option<String>,
    pub pending_g: bool,
    pub should_quit: bool,
    grid: watch::Receiver<Option<Arc<Assembly>>>,
}

impl App {
    pub fn new(config: Arc<AppConfig>, grid: watch::Receiver<Option<Arc<Assembly>>>) -> Self {
        Self {
            config,
            columns: Vec::new(),
            row_count: 0,
            canvas: Dimensions::default(),
            top_row: 0,
            viewport_rows: 0,
            rendered_span: None,
            status_message: None,
            pending_g: false,
            should_quit: false,
            grid,
        }
    }

    /// Latest assembly published by the layout
    pub fn assembly(&self) -> Option<Arc<Assembly>> {
        self.grid.borrow().clone()
    }

    /// Height of one row in canvas units, as last reported by the service
    pub fn row_height(&self) -> f64 {
        if self.row_count > 0 && self.canvas.height > 0.0 {
            self.canvas.height / self.row_count as f64
        } else {
            1.0
        }
    }

    /// Scroll offset to hand to the table service
    pub fn scroll_offset(&self) -> f64 {
        self.top_row as f64 * self.row_height()
    }

    /// Container height to hand to the table service
    pub fn container_height(&self) -> f64 {
        self.viewport_rows as f64 * self.row_height()
    }

    pub fn max_top_row(&self) -> usize {
        self.row_count.saturating_sub(self.viewport_rows)
    }

    /// Returns `true` if the grid area changed
    pub fn set_viewport_rows(&mut self, rows: usize) -> bool {
        if rows == self.viewport_rows {
            return false;
        }
        self.viewport_rows = rows;
        self.top_row = self.top_row.min(self.max_top_row());
        true
    }

    /// Returns `true` if the top row changed
    pub fn scroll_to_row(&mut self, row: usize) -> bool {
        let row = row.min(self.max_top_row());
        if row == self.top_row {
            return false;
        }
        self.top_row = row;
        self.status_message = None;
        true
    }

    pub fn scroll_by(&mut self, delta: isize) -> bool {
        self.scroll_to_row(self.top_row.saturating_add_signed(delta))
    }

    /// Apply a movement action. Returns `true` if the viewport moved.
    pub fn apply(&mut self, action: &Action) -> bool {
        let half = (self.viewport_rows / 2).max(1) as isize;
        let page = self.viewport_rows.max(1) as isize;

        self.pending_g = matches!(action, Action::PendingG);
        match action {
            Action::MoveDown => self.scroll_by(1),
            Action::MoveUp => self.scroll_by(-1),
            Action::ScrollHalfPageDown => self.scroll_by(half),
            Action::ScrollHalfPageUp => self.scroll_by(-half),
            Action::ScrollPageDown => self.scroll_by(page),
            Action::ScrollPageUp => self.scroll_by(-page),
            Action::JumpToTop => self.scroll_to_row(0),
            Action::JumpToBottom => self.scroll_to_row(self.max_top_row()),
            Action::Quit => {
                self.should_quit = true;
                false
            }
            _ => false,
        }
    }

    pub fn handle_table_event(&mut self, event: TableEvent) {
        match event {
            TableEvent::Configured { columns, row_count } => {
                self.columns = columns;
                self.row_count = row_count;
                self.top_row = self.top_row.min(self.max_top_row());
                self.status_message = None;
            }
            TableEvent::CanvasResized(canvas) => {
                self.canvas = canvas;
            }
            TableEvent::Rendered {
                first_row: Some(first),
                last_row: Some(last),
                ..
            } => {
                self.rendered_span = Some((first, last));
            }
            TableEvent::Rendered { .. } => {
                self.rendered_span = None;
            }
            TableEvent::FetchFailed { block, message } => {
                self.status_message = Some(format!(" Block {} failed: {}", block, message));
            }
            TableEvent::Error { task, message } => {
                self.status_message = Some(format!(" {} failed: {}", task, message));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(rows: usize, viewport: usize) -> App {
        let (_tx, rx) = watch::channel(None);
        let mut app = App::new(Arc::new(AppConfig::default()), rx);
        app.handle_table_event(TableEvent::Configured {
            columns: vec![ColumnInfo::new("a")],
            row_count: rows,
        });
        app.set_viewport_rows(viewport);
        app
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut app = app(100, 20);
        assert!(!app.apply(&Action::MoveUp));
        assert!(app.apply(&Action::ScrollPageDown));
        assert_eq!(app.top_row, 20);
        assert!(app.apply(&Action::JumpToBottom));
        assert_eq!(app.top_row, 80);
        assert!(!app.apply(&Action::MoveDown));
        assert!(app.apply(&Action::ScrollHalfPageUp));
        assert_eq!(app.top_row, 70);
    }

    #[test]
    fn test_offsets_follow_canvas() {
        let mut app = app(1_000, 10);
        app.scroll_to_row(50);
        assert_eq!(app.scroll_offset(), 50.0);

        app.handle_table_event(TableEvent::CanvasResized(Dimensions::new(80.0, 2_000.0)));
        assert_eq!(app.row_height(), 2.0);
        assert_eq!(app.scroll_offset(), 100.0);
        assert_eq!(app.container_height(), 20.0);
    }

    #[test]
    fn test_row_count_shrink_clamps_top_row() {
        let mut app = app(1_000, 10);
        app.scroll_to_row(900);
        app.handle_table_event(TableEvent::Configured {
            columns: vec![ColumnInfo::new("a")],
            row_count: 100,
        });
        assert_eq!(app.top_row, 90);
    }

    #[test]
    fn test_failure_shows_until_scroll() {
        let mut app = app(1_000, 10);
        app.handle_table_event(TableEvent::FetchFailed {
            block: 3,
            message: "timeout".into(),
        });
        assert!(app.status_message.as_deref().unwrap().contains("Block 3"));
        app.apply(&Action::MoveDown);
        assert!(app.status_message.is_none());
    }
}
