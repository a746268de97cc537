use std::io;
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use tokio::sync::{mpsc, watch};

use proxytable_core::{provider, AppConfig, TableEvent, TableHandle, TableService, TableSettings};
use proxytable_tui::{
    event::{AppEvent, EventHandler},
    input::{handle_key_event, Action},
    widgets::{GridWidget, StatusBarWidget},
    App, TerminalLayout,
};

/// Lines taken by the status bar, the grid border and the header
const CHROME_LINES: u16 = 4;

pub async fn run(config: Arc<AppConfig>) -> Result<()> {
    // one terminal line per row, one fixed-width column per table column
    let mut table_config = config.table.clone();
    table_config.cell_height = 1.0;
    table_config.cell_width = f64::from(config.ui.column_width) + 1.0;
    let settings = TableSettings::from_config(&table_config)?;

    let provider = provider::from_config(&config).await?;
    let (layout, grid) = TerminalLayout::new(config.ui.column_width, config.ui.max_label_chars);
    let (service, handle) = TableService::start(settings, provider, layout).await?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let service_task = tokio::spawn(service.with_event_sender(event_tx).run(shutdown_rx));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, SetTitle("proxytable"))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config.clone(), grid);
    let event_handler = EventHandler::new(config.ui.tick_rate_ms);

    let result = main_loop(&mut terminal, &mut app, &handle, &mut event_rx, &event_handler);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = service_task.await {
        tracing::error!("Table service task failed: {}", e);
    }

    result
}

fn main_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    handle: &TableHandle,
    events: &mut mpsc::UnboundedReceiver<TableEvent>,
    event_handler: &EventHandler,
) -> Result<()> {
    loop {
        let row_height = app.row_height();
        while let Ok(event) = events.try_recv() {
            app.handle_table_event(event);
        }

        let size = terminal.size()?;
        let viewport_changed = app.set_viewport_rows(size.height.saturating_sub(CHROME_LINES) as usize);
        if viewport_changed || app.row_height() != row_height {
            handle.resize(app.container_height())?;
            handle.scroll_to(app.scroll_offset())?;
        }

        terminal.draw(|frame| draw(frame, app))?;

        if let Some(event) = event_handler.next()? {
            match event {
                AppEvent::Key(key) => match handle_key_event(key, app) {
                    Action::Reload => {
                        app.status_message = Some(" Reloading...".to_string());
                        handle.reload()?;
                    }
                    action => {
                        if app.apply(&action) {
                            handle.scroll_to(app.scroll_offset())?;
                        }
                    }
                },
                AppEvent::Resize(_, _) | AppEvent::Tick => {}
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(frame.area());

    GridWidget::render(frame, chunks[0], app);
    StatusBarWidget::render(frame, chunks[1], app);
}
