use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::theme::Palette;

pub struct StatusBarWidget;

impl StatusBarWidget {
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let (style, status_text) = match &app.status_message {
            Some(msg) => (Style::default().fg(Palette::RED).bg(Palette::BG2), msg.clone()),
            None => (
                Style::default().fg(Palette::FG0).bg(Palette::BG2),
                Self::position_text(app),
            ),
        };

        let help_hint = " q:quit j/k:move ^d/^u:half page gg/G:ends r:reload ";
        let padding_len = (area.width as usize)
            .saturating_sub(status_text.width() + help_hint.width());

        let line = Line::from(vec![
            Span::styled(status_text, style),
            Span::styled(" ".repeat(padding_len), Style::default().bg(Palette::BG2)),
            Span::styled(
                help_hint,
                Style::default().fg(Palette::GREY2).bg(Palette::BG2),
            ),
        ]);

        frame.render_widget(Paragraph::new(line), area);
    }

    fn position_text(app: &App) -> String {
        let first = (app.top_row + 1).min(app.row_count);
        let last = (app.top_row + app.viewport_rows).min(app.row_count);
        let loaded = match app.rendered_span {
            Some((a, b)) => format!("{}-{}", a + 1, b + 1),
            None => "-".to_string(),
        };
        format!(
            " Rows {}-{} of {} | Columns: {} | Loaded: {}",
            first,
            last,
            app.row_count,
            app.columns.len(),
            loaded
        )
    }
}
