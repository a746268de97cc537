use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use proxytable_core::Assembly;

use crate::app::App;
use crate::layout::{fit, format_value, TerminalLayout};
use crate::theme::Palette;

/// Table grid: a header line with column ids, then one line per row.
/// Rows whose block has not arrived yet are drawn as placeholders. Columns
/// are separated by a dim rule and the last row of each block is underlined.
pub struct GridWidget;

/// Whether `row` is the last row of its block
fn ends_block(row: usize, block_size: usize) -> bool {
    block_size > 0 && (row + 1) % block_size == 0
}

fn divider() -> Span<'static> {
    Span::styled("│", Style::default().fg(Palette::GREY0))
}

impl GridWidget {
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let block = Block::default()
            .title(format!(" {} rows ", app.row_count))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Palette::GREY0))
            .style(Style::default().bg(Palette::BG0));

        let assembly = app.assembly();
        let column_width = app.config.ui.column_width as usize;
        let label_width = assembly
            .as_deref()
            .map(|a| TerminalLayout::label_width(a, app.config.ui.max_label_chars))
            .unwrap_or(0)
            .max(app.row_count.to_string().len().min(app.config.ui.max_label_chars));

        let mut lines = Vec::with_capacity(app.viewport_rows + 1);
        lines.push(Self::header(app, label_width, column_width));

        let end = (app.top_row + app.viewport_rows).min(app.row_count);
        for row in app.top_row..end {
            lines.push(Self::row_line(assembly.as_deref(), app, row, label_width, column_width));
        }

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn header(app: &App, label_width: usize, column_width: usize) -> Line<'static> {
        let style = Style::default()
            .fg(Palette::YELLOW)
            .add_modifier(Modifier::BOLD);

        let mut spans = vec![Span::raw(format!("{:w$}", "", w = label_width)), divider()];
        for column in &app.columns {
            spans.push(Span::styled(
                format!("{:<w$}", fit(&column.id, column_width), w = column_width),
                style,
            ));
            spans.push(divider());
        }
        Line::from(spans)
    }

    fn row_line(
        assembly: Option<&Assembly>,
        app: &App,
        row: usize,
        label_width: usize,
        column_width: usize,
    ) -> Line<'static> {
        let underline = if ends_block(row, app.config.table.row_block_size) {
            Modifier::UNDERLINED
        } else {
            Modifier::empty()
        };
        let label_style = Style::default().fg(Palette::GREY2).add_modifier(underline);
        let value_style = Style::default().fg(Palette::FG0).add_modifier(underline);

        let position = assembly.and_then(|a| {
            a.rows
                .binary_search_by_key(&row, |r| r.index)
                .ok()
                .map(|position| (a, position))
        });

        let Some((assembly, position)) = position else {
            return Line::from(vec![
                Span::styled(format!("{:>w$}", row, w = label_width), label_style),
                divider(),
                Span::styled("…", Style::default().fg(Palette::GREY0)),
            ]);
        };

        let label = fit(&assembly.rows[position].id, app.config.ui.max_label_chars);
        let mut spans = vec![
            Span::styled(format!("{:>w$}", label, w = label_width), label_style),
            divider(),
        ];
        for cell in assembly.row_cells(position) {
            let text = fit(&format_value(&cell.value), column_width);
            let style = if cell.value.is_number() {
                value_style.fg(Palette::BLUE)
            } else {
                value_style
            };
            spans.push(Span::styled(format!("{:<w$}", text, w = column_width), style));
            spans.push(divider());
        }
        Line::from(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ends_block() {
        assert!(ends_block(99, 100));
        assert!(ends_block(199, 100));
        assert!(!ends_block(100, 100));
        assert!(!ends_block(0, 100));
        assert!(ends_block(0, 1));
        assert!(!ends_block(5, 0));
    }
}
