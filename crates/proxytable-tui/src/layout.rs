use std::sync::Arc;

use proxytable_core::{Assembly, Dimensions, Layout};
use serde_json::Value;
use tokio::sync::watch;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Render a cell value as grid text
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truncate `text` to at most `width` terminal columns, marking cuts with `…`
pub fn fit(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// Layout that hands assemblies to the terminal UI.
///
/// Rows are one terminal line high. The reported width is the row label
/// column plus one fixed-width column per table column, in terminal cells.
pub struct TerminalLayout {
    tx: watch::Sender<Option<Arc<Assembly>>>,
    column_width: usize,
    max_label_chars: usize,
}

impl TerminalLayout {
    pub fn new(column_width: u16, max_label_chars: usize) -> (Self, watch::Receiver<Option<Arc<Assembly>>>) {
        let (tx, rx) = watch::channel(None);
        let layout = Self {
            tx,
            column_width: column_width as usize,
            max_label_chars,
        };
        (layout, rx)
    }

    /// Width of the row label column for this assembly
    pub fn label_width(assembly: &Assembly, max_label_chars: usize) -> usize {
        assembly
            .rows
            .iter()
            .map(|row| row.id.width().min(max_label_chars))
            .max()
            .unwrap_or(0)
    }
}

impl Layout for TerminalLayout {
    fn render(&mut self, assembly: &Assembly) -> Option<Dimensions> {
        let label = Self::label_width(assembly, self.max_label_chars);
        let width = label + 1 + assembly.columns.len() * (self.column_width + 1);
        tracing::trace!(rows = assembly.rows.len(), width, "Publishing grid");

        // send_replace keeps the value even when the UI is not listening yet
        self.tx.send_replace(Some(Arc::new(assembly.clone())));

        Some(Dimensions::new(width as f64, assembly.rows.len() as f64))
    }
}
