use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tokio::sync::{mpsc, watch};

use proxytable_core::layout::layout_fn;
use proxytable_core::{provider, AppConfig, Assembly, DataProvider, TableEvent, TableService, TableSettings};

/// Render `rows` rows starting at `first` as aligned plain text
fn format_rows(assembly: &Assembly, first: usize, rows: usize) -> String {
    let selected: Vec<usize> = assembly
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.index >= first && row.index < first.saturating_add(rows))
        .map(|(position, _)| position)
        .collect();

    let text = |position: usize, column: usize| -> String {
        match assembly.cell(position, column).map(|c| &c.value) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    };

    let id_width = selected
        .iter()
        .map(|&p| assembly.rows[p].id.chars().count())
        .chain(std::iter::once(2))
        .max()
        .unwrap_or(2);
    let widths: Vec<usize> = assembly
        .columns
        .iter()
        .enumerate()
        .map(|(c, column)| {
            selected
                .iter()
                .map(|&p| text(p, c).chars().count())
                .chain(std::iter::once(column.id.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = format!("{:<w$}", "id", w = id_width);
    for (column, width) in assembly.columns.iter().zip(&widths) {
        out.push_str(&format!("  {:<w$}", column.id, w = *width));
    }
    out.push('\n');

    for &position in &selected {
        out.push_str(&format!("{:<w$}", assembly.rows[position].id, w = id_width));
        for (c, width) in widths.iter().enumerate() {
            out.push_str(&format!("  {:<w$}", text(position, c), w = *width));
        }
        out.push('\n');
    }
    out
}

fn covers(assembly: &Assembly, first: usize, last: usize) -> bool {
    (first..=last).all(|row| {
        assembly
            .rows
            .binary_search_by_key(&row, |r| r.index)
            .is_ok()
    })
}

pub async fn run(config: Arc<AppConfig>, first: usize, rows: usize) -> Result<()> {
    let mut settings = TableSettings::from_config(&config.table)?;
    let provider = provider::from_config(&config).await?;
    let configuration = provider.request_configuration().await?;

    let row_count = configuration.row_count;
    if rows == 0 || row_count == 0 {
        return Ok(());
    }
    if first >= row_count {
        bail!("row {} is past the end of the table ({} rows)", first, row_count);
    }
    let last = first.saturating_add(rows).min(row_count) - 1;
    let shown = last + 1 - first;

    // the render window must span every requested row
    let block_size = settings.row_block_size.get();
    settings.render_radius = settings.render_radius.max(shown.div_ceil(block_size) + 1);
    settings.buffered_blocks = settings.buffered_blocks.max(settings.render_radius);
    let row_height = settings.cell_height;

    let (assembly_tx, mut assemblies) = mpsc::unbounded_channel();
    let layout = layout_fn(move |assembly: &Assembly| {
        let _ = assembly_tx.send(Arc::new(assembly.clone()));
        None
    });

    let (service, handle) = TableService::with_configuration(settings, provider, configuration, layout)?;

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(service.with_event_sender(event_tx).run(shutdown_rx));

    handle.resize(shown as f64 * row_height)?;
    handle.scroll_to(first as f64 * row_height)?;

    let timeout = Duration::from_secs(config.source.request_timeout_secs.max(1) * 2);
    let result = tokio::time::timeout(timeout, async {
        loop {
            tokio::select! {
                Some(assembly) = assemblies.recv() => {
                    if covers(&assembly, first, last) {
                        return Ok(assembly);
                    }
                }
                Some(event) = events.recv() => {
                    if let TableEvent::FetchFailed { block, message } = event {
                        return Err(anyhow!("block {} failed: {}", block, message));
                    }
                }
                else => return Err(anyhow!("table service stopped")),
            }
        }
    })
    .await;

    let _ = shutdown_tx.send(true);
    let _ = task.await;

    let assembly = result.map_err(|_| anyhow!("timed out waiting for rows {}-{}", first, last))??;
    print!("{}", format_rows(&assembly, first, shown));
    Ok(())
}
