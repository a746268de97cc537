use std::time::Duration;

use serde_json::Value;

use super::DataProvider;
use crate::model::{ColumnInfo, Configuration, Query, RowInfo, Slice};
use crate::Result;

/// Plain number generator: every cell holds its row number.
///
/// Columns are named `"0"`, `"1"`, ... and rows are identified by their index.
#[derive(Debug, Clone)]
pub struct GeneratorProvider {
    columns: usize,
    rows: usize,
    latency: Option<Duration>,
}

impl GeneratorProvider {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            latency: None,
        }
    }

    /// Delay every slice, to behave a bit more like a remote source
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn column_ids(&self) -> Vec<String> {
        (0..self.columns).map(|c| c.to_string()).collect()
    }
}

#[async_trait::async_trait]
impl DataProvider for GeneratorProvider {
    async fn request_configuration(&self) -> Result<Configuration> {
        Ok(Configuration::new(
            self.column_ids().into_iter().map(ColumnInfo::new).collect(),
            self.rows,
        ))
    }

    async fn request_slice(&self, query: &Query) -> Result<Slice> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let columns = if query.columns.is_empty() {
            self.column_ids()
        } else {
            query.columns.clone()
        };

        let begin = query.begin_row.min(self.rows);
        let end = query.end_row.min(self.rows);

        Ok(Slice::new(
            begin,
            (begin..end).map(|r| RowInfo::new(r.to_string())).collect(),
            (begin..end)
                .map(|r| vec![Value::from(r as u64); columns.len()])
                .collect(),
        )
        .with_columns(columns.into_iter().map(ColumnInfo::new).collect())
        .with_row_count(self.rows))
    }

    fn describe(&self) -> String {
        format!("generator source ({} columns, {} rows)", self.columns, self.rows)
    }
}
