mod generator;
mod http;
mod sqlite;

pub use generator::GeneratorProvider;
pub use http::HttpProvider;
pub use sqlite::SqliteProvider;

use std::sync::Arc;

use crate::config::{AppConfig, SourceKind};
use crate::model::{Configuration, Query, Slice};
use crate::{Error, Result};

/// Source of table data, addressed by row range.
///
/// Must be callable concurrently with itself: the table may have several
/// block requests outstanding at once.
#[async_trait::async_trait]
pub trait DataProvider: Send + Sync {
    /// Column list and total row count
    async fn request_configuration(&self) -> Result<Configuration>;

    /// Rows `[query.begin_row, query.end_row)` for the given columns
    async fn request_slice(&self, query: &Query) -> Result<Slice>;

    /// Short human-readable description for logs and status lines
    fn describe(&self) -> String {
        "data provider".to_string()
    }
}

/// Build the provider selected in the configuration
pub async fn from_config(config: &AppConfig) -> Result<Arc<dyn DataProvider>> {
    let source = &config.source;
    let provider: Arc<dyn DataProvider> = match source.kind {
        SourceKind::Generator => Arc::new(GeneratorProvider::new(
            source.generator_columns,
            source.generator_rows,
        )),
        SourceKind::Http => {
            let url = source
                .url
                .as_deref()
                .ok_or_else(|| Error::Settings("source.url is required for the http source".to_string()))?;
            Arc::new(HttpProvider::new(
                url,
                source.table_name.clone(),
                source.request_timeout_secs,
            )?)
        }
        SourceKind::Sqlite => {
            let path = config.database_path().ok_or_else(|| {
                Error::Settings("source.database_path is required for the sqlite source".to_string())
            })?;
            let table = source.table_name.as_deref().ok_or_else(|| {
                Error::Settings("source.table_name is required for the sqlite source".to_string())
            })?;
            Arc::new(
                SqliteProvider::connect(&path, table, &source.id_column, source.columns.clone())
                    .await?,
            )
        }
    };

    tracing::info!("Using {}", provider.describe());
    Ok(provider)
}
