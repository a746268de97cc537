use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};

use super::DataProvider;
use crate::model::{ColumnInfo, Configuration, Query, RowInfo, Slice};
use crate::scheduler::MAX_IN_FLIGHT;
use crate::{Error, Result};

/// A table in a local SQLite database, paged with `LIMIT`/`OFFSET`
pub struct SqliteProvider {
    pool: Pool<Sqlite>,
    table: String,
    id_column: String,
    /// Value columns; empty means every column of the table
    columns: Vec<String>,
}

/// Quote an identifier for interpolation into SQL
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn decode_value(row: &SqliteRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(index) {
        return Value::from(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<String>, _>(index) {
        return Value::String(v);
    }
    Value::Null
}

fn decode_id(row: &SqliteRow) -> String {
    match decode_value(row, 0) {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SqliteProvider {
    /// Open the database read-only
    pub async fn connect(path: &Path, table: &str, id_column: &str, columns: Vec<String>) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Settings(format!("database not found: {}", path.display())));
        }

        tracing::info!("Opening database: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_IN_FLIGHT as u32)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool, table, id_column, columns))
    }

    pub fn from_pool(pool: Pool<Sqlite>, table: &str, id_column: &str, columns: Vec<String>) -> Self {
        Self {
            pool,
            table: table.to_string(),
            id_column: id_column.to_string(),
            columns,
        }
    }

    async fn table_columns(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(&self.table)))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Error::from))
            .collect()
    }

    async fn value_columns(&self) -> Result<Vec<String>> {
        if !self.columns.is_empty() {
            return Ok(self.columns.clone());
        }
        self.table_columns().await
    }
}

#[async_trait::async_trait]
impl DataProvider for SqliteProvider {
    async fn request_configuration(&self) -> Result<Configuration> {
        let columns = self.value_columns().await?;
        if columns.is_empty() {
            return Err(Error::Configuration(format!(
                "table {} not found or has no columns",
                self.table
            )));
        }

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table)))
            .fetch_one(&self.pool)
            .await?;

        Ok(Configuration::new(
            columns.into_iter().map(ColumnInfo::new).collect(),
            usize::try_from(count).unwrap_or(0),
        ))
    }

    async fn request_slice(&self, query: &Query) -> Result<Slice> {
        let columns = if query.columns.is_empty() {
            self.value_columns().await?
        } else {
            query.columns.clone()
        };

        let select: Vec<String> = std::iter::once(quote_ident(&self.id_column))
            .chain(columns.iter().map(|c| quote_ident(c)))
            .collect();
        let sql = format!(
            "SELECT {} FROM {} LIMIT ? OFFSET ?",
            select.join(", "),
            quote_ident(&self.table)
        );

        let rows = sqlx::query(&sql)
            .bind(query.len() as i64)
            .bind(query.begin_row as i64)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            table = %self.table,
            begin = query.begin_row,
            rows = rows.len(),
            "Slice read"
        );

        Ok(Slice::new(
            query.begin_row,
            rows.iter().map(|row| RowInfo::new(decode_id(row))).collect(),
            rows.iter()
                .map(|row| (1..=columns.len()).map(|i| decode_value(row, i)).collect())
                .collect(),
        ))
    }

    fn describe(&self) -> String {
        format!("sqlite source (table {})", self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn provider(columns: Vec<String>) -> SqliteProvider {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query("CREATE TABLE cars (name TEXT, year INTEGER, price REAL)")
            .execute(&pool)
            .await
            .unwrap();
        for i in 0..250 {
            sqlx::query("INSERT INTO cars (name, year, price) VALUES (?, ?, ?)")
                .bind(format!("car {}", i))
                .bind(if i % 50 == 0 { None } else { Some(1990 + i as i64) })
                .bind(i as f64 * 1.5)
                .execute(&pool)
                .await
                .unwrap();
        }

        SqliteProvider::from_pool(pool, "cars", "rowid", columns)
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("cars"), "\"cars\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[tokio::test]
    async fn test_configuration_discovers_columns() {
        let provider = provider(vec![]).await;
        let config = provider.request_configuration().await.unwrap();
        assert_eq!(config.row_count, 250);
        assert_eq!(config.column_ids(), vec!["name", "year", "price"]);
    }

    #[tokio::test]
    async fn test_configured_columns() {
        let provider = provider(vec!["price".into()]).await;
        let config = provider.request_configuration().await.unwrap();
        assert_eq!(config.column_ids(), vec!["price"]);
    }

    #[tokio::test]
    async fn test_missing_table() {
        let mut provider = provider(vec![]).await;
        provider.table = "nope".into();
        assert!(matches!(
            provider.request_configuration().await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_slice_values_and_last_block() {
        let provider = provider(vec![]).await;
        let query = Query::new(100, 200, vec!["name".into(), "year".into(), "price".into()]);
        let slice = provider.request_slice(&query).await.unwrap();

        assert_eq!(slice.len(), 100);
        assert_eq!(slice.rows[0].id, "101");
        assert_eq!(slice.values[0], vec![json!("car 100"), Value::Null, json!(150.0)]);
        assert_eq!(slice.values[1][1], json!(2091));
        assert!(slice.check(&query, Some(250), 3).is_ok());

        let last = provider
            .request_slice(&Query::new(200, 300, query.columns.clone()))
            .await
            .unwrap();
        assert_eq!(last.len(), 50);
    }
}
