//! Wire-level data shapes exchanged with a data provider.
//!
//! Optional fields are modeled as `Option`, so nothing arrives as an untyped
//! pass-through. Identifiers may be sent as strings or numbers and are always
//! held as strings.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Current slice schema version
pub const SLICE_SCHEMA_VERSION: u32 = 1;

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "identifier must be a string or a number, got {}",
            other
        ))),
    }
}

fn default_version() -> u32 {
    SLICE_SCHEMA_VERSION
}

/// Column description sent by a data provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnInfo {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
}

impl ColumnInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Row description sent by a data provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowInfo {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
}

impl RowInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Base table configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub columns: Vec<ColumnInfo>,
    #[serde(alias = "tableRowCount")]
    pub row_count: usize,
}

impl Configuration {
    pub fn new(columns: Vec<ColumnInfo>, row_count: usize) -> Self {
        Self { columns, row_count }
    }

    /// A configuration without columns leaves nothing to render
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::Configuration(
                "configuration contains no columns".to_string(),
            ));
        }
        Ok(())
    }

    pub fn column_ids(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.id.clone()).collect()
    }
}

/// Request for the half-open row range `[begin_row, end_row)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub begin_row: usize,
    pub end_row: usize,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Query {
    pub fn new(begin_row: usize, end_row: usize, columns: Vec<String>) -> Self {
        Self {
            begin_row,
            end_row,
            columns,
        }
    }

    /// Number of rows requested
    pub fn len(&self) -> usize {
        self.end_row.saturating_sub(self.begin_row)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one fetch. Values are indexed `[row][column]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slice {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Index of the first row in the whole table; providers may omit it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_row: Option<usize>,
    pub rows: Vec<RowInfo>,
    /// Updated column list, replaces the current one when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnInfo>>,
    pub values: Vec<Vec<Value>>,
    /// Updated total row count
    #[serde(default, alias = "tableRowCount", skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
}

impl Slice {
    pub fn new(begin_row: usize, rows: Vec<RowInfo>, values: Vec<Vec<Value>>) -> Self {
        Self {
            version: SLICE_SCHEMA_VERSION,
            begin_row: Some(begin_row),
            rows,
            columns: None,
            values,
            row_count: None,
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnInfo>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_row_count(mut self, row_count: usize) -> Self {
        self.row_count = Some(row_count);
        self
    }

    /// Number of rows carried
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check the slice against the query that produced it.
    ///
    /// `known_rows` is the total row count before this slice arrived and
    /// `known_columns` the current column count; a row count or column list
    /// carried by the slice itself takes precedence.
    pub fn check(&self, query: &Query, known_rows: Option<usize>, known_columns: usize) -> Result<()> {
        if self.version != SLICE_SCHEMA_VERSION {
            return Err(Error::Integrity(format!(
                "unsupported slice schema version {}",
                self.version
            )));
        }

        if let Some(begin) = self.begin_row {
            if begin != query.begin_row {
                return Err(Error::Integrity(format!(
                    "slice begins at row {} but row {} was requested",
                    begin, query.begin_row
                )));
            }
        }

        if self.rows.len() != self.values.len() {
            return Err(Error::Integrity(format!(
                "slice has {} row ids but {} value rows",
                self.rows.len(),
                self.values.len()
            )));
        }

        if self.rows.len() > query.len() {
            return Err(Error::Integrity(format!(
                "slice has {} rows but only {} were requested",
                self.rows.len(),
                query.len()
            )));
        }

        if let Some(total) = self.row_count.or(known_rows) {
            let expected = query.end_row.min(total).saturating_sub(query.begin_row);
            if self.rows.len() != expected {
                return Err(Error::Integrity(format!(
                    "slice has {} rows, expected {} for [{}, {}) of {}",
                    self.rows.len(),
                    expected,
                    query.begin_row,
                    query.end_row,
                    total
                )));
            }
        }

        let width = self.columns.as_ref().map_or(known_columns, Vec::len);
        if let Some((offset, row)) = self.values.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::Integrity(format!(
                "row {} has {} values for {} columns",
                query.begin_row + offset,
                row.len(),
                width
            )));
        }

        Ok(())
    }
}
