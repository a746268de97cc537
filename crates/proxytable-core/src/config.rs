use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path (log files live here)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Engine tuning. Every instance gets its own copy, nothing here is global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Rows per block (unit of fetch and eviction)
    #[serde(default = "default_row_block_size")]
    pub row_block_size: usize,
    /// Radius, in blocks, of the cache window around the viewport center
    #[serde(default = "default_buffered_blocks")]
    pub buffered_blocks: usize,
    /// Radius, in blocks, of the window handed to the render callback
    #[serde(default = "default_render_radius")]
    pub render_radius: usize,
    /// Outstanding fetches allowed at once (1 = strictly sequential)
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Minimum milliseconds between recompute/render passes (0 = no pacing)
    #[serde(default)]
    pub render_interval_ms: u64,
    /// Initial column width estimate, replaced by measured values
    #[serde(default = "default_cell_width")]
    pub cell_width: f64,
    /// Initial row height estimate, replaced by measured values
    #[serde(default = "default_cell_height")]
    pub cell_height: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            row_block_size: default_row_block_size(),
            buffered_blocks: default_buffered_blocks(),
            render_radius: default_render_radius(),
            max_in_flight: default_max_in_flight(),
            render_interval_ms: 0,
            cell_width: default_cell_width(),
            cell_height: default_cell_height(),
        }
    }
}

/// Which data provider backs the table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// In-process number generator
    #[default]
    Generator,
    /// Remote JSON service
    Http,
    /// Local SQLite table
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    /// Column count for the generator source
    #[serde(default = "default_generator_columns")]
    pub generator_columns: usize,
    /// Row count for the generator source
    #[serde(default = "default_generator_rows")]
    pub generator_rows: usize,
    /// Service URL for the http source
    #[serde(default)]
    pub url: Option<String>,
    /// Table name (sent to the http service, queried in sqlite)
    #[serde(default)]
    pub table_name: Option<String>,
    /// SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Column holding the row identifier (sqlite)
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Value columns to request; empty means all columns the source reports
    #[serde(default)]
    pub columns: Vec<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            generator_columns: default_generator_columns(),
            generator_rows: default_generator_rows(),
            url: None,
            table_name: None,
            database_path: None,
            id_column: default_id_column(),
            columns: Vec::new(),
            request_timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Tick rate in milliseconds
    #[serde(default = "default_tick_rate")]
    pub tick_rate_ms: u64,
    /// Column width used by the terminal view before the first measurement
    #[serde(default = "default_terminal_column_width")]
    pub column_width: u16,
    /// Maximum characters shown per label
    #[serde(default = "default_label_chars")]
    pub max_label_chars: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: default_tick_rate(),
            column_width: default_terminal_column_width(),
            max_label_chars: default_label_chars(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("proxytable")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_row_block_size() -> usize {
    100
}

fn default_buffered_blocks() -> usize {
    10
}

fn default_render_radius() -> usize {
    1
}

fn default_max_in_flight() -> usize {
    1
}

fn default_cell_width() -> f64 {
    100.0
}

fn default_cell_height() -> f64 {
    20.0
}

fn default_generator_columns() -> usize {
    4
}

fn default_generator_rows() -> usize {
    1_000_000
}

fn default_id_column() -> String {
    "rowid".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_tick_rate() -> u64 {
    100
}

fn default_terminal_column_width() -> u16 {
    12
}

fn default_label_chars() -> usize {
    20
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from the default location or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit file, falling back to defaults
    /// when the file does not exist
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Settings(e.to_string()))?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/proxytable/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("proxytable")
            .join("config.toml")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }

    /// Log file used while the terminal view owns the screen
    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join("proxytable.log")
    }

    /// SQLite source path (with tilde expansion)
    pub fn database_path(&self) -> Option<PathBuf> {
        self.source.database_path.as_deref().map(expand_tilde)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.table.row_block_size, 100);
        assert_eq!(config.table.buffered_blocks, 10);
        assert_eq!(config.table.render_radius, 1);
        assert_eq!(config.table.max_in_flight, 1);
        assert_eq!(config.source.kind, SourceKind::Generator);
        assert_eq!(config.source.id_column, "rowid");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [table]
            row_block_size = 50
            max_in_flight = 3

            [source]
            kind = "sqlite"
            database_path = "~/songs.sqlite"
            table_name = "songs"
            columns = ["title", "year"]
            "#,
        )
        .unwrap();

        assert_eq!(config.table.row_block_size, 50);
        assert_eq!(config.table.max_in_flight, 3);
        assert_eq!(config.table.buffered_blocks, 10);
        assert_eq!(config.source.kind, SourceKind::Sqlite);
        assert_eq!(config.source.columns, vec!["title", "year"]);
        assert_eq!(config.ui.tick_rate_ms, 100);
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = std::env::temp_dir().join(format!("proxytable-config-{}", std::process::id()));
        let path = dir.join("config.toml");

        let mut config = AppConfig::default();
        config.table.render_interval_ms = 16;
        config.source.kind = SourceKind::Http;
        config.source.url = Some("http://localhost:8080/table".to_string());
        config.save(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.table.render_interval_ms, 16);
        assert_eq!(loaded.source.kind, SourceKind::Http);
        assert_eq!(loaded.source.url.as_deref(), Some("http://localhost:8080/table"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("proxytable-does-not-exist.toml");
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.table.row_block_size, 100);
    }
}
