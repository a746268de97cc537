use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Data provider error: {0}")]
    Provider(String),

    #[error("Table configuration error: {0}")]
    Configuration(String),

    #[error("Slice integrity error: {0}")]
    Integrity(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error came from the data source rather than from our own
    /// validation. Provider failures are localized to a single block.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Error::Provider(_) | Error::Http(_) | Error::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
