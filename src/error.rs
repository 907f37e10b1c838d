use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Grouping not found: {0}")]
    GroupingNotFound(String),

    #[error("Metrics unavailable for {resource_id}: {reason}")]
    MetricsUnavailable { resource_id: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Azure API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Invalid resource ID: {0}")]
    InvalidResourceId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Config(format!("invalid URL: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
