//! Error types for the casting concierge

use thiserror::Error;

/// Result type alias for concierge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling inbound events
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Classifier failure (remote model unreachable, unparseable output)
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Responder failure
    #[error("responder error: {0}")]
    Responder(String),

    /// Escalation sink failure
    #[error("escalation error: {0}")]
    Escalation(String),

    /// Outbound platform delivery error
    #[error("messenger error: {0}")]
    Messenger(String),

    /// Catalog table loading error
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Webhook signature verification failed
    #[error("invalid signature: {0}")]
    Signature(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
