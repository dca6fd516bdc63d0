use thiserror::Error;

/// Main error type for wikigraph
#[derive(Error, Debug)]
pub enum WikigraphError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A topic record violated the input contract of the graph builder
    #[error("Malformed topic record: {0}")]
    MalformedTopic(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Wikidata/Wikipedia fetch errors
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Topic not found in the document store
    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    /// A blocking database task failed to complete
    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// Convenient Result type using WikigraphError
pub type Result<T> = std::result::Result<T, WikigraphError>;
