//! Error types for the real-time core.

use thiserror::Error;

/// Main error type for feed operations.
///
/// Rate limiting and countdown evaluation have no error conditions by
/// construction; everything here belongs to the live-query side.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The data layer rejected the live query at establishment time.
    #[error("query rejected: {0}")]
    QueryRejected(String),

    /// A live query failed after establishment. Backend adapters that
    /// prefer typed errors over `FeedEvent::Failed` messages use this.
    #[error("stream error: {0}")]
    Stream(String),

    /// A store document could not be decoded into a domain event.
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Malformed(e.to_string())
    }
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
