use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding service not ready")]
    Unavailable,

    #[error("embedding failed: {0}")]
    Failed(String),

    #[error("expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding timed out after {0:?}")]
    Timeout(Duration),

    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum AnchorCacheError {
    #[error("read anchor cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse anchor cache {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum FallbackError {
    /// Service not ready or centroids not computed yet. A normal degraded mode.
    #[error("embedding fallback unavailable")]
    Unavailable,

    #[error("anchor set is empty")]
    NoAnchors,

    #[error(transparent)]
    Embed(#[from] EmbedError),
}
