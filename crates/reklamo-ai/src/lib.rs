//! Embedding fallback: anchor centroids compared by cosine similarity.

pub mod anchors;
pub mod cache;
#[cfg(feature = "onnx")]
mod embedder;
pub mod error;
pub mod fallback;
#[cfg(feature = "http")]
mod http;
pub mod service;

pub use anchors::{AnchorCentroids, AnchorSet};
pub use cache::AnchorCache;
#[cfg(feature = "onnx")]
pub use embedder::{Embedder, OnnxEmbeddingService};
pub use error::{AnchorCacheError, EmbedError, FallbackError};
pub use fallback::FallbackClassifier;
#[cfg(feature = "http")]
pub use http::HttpEmbeddingService;
pub use service::{EmbeddingService, cosine_similarity, normalize};
