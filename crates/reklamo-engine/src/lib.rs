//! Complaint classification engine.
//!
//! Combines the keyword rules in `reklamo-nlp` with the embedding fallback
//! in `reklamo-ai` and produces one [`ClassificationResult`] per complaint.
//!
//! [`ClassificationResult`]: reklamo_core::ClassificationResult

pub mod engine;
pub mod review;

pub use engine::{Engine, EngineBuilder};
pub use review::review_candidate;
