//! Shared data model, category hierarchy, and configuration for the complaint classifier.

pub mod config;
pub mod error;
pub mod taxonomy;
pub mod types;

pub use config::EngineConfig;
pub use error::ConfigError;
pub use taxonomy::{
    CategoryHierarchy, CategoryNormalizer, HierarchyOverride, LIFE_THREATENING_URGENCY, LabelMap,
    LabelPair, OTHERS, Taxonomy, TaxonomyCategory, TaxonomyNormalizer,
};
pub use types::{
    AiVerdict, CategoryScore, ClassificationResult, FallbackOutcome, KeywordSource, LexiconEntry,
    MatchedKeyword, Method, ReviewCandidate, ScoreSource,
};
