//! Engine configuration: scoring constants, decision thresholds, and
//! the figurative-language patterns used by the metaphor filter.
//!
//! Every field has a default, so a config file only needs to name the
//! values it changes.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Radius (in tokens) of the modifier window around a match.
    pub context_window: usize,
    /// Urgency factor applied to intensified matches.
    pub intensifier_multiplier: f32,
    /// Confidence removed from a match when a hedge word is nearby.
    pub uncertainty_penalty: f32,
    /// Lower bound for confidence after the uncertainty penalty.
    pub min_confidence: f32,
    /// Urgency cap.
    pub max_urgency: f32,
    /// Categories at or above this urgency are reported as detected.
    pub multi_label_threshold: f32,
    /// Rule confidence below which the embedding fallback runs.
    pub fallback_trigger: f32,
    /// Similarity at or above which the embedding result overrides the rules.
    pub fallback_acceptance: f32,
    /// Confidence below which a result is offered to human review.
    pub review_threshold: f32,
    /// Time bound on a single embedding call, in milliseconds.
    pub embed_timeout_ms: u64,
    /// Urgency for an embedding override whose category has no rating.
    pub default_override_urgency: f32,
    /// Case-insensitive regexes describing figurative language.
    pub metaphor_patterns: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_window: 3,
            intensifier_multiplier: 1.5,
            uncertainty_penalty: 0.2,
            min_confidence: 0.1,
            max_urgency: 100.0,
            multi_label_threshold: 50.0,
            fallback_trigger: 0.6,
            fallback_acceptance: 0.75,
            review_threshold: 0.6,
            embed_timeout_ms: 2_000,
            default_override_urgency: 40.0,
            metaphor_patterns: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load a config file and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every numeric field against its legal range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context_window == 0 {
            return Err(invalid("context_window", "must be at least 1"));
        }
        if self.intensifier_multiplier.is_nan() || self.intensifier_multiplier < 1.0 {
            return Err(invalid("intensifier_multiplier", "must be >= 1.0"));
        }
        if self.max_urgency.is_nan() || self.max_urgency <= 0.0 || self.max_urgency > 100.0 {
            return Err(invalid("max_urgency", "must be in (0, 100]"));
        }
        if !(0.0..=self.max_urgency).contains(&self.multi_label_threshold) {
            return Err(invalid("multi_label_threshold", "must be in [0, max_urgency]"));
        }
        if !(0.0..=self.max_urgency).contains(&self.default_override_urgency) {
            return Err(invalid(
                "default_override_urgency",
                "must be in [0, max_urgency]",
            ));
        }
        for (field, value) in [
            ("uncertainty_penalty", self.uncertainty_penalty),
            ("min_confidence", self.min_confidence),
            ("fallback_trigger", self.fallback_trigger),
            ("fallback_acceptance", self.fallback_acceptance),
            ("review_threshold", self.review_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be in [0, 1]"));
            }
        }
        Ok(())
    }

    /// Cap an urgency value to `[0, max_urgency]`.
    pub fn clamp_urgency(&self, urgency: f32) -> f32 {
        urgency.clamp(0.0, self.max_urgency)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
