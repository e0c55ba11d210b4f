//! Data model shared by the rule path, the embedding fallback, and callers.

use serde::{Deserialize, Serialize};

use crate::taxonomy::OTHERS;

/// Where a keyword entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordSource {
    Builtin,
    Dictionary,
}

/// One active keyword in the lexicon index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    /// Lowercase term of one to three words.
    pub term: String,
    /// Parent category.
    pub category: String,
    pub specific_category: Option<String>,
    pub confidence: f32,
    pub urgency: f32,
    pub source: KeywordSource,
    /// English gloss for Filipino terms, when the dictionary carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// Which path produced a category score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Rules,
    Embedding,
}

/// Best adjusted score observed for one category in one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub specific_category: Option<String>,
    pub urgency: f32,
    pub confidence: f32,
    pub keyword: Option<String>,
    pub negated: bool,
    pub intensified: bool,
    pub source: ScoreSource,
}

/// A keyword hit after contextual modifiers were applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedKeyword {
    pub keyword: String,
    pub category: String,
    pub specific_category: Option<String>,
    pub clause_index: usize,
    pub base_urgency: f32,
    pub final_urgency: f32,
    pub confidence: f32,
    pub negated: bool,
    pub intensified: bool,
    pub uncertain: bool,
    /// Cue word that negated or intensified the match.
    pub trigger_word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// How the final category was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Keyword rules found a category.
    RuleBased,
    /// The embedding fallback overrode the rules.
    Embedding,
    /// Figurative language; keyword rules were skipped.
    MetaphorFilter,
    /// Nothing detected; the generic label was assigned.
    Fallback,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::Embedding => "embedding",
            Self::MetaphorFilter => "metaphor_filter",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nearest anchor centroid for a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiVerdict {
    pub category: String,
    /// Cosine similarity to the winning centroid.
    pub similarity: f32,
    /// Similarity to every centroid, sorted descending.
    pub scores: Vec<(String, f32)>,
}

/// What happened to the embedding fallback for one classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FallbackOutcome {
    /// Rules were confident enough.
    NotNeeded,
    /// The embedding service was not ready.
    Unavailable,
    /// The embedding result replaced the rule-based category.
    Applied { category: String, similarity: f32 },
    /// The embedding ran (or failed) and the rule-based category was kept.
    Rejected {
        category: Option<String>,
        similarity: Option<f32>,
        reason: Option<String>,
    },
}

/// Final output of one classification. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: String,
    pub subcategory: Option<String>,
    /// Categories above the multi-label threshold, urgency descending.
    pub detected_categories: Vec<CategoryScore>,
    pub urgency_score: u8,
    pub confidence: f32,
    pub is_negated: bool,
    pub is_intensified: bool,
    pub is_uncertain: bool,
    pub matched_keywords: Vec<MatchedKeyword>,
    pub method: Method,
    pub ai_used: bool,
    pub fallback: FallbackOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_result: Option<AiVerdict>,
    pub token_count: usize,
    pub clause_count: usize,
    pub processing_time_ms: f64,
}

impl ClassificationResult {
    /// Result for empty input or text with nothing detected.
    pub fn empty() -> Self {
        Self {
            category: OTHERS.to_string(),
            subcategory: None,
            detected_categories: Vec::new(),
            urgency_score: 0,
            confidence: 0.0,
            is_negated: false,
            is_intensified: false,
            is_uncertain: false,
            matched_keywords: Vec::new(),
            method: Method::Fallback,
            ai_used: false,
            fallback: FallbackOutcome::NotNeeded,
            ai_result: None,
            token_count: 0,
            clause_count: 0,
            processing_time_ms: 0.0,
        }
    }

    /// Keyword behind the primary category, if rules produced one.
    pub fn primary_keyword(&self) -> Option<&str> {
        self.detected_categories
            .iter()
            .find(|c| c.category == self.category)
            .and_then(|c| c.keyword.as_deref())
            .or_else(|| {
                self.matched_keywords
                    .iter()
                    .filter(|m| m.category == self.category)
                    .max_by(|a, b| a.final_urgency.total_cmp(&b.final_urgency))
                    .map(|m| m.keyword.as_str())
            })
    }

    /// Equality ignoring the wall-clock timing field.
    pub fn same_outcome(&self, other: &Self) -> bool {
        let mut a = self.clone();
        a.processing_time_ms = 0.0;
        let mut b = other.clone();
        b.processing_time_ms = 0.0;
        a == b
    }
}

/// Fields offered to the human review queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCandidate {
    pub text: String,
    pub detected_category: String,
    pub detected_subcategory: Option<String>,
    pub confidence: f32,
    pub method: Method,
    pub matched_term: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword(term: &str, category: &str, urgency: f32) -> MatchedKeyword {
        MatchedKeyword {
            keyword: term.to_string(),
            category: category.to_string(),
            specific_category: None,
            clause_index: 0,
            base_urgency: urgency,
            final_urgency: urgency,
            confidence: 0.9,
            negated: false,
            intensified: false,
            uncertain: false,
            trigger_word: None,
            translation: None,
        }
    }

    #[test]
    fn empty_result_is_others_with_zero_scores() {
        let r = ClassificationResult::empty();
        assert_eq!(r.category, OTHERS);
        assert_eq!(r.urgency_score, 0);
        assert_eq!(r.confidence, 0.0);
        assert!(r.detected_categories.is_empty());
        assert!(!r.ai_used);
        assert_eq!(r.method, Method::Fallback);
    }

    #[test]
    fn primary_keyword_from_detected() {
        let mut r = ClassificationResult::empty();
        r.category = "Utilities".into();
        r.detected_categories.push(CategoryScore {
            category: "Utilities".into(),
            specific_category: None,
            urgency: 55.0,
            confidence: 0.9,
            keyword: Some("walang tubig".into()),
            negated: false,
            intensified: false,
            source: ScoreSource::Rules,
        });
        assert_eq!(r.primary_keyword(), Some("walang tubig"));
    }

    #[test]
    fn primary_keyword_from_matches_when_below_threshold() {
        let mut r = ClassificationResult::empty();
        r.category = "Noise Complaint".into();
        r.matched_keywords.push(keyword("ingay", "Noise Complaint", 30.0));
        r.matched_keywords.push(keyword("karaoke", "Noise Complaint", 35.0));
        r.matched_keywords.push(keyword("aso", "Stray Animals", 45.0));
        assert_eq!(r.primary_keyword(), Some("karaoke"));
    }

    #[test]
    fn same_outcome_ignores_timing() {
        let a = ClassificationResult::empty();
        let mut b = a.clone();
        b.processing_time_ms = 12.5;
        assert!(a.same_outcome(&b));
        b.confidence = 0.5;
        assert!(!a.same_outcome(&b));
    }

    #[test]
    fn fallback_outcome_serializes_tagged() {
        let json = serde_json::to_value(FallbackOutcome::Applied {
            category: "Environment".into(),
            similarity: 0.5,
        })
        .unwrap();
        assert_eq!(json["state"], "applied");
        assert_eq!(json["category"], "Environment");

        let json = serde_json::to_value(FallbackOutcome::Unavailable).unwrap();
        assert_eq!(json["state"], "unavailable");
    }

    #[test]
    fn method_serializes_snake_case() {
        let json = serde_json::to_string(&Method::MetaphorFilter).unwrap();
        assert_eq!(json, "\"metaphor_filter\"");
        assert_eq!(Method::RuleBased.to_string(), "rule_based");
    }
}
