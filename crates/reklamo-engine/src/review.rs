//! Human review queue candidates.

use reklamo_core::{ClassificationResult, Method, ReviewCandidate};

/// Fields for the review queue when a result is unresolved or below the
/// confidence threshold. Figurative-language results are never offered.
pub fn review_candidate(
    text: &str,
    result: &ClassificationResult,
    threshold: f32,
) -> Option<ReviewCandidate> {
    let needs_review = match result.method {
        Method::MetaphorFilter => false,
        Method::Fallback => true,
        Method::RuleBased | Method::Embedding => result.confidence < threshold,
    };
    if !needs_review {
        return None;
    }

    Some(ReviewCandidate {
        text: text.to_string(),
        detected_category: result.category.clone(),
        detected_subcategory: result.subcategory.clone(),
        confidence: result.confidence,
        method: result.method,
        matched_term: result.primary_keyword().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reklamo_core::{CategoryScore, ScoreSource};

    fn rule_result(confidence: f32) -> ClassificationResult {
        let mut r = ClassificationResult::empty();
        r.category = "Sanitation".into();
        r.method = Method::RuleBased;
        r.confidence = confidence;
        r.detected_categories.push(CategoryScore {
            category: "Sanitation".into(),
            specific_category: None,
            urgency: 63.0,
            confidence,
            keyword: Some("baho".into()),
            negated: false,
            intensified: true,
            source: ScoreSource::Rules,
        });
        r
    }

    #[test]
    fn confident_rule_result_not_offered() {
        assert!(review_candidate("sobrang baho", &rule_result(0.88), 0.6).is_none());
    }

    #[test]
    fn low_confidence_offered_with_term() {
        let c = review_candidate("baka mabaho", &rule_result(0.5), 0.6).unwrap();
        assert_eq!(c.detected_category, "Sanitation");
        assert_eq!(c.method, Method::RuleBased);
        assert_eq!(c.matched_term.as_deref(), Some("baho"));
        assert_eq!(c.text, "baka mabaho");
    }

    #[test]
    fn unresolved_always_offered() {
        let c = review_candidate("hello", &ClassificationResult::empty(), 0.0).unwrap();
        assert_eq!(c.detected_category, "Others");
        assert_eq!(c.method, Method::Fallback);
        assert_eq!(c.matched_term, None);
    }

    #[test]
    fn metaphor_never_offered() {
        let mut r = ClassificationResult::empty();
        r.method = Method::MetaphorFilter;
        r.confidence = 0.0;
        assert!(review_candidate("my heart is on fire", &r, 0.6).is_none());
    }
}
