//! Multi-label resolution.
//!
//! Each parent category keeps its strongest match. Categories at or above
//! the threshold are all reported; the primary category is the top one, or
//! the single best match when nothing clears the threshold.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use reklamo_core::{CategoryScore, ScoreSource};

use crate::modifiers::ScoredMatch;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Urgency descending, then category name. No duplicates.
    pub detected: Vec<CategoryScore>,
    /// `None` only when there were no matches.
    pub primary: Option<CategoryScore>,
    /// Whether the primary category cleared the threshold.
    pub above_threshold: bool,
}

pub fn resolve(matches: &[ScoredMatch], threshold: f32) -> Resolution {
    // Matches arrive in text order, so keeping the incumbent on a full tie
    // keeps the first one seen.
    let mut best: BTreeMap<&str, &ScoredMatch> = BTreeMap::new();
    for m in matches {
        best.entry(m.matched.category.as_str())
            .and_modify(|current| {
                if stronger(m, *current) == Ordering::Greater {
                    *current = m;
                }
            })
            .or_insert(m);
    }

    let scores: Vec<CategoryScore> = best.values().map(|m| category_score(m)).collect();

    let mut detected: Vec<CategoryScore> = scores
        .iter()
        .filter(|s| s.urgency >= threshold)
        .cloned()
        .collect();
    sort_detected(&mut detected);

    if let Some(top) = detected.first() {
        return Resolution {
            primary: Some(top.clone()),
            detected,
            above_threshold: true,
        };
    }

    // Nothing cleared the threshold: best by urgency, then confidence, then name.
    let primary = scores.into_iter().min_by(|a, b| {
        b.urgency
            .total_cmp(&a.urgency)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.category.cmp(&b.category))
    });

    Resolution {
        detected,
        primary,
        above_threshold: false,
    }
}

/// Sort by urgency descending, then category name. Stable, so equal
/// entries keep their relative order.
pub fn sort_detected(detected: &mut [CategoryScore]) {
    detected.sort_by(|a, b| {
        b.urgency
            .total_cmp(&a.urgency)
            .then_with(|| a.category.cmp(&b.category))
    });
}

fn stronger(a: &ScoredMatch, b: &ScoredMatch) -> Ordering {
    a.urgency
        .total_cmp(&b.urgency)
        .then_with(|| a.confidence.total_cmp(&b.confidence))
}

fn category_score(m: &ScoredMatch) -> CategoryScore {
    CategoryScore {
        category: m.matched.category.clone(),
        specific_category: m.matched.specific_category.clone(),
        urgency: m.urgency,
        confidence: m.confidence,
        keyword: Some(m.matched.keyword.clone()),
        negated: m.modifiers.negated,
        intensified: m.modifiers.intensified,
        source: ScoreSource::Rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Match;
    use crate::modifiers::ModifierOutcome;
    use reklamo_core::KeywordSource;

    fn scored(keyword: &str, category: &str, urgency: f32, confidence: f32) -> ScoredMatch {
        ScoredMatch {
            matched: Match {
                keyword: keyword.to_string(),
                clause_index: 0,
                local_index: 0,
                span: 0..1,
                category: category.to_string(),
                specific_category: None,
                base_urgency: urgency,
                confidence,
                source: KeywordSource::Builtin,
                translation: None,
            },
            modifiers: ModifierOutcome::default(),
            urgency,
            confidence,
        }
    }

    fn names(r: &Resolution) -> Vec<&str> {
        r.detected.iter().map(|s| s.category.as_str()).collect()
    }

    #[test]
    fn empty_matches_resolve_to_nothing() {
        let r = resolve(&[], 50.0);
        assert!(r.detected.is_empty());
        assert!(r.primary.is_none());
    }

    #[test]
    fn keeps_max_per_category() {
        let r = resolve(
            &[
                scored("tubig", "Utilities", 0.0, 0.9),
                scored("walang tubig", "Utilities", 55.0, 0.9),
            ],
            50.0,
        );
        assert_eq!(names(&r), vec!["Utilities"]);
        let primary = r.primary.unwrap();
        assert_eq!(primary.urgency, 55.0);
        assert_eq!(primary.keyword.as_deref(), Some("walang tubig"));
    }

    #[test]
    fn multi_label_sorted_by_urgency_then_name() {
        let r = resolve(
            &[
                scored("brownout", "Utilities", 55.0, 0.9),
                scored("baha", "Environment", 75.0, 0.92),
                scored("lubak", "Infrastructure", 55.0, 0.9),
                scored("ingay", "Noise Complaint", 30.0, 0.8),
            ],
            50.0,
        );
        assert_eq!(names(&r), vec!["Environment", "Infrastructure", "Utilities"]);
        assert_eq!(r.primary.unwrap().category, "Environment");
        assert!(r.above_threshold);
    }

    #[test]
    fn ties_within_category_prefer_confidence_then_first() {
        let r = resolve(
            &[
                scored("a", "Sanitation", 42.0, 0.7),
                scored("b", "Sanitation", 42.0, 0.88),
                scored("c", "Sanitation", 42.0, 0.88),
            ],
            40.0,
        );
        assert_eq!(r.primary.unwrap().keyword.as_deref(), Some("b"));
    }

    #[test]
    fn below_threshold_picks_global_best() {
        let r = resolve(
            &[
                scored("ingay", "Noise Complaint", 30.0, 0.8),
                scored("lamok", "Pest Infestation", 40.0, 0.82),
                scored("trash", "Sanitation", 40.0, 0.88),
            ],
            50.0,
        );
        assert!(r.detected.is_empty());
        assert!(!r.above_threshold);
        assert_eq!(r.primary.unwrap().category, "Sanitation");
    }

    #[test]
    fn below_threshold_full_tie_uses_name() {
        let r = resolve(
            &[
                scored("x", "Stray Animals", 45.0, 0.85),
                scored("y", "Noise Complaint", 45.0, 0.85),
            ],
            50.0,
        );
        assert_eq!(r.primary.unwrap().category, "Noise Complaint");
    }

    #[test]
    fn negated_only_category_still_primary_below_threshold() {
        let mut m = scored("baha", "Environment", 0.0, 0.92);
        m.modifiers.negated = true;
        let r = resolve(&[m], 50.0);
        assert!(r.detected.is_empty());
        let primary = r.primary.unwrap();
        assert_eq!(primary.category, "Environment");
        assert!(primary.negated);
    }
}
