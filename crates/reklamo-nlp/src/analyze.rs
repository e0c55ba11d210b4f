//! Synchronous rule path: tokenize, filter metaphors, match, apply
//! modifiers, resolve. Pure given a lexicon snapshot.

use reklamo_core::{EngineConfig, MatchedKeyword};
use tracing::debug;

use crate::clause::tokenize;
use crate::lexicon::LexiconIndex;
use crate::matcher::find_matches;
use crate::metaphor::MetaphorFilter;
use crate::modifiers::{CueLexicon, ScoredMatch, score};
use crate::resolver::{Resolution, resolve};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleAnalysis {
    pub token_count: usize,
    pub clause_count: usize,
    /// Pattern that marked the text as figurative. Matching is skipped when set.
    pub metaphor: Option<String>,
    pub matches: Vec<ScoredMatch>,
    pub resolution: Resolution,
}

impl RuleAnalysis {
    pub fn matched_keywords(&self) -> Vec<MatchedKeyword> {
        self.matches.iter().map(ScoredMatch::to_keyword).collect()
    }

    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Cue lists, metaphor patterns, and scoring constants for the rule path.
#[derive(Debug, Clone)]
pub struct Analyzer {
    cues: CueLexicon,
    metaphors: MetaphorFilter,
    config: EngineConfig,
}

impl Analyzer {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            cues: CueLexicon::default(),
            metaphors: MetaphorFilter::new(&config.metaphor_patterns),
            config,
        }
    }

    pub fn with_cues(mut self, cues: CueLexicon) -> Self {
        self.cues = cues;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analyze(&self, index: &LexiconIndex, text: Option<&str>) -> RuleAnalysis {
        let tokenized = tokenize(text);
        let mut analysis = RuleAnalysis {
            token_count: tokenized.token_count(),
            clause_count: tokenized.clause_count(),
            ..Default::default()
        };
        if tokenized.is_empty() {
            return analysis;
        }

        if let Some(pattern) = text.and_then(|t| self.metaphors.find(t)) {
            debug!(pattern, "figurative language, skipping keyword rules");
            analysis.metaphor = Some(pattern.to_string());
            return analysis;
        }

        let raw = find_matches(&tokenized.clauses, index);
        analysis.matches = raw
            .into_iter()
            .map(|m| {
                let tokens = &tokenized.clauses[m.clause_index].tokens;
                let modifiers = self.cues.detect(tokens, &m.span, self.config.context_window);
                score(m, modifiers, &self.config)
            })
            .collect();

        for m in &analysis.matches {
            debug!(
                keyword = %m.matched.keyword,
                category = %m.matched.category,
                clause = m.matched.clause_index,
                base = m.matched.base_urgency,
                urgency = m.urgency,
                negated = m.modifiers.negated,
                intensified = m.modifiers.intensified,
                uncertain = m.modifiers.uncertain,
                "keyword match"
            );
        }

        analysis.resolution = resolve(&analysis.matches, self.config.multi_label_threshold);
        debug!(
            tokens = analysis.token_count,
            clauses = analysis.clause_count,
            matches = analysis.matches.len(),
            detected = analysis.resolution.detected.len(),
            primary = analysis.resolution.primary.as_ref().map(|p| p.category.as_str()),
            "rule analysis"
        );
        analysis
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(text: &str) -> RuleAnalysis {
        Analyzer::default().analyze(&LexiconIndex::builtin(), Some(text))
    }

    fn primary(a: &RuleAnalysis) -> (&str, f32) {
        let p = a.resolution.primary.as_ref().unwrap();
        (p.category.as_str(), p.urgency)
    }

    #[test]
    fn phrase_match_is_not_self_negated() {
        let a = analyze("walang tubig dito");
        assert_eq!(primary(&a), ("Utilities", 55.0));
        assert!(!a.resolution.primary.as_ref().unwrap().negated);

        // The lone "tubig" hit is negated by "walang".
        let tubig = a.matches.iter().find(|m| m.matched.keyword == "tubig").unwrap();
        assert!(tubig.modifiers.negated);
        assert_eq!(tubig.urgency, 0.0);
    }

    #[test]
    fn intensifier_in_same_clause() {
        let a = analyze("sobrang baho ng basura");
        let baho = a.matches.iter().find(|m| m.matched.keyword == "baho").unwrap();
        assert_eq!(baho.urgency, 63.0);
        assert!(baho.modifiers.intensified);
        assert_eq!(primary(&a), ("Sanitation", 63.0));
    }

    #[test]
    fn negation_in_other_clause_does_not_apply() {
        let a = analyze("hindi ako sigurado pero baha dito");
        let baha = a.matches.iter().find(|m| m.matched.keyword == "baha").unwrap();
        assert!(!baha.modifiers.negated);
        assert_eq!(baha.urgency, 75.0);

        let a = analyze("hindi baha dito");
        let baha = a.matches.iter().find(|m| m.matched.keyword == "baha").unwrap();
        assert!(baha.modifiers.negated);
        assert_eq!(baha.urgency, 0.0);
    }

    #[test]
    fn multi_label_text() {
        let a = analyze("bumabaha dito. walang kuryente din");
        let detected: Vec<&str> = a
            .resolution
            .detected
            .iter()
            .map(|s| s.category.as_str())
            .collect();
        assert_eq!(detected, vec!["Environment", "Utilities"]);
    }

    #[test]
    fn empty_text_has_nothing() {
        let a = Analyzer::default().analyze(&LexiconIndex::builtin(), None);
        assert_eq!(a.token_count, 0);
        assert!(a.resolution.primary.is_none());
    }

    #[test]
    fn metaphor_skips_matching() {
        let config = EngineConfig {
            metaphor_patterns: vec![r"heart\s+is\s+on\s+fire".into()],
            ..Default::default()
        };
        let a = Analyzer::new(config).analyze(&LexiconIndex::builtin(), Some("My heart is on fire"));
        assert!(a.metaphor.is_some());
        assert!(!a.has_matches());
        assert_eq!(a.token_count, 5);
    }

    #[test]
    fn uncertainty_lowers_confidence() {
        let a = analyze("baka may sunog");
        let sunog = a.matches.iter().find(|m| m.matched.keyword == "sunog").unwrap();
        assert!(sunog.modifiers.uncertain);
        assert!((sunog.confidence - 0.75).abs() < 1e-6);
        assert_eq!(sunog.urgency, 88.0);
    }
}
