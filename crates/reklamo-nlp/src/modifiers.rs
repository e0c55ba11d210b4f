//! Contextual modifiers: negation, intensifier, and uncertainty cues found
//! near a keyword within its own clause.

use std::ops::Range;

use reklamo_core::{EngineConfig, MatchedKeyword};

use crate::clause::phrase_tokens;
use crate::matcher::Match;

const NEGATIONS: &[&str] = &[
    // English (apostrophes are removed during tokenization)
    "no", "not", "none", "never", "nothing", "false", "fake", "isnt", "wasnt", "arent",
    "doesnt", "didnt", "dont", "wont", "wouldnt", "shouldnt", "cannot", "cant", "without",
    // Tagalog
    "wala", "walang", "hindi", "di", "huwag", "ayaw", "hindi naman", "di naman",
    "walang problema", "hindi totoo", "di totoo", "wala namang",
    // Bisaya
    "walay", "dili", "way", "wa",
];

const INTENSIFIERS: &[&str] = &[
    // English
    "extreme", "extremely", "very", "severe", "severely", "massive", "huge", "critical",
    "urgent", "emergency", "dangerous", "deadly", "serious", "major", "terrible", "awful",
    "horrible", "worst", "intense",
    // Tagalog
    "sobra", "sobrang", "grabe", "grabeng", "malala", "malalang", "matindi", "matinding",
    "napaka", "lubha", "lubhang", "todo", "husto", "hustong", "labis", "labis na",
    "sukdulan",
    // Bisaya
    "pirti", "pirting", "dako", "dakong", "grabe kaayo", "perte", "hilabihan", "lawom",
    "kusog", "kusog kaayo", "bangis",
];

const UNCERTAINTY: &[&str] = &[
    // English
    "maybe", "perhaps", "possibly", "might", "likely", "unsure", "think", "guess",
    // Tagalog
    "baka", "siguro", "tila", "yata", "parang", "marahil", "ata",
    // Bisaya
    "tingali", "basi", "murag", "daw", "basin",
];

/// A list of cue phrases, each pre-tokenized. Longer cues are tried first.
#[derive(Debug, Clone, Default)]
pub struct CueList {
    cues: Vec<Vec<String>>,
}

impl CueList {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cues: Vec<Vec<String>> = phrases
            .into_iter()
            .map(|p| phrase_tokens(p.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        cues.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        cues.dedup();
        Self { cues }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// First cue, in token order, that lies entirely inside `window`.
    pub fn find_in(&self, window: &[String]) -> Option<String> {
        (0..window.len()).find_map(|start| {
            self.cues
                .iter()
                .find(|cue| window[start..].starts_with(cue))
                .map(|cue| cue.join(" "))
        })
    }
}

/// The three cue lists used by the modifier detector.
#[derive(Debug, Clone)]
pub struct CueLexicon {
    pub negations: CueList,
    pub intensifiers: CueList,
    pub uncertainty: CueList,
}

impl Default for CueLexicon {
    fn default() -> Self {
        Self {
            negations: CueList::new(NEGATIONS),
            intensifiers: CueList::new(INTENSIFIERS),
            uncertainty: CueList::new(UNCERTAINTY),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierOutcome {
    pub negated: bool,
    pub intensified: bool,
    pub uncertain: bool,
    /// Negation or intensifier cue that fired.
    pub trigger_word: Option<String>,
    pub uncertainty_word: Option<String>,
}

impl CueLexicon {
    /// Inspect the tokens around `span`, at most `radius` tokens on each
    /// side and never outside `tokens` (one clause). Tokens of the span
    /// itself are excluded so a phrase cannot modify itself.
    ///
    /// Negation takes precedence over intensification. Uncertainty is
    /// checked either way.
    pub fn detect(&self, tokens: &[String], span: &Range<usize>, radius: usize) -> ModifierOutcome {
        let start = span.start.min(tokens.len());
        let end = span.end.min(tokens.len()).max(start);
        let left = &tokens[start.saturating_sub(radius)..start];
        let right = &tokens[end..(end + radius).min(tokens.len())];

        let find = |cues: &CueList| cues.find_in(left).or_else(|| cues.find_in(right));

        let mut outcome = ModifierOutcome::default();
        if let Some(cue) = find(&self.negations) {
            outcome.negated = true;
            outcome.trigger_word = Some(cue);
        } else if let Some(cue) = find(&self.intensifiers) {
            outcome.intensified = true;
            outcome.trigger_word = Some(cue);
        }
        if let Some(cue) = find(&self.uncertainty) {
            outcome.uncertain = true;
            outcome.uncertainty_word = Some(cue);
        }
        outcome
    }
}

/// A match with its modifiers applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub matched: Match,
    pub modifiers: ModifierOutcome,
    pub urgency: f32,
    pub confidence: f32,
}

impl ScoredMatch {
    pub fn to_keyword(&self) -> MatchedKeyword {
        MatchedKeyword {
            keyword: self.matched.keyword.clone(),
            category: self.matched.category.clone(),
            specific_category: self.matched.specific_category.clone(),
            clause_index: self.matched.clause_index,
            base_urgency: self.matched.base_urgency,
            final_urgency: self.urgency,
            confidence: self.confidence,
            negated: self.modifiers.negated,
            intensified: self.modifiers.intensified,
            uncertain: self.modifiers.uncertain,
            trigger_word: self.modifiers.trigger_word.clone(),
            translation: self.matched.translation.clone(),
        }
    }
}

/// Apply modifier outcomes to a match's urgency and confidence.
///
/// Negated urgency is 0. Intensified urgency is multiplied and capped.
/// Uncertainty lowers confidence by the penalty, floored at the minimum.
pub fn score(matched: Match, modifiers: ModifierOutcome, config: &EngineConfig) -> ScoredMatch {
    let urgency = if modifiers.negated {
        0.0
    } else if modifiers.intensified {
        matched.base_urgency * config.intensifier_multiplier
    } else {
        matched.base_urgency
    };
    let confidence = if modifiers.uncertain {
        (matched.confidence - config.uncertainty_penalty).max(config.min_confidence)
    } else {
        matched.confidence
    };

    ScoredMatch {
        urgency: config.clamp_urgency(urgency),
        confidence,
        matched,
        modifiers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reklamo_core::KeywordSource;

    fn tokens(s: &str) -> Vec<String> {
        phrase_tokens(s)
    }

    fn matched(keyword: &str, span: Range<usize>, urgency: f32, confidence: f32) -> Match {
        Match {
            keyword: keyword.to_string(),
            clause_index: 0,
            local_index: span.start,
            span,
            category: "Sanitation".into(),
            specific_category: None,
            base_urgency: urgency,
            confidence,
            source: KeywordSource::Builtin,
            translation: None,
        }
    }

    #[test]
    fn negation_before_keyword() {
        let cues = CueLexicon::default();
        let t = tokens("hindi mabaho dito");
        let out = cues.detect(&t, &(1..2), 3);
        assert!(out.negated);
        assert!(!out.intensified);
        assert_eq!(out.trigger_word.as_deref(), Some("hindi"));
    }

    #[test]
    fn phrase_is_not_self_negated() {
        let cues = CueLexicon::default();
        let t = tokens("walang tubig dito");
        let out = cues.detect(&t, &(0..2), 3);
        assert!(!out.negated);
    }

    #[test]
    fn cue_outside_radius_ignored() {
        let cues = CueLexicon::default();
        let t = tokens("hindi a b c baha");
        assert!(!cues.detect(&t, &(4..5), 3).negated);
        assert!(cues.detect(&t, &(4..5), 4).negated);
    }

    #[test]
    fn negation_short_circuits_intensifier() {
        let cues = CueLexicon::default();
        let t = tokens("hindi sobrang baho");
        let out = cues.detect(&t, &(2..3), 3);
        assert!(out.negated);
        assert!(!out.intensified);
    }

    #[test]
    fn uncertainty_coexists_with_intensifier() {
        let cues = CueLexicon::default();
        let t = tokens("baka sobrang baha");
        let out = cues.detect(&t, &(2..3), 3);
        assert!(out.intensified);
        assert!(out.uncertain);
        assert_eq!(out.trigger_word.as_deref(), Some("sobrang"));
        assert_eq!(out.uncertainty_word.as_deref(), Some("baka"));
    }

    #[test]
    fn multi_word_cue_preferred() {
        let cues = CueLexicon::default();
        let t = tokens("baha grabe kaayo");
        let out = cues.detect(&t, &(0..1), 3);
        assert_eq!(out.trigger_word.as_deref(), Some("grabe kaayo"));
    }

    #[test]
    fn custom_cue_lists() {
        let cues = CueLexicon {
            negations: CueList::new(["nope"]),
            intensifiers: CueList::new(Vec::<String>::new()),
            uncertainty: CueList::default(),
        };
        let t = tokens("nope fire");
        assert!(cues.detect(&t, &(1..2), 3).negated);
        assert!(!cues.detect(&tokens("hindi fire"), &(1..2), 3).negated);
    }

    #[test]
    fn score_negated_is_zero() {
        let config = EngineConfig::default();
        let m = matched("baho", 1..2, 42.0, 0.88);
        let s = score(
            m,
            ModifierOutcome {
                negated: true,
                ..Default::default()
            },
            &config,
        );
        assert_eq!(s.urgency, 0.0);
        assert_eq!(s.confidence, 0.88);
    }

    #[test]
    fn score_intensified_multiplies_and_caps() {
        let config = EngineConfig::default();
        let intensified = ModifierOutcome {
            intensified: true,
            ..Default::default()
        };
        let s = score(matched("baho", 1..2, 42.0, 0.88), intensified.clone(), &config);
        assert_eq!(s.urgency, 63.0);

        let s = score(matched("sunog", 1..2, 88.0, 0.95), intensified, &config);
        assert_eq!(s.urgency, 100.0);
    }

    #[test]
    fn score_uncertain_penalty_floored() {
        let config = EngineConfig::default();
        let uncertain = ModifierOutcome {
            uncertain: true,
            ..Default::default()
        };
        let s = score(matched("baho", 1..2, 42.0, 0.88), uncertain.clone(), &config);
        assert!((s.confidence - 0.68).abs() < 1e-6);
        assert_eq!(s.urgency, 42.0);

        let s = score(matched("baho", 1..2, 42.0, 0.15), uncertain, &config);
        assert_eq!(s.confidence, 0.1);
    }
}
