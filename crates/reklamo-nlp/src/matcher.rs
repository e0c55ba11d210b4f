//! Keyword matcher: unigram, bigram, and trigram lookups per clause.

use std::ops::Range;

use reklamo_core::KeywordSource;

use crate::clause::Clause;
use crate::lexicon::{LexiconIndex, MAX_TERM_WORDS};

/// One keyword hit. Every n-gram hit is reported, including hits that
/// overlap a longer phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub keyword: String,
    pub clause_index: usize,
    /// Clause-local index of the first token.
    pub local_index: usize,
    /// Clause-local token span covered by the keyword.
    pub span: Range<usize>,
    pub category: String,
    pub specific_category: Option<String>,
    pub base_urgency: f32,
    pub confidence: f32,
    pub source: KeywordSource,
    pub translation: Option<String>,
}

/// Scan every clause for keywords. Hits are ordered by clause, then start
/// token, then length.
pub fn find_matches(clauses: &[Clause], index: &LexiconIndex) -> Vec<Match> {
    let mut matches = Vec::new();
    for clause in clauses {
        let tokens = &clause.tokens;
        for start in 0..tokens.len() {
            for len in 1..=MAX_TERM_WORDS.min(tokens.len() - start) {
                let span = start..start + len;
                let gram = tokens[span.clone()].join(" ");
                if let Some(entry) = index.get(&gram) {
                    matches.push(Match {
                        keyword: gram,
                        clause_index: clause.clause_index,
                        local_index: start,
                        span,
                        category: entry.category.clone(),
                        specific_category: entry.specific_category.clone(),
                        base_urgency: entry.urgency,
                        confidence: entry.confidence,
                        source: entry.source,
                        translation: entry.translation.clone(),
                    });
                }
            }
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::tokenize;

    fn keywords(text: &str) -> Vec<(String, usize, usize)> {
        let t = tokenize(Some(text));
        find_matches(&t.clauses, &LexiconIndex::builtin())
            .into_iter()
            .map(|m| (m.keyword, m.clause_index, m.local_index))
            .collect()
    }

    #[test]
    fn finds_unigrams_and_phrases() {
        let found = keywords("walang tubig dito");
        assert_eq!(
            found,
            vec![("walang tubig".to_string(), 0, 0), ("tubig".to_string(), 0, 1)]
        );
    }

    #[test]
    fn finds_trigrams() {
        let t = tokenize(Some("may butas sa kalsada"));
        let found = find_matches(&t.clauses, &LexiconIndex::builtin());
        let trigram = found.iter().find(|m| m.keyword == "butas sa kalsada").unwrap();
        assert_eq!(trigram.span, 1..4);
        assert_eq!(trigram.category, "Infrastructure");
        assert!(found.iter().any(|m| m.keyword == "butas"));
        assert!(found.iter().any(|m| m.keyword == "kalsada"));
    }

    #[test]
    fn phrases_do_not_cross_clauses() {
        // "walang" and "tubig" are in different clauses.
        let found = keywords("walang. tubig");
        assert_eq!(found, vec![("tubig".to_string(), 1, 0)]);
    }

    #[test]
    fn no_match_is_empty() {
        assert!(keywords("hello world").is_empty());
        assert!(keywords("").is_empty());
    }

    #[test]
    fn match_carries_entry_scores() {
        let t = tokenize(Some("grabe ang baha"));
        let found = find_matches(&t.clauses, &LexiconIndex::builtin());
        let baha = found.iter().find(|m| m.keyword == "baha").unwrap();
        assert_eq!(baha.base_urgency, 75.0);
        assert_eq!(baha.confidence, 0.92);
        assert_eq!(baha.source, KeywordSource::Builtin);
        assert!(found.iter().any(|m| m.keyword == "grabe ang baha"));
    }
}
