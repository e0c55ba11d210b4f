//! Figurative-language filter ("my heart is on fire").

use regex::{Regex, RegexBuilder};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct MetaphorFilter {
    patterns: Vec<Regex>,
}

impl MetaphorFilter {
    /// Compile case-insensitive patterns. Invalid patterns are logged and skipped.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|p| {
                let p = p.as_ref();
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| warn!(pattern = p, error = %e, "skipping invalid metaphor pattern"))
                    .ok()
            })
            .collect();
        Self { patterns }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The first pattern matching the text, if any.
    pub fn find(&self, text: &str) -> Option<&str> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        self.patterns
            .iter()
            .find(|re| re.is_match(&normalized))
            .map(Regex::as_str)
    }
}
