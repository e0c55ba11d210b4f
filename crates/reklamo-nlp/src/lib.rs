//! Rule-based complaint analysis for English, Tagalog, and Bisaya text.

pub mod analyze;
pub mod clause;
pub mod error;
pub mod lexicon;
pub mod matcher;
pub mod metaphor;
pub mod modifiers;
pub mod resolver;

pub use analyze::{Analyzer, RuleAnalysis};
pub use clause::{Clause, TokenRef, Tokenized, phrase_tokens, tokenize};
pub use error::LexiconError;
pub use lexicon::{
    Dictionary, DictionaryFingerprint, DictionaryRow, DictionarySource, JsonFileSource,
    LexiconIndex, LexiconStats, LexiconStore, builtin_group_urgency,
};
pub use matcher::{Match, find_matches};
pub use metaphor::MetaphorFilter;
pub use modifiers::{CueLexicon, CueList, ModifierOutcome, ScoredMatch};
pub use resolver::{Resolution, resolve};
