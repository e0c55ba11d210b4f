//! Clause tokenizer.
//!
//! Splits a complaint into clauses at sentence punctuation and at a fixed
//! set of English/Tagalog/Bisaya conjunctions, then splits each clause into
//! lowercase tokens. Modifier windows are scoped to a single clause, so
//! "walang tubig pero ok ang kalsada" never lets the second clause affect
//! the first.

/// Punctuation that ends a clause.
const CLAUSE_PUNCTUATION: &[char] = &['.', '!', '?', ';'];

/// Whole-word conjunctions that start a new clause. They are not kept as tokens.
pub const CLAUSE_CONJUNCTIONS: &[&str] = &[
    "pero",
    "but",
    "kaso",
    "however",
    "kaya",
    "so",
    "then",
    "pagkatapos",
    "undangan",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Normalised clause text (tokens joined by single spaces).
    pub text: String,
    /// Tokens in order. Indices into this vector are clause-local.
    pub tokens: Vec<String>,
    /// Global index of the first token.
    pub start_index: usize,
    pub clause_index: usize,
}

/// A token annotated with its position in the whole text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRef {
    pub token: String,
    pub global_index: usize,
    pub clause_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    pub clauses: Vec<Clause>,
    pub tokens: Vec<TokenRef>,
}

impl Tokenized {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }
}

/// Split text into clauses and tokens. `None` and blank input yield an empty result.
pub fn tokenize(text: Option<&str>) -> Tokenized {
    let Some(text) = text else {
        return Tokenized::default();
    };

    let mut out = Tokenized::default();
    let lowered = text.to_lowercase();

    for sentence in lowered.split(CLAUSE_PUNCTUATION) {
        let mut current: Vec<String> = Vec::new();
        for token in words(sentence) {
            if CLAUSE_CONJUNCTIONS.contains(&token.as_str()) {
                push_clause(&mut out, std::mem::take(&mut current));
            } else {
                current.push(token);
            }
        }
        push_clause(&mut out, current);
    }

    out
}

/// Tokenize a phrase the same way clause text is tokenized, without
/// clause splitting. Used to normalise lexicon terms and cue words so
/// they compare equal to clause tokens.
pub fn phrase_tokens(phrase: &str) -> Vec<String> {
    words(&phrase.to_lowercase()).collect()
}

fn push_clause(out: &mut Tokenized, tokens: Vec<String>) {
    if tokens.is_empty() {
        return;
    }
    let clause_index = out.clauses.len();
    let start_index = out.tokens.len();
    out.tokens
        .extend(tokens.iter().enumerate().map(|(i, token)| TokenRef {
            token: token.clone(),
            global_index: start_index + i,
            clause_index,
        }));
    out.clauses.push(Clause {
        text: tokens.join(" "),
        tokens,
        start_index,
        clause_index,
    });
}

/// Lowercase words of an already-lowercased segment. Apostrophes are
/// deleted ("isn't" becomes "isnt"); any other character that is not
/// alphanumeric, `-`, or `_` separates words. Hyphen-only words are dropped.
fn words(segment: &str) -> impl Iterator<Item = String> + '_ {
    segment
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || is_apostrophe(c)))
        .map(|w| w.chars().filter(|&c| !is_apostrophe(c)).collect::<String>())
        .filter(|w| !w.is_empty() && !w.chars().all(|c| c == '-'))
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}' | '`')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause_tokens(t: &Tokenized) -> Vec<Vec<&str>> {
        t.clauses
            .iter()
            .map(|c| c.tokens.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn none_and_blank_are_empty() {
        assert!(tokenize(None).is_empty());
        assert!(tokenize(Some("")).is_empty());
        assert!(tokenize(Some("  ... !! ")).is_empty());
        assert_eq!(tokenize(Some("   ")).clause_count(), 0);
    }

    #[test]
    fn splits_on_punctuation() {
        let t = tokenize(Some("Walang tubig dito. Grabe na!"));
        assert_eq!(
            clause_tokens(&t),
            vec![vec!["walang", "tubig", "dito"], vec!["grabe", "na"]]
        );
    }

    #[test]
    fn splits_on_conjunctions_and_drops_them() {
        let t = tokenize(Some("No water here, but the road is fine"));
        assert_eq!(
            clause_tokens(&t),
            vec![vec!["no", "water", "here"], vec!["the", "road", "is", "fine"]]
        );

        let t = tokenize(Some("baha sa kalsada pero walang sunog"));
        assert_eq!(t.clause_count(), 2);
    }

    #[test]
    fn conjunction_inside_word_does_not_split() {
        let t = tokenize(Some("the person is sober"));
        assert_eq!(t.clause_count(), 1);
        assert_eq!(t.token_count(), 4);
    }

    #[test]
    fn indices_are_global_and_clause_local() {
        let t = tokenize(Some("mabaho dito; sobrang baha"));
        assert_eq!(t.clauses[1].start_index, 2);
        assert_eq!(t.clauses[1].clause_index, 1);
        assert_eq!(t.tokens[3].token, "baha");
        assert_eq!(t.tokens[3].global_index, 3);
        assert_eq!(t.tokens[3].clause_index, 1);
    }

    #[test]
    fn keeps_hyphens_and_deletes_apostrophes() {
        let t = tokenize(Some("It isn't bako-bako -- nag-apaw ang kanal"));
        assert_eq!(
            clause_tokens(&t),
            vec![vec!["it", "isnt", "bako-bako", "nag-apaw", "ang", "kanal"]]
        );
    }

    #[test]
    fn empty_clauses_are_discarded() {
        let t = tokenize(Some("..but.. pero baha"));
        assert_eq!(clause_tokens(&t), vec![vec!["baha"]]);
        assert_eq!(t.clauses[0].clause_index, 0);
    }

    #[test]
    fn clause_text_is_normalised() {
        let t = tokenize(Some("  Walang   KURYENTE,  grabe "));
        assert_eq!(t.clauses[0].text, "walang kuryente grabe");
    }

    #[test]
    fn phrase_tokens_match_clause_tokens() {
        assert_eq!(phrase_tokens("Can't"), vec!["cant"]);
        assert_eq!(phrase_tokens(" Walang  Tubig "), vec!["walang", "tubig"]);
    }
}
