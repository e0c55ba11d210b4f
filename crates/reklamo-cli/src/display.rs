//! Human-readable cards for classification results and the keyword index.

use reklamo_core::{ClassificationResult, FallbackOutcome, LexiconEntry, ReviewCandidate};
use reklamo_nlp::LexiconStats;

const MAX_LIST_ITEMS: usize = 10;

// ── Classification ──

/// Print one classification as a vertical card.
pub fn print_result_card(
    text: &str,
    result: &ClassificationResult,
    review: Option<&ReviewCandidate>,
) {
    println!("=== {} ===", result.category);
    println!("{text}");
    println!();

    println!("Decision");
    row("category", &result.category);
    if let Some(sub) = &result.subcategory {
        row("subcategory", sub);
    }
    row("urgency", result.urgency_score);
    row("confidence", format!("{:.2}", result.confidence));
    row("method", result.method);
    let flags = flags(result);
    if !flags.is_empty() {
        row("modifiers", flags.join(", "));
    }
    println!();

    if !result.detected_categories.is_empty() {
        println!("Detected categories ({}):", result.detected_categories.len());
        for c in &result.detected_categories {
            let via = c.keyword.as_deref().unwrap_or("(embedding)");
            println!(
                "  {:<22} {:>5.1}  conf {:.2}  via {}",
                c.category, c.urgency, c.confidence, via
            );
        }
        println!();
    }

    if !result.matched_keywords.is_empty() {
        println!("Keyword matches ({}):", result.matched_keywords.len());
        for k in result.matched_keywords.iter().take(MAX_LIST_ITEMS) {
            let mut note = String::new();
            if let Some(trigger) = &k.trigger_word {
                note = format!("  [{trigger}]");
            }
            println!(
                "  {:<22} {:<18} clause {}  {:>5.1} -> {:>5.1}{}",
                k.keyword, k.category, k.clause_index, k.base_urgency, k.final_urgency, note
            );
        }
        if result.matched_keywords.len() > MAX_LIST_ITEMS {
            println!(
                "  ... and {} more",
                result.matched_keywords.len() - MAX_LIST_ITEMS
            );
        }
        println!();
    }

    println!("Embedding fallback");
    row("outcome", describe_fallback(&result.fallback));
    if let Some(ai) = &result.ai_result {
        let top: Vec<String> = ai
            .scores
            .iter()
            .take(3)
            .map(|(c, s)| format!("{c} {s:.3}"))
            .collect();
        row("nearest", top.join(", "));
    }
    println!();

    println!("Stats");
    row("tokens", result.token_count);
    row("clauses", result.clause_count);
    row("time", format!("{:.2} ms", result.processing_time_ms));

    if let Some(review) = review {
        println!();
        println!("Review");
        row(
            "queued",
            format!(
                "{} at confidence {:.2}",
                review.detected_category, review.confidence
            ),
        );
    }
}

fn flags(result: &ClassificationResult) -> Vec<&'static str> {
    [
        (result.is_negated, "negated"),
        (result.is_intensified, "intensified"),
        (result.is_uncertain, "uncertain"),
        (result.ai_used, "ai"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect()
}

fn describe_fallback(outcome: &FallbackOutcome) -> String {
    match outcome {
        FallbackOutcome::NotNeeded => "not needed".to_string(),
        FallbackOutcome::Unavailable => "unavailable".to_string(),
        FallbackOutcome::Applied {
            category,
            similarity,
        } => format!("applied {category} ({similarity:.3})"),
        FallbackOutcome::Rejected {
            category,
            similarity,
            reason,
        } => {
            let mut parts = vec!["rejected".to_string()];
            if let (Some(c), Some(s)) = (category, similarity) {
                parts.push(format!("{c} ({s:.3})"));
            }
            if let Some(r) = reason {
                parts.push(format!("- {r}"));
            }
            parts.join(" ")
        }
    }
}

// ── Lexicon ──

pub fn print_lexicon_stats(stats: &LexiconStats) {
    println!("Keyword index");
    row("terms", stats.terms);
    row("built-in", stats.builtin_terms);
    row("dictionary", stats.dictionary_terms);
    row("skipped rows", stats.skipped_rows);
    match &stats.fingerprint {
        Some(f) => row(
            "dictionary version",
            format!("{} ({} entries)", f.version, f.total_entries),
        ),
        None => row("dictionary version", "none (built-in only)"),
    }
    println!();
}

pub fn print_entry(entry: &LexiconEntry) {
    println!("{}", entry.term);
    row("category", &entry.category);
    if let Some(sub) = &entry.specific_category {
        row("subcategory", sub);
    }
    row("urgency", entry.urgency);
    row("confidence", format!("{:.2}", entry.confidence));
    row("source", format!("{:?}", entry.source).to_lowercase());
    if let Some(t) = &entry.translation {
        row("translation", t);
    }
    println!();
}

pub fn print_entries(category: &str, entries: &[&LexiconEntry]) {
    println!("{category} ({} terms):", entries.len());
    for e in entries {
        println!("  {:<26} {:>5.1}  {:.2}", e.term, e.urgency, e.confidence);
    }
    println!();
}

fn row(label: &str, value: impl std::fmt::Display) {
    println!("  {label:<22} {value}");
}
