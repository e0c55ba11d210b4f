//! Decision orchestrator.
//!
//! Runs the rule path against a lexicon snapshot, decides whether the
//! embedding fallback should run, and merges its verdict. The rule result
//! is always a complete answer on its own; the fallback can only replace
//! the primary category when its similarity clears the acceptance threshold.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use reklamo_ai::{FallbackClassifier, FallbackError};
use reklamo_core::{
    AiVerdict, CategoryScore, ClassificationResult, EngineConfig, FallbackOutcome, LabelMap,
    Method, OTHERS, ReviewCandidate, ScoreSource,
};
use reklamo_nlp::{
    Analyzer, CueLexicon, DictionarySource, LexiconIndex, LexiconStore, RuleAnalysis,
    builtin_group_urgency,
};
use tracing::{debug, info, warn};

use crate::review::review_candidate;

const METAPHOR_SUBCATEGORY: &str = "Metaphor Filtered";
const METAPHOR_URGENCY: u8 = 30;

/// Hybrid complaint classifier.
pub struct Engine {
    lexicon: LexiconStore,
    analyzer: Analyzer,
    fallback: Option<Arc<FallbackClassifier>>,
    dictionary: Option<Arc<dyn DictionarySource>>,
}

#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    labels: LabelMap,
    cues: Option<CueLexicon>,
    fallback: Option<Arc<FallbackClassifier>>,
    dictionary: Option<Arc<dyn DictionarySource>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn labels(mut self, labels: LabelMap) -> Self {
        self.labels = labels;
        self
    }

    pub fn cues(mut self, cues: CueLexicon) -> Self {
        self.cues = Some(cues);
        self
    }

    pub fn fallback(mut self, fallback: Arc<FallbackClassifier>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn dictionary(mut self, source: Arc<dyn DictionarySource>) -> Self {
        self.dictionary = Some(source);
        self
    }

    /// Build the keyword index. A dictionary that fails to load leaves the
    /// engine on built-in keywords.
    pub fn build(self) -> Engine {
        let lexicon = LexiconStore::new(self.labels);
        if let Some(source) = &self.dictionary {
            lexicon.sync(source.as_ref());
        }
        let mut analyzer = Analyzer::new(self.config);
        if let Some(cues) = self.cues {
            analyzer = analyzer.with_cues(cues);
        }
        info!(
            terms = lexicon.snapshot().len(),
            fallback = self.fallback.is_some(),
            "classification engine ready"
        );
        Engine {
            lexicon,
            analyzer,
            fallback: self.fallback,
            dictionary: self.dictionary,
        }
    }
}

/// Rule-path result waiting on a fallback decision.
struct Staged {
    result: ClassificationResult,
    wants_fallback: bool,
    started: Instant,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        self.analyzer.config()
    }

    pub fn labels(&self) -> &LabelMap {
        self.lexicon.labels()
    }

    pub fn lexicon(&self) -> &LexiconStore {
        &self.lexicon
    }

    pub fn fallback(&self) -> Option<&FallbackClassifier> {
        self.fallback.as_deref()
    }

    /// Prepare the embedding fallback (anchor centroids). Returns whether
    /// the fallback is usable; failure leaves the engine in rule-only mode.
    pub async fn warm_up(&self) -> bool {
        let Some(fallback) = &self.fallback else {
            return false;
        };
        match fallback.initialize().await {
            Ok(centroids) => {
                info!(categories = centroids.len(), model = %fallback.model_id(), "embedding fallback ready");
                true
            }
            Err(e) => {
                warn!(error = %e, "embedding fallback not available, rule-only mode");
                false
            }
        }
    }

    /// Reload the dictionary source and rebuild the keyword index if its
    /// fingerprint changed.
    pub fn refresh_dictionary(&self) -> bool {
        match &self.dictionary {
            Some(source) => self.lexicon.sync(source.as_ref()),
            None => false,
        }
    }

    /// Rule path only. Never awaits.
    pub fn classify_rules(&self, text: Option<&str>) -> ClassificationResult {
        let index = self.lexicon.snapshot();
        self.finish_without_fallback(self.stage(&index, text))
    }

    /// Classify one complaint, consulting the embedding fallback when the
    /// rule result is unresolved or low-confidence.
    pub async fn classify(&self, text: Option<&str>) -> ClassificationResult {
        let index = self.lexicon.snapshot();
        let staged = self.stage(&index, text);
        self.finish(staged, text.unwrap_or_default()).await
    }

    /// Rule path for many texts in parallel over one index snapshot.
    pub fn classify_many_rules<S>(&self, texts: &[S]) -> Vec<ClassificationResult>
    where
        S: AsRef<str> + Sync,
    {
        let index = self.lexicon.snapshot();
        texts
            .par_iter()
            .map(|t| self.finish_without_fallback(self.stage(&index, Some(t.as_ref()))))
            .collect()
    }

    /// Classify many texts: rule path in parallel, then fallbacks with at
    /// most [`FallbackClassifier::max_concurrency`] in flight. Output order
    /// matches input order.
    pub async fn classify_many<S>(&self, texts: &[S]) -> Vec<ClassificationResult>
    where
        S: AsRef<str> + Sync,
    {
        let index = self.lexicon.snapshot();
        let staged: Vec<Staged> = texts
            .par_iter()
            .map(|t| self.stage(&index, Some(t.as_ref())))
            .collect();

        let in_flight = self
            .fallback
            .as_ref()
            .map_or(1, |f| f.max_concurrency());
        stream::iter(
            staged
                .into_iter()
                .zip(texts)
                .map(|(s, text)| self.finish(s, text.as_ref())),
        )
        .buffered(in_flight)
        .collect()
        .await
    }

    /// Review-queue fields for a result, using the configured threshold.
    pub fn review_candidate(
        &self,
        text: &str,
        result: &ClassificationResult,
    ) -> Option<ReviewCandidate> {
        review_candidate(text, result, self.config().review_threshold)
    }

    fn stage(&self, index: &LexiconIndex, text: Option<&str>) -> Staged {
        let started = Instant::now();
        let analysis = self.analyzer.analyze(index, text);
        let result = self.rule_result(&analysis);

        let config = self.config();
        let wants_fallback = analysis.metaphor.is_none()
            && analysis.token_count > 0
            && (analysis.resolution.primary.is_none()
                || result.category == OTHERS
                || result.confidence < config.fallback_trigger);

        Staged {
            result,
            wants_fallback,
            started,
        }
    }

    fn rule_result(&self, analysis: &RuleAnalysis) -> ClassificationResult {
        let mut result = ClassificationResult::empty();
        result.token_count = analysis.token_count;
        result.clause_count = analysis.clause_count;

        if analysis.metaphor.is_some() {
            result.subcategory = Some(METAPHOR_SUBCATEGORY.to_string());
            result.urgency_score = METAPHOR_URGENCY;
            result.confidence = 1.0;
            result.method = Method::MetaphorFilter;
            return result;
        }

        let Some(primary) = &analysis.resolution.primary else {
            return result;
        };

        result.category = primary.category.clone();
        result.subcategory = primary.specific_category.clone();
        result.detected_categories = analysis.resolution.detected.clone();
        result.urgency_score = to_score(self.config().clamp_urgency(primary.urgency));
        result.confidence = primary.confidence;
        result.is_negated = primary.negated;
        result.is_intensified = primary.intensified;
        result.is_uncertain = analysis
            .matches
            .iter()
            .any(|m| m.matched.category == primary.category && m.modifiers.uncertain);
        result.matched_keywords = analysis.matched_keywords();
        result.method = Method::RuleBased;
        result
    }

    fn finish_without_fallback(&self, staged: Staged) -> ClassificationResult {
        let Staged {
            mut result,
            wants_fallback,
            started,
        } = staged;
        result.fallback = if wants_fallback {
            FallbackOutcome::Unavailable
        } else {
            FallbackOutcome::NotNeeded
        };
        result.processing_time_ms = elapsed_ms(started);
        result
    }

    async fn finish(&self, staged: Staged, text: &str) -> ClassificationResult {
        if !staged.wants_fallback {
            return self.finish_without_fallback(staged);
        }
        let fallback = match &self.fallback {
            Some(f) if f.is_ready() => f,
            _ => {
                debug!("fallback wanted but embedding service not ready");
                return self.finish_without_fallback(staged);
            }
        };

        let Staged {
            mut result,
            started,
            ..
        } = staged;

        let previous = result.category.clone();
        let timeout = Duration::from_millis(self.config().embed_timeout_ms);
        match fallback.classify_with_timeout(text, timeout).await {
            Ok(verdict) if verdict.similarity >= self.config().fallback_acceptance => {
                self.apply_override(&mut result, verdict);
                info!(from = %previous, to = %result.category, "embedding override applied");
            }
            Ok(verdict) => {
                debug!(
                    kept = %previous,
                    candidate = %verdict.category,
                    similarity = verdict.similarity,
                    "embedding verdict below acceptance threshold"
                );
                result.fallback = FallbackOutcome::Rejected {
                    category: Some(verdict.category.clone()),
                    similarity: Some(verdict.similarity),
                    reason: Some("below acceptance threshold".to_string()),
                };
                result.ai_result = Some(verdict);
            }
            Err(FallbackError::Unavailable) => {
                result.fallback = FallbackOutcome::Unavailable;
            }
            Err(e) => {
                warn!(error = %e, "embedding fallback failed, keeping rule result");
                result.fallback = FallbackOutcome::Rejected {
                    category: None,
                    similarity: None,
                    reason: Some(e.to_string()),
                };
            }
        }

        result.processing_time_ms = elapsed_ms(started);
        result
    }

    /// Replace the primary category with the embedding verdict. Modifier
    /// flags are taken from the rule matches for the new category, if any.
    fn apply_override(&self, result: &mut ClassificationResult, verdict: AiVerdict) {
        let labels = self.labels();
        let pair = labels.resolve(&verdict.category);
        let key = pair.subcategory.as_deref().unwrap_or(&pair.category);

        let urgency = labels
            .urgency_for(key, &pair.category)
            .or_else(|| builtin_group_urgency(key))
            .or_else(|| builtin_group_urgency(&pair.category))
            .unwrap_or(self.config().default_override_urgency);
        let urgency = self.config().clamp_urgency(urgency);
        let confidence = verdict.similarity.clamp(0.0, 1.0);

        let detected = result
            .detected_categories
            .iter()
            .find(|c| c.category == pair.category);
        result.is_negated = detected.is_some_and(|c| c.negated);
        result.is_intensified = detected.is_some_and(|c| c.intensified);
        result.is_uncertain = result
            .matched_keywords
            .iter()
            .any(|k| k.category == pair.category && k.uncertain);

        if detected.is_none() {
            result.detected_categories.insert(
                0,
                CategoryScore {
                    category: pair.category.clone(),
                    specific_category: pair.subcategory.clone(),
                    urgency,
                    confidence,
                    keyword: None,
                    negated: false,
                    intensified: false,
                    source: ScoreSource::Embedding,
                },
            );
            // Stable: the inserted entry stays ahead of equal urgencies.
            result
                .detected_categories
                .sort_by(|a, b| b.urgency.total_cmp(&a.urgency));
        }

        result.fallback = FallbackOutcome::Applied {
            category: pair.category.clone(),
            similarity: verdict.similarity,
        };
        result.category = pair.category;
        result.subcategory = pair.subcategory;
        result.urgency_score = to_score(urgency);
        result.confidence = confidence;
        result.method = Method::Embedding;
        result.ai_used = true;
        result.ai_result = Some(verdict);
    }
}

fn to_score(urgency: f32) -> u8 {
    urgency.round().clamp(0.0, 100.0) as u8
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1_000.0
}
