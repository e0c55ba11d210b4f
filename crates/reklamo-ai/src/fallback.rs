//! Embedding fallback classifier.
//!
//! Embeds a complaint and returns the nearest anchor centroid. Centroids
//! are computed once per model and anchor set, restored from the durable
//! cache when possible, and swapped in atomically.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reklamo_core::AiVerdict;
use tracing::{debug, info, warn};

use crate::anchors::{AnchorCentroids, AnchorSet};
use crate::cache::AnchorCache;
use crate::error::{EmbedError, FallbackError};
use crate::service::EmbeddingService;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct FallbackClassifier {
    service: Arc<dyn EmbeddingService>,
    anchors: AnchorSet,
    centroids: RwLock<Option<Arc<AnchorCentroids>>>,
    cache: Option<AnchorCache>,
    timeout: Duration,
    init_timeout: Duration,
}

impl std::fmt::Debug for FallbackClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackClassifier")
            .field("model", &self.service.model_id())
            .field("anchor_categories", &self.anchors.len())
            .field("initialized", &self.current().is_some())
            .finish()
    }
}

impl FallbackClassifier {
    pub fn new(service: Arc<dyn EmbeddingService>, anchors: AnchorSet) -> Self {
        Self {
            service,
            anchors,
            centroids: RwLock::new(None),
            cache: None,
            timeout: DEFAULT_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }

    pub fn with_cache(mut self, cache: AnchorCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Bound on embedding one complaint.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bound on embedding the whole anchor set.
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    pub fn model_id(&self) -> &str {
        self.service.model_id()
    }

    /// Concurrent `classify` calls the service can usefully serve.
    pub fn max_concurrency(&self) -> usize {
        self.service.max_concurrency().max(1)
    }

    /// Service ready and centroids available.
    pub fn is_ready(&self) -> bool {
        self.service.ready() && self.current().is_some()
    }

    pub fn centroids(&self) -> Option<Arc<AnchorCentroids>> {
        self.current()
    }

    fn current(&self) -> Option<Arc<AnchorCentroids>> {
        self.centroids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, centroids: AnchorCentroids) -> Arc<AnchorCentroids> {
        let centroids = Arc::new(centroids);
        *self.centroids.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&centroids));
        centroids
    }

    /// Make centroids available: from the durable cache when it matches the
    /// current model and anchors, otherwise by embedding every anchor phrase.
    pub async fn initialize(&self) -> Result<Arc<AnchorCentroids>, FallbackError> {
        if let Some(existing) = self.current() {
            return Ok(existing);
        }
        if self.anchors.is_empty() {
            return Err(FallbackError::NoAnchors);
        }
        if !self.service.ready() {
            return Err(FallbackError::Unavailable);
        }

        let model_id = self.service.model_id().to_string();
        if let Some(cache) = &self.cache {
            match cache.load(&model_id, &self.anchors) {
                Ok(Some(centroids)) => return Ok(self.install(centroids)),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "ignoring unreadable anchor cache"),
            }
        }

        let phrases = self.anchors.phrases();
        let embeddings = tokio::time::timeout(self.init_timeout, self.service.embed(&phrases))
            .await
            .map_err(|_| EmbedError::Timeout(self.init_timeout))??;
        let centroids = AnchorCentroids::compute(&self.anchors, &embeddings)?;
        info!(
            model = %model_id,
            categories = centroids.len(),
            phrases = phrases.len(),
            dim = centroids.dim(),
            "computed anchor centroids"
        );

        if let Some(cache) = &self.cache
            && let Err(e) = cache.store(&model_id, &self.anchors, &centroids)
        {
            warn!(error = %e, "failed to persist anchor centroids");
        }

        Ok(self.install(centroids))
    }

    /// Nearest anchor category for a text, bounded by the configured timeout.
    ///
    /// Returns [`FallbackError::Unavailable`] when the service is not ready
    /// or [`initialize`](Self::initialize) has not completed.
    pub async fn classify(&self, text: &str) -> Result<AiVerdict, FallbackError> {
        self.classify_with_timeout(text, self.timeout).await
    }

    /// [`classify`](Self::classify) with a per-call bound on the embedding.
    pub async fn classify_with_timeout(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<AiVerdict, FallbackError> {
        if !self.service.ready() {
            return Err(FallbackError::Unavailable);
        }
        let centroids = self.current().ok_or(FallbackError::Unavailable)?;

        let embedding = tokio::time::timeout(timeout, self.service.embed_one(text))
            .await
            .map_err(|_| EmbedError::Timeout(timeout))??;
        if embedding.len() != centroids.dim() {
            return Err(EmbedError::DimensionMismatch {
                expected: centroids.dim(),
                got: embedding.len(),
            }
            .into());
        }

        let verdict = centroids
            .best_match(&embedding)
            .ok_or(FallbackError::NoAnchors)?;
        debug!(category = %verdict.category, similarity = verdict.similarity, "embedding verdict");
        Ok(verdict)
    }
}
