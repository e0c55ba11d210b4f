//! Remote embeddings over HTTP (Ollama-compatible `/api/embed`).

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::EmbedError;
use crate::service::EmbeddingService;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding service reached over HTTP.
///
/// Not ready until [`warm_up`](Self::warm_up) succeeds; a later request
/// failure does not clear readiness, it surfaces as an error for that call.
pub struct HttpEmbeddingService {
    client: reqwest::Client,
    base_url: String,
    model: String,
    model_id: String,
    ready: AtomicBool,
}

impl HttpEmbeddingService {
    /// `base_url` should be like `http://localhost:11434` (no trailing slash).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        Self {
            client: reqwest::Client::new(),
            model_id: format!("http:{model}"),
            base_url,
            model,
            ready: AtomicBool::new(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the service with one short text. Marks the service ready and
    /// returns the embedding dimension on success.
    pub async fn warm_up(&self) -> Result<usize, EmbedError> {
        match self.request(&["ping".to_string()]).await {
            Ok(vectors) => {
                let dim = vectors.first().map_or(0, Vec::len);
                if dim == 0 {
                    return Err(EmbedError::Failed("empty embedding from probe".into()));
                }
                self.ready.store(true, Ordering::SeqCst);
                info!(url = %self.base_url, model = %self.model, dim, "embedding service ready");
                Ok(dim)
            }
            Err(e) => {
                warn!(url = %self.base_url, model = %self.model, error = %e, "embedding service unavailable");
                Err(e)
            }
        }
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/api/embed", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = resp.json().await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                got: parsed.embeddings.len(),
            });
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingService {
    fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.request(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_before_warm_up() {
        let service = HttpEmbeddingService::new("http://localhost:11434/", "nomic-embed-text");
        assert!(!service.ready());
        assert_eq!(service.base_url(), "http://localhost:11434");
        assert_eq!(service.model_id(), "http:nomic-embed-text");
    }

    #[tokio::test]
    async fn warm_up_against_closed_port_fails() {
        let service = HttpEmbeddingService::new("http://127.0.0.1:9", "nomic-embed-text");
        assert!(service.warm_up().await.is_err());
        assert!(!service.ready());
    }

    #[test]
    fn request_body_shape() {
        let input = vec!["baha".to_string()];
        let body = serde_json::to_value(EmbedRequest {
            model: "m",
            input: &input,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"model": "m", "input": ["baha"]}));
    }
}
