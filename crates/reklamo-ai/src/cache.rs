//! Durable anchor-centroid cache.
//!
//! A JSON file recording the model id and the exact anchor phrases the
//! centroids were computed from. A cached file is used only when both match.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::anchors::{AnchorCentroids, AnchorSet};
use crate::error::AnchorCacheError;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    model_id: String,
    anchors: BTreeMap<String, Vec<String>>,
    /// RFC 3339 timestamp.
    computed_at: String,
    dim: usize,
    centroids: BTreeMap<String, Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct AnchorCache {
    path: PathBuf,
}

impl AnchorCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached centroids for this model and anchor set, or `None` when the
    /// file is absent or was computed from something else.
    pub fn load(
        &self,
        model_id: &str,
        anchors: &AnchorSet,
    ) -> Result<Option<AnchorCentroids>, AnchorCacheError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|source| AnchorCacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        let file: CacheFile =
            serde_json::from_str(&raw).map_err(|source| AnchorCacheError::Json {
                path: self.path.clone(),
                source,
            })?;

        if file.model_id != model_id || &file.anchors != anchors.as_map() {
            debug!(path = %self.path.display(), cached_model = %file.model_id, "anchor cache is stale");
            return Ok(None);
        }

        match AnchorCentroids::from_parts(file.centroids) {
            Ok(c) if c.dim() == file.dim && c.len() == anchors.len() => {
                info!(
                    path = %self.path.display(),
                    categories = c.len(),
                    computed_at = %file.computed_at,
                    "loaded cached anchor centroids"
                );
                Ok(Some(c))
            }
            _ => {
                debug!(path = %self.path.display(), "anchor cache is inconsistent");
                Ok(None)
            }
        }
    }

    /// Write centroids, replacing any previous file.
    pub fn store(
        &self,
        model_id: &str,
        anchors: &AnchorSet,
        centroids: &AnchorCentroids,
    ) -> Result<(), AnchorCacheError> {
        let file = CacheFile {
            model_id: model_id.to_string(),
            anchors: anchors.as_map().clone(),
            computed_at: Utc::now().to_rfc3339(),
            dim: centroids.dim(),
            centroids: centroids.centroids().clone(),
        };
        let json = serde_json::to_string(&file).map_err(|source| AnchorCacheError::Json {
            path: self.path.clone(),
            source,
        })?;

        let io_err = |source| AnchorCacheError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        // Write beside the target and rename so readers never see a partial file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;

        info!(path = %self.path.display(), categories = centroids.len(), "stored anchor centroids");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchors() -> AnchorSet {
        AnchorSet::new(BTreeMap::from([
            ("Environment".to_string(), vec!["baha".into()]),
            ("Utilities".to_string(), vec!["walang tubig".into()]),
        ]))
    }

    fn centroids() -> AnchorCentroids {
        AnchorCentroids::compute(&anchors(), &[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap()
    }

    #[test]
    fn round_trip_same_model_and_anchors() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnchorCache::new(dir.path().join("cache").join("anchors.json"));
        cache.store("mini-lm", &anchors(), &centroids()).unwrap();

        let loaded = cache.load("mini-lm", &anchors()).unwrap().unwrap();
        assert_eq!(loaded, centroids());
    }

    #[test]
    fn different_model_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnchorCache::new(dir.path().join("anchors.json"));
        cache.store("mini-lm", &anchors(), &centroids()).unwrap();
        assert!(cache.load("nomic-embed-text", &anchors()).unwrap().is_none());
    }

    #[test]
    fn changed_anchor_phrases_are_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnchorCache::new(dir.path().join("anchors.json"));
        cache.store("mini-lm", &anchors(), &centroids()).unwrap();

        let changed = AnchorSet::new(BTreeMap::from([
            ("Environment".to_string(), vec!["baha".into(), "flood".into()]),
            ("Utilities".to_string(), vec!["walang tubig".into()]),
        ]));
        assert!(cache.load("mini-lm", &changed).unwrap().is_none());
    }

    #[test]
    fn missing_file_is_none() {
        let cache = AnchorCache::new("/nonexistent/anchors.json");
        assert!(cache.load("mini-lm", &anchors()).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anchors.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = AnchorCache::new(&path).load("mini-lm", &anchors()).unwrap_err();
        assert!(matches!(err, AnchorCacheError::Json { .. }));
    }
}
