//! Anchor phrases and their per-category centroids.
//!
//! Each category has a handful of representative complaint phrases. Their
//! embeddings are averaged and L2-normalized into one centroid per
//! category; a text is assigned to the centroid with the highest cosine
//! similarity.

use std::collections::BTreeMap;
use std::path::Path;

use reklamo_core::AiVerdict;
use serde::{Deserialize, Serialize};

use crate::error::{AnchorCacheError, EmbedError};
use crate::service::{cosine_similarity, normalize};

const DEFAULT_ANCHORS: &[(&str, &[&str])] = &[
    (
        "Infrastructure",
        &[
            "broken road with potholes",
            "damaged street needs repair",
            "guba ang kalsada dili na magamit",
            "bridge is collapsing dangerous",
            "sirang daan malubak napakadelikado",
        ],
    ),
    (
        "Utilities",
        &[
            "no water supply for days",
            "walang tubig matagal na",
            "power outage blackout kuryente",
            "brownout electricity problem",
            "weak water pressure mahina ang tubig",
        ],
    ),
    (
        "Sanitation",
        &[
            "garbage not collected mabaho",
            "overflowing trash tambak na basura",
            "illegal dumping site marumi",
            "bad smell from sewage baho",
            "uncollected waste di nakuha basura",
        ],
    ),
    (
        "Environment",
        &[
            "flooding in the streets bumabaha",
            "flash flood dangerous water level",
            "baha sa aming lugar lunop",
            "overflow river apaw ang tubig",
            "landslide erosion gumuho",
        ],
    ),
    (
        "Public Safety",
        &[
            "fire emergency sunog nasusunog",
            "crime robbery holdap nakawan",
            "accident injury aksidente sugatan",
            "violence fight away barilan",
            "medical emergency patay namatay",
        ],
    ),
    (
        "Traffic Congestion",
        &[
            "heavy traffic congestion trapik",
            "road blocked stuck di makalusot",
            "vehicle accident traffic jam",
            "gridlock bottleneck siksikan",
            "slow moving traffic mabagal",
        ],
    ),
    (
        "Stray Animals",
        &[
            "stray dog attacking asong gala",
            "dangerous animal snake ahas",
            "rabid dog loose loko aso",
            "wild animal in neighborhood",
            "stray cats dogs roaming",
        ],
    ),
    (
        "Pest Infestation",
        &[
            "mosquito breeding dengue lamok",
            "rat infestation daga problema",
            "cockroach infestation ipis marami",
            "pest control needed peste",
            "insect problem health hazard",
        ],
    ),
    (
        "Noise Complaint",
        &[
            "loud karaoke noise ingay",
            "noisy neighbors maingay kapitbahay",
            "construction noise disturbance",
            "barking dogs all night tahol",
            "loud music party videoke",
        ],
    ),
    (
        "Others",
        &[
            "general complaint concern",
            "issue problem report",
            "request for assistance",
            "inquiry question concern",
            "feedback suggestion",
        ],
    ),
];

/// Category → anchor phrases. Ordered by category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorSet {
    categories: BTreeMap<String, Vec<String>>,
}

impl Default for AnchorSet {
    fn default() -> Self {
        Self {
            categories: DEFAULT_ANCHORS
                .iter()
                .map(|&(category, phrases)| {
                    (
                        category.to_string(),
                        phrases.iter().map(|p| p.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl AnchorSet {
    /// Build from category → phrases. Categories with no phrases are dropped.
    pub fn new(categories: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            categories: categories
                .into_iter()
                .filter(|(_, phrases)| !phrases.is_empty())
                .collect(),
        }
    }

    /// Read a `{"Category": ["phrase", ...]}` file.
    pub fn from_json_file(path: &Path) -> Result<Self, AnchorCacheError> {
        let raw = std::fs::read_to_string(path).map_err(|source| AnchorCacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let categories = serde_json::from_str(&raw).map_err(|source| AnchorCacheError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(categories))
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categories
            .iter()
            .map(|(c, p)| (c.as_str(), p.as_slice()))
    }

    /// Every phrase, grouped by category in category order.
    pub fn phrases(&self) -> Vec<String> {
        self.categories.values().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub(crate) fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.categories
    }
}

/// One normalized centroid per category.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorCentroids {
    centroids: BTreeMap<String, Vec<f32>>,
    dim: usize,
}

impl AnchorCentroids {
    /// Average each category's phrase embeddings and normalize.
    ///
    /// `embeddings` must be in [`AnchorSet::phrases`] order.
    pub fn compute(anchors: &AnchorSet, embeddings: &[Vec<f32>]) -> Result<Self, EmbedError> {
        let expected: usize = anchors.categories().map(|(_, p)| p.len()).sum();
        if embeddings.len() != expected {
            return Err(EmbedError::CountMismatch {
                expected,
                got: embeddings.len(),
            });
        }
        let dim = embeddings.first().map_or(0, Vec::len);

        let mut vectors = embeddings.iter();
        let mut centroids = BTreeMap::new();
        for (category, phrases) in anchors.categories() {
            let mut sum = vec![0.0f32; dim];
            for v in vectors.by_ref().take(phrases.len()) {
                if v.len() != dim {
                    return Err(EmbedError::DimensionMismatch {
                        expected: dim,
                        got: v.len(),
                    });
                }
                for (acc, &x) in sum.iter_mut().zip(v) {
                    *acc += x;
                }
            }
            for x in &mut sum {
                *x /= phrases.len() as f32;
            }
            normalize(&mut sum);
            centroids.insert(category.to_string(), sum);
        }

        Ok(Self { centroids, dim })
    }

    /// Restore centroids that were computed earlier.
    pub fn from_parts(centroids: BTreeMap<String, Vec<f32>>) -> Result<Self, EmbedError> {
        let dim = centroids.values().next().map_or(0, Vec::len);
        if let Some(bad) = centroids.values().find(|c| c.len() != dim) {
            return Err(EmbedError::DimensionMismatch {
                expected: dim,
                got: bad.len(),
            });
        }
        Ok(Self { centroids, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn centroids(&self) -> &BTreeMap<String, Vec<f32>> {
        &self.centroids
    }

    /// Similarity to every centroid, highest first. Ties keep category order.
    pub fn scores(&self, embedding: &[f32]) -> Vec<(String, f32)> {
        let mut scores: Vec<(String, f32)> = self
            .centroids
            .iter()
            .map(|(label, centroid)| (label.clone(), cosine_similarity(embedding, centroid)))
            .collect();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        scores
    }

    /// Nearest centroid. `None` when there are no centroids.
    pub fn best_match(&self, embedding: &[f32]) -> Option<AiVerdict> {
        let scores = self.scores(embedding);
        let (category, similarity) = scores.first().cloned()?;
        Some(AiVerdict {
            category,
            similarity,
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_set() -> AnchorSet {
        AnchorSet::new(BTreeMap::from([
            ("Environment".to_string(), vec!["baha".into(), "flood".into()]),
            ("Utilities".to_string(), vec!["walang tubig".into()]),
            ("Empty".to_string(), vec![]),
        ]))
    }

    #[test]
    fn default_set_has_every_category() {
        let set = AnchorSet::default();
        assert_eq!(set.len(), 10);
        for (category, phrases) in set.categories() {
            assert!(
                (3..=5).contains(&phrases.len()),
                "{category} has {} phrases",
                phrases.len()
            );
        }
        assert!(set.phrases().contains(&"walang tubig matagal na".to_string()));
    }

    #[test]
    fn empty_categories_are_dropped() {
        let set = small_set();
        assert_eq!(set.len(), 2);
        assert_eq!(set.phrases(), vec!["baha", "flood", "walang tubig"]);
    }

    #[test]
    fn loads_anchor_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anchors.json");
        std::fs::write(&path, r#"{"Environment": ["baha"], "Noise Complaint": []}"#).unwrap();
        let set = AnchorSet::from_json_file(&path).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.phrases(), vec!["baha"]);

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            AnchorSet::from_json_file(&path),
            Err(AnchorCacheError::Json { .. })
        ));
    }

    #[test]
    fn centroid_is_normalized_mean() {
        let set = small_set();
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 2.0]];
        let c = AnchorCentroids::compute(&set, &embeddings).unwrap();
        assert_eq!(c.dim(), 2);

        let env = &c.centroids()["Environment"];
        let h = std::f32::consts::FRAC_1_SQRT_2;
        assert!((env[0] - h).abs() < 1e-6);
        assert!((env[1] - h).abs() < 1e-6);
        assert_eq!(c.centroids()["Utilities"], vec![0.0, 1.0]);
    }

    #[test]
    fn compute_rejects_wrong_count_or_dim() {
        let set = small_set();
        assert!(matches!(
            AnchorCentroids::compute(&set, &[vec![1.0, 0.0]]),
            Err(EmbedError::CountMismatch { expected: 3, got: 1 })
        ));
        assert!(matches!(
            AnchorCentroids::compute(&set, &[vec![1.0, 0.0], vec![1.0], vec![0.0, 1.0]]),
            Err(EmbedError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn best_match_picks_nearest() {
        let c = AnchorCentroids::from_parts(BTreeMap::from([
            ("Environment".to_string(), vec![1.0, 0.0]),
            ("Utilities".to_string(), vec![0.0, 1.0]),
        ]))
        .unwrap();
        let v = c.best_match(&[0.2, 0.9]).unwrap();
        assert_eq!(v.category, "Utilities");
        assert!(v.similarity > 0.9);
        assert_eq!(v.scores.len(), 2);
        assert_eq!(v.scores[1].0, "Environment");
    }

    #[test]
    fn best_match_on_empty_is_none() {
        let c = AnchorCentroids::from_parts(BTreeMap::new()).unwrap();
        assert!(c.best_match(&[1.0]).is_none());
    }
}
