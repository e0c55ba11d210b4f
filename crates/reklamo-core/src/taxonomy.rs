//! Category hierarchy and label normalisation.
//!
//! Complaints are reported against a small set of parent categories
//! (Utilities, Sanitation, ...). Keywords and embedding anchors may name
//! a more specific label ("No Water", "Pothole"), which the hierarchy maps
//! to its parent. Every known label also carries a base urgency rating.
//!
//! An external taxonomy can replace the static mapping: it is injected as
//! a [`CategoryNormalizer`] and consulted through [`LabelMap`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::read_json;
use crate::error::ConfigError;

/// Generic label used when nothing more specific applies.
pub const OTHERS: &str = "Others";

/// Base urgency at or above which a label is life-threatening.
pub const LIFE_THREATENING_URGENCY: f32 = 90.0;

const DEFAULT_PARENTS: &[(&str, &str)] = &[
    // Infrastructure
    ("Pothole", "Infrastructure"),
    ("Road Damage", "Infrastructure"),
    ("Broken Streetlight", "Infrastructure"),
    ("Streetlight", "Infrastructure"),
    ("Road Obstruction", "Traffic"),
    ("Fallen Tree", "Infrastructure"),
    ("Bridge Collapse", "Infrastructure"),
    ("Building Collapse", "Infrastructure"),
    // Utilities
    ("No Water", "Utilities"),
    ("Low Pressure", "Utilities"),
    ("Pipe Leak", "Utilities"),
    ("Blackout", "Utilities"),
    ("Power Line Down", "Utilities"),
    ("Transformer Explosion", "Utilities"),
    ("Gas Leak", "Emergency"),
    // Sanitation
    ("Trash", "Sanitation"),
    ("Overflowing Trash", "Sanitation"),
    ("Illegal Dumping", "Sanitation"),
    ("Bad Odor", "Sanitation"),
    ("Dead Animal", "Sanitation"),
    ("Sewage Leak", "Sanitation"),
    ("Garbage", "Sanitation"),
    ("Clogged Drainage", "Sanitation"),
    ("Clogged Canal", "Sanitation"),
    // Environment
    ("Flood", "Environment"),
    ("Flooding", "Environment"),
    ("Flash Flood", "Environment"),
    ("Landslide", "Environment"),
    ("Earthquake", "Emergency"),
    // Public safety
    ("Fire", "Emergency"),
    ("Smoke", "Health Hazard"),
    ("Explosion", "Emergency"),
    ("Crime", "Public Safety"),
    ("Robbery", "Public Safety"),
    ("Assault", "Public Safety"),
    ("Gunshot", "Public Safety"),
    ("Vandalism", "Public Safety"),
    ("Accident", "Public Safety"),
    ("Medical", "Public Safety"),
    ("Casualty", "Public Safety"),
    ("Stranded", "Public Safety"),
    ("Evacuation", "Public Safety"),
    ("Drug Activity", "Public Safety"),
    ("Gang Activity", "Public Safety"),
    ("Trespassing", "Public Safety"),
    ("Trapped", "Public Safety"),
    ("Rescue", "Public Safety"),
    // Traffic
    ("Traffic", "Traffic Congestion"),
    ("Vehicle Breakdown", "Traffic Congestion"),
    ("Traffic Congestion", "Traffic Congestion"),
    // Animals and pests
    ("Stray Dog", "Stray Animals"),
    ("Stray Animal", "Stray Animals"),
    ("Snake Sighting", "Stray Animals"),
    ("Stray Animals", "Stray Animals"),
    ("Pest Infestation", "Pest Infestation"),
    ("Mosquito Breeding", "Pest Infestation"),
    ("Health Hazard", "Pest Infestation"),
    // Noise
    ("Noise Complaint", "Noise Complaint"),
    ("Noise", "Noise Complaint"),
    ("Loud Music", "Noise Complaint"),
    ("Karaoke", "Noise Complaint"),
    ("Barking Dog", "Noise Complaint"),
    // Parents map to themselves
    ("Infrastructure", "Infrastructure"),
    ("Utilities", "Utilities"),
    ("Sanitation", "Sanitation"),
    ("Environment", "Environment"),
    ("Public Safety", "Public Safety"),
    ("Others", "Others"),
];

const DEFAULT_URGENCY: &[(&str, f32)] = &[
    // Life-threatening
    ("Fire", 100.0),
    ("Explosion", 100.0),
    ("Gas Leak", 98.0),
    ("Building Collapse", 98.0),
    ("Medical", 95.0),
    ("Casualty", 95.0),
    ("Earthquake", 95.0),
    ("Gunshot", 95.0),
    ("Accident", 90.0),
    ("Crime", 88.0),
    ("Assault", 88.0),
    ("Robbery", 85.0),
    // High priority
    ("Flash Flood", 90.0),
    ("Landslide", 88.0),
    ("Flooding", 85.0),
    ("Flood", 85.0),
    ("Evacuation", 85.0),
    ("Bridge Collapse", 85.0),
    ("Power Line Down", 82.0),
    ("Transformer Explosion", 80.0),
    ("Stranded", 78.0),
    ("Blackout", 75.0),
    ("Smoke", 75.0),
    ("Gang Activity", 75.0),
    ("Drug Activity", 72.0),
    ("Trespassing", 65.0),
    // Infrastructure
    ("Pipe Leak", 65.0),
    ("No Water", 60.0),
    ("Fallen Tree", 60.0),
    ("Road Obstruction", 58.0),
    ("Road Damage", 55.0),
    ("Broken Streetlight", 55.0),
    ("Streetlight", 55.0),
    ("Clogged Drainage", 55.0),
    ("Clogged Canal", 55.0),
    ("Sewage Leak", 55.0),
    ("Snake Sighting", 55.0),
    ("Pothole", 50.0),
    // Quality of life
    ("Overflowing Trash", 45.0),
    ("Stray Dog", 45.0),
    ("Traffic", 45.0),
    ("Illegal Dumping", 42.0),
    ("Trash", 40.0),
    ("Stray Animal", 40.0),
    ("Vehicle Breakdown", 40.0),
    ("Mosquito Breeding", 40.0),
    ("Bad Odor", 35.0),
    ("Noise Complaint", 35.0),
    ("Noise", 35.0),
    ("Pest Infestation", 35.0),
    ("Vandalism", 35.0),
    ("Dead Animal", 35.0),
    ("Loud Music", 30.0),
    ("Karaoke", 30.0),
    ("Low Pressure", 30.0),
    ("Barking Dog", 25.0),
    ("Loitering", 20.0),
    // Parent categories
    ("Public Safety", 70.0),
    ("Health Hazard", 50.0),
    ("Utilities", 50.0),
    ("Environment", 50.0),
    ("Infrastructure", 45.0),
    ("Sanitation", 40.0),
    ("Others", 30.0),
];

/// Static label → parent mapping plus per-label base urgency.
#[derive(Debug, Clone)]
pub struct CategoryHierarchy {
    parents: HashMap<String, String>,
    urgency: HashMap<String, f32>,
}

/// Entries merged over the default hierarchy.
///
/// Loaded from `{"parents": {"Label": "Parent"}, "urgency": {"Label": 55}}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HierarchyOverride {
    #[serde(default)]
    pub parents: HashMap<String, String>,
    #[serde(default)]
    pub urgency: HashMap<String, f32>,
}

impl HierarchyOverride {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }
}

impl Default for CategoryHierarchy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CategoryHierarchy {
    /// The built-in hierarchy and urgency table.
    pub fn builtin() -> Self {
        Self {
            parents: DEFAULT_PARENTS
                .iter()
                .map(|&(label, parent)| (label.to_string(), parent.to_string()))
                .collect(),
            urgency: DEFAULT_URGENCY
                .iter()
                .map(|&(label, u)| (label.to_string(), u))
                .collect(),
        }
    }

    /// Merge an override over this hierarchy. Override entries win.
    pub fn with_override(mut self, overrides: HierarchyOverride) -> Self {
        debug!(
            parents = overrides.parents.len(),
            urgency = overrides.urgency.len(),
            "applying hierarchy override"
        );
        for (label, parent) in overrides.parents {
            self.parents
                .insert(label.trim().to_string(), parent.trim().to_string());
        }
        for (label, urgency) in overrides.urgency {
            self.urgency.insert(label.trim().to_string(), urgency);
        }
        self
    }

    /// Parent category for a label. Unmapped labels are their own parent;
    /// a blank label maps to [`OTHERS`].
    pub fn parent_of(&self, label: &str) -> String {
        let label = label.trim();
        if label.is_empty() {
            return OTHERS.to_string();
        }
        self.parents
            .get(label)
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }

    /// Base urgency rating of a label, if it has one.
    pub fn base_urgency(&self, label: &str) -> Option<f32> {
        self.urgency.get(label.trim()).copied()
    }

    /// Urgency of a specific label, falling back to its parent's rating.
    pub fn urgency_for(&self, specific: &str, parent: &str) -> Option<f32> {
        self.base_urgency(specific)
            .or_else(|| self.base_urgency(parent))
    }

    pub fn is_life_threatening(&self, label: &str) -> bool {
        self.base_urgency(label)
            .is_some_and(|u| u >= LIFE_THREATENING_URGENCY)
    }

    /// Labels whose base urgency lies in `[min, max]`, sorted by name.
    pub fn categories_in_tier(&self, min: f32, max: f32) -> Vec<&str> {
        let mut labels: Vec<&str> = self
            .urgency
            .iter()
            .filter(|&(_, &u)| u >= min && u <= max)
            .map(|(label, _)| label.as_str())
            .collect();
        labels.sort_unstable();
        labels
    }

    /// Number of labels with a parent mapping.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// A category with an optional subcategory, after normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPair {
    pub category: String,
    pub subcategory: Option<String>,
}

/// External taxonomy consulted in place of the static hierarchy.
pub trait CategoryNormalizer: Send + Sync {
    /// Parent category of a label, [`OTHERS`] when unknown.
    fn parent_for(&self, label: &str) -> String;

    /// Canonical spelling of a label, [`OTHERS`] when unknown.
    fn normalize_label(&self, label: &str) -> String;

    /// Whether the label names a known subcategory.
    fn is_subcategory(&self, label: &str) -> bool;

    /// Normalise a (category, subcategory) pair to a consistent parent/child.
    fn normalize_pair(&self, category: Option<&str>, subcategory: Option<&str>) -> LabelPair;
}

/// Taxonomy document: parents with their subcategories, a flat
/// subcategory → parent mapping, and spelling aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Taxonomy {
    #[serde(default)]
    pub categories: BTreeMap<String, TaxonomyCategory>,
    #[serde(default)]
    pub subcategory_mapping: HashMap<String, String>,
    #[serde(default)]
    pub label_aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaxonomyCategory {
    #[serde(default)]
    pub subcategories: Vec<String>,
}

/// [`CategoryNormalizer`] backed by a [`Taxonomy`] document.
#[derive(Debug, Clone)]
pub struct TaxonomyNormalizer {
    taxonomy: Taxonomy,
}

impl TaxonomyNormalizer {
    /// Subcategories listed under a parent but missing from the flat
    /// mapping are added to it.
    pub fn new(mut taxonomy: Taxonomy) -> Self {
        for (parent, category) in &taxonomy.categories {
            for sub in &category.subcategories {
                taxonomy
                    .subcategory_mapping
                    .entry(collapse_whitespace(sub))
                    .or_insert_with(|| parent.clone());
            }
        }
        Self { taxonomy }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let taxonomy: Taxonomy = read_json(path)?;
        info!(
            path = %path.display(),
            categories = taxonomy.categories.len(),
            subcategories = taxonomy.subcategory_mapping.len(),
            aliases = taxonomy.label_aliases.len(),
            "loaded category taxonomy"
        );
        Ok(Self::new(taxonomy))
    }

    pub fn is_parent(&self, label: &str) -> bool {
        !label.is_empty() && self.taxonomy.categories.contains_key(label)
    }

    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.taxonomy.categories.keys().map(String::as_str)
    }

    pub fn subcategories(&self, parent: &str) -> &[String] {
        self.taxonomy
            .categories
            .get(parent)
            .map(|c| c.subcategories.as_slice())
            .unwrap_or(&[])
    }

    /// Follow alias links until a label with no alias is reached.
    /// Alias cycles stop at the first repeated label.
    fn resolve_aliases(&self, label: &str) -> String {
        let mut current = collapse_whitespace(label);
        let mut visited = HashSet::new();
        while let Some(next) = self.taxonomy.label_aliases.get(&current) {
            if !visited.insert(current.clone()) {
                warn!(label, at = %current, "label alias cycle");
                break;
            }
            current = collapse_whitespace(next);
        }
        current
    }
}

impl CategoryNormalizer for TaxonomyNormalizer {
    fn parent_for(&self, label: &str) -> String {
        let label = self.resolve_aliases(label);
        if self.is_parent(&label) {
            return label;
        }
        self.taxonomy
            .subcategory_mapping
            .get(&label)
            .cloned()
            .unwrap_or_else(|| OTHERS.to_string())
    }

    fn normalize_label(&self, label: &str) -> String {
        let label = self.resolve_aliases(label);
        if self.is_parent(&label) || self.is_subcategory(&label) || label == OTHERS {
            label
        } else {
            OTHERS.to_string()
        }
    }

    fn is_subcategory(&self, label: &str) -> bool {
        !label.is_empty() && self.taxonomy.subcategory_mapping.contains_key(label)
    }

    fn normalize_pair(&self, category: Option<&str>, subcategory: Option<&str>) -> LabelPair {
        let raw_sub = subcategory.map(collapse_whitespace).filter(|s| !s.is_empty());
        let raw_cat = category.map(collapse_whitespace).filter(|s| !s.is_empty());

        if let Some(sub) = raw_sub.as_deref().map(|s| self.normalize_label(s))
            && sub != OTHERS
            && self.is_subcategory(&sub)
        {
            return LabelPair {
                category: self.parent_for(&sub),
                subcategory: Some(sub),
            };
        }

        if let Some(cat) = raw_cat.as_deref().map(|c| self.normalize_label(c))
            && cat != OTHERS
        {
            if self.is_subcategory(&cat) {
                return LabelPair {
                    category: self.parent_for(&cat),
                    subcategory: Some(cat),
                };
            }
            if self.is_parent(&cat) {
                return LabelPair {
                    category: cat,
                    subcategory: raw_sub.as_deref().map(|s| self.normalize_label(s)),
                };
            }
        }

        LabelPair {
            category: OTHERS.to_string(),
            subcategory: None,
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Label lookups used by the classifier: the static hierarchy, optionally
/// overridden by an injected [`CategoryNormalizer`].
#[derive(Clone)]
pub struct LabelMap {
    hierarchy: Arc<CategoryHierarchy>,
    normalizer: Option<Arc<dyn CategoryNormalizer>>,
}

impl std::fmt::Debug for LabelMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelMap")
            .field("hierarchy_labels", &self.hierarchy.len())
            .field("normalizer", &self.normalizer.is_some())
            .finish()
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::new(Arc::new(CategoryHierarchy::builtin()), None)
    }
}

impl LabelMap {
    pub fn new(
        hierarchy: Arc<CategoryHierarchy>,
        normalizer: Option<Arc<dyn CategoryNormalizer>>,
    ) -> Self {
        Self {
            hierarchy,
            normalizer,
        }
    }

    /// Parent and specific label for a single raw label.
    ///
    /// A label that is its own parent (or is [`OTHERS`]) has no subcategory.
    pub fn resolve(&self, label: &str) -> LabelPair {
        if self.normalizer.is_some() {
            return self.pair(label, None);
        }
        let label = label.trim();
        let category = self.hierarchy.parent_of(label);
        let subcategory = (!label.is_empty() && label != category && label != OTHERS)
            .then(|| label.to_string());
        LabelPair {
            category,
            subcategory,
        }
    }

    /// Normalise a category/subcategory pair for output.
    pub fn pair(&self, category: &str, subcategory: Option<&str>) -> LabelPair {
        match &self.normalizer {
            Some(n) => n.normalize_pair(Some(category), subcategory),
            None => LabelPair {
                category: category.to_string(),
                subcategory: subcategory.map(str::to_string),
            },
        }
    }

    /// Base urgency of a specific label, then of its parent.
    pub fn urgency_for(&self, specific: &str, parent: &str) -> Option<f32> {
        self.hierarchy.urgency_for(specific, parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> TaxonomyNormalizer {
        let json = r#"{
            "categories": {
                "Utilities": {"subcategories": ["No Water", "Blackout"]},
                "Sanitation": {"subcategories": ["Garbage"]}
            },
            "subcategory_mapping": {
                "No Water": "Utilities",
                "Blackout": "Utilities",
                "Garbage": "Sanitation"
            },
            "label_aliases": {
                "Water Outage": "No Water",
                "Power Outage": "Brownout",
                "Brownout": "Blackout",
                "Loop A": "Loop B",
                "Loop B": "Loop A"
            }
        }"#;
        TaxonomyNormalizer::new(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn builtin_maps_specific_to_parent() {
        let h = CategoryHierarchy::builtin();
        assert_eq!(h.parent_of("No Water"), "Utilities");
        assert_eq!(h.parent_of("Pothole"), "Infrastructure");
        assert_eq!(h.parent_of("Traffic"), "Traffic Congestion");
    }

    #[test]
    fn unmapped_label_is_its_own_parent() {
        let h = CategoryHierarchy::builtin();
        assert_eq!(h.parent_of("Street Vendors"), "Street Vendors");
        assert_eq!(h.parent_of("  "), OTHERS);
    }

    #[test]
    fn urgency_falls_back_to_parent() {
        let h = CategoryHierarchy::builtin();
        assert_eq!(h.urgency_for("No Water", "Utilities"), Some(60.0));
        assert_eq!(h.urgency_for("Water Meter", "Utilities"), Some(50.0));
        assert_eq!(h.urgency_for("Unknown", "Unknown Parent"), None);
    }

    #[test]
    fn life_threatening_tier() {
        let h = CategoryHierarchy::builtin();
        assert!(h.is_life_threatening("Fire"));
        assert!(h.is_life_threatening("Accident"));
        assert!(!h.is_life_threatening("Crime"));
        assert!(!h.is_life_threatening("Nonexistent"));

        let tier = h.categories_in_tier(98.0, 100.0);
        assert_eq!(tier, vec!["Building Collapse", "Explosion", "Fire", "Gas Leak"]);
    }

    #[test]
    fn override_merges_over_defaults() {
        let h = CategoryHierarchy::builtin().with_override(HierarchyOverride {
            parents: HashMap::from([("Water Meter".to_string(), "Utilities".to_string())]),
            urgency: HashMap::from([("Pothole".to_string(), 65.0)]),
        });
        assert_eq!(h.parent_of("Water Meter"), "Utilities");
        assert_eq!(h.base_urgency("Pothole"), Some(65.0));
        assert_eq!(h.parent_of("No Water"), "Utilities");
    }

    #[test]
    fn taxonomy_resolves_alias_chains() {
        let t = taxonomy();
        assert_eq!(t.normalize_label("Power Outage"), "Blackout");
        assert_eq!(t.parent_for("Power Outage"), "Utilities");
        assert_eq!(t.normalize_label("Water   Outage"), "No Water");
    }

    #[test]
    fn taxonomy_alias_cycle_terminates() {
        let t = taxonomy();
        assert_eq!(t.normalize_label("Loop A"), OTHERS);
    }

    #[test]
    fn taxonomy_unknown_label_is_others() {
        let t = taxonomy();
        assert_eq!(t.normalize_label("Meteor Strike"), OTHERS);
        assert_eq!(t.parent_for("Meteor Strike"), OTHERS);
    }

    #[test]
    fn normalize_pair_prefers_valid_subcategory() {
        let t = taxonomy();
        let pair = t.normalize_pair(Some("Sanitation"), Some("Water Outage"));
        assert_eq!(pair.category, "Utilities");
        assert_eq!(pair.subcategory.as_deref(), Some("No Water"));
    }

    #[test]
    fn normalize_pair_promotes_subcategory_in_category_slot() {
        let t = taxonomy();
        let pair = t.normalize_pair(Some("Garbage"), None);
        assert_eq!(pair.category, "Sanitation");
        assert_eq!(pair.subcategory.as_deref(), Some("Garbage"));
    }

    #[test]
    fn normalize_pair_keeps_parent_without_subcategory() {
        let t = taxonomy();
        let pair = t.normalize_pair(Some("Utilities"), None);
        assert_eq!(pair.category, "Utilities");
        assert_eq!(pair.subcategory, None);
    }

    #[test]
    fn normalize_pair_unknown_is_others() {
        let t = taxonomy();
        let pair = t.normalize_pair(Some("Meteor Strike"), None);
        assert_eq!(pair.category, OTHERS);
        assert_eq!(pair.subcategory, None);
    }

    #[test]
    fn label_map_without_normalizer_uses_hierarchy() {
        let labels = LabelMap::default();
        let resolved = labels.resolve(" Flash Flood ");
        assert_eq!(resolved.category, "Environment");
        assert_eq!(resolved.subcategory.as_deref(), Some("Flash Flood"));
        assert_eq!(labels.resolve("Stray Animals").subcategory, None);
        assert_eq!(labels.resolve("Street Vendors").category, "Street Vendors");
        assert_eq!(labels.resolve("").category, OTHERS);
        let pair = labels.pair("Environment", Some("Flash Flood"));
        assert_eq!(pair.category, "Environment");
        assert_eq!(pair.subcategory.as_deref(), Some("Flash Flood"));
    }

    #[test]
    fn label_map_with_normalizer_delegates() {
        let labels = LabelMap::new(
            Arc::new(CategoryHierarchy::builtin()),
            Some(Arc::new(taxonomy())),
        );
        let resolved = labels.resolve("Water Outage");
        assert_eq!(resolved.category, "Utilities");
        assert_eq!(resolved.subcategory.as_deref(), Some("No Water"));
        assert_eq!(labels.resolve("Utilities").subcategory, None);
        assert_eq!(labels.resolve("Meteor Strike").category, OTHERS);
    }

    #[test]
    fn subcategory_lists_fill_missing_mapping() {
        let json = r#"{"categories": {"Animal Control": {"subcategories": ["Stray Animals"]}}}"#;
        let t = TaxonomyNormalizer::new(serde_json::from_str(json).unwrap());
        assert!(t.is_subcategory("Stray Animals"));
        assert_eq!(t.parent_for("Stray Animals"), "Animal Control");
        let pair = t.normalize_pair(Some("Stray Animals"), None);
        assert_eq!(pair.category, "Animal Control");
        assert_eq!(pair.subcategory.as_deref(), Some("Stray Animals"));
    }
}
