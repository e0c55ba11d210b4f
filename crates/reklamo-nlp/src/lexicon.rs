//! Keyword lexicon: built-in keyword groups merged with an editable dictionary.
//!
//! The merged [`LexiconIndex`] is immutable once built. [`LexiconStore`]
//! holds the current index behind an `RwLock<Arc<_>>` and swaps in a new one
//! when the dictionary fingerprint changes; readers keep whatever snapshot
//! they cloned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use reklamo_core::{KeywordSource, LabelMap, LexiconEntry};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clause::phrase_tokens;
use crate::error::LexiconError;

/// Longest supported keyword, in tokens.
pub const MAX_TERM_WORDS: usize = 3;

const DEFAULT_DICTIONARY_CONFIDENCE: f32 = 0.7;
const DEFAULT_DICTIONARY_URGENCY: f32 = 30.0;

struct BuiltinGroup {
    category: &'static str,
    urgency: f32,
    confidence: f32,
    terms: &'static [&'static str],
}

const BUILTIN_GROUPS: &[BuiltinGroup] = &[
    BuiltinGroup {
        category: "Utilities",
        urgency: 55.0,
        confidence: 0.9,
        terms: &[
            "tubig", "walang tubig", "wala tubig", "walay tubig", "way tubig", "mahina",
            "mahinang tubig", "low pressure", "weak water", "nawalan", "nawalan ng tubig",
            "naputol ang tubig", "putol tubig", "kuryente", "walang kuryente", "wala kuryente",
            "walay kuryente", "brownout", "blackout", "brown out", "black out", "naponder",
            "nag ponder", "ponder", "pundido", "dilim", "madilim", "ngitngit", "walay suga",
            "no water", "no electricity", "power outage", "no power", "water outage",
            "electricity cut", "power cut",
        ],
    },
    BuiltinGroup {
        category: "Sanitation",
        urgency: 42.0,
        confidence: 0.88,
        terms: &[
            "baho", "mabaho", "amoy", "maamoy", "maasim", "mabahong basura", "amoy patay",
            "amoy bulok", "basura", "kalat", "makalat", "dumi", "marumi", "di nakuha",
            "hindi nakuha", "di kinolekta", "tambak", "nakatambak", "puno ng basura", "garbage",
            "trash", "dumping", "illegal dumping", "waste", "litter", "rubbish", "stink",
            "stench", "smelly", "uncollected garbage", "overflowing trash",
        ],
    },
    BuiltinGroup {
        category: "Infrastructure",
        urgency: 50.0,
        confidence: 0.9,
        terms: &[
            "lubak", "malubak", "butas", "butas sa daan", "butas sa kalsada", "sira",
            "sirang daan", "sirang kalsada", "wasak", "daan", "kalsada", "lansangan", "crack",
            "cracks", "bitak", "bali-bali", "bako", "bako-bako", "bakobako", "guba",
            "guba nga dalan", "naguba", "nangaguba", "dalan", "bungag", "pothole", "potholes",
            "unsafe", "unsafe road", "road damage", "damaged road", "broken road", "bridge",
            "tulay", "taytay",
        ],
    },
    BuiltinGroup {
        category: "Environment",
        urgency: 75.0,
        confidence: 0.92,
        terms: &[
            "baha", "bumabaha", "binabaha", "bahain", "taas ng tubig", "mataas ang tubig",
            "tubig sa kalsada", "lunod", "nalulunod", "lumubog", "lunop", "nalunop", "gilunop",
            "apaw", "miapaw", "nag-apaw", "nagaapaw", "baha kaayo", "grabe ang baha", "flood",
            "flooding", "flooded", "flash flood", "overflow", "overflowing", "water level",
            "landslide", "erosion",
        ],
    },
    BuiltinGroup {
        category: "Public Safety",
        urgency: 88.0,
        confidence: 0.95,
        terms: &[
            "sunog", "nasusunog", "nasunog", "apoy", "usok", "aksidente", "nasagasaan",
            "nabangga", "carambola", "krimen", "holdap", "nakawan", "magnanakaw", "away",
            "saksak", "barilan", "putukan", "patay", "namatay", "bangkay", "sugatan", "fire",
            "accident", "crime", "robbery", "assault", "emergency", "danger", "dangerous",
        ],
    },
    BuiltinGroup {
        category: "Traffic Congestion",
        urgency: 45.0,
        confidence: 0.85,
        terms: &[
            "trapik", "traffic", "siksikan", "congestion", "hindi makalusot", "di makalusot",
            "stuck", "mabagal", "matraffic", "matrapik", "bottleneck", "gridlock", "jam",
        ],
    },
    BuiltinGroup {
        category: "Stray Animals",
        urgency: 45.0,
        confidence: 0.85,
        terms: &[
            "aso", "gala", "asong gala", "stray dog", "hayop", "ligaw na hayop", "stray animal",
            "ahas", "snake", "iro", "irong buang", "rabid", "loko", "mabangis",
        ],
    },
    BuiltinGroup {
        category: "Pest Infestation",
        urgency: 40.0,
        confidence: 0.82,
        terms: &[
            "lamok", "mosquito", "dengue", "breeding", "daga", "rats", "mice", "ipis",
            "cockroach", "peste", "infestation", "kuto", "insekto",
        ],
    },
    BuiltinGroup {
        category: "Noise Complaint",
        urgency: 30.0,
        confidence: 0.8,
        terms: &[
            "ingay", "maingay", "noise", "noisy", "karaoke", "videoke", "loud music", "sigaw",
            "tahol", "barking dog", "construction noise", "maingay na konstruksyon",
        ],
    },
];

/// Urgency of the built-in keyword group for a category.
pub fn builtin_group_urgency(category: &str) -> Option<f32> {
    BUILTIN_GROUPS
        .iter()
        .find(|g| g.category == category)
        .map(|g| g.urgency)
}

// ── Dictionary ──

/// Version marker of a dictionary document. The index is rebuilt only
/// when this changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DictionaryFingerprint {
    pub version: String,
    pub total_entries: usize,
}

/// One usable keyword row from the dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryRow {
    /// Normalised term (one to three tokens joined by spaces).
    pub term: String,
    /// Specific label: row category, else row subcategory, else the enclosing group.
    pub label: String,
    pub confidence: Option<f32>,
    pub urgency: Option<f32>,
    pub translation: Option<String>,
}

/// A parsed dictionary document.
///
/// Parsing is lenient: rows without a usable term or label are skipped and
/// counted, never fatal.
#[derive(Debug, Clone)]
pub struct Dictionary {
    rows: Vec<DictionaryRow>,
    skipped: usize,
    fingerprint: DictionaryFingerprint,
}

impl Dictionary {
    pub fn from_value(value: &Value) -> Result<Self, LexiconError> {
        let Value::Object(doc) = value else {
            return Err(LexiconError::Invalid(
                "top-level value must be an object".into(),
            ));
        };

        let mut rows = Vec::new();
        let mut skipped = 0;

        for section in ["filipino_keywords", "english_keywords"] {
            if let Some(groups) = doc.get(section) {
                collect_rows(groups, None, &mut rows, &mut skipped);
            }
        }
        if let Some(entries) = doc.get("entries") {
            collect_rows(entries, None, &mut rows, &mut skipped);
        }

        let fingerprint = read_fingerprint(doc.get("_metadata"), rows.len() + skipped);

        if skipped > 0 {
            warn!(skipped, version = %fingerprint.version, "skipped malformed dictionary rows");
        }

        Ok(Self {
            rows,
            skipped,
            fingerprint,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, LexiconError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| LexiconError::Invalid(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, LexiconError> {
        if !path.exists() {
            return Err(LexiconError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| LexiconError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&raw).map_err(|source| LexiconError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(&value)
    }

    pub fn rows(&self) -> &[DictionaryRow] {
        &self.rows
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn fingerprint(&self) -> &DictionaryFingerprint {
        &self.fingerprint
    }
}

/// Walk a section of the dictionary. Arrays hold rows; objects map a group
/// name to rows or to further subgroups. The innermost group name is the
/// label for rows that carry none.
fn collect_rows(
    value: &Value,
    group: Option<&str>,
    rows: &mut Vec<DictionaryRow>,
    skipped: &mut usize,
) {
    match value {
        Value::Array(items) => {
            for item in items {
                match parse_row(item, group) {
                    Some(row) => rows.push(row),
                    None => *skipped += 1,
                }
            }
        }
        Value::Object(groups) => {
            for (name, inner) in groups {
                collect_rows(inner, Some(name.as_str()), rows, skipped);
            }
        }
        _ => *skipped += 1,
    }
}

fn parse_row(item: &Value, group: Option<&str>) -> Option<DictionaryRow> {
    let obj = item.as_object()?;
    let tokens = phrase_tokens(obj.get("term")?.as_str()?);
    if tokens.is_empty() || tokens.len() > MAX_TERM_WORDS {
        return None;
    }

    let label = ["category", "subcategory"]
        .iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .or(group.map(str::trim).filter(|s| !s.is_empty()))?;

    Some(DictionaryRow {
        term: tokens.join(" "),
        label: label.to_string(),
        confidence: obj.get("confidence").and_then(Value::as_f64).map(|v| v as f32),
        urgency: obj.get("urgency").and_then(Value::as_f64).map(|v| v as f32),
        translation: obj
            .get("translation")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    })
}

fn read_fingerprint(metadata: Option<&Value>, row_count: usize) -> DictionaryFingerprint {
    let version = metadata
        .and_then(|m| m.get("version"))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
    let total = metadata
        .and_then(|m| m.get("total_entries"))
        .and_then(Value::as_u64)
        .map(|n| n as usize);

    DictionaryFingerprint {
        version: version.unwrap_or_else(|| "unversioned".to_string()),
        total_entries: total.unwrap_or(row_count),
    }
}

// ── Index ──

/// Counts describing a built index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LexiconStats {
    pub terms: usize,
    pub builtin_terms: usize,
    pub dictionary_terms: usize,
    pub skipped_rows: usize,
    pub fingerprint: Option<DictionaryFingerprint>,
}

/// Immutable term → entry index. At most one entry per term.
#[derive(Debug, Clone)]
pub struct LexiconIndex {
    entries: HashMap<String, LexiconEntry>,
    fingerprint: Option<DictionaryFingerprint>,
    skipped_rows: usize,
}

impl LexiconIndex {
    /// Index with only the built-in keyword groups.
    pub fn builtin() -> Self {
        Self::build(None, &LabelMap::default())
    }

    /// Merge the built-in groups with an optional dictionary.
    ///
    /// A term already present is replaced only by an entry with strictly
    /// higher urgency, so a dictionary row never displaces a built-in entry
    /// of equal or higher urgency.
    pub fn build(dictionary: Option<&Dictionary>, labels: &LabelMap) -> Self {
        let mut entries: HashMap<String, LexiconEntry> = HashMap::new();

        for group in BUILTIN_GROUPS {
            let resolved = labels.resolve(group.category);
            for &term in group.terms {
                let term = phrase_tokens(term).join(" ");
                insert_if_stronger(
                    &mut entries,
                    LexiconEntry {
                        term,
                        category: resolved.category.clone(),
                        specific_category: resolved.subcategory.clone(),
                        confidence: group.confidence,
                        urgency: group.urgency,
                        source: KeywordSource::Builtin,
                        translation: None,
                    },
                );
            }
        }

        if let Some(dictionary) = dictionary {
            for row in dictionary.rows() {
                insert_if_stronger(&mut entries, dictionary_entry(row, labels));
            }
        }

        let index = Self {
            entries,
            fingerprint: dictionary.map(|d| d.fingerprint().clone()),
            skipped_rows: dictionary.map_or(0, Dictionary::skipped),
        };
        let stats = index.stats();
        info!(
            terms = stats.terms,
            builtin = stats.builtin_terms,
            dictionary = stats.dictionary_terms,
            skipped = stats.skipped_rows,
            "keyword index built"
        );
        index
    }

    pub fn get(&self, term: &str) -> Option<&LexiconEntry> {
        self.entries.get(term)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fingerprint(&self) -> Option<&DictionaryFingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn stats(&self) -> LexiconStats {
        let builtin_terms = self
            .entries
            .values()
            .filter(|e| e.source == KeywordSource::Builtin)
            .count();
        LexiconStats {
            terms: self.entries.len(),
            builtin_terms,
            dictionary_terms: self.entries.len() - builtin_terms,
            skipped_rows: self.skipped_rows,
            fingerprint: self.fingerprint.clone(),
        }
    }

    /// Entries of one parent category, sorted by term.
    pub fn entries_for(&self, category: &str) -> Vec<&LexiconEntry> {
        let mut out: Vec<&LexiconEntry> = self
            .entries
            .values()
            .filter(|e| e.category == category)
            .collect();
        out.sort_by(|a, b| a.term.cmp(&b.term));
        out
    }
}

fn dictionary_entry(row: &DictionaryRow, labels: &LabelMap) -> LexiconEntry {
    let resolved = labels.resolve(&row.label);
    let specific = resolved.subcategory.as_deref().unwrap_or(&resolved.category);
    let urgency = row
        .urgency
        .or_else(|| labels.urgency_for(specific, &resolved.category))
        .unwrap_or(DEFAULT_DICTIONARY_URGENCY)
        .clamp(0.0, 100.0);
    let confidence = row
        .confidence
        .unwrap_or(DEFAULT_DICTIONARY_CONFIDENCE)
        .clamp(0.0, 1.0);

    LexiconEntry {
        term: row.term.clone(),
        category: resolved.category,
        specific_category: resolved.subcategory,
        confidence,
        urgency,
        source: KeywordSource::Dictionary,
        translation: row.translation.clone(),
    }
}

fn insert_if_stronger(entries: &mut HashMap<String, LexiconEntry>, entry: LexiconEntry) {
    match entries.get(&entry.term) {
        Some(existing) if entry.urgency <= existing.urgency => {}
        _ => {
            entries.insert(entry.term.clone(), entry);
        }
    }
}

// ── Store ──

/// Where the editable dictionary comes from.
pub trait DictionarySource: Send + Sync {
    fn load(&self) -> Result<Dictionary, LexiconError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Dictionary read from a JSON file on every sync.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DictionarySource for JsonFileSource {
    fn load(&self) -> Result<Dictionary, LexiconError> {
        Dictionary::from_json_file(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

impl DictionarySource for Dictionary {
    fn load(&self) -> Result<Dictionary, LexiconError> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory dictionary {}", self.fingerprint.version)
    }
}

/// Current lexicon index with copy-and-swap refresh.
pub struct LexiconStore {
    labels: LabelMap,
    index: RwLock<Arc<LexiconIndex>>,
}

impl std::fmt::Debug for LexiconStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexiconStore")
            .field("terms", &self.snapshot().len())
            .finish()
    }
}

impl LexiconStore {
    /// Store holding only the built-in keywords.
    pub fn new(labels: LabelMap) -> Self {
        let index = LexiconIndex::build(None, &labels);
        Self {
            labels,
            index: RwLock::new(Arc::new(index)),
        }
    }

    pub fn with_dictionary(labels: LabelMap, dictionary: &Dictionary) -> Self {
        let index = LexiconIndex::build(Some(dictionary), &labels);
        Self {
            labels,
            index: RwLock::new(Arc::new(index)),
        }
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// The current index. Holders keep it even if a refresh swaps in another.
    pub fn snapshot(&self) -> Arc<LexiconIndex> {
        Arc::clone(&self.index.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Rebuild the index if the dictionary fingerprint differs from the
    /// current one. `None` means builtin-only. Returns whether a rebuild happened.
    pub fn refresh(&self, dictionary: Option<&Dictionary>) -> bool {
        let wanted = dictionary.map(Dictionary::fingerprint);
        if self.snapshot().fingerprint() == wanted {
            debug!("dictionary unchanged, keeping keyword index");
            return false;
        }

        let index = Arc::new(LexiconIndex::build(dictionary, &self.labels));
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = index;
        true
    }

    /// Load the dictionary from a source and refresh. A load failure falls
    /// back to builtin-only keywords.
    pub fn sync(&self, source: &dyn DictionarySource) -> bool {
        match source.load() {
            Ok(dictionary) => self.refresh(Some(&dictionary)),
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "dictionary unavailable, using built-in keywords only");
                self.refresh(None)
            }
        }
    }
}
