//! Core type definitions for the Pantry substitution service.
//!
//! Documents use camelCase field names on the wire so catalog exports and
//! log records can be loaded without translation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Locale used when a requested translation is missing.
pub const DEFAULT_LOCALE: &str = "en";

// ---------------------------------------------------------------------------
// Localized text
// ---------------------------------------------------------------------------

/// A string available in several locales, keyed by locale tag (`"en"`, `"fr"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(pub BTreeMap<String, String>);

impl LocalizedText {
    /// Build a text with a single English value.
    #[must_use]
    pub fn en(value: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(DEFAULT_LOCALE.to_string(), value.into());
        Self(map)
    }

    /// Add or replace a translation.
    #[must_use]
    pub fn with(mut self, locale: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(locale.into(), value.into());
        self
    }

    /// Look up a locale, falling back to English and then to any translation.
    #[must_use]
    pub fn get(&self, locale: &str) -> Option<&str> {
        self.0
            .get(locale)
            .or_else(|| self.0.get(DEFAULT_LOCALE))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }

    /// The English value only, without fallback.
    #[must_use]
    pub fn english(&self) -> Option<&str> {
        self.0.get(DEFAULT_LOCALE).map(String::as_str)
    }

    /// Whether no translation is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Catalog documents
// ---------------------------------------------------------------------------

/// One known ingredient as held by the vocabulary cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    /// Canonical (catalog) name.
    pub canonical_name: String,
    /// Human-readable name per locale.
    #[serde(default)]
    pub display_name: LocalizedText,
    /// Optional image URI.
    #[serde(default)]
    pub image: Option<String>,
    /// Nutrient name to value.
    #[serde(default)]
    pub nutrition: BTreeMap<String, f64>,
    /// Diet or restriction tags this ingredient is not allowed in.
    #[serde(default)]
    pub not_allowed_in: BTreeSet<String>,
}

impl VocabularyEntry {
    /// Create an entry with only a canonical name.
    #[must_use]
    pub fn new(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            ..Self::default()
        }
    }

    /// Lower-cased key used by the vocabulary and the matcher.
    #[must_use]
    pub fn key(&self) -> String {
        self.canonical_name.trim().to_lowercase()
    }
}

/// Full ingredient document stored in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientRecord {
    /// Metadata projected into the vocabulary.
    #[serde(flatten)]
    pub entry: VocabularyEntry,
    /// Curated substitutes, in preference order.
    #[serde(default)]
    pub substitutes: Vec<String>,
}

impl IngredientRecord {
    /// Create a record with metadata and a curated substitute list.
    #[must_use]
    pub fn new(entry: VocabularyEntry, substitutes: Vec<String>) -> Self {
        Self { entry, substitutes }
    }
}

// ---------------------------------------------------------------------------
// Substitution results
// ---------------------------------------------------------------------------

/// A substitute proposed for one unit of the original ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionCandidate {
    /// Substitute name as produced by the generator.
    pub name: String,
    /// Amount of substitute replacing one unit of the original. Always > 0.
    pub ratio: f64,
}

impl SubstitutionCandidate {
    /// Amount of original replacing one unit of the substitute.
    #[must_use]
    pub fn inverse_ratio(&self) -> f64 {
        1.0 / self.ratio
    }
}

/// A substitute enriched with vocabulary metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSubstitute {
    /// Canonical substitute name.
    pub name: String,
    /// Localized display name (empty when the substitute is unknown).
    #[serde(default)]
    pub display_name: LocalizedText,
    /// Optional image URI.
    #[serde(default)]
    pub image: Option<String>,
    /// Nutrient name to value.
    #[serde(default)]
    pub nutrition: BTreeMap<String, f64>,
    /// Restriction tags.
    #[serde(default)]
    pub not_allowed_in: BTreeSet<String>,
    /// Ratio, present only for generated substitutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
}

impl ResolvedSubstitute {
    /// Merge a name with optional vocabulary metadata.
    #[must_use]
    pub fn from_entry(name: impl Into<String>, entry: Option<&VocabularyEntry>, quantity: Option<f64>) -> Self {
        let name = name.into();
        match entry {
            Some(entry) => Self {
                name,
                display_name: entry.display_name.clone(),
                image: entry.image.clone(),
                nutrition: entry.nutrition.clone(),
                not_allowed_in: entry.not_allowed_in.clone(),
                quantity,
            },
            None => Self {
                name,
                display_name: LocalizedText::default(),
                image: None,
                nutrition: BTreeMap::new(),
                not_allowed_in: BTreeSet::new(),
                quantity,
            },
        }
    }
}

/// Where the substitutes of a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionSource {
    /// Curated list stored in the catalog.
    Catalog,
    /// Generated by the language model and reconciled with the vocabulary.
    Generated,
    /// Nothing was looked up (unknown ingredient).
    None,
}

impl fmt::Display for SubstitutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Catalog => "catalog",
            Self::Generated => "generated",
            Self::None => "none",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a substitution lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionResult {
    /// Matched canonical ingredient, `None` when the input is unknown.
    pub ingredient: Option<String>,
    /// Substitutes in preference order.
    pub substitutes: Vec<ResolvedSubstitute>,
    /// Origin of the substitutes.
    pub source: SubstitutionSource,
}

impl SubstitutionResult {
    /// The "unknown ingredient" terminal state.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            ingredient: None,
            substitutes: Vec::new(),
            source: SubstitutionSource::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Historical logs
// ---------------------------------------------------------------------------

/// One substitute offered in a past request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggedSubstitute {
    /// Localized substitute name.
    #[serde(default)]
    pub name: LocalizedText,
    /// Ratio as the model wrote it.
    #[serde(default)]
    pub ratio: Option<String>,
    /// 1 when the user accepted this substitute.
    #[serde(default)]
    pub picked: u8,
}

/// Historical record of a substitution request and the user's choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionLogEntry {
    /// Ingredient the user asked about.
    pub ingredient: String,
    /// Recipe text at the time of the request.
    #[serde(default)]
    pub recipe_context: String,
    /// Substitutes that were offered.
    #[serde(default)]
    pub generated_substitutes: Vec<LoggedSubstitute>,
    /// When the entry was recorded.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl SubstitutionLogEntry {
    /// Whether any offered substitute was picked.
    #[must_use]
    pub fn has_pick(&self) -> bool {
        self.generated_substitutes.iter().any(|s| s.picked == 1)
    }

    /// The accepted substitute, only if exactly one was picked.
    #[must_use]
    pub fn accepted_pick(&self) -> Option<&LoggedSubstitute> {
        let mut picked = self.generated_substitutes.iter().filter(|s| s.picked == 1);
        let first = picked.next()?;
        if picked.next().is_some() {
            return None;
        }
        Some(first)
    }
}

// ---------------------------------------------------------------------------
// Step rewriting
// ---------------------------------------------------------------------------

/// Input for rewriting a recipe step after a swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRewriteRequest {
    /// Original instruction text.
    pub step: String,
    /// Ingredient being replaced.
    pub original: String,
    /// Ingredient replacing it.
    pub substitute: String,
    /// Target locale for the rewritten text.
    pub locale: String,
}

/// A rewritten recipe step. `description` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRewrite {
    /// Short step title, may be empty.
    #[serde(default)]
    pub title: String,
    /// Step instruction.
    pub description: String,
}

impl StepRewrite {
    /// The no-op rewrite: the original step unchanged.
    #[must_use]
    pub fn unchanged(step: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            description: step.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
