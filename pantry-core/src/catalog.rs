//! Catalog store abstraction.
//!
//! The substitution service only reads from the catalog. Writes exist on the
//! concrete stores for seeding and tooling.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{IngredientRecord, SubstitutionLogEntry, VocabularyEntry};

/// Read-only queries the service issues against the ingredient catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All ingredients, projected to vocabulary metadata.
    async fn all_ingredients(&self) -> Result<Vec<VocabularyEntry>>;

    /// The curated substitute list of one ingredient, by lower-cased
    /// canonical name. Unknown ingredients yield an empty list.
    async fn stored_substitutes(&self, canonical_name: &str) -> Result<Vec<String>>;

    /// Historical log entries with at least one picked substitute, oldest first.
    async fn picked_logs(&self) -> Result<Vec<SubstitutionLogEntry>>;
}

/// Catalog held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<InMemoryInner>,
}

#[derive(Debug, Default)]
struct InMemoryInner {
    order: Vec<String>,
    records: HashMap<String, IngredientRecord>,
    logs: Vec<SubstitutionLogEntry>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from records and logs.
    #[must_use]
    pub fn with_records(records: Vec<IngredientRecord>, logs: Vec<SubstitutionLogEntry>) -> Self {
        let catalog = Self::new();
        for record in records {
            catalog.upsert_ingredient(record);
        }
        for log in logs {
            catalog.append_log(log);
        }
        catalog
    }

    /// Insert or replace an ingredient, keyed by lower-cased canonical name.
    pub fn upsert_ingredient(&self, record: IngredientRecord) {
        let key = record.entry.key();
        let mut inner = self.inner.write();
        if !inner.records.contains_key(&key) {
            inner.order.push(key.clone());
        }
        inner.records.insert(key, record);
    }

    /// Append a historical log entry.
    pub fn append_log(&self, entry: SubstitutionLogEntry) {
        self.inner.write().logs.push(entry);
    }

    /// Number of ingredients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Whether the catalog holds no ingredients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn all_ingredients(&self) -> Result<Vec<VocabularyEntry>> {
        let inner = self.inner.read();
        Ok(inner
            .order
            .iter()
            .filter_map(|key| inner.records.get(key))
            .map(|record| record.entry.clone())
            .collect())
    }

    async fn stored_substitutes(&self, canonical_name: &str) -> Result<Vec<String>> {
        let key = canonical_name.trim().to_lowercase();
        Ok(self
            .inner
            .read()
            .records
            .get(&key)
            .map(|record| record.substitutes.clone())
            .unwrap_or_default())
    }

    async fn picked_logs(&self) -> Result<Vec<SubstitutionLogEntry>> {
        Ok(self
            .inner
            .read()
            .logs
            .iter()
            .filter(|entry| entry.has_pick())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LocalizedText, LoggedSubstitute};

    fn record(name: &str, subs: &[&str]) -> IngredientRecord {
        IngredientRecord::new(
            VocabularyEntry::new(name),
            subs.iter().map(|s| (*s).to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn all_ingredients_keeps_insertion_order() {
        let catalog = InMemoryCatalog::with_records(
            vec![record("Butter", &[]), record("Milk", &[]), record("Egg", &[])],
            vec![],
        );
        let names: Vec<String> = catalog
            .all_ingredients()
            .await
            .expect("in-memory query")
            .into_iter()
            .map(|e| e.canonical_name)
            .collect();
        assert_eq!(names, vec!["Butter", "Milk", "Egg"]);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_record() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_ingredient(record("butter", &["ghee"]));
        catalog.upsert_ingredient(record("Butter", &["margarine"]));
        assert_eq!(catalog.len(), 1);
        let subs = catalog.stored_substitutes("BUTTER").await.expect("query");
        assert_eq!(subs, vec!["margarine".to_string()]);
    }

    #[tokio::test]
    async fn unknown_ingredient_has_no_substitutes() {
        let catalog = InMemoryCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.stored_substitutes("saffron").await.expect("query").is_empty());
    }

    #[tokio::test]
    async fn picked_logs_skip_entries_without_pick() {
        let catalog = InMemoryCatalog::new();
        for (i, picked) in [0u8, 1, 0, 1].into_iter().enumerate() {
            catalog.append_log(SubstitutionLogEntry {
                ingredient: format!("ingredient-{i}"),
                generated_substitutes: vec![LoggedSubstitute {
                    name: LocalizedText::en("x"),
                    ratio: Some("1".into()),
                    picked,
                }],
                ..SubstitutionLogEntry::default()
            });
        }
        let logs = catalog.picked_logs().await.expect("query");
        let names: Vec<&str> = logs.iter().map(|l| l.ingredient.as_str()).collect();
        assert_eq!(names, vec!["ingredient-1", "ingredient-3"]);
    }
}
