//! Shared fakes for service integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pantry_core::catalog::{CatalogStore, InMemoryCatalog};
use pantry_core::config::PantryConfig;
use pantry_core::error::{PantryError, Result};
use pantry_core::types::{
    IngredientRecord, LocalizedText, LoggedSubstitute, SubstitutionLogEntry, VocabularyEntry,
};
use pantry_llm::{ChatTransport, LlmError, LlmRequest, LlmResponse};
use pantry_service::SubstitutionService;
use parking_lot::Mutex;

pub const MODEL: &str = "gpt-4o-mini";

/// Transport that replays scripted replies in order and records prompts.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<std::result::Result<String, LlmError>>>,
    prompts: Mutex<Vec<LlmRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<std::result::Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn failing(times: usize) -> Self {
        Self::new((0..times).map(|_| Err(LlmError::Unavailable("connection refused".into()))).collect())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn complete(&self, request: &LlmRequest) -> std::result::Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.replies.lock().pop_front();
        match next {
            Some(Ok(text)) => Ok(LlmResponse {
                text,
                tokens_generated: 0,
                latency: self.delay.unwrap_or_default(),
                model: request.model.clone(),
            }),
            Some(Err(e)) => Err(e),
            None => Err(LlmError::Unavailable("script exhausted".into())),
        }
    }
}

/// Catalog wrapper counting queries, optionally failing every one.
pub struct CountingStore {
    inner: InMemoryCatalog,
    pub ingredient_queries: AtomicUsize,
    pub substitute_queries: AtomicUsize,
    fail: bool,
}

impl CountingStore {
    pub fn new(inner: InMemoryCatalog) -> Self {
        Self {
            inner,
            ingredient_queries: AtomicUsize::new(0),
            substitute_queries: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new(InMemoryCatalog::new())
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            Err(PantryError::Store("connection reset".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogStore for CountingStore {
    async fn all_ingredients(&self) -> Result<Vec<VocabularyEntry>> {
        self.ingredient_queries.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.all_ingredients().await
    }

    async fn stored_substitutes(&self, canonical_name: &str) -> Result<Vec<String>> {
        self.substitute_queries.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.stored_substitutes(canonical_name).await
    }

    async fn picked_logs(&self) -> Result<Vec<SubstitutionLogEntry>> {
        self.check()?;
        self.inner.picked_logs().await
    }
}

pub fn record(name: &str, substitutes: &[&str]) -> IngredientRecord {
    let mut entry = VocabularyEntry::new(name);
    entry.display_name = LocalizedText::en(name).with("de", format!("{name} (de)"));
    entry.nutrition.insert("kcal".into(), 100.0);
    IngredientRecord::new(entry, substitutes.iter().map(|s| (*s).to_string()).collect())
}

/// Butter has a curated list; the milks and eggs do not.
pub fn kitchen_catalog(logs: Vec<SubstitutionLogEntry>) -> InMemoryCatalog {
    InMemoryCatalog::with_records(
        vec![
            record("butter", &["ghee", "margarine", "coconut oil"]),
            record("ghee", &[]),
            record("margarine", &[]),
            record("coconut oil", &[]),
            record("milk", &[]),
            record("oat milk", &[]),
            record("soy milk", &[]),
            record("almond milk", &[]),
            record("egg", &[]),
            record("applesauce", &[]),
            record("flaxseed", &[]),
        ],
        logs,
    )
}

pub fn log(ingredient: &str, picks: &[(&str, Option<&str>, u8)]) -> SubstitutionLogEntry {
    SubstitutionLogEntry {
        ingredient: ingredient.into(),
        recipe_context: format!("A recipe using {ingredient}."),
        generated_substitutes: picks
            .iter()
            .map(|(name, ratio, picked)| LoggedSubstitute {
                name: LocalizedText::en(*name),
                ratio: ratio.map(String::from),
                picked: *picked,
            })
            .collect(),
        created_at: None,
    }
}

pub fn service(store: Arc<dyn CatalogStore>, transport: Arc<dyn ChatTransport>) -> SubstitutionService {
    SubstitutionService::new(store, transport, &PantryConfig::default())
}
