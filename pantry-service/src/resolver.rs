//! Substitution resolver: catalog first, generation as fallback.
//!
//! ```text
//! input ──match──▶ canonical ──catalog──▶ stored list? ──yes──▶ Catalog result
//!                                              │ no
//!                                              ▼
//!               few-shot + prompt ──LLM (retry)──▶ candidates
//!                                              │
//!            strip "(...)" ──match──▶ drop self, dedupe, cap ──▶ Generated result
//! ```
//!
//! No operation here returns an error. Store and model failures are logged,
//! counted in [`SubstitutionMetrics`] and degrade to empty results.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use pantry_core::catalog::{CatalogStore, InMemoryCatalog};
use pantry_core::config::PantryConfig;
use pantry_core::matcher::FuzzyMatcher;
use pantry_core::metrics::SubstitutionMetrics;
use pantry_core::persistence::SqliteCatalog;
use pantry_core::types::{
    ResolvedSubstitute, SubstitutionCandidate, SubstitutionLogEntry, SubstitutionResult, SubstitutionSource,
};
use pantry_core::vocabulary::{Vocabulary, VocabularyCache};
use pantry_llm::parse::{self, ParseStage};
use pantry_llm::{ChatTransport, LlmClient, LlmError, LlmRequest, PromptEngine, PromptId, RetryPolicy};
use regex::Regex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, ServiceError};
use crate::few_shot::build_few_shot_examples;

/// Parenthetical annotations such as "(unsalted)".
static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\([^)]*\)").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Remove parenthetical annotations from a generated name.
#[must_use]
pub fn strip_annotations(name: &str) -> String {
    ANNOTATION.replace_all(name, "").trim().to_string()
}

/// Per-task model settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Model identifier sent to the endpoint.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Tunables resolved from [`PantryConfig`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Substitute generation.
    pub generation: ModelSettings,
    /// Step rewriting.
    pub rewrite: ModelSettings,
    /// Explanations.
    pub explanation: ModelSettings,
    /// Per-request HTTP timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Retry policy of the generation path.
    pub retry: RetryPolicy,
    /// Accepted examples included in the generation prompt.
    pub few_shot_max: usize,
    /// Recipe-context characters kept per example.
    pub context_chars: usize,
    /// Substitutes requested from the model.
    pub max_substitutes: usize,
}

impl ServiceSettings {
    /// Derive settings from the LLM and prompt sections of `config`.
    #[must_use]
    pub fn from_config(config: &PantryConfig) -> Self {
        let llm = &config.llm;
        let mut retry = RetryPolicy::fixed(llm.max_attempts, Duration::from_millis(llm.retry_backoff_ms));
        if llm.deadline_ms > 0 {
            retry = retry.with_deadline(Duration::from_millis(llm.deadline_ms));
        }
        Self {
            generation: ModelSettings {
                model: llm.generation_model.clone(),
                temperature: llm.generation_temperature,
            },
            rewrite: ModelSettings {
                model: llm.rewrite_model.clone(),
                temperature: llm.rewrite_temperature,
            },
            explanation: ModelSettings {
                model: llm.explanation_model.clone(),
                temperature: llm.explanation_temperature,
            },
            request_timeout_ms: llm.request_timeout_ms,
            retry,
            few_shot_max: config.prompts.few_shot_max,
            context_chars: config.prompts.context_chars,
            max_substitutes: config.prompts.max_substitutes,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&PantryConfig::default())
    }
}

/// Ingredient substitution service. `Send + Sync`; share it behind an `Arc`.
pub struct SubstitutionService {
    pub(crate) store: Arc<dyn CatalogStore>,
    pub(crate) transport: Arc<dyn ChatTransport>,
    pub(crate) vocabulary: VocabularyCache,
    pub(crate) matcher: FuzzyMatcher,
    pub(crate) metrics: Arc<SubstitutionMetrics>,
    pub(crate) prompts: PromptEngine,
    pub(crate) settings: ServiceSettings,
}

impl std::fmt::Debug for SubstitutionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubstitutionService")
            .field("matcher", &self.matcher)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SubstitutionService {
    /// Assemble a service over an existing store and transport.
    #[must_use]
    pub fn new(store: Arc<dyn CatalogStore>, transport: Arc<dyn ChatTransport>, config: &PantryConfig) -> Self {
        let metrics = Arc::new(SubstitutionMetrics::new());
        let ttl = match config.catalog.vocabulary_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            vocabulary: VocabularyCache::new(Arc::clone(&store), Arc::clone(&metrics), ttl),
            store,
            transport,
            matcher: FuzzyMatcher::from_config(&config.matching),
            metrics,
            prompts: PromptEngine::builtin(),
            settings: ServiceSettings::from_config(config),
        }
    }

    /// Build the store, LLM client and templates described by `config`.
    ///
    /// A missing API key disables generation instead of failing: lookups
    /// still work from the catalog.
    ///
    /// # Errors
    ///
    /// Unknown backend or provider names, an unopenable database, or an
    /// unreadable template directory.
    pub fn from_config(config: &PantryConfig) -> Result<Self> {
        let store: Arc<dyn CatalogStore> = match config.catalog.backend.as_str() {
            "sqlite" => Arc::new(SqliteCatalog::open(&config.catalog.path, &config.catalog)?),
            "memory" => Arc::new(InMemoryCatalog::new()),
            other => return Err(ServiceError::Config(format!("unknown catalog backend '{other}'"))),
        };

        let transport: Arc<dyn ChatTransport> = match config.llm.provider.as_str() {
            "openai" => match config.llm.api_key() {
                Some(key) => Arc::new(LlmClient::openai(config.llm.endpoint.clone(), key)),
                None => {
                    warn!(env = %config.llm.api_key_env, "No LLM API key set, generation disabled");
                    Arc::new(LlmClient::none())
                }
            },
            "none" => Arc::new(LlmClient::none()),
            other => return Err(ServiceError::Config(format!("unknown LLM provider '{other}'"))),
        };

        let mut service = Self::new(store, transport, config);
        if !config.prompts.template_dir.is_empty() {
            service.prompts = PromptEngine::from_directory(Path::new(&config.prompts.template_dir))?;
        }

        info!(
            backend = %config.catalog.backend,
            provider = %config.llm.provider,
            generation_model = %service.settings.generation.model,
            "Substitution service ready"
        );
        Ok(service)
    }

    /// Replace the prompt templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptEngine) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replace the tunables.
    #[must_use]
    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Metrics recorded by this service.
    #[must_use]
    pub fn metrics(&self) -> &Arc<SubstitutionMetrics> {
        &self.metrics
    }

    /// The vocabulary cache, e.g. to invalidate it after catalog edits.
    #[must_use]
    pub fn vocabulary(&self) -> &VocabularyCache {
        &self.vocabulary
    }

    /// Resolve substitutes for `ingredient` in the context of a recipe.
    ///
    /// An ingredient that matches nothing in the vocabulary yields
    /// [`SubstitutionResult::unknown`]. A known ingredient with no usable
    /// substitutes yields its canonical name and an empty list.
    pub async fn resolve(&self, ingredient: &str, recipe_context: &str) -> SubstitutionResult {
        let vocabulary = self.vocabulary.ensure_loaded().await;

        let Some(canonical) = self.matcher.find_closest_match(&vocabulary, ingredient) else {
            debug!(ingredient, "Ingredient not in vocabulary");
            return SubstitutionResult::unknown();
        };

        let stored = self.stored_substitutes(&canonical).await;
        if !stored.is_empty() {
            let substitutes: Vec<_> = stored
                .iter()
                .map(|name| ResolvedSubstitute::from_entry(name.as_str(), vocabulary.get(name), None))
                .collect();
            info!(ingredient = %canonical, count = substitutes.len(), "Substitutes from catalog");
            return SubstitutionResult {
                ingredient: Some(canonical),
                substitutes,
                source: SubstitutionSource::Catalog,
            };
        }

        let candidates = self.generate_substitutes(&canonical, recipe_context).await;
        let substitutes = self.reconcile(&vocabulary, &canonical, &candidates);
        info!(
            ingredient = %canonical,
            generated = candidates.len(),
            matched = substitutes.len(),
            "Substitutes from generation"
        );
        SubstitutionResult {
            ingredient: Some(canonical),
            substitutes,
            source: SubstitutionSource::Generated,
        }
    }

    /// Ask the model for substitutes of `ingredient`, retrying per policy.
    ///
    /// Names are returned as the model wrote them. Exhausted retries yield an
    /// empty list and one increment of the error counter.
    pub async fn generate_substitutes(&self, ingredient: &str, recipe: &str) -> Vec<SubstitutionCandidate> {
        if !self.transport.is_available() {
            debug!(ingredient, "Generation skipped, no LLM backend");
            return Vec::new();
        }

        let logs = self.picked_logs().await;
        let examples = build_few_shot_examples(&logs, self.settings.few_shot_max, self.settings.context_chars);
        let max_substitutes = self.settings.max_substitutes.to_string();
        let prompt = self.prompts.render(
            PromptId::SubstituteGeneration,
            &[
                ("ingredient", ingredient),
                ("recipe", recipe),
                ("examples", examples.as_str()),
                ("max_substitutes", max_substitutes.as_str()),
            ],
        );

        let model = self.settings.generation.model.as_str();
        let request = LlmRequest::new(model, prompt, self.settings.generation.temperature)
            .with_timeout(self.settings.request_timeout_ms);
        let request = &request;
        let transport = self.transport.as_ref();

        let started = Instant::now();
        let outcome = self
            .settings
            .retry
            .run("substitute_generation", move |attempt| async move {
                let response = transport.complete(request).await?;
                let recovered = parse::recover_substitutes(&response.text)?;
                if recovered.stage == ParseStage::Extracted {
                    debug!(attempt, "Substitute JSON cut out of surrounding text");
                }
                Ok::<_, LlmError>(parse::substitute_candidates(&recovered.value))
            })
            .await;
        self.metrics.observe_latency(model, started.elapsed());

        match outcome {
            Ok(done) => {
                self.metrics.set_last_latency(model, done.last_attempt);
                debug!(ingredient, attempts = done.attempts, candidates = done.value.len(), "Generation succeeded");
                done.value
                    .into_iter()
                    .map(|g| SubstitutionCandidate {
                        name: g.name,
                        ratio: g.ratio,
                    })
                    .collect()
            }
            Err(e) => {
                self.metrics.record_generation_error(model);
                warn!(ingredient, error = %e, "Generation failed, returning no substitutes");
                Vec::new()
            }
        }
    }

    /// Map generated candidates onto the vocabulary.
    ///
    /// Each name loses its annotations before matching. A match equal to the
    /// original is dropped, the first ratio seen for a match wins, and the
    /// list is capped at the matcher's limit.
    fn reconcile(
        &self,
        vocabulary: &Vocabulary,
        original: &str,
        candidates: &[SubstitutionCandidate],
    ) -> Vec<ResolvedSubstitute> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for candidate in candidates {
            if resolved.len() >= self.matcher.max_matches() {
                break;
            }
            let cleaned = strip_annotations(&candidate.name);
            let Some(name) = self.matcher.find_closest_match(vocabulary, &cleaned) else {
                debug!(candidate = %candidate.name, "Generated substitute not in vocabulary");
                continue;
            };
            if name == original {
                debug!(candidate = %candidate.name, "Dropping self-substitution");
                continue;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            let entry = vocabulary.get(&name);
            resolved.push(ResolvedSubstitute::from_entry(name, entry, Some(candidate.ratio)));
        }

        resolved
    }

    async fn stored_substitutes(&self, canonical: &str) -> Vec<String> {
        match self.store.stored_substitutes(canonical).await {
            Ok(list) => list
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .take(self.matcher.max_matches())
                .collect(),
            Err(e) => {
                self.metrics.record_store_error();
                warn!(ingredient = canonical, error = %e, "Stored substitute lookup failed, falling back to generation");
                Vec::new()
            }
        }
    }

    async fn picked_logs(&self) -> Vec<SubstitutionLogEntry> {
        match self.store.picked_logs().await {
            Ok(logs) => logs,
            Err(e) => {
                self.metrics.record_store_error();
                warn!(error = %e, "Log query failed, prompting without examples");
                Vec::new()
            }
        }
    }
}
