//! Configuration for the Pantry substitution service.
//!
//! Maps directly to `pantry.toml`. Every section and field has a default, so
//! an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level Pantry configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PantryConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Fuzzy matching tuning.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Catalog store and vocabulary cache.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// LLM integration settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Prompt construction settings.
    #[serde(default)]
    pub prompts: PromptConfig,
}

impl PantryConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `PantryError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::PantryError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log filter directive: trace, debug, info, warn, error, or a full
    /// `EnvFilter` expression.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format: "pretty" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Fuzzy matcher tuning. The threshold is a design constant, not learned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum Dice similarity for a match to be accepted.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Maximum number of substitutes returned per request.
    #[serde(default = "default_10_usize")]
    pub max_matches: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.77,
            max_matches: 10,
        }
    }
}

/// Catalog store and vocabulary cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Backend: "sqlite" or "memory".
    #[serde(default = "default_sqlite")]
    pub backend: String,
    /// Path of the SQLite database.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Use WAL mode for concurrent readers.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Vocabulary snapshot lifetime in seconds. 0 keeps it until invalidated.
    #[serde(default)]
    pub vocabulary_ttl_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: "pantry.db".to_string(),
            wal_mode: true,
            vocabulary_ttl_secs: 0,
        }
    }
}

/// LLM integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "openai" (any OpenAI-compatible endpoint) or "none".
    #[serde(default = "default_openai")]
    pub provider: String,
    /// Full chat-completions URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Model used to generate substitutes.
    #[serde(default = "default_model")]
    pub generation_model: String,
    /// Model used to rewrite recipe steps.
    #[serde(default = "default_model")]
    pub rewrite_model: String,
    /// Model used to explain substitutions.
    #[serde(default = "default_model")]
    pub explanation_model: String,
    /// Sampling temperature for substitute generation.
    #[serde(default = "default_0_1")]
    pub generation_temperature: f32,
    /// Sampling temperature for step rewriting.
    #[serde(default)]
    pub rewrite_temperature: f32,
    /// Sampling temperature for explanations.
    #[serde(default = "default_0_5")]
    pub explanation_temperature: f32,
    /// Per-attempt HTTP timeout in milliseconds.
    #[serde(default = "default_30000")]
    pub request_timeout_ms: u64,
    /// Attempts for the generation path (including the first).
    #[serde(default = "default_3")]
    pub max_attempts: u32,
    /// Fixed pause between generation attempts in milliseconds.
    #[serde(default = "default_2000")]
    pub retry_backoff_ms: u64,
    /// Overall generation deadline in milliseconds. 0 disables it.
    #[serde(default)]
    pub deadline_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            generation_model: default_model(),
            rewrite_model: default_model(),
            explanation_model: default_model(),
            generation_temperature: 0.1,
            rewrite_temperature: 0.0,
            explanation_temperature: 0.5,
            request_timeout_ms: 30_000,
            max_attempts: 3,
            retry_backoff_ms: 2000,
            deadline_ms: 0,
        }
    }
}

/// Prompt construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Maximum accepted historical substitutions included as examples.
    #[serde(default = "default_3_usize")]
    pub few_shot_max: usize,
    /// Recipe context is truncated to this many characters in examples.
    #[serde(default = "default_400")]
    pub context_chars: usize,
    /// Number of substitutes requested from the model.
    #[serde(default = "default_10_usize")]
    pub max_substitutes: usize,
    /// Optional directory of TOML template overrides. Empty uses built-ins.
    #[serde(default)]
    pub template_dir: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            few_shot_max: 3,
            context_chars: 400,
            max_substitutes: 10,
            template_dir: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_sqlite() -> String { "sqlite".to_string() }
fn default_db_path() -> String { "pantry.db".to_string() }
fn default_openai() -> String { "openai".to_string() }
fn default_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_api_key_env() -> String { "PANTRY_LLM_API_KEY".to_string() }
fn default_model() -> String { "gpt-4o-mini".to_string() }
fn default_threshold() -> f64 { 0.77 }
fn default_0_1() -> f32 { 0.1 }
fn default_0_5() -> f32 { 0.5 }
fn default_3() -> u32 { 3 }
fn default_3_usize() -> usize { 3 }
fn default_10_usize() -> usize { 10 }
fn default_400() -> usize { 400 }
fn default_2000() -> u64 { 2000 }
fn default_30000() -> u64 { 30_000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = PantryConfig::from_toml("").expect("empty config is valid");
        assert!((config.matching.threshold - 0.77).abs() < f64::EPSILON);
        assert_eq!(config.matching.max_matches, 10);
        assert_eq!(config.llm.max_attempts, 3);
        assert_eq!(config.llm.retry_backoff_ms, 2000);
        assert_eq!(config.prompts.few_shot_max, 3);
        assert_eq!(config.prompts.context_chars, 400);
    }

    #[test]
    fn partial_sections_override_only_given_fields() {
        let config = PantryConfig::from_toml(
            r#"
            [matching]
            threshold = 0.9

            [llm]
            provider = "none"
            explanation_temperature = 0.7
            "#,
        )
        .expect("valid config");
        assert!((config.matching.threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.matching.max_matches, 10);
        assert_eq!(config.llm.provider, "none");
        assert!((config.llm.explanation_temperature - 0.7).abs() < f32::EPSILON);
        assert!((config.llm.generation_temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = PantryConfig::from_toml("[matching\nthreshold = ").expect_err("invalid");
        assert!(matches!(err, crate::PantryError::Config(_)));
    }

    #[test]
    fn missing_api_key_env_is_none() {
        let config = LlmConfig {
            api_key_env: "PANTRY_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        assert!(config.api_key().is_none());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pantry.toml");
        std::fs::write(&path, "[catalog]\nbackend = \"memory\"\n").expect("write config");
        let config = PantryConfig::from_file(&path).expect("load");
        assert_eq!(config.catalog.backend, "memory");
        assert_eq!(config.catalog.path, "pantry.db");
    }
}
