//! Prompt templates for the three LLM tasks.
//!
//! Every prompt is a versioned, testable artifact. The compiled-in constants
//! below are the defaults; a directory of TOML files can override any of them.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::LlmError;

/// Substitute generation. Output is strict JSON.
pub const SUBSTITUTE_GENERATION: &str = r#"You are a culinary assistant that suggests ingredient substitutions.

Ingredient to replace: {ingredient}

Recipe:
{recipe}

Accepted substitutions from earlier recipes:
{examples}

Suggest up to {max_substitutes} substitutes for the ingredient in this recipe.

RULES:
- Use plain ingredient names. Put preparation notes in parentheses, e.g. "butter (unsalted)".
- "ratio" is how much of the substitute replaces 1 unit of the original, e.g. "0.75 cup".
- Ratios must be reciprocal-consistent: if A replaces B at 0.5, then B replaces A at 2.
- Never suggest the ingredient itself.
- Respond with JSON only, no prose and no code fences.

Return JSON:
{"substitutes": [{"name": "substitute name", "ratio": "amount per 1 unit"}]}"#;

/// Step rewrite. Output is strict JSON.
pub const STEP_REWRITE: &str = r#"You are rewriting one step of a recipe after an ingredient was swapped.

Original step:
{step}

Replaced ingredient: {original}
Replacement: {substitute}

RULES:
- Rewrite the step so it uses {substitute}, adjusting technique only where the replacement requires it.
- Never mention {original} in the title or the description.
- Use the imperative mood.
- Write in the language with code "{locale}".
- Respond with JSON only, no prose and no code fences.

Return JSON:
{"title": "short step title", "description": "rewritten instruction"}"#;

/// Explanation. Output is free text.
pub const EXPLANATION: &str = r"Explain in at most 2 sentences why {substitute} works as a replacement for {original} in this recipe.
Mention the property it preserves (texture, moisture, binding, flavor or leavening). Answer with the explanation only.

Recipe:
{recipe}";

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

// ---------------------------------------------------------------------------
// PromptEngine: Versioned TOML Template Loader
// ---------------------------------------------------------------------------

/// Identifies a prompt template by purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Substitute list for an ingredient missing from the catalog.
    SubstituteGeneration,
    /// Recipe step rewritten around a substitute.
    StepRewrite,
    /// Short justification of a substitution.
    Explanation,
}

impl PromptId {
    /// Returns the TOML filename (without path) for this prompt.
    #[must_use]
    pub fn filename(self) -> &'static str {
        match self {
            Self::SubstituteGeneration => "substitute_generation.toml",
            Self::StepRewrite => "step_rewrite.toml",
            Self::Explanation => "explanation.toml",
        }
    }

    /// All prompt IDs.
    #[must_use]
    pub fn all() -> &'static [PromptId] {
        &[Self::SubstituteGeneration, Self::StepRewrite, Self::Explanation]
    }

    /// Placeholders the template is expected to contain.
    #[must_use]
    pub fn placeholders(self) -> &'static [&'static str] {
        match self {
            Self::SubstituteGeneration => &["ingredient", "recipe", "examples", "max_substitutes"],
            Self::StepRewrite => &["step", "original", "substitute", "locale"],
            Self::Explanation => &["original", "substitute", "recipe"],
        }
    }

    fn builtin_text(self) -> &'static str {
        match self {
            Self::SubstituteGeneration => SUBSTITUTE_GENERATION,
            Self::StepRewrite => STEP_REWRITE,
            Self::Explanation => EXPLANATION,
        }
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SubstituteGeneration => "substitute_generation",
            Self::StepRewrite => "step_rewrite",
            Self::Explanation => "explanation",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PromptId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "substitute_generation" => Ok(Self::SubstituteGeneration),
            "step_rewrite" => Ok(Self::StepRewrite),
            "explanation" => Ok(Self::Explanation),
            _ => Err(format!("unknown prompt id: '{s}'")),
        }
    }
}

/// Contents of a TOML prompt file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptFile {
    prompt: TomlPromptData,
}

/// Inner `[prompt]` section of a TOML file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptData {
    version: String,
    template: String,
}

/// A loaded, ready-to-render prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Prompt version string (e.g., "1.0").
    pub version: String,
    /// User message template (contains `{key}` placeholders).
    pub template: String,
}

/// Engine that holds one template per [`PromptId`] and renders them.
///
/// # Example
///
/// ```
/// use pantry_llm::prompt::{PromptEngine, PromptId};
///
/// let engine = PromptEngine::builtin();
/// let prompt = engine.render(
///     PromptId::Explanation,
///     &[("original", "butter"), ("substitute", "ghee"), ("recipe", "Shortbread")],
/// );
/// assert!(prompt.contains("ghee"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptEngine {
    templates: HashMap<PromptId, PromptTemplate>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptEngine {
    /// Create a `PromptEngine` with the compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        let templates = PromptId::all()
            .iter()
            .map(|id| {
                (*id, PromptTemplate {
                    version: "builtin".into(),
                    template: id.builtin_text().into(),
                })
            })
            .collect();
        Self { templates }
    }

    /// Start from the built-ins and override each template that has a TOML
    /// file in `dir`. Unknown files are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] if the directory is missing or a
    /// template file cannot be read or parsed.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, LlmError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LlmError::ConfigError(format!(
                "prompt template directory not found: {}",
                dir.display()
            )));
        }

        let mut engine = Self::builtin();
        for id in PromptId::all() {
            let path: PathBuf = dir.join(id.filename());
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| {
                LlmError::ConfigError(format!("failed to read {}: {e}", path.display()))
            })?;
            let parsed: TomlPromptFile = toml::from_str(&content).map_err(|e| {
                LlmError::ConfigError(format!("failed to parse {}: {e}", path.display()))
            })?;

            for key in id.placeholders() {
                if !parsed.prompt.template.contains(&format!("{{{key}}}")) {
                    tracing::warn!(prompt = %id, placeholder = key, "Template override omits placeholder");
                }
            }

            tracing::debug!(prompt = %id, version = %parsed.prompt.version, "Loaded prompt override");
            engine.templates.insert(*id, PromptTemplate {
                version: parsed.prompt.version,
                template: parsed.prompt.template,
            });
        }

        Ok(engine)
    }

    /// Get a loaded prompt template by ID.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&PromptTemplate> {
        self.templates.get(&id)
    }

    /// Render the template for `id` with all `{key}` placeholders replaced.
    /// Every ID always has a template, so this cannot fail.
    #[must_use]
    pub fn render(&self, id: PromptId, vars: &[(&str, &str)]) -> String {
        let template = self
            .get(id)
            .map_or_else(|| id.builtin_text(), |tpl| tpl.template.as_str());
        render_template(template, vars)
    }

    /// Number of loaded templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no templates are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Version string of the template in use for `id`.
    #[must_use]
    pub fn version(&self, id: PromptId) -> &str {
        self.get(id).map_or("builtin", |tpl| tpl.version.as_str())
    }
}
