//! Free-text justification of a substitution.

use pantry_llm::LlmRequest;
use pantry_llm::PromptId;
use tracing::warn;

use crate::resolver::SubstitutionService;

/// Returned when no explanation could be generated.
pub const EXPLANATION_UNAVAILABLE: &str = "No explanation available for this substitution.";

impl SubstitutionService {
    /// Explain in at most two sentences why `substitute` can replace
    /// `original` in `recipe`.
    ///
    /// One attempt, no retry; failure yields [`EXPLANATION_UNAVAILABLE`].
    pub async fn explain(&self, original: &str, substitute: &str, recipe: &str) -> String {
        let prompt = self.prompts.render(
            PromptId::Explanation,
            &[("original", original), ("substitute", substitute), ("recipe", recipe)],
        );
        let request = LlmRequest::new(
            &self.settings.explanation.model,
            prompt,
            self.settings.explanation.temperature,
        )
        .with_timeout(self.settings.request_timeout_ms);

        match self.transport.complete(&request).await {
            Ok(response) if !response.text.trim().is_empty() => response.text.trim().to_string(),
            Ok(_) => {
                warn!(original, substitute, "Explanation was empty");
                EXPLANATION_UNAVAILABLE.to_string()
            }
            Err(e) => {
                warn!(original, substitute, error = %e, "Explanation failed");
                EXPLANATION_UNAVAILABLE.to_string()
            }
        }
    }
}
