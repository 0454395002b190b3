//! Step rewriting after an ingredient swap.

use pantry_core::types::{DEFAULT_LOCALE, StepRewrite, StepRewriteRequest};
use pantry_llm::parse::{self, Recovered};
use pantry_llm::types::StepRewritePayload;
use pantry_llm::{LlmError, LlmRequest, PromptId};
use tracing::{debug, warn};

use crate::resolver::SubstitutionService;

impl SubstitutionService {
    /// Rewrite a recipe step so it uses the substitute.
    ///
    /// One attempt, no retry. Any failure, or a response without a
    /// description, returns the step unchanged with an empty title.
    pub async fn rewrite_step(&self, request: &StepRewriteRequest) -> StepRewrite {
        if request.step.trim().is_empty() {
            return StepRewrite::unchanged(request.step.clone());
        }

        let locale = match request.locale.trim() {
            "" => DEFAULT_LOCALE,
            locale => locale,
        };
        let prompt = self.prompts.render(
            PromptId::StepRewrite,
            &[
                ("step", request.step.as_str()),
                ("original", request.original.as_str()),
                ("substitute", request.substitute.as_str()),
                ("locale", locale),
            ],
        );
        let llm_request = LlmRequest::new(&self.settings.rewrite.model, prompt, self.settings.rewrite.temperature)
            .with_timeout(self.settings.request_timeout_ms);

        match self.request_rewrite(&llm_request).await {
            Ok(Recovered { value, stage }) => {
                let description = value.description.trim();
                if description.is_empty() {
                    warn!(original = %request.original, "Step rewrite had no description, keeping original step");
                    return StepRewrite::unchanged(request.step.clone());
                }
                debug!(?stage, substitute = %request.substitute, locale, "Step rewritten");
                StepRewrite {
                    title: value.title.trim().to_string(),
                    description: description.to_string(),
                }
            }
            Err(e) => {
                warn!(original = %request.original, error = %e, "Step rewrite failed, keeping original step");
                StepRewrite::unchanged(request.step.clone())
            }
        }
    }

    async fn request_rewrite(&self, request: &LlmRequest) -> Result<Recovered<StepRewritePayload>, LlmError> {
        let response = self.transport.complete(request).await?;
        parse::recover(&response.text)
    }
}
