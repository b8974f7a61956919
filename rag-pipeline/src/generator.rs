//! Answer generation over an assembled context.

use std::sync::Arc;

use futures::future::BoxFuture;
use llm_service::{LlmError, RetryPolicy};
use tracing::{debug, info};

use crate::document::{Answer, QueryContext};
use crate::error::{PipelineError, Stage};
use crate::prompt::{DEFAULT_SYSTEM, NO_CONTEXT_NOTICE, build_user_prompt};

/// One chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
}

/// Anything that answers a [`CompletionRequest`] with text.
pub trait GenerationProvider: Send + Sync {
    fn complete<'a>(&'a self, req: &'a CompletionRequest) -> BoxFuture<'a, Result<String, LlmError>>;
}

pub struct AnswerGenerator {
    provider: Arc<dyn GenerationProvider>,
    retry: RetryPolicy,
    system: String,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn GenerationProvider>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            retry,
            system: DEFAULT_SYSTEM.trim().to_string(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Asks the provider and returns the answer with the chunk ids it was given.
    ///
    /// Without context the model still answers, but the text opens with an
    /// explicit notice and the answer is marked ungrounded.
    pub async fn generate(
        &self,
        question: &str,
        ctx: &QueryContext,
        temperature: f32,
    ) -> Result<Answer, PipelineError> {
        let req = CompletionRequest {
            system: self.system.clone(),
            prompt: build_user_prompt(question, ctx),
            temperature,
        };
        debug!(prompt_chars = req.prompt.chars().count(), temperature, "requesting completion");

        let completion = self
            .retry
            .run("chat completion", || self.provider.complete(&req))
            .await
            .map_err(|r| PipelineError::from_provider(Stage::Generating, "chat completion", r))?;

        let completion = completion.trim();
        if completion.is_empty() {
            return Err(PipelineError::contract(
                Stage::Generating,
                "chat completion",
                "provider returned an empty completion",
            ));
        }

        let grounded = !ctx.is_empty();
        let text = if grounded {
            completion.to_string()
        } else {
            format!("{NO_CONTEXT_NOTICE}\n\n{completion}")
        };
        info!(grounded, sources = ctx.results.len(), "answer generated");

        Ok(Answer {
            text,
            source_chunk_ids: ctx.chunk_ids(),
            grounded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Echo {
        reply: String,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl GenerationProvider for Echo {
        fn complete<'a>(&'a self, req: &'a CompletionRequest) -> BoxFuture<'a, Result<String, LlmError>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(req.clone());
                Ok(self.reply.clone())
            })
        }
    }

    fn echo(reply: &str) -> Arc<Echo> {
        Arc::new(Echo {
            reply: reply.into(),
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn empty_context_answer_is_flagged() {
        let p = echo("I do not know.");
        let g = AnswerGenerator::new(p.clone(), RetryPolicy::no_retry());
        let a = g.generate("Why?", &QueryContext::default(), 0.3).await.unwrap();
        assert!(!a.grounded);
        assert!(a.text.starts_with(NO_CONTEXT_NOTICE));
        assert!(a.source_chunk_ids.is_empty());
        assert_eq!(p.seen.lock().unwrap()[0].temperature, 0.3);
    }

    #[tokio::test]
    async fn blank_completion_is_a_contract_violation() {
        let g = AnswerGenerator::new(echo("   "), RetryPolicy::no_retry());
        let err = g.generate("Why?", &QueryContext::default(), 0.2).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ProviderContractViolation {
                stage: Stage::Generating,
                ..
            }
        ));
    }
}
