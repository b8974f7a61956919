//! Binds the HTTP provider clients to the pipeline's capability traits.

use futures::future::BoxFuture;
use llm_service::{LlmError, LlmServiceProfiles};

use crate::embedding::EmbeddingProvider;
use crate::generator::{CompletionRequest, GenerationProvider};

impl EmbeddingProvider for LlmServiceProfiles {
    fn embed_batch<'a>(&'a self, inputs: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>, LlmError>> {
        Box::pin(LlmServiceProfiles::embed_batch(self, inputs))
    }
}

impl GenerationProvider for LlmServiceProfiles {
    fn complete<'a>(&'a self, req: &'a CompletionRequest) -> BoxFuture<'a, Result<String, LlmError>> {
        let system = (!req.system.is_empty()).then_some(req.system.as_str());
        Box::pin(self.generate(&req.prompt, system, Some(req.temperature)))
    }
}
