//! Shared LLM service with two active profiles: `generation` and `embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Builds the HTTP clients up front; identical profiles share one client.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use llm_service::config::default_config::config_from_env;
//! use llm_service::service_profiles::LlmServiceProfiles;
//!
//! # async fn run() -> Result<(), llm_service::LlmError> {
//! let (generation, embedding) = config_from_env()?;
//! let svc = Arc::new(LlmServiceProfiles::new(generation, embedding)?);
//!
//! let vectors = svc.embed_batch(&["Ferris".to_string()]).await?;
//! let answer = svc.generate("Who is Ferris?", None, Some(0.2)).await?;
//! # let _ = (vectors, answer);
//! # Ok(()) }
//! ```

use std::sync::Arc;

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::LlmError,
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
};

/// A ready client for one profile.
#[derive(Clone)]
enum ProviderClient {
    Ollama(Arc<OllamaService>),
    OpenAI(Arc<OpenAiService>),
}

impl ProviderClient {
    fn build(cfg: &LlmModelConfig) -> Result<Self, LlmError> {
        Ok(match cfg.provider {
            LlmProvider::Ollama => ProviderClient::Ollama(Arc::new(OllamaService::new(cfg.clone())?)),
            LlmProvider::OpenAI => ProviderClient::OpenAI(Arc::new(OpenAiService::new(cfg.clone())?)),
        })
    }
}

/// Generation + embedding profiles behind one handle.
pub struct LlmServiceProfiles {
    generation: LlmModelConfig,
    embedding: LlmModelConfig,
    generation_client: ProviderClient,
    embedding_client: ProviderClient,
}

impl LlmServiceProfiles {
    /// Validates both profiles and builds their HTTP clients.
    pub fn new(generation: LlmModelConfig, embedding: LlmModelConfig) -> Result<Self, LlmError> {
        generation.validate()?;
        embedding.validate()?;

        let generation_client = ProviderClient::build(&generation)?;
        let embedding_client = if generation == embedding {
            generation_client.clone()
        } else {
            ProviderClient::build(&embedding)?
        };

        Ok(Self {
            generation,
            embedding,
            generation_client,
            embedding_client,
        })
    }

    /// Single chat completion with the generation profile.
    ///
    /// # Arguments
    /// - `prompt`: user message.
    /// - `system`: optional system instruction.
    /// - `temperature`: per-request override of the profile default.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        match &self.generation_client {
            ProviderClient::Ollama(cli) => cli.generate(prompt, system, temperature).await,
            ProviderClient::OpenAI(cli) => cli.generate(prompt, system, temperature).await,
        }
    }

    /// Embeds one batch with the embedding profile; output order matches input order.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        match &self.embedding_client {
            ProviderClient::Ollama(cli) => cli.embeddings(inputs).await,
            ProviderClient::OpenAI(cli) => cli.embeddings(inputs).await,
        }
    }

    /// Returns references to the current profiles `(generation, embedding)`.
    pub fn profiles(&self) -> (&LlmModelConfig, &LlmModelConfig) {
        (&self.generation, &self.embedding)
    }
}
