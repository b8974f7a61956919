use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{ConfigError, Result, validate_http_endpoint, validate_range_f32};

/// Configuration for one model profile (generation or embedding).
///
/// # Fields
///
/// - `provider`: which backend serves the model.
/// - `model`: model identifier (e.g. `"gpt-4o-mini"`, `"nomic-embed-text"`).
/// - `endpoint`: base URL of the provider (no path).
/// - `api_key`: credential for providers that require one.
/// - `max_tokens`: completion token cap, if supported.
/// - `temperature`: default sampling temperature; callers may override per request.
/// - `top_p`: nucleus sampling cutoff.
/// - `timeout_secs`: HTTP client timeout in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Checks the fields that would otherwise fail at the first request.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        validate_http_endpoint("endpoint", self.endpoint.trim())?;
        if self.provider == LlmProvider::OpenAI && self.api_key.is_none() {
            return Err(ConfigError::MissingVar("OPENAI_API_KEY").into());
        }
        if let Some(t) = self.temperature {
            validate_range_f32("temperature", t, 0.0, 2.0)?;
        }
        if let Some(p) = self.top_p {
            validate_range_f32("top_p", p, 0.0, 1.0)?;
        }
        Ok(())
    }
}
