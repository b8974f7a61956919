//! Default model configs loaded from environment variables.
//!
//! Two roles are resolved for the configured provider:
//!
//! - **Generation** → chat model answering questions from retrieved context
//! - **Embedding**  → model turning chunks and questions into vectors
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND` = `openai` (default) or `ollama`
//! - `LLM_MAX_TOKENS` = optional completion cap (u32)
//! - `LLM_TIMEOUT_SECS` = HTTP client timeout (default 60)
//! - `LLM_TEMPERATURE` = default generation temperature (default 0.2)
//!
//! OpenAI:
//! - `OPENAI_API_KEY` (mandatory)
//! - `OPENAI_URL`   (default `https://api.openai.com`)
//! - `OPENAI_MODEL` (default `gpt-4o-mini`)
//! - `EMBEDDING_MODEL` (default `text-embedding-ada-002`)
//!
//! Ollama:
//! - `OLLAMA_URL` or `OLLAMA_PORT` (default `http://localhost:11434`)
//! - `OLLAMA_MODEL`    (mandatory)
//! - `EMBEDDING_MODEL` (mandatory)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{ConfigError, Result, env_opt, env_opt_f32, env_opt_u32, env_opt_u64, must_env},
};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Provider selected by `LLM_KIND`; defaults to OpenAI.
pub fn provider_from_env() -> Result<LlmProvider> {
    match env_opt("LLM_KIND") {
        Some(kind) => Ok(kind.parse::<LlmProvider>()?),
        None => Ok(LlmProvider::OpenAI),
    }
}

/// Resolves `(generation, embedding)` configs for the provider in `LLM_KIND`.
pub fn config_from_env() -> Result<(LlmModelConfig, LlmModelConfig)> {
    let (generation, embedding) = match provider_from_env()? {
        LlmProvider::OpenAI => (config_openai_generation()?, config_openai_embedding()?),
        LlmProvider::Ollama => (config_ollama_generation()?, config_ollama_embedding()?),
    };
    generation.validate()?;
    embedding.validate()?;
    Ok((generation, embedding))
}

fn generation_temperature() -> Result<f32> {
    Ok(env_opt_f32("LLM_TEMPERATURE")?.unwrap_or(0.2))
}

fn timeout_secs() -> Result<Option<u64>> {
    Ok(Some(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(60)))
}

/* --------------------------------- OpenAI -------------------------------- */

fn openai_endpoint() -> String {
    env_opt("OPENAI_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string())
}

/// Chat model used to answer questions.
///
/// # Defaults
/// - `temperature = LLM_TEMPERATURE` or `0.2`
pub fn config_openai_generation() -> Result<LlmModelConfig> {
    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model: env_opt("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        endpoint: openai_endpoint(),
        api_key: Some(must_env("OPENAI_API_KEY")?),
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(generation_temperature()?),
        top_p: None,
        timeout_secs: timeout_secs()?,
    })
}

/// Embedding model; `text-embedding-ada-002` yields 1536-dimensional vectors.
pub fn config_openai_embedding() -> Result<LlmModelConfig> {
    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model: env_opt("EMBEDDING_MODEL")
            .unwrap_or_else(|| DEFAULT_OPENAI_EMBEDDING_MODEL.to_string()),
        endpoint: openai_endpoint(),
        api_key: Some(must_env("OPENAI_API_KEY")?),
        max_tokens: None,
        temperature: None,
        top_p: None,
        timeout_secs: timeout_secs()?,
    })
}

/* --------------------------------- Ollama -------------------------------- */

/// Resolves the Ollama endpoint.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
/// 3. `http://localhost:11434`
fn ollama_endpoint() -> Result<String> {
    if let Some(url) = env_opt("OLLAMA_URL") {
        return Ok(url);
    }
    if let Some(port) = env_opt("OLLAMA_PORT") {
        port.trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: "OLLAMA_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
        return Ok(format!("http://localhost:{}", port.trim()));
    }
    Ok(DEFAULT_OLLAMA_URL.to_string())
}

/// Chat model served by Ollama (`OLLAMA_MODEL`, required).
pub fn config_ollama_generation() -> Result<LlmModelConfig> {
    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model: must_env("OLLAMA_MODEL")?,
        endpoint: ollama_endpoint()?,
        api_key: None,
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(generation_temperature()?),
        top_p: None,
        timeout_secs: Some(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(600)),
    })
}

/// Embedding model served by Ollama (`EMBEDDING_MODEL`, required).
pub fn config_ollama_embedding() -> Result<LlmModelConfig> {
    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model: must_env("EMBEDDING_MODEL")?,
        endpoint: ollama_endpoint()?,
        api_key: None,
        max_tokens: None,
        temperature: None,
        top_p: None,
        timeout_secs: timeout_secs()?,
    })
}
