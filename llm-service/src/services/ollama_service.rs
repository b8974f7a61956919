//! Lightweight Ollama service for chat completion and embeddings.
//!
//! Thin client for the local Ollama API:
//! - `POST {endpoint}/api/chat`: non-streaming chat (`stream=false`)
//! - `POST {endpoint}/api/embed`: batched embeddings (`input: [..]`)
//!
//! Uses the shared [`LlmModelConfig`] and insists that the provider is
//! [`LlmProvider::Ollama`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{
    HttpError, LlmError, Provider, ProviderError, ProviderErrorKind, make_snippet,
};

pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embed: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not `Ollama`
    /// - `InvalidEndpoint` if `cfg.endpoint` is invalid
    /// - [`LlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, LlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(
                ProviderError::new(Provider::Ollama, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_chat = format!("{}/api/chat", base);
        let url_embed = format!("{}/api/embed", base);

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_embed,
        })
    }

    pub fn config(&self) -> &LlmModelConfig {
        &self.cfg
    }

    /// Non-streaming chat request.
    ///
    /// Mapped options: `temperature` (argument, else config), `top_p`,
    /// `num_predict` ← `max_tokens`.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        let body = ChatRequest::from_cfg(&self.cfg, prompt, system, temperature);

        debug!("POST {}", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;

        if !resp.status().is_success() {
            return Err(status_error(resp, &self.url_chat).await);
        }

        let out: ChatResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::Decode(format!("serde error: {e}; ensure `stream=false` is used")),
            )
        })?;

        let content = out.message.content;
        if content.trim().is_empty() {
            return Err(ProviderError::new(Provider::Ollama, ProviderErrorKind::EmptyChoices).into());
        }
        Ok(content)
    }

    /// Embeds a batch of inputs via `/api/embed`.
    #[instrument(skip_all, fields(model = %self.cfg.model, batch = inputs.len()))]
    pub async fn embeddings(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbedRequest {
            model: &self.cfg.model,
            input: inputs,
        };

        debug!("POST {}", self.url_embed);
        let resp = self.client.post(&self.url_embed).json(&body).send().await?;

        if !resp.status().is_success() {
            return Err(status_error(resp, &self.url_embed).await);
        }

        let out: EmbedResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::Decode(format!(
                    "serde error: {e}; expected `{{ embeddings: number[][] }}`"
                )),
            )
        })?;

        if out.embeddings.len() != inputs.len() {
            return Err(ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::CountMismatch {
                    expected: inputs.len(),
                    got: out.embeddings.len(),
                },
            )
            .into());
        }
        Ok(out.embeddings)
    }
}

async fn status_error(resp: reqwest::Response, url: &str) -> LlmError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let snippet = make_snippet(&text);
    error!(%status, %url, %snippet, "Ollama returned non-success status");
    ProviderError::new(
        Provider::Ollama,
        ProviderErrorKind::HttpStatus(HttpError {
            status,
            url: url.to_string(),
            snippet,
        }),
    )
    .into()
}

/* ==========================
HTTP payloads & options
========================== */

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

impl<'a> ChatRequest<'a> {
    fn from_cfg(
        cfg: &'a LlmModelConfig,
        prompt: &'a str,
        system: Option<&'a str>,
        temperature: Option<f32>,
    ) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(ChatMessage {
                role: "system",
                content: sys,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        Self {
            model: &cfg.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: temperature.or(cfg.temperature),
                top_p: cfg.top_p,
                num_predict: cfg.max_tokens,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Subset of Ollama `options`.
#[derive(Debug, Default, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}
