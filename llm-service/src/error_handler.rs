//! Unified error handling for `llm-service`.
//!
//! This module exposes a single top-level error type [`LlmError`] for the whole
//! library, and groups domain-specific errors in nested enums ([`ConfigError`],
//! [`ProviderError`]). Small helpers for reading/validating environment variables
//! are provided and return the unified [`Result<T>`] alias.
//!
//! Every error can be classified with [`LlmError::is_transient`]; the retry
//! policy uses that classification to decide whether another attempt is allowed.
//!
//! All messages include the prefix `[LLM Service]` to simplify attribution in logs.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::retry::Retryable;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, LlmError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `llm-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration/validation errors (startup/readiness).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Provider-level failures: bad status, undecodable payload, etc.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Underlying HTTP transport error (e.g., `reqwest::Error`).
    #[error("[LLM Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Operation exceeded the configured timeout.
    #[error("[LLM Service] operation timed out after {0:?}")]
    Timeout(Duration),
}

impl LlmError {
    /// Returns `true` when the failure may go away on its own (rate limit,
    /// timeout, 5xx, dropped connection) and a retry is worthwhile.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Config(_) => false,
            LlmError::Provider(p) => p.kind.is_transient(),
            LlmError::HttpTransport(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(is_transient_status)
            }
            LlmError::Timeout(_) => true,
        }
    }

    /// Returns `true` when the provider answered but the payload broke the
    /// expected contract (undecodable body, missing choices, wrong count).
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, LlmError::Provider(p) if p.kind.is_contract_violation())
    }
}

impl Retryable for LlmError {
    fn is_transient(&self) -> bool {
        LlmError::is_transient(self)
    }

    fn timed_out(after: Duration) -> Self {
        LlmError::Timeout(after)
    }
}

/// Status codes worth retrying: 408, 429 and every 5xx.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for environment/config-driven setup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (like ports, limits, timeouts).
    #[error("[LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `LLM_MAX_TOKENS`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u32`).
        reason: &'static str,
    },

    /// Unsupported provider in `LLM_KIND`.
    #[error("[LLM Service] unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `OLLAMA_URL`).
        var: &'static str,
        /// Explanation (e.g., `must start with http:// or https://`).
        reason: &'static str,
    },

    /// A numeric field was outside of the allowed range.
    #[error("[LLM Service] {field} is out of range: {detail}")]
    OutOfRange {
        /// Field name (e.g., `temperature`).
        field: &'static str,
        /// Description of the expected range.
        detail: &'static str,
    },

    /// Model name was empty.
    #[error("[LLM Service] model name must not be empty")]
    EmptyModel,
}

/* ------------------------------------------------------------------------- */
/* Provider errors                                                           */
/* ------------------------------------------------------------------------- */

/// Which upstream produced a [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAI,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Ollama => f.write_str("ollama"),
            Provider::OpenAI => f.write_str("openai"),
        }
    }
}

/// Non-success HTTP response captured for diagnostics.
#[derive(Debug, Clone)]
pub struct HttpError {
    /// Numeric HTTP status code.
    pub status: StatusCode,
    /// Request URL.
    pub url: String,
    /// Short snippet of the response body (trimmed).
    pub snippet: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} from {}: {}", self.status, self.url, self.snippet)
    }
}

/// What went wrong while talking to a provider.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum ProviderErrorKind {
    /// The config selects a different provider than the client.
    InvalidProvider,
    /// Provider requires an API key but none was configured.
    MissingApiKey,
    /// The endpoint is empty or does not start with http/https.
    InvalidEndpoint(String),
    /// Upstream returned a non-successful HTTP status.
    HttpStatus(HttpError),
    /// Response payload could not be decoded as expected.
    Decode(String),
    /// Chat completion returned no usable choice.
    EmptyChoices,
    /// Embeddings response carried a different number of vectors than inputs.
    CountMismatch { expected: usize, got: usize },
}

impl ProviderErrorKind {
    fn is_transient(&self) -> bool {
        match self {
            ProviderErrorKind::HttpStatus(h) => is_transient_status(h.status),
            _ => false,
        }
    }

    fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::Decode(_)
                | ProviderErrorKind::EmptyChoices
                | ProviderErrorKind::CountMismatch { .. }
        )
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::InvalidProvider => f.write_str("invalid provider for this client"),
            ProviderErrorKind::MissingApiKey => f.write_str("missing API key"),
            ProviderErrorKind::InvalidEndpoint(e) => write!(f, "invalid endpoint: {e}"),
            ProviderErrorKind::HttpStatus(h) => write!(f, "{h}"),
            ProviderErrorKind::Decode(d) => write!(f, "decode error: {d}"),
            ProviderErrorKind::EmptyChoices => f.write_str("completion returned no choices"),
            ProviderErrorKind::CountMismatch { expected, got } => {
                write!(f, "expected {expected} embeddings, got {got}")
            }
        }
    }
}

/// Provider failure tagged with its origin.
#[derive(Debug, Error)]
#[error("[LLM Service] {provider}: {kind}")]
pub struct ProviderError {
    pub provider: Provider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: Provider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }
}

/// Trims a response body down to something safe to put into logs and errors.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 240;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let mut s: String = trimmed.chars().take(MAX).collect();
        s.push('…');
        s
    }
}

/* ------------------------------------------------------------------------- */
/* Env helpers (return unified `Result<T>`)                                  */
/* ------------------------------------------------------------------------- */

/// Fetches a required, non-empty environment variable.
///
/// # Errors
/// Returns [`LlmError::Config`] with [`ConfigError::MissingVar`] if the
/// variable is absent or empty.
pub fn must_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name).into()),
    }
}

/// Reads an optional, non-empty environment variable.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`ConfigError::InvalidNumber`] if the variable is set but not a valid `u32`.
pub fn env_opt_u32(name: &'static str) -> Result<Option<u32>> {
    env_opt_parsed::<u32>(name, "expected u32")
}

/// Parses an optional `u64` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u64(name: &'static str) -> Result<Option<u64>> {
    env_opt_parsed::<u64>(name, "expected u64")
}

/// Parses an optional `f32` from env (`Ok(None)` if unset/empty).
pub fn env_opt_f32(name: &'static str) -> Result<Option<f32>> {
    env_opt_parsed::<f32>(name, "expected a floating point number")
}

fn env_opt_parsed<T: std::str::FromStr>(
    name: &'static str,
    reason: &'static str,
) -> Result<Option<T>> {
    match env_opt(name) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var: name, reason }.into()),
        None => Ok(None),
    }
}

/* ------------------------------------------------------------------------- */
/* Validation helpers (return unified `Result<T>`)                           */
/* ------------------------------------------------------------------------- */

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// Returns [`ConfigError::InvalidFormat`] when the string does not start with
/// a valid HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

/// Validates that a floating-point value lies within an inclusive range.
///
/// # Errors
/// Returns [`ConfigError::OutOfRange`] if `value` is outside `[min, max]` or not finite.
pub fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            detail: "expected value in inclusive range",
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_err(code: u16) -> LlmError {
        ProviderError::new(
            Provider::OpenAI,
            ProviderErrorKind::HttpStatus(HttpError {
                status: StatusCode::from_u16(code).unwrap(),
                url: "http://x".into(),
                snippet: String::new(),
            }),
        )
        .into()
    }

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        assert!(status_err(429).is_transient());
        assert!(status_err(503).is_transient());
        assert!(status_err(408).is_transient());
        assert!(!status_err(401).is_transient());
        assert!(!status_err(400).is_transient());
    }

    #[test]
    fn decode_failures_are_contract_violations() {
        let e: LlmError =
            ProviderError::new(Provider::Ollama, ProviderErrorKind::Decode("bad".into())).into();
        assert!(e.is_contract_violation());
        assert!(!e.is_transient());
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn snippet_is_bounded() {
        let long = "x".repeat(1000);
        assert_eq!(make_snippet(&long).chars().count(), 241);
        assert_eq!(make_snippet("  short "), "short");
    }

    #[test]
    fn range_validation() {
        assert!(validate_range_f32("temperature", 0.2, 0.0, 2.0).is_ok());
        assert!(validate_range_f32("temperature", f32::NAN, 0.0, 2.0).is_err());
        assert!(validate_range_f32("temperature", 2.5, 0.0, 2.0).is_err());
        assert!(validate_http_endpoint("URL", "ftp://x").is_err());
    }
}
