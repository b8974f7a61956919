//! Provider clients shared by the ingestion and query paths.
//!
//! - [`service_profiles::LlmServiceProfiles`] holds the generation and embedding clients.
//! - [`retry::RetryPolicy`] wraps any outbound call with bounded retries.
//! - [`telemetry`] installs the tracing subscriber used by the binary.

pub mod config;
pub mod error_handler;
pub mod retry;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::{ConfigError, LlmError, Provider, ProviderError, ProviderErrorKind};
pub use retry::{Retried, RetryPolicy, Retryable};
pub use service_profiles::LlmServiceProfiles;
