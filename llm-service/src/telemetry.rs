use std::io::{self, IsTerminal};

use tracing::Level;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

/// Targets of the workspace crates whose events get the detailed format.
pub const TARGET_PREFIXES: [&str; 4] = ["llm_service", "rag_store", "rag_pipeline", "docqa"];

/// RFC3339 UTC timer implemented via `chrono`.
/// Example output: `2025-09-12T10:20:30Z`
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        let s = now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

fn is_workspace_target(target: &str) -> bool {
    TARGET_PREFIXES.iter().any(|p| target.starts_with(p))
}

/// Formatting layer that renders only events emitted by the workspace crates.
///
/// - RFC3339 UTC timestamps
/// - compact single-line format with `file:line`
/// - span close events (durations of instrumented calls)
/// - ANSI colors only when stdout is a terminal
pub fn layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let use_ansi = io::stdout().is_terminal();
    let only_ours = filter::filter_fn(|meta| is_workspace_target(meta.target()));

    fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_level(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(use_ansi)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(fmt::format().compact().with_source_location(true))
        .with_filter(only_ours)
}

/// Plain layer for everything else (dependencies such as `reqwest` or `qdrant_client`).
fn foreign_layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_target(true)
        .with_ansi(io::stdout().is_terminal())
        .with_filter(filter::filter_fn(|meta| !is_workspace_target(meta.target())))
}

/// Level directives for every workspace crate, e.g. `rag_pipeline=debug`.
pub fn level_directives(level: Level) -> Result<Vec<Directive>, ParseError> {
    TARGET_PREFIXES
        .iter()
        .map(|p| format!("{p}={}", level.as_str().to_lowercase()).parse::<Directive>())
        .collect()
}

/// `RUST_LOG` if set, otherwise `default`; workspace crates are raised to `level`
/// only when `RUST_LOG` is absent.
pub fn env_filter_with_level(default: &str, level: Level) -> Result<EnvFilter, ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(f) => Ok(f),
        Err(_) => {
            let mut f = EnvFilter::try_new(default)?;
            for d in level_directives(level)? {
                f = f.add_directive(d);
            }
            Ok(f)
        }
    }
}

/// Installs the global subscriber: env filter + workspace layer + foreign layer.
pub fn init(default: &str, level: Level) -> Result<(), TelemetryError> {
    let filter = env_filter_with_level(default, level)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(layer())
        .with(foreign_layer())
        .try_init()?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("[LLM Service] invalid log filter: {0}")]
    Filter(#[from] ParseError),
    #[error("[LLM Service] tracing subscriber already installed: {0}")]
    Init(#[from] TryInitError),
}
