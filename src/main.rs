mod progress;
mod upload;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use llm_service::LlmServiceProfiles;
use llm_service::config::default_config::config_from_env;
use rag_pipeline::{CancellationFlag, PipelineConfig, PipelineError, QueryOptions, RagPipeline};
use rag_store::{QdrantStore, RagFilter, StoreConfig};
use tracing::{Level, info, warn};

use crate::progress::IndicatifProgress;

/// Upload documents and ask questions about them.
#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    /// Raise workspace log level to debug (ignored when RUST_LOG is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest Markdown, plain-text or PDF files, replacing earlier uploads of the same name.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Answer a question from the ingested documents.
    Ask {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        temperature: Option<f32>,
        /// Only search chunks of this document.
        #[arg(long)]
        document: Option<String>,
        /// Print the full response (answer, context, state trace) as JSON.
        /// On failure the state trace goes to stderr.
        #[arg(long)]
        json: bool,
    },
    /// Delete one document and all its chunks.
    Delete { document_id: String },
    /// Delete every document.
    Purge,
    /// Show how many chunks are stored.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be populated.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    llm_service::telemetry::init("warn", level)?;

    let pipeline = build_pipeline().await?;

    match cli.command {
        Command::Ingest { files } => ingest(&pipeline, &files).await,
        Command::Ask {
            question,
            top_k,
            threshold,
            temperature,
            document,
            json,
        } => {
            let opts = QueryOptions {
                top_k,
                score_threshold: threshold,
                temperature,
                filter: document.map(RagFilter::document),
            };
            let outcome = pipeline
                .query_traced(&question, &opts, &CancellationFlag::new())
                .await;
            if json && outcome.result.is_err() {
                eprintln!("{}", serde_json::to_string_pretty(&outcome.trace)?);
            }
            let resp = outcome.into_response()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else {
                println!("{}", resp.answer.text);
                if !resp.answer.source_chunk_ids.is_empty() {
                    println!("\nSources:");
                    for (i, hit) in resp.context.results.iter().enumerate() {
                        println!("  [{}] {} (score {:.3})", i + 1, hit.chunk_id, hit.similarity_score);
                    }
                }
            }
            Ok(())
        }
        Command::Delete { document_id } => {
            pipeline.delete_document(&document_id).await?;
            println!("deleted {document_id}");
            Ok(())
        }
        Command::Purge => {
            pipeline.delete_all().await?;
            println!("all documents deleted");
            Ok(())
        }
        Command::Stats => {
            println!("{} chunks stored", pipeline.stored_chunks().await?);
            Ok(())
        }
    }
}

async fn build_pipeline() -> Result<RagPipeline> {
    let config = PipelineConfig::from_env()?;
    info!(?config, "pipeline configuration loaded");

    let (generation, embedding) = config_from_env()?;
    let profiles = Arc::new(LlmServiceProfiles::new(generation, embedding)?);

    let store_cfg = StoreConfig::from_env(config.retry.clone())?;
    let store = Arc::new(QdrantStore::new(store_cfg)?);

    let pipeline = RagPipeline::new(config, profiles.clone(), profiles, store)?;
    pipeline
        .ensure_ready()
        .await
        .context("vector store is not reachable")?;
    Ok(pipeline)
}

async fn ingest(pipeline: &RagPipeline, files: &[PathBuf]) -> Result<()> {
    let mut docs = Vec::with_capacity(files.len());
    for path in files {
        docs.push(upload::read_document(path).await?);
    }

    let progress = IndicatifProgress::bar(docs.len() as u64);
    let results = pipeline.ingest_many(&docs, &progress).await;

    let mut failed = 0usize;
    for (id, result) in results {
        match result {
            Ok(report) => println!("{}", serde_json::to_string(&report)?),
            Err(PipelineError::PartialIngestion(report)) => {
                failed += 1;
                warn!(document_id = %id, "stored only part of the document");
                println!("{}", serde_json::to_string(&report)?);
            }
            Err(e) => {
                failed += 1;
                eprintln!("{id}: {e}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} document(s) were not fully ingested", docs.len());
    }
    Ok(())
}
