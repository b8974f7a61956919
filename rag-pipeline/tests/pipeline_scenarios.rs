//! End-to-end pipeline behavior with fake providers and the in-memory store.

mod common;

use std::sync::Arc;

use common::{DIM, FakeEmbedder, FakeGenerator, flaky_pipeline, harness, test_config};
use rag_pipeline::prompt::NO_CONTEXT_NOTICE;
use rag_pipeline::{
    CancellationFlag, Document, NoopProgress, PipelineConfig, PipelineError, QueryOptions,
    QueryState, RagPipeline, Stage, split,
};
use rag_store::{InMemoryVectorStore, VectorStore};

const ANIMALS: &str = "The cat sat on the warm mat all day. \
The dog ran across the green park twice. \
The bird flew over the old stone bridge.\n\n\
Fish swim in the cold river near the mill. \
Horses graze in the wide field at dawn.";

#[tokio::test]
async fn three_sentences_become_three_reconstructable_chunks() {
    let text = "The cat sat. The dog ran. The bird flew.";
    let chunks = split(text, 20, 5).unwrap();
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.char_len() <= 20));

    let mut rebuilt = chunks[0].text.clone();
    for pair in chunks.windows(2) {
        let shared = pair[0].end_offset - pair[1].start_offset;
        rebuilt.extend(pair[1].text.chars().skip(shared));
    }
    assert_eq!(rebuilt, text);

    let h = harness(
        PipelineConfig {
            chunk_size: 20,
            chunk_overlap: 5,
            ..test_config()
        },
        FakeEmbedder::new(),
    );
    let report = h.pipeline.ingest(&Document::new("animals", text)).await.unwrap();
    assert_eq!(report.chunks_total, 3);
    assert!(report.is_complete());
    assert_eq!(h.store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn empty_document_ingests_without_embedding() {
    let h = harness(test_config(), FakeEmbedder::new());
    let report = h.pipeline.ingest(&Document::new("blank", "  \n ")).await.unwrap();
    assert_eq!(report.chunks_total, 0);
    assert!(report.is_complete());
    assert_eq!(h.embedder.calls(), 0);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_store_still_answers_but_says_so() {
    let h = harness(test_config(), FakeEmbedder::new());
    let resp = h.pipeline.query("What did the cat do?").await.unwrap();

    assert!(resp.context.is_empty());
    assert!(!resp.answer.grounded);
    assert!(resp.answer.text.starts_with(NO_CONTEXT_NOTICE));
    assert!(resp.answer.source_chunk_ids.is_empty());
    assert_eq!(resp.trace.last(), Some(&QueryState::Completed));
    assert_eq!(h.generator.requests().len(), 1);
}

#[tokio::test]
async fn wrong_dimension_stores_nothing() {
    let h = harness(test_config(), FakeEmbedder::with_wrong_dim(DIM + 1));
    let err = h.pipeline.ingest(&Document::new("animals", ANIMALS)).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::ProviderContractViolation {
            stage: Stage::Embedding,
            ..
        }
    ));
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn grounded_answer_cites_retrieved_chunks() {
    let h = harness(test_config(), FakeEmbedder::new());
    let report = h.pipeline.ingest(&Document::new("animals", ANIMALS)).await.unwrap();
    assert!(report.chunks_total > 3);

    let resp = h.pipeline.query("Where did the cat sat on the mat?").await.unwrap();
    assert!(resp.answer.grounded);
    assert_eq!(resp.answer.text, "Generated answer.");
    assert!(!resp.answer.source_chunk_ids.is_empty());
    assert!(resp.answer.source_chunk_ids.iter().all(|id| id.starts_with("animals#")));
    assert_eq!(resp.answer.source_chunk_ids, resp.context.chunk_ids());
    assert!(resp.answer.source_chunk_ids.contains(&"animals#0".to_string()));

    let prompt = &h.generator.requests()[0].prompt;
    assert!(prompt.contains("[1] "));
    assert!(prompt.contains("The cat sat on the warm mat"));
    assert_eq!(
        resp.trace,
        vec![
            QueryState::Received,
            QueryState::Embedding,
            QueryState::Retrieving,
            QueryState::Assembling,
            QueryState::Generating,
            QueryState::Completed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_name_the_failed_batch() {
    let h = harness(test_config(), FakeEmbedder::poisoned("POISON"));
    let err = h.pipeline.ingest(&Document::new("bad", "POISON pill.")).await.unwrap_err();

    match err {
        PipelineError::ProviderUnavailable {
            stage,
            operation,
            attempts,
            ..
        } => {
            assert_eq!(stage, Stage::Embedding);
            assert_eq!(operation, "embed batch 0 (items 0..1)");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.embedder.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn partial_ingestion_reports_missing_positions() {
    let text = "Alpha beta gamma delta. Epsilon zeta eta theta. \
Iota kappa lambda mu. POISON nu xi omicron. Pi rho sigma tau upsilon.";
    let h = harness(test_config(), FakeEmbedder::poisoned("POISON"));
    let err = h.pipeline.ingest(&Document::new("greek", text)).await.unwrap_err();

    let PipelineError::PartialIngestion(report) = err else {
        panic!("expected partial ingestion, got {err}");
    };
    assert!(!report.stored_positions.is_empty());
    assert!(!report.failed.is_empty());
    assert!(report.failed.iter().all(|f| f.stage == Stage::Embedding));
    assert!(report.failed.iter().all(|f| f.reason.contains("embed batch")));
    assert_eq!(h.store.count().await.unwrap() as usize, report.chunks_stored());

    for f in &report.failed {
        for p in f.first_position..=f.last_position {
            assert!(!report.stored_positions.contains(&p));
            assert!(h.store.get(&format!("greek#{p}")).await.is_none());
        }
    }
}

#[tokio::test]
async fn reingest_replaces_previous_chunks() {
    let h = harness(test_config(), FakeEmbedder::new());
    let long = h.pipeline.ingest(&Document::new("animals", ANIMALS)).await.unwrap();
    let short = h
        .pipeline
        .ingest(&Document::new("animals", "The cat sat."))
        .await
        .unwrap();

    assert!(long.chunks_total > short.chunks_total);
    assert_eq!(h.store.count().await.unwrap() as usize, short.chunks_total);
    let stale = format!("animals#{}", long.chunks_total - 1);
    assert!(h.store.get(&stale).await.is_none());
}

#[tokio::test]
async fn failed_reingest_keeps_the_earlier_version() {
    let (pipeline, store) = flaky_pipeline(test_config());
    let v1 = pipeline.ingest(&Document::new("animals", ANIMALS)).await.unwrap();
    let first = store.inner.get("animals#0").await.unwrap();

    store.refuse_upserts_containing("");
    let err = pipeline
        .ingest(&Document::new("animals", "The cat sat."))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::StoreUnavailable { stage: Stage::Storing, .. }));
    assert_eq!(store.count().await.unwrap() as usize, v1.chunks_total);
    assert_eq!(store.inner.get("animals#0").await.unwrap().text, first.text);
}

#[tokio::test]
async fn partially_stored_reingest_reports_and_drops_old_chunks() {
    let (pipeline, store) = flaky_pipeline(test_config());
    pipeline.ingest(&Document::new("animals", ANIMALS)).await.unwrap();

    store.refuse_upserts_containing("Fish");
    let v2 = ANIMALS.replace("cat", "lynx");
    let err = pipeline.ingest(&Document::new("animals", &v2)).await.unwrap_err();

    let PipelineError::PartialIngestion(report) = err else {
        panic!("expected partial ingestion, got {err}");
    };
    assert!(report.failed.iter().all(|f| f.stage == Stage::Storing));
    assert!(!report.failed.is_empty());
    assert_eq!(store.count().await.unwrap() as usize, report.chunks_stored());
    assert!(store.inner.get("animals#0").await.unwrap().text.contains("lynx"));
    for f in &report.failed {
        for p in f.first_position..=f.last_position {
            assert!(store.inner.get(&format!("animals#{p}")).await.is_none());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn failed_query_keeps_its_state_trace() {
    let h = harness(test_config(), FakeEmbedder::poisoned("POISON"));
    let outcome = h
        .pipeline
        .query_traced("POISON question?", &QueryOptions::default(), &CancellationFlag::new())
        .await;

    assert!(matches!(outcome.result, Err(PipelineError::ProviderUnavailable { .. })));
    assert_eq!(outcome.trace.len(), 3);
    assert_eq!(outcome.trace[..2], [QueryState::Received, QueryState::Embedding]);
    assert!(matches!(
        &outcome.trace[2],
        QueryState::Failed { stage: Stage::Embedding, reason } if reason.contains("embed")
    ));

    let rejected = h
        .pipeline
        .query_traced("   ", &QueryOptions::default(), &CancellationFlag::new())
        .await;
    assert!(matches!(rejected.result, Err(PipelineError::InvalidArgument(_))));
    assert!(rejected.trace.is_empty());
}

#[tokio::test]
async fn cancelled_query_enters_no_stage() {
    let h = harness(test_config(), FakeEmbedder::new());
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let err = h
        .pipeline
        .query_with("What did the cat do?", &QueryOptions::default(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled { stage: Stage::Embedding }));
    assert_eq!(h.embedder.calls(), 0);
    assert!(h.generator.requests().is_empty());

    let outcome = h
        .pipeline
        .query_traced("What did the cat do?", &QueryOptions::default(), &cancel)
        .await;
    assert_eq!(outcome.trace.len(), 2);
    assert!(matches!(outcome.trace[1], QueryState::Failed { stage: Stage::Embedding, .. }));
}

#[tokio::test]
async fn context_stays_within_budget() {
    let h = harness(
        PipelineConfig {
            max_context_chars: 60,
            ..test_config()
        },
        FakeEmbedder::new(),
    );
    h.pipeline.ingest(&Document::new("animals", ANIMALS)).await.unwrap();

    let resp = h
        .pipeline
        .query_with(
            "cat dog bird fish horses",
            &QueryOptions {
                top_k: Some(10),
                ..QueryOptions::default()
            },
            &CancellationFlag::new(),
        )
        .await
        .unwrap();
    assert!(resp.context.total_length <= 60);
    assert_eq!(resp.context.total_length, resp.context.text.chars().count());
    assert!(!resp.context.is_empty());
}

#[tokio::test]
async fn threshold_above_every_score_leaves_answer_ungrounded() {
    let h = harness(test_config(), FakeEmbedder::new());
    h.pipeline.ingest(&Document::new("animals", ANIMALS)).await.unwrap();

    let resp = h
        .pipeline
        .query_with(
            "cat",
            &QueryOptions {
                score_threshold: Some(1.5),
                ..QueryOptions::default()
            },
            &CancellationFlag::new(),
        )
        .await
        .unwrap();
    assert!(!resp.answer.grounded);
}

#[tokio::test]
async fn delete_document_cascades_to_its_chunks_only() {
    let h = harness(test_config(), FakeEmbedder::new());
    let docs = vec![
        Document::new("animals", ANIMALS),
        Document::new("short", "The cat sat."),
    ];
    let results = h.pipeline.ingest_many(&docs, &NoopProgress).await;
    let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, ["animals", "short"]);
    assert!(results.iter().all(|(_, r)| r.is_ok()));

    h.pipeline.delete_document("animals").await.unwrap();
    h.pipeline.delete_document("never-ingested").await.unwrap();
    assert_eq!(h.pipeline.stored_chunks().await.unwrap(), 1);

    h.pipeline.delete_all().await.unwrap();
    assert_eq!(h.pipeline.stored_chunks().await.unwrap(), 0);
}

#[test]
fn mismatched_store_dimension_is_a_configuration_error() {
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(DIM * 2));
    let err = RagPipeline::new(
        test_config(),
        Arc::new(FakeEmbedder::new()),
        Arc::new(FakeGenerator::new("x")),
        store,
    )
    .err()
    .expect("dimension mismatch must be rejected");
    assert!(matches!(err, PipelineError::Configuration(_)));
}
