//! Hybrid retrieval over the scenario corpus.

use super::fixtures::{
    corpus, offline_config, retriever, BrokenEmbedder, FlakyStore, SlowLexicalStore, OTHER_TENANT,
    TENANT,
};
use crate::capability::CapabilityState;
use crate::retriever::{HybridRetriever, RetrievalOutcome};
use crate::signals::SignalStatus;
use crate::types::{Query, Signal};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn status(outcome: &RetrievalOutcome, signal: Signal) -> SignalStatus {
    outcome
        .diagnostics
        .signals
        .iter()
        .find(|r| r.signal == signal)
        .map(|r| r.status)
        .unwrap()
}

#[tokio::test]
async fn test_capital_question_ranks_paris_first() {
    let corpus = corpus().await;
    let retriever = retriever(corpus.store.clone(), &offline_config());

    let outcome = retriever
        .retrieve(
            &Query::new("What is the capital of France?", TENANT),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.hits[0].passage_id(), "p-paris");
    assert!(outcome.hits.len() <= 8);
    assert_eq!(status(&outcome, Signal::Lexical), SignalStatus::Ok);
    assert_eq!(status(&outcome, Signal::Vector), SignalStatus::Ok);
    assert!(outcome.hits[0].candidate.signals.lexical.is_some());
    assert!(outcome.hits[0].candidate.signals.vector.is_some());
}

#[tokio::test]
async fn test_fused_scores_are_descending() {
    let corpus = corpus().await;
    let retriever = retriever(corpus.store.clone(), &offline_config());

    let outcome = retriever
        .retrieve(
            &Query::new("bridge construction years", TENANT),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.hits[0].passage_id(), "p-bridge");
    for pair in outcome.hits.windows(2) {
        assert!(pair[0].fused_score >= pair[1].fused_score);
    }
}

#[tokio::test]
async fn test_disjoint_document_scope_returns_nothing() {
    let corpus = corpus().await;
    let retriever = retriever(corpus.store.clone(), &offline_config());

    let outcome = retriever
        .retrieve(
            &Query::new("capital of France", TENANT).with_documents(["doc-missing"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(outcome.hits.is_empty());
}

#[tokio::test]
async fn test_document_scope_restricts_hits() {
    let corpus = corpus().await;
    let retriever = retriever(corpus.store.clone(), &offline_config());

    let outcome = retriever
        .retrieve(
            &Query::new("capital of France", TENANT).with_documents(["doc-fin", "doc-eng"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!outcome.hits.is_empty());
    assert!(outcome
        .hits
        .iter()
        .all(|h| h.passage().document_id == "doc-fin" || h.passage().document_id == "doc-eng"));
}

#[tokio::test]
async fn test_tenants_never_see_each_other() {
    let corpus = corpus().await;
    let retriever = retriever(corpus.store.clone(), &offline_config());
    let cancel = CancellationToken::new();

    let acme = retriever
        .retrieve(&Query::new("Paris office budget", TENANT), &cancel)
        .await
        .unwrap();
    assert!(acme.hits.iter().all(|h| h.passage_id() != "p-secret"));

    let globex = retriever
        .retrieve(&Query::new("Paris office budget", OTHER_TENANT), &cancel)
        .await
        .unwrap();
    let ids: Vec<&str> = globex.hits.iter().map(|h| h.passage_id()).collect();
    assert_eq!(ids, vec!["p-secret"]);
}

#[tokio::test]
async fn test_japanese_question_skips_lexical() {
    let corpus = corpus().await;
    let retriever = retriever(corpus.store.clone(), &offline_config());

    let outcome = retriever
        .retrieve(&Query::new("東京都の人口は？", TENANT), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(status(&outcome, Signal::Lexical), SignalStatus::Skipped);
    assert!(outcome.diagnostics.script.is_cjk());
    assert_eq!(outcome.hits[0].passage_id(), "p-tokyo");
    if let Some(threshold) = outcome.diagnostics.fuzzy_threshold {
        assert!(threshold <= offline_config().retrieval.cjk_fuzzy_cap);
    }
}

#[tokio::test]
async fn test_failed_signal_degrades_only_itself() {
    let corpus = corpus().await;
    let store = Arc::new(FlakyStore::new(corpus.store.clone(), &["lexical"]));
    let retriever = retriever(store, &offline_config());

    let outcome = retriever
        .retrieve(
            &Query::new("What is the capital of France?", TENANT),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(status(&outcome, Signal::Lexical), SignalStatus::Failed);
    assert_eq!(status(&outcome, Signal::Vector), SignalStatus::Ok);
    assert_eq!(outcome.hits[0].passage_id(), "p-paris");
    assert!(outcome
        .hits
        .iter()
        .all(|h| h.candidate.signals.lexical.is_none()));
}

#[tokio::test]
async fn test_embedding_failure_degrades_vector_signal() {
    let corpus = corpus().await;
    let retriever = HybridRetriever::new(
        corpus.store.clone(),
        Arc::new(BrokenEmbedder),
        offline_config().retrieval,
    );

    let outcome = retriever
        .retrieve(
            &Query::new("What is the capital of France?", TENANT),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(status(&outcome, Signal::Vector), SignalStatus::Failed);
    assert_eq!(outcome.hits[0].passage_id(), "p-paris");
}

#[tokio::test]
async fn test_all_signals_failing_is_an_error() {
    let corpus = corpus().await;
    let store = Arc::new(FlakyStore::new(
        corpus.store.clone(),
        &["lexical", "vector", "fuzzy"],
    ));
    let retriever = retriever(store, &offline_config());

    let err = retriever
        .retrieve(
            &Query::new("What is the capital of France?", TENANT),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "RETRIEVAL_FAILURE");
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let corpus = corpus().await;
    let retriever = retriever(corpus.store.clone(), &offline_config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = retriever
        .retrieve(&Query::new("capital of France", TENANT), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CANCELLED");
}

#[tokio::test]
async fn test_cancelled_while_signals_run() {
    let corpus = corpus().await;
    let store = Arc::new(SlowLexicalStore::new(
        corpus.store.clone(),
        Duration::from_secs(5),
    ));
    let retriever = retriever(store.clone(), &offline_config());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = retriever
        .retrieve(&Query::new("capital of France", TENANT), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CANCELLED");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!store.lexical_finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_fuzzy_capability_is_cached_after_first_request() {
    let corpus = corpus().await;
    let retriever = retriever(corpus.store.clone(), &offline_config());
    assert_eq!(
        retriever.fuzzy_capability(),
        CapabilityState::Unknown
    );

    // Only CJK queries consult the fuzzy signal
    retriever
        .retrieve(&Query::new("東京都の人口", TENANT), &CancellationToken::new())
        .await
        .unwrap();

    assert_ne!(
        retriever.fuzzy_capability(),
        CapabilityState::Unknown
    );
}
