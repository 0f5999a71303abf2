//! Signal clients: one bounded query per signal, returned as a ranked list.

use crate::embeddings::EmbeddingProvider;
use crate::store::{PassageStore, StoreHit, StoreScope};
use crate::types::Signal;
use grounded_core::RetrievalError;
use serde::Serialize;

/// A signal's results, best first. Rank is position + 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedList {
    pub signal: Signal,
    pub hits: Vec<StoreHit>,
}

impl RankedList {
    pub fn new(signal: Signal, hits: Vec<StoreHit>) -> Self {
        Self { signal, hits }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Hits paired with their 1-based ranks.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &StoreHit)> {
        self.hits.iter().enumerate().map(|(i, hit)| (i + 1, hit))
    }
}

/// Result of one signal for one request.
#[derive(Debug, Clone)]
pub enum SignalOutcome {
    /// Not run for this query (policy or capability)
    Skipped,
    Completed(RankedList),
    Failed(RetrievalError),
}

impl SignalOutcome {
    pub fn status(&self) -> SignalStatus {
        match self {
            SignalOutcome::Skipped => SignalStatus::Skipped,
            SignalOutcome::Completed(_) => SignalStatus::Ok,
            SignalOutcome::Failed(_) => SignalStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Ok,
    Skipped,
    Failed,
}

fn outcome(signal: Signal, result: Result<Vec<StoreHit>, RetrievalError>) -> SignalOutcome {
    match result {
        Ok(hits) => {
            tracing::debug!(%signal, count = hits.len(), "Signal completed");
            SignalOutcome::Completed(RankedList::new(signal, hits))
        }
        Err(e) => {
            tracing::warn!(%signal, "Signal failed: {}", e);
            SignalOutcome::Failed(e)
        }
    }
}

pub async fn run_lexical(
    store: &dyn PassageStore,
    query: &str,
    scope: &StoreScope,
    limit: usize,
) -> SignalOutcome {
    outcome(
        Signal::Lexical,
        store.lexical_search(query, scope, limit).await,
    )
}

/// Embed the query, then search. An embedding failure fails this signal only.
pub async fn run_vector(
    store: &dyn PassageStore,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    scope: &StoreScope,
    limit: usize,
) -> SignalOutcome {
    let embedding = match embedder.embed(query).await {
        Ok(embedding) => embedding,
        Err(e) => {
            return outcome(
                Signal::Vector,
                Err(RetrievalError::Embedding(e.to_string())),
            )
        }
    };

    outcome(
        Signal::Vector,
        store.vector_search(&embedding, scope, limit).await,
    )
}

pub async fn run_fuzzy(
    store: &dyn PassageStore,
    query: &str,
    scope: &StoreScope,
    threshold: f32,
    limit: usize,
) -> SignalOutcome {
    outcome(
        Signal::Fuzzy,
        store.fuzzy_search(query, scope, threshold, limit).await,
    )
}
