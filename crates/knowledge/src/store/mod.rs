//! Storage engine contract.
//!
//! The engine owns the indices; this crate only queries them. Every query is
//! tenant-scoped and may carry a document allow-list.

pub mod sqlite;

pub use sqlite::{NewPassage, SqliteStore};

use crate::types::Passage;
use grounded_core::RetrievalError;
use serde::Serialize;

/// Mandatory tenant predicate plus optional document allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreScope {
    pub tenant_id: String,
    /// `None` = every document of the tenant; `Some(empty)` = nothing.
    pub documents: Option<Vec<String>>,
}

impl StoreScope {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            documents: None,
        }
    }

    pub fn with_documents(mut self, documents: Vec<String>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// True when document scoping was requested with an empty allow-list.
    pub fn selects_nothing(&self) -> bool {
        matches!(&self.documents, Some(ids) if ids.is_empty())
    }
}

/// One row returned by a signal query, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub passage: Passage,
    /// Native metric of the signal (relevance, distance or similarity)
    pub score: f64,
}

/// Queries an external storage engine must answer.
///
/// Results are ordered best-first; callers derive ranks from positions.
/// "No rows" is `Ok(vec![])`, never an error.
#[async_trait::async_trait]
pub trait PassageStore: Send + Sync {
    /// Lexical relevance search (higher score = more relevant).
    async fn lexical_search(
        &self,
        query: &str,
        scope: &StoreScope,
        limit: usize,
    ) -> Result<Vec<StoreHit>, RetrievalError>;

    /// Vector similarity search (score is a distance, lower = closer).
    async fn vector_search(
        &self,
        embedding: &[f32],
        scope: &StoreScope,
        limit: usize,
    ) -> Result<Vec<StoreHit>, RetrievalError>;

    /// Fuzzy string similarity search with a similarity floor.
    async fn fuzzy_search(
        &self,
        query: &str,
        scope: &StoreScope,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<StoreHit>, RetrievalError>;

    /// Whether the fuzzy index exists on this engine.
    async fn probe_fuzzy_support(&self) -> Result<bool, RetrievalError>;
}
