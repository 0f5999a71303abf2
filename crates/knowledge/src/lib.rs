//! Grounded question answering over a tenant-scoped passage store.
//!
//! Hybrid retrieval (lexical, vector, fuzzy) fused with reciprocal-rank
//! fusion, evidence compaction, and answers whose every sentence is traced
//! back to the passages it came from.

pub mod capability;
pub mod compact;
pub mod embeddings;
pub mod fusion;
pub mod language;
pub mod noise;
pub mod rag;
pub mod retriever;
pub mod signals;
pub mod store;
pub mod text;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use rag::{AnswerService, AskRequest, RagResponse};
pub use retriever::{HybridRetriever, RetrievalOutcome};
pub use store::{NewPassage, PassageStore, SqliteStore};
pub use types::{DocumentScope, FusedHit, ImportStats, Query};

use grounded_core::{AppConfig, AppError, AppResult, GenerationMode, InputErrorCode};
use grounded_llm::{create_client, LlmClient};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Passages embedded per provider call during import.
const IMPORT_BATCH_SIZE: usize = 16;

/// Open the passage store named by the configuration.
pub fn open_store(config: &AppConfig) -> AppResult<SqliteStore> {
    let path = config.database_path();
    tracing::debug!("Opening passage store at {:?}", path);
    SqliteStore::open(&path)
}

/// Create the generation client, or `None` in offline mode.
pub fn create_generator(config: &AppConfig) -> AppResult<Option<Arc<dyn LlmClient>>> {
    if config.generation.mode == GenerationMode::Offline {
        return Ok(None);
    }
    create_client(
        &config.generation.provider,
        config.generation.endpoint.as_deref(),
    )
    .map(Some)
    .map_err(|e| AppError::Config(format!("Failed to create generation client: {}", e)))
}

/// Wire store, embeddings, retriever and generator into an answering service.
pub fn build_answer_service(
    config: &AppConfig,
    store: Arc<dyn PassageStore>,
) -> AppResult<AnswerService> {
    let embedder = create_provider(&config.embedding)?;
    let retriever = Arc::new(HybridRetriever::new(
        store,
        embedder,
        config.retrieval.clone(),
    ));
    let generator = create_generator(config)?;

    tracing::info!(
        mode = ?config.generation.mode,
        embedding = %config.embedding.provider,
        "Answer service ready"
    );
    Ok(AnswerService::new(retriever, generator, config))
}

/// Embed and store passages for one tenant.
///
/// Passages with blank text are skipped. An embedding failure aborts the
/// import; passages stored before it stay stored.
pub async fn import_passages(
    store: &SqliteStore,
    embedder: &dyn EmbeddingProvider,
    tenant_id: &str,
    passages: Vec<NewPassage>,
) -> AppResult<ImportStats> {
    let tenant_id = tenant_id.trim();
    if tenant_id.is_empty() {
        return Err(AppError::input(
            InputErrorCode::EmptyTenant,
            "tenant id is required",
        ));
    }

    let start = Instant::now();
    tracing::info!(
        "Importing {} passages for tenant '{}'",
        passages.len(),
        tenant_id
    );

    let (passages, blank): (Vec<NewPassage>, Vec<NewPassage>) = passages
        .into_iter()
        .partition(|p| !p.text.trim().is_empty());
    if !blank.is_empty() {
        tracing::warn!("Skipping {} passages without text", blank.len());
    }

    let mut stats = ImportStats {
        skipped: blank.len() as u32,
        ..Default::default()
    };
    let mut documents: BTreeSet<String> = BTreeSet::new();

    for batch in passages.chunks(IMPORT_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != batch.len() {
            return Err(AppError::Embedding(format!(
                "Provider returned {} embeddings for {} passages",
                embeddings.len(),
                batch.len()
            )));
        }

        for (passage, embedding) in batch.iter().zip(&embeddings) {
            store.insert_passage(tenant_id, passage, Some(embedding))?;
            documents.insert(passage.document_id.clone());
            stats.passages += 1;
            stats.bytes += passage.text.len() as u64;
        }
        tracing::debug!(stored = stats.passages, "Imported batch");
    }

    stats.documents = documents.len() as u32;
    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Import completed: {} passages from {} documents in {:.2}s",
        stats.passages,
        stats.documents,
        stats.duration_secs
    );
    Ok(stats)
}
