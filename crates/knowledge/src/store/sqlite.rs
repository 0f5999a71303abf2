//! SQLite-backed storage engine.
//!
//! Passages live in one table; FTS5 virtual tables provide lexical (unicode61)
//! and fuzzy (trigram) prefilters. Vector search is an exact cosine scan.

use crate::store::{PassageStore, StoreHit, StoreScope};
use crate::text::{char_trigrams, tokenize, trigram_similarity};
use crate::types::{Passage, Signal};
use grounded_core::{AppError, AppResult, RetrievalError};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS passages (
        passage_id TEXT NOT NULL,
        tenant_id TEXT NOT NULL,
        document_id TEXT NOT NULL,
        filename TEXT NOT NULL,
        page INTEGER,
        line_start INTEGER,
        text TEXT NOT NULL,
        embedding BLOB,
        PRIMARY KEY (tenant_id, passage_id)
    );

    CREATE INDEX IF NOT EXISTS idx_passages_scope ON passages(tenant_id, document_id);

    CREATE VIRTUAL TABLE IF NOT EXISTS passages_fts USING fts5(
        text,
        passage_id UNINDEXED,
        tenant_id UNINDEXED,
        tokenize = 'unicode61'
    );
"#;

const TRIGRAM_SCHEMA: &str = r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS passages_trgm USING fts5(
        text,
        passage_id UNINDEXED,
        tenant_id UNINDEXED,
        tokenize = 'trigram'
    );
"#;

const PASSAGE_COLUMNS: &str =
    "p.passage_id, p.document_id, p.filename, p.page, p.line_start, p.text";

/// A passage to import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPassage {
    /// Generated when absent
    #[serde(default)]
    pub passage_id: Option<String>,
    pub document_id: String,
    pub filename: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub line_start: Option<u32>,
    pub text: String,
}

/// SQLite storage engine.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Storage(format!("Failed to create store directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Storage(format!("Failed to open SQLite store: {}", e)))?;

        tracing::debug!("Opened SQLite store at {:?}", db_path);
        Self::init(conn)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Storage(format!("Failed to open SQLite store: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Storage(format!("Failed to create tables: {}", e)))?;

        // Older SQLite builds lack the trigram tokenizer; fuzzy search is then
        // reported as unsupported by the capability probe.
        if let Err(e) = conn.execute_batch(TRIGRAM_SCHEMA) {
            tracing::warn!("Trigram index unavailable, fuzzy search disabled: {}", e);
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Storage("SQLite connection lock poisoned".to_string()))
    }

    /// Insert or replace a passage and its index rows. Returns the passage id.
    ///
    /// Passage ids are unique per tenant; the same id under another tenant is
    /// a separate passage.
    pub fn insert_passage(
        &self,
        tenant_id: &str,
        passage: &NewPassage,
        embedding: Option<&[f32]>,
    ) -> AppResult<String> {
        let passage_id = passage
            .passage_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let embedding_bytes = embedding.map(embedding_to_bytes);

        let mut conn = self.lock()?;
        let trigram = fuzzy_index_present(&conn)
            .map_err(|e| AppError::Storage(format!("Failed to inspect schema: {}", e)))?;

        let tx = conn
            .transaction()
            .map_err(|e| AppError::Storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "INSERT OR REPLACE INTO passages
             (passage_id, tenant_id, document_id, filename, page, line_start, text, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                passage_id,
                tenant_id,
                passage.document_id,
                passage.filename,
                passage.page,
                passage.line_start,
                passage.text,
                embedding_bytes,
            ],
        )
        .map_err(|e| AppError::Storage(format!("Failed to insert passage: {}", e)))?;

        tx.execute(
            "DELETE FROM passages_fts WHERE passage_id = ?1 AND tenant_id = ?2",
            params![passage_id, tenant_id],
        )
        .and_then(|_| {
            tx.execute(
                "INSERT INTO passages_fts (text, passage_id, tenant_id) VALUES (?1, ?2, ?3)",
                params![passage.text, passage_id, tenant_id],
            )
        })
        .map_err(|e| AppError::Storage(format!("Failed to index passage text: {}", e)))?;

        if trigram {
            tx.execute(
                "DELETE FROM passages_trgm WHERE passage_id = ?1 AND tenant_id = ?2",
                params![passage_id, tenant_id],
            )
            .and_then(|_| {
                tx.execute(
                    "INSERT INTO passages_trgm (text, passage_id, tenant_id) VALUES (?1, ?2, ?3)",
                    params![passage.text, passage_id, tenant_id],
                )
            })
            .map_err(|e| AppError::Storage(format!("Failed to index passage trigrams: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Storage(format!("Failed to commit passage: {}", e)))?;

        Ok(passage_id)
    }

    /// Number of passages, optionally for one tenant.
    pub fn passage_count(&self, tenant_id: Option<&str>) -> AppResult<u64> {
        let conn = self.lock()?;
        let count: i64 = match tenant_id {
            Some(tenant) => conn.query_row(
                "SELECT COUNT(*) FROM passages WHERE tenant_id = ?1",
                params![tenant],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0)),
        }
        .map_err(|e| AppError::Storage(format!("Failed to count passages: {}", e)))?;

        Ok(count as u64)
    }

    /// Number of distinct tenants.
    pub fn tenant_count(&self) -> AppResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT tenant_id) FROM passages",
                [],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Storage(format!("Failed to count tenants: {}", e)))?;

        Ok(count as u64)
    }

    async fn run_blocking<T, F>(&self, signal: Signal, f: F) -> Result<T, RetrievalError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RetrievalError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| unavailable(signal, "connection lock poisoned"))?;
            f(&*guard)
        })
        .await
        .map_err(|e| unavailable(signal, &format!("storage task failed: {}", e)))?
    }
}

#[async_trait::async_trait]
impl PassageStore for SqliteStore {
    async fn lexical_search(
        &self,
        query: &str,
        scope: &StoreScope,
        limit: usize,
    ) -> Result<Vec<StoreHit>, RetrievalError> {
        if scope.selects_nothing() || limit == 0 {
            return Ok(Vec::new());
        }
        let Some(match_query) = fts_match_query(tokenize(query)) else {
            return Ok(Vec::new());
        };
        let scope = scope.clone();

        self.run_blocking(Signal::Lexical, move |conn| {
            let (clause, mut scope_params) = scope_clause(&scope, 2);
            let sql = format!(
                "SELECT {PASSAGE_COLUMNS}, bm25(passages_fts) AS relevance
                 FROM passages_fts JOIN passages p
                   ON p.passage_id = passages_fts.passage_id
                  AND p.tenant_id = passages_fts.tenant_id
                 WHERE passages_fts MATCH ?1{clause}
                 ORDER BY relevance ASC, p.passage_id ASC
                 LIMIT {limit}"
            );
            let mut sql_params = vec![match_query];
            sql_params.append(&mut scope_params);

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| query_error(Signal::Lexical, e))?;
            let rows = stmt
                .query_map(params_from_iter(sql_params.iter()), |row| {
                    let bm25: f64 = row.get(6)?;
                    Ok(StoreHit {
                        passage: passage_from_row(row)?,
                        // bm25 is negative; report positive relevance
                        score: -bm25,
                    })
                })
                .map_err(|e| query_error(Signal::Lexical, e))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| query_error(Signal::Lexical, e))
        })
        .await
    }

    async fn vector_search(
        &self,
        embedding: &[f32],
        scope: &StoreScope,
        limit: usize,
    ) -> Result<Vec<StoreHit>, RetrievalError> {
        if scope.selects_nothing() || limit == 0 {
            return Ok(Vec::new());
        }
        if embedding.is_empty() || embedding.iter().all(|v| *v == 0.0) {
            return Err(malformed(Signal::Vector, "query embedding is empty or zero"));
        }
        let query = embedding.to_vec();
        let scope = scope.clone();

        self.run_blocking(Signal::Vector, move |conn| {
            let (clause, scope_params) = scope_clause(&scope, 1);
            let sql = format!(
                "SELECT {PASSAGE_COLUMNS}, p.embedding FROM passages p
                 WHERE p.embedding IS NOT NULL{clause}"
            );

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| query_error(Signal::Vector, e))?;
            let rows = stmt
                .query_map(params_from_iter(scope_params.iter()), |row| {
                    let bytes: Vec<u8> = row.get(6)?;
                    Ok((passage_from_row(row)?, bytes))
                })
                .map_err(|e| query_error(Signal::Vector, e))?;

            let mut hits = Vec::new();
            for row in rows {
                let (passage, bytes) = row.map_err(|e| query_error(Signal::Vector, e))?;
                let stored = bytes_to_embedding(&bytes).ok_or_else(|| {
                    malformed(
                        Signal::Vector,
                        &format!("passage {} has a corrupt embedding", passage.passage_id),
                    )
                })?;
                if stored.len() != query.len() {
                    return Err(malformed(
                        Signal::Vector,
                        &format!(
                            "dimension mismatch: stored {}, query {}",
                            stored.len(),
                            query.len()
                        ),
                    ));
                }
                let distance = 1.0 - cosine_similarity(&query, &stored) as f64;
                hits.push(StoreHit {
                    passage,
                    score: distance,
                });
            }

            hits.sort_by(|a, b| {
                a.score
                    .total_cmp(&b.score)
                    .then_with(|| a.passage.passage_id.cmp(&b.passage.passage_id))
            });
            hits.truncate(limit);
            Ok(hits)
        })
        .await
    }

    async fn fuzzy_search(
        &self,
        query: &str,
        scope: &StoreScope,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<StoreHit>, RetrievalError> {
        if scope.selects_nothing() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut grams: Vec<String> = char_trigrams(query)
            .into_iter()
            .filter(|g| !g.chars().any(char::is_whitespace))
            .collect();
        grams.sort();
        if grams.is_empty() {
            return Ok(Vec::new());
        }
        let match_query = grams
            .iter()
            .map(|g| format!("\"{}\"", g.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR ");

        let query = query.to_string();
        let scope = scope.clone();
        let prefilter = limit.saturating_mul(10).max(50);

        self.run_blocking(Signal::Fuzzy, move |conn| {
            if !fuzzy_index_present(conn).map_err(|e| query_error(Signal::Fuzzy, e))? {
                return Err(unavailable(Signal::Fuzzy, "trigram index is missing"));
            }

            let (clause, mut scope_params) = scope_clause(&scope, 2);
            let sql = format!(
                "SELECT {PASSAGE_COLUMNS}
                 FROM passages_trgm JOIN passages p
                   ON p.passage_id = passages_trgm.passage_id
                  AND p.tenant_id = passages_trgm.tenant_id
                 WHERE passages_trgm MATCH ?1{clause}
                 ORDER BY bm25(passages_trgm) ASC, p.passage_id ASC
                 LIMIT {prefilter}"
            );
            let mut sql_params = vec![match_query];
            sql_params.append(&mut scope_params);

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| query_error(Signal::Fuzzy, e))?;
            let rows = stmt
                .query_map(params_from_iter(sql_params.iter()), passage_from_row)
                .map_err(|e| query_error(Signal::Fuzzy, e))?;

            let mut hits = Vec::new();
            for row in rows {
                let passage = row.map_err(|e| query_error(Signal::Fuzzy, e))?;
                let similarity = trigram_similarity(&query, &passage.text);
                if similarity >= threshold as f64 {
                    hits.push(StoreHit {
                        passage,
                        score: similarity,
                    });
                }
            }

            hits.sort_by(|a, b| {
                b.score
                    .total_cmp(&a.score)
                    .then_with(|| a.passage.passage_id.cmp(&b.passage.passage_id))
            });
            hits.truncate(limit);
            Ok(hits)
        })
        .await
    }

    async fn probe_fuzzy_support(&self) -> Result<bool, RetrievalError> {
        self.run_blocking(Signal::Fuzzy, |conn| {
            fuzzy_index_present(conn).map_err(|e| query_error(Signal::Fuzzy, e))
        })
        .await
    }
}

fn fuzzy_index_present(conn: &Connection) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE name = 'passages_trgm'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Build an FTS5 OR-query of quoted tokens, or `None` when nothing is searchable.
fn fts_match_query(tokens: Vec<String>) -> Option<String> {
    let mut seen = std::collections::HashSet::new();
    let terms: Vec<String> = tokens
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Tenant predicate and optional allow-list, numbered from `first_param`.
fn scope_clause(scope: &StoreScope, first_param: usize) -> (String, Vec<String>) {
    let mut clause = format!(" AND p.tenant_id = ?{}", first_param);
    let mut values = vec![scope.tenant_id.clone()];

    if let Some(ids) = &scope.documents {
        let placeholders: Vec<String> = (0..ids.len())
            .map(|i| format!("?{}", first_param + 1 + i))
            .collect();
        clause.push_str(&format!(" AND p.document_id IN ({})", placeholders.join(", ")));
        values.extend(ids.iter().cloned());
    }

    (clause, values)
}

fn passage_from_row(row: &Row<'_>) -> rusqlite::Result<Passage> {
    Ok(Passage {
        passage_id: row.get(0)?,
        document_id: row.get(1)?,
        filename: row.get(2)?,
        page: row.get(3)?,
        line_start: row.get(4)?,
        text: row.get(5)?,
    })
}

fn unavailable(signal: Signal, message: &str) -> RetrievalError {
    RetrievalError::Unavailable {
        signal: signal.to_string(),
        message: message.to_string(),
    }
}

fn malformed(signal: Signal, message: &str) -> RetrievalError {
    RetrievalError::Malformed {
        signal: signal.to_string(),
        message: message.to_string(),
    }
}

fn query_error(signal: Signal, e: rusqlite::Error) -> RetrievalError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => malformed(signal, &e.to_string()),
        other => unavailable(signal, &other.to_string()),
    }
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Calculate cosine similarity between two vectors of equal length.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
