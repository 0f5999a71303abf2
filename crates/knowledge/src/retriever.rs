//! Hybrid retrieval: language policy, concurrent signals, fusion, noise filter.

use crate::capability::{CapabilityState, FuzzyCapability};
use crate::embeddings::EmbeddingProvider;
use crate::fusion::{fuse_with_floor, FusionReport};
use crate::language::{self, ScriptClass};
use crate::noise::{filter_noise, NoiseReport};
use crate::signals::{
    run_fuzzy, run_lexical, run_vector, RankedList, SignalOutcome, SignalStatus,
};
use crate::store::{PassageStore, StoreScope};
use crate::types::{DocumentScope, FusedHit, Query, Signal, MAX_QUERY_LIMIT};
use grounded_core::config::RetrievalConfig;
use grounded_core::{AppError, AppResult, InputErrorCode, RetrievalError};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How one signal fared for one request.
#[derive(Debug, Clone, Serialize)]
pub struct SignalReport {
    pub signal: Signal,
    pub status: SignalStatus,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Operational detail for the gated debug payload.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalDiagnostics {
    pub script: ScriptClass,
    pub signals: Vec<SignalReport>,
    /// Similarity floor handed to the fuzzy signal, when it ran
    pub fuzzy_threshold: Option<f32>,
    pub fuzzy_capability: CapabilityState,
    pub candidate_pool: usize,
    pub fusion: FusionReport,
    pub noise: NoiseReport,
}

#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub hits: Vec<FusedHit>,
    pub diagnostics: RetrievalDiagnostics,
}

/// Long-lived retrieval service.
///
/// Owns the fuzzy capability cache, so one instance should serve every
/// request of a process.
pub struct HybridRetriever {
    store: Arc<dyn PassageStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
    fuzzy: FuzzyCapability,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn PassageStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
            fuzzy: FuzzyCapability::new(),
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn fuzzy_capability(&self) -> CapabilityState {
        self.fuzzy.state()
    }

    /// Reject malformed queries before any signal runs.
    pub fn validate(query: &Query) -> AppResult<()> {
        if query.text.trim().is_empty() {
            return Err(AppError::input(
                InputErrorCode::EmptyQuery,
                "query text is empty",
            ));
        }
        if query.tenant_id.trim().is_empty() {
            return Err(AppError::input(
                InputErrorCode::EmptyTenant,
                "tenant id is required",
            ));
        }
        if query.limit == 0 || query.limit > MAX_QUERY_LIMIT {
            return Err(AppError::input(
                InputErrorCode::InvalidLimit,
                format!("limit must be between 1 and {}", MAX_QUERY_LIMIT),
            ));
        }
        if let DocumentScope::Selected(ids) = &query.scope {
            if ids.iter().all(|id| id.trim().is_empty()) {
                return Err(AppError::input(
                    InputErrorCode::EmptyDocumentScope,
                    "document scope was requested but no document ids were given",
                ));
            }
        }
        Ok(())
    }

    /// Retrieve up to `query.limit` fused hits.
    ///
    /// Signals run concurrently. A failed signal is excluded from fusion as
    /// long as another enabled signal succeeded. Cancellation before fusion
    /// discards every signal's results.
    pub async fn retrieve(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> AppResult<RetrievalOutcome> {
        Self::validate(query)?;
        if cancel.is_cancelled() {
            return Err(RetrievalError::Cancelled.into());
        }

        let cfg = &self.config;
        let policy = language::decide(
            &query.text,
            cfg.lexical_enabled,
            cfg.fuzzy_enabled,
            cfg.fuzzy_threshold,
            cfg.cjk_fuzzy_cap,
        );
        let use_fuzzy = policy.use_fuzzy && self.fuzzy.resolve(self.store.as_ref()).await;

        let scope = StoreScope {
            tenant_id: query.tenant_id.trim().to_string(),
            documents: query.scope.allow_list().map(<[String]>::to_vec),
        };
        let pool = cfg.candidate_pool.max(query.limit);
        let text = query.text.trim();

        debug!(
            script = ?policy.script,
            lexical = policy.use_lexical,
            fuzzy = use_fuzzy,
            fuzzy_threshold = policy.fuzzy_threshold,
            pool,
            "Language policy decided"
        );

        let store = self.store.as_ref();
        let lexical = async {
            if policy.use_lexical {
                run_lexical(store, text, &scope, pool).await
            } else {
                SignalOutcome::Skipped
            }
        };
        let vector = async {
            if policy.use_vector {
                run_vector(store, self.embedder.as_ref(), text, &scope, pool).await
            } else {
                SignalOutcome::Skipped
            }
        };
        let fuzzy = async {
            if use_fuzzy {
                run_fuzzy(store, text, &scope, policy.fuzzy_threshold, pool).await
            } else {
                SignalOutcome::Skipped
            }
        };

        let (lexical, vector, fuzzy) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetrievalError::Cancelled.into()),
            outcomes = async { tokio::join!(lexical, vector, fuzzy) } => outcomes,
        };
        if cancel.is_cancelled() {
            return Err(RetrievalError::Cancelled.into());
        }

        let mut reports = Vec::with_capacity(3);
        let mut lists: Vec<RankedList> = Vec::with_capacity(3);
        let mut failures = Vec::new();
        let mut ran = 0usize;

        for (signal, outcome) in Signal::ALL.into_iter().zip([lexical, vector, fuzzy]) {
            let status = outcome.status();
            match outcome {
                SignalOutcome::Skipped => reports.push(SignalReport {
                    signal,
                    status,
                    count: 0,
                    error: None,
                }),
                SignalOutcome::Completed(list) => {
                    ran += 1;
                    reports.push(SignalReport {
                        signal,
                        status,
                        count: list.hits.len(),
                        error: None,
                    });
                    lists.push(list);
                }
                SignalOutcome::Failed(e) => {
                    ran += 1;
                    failures.push(format!("{}: {}", signal, e));
                    reports.push(SignalReport {
                        signal,
                        status,
                        count: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if ran > 0 && failures.len() == ran {
            return Err(RetrievalError::AllSignalsFailed(failures).into());
        }

        let fused = fuse_with_floor(&lists, cfg.rrf_k, cfg.min_fused_score);
        let fusion = FusionReport {
            strategy: "rrf",
            rrf_k: cfg.rrf_k,
            contributing_signals: fused.contributing_signals,
            min_fused_score: cfg.min_fused_score,
            floor_applied: fused.floor_applied,
            dropped_below_floor: fused.dropped_below_floor,
        };

        let (hits, noise) = if cfg.noise_filter {
            filter_noise(text, fused.hits, query.limit)
        } else {
            let mut hits = fused.hits;
            hits.truncate(query.limit);
            (hits, NoiseReport::default())
        };

        info!(
            hits = hits.len(),
            signals = fusion.contributing_signals,
            degraded = failures.len(),
            "Retrieval complete"
        );

        Ok(RetrievalOutcome {
            hits,
            diagnostics: RetrievalDiagnostics {
                script: policy.script,
                signals: reports,
                fuzzy_threshold: use_fuzzy.then_some(policy.fuzzy_threshold),
                fuzzy_capability: self.fuzzy.state(),
                candidate_pool: pool,
                fusion,
                noise,
            },
        })
    }
}
