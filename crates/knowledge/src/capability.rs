//! Lazily detected storage capabilities.

use crate::store::PassageStore;
use serde::Serialize;
use std::sync::RwLock;

/// Tri-state capability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityState {
    Unknown,
    Available,
    Unavailable,
}

/// Whether the storage engine serves fuzzy-similarity queries.
///
/// Owned by the long-lived retriever and shared by every request. The state
/// starts `Unknown`; the first successful probe fixes it for the lifetime of
/// the owner. A failed probe leaves it `Unknown` so the next request probes
/// again, and that request runs without the fuzzy signal.
#[derive(Debug)]
pub struct FuzzyCapability {
    state: RwLock<CapabilityState>,
}

impl FuzzyCapability {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CapabilityState::Unknown),
        }
    }

    pub fn state(&self) -> CapabilityState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(CapabilityState::Unknown)
    }

    /// Return the cached answer, probing the store while it is unknown.
    pub async fn resolve(&self, store: &dyn PassageStore) -> bool {
        match self.state() {
            CapabilityState::Available => return true,
            CapabilityState::Unavailable => return false,
            CapabilityState::Unknown => {}
        }

        match store.probe_fuzzy_support().await {
            Ok(supported) => {
                let next = if supported {
                    CapabilityState::Available
                } else {
                    CapabilityState::Unavailable
                };
                if let Ok(mut state) = self.state.write() {
                    *state = next;
                }
                tracing::debug!(?next, "Detected fuzzy search capability");
                supported
            }
            Err(e) => {
                tracing::warn!("Fuzzy capability probe failed, will retry: {}", e);
                false
            }
        }
    }
}

impl Default for FuzzyCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StoreHit, StoreScope};
    use grounded_core::RetrievalError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` probes, then reports `supported`.
    struct ProbeStore {
        failures: usize,
        supported: bool,
        probes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PassageStore for ProbeStore {
        async fn lexical_search(
            &self,
            _query: &str,
            _scope: &StoreScope,
            _limit: usize,
        ) -> Result<Vec<StoreHit>, RetrievalError> {
            Ok(Vec::new())
        }

        async fn vector_search(
            &self,
            _embedding: &[f32],
            _scope: &StoreScope,
            _limit: usize,
        ) -> Result<Vec<StoreHit>, RetrievalError> {
            Ok(Vec::new())
        }

        async fn fuzzy_search(
            &self,
            _query: &str,
            _scope: &StoreScope,
            _threshold: f32,
            _limit: usize,
        ) -> Result<Vec<StoreHit>, RetrievalError> {
            Ok(Vec::new())
        }

        async fn probe_fuzzy_support(&self) -> Result<bool, RetrievalError> {
            let n = self.probes.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(RetrievalError::Unavailable {
                    signal: "fuzzy".into(),
                    message: "offline".into(),
                })
            } else {
                Ok(self.supported)
            }
        }
    }

    #[tokio::test]
    async fn test_probe_result_is_cached() {
        let store = ProbeStore {
            failures: 0,
            supported: true,
            probes: AtomicUsize::new(0),
        };
        let capability = FuzzyCapability::new();
        assert_eq!(capability.state(), CapabilityState::Unknown);

        assert!(capability.resolve(&store).await);
        assert!(capability.resolve(&store).await);
        assert_eq!(capability.state(), CapabilityState::Available);
        assert_eq!(store.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_failure_stays_unknown_and_retries() {
        let store = ProbeStore {
            failures: 1,
            supported: false,
            probes: AtomicUsize::new(0),
        };
        let capability = FuzzyCapability::new();

        assert!(!capability.resolve(&store).await);
        assert_eq!(capability.state(), CapabilityState::Unknown);

        assert!(!capability.resolve(&store).await);
        assert_eq!(capability.state(), CapabilityState::Unavailable);
        assert_eq!(store.probes.load(Ordering::SeqCst), 2);
    }
}
