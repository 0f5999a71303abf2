//! Reciprocal Rank Fusion: score = Σ 1/(k + rank_i)
//!
//! Combines ranked lists from signals with incomparable score units
//! (relevance, distance, similarity) using only rank positions.

use crate::signals::RankedList;
use crate::types::{Candidate, FusedHit, SignalScore, SignalScores};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default smoothing constant.
pub const DEFAULT_RRF_K: u32 = 60;

/// Fuse ranked lists into one strictly ordered set.
///
/// Each passage's score is summed over signals in the fixed order lexical,
/// vector, fuzzy, so the result does not depend on the order of `lists`.
/// Ties are broken by passage id. A passage appearing twice in one list keeps
/// its first (best) rank.
pub fn fuse(lists: &[RankedList], k: u32) -> Vec<FusedHit> {
    let mut union: BTreeMap<String, Candidate> = BTreeMap::new();

    for list in lists {
        for (rank, hit) in list.ranked() {
            let candidate = union
                .entry(hit.passage.passage_id.clone())
                .or_insert_with(|| Candidate {
                    passage: hit.passage.clone(),
                    signals: SignalScores::default(),
                });
            candidate.signals.record(
                list.signal,
                SignalScore {
                    rank,
                    score: hit.score,
                },
            );
        }
    }

    let mut hits: Vec<FusedHit> = union
        .into_values()
        .filter(|candidate| !candidate.signals.is_empty())
        .map(|candidate| {
            let fused_score = candidate
                .signals
                .present()
                .map(|(_, s)| 1.0 / (k as f64 + s.rank as f64))
                .sum();
            FusedHit {
                candidate,
                fused_score,
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then_with(|| a.passage_id().cmp(b.passage_id()))
    });

    hits
}

/// Fused hits plus how the score floor was handled.
#[derive(Debug, Clone)]
pub struct FusionOutcome {
    pub hits: Vec<FusedHit>,
    /// Signals that returned at least one row
    pub contributing_signals: usize,
    pub floor_applied: bool,
    pub dropped_below_floor: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FusionReport {
    pub strategy: &'static str,
    pub rrf_k: u32,
    pub contributing_signals: usize,
    pub min_fused_score: Option<f64>,
    pub floor_applied: bool,
    pub dropped_below_floor: usize,
}

/// Fuse, then apply `min_fused_score` only when two or more signals
/// produced results. A single-signal set is never thinned by a floor tuned
/// for multi-signal agreement.
pub fn fuse_with_floor(lists: &[RankedList], k: u32, min_fused_score: Option<f64>) -> FusionOutcome {
    let contributing_signals = lists.iter().filter(|l| !l.is_empty()).count();
    let hits = fuse(lists, k);

    match min_fused_score {
        Some(floor) if contributing_signals >= 2 => {
            let before = hits.len();
            let hits: Vec<FusedHit> = hits
                .into_iter()
                .filter(|hit| hit.fused_score >= floor)
                .collect();
            FusionOutcome {
                dropped_below_floor: before - hits.len(),
                hits,
                contributing_signals,
                floor_applied: true,
            }
        }
        _ => FusionOutcome {
            hits,
            contributing_signals,
            floor_applied: false,
            dropped_below_floor: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreHit;
    use crate::types::{Passage, Signal};

    fn hit(id: &str, score: f64) -> StoreHit {
        StoreHit {
            passage: Passage {
                passage_id: id.to_string(),
                document_id: "d".to_string(),
                filename: "f.txt".to_string(),
                page: None,
                line_start: None,
                text: format!("text of {}", id),
            },
            score,
        }
    }

    fn list(signal: Signal, ids: &[&str]) -> RankedList {
        RankedList::new(signal, ids.iter().map(|id| hit(id, 1.0)).collect())
    }

    fn ids(hits: &[FusedHit]) -> Vec<&str> {
        hits.iter().map(|h| h.passage_id()).collect()
    }

    #[test]
    fn test_rrf_scores() {
        let hits = fuse(
            &[
                list(Signal::Lexical, &["a", "b"]),
                list(Signal::Vector, &["b", "c"]),
            ],
            60,
        );
        assert_eq!(ids(&hits), vec!["b", "a", "c"]);
        assert!((hits[0].fused_score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((hits[1].fused_score - 1.0 / 61.0).abs() < 1e-12);
        assert_eq!(hits[0].candidate.signals.lexical.map(|s| s.rank), Some(2));
        assert_eq!(hits[0].candidate.signals.vector.map(|s| s.rank), Some(1));
    }

    #[test]
    fn test_ties_break_by_passage_id() {
        let hits = fuse(
            &[
                list(Signal::Lexical, &["z"]),
                list(Signal::Vector, &["a"]),
            ],
            60,
        );
        assert_eq!(ids(&hits), vec!["a", "z"]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let lexical = list(Signal::Lexical, &["a", "b", "c"]);
        let vector = list(Signal::Vector, &["c", "a"]);
        let fuzzy = list(Signal::Fuzzy, &["b"]);

        let forward = fuse(&[lexical.clone(), vector.clone(), fuzzy.clone()], 60);
        let reverse = fuse(&[fuzzy, vector, lexical], 60);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_duplicate_in_list_keeps_best_rank() {
        let hits = fuse(&[list(Signal::Lexical, &["a", "a"])], 60);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].fused_score - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_floor_applies_with_two_signals() {
        let outcome = fuse_with_floor(
            &[
                list(Signal::Lexical, &["a"]),
                list(Signal::Vector, &["a", "b"]),
            ],
            60,
            Some(0.02),
        );
        assert!(outcome.floor_applied);
        assert_eq!(ids(&outcome.hits), vec!["a"]);
        assert_eq!(outcome.dropped_below_floor, 1);
    }

    #[test]
    fn test_single_signal_is_exempt_from_floor() {
        let outcome = fuse_with_floor(
            &[
                list(Signal::Lexical, &[]),
                list(Signal::Vector, &["a", "b"]),
            ],
            60,
            Some(0.5),
        );
        assert!(!outcome.floor_applied);
        assert_eq!(outcome.contributing_signals, 1);
        assert_eq!(ids(&outcome.hits), vec!["a", "b"]);
    }
}
