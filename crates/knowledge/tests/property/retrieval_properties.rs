use grounded_knowledge::compact::{compact_evidence, EvidenceBudget};
use grounded_knowledge::fusion::{fuse, fuse_with_floor, DEFAULT_RRF_K};
use grounded_knowledge::language::decide;
use grounded_knowledge::signals::RankedList;
use grounded_knowledge::store::StoreHit;
use grounded_knowledge::text::StopTerms;
use grounded_knowledge::types::{Candidate, FusedHit, Passage, Signal, SignalScores};
use proptest::prelude::*;

fn passage(id: &str, text: &str) -> Passage {
    Passage {
        passage_id: id.to_string(),
        document_id: "doc".to_string(),
        filename: "doc.txt".to_string(),
        page: None,
        line_start: Some(1),
        text: text.to_string(),
    }
}

fn list(signal: Signal, ids: &[u8]) -> RankedList {
    RankedList::new(
        signal,
        ids.iter()
            .map(|id| StoreHit {
                passage: passage(&format!("p{:02}", id), "text"),
                score: 0.5,
            })
            .collect(),
    )
}

fn ranked_ids() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..24, 0..12)
}

fn summary(hits: &[FusedHit]) -> Vec<(String, f64)> {
    hits.iter()
        .map(|h| (h.passage_id().to_string(), h.fused_score))
        .collect()
}

proptest! {
    #[test]
    fn fusion_ignores_list_order(a in ranked_ids(), b in ranked_ids(), c in ranked_ids()) {
        let forward = vec![
            list(Signal::Lexical, &a),
            list(Signal::Vector, &b),
            list(Signal::Fuzzy, &c),
        ];
        let reversed: Vec<RankedList> = forward.iter().rev().cloned().collect();

        prop_assert_eq!(
            summary(&fuse(&forward, DEFAULT_RRF_K)),
            summary(&fuse(&reversed, DEFAULT_RRF_K))
        );
    }

    #[test]
    fn fusion_is_strictly_ordered(a in ranked_ids(), b in ranked_ids()) {
        let hits = fuse(
            &[list(Signal::Lexical, &a), list(Signal::Vector, &b)],
            DEFAULT_RRF_K,
        );
        for pair in hits.windows(2) {
            prop_assert!(
                pair[0].fused_score > pair[1].fused_score
                    || (pair[0].fused_score == pair[1].fused_score
                        && pair[0].passage_id() < pair[1].passage_id())
            );
        }
        let mut ids: Vec<&str> = hits.iter().map(|h| h.passage_id()).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), hits.len());
    }

    #[test]
    fn fused_score_is_bounded(a in ranked_ids(), b in ranked_ids(), c in ranked_ids()) {
        let hits = fuse(
            &[
                list(Signal::Lexical, &a),
                list(Signal::Vector, &b),
                list(Signal::Fuzzy, &c),
            ],
            DEFAULT_RRF_K,
        );
        let ceiling = 3.0 / (DEFAULT_RRF_K as f64 + 1.0);
        for hit in &hits {
            prop_assert!(hit.fused_score > 0.0 && hit.fused_score <= ceiling + 1e-12);
        }
    }

    #[test]
    fn single_signal_is_never_floored(a in ranked_ids(), floor in 0.0f64..1.0) {
        let outcome = fuse_with_floor(&[list(Signal::Vector, &a)], DEFAULT_RRF_K, Some(floor));
        let expected = fuse(&[list(Signal::Vector, &a)], DEFAULT_RRF_K);

        prop_assert!(!outcome.floor_applied);
        prop_assert_eq!(outcome.dropped_below_floor, 0);
        prop_assert_eq!(summary(&outcome.hits), summary(&expected));
    }

    #[test]
    fn cjk_queries_never_use_lexical(
        text in "[\u{3041}-\u{3093}\u{4E00}-\u{4FFF}]{1,20}",
        threshold in 0.0f32..1.0,
        cap in 0.0f32..0.05,
    ) {
        let policy = decide(&text, true, true, threshold, cap);
        prop_assert!(policy.script.is_cjk());
        prop_assert!(!policy.use_lexical);
        prop_assert!(policy.use_vector);
        prop_assert!(policy.fuzzy_threshold <= cap);
    }

    #[test]
    fn latin_queries_keep_configured_threshold(
        text in "[a-zA-Z ]{1,40}",
        threshold in 0.0f32..1.0,
    ) {
        let policy = decide(&text, true, true, threshold, 0.003);
        prop_assert!(!policy.script.is_cjk());
        prop_assert!(!policy.use_fuzzy);
        prop_assert_eq!(policy.fuzzy_threshold, threshold);
    }

    #[test]
    fn compaction_is_deterministic_and_budgeted(
        texts in prop::collection::vec("[a-z ]{0,60}(\n[a-z ]{0,60}){0,4}", 1..8),
        question in "[a-z ]{1,30}",
        per_passage in 20usize..200,
        total in 40usize..600,
    ) {
        let hits: Vec<FusedHit> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| FusedHit {
                candidate: Candidate {
                    passage: passage(&format!("p{}", i), text),
                    signals: SignalScores::default(),
                },
                fused_score: 1.0 / (61.0 + i as f64),
            })
            .collect();
        let budget = EvidenceBudget {
            per_passage_chars: per_passage,
            total_chars: total,
            max_passages: 6,
            min_slice_chars: 10,
        };
        let stop_terms = StopTerms::default();

        let first = compact_evidence(&question, &hits, &budget, &stop_terms);
        let second = compact_evidence(&question, &hits, &budget, &stop_terms);

        prop_assert_eq!(&first, &second);
        prop_assert!(first.total_chars <= total);
        prop_assert!(first.slices.len() <= 6);
        for (i, slice) in first.slices.iter().enumerate() {
            prop_assert!(slice.text.chars().count() <= per_passage);
            prop_assert_eq!(&slice.source_id, &format!("S{}", i + 1));
        }
    }
}
