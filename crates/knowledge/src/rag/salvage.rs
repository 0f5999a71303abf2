//! Deterministic answers built straight from evidence sentences.

use crate::rag::segment::split_sentences;
use crate::rag::sources::truncate_snippet;
use crate::text::StopTerms;
use crate::types::EvidenceSlice;
use std::collections::BTreeSet;

/// Longest evidence sentence copied into a salvaged bullet.
const MAX_SALVAGE_SENTENCE_CHARS: usize = 400;

struct Candidate<'a> {
    slice: usize,
    position: usize,
    text: String,
    source_id: &'a str,
    score: usize,
}

/// Pick up to `max_sentences` evidence sentences sharing terms with the
/// question, best overlap first, and render them as cited bullets in
/// evidence order.
///
/// When nothing overlaps, the first sentence of the first slice is used so
/// the caller still has something to attribute and judge. Returns `None`
/// only when there is no evidence text at all.
pub fn salvage_answer(
    question: &str,
    evidence: &[EvidenceSlice],
    max_sentences: usize,
    stop_terms: &StopTerms,
) -> Option<String> {
    let question_terms = stop_terms.content_terms(question);
    let mut candidates: Vec<Candidate<'_>> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for (slice_idx, slice) in evidence.iter().enumerate() {
        let sentences = slice
            .text
            .lines()
            .flat_map(split_sentences)
            .enumerate();
        for (position, sentence) in sentences {
            if !seen.insert(sentence.clone()) {
                continue;
            }
            let score = stop_terms
                .content_terms(&sentence)
                .intersection(&question_terms)
                .count();
            candidates.push(Candidate {
                slice: slice_idx,
                position,
                text: sentence,
                source_id: &slice.source_id,
                score,
            });
        }
    }

    let first = candidates.first().map(|c| (c.text.clone(), c.source_id));

    let mut chosen: Vec<Candidate<'_>> =
        candidates.into_iter().filter(|c| c.score > 0).collect();
    chosen.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.slice.cmp(&b.slice))
            .then(a.position.cmp(&b.position))
    });
    chosen.truncate(max_sentences.max(1));
    chosen.sort_by(|a, b| a.slice.cmp(&b.slice).then(a.position.cmp(&b.position)));

    let bullets: Vec<String> = if chosen.is_empty() {
        let (text, source_id) = first?;
        vec![bullet(&text, source_id)]
    } else {
        chosen.iter().map(|c| bullet(&c.text, c.source_id)).collect()
    };

    tracing::debug!(sentences = bullets.len(), "Salvaged answer from evidence");
    Some(bullets.join("\n"))
}

fn bullet(sentence: &str, source_id: &str) -> String {
    format!(
        "- {} [{}]",
        truncate_snippet(sentence, MAX_SALVAGE_SENTENCE_CHARS),
        source_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(id: &str, text: &str) -> EvidenceSlice {
        EvidenceSlice {
            source_id: id.to_string(),
            passage_id: format!("p-{}", id),
            document_id: "doc".to_string(),
            filename: "atlas.txt".to_string(),
            page: None,
            line_range: None,
            text: text.to_string(),
            truncated: false,
        }
    }

    #[test]
    fn test_picks_overlapping_sentences_in_evidence_order() {
        let evidence = vec![
            slice("S1", "France is in Europe. Paris is the capital of France."),
            slice("S2", "The capital hosts many museums. Lyon is famous for food."),
        ];
        let answer = salvage_answer(
            "What is the capital of France?",
            &evidence,
            2,
            &StopTerms::default(),
        )
        .unwrap();
        assert_eq!(
            answer,
            "- France is in Europe. [S1]\n- Paris is the capital of France. [S1]"
        );
    }

    #[test]
    fn test_respects_max_sentences() {
        let evidence = vec![slice(
            "S1",
            "Paris is the capital of France. France has a capital city. Capital cities matter.",
        )];
        let answer =
            salvage_answer("capital of France", &evidence, 1, &StopTerms::default()).unwrap();
        assert_eq!(answer, "- Paris is the capital of France. [S1]");
    }

    #[test]
    fn test_falls_back_to_first_sentence() {
        let evidence = vec![slice("S1", "Revenue rose. Costs fell.")];
        let answer =
            salvage_answer("Who founded the museum?", &evidence, 3, &StopTerms::default()).unwrap();
        assert_eq!(answer, "- Revenue rose. [S1]");
    }

    #[test]
    fn test_no_evidence() {
        assert!(salvage_answer("q", &[], 3, &StopTerms::default()).is_none());
    }

    #[test]
    fn test_japanese_evidence() {
        let evidence = vec![slice("S1", "東京都の人口は約1400万人です。首都機能があります。")];
        let answer = salvage_answer("東京都の人口は？", &evidence, 3, &StopTerms::default()).unwrap();
        assert_eq!(answer, "- 東京都の人口は約1400万人です。 [S1]");
    }
}
