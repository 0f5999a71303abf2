//! Evidence compaction under per-passage and total character budgets.
//!
//! Pure and deterministic: the same question, hits and budget always produce
//! byte-identical slices and the same fingerprint. Budgets count characters,
//! not bytes.

use crate::text::{tokenize, StopTerms};
use crate::types::{EvidenceSlice, FusedHit, LineRange};
use grounded_core::config::EvidenceConfig;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvidenceBudget {
    pub per_passage_chars: usize,
    pub total_chars: usize,
    pub max_passages: usize,
    /// Stop adding slices once less than this remains of the total budget
    pub min_slice_chars: usize,
}

impl From<&EvidenceConfig> for EvidenceBudget {
    fn from(config: &EvidenceConfig) -> Self {
        Self {
            per_passage_chars: config.per_passage_chars,
            total_chars: config.total_chars,
            max_passages: config.max_passages,
            min_slice_chars: config.min_slice_chars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactedEvidence {
    pub slices: Vec<EvidenceSlice>,
    pub total_chars: usize,
    /// SHA-256 over the question and every slice, hex encoded
    pub fingerprint: String,
}

impl CompactedEvidence {
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Compact fused hits into numbered evidence slices.
pub fn compact_evidence(
    question: &str,
    hits: &[FusedHit],
    budget: &EvidenceBudget,
    stop_terms: &StopTerms,
) -> CompactedEvidence {
    let terms = stop_terms.content_terms(question);
    let mut slices: Vec<EvidenceSlice> = Vec::new();
    let mut total_chars = 0usize;

    for hit in hits {
        if slices.len() >= budget.max_passages {
            break;
        }
        let remaining = budget.total_chars.saturating_sub(total_chars);
        if remaining == 0 || remaining < budget.min_slice_chars {
            break;
        }
        let cap = budget.per_passage_chars.min(remaining);

        let passage = hit.passage();
        let Some(view) = compact_passage(&passage.text, &terms, cap) else {
            continue;
        };

        total_chars += view.text.chars().count();
        slices.push(EvidenceSlice {
            source_id: format!("S{}", slices.len() + 1),
            passage_id: passage.passage_id.clone(),
            document_id: passage.document_id.clone(),
            filename: passage.filename.clone(),
            page: passage.page,
            line_range: passage.line_start.map(|start| LineRange {
                start: start + view.first_line as u32,
                end: start + view.last_line as u32,
            }),
            text: view.text,
            truncated: view.truncated,
        });
    }

    let fingerprint = fingerprint(question, &slices);
    tracing::debug!(
        slices = slices.len(),
        total_chars,
        fingerprint = %fingerprint,
        "Compacted evidence"
    );

    CompactedEvidence {
        slices,
        total_chars,
        fingerprint,
    }
}

struct PassageView {
    text: String,
    first_line: usize,
    last_line: usize,
    truncated: bool,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Keep the best-matching line and grow around it, alternating after and
/// before, while the cap allows.
fn compact_passage(text: &str, terms: &BTreeSet<String>, cap: usize) -> Option<PassageView> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let first = lines.iter().position(|l| !l.trim().is_empty())?;
    let last = lines.iter().rposition(|l| !l.trim().is_empty())?;

    let whole = lines[first..=last].join("\n");
    if char_len(&whole) <= cap {
        return Some(PassageView {
            text: whole,
            first_line: first,
            last_line: last,
            truncated: false,
        });
    }

    let anchor = anchor_line(&lines[first..=last], terms) + first;
    let anchor_text = lines[anchor];

    if char_len(anchor_text) > cap {
        return Some(PassageView {
            text: window_in_line(anchor_text, terms, cap),
            first_line: anchor,
            last_line: anchor,
            truncated: true,
        });
    }

    let (mut lo, mut hi) = (anchor, anchor);
    let mut used = char_len(anchor_text);
    loop {
        let mut grew = false;
        if hi < last {
            let cost = char_len(lines[hi + 1]) + 1;
            if used + cost <= cap {
                hi += 1;
                used += cost;
                grew = true;
            }
        }
        if lo > first {
            let cost = char_len(lines[lo - 1]) + 1;
            if used + cost <= cap {
                lo -= 1;
                used += cost;
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }

    Some(PassageView {
        text: lines[lo..=hi].join("\n"),
        first_line: lo,
        last_line: hi,
        truncated: true,
    })
}

/// Index of the line sharing the most question terms; earliest wins ties.
fn anchor_line(lines: &[&str], terms: &BTreeSet<String>) -> usize {
    let mut best = (0usize, 0usize);
    for (i, line) in lines.iter().enumerate() {
        let line_terms: BTreeSet<String> = tokenize(line).into_iter().collect();
        let score = terms.intersection(&line_terms).count();
        if score > best.1 {
            best = (i, score);
        }
    }
    best.0
}

/// A `cap`-character window of a long line, starting a little before the
/// first question term.
fn window_in_line(line: &str, terms: &BTreeSet<String>, cap: usize) -> String {
    let chars: Vec<char> = line.chars().collect();

    // Lowercased chars, each mapped back to the char it came from
    let mut lowered: Vec<char> = Vec::with_capacity(chars.len());
    let mut owner: Vec<usize> = Vec::with_capacity(chars.len());
    for (idx, c) in chars.iter().enumerate() {
        for lc in c.to_lowercase() {
            lowered.push(lc);
            owner.push(idx);
        }
    }

    let hit = terms
        .iter()
        .filter_map(|t| {
            let needle: Vec<char> = t.chars().collect();
            if needle.is_empty() {
                return None;
            }
            lowered
                .windows(needle.len())
                .position(|w| w == needle.as_slice())
                .map(|pos| owner[pos])
        })
        .min()
        .unwrap_or(0);

    let start = hit
        .saturating_sub(cap / 3)
        .min(chars.len().saturating_sub(cap));
    chars[start..(start + cap).min(chars.len())].iter().collect()
}

fn fingerprint(question: &str, slices: &[EvidenceSlice]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(question.trim().as_bytes());
    for slice in slices {
        hasher.update([0x1f]);
        hasher.update(slice.source_id.as_bytes());
        hasher.update([0x1e]);
        hasher.update(slice.passage_id.as_bytes());
        hasher.update([0x1e]);
        hasher.update(slice.text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candidate, Passage, SignalScores};

    fn fused(id: &str, text: &str, line_start: Option<u32>) -> FusedHit {
        FusedHit {
            candidate: Candidate {
                passage: Passage {
                    passage_id: id.to_string(),
                    document_id: format!("doc-{}", id),
                    filename: "report.txt".to_string(),
                    page: Some(4),
                    line_start,
                    text: text.to_string(),
                },
                signals: SignalScores::default(),
            },
            fused_score: 0.01,
        }
    }

    fn budget(per_passage: usize, total: usize) -> EvidenceBudget {
        EvidenceBudget {
            per_passage_chars: per_passage,
            total_chars: total,
            max_passages: 8,
            min_slice_chars: 5,
        }
    }

    #[test]
    fn test_short_passage_is_kept_whole() {
        let out = compact_evidence(
            "capital",
            &[fused("p1", "\nParis is the capital.\n", Some(10))],
            &budget(100, 1000),
            &StopTerms::default(),
        );
        assert_eq!(out.slices.len(), 1);
        let slice = &out.slices[0];
        assert_eq!(slice.source_id, "S1");
        assert_eq!(slice.text, "Paris is the capital.");
        assert!(!slice.truncated);
        assert_eq!(slice.line_range, Some(LineRange { start: 11, end: 11 }));
    }

    #[test]
    fn test_keeps_keyword_line_and_neighbours() {
        let text = "Intro line one.\nFiller text here.\nParis is the capital of France.\nMore filler.\nClosing words.";
        let out = compact_evidence(
            "What is the capital of France?",
            &[fused("p1", text, Some(1))],
            &budget(62, 1000),
            &StopTerms::default(),
        );
        let slice = &out.slices[0];
        assert!(slice.text.contains("Paris is the capital of France."));
        assert!(slice.truncated);
        assert!(slice.text.chars().count() <= 62);
        // "Closing words." no longer fits once the line before the anchor is in
        assert_eq!(slice.text, "Filler text here.\nParis is the capital of France.\nMore filler.");
        assert_eq!(slice.line_range, Some(LineRange { start: 2, end: 4 }));
    }

    #[test]
    fn test_long_single_line_is_windowed_by_chars() {
        let text = format!("{} 東京都の人口は約1400万人です。{}", "あ".repeat(50), "い".repeat(50));
        let out = compact_evidence(
            "東京都の人口",
            &[fused("p1", &text, None)],
            &budget(20, 1000),
            &StopTerms::default(),
        );
        let slice = &out.slices[0];
        assert_eq!(slice.text.chars().count(), 20);
        assert!(slice.text.contains("東京都"));
        assert_eq!(slice.line_range, None);
    }

    #[test]
    fn test_window_tracks_keyword_after_expanding_lowercase() {
        let line = format!("{} Paris capital {}", "İ".repeat(100), "x".repeat(100));
        let terms: BTreeSet<String> = ["paris".to_string()].into_iter().collect();
        let window = window_in_line(&line, &terms, 40);
        assert_eq!(window.chars().count(), 40);
        assert!(window.contains("Paris"));
    }

    #[test]
    fn test_total_budget_limits_slices() {
        let hits = vec![
            fused("p1", &"a".repeat(40), None),
            fused("p2", &"b".repeat(40), None),
            fused("p3", &"c".repeat(40), None),
        ];
        let out = compact_evidence("q", &hits, &budget(40, 90), &StopTerms::default());
        // p3 gets only 10 chars, which is still above min_slice_chars
        assert_eq!(out.slices.len(), 3);
        assert_eq!(out.total_chars, 90);
        assert_eq!(out.slices[2].text.chars().count(), 10);
        assert_eq!(out.slices[2].source_id, "S3");
    }

    #[test]
    fn test_empty_passages_are_skipped() {
        let hits = vec![fused("p1", "   \n  ", None), fused("p2", "text", None)];
        let out = compact_evidence("q", &hits, &budget(40, 90), &StopTerms::default());
        assert_eq!(out.slices.len(), 1);
        assert_eq!(out.slices[0].source_id, "S1");
        assert_eq!(out.slices[0].passage_id, "p2");
    }

    #[test]
    fn test_deterministic() {
        let hits = vec![
            fused("p1", "Alpha beta gamma.\nDelta epsilon.", Some(1)),
            fused("p2", "Zeta eta theta.", Some(1)),
        ];
        let a = compact_evidence("beta", &hits, &budget(20, 100), &StopTerms::default());
        let b = compact_evidence("beta", &hits, &budget(20, 100), &StopTerms::default());
        assert_eq!(a, b);
        assert_eq!(a.fingerprint.len(), 64);

        let c = compact_evidence("theta", &hits, &budget(20, 100), &StopTerms::default());
        assert_ne!(a.fingerprint, c.fingerprint);
    }
}
