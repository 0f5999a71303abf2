//! Citation attribution: answer units to evidence references.
//!
//! For each unit, in order of preference:
//! 1. explicit `[S<n>]` markers naming known evidence
//! 2. the previous unit's citations, when both come from the same bullet
//!    or paragraph
//! 3. the evidence slice with the best token overlap, if the match is
//!    non-trivial
//!
//! Markers and page/line annotations never reach the display text.

use crate::rag::segment::segment_answer;
use crate::rag::sources::SourceFormatter;
use crate::rag::types::{AnswerUnit, EvidenceRef};
use crate::text::StopTerms;
use crate::types::EvidenceSlice;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

static RE_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[\s*(S\d+(?:\s*[,、]\s*S\d+)*)\s*\]").ok());

static RE_ANNOTATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[(（]\s*(?:(?:p|pp|page|pages)\.?\s*\d+(?:\s*[-–]\s*\d+)?|(?:lines?|l\.)\s*\d+(?:\s*[-–]\s*\d+)?|\d+\s*ページ|\d+\s*行目?)(?:\s*[,、]\s*(?:(?:lines?|l\.)\s*\d+(?:\s*[-–]\s*\d+)?|\d+\s*行目?))?\s*[)）]",
    )
    .ok()
});

/// Brackets left empty once markers are gone.
static RE_EMPTY_BRACKETS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[\s*[,、]*\s*\]|[(（]\s*[,、]*\s*[)）]|【\s*】").ok());

static RE_SPACE_BEFORE_PUNCT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\s+([.,;:!?。、！？])").ok());

/// Source ids named by markers in `text`, in order of appearance.
pub fn marker_ids(text: &str) -> Vec<String> {
    let Some(re) = RE_MARKER.as_ref() else {
        return Vec::new();
    };
    let mut ids: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let Some(inner) = caps.get(1) else { continue };
        for id in inner.as_str().split([',', '、']) {
            let id = id.trim().to_string();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

fn replace_all(re: &LazyLock<Option<Regex>>, text: &str, with: &str) -> String {
    match re.as_ref() {
        Some(re) => re.replace_all(text, with).into_owned(),
        None => text.to_string(),
    }
}

/// Remove markers, page/line annotations and leftover bracket artifacts.
pub fn clean_unit_text(text: &str) -> String {
    let text = replace_all(&RE_MARKER, text, "");
    let text = replace_all(&RE_ANNOTATION, &text, "");
    let text = replace_all(&RE_EMPTY_BRACKETS, &text, "");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    replace_all(&RE_SPACE_BEFORE_PUNCT, &text, "$1")
        .trim()
        .to_string()
}

/// Attaches evidence references to answer units.
#[derive(Debug, Clone)]
pub struct CitationEngine {
    formatter: Arc<dyn SourceFormatter>,
    min_match_score: f32,
    stop_terms: StopTerms,
}

impl CitationEngine {
    pub fn new(
        formatter: Arc<dyn SourceFormatter>,
        min_match_score: f32,
        stop_terms: StopTerms,
    ) -> Self {
        Self {
            formatter,
            min_match_score,
            stop_terms,
        }
    }

    pub fn formatter(&self) -> &dyn SourceFormatter {
        self.formatter.as_ref()
    }

    /// Segment `answer` and attribute every unit against `evidence`.
    pub fn attribute(&self, answer: &str, evidence: &[EvidenceSlice]) -> Vec<AnswerUnit> {
        let evidence_terms: Vec<BTreeSet<String>> = evidence
            .iter()
            .map(|slice| self.stop_terms.content_terms(&slice.text))
            .collect();

        let mut units: Vec<AnswerUnit> = Vec::new();
        for segment in segment_answer(answer) {
            let explicit = self.explicit_refs(&segment.text, evidence);
            let text = clean_unit_text(&segment.text);

            if text.is_empty() {
                // A marker on its own line cites the unit before it
                if let Some(prev) = units.last_mut().filter(|u| u.block == segment.block) {
                    merge_refs(&mut prev.citations, explicit);
                }
                continue;
            }

            let citations = if !explicit.is_empty() {
                explicit
            } else if let Some(prev) = units
                .last()
                .filter(|u| u.block == segment.block && u.is_cited())
            {
                prev.citations.clone()
            } else {
                self.best_match(&text, evidence, &evidence_terms)
                    .into_iter()
                    .collect()
            };

            units.push(AnswerUnit {
                text,
                citations,
                block: segment.block,
                bulleted: segment.bulleted,
            });
        }

        tracing::debug!(
            units = units.len(),
            cited = units.iter().filter(|u| u.is_cited()).count(),
            "Attributed answer units"
        );
        units
    }

    fn explicit_refs(&self, text: &str, evidence: &[EvidenceSlice]) -> Vec<EvidenceRef> {
        marker_ids(text)
            .iter()
            .filter_map(|id| evidence.iter().find(|s| &s.source_id == id))
            .map(|slice| self.formatter.format(slice))
            .collect()
    }

    /// Highest overlap ratio wins; the earlier slice wins ties.
    fn best_match(
        &self,
        text: &str,
        evidence: &[EvidenceSlice],
        evidence_terms: &[BTreeSet<String>],
    ) -> Option<EvidenceRef> {
        let unit_terms = self.stop_terms.content_terms(text);
        if unit_terms.is_empty() {
            return None;
        }
        let required_shared = unit_terms.len().min(2);

        let mut best: Option<(usize, f32)> = None;
        for (i, terms) in evidence_terms.iter().enumerate() {
            let shared = unit_terms.intersection(terms).count();
            if shared < required_shared {
                continue;
            }
            let score = shared as f32 / unit_terms.len() as f32;
            if score >= self.min_match_score && best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        best.map(|(i, _)| self.formatter.format(&evidence[i]))
    }
}

fn merge_refs(into: &mut Vec<EvidenceRef>, refs: Vec<EvidenceRef>) {
    for r in refs {
        if !into.iter().any(|e| e.source_id == r.source_id) {
            into.push(r);
        }
    }
}
