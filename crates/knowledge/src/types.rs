//! Retrieval type definitions.

use grounded_core::{AppError, AppResult, InputErrorCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest `limit` a single query may request.
pub const MAX_QUERY_LIMIT: usize = 100;

/// A relevance signal served by the storage engine.
///
/// The declaration order is the fixed summation order used by fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Lexical,
    Vector,
    Fuzzy,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Lexical, Signal::Vector, Signal::Fuzzy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Lexical => "lexical",
            Signal::Vector => "vector",
            Signal::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document restriction for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "document_ids", rename_all = "lowercase")]
pub enum DocumentScope {
    /// Every document the tenant owns
    All,
    /// Only the listed documents
    Selected(Vec<String>),
}

impl DocumentScope {
    /// Resolve the scope from request parameters.
    ///
    /// `all_documents` together with explicit ids is a conflict; selecting
    /// documents without naming any is rejected as an empty scope.
    pub fn from_request(all_documents: bool, selected: Option<Vec<String>>) -> AppResult<Self> {
        let selected = selected.map(|ids| {
            ids.into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect::<Vec<_>>()
        });

        match (all_documents, selected) {
            (true, Some(ids)) if !ids.is_empty() => Err(AppError::input(
                InputErrorCode::ConflictingScope,
                "cannot combine all-documents mode with explicit document ids",
            )),
            (true, _) | (false, None) => Ok(DocumentScope::All),
            (false, Some(ids)) if ids.is_empty() => Err(AppError::input(
                InputErrorCode::EmptyDocumentScope,
                "document scope was requested but no document ids were given",
            )),
            (false, Some(ids)) => Ok(DocumentScope::Selected(ids)),
        }
    }

    /// Allow-list handed to the storage engine (`None` = unscoped).
    pub fn allow_list(&self) -> Option<&[String]> {
        match self {
            DocumentScope::All => None,
            DocumentScope::Selected(ids) => Some(ids),
        }
    }
}

/// A retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub tenant_id: String,
    pub scope: DocumentScope,
    pub limit: usize,
}

impl Query {
    pub fn new(text: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tenant_id: tenant_id.into(),
            scope: DocumentScope::All,
            limit: 8,
        }
    }

    pub fn with_scope(mut self, scope: DocumentScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_documents<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_scope(DocumentScope::Selected(
            ids.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A stored passage as returned by the storage engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub passage_id: String,
    pub document_id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// 1-based line of the first text line within the source document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    pub text: String,
}

/// One signal's opinion of a candidate: its rank and native metric.
///
/// `score` is relevance for lexical, distance for vector and similarity for
/// fuzzy; only `rank` takes part in fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalScore {
    pub rank: usize,
    pub score: f64,
}

/// Per-signal scores attached to a candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalScores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical: Option<SignalScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<SignalScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzzy: Option<SignalScore>,
}

impl SignalScores {
    pub fn get(&self, signal: Signal) -> Option<SignalScore> {
        match signal {
            Signal::Lexical => self.lexical,
            Signal::Vector => self.vector,
            Signal::Fuzzy => self.fuzzy,
        }
    }

    /// Record a score; an existing (better) rank for the signal is kept.
    pub fn record(&mut self, signal: Signal, score: SignalScore) {
        let slot = match signal {
            Signal::Lexical => &mut self.lexical,
            Signal::Vector => &mut self.vector,
            Signal::Fuzzy => &mut self.fuzzy,
        };
        if slot.is_none() {
            *slot = Some(score);
        }
    }

    /// Signals that ranked this candidate, in fusion order.
    pub fn present(&self) -> impl Iterator<Item = (Signal, SignalScore)> + '_ {
        Signal::ALL
            .into_iter()
            .filter_map(|signal| self.get(signal).map(|score| (signal, score)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

/// A retrieved passage with its per-signal scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub passage: Passage,
    pub signals: SignalScores,
}

/// A candidate ranked by reciprocal-rank fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub fused_score: f64,
}

impl FusedHit {
    pub fn passage(&self) -> &Passage {
        &self.candidate.passage
    }

    pub fn passage_id(&self) -> &str {
        &self.candidate.passage.passage_id
    }
}

/// Inclusive 1-based line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "line {}", self.start)
        } else {
            write!(f, "lines {}-{}", self.start, self.end)
        }
    }
}

/// A budgeted view of a fused hit used as generation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSlice {
    /// Citation identifier ("S1", "S2", ...)
    pub source_id: String,
    pub passage_id: String,
    pub document_id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_range: Option<LineRange>,
    pub text: String,
    /// Whether the passage was cut to fit a budget
    pub truncated: bool,
}

/// Import statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStats {
    pub passages: u32,
    pub documents: u32,
    /// Passages without text, not stored
    pub skipped: u32,
    pub bytes: u64,
    pub duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_request() {
        assert_eq!(
            DocumentScope::from_request(false, None).unwrap(),
            DocumentScope::All
        );
        assert_eq!(
            DocumentScope::from_request(true, Some(vec![])).unwrap(),
            DocumentScope::All
        );
        assert_eq!(
            DocumentScope::from_request(false, Some(vec![" d1 ".into()])).unwrap(),
            DocumentScope::Selected(vec!["d1".into()])
        );
    }

    #[test]
    fn test_scope_conflicts_are_input_errors() {
        let err = DocumentScope::from_request(true, Some(vec!["d1".into()])).unwrap_err();
        assert_eq!(err.code(), "CONFLICTING_SCOPE");

        let err = DocumentScope::from_request(false, Some(vec!["  ".into()])).unwrap_err();
        assert_eq!(err.code(), "EMPTY_DOCUMENT_SCOPE");
    }

    #[test]
    fn test_signal_scores_keep_first_rank() {
        let mut scores = SignalScores::default();
        assert!(scores.is_empty());
        scores.record(Signal::Vector, SignalScore { rank: 2, score: 0.1 });
        scores.record(Signal::Vector, SignalScore { rank: 5, score: 0.4 });
        assert_eq!(scores.vector.map(|s| s.rank), Some(2));
        let present: Vec<Signal> = scores.present().map(|(s, _)| s).collect();
        assert_eq!(present, vec![Signal::Vector]);
    }

    #[test]
    fn test_line_range_display() {
        assert_eq!(LineRange { start: 3, end: 3 }.to_string(), "line 3");
        assert_eq!(LineRange { start: 3, end: 7 }.to_string(), "lines 3-7");
    }

    #[test]
    fn test_fused_hit_serializes_flat() {
        let hit = FusedHit {
            candidate: Candidate {
                passage: Passage {
                    passage_id: "p1".into(),
                    document_id: "d1".into(),
                    filename: "a.pdf".into(),
                    page: Some(1),
                    line_start: None,
                    text: "text".into(),
                },
                signals: SignalScores {
                    lexical: Some(SignalScore { rank: 1, score: 2.5 }),
                    ..Default::default()
                },
            },
            fused_score: 1.0 / 61.0,
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["passage_id"], "p1");
        assert_eq!(json["signals"]["lexical"]["rank"], 1);
        assert!(json["signals"].get("vector").is_none());
    }
}
