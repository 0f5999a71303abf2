//! Answer composition types.

use crate::retriever::RetrievalDiagnostics;
use crate::types::{FusedHit, LineRange, Query};
use grounded_core::GenerationMode;
use serde::{Deserialize, Serialize};

/// Why an answer was judged not answerable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    NoSources,
    InsufficientEvidence,
    Other,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::NoSources => "NO_SOURCES",
            ReasonCode::InsufficientEvidence => "INSUFFICIENT_EVIDENCE",
            ReasonCode::Other => "OTHER",
        }
    }
}

/// Verdict on whether the composed answer is grounded in evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answerability {
    pub answerable: bool,
    pub reason_code: Option<ReasonCode>,
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl Answerability {
    pub fn answerable() -> Self {
        Self {
            answerable: true,
            reason_code: None,
            reason: None,
            suggestions: Vec::new(),
        }
    }

    pub fn not_answerable(code: ReasonCode, reason: impl Into<String>) -> Self {
        Self {
            answerable: false,
            reason_code: Some(code),
            reason: Some(reason.into()),
            suggestions: Vec::new(),
        }
    }
}

/// Where a cited claim came from, in user-facing terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Request-local id (`S1`, `S2`, ...)
    pub source_id: String,
    pub document_id: String,
    pub passage_id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_range: Option<LineRange>,
    /// e.g. "report.pdf, p. 4, lines 12-18"
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// One claim of the answer and the evidence it rests on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerUnit {
    pub text: String,
    pub citations: Vec<EvidenceRef>,
    /// Index of the bullet or paragraph the unit was split from
    #[serde(skip)]
    pub block: usize,
    #[serde(skip)]
    pub bulleted: bool,
}

impl AnswerUnit {
    pub fn is_cited(&self) -> bool {
        !self.citations.is_empty()
    }
}

/// How the final answer text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerOrigin {
    Generated,
    Salvaged,
    Fallback,
}

/// An ask request.
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub query: Query,
    /// Caller asked for the debug payload
    pub include_debug: bool,
    /// Caller is allowed to see it
    pub debug_authorized: bool,
}

impl AskRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            include_debug: false,
            debug_authorized: false,
        }
    }

    pub fn with_debug(mut self, include_debug: bool, debug_authorized: bool) -> Self {
        self.include_debug = include_debug;
        self.debug_authorized = debug_authorized;
        self
    }

    pub fn wants_diagnostics(&self) -> bool {
        self.include_debug && self.debug_authorized
    }
}

/// What happened at the generation step.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub mode: GenerationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub attempted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub low_confidence: bool,
    pub redacted_lines: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskDiagnostics {
    pub retrieval: RetrievalDiagnostics,
    pub evidence_slices: usize,
    pub evidence_chars: usize,
    pub evidence_fingerprint: String,
    pub generation: GenerationReport,
    pub overlap_guard_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence_limit: Option<usize>,
}

/// Response from a grounded ask.
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    pub request_id: String,
    /// Display text with citation markers removed
    pub answer: String,
    pub answer_units: Vec<AnswerUnit>,
    pub answerability: Answerability,
    /// Every cited source once, in first-use order
    pub citations: Vec<EvidenceRef>,
    pub hits: Vec<FusedHit>,
    pub origin: AnswerOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<AskDiagnostics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_code_serialization() {
        let json = serde_json::to_string(&ReasonCode::InsufficientEvidence).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_EVIDENCE\"");
        assert_eq!(ReasonCode::NoSources.as_str(), "NO_SOURCES");
    }

    #[test]
    fn test_unit_skips_internal_fields() {
        let unit = AnswerUnit {
            text: "Paris is the capital.".to_string(),
            citations: Vec::new(),
            block: 3,
            bulleted: true,
        };
        let value = serde_json::to_value(&unit).unwrap();
        assert!(value.get("block").is_none());
        assert!(value.get("bulleted").is_none());
        assert!(!unit.is_cited());
    }

    #[test]
    fn test_diagnostics_need_both_flags() {
        let query = Query::new("q", "t");
        assert!(!AskRequest::new(query.clone()).with_debug(true, false).wants_diagnostics());
        assert!(!AskRequest::new(query.clone()).with_debug(false, true).wants_diagnostics());
        assert!(AskRequest::new(query).with_debug(true, true).wants_diagnostics());
    }
}
