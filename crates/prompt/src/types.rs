//! Prompt types for the quarantine builder.

use grounded_core::Locale;
use serde::{Deserialize, Serialize};

/// One evidence slice handed to the builder.
///
/// The builder never interprets `text`; it only wraps and neutralizes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSource {
    /// Citation identifier shown to the model (e.g., "S1")
    pub source_id: String,

    /// Owning document identifier
    pub document_id: String,

    /// Original filename, display only
    pub filename: String,

    /// 1-based page number when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Evidence text
    pub text: String,
}

/// A three-part message ready for generation.
///
/// The parts are never concatenated by the builder; providers send them as
/// separate messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantinedPrompt {
    /// Fixed system instruction (citation and security rules)
    pub system: String,

    /// Untrusted context block wrapping every evidence slice
    pub context: String,

    /// The user question, verbatim
    pub question: String,

    /// Build metadata
    pub metadata: QuarantineMetadata,
}

/// Metadata about how the prompt was built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineMetadata {
    /// Locale of the system instruction
    pub locale: Locale,

    /// Number of sources wrapped in the context block
    pub source_count: usize,

    /// Lines replaced by the redaction marker
    pub redacted_lines: usize,
}
