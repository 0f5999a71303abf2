//! Turning evidence slices into user-facing source references.

use crate::rag::types::EvidenceRef;
use crate::types::EvidenceSlice;
use std::sync::Arc;

/// Maximum snippet length (characters) for source references.
pub const MAX_SNIPPET_LENGTH: usize = 150;

/// Strategy for rendering an evidence slice as a citation.
pub trait SourceFormatter: Send + Sync + std::fmt::Debug {
    fn format(&self, slice: &EvidenceSlice) -> EvidenceRef;
}

/// Filename, page and line range.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSourceFormatter;

impl SourceFormatter for DefaultSourceFormatter {
    fn format(&self, slice: &EvidenceSlice) -> EvidenceRef {
        EvidenceRef {
            source_id: slice.source_id.clone(),
            document_id: slice.document_id.clone(),
            passage_id: slice.passage_id.clone(),
            filename: slice.filename.clone(),
            page: slice.page,
            line_range: slice.line_range,
            location: location(slice),
            snippet: None,
        }
    }
}

/// Default reference plus a short evidence snippet.
#[derive(Debug, Clone, Copy)]
pub struct SnippetSourceFormatter {
    pub max_len: usize,
}

impl Default for SnippetSourceFormatter {
    fn default() -> Self {
        Self {
            max_len: MAX_SNIPPET_LENGTH,
        }
    }
}

impl SourceFormatter for SnippetSourceFormatter {
    fn format(&self, slice: &EvidenceSlice) -> EvidenceRef {
        EvidenceRef {
            snippet: Some(truncate_snippet(&slice.text, self.max_len)),
            ..DefaultSourceFormatter.format(slice)
        }
    }
}

/// Pick the formatter configured by `answer.citation_snippets`.
pub fn formatter_for(citation_snippets: bool) -> Arc<dyn SourceFormatter> {
    if citation_snippets {
        Arc::new(SnippetSourceFormatter::default())
    } else {
        Arc::new(DefaultSourceFormatter)
    }
}

/// Human-readable location, e.g. "report.pdf, p. 4, lines 12-18".
pub fn location(slice: &EvidenceSlice) -> String {
    let mut parts = vec![slice.filename.clone()];
    if let Some(page) = slice.page {
        parts.push(format!("p. {}", page));
    }
    if let Some(range) = slice.line_range {
        parts.push(range.to_string());
    }
    parts.join(", ")
}

/// Truncate to `max_len` characters, preferring a word boundary.
pub fn truncate_snippet(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_len).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => format!("{}...", truncated[..last_space].trim_end()),
        _ => format!("{}...", truncated),
    }
}
