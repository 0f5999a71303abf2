//! Prompt quarantine for the grounded workspace.
//!
//! This crate isolates retrieved evidence from generation instructions:
//! - Fixed system instruction per locale
//! - Handlebars-rendered untrusted-context block with per-source markers
//! - Injection-pattern neutralization (English and Japanese)

pub mod builder;
pub mod sanitize;
pub mod types;

// Re-export main types
pub use builder::{build_quarantined_prompt, system_instruction};
pub use sanitize::{is_injection_line, neutralize, REDACTION_MARKER};
pub use types::{ContextSource, QuarantineMetadata, QuarantinedPrompt};
