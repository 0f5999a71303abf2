//! Grounded answering over retrieved evidence.
//!
//! Answers are produced by a generation collaborator or salvaged straight
//! from evidence, attributed sentence by sentence, then judged for
//! answerability. A non-answerable answer is replaced with fixed text.

pub mod answerability;
pub mod ask;
pub mod attribution;
pub mod salvage;
pub mod segment;
pub mod sources;
pub mod types;

pub use answerability::{expresses_uncertainty, fallback_answer};
pub use ask::AnswerService;
pub use attribution::CitationEngine;
pub use sources::{DefaultSourceFormatter, SnippetSourceFormatter, SourceFormatter};
pub use types::{
    AnswerOrigin, AnswerUnit, Answerability, AskDiagnostics, AskRequest, EvidenceRef,
    GenerationReport, RagResponse, ReasonCode,
};
