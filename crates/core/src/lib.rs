//! Grounded Core Library
//!
//! This crate provides the foundational utilities shared by every crate in
//! the workspace:
//! - Error handling (`AppError`, `AppResult`, typed retrieval/generation failures)
//! - Logging infrastructure
//! - Configuration management
//! - Answer locale

pub mod config;
pub mod error;
pub mod locale;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, GenerationMode};
pub use error::{AppError, AppResult, GenerationError, InputErrorCode, RetrievalError};
pub use locale::{Locale, LocalePreference};
