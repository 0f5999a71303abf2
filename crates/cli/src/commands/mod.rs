//! Command handlers for the grounded CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod doctor;
pub mod import;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use doctor::DoctorCommand;
pub use import::ImportCommand;
