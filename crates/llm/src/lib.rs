//! Generation collaborator for the grounded workspace.
//!
//! This crate provides a provider-agnostic abstraction for the language
//! generation step. A request always carries three separate parts (system
//! instruction, quarantined evidence context, user question) plus a
//! deterministic-vs-creative mode flag; providers map those parts onto
//! distinct messages and never concatenate them.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//!
//! # Example
//! ```no_run
//! use grounded_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//! use grounded_core::GenerationMode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What is the capital of France?", "llama3.2")
//!     .with_system("Answer only from the context.")
//!     .with_context("<untrusted_context>...</untrusted_context>")
//!     .with_mode(GenerationMode::Deterministic);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{complete_with_timeout, LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::OllamaClient;
