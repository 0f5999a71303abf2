//! Query and passage embeddings.
//!
//! The vector signal needs a fixed-dimension vector for the query text. A
//! provider either returns one or fails; it never substitutes an empty or
//! zero vector.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::hashing::HashingProvider;
pub use providers::ollama::OllamaProvider;
