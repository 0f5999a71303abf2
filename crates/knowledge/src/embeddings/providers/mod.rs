pub mod hashing;
pub mod ollama;
