//! Embedding provider trait and factory.

use super::providers::{hashing::HashingProvider, ollama::OllamaProvider};
use grounded_core::config::EmbeddingConfig;
use grounded_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "ollama", "hashing")
    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Embed several texts, one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Reject vectors a similarity search cannot use.
pub(crate) fn check_vector(vector: &[f32], expected: usize, model: &str) -> AppResult<()> {
    if vector.is_empty() {
        return Err(AppError::Embedding(format!(
            "Model '{}' returned an empty embedding",
            model
        )));
    }
    if vector.len() != expected {
        return Err(AppError::Embedding(format!(
            "Model '{}' returned {} dimensions, expected {}",
            model,
            vector.len(),
            expected
        )));
    }
    if vector.iter().all(|x| *x == 0.0) {
        return Err(AppError::Embedding(format!(
            "Model '{}' returned an all-zero embedding",
            model
        )));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(AppError::Embedding(format!(
            "Model '{}' returned a non-finite embedding",
            model
        )));
    }
    Ok(())
}

/// Create an embedding provider based on configuration.
///
/// The hashing provider is a stand-in for offline runs and is refused unless
/// `embedding.offline` is set.
pub fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.to_lowercase().as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),

        "hashing" if config.offline => Ok(Arc::new(HashingProvider::new(config.dimensions))),

        "hashing" => Err(AppError::Embedding(
            "The hashing provider only runs in offline mode (set embedding.offline or pass --offline)"
                .to_string(),
        )),

        _ => Err(AppError::Embedding(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, hashing",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, offline: bool) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: provider.to_string(),
            model: "test-model".to_string(),
            dimensions: 64,
            endpoint: Some("http://127.0.0.1:9".to_string()),
            offline,
        }
    }

    #[test]
    fn test_create_hashing_provider_offline() {
        let provider = create_provider(&config("hashing", true)).unwrap();
        assert_eq!(provider.provider_name(), "hashing");
        assert_eq!(provider.dimensions(), 64);
    }

    #[test]
    fn test_hashing_refused_online() {
        let err = create_provider(&config("hashing", false)).unwrap_err();
        assert!(err.to_string().contains("offline"));
        assert_eq!(err.code(), "EMBEDDING_FAILURE");
    }

    #[test]
    fn test_create_ollama_provider_does_not_connect() {
        let provider = create_provider(&config("Ollama", false)).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "test-model");
    }

    #[test]
    fn test_create_unknown_provider() {
        let err = create_provider(&config("word2vec", true)).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_check_vector() {
        assert!(check_vector(&[0.1, 0.2], 2, "m").is_ok());
        assert!(check_vector(&[], 2, "m").is_err());
        assert!(check_vector(&[0.0, 0.0], 2, "m").is_err());
        assert!(check_vector(&[0.1], 2, "m").is_err());
        assert!(check_vector(&[f32::NAN, 1.0], 2, "m").is_err());
    }
}
