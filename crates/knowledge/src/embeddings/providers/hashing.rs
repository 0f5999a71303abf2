//! Feature-hashing embedder for offline runs.

use crate::embeddings::provider::EmbeddingProvider;
use crate::text::{tokenize, StopTerms};
use grounded_core::{AppError, AppResult};
use std::collections::BTreeMap;

/// Deterministic content-aware vectors with no model behind them.
///
/// Each content term is hashed into one bucket, and its character trigrams
/// into further buckets, then the vector is L2-normalized. Texts that share
/// terms land close together, which is enough to rank passages in offline
/// mode and in tests.
#[derive(Debug)]
pub struct HashingProvider {
    dimensions: usize,
    stop_terms: StopTerms,
}

impl HashingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            stop_terms: StopTerms::default(),
        }
    }

    fn bucket(&self, feature: &str, seed: u64) -> usize {
        let hash = feature
            .bytes()
            .fold(seed, |acc, b| acc.wrapping_mul(seed).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn embed_text(&self, text: &str) -> AppResult<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(AppError::Embedding(
                "Hashing provider needs at least one dimension".to_string(),
            ));
        }

        let mut freq: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokenize(text) {
            if !self.stop_terms.contains(&token) {
                *freq.entry(token).or_insert(0) += 1;
            }
        }
        // All stop terms: fall back to every token so the vector is not zero
        if freq.is_empty() {
            for token in tokenize(text) {
                *freq.entry(token).or_insert(0) += 1;
            }
        }
        if freq.is_empty() {
            return Err(AppError::Embedding(
                "Cannot embed text without any words".to_string(),
            ));
        }

        let mut embedding = vec![0.0f32; self.dimensions];
        for (term, count) in &freq {
            embedding[self.bucket(term, 31)] += *count as f32;

            let chars: Vec<char> = term.chars().collect();
            for trigram in chars.windows(3) {
                let trigram: String = trigram.iter().collect();
                embedding[self.bucket(&trigram, 37)] += (*count as f32).sqrt();
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in embedding.iter_mut() {
                *x /= norm;
            }
        }

        Ok(embedding)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    fn provider_name(&self) -> &str {
        "hashing"
    }

    fn model_name(&self) -> &str {
        "hashing-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed_text(text)).collect()
    }
}
