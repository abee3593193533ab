use async_trait::async_trait;

use crate::error::MemoryError;

/// Maximum characters embedded in a single chunk. Conservative estimate for
/// CJK-heavy text (~1 char ~ 2 tokens) staying well under common embedding
/// context limits.
pub const MAX_CHARS_PER_CHUNK: usize = 2500;

/// Backend-agnostic text-embedding call. `DecisionMemoryStore` wraps this in
/// chunk-and-average handling for texts over `MAX_CHARS_PER_CHUNK`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, MemoryError>;

    fn dimension(&self) -> usize;
}

/// Embeds `text`, chunking and averaging per-chunk embeddings when it
/// exceeds `MAX_CHARS_PER_CHUNK`, matching the original embedding call's
/// long-text handling.
pub async fn embed_chunked(
    provider: &dyn EmbeddingProvider,
    text: &str,
) -> Result<Vec<f32>, MemoryError> {
    if text.chars().count() <= MAX_CHARS_PER_CHUNK {
        return provider.embed_one(text).await;
    }

    let chars: Vec<char> = text.chars().collect();
    let mut embeddings = Vec::new();
    for chunk in chars.chunks(MAX_CHARS_PER_CHUNK) {
        let chunk_text: String = chunk.iter().collect();
        embeddings.push(provider.embed_one(&chunk_text).await?);
    }

    let dim = provider.dimension();
    let mut avg = vec![0.0_f32; dim];
    for emb in &embeddings {
        for (i, v) in emb.iter().enumerate() {
            avg[i] += v;
        }
    }
    let n = embeddings.len() as f32;
    for v in avg.iter_mut() {
        *v /= n;
    }
    Ok(avg)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Deterministic embedding provider for tests: hashes overlapping character
/// trigrams into a fixed-size vector. Not semantically meaningful, but
/// stable and self-consistent, which is all the store's unit tests need.
pub struct HashEmbeddingProvider {
    dim: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let mut vec = vec![0.0_f32; self.dim];
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Ok(vec);
        }
        for window in chars.windows(3.min(chars.len())) {
            let mut hasher: u64 = 1469598103934665603;
            for c in window {
                hasher ^= *c as u64;
                hasher = hasher.wrapping_mul(1099511628211);
            }
            let idx = (hasher as usize) % self.dim;
            vec[idx] += 1.0;
        }
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        Ok(vec)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn long_text_chunks_and_averages() {
        let provider = HashEmbeddingProvider::new(16);
        let long_text = "市场震荡".repeat(1000);
        let emb = embed_chunked(&provider, &long_text).await.unwrap();
        assert_eq!(emb.len(), 16);
    }

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }
}
