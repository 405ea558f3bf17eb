use async_trait::async_trait;

use crate::error::Result;
use crate::types::SparseVector;

/// Turns text into a (dense, sparse) vector pair. The concrete HTTP client
/// that talks to an embedding service is out of scope here — implementers
/// plug in whatever backend they like behind this trait, the same way the
/// orchestrator only knows about `LlmProvider` and never a concrete HTTP
/// client for the chat model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`, returning the dense vector (length == the store's
    /// configured `embedding_dimension`) and the sparse vector. Callers that
    /// only need dense-only search may pass an empty sparse vector back
    /// from their own query path, but a provider implementation should
    /// return a best-effort sparse vector whenever it can.
    async fn embed(&self, text: &str) -> Result<(Vec<f32>, SparseVector)>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;

    /// Deterministic stub used by store/tool/orchestrator tests: dense
    /// vector is a hash-derived fixed-length fill, sparse vector is a
    /// handful of bag-of-words-style indices derived from word lengths.
    pub struct StubEmbeddingProvider {
        pub dim: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddingProvider {
        async fn embed(&self, text: &str) -> Result<(Vec<f32>, SparseVector)> {
            let seed: u32 = text.bytes().map(|b| b as u32).sum();
            let dense = (0..self.dim)
                .map(|i| ((seed as usize + i) % 997) as f32 / 997.0)
                .collect();
            let mut indices: Vec<u32> = text
                .split_whitespace()
                .enumerate()
                .map(|(i, w)| (i as u32 * 7) + (w.len() as u32))
                .collect();
            indices.sort_unstable();
            indices.dedup();
            let values = vec![1.0; indices.len()];
            Ok((dense, SparseVector { indices, values }))
        }
    }
}
