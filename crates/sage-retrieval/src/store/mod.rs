//! Vector store strategies behind a single polymorphic contract.
//!
//! The orchestrator depends only on the [`VectorStore`] trait; whether
//! vectors live in a flat snapshot scanned in memory or in a remote
//! ANN-capable index is a configuration choice, never a code path.

mod memory;
mod remote;

use async_trait::async_trait;
use sage_core::{Chunk, Result, SearchResult, StoreStats};

pub use memory::MemoryVectorStore;
pub use remote::RemoteVectorStore;

/// Common contract shared by both storage strategies.
///
/// `search` results are sorted descending by similarity with ties broken
/// by insertion order (earlier-ingested chunk first), contain only matches
/// at or above `threshold`, and never exceed `limit`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Writes a set of chunks; idempotent per chunk id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing representation is unavailable or a
    /// chunk's dimensionality does not match the rest of the store.
    async fn upsert_batch(&self, chunks: Vec<Chunk>) -> Result<()>;

    /// Removes all chunks for a source title, returning the removed count.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing representation is unavailable.
    async fn delete_by_source(&self, source_title: &str) -> Result<usize>;

    /// Replaces a source's chunks wholesale.
    ///
    /// Strategies that can do better than delete-then-upsert override this
    /// so readers never observe the source half-replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing representation is unavailable.
    async fn replace_source(&self, source_title: &str, chunks: Vec<Chunk>) -> Result<()> {
        self.delete_by_source(source_title).await?;
        self.upsert_batch(chunks).await
    }

    /// Returns chunks similar to `query_vector` per the ordering contract.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing representation is unavailable. Zero
    /// matches is a valid empty result, never an error.
    async fn search(
        &self,
        query_vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Aggregate statistics over the stored corpus.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing representation is unavailable.
    async fn stats(&self) -> Result<StoreStats>;
}

/// Calculates cosine similarity between two vectors.
///
/// Defined as 0 when either norm is 0 or the lengths differ; division by
/// zero is never performed.
pub fn cosine_similarity(vector_a: &[f32], vector_b: &[f32]) -> f32 {
    if vector_a.len() != vector_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vector_a
        .iter()
        .zip(vector_b.iter())
        .map(|(left, right)| left * right)
        .sum();
    let magnitude_a = vector_a.iter().map(|value| value * value).sum::<f32>().sqrt();
    let magnitude_b = vector_b.iter().map(|value| value * value).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
