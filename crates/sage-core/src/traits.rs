use async_trait::async_trait;

use crate::{Embedding, Passage, Result};

/// Trait for external embedding providers.
///
/// A provider converts one text into one fixed-length vector; batching,
/// concurrency, and retry policy live in the engine, not here. Handles are
/// constructed once at startup and passed by reference into the ingestion
/// and retrieval components.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the unique identifier for this provider.
    fn name(&self) -> &'static str;

    /// Checks whether the provider is reachable and its model is loaded.
    async fn is_available(&self) -> bool;

    /// Generates the embedding vector for a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable, rejects the
    /// request, or returns a malformed response.
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Trait for the generative-model collaborator.
///
/// Consumes the question plus ranked passages labeled with their source
/// titles and returns free-text answer prose. The collaborator is fallible;
/// its failure must never corrupt retrieval state.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the unique identifier for this provider.
    fn name(&self) -> &'static str;

    /// Checks whether the provider is currently available.
    async fn is_available(&self) -> bool;

    /// Generates an answer to `question` grounded in `passages`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unavailable or the response
    /// cannot be parsed.
    async fn generate(&self, question: &str, passages: &[Passage]) -> Result<String>;
}
