//! Domain types shared across the retrieval engine.

use std::collections::BTreeMap;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A single embedding vector.
pub type Embedding = Vec<f32>;

/// Provenance and sizing metadata attached to every chunk.
///
/// Required fields are fixed; provider-specific or future fields go in
/// `extra` rather than an untyped bag threaded through core logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ChunkMetadata {
    /// Title of the source document this chunk came from.
    pub source_title: String,
    /// Position of this chunk within its source, contiguous from 0.
    pub chunk_index: usize,
    /// Approximate token count of the chunk content.
    pub estimated_token_count: usize,
    /// Optional extension fields (provider-specific annotations).
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// A bounded passage of source text plus its embedding and provenance.
///
/// Chunks are created exclusively by the ingestion pipeline and are
/// immutable once written; a source is only ever replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Chunk {
    /// Deterministic identifier derived from source title and chunk index.
    pub id: String,
    /// Passage text.
    pub content: String,
    /// Embedding vector; dimensionality is uniform across a store.
    pub embedding: Embedding,
    /// Provenance metadata.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Derives the deterministic chunk id for a source title and index.
    ///
    /// Re-ingesting the same document produces identical identifiers, so
    /// repeated upserts overwrite rather than duplicate.
    pub fn derive_id(source_title: &str, chunk_index: usize) -> String {
        format!("{source_title}#{chunk_index}")
    }
}

/// A chunk matched against a query, scored by cosine similarity.
///
/// Derived at query time, never persisted.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query vector.
    pub similarity: f32,
}

/// Aggregate statistics over a vector store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Total number of chunks in the store.
    pub total_chunks: usize,
    /// Number of distinct source titles.
    pub total_sources: usize,
    /// Chunk count per source title.
    pub per_source: BTreeMap<String, usize>,
}

/// A ranked passage handed to the generative collaborator.
#[derive(Debug, Clone)]
pub struct Passage {
    /// Title of the source document, for citation.
    pub source_title: String,
    /// Passage text.
    pub content: String,
}

/// A citation attached to an answer.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    /// Source document title.
    pub source_title: String,
    /// Chunk index within the source.
    pub chunk_index: usize,
    /// Similarity to the question, as a rounded percentage.
    pub similarity_percent: u32,
    /// Short preview of the cited passage.
    pub preview: String,
}
