//! Ingestion pipeline: chunk, embed, and write a corpus of documents.
//!
//! Sources are processed strictly sequentially to bound provider load;
//! concurrency happens only inside the embedder's batches. One source's
//! failure never aborts the run, and a failed source leaves the store's
//! prior state for that title untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use sage_core::{Chunk, ChunkMetadata, ChunkingConfig, Error, Result};
use tracing::{info, warn};

use crate::chunker;
use crate::embedder::Embedder;
use crate::store::VectorStore;

/// One document handed to the pipeline.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Document title; owns a contiguous range of chunk indices.
    pub title: String,
    /// Raw, un-normalized document text.
    pub raw_text: String,
}

/// Per-source ingestion diagnostics.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    /// Source title.
    pub title: String,
    /// Chunks written for this source.
    pub chunks_written: usize,
    /// Chunk embeddings that failed and were excluded.
    pub failed_chunks: usize,
    /// Error message if the whole source failed.
    pub error: Option<String>,
}

/// Aggregate result of an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Total chunks written across all sources.
    pub chunks_written: usize,
    /// Number of sources that failed entirely.
    pub failed_sources: usize,
    /// Per-source diagnostics in input order.
    pub sources: Vec<SourceOutcome>,
}

/// Orchestrates Chunker -> Embedder -> `VectorStore` for a corpus.
pub struct IngestionPipeline {
    /// Batched embedder.
    embedder: Embedder,
    /// Target store, either strategy.
    store: Arc<dyn VectorStore>,
    /// Chunking parameters.
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    /// Creates a pipeline writing to `store` via `embedder`.
    pub fn new(embedder: Embedder, store: Arc<dyn VectorStore>, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            store,
            chunking,
        }
    }

    /// Ingests `sources`, returning per-source diagnostics.
    ///
    /// With `replace_existing`, each source's previous chunks are replaced
    /// wholesale; readers never observe old and new chunks interleaved.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal conditions only: an unavailable store or
    /// an embedding dimensionality misconfiguration. Per-source embedding
    /// failures are recorded in the report and do not abort the run.
    pub async fn ingest(
        &self,
        sources: Vec<SourceDocument>,
        replace_existing: bool,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for source in sources {
            let outcome = self.ingest_source(&source, replace_existing).await?;
            if outcome.error.is_some() {
                report.failed_sources += 1;
            }
            report.chunks_written += outcome.chunks_written;
            report.sources.push(outcome);
        }

        info!(
            "Ingestion complete: {} chunks written, {} sources failed",
            report.chunks_written, report.failed_sources
        );
        Ok(report)
    }

    /// Ingests a single source, absorbing non-fatal failures.
    async fn ingest_source(
        &self,
        source: &SourceDocument,
        replace_existing: bool,
    ) -> Result<SourceOutcome> {
        let texts = chunker::split(&source.raw_text, &self.chunking);
        info!("Source '{}': {} chunks", source.title, texts.len());

        if texts.is_empty() {
            if replace_existing {
                self.store.delete_by_source(&source.title).await?;
            }
            return Ok(SourceOutcome {
                title: source.title.clone(),
                chunks_written: 0,
                failed_chunks: 0,
                error: None,
            });
        }

        let outcome = match self.embedder.embed_texts(&texts).await {
            Ok(outcome) => outcome,
            // Dimensionality misconfiguration would fail every remaining
            // source too; propagate instead of recording.
            Err(error @ Error::Config(_)) => return Err(error),
            Err(error) => {
                warn!("Source '{}' failed to embed: {error}", source.title);
                return Ok(SourceOutcome {
                    title: source.title.clone(),
                    chunks_written: 0,
                    failed_chunks: texts.len(),
                    error: Some(error.to_string()),
                });
            }
        };

        if outcome.produced() == 0 {
            warn!(
                "Source '{}': every chunk embedding failed, leaving prior state untouched",
                source.title
            );
            return Ok(SourceOutcome {
                title: source.title.clone(),
                chunks_written: 0,
                failed_chunks: outcome.failed,
                error: Some("all chunk embeddings failed".to_owned()),
            });
        }

        // Failed items drop out before index assignment so chunk_index
        // stays contiguous from 0.
        let chunks: Vec<Chunk> = texts
            .iter()
            .zip(outcome.embeddings)
            .filter_map(|(text, slot)| slot.map(|embedding| (text, embedding)))
            .enumerate()
            .map(|(chunk_index, (text, embedding))| Chunk {
                id: Chunk::derive_id(&source.title, chunk_index),
                content: text.clone(),
                embedding,
                metadata: ChunkMetadata {
                    source_title: source.title.clone(),
                    chunk_index,
                    estimated_token_count: chunker::estimate_tokens(text),
                    extra: BTreeMap::new(),
                },
            })
            .collect();

        let written = chunks.len();
        if replace_existing {
            self.store.replace_source(&source.title, chunks).await?;
        } else {
            self.store.upsert_batch(chunks).await?;
        }

        if outcome.failed > 0 {
            warn!(
                "Source '{}': {} chunk embeddings failed and were excluded",
                source.title, outcome.failed
            );
        }

        Ok(SourceOutcome {
            title: source.title.clone(),
            chunks_written: written,
            failed_chunks: outcome.failed,
            error: None,
        })
    }
}
