//! Linear-scan vector store with a flat snapshot file.
//!
//! The whole corpus lives in memory and every query scans it, computing
//! cosine similarity against each stored vector. Cost is
//! O(corpus size x dimension) per query, which is a deliberate
//! simplicity/scale trade-off: acceptable up to low tens of thousands of
//! chunks, at which point the remote strategy takes over.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bincode::config::standard as bincode_config;
use bincode::{Decode, Encode, decode_from_slice, encode_to_vec};
use sage_core::{Chunk, Error, Result, SearchResult, StoreStats};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{VectorStore, cosine_similarity};

/// Snapshot format version; bump on layout changes.
const SNAPSHOT_VERSION: u32 = 1;

/// Whole-corpus snapshot persisted as a single flat file.
#[derive(Debug, Encode, Decode)]
struct CorpusSnapshot {
    /// Version identifier for snapshot invalidation.
    version: u32,
    /// All chunks in insertion order.
    chunks: Vec<Chunk>,
}

/// In-memory corpus with insertion order preserved.
#[derive(Debug, Default)]
struct Corpus {
    /// Chunks in insertion order; order is the search tie-breaker.
    chunks: Vec<Chunk>,
    /// Chunk id to position, for idempotent upserts.
    index_of: HashMap<String, usize>,
}

impl Corpus {
    fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let index_of = chunks
            .iter()
            .enumerate()
            .map(|(position, chunk)| (chunk.id.clone(), position))
            .collect();
        Self { chunks, index_of }
    }

    fn rebuild_index(&mut self) {
        self.index_of = self
            .chunks
            .iter()
            .enumerate()
            .map(|(position, chunk)| (chunk.id.clone(), position))
            .collect();
    }

    /// Dimensionality of the stored vectors, if the corpus is non-empty.
    fn dimension(&self) -> Option<usize> {
        self.chunks.first().map(|chunk| chunk.embedding.len())
    }
}

/// Linear-scan strategy: the entire corpus in memory, queries scan it.
///
/// Ingestion takes the write half of a reader/writer lock and queries take
/// the read half, so a query never observes a half-replaced source.
pub struct MemoryVectorStore {
    /// Read-mostly corpus guarded for concurrent queries vs. ingestion.
    corpus: RwLock<Corpus>,
    /// Snapshot file; `None` keeps the store purely in memory.
    snapshot_path: Option<PathBuf>,
}

impl MemoryVectorStore {
    /// Creates an empty store with no snapshot persistence.
    pub fn new() -> Self {
        Self {
            corpus: RwLock::new(Corpus::default()),
            snapshot_path: None,
        }
    }

    /// Opens a store from an existing snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the snapshot is missing,
    /// unreadable, or has an incompatible version. A missing snapshot on
    /// the read path is an operator error, not an empty corpus.
    pub async fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).await.map_err(|error| {
            Error::StoreUnavailable(format!(
                "cannot read snapshot {}: {error}",
                path.display()
            ))
        })?;
        let chunks = Self::decode_snapshot(&bytes, path)?;
        info!("Loaded {} chunks from {}", chunks.len(), path.display());

        Ok(Self {
            corpus: RwLock::new(Corpus::from_chunks(chunks)),
            snapshot_path: Some(path.to_path_buf()),
        })
    }

    /// Opens a store from a snapshot, or starts empty if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if a snapshot exists but cannot
    /// be read or decoded; an existing corpus is never silently clobbered.
    pub async fn open_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::open(path).await;
        }
        info!("No snapshot at {}, starting empty", path.display());
        Ok(Self {
            corpus: RwLock::new(Corpus::default()),
            snapshot_path: Some(path.to_path_buf()),
        })
    }

    fn decode_snapshot(bytes: &[u8], path: &Path) -> Result<Vec<Chunk>> {
        let (snapshot, _): (CorpusSnapshot, usize) = decode_from_slice(bytes, bincode_config())
            .map_err(|error| {
                Error::StoreUnavailable(format!(
                    "corrupt snapshot {}: {error}",
                    path.display()
                ))
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::StoreUnavailable(format!(
                "snapshot version {} unsupported (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(snapshot.chunks)
    }

    /// Persists the corpus under the currently held write guard.
    async fn save(&self, corpus: &Corpus) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = CorpusSnapshot {
            version: SNAPSHOT_VERSION,
            chunks: corpus.chunks.clone(),
        };
        let bytes = encode_to_vec(&snapshot, bincode_config())
            .map_err(|error| Error::Other(format!("failed to encode snapshot: {error}")))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, bytes).await?;
        debug!(
            "Saved snapshot with {} chunks to {}",
            corpus.chunks.len(),
            path.display()
        );
        Ok(())
    }

    /// Verifies that new chunks match the store's dimensionality.
    fn check_dimension(corpus: &Corpus, chunks: &[Chunk]) -> Result<()> {
        let mut expected = corpus.dimension();
        for chunk in chunks {
            match expected {
                None => expected = Some(chunk.embedding.len()),
                Some(dimension) if dimension != chunk.embedding.len() => {
                    return Err(Error::Config(format!(
                        "chunk {} has dimensionality {}, store holds {dimension}",
                        chunk.id,
                        chunk.embedding.len()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn remove_source(corpus: &mut Corpus, source_title: &str) -> usize {
        let before = corpus.chunks.len();
        corpus
            .chunks
            .retain(|chunk| chunk.metadata.source_title != source_title);
        let removed = before - corpus.chunks.len();
        if removed > 0 {
            corpus.rebuild_index();
        }
        removed
    }

    fn insert_chunks(corpus: &mut Corpus, chunks: Vec<Chunk>) {
        for chunk in chunks {
            if let Some(&position) = corpus.index_of.get(&chunk.id) {
                // Idempotent overwrite keeps the original insertion slot.
                corpus.chunks[position] = chunk;
            } else {
                corpus.index_of.insert(chunk.id.clone(), corpus.chunks.len());
                corpus.chunks.push(chunk);
            }
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, chunks: Vec<Chunk>) -> Result<()> {
        let mut corpus = self.corpus.write().await;
        Self::check_dimension(&corpus, &chunks)?;
        Self::insert_chunks(&mut corpus, chunks);
        self.save(&corpus).await
    }

    async fn delete_by_source(&self, source_title: &str) -> Result<usize> {
        let mut corpus = self.corpus.write().await;
        let removed = Self::remove_source(&mut corpus, source_title);
        if removed > 0 {
            self.save(&corpus).await?;
        }
        Ok(removed)
    }

    async fn replace_source(&self, source_title: &str, chunks: Vec<Chunk>) -> Result<()> {
        // Delete and insert under one write guard so concurrent readers
        // see either the old source or the new one, never a mix.
        let mut corpus = self.corpus.write().await;
        Self::check_dimension(&corpus, &chunks)?;
        let removed = Self::remove_source(&mut corpus, source_title);
        Self::insert_chunks(&mut corpus, chunks);
        debug!(
            "Replaced source '{source_title}': {removed} chunks out, {} in",
            corpus
                .chunks
                .iter()
                .filter(|chunk| chunk.metadata.source_title == source_title)
                .count()
        );
        self.save(&corpus).await
    }

    async fn search(
        &self,
        query_vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let corpus = self.corpus.read().await;

        let mut scored: Vec<(usize, f32)> = corpus
            .chunks
            .iter()
            .enumerate()
            .map(|(position, chunk)| (position, cosine_similarity(query_vector, &chunk.embedding)))
            .filter(|&(_, similarity)| similarity >= threshold)
            .collect();

        // Descending by similarity, insertion order breaks ties.
        scored.sort_by(|first, second| {
            second
                .1
                .partial_cmp(&first.1)
                .unwrap_or(core::cmp::Ordering::Equal)
                .then_with(|| first.0.cmp(&second.0))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(position, similarity)| SearchResult {
                chunk: corpus.chunks[position].clone(),
                similarity,
            })
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let corpus = self.corpus.read().await;
        let mut stats = StoreStats {
            total_chunks: corpus.chunks.len(),
            ..StoreStats::default()
        };
        for chunk in &corpus.chunks {
            *stats
                .per_source
                .entry(chunk.metadata.source_title.clone())
                .or_insert(0) += 1;
        }
        stats.total_sources = stats.per_source.len();
        Ok(stats)
    }
}
