//! Remote-index strategy delegating similarity search over HTTP.
//!
//! The store side is purely translation: request shaping, response
//! normalization, and error mapping. Transport failures surface as
//! [`Error::StoreUnavailable`], which callers must distinguish from a
//! reachable index that simply reports zero matches.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use sage_core::{Chunk, ChunkMetadata, Error, Result, SearchResult, StoreStats};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::VectorStore;

/// Search request sent to the remote index.
#[derive(Debug, Serialize)]
struct RemoteSearchRequest<'query> {
    /// Query embedding.
    query_vector: &'query [f32],
    /// Minimum similarity.
    threshold: f32,
    /// Result cap.
    limit: usize,
}

/// One hit returned by the remote index.
#[derive(Debug, Deserialize)]
struct RemoteHit {
    /// Chunk identifier.
    id: String,
    /// Passage text.
    content: String,
    /// Source document title.
    source_title: String,
    /// Chunk position within its source.
    chunk_index: usize,
    /// Approximate token count.
    #[serde(default)]
    estimated_token_count: usize,
    /// Stored embedding; some indexes omit it from search responses.
    #[serde(default)]
    embedding: Vec<f32>,
    /// Similarity reported by the index.
    similarity: f32,
}

/// Search response envelope.
#[derive(Debug, Deserialize)]
struct RemoteSearchResponse {
    /// Matches, provider-ordered.
    results: Vec<RemoteHit>,
}

/// Deletion response envelope.
#[derive(Debug, Deserialize)]
struct RemoteDeleteResponse {
    /// Number of chunks the index removed.
    #[serde(default)]
    deleted: usize,
}

/// Remote-index strategy: the nearest-neighbor computation happens in an
/// external service; this store only speaks its wire format.
pub struct RemoteVectorStore {
    /// HTTP client with the caller-supplied timeout applied.
    client: Client,
    /// Index service base URL.
    base_url: String,
}

impl RemoteVectorStore {
    /// Creates a store for the index service at `base_url`.
    ///
    /// Every call is bounded by `timeout` so one slow index call cannot
    /// hang the retrieval path indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Maps a transport-level failure onto store unavailability.
    fn unavailable(context: &str, error: &reqwest::Error) -> Error {
        Error::StoreUnavailable(format!("{context}: {error}"))
    }

    /// Builds the per-source endpoint URL with the title as one path
    /// segment.
    ///
    /// Titles are arbitrary text; percent-encoding the segment keeps a
    /// `#` or `?` in a title from being parsed as a fragment or query and
    /// landing the request on a different source's path.
    fn source_url(&self, source_title: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|error| {
            Error::StoreUnavailable(format!("invalid index URL {}: {error}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                Error::StoreUnavailable(format!(
                    "index URL {} cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push("sources")
            .push(source_title);
        Ok(url)
    }

    /// Rejects non-success statuses as unavailability.
    fn check_status(context: &str, response: &reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::StoreUnavailable(format!(
                "{context}: index returned {}",
                response.status()
            )))
        }
    }

    /// Normalizes a provider hit onto the engine's result shape.
    fn normalize(hit: RemoteHit) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                id: hit.id,
                content: hit.content,
                embedding: hit.embedding,
                metadata: ChunkMetadata {
                    source_title: hit.source_title,
                    chunk_index: hit.chunk_index,
                    estimated_token_count: hit.estimated_token_count,
                    extra: BTreeMap::new(),
                },
            },
            similarity: hit.similarity.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl VectorStore for RemoteVectorStore {
    async fn upsert_batch(&self, chunks: Vec<Chunk>) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/chunks", self.base_url))
            .json(&chunks)
            .send()
            .await
            .map_err(|error| Self::unavailable("upsert failed", &error))?;
        Self::check_status("upsert failed", &response)
    }

    async fn delete_by_source(&self, source_title: &str) -> Result<usize> {
        let response = self
            .client
            .delete(self.source_url(source_title)?)
            .send()
            .await
            .map_err(|error| Self::unavailable("delete failed", &error))?;
        Self::check_status("delete failed", &response)?;

        let body: RemoteDeleteResponse = response
            .json()
            .await
            .map_err(|error| Self::unavailable("delete response malformed", &error))?;
        Ok(body.deleted)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let request = RemoteSearchRequest {
            query_vector,
            threshold,
            limit,
        };
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|error| Self::unavailable("search failed", &error))?;
        Self::check_status("search failed", &response)?;

        let body: RemoteSearchResponse = response
            .json()
            .await
            .map_err(|error| Self::unavailable("search response malformed", &error))?;
        debug!("Remote index returned {} hits", body.results.len());

        // Re-enforce the contract locally: provider ordering and threshold
        // handling vary, but callers see one behavior for both strategies.
        let mut results: Vec<SearchResult> = body
            .results
            .into_iter()
            .map(Self::normalize)
            .filter(|result| result.similarity >= threshold)
            .collect();
        results.sort_by(|first, second| {
            second
                .similarity
                .partial_cmp(&first.similarity)
                .unwrap_or(core::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let response = self
            .client
            .get(format!("{}/stats", self.base_url))
            .send()
            .await
            .map_err(|error| Self::unavailable("stats failed", &error))?;
        Self::check_status("stats failed", &response)?;

        response
            .json()
            .await
            .map_err(|error| Self::unavailable("stats response malformed", &error))
    }
}
