//! Retrieval orchestration with progressive threshold relaxation.
//!
//! A strict threshold is tried first; when it yields nothing the loop
//! relaxes through a descending table of (threshold, cap) steps. This
//! compensates for corpora and embedding spaces where strict cutoffs
//! return nothing, while still preferring the tightest threshold that
//! succeeds. Empty results at a step are absorbed; only true provider or
//! store failures surface.

use std::sync::Arc;

use sage_core::{Error, Result, RetrievalConfig, SearchResult};
use tracing::{debug, info};

use crate::embedder::Embedder;
use crate::store::VectorStore;

/// Outcome of a retrieval: ranked passages plus an aggregate confidence.
///
/// An empty result set with confidence 0 means "no grounding available";
/// callers must treat it as a normal outcome, not an error.
#[derive(Debug)]
pub struct Retrieval {
    /// Final ranked results, truncated to the configured top-K.
    pub results: Vec<SearchResult>,
    /// Mean similarity of the final results, as a percentage.
    pub confidence: f32,
}

impl Retrieval {
    /// Confidence rounded to the nearest whole percent, for display.
    pub fn confidence_percent(&self) -> u32 {
        self.confidence.round().max(0.0) as u32
    }
}

/// Orchestrates query embedding and the relaxation search loop.
pub struct RetrievalOrchestrator {
    /// Batched embedder (queries are a batch of one).
    embedder: Embedder,
    /// Store handle, either strategy.
    store: Arc<dyn VectorStore>,
    /// Step table, top-K, and validation limits.
    config: RetrievalConfig,
}

impl RetrievalOrchestrator {
    /// Creates an orchestrator over the given embedder and store.
    pub fn new(embedder: Embedder, store: Arc<dyn VectorStore>, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Validates a question before any external call is made.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty/whitespace-only questions
    /// and for questions over the configured length cap.
    pub fn validate_question(&self, question: &str) -> Result<()> {
        if question.trim().is_empty() {
            return Err(Error::Validation("question is empty".to_owned()));
        }
        let length = question.chars().count();
        if length > self.config.max_question_chars {
            return Err(Error::Validation(format!(
                "question is {length} characters, limit is {}",
                self.config.max_question_chars
            )));
        }
        Ok(())
    }

    /// Retrieves the passages most relevant to `question`.
    ///
    /// The question is embedded once; the relaxation loop is sequential
    /// because each step only runs if the previous one found nothing.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid input, embedding failure, or an
    /// unavailable store. Finding nothing relevant is not an error.
    pub async fn retrieve(&self, question: &str) -> Result<Retrieval> {
        self.validate_question(question)?;
        let query_vector = self.embedder.embed_query(question).await?;

        for step in &self.config.steps {
            let results = self
                .store
                .search(&query_vector, step.threshold, step.limit)
                .await?;

            if results.is_empty() {
                debug!(
                    "No matches at threshold {:.2}, relaxing",
                    step.threshold
                );
                continue;
            }

            info!(
                "Found {} matches at threshold {:.2}",
                results.len(),
                step.threshold
            );
            return Ok(Self::finalize(results, self.config.top_k));
        }

        info!("No relevant content found at any threshold");
        Ok(Retrieval {
            results: Vec::new(),
            confidence: 0.0,
        })
    }

    /// Truncates to the final top-K and computes mean-similarity confidence.
    ///
    /// The wider scan only decided whether relaxing helped; downstream
    /// consumers get the tight head of the ranking.
    fn finalize(mut results: Vec<SearchResult>, top_k: usize) -> Retrieval {
        results.truncate(top_k.max(1));
        let mean: f32 = results
            .iter()
            .map(|result| result.similarity)
            .sum::<f32>()
            / results.len() as f32;

        Retrieval {
            results,
            confidence: mean * 100.0,
        }
    }
}
