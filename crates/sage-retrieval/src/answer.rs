//! Answer assembly: retrieval results plus the generative collaborator.
//!
//! The collaborator is opaque and fallible: it consumes the question and
//! ranked passages labeled with their source titles and returns free text.
//! Its failure propagates to the caller but never corrupts retrieval
//! state. When retrieval legitimately finds nothing, a graceful message is
//! returned and the collaborator is not invoked at all.

use std::sync::Arc;

use sage_core::{Citation, GenerationProvider, Passage, Result, SearchResult};
use tracing::info;

use crate::retrieve::{Retrieval, RetrievalOrchestrator};

/// Answer returned when no threshold step produced a match.
const NO_GROUNDING_MESSAGE: &str =
    "I couldn't find anything relevant to that question in the ingested documents.";

/// Maximum characters in a citation preview.
const PREVIEW_MAX_CHARS: usize = 160;

/// A grounded answer with its citations.
#[derive(Debug)]
pub struct Answer {
    /// Free-text answer from the collaborator, or the no-grounding message.
    pub text: String,
    /// Citations for the passages the answer is grounded in.
    pub citations: Vec<Citation>,
    /// Aggregate confidence as a rounded percentage.
    pub confidence_percent: u32,
}

/// Ties the retrieval orchestrator to a generation collaborator.
pub struct AnswerEngine {
    /// Retrieval side; owns validation, embedding, and the search loop.
    orchestrator: RetrievalOrchestrator,
    /// Generative collaborator handle.
    generator: Arc<dyn GenerationProvider>,
}

impl AnswerEngine {
    /// Creates an engine over the given orchestrator and collaborator.
    pub fn new(orchestrator: RetrievalOrchestrator, generator: Arc<dyn GenerationProvider>) -> Self {
        Self {
            orchestrator,
            generator,
        }
    }

    /// Answers `question` from the ingested corpus.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid input, embedding or store failure, or
    /// a collaborator failure. A legitimately empty retrieval is answered
    /// gracefully, never surfaced as an error.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let retrieval = self.orchestrator.retrieve(question).await?;

        if retrieval.results.is_empty() {
            return Ok(Answer {
                text: NO_GROUNDING_MESSAGE.to_owned(),
                citations: Vec::new(),
                confidence_percent: 0,
            });
        }

        let confidence_percent = retrieval.confidence_percent();
        let passages = Self::passages(&retrieval);
        let citations = Self::citations(&retrieval);

        info!(
            "Answering with {} passages at {confidence_percent}% confidence",
            passages.len()
        );
        let text = self.generator.generate(question, &passages).await?;

        Ok(Answer {
            text,
            citations,
            confidence_percent,
        })
    }

    /// Labels results with their source titles for the collaborator.
    fn passages(retrieval: &Retrieval) -> Vec<Passage> {
        retrieval
            .results
            .iter()
            .map(|result| Passage {
                source_title: result.chunk.metadata.source_title.clone(),
                content: result.chunk.content.clone(),
            })
            .collect()
    }

    /// Builds user-facing citations from the final results.
    fn citations(retrieval: &Retrieval) -> Vec<Citation> {
        retrieval.results.iter().map(Self::citation).collect()
    }

    fn citation(result: &SearchResult) -> Citation {
        Citation {
            source_title: result.chunk.metadata.source_title.clone(),
            chunk_index: result.chunk.metadata.chunk_index,
            similarity_percent: (result.similarity * 100.0).round().max(0.0) as u32,
            preview: preview(&result.chunk.content, PREVIEW_MAX_CHARS),
        }
    }
}

/// Generates a short preview of a passage, on char boundaries.
pub fn preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        content.to_owned()
    }
}
