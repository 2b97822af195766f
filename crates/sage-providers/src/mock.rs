//! Deterministic mock providers for tests and offline smoke runs.
//!
//! The mock embedding is hash-based: the same text always maps to the
//! same vector, so similarity comparisons are reproducible without a
//! model. Specific texts can be pinned to explicit vectors or made to
//! fail, and call history is recorded for verification.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash as _, Hasher as _};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use sage_core::{Embedding, EmbeddingProvider, Error, GenerationProvider, Passage, Result};

/// Deterministic embedding provider with no external dependency.
pub struct MockEmbedding {
    /// Dimensionality of produced vectors.
    dimension: usize,
    /// Explicit vectors pinned to specific texts.
    responses: Mutex<HashMap<String, Embedding>>,
    /// Texts whose embedding always fails.
    fail_on: Mutex<HashSet<String>>,
    /// Every text embedded, in call order.
    call_history: Mutex<Vec<String>>,
}

impl MockEmbedding {
    /// Creates a provider producing vectors of the given dimensionality.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            responses: Mutex::new(HashMap::new()),
            fail_on: Mutex::new(HashSet::new()),
            call_history: Mutex::new(Vec::new()),
        }
    }

    /// Pins `text` to an explicit vector.
    #[must_use]
    pub fn with_vector(self, text: impl Into<String>, vector: Embedding) -> Self {
        {
            let mut responses = self
                .responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            responses.insert(text.into(), vector);
        }
        self
    }

    /// Makes embedding `text` fail permanently.
    #[must_use]
    pub fn with_failure(self, text: impl Into<String>) -> Self {
        {
            let mut fail_on = self.fail_on.lock().unwrap_or_else(PoisonError::into_inner);
            fail_on.insert(text.into());
        }
        self
    }

    /// Number of embed calls made.
    pub fn call_count(&self) -> usize {
        self.call_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every text embedded so far, in order.
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deterministic hash-based embedding for `text`.
    ///
    /// Public so tests can predict what the provider will produce.
    pub fn hash_embedding(text: &str, dimension: usize) -> Embedding {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();

        (0..dimension)
            .map(|index| ((hash.wrapping_add(index as u64)) % 1000) as f32 / 1000.0)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        {
            let mut history = self
                .call_history
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            history.push(text.to_owned());
        }

        {
            let fail_on = self.fail_on.lock().unwrap_or_else(PoisonError::into_inner);
            if fail_on.contains(text) {
                let label: String = text.chars().take(32).collect();
                return Err(Error::Embedding(format!("mock failure for '{label}'")));
            }
        }

        let responses = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(vector) = responses.get(text) {
            return Ok(vector.clone());
        }
        Ok(Self::hash_embedding(text, self.dimension))
    }
}

/// Generation provider returning canned answers.
pub struct MockGenerator {
    /// Answer returned for every call, or a summary if unset.
    default_response: Mutex<Option<String>>,
    /// Every question asked, in call order.
    call_history: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Creates a generator that summarizes its inputs.
    pub fn new() -> Self {
        Self {
            default_response: Mutex::new(None),
            call_history: Mutex::new(Vec::new()),
        }
    }

    /// Sets a fixed answer for every call.
    #[must_use]
    pub fn with_response(self, response: impl Into<String>) -> Self {
        {
            let mut default = self
                .default_response
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *default = Some(response.into());
        }
        self
    }

    /// Number of generate calls made.
    pub fn call_count(&self) -> usize {
        self.call_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationProvider for MockGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, question: &str, passages: &[Passage]) -> Result<String> {
        {
            let mut history = self
                .call_history
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            history.push(question.to_owned());
        }

        let default = self
            .default_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(response) = default.as_ref() {
            return Ok(response.clone());
        }

        let sources: Vec<&str> = passages
            .iter()
            .map(|passage| passage.source_title.as_str())
            .collect();
        Ok(format!(
            "Grounded answer to '{question}' from {} passages ({})",
            passages.len(),
            sources.join(", ")
        ))
    }
}
