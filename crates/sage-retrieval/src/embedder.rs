//! Batched embedding pipeline over an injected provider.
//!
//! The provider converts one text into one vector; this module owns
//! batching, within-batch concurrency, the inter-batch cooldown, per-call
//! timeouts, bounded retry for transient failures, and uniform
//! dimensionality enforcement.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use sage_core::{Embedding, EmbeddingConfig, EmbeddingProvider, Error, Result};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Outcome of embedding a batch of texts.
///
/// `embeddings` is parallel to the input: `None` marks an item whose
/// embedding failed and was excluded. Callers detect partial failure by
/// `produced() < embeddings.len()`.
#[derive(Debug)]
pub struct EmbedOutcome {
    /// One slot per input text, in input order.
    pub embeddings: Vec<Option<Embedding>>,
    /// Number of items that failed permanently.
    pub failed: usize,
    /// Dimensionality of the produced vectors, if any were produced.
    pub dimension: Option<usize>,
}

impl EmbedOutcome {
    /// Number of vectors actually produced.
    pub fn produced(&self) -> usize {
        self.embeddings.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Order-preserving batched embedder.
#[derive(Clone)]
pub struct Embedder {
    /// External embedding provider handle, constructed once at startup.
    provider: Arc<dyn EmbeddingProvider>,
    /// Batching, retry, and timeout parameters.
    config: EmbeddingConfig,
}

impl Embedder {
    /// Creates an embedder over the given provider handle.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Self {
        Self { provider, config }
    }

    /// Checks that the underlying provider is reachable.
    pub async fn is_available(&self) -> bool {
        self.provider.is_available().await
    }

    /// Embeds `texts`, one vector per input, order-preserving.
    ///
    /// Inputs are processed in fixed-size batches; calls within a batch run
    /// concurrently, and a cooldown delay separates batches to respect
    /// provider rate limits. A single item's failure does not abort the
    /// batch; the item is logged and excluded.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions: a provider response with
    /// mismatched dimensionality is a configuration error, never a
    /// per-item failure.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<EmbedOutcome> {
        let batch_size = self.config.batch_size.max(1);
        let mut embeddings: Vec<Option<Embedding>> = Vec::with_capacity(texts.len());
        let mut failed = 0_usize;
        let mut dimension: Option<usize> = None;

        let batch_count = texts.len().div_ceil(batch_size);
        for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
            debug!(
                "Embedding batch {}/{} ({} texts)",
                batch_index + 1,
                batch_count,
                batch.len()
            );

            let results = join_all(batch.iter().map(|text| self.embed_with_retry(text))).await;

            for result in results {
                match result {
                    Ok(vector) => {
                        match dimension {
                            None => dimension = Some(vector.len()),
                            Some(expected) if expected != vector.len() => {
                                return Err(Error::Config(format!(
                                    "embedding dimensionality mismatch: expected {expected}, got {}",
                                    vector.len()
                                )));
                            }
                            Some(_) => {}
                        }
                        embeddings.push(Some(vector));
                    }
                    Err(error) => {
                        warn!("Embedding failed for one item, excluding it: {error}");
                        embeddings.push(None);
                        failed += 1;
                    }
                }
            }

            // Cooldown between batches, not after the last one.
            if batch_index + 1 < batch_count && self.config.batch_delay_ms > 0 {
                sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        Ok(EmbedOutcome {
            embeddings,
            failed,
            dimension,
        })
    }

    /// Embeds a single query text.
    ///
    /// Same operation as [`Self::embed_texts`] invoked with a batch of
    /// size 1; there is no special-cased query path.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails; a query embedding cannot be
    /// silently excluded the way a corpus item can.
    pub async fn embed_query(&self, text: &str) -> Result<Embedding> {
        let query = [text.to_owned()];
        let outcome = self.embed_texts(&query).await?;
        outcome
            .embeddings
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| Error::Embedding("query embedding failed".to_owned()))
    }

    /// Embeds one text with a per-call timeout and bounded retry.
    ///
    /// Only retryable errors (network, rate limit) are retried; permanent
    /// failures (auth, malformed input) propagate immediately.
    async fn embed_with_retry(&self, text: &str) -> Result<Embedding> {
        let call_timeout = Duration::from_secs(self.config.timeout_seconds);
        let mut attempt = 0_usize;

        loop {
            let result = match timeout(call_timeout, self.provider.embed(text)).await {
                Ok(inner) => inner,
                Err(_) => Err(Error::Provider(format!(
                    "embedding call timed out after {}s",
                    self.config.timeout_seconds
                ))),
            };

            match result {
                Ok(vector) => return Ok(vector),
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff =
                        Duration::from_millis(self.config.retry_backoff_ms * attempt as u64);
                    warn!(
                        "Embedding attempt {attempt} failed ({error}), retrying in {}ms",
                        backoff.as_millis()
                    );
                    sleep(backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that fails specific texts, optionally only transiently.
    struct ScriptedProvider {
        dimension: usize,
        available: bool,
        fail_always: Vec<String>,
        fail_once: Mutex<Vec<String>>,
        calls: AtomicUsize,
        mismatched: Option<String>,
    }

    impl ScriptedProvider {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                available: true,
                fail_always: Vec::new(),
                fail_once: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                mismatched: None,
            }
        }

        fn vector_for(&self, text: &str, dimension: usize) -> Vec<f32> {
            let seed = text.len() as f32;
            (0..dimension).map(|index| seed + index as f32).collect()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_always.iter().any(|bad| bad == text) {
                return Err(Error::Embedding(format!("permanent failure for {text}")));
            }
            {
                let mut transient = self.fail_once.lock().unwrap();
                if let Some(position) = transient.iter().position(|bad| bad == text) {
                    transient.remove(position);
                    return Err(Error::RateLimited("slow down".to_owned()));
                }
            }
            if self.mismatched.as_deref() == Some(text) {
                return Ok(self.vector_for(text, self.dimension + 1));
            }
            Ok(self.vector_for(text, self.dimension))
        }
    }

    fn fast_config(batch_size: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            batch_size,
            batch_delay_ms: 0,
            max_retries: 2,
            retry_backoff_ms: 1,
            timeout_seconds: 5,
            ..EmbeddingConfig::default()
        }
    }

    fn texts(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|label| (*label).to_owned()).collect()
    }

    #[tokio::test]
    async fn test_order_preserved_across_batches() {
        let provider = Arc::new(ScriptedProvider::new(4));
        let embedder = Embedder::new(provider.clone(), fast_config(2));

        let inputs = texts(&["a", "bb", "ccc", "dddd", "eeeee"]);
        let outcome = embedder.embed_texts(&inputs).await.unwrap();

        assert_eq!(outcome.embeddings.len(), 5);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.dimension, Some(4));
        for (input, slot) in inputs.iter().zip(&outcome.embeddings) {
            let vector = slot.as_ref().unwrap();
            assert!((vector[0] - input.len() as f32).abs() < f32::EPSILON);
        }
    }

    #[tokio::test]
    async fn test_single_failure_does_not_abort_batch() {
        let mut provider = ScriptedProvider::new(4);
        provider.fail_always.push("bad".to_owned());
        let embedder = Embedder::new(Arc::new(provider), fast_config(3));

        let inputs = texts(&["good", "bad", "fine"]);
        let outcome = embedder.embed_texts(&inputs).await.unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.produced(), 2);
        assert!(outcome.embeddings[0].is_some());
        assert!(outcome.embeddings[1].is_none());
        assert!(outcome.embeddings[2].is_some());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let provider = ScriptedProvider::new(4);
        provider
            .fail_once
            .lock()
            .unwrap()
            .push("flaky".to_owned());
        let embedder = Embedder::new(Arc::new(provider), fast_config(2));

        let outcome = embedder.embed_texts(&texts(&["flaky"])).await.unwrap();
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.produced(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_fatal() {
        let mut provider = ScriptedProvider::new(4);
        provider.mismatched = Some("odd".to_owned());
        let embedder = Embedder::new(Arc::new(provider), fast_config(2));

        let result = embedder.embed_texts(&texts(&["normal", "odd"])).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_query_is_batch_of_one() {
        let provider = Arc::new(ScriptedProvider::new(4));
        let embedder = Embedder::new(provider.clone(), fast_config(8));

        let vector = embedder.embed_query("hello").await.unwrap();
        assert_eq!(vector.len(), 4);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_availability_delegates_to_provider() {
        let embedder = Embedder::new(Arc::new(ScriptedProvider::new(4)), fast_config(2));
        assert!(embedder.is_available().await);

        let mut offline = ScriptedProvider::new(4);
        offline.available = false;
        let embedder = Embedder::new(Arc::new(offline), fast_config(2));
        assert!(!embedder.is_available().await);
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let mut provider = ScriptedProvider::new(4);
        provider.fail_always.push("doomed".to_owned());
        let embedder = Embedder::new(Arc::new(provider), fast_config(2));

        let result = embedder.embed_query("doomed").await;
        assert!(matches!(result, Err(Error::Embedding(_))));
    }
}
