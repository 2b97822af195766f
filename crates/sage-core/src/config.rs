//! Configuration for chunking, embedding, storage, and retrieval.
//!
//! Every tunable the engine consults lives here; nothing numeric is baked
//! into control flow. Thresholds in particular are caller-supplied
//! configuration, not load-bearing constants.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Env var overriding the Ollama endpoint.
const ENV_OLLAMA_URL: &str = "SAGE_OLLAMA_URL";
/// Env var overriding the remote index endpoint.
const ENV_REMOTE_INDEX_URL: &str = "SAGE_REMOTE_INDEX_URL";

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SageConfig {
    /// Chunking parameters.
    pub chunking: ChunkingConfig,
    /// Embedding pipeline parameters.
    pub embedding: EmbeddingConfig,
    /// Generation collaborator parameters.
    pub generation: GenerationConfig,
    /// Vector store selection and backing paths.
    pub store: StoreConfig,
    /// Retrieval strategy parameters.
    pub retrieval: RetrievalConfig,
}

impl SageConfig {
    /// Loads configuration from a TOML file, falling back to defaults when
    /// the file does not exist, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment-variable overrides for provider endpoints.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var(ENV_OLLAMA_URL) {
            self.embedding.ollama_url.clone_from(&url);
            self.generation.ollama_url = url;
        }
        if let Ok(url) = env::var(ENV_REMOTE_INDEX_URL) {
            self.store.remote_url = Some(url);
        }
    }
}

/// Parameters for the document chunker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in estimated tokens.
    pub target_tokens: usize,
    /// Number of trailing words carried into the next chunk.
    pub overlap_words: usize,
    /// Minimum chunk length in characters after trimming.
    pub min_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: 400,
            overlap_words: 40,
            min_chunk_chars: 50,
        }
    }
}

/// Parameters for the batched embedding pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model name.
    pub model: String,
    /// Ollama endpoint URL.
    pub ollama_url: String,
    /// Number of texts embedded concurrently per batch.
    pub batch_size: usize,
    /// Cooldown between batches, in milliseconds, for rate-limit compliance.
    pub batch_delay_ms: u64,
    /// Maximum retry attempts for retryable provider errors.
    pub max_retries: usize,
    /// Backoff base per retry attempt, in milliseconds; attempt N waits
    /// N times this.
    pub retry_backoff_ms: u64,
    /// Timeout per provider call, in seconds.
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_owned(),
            ollama_url: "http://localhost:11434".to_owned(),
            batch_size: 8,
            batch_delay_ms: 200,
            max_retries: 2,
            retry_backoff_ms: 250,
            timeout_seconds: 30,
        }
    }
}

/// Parameters for the generative collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Generation model name.
    pub model: String,
    /// Ollama endpoint URL.
    pub ollama_url: String,
    /// Timeout per generation call, in seconds.
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "qwen2.5:7b".to_owned(),
            ollama_url: "http://localhost:11434".to_owned(),
            timeout_seconds: 120,
        }
    }
}

/// Which vector store strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-memory linear scan with a flat snapshot file.
    Memory,
    /// Remote ANN-capable index reached over HTTP.
    Remote,
}

/// Vector store selection and backing locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Selected strategy.
    pub backend: StoreBackend,
    /// Snapshot file for the memory backend.
    pub snapshot_path: PathBuf,
    /// Endpoint for the remote backend.
    pub remote_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            snapshot_path: PathBuf::from(".sage").join("corpus.bin"),
            remote_url: None,
        }
    }
}

/// One step of the progressive threshold-relaxation search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchStep {
    /// Minimum cosine similarity for this step.
    pub threshold: f32,
    /// Result cap for this step.
    pub limit: usize,
}

/// Parameters for the retrieval orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Descending (threshold, cap) steps tried until one yields results.
    pub steps: Vec<SearchStep>,
    /// Final result count passed downstream once a step succeeds.
    pub top_k: usize,
    /// Maximum accepted question length in characters.
    pub max_question_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            steps: vec![
                SearchStep {
                    threshold: 0.30,
                    limit: 10,
                },
                SearchStep {
                    threshold: 0.20,
                    limit: 15,
                },
                SearchStep {
                    threshold: 0.10,
                    limit: 20,
                },
            ],
            top_k: 5,
            max_question_chars: 1000,
        }
    }
}
