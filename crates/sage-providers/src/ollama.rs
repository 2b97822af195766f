//! Embedding provider backed by a local Ollama runtime.

use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::GenerateEmbeddingsRequest;
use sage_core::{Embedding, EmbeddingConfig, EmbeddingProvider, Error, Result};
use tracing::info;

/// Ollama embedding client.
pub struct OllamaEmbedding {
    /// Ollama API handle.
    ollama: Ollama,
    /// Embedding model name.
    model: String,
}

impl OllamaEmbedding {
    /// Creates a client for the endpoint and model in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configured endpoint is not a
    /// valid URL.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let ollama = Ollama::try_new(config.ollama_url.clone()).map_err(|error| {
            Error::Config(format!(
                "Invalid Ollama URL '{}': {error}",
                config.ollama_url
            ))
        })?;
        Ok(Self {
            ollama,
            model: config.model.clone(),
        })
    }

    /// Ensures the configured embedding model is installed.
    ///
    /// # Errors
    ///
    /// Returns an error if Ollama is unreachable or the model is missing;
    /// the message names the `ollama pull` invocation to fix it.
    pub async fn ensure_model_available(&self) -> Result<()> {
        let models = self.ollama.list_local_models().await.map_err(|error| {
            Error::Provider(format!(
                "Failed to connect to Ollama: {error}.\n\nPlease ensure Ollama is installed and running:\n  - Install from: https://ollama.ai\n  - Start with: ollama serve"
            ))
        })?;

        let model_available = models.iter().any(|model| model.name.contains(&self.model));
        if !model_available {
            return Err(Error::Config(format!(
                "Embedding model '{}' not found. Run: ollama pull {}",
                self.model, self.model
            )));
        }

        info!("Embedding model '{}' is available", self.model);
        Ok(())
    }

    /// Maps an Ollama error, distinguishing missing-model from transport.
    fn map_error(&self, error: &impl core::fmt::Debug) -> Error {
        let error_str = format!("{error:?}");
        if error_str.contains("model") && error_str.contains("not found") {
            Error::Config(format!(
                "Embedding model '{}' not found. Run: ollama pull {}",
                self.model, self.model
            ))
        } else {
            Error::Provider(format!("Embedding generation failed: {error_str}"))
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        self.ollama.list_local_models().await.is_ok()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), text.to_owned().into());

        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| self.map_error(&error))?;

        // Ollama returns one vector per input; we sent one text.
        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embeddings returned".to_owned()))
    }
}
