//! Generative collaborator backed by Ollama's completion endpoint.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sage_core::{Error, GenerationConfig, GenerationProvider, Passage, Result};
use serde::{Deserialize, Serialize};

/// System prompt keeping answers grounded in the retrieved passages.
const SYSTEM_PROMPT: &str = "You answer questions using only the provided context passages. \
    Cite the source titles you drew from. If the passages do not contain the answer, say so.";

/// Ollama API request for generation.
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    /// Model to use for generation.
    model: String,
    /// Input prompt for the model.
    prompt: String,
    /// Optional system prompt.
    system: Option<String>,
    /// Streaming disabled; the whole answer arrives at once.
    stream: bool,
}

/// Ollama API response for generation.
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    /// Generated answer text.
    response: String,
}

/// Generation provider using Ollama over plain HTTP.
pub struct OllamaGenerator {
    /// HTTP client with the configured timeout applied.
    client: Client,
    /// Ollama endpoint URL.
    base_url: String,
    /// Generation model name.
    model: String,
}

impl OllamaGenerator {
    /// Creates a generator for the endpoint and model in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.ollama_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
        })
    }

    /// Builds the grounded prompt: labeled passages, then the question.
    fn build_prompt(question: &str, passages: &[Passage]) -> Result<String> {
        let mut prompt = String::from("Context passages:\n");
        for passage in passages {
            write!(prompt, "\n--- {} ---\n{}\n", passage.source_title, passage.content)
                .map_err(|_| Error::Other("failed to write prompt".to_owned()))?;
        }
        write!(prompt, "\nQuestion: {question}")
            .map_err(|_| Error::Other("failed to write prompt".to_owned()))?;
        Ok(prompt)
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .is_ok()
    }

    async fn generate(&self, question: &str, passages: &[Passage]) -> Result<String> {
        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: Self::build_prompt(question, passages)?,
            system: Some(SYSTEM_PROMPT.to_owned()),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|error| Error::Provider(format!("Ollama request failed: {error}")))?;

        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "Ollama returned error: {}",
                response.status()
            )));
        }

        let body: OllamaGenerateResponse = response.json().await.map_err(|error| {
            Error::Provider(format!("Failed to parse Ollama response: {error}"))
        })?;

        Ok(body.response)
    }
}
