//! Concrete provider handles for embedding and generation.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Test allows"
    )
)]

mod generation;
mod mock;
mod ollama;

pub use generation::OllamaGenerator;
pub use mock::{MockEmbedding, MockGenerator};
pub use ollama::OllamaEmbedding;
