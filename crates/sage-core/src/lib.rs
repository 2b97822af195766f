//! Shared types, errors, configuration, and provider traits for the sage
//! retrieval engine.
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

pub mod config;
mod error;
mod traits;
mod types;

pub use config::{
    ChunkingConfig, EmbeddingConfig, GenerationConfig, RetrievalConfig, SageConfig, SearchStep,
    StoreBackend, StoreConfig,
};
pub use error::{Error, Result};
pub use traits::{EmbeddingProvider, GenerationProvider};
pub use types::{Chunk, ChunkMetadata, Citation, Embedding, Passage, SearchResult, StoreStats};
