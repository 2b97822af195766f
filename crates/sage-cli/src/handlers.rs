//! Subcommand handlers wiring configuration, providers, and the engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use sage_core::{SageConfig, StoreBackend};
use sage_providers::{OllamaEmbedding, OllamaGenerator};
use sage_retrieval::{
    AnswerEngine, Embedder, IngestionPipeline, MemoryVectorStore, RemoteVectorStore,
    RetrievalOrchestrator, SourceDocument, VectorStore,
};
use tracing::{info, warn};

/// Request timeout for the remote index backend.
const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a handler needs an existing corpus or may bootstrap one.
#[derive(Clone, Copy)]
enum StoreMode {
    /// Create the snapshot if it does not exist yet.
    Bootstrap,
    /// A missing snapshot is an operator error.
    Existing,
}

/// Builds the configured vector store strategy.
async fn build_store(config: &SageConfig, mode: StoreMode) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            let path = &config.store.snapshot_path;
            let store = match mode {
                StoreMode::Bootstrap => MemoryVectorStore::open_or_create(path).await?,
                StoreMode::Existing => MemoryVectorStore::open(path).await?,
            };
            Ok(Arc::new(store))
        }
        StoreBackend::Remote => {
            let Some(url) = config.store.remote_url.as_deref() else {
                bail!("store.backend = \"remote\" requires store.remote_url to be set");
            };
            Ok(Arc::new(RemoteVectorStore::new(url, REMOTE_TIMEOUT)?))
        }
    }
}

/// Reads `.txt` and `.md` files from `dir`, titled by file stem.
fn read_documents(dir: &Path) -> Result<Vec<SourceDocument>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("cannot read corpus directory {}", dir.display()))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| matches!(extension, "txt" | "md"))
        })
        .collect();
    // Deterministic ingestion order regardless of directory iteration.
    paths.sort();

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(title) = path.file_stem().and_then(|stem| stem.to_str()) else {
            warn!("Skipping {} (non-UTF-8 file name)", path.display());
            continue;
        };
        let raw_text = fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        sources.push(SourceDocument {
            title: title.to_owned(),
            raw_text,
        });
    }
    Ok(sources)
}

/// Handles `sage ingest`.
pub async fn handle_ingest(
    config_path: &Path,
    corpus_dir: &Path,
    keep_existing: bool,
) -> Result<()> {
    let config = SageConfig::load(config_path)?;

    let sources = read_documents(corpus_dir)?;
    if sources.is_empty() {
        bail!("no .txt or .md documents found in {}", corpus_dir.display());
    }
    info!("Ingesting {} documents from {}", sources.len(), corpus_dir.display());

    let provider = OllamaEmbedding::new(&config.embedding)?;
    provider.ensure_model_available().await?;

    let store = build_store(&config, StoreMode::Bootstrap).await?;
    let embedder = Embedder::new(Arc::new(provider), config.embedding.clone());
    let pipeline = IngestionPipeline::new(embedder, store, config.chunking.clone());

    let report = pipeline.ingest(sources, !keep_existing).await?;

    for outcome in &report.sources {
        match &outcome.error {
            Some(error) => println!("  {} FAILED: {error}", outcome.title),
            None if outcome.failed_chunks > 0 => println!(
                "  {}: {} chunks ({} failed to embed)",
                outcome.title, outcome.chunks_written, outcome.failed_chunks
            ),
            None => println!("  {}: {} chunks", outcome.title, outcome.chunks_written),
        }
    }
    println!(
        "Done: {} chunks written, {} sources failed",
        report.chunks_written, report.failed_sources
    );

    if report.failed_sources > 0 {
        bail!("{} of {} sources failed", report.failed_sources, report.sources.len());
    }
    Ok(())
}

/// Handles `sage ask`.
pub async fn handle_ask(config_path: &Path, question: &str) -> Result<()> {
    let config = SageConfig::load(config_path)?;

    let store = build_store(&config, StoreMode::Existing).await?;
    let embedder = Embedder::new(
        Arc::new(OllamaEmbedding::new(&config.embedding)?),
        config.embedding.clone(),
    );
    if !embedder.is_available().await {
        bail!(
            "embedding provider unreachable at {}; is Ollama running?",
            config.embedding.ollama_url
        );
    }
    let orchestrator = RetrievalOrchestrator::new(embedder, store, config.retrieval.clone());
    let generator = Arc::new(OllamaGenerator::new(&config.generation)?);
    let engine = AnswerEngine::new(orchestrator, generator);

    let answer = engine.ask(question).await?;

    println!("{}", answer.text);
    if !answer.citations.is_empty() {
        println!("\nSources ({}% confidence):", answer.confidence_percent);
        for citation in &answer.citations {
            println!(
                "  [{:>3}%] {}#{}: {}",
                citation.similarity_percent,
                citation.source_title,
                citation.chunk_index,
                citation.preview
            );
        }
    }
    Ok(())
}

/// Handles `sage stats`.
pub async fn handle_stats(config_path: &Path) -> Result<()> {
    let config = SageConfig::load(config_path)?;
    let store = build_store(&config, StoreMode::Existing).await?;

    let stats = store.stats().await?;
    println!(
        "{} chunks across {} sources",
        stats.total_chunks, stats.total_sources
    );
    for (title, count) in &stats.per_source {
        println!("  {title}: {count} chunks");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_core::StoreConfig;
    use tempfile::TempDir;

    #[test]
    fn test_read_documents_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("zebra.txt"), "z content").unwrap();
        fs::write(dir.path().join("alpha.md"), "a content").unwrap();
        fs::write(dir.path().join("ignored.pdf"), "binary").unwrap();

        let sources = read_documents(dir.path()).unwrap();
        let titles: Vec<&str> = sources.iter().map(|source| source.title.as_str()).collect();
        assert_eq!(titles, vec!["alpha", "zebra"]);
        assert_eq!(sources[0].raw_text, "a content");
    }

    #[test]
    fn test_read_documents_missing_dir_errors() {
        assert!(read_documents(Path::new("/nonexistent/corpus")).is_err());
    }

    #[tokio::test]
    async fn test_build_store_remote_without_url_errors() {
        let config = SageConfig {
            store: StoreConfig {
                backend: StoreBackend::Remote,
                remote_url: None,
                ..StoreConfig::default()
            },
            ..SageConfig::default()
        };

        let result = build_store(&config, StoreMode::Existing).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_build_store_memory_bootstrap() {
        let dir = TempDir::new().unwrap();
        let config = SageConfig {
            store: StoreConfig {
                snapshot_path: dir.path().join("corpus.bin"),
                ..StoreConfig::default()
            },
            ..SageConfig::default()
        };

        let store = build_store(&config, StoreMode::Bootstrap).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 0);
    }
}
