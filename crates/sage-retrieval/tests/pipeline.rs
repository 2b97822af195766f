//! End-to-end pipeline tests: ingest -> store -> retrieve -> answer,
//! driven entirely by deterministic mock providers.

use std::sync::Arc;

use sage_core::{ChunkingConfig, EmbeddingConfig, RetrievalConfig, SearchStep};
use sage_providers::{MockEmbedding, MockGenerator};
use sage_retrieval::{
    AnswerEngine, Embedder, IngestionPipeline, MemoryVectorStore, RetrievalOrchestrator,
    SourceDocument, VectorStore as _, chunker,
};

const DIMENSION: usize = 64;

fn chunking(target_tokens: usize, overlap_words: usize) -> ChunkingConfig {
    ChunkingConfig {
        target_tokens,
        overlap_words,
        min_chunk_chars: 50,
    }
}

fn embedding_config() -> EmbeddingConfig {
    EmbeddingConfig {
        batch_size: 4,
        batch_delay_ms: 0,
        max_retries: 1,
        timeout_seconds: 5,
        ..EmbeddingConfig::default()
    }
}

fn embedder(provider: Arc<MockEmbedding>) -> Embedder {
    Embedder::new(provider, embedding_config())
}

/// Ten well-formed sentences, each around 35 words.
fn alpha_text() -> String {
    let filler: Vec<&str> = ["chunking", "embedding", "storage", "retrieval"]
        .into_iter()
        .cycle()
        .take(32)
        .collect();
    (0..10)
        .map(|index| format!("Sentence number {index} covers {}.", filler.join(" ")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::test]
async fn test_ingest_two_chunks_and_query_first_exactly() {
    let text = alpha_text();
    let config = chunking(400, 40);

    // The chunker is pure; precompute the texts the pipeline will embed.
    let expected_chunks = chunker::split(&text, &config);
    assert_eq!(expected_chunks.len(), 2);
    assert!(
        expected_chunks[1].starts_with(
            &expected_chunks[0]
                .split_whitespace()
                .rev()
                .take(40)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join(" ")
        ),
        "second chunk is not overlap-seeded"
    );

    let question = "what does sentence number zero cover?";
    let provider = Arc::new(MockEmbedding::new(DIMENSION).with_vector(
        question,
        MockEmbedding::hash_embedding(&expected_chunks[0], DIMENSION),
    ));
    let store = Arc::new(MemoryVectorStore::new());

    let pipeline = IngestionPipeline::new(embedder(provider.clone()), store.clone(), config);
    let report = pipeline
        .ingest(
            vec![SourceDocument {
                title: "Alpha".to_owned(),
                raw_text: text,
            }],
            true,
        )
        .await
        .unwrap();
    assert_eq!(report.chunks_written, 2);
    assert_eq!(report.failed_sources, 0);

    // Query with a vector identical to chunk 0's embedding.
    let retrieval_config = RetrievalConfig {
        steps: vec![SearchStep {
            threshold: 0.75,
            limit: 10,
        }],
        ..RetrievalConfig::default()
    };
    let orchestrator =
        RetrievalOrchestrator::new(embedder(provider), store, retrieval_config);
    let retrieval = orchestrator.retrieve(question).await.unwrap();

    assert!(!retrieval.results.is_empty());
    let top = &retrieval.results[0];
    assert_eq!(top.chunk.metadata.source_title, "Alpha");
    assert_eq!(top.chunk.metadata.chunk_index, 0);
    assert!((top.similarity - 1.0).abs() < 1e-5);
    assert_eq!(
        (top.similarity * 100.0).round() as u32,
        100,
        "identical vectors must score 100%"
    );
}

#[tokio::test]
async fn test_reingestion_is_idempotent() {
    let provider = Arc::new(MockEmbedding::new(DIMENSION));
    let store = Arc::new(MemoryVectorStore::new());
    let pipeline =
        IngestionPipeline::new(embedder(provider), store.clone(), chunking(60, 10));

    let source = || {
        vec![SourceDocument {
            title: "Alpha".to_owned(),
            raw_text: alpha_text(),
        }]
    };

    let first = pipeline.ingest(source(), true).await.unwrap();
    let stats_after_first = store.stats().await.unwrap();

    let second = pipeline.ingest(source(), true).await.unwrap();
    let stats_after_second = store.stats().await.unwrap();

    assert_eq!(first.chunks_written, second.chunks_written);
    assert_eq!(
        stats_after_first.total_chunks,
        stats_after_second.total_chunks
    );
    assert_eq!(stats_after_second.per_source.len(), 1);

    // Indices stay contiguous from 0 after replacement.
    let results = store
        .search(
            &MockEmbedding::hash_embedding("anything", DIMENSION),
            -1.0,
            100,
        )
        .await
        .unwrap();
    let mut indices: Vec<usize> = results
        .iter()
        .map(|result| result.chunk.metadata.chunk_index)
        .collect();
    indices.sort_unstable();
    let expected: Vec<usize> = (0..indices.len()).collect();
    assert_eq!(indices, expected);
}

#[tokio::test]
async fn test_failed_source_leaves_prior_state_untouched() {
    let good_text = alpha_text();
    let config = chunking(60, 10);
    let chunk_texts = chunker::split(&good_text, &config);

    // Every chunk of the re-ingestion attempt fails.
    let mut provider = MockEmbedding::new(DIMENSION);
    for text in &chunk_texts {
        provider = provider.with_failure(text.clone());
    }
    let provider = Arc::new(provider);
    let store = Arc::new(MemoryVectorStore::new());

    // Seed the store with a prior version under the same title.
    let seed_provider = Arc::new(MockEmbedding::new(DIMENSION));
    let seed_pipeline =
        IngestionPipeline::new(embedder(seed_provider), store.clone(), chunking(400, 40));
    let seeded = seed_pipeline
        .ingest(
            vec![SourceDocument {
                title: "Alpha".to_owned(),
                raw_text: good_text.clone(),
            }],
            true,
        )
        .await
        .unwrap();
    assert!(seeded.chunks_written > 0);

    let pipeline = IngestionPipeline::new(embedder(provider), store.clone(), config);
    let report = pipeline
        .ingest(
            vec![SourceDocument {
                title: "Alpha".to_owned(),
                raw_text: good_text,
            }],
            true,
        )
        .await
        .unwrap();

    assert_eq!(report.failed_sources, 1);
    assert_eq!(report.sources[0].chunks_written, 0);
    assert!(report.sources[0].error.is_some());

    // The prior chunks are still there, un-interleaved.
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.per_source.get("Alpha"), Some(&seeded.chunks_written));
}

#[tokio::test]
async fn test_partial_chunk_failure_keeps_indices_contiguous() {
    let text = alpha_text();
    let config = chunking(60, 10);
    let chunk_texts = chunker::split(&text, &config);
    assert!(chunk_texts.len() >= 3);

    // Fail one middle chunk only.
    let provider = Arc::new(
        MockEmbedding::new(DIMENSION).with_failure(chunk_texts[1].clone()),
    );
    let store = Arc::new(MemoryVectorStore::new());
    let pipeline = IngestionPipeline::new(embedder(provider), store.clone(), config);

    let report = pipeline
        .ingest(
            vec![SourceDocument {
                title: "Alpha".to_owned(),
                raw_text: text,
            }],
            true,
        )
        .await
        .unwrap();

    assert_eq!(report.failed_sources, 0);
    assert_eq!(report.sources[0].failed_chunks, 1);
    assert_eq!(report.chunks_written, chunk_texts.len() - 1);

    let results = store
        .search(
            &MockEmbedding::hash_embedding("anything", DIMENSION),
            -1.0,
            100,
        )
        .await
        .unwrap();
    let mut indices: Vec<usize> = results
        .iter()
        .map(|result| result.chunk.metadata.chunk_index)
        .collect();
    indices.sort_unstable();
    let expected: Vec<usize> = (0..chunk_texts.len() - 1).collect();
    assert_eq!(indices, expected, "chunk indices must stay contiguous");
}

#[tokio::test]
async fn test_answer_engine_end_to_end() {
    let text = alpha_text();
    let provider = Arc::new(MockEmbedding::new(DIMENSION));
    let store = Arc::new(MemoryVectorStore::new());

    let pipeline =
        IngestionPipeline::new(embedder(provider.clone()), store.clone(), chunking(400, 40));
    pipeline
        .ingest(
            vec![SourceDocument {
                title: "Alpha".to_owned(),
                raw_text: text.clone(),
            }],
            true,
        )
        .await
        .unwrap();

    // Pin the question to the embedding of an actual chunk so retrieval
    // finds a strong match.
    let chunk_texts = chunker::split(&text, &chunking(400, 40));
    let question = "what is covered by the first sentences?";
    let asking_provider = Arc::new(MockEmbedding::new(DIMENSION).with_vector(
        question,
        MockEmbedding::hash_embedding(&chunk_texts[0], DIMENSION),
    ));

    let orchestrator = RetrievalOrchestrator::new(
        embedder(asking_provider),
        store,
        RetrievalConfig::default(),
    );
    let generator = Arc::new(MockGenerator::new());
    let engine = AnswerEngine::new(orchestrator, generator.clone());

    let answer = engine.ask(question).await.unwrap();
    assert!(answer.confidence_percent > 0);
    assert!(!answer.citations.is_empty());
    assert_eq!(answer.citations[0].source_title, "Alpha");
    assert!(answer.text.contains("Alpha"));
    assert_eq!(generator.call_count(), 1);
}
