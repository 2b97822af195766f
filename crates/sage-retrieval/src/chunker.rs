//! Sentence-aware document chunking with word overlap.
//!
//! Splitting is a pure transformation: normalize the raw text, accumulate
//! whole sentences greedily up to a token target, and seed each new chunk
//! with the trailing words of the previous one so the embedding step keeps
//! cross-boundary context.

use std::sync::LazyLock;

use regex::Regex;
use sage_core::ChunkingConfig;

/// HTML/XML tags.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
/// Markdown links; the label survives, the target does not.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
/// Markdown heading/emphasis/code markers.
static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[#*_`]+").expect("valid regex"));
/// Runs of whitespace.
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strips markup and collapses whitespace.
///
/// Normalization belongs to the chunker, not its callers; `split` applies
/// it before any sentence work.
pub fn normalize(text: &str) -> String {
    let stripped = TAG_RE.replace_all(text, " ");
    let unlinked = LINK_RE.replace_all(&stripped, "$1");
    let unmarked = MARKUP_RE.replace_all(&unlinked, "");
    WHITESPACE_RE
        .replace_all(&unmarked, " ")
        .trim()
        .to_owned()
}

/// Estimates the token count of a text.
///
/// Cheap approximation: `ceil(words / 0.75)`, i.e. four tokens for every
/// three words. Deliberately approximate; no tokenizer dependency.
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_words(text.split_whitespace().count())
}

/// `ceil(words / 0.75)` without going through floats.
fn tokens_for_words(words: usize) -> usize {
    (words * 4).div_ceil(3)
}

/// Splits normalized text into sentences on `.`, `!`, `?`.
///
/// Runs of terminators ("...", "?!") stay attached to their sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(character) = chars.next() {
        current.push(character);
        if matches!(character, '.' | '!' | '?') {
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_owned());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_owned());
    }
    sentences
}

/// Returns the last `count` whitespace-separated words of `text`.
fn tail_words(text: &str, count: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.len().saturating_sub(count);
    words[start..].join(" ")
}

/// Splits raw document text into overlapping, token-bounded passages.
///
/// Sentences are appended to the current chunk until the next one would
/// push the token estimate over `target_tokens`; the chunk is then
/// finalized and the next chunk seeds itself with the last `overlap_words`
/// words of it. A single sentence longer than the target is emitted as its
/// own oversized chunk rather than dropped or truncated. Chunks shorter
/// than `min_chunk_chars` after trimming carry no useful signal and are
/// discarded.
pub fn split(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_words = 0_usize;
    // Sentences added beyond the overlap seed; a chunk is only finalized
    // once it holds at least one.
    let mut body_sentences = 0_usize;

    for sentence in split_sentences(&normalized) {
        let sentence_words = sentence.split_whitespace().count();
        let candidate_tokens = tokens_for_words(current_words + sentence_words);

        if body_sentences > 0 && candidate_tokens > config.target_tokens {
            push_chunk(&mut chunks, &current, config.min_chunk_chars);
            let seed = tail_words(&current, config.overlap_words);
            current_words = seed.split_whitespace().count();
            current = seed;
            body_sentences = 0;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
        current_words += sentence_words;
        body_sentences += 1;
    }

    if body_sentences > 0 {
        push_chunk(&mut chunks, &current, config.min_chunk_chars);
    }

    chunks
}

/// Pushes a finalized chunk unless it falls under the character floor.
fn push_chunk(chunks: &mut Vec<String>, chunk: &str, min_chars: usize) {
    let trimmed = chunk.trim();
    if trimmed.chars().count() >= min_chars {
        chunks.push(trimmed.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(target_tokens: usize, overlap_words: usize) -> ChunkingConfig {
        ChunkingConfig {
            target_tokens,
            overlap_words,
            min_chunk_chars: 50,
        }
    }

    fn sample_text(sentence_count: usize) -> String {
        (0..sentence_count)
            .map(|index| {
                format!("Sentence number {index} talks about retrieval engines and vector search.")
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_normalize_strips_markup() {
        let raw = "# Title\n\nSome <b>bold</b> text with a [link](https://example.com).\n\n";
        assert_eq!(normalize(raw), "Title Some bold text with a link.");
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        // 3 words -> 4 tokens, 4 words -> ceil(16/3) = 6 tokens
        assert_eq!(estimate_tokens("one two three"), 4);
        assert_eq!(estimate_tokens("one two three four"), 6);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(split("", &config(400, 40)).is_empty());
        assert!(split("   \n\t  ", &config(400, 40)).is_empty());
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = sample_text(30);
        let chunking = config(60, 10);
        assert_eq!(split(&text, &chunking), split(&text, &chunking));
    }

    #[test]
    fn test_no_sentence_is_dropped() {
        let text = sample_text(30);
        let chunks = split(&text, &config(60, 10));
        assert!(chunks.len() > 1);

        // Every sentence of the normalized input appears in some chunk.
        for index in 0..30 {
            let marker = format!("Sentence number {index} ");
            assert!(
                chunks.iter().any(|chunk| chunk.contains(&marker)),
                "sentence {index} missing from all chunks"
            );
        }
    }

    #[test]
    fn test_overlap_seeds_next_chunk() {
        let text = sample_text(30);
        let overlap = 10;
        let chunks = split(&text, &config(60, overlap));
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let previous_words: Vec<&str> = pair[0].split_whitespace().collect();
            let expected_seed =
                previous_words[previous_words.len().saturating_sub(overlap)..].join(" ");
            assert!(
                pair[1].starts_with(&expected_seed),
                "chunk does not start with the previous chunk's tail"
            );
        }
    }

    #[test]
    fn test_minimum_length_filter() {
        // A tiny trailing sentence forced into its own chunk is dropped
        // rather than indexed.
        let text = "This opening sentence is comfortably long enough to stand as a chunk on its own merits and keeps going for a while. No.";
        let chunks = split(text, &config(20, 0));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.trim().chars().count() >= 50);
        }
        assert!(!chunks.iter().any(|chunk| chunk == "No."));
    }

    #[test]
    fn test_oversized_sentence_is_kept_whole() {
        let oversized = format!(
            "{} and then it finally ends.",
            ["a very long clause that keeps going"; 40].join(" ")
        );
        let chunks = split(&oversized, &config(20, 0));
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("finally ends."));
    }

    #[test]
    fn test_overlap_shorter_than_chunk() {
        let text = sample_text(6);
        // Overlap larger than any chunk's word count falls back to the
        // whole previous chunk.
        let chunks = split(&text, &config(20, 500));
        assert!(!chunks.is_empty());
    }
}
