use std::sync::Arc;

use essayrag_core::chunker::{build_chunker, ChunkStrategy, ParagraphChunker, TokenWindowChunker};
use essayrag_core::traits::Chunker;
use essayrag_core::{Error, TokenCounter};
use proptest::prelude::*;

fn counter() -> Arc<TokenCounter> {
    Arc::new(TokenCounter::cl100k().expect("tokenizer"))
}

fn long_text(words: usize) -> String {
    (0..words).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
}

#[test]
fn empty_text_yields_no_chunks() {
    let chunker = TokenWindowChunker::new(counter(), 500, 50).expect("chunker");
    assert!(chunker.chunk("doc", "").is_empty());
}

#[test]
fn short_text_yields_one_chunk_equal_to_input() {
    let chunker = TokenWindowChunker::new(counter(), 500, 50).expect("chunker");
    let chunks = chunker.chunk("doc", "short text");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "short text");
    assert_eq!(chunks[0].index, 0);
    assert_eq!(chunks[0].parent_id, "doc");
}

#[test]
fn overlap_must_be_smaller_than_chunk_size() {
    let err = TokenWindowChunker::new(counter(), 50, 50).err().expect("rejected");
    assert!(matches!(err, Error::Configuration(_)));
    let err = TokenWindowChunker::new(counter(), 0, 0).err().expect("rejected");
    assert!(matches!(err, Error::Configuration(_)));
    assert!(build_chunker(ChunkStrategy::TokenWindow { chunk_size: 10, overlap: 11 }, counter()).is_err());
}

#[test]
fn chunks_are_bounded_indexed_and_overlapping() {
    let counter = counter();
    let chunker = TokenWindowChunker::new(counter.clone(), 40, 10).expect("chunker");
    let text = long_text(200);
    let chunks = chunker.chunk("essay", &text);
    assert!(chunks.len() > 2, "long text spans several windows");
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.index, i);
        assert!(c.token_count <= 40);
        assert!(c.token_count > 0);
    }
    // Consecutive windows share exactly `overlap` tokens.
    let tokens = counter.encode(&text);
    let windows = chunker.windows(tokens.len());
    for pair in windows.windows(2) {
        if pair[0].len() == 40 {
            assert_eq!(pair[0].end - pair[1].start, 10);
        }
    }
    for (chunk, range) in chunks.iter().zip(&windows) {
        assert_eq!(chunk.text, counter.decode(&tokens[range.clone()]));
    }
}

#[test]
fn paragraph_chunker_packs_greedily() {
    let chunker = ParagraphChunker::new(counter(), 31).expect("chunker");
    let text = "First paragraph.\n\nSecond one.\n\nThird paragraph here.\n\nFourth.";
    let chunks = chunker.chunk("p", text);
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["First paragraph.\n\nSecond one.", "Third paragraph here.\n\nFourth."]);
    assert!(chunks.iter().all(|c| c.token_count > 0));
    assert_eq!(chunks[1].key(), "p_chunk_1");
}

#[test]
fn strategies_are_interchangeable_behind_the_trait() {
    let text = "Alpha.\n\nBeta.";
    for strategy in [
        ChunkStrategy::TokenWindow { chunk_size: 500, overlap: 50 },
        ChunkStrategy::Paragraph { max_chars: 4000 },
    ] {
        let chunker = build_chunker(strategy, counter()).expect("chunker");
        let chunks = chunker.chunk("x", text);
        assert_eq!(chunks.len(), 1, "{strategy:?}");
        assert_eq!(chunks[0].text, text);
    }
}

proptest! {
    #[test]
    fn leading_segments_cover_tokens_exactly_once(
        text in "[a-zA-Z ,.\n]{0,400}",
        chunk_size in 2usize..48,
        overlap_seed in 0usize..48,
    ) {
        let counter = counter();
        let overlap = overlap_seed % chunk_size;
        let chunker = TokenWindowChunker::new(counter.clone(), chunk_size, overlap).expect("chunker");
        let tokens = counter.encode(&text);
        let windows = chunker.windows(tokens.len());

        let mut covered = Vec::new();
        for w in &windows {
            let lead_end = (w.start + chunker.stride()).min(w.end);
            covered.extend_from_slice(&tokens[w.start..lead_end]);
        }
        prop_assert_eq!(&covered, &tokens);
        prop_assert_eq!(counter.decode(&covered), text.clone());

        let chunks = chunker.chunk("p", &text);
        prop_assert_eq!(chunks.len(), windows.len());
        for c in &chunks {
            prop_assert!(c.token_count <= chunk_size);
        }
    }
}
