//! Property tests for the chunker: coverage, size bound, overlap and offsets.

use proptest::prelude::*;
use rag_pipeline::Chunker;

fn sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..60).prop_flat_map(|size| (Just(size), 0..size))
}

fn texts() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zé ,.!?\n]{0,300}",
        "([A-Z][a-z]{1,8}( [a-z]{1,8}){0,6}[.!?]( |\n|\n\n)){0,12}",
        "[a-z]{0,200}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn chunks_tile_the_text((size, overlap) in sizes(), text in texts()) {
        let chunks = Chunker::new(size, overlap).unwrap().split(&text);
        let n = text.chars().count();

        if text.trim().is_empty() {
            prop_assert!(chunks.is_empty());
            return Ok(());
        }

        prop_assert_eq!(chunks[0].start_offset, 0);
        prop_assert_eq!(chunks[chunks.len() - 1].end_offset, n);
        for pair in chunks.windows(2) {
            prop_assert!(pair[1].start_offset > pair[0].start_offset);
            prop_assert!(pair[1].start_offset <= pair[0].end_offset, "gap between chunks");
        }
        for (i, c) in chunks.iter().enumerate() {
            prop_assert_eq!(c.position as usize, i);
        }
    }

    #[test]
    fn chunks_respect_size_and_overlap((size, overlap) in sizes(), text in texts()) {
        let chunks = Chunker::new(size, overlap).unwrap().split(&text);

        for c in &chunks {
            prop_assert!(c.char_len() <= size);
            prop_assert!(c.char_len() > 0);
        }
        for pair in chunks.windows(2) {
            // The tail of each chunk reappears at the head of the next one.
            prop_assert_eq!(pair[0].end_offset - pair[1].start_offset, overlap);
            let tail: String = pair[0].text.chars().skip(pair[0].char_len() - overlap).collect();
            prop_assert!(pair[1].text.starts_with(&tail));
        }
    }

    #[test]
    fn chunk_text_matches_offsets((size, overlap) in sizes(), text in texts()) {
        let chars: Vec<char> = text.chars().collect();
        for c in Chunker::new(size, overlap).unwrap().split(&text) {
            let expected: String = chars[c.start_offset..c.end_offset].iter().collect();
            prop_assert_eq!(c.text, expected);
        }
    }
}
