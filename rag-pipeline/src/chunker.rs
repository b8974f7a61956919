//! Recursive boundary chunker.
//!
//! Text is cut into pieces with the coarsest separator of the ladder
//! (paragraph, sentence, word, character); pieces still longer than the piece
//! limit are cut again with the next finer separator. Whitespace stays
//! attached to the piece before it, so pieces tile the text with no gaps.
//! Pieces are then packed greedily into chunks of at most `chunk_size`
//! characters, each chunk after the first starting `overlap` characters
//! before its predecessor's end.
//!
//! All sizes and offsets are in characters (Unicode scalar values).

use tracing::debug;

use crate::document::TextChunk;
use crate::error::PipelineError;

/// One rung of the separator ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// A whitespace run holding two or more line breaks.
    Paragraph,
    /// Whitespace after `.`, `!` or `?`, or any whitespace run with a line break.
    Sentence,
    /// Any whitespace run.
    Word,
    /// Every character is its own piece.
    Character,
}

impl Separator {
    pub const LADDER: [Separator; 4] = [
        Separator::Paragraph,
        Separator::Sentence,
        Separator::Word,
        Separator::Character,
    ];

    /// Whether the whitespace run `chars[ws_start..ws_end]` is a cut point.
    fn cuts(self, chars: &[char], ws_start: usize, ws_end: usize) -> bool {
        let run = &chars[ws_start..ws_end];
        match self {
            Separator::Paragraph => run.iter().filter(|c| **c == '\n').count() >= 2,
            Separator::Sentence => {
                run.contains(&'\n')
                    || (ws_start > 0 && matches!(chars[ws_start - 1], '.' | '!' | '?'))
            }
            Separator::Word => true,
            Separator::Character => false,
        }
    }
}

/// Validated chunking parameters.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    separators: Vec<Separator>,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, PipelineError> {
        Self::with_separators(chunk_size, overlap, Separator::LADDER.to_vec())
    }

    /// Uses a custom ladder, coarsest first. Without [`Separator::Character`]
    /// a piece that no separator can cut is emitted as an oversized chunk.
    pub fn with_separators(
        chunk_size: usize,
        overlap: usize,
        separators: Vec<Separator>,
    ) -> Result<Self, PipelineError> {
        if chunk_size == 0 {
            return Err(PipelineError::Configuration("chunk_size must be >= 1".into()));
        }
        if overlap >= chunk_size {
            return Err(PipelineError::Configuration(format!(
                "chunk overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        if separators.is_empty() {
            return Err(PipelineError::Configuration(
                "separator ladder must not be empty".into(),
            ));
        }
        Ok(Self {
            chunk_size,
            overlap,
            separators,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` into ordered chunks. Whitespace-only input yields none.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = text.chars().collect();

        let mut pieces = Vec::new();
        self.cut(&chars, 0, chars.len(), 0, &mut pieces);

        let spans = self.pack(&pieces);
        debug!(
            chars = chars.len(),
            pieces = pieces.len(),
            chunks = spans.len(),
            "text chunked"
        );

        spans
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| TextChunk {
                text: chars[start..end].iter().collect(),
                position: i as u32,
                start_offset: start,
                end_offset: end,
            })
            .collect()
    }

    /// Pieces never exceed this, so the overlap tail plus the next piece
    /// always fits in one chunk.
    fn piece_limit(&self) -> usize {
        self.chunk_size - self.overlap
    }

    fn cut(&self, chars: &[char], start: usize, end: usize, level: usize, out: &mut Vec<(usize, usize)>) {
        if end - start <= self.piece_limit() {
            out.push((start, end));
            return;
        }
        let Some(&sep) = self.separators.get(level) else {
            out.push((start, end));
            return;
        };

        for (a, b) in split_at(sep, chars, start, end) {
            if b - a > self.piece_limit() {
                self.cut(chars, a, b, level + 1, out);
            } else {
                out.push((a, b));
            }
        }
    }

    fn pack(&self, pieces: &[(usize, usize)]) -> Vec<(usize, usize)> {
        let size = self.chunk_size;
        let mut spans = Vec::new();
        let (mut cs, mut ce) = (0usize, 0usize);
        let mut emitted_end = 0usize;

        for &(ps, pe) in pieces {
            if pe - cs > size && ce > emitted_end {
                spans.push((cs, ce));
                emitted_end = ce;
                cs = ce.saturating_sub(self.overlap);
            }
            if pe - cs > size {
                // Only oversized pieces get here: shorten the overlap so the
                // piece fits, or give it a chunk of its own.
                cs = if pe - ps <= size { pe - size } else { ps };
            }
            ce = pe;
        }
        if ce > emitted_end {
            spans.push((cs, ce));
        }
        spans
    }
}

/// Free-function form of [`Chunker::split`].
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<TextChunk>, PipelineError> {
    Ok(Chunker::new(chunk_size, overlap)?.split(text))
}

/// Cuts `[start, end)` after every whitespace run that `sep` accepts.
fn split_at(sep: Separator, chars: &[char], start: usize, end: usize) -> Vec<(usize, usize)> {
    if sep == Separator::Character {
        return (start..end).map(|i| (i, i + 1)).collect();
    }

    let mut out = Vec::new();
    let mut piece_start = start;
    let mut i = start;
    while i < end {
        if !chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        let ws_start = i;
        while i < end && chars[i].is_whitespace() {
            i += 1;
        }
        if ws_start > piece_start && i < end && sep.cuts(chars, ws_start, i) {
            out.push((piece_start, i));
            piece_start = i;
        }
    }
    out.push((piece_start, end));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(chunks: &[TextChunk]) -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.start_offset, c.end_offset)).collect()
    }

    #[test]
    fn three_sentences_make_three_overlapping_chunks() {
        let text = "The cat sat. The dog ran. The bird flew.";
        let chunks = split(text, 20, 5).unwrap();
        assert_eq!(spans(&chunks), vec![(0, 13), (8, 26), (21, 40)]);
        assert!(chunks.iter().all(|c| c.char_len() <= 20));
        assert_eq!(chunks[1].text, "sat. The dog ran. ");
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(split("", 10, 2).unwrap().is_empty());
        assert!(split("  \n\t \n", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(matches!(Chunker::new(0, 0), Err(PipelineError::Configuration(_))));
        assert!(matches!(Chunker::new(10, 10), Err(PipelineError::Configuration(_))));
        assert!(Chunker::new(10, 9).is_ok());
    }

    #[test]
    fn paragraphs_are_preferred_over_sentences() {
        let text = "First para one. Still one.\n\nSecond para.";
        let chunks = split(text, 30, 0).unwrap();
        assert_eq!(chunks[0].text, "First para one. Still one.\n\n");
        assert_eq!(chunks[1].text, "Second para.");
    }

    #[test]
    fn long_word_is_cut_at_characters() {
        let text = "a".repeat(25);
        let chunks = split(&text, 10, 2).unwrap();
        assert_eq!(spans(&chunks), vec![(0, 10), (8, 18), (16, 25)]);
    }

    #[test]
    fn oversized_word_survives_without_character_level() {
        let chunker = Chunker::with_separators(
            10,
            2,
            vec![Separator::Paragraph, Separator::Sentence, Separator::Word],
        )
        .unwrap();
        let chunks = chunker.split("tiny supercalifragilistic end");
        let joined: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert!(joined.iter().any(|t| t.contains("supercalifragilistic")));
        assert_eq!(chunks.first().map(|c| c.start_offset), Some(0));
        assert_eq!(chunks.last().map(|c| c.end_offset), Some(29));
    }

    #[test]
    fn offsets_are_in_characters() {
        let text = "héllo wörld. ünïcode façade.";
        let chunks = split(text, 15, 3).unwrap();
        for c in &chunks {
            let expected: String = text.chars().skip(c.start_offset).take(c.char_len()).collect();
            assert_eq!(c.text, expected);
        }
        assert_eq!(chunks.last().map(|c| c.end_offset), Some(text.chars().count()));
    }
}
