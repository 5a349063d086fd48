//! Recursive-separator text chunker.
//!
//! Splits contract text into overlapping [`Chunk`]s of at most `chunk_size`
//! characters. Splitting prefers the coarsest boundary that fits:
//!
//! ```text
//! "\n\n"  →  "\n"  →  ". "  →  " "  →  ""   (single characters)
//! ```
//!
//! # Algorithm
//!
//! 1. Pick the first separator that occurs in the text (`""` always matches).
//! 2. Split on it, keeping each separator attached to the piece before it, so
//!    the pieces tile the input exactly.
//! 3. Pieces that fit are buffered; an oversized piece flushes the buffer and
//!    is split again with the remaining, finer separators.
//! 4. Buffered pieces are merged into windows of up to `chunk_size`
//!    characters. When a window is emitted, pieces are dropped from its front
//!    until at most `chunk_overlap` characters remain, and those carry over
//!    into the next window.
//!
//! Chunks are returned as slices of the original text with their byte
//! offsets, so consecutive chunks never leave a gap.
//!
//! # Example
//!
//! ```rust
//! use contract_review::chunk::{chunk_document, ChunkParams};
//! use contract_review::models::Document;
//!
//! let doc = Document::new("nda.pdf", "Term.\n\nPayment.");
//! let chunks = chunk_document(&doc, &ChunkParams::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].total_chunks, 1);
//! ```

use std::collections::VecDeque;
use std::ops::Range;

use crate::models::{Chunk, Document};

/// Separator hierarchy, coarsest first.
pub const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Validated chunk window parameters, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    chunk_overlap: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkParamsError {
    #[error("chunk_size must be > 0")]
    ZeroSize,
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

impl ChunkParams {
    /// Rejects `chunk_size == 0` and `chunk_overlap >= chunk_size`; either
    /// would stop the window from advancing.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkParamsError> {
        if chunk_size == 0 {
            return Err(ChunkParamsError::ZeroSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkParamsError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split one document into ordered chunks.
///
/// Empty or whitespace-only text yields no chunks.
pub fn chunk_document(doc: &Document, params: &ChunkParams) -> Vec<Chunk> {
    let spans: Vec<Range<usize>> = split_spans(&doc.text, params)
        .into_iter()
        .filter(|span| !doc.text[span.clone()].trim().is_empty())
        .collect();
    let total = spans.len();

    spans
        .into_iter()
        .enumerate()
        .map(|(i, span)| {
            let text = &doc.text[span.clone()];
            Chunk {
                source: doc.source.clone(),
                chunk_index: i,
                total_chunks: total,
                length: text.chars().count(),
                start: span.start,
                end: span.end,
                text: text.to_string(),
            }
        })
        .collect()
}

/// Chunk a batch of documents, preserving document order.
pub fn chunk_documents(docs: &[Document], params: &ChunkParams) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| chunk_document(doc, params))
        .collect()
}

/// Byte ranges of each window, in order.
fn split_spans(text: &str, params: &ChunkParams) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    if !text.is_empty() {
        split_recursive(text, 0..text.len(), SEPARATORS, params, &mut out);
    }
    out
}

fn split_recursive(
    text: &str,
    span: Range<usize>,
    separators: &[&str],
    params: &ChunkParams,
    out: &mut Vec<Range<usize>>,
) {
    let (separator, finer) = pick_separator(&text[span.clone()], separators);
    let mut fitting: Vec<(Range<usize>, usize)> = Vec::new();

    for piece in split_keep_separator(text, span, separator) {
        let len = text[piece.clone()].chars().count();
        if len <= params.chunk_size {
            fitting.push((piece, len));
            continue;
        }
        merge_pieces(&fitting, params, out);
        fitting.clear();
        let finer = if finer.is_empty() { &[""][..] } else { finer };
        split_recursive(text, piece, finer, params, out);
    }

    merge_pieces(&fitting, params, out);
}

fn pick_separator<'a>(slice: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || slice.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split `span` on `separator`, leaving the separator at the end of the
/// preceding piece. The returned ranges tile `span` with no gaps.
fn split_keep_separator(text: &str, span: Range<usize>, separator: &str) -> Vec<Range<usize>> {
    let base = span.start;
    let slice = &text[span];

    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(i, c)| base + i..base + i + c.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut cursor = 0;
    for (i, _) in slice.match_indices(separator) {
        let end = i + separator.len();
        pieces.push(base + cursor..base + end);
        cursor = end;
    }
    if cursor < slice.len() {
        pieces.push(base + cursor..base + slice.len());
    }
    pieces
}

fn merge_pieces(
    pieces: &[(Range<usize>, usize)],
    params: &ChunkParams,
    out: &mut Vec<Range<usize>>,
) {
    let size = params.chunk_size;
    let overlap = params.chunk_overlap;
    let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
    let mut total = 0usize;

    for (piece, len) in pieces {
        if total + len > size && !window.is_empty() {
            out.push(window_span(&window));
            while total > overlap || (total + len > size && total > 0) {
                match window.pop_front() {
                    Some((_, dropped)) => total -= dropped,
                    None => break,
                }
            }
        }
        window.push_back((piece.clone(), *len));
        total += len;
    }

    if !window.is_empty() {
        out.push(window_span(&window));
    }
}

fn window_span(window: &VecDeque<(Range<usize>, usize)>) -> Range<usize> {
    match (window.front(), window.back()) {
        (Some(first), Some(last)) => first.0.start..last.0.end,
        _ => 0..0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(size: usize, overlap: usize) -> ChunkParams {
        ChunkParams::new(size, overlap).unwrap()
    }

    /// Rebuild the source text from chunk offsets, skipping overlapped bytes.
    fn reconstruct(text: &str, chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for c in chunks {
            assert!(c.start <= covered, "gap before chunk {}", c.chunk_index);
            if c.end > covered {
                out.push_str(&text[covered..c.end]);
                covered = c.end;
            }
        }
        out
    }

    fn sample_contract() -> String {
        (1..=30)
            .map(|i| {
                format!(
                    "Section {i}. The Supplier shall perform the services described in \
                     Schedule {i}. Payment is due within thirty days of invoice.\nNotices \
                     go to the addresses in Schedule A."
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let doc = Document::new("empty.pdf", "");
        assert!(chunk_document(&doc, &ChunkParams::default()).is_empty());
    }

    #[test]
    fn test_whitespace_only_yields_no_chunks() {
        let doc = Document::new("blank.pdf", "\n\n   \n");
        assert!(chunk_document(&doc, &ChunkParams::default()).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let doc = Document::new("a.docx", "Hello, world!");
        let chunks = chunk_document(&doc, &ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].total_chunks, 1);
        assert_eq!(chunks[0].length, 13);
        assert_eq!(chunks[0].source, "a.docx");
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let doc = Document::new("p.pdf", text);
        let chunks = chunk_document(&doc, &params(30, 0));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "First paragraph here.\n\n");
        assert_eq!(chunks[1].text, "Second paragraph here.");
    }

    #[test]
    fn test_character_fallback_windows_overlap_exactly() {
        let text = "a".repeat(250);
        let doc = Document::new("x.pdf", text.as_str());
        let chunks = chunk_document(&doc, &params(100, 20));
        let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0, 80, 160]);
        assert_eq!(chunks[0].length, 100);
        assert_eq!(chunks[1].length, 100);
        assert_eq!(chunks[2].length, 90);
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        // 46-character sentences: each window holds two, and one carries over.
        let text = "Each party shall keep the terms confidential. ".repeat(20);
        let doc = Document::new("nda.pdf", text.as_str());
        let chunks = chunk_document(&doc, &params(120, 50));
        assert!(chunks.len() > 2);
        for w in chunks.windows(2) {
            let shared = w[0].end.saturating_sub(w[1].start);
            assert_eq!(shared, 46, "chunks {} and {}", w[0].chunk_index, w[1].chunk_index);
        }
        assert_eq!(reconstruct(&text, &chunks), text);
    }

    #[test]
    fn test_coverage_and_size_bound() {
        let text = sample_contract();
        let doc = Document::new("msa.pdf", text.as_str());
        for (size, overlap) in [(50, 0), (80, 10), (200, 50), (1000, 200), (7, 3)] {
            let chunks = chunk_document(&doc, &params(size, overlap));
            assert_eq!(reconstruct(&text, &chunks), text, "size={size}");
            assert_eq!(chunks.last().unwrap().end, text.len());
            for c in &chunks {
                assert!(c.length <= size, "chunk {} too long", c.chunk_index);
            }
        }
    }

    #[test]
    fn test_metadata_indices_contiguous() {
        let text = sample_contract();
        let doc = Document::new("msa.pdf", text.as_str());
        let chunks = chunk_document(&doc, &params(150, 30));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.total_chunks, chunks.len());
            assert_eq!(c.text, &text[c.start..c.end]);
        }
    }

    #[test]
    fn test_multibyte_text_respects_char_limit() {
        let text = "Überweisung fällig §12 — Zahlungsbedingungen ärgerlich. ".repeat(20);
        let doc = Document::new("de.pdf", text.as_str());
        let chunks = chunk_document(&doc, &params(25, 5));
        assert_eq!(reconstruct(&text, &chunks), text);
        for c in &chunks {
            assert!(c.length <= 25);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = sample_contract();
        let doc = Document::new("msa.pdf", text.as_str());
        let a = chunk_document(&doc, &params(90, 20));
        let b = chunk_document(&doc, &params(90, 20));
        assert_eq!(a, b);
    }

    #[test]
    fn test_batch_keeps_provenance() {
        let docs = vec![
            Document::new("one.pdf", "Alpha clause."),
            Document::new("two.pdf", "Beta clause."),
        ];
        let chunks = chunk_documents(&docs, &ChunkParams::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source, "one.pdf");
        assert_eq!(chunks[1].source, "two.pdf");
        assert_eq!(chunks[1].chunk_index, 0);
    }

    #[test]
    fn test_params_reject_overlap_not_smaller_than_size() {
        assert_eq!(
            ChunkParams::new(100, 100),
            Err(ChunkParamsError::OverlapTooLarge {
                size: 100,
                overlap: 100
            })
        );
        assert!(ChunkParams::new(100, 150).is_err());
        assert_eq!(ChunkParams::new(0, 0), Err(ChunkParamsError::ZeroSize));
        assert!(ChunkParams::new(100, 99).is_ok());
    }
}
