//! Recursive boundary text chunker.
//!
//! Splits each [`Document`]'s text into overlapping [`Chunk`]s no longer than
//! `chunk_size`, measured by a pluggable length function (characters by
//! default).
//!
//! # Algorithm
//!
//! 1. A span that is too long is cut at the highest-priority boundary it
//!    contains: paragraph (`\n\n`), line (`\n`), sentence (`. `, `? `, `! `),
//!    word (` `), then single characters. The separator stays attached to the
//!    piece before it, so pieces tile the text with no gaps.
//! 2. Pieces still too long are cut again at the next level down.
//! 3. Pieces are packed greedily into windows of at most `chunk_size`. When a
//!    window is emitted, pieces are dropped from its front until what remains
//!    fits in `chunk_overlap` and leaves room for the next piece; that tail
//!    opens the next chunk.
//!
//! Chunks are exact substrings of the document text, so trimming the overlap
//! (via `start_index`) and concatenating them gives back the original text.
//!
//! # Example
//!
//! ```rust
//! use pdf_rag::chunk::Chunker;
//! use pdf_rag::models::Document;
//!
//! let chunker = Chunker::new(1000, 150).unwrap();
//! let doc = Document {
//!     source: "Data/france.pdf".to_string(),
//!     page: Some(1),
//!     text: "The capital of Francia is Paris.".to_string(),
//! };
//! let chunks = chunker.split_documents(&[doc]);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].start_index, 0);
//! ```

use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::ops::Range;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::models::{Chunk, Document};

/// Measures a span of text in the units `chunk_size` is expressed in.
pub type LengthFn = fn(&str) -> usize;

/// Default length function: number of Unicode scalar values.
pub fn char_length(text: &str) -> usize {
    text.chars().count()
}

/// Boundaries in priority order. Below the last level, text is cut per character.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "? ", "! "], &[" "]];

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    length: LengthFn,
}

impl Chunker {
    /// Create a chunker measuring length in characters.
    ///
    /// Fails when `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::config("chunk_size must be > 0"));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            length: char_length,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Replace the length function.
    pub fn with_length_fn(mut self, length: LengthFn) -> Self {
        self.length = length;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split documents in order. Chunk indices restart at 0 for each document.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.split_document(doc))
            .collect()
    }

    /// Split a single document. Blank documents produce no chunks.
    pub fn split_document(&self, doc: &Document) -> Vec<Chunk> {
        if doc.text.trim().is_empty() {
            return Vec::new();
        }

        let spans = self.split_spans(&doc.text);
        let mut chunks = Vec::with_capacity(spans.len());

        // Span starts never decrease, so char offsets are counted incrementally.
        let mut byte_cursor = 0usize;
        let mut char_cursor = 0usize;

        for (index, span) in spans.into_iter().enumerate() {
            char_cursor += doc.text[byte_cursor..span.start].chars().count();
            byte_cursor = span.start;
            chunks.push(make_chunk(doc, index as i64, char_cursor, &doc.text[span]));
        }

        chunks
    }

    /// Byte ranges of the chunks for `text`, in order.
    pub fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut pieces = Vec::new();
        self.split_pieces(text, 0..text.len(), 0, &mut pieces);
        self.merge_pieces(text, &pieces)
    }

    fn measure(&self, text: &str) -> usize {
        (self.length)(text)
    }

    fn split_pieces(
        &self,
        text: &str,
        span: Range<usize>,
        level: usize,
        out: &mut Vec<Range<usize>>,
    ) {
        if self.measure(&text[span.clone()]) <= self.chunk_size {
            out.push(span);
            return;
        }

        let Some(separators) = SEPARATORS.get(level) else {
            for (offset, c) in text[span.clone()].char_indices() {
                let start = span.start + offset;
                out.push(start..start + c.len_utf8());
            }
            return;
        };

        let parts = split_after(&text[span.clone()], separators);
        if parts.len() <= 1 {
            self.split_pieces(text, span, level + 1, out);
            return;
        }

        for part in parts {
            let absolute = span.start + part.start..span.start + part.end;
            self.split_pieces(text, absolute, level + 1, out);
        }
    }

    fn merge_pieces(&self, text: &str, pieces: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut window: VecDeque<Range<usize>> = VecDeque::new();

        for piece in pieces {
            if let (Some(first), Some(last)) = (window.front(), window.back()) {
                let (start, end) = (first.start, last.end);
                if self.measure(&text[start..piece.end]) > self.chunk_size {
                    spans.push(start..end);

                    while let Some(front_start) = window.front().map(|r| r.start) {
                        let retained = self.measure(&text[front_start..end]);
                        let with_next = self.measure(&text[front_start..piece.end]);
                        if retained > self.chunk_overlap || with_next > self.chunk_size {
                            window.pop_front();
                        } else {
                            break;
                        }
                    }
                }
            }
            window.push_back(piece.clone());
        }

        if let (Some(first), Some(last)) = (window.front(), window.back()) {
            spans.push(first.start..last.end);
        }

        spans
    }
}

/// Cut `text` after every occurrence of any separator. Parts are never empty.
fn split_after(text: &str, separators: &[&str]) -> Vec<Range<usize>> {
    let mut parts = Vec::new();
    let mut start = 0usize;

    for (i, _) in text.char_indices() {
        if i < start {
            continue;
        }
        if let Some(sep) = separators.iter().find(|sep| text[i..].starts_with(**sep)) {
            let end = i + sep.len();
            parts.push(start..end);
            start = end;
        }
    }

    if start < text.len() {
        parts.push(start..text.len());
    }

    parts
}

fn make_chunk(doc: &Document, index: i64, start_index: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let key = format!(
        "{}#{}#{}",
        doc.source,
        doc.page.map(|p| p.to_string()).unwrap_or_default(),
        start_index
    );

    Chunk {
        id: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string(),
        source: doc.source.clone(),
        page: doc.page,
        chunk_index: index,
        start_index,
        text: text.to_string(),
        hash,
    }
}
