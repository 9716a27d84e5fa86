//! Recursive character splitter.
//!
//! Splitting strategy:
//! 1. Pick the first separator (`\n\n`, `\n`, ` `, then single characters)
//!    that occurs in the text and split before each occurrence, so every
//!    separator stays at the start of the piece that follows it
//! 2. Pieces still longer than the chunk size are split again with the
//!    remaining separators
//! 3. Adjacent pieces are concatenated up to the chunk size; when a chunk
//!    is flushed, its trailing pieces (up to the overlap) start the next one
//!
//! All lengths are counted in characters, not bytes.

use std::collections::VecDeque;

const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    /// Split `text` into trimmed, non-empty chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // The empty separator always matches, so this finds something
        let idx = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(idx).copied().unwrap_or("");
        let remaining = separators.get(idx + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            split_before(text, separator)
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            if remaining.is_empty() {
                if let Some(chunk) = trimmed(piece) {
                    chunks.push(chunk);
                }
            } else {
                chunks.extend(self.split_with(piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    /// Merge small pieces into chunks of at most `chunk_size` characters.
    /// Pieces carry their own leading separator and are concatenated as is.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join(&window) {
                    chunks.push(chunk);
                }
                // Keep at most `overlap` characters, and drop more if the
                // next piece would not fit alongside them
                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    let Some((_, first_len)) = window.pop_front() else {
                        break;
                    };
                    total -= first_len;
                }
            }

            total += len;
            window.push_back((piece, len));
        }

        if let Some(chunk) = join(&window) {
            chunks.push(chunk);
        }
        chunks
    }
}

/// Split `text` before every occurrence of `separator`. Empty pieces are
/// dropped.
fn split_before<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, _) in text.match_indices(separator) {
        if i > start {
            pieces.push(&text[start..i]);
        }
        start = i;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    trimmed(&joined)
}

fn trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
