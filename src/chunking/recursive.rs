//! Recursive character splitter.
//!
//! Splitting strategy:
//! 1. Split on the first separator that occurs in the text
//!    (paragraph break, line break, space, then individual characters)
//! 2. Recurse into any piece still longer than the chunk size
//! 3. Merge adjacent pieces up to the chunk size, carrying the tail of
//!    each chunk into the next as overlap

use std::collections::VecDeque;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text into overlapping chunks measured in characters.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut out = Vec::new();

        // Pick the first separator present in the text; "" always matches
        let mut separator = "";
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                remaining = &[];
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut good: Vec<&str> = Vec::new();
        for piece in splits {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                out.extend(self.merge_splits(&good, separator));
                good.clear();
            }
            if remaining.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_with(piece, remaining));
            }
        }
        if !good.is_empty() {
            out.extend(self.merge_splits(&good, separator));
        }

        out
    }

    /// Merge small pieces into chunks no longer than `chunk_size`.
    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            let joined_len = if current.is_empty() { 0 } else { sep_len };

            if total + len + joined_len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {total}, which is longer than the specified {}",
                        self.chunk_size
                    );
                }
                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current, separator) {
                        docs.push(doc);
                    }
                    // Drop leading pieces until the carried tail fits the overlap
                    // and leaves room for the incoming piece.
                    while total > self.chunk_overlap
                        || (total > 0
                            && total + len + if current.is_empty() { 0 } else { sep_len }
                                > self.chunk_size)
                    {
                        let Some(front) = current.pop_front() else {
                            break;
                        };
                        total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
                    }
                }
            }

            let joined_len = if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
            total += len + joined_len;
        }

        if let Some(doc) = join_pieces(&current, separator) {
            docs.push(doc);
        }
        docs
    }
}

fn join_pieces(pieces: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
