//! Text chunking: page text in, metadata-tagged chunks out.

pub mod recursive;

pub use recursive::RecursiveSplitter;

use crate::config::ChunkingConfig;
use crate::loader::PageText;
use crate::models::{ChunkMetadata, TextChunk};

impl From<ChunkingConfig> for RecursiveSplitter {
    fn from(c: ChunkingConfig) -> Self {
        RecursiveSplitter::new(c.chunk_size, c.chunk_overlap)
    }
}

/// Split each page on its own so every chunk keeps its page number.
pub fn split_pages(
    splitter: &RecursiveSplitter,
    pages: &[PageText],
    document_id: u64,
    source: &str,
) -> Vec<TextChunk> {
    pages
        .iter()
        .flat_map(|page| {
            splitter
                .split_text(&page.text)
                .into_iter()
                .map(move |content| TextChunk {
                    content,
                    metadata: ChunkMetadata {
                        document_id,
                        source: source.to_string(),
                        page: page.page,
                    },
                })
        })
        .collect()
}
