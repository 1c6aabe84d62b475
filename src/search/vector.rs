use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::{ChunkMetadata, TextChunk};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("Vector store not found at {0}")]
    NotFound(String),
    #[error("Embedding count {embeddings} does not match chunk count {chunks}")]
    CountMismatch { chunks: usize, embeddings: usize },
    #[error("Embedding dimension {got} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Vector store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt vector store: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    content: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

/// One document's chunks and their embeddings, searched by cosine similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<VectorEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

impl VectorIndex {
    /// Build an index. `embeddings` must be parallel with `chunks`.
    pub fn from_chunks(
        chunks: Vec<TextChunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, VectorError> {
        if chunks.len() != embeddings.len() {
            return Err(VectorError::CountMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(VectorError::DimensionMismatch {
                expected: dimension,
                got: bad.len(),
            });
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorEntry {
                content: chunk.content,
                metadata: chunk.metadata,
                embedding,
            })
            .collect();

        Ok(Self { dimension, entries })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write `dir/index.json` (atomic write via temp file + rename).
    pub fn save(&self, dir: &Path) -> Result<(), VectorError> {
        std::fs::create_dir_all(dir)?;
        let data = serde_json::to_vec(self)?;
        let path = dir.join(INDEX_FILE);
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, VectorError> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Err(VectorError::NotFound(dir.display().to_string()));
        }
        let data = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Whether a saved index exists under `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_FILE).exists()
    }

    /// Top-`k` entries by cosine similarity, highest first.
    ///
    /// A query from a different embedding model (wrong dimension) is an
    /// error rather than a list of zero scores.
    pub fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<VectorHit>, VectorError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query_embedding.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                got: query_embedding.len(),
            });
        }

        let mut scored: Vec<(f32, &VectorEntry)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, e)| VectorHit {
                content: e.content.clone(),
                metadata: e.metadata.clone(),
                score,
            })
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
