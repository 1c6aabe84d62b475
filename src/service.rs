//! Document processing: load, split, embed, persist and search.

use std::path::{Path, PathBuf};

use crate::chunking::{self, RecursiveSplitter};
use crate::config::{Config, EmbeddingConfig};
use crate::error::{Error, Result};
use crate::llm::embeddings;
use crate::llm::ProviderError;
use crate::loader::{self, PageText};
use crate::models::TextChunk;
use crate::search::fanin::{merge_store_results, StoreResults};
use crate::search::vector::{VectorError, VectorHit, VectorIndex};

pub struct DocumentService {
    client: reqwest::Client,
    embedding: EmbeddingConfig,
    splitter: RecursiveSplitter,
    vectorstore_dir: PathBuf,
    default_k: usize,
}

impl DocumentService {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client,
            embedding: config.embedding.clone(),
            splitter: RecursiveSplitter::from(config.chunking),
            vectorstore_dir: config.vectorstore_dir(),
            default_k: config.similarity_search_k,
        }
    }

    /// Extract page text off the async runtime.
    pub async fn load_pdf(&self, file_path: &Path) -> Result<Vec<PageText>> {
        let path = file_path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || loader::load_pdf(&path))
            .await
            .map_err(|e| Error::internal(format!("PDF extraction task failed: {e}")))??;
        Ok(pages)
    }

    pub fn split_documents(
        &self,
        pages: &[PageText],
        document_id: u64,
        source: &str,
    ) -> Vec<TextChunk> {
        chunking::split_pages(&self.splitter, pages, document_id, source)
    }

    /// Embed `chunks` and save the resulting index at `vectorstore_path`.
    pub async fn create_vectorstore(
        &self,
        chunks: Vec<TextChunk>,
        vectorstore_path: &Path,
    ) -> Result<VectorIndex> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embeddings::embed_batch(&self.client, &self.embedding, &texts).await?;
        let index = VectorIndex::from_chunks(chunks, vectors)?;
        index.save(vectorstore_path)?;
        Ok(index)
    }

    pub fn load_vectorstore(
        &self,
        vectorstore_path: &Path,
    ) -> std::result::Result<VectorIndex, VectorError> {
        VectorIndex::load(vectorstore_path)
    }

    /// Where the index for `document_id` lives.
    pub fn vectorstore_path(&self, document_id: u64) -> PathBuf {
        self.vectorstore_dir.join(format!("doc_{document_id}"))
    }

    /// Load, split, embed and persist a document.
    /// Returns the path of the saved vector store.
    pub async fn process_document(&self, file_path: &Path, document_id: u64) -> Result<String> {
        embeddings::ensure_credentials(&self.embedding)?;

        let pages = self.load_pdf(file_path).await?;
        let source = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let chunks = self.split_documents(&pages, document_id, &source);
        if chunks.is_empty() {
            return Err(Error::NoText);
        }
        tracing::info!(
            "Document {document_id}: {} pages, {} chunks",
            pages.len(),
            chunks.len()
        );

        std::fs::create_dir_all(&self.vectorstore_dir)?;
        let vectorstore_path = self.vectorstore_path(document_id);
        self.create_vectorstore(chunks, &vectorstore_path).await?;

        Ok(vectorstore_path.to_string_lossy().into_owned())
    }

    /// Top-`k` passages from one document's store.
    pub async fn search_documents(
        &self,
        query: &str,
        vectorstore_path: &Path,
        k: Option<usize>,
    ) -> Result<Vec<VectorHit>> {
        let k = k.unwrap_or(self.default_k);
        embeddings::ensure_credentials(&self.embedding)?;
        let index = self.load_vectorstore(vectorstore_path)?;
        let query_embedding =
            embeddings::embed_single(&self.client, &self.embedding, query).await?;
        Ok(index.similarity_search(&query_embedding, k)?)
    }

    /// Search every listed document and union the results.
    ///
    /// The query is embedded once. Documents without a store are skipped,
    /// as are stores that fail to load or were built with another
    /// embedding model.
    pub async fn search_all_documents(
        &self,
        query: &str,
        document_ids: &[u64],
        k: Option<usize>,
    ) -> std::result::Result<Vec<VectorHit>, ProviderError> {
        let k = k.unwrap_or(self.default_k);

        let present: Vec<(u64, PathBuf)> = document_ids
            .iter()
            .map(|&id| (id, self.vectorstore_path(id)))
            .filter(|(_, path)| VectorIndex::exists(path))
            .collect();
        if present.is_empty() {
            return Ok(Vec::new());
        }

        embeddings::ensure_credentials(&self.embedding)?;
        let query_embedding =
            embeddings::embed_single(&self.client, &self.embedding, query).await?;

        let mut results = Vec::with_capacity(present.len());
        for (document_id, path) in present {
            let hits = self
                .load_vectorstore(&path)
                .and_then(|index| index.similarity_search(&query_embedding, k));
            match hits {
                Ok(hits) => results.push(StoreResults { document_id, hits }),
                Err(e) => {
                    tracing::warn!("Error searching document {document_id}: {e}");
                }
            }
        }

        for r in &results {
            tracing::debug!("Document {}: {} hits", r.document_id, r.hits.len());
        }

        Ok(merge_store_results(results, k, document_ids.len()))
    }
}
