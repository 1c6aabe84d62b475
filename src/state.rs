use std::sync::Arc;

use crate::config::Config;
use crate::documents::DocumentRegistry;
use crate::service::DocumentService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub documents: Arc<DocumentRegistry>,
    pub service: Arc<DocumentService>,
    pub http_client: reqwest::Client,
    pub ingest_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        // Ensure data directories exist
        std::fs::create_dir_all(config.uploads_dir())?;
        std::fs::create_dir_all(config.vectorstore_dir())?;

        let documents = DocumentRegistry::open(&config.db_path())?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        let service = DocumentService::new(&config, http_client.clone());
        let max_concurrent_ingest = config.max_concurrent_ingest.max(1);

        Ok(Self {
            config: Arc::new(config),
            documents: Arc::new(documents),
            service: Arc::new(service),
            http_client,
            ingest_semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent_ingest)),
        })
    }

    /// Drop a document whose processing failed: its record, the stored
    /// upload and any partially written vector store.
    pub fn discard_document(&self, id: u64) {
        if let Some(doc) = self.documents.delete(id) {
            if let Err(e) = std::fs::remove_file(&doc.file) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {e}", doc.file.display());
                }
            }
        }
        let store = self.config.vectorstore_path(id);
        if store.exists() {
            if let Err(e) = std::fs::remove_dir_all(&store) {
                tracing::warn!("Failed to remove {}: {e}", store.display());
            }
        }
    }
}
