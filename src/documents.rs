//! Registry of uploaded documents, persisted as JSON.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::Document;

/// Maximum stored length of a filename, in characters.
pub const MAX_FILENAME_LEN: usize = 255;

pub struct DocumentRegistry {
    inner: RwLock<RegistryFile>,
    db_path: PathBuf,
    /// Serializes writers of the temp file
    persist_lock: Mutex<()>,
}

/// On-disk layout. `last_id` keeps ids monotonic even after deletions.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    last_id: u64,
    documents: Vec<Document>,
}

impl DocumentRegistry {
    /// Load the registry from `db_path`, or start empty.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = if db_path.exists() {
            match read_registry(db_path) {
                Ok(file) => file,
                Err(e) => {
                    // Keep the bad file for inspection instead of overwriting it
                    let bad_path = db_path.with_extension("json.bad");
                    tracing::warn!(
                        "Ignoring unreadable document registry {}: {e}; moved to {}",
                        db_path.display(),
                        bad_path.display()
                    );
                    std::fs::rename(db_path, &bad_path)?;
                    RegistryFile::default()
                }
            }
        } else {
            RegistryFile::default()
        };
        let max_id = file.documents.iter().map(|d| d.id).max().unwrap_or(0);
        file.last_id = file.last_id.max(max_id);

        Ok(Self {
            inner: RwLock::new(file),
            db_path: db_path.to_path_buf(),
            persist_lock: Mutex::new(()),
        })
    }

    /// Record a new, unprocessed upload. `file_for` maps the assigned id to
    /// the stored file location.
    pub fn create(&self, filename: &str, file_for: impl FnOnce(u64) -> PathBuf) -> Document {
        let doc = {
            let mut inner = self.inner.write();
            inner.last_id += 1;
            let id = inner.last_id;
            let doc = Document {
                id,
                filename: truncate_chars(filename, MAX_FILENAME_LEN),
                file: file_for(id),
                uploaded_at: Utc::now(),
                processed: false,
                vectorstore_path: None,
            };
            inner.documents.push(doc.clone());
            doc
        };
        self.persist();
        doc
    }

    /// Flip a document to processed and record where its index lives.
    pub fn mark_processed(&self, id: u64, vectorstore_path: String) -> Option<Document> {
        let updated = {
            let mut inner = self.inner.write();
            let doc = inner.documents.iter_mut().find(|d| d.id == id)?;
            doc.processed = true;
            doc.vectorstore_path = Some(vectorstore_path);
            doc.clone()
        };
        self.persist();
        Some(updated)
    }

    /// Remove a record. Returns the removed document, if any.
    pub fn delete(&self, id: u64) -> Option<Document> {
        let removed = {
            let mut inner = self.inner.write();
            let idx = inner.documents.iter().position(|d| d.id == id)?;
            inner.documents.remove(idx)
        };
        self.persist();
        Some(removed)
    }

    pub fn get(&self, id: u64) -> Option<Document> {
        self.inner.read().documents.iter().find(|d| d.id == id).cloned()
    }

    /// Processed documents, newest upload first.
    pub fn list_processed(&self) -> Vec<Document> {
        self.processed_by_ids(&[])
    }

    /// Processed documents with an id in `ids`, newest first.
    /// An empty `ids` selects every processed document.
    pub fn processed_by_ids(&self, ids: &[u64]) -> Vec<Document> {
        let inner = self.inner.read();
        let mut selected: Vec<Document> = inner
            .documents
            .iter()
            .filter(|d| d.processed && (ids.is_empty() || ids.contains(&d.id)))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        selected
    }

    pub fn len(&self) -> usize {
        self.inner.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().documents.is_empty()
    }

    /// Persist the registry to disk (atomic write via temp file + rename).
    fn persist(&self) {
        let _guard = self.persist_lock.lock();
        let inner = self.inner.read();
        let data = match serde_json::to_string_pretty(&*inner) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Failed to serialize document registry: {e}");
                return;
            }
        };
        let tmp_path = self.db_path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp_path, &data) {
            tracing::error!("Failed to write {}: {e}", tmp_path.display());
            return;
        }
        if let Err(e) = std::fs::rename(&tmp_path, &self.db_path) {
            tracing::error!("Failed to replace {}: {e}", self.db_path.display());
        }
    }
}

fn read_registry(path: &Path) -> anyhow::Result<RegistryFile> {
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
