use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// An uploaded file and the state of its vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: u64,
    pub filename: String,
    /// Stored copy of the upload
    pub file: PathBuf,
    pub uploaded_at: DateTime<Utc>,
    pub processed: bool,
    pub vectorstore_path: Option<String>,
}

/// Metadata carried by every chunk, and echoed back with answer sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub document_id: u64,
    /// Basename of the stored file
    pub source: String,
    /// 1-based page number
    pub page: u32,
}

/// A piece of document text ready to be embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Row returned by `GET /api/documents/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: u64,
    pub filename: String,
    pub uploaded_at: String,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            uploaded_at: doc.uploaded_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentSummary>,
}

/// Successful upload response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub document_id: u64,
    pub filename: String,
    pub message: String,
}

/// A passage shown next to an answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
}

impl Answer {
    /// An answer with no supporting passages.
    pub fn bare(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }
}

/// Message received over the chat socket
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type", default = "default_message_type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    /// Empty selects every processed document
    #[serde(default, deserialize_with = "null_as_default")]
    pub document_ids: Vec<u64>,
}

fn default_message_type() -> String {
    "message".to_string()
}

/// `null` reads the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Message sent over the chat socket
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connection {
        message: String,
    },
    Response {
        answer: String,
        sources: Vec<Source>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

impl From<Answer> for ServerMessage {
    fn from(a: Answer) -> Self {
        ServerMessage::Response {
            answer: a.answer,
            sources: a.sources,
        }
    }
}
