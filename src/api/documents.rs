use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;

use crate::error::{Error, Result};
use crate::models::{DocumentList, DocumentSummary, UploadResponse};
use crate::state::AppState;

/// GET / - Chat page, read from the static directory on each request
pub async fn chat_interface(State(state): State<AppState>) -> Response {
    match tokio::fs::read_to_string(state.config.chat_page()).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::warn!("Chat page unavailable at {}: {e}", state.config.chat_page().display());
            (
                StatusCode::NOT_FOUND,
                "Chat interface not found. Please ensure chat.html exists in the static directory.",
            )
                .into_response()
        }
    }
}

/// POST /api/upload/ - Store a PDF and build its vector store before replying
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let (filename, data) = read_file_field(&mut multipart).await?;
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(Error::NotPdf);
    }

    // Runs on its own task so a dropped request cannot strand a half-built
    // document: it always ends up processed or removed.
    let ingest = tokio::spawn(ingest_upload(state, filename, data));
    let response = ingest
        .await
        .map_err(|e| Error::internal(format!("upload task failed: {e}")))??;
    Ok(Json(response))
}

/// Record, store and process one upload. On failure the record and its
/// files are removed before the error is returned.
async fn ingest_upload(state: AppState, filename: String, data: Bytes) -> Result<UploadResponse> {
    let stored_name = sanitize_filename(&filename);
    let uploads_dir = state.config.uploads_dir();
    let doc = state
        .documents
        .create(&filename, |id| uploads_dir.join(format!("{id}_{stored_name}")));
    tracing::info!("Upload {} saved as document {} ({} bytes)", filename, doc.id, data.len());

    if let Err(e) = tokio::fs::write(&doc.file, &data).await {
        tracing::error!("Failed to store {}: {e}", doc.file.display());
        state.discard_document(doc.id);
        return Err(Error::Storage(e));
    }

    let permit = state.ingest_semaphore.acquire().await;
    let _permit = match permit {
        Ok(permit) => permit,
        Err(e) => {
            state.discard_document(doc.id);
            return Err(Error::internal(format!("ingest limiter closed: {e}")));
        }
    };

    match state.service.process_document(&doc.file, doc.id).await {
        Ok(vectorstore_path) => {
            state.documents.mark_processed(doc.id, vectorstore_path);
            tracing::info!("Document {} processed", doc.id);
            Ok(UploadResponse {
                success: true,
                document_id: doc.id,
                filename: doc.filename,
                message: "Document uploaded and processed successfully".to_string(),
            })
        }
        Err(e) => {
            tracing::error!("Processing document {} failed: {e}", doc.id);
            state.discard_document(doc.id);
            Err(e)
        }
    }
}

/// GET /api/documents/ - Processed documents, newest first
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentList> {
    let documents = state
        .documents
        .list_processed()
        .iter()
        .map(DocumentSummary::from)
        .collect();
    Json(DocumentList { documents })
}

/// Pull the `file` field out of the form. Other fields are ignored.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadUpload(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(client_basename) else {
            return Err(Error::NoFile);
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::BadUpload(format!("Field read error: {e}")))?;
        return Ok((filename, data));
    }
    Err(Error::NoFile)
}

/// Last path component of a client-supplied name. Browsers on Windows may
/// send the full path.
fn client_basename(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim().to_string()
}

/// Name safe to use on disk: ASCII alphanumerics, `.`, `-` and `_` only.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.pdf".to_string()
    } else {
        cleaned.chars().take(200).collect()
    }
}
