//! Integration tests for the upload and question pipeline.
//!
//! Provider calls go to a local axum server that speaks just enough of the
//! OpenAI embeddings and Anthropic messages APIs, so no keys or network
//! access are needed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tower::ServiceExt;

use doc_qa::api;
use doc_qa::config::Config;
use doc_qa::loader;
use doc_qa::models::{ChunkMetadata, ServerMessage, TextChunk};
use doc_qa::qa;
use doc_qa::search::vector::VectorIndex;
use doc_qa::state::AppState;

const BOUNDARY: &str = "doc-qa-test-boundary";

/// Build a one-page PDF per entry in `pages`, each page showing its lines.
fn sample_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
            }
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Count" => count,
        "Kids" => kids,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

// ─── Mock provider ───────────────────────────────────────

#[derive(Clone, Default)]
struct MockProvider {
    /// When set, the embeddings endpoint fails with this status
    embed_status: Option<StatusCode>,
    /// Delay before the embeddings endpoint answers
    embed_delay: Option<Duration>,
    /// User prompts received by the messages endpoint
    prompts: Arc<Mutex<Vec<String>>>,
}

/// Keyword-count embedding: similar topics land close together.
fn keyword_embedding(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    vec![
        lower.matches("refund").count() as f32,
        lower.matches("shipping").count() as f32,
        0.1,
    ]
}

async fn mock_embeddings(State(mock): State<MockProvider>, Json(body): Json<Value>) -> Response {
    if let Some(delay) = mock.embed_delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = mock.embed_status {
        return (
            status,
            Json(json!({ "error": { "message": "mock provider failure" } })),
        )
            .into_response();
    }
    let data: Vec<Value> = body["input"]
        .as_array()
        .unwrap()
        .iter()
        .enumerate()
        .map(|(i, text)| {
            json!({ "index": i, "embedding": keyword_embedding(text.as_str().unwrap()) })
        })
        .collect();
    Json(json!({ "data": data })).into_response()
}

async fn mock_messages(State(mock): State<MockProvider>, Json(body): Json<Value>) -> Json<Value> {
    let prompt = body["messages"][0]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    mock.prompts.lock().push(prompt);
    Json(json!({
        "content": [{ "type": "text", "text": "Refunds are processed within 14 days." }]
    }))
}

/// Serve `mock` on an ephemeral port and return its base URL.
async fn spawn_provider(mock: MockProvider) -> String {
    let app = Router::new()
        .route("/v1/embeddings", post(mock_embeddings))
        .route("/v1/messages", post(mock_messages))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Serve the application itself on an ephemeral port.
async fn spawn_app(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });
    addr
}

fn config_with_provider(dir: &std::path::Path, base_url: &str) -> Config {
    let mut config = Config::with_data_dir(dir.join("media"));
    config.static_dir = dir.join("static");
    config.embedding.base_url = base_url.to_string();
    config.embedding.api_key = Some("test-key".into());
    config.llm.base_url = base_url.to_string();
    config.llm.api_key = Some("test-key".into());
    config
}

fn upload_request(filename: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn empty_form_request() -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/upload/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
    let resp = api::router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn list(state: &AppState) -> Value {
    let req = Request::builder()
        .uri("/api/documents/")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(state, req).await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn upload_count(state: &AppState) -> usize {
    std::fs::read_dir(state.config.uploads_dir()).unwrap().count()
}

/// Poll `cond` for up to five seconds.
async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached within 5s");
}

/// Next text frame from the socket, parsed as JSON.
async fn next_json<S>(socket: &mut S) -> Value
where
    S: StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(frame) = socket.next().await {
        if let WsMessage::Text(text) = frame.unwrap() {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
    panic!("socket closed before a text frame arrived");
}

// ─── Tests ───────────────────────────────────────────────

#[test]
fn test_loader_reads_pages_in_order() {
    let pdf = sample_pdf(&[
        &["Refund policy", "Refunds are issued within 14 days."],
        &["Shipping policy"],
    ]);
    let pages = loader::load_pdf_bytes(&pdf).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].page, 1);
    assert!(pages[0].text.contains("Refunds are issued"));
    assert_eq!(pages[1].page, 2);
    assert!(pages[1].text.contains("Shipping"));
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(Config::with_data_dir(dir.path())).unwrap();

    let (status, body) = send(&state, empty_form_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_upload_non_pdf_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(Config::with_data_dir(dir.path())).unwrap();

    let (status, body) = send(&state, upload_request("notes.txt", b"plain text")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only PDF files are supported");
    assert!(state.documents.is_empty());
}

#[tokio::test]
async fn test_upload_without_key_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(Config::with_data_dir(dir.path())).unwrap();
    let pdf = sample_pdf(&[&["Refunds are issued within 14 days."]]);

    let (status, body) = send(&state, upload_request("policy.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_type"], "api_error");
    assert_eq!(body["error"], "OPENAI_API_KEY not set in environment variables");

    assert!(state.documents.is_empty());
    assert_eq!(upload_count(&state), 0);
    assert_eq!(list(&state).await, json!({ "documents": [] }));
}

#[tokio::test]
async fn test_upload_rate_limited_maps_to_429() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = spawn_provider(MockProvider {
        embed_status: Some(StatusCode::TOO_MANY_REQUESTS),
        ..MockProvider::default()
    })
    .await;
    let state = AppState::new(config_with_provider(dir.path(), &base_url)).unwrap();
    let pdf = sample_pdf(&[&["Refunds are issued within 14 days."]]);

    let (status, body) = send(&state, upload_request("policy.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error_type"], "rate_limit");
    assert!(body["suggestion"]
        .as_str()
        .unwrap()
        .contains("OpenAI account billing"));
    assert!(state.documents.is_empty());
    assert!(!state.config.vectorstore_path(1).exists());
}

#[tokio::test]
async fn test_upload_then_ask() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::default();
    let prompts = mock.prompts.clone();
    let base_url = spawn_provider(mock).await;
    let state = AppState::new(config_with_provider(dir.path(), &base_url)).unwrap();
    let pdf = sample_pdf(&[&["Refund policy", "Refunds are issued within 14 days."]]);

    let (status, body) = send(&state, upload_request("policy.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["document_id"], 1);
    assert_eq!(body["filename"], "policy.pdf");
    assert_eq!(body["message"], "Document uploaded and processed successfully");

    let doc = state.documents.get(1).unwrap();
    assert!(doc.processed);
    assert!(state.config.vectorstore_path(1).is_dir());

    let listing = list(&state).await;
    assert_eq!(listing["documents"][0]["id"], 1);
    assert_eq!(listing["documents"][0]["filename"], "policy.pdf");

    let reply = api::ws::respond(&state, r#"{"type":"message","question":"How do refunds work?"}"#)
        .await;
    match reply {
        ServerMessage::Response { answer, sources } => {
            assert_eq!(answer, "Refunds are processed within 14 days.");
            assert!(!sources.is_empty());
            assert_eq!(sources[0].metadata.document_id, 1);
            assert_eq!(sources[0].metadata.source, "1_policy.pdf");
            assert_eq!(sources[0].metadata.page, 1);
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    let prompts = prompts.lock();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("Context from documents:\n"));
    assert!(prompts[0].contains("Refunds are issued"));
    assert!(prompts[0].contains("Question: How do refunds work?"));
}

#[tokio::test]
async fn test_question_searches_every_selected_document() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = spawn_provider(MockProvider::default()).await;
    let state = AppState::new(config_with_provider(dir.path(), &base_url)).unwrap();

    let refunds = sample_pdf(&[&["Refunds are issued within 14 days."]]);
    let shipping = sample_pdf(&[&["Shipping takes 3 business days."]]);
    assert_eq!(send(&state, upload_request("refunds.pdf", &refunds)).await.0, StatusCode::OK);
    assert_eq!(send(&state, upload_request("shipping.pdf", &shipping)).await.0, StatusCode::OK);

    let hits = state
        .service
        .search_all_documents("How long does shipping take?", &[1, 2], Some(4))
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].metadata.document_id, 2);
    assert_eq!(hits[1].metadata.document_id, 1);

    // Only the selected document is searched
    let answer = qa::process_question(&state, "Where is my refund?", &[1]).await;
    assert!(answer
        .sources
        .iter()
        .all(|s| s.metadata.document_id == 1));

    // Ids that are not processed documents select nothing
    let answer = qa::process_question(&state, "Where is my refund?", &[42]).await;
    assert_eq!(answer.answer, qa::NO_DOCUMENTS);
}

#[tokio::test]
async fn test_chat_page_served_from_static_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::with_data_dir(dir.path().join("media"));
    config.static_dir = dir.path().join("static");
    let state = AppState::new(config).unwrap();

    let get_root = || Request::builder().uri("/").body(Body::empty()).unwrap();

    let resp = api::router(state.clone()).oneshot(get_root()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    std::fs::create_dir_all(&state.config.static_dir).unwrap();
    std::fs::write(state.config.chat_page(), "<html>chat</html>").unwrap();
    let resp = api::router(state.clone()).oneshot(get_root()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"<html>chat</html>");
}

#[tokio::test]
async fn test_dropped_upload_failure_still_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = spawn_provider(MockProvider {
        embed_status: Some(StatusCode::TOO_MANY_REQUESTS),
        embed_delay: Some(Duration::from_millis(500)),
        ..MockProvider::default()
    })
    .await;
    let state = AppState::new(config_with_provider(dir.path(), &base_url)).unwrap();
    let pdf = sample_pdf(&[&["Refunds are issued within 14 days."]]);

    // The client gives up while the document is still being embedded
    let upload = api::router(state.clone()).oneshot(upload_request("policy.pdf", &pdf));
    assert!(tokio::time::timeout(Duration::from_millis(100), upload)
        .await
        .is_err());
    assert_eq!(state.documents.len(), 1);

    wait_until(|| state.documents.is_empty()).await;
    assert_eq!(upload_count(&state), 0);
    assert!(!state.config.vectorstore_path(1).exists());
}

#[tokio::test]
async fn test_dropped_upload_still_finishes_processing() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = spawn_provider(MockProvider {
        embed_delay: Some(Duration::from_millis(300)),
        ..MockProvider::default()
    })
    .await;
    let state = AppState::new(config_with_provider(dir.path(), &base_url)).unwrap();
    let pdf = sample_pdf(&[&["Refunds are issued within 14 days."]]);

    let upload = api::router(state.clone()).oneshot(upload_request("policy.pdf", &pdf));
    assert!(tokio::time::timeout(Duration::from_millis(100), upload)
        .await
        .is_err());

    wait_until(|| state.documents.get(1).is_some_and(|d| d.processed)).await;
    assert!(state.config.vectorstore_path(1).is_dir());
    assert_eq!(list(&state).await["documents"][0]["id"], 1);
}

#[tokio::test]
async fn test_store_from_other_embedding_model_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = spawn_provider(MockProvider::default()).await;
    let state = AppState::new(config_with_provider(dir.path(), &base_url)).unwrap();

    let refunds = sample_pdf(&[&["Refunds are issued within 14 days."]]);
    let shipping = sample_pdf(&[&["Shipping takes 3 business days."]]);
    assert_eq!(send(&state, upload_request("refunds.pdf", &refunds)).await.0, StatusCode::OK);
    assert_eq!(send(&state, upload_request("shipping.pdf", &shipping)).await.0, StatusCode::OK);

    // Rebuild document 2 with two-dimensional vectors
    let stale = VectorIndex::from_chunks(
        vec![TextChunk {
            content: "Shipping takes 3 business days.".into(),
            metadata: ChunkMetadata {
                document_id: 2,
                source: "2_shipping.pdf".into(),
                page: 1,
            },
        }],
        vec![vec![0.0, 1.0]],
    )
    .unwrap();
    stale.save(&state.config.vectorstore_path(2)).unwrap();

    let hits = state
        .service
        .search_all_documents("How long does shipping take?", &[1, 2], Some(4))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.document_id, 1);
}

#[tokio::test]
async fn test_chat_socket_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = spawn_provider(MockProvider::default()).await;
    let state = AppState::new(config_with_provider(dir.path(), &base_url)).unwrap();
    let pdf = sample_pdf(&[&["Refunds are issued within 14 days."]]);
    assert_eq!(send(&state, upload_request("policy.pdf", &pdf)).await.0, StatusCode::OK);

    let addr = spawn_app(state.clone()).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/chat/"))
        .await
        .unwrap();

    assert_eq!(
        next_json(&mut socket).await,
        json!({ "type": "connection", "message": "Connected to Q&A Agent" })
    );

    socket
        .send(WsMessage::text(
            r#"{"type":"message","question":"How do refunds work?","document_ids":[1]}"#,
        ))
        .await
        .unwrap();
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["answer"], "Refunds are processed within 14 days.");
    assert_eq!(reply["sources"][0]["metadata"]["document_id"], 1);
    assert_eq!(reply["sources"][0]["metadata"]["page"], 1);

    // Each frame gets exactly one reply, errors included
    socket.send(WsMessage::text("{oops")).await.unwrap();
    assert_eq!(
        next_json(&mut socket).await,
        json!({ "type": "error", "message": "Invalid JSON format" })
    );
    socket
        .send(WsMessage::text(r#"{"type":"ping"}"#))
        .await
        .unwrap();
    assert_eq!(
        next_json(&mut socket).await,
        json!({ "type": "error", "message": "Unknown message type: ping" })
    );

    socket.send(WsMessage::Close(None)).await.unwrap();
    while let Some(frame) = socket.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => panic!("unexpected frame after close: {text}"),
            Ok(_) => continue,
            Err(_) => break,
        }
    }
}
