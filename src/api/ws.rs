use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use crate::models::{ClientMessage, ServerMessage};
use crate::qa;
use crate::state::AppState;

/// GET /ws/chat/ - Question/answer socket
pub async fn chat_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let greeting = ServerMessage::Connection {
        message: "Connected to Q&A Agent".to_string(),
    };
    if send(&mut sender, &greeting).await.is_err() {
        return;
    }

    // One question at a time per connection
    while let Some(msg) = receiver.next().await {
        let reply = match msg {
            Ok(Message::Text(text)) => respond(&state, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("Chat socket closed: {e}");
                break;
            }
        };
        if send(&mut sender, &reply).await.is_err() {
            break;
        }
    }
}

/// Turn one inbound frame into the reply frame.
pub async fn respond(state: &AppState, text: &str) -> ServerMessage {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return ServerMessage::error("Invalid JSON format"),
    };
    let msg: ClientMessage = match serde_json::from_value(value) {
        Ok(m) => m,
        Err(e) => return ServerMessage::error(format!("Error processing request: {e}")),
    };

    if msg.kind != "message" {
        return ServerMessage::error(format!("Unknown message type: {}", msg.kind));
    }
    let question = msg.question.trim();
    if question.is_empty() {
        return ServerMessage::error("Question is required");
    }

    qa::process_question(state, question, &msg.document_ids)
        .await
        .into()
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to encode chat reply: {e}");
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await
}
