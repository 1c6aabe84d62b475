use serde::{Deserialize, Serialize};

use crate::config::{LlmConfig, Provider};
use crate::llm::error::{check_status, ProviderError};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Run a single-turn completion: one system prompt, one user message.
/// Returns the model's text.
pub async fn complete(
    client: &reqwest::Client,
    config: &LlmConfig,
    system: &str,
    user: &str,
) -> Result<String, ProviderError> {
    if config.provider.requires_key() && config.api_key.is_none() {
        return Err(ProviderError::MissingApiKey {
            provider: config.provider,
        });
    }

    match config.provider {
        Provider::Anthropic => call_anthropic(client, config, system, user).await,
        Provider::OpenAi => call_openai(client, config, system, user).await,
        Provider::Ollama => call_ollama(client, config, system, user).await,
    }
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

fn chat_messages(system: &str, user: &str) -> Vec<Message> {
    vec![
        Message {
            role: "system".to_string(),
            content: system.to_string(),
        },
        Message {
            role: "user".to_string(),
            content: user.to_string(),
        },
    ]
}

// ─── Anthropic ───────────────────────────────────────────

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

async fn call_anthropic(
    client: &reqwest::Client,
    config: &LlmConfig,
    system: &str,
    user: &str,
) -> Result<String, ProviderError> {
    let url = format!("{}/v1/messages", config.base_url.trim_end_matches('/'));
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = AnthropicRequest {
        model: config.chat_model.clone(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        system: system.to_string(),
        messages: vec![Message {
            role: "user".to_string(),
            content: user.to_string(),
        }],
    };

    let resp = client
        .post(&url)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&req)
        .send()
        .await
        .map_err(|e| ProviderError::transport(Provider::Anthropic, e))?;
    let resp = check_status(Provider::Anthropic, resp).await?;

    let body: AnthropicResponse = resp
        .json()
        .await
        .map_err(|e| ProviderError::invalid_response(Provider::Anthropic, e.to_string()))?;

    Ok(anthropic_text(body))
}

fn anthropic_text(body: AnthropicResponse) -> String {
    body.content
        .into_iter()
        .filter(|b| b.kind == "text")
        .map(|b| b.text)
        .collect::<Vec<_>>()
        .join("")
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

async fn call_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    system: &str,
    user: &str,
) -> Result<String, ProviderError> {
    let url = format!(
        "{}/v1/chat/completions",
        config.base_url.trim_end_matches('/')
    );
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model: config.chat_model.clone(),
        messages: chat_messages(system, user),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let resp = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&req)
        .send()
        .await
        .map_err(|e| ProviderError::transport(Provider::OpenAi, e))?;
    let resp = check_status(Provider::OpenAi, resp).await?;

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .map_err(|e| ProviderError::invalid_response(Provider::OpenAi, e.to_string()))?;

    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::invalid_response(Provider::OpenAi, "no choices returned"))
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

async fn call_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    system: &str,
    user: &str,
) -> Result<String, ProviderError> {
    let url = format!("{}/api/chat", config.base_url.trim_end_matches('/'));

    let req = OllamaChatRequest {
        model: config.chat_model.clone(),
        messages: chat_messages(system, user),
        stream: false,
        options: OllamaOptions {
            temperature: config.temperature,
        },
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .map_err(|e| ProviderError::transport(Provider::Ollama, e))?;
    let resp = check_status(Provider::Ollama, resp).await?;

    let body: OllamaChatResponse = resp
        .json()
        .await
        .map_err(|e| ProviderError::invalid_response(Provider::Ollama, e.to_string()))?;
    Ok(body.message.content)
}
