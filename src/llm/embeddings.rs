use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingConfig, Provider};
use crate::llm::error::{check_status, ProviderError};

/// Generate embeddings for a batch of texts using the configured provider.
/// Returns one vector per input, in input order.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let embeddings = match config.provider {
        Provider::Ollama => embed_ollama(client, config, texts).await?,
        Provider::OpenAi => embed_openai(client, config, texts).await?,
        provider => {
            return Err(ProviderError::Unsupported {
                provider,
                purpose: "embeddings",
            })
        }
    };

    if embeddings.len() != texts.len() {
        return Err(ProviderError::invalid_response(
            config.provider,
            format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            ),
        ));
    }

    Ok(embeddings)
}

/// Generate embedding for a single text.
pub async fn embed_single(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    text: &str,
) -> Result<Vec<f32>, ProviderError> {
    let results = embed_batch(client, config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::invalid_response(config.provider, "no embedding returned"))
}

/// Fail early when the provider needs a key and none is configured.
pub fn ensure_credentials(config: &EmbeddingConfig) -> Result<(), ProviderError> {
    if config.provider.requires_key() && config.api_key.is_none() {
        return Err(ProviderError::MissingApiKey {
            provider: config.provider,
        });
    }
    Ok(())
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let url = format!("{}/api/embed", config.base_url.trim_end_matches('/'));

    let batch_size = 32;
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size) {
        let req = OllamaEmbedRequest {
            model: config.model.clone(),
            input: chunk.to_vec(),
            truncate: true,
        };

        let resp = client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::transport(Provider::Ollama, e))?;
        let resp = check_status(Provider::Ollama, resp).await?;

        let body: OllamaEmbedResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(Provider::Ollama, e.to_string()))?;

        all_embeddings.extend(body.embeddings);
    }

    Ok(all_embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, ProviderError> {
    ensure_credentials(config)?;
    let url = format!("{}/v1/embeddings", config.base_url.trim_end_matches('/'));
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let batch_size = 64;
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size) {
        let req = OpenAiEmbedRequest {
            model: config.model.clone(),
            input: chunk.to_vec(),
        };

        let resp = client
            .post(&url)
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::transport(Provider::OpenAi, e))?;
        let resp = check_status(Provider::OpenAi, resp).await?;

        let mut body: OpenAiEmbedResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(Provider::OpenAi, e.to_string()))?;

        // The API documents `index`; don't rely on response order
        body.data.sort_by_key(|d| d.index);
        all_embeddings.extend(body.data.into_iter().map(|d| d.embedding));
    }

    Ok(all_embeddings)
}
