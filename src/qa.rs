//! Question answering over the uploaded documents.

use crate::config::Provider;
use crate::llm::{self, ErrorKind, ProviderError};
use crate::models::{Answer, Source};
use crate::search::vector::VectorHit;
use crate::state::AppState;

pub const NO_DOCUMENTS: &str =
    "No documents have been uploaded and processed yet. Please upload a document first.";

pub const NOT_ENOUGH_CONTEXT: &str = "I couldn't find enough relevant information in the uploaded documents to answer your question. Please try rephrasing your question or upload more relevant documents.";

pub const INSUFFICIENT_ANSWER: &str = "I don't have enough information in the uploaded documents to answer this question. Please try rephrasing your question or upload more relevant documents.";

/// Characters of each passage echoed back as a source preview.
const SOURCE_PREVIEW_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based only on the provided context from uploaded documents.
If you don't know the answer based on the provided context, say \"I don't have enough information in the uploaded documents to answer this question.\"
For greeting messages just give a simple response like \"Hello! How can I help you today?\".
Do not use any knowledge outside of the provided context.";

/// Answer `question` from the processed documents in `document_ids`
/// (every processed document when empty). Failures become answer text.
pub async fn process_question(state: &AppState, question: &str, document_ids: &[u64]) -> Answer {
    let documents = state.documents.processed_by_ids(document_ids);
    if documents.is_empty() {
        return Answer::bare(NO_DOCUMENTS);
    }
    let ids: Vec<u64> = documents.iter().map(|d| d.id).collect();

    let hits = match state
        .service
        .search_all_documents(question, &ids, Some(state.config.similarity_search_k))
        .await
    {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!("Document search failed: {e}");
            return Answer::bare(provider_message(&e));
        }
    };
    if hits.is_empty() {
        return Answer::bare(NOT_ENOUGH_CONTEXT);
    }

    let llm_config = &state.config.llm;
    if llm_config.provider.requires_key() && llm_config.api_key.is_none() {
        return Answer::bare(missing_key_message(llm_config.provider));
    }

    let context = build_context(&hits);
    let prompt = build_user_prompt(&context, question);
    tracing::debug!("Answering from {} passages across {} documents", hits.len(), ids.len());

    let answer = match llm::chat::complete(&state.http_client, llm_config, SYSTEM_PROMPT, &prompt)
        .await
    {
        Ok(answer) => answer,
        Err(e) => {
            tracing::error!("Answer generation failed: {e}");
            let message = match e.kind() {
                ErrorKind::RateLimit | ErrorKind::Authentication => provider_message(&e),
                ErrorKind::Other => format!("Error processing question: {e}"),
            };
            return Answer::bare(message);
        }
    };

    finalize_answer(answer, build_sources(&hits))
}

/// Passage texts separated by blank lines.
pub fn build_context(hits: &[VectorHit]) -> String {
    hits.iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!(
        "Context from documents:\n{context}\n\nQuestion: {question}\n\nAnswer: Provide a clear answer based only on the context provided. Include references to the source documents when possible."
    )
}

pub fn build_sources(hits: &[VectorHit]) -> Vec<Source> {
    hits.iter()
        .map(|h| Source {
            content: preview(&h.content),
            metadata: h.metadata.clone(),
        })
        .collect()
}

/// Swap hedging model output for the standard insufficiency answer.
/// Sources are kept either way.
pub fn finalize_answer(answer: String, sources: Vec<Source>) -> Answer {
    let lower = answer.to_lowercase();
    let answer = if lower.contains("don't have enough information") || lower.contains("don't know") {
        INSUFFICIENT_ANSWER.to_string()
    } else {
        answer
    };
    Answer { answer, sources }
}

fn preview(content: &str) -> String {
    if content.chars().count() > SOURCE_PREVIEW_CHARS {
        let head: String = content.chars().take(SOURCE_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

fn missing_key_message(provider: Provider) -> String {
    format!(
        "{} not configured. Please set it in your environment variables.",
        provider.key_env().unwrap_or("API key")
    )
}

fn provider_message(e: &ProviderError) -> String {
    let provider = e.provider();
    match e.kind() {
        ErrorKind::RateLimit => format!(
            "⚠️ {provider} API rate limit exceeded or insufficient quota. Please check your {provider} account billing and plan. You may need to add credits or wait for the rate limit to reset."
        ),
        ErrorKind::Authentication => format!(
            "⚠️ {provider} API authentication failed. Please check that your {} is correct and valid.",
            provider.key_env().unwrap_or("API key")
        ),
        ErrorKind::Other => format!("⚠️ Error searching documents: {e}"),
    }
}
