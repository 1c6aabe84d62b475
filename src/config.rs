use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where uploads, vector stores and the document registry live
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Directory holding `chat.html`
    pub static_dir: PathBuf,
    /// Maximum upload body size in MB
    pub max_upload_mb: usize,
    /// Maximum documents processed at the same time
    pub max_concurrent_ingest: usize,
    /// Text splitter settings
    pub chunking: ChunkingConfig,
    /// Number of passages retrieved per document
    pub similarity_search_k: usize,
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,
    /// Chat model configuration
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters carried over from the previous chunk
    pub chunk_overlap: usize,
}

/// Remote model providers the service knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Ollama,
}

impl Provider {
    /// Name used in user-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Ollama => "Ollama",
        }
    }

    /// Environment variable that carries this provider's key, if it needs one.
    pub fn key_env(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Ollama => None,
        }
    }

    pub fn requires_key(&self) -> bool {
        self.key_env().is_some()
    }

    /// API root used when no base URL is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::Ollama => "http://localhost:11434",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "ollama" => Ok(Provider::Ollama),
            other => Err(format!("Unknown provider: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "openai" or "ollama"
    pub provider: Provider,
    /// Base URL for the embedding API
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// API key (not needed for Ollama)
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "anthropic", "openai" or "ollama"
    pub provider: Provider,
    /// Base URL for the chat API
    pub base_url: String,
    /// Model used to write answers
    pub chat_model: String,
    /// API key (not needed for Ollama)
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./media"),
            bind_addr: "127.0.0.1:8000".to_string(),
            static_dir: PathBuf::from("./static"),
            max_upload_mb: 50,
            max_concurrent_ingest: 2,
            chunking: ChunkingConfig::default(),
            similarity_search_k: 4,
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::for_provider(Provider::OpenAi)
    }
}

impl EmbeddingConfig {
    /// Defaults for `provider`: its base URL and a model it serves.
    pub fn for_provider(provider: Provider) -> Self {
        let model = match provider {
            Provider::Ollama => "nomic-embed-text",
            _ => "text-embedding-3-small",
        };
        Self {
            provider,
            base_url: provider.default_base_url().to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::for_provider(Provider::Anthropic)
    }
}

impl LlmConfig {
    /// Defaults for `provider`: its base URL and a model it serves.
    pub fn for_provider(provider: Provider) -> Self {
        let chat_model = match provider {
            Provider::Anthropic => "claude-sonnet-4-5",
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Ollama => "llama3.2",
        };
        Self {
            provider,
            base_url: provider.default_base_url().to_string(),
            chat_model: chat_model.to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DOCQA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("DOCQA_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("DOCQA_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(v) = parse_var("DOCQA_MAX_UPLOAD_MB") {
            config.max_upload_mb = v;
        }
        if let Some(v) = parse_var::<usize>("DOCQA_MAX_CONCURRENT_INGEST") {
            config.max_concurrent_ingest = v.max(1);
        }
        if let Some(v) = parse_var("CHUNK_SIZE") {
            config.chunking.chunk_size = v;
        }
        if let Some(v) = parse_var("CHUNK_OVERLAP") {
            config.chunking.chunk_overlap = v;
        }
        if let Some(v) = parse_var::<usize>("SIMILARITY_SEARCH_K") {
            config.similarity_search_k = v.max(1);
        }

        // Embedding provider
        if let Some(provider) = parse_var("EMBEDDING_PROVIDER") {
            config.embedding = EmbeddingConfig::for_provider(provider);
        }
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        config.embedding.api_key = non_empty_var("OPENAI_API_KEY");

        // Chat provider
        if let Some(provider) = parse_var("LLM_PROVIDER") {
            config.llm = LlmConfig::for_provider(provider);
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        config.llm.api_key = non_empty_var("LLM_API_KEY").or_else(|| {
            config
                .llm
                .provider
                .key_env()
                .and_then(non_empty_var)
        });
        if let Some(v) = parse_var("LLM_TEMPERATURE") {
            config.llm.temperature = v;
        }
        if let Some(v) = parse_var("LLM_MAX_TOKENS") {
            config.llm.max_tokens = v;
        }

        config.chunking = config.chunking.validated();
        config
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn vectorstore_dir(&self) -> PathBuf {
        self.data_dir.join("vectorstores")
    }

    /// On-disk location of a document's vector store.
    pub fn vectorstore_path(&self, document_id: u64) -> PathBuf {
        self.vectorstore_dir().join(format!("doc_{document_id}"))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("documents.json")
    }

    pub fn chat_page(&self) -> PathBuf {
        self.static_dir.join("chat.html")
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Build a config rooted at `data_dir`, for tests and embedding callers.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

impl ChunkingConfig {
    /// Overlap must stay below the chunk size or the splitter never advances.
    pub fn validated(self) -> Self {
        let chunk_size = self.chunk_size.max(1);
        let chunk_overlap = if self.chunk_overlap >= chunk_size {
            tracing::warn!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({chunk_size}); clamping",
                self.chunk_overlap
            );
            chunk_size / 5
        } else {
            self.chunk_overlap
        };
        Self {
            chunk_size,
            chunk_overlap,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable value for {name}: {raw:?}");
            None
        }
    }
}
