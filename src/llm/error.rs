use thiserror::Error;

use crate::config::Provider;

/// Coarse class of a provider failure, used to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimit,
    Authentication,
    Other,
}

/// Failure talking to an embedding or chat provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{} not set in environment variables", .provider.key_env().unwrap_or("API key"))]
    MissingApiKey { provider: Provider },

    #[error("{provider} API rate limit exceeded or insufficient quota. Please check your {provider} account billing and plan.")]
    RateLimited { provider: Provider, detail: String },

    #[error("{provider} API authentication failed. Please check that your {} is correct and valid.", .provider.key_env().unwrap_or("API key"))]
    Authentication { provider: Provider, detail: String },

    #[error("{provider} API returned {status}: {body}")]
    Api {
        provider: Provider,
        status: u16,
        body: String,
    },

    #[error("Failed to reach {provider} API: {source}")]
    Transport {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from {provider} API: {detail}")]
    InvalidResponse { provider: Provider, detail: String },

    #[error("{provider} is not supported for {purpose}")]
    Unsupported {
        provider: Provider,
        purpose: &'static str,
    },
}

impl ProviderError {
    /// Classify a non-success HTTP response.
    ///
    /// The status decides first; the body keywords cover gateways that wrap
    /// provider errors in a generic status.
    pub fn from_status(provider: Provider, status: u16, body: String) -> Self {
        match status {
            429 => ProviderError::RateLimited {
                provider,
                detail: body,
            },
            401 | 403 => ProviderError::Authentication {
                provider,
                detail: body,
            },
            _ => {
                let lower = body.to_lowercase();
                if lower.contains("rate limit")
                    || lower.contains("rate_limit")
                    || lower.contains("quota")
                {
                    ProviderError::RateLimited {
                        provider,
                        detail: body,
                    }
                } else if lower.contains("authentication") || lower.contains("invalid_api_key") {
                    ProviderError::Authentication {
                        provider,
                        detail: body,
                    }
                } else {
                    ProviderError::Api {
                        provider,
                        status,
                        body,
                    }
                }
            }
        }
    }

    pub fn transport(provider: Provider, source: reqwest::Error) -> Self {
        ProviderError::Transport { provider, source }
    }

    pub fn invalid_response(provider: Provider, detail: impl Into<String>) -> Self {
        ProviderError::InvalidResponse {
            provider,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::RateLimited { .. } => ErrorKind::RateLimit,
            ProviderError::Authentication { .. } => ErrorKind::Authentication,
            _ => ErrorKind::Other,
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            ProviderError::MissingApiKey { provider }
            | ProviderError::RateLimited { provider, .. }
            | ProviderError::Authentication { provider, .. }
            | ProviderError::Api { provider, .. }
            | ProviderError::Transport { provider, .. }
            | ProviderError::InvalidResponse { provider, .. }
            | ProviderError::Unsupported { provider, .. } => *provider,
        }
    }
}

/// Read a response, turning non-success statuses into a classified error.
pub(crate) async fn check_status(
    provider: Provider,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::from_status(provider, status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_rate_limit() {
        let e = ProviderError::from_status(Provider::OpenAi, 429, "slow down".into());
        assert_eq!(e.kind(), ErrorKind::RateLimit);
    }

    #[test]
    fn test_quota_in_body_is_rate_limit() {
        let body = r#"{"error":{"code":"insufficient_quota","message":"You exceeded your current quota"}}"#;
        let e = ProviderError::from_status(Provider::OpenAi, 400, body.into());
        assert_eq!(e.kind(), ErrorKind::RateLimit);
    }

    #[test]
    fn test_401_is_authentication() {
        let e = ProviderError::from_status(Provider::Anthropic, 401, "nope".into());
        assert_eq!(e.kind(), ErrorKind::Authentication);
        assert!(e.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_authentication_keyword_in_body() {
        let body = r#"{"type":"error","error":{"type":"authentication_error"}}"#;
        let e = ProviderError::from_status(Provider::Anthropic, 400, body.into());
        assert_eq!(e.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_other_status_is_api_error() {
        let e = ProviderError::from_status(Provider::OpenAi, 500, "boom".into());
        assert_eq!(e.kind(), ErrorKind::Other);
        assert_eq!(e.to_string(), "OpenAI API returned 500: boom");
    }

    #[test]
    fn test_missing_key_message() {
        let e = ProviderError::MissingApiKey {
            provider: Provider::OpenAi,
        };
        assert_eq!(
            e.to_string(),
            "OPENAI_API_KEY not set in environment variables"
        );
        assert_eq!(e.provider(), Provider::OpenAi);
        assert_eq!(e.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_rate_limit_message_names_provider() {
        let e = ProviderError::from_status(Provider::OpenAi, 429, String::new());
        assert!(e.to_string().starts_with("OpenAI API rate limit exceeded"));
    }
}
