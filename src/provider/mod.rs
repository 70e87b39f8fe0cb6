//! Text-generation provider abstraction.
//!
//! One trait, one implementing variant per wire format, selected from
//! configuration at call time. Every variant normalizes its results and
//! errors to the shared shapes here, and none of them ever retries: a failed
//! call surfaces directly, because a silent retry could double-charge a paid
//! API call.

pub mod anthropic;
pub mod chat;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;

pub use anthropic::AnthropicProvider;
pub use chat::ChatProvider;

/// Normalized token accounting for one generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

/// A normalized completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
}

/// Capability contract for interchangeable text-generation backends.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Send the full generation request and return the normalized result.
    async fn send_completion(&self, prompt: &str) -> Result<Completion, ProviderError>;

    /// Validate credentials and reachability with a minimal fixed payload,
    /// without consuming the caller's actual prompt.
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Build the provider variant for a config.
pub fn build(
    config: &ProviderConfig,
    system_prompt: Option<String>,
) -> Result<Box<dyn Provider>, ProviderError> {
    match config.kind {
        ProviderKind::Anthropic => {
            AnthropicProvider::new(config, system_prompt).map(|p| Box::new(p) as Box<dyn Provider>)
        }
        ProviderKind::OpenAi | ProviderKind::DeepSeek | ProviderKind::Zhipu => {
            ChatProvider::new(config, system_prompt).map(|p| Box::new(p) as Box<dyn Provider>)
        }
    }
}

/// Build the configured provider and run its connection test.
pub async fn test_connection(config: &ProviderConfig) -> Result<(), ProviderError> {
    build(config, None)?.test_connection().await
}

/// Map a non-success HTTP status to the uniform error taxonomy.
pub(crate) fn status_error(provider: &str, status: u16, body: &str) -> ProviderError {
    let provider = provider.to_string();
    let detail = truncate_detail(body);
    match status {
        401 | 403 => ProviderError::Authentication {
            provider,
            status,
            detail,
        },
        429 => ProviderError::RateLimited {
            provider,
            status,
            detail,
        },
        500..=599 => ProviderError::BackendServer {
            provider,
            status,
            detail,
        },
        _ => ProviderError::BackendServer {
            provider,
            status,
            detail: format!("unexpected status: {detail}"),
        },
    }
}

/// Map a transport failure. Timeouts and connection failures are both
/// network errors; a hung backend surfaces here instead of hanging us.
pub(crate) fn transport_error(
    provider: &str,
    timeout: Duration,
    err: reqwest::Error,
) -> ProviderError {
    let detail = if err.is_timeout() {
        format!("request timed out after {}s", timeout.as_secs())
    } else {
        err.to_string()
    };
    ProviderError::Network {
        provider: provider.to_string(),
        detail,
    }
}

pub(crate) fn shape_error(provider: &str, detail: impl Into<String>) -> ProviderError {
    ProviderError::ResponseShape {
        provider: provider.to_string(),
        detail: detail.into(),
    }
}

/// Mask a credential for logs, keeping only the last 4 characters.
pub(crate) fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        "****".to_string()
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{tail}")
    }
}

fn truncate_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    trimmed.chars().take(500).collect()
}
