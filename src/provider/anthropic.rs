//! Anthropic messages-API adapter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

use super::{Completion, Provider, TokenUsage, mask_key, shape_error, status_error, transport_error};

const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The messages API requires an explicit completion budget.
const MAX_COMPLETION_TOKENS: u32 = 4096;
const TEST_TIMEOUT: Duration = Duration::from_secs(10);
const TEST_MAX_TOKENS: u32 = 8;

pub struct AnthropicProvider {
    name: &'static str,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    system_prompt: Option<String>,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<UserMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    temperature: f32,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl From<MessagesUsage> for TokenUsage {
    fn from(u: MessagesUsage) -> Self {
        TokenUsage {
            prompt: u.input_tokens,
            completion: u.output_tokens,
            total: u.input_tokens + u.output_tokens,
        }
    }
}

impl AnthropicProvider {
    pub fn new(
        config: &ProviderConfig,
        system_prompt: Option<String>,
    ) -> Result<Self, ProviderError> {
        let name = config.kind.display_name();
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Network {
                provider: name.to_string(),
                detail: e.to_string(),
            })?;

        let base = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.kind.default_base_url().to_string());
        let endpoint = format!("{}/v1/messages", base.trim_end_matches('/'));

        Ok(Self {
            name,
            client,
            endpoint,
            api_key: config.api_key.clone(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| config.kind.default_model().to_string()),
            temperature: config.temperature,
            timeout: config.timeout(),
            system_prompt,
        })
    }

    async fn request(
        &self,
        body: &MessagesRequest<'_>,
        timeout: Duration,
    ) -> Result<MessagesResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingCredential {
                provider: self.name.to_string(),
            });
        }

        debug!(
            provider = self.name,
            endpoint = %self.endpoint,
            model = body.model,
            api_key = %mask_key(&self.api_key),
            "sending messages request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(self.name, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(status_error(self.name, status.as_u16(), &detail));
        }

        response
            .json::<MessagesResponse>()
            .await
            .map_err(|e| shape_error(self.name, e.to_string()))
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn send_completion(&self, prompt: &str) -> Result<Completion, ProviderError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_COMPLETION_TOKENS,
            messages: vec![UserMessage {
                role: "user",
                content: prompt,
            }],
            system: self.system_prompt.as_deref().filter(|s| !s.trim().is_empty()),
            temperature: self.temperature,
        };

        let started = Instant::now();
        let payload = self.request(&body, self.timeout).await?;

        if payload.content.is_empty() {
            return Err(shape_error(self.name, "response contained no content blocks"));
        }
        let content: String = payload
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();
        let usage = payload.usage.map(TokenUsage::from).unwrap_or_default();

        info!(
            provider = self.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            prompt_tokens = usage.prompt,
            completion_tokens = usage.completion,
            "completion received"
        );

        Ok(Completion {
            content: content.trim().to_string(),
            usage,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: TEST_MAX_TOKENS,
            messages: vec![UserMessage {
                role: "user",
                content: "hi",
            }],
            system: None,
            temperature: self.temperature,
        };

        let payload = self.request(&body, self.timeout.min(TEST_TIMEOUT)).await?;
        if payload.content.is_empty() {
            return Err(shape_error(self.name, "response contained no content blocks"));
        }
        Ok(())
    }
}
