//! OpenAI-compatible chat-completions adapter.
//!
//! Serves the OpenAI, DeepSeek and Zhipu backends, which speak the same wire
//! format and differ only in endpoint and default model.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

use super::{Completion, Provider, TokenUsage, mask_key, shape_error, status_error, transport_error};

/// Connection tests cap their own timeout so a hung backend fails fast.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);
const TEST_MAX_TOKENS: u32 = 8;

pub struct ChatProvider {
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
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl From<ChatUsage> for TokenUsage {
    fn from(u: ChatUsage) -> Self {
        TokenUsage {
            prompt: u.prompt_tokens,
            completion: u.completion_tokens,
            total: u.total_tokens,
        }
    }
}

impl ChatProvider {
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
        let endpoint = format!("{}/chat/completions", base.trim_end_matches('/'));

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

    fn messages<'a>(&'a self, prompt: &'a str) -> Vec<ChatMessage<'a>> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        messages
    }

    async fn request(
        &self,
        body: &ChatRequest<'_>,
        timeout: Duration,
    ) -> Result<ChatResponse, ProviderError> {
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
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
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
            .json::<ChatResponse>()
            .await
            .map_err(|e| shape_error(self.name, e.to_string()))
    }
}

#[async_trait]
impl Provider for ChatProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn send_completion(&self, prompt: &str) -> Result<Completion, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: self.messages(prompt),
            temperature: self.temperature,
            max_tokens: None,
        };

        let started = Instant::now();
        let payload = self.request(&body, self.timeout).await?;

        let choice = payload
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| shape_error(self.name, "response contained no choices"))?;
        let usage = payload.usage.map(TokenUsage::from).unwrap_or_default();

        info!(
            provider = self.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            prompt_tokens = usage.prompt,
            completion_tokens = usage.completion,
            "completion received"
        );

        Ok(Completion {
            content: choice.message.content.trim().to_string(),
            usage,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: self.temperature,
            max_tokens: Some(TEST_MAX_TOKENS),
        };

        let payload = self.request(&body, self.timeout.min(TEST_TIMEOUT)).await?;
        if payload.choices.is_empty() {
            return Err(shape_error(self.name, "response contained no choices"));
        }
        Ok(())
    }
}
