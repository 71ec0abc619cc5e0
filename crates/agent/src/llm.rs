use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use tourlead_core::config::LlmConfig;
use tourlead_core::domain::message::MessageRole;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub system: String,
    /// Oldest first.
    pub turns: Vec<ChatTurn>,
    /// Tenant-owned key used instead of the platform key for this call.
    pub api_key_override: Option<SecretString>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Messages API client. One platform key from configuration, optionally replaced per
/// call by a tenant key.
#[derive(Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    api_key: Option<SecretString>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building model-service HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let api_key = request
            .api_key_override
            .as_ref()
            .or(self.api_key.as_ref())
            .ok_or_else(|| anyhow!("no model-service key configured"))?;

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&serde_json::json!({
                "model": &self.model,
                "max_tokens": self.max_tokens,
                "system": &request.system,
                "messages": &request.turns,
            }))
            .send()
            .await
            .context("model-service request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("model service returned {status}: {body}"));
        }

        let parsed: MessagesResponse =
            response.json().await.context("decoding model-service response")?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(anyhow!("model service returned an empty reply"));
        }
        Ok(text)
    }
}
