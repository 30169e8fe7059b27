//! External text-generation service
//!
//! `NarrativeService` is the seam; `ChatCompletionClient` talks to any
//! OpenAI-compatible `/chat/completions` endpoint.

use crate::error::{BloomError, BloomResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait NarrativeService: Send + Sync {
    /// Complete `prompt`, returning the raw reply text
    async fn complete(&self, prompt: &str) -> BloomResult<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatClientConfig {
    /// Base URL, e.g. `https://openrouter.ai/api/v1`
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatClientConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            temperature: 0.7,
            max_tokens: 800,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

pub struct ChatCompletionClient {
    http: reqwest::Client,
    config: ChatClientConfig,
}

impl ChatCompletionClient {
    pub fn new(config: ChatClientConfig) -> BloomResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BloomError::ExternalService(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl NarrativeService for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> BloomResult<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.http.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BloomError::ExternalService(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BloomError::ExternalService(format!(
                "{} returned {}",
                self.endpoint(),
                status
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BloomError::ExternalService(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| BloomError::ExternalService("reply had no choices".to_string()))
    }
}

/// Outermost `{...}` span of a reply that may wrap JSON in prose or fences
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
