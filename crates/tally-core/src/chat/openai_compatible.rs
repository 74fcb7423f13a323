//! Chat completions over the OpenAI wire format
//!
//! Any server speaking `POST /v1/chat/completions` works: llama.cpp's
//! llama-server, vLLM, LocalAI or a hosted provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::{ChatBackend, ChatTurn};

pub const HOST_ENV: &str = "OPENAI_COMPATIBLE_HOST";
pub const MODEL_ENV: &str = "OPENAI_COMPATIBLE_MODEL";
pub const API_KEY_ENV: &str = "OPENAI_COMPATIBLE_API_KEY";

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Sampling temperature for every reply
const TEMPERATURE: f32 = 0.3;

/// Probed in order by [`ChatBackend::health_check`]
const HEALTH_PATHS: &[&str] = &["/v1/models", "/health"];

#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Backend from `OPENAI_COMPATIBLE_*`; `None` without a host
    pub fn from_env() -> Option<Self> {
        let host = std::env::var(HOST_ENV).ok().filter(|h| !h.trim().is_empty())?;
        let model = std::env::var(MODEL_ENV)
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Some(Self::new(&host, &model, std::env::var(API_KEY_ENV).ok()))
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn request_body<'a>(&'a self, system: &'a str, turns: &'a [ChatTurn]) -> CompletionRequest<'a> {
        let messages = std::iter::once(WireMessage {
            role: "system",
            content: system,
        })
        .chain(turns.iter().map(|turn| WireMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }))
        .collect();

        CompletionRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
            stream: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    /// First non-blank choice
    fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .find(|text| !text.is_empty())
    }
}

#[async_trait]
impl ChatBackend for OpenAICompatibleBackend {
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String> {
        let mut request = self
            .client
            .post(self.completions_url())
            .json(&self.request_body(system, turns));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(format!(
                "{} returned {}: {}",
                self.base_url,
                status,
                body.trim()
            )));
        }

        let parsed: CompletionResponse = response.json().await?;
        debug!(model = %self.model, turns = turns.len(), "Chat completion received");

        parsed
            .into_text()
            .ok_or_else(|| Error::Chat(format!("{} returned an empty completion", self.base_url)))
    }

    async fn health_check(&self) -> bool {
        for path in HEALTH_PATHS {
            let url = format!("{}{}", self.base_url, path);
            if let Ok(resp) = self.client.get(&url).send().await {
                if resp.status().is_success() {
                    return true;
                }
            }
        }
        false
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
