//! Pluggable chat assistant backend
//!
//! # Architecture
//!
//! - `ChatBackend` trait: the operations every backend supports
//! - `ChatClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (openai_compatible, mock). Default: openai_compatible
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

mod context;
mod mock;
mod openai_compatible;

pub use context::{AccountLine, FinancialContext, GoalLine};
pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ChatMessage, ChatRole};

/// Most recent messages sent to the backend per reply
pub const MAX_HISTORY: usize = 20;

/// Reply stored when no backend is configured
pub const NOT_CONFIGURED_REPLY: &str =
    "The assistant is not configured. Set AI_BACKEND or OPENAI_COMPATIBLE_HOST to enable replies.";

/// Heading that introduces shared financial data in the system prompt
pub const CONTEXT_HEADING: &str = "User's financial summary:";

const BASE_PROMPT: &str = "You are Tally, a personal finance assistant. \
Answer concisely and practically. Never invent numbers you were not given.";

/// One turn of conversation sent to a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl From<&ChatMessage> for ChatTurn {
    fn from(m: &ChatMessage) -> Self {
        Self {
            role: m.role,
            content: m.content.clone(),
        }
    }
}

/// System prompt, with the financial summary only when one is given
pub fn system_prompt(context: Option<&FinancialContext>) -> String {
    match context {
        Some(ctx) => format!("{}\n\n{}\n{}", BASE_PROMPT, CONTEXT_HEADING, ctx.render()),
        None => format!(
            "{}\nYou do not have access to the user's accounts or transactions.",
            BASE_PROMPT
        ),
    }
}

/// The last `MAX_HISTORY` messages as backend turns
pub fn recent_turns(messages: &[ChatMessage]) -> Vec<ChatTurn> {
    let start = messages.len().saturating_sub(MAX_HISTORY);
    messages[start..].iter().map(ChatTurn::from).collect()
}

/// Next assistant reply for a chat history
///
/// `context` is only passed when the chat shares financial data. Without a
/// backend the fixed not-configured reply is returned.
pub async fn reply(
    client: Option<&ChatClient>,
    context: Option<&FinancialContext>,
    history: &[ChatMessage],
) -> Result<String> {
    let Some(client) = client else {
        return Ok(NOT_CONFIGURED_REPLY.to_string());
    };

    let system = system_prompt(context);
    let turns = recent_turns(history);
    tracing::debug!(
        model = client.model(),
        turns = turns.len(),
        with_context = context.is_some(),
        "Requesting chat completion"
    );
    client.complete(&system, &turns).await
}

/// Trait defining the interface for all chat backends
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Produce the assistant's next reply
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete chat client enum
#[derive(Clone)]
pub enum ChatClient {
    /// OpenAI-compatible backend (vLLM, LocalAI, llama-server, hosted APIs)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl ChatClient {
    /// Create a chat client from environment variables
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("AI_BACKEND").unwrap_or_else(|_| "openai_compatible".to_string());

        match backend.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(ChatClient::OpenAICompatible)
            }
            "mock" => Some(ChatClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to openai_compatible");
                OpenAICompatibleBackend::from_env().map(ChatClient::OpenAICompatible)
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ChatClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String> {
        match self {
            ChatClient::OpenAICompatible(b) => b.complete(system, turns).await,
            ChatClient::Mock(b) => b.complete(system, turns).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ChatClient::OpenAICompatible(b) => b.health_check().await,
            ChatClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ChatClient::OpenAICompatible(b) => b.model(),
            ChatClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ChatClient::OpenAICompatible(b) => b.host(),
            ChatClient::Mock(b) => b.host(),
        }
    }
}
