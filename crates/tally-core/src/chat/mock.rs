//! Mock backend for testing
//!
//! Echoes the latest user message so tests can assert on replies without a
//! running LLM server.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::ChatRole;

use super::{ChatBackend, ChatTurn, CONTEXT_HEADING};

/// Mock chat backend
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self { healthy: true }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self { healthy: false }
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String> {
        if !self.healthy {
            return Err(Error::Chat("Mock backend is unhealthy".to_string()));
        }

        let last = turns
            .iter()
            .rev()
            .find(|t| t.role == ChatRole::User)
            .map(|t| t.content.as_str())
            .unwrap_or("");

        let mut reply = format!("Mock reply to: {}", last);
        if system.contains(CONTEXT_HEADING) {
            reply.push_str(" (with financial context)");
        }
        Ok(reply)
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
