//! Mock provider: deterministic responses for running without an API key.

use anyhow::Result;
use async_trait::async_trait;
use ava_core::{ChatMessage, Generator, Role};

#[derive(Debug, Clone)]
pub struct MockProvider {
    model: String,
}

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Generator for MockProvider {
    async fn generate_response(&self, messages: &[ChatMessage]) -> Result<String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(format!("(Mock {} response) You said: {}", self.model, last_user))
    }
}
