use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Message, Role};
use crate::prompts::{PERSONA_ACKNOWLEDGEMENT, PERSONA_INSTRUCTION};
use crate::providers::{ChatMessage, ChatProvider, ChatRequest, GenerationConfig};
use crate::services::backend::{BackendError, ChatBackend};
use crate::services::proxy_error::ProxyError;

/// Number of trailing history entries forwarded upstream.
pub const HISTORY_WINDOW: usize = 8;

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash-exp";

/// Turns a user message plus history into one upstream completion call.
pub struct LlmProxy {
    provider: Arc<dyn ChatProvider>,
    api_key: Option<String>,
    model: String,
    generation: GenerationConfig,
}

impl LlmProxy {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Persona pair, then the recent history, then the new message.
    pub fn build_messages(message: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        let recent = history[start..]
            .iter()
            .filter(|m| !m.is_error && !m.content.trim().is_empty())
            .cloned();

        let mut messages = vec![
            ChatMessage::new(Role::User, PERSONA_INSTRUCTION),
            ChatMessage::new(Role::Assistant, PERSONA_ACKNOWLEDGEMENT),
        ];
        messages.extend(recent);
        messages.push(ChatMessage::new(Role::User, message));
        messages
    }

    pub async fn reply(&self, message: &str, history: &[ChatMessage]) -> Result<String, ProxyError> {
        let api_key = self.api_key.clone().ok_or(ProxyError::MissingApiKey)?;

        let request = ChatRequest {
            api_key,
            model: self.model.clone(),
            messages: Self::build_messages(message, history),
            generation: self.generation,
        };

        match self.provider.send_message(request).await {
            Ok(response) => Ok(response.content),
            Err(e) => {
                tracing::error!("Chat completion failed: {}", e);
                Err(e.into())
            }
        }
    }
}

/// Convert stored messages to the provider's message shape.
pub fn messages_to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: m.content.clone(),
            is_error: m.is_error,
        })
        .collect()
}

#[async_trait]
impl ChatBackend for LlmProxy {
    async fn send(&self, message: &str, history: &[Message]) -> Result<String, BackendError> {
        Ok(self
            .reply(message, &messages_to_chat_messages(history))
            .await?)
    }
}
