use async_trait::async_trait;
use bytes::Bytes;

use super::types::{ChatRequest, ChatResponse, ImageRequest, ProviderError};

/// Upstream chat-completion API.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Upstream text-to-image API. Returns the raw encoded image.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, request: ImageRequest) -> Result<Bytes, ProviderError>;
}
