use async_trait::async_trait;
use thiserror::Error;

use crate::models::Message;
use crate::services::proxy_error::ProxyError;

/// Failure of a chat or image round trip as seen by the session controller.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    /// Base64-encoded image bytes.
    pub image_data: String,
    pub prompt: String,
    pub model: String,
    /// Set when the image is the local placeholder rather than a real generation.
    pub degraded: bool,
}

/// Where the session sends chat turns: the proxy in-process, or a remote server.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, message: &str, history: &[Message]) -> Result<String, BackendError>;
}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, BackendError>;
}
