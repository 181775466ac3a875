use std::sync::Arc;

use crate::services::abuse::{ContentClassifier, PatternClassifier};
use crate::services::image_proxy::ImageProxy;
use crate::services::llm_proxy::LlmProxy;
use crate::services::rate_limit::RateLimiter;

/// Server-side cap on user messages per conversation, checked against the
/// history the client sends.
pub const MESSAGE_LIMIT: usize = 15;

#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<LlmProxy>,
    pub images: Arc<ImageProxy>,
    pub rate_limiter: Arc<RateLimiter>,
    pub classifier: Arc<dyn ContentClassifier>,
    pub message_limit: usize,
}

impl AppState {
    pub fn new(llm: Arc<LlmProxy>, images: Arc<ImageProxy>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            llm,
            images,
            rate_limiter,
            classifier: Arc::new(PatternClassifier::new()),
            message_limit: MESSAGE_LIMIT,
        }
    }
}
