use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use super::models::*;
use crate::providers::traits::ImageProvider;
use crate::providers::types::*;

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";
const MAX_ERROR_LENGTH: usize = 200;

pub struct HuggingFaceProvider {
    client: Client,
    base_url: String,
}

impl HuggingFaceProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Inference errors come back as `{"error": "..."}`; anything else is cut short.
    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        let detail = serde_json::from_str::<InferenceError>(body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| body.trim().to_string());

        if detail.is_empty() {
            return format!("HTTP {}", status.as_u16());
        }

        let detail: String = if detail.chars().count() > MAX_ERROR_LENGTH {
            let cut: String = detail.chars().take(MAX_ERROR_LENGTH).collect();
            format!("{}...", cut)
        } else {
            detail
        };
        format!("HTTP {}: {}", status.as_u16(), detail)
    }
}

impl Default for HuggingFaceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageProvider for HuggingFaceProvider {
    #[tracing::instrument(skip_all, fields(model = %request.model))]
    async fn generate(&self, request: ImageRequest) -> Result<Bytes, ProviderError> {
        let url = format!("{}/models/{}", self.base_url, request.model);
        let body = InferenceRequest {
            inputs: &request.prompt,
            parameters: &request.parameters,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), model = %request.model, "Image model request failed");
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if bytes.is_empty() {
            return Err(ProviderError::EmptyPayload);
        }

        Ok(bytes)
    }
}
