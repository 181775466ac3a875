use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::providers::ProviderError;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::server::types::{ImageRequestBody, ImageResponseBody};
use crate::services::proxy_error::ProxyError;
use crate::telemetry::sanitize_prompt;

#[tracing::instrument(skip(state, body))]
pub async fn image_handler(
    State(state): State<AppState>,
    body: Result<Json<ImageRequestBody>, JsonRejection>,
) -> Result<Json<ImageResponseBody>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let prompt = body
        .prompt
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Prompt is required".to_string()))?;

    tracing::debug!(prompt = %sanitize_prompt(&prompt, 100), model = ?body.model, "Image request");

    match state
        .images
        .generate(&prompt, body.model.as_deref(), body.parameters)
        .await
    {
        Ok(image) => Ok(Json(ImageResponseBody {
            success: true,
            image_data: Some(image.image_data),
            prompt: Some(prompt),
            model: Some(image.model),
            error: None,
        })),
        Err(e @ ProxyError::MissingApiKey) => Err(ApiError::ImageFailed(e.to_string())),
        Err(ProxyError::Upstream(e)) => Err(ApiError::ImageFailed(upstream_message(&e))),
    }
}

/// The upstream detail without the error-kind prefix.
fn upstream_message(error: &ProviderError) -> String {
    match error {
        ProviderError::RequestFailed(message)
        | ProviderError::NetworkError(message)
        | ProviderError::InvalidResponse(message)
        | ProviderError::AuthError(message) => message.clone(),
        other => other.to_string(),
    }
}
