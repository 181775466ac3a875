use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::server::error::ApiError;
use crate::server::types::HealthResponse;

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
        }),
    )
}

/// Plain `OPTIONS` requests; CORS preflights are answered by the CORS layer.
pub async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed_handler() -> ApiError {
    ApiError::MethodNotAllowed
}
