use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;

use crate::models::Role;
use crate::providers::ChatMessage;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::server::types::{ChatRequestBody, ChatResponseBody};
use crate::services::proxy_error::ProxyError;
use crate::telemetry::sanitize_prompt;

/// Identifier the rate limiter buckets a caller under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientKey(client_key(&parts.headers, peer)))
    }
}

/// First forwarded address, then `x-real-ip`, then the socket peer.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[tracing::instrument(skip(state, body))]
pub async fn chat_handler(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    body: Result<Json<ChatRequestBody>, JsonRejection>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    if !state.rate_limiter.allow(&client, Utc::now()).await {
        return Err(ApiError::RateLimited);
    }

    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let message = body
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Message is required".to_string()))?;

    tracing::debug!(message = %sanitize_prompt(&message, 100), history = body.message_history.len(), "Chat request");

    let verdict = state.classifier.classify(&message);
    if !verdict.allowed {
        tracing::info!(reason = ?verdict.reason, "Message rejected by content filter");
        return Err(ApiError::ContentViolation);
    }

    let history: Vec<ChatMessage> = body
        .message_history
        .iter()
        .filter_map(|entry| entry.to_chat_message())
        .collect();

    let user_messages = history.iter().filter(|m| m.role == Role::User).count();
    if user_messages >= state.message_limit {
        return Err(ApiError::MessageLimitExceeded);
    }

    match state.llm.reply(&message, &history).await {
        Ok(response) => Ok(Json(ChatResponseBody { response })),
        Err(ProxyError::MissingApiKey) => Err(ApiError::NotConfigured),
        Err(ProxyError::Upstream(e)) => Err(ApiError::Upstream(e.to_string())),
    }
}
