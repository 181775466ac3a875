use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers::{
    chat_handler, health_handler, image_handler, method_not_allowed_handler, preflight_handler,
};
use super::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let chat = post(chat_handler)
        .options(preflight_handler)
        .fallback(method_not_allowed_handler);
    let image = post(image_handler)
        .options(preflight_handler)
        .fallback(method_not_allowed_handler);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", chat.clone())
        .route("/api/image", image.clone())
        // Paths used by the hosted frontend.
        .route("/.netlify/functions/chat", chat)
        .route("/.netlify/functions/image-generation", image)
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
