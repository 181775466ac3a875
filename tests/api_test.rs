use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use serde_json::{json, Value};
use tower::ServiceExt;

use flirtina::models::Role;
use flirtina::providers::{
    ChatProvider, ChatRequest, ChatResponse, ImageProvider, ImageRequest, ProviderError,
};
use flirtina::server::{create_router, AppState};
use flirtina::services::image_proxy::DEFAULT_IMAGE_MODELS;
use flirtina::services::{ImageProxy, LlmProxy, RateLimiter};

struct MockChatProvider {
    requests: Mutex<Vec<ChatRequest>>,
}

#[async_trait::async_trait]
impl ChatProvider for MockChatProvider {
    async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        Ok(ChatResponse {
            content: "Hey there, cutie!".to_string(),
            model,
        })
    }
}

struct FailingChatProvider;

#[async_trait::async_trait]
impl ChatProvider for FailingChatProvider {
    async fn send_message(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::InvalidResponse(
            "Invalid response format from API".to_string(),
        ))
    }
}

/// Only the second default model produces an image.
struct SecondModelImageProvider;

#[async_trait::async_trait]
impl ImageProvider for SecondModelImageProvider {
    async fn generate(&self, request: ImageRequest) -> Result<Bytes, ProviderError> {
        if request.model == DEFAULT_IMAGE_MODELS[1] {
            Ok(Bytes::from_static(b"jpeg-bytes"))
        } else {
            Err(ProviderError::RequestFailed(
                "HTTP 503: Model is currently loading".to_string(),
            ))
        }
    }
}

struct BrokenImageProvider;

#[async_trait::async_trait]
impl ImageProvider for BrokenImageProvider {
    async fn generate(&self, request: ImageRequest) -> Result<Bytes, ProviderError> {
        Err(ProviderError::RequestFailed(format!(
            "HTTP 500: {} is down",
            request.model
        )))
    }
}

fn state_with(chat: Arc<dyn ChatProvider>, image: Arc<dyn ImageProvider>, keys: bool) -> AppState {
    let key = |k: &str| keys.then(|| k.to_string());
    AppState::new(
        Arc::new(LlmProxy::new(chat, key("gemini-key"), "gemini-2.0-flash-exp")),
        Arc::new(ImageProxy::new(image, key("hf-key"), Vec::new())),
        Arc::new(RateLimiter::in_memory()),
    )
}

fn app() -> Router {
    create_router(state_with(
        Arc::new(MockChatProvider {
            requests: Mutex::new(Vec::new()),
        }),
        Arc::new(SecondModelImageProvider),
        true,
    ))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn history_with_user_messages(count: usize) -> Vec<Value> {
    (0..count)
        .flat_map(|i| {
            [
                json!({"role": "user", "content": format!("question {}", i)}),
                json!({"role": "assistant", "content": format!("answer {}", i)}),
            ]
        })
        .collect()
}

#[tokio::test]
async fn given_running_server_when_health_check_then_returns_healthy() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "healthy"}));
}

#[tokio::test]
async fn given_valid_message_when_chat_then_returns_reply() {
    let chat = Arc::new(MockChatProvider {
        requests: Mutex::new(Vec::new()),
    });
    let app = create_router(state_with(chat.clone(), Arc::new(SecondModelImageProvider), true));

    let response = app
        .oneshot(post_json(
            "/api/chat",
            json!({
                "message": "How was your day?",
                "messageHistory": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "Something went wrong", "isError": true},
                    {"role": "assistant", "content": "hey you"}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["response"], "Hey there, cutie!");

    let requests = chat.requests.lock().unwrap();
    let contents: Vec<&str> = requests[0].messages[2..]
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["hi", "hey you", "How was your day?"]);
    assert_eq!(requests[0].messages.last().unwrap().role, Role::User);
}

#[tokio::test]
async fn given_get_request_when_chat_then_method_not_allowed() {
    let response = app()
        .oneshot(Request::builder().uri("/api/chat").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_body(response).await["error"], "Method not allowed");
}

#[tokio::test]
async fn given_options_request_when_chat_then_returns_ok() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/chat")
                .header(header::ORIGIN, "https://flirtina.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn given_missing_message_when_chat_then_bad_request() {
    let response = app()
        .oneshot(post_json("/api/chat", json!({"messageHistory": []})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Message is required"}));
}

#[tokio::test]
async fn given_malformed_body_when_chat_then_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn given_abusive_message_when_chat_then_content_violation() {
    let response = app()
        .oneshot(post_json("/api/chat", json!({"message": "test message 1"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "CONTENT_VIOLATION");
}

#[tokio::test]
async fn given_fifteen_user_messages_when_chat_then_limit_exceeded() {
    let response = app()
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "one more?", "messageHistory": history_with_user_messages(15)}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "MESSAGE_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn given_fourteen_user_messages_when_chat_then_accepted() {
    let response = app()
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "one more?", "messageHistory": history_with_user_messages(14)}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn given_eleven_requests_in_a_minute_when_chat_then_rate_limited() {
    let app = app();

    for i in 0..10 {
        let response = app
            .clone()
            .oneshot(post_json("/api/chat", json!({"message": format!("hello number {}", i)})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {}", i + 1);
    }

    let response = app
        .clone()
        .oneshot(post_json("/api/chat", json!({"message": "one too many"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(response).await["code"], "RATE_LIMIT_EXCEEDED");

    // A different client is unaffected.
    let mut request = post_json("/api/chat", json!({"message": "hello there"}));
    request
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.1".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn given_missing_api_key_when_chat_then_server_error() {
    let app = create_router(state_with(
        Arc::new(MockChatProvider {
            requests: Mutex::new(Vec::new()),
        }),
        Arc::new(SecondModelImageProvider),
        false,
    ));

    let response = app
        .oneshot(post_json("/api/chat", json!({"message": "hello there"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "API key not configured");
}

#[tokio::test]
async fn given_malformed_upstream_reply_when_chat_then_server_error() {
    let app = create_router(state_with(
        Arc::new(FailingChatProvider),
        Arc::new(SecondModelImageProvider),
        true,
    ));

    let response = app
        .oneshot(post_json("/api/chat", json!({"message": "hello there"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Invalid response format from API"));
}

#[tokio::test]
async fn given_first_model_failing_when_image_then_second_model_used() {
    let response = app()
        .oneshot(post_json("/api/image", json!({"prompt": "a sunset over the sea"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["model"], DEFAULT_IMAGE_MODELS[1]);
    assert_eq!(body["prompt"], "a sunset over the sea");
    assert_eq!(body["imageData"], "anBlZy1ieXRlcw==");
}

#[tokio::test]
async fn given_netlify_path_when_image_then_same_handler() {
    let response = app()
        .oneshot(post_json(
            "/.netlify/functions/image-generation",
            json!({"prompt": "a cat", "model": "stabilityai/stable-diffusion-xl-base-1.0"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["model"], DEFAULT_IMAGE_MODELS[1]);
}

#[tokio::test]
async fn given_missing_prompt_when_image_then_bad_request() {
    let response = app()
        .oneshot(post_json("/api/image", json!({"model": "x/y"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Prompt is required");
}

#[tokio::test]
async fn given_all_models_failing_when_image_then_failure_body() {
    let app = create_router(state_with(
        Arc::new(FailingChatProvider),
        Arc::new(BrokenImageProvider),
        true,
    ));

    let response = app
        .oneshot(post_json("/api/image", json!({"prompt": "a cat"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"],
        format!("HTTP 500: {} is down", DEFAULT_IMAGE_MODELS[1])
    );
}
