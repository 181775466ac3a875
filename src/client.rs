use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::models::Message;
use crate::server::types::{
    ChatResponseBody, ErrorBody, HistoryEntry, ImageRequestBody, ImageResponseBody,
};
use crate::services::backend::{BackendError, ChatBackend, GeneratedImage, ImageBackend};
use crate::services::image_proxy::PLACEHOLDER_MODEL;

/// Talks to a running flirtina server over HTTP.
pub struct ProxyClient {
    client: Client,
    chat_url: Url,
    image_url: Url,
}

impl ProxyClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            chat_url: base.join("api/chat")?,
            image_url: base.join("api/image")?,
        })
    }

    pub fn chat_url(&self) -> &Url {
        &self.chat_url
    }

    pub fn image_url(&self) -> &Url {
        &self.image_url
    }

    async fn post<B, T>(&self, url: &Url, body: &B) -> Result<T, BackendError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<ErrorBody>(&text).ok();
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                code: parsed.as_ref().and_then(|b| b.code.clone()),
                message: parsed
                    .map(|b| b.error)
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingChat<'a> {
    message: &'a str,
    message_history: Vec<HistoryEntry>,
}

fn history_entries(history: &[Message]) -> Vec<HistoryEntry> {
    history
        .iter()
        .map(|m| HistoryEntry {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
            is_error: m.is_error,
        })
        .collect()
}

#[async_trait]
impl ChatBackend for ProxyClient {
    async fn send(&self, message: &str, history: &[Message]) -> Result<String, BackendError> {
        let body = OutgoingChat {
            message,
            message_history: history_entries(history),
        };
        let reply: ChatResponseBody = self.post(&self.chat_url, &body).await?;
        Ok(reply.response)
    }
}

#[async_trait]
impl ImageBackend for ProxyClient {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, BackendError> {
        let body = ImageRequestBody {
            prompt: Some(prompt.to_string()),
            model: None,
            parameters: None,
        };
        let reply: ImageResponseBody = self.post(&self.image_url, &body).await?;

        match (reply.success, reply.image_data) {
            (true, Some(image_data)) if !image_data.is_empty() => {
                let model = reply.model.unwrap_or_default();
                Ok(GeneratedImage {
                    image_data,
                    prompt: reply.prompt.unwrap_or_else(|| prompt.to_string()),
                    degraded: model == PLACEHOLDER_MODEL,
                    model,
                })
            }
            _ => Err(BackendError::InvalidResponse(
                reply
                    .error
                    .unwrap_or_else(|| "Image response carried no image".to_string()),
            )),
        }
    }
}
