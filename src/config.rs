use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::services::image_proxy::DEFAULT_IMAGE_MODELS;
use crate::services::llm_proxy::DEFAULT_CHAT_MODEL;

pub const DEFAULT_PORT: u16 = 8888;

/// Server settings read from the environment.
#[derive(Clone)]
pub struct Settings {
    pub host: IpAddr,
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub hugging_face_api_key: Option<String>,
    pub chat_model: String,
    pub image_models: Vec<String>,
    pub dev_placeholder: bool,
    pub environment: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = match get("FLIRTINA_HOST") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid FLIRTINA_HOST, using 0.0.0.0");
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            }),
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let port = get("FLIRTINA_PORT")
            .or_else(|| get("PORT"))
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let image_models = get("FLIRTINA_IMAGE_MODELS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|models| !models.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_MODELS.iter().map(|m| m.to_string()).collect());

        let dev_placeholder = get("FLIRTINA_DEV_PLACEHOLDER")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Self {
            host,
            port,
            gemini_api_key: get("GEMINI_API_KEY").or_else(|| get("VITE_GEMINI_API_KEY")),
            hugging_face_api_key: get("HUGGING_FACE_API_KEY"),
            chat_model: get("FLIRTINA_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            image_models,
            dev_placeholder,
            environment: get("APP_ENV").unwrap_or_else(|| "development".to_string()),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| if key.is_some() { "***" } else { "<unset>" };
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("hugging_face_api_key", &redact(&self.hugging_face_api_key))
            .field("chat_model", &self.chat_model)
            .field("image_models", &self.image_models)
            .field("dev_placeholder", &self.dev_placeholder)
            .field("environment", &self.environment)
            .finish()
    }
}
