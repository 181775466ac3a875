use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::{Map, Value};

use crate::providers::{ImageProvider, ImageRequest, ProviderError};
use crate::services::backend::{BackendError, GeneratedImage, ImageBackend};
use crate::services::proxy_error::ProxyError;

pub const DEFAULT_IMAGE_MODELS: [&str; 2] = [
    "black-forest-labs/FLUX.1-dev",
    "stabilityai/stable-diffusion-xl-base-1.0",
];

/// Model id reported for the locally generated placeholder image.
pub const PLACEHOLDER_MODEL: &str = "test-fallback";

const PLACEHOLDER_SIZE: u32 = 512;
const PLACEHOLDER_START: [u8; 3] = [0xFF, 0x6B, 0x9D];
const PLACEHOLDER_END: [u8; 3] = [0xC4, 0x45, 0x69];

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub image_data: String,
    pub model: String,
    pub degraded: bool,
}

/// Prompt to image, trying each configured model in turn.
pub struct ImageProxy {
    provider: Arc<dyn ImageProvider>,
    api_key: Option<String>,
    models: Vec<String>,
    dev_placeholder: bool,
}

impl ImageProxy {
    pub fn new(provider: Arc<dyn ImageProvider>, api_key: Option<String>, models: Vec<String>) -> Self {
        let models = if models.is_empty() {
            DEFAULT_IMAGE_MODELS.iter().map(|m| m.to_string()).collect()
        } else {
            models
        };
        Self {
            provider,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            models,
            dev_placeholder: false,
        }
    }

    /// Answer with a synthesised image when every model fails. Development only.
    pub fn with_dev_placeholder(mut self, enabled: bool) -> Self {
        self.dev_placeholder = enabled;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// The override (if any) first, then the configured models, without repeats.
    pub fn candidate_models(&self, model_override: Option<&str>) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::with_capacity(self.models.len() + 1);
        let preferred = model_override
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        for model in preferred.into_iter().chain(self.models.iter().cloned()) {
            if !candidates.contains(&model) {
                candidates.push(model);
            }
        }
        candidates
    }

    /// Default generation parameters with the caller's keys laid over them.
    pub fn merge_parameters(overrides: Option<Map<String, Value>>) -> Map<String, Value> {
        let mut parameters = Map::new();
        parameters.insert("width".to_string(), PLACEHOLDER_SIZE.into());
        parameters.insert("height".to_string(), PLACEHOLDER_SIZE.into());
        parameters.insert("num_inference_steps".to_string(), 20.into());
        if let Some(overrides) = overrides {
            parameters.extend(overrides);
        }
        parameters
    }

    #[tracing::instrument(skip_all, fields(prompt = %crate::telemetry::sanitize_prompt(prompt, 60)))]
    pub async fn generate(
        &self,
        prompt: &str,
        model_override: Option<&str>,
        parameters: Option<Map<String, Value>>,
    ) -> Result<EncodedImage, ProxyError> {
        let api_key = self.api_key.clone().ok_or(ProxyError::MissingApiKey)?;
        let parameters = Self::merge_parameters(parameters);

        let mut last_error = None;
        for model in self.candidate_models(model_override) {
            let request = ImageRequest {
                api_key: api_key.clone(),
                model: model.clone(),
                prompt: prompt.to_string(),
                parameters: parameters.clone(),
            };

            match self.provider.generate(request).await {
                Ok(bytes) => {
                    tracing::info!(model = %model, bytes = bytes.len(), "Image generated");
                    return Ok(EncodedImage {
                        image_data: STANDARD.encode(&bytes),
                        model,
                        degraded: false,
                    });
                }
                Err(e) => {
                    tracing::warn!(model = %model, "Image model failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| ProviderError::RequestFailed("No image models configured".to_string()));

        if self.dev_placeholder {
            match placeholder_jpeg() {
                Ok(bytes) => {
                    tracing::warn!("All image models failed, returning placeholder image");
                    return Ok(EncodedImage {
                        image_data: STANDARD.encode(bytes),
                        model: PLACEHOLDER_MODEL.to_string(),
                        degraded: true,
                    });
                }
                Err(e) => tracing::error!("Failed to build placeholder image: {}", e),
            }
        }

        Err(error.into())
    }
}

/// Diagonal pink gradient, JPEG encoded.
fn placeholder_jpeg() -> image::ImageResult<Vec<u8>> {
    let max = (PLACEHOLDER_SIZE - 1) * 2;
    let gradient = RgbImage::from_fn(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, |x, y| {
        let t = (x + y) as f32 / max as f32;
        let channel = |i: usize| {
            let start = PLACEHOLDER_START[i] as f32;
            let end = PLACEHOLDER_END[i] as f32;
            (start + (end - start) * t).round() as u8
        };
        Rgb([channel(0), channel(1), channel(2)])
    });

    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, 80);
    encoder.encode_image(&DynamicImage::ImageRgb8(gradient))?;
    Ok(bytes)
}

#[async_trait]
impl ImageBackend for ImageProxy {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, BackendError> {
        let image = ImageProxy::generate(self, prompt, None, None).await?;
        Ok(GeneratedImage {
            image_data: image.image_data,
            prompt: prompt.to_string(),
            model: image.model,
            degraded: image.degraded,
        })
    }
}
