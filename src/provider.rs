use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RuntimeConfig;
use crate::error::IconError;
use crate::openai::OpenAiClient;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub text: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// A text model an agent can reason with.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, IconError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub size: String,
    pub quality: String,
    pub n: u32,
}

impl ImageRequest {
    pub fn square(model: &str, prompt: &str, edge: u32, quality: &str) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.to_string(),
            size: format!("{edge}x{edge}"),
            quality: quality.to_string(),
            n: 1,
        }
    }
}

/// Where the generated image can be picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    Url(String),
    Inline(Vec<u8>),
}

/// The external image generation service.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &ImageRequest) -> Result<ImageReference, IconError>;
}

pub fn validate_chat_model(model_name: &str) -> Result<()> {
    let is_valid = model_name.starts_with("gpt-")
        || model_name.starts_with("o1")
        || model_name.starts_with("o3")
        || model_name.starts_with("o4");
    if is_valid {
        return Ok(());
    }
    Err(anyhow::anyhow!(
        "chat model '{}' is not an OpenAI chat model (expected gpt-*, o1*, o3* or o4*)",
        model_name
    ))
}

pub fn validate_image_model(model_name: &str) -> Result<()> {
    if model_name.starts_with("dall-e-") || model_name.starts_with("gpt-image-") {
        return Ok(());
    }
    Err(anyhow::anyhow!(
        "image model '{}' is not an OpenAI image model (expected dall-e-* or gpt-image-*)",
        model_name
    ))
}

pub fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

/// Build the shared OpenAI client used for both the stylist's chat model and
/// image generation.
pub fn resolve_openai_client(cfg: &RuntimeConfig) -> Result<Arc<OpenAiClient>> {
    validate_chat_model(&cfg.chat_model)?;
    validate_image_model(&cfg.image_model)?;
    let api_key = std::env::var(OPENAI_API_KEY_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .context("OPENAI_API_KEY is required for chat and image generation")?;
    let client = OpenAiClient::new(
        api_key,
        &cfg.api_base_url,
        &cfg.chat_model,
        Duration::from_secs(cfg.request_timeout_secs),
    )?;
    Ok(Arc::new(client))
}
