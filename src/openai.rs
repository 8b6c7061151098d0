//! OpenAI HTTP client for chat completions and image generation.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::IconError;
use crate::provider::{
    ChatCompletion, ChatMessage, ChatModel, ImageGenerator, ImageReference, ImageRequest,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    chat_model: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        base_url: &str,
        chat_model: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_model: chat_model.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, IconError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| IconError::GenerationService(format!("{path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorEnvelope>(&error_text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(error_text);
            return Err(IconError::GenerationService(format!(
                "{path} returned {status}: {detail}"
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| IconError::GenerationService(format!("{path}: malformed response: {e}")))
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.chat_model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, IconError> {
        let request = ChatCompletionRequest {
            model: &self.chat_model,
            messages,
        };
        let response: ChatCompletionResponse =
            self.post_json("chat/completions", &request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                IconError::GenerationService("chat/completions returned no choices".to_string())
            })?;

        Ok(ChatCompletion {
            text,
            input_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
        })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    fn name(&self) -> &str {
        "openai-images"
    }

    async fn generate(&self, request: &ImageRequest) -> Result<ImageReference, IconError> {
        let response: ImagesResponse = self.post_json("images/generations", request).await?;
        let first = response.data.into_iter().next().ok_or_else(|| {
            IconError::GenerationService("images/generations returned no images".to_string())
        })?;

        if let Some(url) = first.url {
            return Ok(ImageReference::Url(url));
        }
        if let Some(encoded) = first.b64_json {
            let bytes = BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| IconError::Decode(format!("inline image is not base64: {e}")))?;
            return Ok(ImageReference::Inline(bytes));
        }
        Err(IconError::GenerationService(
            "images/generations returned neither url nor b64_json".to_string(),
        ))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}
