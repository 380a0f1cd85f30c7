use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillai_core::types::{ChatMessage, LLMResponse, ResponseFormat};
use skillai_core::ProviderError;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::{transport_error, truncate_at_char_boundary, Provider};

/// Any OpenAI-compatible `/chat/completions` endpoint (OpenAI, OpenRouter, ...).
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(
        api_key: &str,
        api_base: Option<&str>,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            model: model.strip_prefix("openai/").unwrap_or(model).to_string(),
            max_tokens,
            temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn parse_response(raw_body: &str) -> Result<LLMResponse, ProviderError> {
    let chat_response: ChatResponse = serde_json::from_str(raw_body).map_err(|e| {
        let end = truncate_at_char_boundary(raw_body, 500);
        ProviderError::other(format!(
            "Failed to parse response: {}. Body: {}",
            e,
            &raw_body[..end]
        ))
    })?;

    let choice = chat_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::other("No choices in response"))?;

    Ok(LLMResponse {
        content: choice.message.content.filter(|c| !c.is_empty()),
        finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
        usage: chat_response.usage.unwrap_or(Value::Null),
    })
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        format: ResponseFormat,
    ) -> Result<LLMResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.api_base);
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: match format {
                ResponseFormat::Json => Some(serde_json::json!({"type": "json_object"})),
                ResponseFormat::Text => None,
            },
        };

        info!(url = %url, model = %self.model, messages_count = messages.len(), "Calling LLM");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body = %raw_body, "LLM API error");
            return Err(ProviderError::from_status(status.as_u16(), &raw_body));
        }

        {
            let end = truncate_at_char_boundary(&raw_body, 500);
            debug!(body_len = raw_body.len(), preview = %&raw_body[..end], "LLM raw response");
        }

        parse_response(&raw_body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
