use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use skillai_core::types::{ChatMessage, LLMResponse, ResponseFormat};
use skillai_core::ProviderError;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::{transport_error, truncate_at_char_boundary, Provider};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl GeminiProvider {
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
                .unwrap_or(GEMINI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    /// Normalize model name: strip "gemini/" prefix if present.
    /// Config may store "gemini/gemini-2.0-flash" but the API expects "gemini-2.0-flash".
    fn normalize_model(model: &str) -> &str {
        model.strip_prefix("gemini/").unwrap_or(model)
    }

    /// Gemini takes `user`/`model` turns, with system text as a separate field.
    /// Consecutive turns of the same role are merged.
    fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_text: Option<String> = None;
        let mut contents: Vec<Value> = Vec::new();

        for msg in messages {
            let role = match msg.role.as_str() {
                "system" => {
                    system_text = Some(match system_text {
                        Some(existing) => format!("{}\n\n{}", existing, msg.content),
                        None => msg.content.clone(),
                    });
                    continue;
                }
                "assistant" => "model",
                _ => "user",
            };

            if let Some(last) = contents.last_mut() {
                if last.get("role").and_then(|v| v.as_str()) == Some(role) {
                    if let Some(parts) = last.get_mut("parts").and_then(|p| p.as_array_mut()) {
                        parts.push(serde_json::json!({"text": msg.content}));
                        continue;
                    }
                }
            }

            contents.push(serde_json::json!({
                "role": role,
                "parts": [{"text": msg.content}],
            }));
        }

        (system_text, contents)
    }

    fn build_request(&self, messages: &[ChatMessage], format: ResponseFormat) -> Value {
        let (system_instruction, contents) = Self::convert_messages(messages);

        let mut generation_config = serde_json::json!({
            "temperature": self.temperature,
            "maxOutputTokens": self.max_tokens,
        });
        if format == ResponseFormat::Json {
            generation_config["responseMimeType"] = Value::String("application/json".to_string());
        }

        let mut request = serde_json::json!({
            "contents": contents,
            "generationConfig": generation_config,
        });

        if let Some(sys) = &system_instruction {
            request["systemInstruction"] = serde_json::json!({
                "parts": [{"text": sys}]
            });
        }
        request
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        format: ResponseFormat,
    ) -> Result<LLMResponse, ProviderError> {
        let model = Self::normalize_model(&self.model);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, model, self.api_key
        );
        let request = self.build_request(messages, format);

        info!(
            model = %model,
            messages_count = messages.len(),
            json = format == ResponseFormat::Json,
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("Gemini", e))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body = %raw_body, "Gemini API error");
            return Err(ProviderError::from_status(status.as_u16(), &raw_body));
        }

        debug!(body_len = raw_body.len(), "Gemini raw response");
        parse_response(&raw_body)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

fn parse_response(raw_body: &str) -> Result<LLMResponse, ProviderError> {
    let resp: GeminiResponse = serde_json::from_str(raw_body).map_err(|e| {
        let end = truncate_at_char_boundary(raw_body, 500);
        ProviderError::other(format!(
            "Failed to parse Gemini response: {}. Body: {}",
            e,
            &raw_body[..end]
        ))
    })?;

    let candidate = resp
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| ProviderError::other("No candidates in Gemini response"))?;

    let text_parts: Vec<String> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .filter(|t| !t.is_empty())
        .collect();

    let content = if text_parts.is_empty() {
        None
    } else {
        Some(text_parts.join("\n"))
    };

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") | None => "stop".to_string(),
        Some("MAX_TOKENS") => "length".to_string(),
        Some("SAFETY") => "content_filter".to_string(),
        Some(other) => other.to_lowercase(),
    };

    let usage = if let Some(meta) = &resp.usage_metadata {
        serde_json::json!({
            "prompt_tokens": meta.prompt_token_count,
            "completion_tokens": meta.candidates_token_count,
        })
    } else {
        Value::Null
    };

    info!(
        content_len = content.as_ref().map(|c| c.len()).unwrap_or(0),
        finish_reason = %finish_reason,
        "Gemini response parsed"
    );

    Ok(LLMResponse {
        content,
        finish_reason,
        usage,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}
