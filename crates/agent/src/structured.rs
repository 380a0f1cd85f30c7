//! JSON-shaped replies from the provider.

use serde::de::DeserializeOwned;
use skillai_core::types::{ChatMessage, ResponseFormat};
use skillai_core::{ProviderError, Result};
use skillai_providers::{call_with_retry, Provider, RetryPolicy};
use tracing::debug;

/// Strip a surrounding ```json fence if the model added one.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Decode a structured reply. Empty or malformed output is a non-retryable failure.
pub fn parse_structured<T: DeserializeOwned>(content: Option<&str>) -> std::result::Result<T, ProviderError> {
    let raw = content
        .map(strip_code_fence)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ProviderError::other("provider returned an empty structured reply"))?;
    serde_json::from_str(raw).map_err(|e| {
        debug!(raw = %raw, "Unparsable structured reply");
        ProviderError::other(format!("malformed structured reply: {}", e))
    })
}

/// Ask for JSON through the retry wrapper and decode it as `T`.
///
/// Decoding happens inside each attempt so a malformed reply ends the call
/// instead of being retried.
pub async fn generate_json<T: DeserializeOwned>(
    provider: &dyn Provider,
    retry: &RetryPolicy,
    messages: &[ChatMessage],
) -> Result<T> {
    call_with_retry(retry, move || async move {
        let response = provider.chat(messages, ResponseFormat::Json).await?;
        parse_structured::<T>(response.trimmed_content())
    })
    .await
}
