pub mod factory;
pub mod gemini;
pub mod openai;
pub mod retry;

use async_trait::async_trait;
use skillai_core::types::{ChatMessage, LLMResponse, ResponseFormat};
use skillai_core::ProviderError;

/// A text generation endpoint.
///
/// Implementations classify every failure into a [`ProviderError`] kind at
/// this boundary; nothing above it inspects HTTP statuses or bodies.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        format: ResponseFormat,
    ) -> std::result::Result<LLMResponse, ProviderError>;

    fn name(&self) -> &str;
}

pub use factory::{create_provider, infer_provider_from_model};
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
pub use retry::{call_with_retry, RetryPolicy};

/// Find the largest byte index <= `max_bytes` that is a valid char boundary.
pub(crate) fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Map a transport-level reqwest failure.
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> ProviderError {
    match e.status() {
        Some(status) => ProviderError::from_status(status.as_u16(), &e.to_string()),
        None => ProviderError::other(format!("{} request failed: {}", provider, e)),
    }
}
