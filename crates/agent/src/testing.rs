use async_trait::async_trait;
use skillai_core::types::{ChatMessage, LLMResponse, ResponseFormat};
use skillai_core::ProviderError;
use skillai_providers::Provider;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Provider double replaying queued outcomes in order.
pub struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Result<LLMResponse, ProviderError>>>,
    calls: Mutex<Vec<(Vec<ChatMessage>, ResponseFormat)>>,
}

impl ScriptedProvider {
    pub fn new(outcomes: Vec<Result<LLMResponse, ProviderError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(LLMResponse::text(t))).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<(Vec<ChatMessage>, ResponseFormat)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        format: ResponseFormat,
    ) -> Result<LLMResponse, ProviderError> {
        self.calls.lock().unwrap().push((messages.to_vec(), format));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::other("script exhausted")))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
