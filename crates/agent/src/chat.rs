use crate::context::ContextBuilder;
use crate::experience::ExperienceTracker;
use crate::market::{extract_ticker, is_finance_partner, partner_api_key, QuoteSource};
use serde::Serialize;
use skillai_core::types::{ChatMessage, ResponseFormat};
use skillai_core::{Capability, Error, Partner, ProviderError, Result};
use skillai_providers::{call_with_retry, Provider, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub response: String,
    /// Partner XP after this turn.
    pub xp: u32,
}

/// One conversation turn with a partner.
pub struct PartnerChat {
    provider: Arc<dyn Provider>,
    tracker: Arc<ExperienceTracker>,
    retry: RetryPolicy,
    quotes: Option<Arc<dyn QuoteSource>>,
}

impl PartnerChat {
    pub fn new(provider: Arc<dyn Provider>, tracker: Arc<ExperienceTracker>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            tracker,
            retry,
            quotes: None,
        }
    }

    /// Let finance partners look up stock prices mentioned by the user.
    pub fn with_quotes(mut self, quotes: Arc<dyn QuoteSource>) -> Self {
        self.quotes = Some(quotes);
        self
    }

    /// Market data for the ticker in the latest user message, if any applies.
    async fn market_context(&self, partner: &Partner, history: &[ChatMessage]) -> Option<String> {
        let quotes = self.quotes.as_ref()?;
        if !is_finance_partner(partner) {
            return None;
        }
        let ticker = extract_ticker(&history.last()?.content)?;
        let quote = quotes.quote(&ticker, partner_api_key(partner)).await;
        match &quote {
            Ok(q) => info!(slug = %partner.slug, ticker = %q.symbol, price = q.price, "Fetched stock price"),
            Err(e) => warn!(slug = %partner.slug, ticker = %ticker, error = %e, "Stock price lookup failed"),
        }
        Some(ContextBuilder::market_data_section(&ticker, &quote))
    }

    fn check_history(history: &[ChatMessage]) -> Result<()> {
        let Some(last) = history.last() else {
            return Err(Error::Validation("Conversation history is empty".to_string()));
        };
        if let Some(bad) = history
            .iter()
            .find(|m| m.role != "user" && m.role != "assistant")
        {
            return Err(Error::Validation(format!(
                "Unsupported message role '{}'",
                bad.role
            )));
        }
        if !last.is_user() {
            return Err(Error::Validation(
                "Conversation must end with a user message".to_string(),
            ));
        }
        Ok(())
    }

    /// Send `history` to the partner and credit XP when a reply comes back.
    pub async fn send(&self, partner: &Partner, history: &[ChatMessage]) -> Result<ChatTurn> {
        if partner.primary_capability() != Capability::Text {
            return Err(Error::Validation(format!(
                "Partner '{}' works with {} and cannot chat",
                partner.name,
                partner.primary_capability()
            )));
        }
        Self::check_history(history)?;

        let mut messages = ContextBuilder::chat_messages(partner, history);
        if let Some(section) = self.market_context(partner, history).await {
            messages[0].content.push_str(&section);
        }
        debug!(slug = %partner.slug, turns = history.len(), "Sending chat turn");

        let provider = self.provider.as_ref();
        let messages = messages.as_slice();
        let response = call_with_retry(&self.retry, move || async move {
            let reply = provider.chat(messages, ResponseFormat::Text).await?;
            reply
                .trimmed_content()
                .map(str::to_string)
                .ok_or_else(|| ProviderError::other("provider returned an empty reply"))
        })
        .await
        .map_err(|e| {
            warn!(slug = %partner.slug, error = %e, "Chat turn failed");
            e
        })?;

        let xp = self.tracker.on_message_sent(partner);
        Ok(ChatTurn { response, xp })
    }
}
