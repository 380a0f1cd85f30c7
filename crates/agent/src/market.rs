use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use skillai_core::{Error, Partner, Result};
use std::time::Duration;
use tracing::{debug, warn};

const ALPHA_VANTAGE_BASE: &str = "https://www.alphavantage.co";

static DOLLAR_TICKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z]{1,5}(?:\.[A-Za-z]{1,2})?)\b").unwrap());
static BARE_TICKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z]{2,5}(?:\.[A-Z]{1,2})?)\b").unwrap());

/// Upper-case words that look like tickers but almost never are.
const NOT_TICKERS: &[&str] = &[
    "AI", "API", "CEO", "CFO", "CTO", "ETF", "EPS", "GDP", "IPO", "IT", "OK", "PE", "ROI", "UI",
    "UK", "US", "USA", "USD", "IDR", "EUR", "FAQ", "PDF", "SQL", "YOY", "KPI",
];

const FINANCE_KEYWORDS: &[&str] = &[
    "finance", "financial", "stock", "equity", "invest", "trading", "market", "saham", "keuangan",
];

#[derive(Debug, Clone, PartialEq)]
pub struct StockQuote {
    pub symbol: String,
    pub price: f64,
}

/// Looks up the latest price of a ticker.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// `partner_key` is the partner's own key, used before any shared one.
    async fn quote(&self, ticker: &str, partner_key: Option<&str>) -> Result<StockQuote>;
}

/// Whether the chat flow should fetch market data for this partner.
pub fn is_finance_partner(partner: &Partner) -> bool {
    let skill = partner.skill.to_lowercase();
    FINANCE_KEYWORDS.iter().any(|k| skill.contains(k))
}

pub fn partner_api_key(partner: &Partner) -> Option<&str> {
    partner
        .config
        .get("apiKey")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// First ticker mentioned in `text`. `$aapl` style wins over bare `AAPL`.
pub fn extract_ticker(text: &str) -> Option<String> {
    if let Some(caps) = DOLLAR_TICKER.captures(text) {
        return Some(caps[1].to_uppercase());
    }
    BARE_TICKER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .find(|t| !NOT_TICKERS.contains(&t.as_str()))
}

/// Pull the price out of a `GLOBAL_QUOTE` response.
pub fn parse_global_quote(ticker: &str, body: &Value) -> Result<StockQuote> {
    if let Some(note) = body
        .get("Note")
        .or_else(|| body.get("Information"))
        .and_then(Value::as_str)
    {
        warn!(note = %note, "Alpha Vantage usage note");
        return Err(Error::Tool(
            "Alpha Vantage API limit reached. Please try again later or use a different API key."
                .to_string(),
        ));
    }
    if let Some(msg) = body.get("Error Message").and_then(Value::as_str) {
        return Err(Error::Tool(format!("Alpha Vantage error: {}", msg)));
    }

    let quote = body.get("Global Quote");
    let price = quote
        .and_then(|q| q.get("05. price"))
        .and_then(Value::as_str)
        .and_then(|p| p.trim().parse::<f64>().ok())
        .ok_or_else(|| {
            Error::Tool(format!(
                "Could not retrieve the stock price for {}. The symbol may be invalid.",
                ticker
            ))
        })?;
    let symbol = quote
        .and_then(|q| q.get("01. symbol"))
        .and_then(Value::as_str)
        .unwrap_or(ticker)
        .to_string();
    Ok(StockQuote { symbol, price })
}

pub struct AlphaVantageClient {
    client: Client,
    api_base: String,
    shared_key: Option<String>,
}

impl AlphaVantageClient {
    pub fn new(shared_key: Option<String>) -> Self {
        Self::with_base(ALPHA_VANTAGE_BASE, shared_key)
    }

    pub fn with_base(api_base: &str, shared_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            shared_key: shared_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn resolve_key<'a>(&'a self, partner_key: Option<&'a str>) -> Result<&'a str> {
        partner_key
            .or(self.shared_key.as_deref())
            .ok_or_else(|| {
                Error::Tool(
                    "Alpha Vantage API key is not configured. Add `apiKey` to the partner's config \
                     or set ALPHA_VANTAGE_API_KEY."
                        .to_string(),
                )
            })
    }
}

#[async_trait]
impl QuoteSource for AlphaVantageClient {
    async fn quote(&self, ticker: &str, partner_key: Option<&str>) -> Result<StockQuote> {
        let key = self.resolve_key(partner_key)?;
        let url = format!("{}/query", self.api_base);
        debug!(ticker = %ticker, "Alpha Vantage quote");

        let resp = self
            .client
            .get(&url)
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", ticker), ("apikey", key)])
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Alpha Vantage request failed: {}", e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Tool(format!(
                "Alpha Vantage API request failed with status {}",
                status.as_u16()
            )));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::Tool(format!("Failed to parse Alpha Vantage response: {}", e)))?;
        parse_global_quote(ticker, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_ticker() {
        assert_eq!(extract_ticker("what is $msft at today?").as_deref(), Some("MSFT"));
        assert_eq!(extract_ticker("How is GOOGL doing?").as_deref(), Some("GOOGL"));
        assert_eq!(extract_ticker("Is the AI ETF hype real for NVDA?").as_deref(), Some("NVDA"));
        assert_eq!(extract_ticker("BBCA.JK outlook").as_deref(), Some("BBCA.JK"));
        assert_eq!(extract_ticker("tell me about the market"), None);
    }

    #[test]
    fn test_finance_partner_and_key() {
        let mut p = Partner {
            skill: "Stock market analysis".to_string(),
            ..Partner::default()
        };
        assert!(is_finance_partner(&p));
        assert_eq!(partner_api_key(&p), None);

        p.config.insert("apiKey".to_string(), json!(" av-123 "));
        assert_eq!(partner_api_key(&p), Some("av-123"));

        p.skill = "Landing page copywriting".to_string();
        assert!(!is_finance_partner(&p));
    }

    #[test]
    fn test_parse_global_quote() {
        let body = json!({
            "Global Quote": { "01. symbol": "IBM", "05. price": "187.4200" }
        });
        let quote = parse_global_quote("IBM", &body).unwrap();
        assert_eq!(quote.symbol, "IBM");
        assert_eq!(quote.price, 187.42);
    }

    #[test]
    fn test_parse_rate_limit_and_missing_price() {
        let limited = json!({ "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute." });
        let err = parse_global_quote("IBM", &limited).unwrap_err();
        assert!(err.to_string().contains("limit reached"));

        let empty = json!({ "Global Quote": {} });
        assert!(matches!(parse_global_quote("ZZZZ", &empty), Err(Error::Tool(_))));
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let client = AlphaVantageClient::with_base("http://127.0.0.1:1", None);
        let err = client.quote("IBM", None).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_tool_error() {
        let client = AlphaVantageClient::with_base("http://127.0.0.1:1", Some("shared".to_string()));
        assert!(matches!(client.quote("IBM", None).await, Err(Error::Tool(_))));
    }
}
