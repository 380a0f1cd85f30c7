use std::fmt;

use thiserror::Error;

/// Coarse classification of a capability provider failure.
///
/// Decided once by the provider adapter from the HTTP status and body, so
/// callers never have to inspect error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The service is temporarily unavailable (HTTP 503). Retried.
    Unavailable,
    /// Quota or rate limit reached (HTTP 429, `RESOURCE_EXHAUSTED`). Never retried.
    RateLimited,
    /// Anything else: bad request, auth, malformed output, transport failure.
    Other,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::Unavailable => "service unavailable",
            ProviderErrorKind::RateLimited => "rate limited",
            ProviderErrorKind::Other => "provider failure",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message)
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let lower = body.to_lowercase();
        let kind = if status == 503 {
            ProviderErrorKind::Unavailable
        } else if status == 429 || lower.contains("resource_exhausted") || lower.contains("quota") {
            ProviderErrorKind::RateLimited
        } else {
            ProviderErrorKind::Other
        };
        let snippet: String = body.chars().take(500).collect();
        Self {
            kind,
            status: Some(status),
            message: format!("HTTP {}: {}", status, snippet),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Unavailable
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provider still unavailable after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: ProviderError,
    },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub const HIGH_DEMAND_MESSAGE: &str =
    "Services are in high demand. Please try again in a few moments.";

impl Error {
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            Error::Provider(e) => Some(e.kind),
            Error::RetriesExhausted { last, .. } => Some(last.kind),
            _ => None,
        }
    }

    /// Text safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Error::Provider(e) if e.kind == ProviderErrorKind::RateLimited => {
                HIGH_DEMAND_MESSAGE.to_string()
            }
            Error::Provider(_) | Error::RetriesExhausted { .. } => {
                "An error occurred while contacting the AI service. Please try again.".to_string()
            }
            Error::Validation(msg) | Error::NotFound(msg) | Error::Precondition(msg) => {
                msg.clone()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(
            ProviderError::from_status(503, "Service Unavailable").kind,
            ProviderErrorKind::Unavailable
        );
        assert_eq!(
            ProviderError::from_status(429, "Too Many Requests").kind,
            ProviderErrorKind::RateLimited
        );
        assert_eq!(
            ProviderError::from_status(400, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#).kind,
            ProviderErrorKind::RateLimited
        );
        assert_eq!(
            ProviderError::from_status(401, "invalid api key").kind,
            ProviderErrorKind::Other
        );
    }

    #[test]
    fn test_user_message() {
        let quota = Error::Provider(ProviderError::rate_limited("quota exceeded"));
        assert_eq!(quota.user_message(), HIGH_DEMAND_MESSAGE);

        let exhausted = Error::RetriesExhausted {
            attempts: 3,
            last: ProviderError::unavailable("503"),
        };
        assert_ne!(exhausted.user_message(), HIGH_DEMAND_MESSAGE);
        assert_eq!(exhausted.provider_kind(), Some(ProviderErrorKind::Unavailable));
    }
}
