//! Model error taxonomy
//!
//! Every failure a model provider can produce is folded into one of a handful
//! of classes. The class, not the message, decides whether the fallback
//! controller retries the same model, fails over to another one, or stops the
//! task outright.

use std::time::Duration;

/// How the fallback controller should react to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorClass {
    /// Model or endpoint not found
    Unavailable,
    /// Credential rejected
    Unauthorized,
    RateLimited,
    /// Provider-side spending block on this key
    PaymentRequired,
    /// Spending limit exceeded: never retried, never failed over
    HardStop,
    /// Anything else, including time-outs
    Transient,
    Cancelled,
}

impl ErrorClass {
    /// Classes that skip retries and move straight to fallback selection
    pub fn fails_over_immediately(&self) -> bool {
        matches!(
            self,
            ErrorClass::Unavailable
                | ErrorClass::Unauthorized
                | ErrorClass::RateLimited
                | ErrorClass::PaymentRequired
        )
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("model {model} unavailable: {message}")]
    Unavailable { model: String, message: String },

    #[error("unauthorized for {model}: {message}")]
    Unauthorized { model: String, message: String },

    #[error("rate limited on {model}: {message}")]
    RateLimited { model: String, message: String },

    #[error("payment required for {model}: {message}")]
    PaymentRequired { model: String, message: String },

    #[error("spending limit exceeded on {model}: {message}")]
    SpendingLimit { model: String, message: String },

    #[error("{model} timed out after {elapsed:?}")]
    Timeout { model: String, elapsed: Duration },

    #[error("transient failure on {model}: {message}")]
    Transient { model: String, message: String },

    #[error("call cancelled")]
    Cancelled,
}

impl ModelError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ModelError::Unavailable { .. } => ErrorClass::Unavailable,
            ModelError::Unauthorized { .. } => ErrorClass::Unauthorized,
            ModelError::RateLimited { .. } => ErrorClass::RateLimited,
            ModelError::PaymentRequired { .. } => ErrorClass::PaymentRequired,
            ModelError::SpendingLimit { .. } => ErrorClass::HardStop,
            ModelError::Timeout { .. } | ModelError::Transient { .. } => ErrorClass::Transient,
            ModelError::Cancelled => ErrorClass::Cancelled,
        }
    }

    /// Classify an HTTP error status and response body
    pub fn from_status(model: &str, status: u16, body: &str) -> Self {
        let model = model.to_string();
        let message = format!("HTTP {}: {}", status, body);

        if mentions_spending_limit(body) {
            return ModelError::SpendingLimit { model, message };
        }

        match status {
            404 => ModelError::Unavailable { model, message },
            401 | 403 => ModelError::Unauthorized { model, message },
            429 => ModelError::RateLimited { model, message },
            402 => ModelError::PaymentRequired { model, message },
            _ => ModelError::Transient { model, message },
        }
    }

    /// Classify a provider error that only came back as free text
    pub fn from_message(model: &str, text: &str) -> Self {
        let model = model.to_string();
        let lower = text.to_lowercase();
        let message = text.to_string();

        if mentions_spending_limit(&lower) {
            ModelError::SpendingLimit { model, message }
        } else if lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("rate limit")
        {
            ModelError::RateLimited { model, message }
        } else if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("invalid api key")
            || lower.contains("forbidden")
        {
            ModelError::Unauthorized { model, message }
        } else if lower.contains("402") || lower.contains("payment required") || lower.contains("insufficient credits") {
            ModelError::PaymentRequired { model, message }
        } else if lower.contains("404")
            || lower.contains("model not found")
            || lower.contains("no endpoints found")
            || lower.contains("does not exist")
        {
            ModelError::Unavailable { model, message }
        } else {
            ModelError::Transient { model, message }
        }
    }
}

fn mentions_spending_limit(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("spending limit") || lower.contains("spend limit exceeded")
}
