/// Errors that end a task run without a usable history
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoopError {
    /// Spending limit hit: never retried, never failed over
    #[error("spending limit exceeded on {model}: {message}")]
    SpendingLimit { model: String, message: String },

    #[error("all models failed (attempted: {}); last error: {last_error}", attempted.join(", "))]
    FallbackExhausted {
        attempted: Vec<String>,
        last_error: String,
    },

    /// External cancellation; the engine turns this into a partial history
    #[error("run cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_names_every_model() {
        let err = LoopError::FallbackExhausted {
            attempted: vec!["groq/a".into(), "openrouter/b".into()],
            last_error: "HTTP 429".into(),
        };
        assert_eq!(
            err.to_string(),
            "all models failed (attempted: groq/a, openrouter/b); last error: HTTP 429"
        );
    }
}
