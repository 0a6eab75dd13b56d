use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// What to do when a transcript outgrows the worker's context window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverflowStrategy {
    /// Stop the run with an explanatory message
    #[default]
    Error,
    /// Compact (and if needed truncate) the transcript, then continue
    TruncateOldest,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// Tunables for the iteration loop
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Default hard iteration cap when a task doesn't set one
    pub max_iterations: u32,
    /// Attempts per model for transient failures
    pub max_retries: u32,
    pub max_tool_rounds: usize,
    pub convergence_threshold: f64,
    /// Fraction of the context window above which overflow handling kicks in
    pub context_abort_fraction: f64,
    pub overflow_strategy: OverflowStrategy,
    pub default_context_limit: usize,
    pub model_context_limits: HashMap<String, usize>,
    /// Backoff base; the wait before retry `n` (1-based) is `base * 2^(n-1)`
    pub retry_base_delay_ms: u64,
    pub call_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub approval_timeout_secs: u64,
    /// Configured alternative models, in preference order
    pub fallback_models: Vec<String>,
    /// Last-resort models when the dynamic candidate list is empty
    pub static_fallback_models: Vec<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_retries: 3,
            max_tool_rounds: 10,
            convergence_threshold: 0.85,
            context_abort_fraction: 0.8,
            overflow_strategy: OverflowStrategy::Error,
            default_context_limit: 128_000,
            model_context_limits: HashMap::new(),
            retry_base_delay_ms: 1000,
            call_timeout_secs: 120,
            tool_timeout_secs: 60,
            approval_timeout_secs: 300,
            fallback_models: Vec::new(),
            static_fallback_models: vec![
                "openrouter/meta-llama/llama-3.3-70b-instruct:free".to_string(),
                "openrouter/google/gemma-2-9b-it:free".to_string(),
                "openrouter/mistralai/mistral-7b-instruct:free".to_string(),
            ],
        }
    }
}

impl LoopConfig {
    /// Load from a RON file; omitted fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config = ron::from_str::<LoopConfig>(&content).map_err(|source| ConfigError::Parse {
            path: display.clone(),
            source,
        })?;
        log::info!("[CONFIG] Loaded loop config from {}", display);
        Ok(config)
    }

    /// Defaults with `CRITIC_*` environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        override_from_env("CRITIC_MAX_ITERATIONS", &mut config.max_iterations);
        override_from_env("CRITIC_MAX_RETRIES", &mut config.max_retries);
        override_from_env("CRITIC_MAX_TOOL_ROUNDS", &mut config.max_tool_rounds);
        override_from_env("CRITIC_CONVERGENCE_THRESHOLD", &mut config.convergence_threshold);
        override_from_env("CRITIC_CONTEXT_ABORT_FRACTION", &mut config.context_abort_fraction);
        override_from_env("CRITIC_OVERFLOW_STRATEGY", &mut config.overflow_strategy);
        override_from_env("CRITIC_DEFAULT_CONTEXT_LIMIT", &mut config.default_context_limit);
        override_from_env("CRITIC_RETRY_BASE_DELAY_MS", &mut config.retry_base_delay_ms);
        override_from_env("CRITIC_CALL_TIMEOUT_SECS", &mut config.call_timeout_secs);
        override_from_env("CRITIC_TOOL_TIMEOUT_SECS", &mut config.tool_timeout_secs);
        if let Ok(models) = env::var("CRITIC_FALLBACK_MODELS") {
            config.fallback_models = split_list(&models);
        }
        config
    }

    pub fn context_limit_for(&self, model: &str) -> usize {
        self.model_context_limits
            .get(model)
            .copied()
            .unwrap_or(self.default_context_limit)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout_secs)
    }
}

fn override_from_env<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(raw) = env::var(var) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => log::warn!("[CONFIG] Ignoring unparseable {}={}", var, raw),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
