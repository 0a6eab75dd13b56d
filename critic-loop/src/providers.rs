//! Model providers: endpoints, credentials and fallback preference
//!
//! Model keys have the form `<provider>/<model>`, e.g. `groq/llama-3.3-70b-versatile`
//! or `openrouter/meta-llama/llama-3.3-70b-instruct:free`.

use std::collections::HashMap;
use std::env;

/// Built-in provider table: (name, chat-completions endpoint, preference rank).
/// Lower ranks are tried first during fallback; providers with independent,
/// typically higher rate limits rank ahead of shared aggregators.
const KNOWN_PROVIDERS: &[(&str, &str, u32)] = &[
    ("groq", "https://api.groq.com/openai/v1/chat/completions", 0),
    ("cerebras", "https://api.cerebras.ai/v1/chat/completions", 1),
    ("mistral", "https://api.mistral.ai/v1/chat/completions", 2),
    ("openai", "https://api.openai.com/v1/chat/completions", 3),
    ("together", "https://api.together.xyz/v1/chat/completions", 4),
    ("openrouter", "https://openrouter.ai/api/v1/chat/completions", 10),
];

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub priority: u32,
}

/// Provider part of a model key
pub fn provider_of(model_key: &str) -> &str {
    model_key.split_once('/').map(|(provider, _)| provider).unwrap_or(model_key)
}

/// Model part of a model key, as sent to the provider
pub fn model_name_of(model_key: &str) -> &str {
    model_key.split_once('/').map(|(_, model)| model).unwrap_or(model_key)
}

#[derive(Debug, Clone, Default)]
pub struct ProviderDirectory {
    providers: HashMap<String, ProviderConfig>,
}

impl ProviderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the built-in provider table, taking credentials from `<NAME>_API_KEY`
    pub fn from_env() -> Self {
        let mut directory = Self::new();
        for (name, endpoint, priority) in KNOWN_PROVIDERS {
            let key_var = format!("{}_API_KEY", name.to_uppercase());
            let api_key = env::var(&key_var).ok().filter(|k| !k.trim().is_empty());
            if api_key.is_some() {
                log::info!("[PROVIDERS] Credential found for '{}'", name);
            }
            directory = directory.with_provider(ProviderConfig {
                name: name.to_string(),
                endpoint: endpoint.to_string(),
                api_key,
                priority: *priority,
            });
        }
        directory
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.insert(provider.name.clone(), provider);
        self
    }

    pub fn get(&self, provider: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider)
    }

    /// Provider config for a model key
    pub fn for_model(&self, model_key: &str) -> Option<&ProviderConfig> {
        self.get(provider_of(model_key))
    }

    pub fn has_credential(&self, provider: &str) -> bool {
        self.get(provider).map(|p| p.api_key.is_some()).unwrap_or(false)
    }

    /// Fallback preference rank; unknown providers sort last
    pub fn priority(&self, provider: &str) -> u32 {
        self.get(provider).map(|p| p.priority).unwrap_or(u32::MAX)
    }
}
