//! Retry and fallback around single logical model calls
//!
//! Transient failures are retried on the same model with exponential backoff.
//! Unavailable, unauthorized, rate-limited and payment-required failures skip
//! straight to the fallback chain. A spending-limit hard stop is propagated
//! untouched.

use super::error::LoopError;
use super::token_ledger::TokenLedger;
use crate::ai::{ErrorClass, Message, ModelError, ModelReply, ModelService, TokenUsage};
use crate::config::LoopConfig;
use crate::providers::{provider_of, ProviderDirectory};
use crate::routing::{FallbackSource, NoFallbackSource};
use crate::tools::ToolDefinition;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-run retry/fallback state: the failed-model set and the token ledger
/// belong to one task run and are cleared by [`FallbackController::reset`].
pub struct FallbackController {
    service: Arc<dyn ModelService>,
    source: Arc<dyn FallbackSource>,
    providers: Arc<ProviderDirectory>,
    max_attempts: u32,
    base_delay: Duration,
    call_timeout: Duration,
    fallback_models: Vec<String>,
    static_fallbacks: Vec<String>,
    failed: HashSet<String>,
    /// Failed models whose only failure was transient with tools enabled
    tool_failures: HashSet<String>,
    /// Providers whose credential was rejected in the current chain
    rejected_providers: HashSet<String>,
    ledger: TokenLedger,
    cancel: CancellationToken,
}

impl FallbackController {
    pub fn new(service: Arc<dyn ModelService>, config: &LoopConfig) -> Self {
        Self {
            service,
            source: Arc::new(NoFallbackSource),
            providers: Arc::new(ProviderDirectory::new()),
            max_attempts: config.max_retries.max(1),
            base_delay: config.retry_base_delay(),
            call_timeout: config.call_timeout(),
            fallback_models: config.fallback_models.clone(),
            static_fallbacks: config.static_fallback_models.clone(),
            failed: HashSet::new(),
            tool_failures: HashSet::new(),
            rejected_providers: HashSet::new(),
            ledger: TokenLedger::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn FallbackSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_providers(mut self, providers: Arc<ProviderDirectory>) -> Self {
        self.providers = providers;
        self
    }

    pub fn set_cancellation(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    /// Start a fresh task run
    pub fn reset(&mut self) {
        self.failed.clear();
        self.tool_failures.clear();
        self.rejected_providers.clear();
        self.ledger.reset();
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn failed_models(&self) -> &HashSet<String> {
        &self.failed
    }

    /// Text completion with retry and fallback
    pub async fn complete(&mut self, model: &str, messages: &[Message]) -> Result<String, LoopError> {
        let reply = self.run_chain(model, messages, None).await?;
        Ok(match reply {
            ModelReply::Text(text) => text,
            ModelReply::ToolInvocations { content, .. } => content,
        })
    }

    /// Tool-enabled completion. When every model fails with tools, degrades to
    /// a text-only call against the best remaining model.
    pub async fn complete_with_tools(
        &mut self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, LoopError> {
        match self.run_chain(model, messages, Some(tools)).await {
            Err(LoopError::FallbackExhausted { attempted, last_error }) => {
                let target = self
                    .best_available(model)
                    .await
                    .unwrap_or_else(|| model.to_string());
                log::warn!(
                    "[FALLBACK] Tool calling failed on every model ({}; last: {}), degrading to text-only on '{}'",
                    attempted.join(", "),
                    last_error,
                    target
                );
                self.complete(&target, messages).await.map(ModelReply::Text)
            }
            other => other,
        }
    }

    async fn run_chain(
        &mut self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply, LoopError> {
        let with_tools = tools.is_some();
        let mut attempted = Vec::new();
        self.rejected_providers.clear();

        let mut last_error = match self.attempt_model(model, messages, tools).await {
            Ok(reply) => return Ok(reply),
            Err(err) => self.note_failure(model, err, with_tools, &mut attempted)?,
        };

        for candidate in self.fallback_candidates(model, with_tools).await {
            if self.skipped_models(with_tools).contains(&candidate) {
                continue;
            }
            if self.rejected_providers.contains(provider_of(&candidate)) {
                log::debug!(
                    "[FALLBACK] Skipping '{}': provider credential already rejected",
                    candidate
                );
                continue;
            }

            log::warn!("[FALLBACK] '{}' failed, trying '{}'", model, candidate);
            match self.attempt_model(&candidate, messages, tools).await {
                Ok(reply) => {
                    log::info!("[FALLBACK] '{}' served the request for '{}'", candidate, model);
                    return Ok(reply);
                }
                Err(err) => {
                    last_error = self.note_failure(&candidate, err, with_tools, &mut attempted)?;
                }
            }
        }

        log::error!(
            "[FALLBACK] Exhausted all candidates for '{}' (attempted: {})",
            model,
            attempted.join(", ")
        );
        Err(LoopError::FallbackExhausted {
            attempted,
            last_error: last_error.to_string(),
        })
    }

    /// Record a failed model. Hard stops and cancellation end the chain.
    fn note_failure(
        &mut self,
        model: &str,
        err: ModelError,
        with_tools: bool,
        attempted: &mut Vec<String>,
    ) -> Result<ModelError, LoopError> {
        let class = err.class();
        match class {
            ErrorClass::HardStop => {
                log::error!("[FALLBACK] Hard stop on '{}': {}", model, err);
                return Err(LoopError::SpendingLimit {
                    model: model.to_string(),
                    message: err.to_string(),
                });
            }
            ErrorClass::Cancelled => return Err(LoopError::Cancelled),
            ErrorClass::Unauthorized => {
                self.rejected_providers.insert(provider_of(model).to_string());
            }
            _ => {}
        }

        attempted.push(model.to_string());
        self.failed.insert(model.to_string());
        if with_tools && class == ErrorClass::Transient {
            self.tool_failures.insert(model.to_string());
        } else {
            self.tool_failures.remove(model);
        }
        Ok(err)
    }

    /// Models a chain must not try. A transient failure seen only with tools
    /// enabled does not rule a model out of a text-only chain.
    fn skipped_models(&self, with_tools: bool) -> HashSet<String> {
        if with_tools {
            self.failed.clone()
        } else {
            self.failed.difference(&self.tool_failures).cloned().collect()
        }
    }

    /// Try one model, retrying transient failures with backoff
    async fn attempt_model(
        &mut self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply, ModelError> {
        let mut attempt = 0;
        loop {
            match self.call_once(model, messages, tools).await {
                Ok((reply, usage)) => {
                    let served_by = usage
                        .as_ref()
                        .map(|u| u.model_key.clone())
                        .filter(|key| !key.is_empty())
                        .unwrap_or_else(|| model.to_string());
                    self.ledger.record(&served_by, usage.as_ref());
                    return Ok(reply);
                }
                Err(err) => {
                    let class = err.class();
                    if class.fails_over_immediately() {
                        log::warn!("[FALLBACK] '{}' failed ({}): {}", model, class, err);
                        return Err(err);
                    }
                    if class != ErrorClass::Transient {
                        return Err(err);
                    }

                    attempt += 1;
                    if attempt >= self.max_attempts {
                        log::warn!(
                            "[FALLBACK] '{}' failed {} times, giving up on it: {}",
                            model,
                            attempt,
                            err
                        );
                        return Err(err);
                    }

                    let delay = backoff_delay(self.base_delay, attempt);
                    log::warn!(
                        "[FALLBACK] '{}' attempt {}/{} failed: {}; retrying in {:?}",
                        model,
                        attempt,
                        self.max_attempts,
                        err,
                        delay
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(ModelError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn call_once(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<(ModelReply, Option<TokenUsage>), ModelError> {
        let call = async {
            match tools {
                Some(tools) => self
                    .service
                    .complete_with_tools(model, messages, tools)
                    .await
                    .map(|c| (c.reply, c.usage)),
                None => self
                    .service
                    .complete(model, messages)
                    .await
                    .map(|c| (ModelReply::Text(c.text), c.usage)),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ModelError::Cancelled),
            outcome = tokio::time::timeout(self.call_timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(ModelError::Timeout {
                    model: model.to_string(),
                    elapsed: self.call_timeout,
                }),
            },
        }
    }

    /// Ordered fallback candidates for `requested`:
    /// configured alternatives with a credential (by provider preference),
    /// then healthy dynamic free-tier models, or the static list if none.
    async fn fallback_candidates(&self, requested: &str, with_tools: bool) -> Vec<String> {
        let skipped = self.skipped_models(with_tools);
        let mut configured: Vec<&String> = self
            .fallback_models
            .iter()
            .filter(|m| self.providers.has_credential(provider_of(m)))
            .collect();
        configured.sort_by_key(|m| self.providers.priority(provider_of(m)));

        let unhealthy = self.source.unhealthy_models().await;
        let mut dynamic: Vec<String> = self
            .source
            .list_fallback_candidates(&skipped)
            .await
            .into_iter()
            .filter(|m| !skipped.contains(m) && !unhealthy.contains(m))
            .collect();
        if dynamic.is_empty() {
            dynamic = self
                .static_fallbacks
                .iter()
                .filter(|m| !skipped.contains(*m))
                .cloned()
                .collect();
        }

        let mut seen = HashSet::new();
        seen.insert(requested.to_string());
        configured
            .into_iter()
            .cloned()
            .chain(dynamic)
            .filter(|m| seen.insert(m.clone()))
            .collect()
    }

    /// First fallback candidate a text-only call can still use
    async fn best_available(&self, requested: &str) -> Option<String> {
        let skipped = self.skipped_models(false);
        self.fallback_candidates(requested, false)
            .await
            .into_iter()
            .find(|m| !skipped.contains(m) && !self.rejected_providers.contains(provider_of(m)))
    }
}

/// Wait before retry `attempt` (1-based): `base * 2^(attempt-1)`, saturating
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}
