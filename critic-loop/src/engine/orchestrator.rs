//! Worker/reviewer iteration engine
//!
//! A run alternates between a worker generation (optionally with tools) and a
//! reviewer verdict until the reviewer approves, feedback stops changing, the
//! iteration cap is hit, the context window overflows, or the run is cancelled.

use super::context_budget::{
    compact, estimate_transcript_tokens, estimate_utilization, format_thousands, truncate_to_recent,
    TRUNCATE_KEEP_RECENT,
};
use super::convergence::ConvergenceDetector;
use super::error::LoopError;
use super::fallback::FallbackController;
use super::feedback::{FeedbackChannel, NoFeedback};
use super::hooks::{LifecycleHooks, NoopHooks};
use super::prompts::{
    is_approved, operator_feedback, review_request, revision_request, DEFAULT_WORKER_PROMPT,
};
use super::tool_loop::ToolLoop;
use super::types::{
    EngineState, IterationResult, RunHistory, TaskRequest, Termination, ToolCallRecord,
};
use crate::ai::{Message, ModelService};
use crate::config::{LoopConfig, OverflowStrategy};
use crate::providers::ProviderDirectory;
use crate::routing::FallbackSource;
use crate::tools::{ApprovalGate, AutoApprove, EmptyCatalog, ToolCatalog};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct IterationEngine {
    config: LoopConfig,
    controller: FallbackController,
    catalog: Arc<dyn ToolCatalog>,
    gate: Arc<dyn ApprovalGate>,
    hooks: Arc<dyn LifecycleHooks>,
    feedback: Mutex<Box<dyn FeedbackChannel>>,
    cancel: CancellationToken,
    convergence: ConvergenceDetector,
    state: EngineState,
}

impl IterationEngine {
    pub fn new(service: Arc<dyn ModelService>, config: LoopConfig) -> Self {
        let cancel = CancellationToken::new();
        let mut controller = FallbackController::new(service, &config);
        controller.set_cancellation(cancel.clone());
        let convergence = ConvergenceDetector::new(config.convergence_threshold);
        Self {
            config,
            controller,
            catalog: Arc::new(EmptyCatalog),
            gate: Arc::new(AutoApprove),
            hooks: Arc::new(NoopHooks),
            feedback: Mutex::new(Box::new(NoFeedback)),
            cancel,
            convergence,
            state: EngineState::Idle,
        }
    }

    pub fn with_fallback_source(mut self, source: Arc<dyn FallbackSource>) -> Self {
        self.controller = self.controller.with_source(source);
        self
    }

    pub fn with_providers(mut self, providers: Arc<ProviderDirectory>) -> Self {
        self.controller = self.controller.with_providers(providers);
        self
    }

    pub fn with_tools(mut self, catalog: Arc<dyn ToolCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_approval_gate(mut self, gate: Arc<dyn ApprovalGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_feedback(mut self, channel: impl FeedbackChannel + 'static) -> Self {
        self.feedback = Mutex::new(Box::new(channel));
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.controller.set_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Token that cancels the current and any later run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Drive one task to a terminal state.
    ///
    /// Cancellation is not an error: the history gathered so far comes back
    /// with [`Termination::Cancelled`]. Spending-limit hard stops and
    /// exhausted fallback chains are returned as errors.
    pub async fn run(&mut self, request: &TaskRequest) -> Result<RunHistory, LoopError> {
        self.controller.reset();
        self.state = EngineState::Idle;
        let mut history = RunHistory::new(request.task_id.clone());

        log::info!(
            "[ENGINE] Starting task {} (worker: {}, reviewer: {}, category: {})",
            request.task_id,
            request.worker_model,
            request.reviewer_model.as_deref().unwrap_or("none"),
            request.category
        );

        let termination = match self.drive(request, &mut history).await {
            Ok(termination) => termination,
            Err(LoopError::Cancelled) => {
                log::warn!(
                    "[ENGINE] Task {} cancelled after {} completed iteration(s)",
                    request.task_id,
                    history.iterations.len()
                );
                Termination::Cancelled
            }
            Err(err) => {
                log::error!("[ENGINE] Task {} failed: {}", request.task_id, err);
                self.state = EngineState::Idle;
                return Err(err);
            }
        };

        history.finish(termination, self.controller.ledger().summary());
        self.state = termination.into();
        log::info!(
            "[ENGINE] Task {} finished: {} after {} iteration(s), {} tokens",
            request.task_id,
            termination,
            history.total_iterations,
            history.token_usage.total_tokens
        );
        Ok(history)
    }

    async fn drive(
        &mut self,
        request: &TaskRequest,
        history: &mut RunHistory,
    ) -> Result<Termination, LoopError> {
        let max_iterations = request
            .max_iterations
            .unwrap_or(self.config.max_iterations)
            .max(1);
        let context_limit = self.config.context_limit_for(&request.worker_model);
        let system_prompt = request
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_WORKER_PROMPT.to_string());
        let mut transcript = vec![
            Message::system(system_prompt),
            Message::user(request.description.clone()),
        ];

        for iteration in 1..=max_iterations {
            if self.cancel.is_cancelled() {
                return Err(LoopError::Cancelled);
            }
            history.total_iterations = iteration;
            self.state = EngineState::Generating;
            log::info!(
                "[ENGINE] Iteration {}/{} for task {}",
                iteration,
                max_iterations,
                request.task_id
            );

            self.inject_feedback(&mut transcript);
            transcript = self.hooks.before_iteration(transcript, iteration).await;

            if let Some(message) = self.fit_context(&mut transcript, context_limit, &request.worker_model) {
                if history.final_output.is_empty() {
                    history.final_output = message;
                }
                return Ok(Termination::ContextOverflowAborted);
            }

            let (output, tool_calls) = self.generate(request, &transcript).await?;
            let output = self.hooks.after_iteration(output, iteration).await;
            history.final_output = output.clone();

            self.state = EngineState::Reviewing;
            let (mut approved, feedback) = match request.reviewer_model.as_deref() {
                None => (true, String::new()),
                Some(reviewer) => self.review(request, reviewer, &output, &tool_calls).await?,
            };

            let mut converged = false;
            if !approved {
                if let Some(previous) = history.last_feedback().filter(|f| !f.is_empty()) {
                    if self.convergence.is_stuck(previous, &feedback) {
                        log::info!(
                            "[ENGINE] Reviewer feedback unchanged at iteration {}, accepting current output",
                            iteration
                        );
                        approved = true;
                        converged = true;
                    }
                }
            }

            history.push(IterationResult {
                iteration,
                output: output.clone(),
                feedback: feedback.clone(),
                approved,
                converged,
                tool_calls,
                completed_at: Utc::now(),
            });

            if approved {
                return Ok(Termination::Approved);
            }

            transcript.push(Message::assistant(output));
            transcript.push(Message::user(revision_request(&feedback)));
        }

        log::warn!(
            "[ENGINE] Task {} reached the {}-iteration cap without approval",
            request.task_id,
            max_iterations
        );
        Ok(Termination::MaxIterationsReached)
    }

    fn inject_feedback(&self, transcript: &mut Vec<Message>) {
        let pending = self.feedback.lock().drain_pending();
        if pending.is_empty() {
            return;
        }
        log::info!("[ENGINE] Injecting {} operator feedback message(s)", pending.len());
        transcript.extend(pending.iter().map(|m| Message::user(operator_feedback(m))));
    }

    /// Apply the overflow strategy. Returns the abort message when the run
    /// must stop.
    fn fit_context(
        &self,
        transcript: &mut Vec<Message>,
        context_limit: usize,
        model: &str,
    ) -> Option<String> {
        let threshold = self.config.context_abort_fraction;
        let utilization = estimate_utilization(transcript, context_limit);
        if utilization <= threshold {
            return None;
        }

        let estimated = estimate_transcript_tokens(transcript);
        log::warn!(
            "[ENGINE] Context at {:.0}% of {} tokens for {} (~{} estimated)",
            utilization * 100.0,
            context_limit,
            model,
            estimated
        );

        match self.config.overflow_strategy {
            OverflowStrategy::Error => Some(format!(
                "Stopped before calling the model: the conversation is estimated at ~{} tokens, \
                 over {:.0}% of the {}-token context window of {}. Shorten the task, raise the \
                 model's context limit, or switch to the truncate_oldest overflow strategy.",
                format_thousands(estimated),
                threshold * 100.0,
                format_thousands(context_limit),
                model
            )),
            OverflowStrategy::TruncateOldest => {
                let removed = compact(transcript);
                if removed > 0 {
                    log::info!("[ENGINE] Compacted {} older message(s)", removed);
                }
                if estimate_utilization(transcript, context_limit) > threshold {
                    let dropped = truncate_to_recent(transcript, TRUNCATE_KEEP_RECENT);
                    log::warn!("[ENGINE] Still over budget, dropped {} more message(s)", dropped);
                }
                None
            }
        }
    }

    async fn generate(
        &mut self,
        request: &TaskRequest,
        transcript: &[Message],
    ) -> Result<(String, Vec<ToolCallRecord>), LoopError> {
        if self.catalog.all_schemas().is_empty() {
            let output = self
                .controller
                .complete(&request.worker_model, transcript)
                .await?;
            return Ok((output, Vec::new()));
        }

        let mut working = transcript.to_vec();
        let mut tool_loop = ToolLoop {
            controller: &mut self.controller,
            catalog: self.catalog.as_ref(),
            gate: self.gate.as_ref(),
            hooks: self.hooks.as_ref(),
            cancel: &self.cancel,
            task_id: &request.task_id,
            max_rounds: self.config.max_tool_rounds,
            tool_timeout: self.config.tool_timeout(),
            approval_timeout: self.config.approval_timeout(),
        };
        let outcome = tool_loop.run(&request.worker_model, &mut working).await?;
        Ok((outcome.output, outcome.records))
    }

    async fn review(
        &mut self,
        request: &TaskRequest,
        reviewer: &str,
        output: &str,
        tool_calls: &[ToolCallRecord],
    ) -> Result<(bool, String), LoopError> {
        let tool_summary = (!tool_calls.is_empty()).then(|| {
            tool_calls
                .iter()
                .map(ToolCallRecord::summary_line)
                .collect::<Vec<_>>()
                .join("\n")
        });
        let messages = vec![
            Message::system(request.category.reviewer_prompt()),
            Message::user(review_request(&request.description, output, tool_summary.as_deref())),
        ];

        let verdict = self.controller.complete(reviewer, &messages).await?;
        let approved = is_approved(&verdict);
        log::info!(
            "[REVIEW] {} for task {}",
            if approved { "Approved" } else { "Changes requested" },
            request.task_id
        );
        Ok((approved, verdict))
    }
}
