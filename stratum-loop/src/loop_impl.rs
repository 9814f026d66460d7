//! Core loop implementation and builder.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use stratum_compress::{Compressor, NullModel};
use stratum_context::{ContextConfig, ContextManager};
use stratum_hooks::{CompressionHook, Hook, HookContext, HookKind, HookRegistry};
use stratum_phase::Orchestrator;
use stratum_state::{reduce, AgentState};
use stratum_tool::{DispatchResult, Dispatcher, ToolRegistry};
use stratum_types::{
    CompletionRequest, Message, PhaseError, PlanApprovalResponse, PlanStatus, Provider, Role,
    SystemPrompt, TokenUsage, ToolCall,
};

use crate::config::RuntimeConfig;
use crate::event::{LoopOutcome, LoopRun, StateEvent};

/// The agent loop.
///
/// Owns the provider, the tool dispatcher, the hook registry, the phase
/// orchestrator, and the context manager. One loop drives one session at a
/// time; the state itself lives with the caller.
pub struct AgentLoop<P: Provider> {
    provider: P,
    dispatcher: Dispatcher,
    hooks: HookRegistry,
    orchestrator: Orchestrator,
    manager: Arc<ContextManager>,
    config: RuntimeConfig,
    cancellation: CancellationToken,
}

impl<P: Provider> AgentLoop<P> {
    /// Start building a loop around a provider.
    #[must_use]
    pub fn builder(provider: P) -> AgentLoopBuilder<P> {
        AgentLoopBuilder {
            provider,
            config: RuntimeConfig::default(),
            context_config: ContextConfig::default(),
            tools: ToolRegistry::new(),
            hooks: Vec::new(),
            orchestrator: Orchestrator::default(),
            cancellation: CancellationToken::new(),
            selective_compression: false,
            content_producing: Vec::new(),
        }
    }

    /// The cancellation token; cancel it to stop the loop at the next
    /// suspension point.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// The hook registry (for stats inspection).
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Run until a terminal condition, collecting no events.
    pub async fn run(&self, state: &mut AgentState, input: Option<Message>) -> LoopRun {
        self.run_with_events(state, input, None).await
    }

    /// Answer a pending plan-approval interrupt.
    ///
    /// Maps the host's response through the orchestrator (approve / edit /
    /// reject); call [`AgentLoop::run`] again afterwards to continue the
    /// conversation.
    ///
    /// # Errors
    ///
    /// [`PhaseError::Unknown`] when the plan id matches no pending plan.
    pub fn resume(
        &self,
        state: &mut AgentState,
        plan_id: &str,
        response: &PlanApprovalResponse,
    ) -> Result<PlanStatus, PhaseError> {
        self.orchestrator.apply_approval(state, plan_id, response)
    }

    /// Run until a terminal condition, emitting a [`StateEvent`] after each
    /// completed node when a sender is supplied.
    pub async fn run_with_events(
        &self,
        state: &mut AgentState,
        input: Option<Message>,
        events: Option<&UnboundedSender<StateEvent>>,
    ) -> LoopRun {
        if let Some(input) = input {
            state.messages.push(input);
        }

        let mut usage = TokenUsage::default();
        let mut iterations: usize = 0;

        loop {
            if self.cancellation.is_cancelled() {
                return self.finish(events, LoopOutcome::Cancelled, iterations, usage);
            }
            if let Some(max) = self.config.max_iterations {
                if iterations >= max {
                    return self
                        .finish(events, LoopOutcome::MaxIterationsExceeded, iterations, usage)
                        .with_reason(format!("iteration limit of {max} reached"));
                }
            }

            // Pre-step hooks: compression lives here.
            let before = state.messages.len();
            let summary = {
                let ctx = HookContext::new(HookKind::PreStep, state);
                self.hooks.dispatch(&ctx).await
            };
            let compressed = summary.compressed;
            if let Some(reason) = summary.fatal {
                return self
                    .finish(events, LoopOutcome::FatalToolError, iterations, usage)
                    .with_reason(reason);
            }
            if let Some(update) = summary.update {
                reduce(state, update);
            }
            if compressed {
                emit(
                    events,
                    StateEvent::Compressed {
                        before,
                        after: state.messages.len(),
                    },
                );
            }

            // Phase configuration; a finished workflow is a clean exit.
            let (prompt, tool_names) = match self.orchestrator.current_agent(state) {
                Ok(agent) => (agent.prompt, agent.tool_names),
                Err(PhaseError::AlreadyComplete) => {
                    return self.finish(events, LoopOutcome::Terminal, iterations, usage);
                }
                Err(error) => {
                    return self
                        .finish(events, LoopOutcome::FatalToolError, iterations, usage)
                        .with_reason(error.to_string());
                }
            };
            let tools = self.dispatcher.registry().definitions_for(&tool_names);

            // Hard budget check. Compression already had its chance above;
            // still being over the window is fatal, not a warning.
            let metrics = self
                .manager
                .analyze(&state.messages, &self.config.model, &tools);
            if metrics.over_budget() {
                return self
                    .finish(events, LoopOutcome::FatalTokenOverflow, iterations, usage)
                    .with_reason(format!(
                        "{} tokens exceeds window of {}",
                        metrics.tokens_used, metrics.max_tokens
                    ));
            }

            let request = CompletionRequest {
                model: self.config.model.clone(),
                messages: state.messages.clone(),
                system: Some(SystemPrompt::Text(join_prompts(
                    &self.config.system_prompt,
                    &prompt,
                ))),
                tools,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };

            // Provider call with retry on transient failures. Exhausting the
            // retry budget terminates the turn with the error recorded as an
            // assistant message.
            let response = {
                let mut attempts = 0;
                loop {
                    let result = tokio::select! {
                        () = self.cancellation.cancelled() => {
                            return self.finish(events, LoopOutcome::Cancelled, iterations, usage);
                        }
                        result = self.provider.complete(request.clone()) => result,
                    };
                    match result {
                        Ok(response) => break response,
                        Err(error) => {
                            attempts += 1;
                            tracing::warn!(%error, attempts, "provider call failed");
                            let escalated =
                                attempts >= self.config.max_consecutive_provider_failures;
                            if escalated || !error.is_retryable() {
                                state.messages.push(
                                    Message::assistant(format!("Model call failed: {error}"))
                                        .with_metadata(stratum_types::meta::ERROR, true.into()),
                                );
                                let reason = if escalated {
                                    format!("provider failed {attempts} consecutive times: {error}")
                                } else {
                                    format!("provider error: {error}")
                                };
                                return self
                                    .finish(events, LoopOutcome::Terminal, iterations, usage)
                                    .with_reason(reason);
                            }
                        }
                    }
                }
            };

            usage.accumulate(&response.usage);
            iterations += 1;

            let mut assistant = response.message;
            assistant.role = Role::Assistant;
            let tool_calls = assistant.tool_calls.clone();
            state.messages.push(assistant);
            emit(
                events,
                StateEvent::ModelResponded {
                    tool_calls: tool_calls.len(),
                },
            );

            if tool_calls.is_empty() {
                // The closing step still gets its post-step hooks and a
                // phase-validation pass before the loop returns.
                let summary = {
                    let ctx = HookContext::new(HookKind::PostStep, state);
                    self.hooks.dispatch(&ctx).await
                };
                if let Some(update) = summary.update {
                    reduce(state, update);
                }
                if let Ok(check) = self.orchestrator.advance(state) {
                    if check.ok {
                        emit(
                            events,
                            StateEvent::PhaseAdvanced {
                                to: state.phase.current_phase,
                            },
                        );
                    }
                }
                return self.finish(events, LoopOutcome::Terminal, iterations, usage);
            }

            if self.cancellation.is_cancelled() {
                return self.finish(events, LoopOutcome::Cancelled, iterations, usage);
            }

            // Pre-tool hooks run per call, before any execution.
            for call in &tool_calls {
                let ctx = HookContext::new(HookKind::PreTool, state).with_metadata(
                    serde_json::json!({
                        "tool": call.name.clone(),
                        "arguments": call.arguments.clone()
                    }),
                );
                let summary = self.hooks.dispatch(&ctx).await;
                if let Some(reason) = summary.fatal {
                    return self
                        .finish(events, LoopOutcome::FatalToolError, iterations, usage)
                        .with_reason(reason);
                }
            }

            // Execute, collecting results in the model-specified order.
            let results = self
                .execute_tool_calls(&tool_calls, &tool_names, state)
                .await;

            let mut interrupt = None;
            for result in results {
                emit(
                    events,
                    StateEvent::ToolCompleted {
                        name: result.message.name.clone().unwrap_or_default(),
                        is_error: result.message.is_error(),
                    },
                );
                state.messages.push(result.message);
                if let Some(update) = result.update {
                    reduce(state, update);
                }
                if interrupt.is_none() {
                    interrupt = result.interrupt;
                }
            }

            // Post-tool hooks observe all of this iteration's results.
            let summary = {
                let ctx = HookContext::new(HookKind::PostTool, state);
                self.hooks.dispatch(&ctx).await
            };
            if let Some(reason) = summary.fatal {
                return self
                    .finish(events, LoopOutcome::FatalToolError, iterations, usage)
                    .with_reason(reason);
            }
            if let Some(update) = summary.update {
                reduce(state, update);
            }

            if let Some(request) = interrupt {
                emit(events, StateEvent::Interrupted(request.clone()));
                let mut run = self.finish(events, LoopOutcome::AwaitingApproval, iterations, usage);
                run.interrupt = Some(request);
                return run;
            }

            // Post-step hooks.
            let summary = {
                let ctx = HookContext::new(HookKind::PostStep, state);
                self.hooks.dispatch(&ctx).await
            };
            if let Some(reason) = summary.fatal {
                return self
                    .finish(events, LoopOutcome::FatalToolError, iterations, usage)
                    .with_reason(reason);
            }
            if let Some(update) = summary.update {
                reduce(state, update);
            }

            // Phase advancement observes all mutations of this iteration.
            if let Ok(check) = self.orchestrator.advance(state) {
                if check.ok {
                    emit(
                        events,
                        StateEvent::PhaseAdvanced {
                            to: state.phase.current_phase,
                        },
                    );
                }
            }
        }
    }

    async fn execute_tool_calls(
        &self,
        calls: &[ToolCall],
        visible: &[String],
        state: &AgentState,
    ) -> Vec<DispatchResult> {
        if self.config.parallel_tool_execution && calls.len() > 1 {
            let futures = calls
                .iter()
                .map(|call| self.dispatcher.dispatch(call, visible, state));
            futures::future::join_all(futures).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.dispatcher.dispatch(call, visible, state).await);
            }
            results
        }
    }

    fn finish(
        &self,
        events: Option<&UnboundedSender<StateEvent>>,
        outcome: LoopOutcome,
        iterations: usize,
        usage: TokenUsage,
    ) -> LoopRun {
        tracing::info!(?outcome, iterations, "loop finished");
        emit(events, StateEvent::Finished(outcome));
        LoopRun::finished(outcome, iterations, usage)
    }
}

fn emit(events: Option<&UnboundedSender<StateEvent>>, event: StateEvent) {
    if let Some(sender) = events {
        let _ = sender.send(event);
    }
}

fn join_prompts(base: &str, phase: &str) -> String {
    if base.is_empty() {
        phase.to_string()
    } else if phase.is_empty() {
        base.to_string()
    } else {
        format!("{base}\n\n{phase}")
    }
}

/// Builder for [`AgentLoop`].
///
/// Only the provider is required; everything else has working defaults: the
/// stock phase catalog, an empty tool registry, no hooks, and the default
/// context configuration.
pub struct AgentLoopBuilder<P: Provider> {
    provider: P,
    config: RuntimeConfig,
    context_config: ContextConfig,
    tools: ToolRegistry,
    hooks: Vec<Arc<dyn Hook>>,
    orchestrator: Orchestrator,
    cancellation: CancellationToken,
    selective_compression: bool,
    content_producing: Vec<String>,
}

impl<P: Provider> AgentLoopBuilder<P> {
    /// Set the runtime configuration.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the context configuration (thresholds, archive sizes, cooldown).
    #[must_use]
    pub fn context_config(mut self, config: ContextConfig) -> Self {
        self.context_config = config;
        self
    }

    /// Set the tool registry.
    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Register a hook.
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Replace the orchestrator (custom phase catalog).
    #[must_use]
    pub fn orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Use an external cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Register the built-in compression hook with the selective-only
    /// compressor. For LLM-backed compression, register a
    /// [`CompressionHook`] built around your own [`Compressor`] instead.
    #[must_use]
    pub fn selective_compression(mut self) -> Self {
        self.selective_compression = true;
        self
    }

    /// Mark a tool as content-producing: oversized output gets the archive
    /// protocol applied by the dispatcher.
    #[must_use]
    pub fn content_producing(mut self, name: impl Into<String>) -> Self {
        self.content_producing.push(name.into());
        self
    }

    /// Build the loop.
    #[must_use]
    pub fn build(self) -> AgentLoop<P> {
        let manager = Arc::new(ContextManager::new(self.context_config.clone()));
        let mut dispatcher =
            Dispatcher::new(self.tools, self.context_config.archive_thresholds);
        for name in self.content_producing {
            dispatcher.mark_content_producing(name);
        }

        let mut hooks = HookRegistry::new();
        if self.selective_compression {
            let compressor: Arc<Compressor<NullModel>> =
                Arc::new(Compressor::selective_only(self.context_config));
            hooks.register(Arc::new(CompressionHook::new(
                Arc::clone(&manager),
                compressor,
                self.config.model.clone(),
            )));
        }
        for hook in self.hooks {
            hooks.register(hook);
        }

        AgentLoop {
            provider: self.provider,
            dispatcher,
            hooks,
            orchestrator: self.orchestrator,
            manager,
            config: self.config,
            cancellation: self.cancellation,
        }
    }
}
