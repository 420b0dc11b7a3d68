//! Streaming tool-call orchestrator (spec C4 + C5).
//!
//! Runs the chat loop's S0→S1→S2→S3 state machine for one user turn:
//! stream a completion, and whenever the assistant requests tool calls,
//! validate/approve/execute each in order before looping back for another
//! streaming round, until a final answer, cancellation, or the termination
//! policy cuts the round short.

pub mod approval;
pub mod results_cache;

use std::time::Duration;

use crate::provider::{CancelToken, CompletionOptions, Message, StreamEvent, ToolCall, ToolResult};
use crate::router::{Router, RouterError, RoutingInputs};
use crate::tools::ToolRegistry;

pub use approval::{Approval, ApprovalCache, ApprovalStats};
pub use results_cache::ResultsCache;

#[derive(Debug, Clone, Copy)]
pub struct TerminationPolicy {
    pub max_tool_calls_per_turn: usize,
    pub max_rounds: usize,
    pub per_tool_timeout: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self { max_tool_calls_per_turn: 10, max_rounds: 5, per_tool_timeout: Duration::from_secs(30) }
    }
}

/// Caller policy for a dangerous tool with no cached approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnapprovedPolicy {
    /// Block on an interactive prompt and cache the decision.
    Prompt,
    /// Deny automatically without prompting (e.g. non-interactive runs).
    SkipUnapproved,
}

#[derive(Debug)]
pub enum TurnOutcome {
    Final { content: String },
    Cancelled,
}

pub struct Orchestrator<'a> {
    router: &'a Router,
    tools: &'a ToolRegistry,
    policy: TerminationPolicy,
    unapproved: UnapprovedPolicy,
}

/// Caller hook invoked to obtain a user's yes/no decision for a dangerous
/// tool call with no cached approval.
pub type ApprovalPrompt<'a> = &'a mut (dyn FnMut(&ToolCall) -> bool + Send);

impl<'a> Orchestrator<'a> {
    pub fn new(router: &'a Router, tools: &'a ToolRegistry) -> Self {
        Self { router, tools, policy: TerminationPolicy::default(), unapproved: UnapprovedPolicy::SkipUnapproved }
    }

    pub fn with_policy(mut self, policy: TerminationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_unapproved_policy(mut self, unapproved: UnapprovedPolicy) -> Self {
        self.unapproved = unapproved;
        self
    }

    /// Runs one user turn to completion (S-final) or cancellation (S-cancel).
    #[allow(clippy::too_many_arguments)]
    pub async fn run_turn(
        &self,
        routing: &RoutingInputs,
        mut history: Vec<Message>,
        options: &CompletionOptions,
        approvals: &mut ApprovalCache,
        results_cache: &mut ResultsCache,
        mut prompt_for_approval: Option<ApprovalPrompt<'_>>,
        on_text: OnText<'_>,
        cancel: &CancelToken,
    ) -> Result<TurnOutcome, RouterError> {
        let mut rounds = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Ok(TurnOutcome::Cancelled);
            }

            // Once the round budget is exhausted, force this round to be the
            // last one: strip `tools` from the request so the provider has
            // nothing to call, and treat whatever comes back as final
            // regardless of what the model emits. Relying on the system note
            // alone to stop a non-compliant model would loop unboundedly.
            let forced_final = rounds >= self.policy.max_rounds;
            let mut round_options = options.clone();
            if forced_final {
                history.push(Message::system("tool budget exhausted: max_rounds reached, provide a final answer without further tool calls"));
                round_options.tools = None;
            }
            rounds += 1;

            let mut content = String::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();
            let mut stream_error = None;

            let result = self
                .router
                .complete_stream(
                    routing,
                    &history,
                    &round_options,
                    &mut |ev: StreamEvent| {
                        content.push_str(&ev.delta);
                        on_text(&ev.delta);
                        if ev.done {
                            if let Some(tc) = ev.tool_calls {
                                tool_calls = tc;
                            }
                        }
                    },
                    cancel,
                )
                .await;

            if let Err(e) = result {
                stream_error = Some(e);
            }

            if cancel.is_cancelled() {
                return Ok(TurnOutcome::Cancelled);
            }
            if let Some(e) = stream_error {
                return Err(e);
            }

            if forced_final {
                if !tool_calls.is_empty() {
                    log::warn!("model emitted tool calls on the forced final round; ignoring them and returning the text produced so far");
                }
                return Ok(TurnOutcome::Final { content });
            }

            if tool_calls.is_empty() {
                return Ok(TurnOutcome::Final { content });
            }

            let bounded: Vec<_> = tool_calls.iter().take(self.policy.max_tool_calls_per_turn).collect();
            if bounded.len() < tool_calls.len() {
                log::warn!("turn requested {} tool calls, exceeding max_tool_calls_per_turn; truncating", tool_calls.len());
            }

            let mut results = Vec::with_capacity(bounded.len());
            for call in &bounded {
                let result = self.execute_one(call, approvals, &mut prompt_for_approval).await;
                results_cache.insert(result.clone());
                results.push(result);
            }

            history.push(Message {
                role: crate::provider::Role::Assistant,
                content: content.clone(),
                name: None,
                tool_call_id: None,
                tool_calls: bounded.into_iter().cloned().collect(),
            });
            for result in &results {
                history.push(Message::tool_result(result.call_id.clone(), result.as_message_content()));
            }
        }
    }

    async fn execute_one(
        &self,
        call: &ToolCall,
        approvals: &mut ApprovalCache,
        prompt_for_approval: &mut Option<ApprovalPrompt<'_>>,
    ) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            return ToolResult::failure(call.id.clone(), format!("unknown_tool: {}", call.name), 0);
        };
        let schema = tool.schema();

        if schema.dangerous {
            match approvals.lookup(&call.name, &schema.category) {
                Some(Approval::Denied) => {
                    return ToolResult::failure(call.id.clone(), "denied", 0);
                }
                Some(Approval::Approved) => {}
                None => match prompt_for_approval.as_deref_mut() {
                    Some(prompt) if self.unapproved == UnapprovedPolicy::Prompt => {
                        let approved = prompt(call);
                        let decision = if approved { Approval::Approved } else { Approval::Denied };
                        approvals.set_tool(call.name.clone(), decision);
                        if !approved {
                            return ToolResult::failure(call.id.clone(), "denied", 0);
                        }
                    }
                    _ => {
                        return ToolResult::failure(call.id.clone(), "unapproved", 0);
                    }
                },
            }
        }

        let timeout = self.policy.per_tool_timeout;
        match tokio::time::timeout(timeout, self.tools.execute(call)).await {
            Ok(Some(result)) => result,
            Ok(None) => ToolResult::failure(call.id.clone(), format!("unknown_tool: {}", call.name), 0),
            Err(_) => ToolResult::failure(call.id.clone(), format!("timeout after {}s", timeout.as_secs()), timeout.as_millis() as u64),
        }
    }
}

/// Callback invoked with each raw text delta as it streams in, independent
/// of the accumulated-content bookkeeping the orchestrator itself does.
pub type OnText<'a> = &'a mut (dyn FnMut(&str) + Send);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        Capabilities, CompletionResponse, Model, OnEvent, Provider, ProviderError, ProviderHealth, ProviderMetrics,
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    #[test]
    fn default_termination_policy_matches_spec_defaults() {
        let policy = TerminationPolicy::default();
        assert_eq!(policy.max_tool_calls_per_turn, 10);
        assert_eq!(policy.max_rounds, 5);
    }

    /// A provider that always emits one tool call and never produces a
    /// tool-free final answer on its own, so the orchestrator's round budget
    /// is the only thing that can end the turn.
    struct StubbornToolCaller;

    #[async_trait]
    impl Provider for StubbornToolCaller {
        fn name(&self) -> &str {
            "stubborn"
        }
        fn display_name(&self) -> &str {
            "Stubborn Tool Caller"
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities { streaming: true, function_calling: true, ..Default::default() }
        }
        async fn initialize(&self) -> Result<(), ProviderError> {
            Ok(())
        }
        async fn test_connection(&self) -> bool {
            true
        }
        async fn complete(&self, _messages: &[Message], _options: &CompletionOptions) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse { content: String::new(), tool_calls: Vec::new(), usage: None })
        }
        async fn complete_stream(
            &self,
            _messages: &[Message],
            options: &CompletionOptions,
            on_event: OnEvent<'_>,
            _cancel: &CancelToken,
        ) -> Result<(), ProviderError> {
            // Only emits a tool call when the request still advertises
            // tools; once the orchestrator strips them for the forced final
            // round, it behaves and returns plain text.
            let tool_calls = if options.tools.is_some() {
                Some(vec![ToolCall { id: "1".into(), name: "nope".into(), arguments: serde_json::json!({}) }])
            } else {
                None
            };
            on_event(StreamEvent { delta: String::new(), done: true, usage: None, tool_calls });
            Ok(())
        }
        fn list_models(&self) -> Vec<Model> {
            Vec::new()
        }
        fn calculate_cost(&self, _prompt_tokens: u32, _completion_tokens: u32, _model: Option<&str>) -> f64 {
            0.0
        }
        fn health(&self) -> ProviderHealth {
            ProviderHealth::default()
        }
        fn metrics(&self) -> ProviderMetrics {
            ProviderMetrics::default()
        }
    }

    #[tokio::test]
    async fn forced_final_round_terminates_even_when_the_model_keeps_requesting_tools() {
        let router = Router::new(vec![Arc::new(StubbornToolCaller) as Arc<dyn Provider>]);
        let tools = ToolRegistry::new();
        let policy = TerminationPolicy { max_tool_calls_per_turn: 10, max_rounds: 3, per_tool_timeout: std::time::Duration::from_secs(1) };
        let orchestrator = Orchestrator::new(&router, &tools).with_policy(policy);

        let options = CompletionOptions { tools: Some(vec![]), ..Default::default() };
        let mut approvals = ApprovalCache::new();
        let mut results_cache = ResultsCache::new(10);
        let mut sink = |_: &str| {};
        let cancel = CancelToken::new();

        let outcome = orchestrator
            .run_turn(
                &RoutingInputs::default(),
                vec![Message::user("loop forever")],
                &options,
                &mut approvals,
                &mut results_cache,
                None,
                &mut sink,
                &cancel,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, TurnOutcome::Final { .. }));
    }
}
