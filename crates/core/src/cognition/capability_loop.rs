//! The capability loop: reason, execute requested capabilities, feed results
//! back, repeat until the reasoning step answers or the round-trip cap is hit.
//!
//! ```text
//! Reasoning --(invocations)--> Executing --(all results appended)--> Reasoning
//! Reasoning --(final text)---> Done
//! Reasoning --(cap reached / cancelled)--> Done (diagnostic set)
//! ```

use futures::future::join_all;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use compass_llm::provider::{ChatMessage, ContentBlock, LlmError, Role};

use super::prompt::WRAP_UP_INSTRUCTION;
use super::reasoning::{Invocation, Reasoner, ReasoningOutput};
use crate::capability::{CapabilityRegistry, CapabilityResult};
use crate::config::CompassCfg;
use crate::error::LoopDiagnostic;
use crate::io::output::{OutputSender, emit_status};

const BUDGET_FALLBACK: &str =
    "I gathered some information but couldn't finish the whole request. Could you narrow it down a little?";
const CANCELLED_ANSWER: &str = "Stopped before finishing.";
const EMPTY_FALLBACK: &str = "I'm not sure how to answer that yet. Could you rephrase?";

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Reasoning/execution round-trips before a forced wrap-up.
    pub max_iterations: usize,
    pub call_timeout: Duration,
    pub parallel: bool,
}

impl LoopSettings {
    pub fn from_cfg(cfg: &CompassCfg) -> Self {
        Self {
            max_iterations: cfg.max_loop_iterations.max(1),
            call_timeout: Duration::from_secs(cfg.call_timeout_secs),
            parallel: cfg.parallel_capabilities,
        }
    }
}

/// One executed invocation and what it produced.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    pub invocation: Invocation,
    pub result: CapabilityResult,
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Terminal answer. Never empty.
    pub answer: String,
    /// Executing phases completed.
    pub iterations: usize,
    pub diagnostic: Option<LoopDiagnostic>,
    /// Seed plus every assistant/tool message the loop appended.
    pub transcript: Vec<ChatMessage>,
    pub records: Vec<InvocationRecord>,
}

enum LoopState {
    Reasoning,
    Executing(Vec<Invocation>),
    Done(String),
}

pub struct CapabilityLoop<'a> {
    reasoner: &'a Reasoner,
    registry: &'a CapabilityRegistry,
    settings: LoopSettings,
    status: Option<&'a OutputSender>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> CapabilityLoop<'a> {
    pub fn new(reasoner: &'a Reasoner, registry: &'a CapabilityRegistry, settings: LoopSettings) -> Self {
        Self { reasoner, registry, settings, status: None, cancel: None }
    }

    pub fn with_status(mut self, status: Option<&'a OutputSender>) -> Self {
        self.status = status;
        self
    }

    pub fn with_cancel(mut self, cancel: Option<&'a CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drive the state machine from `seed` (system context + history) to `Done`.
    ///
    /// Capability failures are fed back as results; only reasoning-backend
    /// errors escape.
    pub async fn run(&self, seed: Vec<ChatMessage>) -> Result<LoopOutcome, LlmError> {
        let tools = self.registry.tool_definitions();
        let mut transcript = seed;
        let mut records: Vec<InvocationRecord> = Vec::new();
        let mut round_trips = 0usize;
        let mut last_narration = String::new();
        let mut diagnostic = None;
        let mut state = LoopState::Reasoning;

        let answer = loop {
            state = match state {
                LoopState::Reasoning => {
                    if self.cancel.is_some_and(CancellationToken::is_cancelled) {
                        tracing::info!(round_trips, "capability loop cancelled");
                        diagnostic = Some(LoopDiagnostic::Cancelled);
                        LoopState::Done(non_empty(&last_narration).unwrap_or(CANCELLED_ANSWER).to_string())
                    } else if round_trips >= self.settings.max_iterations {
                        tracing::warn!(round_trips, "capability loop budget exceeded, forcing wrap-up");
                        diagnostic = Some(LoopDiagnostic::BudgetExceeded { iterations: round_trips });
                        LoopState::Done(self.wrap_up(&transcript, &last_narration).await)
                    } else {
                        match self.reasoner.step(transcript.clone(), tools.clone()).await? {
                            ReasoningOutput::FinalText(text) => {
                                let text = match non_empty(&text) {
                                    Some(t) => t.to_string(),
                                    None => non_empty(&last_narration).unwrap_or(EMPTY_FALLBACK).to_string(),
                                };
                                LoopState::Done(text)
                            }
                            ReasoningOutput::Invocations { narration, calls, response } => {
                                tracing::debug!(
                                    round_trip = round_trips + 1,
                                    calls = calls.len(),
                                    names = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                                    "reasoning step requested capabilities"
                                );
                                if let Some(n) = non_empty(&narration) {
                                    emit_status(self.status, n).await;
                                    last_narration = n.to_string();
                                }
                                transcript.push(assistant_turn(response.content_blocks, &calls));
                                LoopState::Executing(calls)
                            }
                        }
                    }
                }
                LoopState::Executing(calls) => {
                    round_trips += 1;
                    let results = self.execute_all(&calls).await;
                    let blocks = calls
                        .iter()
                        .zip(&results)
                        .map(|(call, result)| result_block(call, result))
                        .collect();
                    transcript.push(ChatMessage::tool_results(blocks));
                    records.extend(
                        calls
                            .into_iter()
                            .zip(results)
                            .map(|(invocation, result)| InvocationRecord { invocation, result }),
                    );
                    LoopState::Reasoning
                }
                LoopState::Done(answer) => break answer,
            };
        };

        Ok(LoopOutcome { answer, iterations: round_trips, diagnostic, transcript, records })
    }

    /// Resolve every invocation of one step, in request order.
    async fn execute_all(&self, calls: &[Invocation]) -> Vec<CapabilityResult> {
        for call in calls {
            emit_status(self.status, self.registry.progress_label(&call.name)).await;
        }
        if self.settings.parallel && calls.len() > 1 {
            join_all(
                calls
                    .iter()
                    .map(|c| self.registry.execute(&c.name, &c.args, self.settings.call_timeout)),
            )
            .await
        } else {
            let mut out = Vec::with_capacity(calls.len());
            for c in calls {
                out.push(self.registry.execute(&c.name, &c.args, self.settings.call_timeout).await);
            }
            out
        }
    }

    /// Best-effort answer once the budget is gone: one tool-less call.
    async fn wrap_up(&self, transcript: &[ChatMessage], last_narration: &str) -> String {
        // tool blocks are only valid when tools are offered
        let mut messages: Vec<ChatMessage> = transcript.iter().map(flatten_tool_blocks).collect();
        match messages.first_mut() {
            Some(first) if first.role == Role::System => {
                first.content = format!("{}\n\n{WRAP_UP_INSTRUCTION}", first.content);
            }
            _ => messages.insert(0, ChatMessage::system(WRAP_UP_INSTRUCTION)),
        }
        match self.reasoner.complete(messages, vec![]).await {
            Ok(resp) if !resp.content.trim().is_empty() => resp.content,
            Ok(_) => non_empty(last_narration).unwrap_or(BUDGET_FALLBACK).to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "wrap-up call failed");
                non_empty(last_narration).unwrap_or(BUDGET_FALLBACK).to_string()
            }
        }
    }
}

/// Plain-text rendition of a message, with tool traffic written out as prose.
fn flatten_tool_blocks(message: &ChatMessage) -> ChatMessage {
    if message.content_blocks.is_empty() && message.role != Role::Tool {
        return message.clone();
    }
    let lines: Vec<String> = message
        .content_blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => non_empty(text).map(str::to_string),
            ContentBlock::ToolUse { name, input, .. } => Some(format!("[called {name} with {input}]")),
            ContentBlock::ToolResult { content, is_error, .. } => Some(if *is_error {
                format!("[tool failed] {content}")
            } else {
                format!("[tool result] {content}")
            }),
        })
        .collect();
    let text = lines.join("\n");
    match message.role {
        Role::Assistant => ChatMessage::assistant(text),
        Role::System => ChatMessage::system(text),
        Role::User | Role::Tool => ChatMessage::user(text),
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

/// Assistant message echoing the step, with tool-use ids matching the invocations.
fn assistant_turn(blocks: Vec<ContentBlock>, calls: &[Invocation]) -> ChatMessage {
    let mut ids = calls.iter();
    let blocks = blocks
        .into_iter()
        .map(|b| match b {
            ContentBlock::ToolUse { .. } => match ids.next() {
                Some(c) => ContentBlock::ToolUse {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    input: c.args.clone(),
                },
                None => b,
            },
            other => other,
        })
        .collect();
    ChatMessage::from_content_blocks(Role::Assistant, blocks)
}

fn result_block(call: &Invocation, result: &CapabilityResult) -> ContentBlock {
    match result {
        Ok(payload) => ContentBlock::ToolResult {
            tool_use_id: call.id.clone(),
            content: payload.render(),
            is_error: false,
        },
        Err(failure) => ContentBlock::ToolResult {
            tool_use_id: call.id.clone(),
            content: failure.to_string(),
            is_error: true,
        },
    }
}
