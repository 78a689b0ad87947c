//! One reasoning step against the language-model backend.

use std::sync::Arc;
use std::time::Duration;

use compass_llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmError, LlmProvider, ToolDefinition,
    ToolUse,
};

use crate::config::CompassCfg;

/// A capability invocation requested by the reasoning step.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// What one reasoning step produced. The capability loop dispatches on this tag only.
#[derive(Debug, Clone)]
pub enum ReasoningOutput {
    /// No invocations: the text is the answer.
    FinalText(String),
    /// At least one invocation; `narration` is any text emitted alongside.
    Invocations {
        narration: String,
        calls: Vec<Invocation>,
        response: CompletionResponse,
    },
}

impl ReasoningOutput {
    /// Classify a backend response. Presence of a tool-use block always wins over text.
    pub fn from_response(response: CompletionResponse) -> Self {
        let uses: Vec<ToolUse> = response.tool_uses();
        if uses.is_empty() {
            return Self::FinalText(response.content);
        }
        let calls = uses
            .into_iter()
            .map(|u| Invocation {
                id: if u.id.is_empty() { format!("inv_{}", uuid::Uuid::new_v4().simple()) } else { u.id },
                name: u.name,
                args: u.input,
            })
            .collect();
        Self::Invocations { narration: response.content.clone(), calls, response }
    }
}

/// Backend handle carrying the call budget every reasoning step shares.
#[derive(Clone)]
pub struct Reasoner {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

impl Reasoner {
    pub fn new(provider: Arc<dyn LlmProvider>, cfg: &CompassCfg) -> Self {
        Self {
            provider,
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            timeout_secs: cfg.call_timeout_secs,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Raw completion bounded by the per-call timeout.
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<CompletionResponse, LlmError> {
        let request = CompletionRequest {
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tools,
        };
        match tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.complete(request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    timeout_secs = self.timeout_secs,
                    "reasoning call timed out"
                );
                Err(LlmError::Timeout(self.timeout_secs))
            }
        }
    }

    /// One reasoning step with capabilities exposed.
    pub async fn step(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ReasoningOutput, LlmError> {
        let response = self.complete(messages, tools).await?;
        Ok(ReasoningOutput::from_response(response))
    }

    /// Text-only answer over a prepared message list.
    pub async fn text(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        Ok(self.complete(messages, vec![]).await?.content)
    }

    /// Single-prompt helper: one user message, text back.
    pub async fn prompt(&self, prompt: impl Into<String>) -> Result<String, LlmError> {
        self.text(vec![ChatMessage::user(prompt)]).await
    }
}
