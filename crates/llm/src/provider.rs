use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Plain text content (concatenation of Text blocks).
    pub content: String,
    /// Structured content blocks (native tool use protocol).
    /// Empty means the message is plain text only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_blocks: Vec<ContentBlock>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), content_blocks: vec![] }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), content_blocks: vec![] }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), content_blocks: vec![] }
    }

    /// Build a message from structured content blocks.
    pub fn from_content_blocks(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self { role, content: join_text(&blocks), content_blocks: blocks }
    }

    /// Build a Tool message carrying capability results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self { role: Role::Tool, content: String::new(), content_blocks: results }
    }

    /// Tool-use requests carried by this message, in emission order.
    pub fn tool_uses(&self) -> Vec<ToolUse> {
        collect_tool_uses(&self.content_blocks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Capability results fed back to the model.
    Tool,
}

// ── Tool use types ──

/// Tool definition sent in requests (name + description + JSON Schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A content block in a message: text, tool use, or tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    ToolResult { tool_use_id: String, content: String, is_error: bool },
}

/// A tool-use request lifted out of a content block.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    EndTurn,
    ToolUse,
    MaxTokens,
}

/// LLM completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Tool definitions for native tool use (empty = no tools).
    pub tools: Vec<ToolDefinition>,
}

/// LLM completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Convenience: concatenation of all Text blocks.
    pub content: String,
    /// Structured content blocks from the model.
    pub content_blocks: Vec<ContentBlock>,
    /// Why the model stopped.
    pub stop_reason: StopReason,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl CompletionResponse {
    /// Plain text response with `EndTurn`.
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            content_blocks: vec![ContentBlock::Text { text: content.clone() }],
            content,
            stop_reason: StopReason::EndTurn,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    /// Response built from blocks; stop reason is `ToolUse` when any tool-use block is present.
    pub fn from_blocks(blocks: Vec<ContentBlock>) -> Self {
        let stop_reason = if blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. })) {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };
        Self {
            content: join_text(&blocks),
            content_blocks: blocks,
            stop_reason,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    /// Tool-use requests in this response, in emission order.
    pub fn tool_uses(&self) -> Vec<ToolUse> {
        collect_tool_uses(&self.content_blocks)
    }
}

fn join_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

fn collect_tool_uses(blocks: &[ContentBlock]) -> Vec<ToolUse> {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some(ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited")]
    RateLimited,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
}

/// Trait for LLM providers (OpenAI-compatible, Ollama, Claude, etc.)
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>;
}

/// Mock provider for testing; returns a fixed response.
#[derive(Debug, Clone)]
pub struct MockProvider {
    pub response: String,
    pub response_blocks: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        let text = response.into();
        Self {
            response: text.clone(),
            response_blocks: vec![ContentBlock::Text { text }],
            stop_reason: StopReason::EndTurn,
        }
    }

    /// Create a mock that returns specific content blocks and stop reason.
    pub fn with_blocks(blocks: Vec<ContentBlock>, stop_reason: StopReason) -> Self {
        Self { response: join_text(&blocks), response_blocks: blocks, stop_reason }
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        let content = self.response.clone();
        let blocks = self.response_blocks.clone();
        let stop = self.stop_reason;
        Box::pin(async move {
            Ok(CompletionResponse {
                content,
                content_blocks: blocks,
                stop_reason: stop,
                input_tokens: 10,
                output_tokens: 20,
            })
        })
    }
}

/// Scripted provider for testing multi-step exchanges.
///
/// Replies are handed out in order; once the script runs dry the fallback
/// reply (if any) repeats forever, otherwise calls fail. Every request is
/// captured so tests can inspect what the model was shown.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<CompletionResponse, String>>>,
    fallback: Option<CompletionResponse>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<CompletionResponse>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// A provider that answers every call with the same response.
    pub fn repeating(reply: CompletionResponse) -> Self {
        Self { fallback: Some(reply), ..Self::default() }
    }

    /// Queue a failure at the end of the script.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(message.into()));
        }
        self
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let reply = match next {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(msg)) => Err(LlmError::RequestFailed(msg)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::Unavailable("script exhausted".into())),
        };
        Box::pin(async move { reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::user(text)],
            max_tokens: 100,
            temperature: 0.7,
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn mock_provider_returns_response() {
        let mock = MockProvider::new("hello compass");
        let resp = mock.complete(request("hi")).await.unwrap();
        assert_eq!(resp.content, "hello compass");
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn scripted_provider_replays_in_order() {
        let provider = ScriptedProvider::new(vec![
            CompletionResponse::text("first"),
            CompletionResponse::text("second"),
        ]);
        assert_eq!(provider.complete(request("a")).await.unwrap().content, "first");
        assert_eq!(provider.complete(request("b")).await.unwrap().content, "second");
        assert!(provider.complete(request("c")).await.is_err());
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.requests()[1].messages[0].content, "b");
    }

    #[tokio::test]
    async fn scripted_provider_surfaces_queued_failure() {
        let provider = ScriptedProvider::new(vec![CompletionResponse::text("ok")]).then_fail("boom");
        assert!(provider.complete(request("a")).await.is_ok());
        let err = provider.complete(request("b")).await.unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(m) if m == "boom"));
    }

    #[test]
    fn from_blocks_detects_tool_use() {
        let resp = CompletionResponse::from_blocks(vec![
            ContentBlock::Text { text: "Let me look.".into() },
            ContentBlock::ToolUse {
                id: "tu_1".into(),
                name: "search".into(),
                input: serde_json::json!({"query": "rust jobs"}),
            },
        ]);
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.content, "Let me look.");
        let uses = resp.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].name, "search");
    }

    #[test]
    fn tool_results_message_uses_tool_role() {
        let msg = ChatMessage::tool_results(vec![ContentBlock::ToolResult {
            tool_use_id: "tu_1".into(),
            content: "done".into(),
            is_error: false,
        }]);
        assert_eq!(msg.role, Role::Tool);
        assert!(msg.content.is_empty());
    }
}
