//! HTTP-based LLM providers.
//!
//! Supports OpenAI-compatible chat completions (OpenAI, local Ollama, other compatible hosts)
//! and Anthropic's native Messages API. Both paths speak native tool use.

use crate::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, ContentBlock, LlmError, LlmProvider, Role,
    StopReason, ToolDefinition,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Inferred provider kind from model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    /// Local Ollama server, OpenAI-compatible endpoint, no API key.
    Ollama,
    /// Falls back to OpenAI-compatible format.
    Unknown,
}

impl ProviderKind {
    /// Infer provider from model name prefix.
    pub fn from_model(model: &str) -> Self {
        let m = model.to_lowercase();
        if m.starts_with("gpt-")
            || m.starts_with("o1-")
            || m.starts_with("o3-")
            || m.starts_with("o4-")
        {
            Self::OpenAi
        } else if m.starts_with("claude-") {
            Self::Anthropic
        } else if m.contains(':') || m.starts_with("llama") {
            Self::Ollama
        } else {
            Self::Unknown
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi | Self::Unknown => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }

    fn is_anthropic(self) -> bool {
        matches!(self, Self::Anthropic)
    }

    fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

// ── OpenAI-compatible request/response types ──

#[derive(Serialize)]
struct OaiRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiTool>,
}

#[derive(Serialize)]
struct OaiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OaiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OaiMessage {
    fn plain(role: &'static str, content: String) -> Self {
        Self { role, content: Some(content), tool_calls: vec![], tool_call_id: None }
    }
}

#[derive(Serialize)]
struct OaiTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OaiFunctionDef,
}

#[derive(Serialize)]
struct OaiFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for OaiTool {
    fn from(td: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: OaiFunctionDef {
                name: td.name.clone(),
                description: td.description.clone(),
                parameters: td.input_schema.clone(),
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct OaiToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: OaiFunctionCall,
}

fn function_kind() -> String {
    "function".to_owned()
}

#[derive(Serialize, Deserialize)]
struct OaiFunctionCall {
    name: String,
    /// JSON-encoded argument object.
    arguments: String,
}

#[derive(Deserialize)]
struct OaiResponse {
    choices: Vec<OaiChoice>,
    usage: Option<OaiUsage>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: OaiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OaiChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OaiToolCall>,
}

#[derive(Deserialize)]
struct OaiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ── Anthropic Messages API types ──

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicToolDef>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: AnthropicMessageContent,
}

/// Message content: either a plain string or an array of content blocks.
#[derive(Serialize)]
#[serde(untagged)]
enum AnthropicMessageContent {
    Text(String),
    Blocks(Vec<AnthropicBlock>),
}

/// A content block in an Anthropic message (request side).
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    ToolResult { tool_use_id: String, content: String, is_error: bool },
}

#[derive(Serialize)]
struct AnthropicToolDef {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

impl From<&ToolDefinition> for AnthropicToolDef {
    fn from(td: &ToolDefinition) -> Self {
        Self {
            name: td.name.clone(),
            description: td.description.clone(),
            input_schema: td.input_schema.clone(),
        }
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
    usage: Option<AnthropicUsage>,
    stop_reason: Option<String>,
}

/// A content block in an Anthropic response.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ── Provider ──

/// HTTP-based LLM provider. Handles both OpenAI-compatible and Anthropic APIs.
pub struct HttpProvider {
    kind: ProviderKind,
    model: String,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpProvider {
    /// Build from model name + API key + optional base URL override.
    pub fn new(model: String, api_key: Option<String>, base_url: Option<String>) -> Self {
        let kind = ProviderKind::from_model(&model);
        let base = base_url.unwrap_or_else(|| kind.default_base_url().to_owned());
        Self {
            kind,
            model,
            client: reqwest::Client::new(),
            base_url: base.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        if self.kind.is_anthropic() {
            format!("{}/v1/messages", self.base_url)
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }
}

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Parse error response, returning RateLimited for 429.
fn check_error(status: reqwest::StatusCode, body: String) -> LlmError {
    if status.as_u16() == 429 {
        LlmError::RateLimited
    } else {
        LlmError::RequestFailed(format!("{status}: {body}"))
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        match self.kind {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Unknown => "unknown",
        }
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        if self.kind.is_anthropic() {
            Box::pin(self.complete_anthropic(request))
        } else {
            Box::pin(self.complete_openai(request))
        }
    }
}

/// Flatten our messages into OpenAI chat messages.
/// A Tool message fans out into one `role: "tool"` message per result block.
fn to_oai_messages(messages: &[ChatMessage]) -> Vec<OaiMessage> {
    let mut out = Vec::with_capacity(messages.len());
    for m in messages {
        match m.role {
            Role::Tool => {
                for block in &m.content_blocks {
                    if let ContentBlock::ToolResult { tool_use_id, content, .. } = block {
                        out.push(OaiMessage {
                            role: "tool",
                            content: Some(content.clone()),
                            tool_calls: vec![],
                            tool_call_id: Some(tool_use_id.clone()),
                        });
                    }
                }
            }
            Role::Assistant if !m.content_blocks.is_empty() => {
                let tool_calls: Vec<OaiToolCall> = m
                    .tool_uses()
                    .into_iter()
                    .map(|tu| OaiToolCall {
                        id: tu.id,
                        kind: function_kind(),
                        function: OaiFunctionCall { name: tu.name, arguments: tu.input.to_string() },
                    })
                    .collect();
                out.push(OaiMessage {
                    role: "assistant",
                    content: (!m.content.is_empty()).then(|| m.content.clone()),
                    tool_calls,
                    tool_call_id: None,
                });
            }
            _ => out.push(OaiMessage::plain(role_str(&m.role), m.content.clone())),
        }
    }
    out
}

/// Convert OpenAI tool calls into tool-use blocks.
/// Unparseable argument strings are passed through as a JSON string so the
/// capability layer can reject them with a typed failure.
fn from_oai_tool_calls(calls: Vec<OaiToolCall>) -> Vec<ContentBlock> {
    calls
        .into_iter()
        .enumerate()
        .map(|(i, call)| {
            let input = serde_json::from_str(&call.function.arguments)
                .unwrap_or(serde_json::Value::String(call.function.arguments));
            let id = if call.id.is_empty() { format!("call_{i}") } else { call.id };
            ContentBlock::ToolUse { id, name: call.function.name, input }
        })
        .collect()
}

impl HttpProvider {
    /// OpenAI-compatible completion (OpenAI, Ollama, Unknown).
    async fn complete_openai(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = OaiRequest {
            model: self.model.clone(),
            messages: to_oai_messages(&request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: request.tools.iter().map(OaiTool::from).collect(),
        };

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(check_error(status, text));
        }

        let api: OaiResponse = resp.json().await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let (input_tokens, output_tokens) = api.usage
            .map(|u| (u.prompt_tokens, u.completion_tokens)).unwrap_or((0, 0));
        let Some(choice) = api.choices.into_iter().next() else {
            return Err(LlmError::RequestFailed("response carried no choices".into()));
        };

        let content = choice.message.content.unwrap_or_default();
        let mut blocks = Vec::new();
        if !content.is_empty() {
            blocks.push(ContentBlock::Text { text: content.clone() });
        }
        blocks.extend(from_oai_tool_calls(choice.message.tool_calls));

        let has_tool_use = blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }));
        let stop_reason = match choice.finish_reason.as_deref() {
            _ if has_tool_use => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        Ok(CompletionResponse { content, content_blocks: blocks, stop_reason, input_tokens, output_tokens })
    }

    /// Anthropic Messages API completion with native tool use support.
    async fn complete_anthropic(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        // Extract system message separately (Anthropic puts it at top level).
        let mut system = None;
        let messages: Vec<AnthropicMessage> = request.messages.iter().filter_map(|m| {
            // Tool results travel inside a user turn.
            let role = if m.role == Role::Tool { "user" } else { role_str(&m.role) };
            if m.role == Role::System {
                system = Some(m.content.clone());
                None
            } else if m.content_blocks.is_empty() {
                Some(AnthropicMessage {
                    role,
                    content: AnthropicMessageContent::Text(m.content.clone()),
                })
            } else {
                let blocks: Vec<AnthropicBlock> = m.content_blocks.iter().map(|b| match b {
                    ContentBlock::Text { text } => AnthropicBlock::Text { text: text.clone() },
                    ContentBlock::ToolUse { id, name, input } => AnthropicBlock::ToolUse {
                        id: id.clone(), name: name.clone(), input: input.clone(),
                    },
                    ContentBlock::ToolResult { tool_use_id, content, is_error } => AnthropicBlock::ToolResult {
                        tool_use_id: tool_use_id.clone(), content: content.clone(), is_error: *is_error,
                    },
                }).collect();
                Some(AnthropicMessage {
                    role,
                    content: AnthropicMessageContent::Blocks(blocks),
                })
            }
        }).collect();

        let tools: Vec<AnthropicToolDef> = request.tools.iter().map(AnthropicToolDef::from).collect();

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system,
            messages,
            temperature: request.temperature,
            tools,
        };

        let resp = self.client
            .post(self.endpoint())
            .header("x-api-key", self.api_key.as_deref().unwrap_or_default())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(check_error(status, text));
        }

        let api: AnthropicResponse = resp.json().await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let content_blocks: Vec<ContentBlock> = api.content.into_iter().map(|b| match b {
            AnthropicResponseBlock::Text { text } => ContentBlock::Text { text },
            AnthropicResponseBlock::ToolUse { id, name, input } => ContentBlock::ToolUse { id, name, input },
        }).collect();

        let content: String = content_blocks.iter().filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        }).collect::<Vec<_>>().join("");

        let stop_reason = match api.stop_reason.as_deref() {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        let (input_tokens, output_tokens) = api.usage
            .map(|u| (u.input_tokens, u.output_tokens)).unwrap_or((0, 0));

        Ok(CompletionResponse { content, content_blocks, stop_reason, input_tokens, output_tokens })
    }
}

/// Build an LlmProvider from environment variables.
/// Reads `COMPASS_LLM_MODEL`, `COMPASS_LLM_API_KEY`, optionally `COMPASS_LLM_BASE_URL`.
/// Returns `None` if the model is not set, or the key is missing for a hosted provider.
pub fn from_env() -> Option<HttpProvider> {
    let model = std::env::var("COMPASS_LLM_MODEL").ok()?;
    let api_key = std::env::var("COMPASS_LLM_API_KEY").ok();
    if api_key.is_none() && ProviderKind::from_model(&model).requires_api_key() {
        tracing::warn!(model = %model, "COMPASS_LLM_API_KEY not set for hosted model");
        return None;
    }
    let base_url = std::env::var("COMPASS_LLM_BASE_URL").ok();
    Some(HttpProvider::new(model, api_key, base_url))
}
