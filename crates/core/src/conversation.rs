//! Append-only conversation history for a single dialogue.

use compass_llm::provider::{ChatMessage, Role};

/// Committed turns of one conversation.
///
/// Only appends are possible. System-context messages are injected per
/// reasoning call and are never stored here.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. System messages are refused.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if message.role == Role::System {
            tracing::warn!("refusing to persist system-context message into history");
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Content of the most recent user message.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Messages for one reasoning call: the system context first, then history.
    pub fn with_system(&self, system: impl Into<String>) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        out.push(ChatMessage::system(system));
        out.extend(self.messages.iter().cloned());
        out
    }
}
