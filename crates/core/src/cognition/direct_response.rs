use compass_llm::provider::{ChatMessage, LlmError};

use super::prompt::chat_system_prompt;
use super::reasoning::Reasoner;
use crate::conversation::Conversation;

/// Build the message list for a plain-chat answer.
pub fn build_messages(history: &Conversation, memory: &str, new_fact: Option<&str>) -> Vec<ChatMessage> {
    history.with_system(chat_system_prompt(memory, new_fact))
}

/// Generate a memory-augmented answer with no capabilities exposed.
pub async fn generate(
    reasoner: &Reasoner,
    history: &Conversation,
    memory: &str,
    new_fact: Option<&str>,
) -> Result<String, LlmError> {
    let answer = reasoner.text(build_messages(history, memory, new_fact)).await?;
    Ok(answer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompassCfg;
    use compass_llm::provider::{CompletionResponse, Role, ScriptedProvider};
    use std::sync::Arc;

    #[test]
    fn builds_system_then_history() {
        let mut history = Conversation::new();
        history.push_user("hi");
        let msgs = build_messages(&history, "FROM CHAT HISTORY:\n- Name: Asha", None);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.contains("Name: Asha"));
        assert_eq!(msgs[1].content, "hi");
    }

    #[tokio::test]
    async fn no_tools_are_offered() {
        let provider = Arc::new(ScriptedProvider::new(vec![CompletionResponse::text("  Hello!  ")]));
        let reasoner = Reasoner::new(provider.clone(), &CompassCfg::default());
        let mut history = Conversation::new();
        history.push_user("hi");
        assert_eq!(generate(&reasoner, &history, "", None).await.unwrap(), "Hello!");
        assert!(provider.requests()[0].tools.is_empty());
    }
}
