//! Turn routing: latest user message in, reasoning mode out.
//!
//! Lexical routing misses paraphrases ("any openings for juniors?" works,
//! "what roles would suit me?" does not). `LlmRouter` trades latency for recall behind the
//! same interface.

use async_trait::async_trait;

use compass_llm::provider::ChatMessage;

use super::reasoning::Reasoner;
use crate::types::Mode;

/// Trigger stems. A word starting with any of these selects capability reasoning.
pub const TRIGGERS: &[&str] = &[
    "find", "search", "job", "internship", "opening", "salary", "salaries", "news", "plan",
    "schedule", "roadmap", "hiring",
];

#[async_trait]
pub trait Router: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(&self, message: &str) -> Mode;
}

/// Stateless, deterministic keyword routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordRouter;

impl KeywordRouter {
    pub fn classify_sync(message: &str) -> Mode {
        let lowered = message.to_lowercase();
        let hit = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .any(|w| TRIGGERS.iter().any(|t| w.starts_with(t)));
        if hit { Mode::CapabilityReasoning } else { Mode::PlainChat }
    }
}

#[async_trait]
impl Router for KeywordRouter {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn classify(&self, message: &str) -> Mode {
        let mode = Self::classify_sync(message);
        tracing::debug!(mode = mode.as_str(), "keyword router decision");
        mode
    }
}

/// Backend-classified routing. Falls back to keywords when the call fails.
pub struct LlmRouter {
    reasoner: Reasoner,
}

impl LlmRouter {
    pub fn new(reasoner: Reasoner) -> Self {
        Self { reasoner }
    }
}

#[async_trait]
impl Router for LlmRouter {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn classify(&self, message: &str) -> Mode {
        let messages = vec![
            ChatMessage::system(
                "You are a strict classifier. Decide whether the user request needs web search, \
                 a learning roadmap, a study schedule, or saving profile details. Reply with ONLY YES or NO.",
            ),
            ChatMessage::user(format!("User request:\n{message}\n\nNeed tools?")),
        ];
        match self.reasoner.text(messages).await {
            Ok(answer) => {
                let answer = answer.trim().to_lowercase();
                let mode = if answer.starts_with("yes") || answer == "y" {
                    Mode::CapabilityReasoning
                } else if answer.starts_with("no") || answer == "n" {
                    Mode::PlainChat
                } else {
                    tracing::debug!(answer = %crate::preview(&answer, 40), "unclear router answer, using keywords");
                    KeywordRouter::classify_sync(message)
                };
                tracing::debug!(mode = mode.as_str(), "llm router decision");
                mode
            }
            Err(e) => {
                tracing::warn!(error = %e, "router call failed, using keywords");
                KeywordRouter::classify_sync(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompassCfg;
    use compass_llm::provider::{MockProvider, ScriptedProvider};
    use std::sync::Arc;

    #[test]
    fn keyword_routing() {
        assert_eq!(
            KeywordRouter::classify_sync("Can you search for internships?"),
            Mode::CapabilityReasoning
        );
        assert_eq!(KeywordRouter::classify_sync("Cool, thanks!"), Mode::PlainChat);
        assert_eq!(KeywordRouter::classify_sync("Any JOBS in Pune?"), Mode::CapabilityReasoning);
        assert_eq!(KeywordRouter::classify_sync("My name is Asha"), Mode::PlainChat);
        // lexical prefix matching: "planet" trips "plan"
        assert_eq!(KeywordRouter::classify_sync("I love my planet"), Mode::CapabilityReasoning);
        assert_eq!(KeywordRouter::classify_sync("explain recursion"), Mode::PlainChat);
    }

    #[tokio::test]
    async fn llm_router_parses_yes_no() {
        let cfg = CompassCfg::default();
        let yes = LlmRouter::new(Reasoner::new(Arc::new(MockProvider::new("YES")), &cfg));
        assert_eq!(yes.classify("what roles would suit me?").await, Mode::CapabilityReasoning);
        let no = LlmRouter::new(Reasoner::new(Arc::new(MockProvider::new("No.")), &cfg));
        assert_eq!(no.classify("find me a job").await, Mode::PlainChat);
    }

    #[tokio::test]
    async fn llm_router_falls_back_to_keywords() {
        let cfg = CompassCfg::default();
        let down = LlmRouter::new(Reasoner::new(Arc::new(ScriptedProvider::default()), &cfg));
        assert_eq!(down.classify("search internships").await, Mode::CapabilityReasoning);
        assert_eq!(down.classify("hello").await, Mode::PlainChat);
    }
}
