use std::sync::Arc;

use super::shutdown::ShutdownGuard;
use crate::cognition::Orchestrator;
use crate::conversation::Conversation;
use crate::error::{CapabilityFailure, FailureKind};
use crate::io::input::{InputReceiver, UserInput};
use crate::io::output::{OutputMessage, OutputSender, emit_status};

/// One user's conversation, driven by front-end input.
///
/// Inputs are handled strictly in arrival order; a turn's answer is sent
/// before the next input is read.
pub struct Session {
    orchestrator: Arc<Orchestrator>,
    history: Conversation,
    input_rx: InputReceiver,
    output_tx: OutputSender,
    shutdown: ShutdownGuard,
    turns: u64,
}

impl Session {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        input_rx: InputReceiver,
        output_tx: OutputSender,
        shutdown: ShutdownGuard,
    ) -> Self {
        Self {
            orchestrator,
            history: Conversation::new(),
            input_rx,
            output_tx,
            shutdown,
            turns: 0,
        }
    }

    pub fn history(&self) -> &Conversation {
        &self.history
    }

    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Run until input closes or shutdown fires, then close the stores.
    pub async fn run(mut self) -> Conversation {
        let token = self.shutdown.token();
        tracing::info!("session started");
        loop {
            let input = tokio::select! {
                _ = token.cancelled() => break,
                input = self.input_rx.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
            };
            self.turns += 1;
            let reply = self.handle(input).await;
            if self.output_tx.send(OutputMessage::complete(reply)).await.is_err() {
                tracing::debug!("output closed, ending session");
                break;
            }
        }
        self.orchestrator.close();
        tracing::info!(turns = self.turns, messages = self.history.len(), "session ended");
        self.history
    }

    async fn handle(&mut self, input: UserInput) -> String {
        match input {
            UserInput::Text(text) => {
                let cancel = self.shutdown.turn_token();
                self.orchestrator
                    .handle_turn(&mut self.history, &text, Some(&self.output_tx), Some(&cancel))
                    .await
                    .answer
            }
            UserInput::Upload { name, text } => {
                emit_status(Some(&self.output_tx), format!("Analyzing {name}...")).await;
                match self.orchestrator.ingest_document(&mut self.history, &name, &text).await {
                    Some(_) => "File analyzed & memorized.".to_string(),
                    None => format!("Sorry, I couldn't analyze {name}."),
                }
            }
            UserInput::Plan { skill, hours_per_day } => {
                emit_status(Some(&self.output_tx), format!("Planning {skill}...")).await;
                match self.orchestrator.plan(&mut self.history, &skill, hours_per_day).await {
                    Ok(plan) => plan.render(),
                    Err(e) => {
                        tracing::warn!(skill = %skill, error = %e, "learning plan failed");
                        plan_apology(&e).to_string()
                    }
                }
            }
        }
    }
}

/// User-facing line for a failed plan. Failure detail stays in the log.
fn plan_apology(failure: &CapabilityFailure) -> &'static str {
    match failure.kind {
        FailureKind::InvalidInput => {
            "Sorry, I couldn't build that plan. Give a skill, and hours per day must be at least 1."
        }
        FailureKind::ProviderError | FailureKind::MalformedOutput | FailureKind::Timeout => {
            "Sorry, I couldn't build that plan right now. Please try again later."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::search::{SearchError, SearchHit, SearchProvider};
    use crate::cognition::Reasoner;
    use crate::config::CompassCfg;
    use crate::io::{input, output};
    use crate::memory::{InMemoryIndex, SemanticMemory};
    use crate::profile::FactStore;
    use crate::profile::memory::InMemoryProfile;
    use compass_llm::provider::{CompletionResponse, ScriptedProvider};

    struct NoSearch;

    #[async_trait::async_trait]
    impl SearchProvider for NoSearch {
        fn name(&self) -> &str {
            "none"
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, SearchError> {
            Ok(Vec::new())
        }
    }

    fn orchestrator(provider: Arc<ScriptedProvider>) -> Arc<Orchestrator> {
        let cfg = Arc::new(CompassCfg::default());
        let reasoner = Reasoner::new(provider, &cfg);
        let facts = Arc::new(FactStore::open(Arc::new(InMemoryProfile::default())));
        let memory = Arc::new(SemanticMemory::open(Arc::new(InMemoryIndex::default())));
        Arc::new(Orchestrator::new(reasoner, facts, memory, Arc::new(NoSearch), cfg))
    }

    #[tokio::test]
    async fn answers_in_order_and_commits_history() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            CompletionResponse::text("Hi there."),
            CompletionResponse::text("Still here."),
        ]));
        let orch = orchestrator(provider);
        let (in_tx, in_rx) = input::channel(4);
        let (out_tx, mut out_rx) = output::channel(16);
        let session = Session::new(orch, in_rx, out_tx, ShutdownGuard::new());

        input::submit_text(&in_tx, "hello").await.unwrap();
        input::submit_text(&in_tx, "are you there").await.unwrap();
        drop(in_tx);
        let history = session.run().await;

        let replies: Vec<_> = std::iter::from_fn(|| out_rx.try_recv().ok())
            .filter(|m| !m.is_status())
            .map(|m| m.content)
            .collect();
        assert_eq!(replies, vec!["Hi there.", "Still here."]);
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn upload_is_summarised_and_acknowledged() {
        let provider = Arc::new(ScriptedProvider::new(vec![CompletionResponse::text("Rust dev resume.")]));
        let orch = orchestrator(provider);
        let (in_tx, in_rx) = input::channel(4);
        let (out_tx, mut out_rx) = output::channel(16);
        let session = Session::new(orch, in_rx, out_tx, ShutdownGuard::new());

        in_tx
            .send(UserInput::Upload { name: "cv.txt".into(), text: "Rust, Go, five years".into() })
            .await
            .unwrap();
        drop(in_tx);
        let history = session.run().await;

        let first = out_rx.recv().await.unwrap();
        assert!(first.is_status());
        assert_eq!(first.content, "Analyzing cv.txt...");
        assert_eq!(out_rx.recv().await.unwrap().content, "File analyzed & memorized.");
        assert_eq!(history.last_user_text(), Some("User uploaded cv.txt. Summary: Rust dev resume."));
    }

    #[tokio::test]
    async fn failed_plan_reply_hides_backend_detail() {
        let provider = ScriptedProvider::default().then_fail("502: {\"error\": \"key sk-secret invalid\"}");
        let orch = orchestrator(Arc::new(provider));
        let (in_tx, in_rx) = input::channel(4);
        let (out_tx, mut out_rx) = output::channel(16);
        let session = Session::new(orch, in_rx, out_tx, ShutdownGuard::new());

        in_tx.send(UserInput::Plan { skill: "Rust".into(), hours_per_day: None }).await.unwrap();
        in_tx.send(UserInput::Plan { skill: "Rust".into(), hours_per_day: Some(0) }).await.unwrap();
        drop(in_tx);
        let history = session.run().await;

        let replies: Vec<_> = std::iter::from_fn(|| out_rx.try_recv().ok())
            .filter(|m| !m.is_status())
            .map(|m| m.content)
            .collect();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].ends_with("Please try again later."));
        assert!(!replies[0].contains("sk-secret"));
        assert!(!replies[0].contains("502"));
        assert!(replies[1].contains("at least 1"));
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop_and_closes_stores() {
        let orch = orchestrator(Arc::new(ScriptedProvider::default()));
        let (_in_tx, in_rx) = input::channel(4);
        let (out_tx, _out_rx) = output::channel(4);
        let guard = ShutdownGuard::new();
        guard.trigger();
        let history = Session::new(orch.clone(), in_rx, out_tx, guard).run().await;
        assert!(history.is_empty());
        assert!(orch.facts().snapshot().await.is_err());
    }
}
