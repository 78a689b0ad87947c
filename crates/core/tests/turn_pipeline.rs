//! Whole-turn behaviour against scripted reasoning and in-memory stores.

use std::sync::Arc;

use compass_core::capability::search::{SearchError, SearchHit, SearchProvider};
use compass_core::cognition::{KeywordRouter, Orchestrator, Reasoner, Router};
use compass_core::config::CompassCfg;
use compass_core::conversation::Conversation;
use compass_core::error::LoopDiagnostic;
use compass_core::io::output;
use compass_core::memory::{InMemoryIndex, SemanticMemory};
use compass_core::profile::FactStore;
use compass_core::profile::memory::InMemoryProfile;
use compass_core::types::{Mode, Partition, ProfileKey, UpdateOutcome};
use compass_llm::provider::{CompletionResponse, ContentBlock, Role, ScriptedProvider};

struct FixedSearch;

#[async_trait::async_trait]
impl SearchProvider for FixedSearch {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        Ok(vec![SearchHit {
            title: format!("{query} at Acme"),
            url: "https://acme.example/jobs/1".into(),
            snippet: "Remote, junior friendly".into(),
        }])
    }
}

struct Harness {
    provider: Arc<ScriptedProvider>,
    orchestrator: Orchestrator,
}

fn harness(provider: ScriptedProvider, cfg: CompassCfg) -> Harness {
    let provider = Arc::new(provider);
    let cfg = Arc::new(cfg);
    let reasoner = Reasoner::new(provider.clone(), &cfg);
    let facts = Arc::new(FactStore::open(Arc::new(InMemoryProfile::default())));
    let memory = Arc::new(SemanticMemory::open(Arc::new(InMemoryIndex::default())));
    let orchestrator = Orchestrator::new(reasoner, facts, memory, Arc::new(FixedSearch), cfg);
    Harness { provider, orchestrator }
}

fn search_call(id: &str, query: &str) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.into(),
        name: "search".into(),
        input: serde_json::json!({ "query": query }),
    }
}

#[tokio::test]
async fn repeated_name_updates_once_but_records_every_time() {
    let h = harness(
        ScriptedProvider::repeating(CompletionResponse::text("Nice to meet you, Asha!")),
        CompassCfg::default(),
    );
    let mut history = Conversation::new();

    let first = h.orchestrator.handle_turn(&mut history, "My name is Asha", None, None).await;
    assert_eq!(first.mode, Mode::PlainChat);
    assert_eq!(first.answer, "Nice to meet you, Asha!");
    assert_eq!(first.profile_updates, vec![(ProfileKey::Name, UpdateOutcome::Updated)]);
    assert_eq!(h.orchestrator.memory().count(Partition::ChatFacts).await.unwrap(), 1);
    assert_eq!(
        h.orchestrator.facts().get(ProfileKey::Name).await.unwrap().as_deref(),
        Some("Asha")
    );

    let second = h.orchestrator.handle_turn(&mut history, "My name is Asha", None, None).await;
    assert_eq!(second.profile_updates, vec![(ProfileKey::Name, UpdateOutcome::Skipped)]);
    assert_eq!(h.orchestrator.memory().count(Partition::ChatFacts).await.unwrap(), 2);

    // the second answer sees the first fact in recall and the fresh fact note
    let system = &h.provider.requests()[1].messages[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("FROM CHAT HISTORY:\n- Name: Asha"));
    assert!(system.content.contains("You just learned: \"Name: Asha\""));

    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn chit_chat_records_nothing() {
    let h = harness(ScriptedProvider::repeating(CompletionResponse::text("Hello!")), CompassCfg::default());
    let mut history = Conversation::new();
    let out = h.orchestrator.handle_turn(&mut history, "hello there", None, None).await;
    assert!(out.fact.is_none());
    assert!(out.profile_updates.is_empty());
    assert_eq!(h.orchestrator.memory().count(Partition::ChatFacts).await.unwrap(), 0);
    // empty stores add no memory section
    assert!(!h.provider.requests()[0].messages[0].content.contains("USER MEMORY"));
}

#[tokio::test]
async fn routing_is_deterministic() {
    let router = KeywordRouter;
    for _ in 0..3 {
        assert_eq!(router.classify("Find me Rust internships").await, Mode::CapabilityReasoning);
        assert_eq!(router.classify("How are you today?").await, Mode::PlainChat);
    }
}

#[tokio::test]
async fn capability_turn_commits_only_the_final_answer() {
    let h = harness(
        ScriptedProvider::new(vec![
            CompletionResponse::from_blocks(vec![
                ContentBlock::Text { text: "Let me look.".into() },
                search_call("s1", "Rust internships"),
            ]),
            CompletionResponse::text("Acme has a remote Rust internship."),
        ]),
        CompassCfg::default(),
    );
    let (tx, mut rx) = output::channel(16);
    let mut history = Conversation::new();

    let out = h
        .orchestrator
        .handle_turn(&mut history, "Find me Rust internships", Some(&tx), None)
        .await;

    assert_eq!(out.mode, Mode::CapabilityReasoning);
    assert_eq!(out.answer, "Acme has a remote Rust internship.");
    assert!(out.diagnostic.is_none());
    assert_eq!(out.records.len(), 1);
    assert!(out.records[0].result.as_ref().unwrap().render().contains("Rust internships at Acme"));

    assert_eq!(history.len(), 2);
    assert_eq!(history.messages()[1].content, "Acme has a remote Rust internship.");

    drop(tx);
    let mut statuses = Vec::new();
    while let Some(msg) = rx.recv().await {
        assert!(msg.is_status());
        statuses.push(msg.content);
    }
    assert_eq!(statuses, vec!["Let me look.", "Searching the web..."]);

    // the tool result answers the invocation it belongs to
    let second = &h.provider.requests()[1].messages;
    let results = second.last().unwrap();
    assert_eq!(results.role, Role::Tool);
    assert!(matches!(
        &results.content_blocks[..],
        [ContentBlock::ToolResult { tool_use_id, is_error: false, .. }] if tool_use_id == "s1"
    ));
}

#[tokio::test]
async fn capability_prompt_carries_the_profile() {
    let h = harness(ScriptedProvider::repeating(CompletionResponse::text("ok")), CompassCfg::default());
    h.orchestrator.facts().update(ProfileKey::Skills, "Python").await.unwrap();
    let mut history = Conversation::new();
    h.orchestrator.handle_turn(&mut history, "search for internships", None, None).await;

    let system = &h.provider.requests()[0].messages[0].content;
    assert!(system.contains("USER PROFILE:\n- Skills: Python"));
    assert!(system.contains("AVAILABLE TOOLS:"));
    assert!(system.contains("generate_roadmap"));
}

#[tokio::test]
async fn endless_invocations_stop_at_the_default_budget() {
    let h = harness(
        ScriptedProvider::repeating(CompletionResponse::from_blocks(vec![search_call("", "more jobs")])),
        CompassCfg::default(),
    );
    let mut history = Conversation::new();
    let out = h.orchestrator.handle_turn(&mut history, "find jobs forever", None, None).await;

    assert_eq!(out.diagnostic, Some(LoopDiagnostic::BudgetExceeded { iterations: 6 }));
    assert_eq!(out.records.len(), 6);
    // six invocation steps and one wrap-up
    assert_eq!(h.provider.call_count(), 7);
    assert!(!out.answer.trim().is_empty());
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn backend_outage_becomes_an_apology() {
    let h = harness(ScriptedProvider::default().then_fail("connection refused"), CompassCfg::default());
    let mut history = Conversation::new();

    let chat = h.orchestrator.handle_turn(&mut history, "hello", None, None).await;
    assert!(chat.answer.starts_with("Sorry"));
    assert!(!chat.answer.contains("connection refused"));

    let tools = h.orchestrator.handle_turn(&mut history, "find jobs", None, None).await;
    assert!(tools.answer.starts_with("Sorry"));
    assert_eq!(history.len(), 4);
    assert_eq!(history.messages()[3].role, Role::Assistant);
}

#[tokio::test]
async fn uploaded_document_feeds_later_recall() {
    let h = harness(
        ScriptedProvider::new(vec![
            CompletionResponse::text("Backend engineer, five years of Go and Postgres."),
            CompletionResponse::text("You have strong backend experience."),
        ]),
        CompassCfg::default(),
    );
    let mut history = Conversation::new();

    let summary = h
        .orchestrator
        .ingest_document(&mut history, "resume.txt", "Go, Postgres, Kubernetes. 5 years backend.")
        .await
        .unwrap();
    assert_eq!(summary, "Backend engineer, five years of Go and Postgres.");
    assert_eq!(h.orchestrator.memory().count(Partition::Documents).await.unwrap(), 1);

    h.orchestrator.handle_turn(&mut history, "What is my backend background?", None, None).await;
    let system = &h.provider.requests()[1].messages[0].content;
    assert!(system.contains("FROM DOCUMENTS:\n- Source: resume.txt"));
}
