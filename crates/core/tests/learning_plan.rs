//! Roadmap, schedule and profile behaviour through the public API.

use std::sync::Arc;

use chrono::{Days, Local, NaiveDate};
use compass_core::capability::Capability;
use compass_core::capability::roadmap::RoadmapCapability;
use compass_core::capability::schedule::{ScheduleCapability, create_schedule};
use compass_core::capability::search::{SearchError, SearchHit, SearchProvider};
use compass_core::cognition::{Orchestrator, Reasoner};
use compass_core::config::CompassCfg;
use compass_core::conversation::Conversation;
use compass_core::error::FailureKind;
use compass_core::memory::{InMemoryIndex, SemanticMemory};
use compass_core::profile::FactStore;
use compass_core::profile::memory::InMemoryProfile;
use compass_core::types::{ProfileKey, Roadmap, RoadmapModule, UpdateOutcome};
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

fn module(topic: &str, hours: u32) -> RoadmapModule {
    RoadmapModule { topic: topic.into(), hours_needed: hours, description: String::new() }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn schedule_lays_modules_end_to_end() {
    let roadmap = Roadmap(vec![module("A", 5), module("B", 2)]);
    let start = date(2026, 10, 16);
    let schedule = create_schedule(&roadmap, 2, start).unwrap();
    let entries = schedule.entries();

    // A: ceil(5/2) = 3 days, B: 1 day
    assert_eq!(entries[0].date_range.start, start);
    assert_eq!(entries[0].date_range.end, date(2026, 10, 18));
    assert_eq!(entries[1].date_range.start, date(2026, 10, 19));
    assert_eq!(entries[1].date_range.end, date(2026, 10, 19));
    assert!(!entries[0].date_range.overlaps(&entries[1].date_range));
}

#[test]
fn schedule_crosses_month_and_year_boundaries() {
    let roadmap = Roadmap(vec![module("Ownership", 4), module("Async", 9)]);
    let schedule = create_schedule(&roadmap, 3, date(2026, 12, 30)).unwrap();
    let entries = schedule.entries();
    assert_eq!(entries[0].date_range.end, date(2026, 12, 31));
    assert_eq!(entries[1].date_range.start, date(2027, 1, 1));
    assert_eq!(entries[1].date_range.end, date(2027, 1, 3));
}

#[tokio::test]
async fn schedule_capability_starts_today() {
    let cap = ScheduleCapability::new(2);
    let args = serde_json::json!({
        "roadmap": [
            {"topic": "A", "hours_needed": 5, "description": "basics"},
            {"topic": "B", "hours_needed": 2, "description": "practice"}
        ],
        "hours_per_day": 2
    });
    let out = cap.execute(args).await.unwrap().render();
    let today = Local::now().date_naive();
    let a_end = today.checked_add_days(Days::new(2)).unwrap();
    let b_day = today.checked_add_days(Days::new(3)).unwrap();
    assert!(out.contains(&format!("{today}")));
    assert!(out.contains(&format!("{a_end}")));
    assert!(out.contains(&format!("{b_day}")));
}

#[tokio::test]
async fn negative_hours_per_day_is_invalid_input() {
    let cap = ScheduleCapability::new(2);
    let err = cap
        .execute(serde_json::json!({
            "roadmap": [{"topic": "A", "hours_needed": 5}],
            "hours_per_day": -1
        }))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidInput);
}

#[tokio::test]
async fn concurrent_profile_updates_lose_nothing() {
    let store = Arc::new(FactStore::open(Arc::new(InMemoryProfile::default())));
    let writes = [
        (ProfileKey::Name, "Asha"),
        (ProfileKey::Skills, "Rust, SQL"),
        (ProfileKey::Experience, "2 years backend"),
        (ProfileKey::Goal, "platform engineer"),
    ];

    let handles: Vec<_> = writes
        .iter()
        .map(|(key, value)| {
            let store = store.clone();
            let (key, value) = (*key, value.to_string());
            tokio::spawn(async move { store.update(key, &value).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), UpdateOutcome::Updated);
    }

    let snapshot = store.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 4);
    for (key, value) in writes {
        assert_eq!(snapshot.get(&key).map(String::as_str), Some(value));
    }
}

#[tokio::test]
async fn racing_identical_updates_write_once() {
    let store = Arc::new(FactStore::open(Arc::new(InMemoryProfile::default())));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.update(ProfileKey::Goal, "data engineer").await })
        })
        .collect();
    let mut updated = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == UpdateOutcome::Updated {
            updated += 1;
        }
    }
    assert_eq!(updated, 1);
}

#[tokio::test]
async fn roadmap_generation_reads_fenced_json() {
    let provider = Arc::new(ScriptedProvider::new(vec![CompletionResponse::text(
        "```json\n[{\"topic\": \"Syntax\", \"hours_needed\": 4, \"description\": \"basics\"}]\n```",
    )]));
    let roadmaps = RoadmapCapability::new(Reasoner::new(provider, &CompassCfg::default()));
    let roadmap = roadmaps.generate("Rust").await.unwrap();
    assert_eq!(roadmap.modules().len(), 1);
    assert_eq!(roadmap.total_hours(), 4);
}

#[tokio::test]
async fn plan_command_commits_one_exchange() {
    let provider = Arc::new(ScriptedProvider::new(vec![CompletionResponse::text(
        r#"[{"topic": "A", "hours_needed": 5, "description": "x"}, {"topic": "B", "hours_needed": 2, "description": "y"}]"#,
    )]));
    let cfg = Arc::new(CompassCfg::default());
    let orchestrator = Orchestrator::new(
        Reasoner::new(provider, &cfg),
        Arc::new(FactStore::open(Arc::new(InMemoryProfile::default()))),
        Arc::new(SemanticMemory::open(Arc::new(InMemoryIndex::default()))),
        Arc::new(NoSearch),
        cfg,
    );
    let mut history = Conversation::new();

    let plan = orchestrator.plan(&mut history, "Rust", None).await.unwrap();
    assert_eq!(plan.hours_per_day, 2);
    assert_eq!(plan.schedule.entries().len(), 2);
    assert_eq!(history.len(), 2);
    assert!(history.messages()[1].content.starts_with("Learning plan for Rust"));
}

#[tokio::test]
async fn plan_rejects_zero_hours_without_calling_the_backend() {
    let provider = Arc::new(ScriptedProvider::default());
    let cfg = Arc::new(CompassCfg::default());
    let orchestrator = Orchestrator::new(
        Reasoner::new(provider.clone(), &cfg),
        Arc::new(FactStore::open(Arc::new(InMemoryProfile::default()))),
        Arc::new(SemanticMemory::open(Arc::new(InMemoryIndex::default()))),
        Arc::new(NoSearch),
        cfg,
    );
    let mut history = Conversation::new();
    let err = orchestrator.plan(&mut history, "Rust", Some(0)).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidInput);
    assert_eq!(provider.call_count(), 0);
    assert!(history.is_empty());
}
