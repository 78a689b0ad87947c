//! Turn orchestration: route, reason, commit the answer, remember.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::capability_loop::{CapabilityLoop, InvocationRecord, LoopSettings};
use super::documents::summarize_and_record;
use super::prompt::capability_system_prompt;
use super::reasoning::Reasoner;
use super::router::{KeywordRouter, LlmRouter, Router};
use super::direct_response;
use crate::capability::CapabilityRegistry;
use crate::capability::pipeline::{LearningPlan, plan_learning_path};
use crate::capability::roadmap::RoadmapCapability;
use crate::capability::search::SearchProvider;
use crate::config::{CompassCfg, FactPolicy, RouterPolicy};
use crate::conversation::Conversation;
use crate::error::{CapabilityFailure, LoopDiagnostic};
use crate::io::output::OutputSender;
use crate::memory::{FactExtractor, KeywordExtractor, LlmExtractor, SemanticMemory};
use crate::profile::{FactStore, render_snapshot};
use crate::types::{Fact, Mode, Partition, ProfileKey, UpdateOutcome};

const APOLOGY: &str =
    "Sorry, I couldn't reach my reasoning service just now. Please try again in a moment.";

/// Everything one turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    pub mode: Mode,
    pub diagnostic: Option<LoopDiagnostic>,
    /// Fact extracted in plain-chat mode, if any.
    pub fact: Option<Fact>,
    pub profile_updates: Vec<(ProfileKey, UpdateOutcome)>,
    pub records: Vec<InvocationRecord>,
}

impl TurnOutcome {
    fn new(mode: Mode) -> Self {
        Self {
            answer: String::new(),
            mode,
            diagnostic: None,
            fact: None,
            profile_updates: Vec::new(),
            records: Vec::new(),
        }
    }
}

pub struct Orchestrator {
    reasoner: Reasoner,
    router: Arc<dyn Router>,
    extractor: Arc<dyn FactExtractor>,
    facts: Arc<FactStore>,
    memory: Arc<SemanticMemory>,
    registry: CapabilityRegistry,
    roadmaps: RoadmapCapability,
    cfg: Arc<CompassCfg>,
}

impl Orchestrator {
    /// Wire the builtin registry and the configured router/extraction policies.
    pub fn new(
        reasoner: Reasoner,
        facts: Arc<FactStore>,
        memory: Arc<SemanticMemory>,
        search: Arc<dyn SearchProvider>,
        cfg: Arc<CompassCfg>,
    ) -> Self {
        let router: Arc<dyn Router> = match cfg.router_policy {
            RouterPolicy::Keyword => Arc::new(KeywordRouter),
            RouterPolicy::Llm => Arc::new(LlmRouter::new(reasoner.clone())),
        };
        let extractor: Arc<dyn FactExtractor> = match cfg.fact_policy {
            FactPolicy::Keyword => Arc::new(KeywordExtractor::new(cfg.min_fact_len)),
            FactPolicy::Llm => Arc::new(LlmExtractor::new(reasoner.clone(), cfg.min_fact_len)),
        };
        let registry = CapabilityRegistry::with_builtins(reasoner.clone(), search, facts.clone(), &cfg);
        let roadmaps = RoadmapCapability::new(reasoner.clone());
        tracing::info!(
            provider = reasoner.provider_name(),
            router = router.name(),
            extractor = extractor.name(),
            capabilities = registry.len(),
            "orchestrator ready"
        );
        Self { reasoner, router, extractor, facts, memory, registry, roadmaps, cfg }
    }

    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = router;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn FactExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn facts(&self) -> &Arc<FactStore> {
        &self.facts
    }

    pub fn memory(&self) -> &Arc<SemanticMemory> {
        &self.memory
    }

    /// Process one user message to a committed answer.
    ///
    /// The user message and the final answer are appended to `history`;
    /// intermediate capability traffic is not.
    pub async fn handle_turn(
        &self,
        history: &mut Conversation,
        message: &str,
        status: Option<&OutputSender>,
        cancel: Option<&CancellationToken>,
    ) -> TurnOutcome {
        history.push_user(message);
        let mode = self.router.classify(message).await;
        tracing::info!(mode = mode.as_str(), message = %crate::preview(message, 80), "turn routed");

        let mut outcome = match mode {
            Mode::PlainChat => self.plain_chat(history, message).await,
            Mode::CapabilityReasoning => self.capability_reasoning(history, message, status, cancel).await,
        };

        if let Some(diag) = &outcome.diagnostic {
            tracing::warn!(diagnostic = %diag, "turn degraded");
        }
        if outcome.answer.trim().is_empty() {
            outcome.answer = APOLOGY.to_string();
        }
        history.push_assistant(outcome.answer.clone());
        outcome
    }

    async fn plain_chat(&self, history: &Conversation, message: &str) -> TurnOutcome {
        let mut outcome = TurnOutcome::new(Mode::PlainChat);

        let fact = self.extractor.extract_fact(message).await;
        let memory = self
            .memory
            .combined_context(message, self.cfg.chat_recall_k, self.cfg.document_recall_k)
            .await;

        let persist = async {
            match &fact {
                Some(f) => self.persist_fact(f).await,
                None => Vec::new(),
            }
        };
        let answer = direct_response::generate(
            &self.reasoner,
            history,
            &memory,
            fact.as_ref().map(|f| f.text.as_str()),
        );
        let (updates, answer) = tokio::join!(persist, answer);

        outcome.answer = match answer {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "plain-chat reasoning failed");
                APOLOGY.to_string()
            }
        };
        outcome.profile_updates = updates;
        outcome.fact = fact;
        outcome
    }

    /// Write a fact's profile pairs and record its text. Failures are logged only.
    async fn persist_fact(&self, fact: &Fact) -> Vec<(ProfileKey, UpdateOutcome)> {
        let updates = if fact.profile.is_empty() {
            Vec::new()
        } else {
            match self.facts.update_many(&fact.profile).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "profile update failed");
                    Vec::new()
                }
            }
        };
        if let Err(e) = self.memory.record(Partition::ChatFacts, &fact.text).await {
            tracing::warn!(error = %e, "chat fact not recorded");
        }
        updates
    }

    async fn capability_reasoning(
        &self,
        history: &Conversation,
        message: &str,
        status: Option<&OutputSender>,
        cancel: Option<&CancellationToken>,
    ) -> TurnOutcome {
        let mut outcome = TurnOutcome::new(Mode::CapabilityReasoning);

        let memory = self
            .memory
            .combined_context(message, self.cfg.chat_recall_k, self.cfg.document_recall_k)
            .await;
        let profile = match self.facts.snapshot().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "profile snapshot unavailable");
                BTreeMap::new()
            }
        };
        let system = capability_system_prompt(&self.registry.describe(), &render_snapshot(&profile), &memory);

        let run = CapabilityLoop::new(&self.reasoner, &self.registry, LoopSettings::from_cfg(&self.cfg))
            .with_status(status)
            .with_cancel(cancel)
            .run(history.with_system(system))
            .await;

        match run {
            Ok(result) => {
                tracing::info!(
                    iterations = result.iterations,
                    invocations = result.records.len(),
                    "capability loop finished"
                );
                outcome.answer = result.answer;
                outcome.diagnostic = result.diagnostic;
                outcome.records = result.records;
            }
            Err(e) => {
                tracing::warn!(error = %e, "capability loop failed");
                outcome.answer = APOLOGY.to_string();
            }
        }
        outcome
    }

    /// Summarise an uploaded document, remember it, and note it in history.
    pub async fn ingest_document(&self, history: &mut Conversation, name: &str, text: &str) -> Option<String> {
        match summarize_and_record(&self.reasoner, &self.memory, name, text, self.cfg.document_char_limit).await {
            Ok(summary) => {
                history.push_user(format!("User uploaded {name}. Summary: {summary}"));
                Some(summary)
            }
            Err(e) => {
                tracing::warn!(document = name, error = %e, "document ingestion failed");
                None
            }
        }
    }

    /// Roadmap and schedule for `skill`, committed to history as one exchange.
    pub async fn plan(
        &self,
        history: &mut Conversation,
        skill: &str,
        hours_per_day: Option<u32>,
    ) -> Result<LearningPlan, CapabilityFailure> {
        let hours = hours_per_day.unwrap_or(self.cfg.default_hours_per_day);
        let plan = plan_learning_path(&self.roadmaps, skill, hours).await?;
        history.push_user(format!("Plan my learning path for {skill} at {hours} hours per day."));
        history.push_assistant(plan.render());
        Ok(plan)
    }

    /// Close the stores. Further turns degrade to empty memory.
    pub fn close(&self) {
        self.facts.close();
        self.memory.close();
    }
}
