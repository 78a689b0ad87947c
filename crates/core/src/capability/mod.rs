//! Capability registry: named, described, schema-typed operations the
//! reasoning step can invoke by name.

pub mod pipeline;
pub mod profile;
pub mod roadmap;
pub mod schedule;
pub mod schema;
pub mod search;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use compass_llm::provider::ToolDefinition;

use crate::cognition::reasoning::Reasoner;
use crate::config::CompassCfg;
use crate::error::CapabilityFailure;
use crate::profile::FactStore;

/// Namespace for deterministic capability ids (uuid5 of the capability name).
const CAPABILITY_NS: Uuid = Uuid::from_bytes([
    0x3f, 0x1c, 0x9a, 0x52, 0x7d, 0x04, 0x5e, 0x8b,
    0x91, 0x6a, 0x2e, 0xc7, 0x40, 0xd3, 0x18, 0x6f,
]);

/// Success payload of a capability call.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityPayload {
    Text(String),
    Data(serde_json::Value),
}

impl CapabilityPayload {
    /// Text fed back to the reasoning step.
    pub fn render(&self) -> String {
        match self {
            Self::Text(t) => t.clone(),
            Self::Data(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
        }
    }
}

pub type CapabilityResult = Result<CapabilityPayload, CapabilityFailure>;

#[async_trait::async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;

    /// Shown to the reasoning step to decide whether and how to call this.
    fn description(&self) -> &str;

    /// JSON Schema of the argument object.
    fn input_schema(&self) -> serde_json::Value;

    /// Ephemeral status line shown while the call runs.
    fn progress_label(&self) -> &str {
        "Working..."
    }

    async fn execute(&self, args: serde_json::Value) -> CapabilityResult;

    fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("capability already registered: {0}")]
    Duplicate(String),
}

#[derive(Default)]
pub struct CapabilityRegistry {
    caps: HashMap<Uuid, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with search, roadmap, schedule and profile capabilities.
    pub fn with_builtins(
        reasoner: Reasoner,
        search: Arc<dyn search::SearchProvider>,
        facts: Arc<FactStore>,
        cfg: &CompassCfg,
    ) -> Self {
        let builtins: Vec<Arc<dyn Capability>> = vec![
            Arc::new(search::SearchCapability::new(search)),
            Arc::new(roadmap::RoadmapCapability::new(reasoner)),
            Arc::new(schedule::ScheduleCapability::new(cfg.default_hours_per_day)),
            Arc::new(profile::UpdateProfileCapability::new(facts)),
        ];
        let mut reg = Self::new();
        for cap in builtins {
            // names are distinct by construction
            let _ = reg.register(cap);
        }
        reg
    }

    pub fn register(&mut self, cap: Arc<dyn Capability>) -> Result<Uuid, RegistryError> {
        let id = Uuid::new_v5(&CAPABILITY_NS, cap.name().as_bytes());
        if self.caps.contains_key(&id) {
            return Err(RegistryError::Duplicate(cap.name().to_string()));
        }
        self.caps.insert(id, cap);
        Ok(id)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.caps.get(&Uuid::new_v5(&CAPABILITY_NS, name.as_bytes()))
    }

    /// Names of all registered capabilities, sorted for determinism.
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.caps.values().map(|c| c.name()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }

    /// Human-readable list for the system-context message.
    pub fn describe(&self) -> String {
        let mut lines: Vec<String> = self
            .caps
            .values()
            .map(|c| format!("- {}: {}", c.name(), c.description()))
            .collect();
        lines.sort();
        lines.join("\n")
    }

    /// Descriptors handed to the reasoning backend, sorted by name.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.caps.values().map(|c| c.tool_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn progress_label(&self, name: &str) -> String {
        self.get(name)
            .map(|c| c.progress_label().to_string())
            .unwrap_or_else(|| "Working...".into())
    }

    /// Run one invocation. Every failure comes back as a typed result.
    pub async fn execute(
        &self,
        name: &str,
        args: &serde_json::Value,
        timeout: Duration,
    ) -> CapabilityResult {
        let Some(cap) = self.get(name) else {
            let available = self.list_names().join(", ");
            return Err(CapabilityFailure::invalid_input(format!(
                "unknown capability '{name}'. Available: {available}"
            )));
        };

        if let Err(reason) = schema::validate_against_schema(args, &cap.input_schema()) {
            tracing::debug!(capability = name, %reason, "arguments rejected by schema");
            return Err(CapabilityFailure::invalid_input(reason));
        }

        match tokio::time::timeout(timeout, cap.execute(args.clone())).await {
            Ok(Ok(payload)) => {
                tracing::info!(capability = name, "capability succeeded");
                Ok(payload)
            }
            Ok(Err(failure)) => {
                tracing::warn!(capability = name, kind = %failure.kind, message = %failure.message, "capability failed");
                Err(failure)
            }
            Err(_) => {
                tracing::warn!(capability = name, timeout_secs = timeout.as_secs(), "capability timed out");
                Err(CapabilityFailure::timeout(timeout.as_secs()))
            }
        }
    }
}
