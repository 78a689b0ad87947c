use serde_json::Value;
use std::sync::Arc;

use super::{Capability, CapabilityPayload, CapabilityResult};
use crate::error::CapabilityFailure;
use crate::profile::{FactStore, summarize};
use crate::types::ProfileKey;

/// Writes user-stated details into the fact store.
pub struct UpdateProfileCapability {
    facts: Arc<FactStore>,
}

impl UpdateProfileCapability {
    pub fn new(facts: Arc<FactStore>) -> Self {
        Self { facts }
    }
}

#[async_trait::async_trait]
impl Capability for UpdateProfileCapability {
    fn name(&self) -> &str {
        "update_profile"
    }

    fn description(&self) -> &str {
        "Save user details such as name, skills, experience, or career goal. Call this as soon as the user shares them."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "skills": { "type": "string" },
                "experience": { "type": "string" },
                "goal": { "type": "string" }
            }
        })
    }

    fn progress_label(&self) -> &str {
        "Updating your profile..."
    }

    async fn execute(&self, args: Value) -> CapabilityResult {
        let mut outcomes = Vec::new();
        for key in ProfileKey::ALL {
            let Some(value) = args
                .get(key.as_str())
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
            else {
                continue;
            };
            let outcome = self
                .facts
                .update(key, value)
                .await
                .map_err(|e| CapabilityFailure::provider(format!("profile store unavailable: {e}")))?;
            outcomes.push((key, value.to_string(), outcome));
        }
        Ok(CapabilityPayload::Text(summarize(&outcomes)))
    }
}
