//! Roadmap generation: the reasoning backend drafts an ordered module list for a skill.

use serde_json::Value;

use super::{Capability, CapabilityPayload, CapabilityResult};
use crate::cognition::reasoning::Reasoner;
use crate::error::CapabilityFailure;
use crate::types::{Roadmap, RoadmapModule};

pub struct RoadmapCapability {
    reasoner: Reasoner,
}

impl RoadmapCapability {
    pub fn new(reasoner: Reasoner) -> Self {
        Self { reasoner }
    }

    fn prompt(skill: &str) -> String {
        format!(
            "Create a learning roadmap for: {skill}.\n\
             Respond with ONLY a JSON array. No prose, no markdown.\n\
             Each element must be an object with exactly these keys:\n\
             - \"topic\": string\n\
             - \"hours_needed\": positive integer\n\
             - \"description\": one sentence\n\
             Use 4 to 8 modules, ordered from fundamentals to advanced."
        )
    }

    /// Draft and parse a roadmap for `skill`.
    pub async fn generate(&self, skill: &str) -> Result<Roadmap, CapabilityFailure> {
        let skill = skill.trim();
        if skill.is_empty() {
            return Err(CapabilityFailure::invalid_input("skill must not be empty"));
        }
        let raw = self
            .reasoner
            .prompt(Self::prompt(skill))
            .await
            .map_err(|e| CapabilityFailure::provider(format!("roadmap generation failed: {e}")))?;

        let roadmap = parse_roadmap(&raw).map_err(|e| {
            tracing::debug!(raw = %crate::preview(&raw, 240), error = %e, "roadmap output rejected");
            CapabilityFailure::malformed(e)
        })?;
        tracing::info!(skill, modules = roadmap.modules().len(), hours = roadmap.total_hours(), "roadmap drafted");
        Ok(roadmap)
    }
}

/// Drop surrounding markdown fences or prose around a JSON payload.
///
/// The closing fence may sit on its own line or be glued to the payload.
pub fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // language tag, if any
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
        let body = match rest.rfind("```") {
            Some(end) => &rest[..end],
            None => rest,
        }
        .trim();
        if !body.is_empty() {
            return body.to_string();
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']'))
        && start < end
    {
        return trimmed[start..=end].to_string();
    }
    trimmed.to_string()
}

/// Parse backend output into a roadmap.
pub fn parse_roadmap(raw: &str) -> Result<Roadmap, String> {
    let candidate = strip_fences(raw);
    if candidate.is_empty() {
        return Err("roadmap output is empty".into());
    }
    let value: Value =
        serde_json::from_str(&candidate).map_err(|e| format!("roadmap is not valid JSON: {e}"))?;
    // some models wrap the array: {"roadmap": [...]}
    let value = match value {
        Value::Object(mut map) if map.len() == 1 => map
            .values_mut()
            .next()
            .map(Value::take)
            .unwrap_or(Value::Null),
        other => other,
    };
    roadmap_from_value(&value)
}

/// Validate a JSON roadmap: an array of `{topic, hours_needed >= 1, description?}`.
pub fn roadmap_from_value(value: &Value) -> Result<Roadmap, String> {
    let items = value.as_array().ok_or("roadmap must be an array of modules")?;
    if items.is_empty() {
        return Err("roadmap has no modules".into());
    }

    let mut modules = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let topic = item
            .get("topic")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| format!("module {} is missing a topic", i + 1))?;
        let hours = item
            .get("hours_needed")
            .and_then(hours_value)
            .ok_or_else(|| format!("module '{topic}' is missing hours_needed"))?;
        if hours < 1 {
            return Err(format!("module '{topic}' has hours_needed {hours}; must be at least 1"));
        }
        let description = item
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        modules.push(RoadmapModule {
            topic: topic.to_string(),
            hours_needed: u32::try_from(hours).map_err(|_| format!("module '{topic}' hours_needed too large"))?,
            description,
        });
    }
    Ok(Roadmap(modules))
}

// Integer hours; fractional hours round up, numeric strings are accepted.
fn hours_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.ceil() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.ceil() as i64),
        _ => None,
    }
}

#[async_trait::async_trait]
impl Capability for RoadmapCapability {
    fn name(&self) -> &str {
        "generate_roadmap"
    }

    fn description(&self) -> &str {
        "Generate an ordered learning roadmap for a skill. Returns modules with topic, hours_needed and description; pass the result to create_schedule to get dates."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "skill": { "type": "string", "description": "Skill or role to learn, e.g. 'Rust' or 'data engineering'" }
            },
            "required": ["skill"]
        })
    }

    fn progress_label(&self) -> &str {
        "Drafting a learning roadmap..."
    }

    async fn execute(&self, args: serde_json::Value) -> CapabilityResult {
        let skill = args.get("skill").and_then(Value::as_str).unwrap_or_default();
        let roadmap = self.generate(skill).await?;
        serde_json::to_value(&roadmap)
            .map(CapabilityPayload::Data)
            .map_err(|e| CapabilityFailure::malformed(e.to_string()))
    }
}
