//! Schedule mapping: a pure, deterministic transform from roadmap to dated plan.

use chrono::{Days, Local, NaiveDate};
use serde_json::Value;

use super::roadmap::roadmap_from_value;
use super::{Capability, CapabilityPayload, CapabilityResult};
use crate::error::CapabilityFailure;
use crate::types::{DateRange, Roadmap, Schedule, ScheduleEntry};

/// Lay modules end to end starting at `start`.
///
/// Each module gets `ceil(hours / hours_per_day)` days, never fewer than one,
/// and the next module begins the day after the previous one ends.
pub fn create_schedule(
    roadmap: &Roadmap,
    hours_per_day: u32,
    start: NaiveDate,
) -> Result<Schedule, CapabilityFailure> {
    if hours_per_day < 1 {
        return Err(CapabilityFailure::invalid_input("hours_per_day must be at least 1"));
    }

    let mut current = start;
    let mut entries = Vec::with_capacity(roadmap.modules().len());
    for module in roadmap.modules() {
        if module.topic.trim().is_empty() {
            return Err(CapabilityFailure::invalid_input("every module needs a topic"));
        }
        if module.hours_needed < 1 {
            return Err(CapabilityFailure::invalid_input(format!(
                "module '{}' has hours_needed {}; must be at least 1",
                module.topic, module.hours_needed
            )));
        }
        let days = module.hours_needed.div_ceil(hours_per_day).max(1);
        let end = current
            .checked_add_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| CapabilityFailure::invalid_input("schedule runs past the calendar"))?;
        entries.push(ScheduleEntry {
            topic: module.topic.clone(),
            date_range: DateRange { start: current, end },
            focus: module.description.clone(),
        });
        current = end
            .succ_opt()
            .ok_or_else(|| CapabilityFailure::invalid_input("schedule runs past the calendar"))?;
    }
    Ok(Schedule(entries))
}

pub struct ScheduleCapability {
    default_hours_per_day: u32,
}

impl ScheduleCapability {
    pub fn new(default_hours_per_day: u32) -> Self {
        Self { default_hours_per_day: default_hours_per_day.max(1) }
    }

    fn hours_per_day(&self, args: &Value) -> Result<u32, CapabilityFailure> {
        let raw = args.get("hours_per_day").or_else(|| args.get("hoursPerDay"));
        let hours = match raw {
            None | Some(Value::Null) => return Ok(self.default_hours_per_day),
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            Some(_) => None,
        };
        match hours {
            Some(h) if h >= 1 => u32::try_from(h)
                .map_err(|_| CapabilityFailure::invalid_input("hours_per_day is too large")),
            Some(h) => Err(CapabilityFailure::invalid_input(format!(
                "hours_per_day must be at least 1, got {h}"
            ))),
            None => Err(CapabilityFailure::invalid_input("hours_per_day must be an integer")),
        }
    }
}

/// Accept the roadmap either as a JSON array or as a string holding one.
fn roadmap_arg(args: &Value) -> Result<Roadmap, CapabilityFailure> {
    let value = match args.get("roadmap") {
        Some(Value::String(s)) => serde_json::from_str::<Value>(s)
            .map_err(|e| CapabilityFailure::invalid_input(format!("roadmap string is not JSON: {e}")))?,
        Some(v) => v.clone(),
        None => return Err(CapabilityFailure::invalid_input("missing roadmap")),
    };
    roadmap_from_value(&value).map_err(CapabilityFailure::invalid_input)
}

#[async_trait::async_trait]
impl Capability for ScheduleCapability {
    fn name(&self) -> &str {
        "create_schedule"
    }

    fn description(&self) -> &str {
        "Map a roadmap (from generate_roadmap) onto calendar dates starting today, given study hours per day."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "roadmap": {
                    "type": ["array", "string"],
                    "description": "Roadmap modules: [{topic, hours_needed, description}]"
                },
                "hours_per_day": { "type": ["integer", "string"], "description": "Study hours per day, at least 1 (default 2)" },
                "hoursPerDay": { "type": ["integer", "string"] }
            },
            "required": ["roadmap"]
        })
    }

    fn progress_label(&self) -> &str {
        "Building your schedule..."
    }

    async fn execute(&self, args: serde_json::Value) -> CapabilityResult {
        let roadmap = roadmap_arg(&args)?;
        let hours_per_day = self.hours_per_day(&args)?;
        let schedule = create_schedule(&roadmap, hours_per_day, Local::now().date_naive())?;
        serde_json::to_value(&schedule)
            .map(CapabilityPayload::Data)
            .map_err(|e| CapabilityFailure::malformed(e.to_string()))
    }
}
