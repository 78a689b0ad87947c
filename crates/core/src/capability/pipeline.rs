//! Roadmap then schedule, chained on typed data without a reasoning loop.

use chrono::{Local, NaiveDate};

use super::roadmap::RoadmapCapability;
use super::schedule::create_schedule;
use crate::error::CapabilityFailure;
use crate::types::{Roadmap, Schedule};

#[derive(Debug, Clone)]
pub struct LearningPlan {
    pub skill: String,
    pub hours_per_day: u32,
    pub roadmap: Roadmap,
    pub schedule: Schedule,
}

impl LearningPlan {
    pub fn render(&self) -> String {
        format!(
            "Learning plan for {} ({} h/day, {} h total):\n{}",
            self.skill,
            self.hours_per_day,
            self.roadmap.total_hours(),
            self.schedule.render()
        )
    }
}

/// Generate a roadmap for `skill` and schedule it from today.
pub async fn plan_learning_path(
    roadmaps: &RoadmapCapability,
    skill: &str,
    hours_per_day: u32,
) -> Result<LearningPlan, CapabilityFailure> {
    plan_learning_path_from(roadmaps, skill, hours_per_day, Local::now().date_naive()).await
}

pub async fn plan_learning_path_from(
    roadmaps: &RoadmapCapability,
    skill: &str,
    hours_per_day: u32,
    start: NaiveDate,
) -> Result<LearningPlan, CapabilityFailure> {
    if hours_per_day < 1 {
        return Err(CapabilityFailure::invalid_input("hours_per_day must be at least 1"));
    }
    let roadmap = roadmaps.generate(skill).await?;
    let schedule = create_schedule(&roadmap, hours_per_day, start)?;
    Ok(LearningPlan { skill: skill.trim().to_string(), hours_per_day, roadmap, schedule })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognition::reasoning::Reasoner;
    use crate::config::CompassCfg;
    use crate::error::FailureKind;
    use compass_llm::provider::ScriptedProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn bad_hours_short_circuits_before_backend() {
        let provider = Arc::new(ScriptedProvider::default());
        let roadmaps = RoadmapCapability::new(Reasoner::new(provider.clone(), &CompassCfg::default()));
        let err = plan_learning_path(&roadmaps, "Rust", 0).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidInput);
        assert_eq!(provider.call_count(), 0);
    }
}
