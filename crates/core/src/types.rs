use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Routing ─────────────────────────────────────────────────────

/// Reasoning mode selected for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Single memory-augmented reasoning call, no capabilities.
    PlainChat,
    /// Capability loop with the full registry exposed.
    CapabilityReasoning,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainChat => "plain_chat",
            Self::CapabilityReasoning => "capability_reasoning",
        }
    }
}

// ── Profile ─────────────────────────────────────────────────────

/// The fixed set of profile keys the fact store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKey {
    Name,
    Skills,
    Experience,
    Goal,
}

impl ProfileKey {
    pub const ALL: [ProfileKey; 4] = [Self::Name, Self::Skills, Self::Experience, Self::Goal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Skills => "skills",
            Self::Experience => "experience",
            Self::Goal => "goal",
        }
    }

    /// Parse a key, accepting the singular/plural variants models tend to emit.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "name" => Some(Self::Name),
            "skill" | "skills" => Some(Self::Skills),
            "experience" => Some(Self::Experience),
            "goal" | "goals" => Some(Self::Goal),
            _ => None,
        }
    }

    /// Display label used in fact text ("Name: Asha").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Skills => "Skills",
            Self::Experience => "Experience",
            Self::Goal => "Goal",
        }
    }
}

/// Result of a single fact-store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOutcome {
    /// Stored value already equal; nothing written.
    Skipped,
    /// New value durably written.
    Updated,
}

/// A fact extracted from a user utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    /// Text recorded into the chat-fact partition.
    pub text: String,
    /// Profile keys the fact pins down, if any.
    pub profile: Vec<(ProfileKey, String)>,
}

impl Fact {
    /// Build a fact whose text is derived from its profile pairs.
    pub fn from_profile(profile: Vec<(ProfileKey, String)>) -> Self {
        let text = profile
            .iter()
            .map(|(k, v)| format!("{}: {}", k.label(), v))
            .collect::<Vec<_>>()
            .join("; ");
        Self { text, profile }
    }
}

// ── Semantic memory ─────────────────────────────────────────────

/// Isolated subsets of the semantic memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Facts extracted from chat.
    ChatFacts,
    /// Summaries of uploaded documents.
    Documents,
}

impl Partition {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::ChatFacts => "user_chat_facts",
            Self::Documents => "user_documents",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "user_chat_facts" => Some(Self::ChatFacts),
            "user_documents" => Some(Self::Documents),
            _ => None,
        }
    }
}

/// Immutable semantic memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub partition: Partition,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// ── Learning plan artifacts ────────────────────────────────────

/// One roadmap module as produced by roadmap generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapModule {
    pub topic: String,
    pub hours_needed: u32,
    #[serde(default)]
    pub description: String,
}

/// Ordered learning modules for one skill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roadmap(pub Vec<RoadmapModule>);

impl Roadmap {
    pub fn modules(&self) -> &[RoadmapModule] {
        &self.0
    }

    pub fn total_hours(&self) -> u32 {
        self.0.iter().map(|m| m.hours_needed).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// One scheduled module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub topic: String,
    pub date_range: DateRange,
    pub focus: String,
}

/// Schedule derived from a roadmap; same order as the roadmap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule(pub Vec<ScheduleEntry>);

impl Schedule {
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.0
    }

    /// Human-readable rendering, one module per line.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|e| {
                let mut line = format!(
                    "{}: {} to {}",
                    e.topic, e.date_range.start, e.date_range.end
                );
                if !e.focus.is_empty() {
                    line.push_str(&format!(" ({})", e.focus));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_key_roundtrip() {
        for key in ProfileKey::ALL {
            assert_eq!(ProfileKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(ProfileKey::parse("Skill"), Some(ProfileKey::Skills));
        assert_eq!(ProfileKey::parse("hobby"), None);
    }

    #[test]
    fn partition_db_roundtrip() {
        for p in [Partition::ChatFacts, Partition::Documents] {
            assert_eq!(Partition::from_db(p.as_db_str()), Some(p));
        }
        assert_eq!(Partition::from_db("other"), None);
    }

    #[test]
    fn fact_text_from_profile() {
        let fact = Fact::from_profile(vec![
            (ProfileKey::Name, "Asha".into()),
            (ProfileKey::Skills, "Rust".into()),
        ]);
        assert_eq!(fact.text, "Name: Asha; Skills: Rust");
    }

    #[test]
    fn roadmap_serializes_as_array() {
        let roadmap = Roadmap(vec![RoadmapModule {
            topic: "Ownership".into(),
            hours_needed: 4,
            description: "borrowing rules".into(),
        }]);
        let json = serde_json::to_value(&roadmap).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["hours_needed"], 4);
        assert_eq!(roadmap.total_hours(), 4);
    }

    #[test]
    fn date_range_overlap_and_days() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 10, day).unwrap();
        let a = DateRange { start: d(1), end: d(3) };
        let b = DateRange { start: d(4), end: d(4) };
        assert_eq!(a.days(), 3);
        assert_eq!(b.days(), 1);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&DateRange { start: d(3), end: d(5) }));
    }
}
