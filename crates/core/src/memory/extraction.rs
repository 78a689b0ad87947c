//! Deciding whether a user utterance carries a fact worth remembering.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::cognition::reasoning::Reasoner;
use crate::types::{Fact, ProfileKey};

/// Sentinel the backend returns when an utterance holds no fact.
pub const NO_FACT: &str = "NO_FACT";

#[async_trait]
pub trait FactExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract_fact(&self, text: &str) -> Option<Fact>;
}

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // only the trigger is case-insensitive; follow-on name words must be capitalised
    Regex::new(r"(?i:\bmy name(?: is|'s))\s+([\p{L}][\p{L}'-]*(?:\s+\p{Lu}[\p{L}'-]*)*)").unwrap()
});

static SKILLS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:i know|my skills? (?:is|are|include))\s+(.+)").unwrap()
});

static GOAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:my goal is(?:\s+to)?|i want to become(?:\s+an?)?)\s+(.+)").unwrap()
});

static EXPERIENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:i have\s+(.+?\bexperience\b.*)|i (worked as\s+.+))").unwrap()
});

// Where one clause of a compound sentence ends: "... and I ...", "..., my ...".
static CLAUSE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*,?\s+and\s+(?:i|my)\b|,\s*(?:i|my)\b").unwrap());

/// Deterministic trigger-phrase extraction.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    min_len: usize,
}

impl KeywordExtractor {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }

    /// Profile pairs found in `text`, first match per key.
    pub fn scan(text: &str) -> Vec<(ProfileKey, String)> {
        let mut found: Vec<(ProfileKey, String)> = Vec::new();
        for sentence in text.split(['.', '!', '?', ';', '\n']) {
            let candidates = [
                (ProfileKey::Name, NAME_PATTERN.captures(sentence).and_then(|c| c.get(1))),
                (ProfileKey::Skills, SKILLS_PATTERN.captures(sentence).and_then(|c| c.get(1))),
                (ProfileKey::Goal, GOAL_PATTERN.captures(sentence).and_then(|c| c.get(1))),
                (
                    ProfileKey::Experience,
                    EXPERIENCE_PATTERN
                        .captures(sentence)
                        .and_then(|c| c.get(1).or_else(|| c.get(2))),
                ),
            ];
            for (key, m) in candidates {
                let Some(m) = m else { continue };
                if found.iter().any(|(k, _)| *k == key) {
                    continue;
                }
                let value = clean_value(m.as_str());
                if !value.is_empty() {
                    found.push((key, value));
                }
            }
        }
        found.sort_by_key(|(k, _)| *k);
        found
    }
}

fn clean_value(raw: &str) -> String {
    let clause = match CLAUSE_BREAK.find(raw) {
        Some(m) => &raw[..m.start()],
        None => raw,
    };
    clause
        .trim()
        .trim_end_matches(|c: char| c == ',' || c == '"' || c == '\'')
        .trim()
        .to_string()
}

#[async_trait]
impl FactExtractor for KeywordExtractor {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn extract_fact(&self, text: &str) -> Option<Fact> {
        if text.trim().chars().count() < self.min_len {
            return None;
        }
        let profile = Self::scan(text);
        if profile.is_empty() {
            return None;
        }
        Some(Fact::from_profile(profile))
    }
}

/// Backend-classified extraction with a no-fact sentinel.
pub struct LlmExtractor {
    reasoner: Reasoner,
    min_len: usize,
}

impl LlmExtractor {
    pub fn new(reasoner: Reasoner, min_len: usize) -> Self {
        Self { reasoner, min_len }
    }

    fn prompt(text: &str) -> String {
        format!(
            "Extract personal career facts from: \"{text}\".\n\
             Return ONLY the fact (Name, Skill, Goal). If none, return \"{NO_FACT}\"."
        )
    }

    /// `Name: X`-style segments of a returned fact.
    fn profile_pairs(fact: &str) -> Vec<(ProfileKey, String)> {
        let mut pairs: Vec<(ProfileKey, String)> = Vec::new();
        for segment in fact.split([';', '\n', ',']) {
            let Some((label, value)) = segment.split_once(':') else { continue };
            let Some(key) = ProfileKey::parse(label) else { continue };
            let value = value.trim();
            if !value.is_empty() && !pairs.iter().any(|(k, _)| *k == key) {
                pairs.push((key, value.to_string()));
            }
        }
        pairs
    }
}

#[async_trait]
impl FactExtractor for LlmExtractor {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn extract_fact(&self, text: &str) -> Option<Fact> {
        if text.trim().chars().count() < self.min_len {
            return None;
        }
        let raw = match self.reasoner.prompt(Self::prompt(text)).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "fact extraction call failed");
                return None;
            }
        };
        let fact = raw.trim().replace('"', "");
        if fact.contains(NO_FACT) || fact.chars().count() <= self.min_len {
            tracing::debug!(raw = %crate::preview(&raw, 80), "no fact in utterance");
            return None;
        }
        let profile = Self::profile_pairs(&fact);
        Some(Fact { text: fact, profile })
    }
}
