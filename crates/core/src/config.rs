use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How facts are pulled out of a user utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactPolicy {
    /// Deterministic keyword rules.
    Keyword,
    /// Dedicated reasoning call with a no-fact sentinel.
    Llm,
}

/// How a user message is classified into a reasoning mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouterPolicy {
    Keyword,
    Llm,
}

macro_rules! policy_str {
    ($ty:ident) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    "keyword" => Ok(Self::Keyword),
                    "llm" => Ok(Self::Llm),
                    other => Err(format!("unknown policy: {other}")),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Keyword => f.write_str("keyword"),
                    Self::Llm => f.write_str("llm"),
                }
            }
        }
    };
}

policy_str!(FactPolicy);
policy_str!(RouterPolicy);

/// All compass parameters. Loaded from `compass_config` table at startup.
/// First boot writes defaults; subsequent boots read existing values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompassCfg {
    // capability loop
    pub max_loop_iterations: usize,
    pub call_timeout_secs: u64,
    pub parallel_capabilities: bool,

    // scheduling
    pub default_hours_per_day: u32,

    // recall
    pub chat_recall_k: usize,
    pub document_recall_k: usize,

    // extraction & routing
    pub min_fact_len: usize,
    pub fact_policy: FactPolicy,
    pub router_policy: RouterPolicy,

    // documents
    pub document_char_limit: usize,

    // reasoning calls
    pub max_tokens: u32,
    pub temperature: f32,

    // search
    pub search_result_limit: usize,
}

impl Default for CompassCfg {
    fn default() -> Self {
        Self {
            max_loop_iterations: 6,
            call_timeout_secs: 30,
            parallel_capabilities: false,
            default_hours_per_day: 2,
            chat_recall_k: 3,
            document_recall_k: 2,
            min_fact_len: 5,
            fact_policy: FactPolicy::Keyword,
            router_policy: RouterPolicy::Keyword,
            document_char_limit: 15000,
            max_tokens: 1024,
            temperature: 0.0,
            search_result_limit: 8,
        }
    }
}

impl CompassCfg {
    /// Load config from `compass_config` table. If table is empty, seed with defaults.
    pub async fn load(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM compass_config")
                .fetch_all(pool)
                .await?;

        if rows.is_empty() {
            let cfg = Self::default();
            cfg.seed(pool).await?;
            return Ok(cfg);
        }

        let map: HashMap<String, String> = rows.into_iter().collect();
        Ok(Self::from_map(&map))
    }

    /// Write all default values into `compass_config` table.
    async fn seed(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        for (key, value, desc) in &self.to_entries() {
            sqlx::query(
                "INSERT INTO compass_config (key, value, description) VALUES ($1, $2, $3) \
                 ON CONFLICT (key) DO NOTHING",
            )
            .bind(key)
            .bind(value)
            .bind(desc)
            .execute(pool)
            .await?;
        }
        Ok(())
    }

    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            max_loop_iterations: get_or(m, "max_loop_iterations", d.max_loop_iterations).max(1),
            call_timeout_secs: get_or(m, "call_timeout_secs", d.call_timeout_secs).max(1),
            parallel_capabilities: get_or(m, "parallel_capabilities", d.parallel_capabilities),
            default_hours_per_day: get_or(m, "default_hours_per_day", d.default_hours_per_day).max(1),
            chat_recall_k: get_or(m, "chat_recall_k", d.chat_recall_k),
            document_recall_k: get_or(m, "document_recall_k", d.document_recall_k),
            min_fact_len: get_or(m, "min_fact_len", d.min_fact_len),
            fact_policy: get_or(m, "fact_policy", d.fact_policy),
            router_policy: get_or(m, "router_policy", d.router_policy),
            document_char_limit: get_or(m, "document_char_limit", d.document_char_limit),
            max_tokens: get_or(m, "max_tokens", d.max_tokens),
            temperature: get_or(m, "temperature", d.temperature),
            search_result_limit: get_or(m, "search_result_limit", d.search_result_limit),
        }
    }

    fn to_entries(&self) -> Vec<(&str, String, &str)> {
        vec![
            ("max_loop_iterations", self.max_loop_iterations.to_string(), "Reasoning round-trips per turn before forced wrap-up"),
            ("call_timeout_secs", self.call_timeout_secs.to_string(), "Timeout for each reasoning and capability call"),
            ("parallel_capabilities", self.parallel_capabilities.to_string(), "Run invocations of one step concurrently"),
            ("default_hours_per_day", self.default_hours_per_day.to_string(), "Study hours per day when not given"),
            ("chat_recall_k", self.chat_recall_k.to_string(), "Chat facts recalled per query"),
            ("document_recall_k", self.document_recall_k.to_string(), "Document summaries recalled per query"),
            ("min_fact_len", self.min_fact_len.to_string(), "Shortest extracted fact kept"),
            ("fact_policy", self.fact_policy.to_string(), "Fact extraction policy: keyword | llm"),
            ("router_policy", self.router_policy.to_string(), "Mode routing policy: keyword | llm"),
            ("document_char_limit", self.document_char_limit.to_string(), "Characters of a document sent to summarisation"),
            ("max_tokens", self.max_tokens.to_string(), "Max tokens per reasoning call"),
            ("temperature", self.temperature.to_string(), "Sampling temperature"),
            ("search_result_limit", self.search_result_limit.to_string(), "Web search hits returned"),
        ]
    }
}

fn get_or<T: FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_map_overrides_and_falls_back() {
        let mut m = HashMap::new();
        m.insert("max_loop_iterations".to_string(), "3".to_string());
        m.insert("fact_policy".to_string(), "LLM".to_string());
        m.insert("chat_recall_k".to_string(), "not-a-number".to_string());
        let cfg = CompassCfg::from_map(&m);
        assert_eq!(cfg.max_loop_iterations, 3);
        assert_eq!(cfg.fact_policy, FactPolicy::Llm);
        assert_eq!(cfg.chat_recall_k, 3);
        assert_eq!(cfg.router_policy, RouterPolicy::Keyword);
    }

    #[test]
    fn zero_iteration_budget_is_clamped() {
        let mut m = HashMap::new();
        m.insert("max_loop_iterations".to_string(), "0".to_string());
        assert_eq!(CompassCfg::from_map(&m).max_loop_iterations, 1);
    }

    #[test]
    fn entries_cover_every_field() {
        let cfg = CompassCfg::default();
        let entries = cfg.to_entries();
        let map: HashMap<String, String> =
            entries.iter().map(|(k, v, _)| (k.to_string(), v.clone())).collect();
        let back = CompassCfg::from_map(&map);
        assert_eq!(entries.len(), 13);
        assert_eq!(back.document_char_limit, cfg.document_char_limit);
        assert_eq!(back.fact_policy, cfg.fact_policy);
    }
}
