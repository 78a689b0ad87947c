//! Compass: a conversational career-assistant orchestration engine.
//!
//! Each turn is routed either to a memory-augmented plain answer or to a
//! capability loop that lets the reasoning backend call web search, roadmap
//! generation, schedule mapping and profile updates before it answers.

pub mod capability;
pub mod cognition;
pub mod config;
pub mod conversation;
pub mod error;
pub mod io;
pub mod memory;
pub mod profile;
pub mod runtime;
pub mod types;

/// First `max` chars of `s`, with an ellipsis when truncated. For log fields.
pub fn preview(s: &str, max: usize) -> String {
    let mut out: String = s.chars().take(max).collect();
    if s.chars().count() > max {
        out.push_str("...");
    }
    out
}
