//! System-context messages injected once per reasoning call.

const CHAT_PERSONA: &str = "You are Compass, a career assistant. \
    Answer conversational queries naturally and concisely. \
    Do NOT invent fake jobs, companies, or salaries.";

const CAPABILITY_PERSONA: &str = "You are Compass, a career assistant that can act. \
    Use the available tools when the request needs fresh information or a plan: \
    search for jobs, internships and news; generate a roadmap and then a schedule for learning plans; \
    save details the user shares about themselves. \
    Base search queries on what you know about the user (e.g. if they know Python, search \"Python internships\"). \
    If a tool fails, decide whether to retry with different arguments or answer with what you have. \
    Never claim a search or plan was done unless a tool result in this turn confirms it. \
    Summarise tool results naturally; do not dump raw JSON.";

/// Context for a plain-chat answer.
pub fn chat_system_prompt(memory: &str, new_fact: Option<&str>) -> String {
    let mut sections = vec![CHAT_PERSONA.to_string()];
    if !memory.trim().is_empty() {
        sections.push(format!("USER MEMORY:\n{}", memory.trim_end()));
    }
    if let Some(fact) = new_fact {
        sections.push(format!(
            "You just learned: \"{fact}\". Acknowledge it briefly and naturally; \
             do not mention storage or databases."
        ));
    }
    sections.join("\n\n")
}

/// Context for the capability loop: persona, capability list, profile and recall.
pub fn capability_system_prompt(capabilities: &str, profile: &str, memory: &str) -> String {
    let mut sections = vec![
        CAPABILITY_PERSONA.to_string(),
        format!("AVAILABLE TOOLS:\n{capabilities}"),
        format!("USER PROFILE:\n{profile}"),
    ];
    if !memory.trim().is_empty() {
        sections.push(format!("USER MEMORY:\n{}", memory.trim_end()));
    }
    sections.join("\n\n")
}

/// Nudge appended when the round-trip budget runs out.
pub const WRAP_UP_INSTRUCTION: &str = "Tool budget exhausted. Do not request any more tools. \
    Using only the results above, give the user your best answer now.";
