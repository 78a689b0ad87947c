pub mod capability_loop;
pub mod direct_response;
pub mod documents;
pub mod orchestrator;
pub mod prompt;
pub mod reasoning;
pub mod router;

pub use capability_loop::{CapabilityLoop, LoopOutcome, LoopSettings};
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use reasoning::{Invocation, Reasoner, ReasoningOutput};
pub use router::{KeywordRouter, LlmRouter, Router};
