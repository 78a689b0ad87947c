use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure of the fact store or the semantic memory backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Typed reason a capability call did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// External search or reasoning backend unreachable or errored.
    ProviderError,
    /// Output failed schema or parse validation.
    MalformedOutput,
    /// Arguments violated the capability's contract.
    InvalidInput,
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderError => "ProviderError",
            Self::MalformedOutput => "MalformedOutput",
            Self::InvalidInput => "InvalidInput",
            Self::Timeout => "Timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability-level failure. Always handed back to the reasoning loop as a
/// result, never raised past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CapabilityFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CapabilityFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ProviderError, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedOutput, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidInput, message)
    }

    pub fn timeout(secs: u64) -> Self {
        Self::new(FailureKind::Timeout, format!("no result within {secs}s"))
    }
}

/// Soft degradation of a capability loop. The turn still gets an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopDiagnostic {
    /// Round-trip cap hit; the answer is a best-effort wrap-up.
    BudgetExceeded { iterations: usize },
    /// Cooperative cancellation observed between iterations.
    Cancelled,
}

impl fmt::Display for LoopDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetExceeded { iterations } => {
                write!(f, "LoopBudgetExceeded after {iterations} round-trips")
            }
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}
