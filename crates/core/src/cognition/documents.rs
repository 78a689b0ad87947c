//! Document ingestion: summarise uploaded text and remember the summary.

use compass_llm::provider::LlmError;

use super::reasoning::Reasoner;
use crate::error::StorageError;
use crate::memory::SemanticMemory;
use crate::types::Partition;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document has no text")]
    Empty,
    #[error("summarisation failed: {0}")]
    Summary(#[from] LlmError),
    #[error("could not store summary: {0}")]
    Storage(#[from] StorageError),
}

/// Keep the first `limit` characters.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Summarise `text` and record `Source/Summary` into the document partition.
pub async fn summarize_and_record(
    reasoner: &Reasoner,
    memory: &SemanticMemory,
    name: &str,
    text: &str,
    char_limit: usize,
) -> Result<String, DocumentError> {
    let body = truncate_chars(text.trim(), char_limit);
    if body.is_empty() {
        return Err(DocumentError::Empty);
    }
    tracing::info!(document = name, chars = body.chars().count(), "summarising document");

    let summary = reasoner
        .prompt(format!(
            "Summarize this document (Resume/Paper) for a Career DB. Content: {body}"
        ))
        .await?
        .trim()
        .to_string();
    if summary.is_empty() {
        return Err(DocumentError::Summary(LlmError::RequestFailed("empty summary".into())));
    }

    memory
        .record(Partition::Documents, &format!("Source: {name}\nSummary: {summary}"))
        .await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompassCfg;
    use crate::memory::InMemoryIndex;
    use compass_llm::provider::{CompletionResponse, ScriptedProvider};
    use std::sync::Arc;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn summary_is_recorded_with_source() {
        let provider = Arc::new(ScriptedProvider::new(vec![CompletionResponse::text("Backend dev, 3y Go.")]));
        let reasoner = Reasoner::new(provider.clone(), &CompassCfg::default());
        let memory = SemanticMemory::open(Arc::new(InMemoryIndex::default()));

        let summary = summarize_and_record(&reasoner, &memory, "cv.txt", &"x".repeat(50), 10)
            .await
            .unwrap();
        assert_eq!(summary, "Backend dev, 3y Go.");
        let prompt = &provider.requests()[0].messages[0].content;
        assert!(prompt.ends_with(&"x".repeat(10)));
        let docs = memory.recall(Partition::Documents, "backend", 2).await.unwrap();
        assert_eq!(docs, vec!["Source: cv.txt\nSummary: Backend dev, 3y Go.".to_string()]);
    }

    #[tokio::test]
    async fn blank_document_is_rejected() {
        let reasoner = Reasoner::new(Arc::new(ScriptedProvider::default()), &CompassCfg::default());
        let memory = SemanticMemory::open(Arc::new(InMemoryIndex::default()));
        assert!(matches!(
            summarize_and_record(&reasoner, &memory, "empty.txt", "  \n", 100).await,
            Err(DocumentError::Empty)
        ));
    }
}
