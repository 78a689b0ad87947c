use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Ephemeral progress line, never part of the committed answer.
    Status,
    /// The turn's final answer.
    Complete,
}

/// An outbound message to deliver to the user.
#[derive(Debug, Clone)]
pub struct OutputMessage {
    pub content: String,
    pub kind: OutputKind,
}

impl OutputMessage {
    pub fn complete(content: impl Into<String>) -> Self {
        Self { content: content.into(), kind: OutputKind::Complete }
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self { content: content.into(), kind: OutputKind::Status }
    }

    pub fn is_status(&self) -> bool {
        self.kind == OutputKind::Status
    }
}

/// Output channel sender: the runtime pushes messages here.
pub type OutputSender = mpsc::Sender<OutputMessage>;
/// Output channel receiver: the front end consumes from here.
pub type OutputReceiver = mpsc::Receiver<OutputMessage>;

/// Create an output channel with the given buffer size.
pub fn channel(buffer: usize) -> (OutputSender, OutputReceiver) {
    mpsc::channel(buffer)
}

/// Best-effort status line. A closed or missing channel is not an error.
pub async fn emit_status(tx: Option<&OutputSender>, text: impl Into<String>) {
    if let Some(tx) = tx
        && tx.send(OutputMessage::status(text)).await.is_err()
    {
        tracing::debug!("status dropped: output channel closed");
    }
}
