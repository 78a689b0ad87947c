use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Process-wide cancellation root.
///
/// Cancelling it stops the session loop and any turn in flight; per-turn
/// tokens are children of this one.
#[derive(Debug, Clone, Default)]
pub struct ShutdownGuard {
    token: CancellationToken,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// A token cancelled with this guard but cancellable on its own.
    pub fn turn_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel on SIGINT or SIGTERM (Ctrl+C elsewhere).
    pub fn spawn_signal_listener(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use signal::unix::{SignalKind, signal as unix_signal};
                let (mut sigterm, mut sigint) =
                    match (unix_signal(SignalKind::terminate()), unix_signal(SignalKind::interrupt())) {
                        (Ok(term), Ok(int)) => (term, int),
                        (Err(e), _) | (_, Err(e)) => {
                            tracing::warn!(error = %e, "failed to register signal handlers");
                            return;
                        }
                    };
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                    _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
                    _ = token.cancelled() => return,
                }
            }
            #[cfg(not(unix))]
            {
                tokio::select! {
                    _ = signal::ctrl_c() => tracing::info!("received Ctrl+C, shutting down"),
                    _ = token.cancelled() => return,
                }
            }
            token.cancel();
        });
    }
}
