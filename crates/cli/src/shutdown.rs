use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Turns SIGINT/SIGTERM into cancellation of the watch loop. The first
/// signal starts a graceful stop (open windows flushed, queued batches
/// drained); a second one exits immediately.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    cancel_token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self { cancel_token }
    }

    pub fn register_handlers(&self) {
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            let Some(first) = next_signal().await else {
                return;
            };
            info!(signal = first, "Shutdown requested, draining in-flight batches");
            cancel_token.cancel();

            if let Some(second) = next_signal().await {
                warn!(signal = second, "Second signal received, exiting without draining");
                std::process::exit(ExitCode::Interrupted.as_i32());
            }
        });
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

/// Name of the next termination signal, or `None` when no handler could be
/// installed.
async fn next_signal() -> Option<&'static str> {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal as unix_signal};
        let mut term = match unix_signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                return signal::ctrl_c().await.ok().map(|_| "SIGINT");
            }
        };
        tokio::select! {
            res = signal::ctrl_c() => match res {
                Ok(()) => Some("SIGINT"),
                Err(err) => {
                    error!(error = %err, "Failed to install SIGINT handler");
                    term.recv().await.map(|_| "SIGTERM")
                }
            },
            received = term.recv() => received.map(|_| "SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        match signal::ctrl_c().await {
            Ok(()) => Some("SIGINT"),
            Err(err) => {
                error!(error = %err, "Failed to install SIGINT handler");
                None
            }
        }
    }
}

/// Process exit status of `c360`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// A run ended FAILED, a batch was left unrecorded or a file could not
    /// be ingested.
    FailedRuns = 2,
    Interrupted = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
