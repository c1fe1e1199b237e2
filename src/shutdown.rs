use tokio_util::sync::CancellationToken;

/// Why we are shutting down (logged on exit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    CtrlC,
    Sigterm,
    /// Every stream ended or downstream went away.
    OutputClosed,
}

#[derive(Clone)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for Ctrl+C (SIGINT) and cancels the token.
///
/// Returns `None` if shutdown already happened for another reason.
pub async fn wait_ctrl_c(shutdown: Shutdown) -> Option<ShutdownReason> {
    tokio::select! {
        _ = shutdown.token.cancelled() => None,
        r = tokio::signal::ctrl_c() => {
            if let Err(e) = r {
                tracing::warn!(error = %e, "cannot listen for Ctrl+C");
                shutdown.token.cancelled().await;
                return None;
            }
            shutdown.cancel();
            Some(ShutdownReason::CtrlC)
        }
    }
}

/// Wait for SIGTERM on Unix. On other platforms this only ends with the token.
#[cfg(unix)]
pub async fn wait_sigterm(shutdown: Shutdown) -> Option<ShutdownReason> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sig = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for SIGTERM");
            shutdown.token.cancelled().await;
            return None;
        }
    };

    tokio::select! {
        _ = shutdown.token.cancelled() => None,
        _ = sig.recv() => {
            shutdown.cancel();
            Some(ShutdownReason::Sigterm)
        }
    }
}

#[cfg(not(unix))]
pub async fn wait_sigterm(shutdown: Shutdown) -> Option<ShutdownReason> {
    shutdown.token.cancelled().await;
    None
}
