//! Shutdown: one `CancellationToken` observed by the listener, every
//! session writer and the queue consumer, plus a deadline-bounded drain.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drain deadline used when none is configured.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A long-lived task awaited during shutdown, named for logs.
pub type NamedTask = (&'static str, JoinHandle<()>);

/// Owns the gateway-wide cancellation token.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Coordinator with a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the shared token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the token. Idempotent.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("shutdown requested");
        }
        self.token.cancel();
    }

    /// Whether the token has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the token, then await `tasks` against a single deadline.
    ///
    /// Returns the names of tasks still running when the deadline passed.
    /// They are detached, not aborted.
    pub async fn graceful_shutdown(
        &self,
        tasks: Vec<NamedTask>,
        timeout: Option<Duration>,
    ) -> Vec<&'static str> {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();
        info!(tasks = tasks.len(), ?timeout, "draining");

        let deadline = Instant::now() + timeout;
        let mut stragglers = Vec::new();
        for (name, handle) in tasks {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => debug!(task = name, "task finished"),
                Ok(Err(e)) => warn!(task = name, error = %e, "task ended abnormally"),
                Err(_) => {
                    warn!(task = name, "task still running at shutdown deadline");
                    stragglers.push(name);
                }
            }
        }
        stragglers
    }
}

/// Resolve on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                let _ = sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("SIGINT received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_fires_once_for_all_holders() {
        let coord = ShutdownCoordinator::new();
        let listener = coord.token();
        let consumer = coord.token();
        assert!(!coord.is_shutting_down());

        coord.shutdown();
        coord.shutdown();
        assert!(listener.is_cancelled());
        assert!(consumer.is_cancelled());
    }

    #[tokio::test]
    async fn cooperative_tasks_drain_cleanly() {
        let coord = ShutdownCoordinator::new();
        let tasks = ["http", "consumer"]
            .into_iter()
            .map(|name| {
                let token = coord.token();
                (name, tokio::spawn(async move { token.cancelled().await }))
            })
            .collect();

        let stragglers = coord.graceful_shutdown(tasks, None).await;
        assert!(stragglers.is_empty());
        assert!(coord.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_reports_stragglers() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let quick = tokio::spawn(async move { token.cancelled().await });
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });

        let stragglers = coord
            .graceful_shutdown(
                vec![("http", quick), ("consumer", stuck)],
                Some(Duration::from_millis(100)),
            )
            .await;
        assert_eq!(stragglers, vec!["consumer"]);
    }

    #[tokio::test]
    async fn panicked_task_is_not_a_straggler() {
        let coord = ShutdownCoordinator::new();
        let boom = tokio::spawn(async { panic!("boom") });
        let stragglers = coord.graceful_shutdown(vec![("boom", boom)], None).await;
        assert!(stragglers.is_empty());
    }
}
