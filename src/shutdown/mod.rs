// Package shutdown provides graceful shutdown functionality.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("graceful shutdown timeout exceeded")]
pub struct TimeoutError;

const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(10);

/// Graceful shutdown handler: a wait-group over background tasks plus a
/// cancellation token, drained with a bounded timeout.
#[derive(Clone)]
pub struct GracefulShutdown {
    shutdown_token: CancellationToken,
    timeout: Arc<parking_lot::RwLock<Duration>>,
    pending: Arc<AtomicUsize>,
    drained: Arc<Notify>,
}

impl GracefulShutdown {
    pub fn new(shutdown_token: CancellationToken) -> Self {
        Self {
            shutdown_token,
            timeout: Arc::new(parking_lot::RwLock::new(DEFAULT_GRACEFUL_TIMEOUT)),
            pending: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(Notify::new()),
        }
    }

    /// Sets the graceful shutdown timeout.
    pub fn set_graceful_timeout(&self, timeout: Duration) {
        *self.timeout.write() = timeout;
    }

    /// Registers `n` tasks to wait for on shutdown.
    pub fn add(&self, n: usize) {
        self.pending.fetch_add(n, Ordering::AcqRel);
    }

    /// Marks one registered task as finished.
    pub fn done(&self) {
        let before = self.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(before > 0, "done() without matching add()");
        if before <= 1 {
            self.drained.notify_waiters();
        }
    }

    /// Waits for an OS signal or token cancellation, then drains
    /// registered tasks within the configured timeout.
    pub async fn await_shutdown(&self) -> Result<()> {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!(
                    component = "graceful-shutdown",
                    event = "os_signal",
                    signal = "SIGINT",
                    "cancellation started"
                );
            }
            _ = self.shutdown_token.cancelled() => {
                info!(
                    component = "graceful-shutdown",
                    event = "ctx_done",
                    "cancellation started"
                );
            }
        }

        self.cancel_and_await_with_timeout().await
    }

    async fn cancel_and_await_with_timeout(&self) -> Result<()> {
        self.shutdown_token.cancel();

        let timeout_duration = *self.timeout.read();
        match timeout(timeout_duration, self.wait_for_completion()).await {
            Ok(_) => {
                info!(
                    component = "graceful-shutdown",
                    event = "shutdown_success",
                    "service was gracefully shut down"
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    component = "graceful-shutdown",
                    event = "shutdown_timeout",
                    timeout = %humantime::format_duration(timeout_duration),
                    "not all tasks were closed within timeout"
                );
                Err(TimeoutError.into())
            }
        }
    }

    async fn wait_for_completion(&self) {
        loop {
            // Arm the notification before the check so a done() landing in
            // between is not missed.
            let drained = self.drained.notified();
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            drained.await;
        }
    }
}
