//! Driver task plumbing shared by both strategies.
//!
//! Each strategy runs its socket I/O in one spawned task. The task holds a
//! [`TransportGuard`] for its whole lifetime, so the session's
//! [`TransportGauge`] counts transports that still own connection objects.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::millis;
use crate::error::Error;

// ============================================================================
// DriverCommand
// ============================================================================

/// Commands sent from the session to a driver task.
#[derive(Debug)]
pub enum DriverCommand {
    /// Close all connections and exit.
    Shutdown,
}

// ============================================================================
// DriverHandle
// ============================================================================

/// Owning handle to a driver task.
pub struct DriverHandle {
    command_tx: mpsc::UnboundedSender<DriverCommand>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Spawns `run` with a fresh command channel.
    pub fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(mpsc::UnboundedReceiver<DriverCommand>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(command_rx));
        Self { command_tx, task }
    }

    /// Returns `true` once the driver task has exited.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Requests shutdown and waits for the task to exit.
    ///
    /// Aborts the task if it is still running after `limit`.
    pub async fn shutdown(mut self, limit: Duration) {
        let _ = self.command_tx.send(DriverCommand::Shutdown);

        match timeout(limit, &mut self.task).await {
            Ok(Ok(())) => debug!("Driver task finished"),
            Ok(Err(e)) => warn!(error = %e, "Driver task ended abnormally"),
            Err(_) => {
                let err = Error::timeout("driver shutdown", millis(limit));
                warn!(error = %err, "Driver task did not stop in time, aborting");
                self.task.abort();
                let _ = self.task.await;
            }
        }
    }

    /// Aborts the task immediately.
    pub fn abort(&self) {
        self.task.abort();
    }
}

// ============================================================================
// TransportGauge
// ============================================================================

/// Counts live driver tasks.
#[derive(Debug, Clone, Default)]
pub struct TransportGauge {
    open: Arc<AtomicUsize>,
}

impl TransportGauge {
    /// Creates a gauge at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the gauge until the returned guard is dropped.
    #[must_use]
    pub fn open(&self) -> TransportGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        TransportGuard {
            open: Arc::clone(&self.open),
        }
    }

    /// Number of live transports.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// Decrements the gauge on drop.
#[derive(Debug)]
pub struct TransportGuard {
    open: Arc<AtomicUsize>,
}

impl Drop for TransportGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Tests
// ============================================================================
