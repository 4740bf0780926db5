//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long tracked tasks get to finish before shutdown gives up.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the server-wide cancellation token and the tasks waiting on it.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no tracked tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Track a task to be awaited during [`graceful_shutdown`](Self::graceful_shutdown).
    pub fn track(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    /// Cancel the token, then wait up to `timeout` for tracked tasks.
    ///
    /// Tasks still running after the timeout are aborted.
    pub async fn graceful_shutdown(&self, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.token.cancel();

        let handles = std::mem::take(&mut *self.tasks.lock());
        info!(
            task_count = handles.len(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "waiting for tasks to complete"
        );
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        if tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!("shutdown timed out after {timeout:?}, aborting remaining tasks");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}
