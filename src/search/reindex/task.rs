//! Handle over the background rebuild task

use super::job::{ReindexJob, ReindexState};
use super::metrics::REINDEX_METRICS;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinError, JoinHandle};

/// Cooperative cancellation goes through `ReindexJob::stop_requested`; this
/// handle adds forced cancellation on top. It is shared, so a stop and a
/// waiter can hold it at the same time.
pub struct ReindexTask {
    handle: Mutex<Option<JoinHandle<()>>>,
    abort: AbortHandle,
    abort_requested: AtomicBool,
}

impl ReindexTask {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self {
            abort: handle.abort_handle(),
            handle: Mutex::new(Some(handle)),
            abort_requested: AtomicBool::new(false),
        }
    }

    /// Abort the task at its next suspension point
    pub fn cancel(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
        self.abort.abort();
    }

    /// Forced cancellation was requested and the task is no longer running
    pub fn is_cancelled(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst) && self.abort.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }

    /// Wait for the task; an aborted task yields a cancelled `JoinError`.
    ///
    /// Only the first caller observes the join result, later callers just
    /// wait for the task to end.
    pub async fn join(&self) -> Result<(), JoinError> {
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => handle.await,
            None => {
                while !self.abort.is_finished() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                Ok(())
            }
        }
    }
}

/// Moved into the task future at spawn time. If the future is dropped before
/// the job turned terminal (abort, even before the first poll, or panic), the
/// job is closed here.
pub(crate) struct TerminalGuard {
    job: Arc<RwLock<ReindexJob>>,
}

impl TerminalGuard {
    pub(crate) fn new(job: Arc<RwLock<ReindexJob>>) -> Self {
        Self { job }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut job = self.job.write();
        if !job.is_active() {
            return;
        }

        if std::thread::panicking() {
            job.finish(ReindexState::Failed, Some("reindex task panicked".to_string()));
        } else {
            job.finish(ReindexState::Cancelled, None);
        }

        let duration = job.elapsed(chrono::Utc::now()).num_milliseconds() as f64 / 1000.0;
        REINDEX_METRICS.record_finish(job.state.outcome(), duration);
        tracing::warn!(
            job_id = %job.id,
            alias = %job.alias,
            new_index = ?job.new_index,
            state = %job.state,
            "Reindex task dropped before finishing"
        );
    }
}
