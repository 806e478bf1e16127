use super::job::{idle_status, ReindexJob, ReindexState};
use super::metrics::REINDEX_METRICS;
use super::naming::{latest_version, next_index_name};
use super::task::{ReindexTask, TerminalGuard};
use crate::search::backend::{drop_index_if_exists, IndexBackend};
use crate::search::config::ReindexConfig;
use crate::search::document::ItemDocument;
use crate::search::error::{SearchError, SearchResult};
use crate::search::mapping::MappingSource;
use crate::state::ItemStore;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

enum CopyOutcome {
    Completed,
    Cancelled,
}

/// Everything the background task needs, cloned out of the coordinator
#[derive(Clone)]
struct RebuildContext {
    backend: Arc<dyn IndexBackend>,
    store: Arc<dyn ItemStore>,
    mappings: Arc<dyn MappingSource>,
    alias: String,
    batch_size: usize,
    high_water: Arc<AtomicU64>,
    /// Serving index on engines without aliases, chosen at initialization
    pinned: Arc<RwLock<Option<String>>>,
}

/// A job together with the task running it
struct ActiveJob {
    job: Arc<RwLock<ReindexJob>>,
    task: ReindexTask,
}

/// Runs at most one full rebuild at a time and reports on it
pub struct ReindexCoordinator {
    ctx: RebuildContext,
    config: ReindexConfig,
    current: Mutex<Option<Arc<ActiveJob>>>,
}

impl ReindexCoordinator {
    pub fn new(
        backend: Arc<dyn IndexBackend>,
        store: Arc<dyn ItemStore>,
        mappings: Arc<dyn MappingSource>,
        alias: impl Into<String>,
        config: ReindexConfig,
    ) -> Self {
        Self {
            ctx: RebuildContext {
                backend,
                store,
                mappings,
                alias: alias.into(),
                batch_size: config.batch_size.max(1),
                high_water: Arc::new(AtomicU64::new(0)),
                pinned: Arc::new(RwLock::new(None)),
            },
            config,
            current: Mutex::new(None),
        }
    }

    pub fn alias(&self) -> &str {
        &self.ctx.alias
    }

    pub fn config(&self) -> &ReindexConfig {
        &self.config
    }

    fn current(&self) -> Option<Arc<ActiveJob>> {
        self.current.lock().clone()
    }

    /// Launch a rebuild in the background.
    ///
    /// Returns `false` without side effects while another job is running or
    /// its task has not wound down yet. Must be called from within a tokio
    /// runtime.
    pub fn start(&self) -> bool {
        let mut slot = self.current.lock();
        let mut leftover = None;
        if let Some(previous) = slot.as_ref() {
            let job = previous.job.read();
            if job.is_active() || !previous.task.is_finished() {
                info!(
                    job_id = %job.id,
                    alias = %job.alias,
                    "Reindex rejected, a job is already running"
                );
                return false;
            }
            // An aborted or failed job may have left its index behind.
            if job.state != ReindexState::Completed {
                leftover = job.new_index.clone();
            }
        }

        let job = Arc::new(RwLock::new(ReindexJob::new(self.ctx.alias.clone())));
        let job_id = job.read().id;

        let guard = TerminalGuard::new(job.clone());
        let ctx = self.ctx.clone();
        let worker = job.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            ctx.run(worker, leftover).await;
        });
        *slot = Some(Arc::new(ActiveJob {
            job,
            task: ReindexTask::new(handle),
        }));

        info!(job_id = %job_id, alias = %self.ctx.alias, "Reindex job accepted");
        true
    }

    /// Cancel the running job.
    ///
    /// The stop signal is raised first and the task gets one `delay` to wind
    /// down on its own; every further attempt escalates to a forced abort.
    /// Only the job running when `stop` was called is affected. Returns
    /// `true` once that job has ended, `false` if the attempts ran out.
    pub async fn stop(&self, attempts: u32, delay: Duration) -> bool {
        let Some(active) = self.current() else {
            return true;
        };

        let running = {
            let mut job = active.job.write();
            if job.is_active() {
                job.stop_requested = true;
                info!(job_id = %job.id, attempts = attempts, "Stop requested for reindex job");
            }
            job.is_active() || !active.task.is_finished()
        };

        if running {
            for attempt in 0..attempts {
                if active.task.is_finished() {
                    break;
                }
                if attempt > 0 {
                    // With the stop signal raised the task cannot enter cutover
                    // any more, so only an earlier cutover blocks the abort.
                    let job = active.job.read();
                    if !job.cutover {
                        active.task.cancel();
                    }
                }
                tokio::time::sleep(delay).await;
            }

            if !active.task.is_finished() {
                warn!(attempts = attempts, "Reindex task did not acknowledge cancellation");
                return false;
            }
        }

        self.cleanup_after_stop(&active.job).await;
        true
    }

    /// A forced abort can leave the partial index behind; drop it
    async fn cleanup_after_stop(&self, job: &Arc<RwLock<ReindexJob>>) {
        let (state, new_index) = {
            let job = job.read();
            (job.state, job.new_index.clone())
        };
        if state != ReindexState::Cancelled {
            return;
        }
        if let Some(index) = new_index {
            if let Err(e) = drop_index_if_exists(self.ctx.backend.as_ref(), &index).await {
                warn!(index = %index, error = %e, "Failed to drop partially built index");
            }
        }
    }

    /// Verbose report for the current or last job
    pub fn status(&self) -> String {
        match self.current() {
            Some(active) => active.job.read().render(chrono::Utc::now()),
            None => idle_status(&self.ctx.alias),
        }
    }

    /// Copy of the current or last job record
    pub fn snapshot(&self) -> Option<ReindexJob> {
        self.current().map(|active| active.job.read().clone())
    }

    pub fn is_running(&self) -> bool {
        self.current()
            .map_or(false, |active| active.job.read().is_active())
    }

    /// Wait for the current task to finish and return its final record
    pub async fn wait(&self) -> Option<ReindexJob> {
        let active = self.current()?;
        if let Err(e) = active.task.join().await {
            if !e.is_cancelled() {
                error!(error = %e, "Reindex task failed to join");
            }
        }
        self.cleanup_after_stop(&active.job).await;
        let job = active.job.read().clone();
        Some(job)
    }

    /// Serve `index` on engines that cannot alias
    pub fn pin_serving_index(&self, index: &str) {
        info!(alias = %self.ctx.alias, index = %index, "Serving index pinned");
        *self.ctx.pinned.write() = Some(index.to_string());
    }

    /// Index readers should use.
    ///
    /// Engines without aliases serve the pinned index, never a version that
    /// happens to be the highest.
    pub async fn active_index(&self) -> SearchResult<Option<String>> {
        match self.ctx.backend.resolve_alias(&self.ctx.alias).await {
            Ok(target) => Ok(target),
            Err(SearchError::Unsupported { .. }) => Ok(self.ctx.pinned.read().clone()),
            Err(e) => Err(e),
        }
    }
}

impl RebuildContext {
    async fn run(self, job: Arc<RwLock<ReindexJob>>, leftover: Option<String>) {
        let started = Instant::now();
        REINDEX_METRICS.record_start();

        if let Some(index) = leftover {
            if let Err(e) = drop_index_if_exists(self.backend.as_ref(), &index).await {
                warn!(index = %index, error = %e, "Failed to drop index left by previous job");
            }
        }

        let (state, failure) = match self.rebuild(&job).await {
            Ok(CopyOutcome::Completed) => (ReindexState::Completed, None),
            Ok(CopyOutcome::Cancelled) => {
                self.rollback(&job).await;
                (ReindexState::Cancelled, None)
            }
            Err(e) => {
                error!(alias = %self.alias, error = %e, "Reindex failed");
                self.rollback(&job).await;
                (ReindexState::Failed, Some(e.to_string()))
            }
        };

        let mut job = job.write();
        job.finish(state, failure);
        REINDEX_METRICS.record_finish(state.outcome(), started.elapsed().as_secs_f64());
        info!(
            job_id = %job.id,
            alias = %job.alias,
            new_index = ?job.new_index,
            state = %job.state,
            indexed = job.indexed_count,
            total = job.total_count,
            duration_ms = started.elapsed().as_millis() as u64,
            "Reindex job finished"
        );
    }

    async fn rebuild(&self, job: &Arc<RwLock<ReindexJob>>) -> SearchResult<CopyOutcome> {
        let kind = self.backend.kind();
        let mapping = self.mappings.load(kind).ok_or_else(|| {
            SearchError::SchemaError(format!("no mapping resource for {} backend", kind))
        })?;

        // Version negotiation
        let existing = self.backend.list_indices(&self.alias).await?;
        let aliased = match self.backend.resolve_alias(&self.alias).await {
            Ok(target) => target,
            Err(SearchError::Unsupported { .. }) => None,
            Err(e) => return Err(e),
        };
        let original = aliased
            .clone()
            .or_else(|| self.pinned.read().clone())
            .or_else(|| latest_version(&self.alias, &existing).map(|(_, name)| name));
        let (version, new_index) = next_index_name(
            &self.alias,
            &existing,
            self.high_water.load(Ordering::SeqCst),
        );
        self.high_water.fetch_max(version, Ordering::SeqCst);

        let total = self.store.count().await?;
        {
            let mut job = job.write();
            job.original_index = original.clone();
            job.total_count = total;
        }
        if total == 0 {
            return Err(SearchError::NothingToIndex(
                "primary store holds no items".to_string(),
            ));
        }

        // Recorded before creation so a half-created index is rolled back too.
        job.write().new_index = Some(new_index.clone());
        if !self.backend.create_index(&new_index, &mapping).await? {
            return Err(SearchError::SchemaError(format!(
                "backend rejected mapping for {}",
                new_index
            )));
        }
        info!(
            alias = %self.alias,
            original_index = ?original,
            new_index = %new_index,
            total = total,
            "Copying primary store into new index"
        );

        if let CopyOutcome::Cancelled = self.copy(job, &new_index, total).await? {
            return Ok(CopyOutcome::Cancelled);
        }
        self.backend.refresh(&new_index).await?;

        {
            let mut job = job.write();
            if job.stop_requested {
                return Ok(CopyOutcome::Cancelled);
            }
            job.cutover = true;
        }

        self.backend
            .swap_alias(&self.alias, aliased.as_deref(), &new_index)
            .await?;
        info!(alias = %self.alias, index = %new_index, "Alias now serves the new index");

        // The alias no longer references it, so readers are unaffected by the drop.
        if let Some(old) = original.filter(|old| *old != new_index) {
            if let Err(e) = drop_index_if_exists(self.backend.as_ref(), &old).await {
                warn!(index = %old, error = %e, "Failed to drop previous index version");
            }
        }

        Ok(CopyOutcome::Completed)
    }

    async fn copy(
        &self,
        job: &Arc<RwLock<ReindexJob>>,
        new_index: &str,
        total: u64,
    ) -> SearchResult<CopyOutcome> {
        let mut cursor = self.store.scan();
        loop {
            if job.read().stop_requested {
                info!(index = %new_index, "Stop signal observed, abandoning rebuild");
                return Ok(CopyOutcome::Cancelled);
            }

            let batch = self.store.fetch_batch(&mut cursor, self.batch_size).await?;
            if batch.is_empty() {
                break;
            }

            for item in &batch {
                let doc = ItemDocument::from(item);
                self.backend.upsert(new_index, &item.identifier, &doc).await?;
            }

            let (indexed, percentage) = {
                let mut job = job.write();
                job.indexed_count += batch.len() as u64;
                (job.indexed_count, job.percentage())
            };
            REINDEX_METRICS.record_batch(batch.len() as u64, percentage);

            if indexed >= total || cursor.is_exhausted() {
                break;
            }

            // Hand the worker back between batches so stop and status calls get a turn.
            tokio::task::yield_now().await;
        }

        Ok(CopyOutcome::Completed)
    }

    /// Drop the partially built index; the alias and original stay untouched
    async fn rollback(&self, job: &Arc<RwLock<ReindexJob>>) {
        let Some(index) = job.read().new_index.clone() else {
            return;
        };
        match drop_index_if_exists(self.backend.as_ref(), &index).await {
            Ok(()) => info!(index = %index, "Rolled back partially built index"),
            Err(e) => error!(index = %index, error = %e, "Rollback failed to drop index"),
        }
    }
}
