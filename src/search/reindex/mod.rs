//! Zero-downtime index rebuilds.
//!
//! A rebuild copies every primary-store record into a fresh versioned index
//! (`{alias}{n+1}`), repoints the alias in one action and only then drops the
//! previous version. Cancellation or failure drops the new index and leaves the
//! alias untouched, so readers never observe a partial rebuild.
//!
//! ```text
//! Idle ──start──▶ Running ──┬──▶ Completed   (alias swapped, old index dropped)
//!                           ├──▶ Cancelled   (new index dropped)
//!                           └──▶ Failed      (new index dropped)
//! ```

mod coordinator;
mod job;
pub mod metrics;
pub mod naming;
mod task;

pub use coordinator::ReindexCoordinator;
pub use job::{ReindexJob, ReindexState};
pub use metrics::{gather_metrics, init_reindex_metrics, ReindexMetrics, REINDEX_METRICS};
pub use task::ReindexTask;
