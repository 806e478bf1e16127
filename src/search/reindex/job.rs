//! Reindex job record and its status report

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use strum::Display;
use uuid::Uuid;

/// Lifecycle of a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ReindexState {
    /// No job has run yet
    Idle,
    /// Copying documents into the new index
    Running,
    /// Alias repointed to the new index
    Completed,
    /// Stopped before completion; new index dropped
    Cancelled,
    /// Aborted by an error; new index dropped
    Failed,
}

impl ReindexState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Label used for metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// Snapshot of one rebuild.
///
/// Progress fields are written only by the background task; `stop_requested`
/// is written by whoever calls `stop`. Both sides go through the same lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReindexJob {
    pub id: Uuid,

    /// Stable name readers query
    pub alias: String,

    /// Index the alias pointed at when the job started
    pub original_index: Option<String>,

    /// Index being populated
    pub new_index: Option<String>,

    /// Primary-store cardinality at job start
    pub total_count: u64,

    /// Documents copied so far; never decreases
    pub indexed_count: u64,

    pub started_at: DateTime<Utc>,

    /// Set exactly once, when the job turns terminal
    pub ended_at: Option<DateTime<Utc>>,

    pub stop_requested: bool,

    /// Alias swap underway; forced cancellation is withheld
    pub cutover: bool,

    pub state: ReindexState,

    /// Why the job failed
    pub failure: Option<String>,
}

impl ReindexJob {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alias: alias.into(),
            original_index: None,
            new_index: None,
            total_count: 0,
            indexed_count: 0,
            started_at: Utc::now(),
            ended_at: None,
            stop_requested: false,
            cutover: false,
            state: ReindexState::Running,
            failure: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Move to a terminal state; later calls are ignored
    pub fn finish(&mut self, state: ReindexState, failure: Option<String>) {
        if self.ended_at.is_some() {
            return;
        }
        self.state = state;
        self.failure = failure;
        self.cutover = false;
        self.ended_at = Some(Utc::now());
    }

    /// Completion percentage, capped at 100
    pub fn percentage(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        (self.indexed_count as f64 * 100.0 / self.total_count as f64).min(100.0)
    }

    /// Time spent so far, or total runtime once ended
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.ended_at.unwrap_or(now) - self.started_at
    }

    /// `elapsed * (100 / percentage - 1)`; `None` before progress or after the end
    pub fn eta(&self, now: DateTime<Utc>) -> Option<Duration> {
        let pct = self.percentage();
        if pct <= 0.0 || self.ended_at.is_some() {
            return None;
        }
        let elapsed_ms = self.elapsed(now).num_milliseconds() as f64;
        Some(Duration::milliseconds(
            (elapsed_ms * (100.0 / pct - 1.0)).round() as i64,
        ))
    }

    /// Human-readable report with a stable line order
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();

        let _ = write!(out, "Reindex job {}: {}", self.id, self.state);
        if let Some(ref failure) = self.failure {
            let _ = write!(out, " ({})", failure);
        }
        let _ = writeln!(
            out,
            "\nStarted: {}, ended: {}",
            self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.ended_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_else(|| "-".to_string())
        );
        let _ = writeln!(
            out,
            "Alias: {}, original index: {}, new index: {}",
            self.alias,
            self.original_index.as_deref().unwrap_or("-"),
            self.new_index.as_deref().unwrap_or("-")
        );
        let _ = writeln!(
            out,
            "Indexed {} of {} documents ({:.2}%)",
            self.indexed_count,
            self.total_count,
            self.percentage()
        );
        let _ = writeln!(
            out,
            "Elapsed: {}, ETA: {}",
            format_duration(self.elapsed(now)),
            self.eta(now)
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string())
        );
        let _ = write!(out, "Stop requested: {}", self.stop_requested);

        out
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.num_milliseconds().max(0) as f64 / 1000.0;
    if secs >= 3600.0 {
        format!("{}h{:02}m", (secs / 3600.0) as u64, ((secs % 3600.0) / 60.0) as u64)
    } else if secs >= 60.0 {
        format!("{}m{:02}s", (secs / 60.0) as u64, (secs % 60.0) as u64)
    } else {
        format!("{:.1}s", secs)
    }
}

/// Report shown before any job has run
pub fn idle_status(alias: &str) -> String {
    format!("Reindex: {} (alias {}, no job has run)", ReindexState::Idle, alias)
}
