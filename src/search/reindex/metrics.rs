//! Prometheus metrics for index rebuilds

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_int_counter,
    register_int_gauge, CounterVec, Gauge, Histogram, IntCounter, IntGauge,
};

/// Reindex metrics collection
pub struct ReindexMetrics {
    /// Finished jobs by outcome (completed, cancelled, failed)
    pub jobs_total: CounterVec,

    /// Documents copied into new indices
    pub documents_indexed: IntCounter,

    /// Wall-clock job duration in seconds
    pub job_duration: Histogram,

    /// Progress of the running job, 0-100
    pub progress_percent: Gauge,

    /// 1 while a job is running
    pub running: IntGauge,
}

impl ReindexMetrics {
    pub fn new() -> Self {
        Self {
            jobs_total: register_counter_vec!(
                "oai_reindex_jobs_total",
                "Total number of finished reindex jobs",
                &["outcome"]
            )
            .unwrap(),

            documents_indexed: register_int_counter!(
                "oai_reindex_documents_indexed_total",
                "Documents copied from the primary store into a new index"
            )
            .unwrap(),

            job_duration: register_histogram!(
                "oai_reindex_job_duration_seconds",
                "Reindex job duration in seconds",
                vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]
            )
            .unwrap(),

            progress_percent: register_gauge!(
                "oai_reindex_progress_percent",
                "Progress of the running reindex job"
            )
            .unwrap(),

            running: register_int_gauge!(
                "oai_reindex_running",
                "Whether a reindex job is currently running"
            )
            .unwrap(),
        }
    }

    pub fn record_start(&self) {
        self.running.set(1);
        self.progress_percent.set(0.0);
    }

    pub fn record_batch(&self, documents: u64, percentage: f64) {
        self.documents_indexed.inc_by(documents);
        self.progress_percent.set(percentage);
    }

    pub fn record_finish(&self, outcome: &str, duration_secs: f64) {
        self.running.set(0);
        self.jobs_total.with_label_values(&[outcome]).inc();
        self.job_duration.observe(duration_secs);
    }
}

impl Default for ReindexMetrics {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    /// Global reindex metrics instance
    pub static ref REINDEX_METRICS: ReindexMetrics = ReindexMetrics::new();
}

/// Initialize reindex metrics (idempotent)
pub fn init_reindex_metrics() {
    lazy_static::initialize(&REINDEX_METRICS);
}

/// Render the default registry in the Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
