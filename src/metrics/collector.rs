//! Metrics collection and registry.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics for the streaming engine.
///
/// Handles are cheap to clone and safe to update from any thread.
#[derive(Clone)]
pub struct StreamMetrics {
    registry: Registry,

    // Output
    frames_sent: IntCounter,
    connected: IntGauge,
    connection_failures: IntCounter,
    disconnects: IntCounter,

    // Jobs
    jobs_completed: IntCounter,
    jobs_stopped: IntCounter,
    jobs_failed: IntCounter,
    jobs_abandoned: IntCounter,
    queue_depth: IntGauge,
}

impl StreamMetrics {
    /// Creates a new registry with all streaming metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_sent = IntCounter::new(
            "fake_lepton_frames_sent_total",
            "Frames written to the output socket",
        )?;
        let connected = IntGauge::new(
            "fake_lepton_connected",
            "Output socket state (1=connected, 0=disconnected)",
        )?;
        let connection_failures = IntCounter::new(
            "fake_lepton_connection_failures_total",
            "Failed attempts to dial the output socket",
        )?;
        let disconnects = IntCounter::new(
            "fake_lepton_disconnects_total",
            "Connections torn down after a write failure",
        )?;

        let jobs_completed = IntCounter::new(
            "fake_lepton_jobs_completed_total",
            "Jobs that streamed every frame",
        )?;
        let jobs_stopped = IntCounter::new(
            "fake_lepton_jobs_stopped_total",
            "Jobs ended early by stop, clear or replacement",
        )?;
        let jobs_failed = IntCounter::new(
            "fake_lepton_jobs_failed_total",
            "Jobs whose source could not be opened or decoded",
        )?;
        let jobs_abandoned = IntCounter::new(
            "fake_lepton_jobs_abandoned_total",
            "Jobs lost to a dropped connection",
        )?;
        let queue_depth = IntGauge::new(
            "fake_lepton_queue_depth",
            "Jobs waiting behind the running one",
        )?;

        registry.register(Box::new(frames_sent.clone()))?;
        registry.register(Box::new(connected.clone()))?;
        registry.register(Box::new(connection_failures.clone()))?;
        registry.register(Box::new(disconnects.clone()))?;
        registry.register(Box::new(jobs_completed.clone()))?;
        registry.register(Box::new(jobs_stopped.clone()))?;
        registry.register(Box::new(jobs_failed.clone()))?;
        registry.register(Box::new(jobs_abandoned.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            registry,
            frames_sent,
            connected,
            connection_failures,
            disconnects,
            jobs_completed,
            jobs_stopped,
            jobs_failed,
            jobs_abandoned,
            queue_depth,
        })
    }

    pub fn frame_sent(&self) {
        self.frames_sent.inc();
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.get()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(if connected { 1 } else { 0 });
    }

    pub fn connection_failed(&self) {
        self.connection_failures.inc();
    }

    pub fn disconnected(&self) {
        self.disconnects.inc();
        self.connected.set(0);
    }

    pub fn job_completed(&self) {
        self.jobs_completed.inc();
    }

    pub fn job_stopped(&self) {
        self.jobs_stopped.inc();
    }

    pub fn job_failed(&self) {
        self.jobs_failed.inc();
    }

    pub fn job_abandoned(&self) {
        self.jobs_abandoned.inc();
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as i64);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for StreamMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMetrics")
            .field("frames_sent", &self.frames_sent.get())
            .field("connected", &self.connected.get())
            .finish()
    }
}
