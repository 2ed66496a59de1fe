//! Prometheus metrics for the streaming engine.
//!
//! # Metrics Exposed
//!
//! ## Output
//! - `fake_lepton_frames_sent_total` - Frames written to the socket
//! - `fake_lepton_connected` - Output socket state (1=connected, 0=disconnected)
//! - `fake_lepton_connection_failures_total` - Failed dials
//! - `fake_lepton_disconnects_total` - Connections lost to write failures
//!
//! ## Jobs
//! - `fake_lepton_jobs_completed_total`
//! - `fake_lepton_jobs_stopped_total`
//! - `fake_lepton_jobs_failed_total`
//! - `fake_lepton_jobs_abandoned_total`
//! - `fake_lepton_queue_depth` - Jobs waiting behind the running one
//!
//! With the `server` feature the registry is served at `/metrics`.

mod collector;

pub use collector::{MetricsError, StreamMetrics};
