//! Fake Lepton Library
//!
//! Emulates a FLIR Lepton thermal sensor for testing recorders without
//! hardware. Frames are either synthesised or replayed from a capture, then
//! streamed over a Unix socket in the sensor's wire format.
//!
//! # Architecture
//!
//! ```text
//! control (queue, play/pause/stop)
//!     ↓
//! source (generated | replay) → hotspot → telemetry → stream (socket)
//! ```
//!
//! One streamer thread consumes jobs. Control calls come from any thread,
//! including the optional HTTP server.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fake_lepton::{
//!     camera::{CameraSpec, StreamConfig},
//!     control::{Job, JobController},
//!     metrics::StreamMetrics,
//!     source::RawDumpFactory,
//!     stream::Streamer,
//! };
//!
//! let controller = Arc::new(JobController::new());
//! let mut streamer = Streamer::new(
//!     (&StreamConfig::default()).into(),
//!     CameraSpec::default(),
//!     Arc::clone(&controller),
//!     Arc::new(RawDumpFactory::new("/cptv-files").expecting(CameraSpec::default())),
//!     StreamMetrics::new().unwrap(),
//! );
//! std::thread::spawn(move || streamer.run());
//!
//! let handle = controller.submit(Job::generated(90).with_temperature(3000, 4000));
//! println!("{:?}", handle.wait());
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod camera;
pub mod control;
pub mod hotspot;
pub mod metrics;
#[cfg(feature = "server")]
pub mod server;
pub mod source;
pub mod stream;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use camera::{CameraSpec, FileConfig, Frame, Telemetry};
pub use control::{Job, JobController, JobHandle, JobOutcome};
pub use metrics::StreamMetrics;
pub use source::{DecoderFactory, FrameDecoder, RawDumpFactory};
pub use stream::{Streamer, StreamerConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
