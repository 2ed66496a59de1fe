//! Socket output.
//!
//! The [`Streamer`] is the single consumer of the job queue. It owns the
//! connection to the recorder, announces the sensor with a handshake and
//! writes one paced wire frame per tick. A failed write drops the
//! connection; the streamer redials and handshakes again, and the job that
//! was playing is abandoned.

mod streamer;

use thiserror::Error;

pub use streamer::{Streamer, StreamerConfig};

/// Connection lifecycle of the streamer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Socket open, handshake not yet sent.
    Connected,
    /// Handshake sent; frames flow as jobs arrive.
    Streaming,
}

/// Errors that tear down the output connection.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to encode handshake: {0}")]
    Handshake(#[from] serde_yaml::Error),
    #[error("write to frame output socket failed: {0}")]
    Write(#[source] std::io::Error),
}
