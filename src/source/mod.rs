//! Frame sources.
//!
//! A job is streamed from one of two sources behind a single capability:
//! [`GeneratedSource`] synthesises frames, [`ReplaySource`] decodes a
//! recorded capture. [`FrameMaker`] wraps whichever one a job selects and
//! applies hotspots and telemetry overrides, so the streamer never needs
//! to know which source it is driving.
//!
//! Recorded captures are read through the [`FrameDecoder`] and
//! [`DecoderFactory`] traits. The crate ships [`RawDumpFactory`], which
//! reads files in the same format the streamer writes to the socket.

mod generated;
mod maker;
mod rawdump;
mod replay;

use std::path::PathBuf;
use thiserror::Error;

use crate::camera::Frame;
use crate::telemetry::TelemetryError;

pub use generated::GeneratedSource;
pub use maker::FrameMaker;
pub use rawdump::{RawDumpDecoder, RawDumpFactory, RawDumpWriter};
pub use replay::ReplaySource;

/// Errors that end a job.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("capture {0} does not exist")]
    NotFound(PathBuf),
    #[error("job names no capture file")]
    NoCaptureFile,
    #[error("capture has {frames} frames, cannot start at frame {start}")]
    ShortCapture { start: u32, frames: u32 },
    #[error("capture is {got_x}x{got_y}, camera is {want_x}x{want_y}")]
    ResolutionMismatch {
        got_x: usize,
        got_y: usize,
        want_x: usize,
        want_y: usize,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors reading frames from a capture.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid capture header: {0}")]
    Header(String),
    #[error("capture ends mid-frame ({got} of {expected} bytes)")]
    Truncated { got: usize, expected: usize },
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

/// Sequential reader of recorded frames.
pub trait FrameDecoder: Send {
    /// Decodes the next frame into `frame`. Returns `Ok(false)` at the end
    /// of the capture.
    fn read_frame(&mut self, frame: &mut Frame) -> Result<bool, DecodeError>;

    /// Recorded frame rate, or 0 if unknown.
    fn fps(&self) -> u32;

    /// A frame sized for this capture.
    fn empty_frame(&self) -> Frame;
}

/// Opens captures by name. Replay reopens through the factory to loop.
pub trait DecoderFactory: Send + Sync {
    fn open(&self, name: &str) -> Result<Box<dyn FrameDecoder>, SourceError>;
}

/// The source a job streams from.
pub enum FrameSource {
    Generated(GeneratedSource),
    Replay(ReplaySource),
}

impl FrameSource {
    /// Produces the next frame, or `None` when the source is exhausted.
    /// The returned frame is overwritten by the following call.
    pub fn next(&mut self) -> Result<Option<&mut Frame>, SourceError> {
        match self {
            FrameSource::Generated(source) => Ok(source.next()),
            FrameSource::Replay(source) => source.next(),
        }
    }

    /// Native frame rate, or 0 if unknown.
    pub fn fps(&self) -> u32 {
        match self {
            FrameSource::Generated(_) => 0,
            FrameSource::Replay(source) => source.fps(),
        }
    }

    pub fn close(&mut self) {
        match self {
            FrameSource::Generated(_) => {}
            FrameSource::Replay(source) => source.close(),
        }
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameSource::Generated(source) => f.debug_tuple("Generated").field(source).finish(),
            FrameSource::Replay(source) => f.debug_tuple("Replay").field(source).finish(),
        }
    }
}
