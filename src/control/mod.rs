//! Job submission and playback control.
//!
//! Callers submit [`Job`]s to a shared [`JobController`]; the streamer takes
//! them one at a time. Submitting without `enqueue` replaces whatever is
//! queued or playing, so "play this now" always wins over "finish what's
//! queued".

mod controller;
mod job;

pub use controller::{ActiveJob, Checkpoint, JobController, JobHandle, JobOutcome};
pub use job::{parse_bool, Job, PlaybackRequest, DEFAULT_MAX_TEMP, DEFAULT_MIN_TEMP};
