//! Reconnecting, rate-paced frame writer.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, info, warn};

use super::{ConnectionState, StreamError};
use crate::camera::{CameraSpec, StreamConfig};
use crate::control::{ActiveJob, Checkpoint, JobController, JobOutcome};
use crate::metrics::StreamMetrics;
use crate::source::{DecoderFactory, FrameMaker};
use crate::telemetry::encode_frame;

/// Where to connect and how long to wait between failed dials.
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    pub socket_path: PathBuf,
    pub reconnect_backoff: Duration,
}

impl From<&StreamConfig> for StreamerConfig {
    fn from(config: &StreamConfig) -> Self {
        Self {
            socket_path: config.socket_path.clone(),
            reconnect_backoff: config.reconnect_backoff(),
        }
    }
}

/// Owns the output connection and streams jobs taken from the controller.
///
/// ```text
/// Disconnected --dial ok--> Connected --handshake--> Streaming
///      ^   |                                            |
///      |   +--dial failed: backoff, retry               |
///      +-------------------- write failed --------------+
/// ```
pub struct Streamer {
    config: StreamerConfig,
    camera: CameraSpec,
    controller: Arc<JobController>,
    decoders: Arc<dyn DecoderFactory>,
    metrics: StreamMetrics,
    /// Sensor power-on time; telemetry time-on counts from here.
    started: Instant,
    /// Frame counter carried across jobs and connections.
    frame_counter: u32,
    state: ConnectionState,
}

impl Streamer {
    pub fn new(
        config: StreamerConfig,
        camera: CameraSpec,
        controller: Arc<JobController>,
        decoders: Arc<dyn DecoderFactory>,
        metrics: StreamMetrics,
    ) -> Self {
        Self {
            config,
            camera,
            controller,
            decoders,
            metrics,
            started: Instant::now(),
            frame_counter: 0,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Frames emitted since the streamer was created.
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    /// Dials, streams and redials until the controller shuts down.
    pub fn run(&mut self) {
        info!(socket = %self.config.socket_path.display(), "Streamer started");
        while !self.controller.is_shutdown() {
            debug!(socket = %self.config.socket_path.display(), "Dialing frame output socket");
            let mut conn = match UnixStream::connect(&self.config.socket_path) {
                Ok(conn) => conn,
                Err(e) => {
                    self.metrics.connection_failed();
                    warn!(
                        error = %e,
                        retry_in = ?self.config.reconnect_backoff,
                        "Could not connect to frame output socket"
                    );
                    self.controller
                        .sleep_unless_shutdown(self.config.reconnect_backoff);
                    continue;
                }
            };

            self.set_state(ConnectionState::Connected);
            match self.serve(&mut conn) {
                Ok(()) => break,
                Err(e) => {
                    warn!(error = %e, "Disconnected");
                    self.metrics.disconnected();
                    self.set_state(ConnectionState::Disconnected);
                }
            }
        }
        self.set_state(ConnectionState::Disconnected);
        info!("Streamer stopped");
    }

    /// Sends the handshake, then streams jobs until shutdown. Returns an
    /// error when the output fails; the caller reconnects.
    pub fn serve<W: Write>(&mut self, out: &mut W) -> Result<(), StreamError> {
        self.send_handshake(out)?;
        self.set_state(ConnectionState::Streaming);
        info!("Listening for jobs");

        while let Some(active) = self.controller.take() {
            self.metrics.set_queue_depth(self.controller.len());
            self.stream_job(out, active)?;
        }
        Ok(())
    }

    fn send_handshake<W: Write>(&self, out: &mut W) -> Result<(), StreamError> {
        let header = self.camera.handshake().to_text()?;
        out.write_all(header.as_bytes()).map_err(StreamError::Write)?;
        out.flush().map_err(StreamError::Write)?;
        debug!(frame_size = self.camera.frame_size(), "Handshake sent");
        Ok(())
    }

    /// Streams one job to completion, stop or failure. Only output errors
    /// are returned; job failures are reported to the submitter.
    fn stream_job<W: Write>(&mut self, out: &mut W, active: ActiveJob) -> Result<(), StreamError> {
        if self.controller.is_stopped(&active) {
            self.metrics.job_stopped();
            active.finish(JobOutcome::Stopped { frames: 0 });
            return Ok(());
        }

        let mut maker = match FrameMaker::new(active.job(), &self.camera, &self.decoders, self.started)
        {
            Ok(maker) => maker,
            Err(e) => {
                warn!(job = active.id(), error = %e, "Could not start job");
                self.metrics.job_failed();
                active.finish(JobOutcome::Failed(e.to_string()));
                return Ok(());
            }
        };

        let interval = maker.frame_interval();
        info!(job = active.id(), fps = maker.fps(), "Streaming job");
        let mut buffer = BytesMut::with_capacity(self.camera.frame_size());
        let mut frames = 0u64;

        let outcome = loop {
            if self.controller.checkpoint(&active) == Checkpoint::Stop {
                break JobOutcome::Stopped { frames };
            }

            let frame = match maker.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break JobOutcome::Completed { frames },
                Err(e) => {
                    warn!(job = active.id(), error = %e, "Frame source failed");
                    break JobOutcome::Failed(e.to_string());
                }
            };

            self.frame_counter = self.frame_counter.wrapping_add(1);
            frame.status.frame_count = self.frame_counter;
            buffer.clear();
            encode_frame(frame, &mut buffer);

            thread::sleep(interval);
            if let Err(e) = out.write_all(&buffer) {
                maker.close();
                self.metrics.job_abandoned();
                active.finish(JobOutcome::Abandoned { frames });
                return Err(StreamError::Write(e));
            }
            frames += 1;
            self.metrics.frame_sent();
        };

        maker.close();
        match &outcome {
            JobOutcome::Completed { .. } => self.metrics.job_completed(),
            JobOutcome::Stopped { .. } => self.metrics.job_stopped(),
            JobOutcome::Failed(_) => self.metrics.job_failed(),
            JobOutcome::Discarded | JobOutcome::Abandoned { .. } => {}
        }
        info!(job = active.id(), ?outcome, "Job ended");
        active.finish(outcome);
        Ok(())
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Connection state");
        }
        self.state = state;
        self.metrics.set_connected(state != ConnectionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Handshake, TELEMETRY_HEADER_BYTES};
    use crate::control::Job;
    use crate::source::testing::MemoryFactory;
    use crate::telemetry::decode_telemetry;
    use std::io;

    fn camera() -> CameraSpec {
        CameraSpec {
            res_x: 4,
            res_y: 3,
            fps: 100,
            ..CameraSpec::default()
        }
    }

    fn streamer(controller: &Arc<JobController>, frames: u32) -> Streamer {
        Streamer::new(
            StreamerConfig {
                socket_path: PathBuf::from("/nonexistent/socket"),
                reconnect_backoff: Duration::from_millis(10),
            },
            camera(),
            Arc::clone(controller),
            MemoryFactory::new(frames),
            StreamMetrics::new().unwrap(),
        )
    }

    /// Splits output into the handshake text and the frames after it.
    fn split_output(bytes: &[u8]) -> (Handshake, Vec<&[u8]>) {
        let end = bytes
            .windows(2)
            .position(|w| w == b"\n\n")
            .expect("handshake terminator");
        let handshake = Handshake::from_text(std::str::from_utf8(&bytes[..end + 1]).unwrap())
            .unwrap();
        let frames = bytes[end + 2..].chunks(handshake.frame_size).collect();
        (handshake, frames)
    }

    /// Writer that fails after accepting `limit` writes.
    struct FailingWriter {
        writes: usize,
        limit: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.writes >= self.limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "recorder went away"));
            }
            self.writes += 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_streams_replay_job() {
        let controller = Arc::new(JobController::new());
        let handle = controller.submit(Job::replay("clip")
            .with_range(5, 10)
            .with_repeat(2)
            .with_fps(500));
        controller.submit(Job::generated(1).enqueued());
        let mut streamer = streamer(&controller, 20);

        let mut out = Vec::new();
        let active = controller.take().unwrap();
        streamer.send_handshake(&mut out).unwrap();
        streamer.stream_job(&mut out, active).unwrap();

        assert_eq!(handle.wait(), JobOutcome::Completed { frames: 12 });
        let (handshake, frames) = split_output(&out);
        assert_eq!(handshake.camera(), camera());
        assert_eq!(frames.len(), 12);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.len(), camera().frame_size());
            let telemetry = decode_telemetry(frame).unwrap();
            assert_eq!(telemetry.frame_count, i as u32 + 1);
            let pixel = u16::from_be_bytes([
                frame[TELEMETRY_HEADER_BYTES],
                frame[TELEMETRY_HEADER_BYTES + 1],
            ]);
            assert_eq!(pixel as usize, 5 + i % 6);
        }
        assert_eq!(streamer.frame_counter(), 12);
        assert_eq!(streamer.metrics.frames_sent(), 12);
    }

    #[test]
    fn test_generated_constant_job() {
        let controller = Arc::new(JobController::new());
        let handle = controller.submit(Job::generated(3).with_temperature(100, 100));
        let mut streamer = streamer(&controller, 0);

        let mut out = Vec::new();
        let active = controller.take().unwrap();
        streamer.stream_job(&mut out, active).unwrap();

        assert_eq!(handle.wait(), JobOutcome::Completed { frames: 3 });
        let frame_size = camera().frame_size();
        assert_eq!(out.len(), frame_size * 3);
        for frame in out.chunks(frame_size) {
            for pixel in frame[TELEMETRY_HEADER_BYTES..].chunks(2) {
                assert_eq!(u16::from_be_bytes([pixel[0], pixel[1]]), 100);
            }
        }
    }

    #[test]
    fn test_missing_capture_fails_job_and_continues() {
        let controller = Arc::new(JobController::new());
        let failed = controller.submit(Job::replay("missing"));
        let next = controller.submit(Job::generated(1).enqueued());
        let mut streamer = streamer(&controller, 5);

        let mut out = Vec::new();
        for _ in 0..2 {
            let active = controller.take().unwrap();
            streamer.stream_job(&mut out, active).unwrap();
        }

        assert!(matches!(failed.wait(), JobOutcome::Failed(reason) if reason.contains("missing")));
        assert_eq!(next.wait(), JobOutcome::Completed { frames: 1 });
    }

    #[test]
    fn test_write_failure_abandons_job() {
        let controller = Arc::new(JobController::new());
        let handle = controller.submit(Job::generated(10));
        let mut streamer = streamer(&controller, 0);

        let mut out = FailingWriter {
            writes: 0,
            limit: 2,
        };
        let active = controller.take().unwrap();
        let result = streamer.stream_job(&mut out, active);

        assert!(matches!(result, Err(StreamError::Write(_))));
        assert_eq!(handle.wait(), JobOutcome::Abandoned { frames: 2 });
    }

    #[test]
    fn test_stopped_job_emits_nothing() {
        let controller = Arc::new(JobController::new());
        let handle = controller.submit(Job::generated(5));
        let mut streamer = streamer(&controller, 0);

        let active = controller.take().unwrap();
        controller.stop();
        let mut out = Vec::new();
        streamer.stream_job(&mut out, active).unwrap();

        assert!(out.is_empty());
        assert_eq!(handle.wait(), JobOutcome::Stopped { frames: 0 });
    }

    #[test]
    fn test_serve_returns_after_shutdown() {
        let controller = Arc::new(JobController::new());
        controller.submit(Job::generated(2));
        let mut streamer = streamer(&controller, 0);

        let stopper = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                controller.shutdown();
            })
        };
        let mut out = Vec::new();
        streamer.serve(&mut out).unwrap();
        stopper.join().unwrap();

        let (_, frames) = split_output(&out);
        assert_eq!(frames.len(), 2);
        assert_eq!(streamer.state(), ConnectionState::Streaming);
    }

    #[test]
    fn test_run_retries_until_shutdown() {
        let controller = Arc::new(JobController::new());
        let metrics = StreamMetrics::new().unwrap();
        let mut streamer = Streamer::new(
            StreamerConfig {
                socket_path: PathBuf::from("/nonexistent/dir/socket"),
                reconnect_backoff: Duration::from_millis(10),
            },
            camera(),
            Arc::clone(&controller),
            MemoryFactory::new(0),
            metrics.clone(),
        );

        let runner = thread::spawn(move || {
            streamer.run();
            streamer.state()
        });
        thread::sleep(Duration::from_millis(60));
        controller.shutdown();

        assert_eq!(runner.join().unwrap(), ConnectionState::Disconnected);
        let output = metrics.encode().unwrap();
        assert!(!output.contains("fake_lepton_connection_failures_total 0"));
    }
}
