//! Per-job frame production.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::{DecoderFactory, FrameSource, GeneratedSource, ReplaySource, SourceError};
use crate::camera::{CameraSpec, FfcState, Frame, PixelRange, Telemetry};
use crate::control::Job;
use crate::hotspot::{paint_all, Hotspot};

/// Drives the source a job selects and finishes each frame: hotspots are
/// painted and telemetry is rewritten to look like a live sensor.
#[derive(Debug)]
pub struct FrameMaker {
    source: FrameSource,
    hotspots: Vec<Hotspot>,
    fps: u32,
    ffc: bool,
    last_ffc: Option<Duration>,
    /// When the sensor started streaming; time-on is measured from here.
    started: Instant,
    rng: ChaCha8Rng,
}

impl FrameMaker {
    /// Builds the source for `job`.
    ///
    /// The frame rate is the job's, else the capture's, else the camera's.
    pub fn new(
        job: &Job,
        camera: &CameraSpec,
        decoders: &Arc<dyn DecoderFactory>,
        started: Instant,
    ) -> Result<Self, SourceError> {
        let source = if job.generate {
            let range = PixelRange::new(job.min_temp, job.max_temp);
            let generated = match job.seed {
                Some(seed) => GeneratedSource::with_seed(camera, range, job.repeat, seed),
                None => GeneratedSource::new(camera, range, job.repeat),
            };
            info!(frames = job.repeat, ?range, "Generating frames");
            FrameSource::Generated(generated)
        } else {
            let name = job.cptv_file.as_deref().ok_or(SourceError::NoCaptureFile)?;
            let replay =
                ReplaySource::open(Arc::clone(decoders), name, job.start, job.end, job.repeat)?;
            let (width, height) = replay.dimensions();
            let (want_x, want_y) = (camera.res_x as usize, camera.res_y as usize);
            if (width, height) != (want_x, want_y) {
                return Err(SourceError::ResolutionMismatch {
                    got_x: width,
                    got_y: height,
                    want_x,
                    want_y,
                });
            }
            info!(
                capture = name,
                start = job.start,
                end = job.end,
                repeat = job.repeat,
                "Replaying capture"
            );
            FrameSource::Replay(replay)
        };

        let mut fps = job.fps;
        if fps == 0 {
            fps = source.fps();
        }
        if fps == 0 {
            fps = camera.fps;
        }

        let rng = match job.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            source,
            hotspots: job.hotspots.clone(),
            fps,
            ffc: job.ffc,
            last_ffc: job.ffc_time,
            started,
            rng,
        })
    }

    /// Frame rate the job should be paced at. Never zero.
    pub fn fps(&self) -> u32 {
        self.fps.max(1)
    }

    /// Interval between frames at [`FrameMaker::fps`].
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.fps() as u64)
    }

    /// Returns the next finished frame, or `None` when the job's frames are
    /// exhausted. The frame is reused by the next call.
    pub fn next_frame(&mut self) -> Result<Option<&mut Frame>, SourceError> {
        let Some(frame) = self.source.next()? else {
            return Ok(None);
        };
        paint_all(&self.hotspots, frame, &mut self.rng);
        apply_status(
            &mut frame.status,
            self.started.elapsed(),
            self.ffc,
            self.last_ffc,
        );
        Ok(Some(frame))
    }

    pub fn close(&mut self) {
        self.source.close();
    }
}

/// Rewrites telemetry as a live sensor would report it.
fn apply_status(status: &mut Telemetry, time_on: Duration, ffc: bool, last_ffc: Option<Duration>) {
    status.time_on = time_on;
    if ffc {
        status.ffc_state = FfcState::Running;
        status.last_ffc_time = time_on;
    }
    if let Some(last) = last_ffc {
        status.last_ffc_time = last;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotspot::Spot;
    use crate::source::testing::MemoryFactory;

    fn camera() -> CameraSpec {
        CameraSpec {
            res_x: 4,
            res_y: 3,
            fps: 27,
            ..CameraSpec::default()
        }
    }

    fn factory(frames: u32) -> Arc<dyn DecoderFactory> {
        MemoryFactory::new(frames)
    }

    #[test]
    fn test_fps_resolution_order() {
        let decoders = factory(3);
        let started = Instant::now();

        let job = Job::replay("a").with_fps(20);
        assert_eq!(FrameMaker::new(&job, &camera(), &decoders, started).unwrap().fps(), 20);

        let job = Job::replay("a");
        assert_eq!(FrameMaker::new(&job, &camera(), &decoders, started).unwrap().fps(), 9);

        let job = Job::generated(1);
        let maker = FrameMaker::new(&job, &camera(), &decoders, started).unwrap();
        assert_eq!(maker.fps(), 27);
        assert_eq!(maker.frame_interval(), Duration::from_millis(37));
    }

    #[test]
    fn test_generated_constant_frames() {
        let job = Job::generated(2).with_temperature(100, 100);
        let mut maker = FrameMaker::new(&job, &camera(), &factory(0), Instant::now()).unwrap();

        let mut count = 0;
        while let Some(frame) = maker.next_frame().unwrap() {
            assert!(frame.pixels().iter().all(|&p| p == 100));
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_hotspots_painted() {
        let hotspot = Hotspot::new(Spot {
            shape_type: "rectangle".into(),
            x: 0,
            y: 0,
            width: 2,
            height: 1,
            min_temp: 9000,
            max_temp: 9000,
        })
        .unwrap();
        let job = Job::generated(1)
            .with_temperature(100, 100)
            .with_hotspots(vec![hotspot]);
        let mut maker = FrameMaker::new(&job, &camera(), &factory(0), Instant::now()).unwrap();

        let frame = maker.next_frame().unwrap().unwrap();
        assert_eq!(frame.row(0), &[9000, 9000, 100, 100]);
        assert!(frame.row(1).iter().all(|&p| p == 100));
    }

    #[test]
    fn test_ffc_overrides() {
        let job = Job::replay("a").with_ffc(true, None);
        let mut maker = FrameMaker::new(&job, &camera(), &factory(2), Instant::now()).unwrap();
        let frame = maker.next_frame().unwrap().unwrap();
        assert_eq!(frame.status.ffc_state, FfcState::Running);
        assert_eq!(frame.status.last_ffc_time, frame.status.time_on);

        let job = Job::replay("a").with_ffc(true, Some(Duration::from_secs(60)));
        let mut maker = FrameMaker::new(&job, &camera(), &factory(2), Instant::now()).unwrap();
        let frame = maker.next_frame().unwrap().unwrap();
        assert_eq!(frame.status.last_ffc_time, Duration::from_secs(60));
    }

    #[test]
    fn test_time_on_measured_from_start() {
        let started = Instant::now() - Duration::from_secs(5);
        let mut maker =
            FrameMaker::new(&Job::generated(1), &camera(), &factory(0), started).unwrap();

        let frame = maker.next_frame().unwrap().unwrap();
        assert!(frame.status.time_on >= Duration::from_secs(5));
    }

    #[test]
    fn test_capture_must_match_camera() {
        let job = Job::replay("a");
        let wide = CameraSpec {
            res_x: 8,
            ..camera()
        };
        assert!(matches!(
            FrameMaker::new(&job, &wide, &factory(1), Instant::now()),
            Err(SourceError::ResolutionMismatch { got_x: 4, want_x: 8, .. })
        ));
    }

    #[test]
    fn test_replay_without_file_fails() {
        let job = Job::default();
        assert!(matches!(
            FrameMaker::new(&job, &camera(), &factory(1), Instant::now()),
            Err(SourceError::NoCaptureFile)
        ));
    }

    #[test]
    fn test_missing_capture_fails() {
        let job = Job::replay("missing");
        assert!(matches!(
            FrameMaker::new(&job, &camera(), &factory(1), Instant::now()),
            Err(SourceError::NotFound(_))
        ));
    }
}
