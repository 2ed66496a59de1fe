//! Streaming jobs and playback requests.
//!
//! Both arrive as loose string parameters from the control surface. Parsing
//! is permissive: a missing or unparseable value falls back to its default
//! rather than rejecting the request.

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use crate::hotspot::{parse_hotspots, Hotspot};

/// Default synthetic temperature range (raw sensor counts).
pub const DEFAULT_MIN_TEMP: i32 = 3000;
pub const DEFAULT_MAX_TEMP: i32 = 4000;

/// One streaming request: replay a capture or generate frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Capture to replay, relative to the capture directory.
    pub cptv_file: Option<String>,
    /// Generate synthetic frames instead of replaying.
    pub generate: bool,
    /// Frames to generate, or times to play the capture. At least 1.
    pub repeat: u32,
    /// First frame of the capture to stream.
    pub start: u32,
    /// Last frame of the capture to stream; 0 streams to the end.
    pub end: u32,
    /// Target frame rate; 0 uses the source's rate.
    pub fps: u32,
    /// Synthetic pixel range.
    pub min_temp: i32,
    pub max_temp: i32,
    /// Report an FFC in progress on every frame.
    pub ffc: bool,
    /// Fixed "time of last FFC" to report.
    pub ffc_time: Option<Duration>,
    /// Append behind queued jobs instead of replacing them.
    pub enqueue: bool,
    pub hotspots: Vec<Hotspot>,
    /// Fixed RNG seed for synthetic pixels.
    pub seed: Option<u64>,
}

impl Default for Job {
    fn default() -> Self {
        Self {
            cptv_file: None,
            generate: false,
            repeat: 1,
            start: 0,
            end: 0,
            fps: 0,
            min_temp: DEFAULT_MIN_TEMP,
            max_temp: DEFAULT_MAX_TEMP,
            ffc: false,
            ffc_time: None,
            enqueue: false,
            hotspots: Vec::new(),
            seed: None,
        }
    }
}

impl Job {
    /// Replays `file` once.
    pub fn replay(file: impl Into<String>) -> Self {
        Self {
            cptv_file: Some(file.into()),
            ..Self::default()
        }
    }

    /// Generates `frames` synthetic frames.
    pub fn generated(frames: u32) -> Self {
        Self {
            generate: true,
            repeat: frames.max(1),
            ..Self::default()
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat.max(1);
        self
    }

    pub fn with_range(mut self, start: u32, end: u32) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_temperature(mut self, min: i32, max: i32) -> Self {
        self.min_temp = min;
        self.max_temp = max;
        self
    }

    pub fn with_hotspots(mut self, hotspots: Vec<Hotspot>) -> Self {
        self.hotspots = hotspots;
        self
    }

    pub fn with_ffc(mut self, ffc: bool, ffc_time: Option<Duration>) -> Self {
        self.ffc = ffc;
        self.ffc_time = ffc_time;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Marks the job to wait behind anything already queued.
    pub fn enqueued(mut self) -> Self {
        self.enqueue = true;
        self
    }

    /// Builds a job from request parameters (`cptv-file`, `generate`,
    /// `repeat`, `minTemp`, `maxTemp`, `fps`, `ffc`, `ffc-time`, `start`,
    /// `end`, `enqueue`, `hotspots`).
    ///
    /// A malformed hotspot payload is logged and the job proceeds without
    /// hotspots.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let hotspots = match params.get("hotspots").map(|s| s.trim()) {
            Some(raw) if !raw.is_empty() => parse_hotspots(raw).unwrap_or_else(|e| {
                warn!(error = %e, "Could not parse hotspots, continuing without them");
                Vec::new()
            }),
            _ => Vec::new(),
        };

        Self {
            cptv_file: params
                .get("cptv-file")
                .filter(|f| !f.is_empty())
                .cloned(),
            generate: param_bool(params, "generate"),
            repeat: param_num(params, "repeat").unwrap_or(1).max(1),
            start: param_num(params, "start").unwrap_or(0),
            end: param_num(params, "end").unwrap_or(0),
            fps: param_num(params, "fps").unwrap_or(0),
            min_temp: param_num(params, "minTemp").unwrap_or(defaults.min_temp),
            max_temp: param_num(params, "maxTemp").unwrap_or(defaults.max_temp),
            ffc: param_bool(params, "ffc"),
            ffc_time: param_num::<u64>(params, "ffc-time").map(Duration::from_secs),
            enqueue: param_bool(params, "enqueue"),
            hotspots,
            seed: param_num(params, "seed"),
        }
    }
}

/// Playback control flags, applied in priority order
/// `clear` > `stop` > `pause` > `play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackRequest {
    pub stop: bool,
    pub clear: bool,
    pub pause: bool,
    pub play: bool,
}

impl PlaybackRequest {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            stop: param_bool(params, "stop"),
            clear: param_bool(params, "clear"),
            pause: param_bool(params, "pause"),
            play: param_bool(params, "play"),
        }
    }
}

/// Accepts the usual spellings of true: `1`, `t`, `T`, `true`, `TRUE`,
/// `True`. Everything else is false.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn param_bool(params: &HashMap<String, String>, key: &str) -> bool {
    params
        .get(key)
        .and_then(|v| parse_bool(v.trim()))
        .unwrap_or(false)
}

fn param_num<T: std::str::FromStr>(params: &HashMap<String, String>, key: &str) -> Option<T> {
    params.get(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let job = Job::from_params(&HashMap::new());

        assert_eq!(job, Job::default());
        assert_eq!(job.repeat, 1);
        assert_eq!(job.min_temp, DEFAULT_MIN_TEMP);
        assert_eq!(job.max_temp, DEFAULT_MAX_TEMP);
        assert!(job.ffc_time.is_none());
    }

    #[test]
    fn test_full_params() {
        let job = Job::from_params(&params(&[
            ("cptv-file", "person.cptv"),
            ("repeat", "3"),
            ("start", "5"),
            ("end", "10"),
            ("fps", "20"),
            ("minTemp", "100"),
            ("maxTemp", "200"),
            ("ffc", "true"),
            ("ffc-time", "60"),
            ("enqueue", "1"),
            ("hotspots", r#"[{"shapeType":"circle","x":1,"y":1,"width":4,"height":4,"minTemp":9,"maxTemp":9}]"#),
        ]));

        assert_eq!(job.cptv_file.as_deref(), Some("person.cptv"));
        assert!(!job.generate);
        assert_eq!(job.repeat, 3);
        assert_eq!((job.start, job.end), (5, 10));
        assert_eq!(job.fps, 20);
        assert_eq!((job.min_temp, job.max_temp), (100, 200));
        assert!(job.ffc);
        assert_eq!(job.ffc_time, Some(Duration::from_secs(60)));
        assert!(job.enqueue);
        assert_eq!(job.hotspots.len(), 1);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let job = Job::from_params(&params(&[
            ("repeat", "0"),
            ("fps", "fast"),
            ("generate", "yes"),
            ("ffc-time", "-5"),
        ]));

        assert_eq!(job.repeat, 1);
        assert_eq!(job.fps, 0);
        assert!(!job.generate);
        assert!(job.ffc_time.is_none());
    }

    #[test]
    fn test_malformed_hotspots_dropped() {
        let job = Job::from_params(&params(&[("generate", "true"), ("hotspots", "[{")]));

        assert!(job.generate);
        assert!(job.hotspots.is_empty());
    }

    #[test]
    fn test_playback_request() {
        let request = PlaybackRequest::from_params(&params(&[("clear", "true"), ("stop", "t")]));
        assert!(request.clear && request.stop);
        assert!(!request.pause && !request.play);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("F"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
