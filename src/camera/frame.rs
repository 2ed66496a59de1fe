//! Frame type representing a raw sensor image with telemetry.

use rand::Rng;
use std::time::Duration;

/// Flat-field correction state reported in the telemetry status bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FfcState {
    /// No FFC has been performed since power on.
    Never,
    /// An FFC is about to start.
    Imminent,
    /// An FFC is in progress.
    Running,
    /// Any other state (FFC complete, or not reported).
    #[default]
    Unknown,
}

impl FfcState {
    /// Status code as stored in bits 4-5 of the status register.
    pub fn code(self) -> u32 {
        match self {
            FfcState::Never => 0,
            FfcState::Imminent => 1,
            FfcState::Running => 2,
            FfcState::Unknown => 3,
        }
    }

    /// Inverse of [`FfcState::code`]; only the low two bits are considered.
    pub fn from_code(code: u32) -> Self {
        match code & 0b11 {
            0 => FfcState::Never,
            1 => FfcState::Imminent,
            2 => FfcState::Running,
            _ => FfcState::Unknown,
        }
    }
}

/// Per-frame hardware metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Telemetry {
    /// Time since the sensor started streaming.
    pub time_on: Duration,
    /// Calibration state.
    pub ffc_state: FfcState,
    /// Frame counter.
    pub frame_count: u32,
    /// Average pixel value of the frame.
    pub frame_mean: u16,
    /// Focal plane array temperature in degrees Celsius.
    pub temp_c: f64,
    /// FPA temperature at the last FFC, in degrees Celsius.
    pub last_ffc_temp_c: f64,
    /// Time-on value at the last FFC.
    pub last_ffc_time: Duration,
    /// Set on the background frame marking the boundary of a recorded
    /// capture. Never transmitted on the wire.
    pub background_frame: bool,
}

/// Range used to draw synthetic pixel values.
///
/// Values are uniform in `[min, max)`; when `max <= min` every draw
/// returns `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRange {
    pub min: i32,
    pub max: i32,
}

impl PixelRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Draws a single pixel value.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u16 {
        let value = if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..self.max)
        };
        clamp_pixel(value)
    }

    /// Returns true if every draw yields the same value.
    pub fn is_constant(&self) -> bool {
        self.max <= self.min
    }
}

#[inline]
fn clamp_pixel(value: i32) -> u16 {
    value.clamp(0, u16::MAX as i32) as u16
}

/// A single sensor frame.
///
/// Pixels are stored row-major. Sources reuse one `Frame` between reads,
/// so callers must finish with a frame before asking for the next one.
#[derive(Clone, PartialEq)]
pub struct Frame {
    pixels: Vec<u16>,
    width: usize,
    height: usize,
    /// Telemetry accompanying the pixels.
    pub status: Telemetry,
}

impl Frame {
    /// Creates a zeroed frame with the given dimensions.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height],
            width,
            height,
            status: Telemetry::default(),
        }
    }

    /// Creates a frame from existing row-major pixel data.
    pub fn from_pixels(pixels: Vec<u16>, width: usize, height: usize) -> Self {
        Self {
            pixels,
            width,
            height,
            status: Telemetry::default(),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u16] {
        &mut self.pixels
    }

    /// Returns one scanline.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row(&self, y: usize) -> &[u16] {
        let start = y * self.width;
        &self.pixels[start..start + self.width]
    }

    /// Mutable access to one scanline.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u16] {
        let start = y * self.width;
        &mut self.pixels[start..start + self.width]
    }

    /// Pixel at column `x`, row `y`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.pixels[y * self.width + x]
    }

    /// Mean pixel value, rounded down.
    pub fn mean(&self) -> u16 {
        if self.pixels.is_empty() {
            return 0;
        }
        let sum: u64 = self.pixels.iter().map(|&p| p as u64).sum();
        (sum / self.pixels.len() as u64) as u16
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.width * self.height
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frame_count", &self.status.frame_count)
            .field("pixels", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(160, 120);

        assert_eq!(frame.width(), 160);
        assert_eq!(frame.height(), 120);
        assert_eq!(frame.pixels().len(), 160 * 120);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_rows_are_row_major() {
        let pixels: Vec<u16> = (0..12).collect();
        let mut frame = Frame::from_pixels(pixels, 4, 3);

        assert_eq!(frame.row(1), &[4, 5, 6, 7]);
        frame.row_mut(2)[0] = 99;
        assert_eq!(frame.get(0, 2), 99);
    }

    #[test]
    fn test_mean() {
        let frame = Frame::from_pixels(vec![10, 20, 30, 40], 2, 2);
        assert_eq!(frame.mean(), 25);
    }

    #[test]
    fn test_ffc_codes() {
        for state in [
            FfcState::Never,
            FfcState::Imminent,
            FfcState::Running,
            FfcState::Unknown,
        ] {
            assert_eq!(FfcState::from_code(state.code()), state);
        }
        assert_eq!(FfcState::Running.code(), 2);
    }

    #[test]
    fn test_pixel_range_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let range = PixelRange::new(3000, 3010);
        for _ in 0..1000 {
            let v = range.sample(&mut rng);
            assert!((3000..3010).contains(&v));
        }
    }

    #[test]
    fn test_pixel_range_constant_when_inverted() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(PixelRange::new(100, 100).sample(&mut rng), 100);
        assert_eq!(PixelRange::new(100, 50).sample(&mut rng), 100);
        assert!(PixelRange::new(100, 100).is_constant());
    }
}
