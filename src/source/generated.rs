//! Synthetic frames of uniform random noise.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::camera::{CameraSpec, Frame, PixelRange};

/// Produces a fixed number of frames with every pixel drawn from a range.
pub struct GeneratedSource {
    frame: Frame,
    range: PixelRange,
    frames: u32,
    generated: u32,
    rng: ChaCha8Rng,
}

impl GeneratedSource {
    /// Creates a source seeded from OS entropy.
    pub fn new(camera: &CameraSpec, range: PixelRange, frames: u32) -> Self {
        Self::with_rng(camera, range, frames, ChaCha8Rng::from_entropy())
    }

    /// Creates a reproducible source.
    pub fn with_seed(camera: &CameraSpec, range: PixelRange, frames: u32, seed: u64) -> Self {
        Self::with_rng(camera, range, frames, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(camera: &CameraSpec, range: PixelRange, frames: u32, rng: ChaCha8Rng) -> Self {
        Self {
            frame: Frame::new(camera.res_x as usize, camera.res_y as usize),
            range,
            frames,
            generated: 0,
            rng,
        }
    }

    /// Fills and returns the next frame, or `None` once all frames have
    /// been produced.
    pub fn next(&mut self) -> Option<&mut Frame> {
        if self.generated >= self.frames {
            return None;
        }
        self.fill();
        self.generated += 1;
        self.frame.status.frame_count = self.generated;
        self.frame.status.frame_mean = self.frame.mean();
        Some(&mut self.frame)
    }

    fn fill(&mut self) {
        if self.range.is_constant() {
            let value = self.range.sample(&mut self.rng);
            self.frame.pixels_mut().fill(value);
            return;
        }
        let range = self.range;
        for pixel in self.frame.pixels_mut() {
            *pixel = range.sample(&mut self.rng);
        }
    }

    pub fn generated(&self) -> u32 {
        self.generated
    }

    pub fn remaining(&self) -> u32 {
        self.frames - self.generated
    }
}

impl std::fmt::Debug for GeneratedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedSource")
            .field("range", &self.range)
            .field("frames", &self.frames)
            .field("generated", &self.generated)
            .finish()
    }
}
