//! Replay of a recorded capture with start/end offsets and looping.

use std::sync::Arc;

use tracing::debug;

use super::{DecoderFactory, FrameDecoder, SourceError};
use crate::camera::Frame;

/// Streams frames `start..=end` of a capture, `repeat` times.
///
/// Looping reopens the capture through the factory and skips back to
/// `start`, so consecutive passes are seamless.
pub struct ReplaySource {
    factory: Arc<dyn DecoderFactory>,
    name: String,
    decoder: Box<dyn FrameDecoder>,
    frame: Frame,
    /// Index of the next frame the decoder will produce.
    frame_num: u32,
    start: u32,
    /// Last frame index to stream; 0 means until the end of the capture.
    end: u32,
    repeat: u32,
    played: u32,
}

impl ReplaySource {
    /// Opens `name` and skips to `start`.
    ///
    /// Fails if the capture cannot be opened or has no more than `start`
    /// frames.
    pub fn open(
        factory: Arc<dyn DecoderFactory>,
        name: &str,
        start: u32,
        end: u32,
        repeat: u32,
    ) -> Result<Self, SourceError> {
        let decoder = factory.open(name)?;
        let frame = decoder.empty_frame();
        let mut source = Self {
            factory,
            name: name.to_string(),
            decoder,
            frame,
            frame_num: 0,
            start,
            end,
            repeat: repeat.max(1),
            played: 0,
        };
        source.skip_to_start()?;
        Ok(source)
    }

    fn skip_to_start(&mut self) -> Result<(), SourceError> {
        while self.frame_num < self.start {
            if !self.decoder.read_frame(&mut self.frame)? {
                return Err(SourceError::ShortCapture {
                    start: self.start,
                    frames: self.frame_num,
                });
            }
            self.frame_num += 1;
        }
        Ok(())
    }

    fn reopen(&mut self) -> Result<(), SourceError> {
        debug!(capture = %self.name, pass = self.played + 1, "Replaying capture again");
        self.decoder = self.factory.open(&self.name)?;
        self.frame_num = 0;
        self.skip_to_start()
    }

    fn past_end(&self) -> bool {
        self.end != 0 && self.frame_num > self.end
    }

    /// Decodes the next frame, looping if passes remain.
    pub fn next(&mut self) -> Result<Option<&mut Frame>, SourceError> {
        loop {
            let decoded = if self.past_end() {
                false
            } else {
                self.decoder.read_frame(&mut self.frame)?
            };
            if decoded {
                self.frame_num += 1;
                return Ok(Some(&mut self.frame));
            }

            self.played += 1;
            if self.played >= self.repeat {
                return Ok(None);
            }
            self.reopen()?;
        }
    }

    /// Index of the frame most recently returned by [`ReplaySource::next`].
    pub fn frame_index(&self) -> Option<u32> {
        self.frame_num.checked_sub(1)
    }

    /// Width and height of the capture's frames.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.frame.width(), self.frame.height())
    }

    pub fn fps(&self) -> u32 {
        self.decoder.fps()
    }

    /// Completed passes over the capture.
    pub fn passes(&self) -> u32 {
        self.played
    }

    pub fn close(&mut self) {
        debug!(capture = %self.name, "Closing capture");
    }
}

impl std::fmt::Debug for ReplaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySource")
            .field("name", &self.name)
            .field("frame_num", &self.frame_num)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("repeat", &self.repeat)
            .field("played", &self.played)
            .finish()
    }
}
