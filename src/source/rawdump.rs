//! Raw frame dumps.
//!
//! A dump is exactly what the recorder receives on the socket: the YAML
//! handshake, a blank line, then fixed-size wire frames back to back.
//! Capturing the socket stream to a file therefore yields a replayable
//! capture.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use tracing::debug;

use super::{DecodeError, DecoderFactory, FrameDecoder, SourceError};
use crate::camera::{CameraSpec, Frame, Handshake};
use crate::telemetry::{decode_frame, encode_frame};

/// Reads frames from a raw dump.
pub struct RawDumpDecoder<R> {
    reader: R,
    camera: CameraSpec,
    buffer: Vec<u8>,
}

impl RawDumpDecoder<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

/// Largest frame a dump may declare. A Lepton frame is under 40 KiB.
pub const MAX_FRAME_BYTES: usize = 16 << 20;

const MAX_HEADER_BYTES: usize = 4096;

impl<R: BufRead> RawDumpDecoder<R> {
    /// Reads the handshake header, leaving `reader` at the first frame.
    pub fn new(mut reader: R) -> Result<Self, DecodeError> {
        let camera = read_header(&mut reader)?;
        Ok(Self::with_camera(reader, camera))
    }

    /// Like [`RawDumpDecoder::new`], but rejects a dump whose resolution
    /// differs from `expected` before any frame buffer is allocated.
    pub fn expecting(mut reader: R, expected: &CameraSpec) -> Result<Self, DecodeError> {
        let camera = read_header(&mut reader)?;
        if (camera.res_x, camera.res_y) != (expected.res_x, expected.res_y) {
            return Err(DecodeError::Header(format!(
                "capture is {}x{}, camera is {}x{}",
                camera.res_x, camera.res_y, expected.res_x, expected.res_y
            )));
        }
        Ok(Self::with_camera(reader, camera))
    }

    fn with_camera(reader: R, camera: CameraSpec) -> Self {
        debug!(?camera, "Opened raw dump");
        Self {
            reader,
            buffer: vec![0; camera.frame_size()],
            camera,
        }
    }

    /// Geometry recorded in the dump header.
    pub fn camera(&self) -> &CameraSpec {
        &self.camera
    }

    /// Fills the frame buffer. Returns the number of bytes read, which is
    /// short only at end of file.
    fn fill_buffer(&mut self) -> Result<usize, DecodeError> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: BufRead + Send> FrameDecoder for RawDumpDecoder<R> {
    fn read_frame(&mut self, frame: &mut Frame) -> Result<bool, DecodeError> {
        let got = self.fill_buffer()?;
        if got == 0 {
            return Ok(false);
        }
        if got < self.buffer.len() {
            return Err(DecodeError::Truncated {
                got,
                expected: self.buffer.len(),
            });
        }
        decode_frame(&self.buffer, frame)?;
        Ok(true)
    }

    fn fps(&self) -> u32 {
        self.camera.fps
    }

    fn empty_frame(&self) -> Frame {
        Frame::new(self.camera.res_x as usize, self.camera.res_y as usize)
    }
}

/// Parses the header up to the blank line. The declared frame size must
/// agree with the resolution and stay under [`MAX_FRAME_BYTES`].
fn read_header<R: BufRead>(reader: &mut R) -> Result<CameraSpec, DecodeError> {
    let mut header = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(DecodeError::Header("missing blank line after header".into()));
        }
        if line.trim().is_empty() {
            break;
        }
        header.push_str(&line);
        if header.len() > MAX_HEADER_BYTES {
            return Err(DecodeError::Header("header too long".into()));
        }
    }

    let handshake =
        Handshake::from_text(&header).map_err(|e| DecodeError::Header(e.to_string()))?;
    let camera = handshake.camera();
    if handshake.frame_size != camera.frame_size() {
        return Err(DecodeError::Header(format!(
            "frame size {} does not match {}x{} resolution",
            handshake.frame_size, camera.res_x, camera.res_y
        )));
    }
    if camera.frame_size() > MAX_FRAME_BYTES {
        return Err(DecodeError::Header(format!(
            "frame size {} exceeds {} bytes",
            camera.frame_size(),
            MAX_FRAME_BYTES
        )));
    }
    Ok(camera)
}

/// Opens raw dumps relative to a capture directory.
#[derive(Debug, Clone)]
pub struct RawDumpFactory {
    dir: PathBuf,
    expected: Option<CameraSpec>,
}

impl RawDumpFactory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            expected: None,
        }
    }

    /// Only accept dumps recorded at `camera`'s resolution.
    pub fn expecting(mut self, camera: CameraSpec) -> Self {
        self.expected = Some(camera);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DecoderFactory for RawDumpFactory {
    fn open(&self, name: &str) -> Result<Box<dyn FrameDecoder>, SourceError> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(SourceError::NotFound(path));
        }
        let reader = BufReader::new(File::open(&path).map_err(DecodeError::from)?);
        let decoder = match &self.expected {
            Some(camera) => RawDumpDecoder::expecting(reader, camera)?,
            None => RawDumpDecoder::new(reader)?,
        };
        Ok(Box::new(decoder))
    }
}

/// Writes a raw dump.
pub struct RawDumpWriter<W: Write> {
    out: W,
    buffer: BytesMut,
    frames: u32,
}

impl<W: Write> RawDumpWriter<W> {
    /// Writes the header for `camera`.
    pub fn new(mut out: W, camera: &CameraSpec) -> Result<Self, DecodeError> {
        let header = camera
            .handshake()
            .to_text()
            .map_err(|e| DecodeError::Header(e.to_string()))?;
        out.write_all(header.as_bytes())?;
        Ok(Self {
            out,
            buffer: BytesMut::with_capacity(camera.frame_size()),
            frames: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), DecodeError> {
        self.buffer.clear();
        encode_frame(frame, &mut self.buffer);
        self.out.write_all(&self.buffer)?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W, DecodeError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn small_camera() -> CameraSpec {
        CameraSpec {
            res_x: 4,
            res_y: 2,
            ..CameraSpec::default()
        }
    }

    fn dump(frames: u16) -> Vec<u8> {
        let camera = small_camera();
        let mut writer = RawDumpWriter::new(Vec::new(), &camera).unwrap();
        for i in 0..frames {
            let mut frame = Frame::from_pixels(vec![i; 8], 4, 2);
            frame.status.frame_count = i as u32;
            frame.status.time_on = Duration::from_millis(i as u64 * 111);
            writer.write_frame(&frame).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_reads_back_written_frames() {
        let mut decoder = RawDumpDecoder::new(Cursor::new(dump(3))).unwrap();
        assert_eq!(decoder.camera(), &small_camera());
        assert_eq!(decoder.fps(), 9);

        let mut frame = decoder.empty_frame();
        for i in 0..3u16 {
            assert!(decoder.read_frame(&mut frame).unwrap());
            assert!(frame.pixels().iter().all(|&p| p == i));
            assert_eq!(frame.status.frame_count, i as u32);
            assert_eq!(frame.status.time_on, Duration::from_millis(i as u64 * 111));
        }
        assert!(!decoder.read_frame(&mut frame).unwrap());
    }

    #[test]
    fn test_truncated_frame() {
        let mut bytes = dump(2);
        bytes.truncate(bytes.len() - 3);
        let mut decoder = RawDumpDecoder::new(Cursor::new(bytes)).unwrap();
        let mut frame = decoder.empty_frame();

        assert!(decoder.read_frame(&mut frame).unwrap());
        assert!(matches!(
            decoder.read_frame(&mut frame),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            RawDumpDecoder::new(Cursor::new(b"ResX: 4\n".to_vec())),
            Err(DecodeError::Header(_))
        ));
        assert!(matches!(
            RawDumpDecoder::new(Cursor::new(b"nonsense: [\n\n".to_vec())),
            Err(DecodeError::Header(_))
        ));
    }

    #[test]
    fn test_factory_resolves_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.raw"), dump(2)).unwrap();
        let factory = RawDumpFactory::new(dir.path());

        let mut decoder = factory.open("clip.raw").unwrap();
        let mut frame = decoder.empty_frame();
        assert!(decoder.read_frame(&mut frame).unwrap());

        assert!(matches!(
            factory.open("absent.raw"),
            Err(SourceError::NotFound(_))
        ));
    }

    fn header(res_x: u64, res_y: u64) -> Vec<u8> {
        format!(
            "Brand: flir\nFPS: 9\nFrameSize: {}\nModel: lepton3.5\nResX: {}\nResY: {}\n\n",
            640 + res_x * res_y * 2,
            res_x,
            res_y
        )
        .into_bytes()
    }

    #[test]
    fn test_oversized_frame_rejected() {
        assert!(matches!(
            RawDumpDecoder::new(Cursor::new(header(100_000, 100_000))),
            Err(DecodeError::Header(_))
        ));
    }

    #[test]
    fn test_expected_resolution_checked_before_reading_frames() {
        let camera = small_camera();
        assert!(RawDumpDecoder::expecting(Cursor::new(dump(1)), &camera).is_ok());
        assert!(matches!(
            RawDumpDecoder::expecting(Cursor::new(header(160, 120)), &camera),
            Err(DecodeError::Header(_))
        ));
    }

    #[test]
    fn test_factory_rejects_other_resolution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.raw"), header(8_000, 8_000)).unwrap();
        std::fs::write(dir.path().join("clip.raw"), dump(1)).unwrap();
        let factory = RawDumpFactory::new(dir.path()).expecting(small_camera());

        assert!(matches!(
            factory.open("big.raw"),
            Err(SourceError::Decode(DecodeError::Header(_)))
        ));
        assert!(factory.open("clip.raw").is_ok());
    }

    #[test]
    fn test_endless_header_rejected() {
        let bytes = "Model: lepton\n".repeat(1000).into_bytes();
        assert!(matches!(
            RawDumpDecoder::new(Cursor::new(bytes)),
            Err(DecodeError::Header(_))
        ));
    }
}
