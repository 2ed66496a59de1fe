//! Lepton telemetry register image.
//!
//! The sensor reports telemetry as 16-bit big-endian words. Values wider
//! than 16 bits span consecutive words with the least significant word
//! first. Word offsets are noted next to each field.

use bytes::{Buf, BufMut};
use std::time::Duration;
use thiserror::Error;

use crate::camera::{FfcState, Frame, Telemetry, TELEMETRY_HEADER_BYTES};

/// Size of the telemetry words at the start of each frame.
pub const TELEMETRY_WORDS_BYTES: usize = 64;

/// Zero padding between the telemetry words and the pixel data.
pub const TELEMETRY_PADDING_BYTES: usize = TELEMETRY_HEADER_BYTES - TELEMETRY_WORDS_BYTES;

/// 0 °C in centi-Kelvin.
pub const ZERO_CELSIUS_CENTI_K: f64 = 27315.0;

const STATUS_FFC_STATE_SHIFT: u32 = 4;

/// Errors decoding a telemetry block or frame.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry block too short: got {got} bytes, need {need}")]
    TooShort { got: usize, need: usize },
    #[error("frame buffer is {got} bytes, expected {expected}")]
    FrameSize { got: usize, expected: usize },
}

/// Converts degrees Celsius to centi-Kelvin, rounding to the nearest unit.
pub fn to_centi_kelvin(celsius: f64) -> u16 {
    (celsius * 100.0 + ZERO_CELSIUS_CENTI_K)
        .round()
        .clamp(0.0, u16::MAX as f64) as u16
}

pub fn from_centi_kelvin(centi_k: u16) -> f64 {
    (centi_k as f64 - ZERO_CELSIUS_CENTI_K) / 100.0
}

/// Millisecond counter as the sensor keeps it; wraps at 32 bits.
fn to_millis(d: Duration) -> u32 {
    d.as_millis() as u64 as u32
}

fn ffc_status_bits(state: FfcState) -> u32 {
    state.code() << STATUS_FFC_STATE_SHIFT
}

fn put_u32_words<B: BufMut>(buf: &mut B, value: u32) {
    buf.put_u16(value as u16);
    buf.put_u16((value >> 16) as u16);
}

fn put_u64_words<B: BufMut>(buf: &mut B, value: u64) {
    put_u32_words(buf, value as u32);
    put_u32_words(buf, (value >> 32) as u32);
}

fn get_u32_words<B: Buf>(buf: &mut B) -> u32 {
    let low = buf.get_u16() as u32;
    let high = buf.get_u16() as u32;
    (high << 16) | low
}

/// Writes the 64 telemetry bytes for `t`.
pub fn encode_telemetry<B: BufMut>(t: &Telemetry, buf: &mut B) {
    buf.put_u16(0); // 0: telemetry revision
    put_u32_words(buf, to_millis(t.time_on)); // 1
    put_u32_words(buf, ffc_status_bits(t.ffc_state)); // 3
    buf.put_bytes(0, 16); // 5: reserved
    put_u64_words(buf, 0); // 13: software revision
    buf.put_bytes(0, 6); // 17: reserved
    put_u32_words(buf, t.frame_count); // 20
    buf.put_u16(t.frame_mean); // 22
    buf.put_u16(0); // 23: FPA temp counts
    buf.put_u16(to_centi_kelvin(t.temp_c)); // 24
    buf.put_bytes(0, 8); // 25: reserved
    buf.put_u16(to_centi_kelvin(t.last_ffc_temp_c)); // 29
    put_u32_words(buf, to_millis(t.last_ffc_time)); // 30
}

/// Reads a telemetry block written by [`encode_telemetry`] or the sensor.
pub fn decode_telemetry(mut data: &[u8]) -> Result<Telemetry, TelemetryError> {
    if data.len() < TELEMETRY_WORDS_BYTES {
        return Err(TelemetryError::TooShort {
            got: data.len(),
            need: TELEMETRY_WORDS_BYTES,
        });
    }
    let buf = &mut data;
    buf.advance(2);
    let time_on = get_u32_words(buf);
    let status = get_u32_words(buf);
    buf.advance(16 + 8 + 6);
    let frame_count = get_u32_words(buf);
    let frame_mean = buf.get_u16();
    buf.advance(2);
    let temp = buf.get_u16();
    buf.advance(8);
    let last_ffc_temp = buf.get_u16();
    let last_ffc_time = get_u32_words(buf);

    Ok(Telemetry {
        time_on: Duration::from_millis(time_on as u64),
        ffc_state: FfcState::from_code(status >> STATUS_FFC_STATE_SHIFT),
        frame_count,
        frame_mean,
        temp_c: from_centi_kelvin(temp),
        last_ffc_temp_c: from_centi_kelvin(last_ffc_temp),
        last_ffc_time: Duration::from_millis(last_ffc_time as u64),
        background_frame: false,
    })
}

/// Writes a complete wire frame: telemetry, padding, then big-endian
/// pixels in row-major order.
pub fn encode_frame<B: BufMut>(frame: &Frame, buf: &mut B) {
    encode_telemetry(&frame.status, buf);
    buf.put_bytes(0, TELEMETRY_PADDING_BYTES);
    for &pixel in frame.pixels() {
        buf.put_u16(pixel);
    }
}

/// Fills `frame` from a wire frame. The buffer must match the frame's
/// dimensions exactly.
pub fn decode_frame(data: &[u8], frame: &mut Frame) -> Result<(), TelemetryError> {
    let expected = TELEMETRY_HEADER_BYTES + frame.pixels().len() * 2;
    if data.len() != expected {
        return Err(TelemetryError::FrameSize {
            got: data.len(),
            expected,
        });
    }
    frame.status = decode_telemetry(data)?;
    let mut pixels = &data[TELEMETRY_HEADER_BYTES..];
    for pixel in frame.pixels_mut() {
        *pixel = pixels.get_u16();
    }
    Ok(())
}
