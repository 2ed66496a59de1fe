//! Wire encoding of sensor frames.
//!
//! Every frame the recorder receives starts with a 640-byte header: 64 bytes
//! of telemetry words followed by zero padding, matching the two
//! telemetry rows the real sensor prepends. Raw pixels follow as
//! big-endian 16-bit values.
//!
//! The layout and the 27315 centi-Kelvin offset are load-bearing; the
//! recorder parses them exactly as it would parse hardware output.

mod encoder;

pub use encoder::{
    decode_frame, decode_telemetry, encode_frame, encode_telemetry, from_centi_kelvin,
    to_centi_kelvin, TelemetryError, TELEMETRY_PADDING_BYTES, TELEMETRY_WORDS_BYTES,
    ZERO_CELSIUS_CENTI_K,
};
