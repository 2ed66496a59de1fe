//! Sensor description, frames and configuration.
//!
//! The emulated sensor is described once at startup by a [`CameraSpec`].
//! Frame sources produce [`Frame`]s sized to match it.

mod config;
mod frame;
mod sensor;

pub use config::{ConfigError, FileConfig, ServerConfig, StreamConfig};
pub use frame::{FfcState, Frame, PixelRange, Telemetry};
pub use sensor::{CameraSpec, Handshake, TELEMETRY_HEADER_BYTES};
