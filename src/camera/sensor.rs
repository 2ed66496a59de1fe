//! Sensor geometry and the connection handshake.
//!
//! The recorder reads a YAML header describing the sensor before the first
//! frame arrives. Key names must match what the recorder looks up.

use serde::{Deserialize, Serialize};

use super::config::ConfigError;

/// Bytes preceding the pixel data in every frame: the telemetry words
/// padded out to two sensor rows.
pub const TELEMETRY_HEADER_BYTES: usize = 640;

/// Static description of the emulated sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSpec {
    /// Horizontal resolution in pixels.
    pub res_x: u32,
    /// Vertical resolution in pixels.
    pub res_y: u32,
    /// Native frame rate.
    pub fps: u32,
    /// Model identifier sent in the handshake.
    pub model: String,
    /// Brand identifier sent in the handshake.
    pub brand: String,
}

impl Default for CameraSpec {
    /// Lepton 3.5 geometry.
    fn default() -> Self {
        Self {
            res_x: 160,
            res_y: 120,
            fps: 9,
            model: "lepton3.5".to_string(),
            brand: "flir".to_string(),
        }
    }
}

impl CameraSpec {
    /// Total bytes of one frame on the wire.
    pub fn frame_size(&self) -> usize {
        TELEMETRY_HEADER_BYTES + self.pixel_count() * 2
    }

    /// Pixels per frame.
    pub fn pixel_count(&self) -> usize {
        self.res_x as usize * self.res_y as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.res_x == 0 || self.res_y == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }

    /// Header announced on every new connection.
    pub fn handshake(&self) -> Handshake {
        Handshake {
            brand: self.brand.clone(),
            fps: self.fps,
            frame_size: self.frame_size(),
            model: self.model.clone(),
            res_x: self.res_x,
            res_y: self.res_y,
        }
    }
}

/// Handshake payload. Fields are declared in the key order the recorder
/// has always received them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "FPS")]
    pub fps: u32,
    #[serde(rename = "FrameSize")]
    pub frame_size: usize,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "ResX")]
    pub res_x: u32,
    #[serde(rename = "ResY")]
    pub res_y: u32,
}

impl Handshake {
    /// Encodes the header as YAML followed by a blank line.
    pub fn to_text(&self) -> Result<String, serde_yaml::Error> {
        let mut text = serde_yaml::to_string(self)?;
        text.push('\n');
        Ok(text)
    }

    pub fn from_text(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Camera geometry described by this header.
    pub fn camera(&self) -> CameraSpec {
        CameraSpec {
            res_x: self.res_x,
            res_y: self.res_y,
            fps: self.fps,
            model: self.model.clone(),
            brand: self.brand.clone(),
        }
    }
}
