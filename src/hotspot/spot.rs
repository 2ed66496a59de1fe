//! Hotspot descriptors and painting.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Shape;
use crate::camera::{Frame, PixelRange};

/// Errors parsing a hotspot payload.
#[derive(Debug, Error)]
pub enum HotspotError {
    #[error("malformed hotspot payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("hotspot has negative size {width}x{height}")]
    NegativeSize { width: i32, height: i32 },
}

/// Hotspot as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Spot {
    /// `"circle"` for an ellipse; anything else is a rectangle.
    pub shape_type: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub min_temp: i32,
    pub max_temp: i32,
}

impl Spot {
    pub fn is_circle(&self) -> bool {
        self.shape_type.eq_ignore_ascii_case("circle")
            || self.shape_type.eq_ignore_ascii_case("ellipse")
    }

    pub fn temperature(&self) -> PixelRange {
        PixelRange::new(self.min_temp, self.max_temp)
    }
}

/// A region forced to a temperature range on every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    spot: Spot,
    shape: Shape,
}

impl Hotspot {
    pub fn new(spot: Spot) -> Result<Self, HotspotError> {
        if spot.width < 0 || spot.height < 0 {
            return Err(HotspotError::NegativeSize {
                width: spot.width,
                height: spot.height,
            });
        }
        let shape = Shape::for_spot(&spot);
        Ok(Self { spot, shape })
    }

    pub fn spot(&self) -> &Spot {
        &self.spot
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Overwrites every pixel inside the hotspot with an independent draw
    /// from its temperature range. Parts outside the frame are clipped.
    pub fn paint<R: Rng + ?Sized>(&self, frame: &mut Frame, rng: &mut R) {
        let width = frame.width() as i32;
        let height = frame.height() as i32;
        let range = self.spot.temperature();

        let first_row = self.spot.y.max(0);
        let last_row = self.spot.y.saturating_add(self.spot.height).min(height);
        for y in first_row..last_row {
            let span = self.shape.intersections(&self.spot, y);
            let start = (*span.start()).max(0);
            let end = (*span.end()).min(width - 1);
            if start > end {
                continue;
            }
            let row = frame.row_mut(y as usize);
            for pixel in &mut row[start as usize..=end as usize] {
                *pixel = range.sample(rng);
            }
        }
    }
}

/// Parses a JSON array of hotspot descriptors.
pub fn parse_hotspots(raw: &str) -> Result<Vec<Hotspot>, HotspotError> {
    let spots: Vec<Spot> = serde_json::from_str(raw)?;
    spots.into_iter().map(Hotspot::new).collect()
}

/// Paints hotspots in declaration order, so later ones win on overlap.
pub fn paint_all<R: Rng + ?Sized>(hotspots: &[Hotspot], frame: &mut Frame, rng: &mut R) {
    for hotspot in hotspots {
        hotspot.paint(frame, rng);
    }
}
