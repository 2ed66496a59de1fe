//! Synthetic hot regions painted over frames.
//!
//! A hotspot is a rectangle or ellipse with a temperature range. For each
//! scanline the shape reports the columns it covers; those pixels are
//! overwritten with fresh draws from the range.

mod shape;
mod spot;

pub use shape::Shape;
pub use spot::{paint_all, parse_hotspots, Hotspot, HotspotError, Spot};
