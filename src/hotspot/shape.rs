//! Scanline geometry for overlay shapes.

use std::ops::RangeInclusive;

use super::Spot;

/// Overlay outline. Each variant answers one question: which columns of
/// scanline `y` lie inside the shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Axis-aligned box covering `[x, x + width)`.
    Rectangle,
    /// Ellipse inscribed in the bounding box, solving
    /// `(x-h)^2/a + (y-k)^2/b = 1`. `a` and `b` are the squared semi-axes.
    Ellipse { h: f64, k: f64, a: f64, b: f64 },
}

impl Shape {
    /// Builds the shape for `spot`, using its declared shape type.
    pub fn for_spot(spot: &Spot) -> Self {
        if spot.is_circle() {
            Self::ellipse(spot)
        } else {
            Shape::Rectangle
        }
    }

    pub fn ellipse(spot: &Spot) -> Self {
        let half_width = spot.width as f64 / 2.0;
        let half_height = spot.height as f64 / 2.0;
        Shape::Ellipse {
            h: spot.x as f64 + half_width,
            k: spot.y as f64 + half_height,
            a: half_width * half_width,
            b: half_height * half_height,
        }
    }

    /// Columns of scanline `y` inside the shape, inclusive at both ends.
    ///
    /// An empty range means the scanline misses the shape.
    pub fn intersections(&self, spot: &Spot, y: i32) -> RangeInclusive<i32> {
        match *self {
            Shape::Rectangle => {
                if spot.width <= 0 {
                    return empty();
                }
                // Saturates only far outside any frame; painting clips anyway.
                spot.x..=spot.x.saturating_add(spot.width - 1)
            }
            Shape::Ellipse { h, k, a, b } => {
                if a <= 0.0 || b <= 0.0 {
                    return empty();
                }
                let dy = y as f64 - k;
                let radicand = a * (1.0 - dy * dy / b);
                if radicand < 0.0 {
                    return empty();
                }
                let res = radicand.sqrt();
                (h - res).ceil() as i32..=(h + res).floor() as i32
            }
        }
    }
}

#[allow(clippy::reversed_empty_ranges)]
fn empty() -> RangeInclusive<i32> {
    1..=0
}
