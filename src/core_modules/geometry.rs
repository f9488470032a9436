// THEORY:
// The `geometry` module owns the one piece of math every zone depends on: turning
// a resolution-independent, normalized rectangle into concrete pixel bounds on
// whatever frame is currently being analyzed.
//
// Coordinates are normalized: [0.0, 0.0] is the top-left corner of the image and
// [1.0, 1.0] the bottom-right. Zones keep their meaning when the capture resolution
// changes.
//
// Rounding policy:
// -   Both edges map with `floor(norm * size)`.
// -   The far edge is inclusive and clamped to the last pixel, so a pixel belongs to
//     the rectangle whenever its cell intersects the closed rectangle. A rectangle
//     `(0, 0, 0.5, 0.5)` on a 2x2 frame therefore covers all four pixels.
// -   A rectangle with zero width or height, or any zero-sized frame, has no pixel
//     bounds at all: a degenerate zone, never an error.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// A rectangle in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormRect {
    /// Left edge, in `[0, 1]`.
    pub x: f32,
    /// Top edge, in `[0, 1]`.
    pub y: f32,
    /// Width, with `x + w <= 1`.
    pub w: f32,
    /// Height, with `y + h <= 1`.
    pub h: f32,
}

/// Half-open pixel bounds `[x0, x1) x [y0, y1)` of a rectangle on a concrete frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

/// A rectangle scaled into a caller's drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl NormRect {
    /// Builds a validated rectangle; see [`NormRect::validated`].
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Result<Self> {
        NormRect { x, y, w, h }.validated()
    }

    /// The whole image.
    pub fn full() -> Self {
        NormRect {
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 1.0,
        }
    }

    /// Clamps the rectangle into the unit square.
    ///
    /// The origin is clamped to `[0, 1]` first, then width and height are shrunk so
    /// the rectangle ends inside the image. Non-finite components are rejected.
    pub fn validated(self) -> Result<Self> {
        let components = [self.x, self.y, self.w, self.h];
        if components.iter().any(|c| !c.is_finite()) {
            return Err(EngineError::Configuration(format!(
                "zone rectangle must be finite, got {self:?}"
            )));
        }
        let x = self.x.clamp(0.0, 1.0);
        let y = self.y.clamp(0.0, 1.0);
        let clamped = NormRect {
            x,
            y,
            w: self.w.clamp(0.0, 1.0 - x),
            h: self.h.clamp(0.0, 1.0 - y),
        };
        if clamped != self {
            tracing::warn!(requested = ?self, clamped = ?clamped, "clamping zone rectangle");
        }
        Ok(clamped)
    }

    /// True when the rectangle has no area and can never cover a pixel.
    pub fn is_degenerate(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }

    /// Maps the rectangle onto a `width` x `height` pixel grid.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> Option<PixelBounds> {
        if self.is_degenerate() {
            return None;
        }
        let (x0, x1) = span(self.x, self.w, width)?;
        let (y0, y1) = span(self.y, self.h, height)?;
        Some(PixelBounds { x0, y0, x1, y1 })
    }

    /// Scales the rectangle into a drawing surface placed at `(x, y)` with size `w` x `h`.
    pub fn to_target(&self, x: f32, y: f32, w: f32, h: f32) -> TargetRect {
        TargetRect {
            x: x + self.x * w,
            y: y + self.y * h,
            w: self.w * w,
            h: self.h * h,
        }
    }
}

/// Scaled edges within this many pixels of a grid line are snapped onto it.
const EDGE_SNAP: f64 = 1e-4;

/// `floor(norm * size)`, with `norm * size` snapped to the nearest integer when the
/// f32 inputs only miss it by representation error.
fn edge(norm: f64, size: u32) -> u32 {
    let scaled = norm * size as f64;
    // f32 inputs carry about one ulp of relative error, which grows with the frame.
    let tolerance = EDGE_SNAP.max(size as f64 * 4.0 * f32::EPSILON as f64);
    let nearest = scaled.round();
    let snapped = if (scaled - nearest).abs() < tolerance {
        nearest
    } else {
        scaled.floor()
    };
    snapped.max(0.0) as u32
}

fn span(start: f32, len: f32, size: u32) -> Option<(u32, u32)> {
    if size == 0 {
        return None;
    }
    let last = size - 1;
    let first = edge(start as f64, size).min(last);
    let end = edge(start as f64 + len as f64, size).min(last);
    Some((first, end + 1))
}

impl PixelBounds {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Number of pixels inside the bounds.
    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}
