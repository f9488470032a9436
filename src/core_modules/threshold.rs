// THEORY:
// The `ThresholdClassifier` turns the continuous difference image into a binary
// motion mask: a pixel is "moving" when its difference reaches the threshold
// (`diff >= threshold`, inclusive). The mask is the only thing active zones look
// at, so this stage is where sensor noise gets cut off.
//
// Like the difference engine it is pure and stateless. The mask also knows how to
// count moving pixels inside a pixel rectangle, which is the aggregation primitive
// the zone evaluator builds on.

use crate::core_modules::difference::DifferenceFrame;
use crate::core_modules::geometry::PixelBounds;
use crate::error::{EngineError, Result, clamp_unit};
use image::{GrayImage, Luma};

/// Binary motion mask, one flag per pixel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdFrame {
    width: u32,
    height: u32,
    mask: Vec<bool>,
}

impl ThresholdFrame {
    /// Wraps a row-major mask, checking its length.
    pub fn from_mask(width: u32, height: u32, mask: Vec<bool>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if mask.len() != expected {
            return Err(EngineError::InvalidFrame {
                expected,
                actual: mask.len(),
            });
        }
        Ok(Self {
            width,
            height,
            mask,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn is_moving(&self, x: u32, y: u32) -> bool {
        x < self.width
            && y < self.height
            && self.mask[y as usize * self.width as usize + x as usize]
    }

    /// Total number of moving pixels in the frame.
    pub fn moving_count(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    /// Number of moving pixels inside `bounds`, clipped to the frame. Inverted
    /// bounds count as empty.
    pub fn count_moving(&self, bounds: &PixelBounds) -> usize {
        let width = self.width as usize;
        let x1 = bounds.x1.min(self.width) as usize;
        let y1 = bounds.y1.min(self.height) as usize;
        let x0 = (bounds.x0 as usize).min(x1);
        let y0 = (bounds.y0 as usize).min(y1);
        (y0..y1)
            .map(|y| {
                self.mask[y * width + x0..y * width + x1]
                    .iter()
                    .filter(|m| **m)
                    .count()
            })
            .sum()
    }

    /// White where moving, black elsewhere.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.is_moving(x, y) { 255 } else { 0 }])
        })
    }
}

/// Binarizes a difference image: `moving = diff >= threshold`.
///
/// Out-of-range thresholds are clamped into `[0, 1]`; a non-finite threshold is a
/// configuration error.
pub fn classify(diff: &DifferenceFrame, threshold: f32) -> Result<ThresholdFrame> {
    let threshold = clamp_unit("threshold", threshold)?;
    Ok(ThresholdFrame {
        width: diff.width(),
        height: diff.height(),
        mask: diff.values().iter().map(|d| *d >= threshold).collect(),
    })
}
