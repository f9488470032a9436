// THEORY:
// The `DifferenceEngine` measures how far the current frame has drifted from the
// background reference, one pixel at a time. It is a pure, stateless stage: all
// temporal memory lives in the `BackgroundModel`.
//
// Channel reduction: multi-channel frames are compared channel by channel and the
// absolute differences are folded into one intensity with the Rec. 601 luma weights,
// `0.299|dR| + 0.587|dG| + 0.114|dB|`. Alpha is ignored. Because the weights sum to
// one, the result stays in [0, 1] and a colour frame agrees with its gray rendering
// on uniform changes. Luma frames use `|dY|` directly.

use crate::core_modules::frame::{Frame, PixelFormat, to_byte};
use crate::core_modules::pixel::pixel;
use crate::error::{EngineError, Result};
use image::{GrayImage, Luma};

/// Per-pixel absolute difference between a frame and its background, in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DifferenceFrame {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DifferenceFrame {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major difference values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Gray rendering, bright where the scene differs from the background.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([to_byte(self.get(x, y).unwrap_or(0.0))])
        })
    }
}

/// Computes `|current - background|` for every pixel.
pub fn compute_difference(current: &Frame, background: &Frame) -> Result<DifferenceFrame> {
    let mut out = DifferenceFrame::default();
    compute_difference_into(current, background, &mut out)?;
    Ok(out)
}

/// Buffer-reusing variant of [`compute_difference`]; `out` is resized as needed.
pub fn compute_difference_into(
    current: &Frame,
    background: &Frame,
    out: &mut DifferenceFrame,
) -> Result<()> {
    if current.geometry() != background.geometry() {
        return Err(EngineError::DimensionMismatch {
            expected: background.geometry(),
            actual: current.geometry(),
        });
    }
    out.width = current.width();
    out.height = current.height();
    out.values.clear();
    out.values.reserve(current.pixel_count());

    let (cur, bg) = (current.samples(), background.samples());
    match current.format() {
        PixelFormat::Luma => {
            out.values
                .extend(cur.iter().zip(bg).map(|(c, b)| (c - b).abs()));
        }
        PixelFormat::Rgba => {
            let channels = pixel::CHANNELS;
            out.values.extend(
                cur.chunks_exact(channels)
                    .zip(bg.chunks_exact(channels))
                    .map(|(c, b)| {
                        pixel::luma((c[0] - b[0]).abs(), (c[1] - b[1]).abs(), (c[2] - b[2]).abs())
                            .min(1.0)
                    }),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn luma_difference_is_absolute() {
        let current = Frame::from_normalized(3, 1, PixelFormat::Luma, vec![0.2, 0.9, 0.5]).unwrap();
        let background = Frame::from_normalized(3, 1, PixelFormat::Luma, vec![0.5, 0.4, 0.5]).unwrap();
        let diff = compute_difference(&current, &background).unwrap();
        assert_approx_eq!(diff.values()[0], 0.3, 1e-6);
        assert_approx_eq!(diff.values()[1], 0.5, 1e-6);
        assert_approx_eq!(diff.values()[2], 0.0, 1e-6);
    }

    #[test]
    fn rgba_difference_uses_luma_weights_and_ignores_alpha() {
        let current = Frame::from_rgba(2, 1, &[255, 0, 0, 0, 255, 255, 255, 0]).unwrap();
        let background = Frame::from_rgba(2, 1, &[0, 0, 0, 255, 0, 0, 0, 255]).unwrap();
        let diff = compute_difference(&current, &background).unwrap();
        assert_approx_eq!(diff.get(0, 0).unwrap(), 0.299, 1e-6);
        assert_approx_eq!(diff.get(1, 0).unwrap(), 1.0, 1e-5);
    }

    #[test]
    fn opposing_channel_changes_do_not_cancel() {
        // Red goes up while green goes down: luma of the frames barely moves, but
        // the per-channel difference still registers.
        let current = Frame::from_rgba(1, 1, &[255, 0, 0, 255]).unwrap();
        let background = Frame::from_rgba(1, 1, &[0, 130, 0, 255]).unwrap();
        let diff = compute_difference(&current, &background).unwrap();
        assert!(diff.values()[0] > 0.5);
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let current = Frame::filled(2, 2, PixelFormat::Luma, 0.0);
        let background = Frame::filled(2, 2, PixelFormat::Rgba, 0.0);
        assert!(matches!(
            compute_difference(&current, &background),
            Err(EngineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn output_buffer_is_reused_across_sizes() {
        let mut out = DifferenceFrame::default();
        let a = Frame::filled(4, 4, PixelFormat::Luma, 1.0);
        let b = Frame::filled(4, 4, PixelFormat::Luma, 0.0);
        compute_difference_into(&a, &b, &mut out).unwrap();
        assert_eq!(out.values().len(), 16);

        let a = Frame::filled(2, 1, PixelFormat::Luma, 0.5);
        compute_difference_into(&a, &a, &mut out).unwrap();
        assert_eq!((out.width(), out.height()), (2, 1));
        assert_eq!(out.values(), &[0.0, 0.0]);
    }

    #[test]
    fn gray_rendering_scales_to_bytes() {
        let current = Frame::filled(1, 1, PixelFormat::Luma, 1.0);
        let background = Frame::filled(1, 1, PixelFormat::Luma, 0.0);
        let image = compute_difference(&current, &background).unwrap().to_gray_image();
        assert_eq!(image.into_raw(), vec![255]);
    }
}
