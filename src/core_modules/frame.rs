// THEORY:
// The `Frame` module is the normalized pixel-buffer abstraction every other stage
// consumes. A `Frame` holds one captured image at a fixed resolution, stored as
// row-major `f32` samples in [0, 1] with either one (luma) or four (RGBA) channels.
//
// Key architectural principles:
// 1.  **Immutable Once Captured**: a frame is built once per tick from raw bytes or
//     an `image` buffer and is never mutated afterwards; the next tick supersedes it.
//     Only the background model, which owns its own reference frame, blends samples
//     in place.
// 2.  **Native Channels**: frames keep the channel layout they arrived with. The
//     reduction to a single intensity happens in the difference engine, so the
//     background model can blend colour exactly as captured.
// 3.  **Image Interop**: frames convert from and to the `image` crate buffers, which
//     is how callers feed camera frames in and pull diagnostic images out.

use crate::core_modules::pixel::pixel::{self, Pixel};
use crate::error::{EngineError, Result};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Channel layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// One normalized intensity per pixel.
    Luma,
    /// Normalized red, green, blue and alpha per pixel.
    Rgba,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Luma => 1,
            PixelFormat::Rgba => pixel::CHANNELS,
        }
    }
}

/// Mirroring applied to incoming frames before any processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mirror {
    #[default]
    None,
    /// Flip left-right, the usual choice for a front-facing camera.
    Horizontal,
    /// Flip top-bottom.
    Vertical,
    /// Flip both axes.
    Both,
}

/// One captured image, normalized to `[0, 1]` per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    samples: Vec<f32>,
}

impl Frame {
    /// Builds a frame from tightly packed RGBA bytes.
    pub fn from_rgba(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        Self::check_len(width, height, PixelFormat::Rgba, bytes.len())?;
        let samples = bytes
            .chunks_exact(pixel::CHANNELS)
            .filter_map(|chunk| Pixel::try_from(chunk).ok())
            .flat_map(|p| p.normalized())
            .collect();
        Ok(Self {
            width,
            height,
            format: PixelFormat::Rgba,
            samples,
        })
    }

    /// Builds a frame from one intensity byte per pixel.
    pub fn from_luma(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        Self::check_len(width, height, PixelFormat::Luma, bytes.len())?;
        Ok(Self {
            width,
            height,
            format: PixelFormat::Luma,
            samples: bytes.iter().map(|&b| b as f32 / 255.0).collect(),
        })
    }

    /// Builds a frame from already-normalized samples.
    ///
    /// Finite samples outside `[0, 1]` are clamped; NaN or infinite samples are
    /// rejected.
    pub fn from_normalized(
        width: u32,
        height: u32,
        format: PixelFormat,
        mut samples: Vec<f32>,
    ) -> Result<Self> {
        Self::check_len(width, height, format, samples.len())?;
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(EngineError::Configuration(
                "frame samples must be finite".to_string(),
            ));
        }
        samples.iter_mut().for_each(|s| *s = s.clamp(0.0, 1.0));
        Ok(Self {
            width,
            height,
            format,
            samples,
        })
    }

    /// A frame with every sample set to `value` (clamped to `[0, 1]`).
    pub fn filled(width: u32, height: u32, format: PixelFormat, value: f32) -> Self {
        let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            width,
            height,
            format,
            samples: vec![value; width as usize * height as usize * format.channels()],
        }
    }

    fn check_len(width: u32, height: u32, format: PixelFormat, actual: usize) -> Result<()> {
        let expected = width as usize * height as usize * format.channels();
        if expected != actual {
            return Err(EngineError::InvalidFrame { expected, actual });
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// `(width, height, channels)`, the identity two frames must share to be compared.
    pub fn geometry(&self) -> (u32, u32, usize) {
        (self.width, self.height, self.channels())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major, channel-interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub(crate) fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// The channels of the pixel at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[f32]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.channels();
        let start = (y as usize * self.width as usize + x as usize) * channels;
        self.samples.get(start..start + channels)
    }

    /// Normalized luminance of the pixel at `(x, y)`.
    pub fn luma_at(&self, x: u32, y: u32) -> Option<f32> {
        self.pixel(x, y).map(|p| match p {
            [r, g, b, _] => pixel::luma(*r, *g, *b),
            [y] => *y,
            _ => 0.0,
        })
    }

    /// Returns this frame flipped according to `mirror`.
    pub fn into_mirrored(self, mirror: Mirror) -> Self {
        let (flip_x, flip_y) = match mirror {
            Mirror::None => return self,
            Mirror::Horizontal => (true, false),
            Mirror::Vertical => (false, true),
            Mirror::Both => (true, true),
        };
        let (width, height) = (self.width as usize, self.height as usize);
        let channels = self.channels();
        let mut samples = Vec::with_capacity(self.samples.len());
        for y in 0..height {
            let src_y = if flip_y { height - 1 - y } else { y };
            for x in 0..width {
                let src_x = if flip_x { width - 1 - x } else { x };
                let start = (src_y * width + src_x) * channels;
                samples.extend_from_slice(&self.samples[start..start + channels]);
            }
        }
        Self { samples, ..self }
    }

    /// Luma rendering of the frame, for visualisation.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([to_byte(self.luma_at(x, y).unwrap_or(0.0))])
        })
    }

    /// RGBA rendering of the frame; luma frames are expanded to opaque gray.
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| match self.pixel(x, y) {
            Some([r, g, b, a]) => Rgba([to_byte(*r), to_byte(*g), to_byte(*b), to_byte(*a)]),
            Some([v]) => {
                let v = to_byte(*v);
                Rgba([v, v, v, 255])
            }
            _ => Rgba([0, 0, 0, 255]),
        })
    }
}

/// Quantizes a normalized sample back to a byte.
pub(crate) fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl From<&RgbaImage> for Frame {
    fn from(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Rgba,
            samples: image.as_raw().iter().map(|&b| b as f32 / 255.0).collect(),
        }
    }
}

impl From<&GrayImage> for Frame {
    fn from(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Luma,
            samples: image.as_raw().iter().map(|&b| b as f32 / 255.0).collect(),
        }
    }
}

impl From<&DynamicImage> for Frame {
    fn from(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Frame::from(gray),
            other => Frame::from(&other.to_rgba8()),
        }
    }
}
