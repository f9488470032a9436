// THEORY:
// The `Pixel` module is the most fundamental unit of the engine. It is a "dumb"
// data container for a single RGBA sample plus the one heuristic the rest of the
// pipeline needs from a lone pixel: its luminance. Anything that compares pixels
// (differences, thresholds, zone fill) belongs in higher-level modules.
//
// Key principles:
// 1) Single-pixel scope: nothing here reads neighbours or history.
// 2) Normalized output: downstream stages work in [0, 1], so conversion from bytes
//    happens exactly once, here.
// 3) One luma definition (Rec. 601) shared by frame conversion and the difference
//    engine, so a gray frame and an RGBA frame of the same scene agree.

pub mod pixel {
    pub type Byte = u8;
    pub type Channel = Byte;
    pub type NormalizedChannel = f32;
    pub type Luminance = f32;

    pub const CHANNELS: usize = 4;

    /// Rec. 601 luma weights for red, green and blue. They sum to one, so the luma
    /// of normalized channels is itself normalized.
    pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

    /// Weighted Rec. 601 luma of three normalized channel values.
    #[inline]
    pub fn luma(red: NormalizedChannel, green: NormalizedChannel, blue: NormalizedChannel) -> Luminance {
        LUMA_WEIGHTS[0] * red + LUMA_WEIGHTS[1] * green + LUMA_WEIGHTS[2] * blue
    }

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// All four channels scaled to `[0, 1]`, in RGBA order.
        pub fn normalized(&self) -> [NormalizedChannel; CHANNELS] {
            [
                self.red as NormalizedChannel / 255.0,
                self.green as NormalizedChannel / 255.0,
                self.blue as NormalizedChannel / 255.0,
                self.alpha as NormalizedChannel / 255.0,
            ]
        }
    }

    impl TryFrom<&[Byte]> for Pixel {
        type Error = usize;

        /// Builds a pixel from exactly four RGBA bytes; the error carries the
        /// offending length.
        fn try_from(bytes: &[Byte]) -> Result<Self, Self::Error> {
            match bytes {
                [r, g, b, a] => Ok(Pixel::new(*r, *g, *b, *a)),
                _ => Err(bytes.len()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;
    use assert_approx_eq::assert_approx_eq;

    fn luminance(pixel: Pixel) -> Luminance {
        let [r, g, b, _] = pixel.normalized();
        luma(r, g, b)
    }

    #[test]
    fn white_and_black_luminance() {
        assert_approx_eq!(luminance(Pixel::new(255, 255, 255, 255)), 1.0, 1e-6);
        assert_approx_eq!(luminance(Pixel::new(0, 0, 0, 255)), 0.0, 1e-6);
    }

    #[test]
    fn green_dominates_luminance() {
        let red = luminance(Pixel::new(255, 0, 0, 255));
        let green = luminance(Pixel::new(0, 255, 0, 255));
        let blue = luminance(Pixel::new(0, 0, 255, 255));
        assert!(green > red && red > blue);
        assert_approx_eq!(red + green + blue, 1.0, 1e-6);
    }

    #[test]
    fn conversion_from_bytes_checks_length() {
        let bytes = [10u8, 20, 30, 40];
        assert_eq!(Pixel::try_from(&bytes[..]), Ok(Pixel::new(10, 20, 30, 40)));
        assert_eq!(Pixel::try_from(&bytes[..3]), Err(3));
        assert_eq!(Pixel::new(0, 0, 0, 255).normalized(), [0.0, 0.0, 0.0, 1.0]);
    }
}
