// Diagnostic output: PNG encoding of the engine's intermediate images.

pub mod image_helper {
    use image::{ExtendedColorType, GrayImage, ImageEncoder, RgbaImage};
    use std::path::Path;

    fn encode(
        path: &Path,
        width: u32,
        height: u32,
        buffer: &[u8],
        color: ExtendedColorType,
    ) -> Result<(), image::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(std::io::BufWriter::new(output));
        encoder.write_image(buffer, width, height, color)?;
        Ok(())
    }

    pub fn save_rgba(path: impl AsRef<Path>, image: &RgbaImage) -> Result<(), image::ImageError> {
        encode(path.as_ref(), image.width(), image.height(), image.as_raw(), ExtendedColorType::Rgba8)
    }

    pub fn save_gray(path: impl AsRef<Path>, image: &GrayImage) -> Result<(), image::ImageError> {
        encode(path.as_ref(), image.width(), image.height(), image.as_raw(), ExtendedColorType::L8)
    }
}
