use std::path::Path;

use crate::shared::frame::Frame;
use crate::source::domain::image_decoder::ImageDecoder;

/// Decodes stills with the `image` crate.
///
/// Images with an alpha channel decode to RGBA so they can be blended as
/// overlays; everything else decodes to RGB.
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageCrateDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error + Send + Sync>> {
        let img = image::open(path)?;
        let (width, height) = (img.width(), img.height());

        let frame = if img.color().has_alpha() {
            Frame::new(img.into_rgba8().into_raw(), width, height, 4, 0)
        } else {
            Frame::new(img.into_rgb8().into_raw(), width, height, 3, 0)
        };
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_rgb_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        let mut img = image::RgbImage::new(4, 3);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();

        let frame = ImageCrateDecoder::new().decode(&path).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.channels(), 3);
        assert_eq!(&frame.data()[0..3], &[50, 100, 200]);
    }

    #[test]
    fn test_decodes_rgba_png_with_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 128]));
        img.save(&path).unwrap();

        let frame = ImageCrateDecoder::new().decode(&path).unwrap();
        assert_eq!(frame.channels(), 4);
        assert_eq!(&frame.data()[0..4], &[10, 20, 30, 128]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ImageCrateDecoder::new().decode(Path::new("/nonexistent/frame.png"));
        assert!(result.is_err());
    }
}
