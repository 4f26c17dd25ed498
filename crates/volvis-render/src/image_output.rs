//! Rendered frames and writing them to disk.

use std::path::Path;

use glam::Vec4;
use image::{ImageBuffer, Rgba};

use crate::error::ImageError;

/// A frame of RGBA pixels in `[0, 1]`, row-major with the origin at the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl RenderedImage {
    /// Creates a transparent black image.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec4::ZERO; width as usize * height as usize],
        }
    }

    /// Wraps existing pixels.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Vec4>) -> Result<Self, ImageError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(ImageError::InvalidImageData {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [Vec4] {
        &mut self.pixels
    }

    /// Pixel at `(x, y)`. Panics when out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Quantizes to 8-bit RGBA.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| p.to_array())
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }

    fn to_buffer(&self) -> Result<ImageBuffer<Rgba<u8>, Vec<u8>>, ImageError> {
        ImageBuffer::from_raw(self.width, self.height, self.to_rgba8()).ok_or(
            ImageError::InvalidImageData {
                expected: self.width as usize * self.height as usize,
                actual: self.pixels.len(),
            },
        )
    }

    /// Saves the image. The format follows the extension: `.png`, `.jpg` or `.jpeg`.
    pub fn save_image(&self, path: impl AsRef<Path>) -> Result<(), ImageError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let img = self.to_buffer()?;
        match extension.as_str() {
            "png" => {
                img.save_with_format(path, image::ImageFormat::Png)?;
            }
            "jpg" | "jpeg" => {
                // JPEG has no alpha channel
                let rgb_img = image::DynamicImage::ImageRgba8(img).to_rgb8();
                rgb_img.save_with_format(path, image::ImageFormat::Jpeg)?;
            }
            _ => {
                return Err(ImageError::UnsupportedFormat(extension));
            }
        }
        log::info!(
            "saved {}x{} image to {}",
            self.width,
            self.height,
            path.display()
        );
        Ok(())
    }

    /// Encodes the image as PNG in memory.
    pub fn encode_png(&self) -> Result<Vec<u8>, ImageError> {
        let img = self.to_buffer()?;
        let mut buffer = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image() -> RenderedImage {
        let pixels = (0..6)
            .map(|i| Vec4::new(i as f32 / 5.0, 0.0, 1.0, 1.0))
            .collect();
        RenderedImage::from_pixels(3, 2, pixels).unwrap()
    }

    #[test]
    fn test_from_pixels_checks_length() {
        let result = RenderedImage::from_pixels(2, 2, vec![Vec4::ZERO; 3]);
        assert!(matches!(
            result,
            Err(ImageError::InvalidImageData {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_to_rgba8_quantizes_and_clamps() {
        let image =
            RenderedImage::from_pixels(2, 1, vec![Vec4::new(0.5, 2.0, -1.0, 1.0), Vec4::ONE])
                .unwrap();
        assert_eq!(image.to_rgba8(), vec![128, 255, 0, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn test_pixel_indexing() {
        let image = gradient_image();
        assert_eq!(image.pixel(1, 1).x, 4.0 / 5.0);
    }

    #[test]
    fn test_save_png_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let image = gradient_image();
        image.save_image(&path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.into_raw(), image.to_rgba8());
    }

    #[test]
    fn test_save_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.JPG");
        gradient_image().save_image(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let result = gradient_image().save_image(dir.path().join("frame.bmp"));
        assert!(matches!(result, Err(ImageError::UnsupportedFormat(ext)) if ext == "bmp"));
    }

    #[test]
    fn test_encode_png_signature() {
        let bytes = gradient_image().encode_png().unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
