use std::path::Path;

use anyhow::{bail, Context, Result};
use image::{ImageFormat, RgbImage};

/// A decoded video frame handed over by the capture pipeline.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// A frame filled with a single color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Mean luma over all pixels, 0.0 for an empty frame.
    pub fn mean_luma(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let total: u64 = self
            .image
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                (299 * r as u64 + 587 * g as u64 + 114 * b as u64) / 1000
            })
            .sum();
        total as f64 / (self.image.width() as f64 * self.image.height() as f64)
    }

    pub fn save_jpeg(&self, path: &Path) -> Result<()> {
        if self.is_empty() {
            bail!("frame is empty ({}x{})", self.width(), self.height());
        }
        self.image
            .save_with_format(path, ImageFormat::Jpeg)
            .with_context(|| format!("failed to encode JPEG to {}", path.display()))
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}
