//! Image normalization before recognition
//!
//! Affects input quality only; the confidence-scoring policy never
//! depends on whether preprocessing ran.

use image::imageops;
use image::{DynamicImage, GrayImage};

/// Normalize a page image: grayscale, light denoise, contrast stretch
pub fn normalize(image: &DynamicImage) -> DynamicImage {
    let gray = image.to_luma8();
    let blurred = imageops::blur(&gray, 0.8);
    let stretched = stretch_contrast(&blurred);
    DynamicImage::ImageLuma8(stretched)
}

/// Linear contrast stretch over the observed luminance range
fn stretch_contrast(image: &GrayImage) -> GrayImage {
    let (mut min, mut max) = (u8::MAX, u8::MIN);
    for pixel in image.pixels() {
        min = min.min(pixel.0[0]);
        max = max.max(pixel.0[0]);
    }
    if max <= min {
        return image.clone();
    }
    let range = (max - min) as f32;
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let scaled = ((pixel.0[0] - min) as f32 / range * 255.0).round();
        pixel.0[0] = scaled as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_contrast_stretch_expands_range() {
        let mut img = GrayImage::new(4, 1);
        img.put_pixel(0, 0, Luma([100]));
        img.put_pixel(1, 0, Luma([120]));
        img.put_pixel(2, 0, Luma([140]));
        img.put_pixel(3, 0, Luma([160]));

        let stretched = stretch_contrast(&img);
        assert_eq!(stretched.get_pixel(0, 0).0[0], 0);
        assert_eq!(stretched.get_pixel(3, 0).0[0], 255);
    }

    #[test]
    fn test_flat_image_unchanged() {
        let img = GrayImage::from_pixel(4, 4, Luma([77]));
        let stretched = stretch_contrast(&img);
        assert!(stretched.pixels().all(|p| p.0[0] == 77));
    }
}
