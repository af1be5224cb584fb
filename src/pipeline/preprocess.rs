//! Image normalisation: decode → grayscale → bilateral denoise → Otsu.
//!
//! Scans and phone photos carry sensor noise, JPEG ringing and uneven paper
//! tone. A bilateral filter smooths the noise while keeping stroke edges
//! sharp, and Otsu's global threshold then splits the histogram into ink and
//! paper. Every downstream stage (layout contours, OCR crops) sees a strictly
//! two-valued image.
//!
//! The filter constants are fixed; callers cannot tune them.

use crate::error::MedOcrError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use tracing::debug;

/// Diameter of the bilateral neighbourhood, in pixels.
pub const BILATERAL_DIAMETER: u32 = 9;
/// Range (intensity) sigma of the bilateral filter.
pub const BILATERAL_SIGMA_COLOR: f32 = 75.0;
/// Spatial sigma of the bilateral filter.
pub const BILATERAL_SIGMA_SPACE: f32 = 75.0;

/// Decode raw bytes into an image, guessing the format from its signature.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, MedOcrError> {
    image::load_from_memory(bytes).map_err(|e| MedOcrError::DecodeFailed {
        detail: e.to_string(),
    })
}

/// Normalise an image into a binarised single-channel page.
///
/// The output has the same dimensions as the input and contains only the
/// values 0 and 255.
pub fn preprocess(image: &DynamicImage) -> GrayImage {
    let gray = to_gray_rec601(image);
    let denoised = bilateral_filter(
        &gray,
        BILATERAL_DIAMETER,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPACE,
    );
    let level = otsu_level(&denoised);
    debug!(
        "Preprocessed {}x{} image, Otsu level {}",
        gray.width(),
        gray.height(),
        level
    );
    binarize(&denoised, level)
}

/// Luma with the BT.601 weights (0.299, 0.587, 0.114) used by scanner and
/// OpenCV pipelines. `DynamicImage::to_luma8` uses BT.709, which shifts the
/// Otsu level on colour scans.
pub fn to_gray_rec601(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Map pixels above `level` to 255 and the rest to 0.
fn binarize(image: &GrayImage, level: u8) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        p.0[0] = if p.0[0] > level { 255 } else { 0 };
    }
    out
}

/// Decode and preprocess in one step.
pub fn decode_and_preprocess(bytes: &[u8]) -> Result<GrayImage, MedOcrError> {
    let image = decode_image(bytes)?;
    Ok(preprocess(&image))
}

/// Edge-preserving bilateral filter over a circular window.
///
/// Each output pixel is the average of its neighbours within
/// `diameter / 2`, weighted by spatial distance and by intensity difference.
/// Neighbours outside the image are mirrored back in without repeating the
/// edge pixel (`dcb|abcd|cba`).
pub fn bilateral_filter(
    image: &GrayImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> GrayImage {
    let (w, h) = image.dimensions();
    let radius = (diameter / 2) as i64;
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    // Spatial kernel restricted to the disc.
    let mut kernel: Vec<(i64, i64, f32)> = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = (dx * dx + dy * dy) as f32;
            if d2.sqrt() > radius as f32 {
                continue;
            }
            kernel.push((dx, dy, (d2 * space_coeff).exp()));
        }
    }

    // Intensity kernel indexed by absolute difference.
    let color_weight: Vec<f32> = (0..256)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    GrayImage::from_fn(w, h, |x, y| {
        let center = image.get_pixel(x, y).0[0];
        let mut sum = 0.0f32;
        let mut weight_sum = 0.0f32;

        for &(dx, dy, spatial) in &kernel {
            let nx = reflect_101(x as i64 + dx, w);
            let ny = reflect_101(y as i64 + dy, h);
            let value = image.get_pixel(nx, ny).0[0];
            let weight = spatial * color_weight[center.abs_diff(value) as usize];
            sum += value as f32 * weight;
            weight_sum += weight;
        }

        let out = if weight_sum > 0.0 {
            (sum / weight_sum).round().clamp(0.0, 255.0) as u8
        } else {
            center
        };
        Luma([out])
    })
}

/// Mirror an out-of-range coordinate into `0..len`, excluding the border
/// pixel itself.
fn reflect_101(mut i: i64, len: u32) -> u32 {
    let n = len as i64;
    if n <= 1 {
        return 0;
    }
    while i < 0 || i >= n {
        i = if i < 0 { -i } else { 2 * (n - 1) - i };
    }
    i as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn two_tone(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            // noisy dark text band on light paper
            let noise = ((x * 7 + y * 13) % 11) as u8;
            if (10..20).contains(&y) {
                Rgb([30 + noise, 30 + noise, 40 + noise])
            } else {
                Rgb([220 - noise, 215 - noise, 210 - noise])
            }
        })
    }

    #[test]
    fn output_is_binary_and_same_size() {
        let img = DynamicImage::ImageRgb8(two_tone(40, 30));
        let out = preprocess(&img);
        assert_eq!(out.dimensions(), (40, 30));
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.get_pixel(5, 15).0[0], 0);
        assert_eq!(out.get_pixel(5, 2).0[0], 255);
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([200])));
        let out = preprocess(&img);
        let first = out.get_pixel(0, 0).0[0];
        assert!(out.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn bilateral_preserves_hard_edges() {
        let img = GrayImage::from_fn(20, 20, |x, _| if x < 10 { Luma([0]) } else { Luma([255]) });
        let out = bilateral_filter(&img, 9, 75.0, 75.0);
        assert!(out.get_pixel(9, 10).0[0] < 10);
        assert!(out.get_pixel(10, 10).0[0] > 245);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, MedOcrError::DecodeFailed { .. }));
    }

    #[test]
    fn decode_png_roundtrip() {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(two_tone(8, 8))
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let out = decode_and_preprocess(&buf).unwrap();
        assert_eq!(out.dimensions(), (8, 8));
    }

    #[test]
    fn grayscale_uses_bt601_weights() {
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        });
        let gray = to_gray_rec601(&DynamicImage::ImageRgb8(img));
        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        assert_eq!(gray.get_pixel(1, 0).0[0], 150);
        assert_eq!(gray.get_pixel(2, 0).0[0], 29);
    }

    #[test]
    fn border_reflects_without_repeating_edge() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(8, 5), 0);
        assert_eq!(reflect_101(-4, 2), 0);
        assert_eq!(reflect_101(3, 1), 0);
    }

    #[test]
    fn bilateral_border_matches_mirrored_interior() {
        // Left edge of `page` must filter exactly like the centre of `mirrored`,
        // which spells out the reflection explicitly.
        let cols = [60u8, 150, 200, 90, 120];
        let page = GrayImage::from_fn(5, 5, |x, _| Luma([cols[x as usize]]));
        let mirrored = GrayImage::from_fn(9, 5, |x, _| {
            let i = (x as i64 - 4).unsigned_abs() as usize;
            Luma([cols[i]])
        });
        let a = bilateral_filter(&page, 9, 75.0, 75.0);
        let b = bilateral_filter(&mirrored, 9, 75.0, 75.0);
        for y in 0..5 {
            assert_eq!(a.get_pixel(0, y), b.get_pixel(4, y));
        }
    }

    #[test]
    fn tiny_images_filter_without_panicking() {
        for (w, h) in [(1, 1), (2, 1), (1, 3)] {
            let img = GrayImage::from_pixel(w, h, Luma([90]));
            assert_eq!(bilateral_filter(&img, 9, 75.0, 75.0), img);
        }
    }
}
