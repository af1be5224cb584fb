//! Contour-based layout detector for binarised pages.
//!
//! Characters of one paragraph are only a few pixels apart, paragraphs are
//! separated by wider whitespace. Dilating the ink mask with a radius between
//! those two distances merges each paragraph into a single connected blob;
//! the bounding rectangle of every outer contour is then one text block.
//!
//! Blocks are emitted in contour-discovery order (raster scan of the blob's
//! first pixel), which for simple single-column pages is top-to-bottom.

use super::{EngineResult, LayoutDetector};
use crate::output::{Block, BoundingBox};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use tracing::debug;

/// Dilation radius in pixels. Merges glyphs and lines of one paragraph.
pub const DEFAULT_MERGE_RADIUS: u8 = 6;

/// Blocks whose shorter side is below this are treated as specks.
pub const DEFAULT_MIN_BLOCK_SIDE: u32 = 4;

/// [`LayoutDetector`] built on `imageproc` morphology and contour tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContourLayoutDetector {
    merge_radius: u8,
    min_block_side: u32,
}

impl Default for ContourLayoutDetector {
    fn default() -> Self {
        Self {
            merge_radius: DEFAULT_MERGE_RADIUS,
            min_block_side: DEFAULT_MIN_BLOCK_SIDE,
        }
    }
}

impl ContourLayoutDetector {
    pub fn new(merge_radius: u8, min_block_side: u32) -> Self {
        Self {
            merge_radius,
            min_block_side,
        }
    }
}

impl LayoutDetector for ContourLayoutDetector {
    fn detect(&self, image: &GrayImage) -> EngineResult<Vec<Block>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let mask = ink_mask(image);
        let merged = if self.merge_radius > 0 {
            dilate(&mask, Norm::LInf, self.merge_radius)
        } else {
            mask
        };

        let mut boxes: Vec<BoundingBox> = find_contours::<u32>(&merged)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && !c.points.is_empty())
            .map(|c| {
                let x1 = c.points.iter().map(|p| p.x).min().unwrap_or(0);
                let y1 = c.points.iter().map(|p| p.y).min().unwrap_or(0);
                let x2 = c.points.iter().map(|p| p.x).max().unwrap_or(0) + 1;
                let y2 = c.points.iter().map(|p| p.y).max().unwrap_or(0) + 1;
                BoundingBox::new(x1, y1, x2.min(width), y2.min(height))
            })
            .filter(|b| b.width().min(b.height()) >= self.min_block_side)
            .collect();

        // Outer contours inside holes of a framed region duplicate its content.
        let snapshot = boxes.clone();
        boxes.retain(|b| {
            !snapshot
                .iter()
                .any(|other| other != b && other.contains(b))
        });

        debug!("Contour layout: {} blocks in {}x{} image", boxes.len(), width, height);
        Ok(boxes.into_iter().map(Block::text).collect())
    }
}

/// Foreground mask (255 = ink) of a binarised page.
///
/// Ink is whichever of the two levels is rarer, so both dark-on-light scans
/// and inverted negatives work.
fn ink_mask(image: &GrayImage) -> GrayImage {
    let total = u64::from(image.width()) * u64::from(image.height());
    let dark = image.pixels().filter(|p| p.0[0] < 128).count() as u64;
    let ink_is_dark = dark * 2 <= total;

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let is_dark = image.get_pixel(x, y).0[0] < 128;
        if is_dark == ink_is_dark {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BlockKind;

    fn page_with_rects(w: u32, h: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([255]));
        for &(x1, y1, x2, y2) in rects {
            for y in y1..y2 {
                for x in x1..x2 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        img
    }

    #[test]
    fn blank_page_has_no_blocks() {
        let img = GrayImage::from_pixel(100, 100, Luma([255]));
        let blocks = ContourLayoutDetector::default().detect(&img).unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn two_separated_paragraphs() {
        // Two "paragraphs", each made of two close "lines".
        let img = page_with_rects(
            200,
            200,
            &[
                (20, 20, 180, 30),
                (20, 34, 160, 44),
                (20, 120, 170, 130),
                (20, 134, 150, 144),
            ],
        );
        let blocks = ContourLayoutDetector::default().detect(&img).unwrap();
        assert_eq!(blocks.len(), 2, "{blocks:?}");
        assert!(blocks.iter().all(|b| b.kind == BlockKind::Text));

        let mut tops: Vec<u32> = blocks.iter().map(|b| b.bounding_box.y1).collect();
        tops.sort_unstable();
        assert!(tops[0] <= 20 && tops[1] <= 120 && tops[1] > 60);
        for b in &blocks {
            assert!(b.bounding_box.x2 <= 200 && b.bounding_box.y2 <= 200);
        }
    }

    #[test]
    fn inverted_page_detected() {
        let mut img = page_with_rects(100, 100, &[(10, 10, 90, 20)]);
        for p in img.pixels_mut() {
            p.0[0] = 255 - p.0[0];
        }
        let blocks = ContourLayoutDetector::default().detect(&img).unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn specks_are_ignored() {
        let img = page_with_rects(100, 100, &[(50, 50, 51, 51)]);
        let blocks = ContourLayoutDetector::new(0, 4).detect(&img).unwrap();
        assert!(blocks.is_empty());
    }
}
