//! Layout segmentation: run the detector and keep the text blocks.

use crate::config::ReadingOrder;
use crate::engines::LayoutDetector;
use crate::error::MedOcrError;
use crate::output::{Block, BlockKind};
use image::GrayImage;
use tracing::debug;

/// Blocks retained for recognition, plus how many the detector emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub blocks: Vec<Block>,
    pub detected: usize,
}

/// Detect blocks and keep only those of kind [`BlockKind::Text`].
///
/// Blocks stay in detector order unless `order` is
/// [`ReadingOrder::Spatial`], in which case they are stably sorted by
/// `(y1, x1)`.
pub fn segment_layout(
    detector: &dyn LayoutDetector,
    image: &GrayImage,
    order: ReadingOrder,
) -> Result<Layout, MedOcrError> {
    let detected = detector
        .detect(image)
        .map_err(|e| MedOcrError::LayoutFailed {
            detail: e.to_string(),
        })?;
    let detected_count = detected.len();

    let mut blocks: Vec<Block> = detected
        .into_iter()
        .filter(|b| b.kind == BlockKind::Text)
        .collect();

    if order == ReadingOrder::Spatial {
        blocks.sort_by_key(|b| (b.bounding_box.y1, b.bounding_box.x1));
    }

    debug!(
        "Layout: {} blocks detected, {} text blocks retained",
        detected_count,
        blocks.len()
    );
    Ok(Layout {
        blocks,
        detected: detected_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::EngineResult;
    use crate::error::EngineError;
    use crate::output::BoundingBox;
    use image::Luma;

    struct Fixed(Vec<Block>);

    impl LayoutDetector for Fixed {
        fn detect(&self, _image: &GrayImage) -> EngineResult<Vec<Block>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl LayoutDetector for Broken {
        fn detect(&self, _image: &GrayImage) -> EngineResult<Vec<Block>> {
            Err(EngineError::new("model weights corrupt"))
        }
    }

    fn block(kind: BlockKind, x1: u32, y1: u32) -> Block {
        Block {
            kind,
            bounding_box: BoundingBox::new(x1, y1, x1 + 10, y1 + 10),
            confidence: None,
        }
    }

    fn page() -> GrayImage {
        GrayImage::from_pixel(100, 100, Luma([255]))
    }

    #[test]
    fn non_text_blocks_are_dropped() {
        let detector = Fixed(vec![
            block(BlockKind::Other, 0, 0),
            block(BlockKind::Text, 0, 20),
            block(BlockKind::Other, 0, 40),
        ]);
        let layout = segment_layout(&detector, &page(), ReadingOrder::Detector).unwrap();
        assert_eq!(layout.detected, 3);
        assert_eq!(layout.blocks.len(), 1);
        assert_eq!(layout.blocks[0].bounding_box.y1, 20);
    }

    #[test]
    fn detector_order_is_kept_by_default() {
        let detector = Fixed(vec![
            block(BlockKind::Text, 0, 50),
            block(BlockKind::Text, 0, 10),
        ]);
        let layout = segment_layout(&detector, &page(), ReadingOrder::Detector).unwrap();
        let tops: Vec<u32> = layout.blocks.iter().map(|b| b.bounding_box.y1).collect();
        assert_eq!(tops, vec![50, 10]);
    }

    #[test]
    fn spatial_order_sorts_top_then_left() {
        let detector = Fixed(vec![
            block(BlockKind::Text, 40, 50),
            block(BlockKind::Text, 0, 50),
            block(BlockKind::Text, 70, 10),
        ]);
        let layout = segment_layout(&detector, &page(), ReadingOrder::Spatial).unwrap();
        let origins: Vec<(u32, u32)> = layout
            .blocks
            .iter()
            .map(|b| (b.bounding_box.x1, b.bounding_box.y1))
            .collect();
        assert_eq!(origins, vec![(70, 10), (0, 50), (40, 50)]);
    }

    #[test]
    fn detector_failure_maps_to_layout_failed() {
        let err = segment_layout(&Broken, &page(), ReadingOrder::Detector).unwrap_err();
        assert!(matches!(err, MedOcrError::LayoutFailed { ref detail } if detail.contains("corrupt")));
    }
}
