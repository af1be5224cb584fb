//! Per-block text recognition.
//!
//! Blocks are recognised one at a time, in the order the layout stage
//! produced them. Each box is clamped to the image first; boxes that become
//! degenerate and blocks whose text trims to nothing are dropped silently,
//! so every emitted [`Segment`] carries non-empty text and a box that was
//! actually cropped.

use crate::config::FailureMode;
use crate::engines::TextRecognizer;
use crate::error::{MedOcrError, SegmentError};
use crate::output::{Block, Document, Segment};
use crate::progress::PipelineProgressCallback;
use image::{imageops, GrayImage};
use tracing::{debug, warn};

/// What the recognition stage produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    pub document: Document,
    /// Degenerate crops plus blank recognitions.
    pub skipped: usize,
    /// Failures isolated under [`FailureMode::Partial`].
    pub failed: Vec<SegmentError>,
}

/// Recognise every block and assemble the [`Document`].
///
/// Block numbers in errors and progress events are 1-indexed positions in
/// `blocks`.
pub async fn recognize_segments(
    image: &GrayImage,
    blocks: &[Block],
    recognizer: &dyn TextRecognizer,
    failure_mode: FailureMode,
    progress: Option<&dyn PipelineProgressCallback>,
) -> Result<Recognition, MedOcrError> {
    let (width, height) = image.dimensions();
    let total = blocks.len();
    let mut segments = Vec::with_capacity(total);
    let mut skipped = 0usize;
    let mut failed = Vec::new();

    if let Some(cb) = progress {
        cb.on_recognition_start(total);
    }

    for (idx, block) in blocks.iter().enumerate() {
        let num = idx + 1;
        let bbox = block.bounding_box.clamp_to(width, height);
        if bbox.is_empty() {
            debug!("Block {}/{}: degenerate box {:?}, skipped", num, total, block.bounding_box);
            skipped += 1;
            if let Some(cb) = progress {
                cb.on_block_skipped(num, total, "empty crop");
            }
            continue;
        }

        if let Some(cb) = progress {
            cb.on_block_start(num, total);
        }

        let region = imageops::crop_imm(image, bbox.x1, bbox.y1, bbox.width(), bbox.height())
            .to_image();

        let raw = match recognizer.recognize(&region).await {
            Ok(text) => text,
            Err(e) => {
                let detail = e.to_string();
                if let Some(cb) = progress {
                    cb.on_block_error(num, total, &detail);
                }
                match failure_mode {
                    FailureMode::AllOrNothing => {
                        return Err(MedOcrError::RecognitionFailed { block: num, detail });
                    }
                    FailureMode::Partial => {
                        warn!("Block {}/{}: recognition failed, continuing: {}", num, total, detail);
                        failed.push(SegmentError::RecognitionFailed { block: num, detail });
                        continue;
                    }
                }
            }
        };

        let text = raw.trim();
        if text.is_empty() {
            debug!("Block {}/{}: no text, skipped", num, total);
            skipped += 1;
            if let Some(cb) = progress {
                cb.on_block_skipped(num, total, "no text");
            }
            continue;
        }

        debug!("Block {}/{}: {} chars", num, total, text.chars().count());
        if let Some(cb) = progress {
            cb.on_block_complete(num, total, text.len());
        }
        segments.push(Segment {
            text: text.to_string(),
            bounding_box: bbox,
            kind: block.kind,
            confidence: block.confidence,
        });
    }

    Ok(Recognition {
        document: Document::from_segments(segments),
        skipped,
        failed,
    })
}
