//! Result types produced by the pipeline.
//!
//! Field names on the wire (`bbox`, `type`, `score`, `entity`) follow the
//! JSON shape the OCR service has always returned, so existing consumers
//! keep working when the Rust pipeline replaces the old one.

use crate::error::SegmentError;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates, `x1 < x2`, `y1 < y2`.
///
/// Serialised as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// True when the box has zero width or height.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Clamp to a `width` × `height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        Self {
            x1: self.x1.min(width),
            y1: self.y1.min(height),
            x2: self.x2.min(width),
            y2: self.y2.min(height),
        }
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x1 >= self.x1 && other.y1 >= self.y1 && other.x2 <= self.x2 && other.y2 <= self.y2
    }
}

impl From<[u32; 4]> for BoundingBox {
    fn from(v: [u32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [u32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Category of a detected layout region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    Text,
    Other,
}

/// One layout region as emitted by a [`crate::engines::LayoutDetector`].
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub bounding_box: BoundingBox,
    pub confidence: Option<f32>,
}

impl Block {
    pub fn text(bounding_box: BoundingBox) -> Self {
        Self {
            kind: BlockKind::Text,
            bounding_box,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// One recognised text region. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    #[serde(rename = "bbox")]
    pub bounding_box: BoundingBox,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(rename = "score")]
    pub confidence: Option<f32>,
}

/// Recognised text for a whole image.
///
/// `full_text` is always the segment texts joined by `"\n"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub full_text: String,
    pub segments: Vec<Segment>,
}

impl Document {
    /// Build a document from segments, deriving `full_text`.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            full_text,
            segments,
        }
    }
}

/// A labelled span found by the entity classifier.
///
/// `start` / `end` are character offsets inside chunk number `chunk`
/// (see [`crate::pipeline::chunk::chunk_text`]), not inside the full text.
/// `chunk` is a 0-based index into that chunk list. Error messages and
/// progress events number chunks from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "entity")]
    pub label: String,
    pub score: f32,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub chunk: usize,
}

/// Per-request counters and timings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Blocks emitted by the layout detector, any kind.
    pub detected_blocks: usize,
    /// Blocks of kind `Text`.
    pub text_blocks: usize,
    pub recognized_segments: usize,
    /// Degenerate crops and blank recognitions.
    pub skipped_blocks: usize,
    /// Blocks whose recognition failed (partial mode only).
    pub failed_blocks: usize,
    pub chunks: usize,
    pub entities: usize,
    pub preprocess_ms: u64,
    pub recognition_ms: u64,
    pub extraction_ms: u64,
    pub total_ms: u64,
}

/// Everything one `process_document` call produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub text: String,
    pub segments: Vec<Segment>,
    pub entities: Vec<Entity>,
    /// Raw PDF bytes when export was requested. Serialised as `pdf_base64`.
    #[serde(
        rename = "pdf_base64",
        with = "pdf_base64_field",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub pdf: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failed_segments: Vec<SegmentError>,
    #[serde(skip)]
    pub stats: PipelineStats,
}

impl PipelineResult {
    /// The exported PDF as base64, as the transport layer ships it.
    pub fn pdf_base64(&self) -> Option<String> {
        self.pdf.as_deref().map(crate::pipeline::export::encode_pdf_base64)
    }

    /// True when every text block was either recognised or legitimately skipped.
    pub fn is_complete(&self) -> bool {
        self.failed_segments.is_empty()
    }
}

/// Uniform failure body returned by the transport helpers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

mod pdf_base64_field {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(pdf: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match pdf {
            Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| STANDARD.decode(e).map_err(serde::de::Error::custom))
            .transpose()
    }
}
