//! Pluggable model engines.
//!
//! The pipeline never talks to a concrete OCR, layout, NER or PDF library.
//! It talks to the four narrow traits below, so an engine can be swapped
//! (a local ONNX recognizer instead of a vision LLM, say) without touching
//! any pipeline stage.
//!
//! | Trait | Contract | Bundled implementation |
//! |-------|----------|------------------------|
//! | [`LayoutDetector`]   | `detect(image) -> Vec<Block>`        | [`layout::ContourLayoutDetector`] |
//! | [`TextRecognizer`]   | `recognize(region) -> String`        | [`vision::VisionTextRecognizer`]  |
//! | [`EntityClassifier`] | `classify(text) -> Vec<Prediction>`  | [`ner::LlmEntityClassifier`]      |
//! | [`DocumentRenderer`] | `render(text) -> Vec<u8>`            | [`pdf::PdfTextRenderer`]          |
//!
//! Layout detection and rendering are CPU-bound and synchronous; the pipeline
//! runs them on the blocking pool. Recognition and classification are usually
//! network- or accelerator-bound and are therefore `async`.
//!
//! Engines must be `Send + Sync`: one instance is shared by every request
//! through [`cache::ModelCell`].

pub mod cache;
pub mod layout;
pub mod llm;
pub mod ner;
pub mod pdf;
pub mod provider;
pub mod reply;
pub mod vision;

use crate::error::EngineError;
use crate::output::Block;
use async_trait::async_trait;
use image::GrayImage;

pub type EngineResult<T> = Result<T, EngineError>;

/// Finds rectangular regions in a binarised page image.
pub trait LayoutDetector: Send + Sync {
    /// Blocks in the detector's native order.
    fn detect(&self, image: &GrayImage) -> EngineResult<Vec<Block>>;
}

/// Turns an image region into text.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Raw engine output; the pipeline trims it.
    async fn recognize(&self, region: &GrayImage) -> EngineResult<String>;
}

/// One raw prediction from an entity classifier.
///
/// `start` / `end` are character offsets inside the text passed to
/// [`EntityClassifier::classify`].
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub score: Option<f32>,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Tags named entities in a length-bounded piece of text.
#[async_trait]
pub trait EntityClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> EngineResult<Vec<Prediction>>;
}

/// Serialises plain text into a document format.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, text: &str) -> EngineResult<Vec<u8>>;
}
