//! Error types for the edgequake-medocr library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`MedOcrError`] — **Fatal**: the request cannot produce a result (the
//!   bytes are not an image, the OCR engine failed on a block, the NER model
//!   is not configured). Returned as `Err(MedOcrError)` from the top-level
//!   `process*` functions. The pipeline is all-or-nothing by default: no
//!   partial output ever accompanies a fatal error.
//!
//! * [`SegmentError`] — **Non-fatal**: a single layout block failed to
//!   recognise. Only produced when the caller opts into
//!   [`crate::config::FailureMode::Partial`]; stored in
//!   [`crate::output::PipelineResult::failed_segments`].
//!
//! * [`EngineError`] — what every pluggable engine returns. The pipeline
//!   wraps it into the stage-specific [`MedOcrError`] variant so callers can
//!   tell a layout failure from a recognition failure from an export failure.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-medocr library.
#[derive(Debug, Error)]
pub enum MedOcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read but do not carry a known image signature.
    #[error("'{source_name}' is not a supported image (PNG, JPEG, TIFF, BMP, WebP)\nFirst bytes: {magic:?}")]
    UnsupportedFormat { source_name: String, magic: Vec<u8> },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The input bytes could not be decoded as an image.
    #[error("Failed to decode image: {detail}")]
    DecodeFailed { detail: String },

    /// The layout detector failed on the preprocessed image.
    #[error("Layout detection failed: {detail}")]
    LayoutFailed { detail: String },

    /// The recognition engine failed on a block (1-indexed in detection order).
    #[error("Text recognition failed on block {block}: {detail}")]
    RecognitionFailed { block: usize, detail: String },

    /// The entity classifier failed on a chunk (1-indexed).
    #[error("Entity extraction failed on chunk {chunk}: {detail}")]
    ClassificationFailed { chunk: usize, detail: String },

    /// The document renderer could not produce bytes.
    #[error("PDF export failed: {detail}")]
    ExportFailed { detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A cached model could not be constructed.
    #[error("Failed to initialise {model} model: {detail}")]
    ModelInitFailed { model: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single layout block.
///
/// Recorded in [`crate::output::PipelineResult::failed_segments`] when
/// [`crate::config::FailureMode::Partial`] is active.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum SegmentError {
    /// Recognition engine failed on this block.
    #[error("Block {block}: text recognition failed: {detail}")]
    RecognitionFailed { block: usize, detail: String },
}

/// Error returned by a pluggable engine (layout, OCR, NER, renderer).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for EngineError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for EngineError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognition_failed_display() {
        let e = MedOcrError::RecognitionFailed {
            block: 3,
            detail: "engine crashed".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("block 3"), "got: {msg}");
        assert!(msg.contains("engine crashed"));
    }

    #[test]
    fn classification_failed_display() {
        let e = MedOcrError::ClassificationFailed {
            chunk: 2,
            detail: "rate limited".into(),
        };
        assert!(e.to_string().contains("chunk 2"));
    }

    #[test]
    fn decode_failed_display() {
        let e = MedOcrError::DecodeFailed {
            detail: "unexpected EOF".into(),
        };
        assert!(e.to_string().starts_with("Failed to decode image"));
    }

    #[test]
    fn segment_error_serialises() {
        let e = SegmentError::RecognitionFailed {
            block: 1,
            detail: "timeout".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("RecognitionFailed"));
        assert!(e.to_string().contains("Block 1"));
    }

    #[test]
    fn engine_error_from_str() {
        let e: EngineError = "boom".into();
        assert_eq!(e.message(), "boom");
        assert_eq!(e.to_string(), "boom");
    }
}
