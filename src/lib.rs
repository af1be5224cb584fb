//! # edgequake-medocr
//!
//! Turn a scanned or photographed medical document into structured text and
//! biomedical named entities, optionally re-packaged as a PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image bytes
//!  │
//!  ├─ 1. Preprocess  grayscale → bilateral denoise → Otsu binarize
//!  ├─ 2. Layout      detect text blocks (spawn_blocking)
//!  ├─ 3. Recognize   crop + transcribe each block, in order
//!  ├─ 4. Chunk       re-split full text at line boundaries (≤ 400 chars)
//!  ├─ 5. Entities    tag each chunk, merge in chunk order
//!  └─ 6. Export      optional PDF of the full text
//! ```
//!
//! Every model is a black box behind a trait in [`engines`]. The bundled
//! defaults are a contour layout detector, a vision-LLM recognizer, an
//! LLM entity tagger and a `lopdf` renderer; any of them can be replaced
//! through [`PipelineConfig`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_medocr::{process_document, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let bytes = std::fs::read("discharge-note.png")?;
//!     let result = process_document(&bytes, true, &PipelineConfig::default()).await?;
//!     println!("{}", result.text);
//!     for e in &result.entities {
//!         println!("{:>10}  {}", e.label, e.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `medocr` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-medocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engines;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FailureMode, OutputMode, PipelineConfig, PipelineConfigBuilder, ReadingOrder};
pub use engines::{DocumentRenderer, EntityClassifier, LayoutDetector, Prediction, TextRecognizer};
pub use error::{EngineError, MedOcrError, SegmentError};
pub use output::{
    Block, BlockKind, BoundingBox, Document, Entity, ErrorEnvelope, PipelineResult, PipelineStats,
    Segment,
};
pub use pipeline::export::encode_pdf_base64;
pub use process::{
    process_document, process_document_sync, process_input, process_to_envelope, process_to_file,
};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
