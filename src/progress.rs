//! Progress-callback trait for per-block pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the recognizer walks the layout blocks and the extractor walks
//! the chunks.
//!
//! # Example
//!
//! ```rust
//! use edgequake_medocr::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     recognised: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_block_complete(&self, block: usize, total: usize, text_len: usize) {
//!         self.recognised.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Block {}/{} done ({} chars)", block, total, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { recognised: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each block and chunk.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Block and chunk numbers are 1-indexed.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once after layout detection, with the number of `Text` blocks.
    fn on_recognition_start(&self, total_blocks: usize) {
        let _ = total_blocks;
    }

    /// Called just before the recognition engine runs on a block.
    fn on_block_start(&self, block: usize, total_blocks: usize) {
        let _ = (block, total_blocks);
    }

    /// Called when a block produced a non-empty segment.
    fn on_block_complete(&self, block: usize, total_blocks: usize, text_len: usize) {
        let _ = (block, total_blocks, text_len);
    }

    /// Called when a block was dropped (degenerate crop or blank text).
    fn on_block_skipped(&self, block: usize, total_blocks: usize, reason: &str) {
        let _ = (block, total_blocks, reason);
    }

    /// Called when recognition failed on a block.
    fn on_block_error(&self, block: usize, total_blocks: usize, error: &str) {
        let _ = (block, total_blocks, error);
    }

    /// Called once entity extraction is about to classify `total_chunks` chunks.
    fn on_extraction_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called after a chunk has been classified.
    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, entities: usize) {
        let _ = (chunk, total_chunks, entities);
    }

    /// Called once after the whole request succeeded.
    fn on_pipeline_complete(&self, segments: usize, entities: usize) {
        let _ = (segments, entities);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
