//! Pipeline stages for image-to-structured-text processing.
//!
//! Each submodule implements exactly one transformation step and is
//! independently testable. Engines are passed in as trait objects; no stage
//! knows which model backs it.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ preprocess ──▶ layout ──▶ recognize ──▶ chunk ──▶ entities
//!                                        │
//!                                        └──▶ export (full text only)
//! ```
//!
//! 1. [`input`]      — resolve a path or URL to image bytes (CLI only)
//! 2. [`preprocess`] — decode, grayscale, bilateral denoise, Otsu binarize
//! 3. [`layout`]     — detect blocks, keep `Text`, optional spatial sort
//! 4. [`recognize`]  — crop and transcribe each block; the only per-block
//!    failure policy lives here
//! 5. [`chunk`]      — line-preserving re-split of the full text
//! 6. [`entities`]   — classify each chunk and merge
//! 7. [`export`]     — render the full text into a PDF

pub mod chunk;
pub mod entities;
pub mod export;
pub mod input;
pub mod layout;
pub mod preprocess;
pub mod recognize;
