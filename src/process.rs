//! Request orchestration: the entry points the CLI and transports call.
//!
//! [`process_document`] is the whole pipeline for one image. It owns the
//! error boundary: every stage failure surfaces as one [`MedOcrError`] and
//! no partial result accompanies it.
//!
//! ## Engine resolution
//!
//! Engines supplied in [`PipelineConfig`] are used as-is. Otherwise the
//! bundled defaults come from process-wide caches, constructed by the first
//! request that needs them and shared by every later one. The LLM-backed
//! engines are cached per [`EngineKey`] (provider name, model, call options),
//! so a request that asks for a different model or provider gets its own
//! instance. A default engine built from a config-supplied LLM provider is
//! request-scoped and never enters the cache.
//!
//! Engines are resolved lazily: a page with no text blocks never touches the
//! recognizer, and blank text never touches the classifier, so neither needs
//! a configured provider.

use crate::config::PipelineConfig;
use crate::engines::cache::{ModelCell, ModelRegistry};
use crate::engines::layout::ContourLayoutDetector;
use crate::engines::llm::LlmCallOptions;
use crate::engines::ner::LlmEntityClassifier;
use crate::engines::pdf::PdfTextRenderer;
use crate::engines::provider::{resolve_provider, DEFAULT_NER_MODEL, DEFAULT_OCR_MODEL};
use crate::engines::vision::VisionTextRecognizer;
use crate::engines::{DocumentRenderer, EntityClassifier, LayoutDetector, TextRecognizer};
use crate::error::MedOcrError;
use crate::output::{ErrorEnvelope, PipelineResult, PipelineStats};
use crate::pipeline::entities::classify_chunks;
use crate::pipeline::{chunk, export, input, layout, preprocess, recognize};
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

static LAYOUT_MODEL: Lazy<ModelCell<dyn LayoutDetector>> = Lazy::new(|| ModelCell::new("layout"));
static OCR_MODELS: Lazy<ModelRegistry<EngineKey, dyn TextRecognizer>> =
    Lazy::new(|| ModelRegistry::new("ocr"));
static NER_MODELS: Lazy<ModelRegistry<EngineKey, dyn EntityClassifier>> =
    Lazy::new(|| ModelRegistry::new("ner"));

/// Run the full pipeline on raw image bytes.
///
/// # Arguments
/// * `bytes` — Encoded image (PNG, JPEG, TIFF, BMP or WebP)
/// * `want_export` — Also render the recognised text into a PDF
/// * `config` — Pipeline configuration
///
/// # Errors
/// Any stage failure: undecodable bytes, layout failure, a recognition
/// failure (unless [`crate::FailureMode::Partial`]), a classifier failure,
/// an export failure, or an unconfigured default engine.
///
/// # Example
/// ```rust,no_run
/// use edgequake_medocr::{process_document, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("scan.png")?;
/// let result = process_document(&bytes, false, &PipelineConfig::default()).await?;
/// for entity in &result.entities {
///     println!("{} [{}] {:.2}", entity.text, entity.label, entity.score);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn process_document(
    bytes: &[u8],
    want_export: bool,
    config: &PipelineConfig,
) -> Result<PipelineResult, MedOcrError> {
    let total_start = Instant::now();
    let progress = config.progress_callback.as_deref();
    info!("Processing image: {} bytes", bytes.len());

    // ── Step 1: Decode + preprocess ──────────────────────────────────────
    let pre_start = Instant::now();
    let owned = bytes.to_vec();
    let image = tokio::task::spawn_blocking(move || preprocess::decode_and_preprocess(&owned))
        .await
        .map_err(|e| MedOcrError::Internal(format!("preprocess task panicked: {e}")))??;
    let image = Arc::new(image);
    let preprocess_ms = pre_start.elapsed().as_millis() as u64;
    info!(
        "Preprocessed {}x{} image in {}ms",
        image.width(),
        image.height(),
        preprocess_ms
    );

    // ── Step 2: Layout ───────────────────────────────────────────────────
    let rec_start = Instant::now();
    let detector = resolve_layout_detector(config).await?;
    let order = config.reading_order;
    let layout_image = Arc::clone(&image);
    let layout = tokio::task::spawn_blocking(move || {
        layout::segment_layout(detector.as_ref(), &layout_image, order)
    })
    .await
    .map_err(|e| MedOcrError::Internal(format!("layout task panicked: {e}")))??;
    info!("Layout: {} text blocks", layout.blocks.len());

    // ── Step 3: Recognition ──────────────────────────────────────────────
    let recognition = if layout.blocks.is_empty() {
        recognize::Recognition::default()
    } else {
        let recognizer = resolve_recognizer(config).await?;
        recognize::recognize_segments(
            &image,
            &layout.blocks,
            recognizer.as_ref(),
            config.failure_mode,
            progress,
        )
        .await?
    };
    let recognition_ms = rec_start.elapsed().as_millis() as u64;
    let document = recognition.document;
    info!(
        "Recognised {} segments in {}ms",
        document.segments.len(),
        recognition_ms
    );

    // ── Step 4: Entity extraction ────────────────────────────────────────
    let ext_start = Instant::now();
    let chunks = chunk::chunk_text(&document.full_text, config.max_chunk_length);
    let chunk_count = chunks.len();
    let entities = if chunks.is_empty() {
        debug!("No text recognised; skipping entity extraction");
        Vec::new()
    } else {
        let classifier = resolve_classifier(config).await?;
        classify_chunks(classifier.as_ref(), &chunks, progress).await?
    };
    let extraction_ms = ext_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} entities from {} chunks in {}ms",
        entities.len(),
        chunk_count,
        extraction_ms
    );

    // ── Step 5: Export ───────────────────────────────────────────────────
    let pdf = if want_export {
        let renderer = resolve_renderer(config);
        let text = document.full_text.clone();
        let bytes =
            tokio::task::spawn_blocking(move || export::export_document(renderer.as_ref(), &text))
                .await
                .map_err(|e| MedOcrError::Internal(format!("export task panicked: {e}")))??;
        info!("Exported PDF: {} bytes", bytes.len());
        Some(bytes)
    } else {
        None
    };

    // ── Step 6: Stats ────────────────────────────────────────────────────
    let stats = PipelineStats {
        detected_blocks: layout.detected,
        text_blocks: layout.blocks.len(),
        recognized_segments: document.segments.len(),
        skipped_blocks: recognition.skipped,
        failed_blocks: recognition.failed.len(),
        chunks: chunk_count,
        entities: entities.len(),
        preprocess_ms,
        recognition_ms,
        extraction_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Processing complete: {} segments, {} entities, {}ms total",
        stats.recognized_segments, stats.entities, stats.total_ms
    );
    if let Some(cb) = progress {
        cb.on_pipeline_complete(stats.recognized_segments, stats.entities);
    }

    Ok(PipelineResult {
        text: document.full_text,
        segments: document.segments,
        entities,
        pdf,
        failed_segments: recognition.failed,
        stats,
    })
}

/// Resolve a local path or HTTP(S) URL, then run [`process_document`].
///
/// Export is requested when `config.output` is `Pdf` or `Both`.
pub async fn process_input(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<PipelineResult, MedOcrError> {
    let input_str = input_str.as_ref();
    info!("Starting request: {}", input_str);
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    process_document(&resolved.bytes, config.wants_export(), config).await
}

/// Synchronous wrapper around [`process_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_document_sync(
    bytes: &[u8],
    want_export: bool,
    config: &PipelineConfig,
) -> Result<PipelineResult, MedOcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MedOcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_document(bytes, want_export, config))
}

/// Run the pipeline and shape the outcome the way the transport returns it.
///
/// Success yields the serialised [`PipelineResult`] (exported bytes as
/// `pdf_base64`); any failure yields `{"error": "<message>"}` and nothing
/// else.
pub async fn process_to_envelope(
    bytes: &[u8],
    want_export: bool,
    config: &PipelineConfig,
) -> serde_json::Value {
    match process_document(bytes, want_export, config).await {
        Ok(result) => serde_json::to_value(&result).unwrap_or_else(|e| {
            error_envelope(&MedOcrError::Internal(format!("result serialisation: {e}")))
        }),
        Err(e) => error_envelope(&e),
    }
}

/// The uniform `{"error": ...}` body for a fatal error.
pub fn error_envelope(err: &MedOcrError) -> serde_json::Value {
    serde_json::json!(ErrorEnvelope {
        error: err.to_string(),
    })
}

/// Process an input and write the recognised text to `output_path`.
///
/// When a PDF was exported it is written next to the text file with a `.pdf`
/// extension. Both writes are atomic (temp file + rename).
pub async fn process_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineStats, MedOcrError> {
    let result = process_input(input_str, config).await?;
    let path = output_path.as_ref();

    write_atomic(path, result.text.as_bytes()).await?;
    if let Some(ref pdf) = result.pdf {
        write_atomic(&path.with_extension("pdf"), pdf).await?;
    }
    Ok(result.stats)
}

/// Write `contents` to `path` through a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), MedOcrError> {
    let write_err = |e| MedOcrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── Engine resolution ────────────────────────────────────────────────────

/// Everything that shapes a bundled LLM engine at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EngineKey {
    provider_name: Option<String>,
    model: Option<String>,
    temperature_bits: u32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl EngineKey {
    fn new(config: &PipelineConfig, model: Option<&str>) -> Self {
        let opts = LlmCallOptions::from(config);
        Self {
            provider_name: config.provider_name.clone(),
            model: model.map(str::to_string),
            temperature_bits: opts.temperature.to_bits(),
            max_tokens: opts.max_tokens,
            max_retries: opts.max_retries,
            retry_backoff_ms: opts.retry_backoff_ms,
            timeout_secs: opts.timeout_secs,
        }
    }
}

async fn resolve_layout_detector(
    config: &PipelineConfig,
) -> Result<Arc<dyn LayoutDetector>, MedOcrError> {
    if let Some(ref detector) = config.layout_detector {
        return Ok(Arc::clone(detector));
    }
    LAYOUT_MODEL
        .get_or_try_init(|| async {
            Ok(Arc::new(ContourLayoutDetector::default()) as Arc<dyn LayoutDetector>)
        })
        .await
}

async fn resolve_recognizer(
    config: &PipelineConfig,
) -> Result<Arc<dyn TextRecognizer>, MedOcrError> {
    if let Some(ref recognizer) = config.recognizer {
        return Ok(Arc::clone(recognizer));
    }
    let build = || async {
        let provider = resolve_provider(config, config.ocr_model.as_deref(), DEFAULT_OCR_MODEL)?;
        debug!(
            "OCR engine: vision LLM ({})",
            config.ocr_model.as_deref().unwrap_or(DEFAULT_OCR_MODEL)
        );
        Ok::<_, MedOcrError>(Arc::new(VisionTextRecognizer::new(
            provider,
            LlmCallOptions::from(config),
        )) as Arc<dyn TextRecognizer>)
    };
    if config.provider.is_some() {
        return build().await;
    }
    let key = EngineKey::new(config, config.ocr_model.as_deref());
    OCR_MODELS.get_or_try_init(key, build).await
}

async fn resolve_classifier(
    config: &PipelineConfig,
) -> Result<Arc<dyn EntityClassifier>, MedOcrError> {
    if let Some(ref classifier) = config.classifier {
        return Ok(Arc::clone(classifier));
    }
    let build = || async {
        let provider = resolve_provider(config, config.ner_model.as_deref(), DEFAULT_NER_MODEL)?;
        debug!(
            "NER engine: chat LLM ({})",
            config.ner_model.as_deref().unwrap_or(DEFAULT_NER_MODEL)
        );
        Ok::<_, MedOcrError>(Arc::new(LlmEntityClassifier::new(
            provider,
            LlmCallOptions::from(config),
        )) as Arc<dyn EntityClassifier>)
    };
    if config.provider.is_some() {
        return build().await;
    }
    let key = EngineKey::new(config, config.ner_model.as_deref());
    NER_MODELS.get_or_try_init(key, build).await
}

fn resolve_renderer(config: &PipelineConfig) -> Arc<dyn DocumentRenderer> {
    config
        .renderer
        .as_ref()
        .map(Arc::clone)
        .unwrap_or_else(|| Arc::new(PdfTextRenderer))
}
