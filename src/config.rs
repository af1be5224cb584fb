//! Configuration types for the document pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Image preprocessing constants are fixed and
//! deliberately absent from this struct.

use crate::engines::{DocumentRenderer, EntityClassifier, LayoutDetector, TextRecognizer};
use crate::error::MedOcrError;
use crate::pipeline::chunk::DEFAULT_MAX_CHUNK_LENGTH;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for one or many `process_document` calls.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_medocr::{FailureMode, OutputMode, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .output(OutputMode::Both)
///     .failure_mode(FailureMode::Partial)
///     .max_chunk_length(400)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Which artifacts the CLI and `process_input` produce. Default: [`OutputMode::Text`].
    pub output: OutputMode,

    /// Maximum chunk length (characters) fed to the entity classifier. Default: 400.
    ///
    /// BioBERT-class models accept 512 word pieces; 400 characters of clinical
    /// prose stays comfortably under that.
    pub max_chunk_length: usize,

    /// What happens when the recognition engine fails on one block.
    /// Default: [`FailureMode::AllOrNothing`].
    pub failure_mode: FailureMode,

    /// Order in which recognised segments are emitted. Default: [`ReadingOrder::Detector`].
    pub reading_order: ReadingOrder,

    /// Pre-constructed layout detector. Bypasses the process-wide cache.
    pub layout_detector: Option<Arc<dyn LayoutDetector>>,

    /// Pre-constructed recognition engine. Bypasses the process-wide cache.
    pub recognizer: Option<Arc<dyn TextRecognizer>>,

    /// Pre-constructed entity classifier. Bypasses the process-wide cache.
    pub classifier: Option<Arc<dyn EntityClassifier>>,

    /// Pre-constructed document renderer. Default: [`crate::engines::pdf::PdfTextRenderer`].
    pub renderer: Option<Arc<dyn DocumentRenderer>>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama") for the
    /// bundled recognition and NER engines.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Vision model used by the bundled recognizer. Default: provider default.
    pub ocr_model: Option<String>,

    /// Chat model used by the bundled entity classifier. Default: provider default.
    pub ner_model: Option<String>,

    /// Sampling temperature for LLM-backed engines. Default: 0.0.
    ///
    /// Transcription and entity tagging are extraction tasks; any sampling
    /// randomness only makes repeated runs disagree.
    pub temperature: f32,

    /// Maximum tokens an LLM-backed engine may generate per call. Default: 2048.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient LLM failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-block progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output: OutputMode::default(),
            max_chunk_length: DEFAULT_MAX_CHUNK_LENGTH,
            failure_mode: FailureMode::default(),
            reading_order: ReadingOrder::default(),
            layout_detector: None,
            recognizer: None,
            classifier: None,
            renderer: None,
            provider_name: None,
            provider: None,
            ocr_model: None,
            ner_model: None,
            temperature: 0.0,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("output", &self.output)
            .field("max_chunk_length", &self.max_chunk_length)
            .field("failure_mode", &self.failure_mode)
            .field("reading_order", &self.reading_order)
            .field("layout_detector", &self.layout_detector.as_ref().map(|_| "<dyn LayoutDetector>"))
            .field("recognizer", &self.recognizer.as_ref().map(|_| "<dyn TextRecognizer>"))
            .field("classifier", &self.classifier.as_ref().map(|_| "<dyn EntityClassifier>"))
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn DocumentRenderer>"))
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("ocr_model", &self.ocr_model)
            .field("ner_model", &self.ner_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when the configured output mode includes the PDF artifact.
    pub fn wants_export(&self) -> bool {
        self.output.wants_export()
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn output(mut self, mode: OutputMode) -> Self {
        self.config.output = mode;
        self
    }

    pub fn max_chunk_length(mut self, n: usize) -> Self {
        self.config.max_chunk_length = n;
        self
    }

    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.config.failure_mode = mode;
        self
    }

    pub fn reading_order(mut self, order: ReadingOrder) -> Self {
        self.config.reading_order = order;
        self
    }

    pub fn layout_detector(mut self, detector: Arc<dyn LayoutDetector>) -> Self {
        self.config.layout_detector = Some(detector);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn EntityClassifier>) -> Self {
        self.config.classifier = Some(classifier);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = Some(model.into());
        self
    }

    pub fn ner_model(mut self, model: impl Into<String>) -> Self {
        self.config.ner_model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, MedOcrError> {
        let c = &self.config;
        if c.max_chunk_length == 0 {
            return Err(MedOcrError::InvalidConfig(
                "max_chunk_length must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(MedOcrError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(MedOcrError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which artifacts a request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Text, segments and entities only. (default)
    #[default]
    Text,
    /// Text, segments, entities and the PDF.
    Pdf,
    /// Same artifacts as `Pdf`; kept for clients that ask for "both".
    Both,
}

impl OutputMode {
    pub fn wants_export(self) -> bool {
        matches!(self, OutputMode::Pdf | OutputMode::Both)
    }
}

impl FromStr for OutputMode {
    type Err = MedOcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputMode::Text),
            "pdf" => Ok(OutputMode::Pdf),
            "both" => Ok(OutputMode::Both),
            other => Err(MedOcrError::InvalidConfig(format!(
                "output must be one of text, pdf, both (got '{other}')"
            ))),
        }
    }
}

/// Policy for a recognition failure on a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailureMode {
    /// Abort the whole request on the first failing block. (default)
    #[default]
    AllOrNothing,
    /// Record the failure in `failed_segments` and keep going.
    Partial,
}

/// Order of segments in the resulting document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadingOrder {
    /// Whatever order the layout detector emitted. (default)
    #[default]
    Detector,
    /// Top-to-bottom, then left-to-right, by bounding-box origin.
    Spatial,
}
