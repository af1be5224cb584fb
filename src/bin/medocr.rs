//! CLI binary for edgequake-medocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_medocr::process::{error_envelope, write_atomic};
use edgequake_medocr::{
    process_input, FailureMode, OutputMode, PipelineConfig, PipelineProgressCallback,
    PipelineResult, ProgressCallback, ReadingOrder,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while preprocessing, then a bar over the text blocks, then a
/// spinner again while chunks are classified.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Cleaning image…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_recognition_start(&self, total_blocks: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} blocks  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_blocks as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Reading");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_blocks} text blocks found"))
        ));
    }

    fn on_block_start(&self, block: usize, _total: usize) {
        self.bar.set_message(format!("block {block}"));
    }

    fn on_block_complete(&self, block: usize, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Block {:>3}/{:<3}  {}",
            green("✓"),
            block,
            total,
            dim(&format!("{text_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_block_skipped(&self, block: usize, total: usize, reason: &str) {
        self.bar.println(format!(
            "  {} Block {:>3}/{:<3}  {}",
            dim("·"),
            block,
            total,
            dim(reason),
        ));
        self.bar.inc(1);
    }

    fn on_block_error(&self, block: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('\u{2026}');
            s
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Block {:>3}/{:<3}  {}",
            red("✗"),
            block,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_start(&self, total_chunks: usize) {
        self.bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        self.bar.set_prefix("Tagging");
        self.bar.set_message(format!("0/{total_chunks} chunks"));
    }

    fn on_chunk_complete(&self, chunk: usize, total: usize, _entities: usize) {
        self.bar.set_message(format!("{chunk}/{total} chunks"));
    }

    fn on_pipeline_complete(&self, segments: usize, entities: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} segments, {} entities",
                green("✔"),
                bold(&segments.to_string()),
                bold(&entities.to_string())
            );
        } else {
            eprintln!(
                "{} {} segments, {} entities  ({} blocks failed)",
                cyan("⚠"),
                bold(&segments.to_string()),
                bold(&entities.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Text and entities to stdout
  medocr scan.png

  # Also produce a PDF of the recognised text
  medocr --output both --pdf-out report.pdf scan.jpg

  # Transport-shaped JSON (text, segments, entities, pdf_base64)
  medocr --json --output pdf https://example.com/discharge-note.png

  # Keep going when one block cannot be read
  medocr --partial --spatial-order scan.tiff -o note.txt

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID for both engines
  RUST_LOG                Log filter; overrides -v / -q
"#;

/// Extract text and biomedical entities from scanned documents.
#[derive(Parser, Debug)]
#[command(
    name = "medocr",
    version,
    about = "Extract text and biomedical entities from scanned documents",
    long_about = "Clean a scanned or photographed document image, find its text blocks, \
transcribe each block, and tag diseases, drugs, symptoms and other biomedical entities. \
Optionally re-package the recognised text as a PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image path or HTTP/HTTPS URL.
    input: String,

    /// Artifacts to produce: text, pdf, both.
    #[arg(long = "output", env = "MEDOCR_OUTPUT", default_value = "text")]
    output_mode: OutputMode,

    /// Write the recognised text to this file instead of stdout.
    #[arg(short = 'o', long = "text-out", env = "MEDOCR_TEXT_OUT")]
    text_out: Option<PathBuf>,

    /// Where to write the PDF (default: <input stem>.pdf).
    #[arg(long, env = "MEDOCR_PDF_OUT")]
    pdf_out: Option<PathBuf>,

    /// Print the JSON envelope instead of plain text.
    #[arg(long, env = "MEDOCR_JSON")]
    json: bool,

    /// Record per-block recognition failures instead of aborting.
    #[arg(long, env = "MEDOCR_PARTIAL")]
    partial: bool,

    /// Emit segments top-to-bottom, left-to-right instead of detector order.
    #[arg(long, env = "MEDOCR_SPATIAL_ORDER")]
    spatial_order: bool,

    /// Maximum characters per NER chunk.
    #[arg(long, env = "MEDOCR_MAX_CHUNK_LENGTH", default_value_t = 400)]
    max_chunk_length: usize,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Vision model for text recognition.
    #[arg(long, env = "MEDOCR_OCR_MODEL")]
    ocr_model: Option<String>,

    /// Chat model for entity tagging.
    #[arg(long, env = "MEDOCR_NER_MODEL")]
    ner_model: Option<String>,

    /// Retries per LLM call on failure.
    #[arg(long, env = "MEDOCR_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-LLM-call timeout in seconds.
    #[arg(long, env = "MEDOCR_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MEDOCR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "MEDOCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MEDOCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MEDOCR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v was given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = match process_input(&cli.input, &config).await {
        Ok(result) => result,
        Err(e) if cli.json => {
            println!("{}", error_envelope(&e));
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Processing failed"),
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else {
        write_text(&cli, &result).await?;
    }

    if let Some(ref pdf) = result.pdf {
        if !cli.json || cli.pdf_out.is_some() {
            let path = cli
                .pdf_out
                .clone()
                .unwrap_or_else(|| default_pdf_path(&cli.input));
            write_atomic(&path, pdf)
                .await
                .with_context(|| format!("Failed to write PDF to {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{}  PDF  →  {}", green("✔"), bold(&path.display().to_string()));
            }
        }
    }

    if !cli.quiet && !show_progress && !cli.json {
        eprintln!(
            "Recognised {} segments, {} entities in {}ms",
            result.stats.recognized_segments, result.stats.entities, result.stats.total_ms
        );
        if result.stats.failed_blocks > 0 {
            eprintln!("  {} blocks failed", result.stats.failed_blocks);
        }
    }

    Ok(())
}

/// Print the text (to stdout or `--text-out`) followed by the entity table.
async fn write_text(cli: &Cli, result: &PipelineResult) -> Result<()> {
    if let Some(ref path) = cli.text_out {
        write_atomic(path, result.text.as_bytes())
            .await
            .with_context(|| format!("Failed to write text to {}", path.display()))?;
        if !cli.quiet {
            eprintln!("{}  text  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(result.text.as_bytes())
            .context("Failed to write to stdout")?;
        if !result.text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !result.entities.is_empty() {
        eprintln!();
        for entity in &result.entities {
            eprintln!(
                "  {:<24} {:<20} {}",
                bold(&entity.text),
                cyan(&entity.label),
                dim(&format!("{:.2}", entity.score)),
            );
        }
    }
    Ok(())
}

/// `<input stem>.pdf` in the working directory.
fn default_pdf_path(input: &str) -> PathBuf {
    let stem = if input.starts_with("http://") || input.starts_with("https://") {
        input
            .rsplit('/')
            .next()
            .and_then(|last| Path::new(last).file_stem())
            .map(|s| s.to_os_string())
    } else {
        Path::new(input).file_stem().map(|s| s.to_os_string())
    };
    let mut name = stem
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".into());
    name.push(".pdf");
    PathBuf::from(name)
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .output(cli.output_mode)
        .max_chunk_length(cli.max_chunk_length)
        .failure_mode(if cli.partial {
            FailureMode::Partial
        } else {
            FailureMode::AllOrNothing
        })
        .reading_order(if cli.spatial_order {
            ReadingOrder::Spatial
        } else {
            ReadingOrder::Detector
        })
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name);
    }
    if let Some(ref model) = cli.ocr_model {
        builder = builder.ocr_model(model);
    }
    if let Some(ref model) = cli.ner_model {
        builder = builder.ner_model(model);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
