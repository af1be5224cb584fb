//! End-to-end pipeline tests with in-process stub engines.
//!
//! No network and no model weights: layout, recognition and entity tagging
//! are deterministic stubs injected through `PipelineConfig`, so every test
//! here exercises the real preprocessing, cropping, chunking, merging,
//! export and envelope code.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_medocr::{
    process_document, process_to_envelope, Block, BlockKind, BoundingBox, EngineError,
    EntityClassifier, FailureMode, LayoutDetector, MedOcrError, PipelineConfig,
    PipelineProgressCallback, Prediction, ReadingOrder, SegmentError, TextRecognizer,
};
use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

const DIABETES: &str = "Patient has diabetes.";
const METFORMIN: &str = "Prescribed metformin.";

/// A white 200x120 PNG with a dark horizontal band per `(y1, y2)`.
fn page_png(bands: &[(u32, u32)]) -> Vec<u8> {
    let mut img = GrayImage::from_pixel(200, 120, Luma([255]));
    for &(y1, y2) in bands {
        for y in y1..y2 {
            for x in 20..180 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
    }
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode test page");
    buf
}

/// Returns a fixed block list regardless of the image.
struct FixedLayout(Vec<Block>);

impl LayoutDetector for FixedLayout {
    fn detect(&self, _image: &GrayImage) -> Result<Vec<Block>, EngineError> {
        Ok(self.0.clone())
    }
}

fn text_block(y1: u32, y2: u32) -> Block {
    Block::text(BoundingBox::new(20, y1, 180, y2)).with_confidence(0.9)
}

fn two_paragraphs() -> Arc<FixedLayout> {
    Arc::new(FixedLayout(vec![text_block(10, 30), text_block(60, 90)]))
}

/// Transcribes by crop height: short crops are the diagnosis line, tall
/// crops the prescription line. Optionally fails on short crops.
#[derive(Default)]
struct HeightOcr {
    calls: AtomicUsize,
    fail_short: bool,
}

#[async_trait]
impl TextRecognizer for HeightOcr {
    async fn recognize(&self, region: &GrayImage) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if region.height() < 27 {
            if self.fail_short {
                return Err(EngineError::new("recognizer crashed"));
            }
            Ok(format!("  {DIABETES}\n"))
        } else {
            Ok(METFORMIN.to_string())
        }
    }
}

/// Tags a small fixed vocabulary by substring search.
#[derive(Default)]
struct VocabularyNer {
    calls: AtomicUsize,
}

#[async_trait]
impl EntityClassifier for VocabularyNer {
    async fn classify(&self, text: &str) -> Result<Vec<Prediction>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let vocabulary = [("diabetes", "Disease", 0.97), ("metformin", "Drug", 0.91)];
        let mut out = Vec::new();
        for (word, label, score) in vocabulary {
            if let Some(start) = text.find(word) {
                out.push(Prediction {
                    label: label.to_string(),
                    score: Some(score),
                    text: word.to_string(),
                    start,
                    end: start + word.len(),
                });
            }
        }
        out.sort_by_key(|p| p.start);
        Ok(out)
    }
}

/// Route pipeline logs to the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn stub_config(
    layout: Arc<dyn LayoutDetector>,
    ocr: Arc<HeightOcr>,
    ner: Arc<VocabularyNer>,
) -> PipelineConfig {
    init_tracing();
    PipelineConfig::builder()
        .layout_detector(layout)
        .recognizer(ocr)
        .classifier(ner)
        .build()
        .expect("valid config")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn diagnosis_and_prescription_end_to_end() {
    let ocr = Arc::new(HeightOcr::default());
    let ner = Arc::new(VocabularyNer::default());
    let config = stub_config(two_paragraphs(), ocr.clone(), ner.clone());

    let result = process_document(&page_png(&[(15, 25), (65, 85)]), false, &config)
        .await
        .unwrap();

    assert_eq!(result.text, format!("{DIABETES}\n{METFORMIN}"));
    assert_eq!(result.segments.len(), 2);
    assert_eq!(result.segments[0].text, DIABETES);
    assert_eq!(result.segments[0].bounding_box, BoundingBox::new(20, 10, 180, 30));
    assert_eq!(result.segments[0].confidence, Some(0.9));
    assert!(result.pdf.is_none());

    let labels: Vec<&str> = result.entities.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["Disease", "Drug"]);
    let disease = &result.entities[0];
    assert_eq!((disease.start, disease.end, disease.chunk), (12, 20, 0));
    assert!((0.0..=1.0).contains(&disease.score));

    // one chunk: both lines fit in 400 chars
    assert_eq!(ner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.stats.chunks, 1);
    assert_eq!(result.stats.recognized_segments, 2);
}

#[tokio::test]
async fn small_chunk_limit_gives_one_classifier_call_per_line() {
    init_tracing();
    let ocr = Arc::new(HeightOcr::default());
    let ner = Arc::new(VocabularyNer::default());
    let config = PipelineConfig::builder()
        .layout_detector(two_paragraphs())
        .recognizer(ocr)
        .classifier(ner.clone())
        .max_chunk_length(25)
        .build()
        .unwrap();

    let result = process_document(&page_png(&[(15, 25), (65, 85)]), false, &config)
        .await
        .unwrap();

    assert_eq!(result.stats.chunks, 2);
    assert_eq!(ner.calls.load(Ordering::SeqCst), 2);
    let drug = &result.entities[1];
    assert_eq!((drug.label.as_str(), drug.start, drug.chunk), ("Drug", 11, 1));
}

#[tokio::test]
async fn page_without_text_blocks_calls_no_model() {
    let layout = Arc::new(FixedLayout(vec![Block {
        kind: BlockKind::Other,
        bounding_box: BoundingBox::new(0, 0, 50, 50),
        confidence: None,
    }]));
    let ocr = Arc::new(HeightOcr::default());
    let ner = Arc::new(VocabularyNer::default());
    let config = stub_config(layout, ocr.clone(), ner.clone());

    let result = process_document(&page_png(&[]), false, &config).await.unwrap();

    assert!(result.segments.is_empty());
    assert_eq!(result.text, "");
    assert!(result.entities.is_empty());
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ner.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.stats.detected_blocks, 1);
    assert_eq!(result.stats.text_blocks, 0);
}

#[tokio::test]
async fn identical_input_gives_identical_envelope() {
    let bytes = page_png(&[(15, 25), (65, 85)]);
    let config = stub_config(
        two_paragraphs(),
        Arc::new(HeightOcr::default()),
        Arc::new(VocabularyNer::default()),
    );

    let first = process_to_envelope(&bytes, true, &config).await;
    let second = process_to_envelope(&bytes, true, &config).await;

    assert!(first.get("error").is_none(), "{first}");
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn export_ships_pdf_as_base64() {
    let config = stub_config(
        two_paragraphs(),
        Arc::new(HeightOcr::default()),
        Arc::new(VocabularyNer::default()),
    );
    let envelope = process_to_envelope(&page_png(&[(15, 25)]), true, &config).await;

    let encoded = envelope["pdf_base64"].as_str().expect("pdf_base64 present");
    let pdf = STANDARD.decode(encoded).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(envelope["entities"][0]["entity"], "Disease");
    assert_eq!(envelope["segments"][0]["bbox"], serde_json::json!([20, 10, 180, 30]));
}

#[tokio::test]
async fn recognition_failure_aborts_whole_request() {
    let ocr = Arc::new(HeightOcr {
        fail_short: true,
        ..Default::default()
    });
    let ner = Arc::new(VocabularyNer::default());
    let config = stub_config(two_paragraphs(), ocr, ner.clone());
    let bytes = page_png(&[(15, 25), (65, 85)]);

    let err = process_document(&bytes, false, &config).await.unwrap_err();
    assert!(matches!(err, MedOcrError::RecognitionFailed { block: 1, .. }));

    let envelope = process_to_envelope(&bytes, true, &config).await;
    let obj = envelope.as_object().unwrap();
    assert_eq!(obj.len(), 1, "error envelope carries no partial output");
    assert!(obj["error"].as_str().unwrap().contains("block 1"));
    assert_eq!(ner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn partial_mode_keeps_other_segments() {
    let ocr = Arc::new(HeightOcr {
        fail_short: true,
        ..Default::default()
    });
    let config = PipelineConfig::builder()
        .layout_detector(two_paragraphs())
        .recognizer(ocr)
        .classifier(Arc::new(VocabularyNer::default()))
        .failure_mode(FailureMode::Partial)
        .build()
        .unwrap();

    let result = process_document(&page_png(&[(15, 25), (65, 85)]), false, &config)
        .await
        .unwrap();

    assert_eq!(result.text, METFORMIN);
    assert!(!result.is_complete());
    assert!(matches!(
        result.failed_segments.as_slice(),
        [SegmentError::RecognitionFailed { block: 1, .. }]
    ));
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities[0].label, "Drug");

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["failed_segments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn undecodable_bytes_are_a_decode_error() {
    let config = stub_config(
        two_paragraphs(),
        Arc::new(HeightOcr::default()),
        Arc::new(VocabularyNer::default()),
    );
    let err = process_document(b"not an image at all", false, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, MedOcrError::DecodeFailed { .. }));

    let envelope = process_to_envelope(b"", false, &config).await;
    assert!(envelope["error"].as_str().unwrap().starts_with("Failed to decode image"));
}

#[tokio::test]
async fn spatial_order_reorders_segments() {
    // Detector emits the prescription block first.
    let layout = Arc::new(FixedLayout(vec![text_block(60, 90), text_block(10, 30)]));
    let make = |order| {
        PipelineConfig::builder()
            .layout_detector(layout.clone())
            .recognizer(Arc::new(HeightOcr::default()))
            .classifier(Arc::new(VocabularyNer::default()))
            .reading_order(order)
            .build()
            .unwrap()
    };
    let bytes = page_png(&[(15, 25), (65, 85)]);

    let detector_order = process_document(&bytes, false, &make(ReadingOrder::Detector))
        .await
        .unwrap();
    assert_eq!(detector_order.text, format!("{METFORMIN}\n{DIABETES}"));

    let spatial = process_document(&bytes, false, &make(ReadingOrder::Spatial))
        .await
        .unwrap();
    assert_eq!(spatial.text, format!("{DIABETES}\n{METFORMIN}"));
}

#[tokio::test]
async fn bundled_layout_detector_finds_paragraphs() {
    let ocr = Arc::new(HeightOcr::default());
    let config = PipelineConfig::builder()
        .recognizer(ocr.clone())
        .classifier(Arc::new(VocabularyNer::default()))
        .build()
        .unwrap();

    // Dilation grows each band by the merge radius: 10 px → short, 20 px → tall.
    let result = process_document(&page_png(&[(20, 30), (70, 90)]), false, &config)
        .await
        .unwrap();

    assert_eq!(result.segments.len(), 2);
    assert_eq!(result.text, format!("{DIABETES}\n{METFORMIN}"));
    for seg in &result.segments {
        assert!(seg.bounding_box.x2 <= 200 && seg.bounding_box.y2 <= 120);
    }
}

#[tokio::test]
async fn progress_events_follow_blocks_and_chunks() {
    #[derive(Default)]
    struct Counter {
        blocks: AtomicUsize,
        chunks: AtomicUsize,
        finished: AtomicUsize,
    }

    impl PipelineProgressCallback for Counter {
        fn on_block_complete(&self, _block: usize, _total: usize, _len: usize) {
            self.blocks.fetch_add(1, Ordering::SeqCst);
        }
        fn on_chunk_complete(&self, _chunk: usize, _total: usize, _entities: usize) {
            self.chunks.fetch_add(1, Ordering::SeqCst);
        }
        fn on_pipeline_complete(&self, _segments: usize, _entities: usize) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    let counter = Arc::new(Counter::default());
    let config = PipelineConfig::builder()
        .layout_detector(two_paragraphs())
        .recognizer(Arc::new(HeightOcr::default()))
        .classifier(Arc::new(VocabularyNer::default()))
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    process_document(&page_png(&[(15, 25), (65, 85)]), false, &config)
        .await
        .unwrap();

    assert_eq!(counter.blocks.load(Ordering::SeqCst), 2);
    assert_eq!(counter.chunks.load(Ordering::SeqCst), 1);
    assert_eq!(counter.finished.load(Ordering::SeqCst), 1);
}
