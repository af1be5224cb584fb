//! Entity extraction over chunked text.

use crate::engines::{EntityClassifier, Prediction};
use crate::error::MedOcrError;
use crate::output::Entity;
use crate::pipeline::chunk::chunk_text;
use crate::progress::PipelineProgressCallback;
use tracing::debug;

/// Classify `text` chunk by chunk and merge the results in chunk order.
///
/// Blank input returns no entities without calling the classifier. Offsets
/// of each entity are relative to the chunk it came from; `Entity::chunk`
/// is that chunk's 0-based index. No deduplication is done across chunks.
pub async fn extract_entities(
    classifier: &dyn EntityClassifier,
    text: &str,
    max_length: usize,
    progress: Option<&dyn PipelineProgressCallback>,
) -> Result<Vec<Entity>, MedOcrError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let chunks = chunk_text(text, max_length);
    classify_chunks(classifier, &chunks, progress).await
}

/// Classify pre-split chunks, one classifier call each.
pub async fn classify_chunks(
    classifier: &dyn EntityClassifier,
    chunks: &[String],
    progress: Option<&dyn PipelineProgressCallback>,
) -> Result<Vec<Entity>, MedOcrError> {
    let total = chunks.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    if let Some(cb) = progress {
        cb.on_extraction_start(total);
    }

    let mut entities = Vec::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        let predictions =
            classifier
                .classify(chunk)
                .await
                .map_err(|e| MedOcrError::ClassificationFailed {
                    chunk: idx + 1,
                    detail: e.to_string(),
                })?;

        debug!(
            "Chunk {}/{}: {} chars, {} entities",
            idx + 1,
            total,
            chunk.chars().count(),
            predictions.len()
        );
        if let Some(cb) = progress {
            cb.on_chunk_complete(idx + 1, total, predictions.len());
        }
        entities.extend(predictions.into_iter().map(|p| to_entity(p, idx)));
    }

    Ok(entities)
}

fn to_entity(prediction: Prediction, chunk: usize) -> Entity {
    let score = prediction
        .score
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 1.0))
        .unwrap_or(0.0);
    Entity {
        label: prediction.label,
        score,
        text: prediction.text,
        start: prediction.start,
        end: prediction.end,
        chunk,
    }
}
