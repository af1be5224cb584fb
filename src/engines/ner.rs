//! Chat-LLM biomedical entity classifier.
//!
//! The model is asked for `{label, text, score}` triples only. Offsets are
//! never trusted from the model: each surface string is located in the chunk
//! here, scanning forward so repeated mentions map to successive occurrences.
//! Mentions that cannot be found verbatim are dropped as hallucinations.

use super::llm::{chat_with_retry, LlmCallOptions};
use super::reply::extract_json_array;
use super::{EngineResult, EntityClassifier, Prediction};
use crate::error::EngineError;
use crate::prompts::{ner_user_message, NER_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// One element of the model's JSON reply.
#[derive(Debug, Deserialize)]
struct TaggedMention {
    #[serde(alias = "entity", alias = "entity_group")]
    label: String,
    #[serde(alias = "word")]
    text: String,
    #[serde(default)]
    score: Option<f32>,
}

/// [`EntityClassifier`] backed by any chat-capable `edgequake-llm` provider.
pub struct LlmEntityClassifier {
    provider: Arc<dyn LLMProvider>,
    options: LlmCallOptions,
}

impl LlmEntityClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>, options: LlmCallOptions) -> Self {
        Self { provider, options }
    }
}

#[async_trait]
impl EntityClassifier for LlmEntityClassifier {
    async fn classify(&self, text: &str) -> EngineResult<Vec<Prediction>> {
        let messages = vec![
            ChatMessage::system(NER_SYSTEM_PROMPT),
            ChatMessage::user(ner_user_message(text)),
        ];
        let what = format!("chunk of {} chars", text.chars().count());
        let reply = chat_with_retry(&self.provider, &messages, &self.options, &what).await?;
        parse_predictions(&reply, text)
    }
}

/// Parse a JSON reply into predictions with chunk-local character offsets.
pub fn parse_predictions(reply: &str, chunk: &str) -> EngineResult<Vec<Prediction>> {
    let json = extract_json_array(reply)
        .ok_or_else(|| EngineError::new(format!("NER reply is not a JSON array: {reply:.80}")))?;
    let mentions: Vec<TaggedMention> = serde_json::from_str(&json)
        .map_err(|e| EngineError::new(format!("NER reply could not be parsed: {e}")))?;

    let mut predictions = Vec::with_capacity(mentions.len());
    let mut cursor = 0usize;

    for mention in mentions {
        let surface = mention.text.trim();
        if surface.is_empty() {
            continue;
        }
        let found = chunk[cursor..]
            .find(surface)
            .map(|i| i + cursor)
            .or_else(|| chunk.find(surface));

        let Some(byte_start) = found else {
            debug!("Dropping mention not present in chunk: {:?}", surface);
            continue;
        };
        let byte_end = byte_start + surface.len();
        cursor = byte_end;

        let start = chunk[..byte_start].chars().count();
        let end = start + surface.chars().count();
        predictions.push(Prediction {
            label: mention.label,
            score: mention.score,
            text: surface.to_string(),
            start,
            end,
        });
    }

    Ok(predictions)
}
