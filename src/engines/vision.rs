//! Vision-LLM text recognizer.
//!
//! Each cropped region is PNG-encoded (lossless, so thin strokes of the
//! binarised text survive), wrapped as a base64 `ImageData` and sent with the
//! transcription prompt. `detail: "high"` keeps GPT-4-class models from
//! downscaling small print into a single low-resolution tile.

use super::llm::{chat_with_retry, LlmCallOptions};
use super::reply::clean_transcription;
use super::{EngineResult, TextRecognizer};
use crate::error::EngineError;
use crate::prompts::OCR_SYSTEM_PROMPT;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, ImageData, LLMProvider};
use image::GrayImage;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Encode a region as a base64 PNG ready for a multimodal API request.
pub fn encode_region(region: &GrayImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    region.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded region → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// [`TextRecognizer`] backed by any vision-capable `edgequake-llm` provider.
pub struct VisionTextRecognizer {
    provider: Arc<dyn LLMProvider>,
    options: LlmCallOptions,
    system_prompt: String,
}

impl VisionTextRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, options: LlmCallOptions) -> Self {
        Self {
            provider,
            options,
            system_prompt: OCR_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replace the built-in transcription prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[async_trait]
impl TextRecognizer for VisionTextRecognizer {
    async fn recognize(&self, region: &GrayImage) -> EngineResult<String> {
        let image_data = encode_region(region)
            .map_err(|e| EngineError::new(format!("Region encoding failed: {e}")))?;

        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images("", vec![image_data]),
        ];

        let what = format!("region {}x{}", region.width(), region.height());
        let reply = chat_with_retry(&self.provider, &messages, &self.options, &what).await?;
        Ok(clean_transcription(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn encode_small_region() {
        let region = GrayImage::from_pixel(12, 8, Luma([255]));
        let data = encode_region(&region).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
