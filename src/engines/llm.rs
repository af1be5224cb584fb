//! Shared LLM call loop for the bundled engines.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! load. Exponential backoff (`retry_backoff_ms * 2^attempt`) spaces the
//! retries out: with 500 ms base and 3 retries the wait sequence is
//! 500 ms → 1 s → 2 s. Each attempt is bounded by `timeout`.

use crate::config::PipelineConfig;
use crate::error::EngineError;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Per-call knobs copied out of [`PipelineConfig`] when an engine is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LlmCallOptions {
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl From<&PipelineConfig> for LlmCallOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

impl Default for LlmCallOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl LlmCallOptions {
    fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms * 2u64.pow(attempt.saturating_sub(1)))
    }
}

/// Send `messages` and return the reply text, retrying transient failures.
///
/// `what` names the call in logs and in the final error ("region 3x40",
/// "chunk of 212 chars").
pub async fn chat_with_retry(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    opts: &LlmCallOptions,
    what: &str,
) -> Result<String, EngineError> {
    let start = Instant::now();
    let options = opts.completion_options();
    let mut last_err: Option<String> = None;

    for attempt in 0..=opts.max_retries {
        if attempt > 0 {
            let backoff = opts.backoff(attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                what,
                attempt,
                opts.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        let call = provider.chat(messages, Some(&options));
        match timeout(Duration::from_secs(opts.timeout_secs), call).await {
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    what,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return Ok(response.content);
            }
            Ok(Err(e)) => {
                let err_msg = format!("{}", e);
                warn!("{}: attempt {} failed — {}", what, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
            Err(_) => {
                let err_msg = format!("timed out after {}s", opts.timeout_secs);
                warn!("{}: attempt {} {}", what, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(EngineError::new(format!(
        "LLM call failed after {} retries: {}",
        opts.max_retries,
        last_err.unwrap_or_else(|| "Unknown error".to_string())
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let config = PipelineConfig::builder()
            .max_tokens(512)
            .max_retries(5)
            .build()
            .unwrap();
        let opts = LlmCallOptions::from(&config);
        assert_eq!(opts.max_tokens, 512);
        assert_eq!(opts.max_retries, 5);
        let completion = opts.completion_options();
        assert_eq!(completion.temperature, Some(0.0));
        assert_eq!(completion.max_tokens, Some(512));
    }

    #[test]
    fn backoff_doubles() {
        let opts = LlmCallOptions::default();
        assert_eq!(opts.backoff(1), Duration::from_millis(500));
        assert_eq!(opts.backoff(2), Duration::from_millis(1000));
        assert_eq!(opts.backoff(3), Duration::from_millis(2000));
    }
}
