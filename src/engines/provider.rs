//! LLM provider resolution for the bundled recognition and NER engines.

use crate::config::PipelineConfig;
use crate::error::MedOcrError;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Vision model used when neither the config nor the environment names one.
pub const DEFAULT_OCR_MODEL: &str = "gpt-4.1-mini";

/// Chat model used for entity tagging when nothing else is configured.
pub const DEFAULT_NER_MODEL: &str = "gpt-4.1-nano";

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, MedOcrError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        MedOcrError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider** (`config.provider_name`) with `model`.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(
    config: &PipelineConfig,
    model: Option<&str>,
    fallback_model: &str,
) -> Result<Arc<dyn LLMProvider>, MedOcrError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = model.unwrap_or(fallback_model);

    if let Some(ref name) = config.provider_name {
        debug!("Using configured provider {} ({})", name, model);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| MedOcrError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass pre-built engines.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
