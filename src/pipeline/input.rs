//! Input resolution: turn a user-supplied path or URL into image bytes.
//!
//! The pipeline itself takes raw bytes. This stage exists for the CLI and
//! [`crate::process_input`]: it reads a local file or downloads an HTTP(S)
//! URL, then checks the image signature before returning, so an HTML error
//! page or a PDF is reported as [`MedOcrError::UnsupportedFormat`] instead of
//! a confusing decode failure deep in the pipeline.

use crate::error::MedOcrError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Image bytes plus a human-readable name for logs and errors.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub source_name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to image bytes.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ImageInput, MedOcrError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || (trimmed.contains("://") && !is_url(trimmed)) {
        return Err(MedOcrError::InvalidInput {
            input: input.to_string(),
        });
    }

    let resolved = if is_url(trimmed) {
        download_url(trimmed, timeout_secs).await?
    } else {
        read_local(trimmed).await?
    };
    check_image_signature(&resolved)?;
    Ok(resolved)
}

/// Reject bytes that carry no known image signature.
pub fn check_image_signature(input: &ImageInput) -> Result<(), MedOcrError> {
    match image::guess_format(&input.bytes) {
        Ok(format) => {
            debug!("{}: detected {:?}", input.source_name, format);
            Ok(())
        }
        Err(_) => Err(MedOcrError::UnsupportedFormat {
            source_name: input.source_name.clone(),
            magic: input.bytes.iter().take(8).copied().collect(),
        }),
    }
}

async fn read_local(path_str: &str) -> Result<ImageInput, MedOcrError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(MedOcrError::PermissionDenied { path });
        }
        Err(_) => return Err(MedOcrError::FileNotFound { path }),
    };

    debug!("Read local image: {} ({} bytes)", path.display(), bytes.len());
    Ok(ImageInput {
        source_name: path.display().to_string(),
        bytes,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ImageInput, MedOcrError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| MedOcrError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            MedOcrError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            MedOcrError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(MedOcrError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MedOcrError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(ImageInput {
        source_name: url.to_string(),
        bytes: bytes.to_vec(),
    })
}
