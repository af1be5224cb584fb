//! Document export and transport encoding of the exported bytes.

use crate::engines::DocumentRenderer;
use crate::error::MedOcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Render `text` into a document with the given renderer.
pub fn export_document(renderer: &dyn DocumentRenderer, text: &str) -> Result<Vec<u8>, MedOcrError> {
    let bytes = renderer.render(text).map_err(|e| MedOcrError::ExportFailed {
        detail: e.to_string(),
    })?;
    debug!("Exported {} chars to {} bytes", text.chars().count(), bytes.len());
    Ok(bytes)
}

/// Standard base64 of the exported bytes, as shipped in `pdf_base64`.
pub fn encode_pdf_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::pdf::PdfTextRenderer;
    use crate::engines::EngineResult;
    use crate::error::EngineError;

    struct Broken;

    impl DocumentRenderer for Broken {
        fn render(&self, _text: &str) -> EngineResult<Vec<u8>> {
            Err(EngineError::new("font table missing"))
        }
    }

    #[test]
    fn export_produces_pdf() {
        let bytes = export_document(&PdfTextRenderer, "line one\nline two").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn renderer_failure_maps_to_export_failed() {
        let err = export_document(&Broken, "x").unwrap_err();
        assert!(matches!(err, MedOcrError::ExportFailed { .. }));
    }

    #[test]
    fn base64_is_standard_alphabet() {
        assert_eq!(encode_pdf_base64(b"%PDF-1.5"), "JVBERi0xLjU=");
        assert_eq!(encode_pdf_base64(&[]), "");
    }
}
