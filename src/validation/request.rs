use crate::utils::CardError;
use std::path::PathBuf;

/// Inputs for one card: the source document, the uploaded portrait and the
/// FIN printed on the card.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub pdf_path: Option<PathBuf>,
    pub photo: Option<Vec<u8>>,
    pub fin: String,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Check every input and report all problems at once.
    pub fn validate(request: &GenerationRequest) -> Result<(), CardError> {
        let mut issues = Vec::new();

        let has_pdf = request
            .pdf_path
            .as_ref()
            .is_some_and(|p| !p.as_os_str().is_empty());
        if !has_pdf {
            issues.push("PDF file is required!");
        }

        if request.photo.as_ref().map_or(true, |bytes| bytes.is_empty()) {
            issues.push("Photo is required!");
        }

        if !Self::is_valid_fin(&request.fin) {
            issues.push("Valid 12-digit FIN number is required!");
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(CardError::InvalidRequest(issues.join("; ")))
        }
    }

    pub fn is_valid_fin(fin: &str) -> bool {
        fin.len() == 12 && fin.bytes().all(|b| b.is_ascii_digit())
    }
}
