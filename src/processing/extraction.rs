use crate::models::{CardConfig, FieldRegion, Fields, Identifiers, NOT_FOUND};
use crate::processing::pdf::PdfDocument;
use crate::utils::CardError;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

lazy_static! {
    /// Twelve digits in three space-separated groups (the FIN).
    static ref FIN_PATTERN: Regex = Regex::new(r"\b\d{4}\s\d{4}\s\d{4}\b").unwrap();
    /// Sixteen digits in four space-separated groups (the FAN).
    static ref FAN_PATTERN: Regex = Regex::new(r"\b\d{4}\s\d{4}\s\d{4}\s\d{4}\b").unwrap();
}

/// Marker used by the document for a line break inside multiline fields.
const LINE_BREAK_MARKER: &str = "| ";

/// Reads identity fields from the first page of a national ID PDF.
pub struct FieldExtractor {
    regions: Vec<FieldRegion>,
}

impl FieldExtractor {
    pub fn new(config: &CardConfig) -> Self {
        FieldExtractor {
            regions: config.field_regions.clone(),
        }
    }

    /// Extract all fields; any failure to read the document yields
    /// [`Fields::not_found`].
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Fields {
        let path = path.as_ref();
        match self.try_extract(path) {
            Ok(fields) => fields,
            Err(e) => {
                log::warn!("Field extraction failed for {:?}: {}", path, e);
                Fields::not_found()
            }
        }
    }

    pub fn try_extract<P: AsRef<Path>>(&self, path: P) -> Result<Fields, CardError> {
        let doc = PdfDocument::open(path)?;
        self.extract_from_document(&doc)
    }

    pub fn extract_from_document(&self, doc: &PdfDocument) -> Result<Fields, CardError> {
        let layer = doc.page(0)?.text_layer()?;

        let mut fields = Fields::not_found();
        let identifiers = Self::scan_identifiers(&layer.plain_text());
        fields.fan = identifiers.fan;

        for region in &self.regions {
            let raw = layer.text_in_rect(region.rect);
            let mut value = raw.trim().to_string();
            if region.multiline {
                value = value.replace(LINE_BREAK_MARKER, "\n");
            }
            log::debug!("Field {:?}: {:?}", region.field, value);
            fields.set(region.field, value);
        }

        Ok(fields)
    }

    /// Resolve the FIN (last 12-digit match) and FAN (first 16-digit match,
    /// spaces removed) from the page text.
    pub fn scan_identifiers(text: &str) -> Identifiers {
        let fin = FIN_PATTERN
            .find_iter(text)
            .last()
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| NOT_FOUND.to_string());
        let fan = FAN_PATTERN
            .find(text)
            .map(|m| m.as_str().replace(' ', ""))
            .unwrap_or_else(|| NOT_FOUND.to_string());
        Identifiers { fin, fan }
    }

    pub fn extract_identifiers<P: AsRef<Path>>(&self, path: P) -> Identifiers {
        let path = path.as_ref();
        let text = PdfDocument::open(path).and_then(|doc| doc.page(0)?.text());
        match text {
            Ok(text) => Self::scan_identifiers(&text),
            Err(e) => {
                log::warn!("Identifier scan failed for {:?}: {}", path, e);
                Identifiers {
                    fin: NOT_FOUND.to_string(),
                    fan: NOT_FOUND.to_string(),
                }
            }
        }
    }
}
