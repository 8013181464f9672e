use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sentinel used for any field that could not be extracted.
pub const NOT_FOUND: &str = "Not Found";

/// Identity fields read from the first page of the source document.
///
/// Every attribute is always present; a failed extraction is represented by
/// [`NOT_FOUND`], never by an absent value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields {
    pub fullname: String,
    pub dob: String,
    pub sex: String,
    pub nationality: String,
    pub phone: String,
    pub region: String,
    pub zone: String,
    pub woreda: String,
    pub fan: String,
}

impl Fields {
    pub fn not_found() -> Self {
        Fields {
            fullname: NOT_FOUND.to_string(),
            dob: NOT_FOUND.to_string(),
            sex: NOT_FOUND.to_string(),
            nationality: NOT_FOUND.to_string(),
            phone: NOT_FOUND.to_string(),
            region: NOT_FOUND.to_string(),
            zone: NOT_FOUND.to_string(),
            woreda: NOT_FOUND.to_string(),
            fan: NOT_FOUND.to_string(),
        }
    }

    pub fn get(&self, field: FieldName) -> &str {
        match field {
            FieldName::FullName => &self.fullname,
            FieldName::DateOfBirth => &self.dob,
            FieldName::Sex => &self.sex,
            FieldName::Nationality => &self.nationality,
            FieldName::Phone => &self.phone,
            FieldName::Region => &self.region,
            FieldName::Zone => &self.zone,
            FieldName::Woreda => &self.woreda,
        }
    }

    pub fn set(&mut self, field: FieldName, value: String) {
        match field {
            FieldName::FullName => self.fullname = value,
            FieldName::DateOfBirth => self.dob = value,
            FieldName::Sex => self.sex = value,
            FieldName::Nationality => self.nationality = value,
            FieldName::Phone => self.phone = value,
            FieldName::Region => self.region = value,
            FieldName::Zone => self.zone = value,
            FieldName::Woreda => self.woreda = value,
        }
    }
}

/// The eight fields read from fixed page regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    FullName,
    DateOfBirth,
    Sex,
    Nationality,
    Phone,
    Region,
    Zone,
    Woreda,
}

/// The two numeric identifiers found in the page text.
///
/// `fin` is informational: the card always carries the caller-supplied FIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifiers {
    pub fin: String,
    pub fan: String,
}

/// One raster image lifted out of the PDF, before it is persisted.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// 1-based page number.
    pub page: usize,
    /// 0-based position among the page's images.
    pub index: usize,
    /// File extension of the stored encoding (`jpeg`, `jpx`, `png`).
    pub ext: String,
    pub bytes: Vec<u8>,
}

impl ExtractedImage {
    pub fn artifact_prefix(&self) -> String {
        format!("page{}_img{}", self.page, self.index)
    }
}

pub const SLOT_COUNT: usize = 4;

/// Photo placement slots consumed by the composer.
///
/// Slot 0 holds the photo embedded in the document, slot 1 the user photo;
/// slots 2 and 3 are reserved and always empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageSlots([Option<PathBuf>; SLOT_COUNT]);

impl ImageSlots {
    pub fn prepare(extracted: &[PathBuf], user_photo: Option<PathBuf>) -> Self {
        ImageSlots([extracted.first().cloned(), user_photo, None, None])
    }

    pub fn get(&self, slot: usize) -> Option<&PathBuf> {
        self.0.get(slot).and_then(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|p| p.is_none())
    }

    pub fn as_slice(&self) -> &[Option<PathBuf>] {
        &self.0
    }
}

/// Result of one generation request.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedCard {
    pub card_path: PathBuf,
    pub fields: Fields,
    pub fin: String,
    /// Serial printed on the card; absent when a blank card was written.
    pub serial: Option<u32>,
}
