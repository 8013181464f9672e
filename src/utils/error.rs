use thiserror::Error;

#[derive(Debug, Error)]
pub enum CardError {
    #[error("Document open error: {0}")]
    DocumentOpenError(String),
    #[error("Field not found: {0}")]
    FieldNotFound(String),
    #[error("Image decode error: {0}")]
    ImageDecodeError(String),
    #[error("Template missing: {0}")]
    TemplateMissing(String),
    #[error("Typeface missing: {0}")]
    TypefaceMissing(String),
    #[error("Calendar conversion error: {0}")]
    CalendarConversionError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for CardError {
    fn from(e: std::io::Error) -> Self {
        CardError::IoError(e.to_string())
    }
}

impl From<image::ImageError> for CardError {
    fn from(e: image::ImageError) -> Self {
        CardError::ImageDecodeError(e.to_string())
    }
}

impl From<lopdf::Error> for CardError {
    fn from(e: lopdf::Error) -> Self {
        CardError::DocumentOpenError(e.to_string())
    }
}

impl From<serde_json::Error> for CardError {
    fn from(e: serde_json::Error) -> Self {
        CardError::ConfigError(e.to_string())
    }
}
