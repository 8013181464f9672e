use crate::models::layout::{default_field_regions, CardLayout, FieldRegion};
use crate::utils::CardError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the pipeline needs to know about its surroundings.
///
/// Passed by reference into each component; nothing is read from globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    /// Where recovered document images and normalized photos are written.
    pub image_dir: PathBuf,
    /// Where finished cards are written.
    pub card_dir: PathBuf,
    pub font_path: PathBuf,
    pub template_path: PathBuf,
    /// Pixels with every colour channel above this value become transparent.
    pub white_threshold: u8,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub validity_years: u32,
    pub field_regions: Vec<FieldRegion>,
    pub layout: CardLayout,
}

impl Default for CardConfig {
    fn default() -> Self {
        CardConfig {
            image_dir: PathBuf::from("extracted_images"),
            card_dir: PathBuf::from("cards"),
            font_path: PathBuf::from("fonts/AbyssinicaSIL-Regular.ttf"),
            template_path: PathBuf::from("static/id_card_template.png"),
            white_threshold: 220,
            canvas_width: 2100,
            canvas_height: 1500,
            validity_years: 8,
            field_regions: default_field_regions(),
            layout: CardLayout::default(),
        }
    }
}

impl CardConfig {
    /// Load a JSON config; keys that are left out keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CardError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| CardError::ConfigError(format!("Failed to read {:?}: {}", path, e)))?;
        let config: CardConfig = serde_json::from_str(&text)?;
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<(), CardError> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(CardError::ConfigError(format!(
                "Canvas must not be empty: {}x{}",
                self.canvas_width, self.canvas_height
            )));
        }
        if let Some(p) = self.layout.photos.iter().find(|p| p.width == 0 || p.height == 0) {
            return Err(CardError::ConfigError(format!(
                "Photo placement for slot {} has zero size",
                p.slot
            )));
        }
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<(), CardError> {
        for dir in [&self.image_dir, &self.card_dir] {
            fs::create_dir_all(dir)
                .map_err(|e| CardError::IoError(format!("Failed to create {:?}: {}", dir, e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CardConfig::default();
        assert_eq!(config.white_threshold, 220);
        assert_eq!((config.canvas_width, config.canvas_height), (2100, 1500));
        assert_eq!(config.validity_years, 8);
        assert_eq!(config.field_regions.len(), 8);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "card_dir": "out/cards", "white_threshold": 200 }"#).unwrap();

        let config = CardConfig::from_json_file(&path).unwrap();
        assert_eq!(config.card_dir, PathBuf::from("out/cards"));
        assert_eq!(config.white_threshold, 200);
        assert_eq!(config.image_dir, PathBuf::from("extracted_images"));
        assert_eq!(config.layout, CardLayout::default());
    }

    #[test]
    fn test_zero_canvas_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "canvas_width": 0 }"#).unwrap();

        match CardConfig::from_json_file(&path) {
            Err(CardError::ConfigError(msg)) => assert!(msg.contains("Canvas")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            CardConfig::from_json_file(&path),
            Err(CardError::ConfigError(_))
        ));
    }
}
