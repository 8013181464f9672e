use crate::models::{CardConfig, GeneratedCard, ImageSlots};
use crate::processing::{CardComposer, FieldExtractor, ImageRecovery, PhotoNormalizer};
use crate::utils::CardError;
use crate::validation::{GenerationRequest, RequestValidator};
use chrono::{Local, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Runs the whole pipeline for one request: recover images, read fields,
/// clean the photo, then render the card.
///
/// Each generator owns its random source, so separate generators never
/// share state.
pub struct CardGenerator {
    rng: StdRng,
    recovery: ImageRecovery,
    extractor: FieldExtractor,
    normalizer: PhotoNormalizer,
    composer: CardComposer,
}

impl CardGenerator {
    pub fn new(config: CardConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic file names and serial numbers, for tests and replays.
    pub fn with_seed(config: CardConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: CardConfig, rng: StdRng) -> Self {
        CardGenerator {
            recovery: ImageRecovery::new(&config),
            extractor: FieldExtractor::new(&config),
            normalizer: PhotoNormalizer::new(&config),
            composer: CardComposer::new(&config),
            rng,
        }
    }

    pub fn generate(&mut self, request: &GenerationRequest) -> Result<GeneratedCard, CardError> {
        self.generate_on(Local::now().date_naive(), request)
    }

    pub fn generate_on(
        &mut self,
        issued: NaiveDate,
        request: &GenerationRequest,
    ) -> Result<GeneratedCard, CardError> {
        RequestValidator::validate(request)?;
        let pdf = request
            .pdf_path
            .as_deref()
            .ok_or_else(|| CardError::InvalidRequest("PDF file is required!".to_string()))?;

        let images = self.recovery.recover_images(pdf, &mut self.rng);
        log::debug!("Step 1: {} image(s) recovered", images.len());

        let fields = self.extractor.extract(pdf);
        log::debug!("Step 2: fields extracted for {:?}", fields.fullname);

        let photo = self
            .normalizer
            .normalize(request.photo.as_deref(), &mut self.rng)
            .ok_or_else(|| CardError::InvalidRequest("Error saving photo".to_string()))?;
        log::debug!("Step 3: photo saved to {:?}", photo);

        let slots = ImageSlots::prepare(&images, Some(photo));
        let card = self
            .composer
            .compose_card(issued, &fields, &slots, &request.fin, &mut self.rng);

        Ok(GeneratedCard {
            card_path: card.path,
            fields,
            fin: request.fin.clone(),
            serial: card.serial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldName, NOT_FOUND};
    use crate::utils::test_pdf::{solid_jpeg, TestImage, TestPdf, TextRun};
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;

    fn config(dir: &Path) -> CardConfig {
        CardConfig {
            image_dir: dir.join("images"),
            card_dir: dir.join("cards"),
            template_path: dir.join("template.png"),
            font_path: dir.join("font.ttf"),
            ..CardConfig::default()
        }
    }

    fn photo_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(10, 10, Rgba([40, 80, 120, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn document(dir: &Path) -> std::path::PathBuf {
        let defaults = CardConfig::default();
        let rect = |field| {
            defaults
                .field_regions
                .iter()
                .find(|r| r.field == field)
                .unwrap()
                .rect
        };
        let bytes = TestPdf::new()
            .page_with_images(
                vec![
                    TextRun::at(60.0, 100.0, "FAN 1111 2222 3333 4444"),
                    TextRun::in_rect(rect(FieldName::FullName), "Abebe Kebede"),
                    TextRun::in_rect(rect(FieldName::Sex), "Male"),
                ],
                vec![TestImage::Jpeg {
                    width: 8,
                    height: 8,
                    data: solid_jpeg(8, 8, [90, 90, 90]),
                }],
            )
            .build();
        let path = dir.join("document.pdf");
        fs::write(&path, bytes).unwrap();
        path
    }

    fn issued() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_generate_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let request = GenerationRequest {
            pdf_path: Some(document(dir.path())),
            photo: Some(photo_bytes()),
            fin: "123456789012".to_string(),
        };

        let mut generator = CardGenerator::with_seed(config(dir.path()), 1);
        let card = generator.generate_on(issued(), &request).unwrap();

        assert!(card.card_path.exists());
        assert!(card.card_path.starts_with(dir.path().join("cards")));
        assert_eq!(card.fin, "123456789012");
        assert_eq!(card.fields.fullname, "Abebe Kebede");
        assert_eq!(card.fields.sex, "Male");
        assert_eq!(card.fields.fan, "1111222233334444");
        assert_eq!(card.fields.phone, "");
        assert!(card.serial.is_some());

        // one recovered image plus the normalized photo
        let artifacts = fs::read_dir(dir.path().join("images")).unwrap().count();
        assert_eq!(artifacts, 2);
    }

    #[test]
    fn test_invalid_request_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let request = GenerationRequest {
            pdf_path: Some(document(dir.path())),
            photo: Some(photo_bytes()),
            fin: "12345".to_string(),
        };

        let mut generator = CardGenerator::with_seed(config(dir.path()), 1);
        assert!(matches!(
            generator.generate_on(issued(), &request),
            Err(CardError::InvalidRequest(_))
        ));
        assert!(!dir.path().join("cards").exists());
        assert!(!dir.path().join("images").exists());
    }

    #[test]
    fn test_unreadable_document_still_yields_card() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("broken.pdf");
        fs::write(&pdf, b"not a pdf").unwrap();
        let request = GenerationRequest {
            pdf_path: Some(pdf),
            photo: Some(photo_bytes()),
            fin: "123456789012".to_string(),
        };

        let mut generator = CardGenerator::with_seed(config(dir.path()), 2);
        let card = generator.generate_on(issued(), &request).unwrap();
        assert_eq!(card.fields.fullname, NOT_FOUND);
        assert!(card.card_path.exists());
    }

    #[test]
    fn test_seeded_generators_agree() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let run = |dir: &Path| {
            let request = GenerationRequest {
                pdf_path: Some(document(dir)),
                photo: Some(photo_bytes()),
                fin: "123456789012".to_string(),
            };
            let card = CardGenerator::with_seed(config(dir), 42)
                .generate_on(issued(), &request)
                .unwrap();
            (card.card_path.file_name().unwrap().to_owned(), card.serial)
        };
        assert_eq!(run(dir_a.path()), run(dir_b.path()));
    }
}
