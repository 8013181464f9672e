//! Card rendering: template, photos, text, then a flattened PNG.

use crate::models::{CardConfig, CardText, Fields, ImageSlots, PhotoPlacement, TextPlacement};
use crate::processing::dates::CardDates;
use crate::processing::photo::strip_background;
use crate::utils::{ArtifactStore, CardError};
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use chrono::{Local, NaiveDate};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rand::Rng;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Typeface used when the configured one cannot be loaded.
const FALLBACK_TYPEFACE: &[u8] = include_bytes!("../../fonts/DejaVuSans.ttf");
const SUFFIX_LEN: usize = 6;
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const BLANK: [u8; 3] = [255, 255, 255];

pub const SERIAL_RANGE: RangeInclusive<u32> = 10_000_000..=99_999_999;

/// A card written to disk. `serial` is `None` for the blank fallback card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedCard {
    pub path: PathBuf,
    pub serial: Option<u32>,
}

pub struct CardComposer {
    config: CardConfig,
    store: ArtifactStore,
}

impl CardComposer {
    pub fn new(config: &CardConfig) -> Self {
        CardComposer {
            config: config.clone(),
            store: ArtifactStore::new(&config.card_dir),
        }
    }

    /// Render a card issued today. Always returns a path; on failure it
    /// points to a blank card.
    pub fn compose<R: Rng + ?Sized>(
        &self,
        fields: &Fields,
        slots: &ImageSlots,
        fin: &str,
        rng: &mut R,
    ) -> PathBuf {
        self.compose_on(Local::now().date_naive(), fields, slots, fin, rng)
    }

    pub fn compose_on<R: Rng + ?Sized>(
        &self,
        issued: NaiveDate,
        fields: &Fields,
        slots: &ImageSlots,
        fin: &str,
        rng: &mut R,
    ) -> PathBuf {
        self.compose_card(issued, fields, slots, fin, rng).path
    }

    pub fn compose_card<R: Rng + ?Sized>(
        &self,
        issued: NaiveDate,
        fields: &Fields,
        slots: &ImageSlots,
        fin: &str,
        rng: &mut R,
    ) -> ComposedCard {
        match self.try_compose(issued, fields, slots, fin, rng) {
            Ok(card) => card,
            Err(e) => {
                log::warn!("Card composition failed, writing a blank card: {}", e);
                ComposedCard {
                    path: self.write_blank(rng),
                    serial: None,
                }
            }
        }
    }

    pub fn try_compose<R: Rng + ?Sized>(
        &self,
        issued: NaiveDate,
        fields: &Fields,
        slots: &ImageSlots,
        fin: &str,
        rng: &mut R,
    ) -> Result<ComposedCard, CardError> {
        let layout = &self.config.layout;
        let mut canvas = self.load_template();
        let dates = CardDates::for_issue_date(issued, self.config.validity_years);

        for (slot, path) in slots.as_slice().iter().enumerate() {
            let Some(path) = path else {
                continue;
            };
            let placements: Vec<&PhotoPlacement> = layout.photos_for_slot(slot).collect();
            if placements.is_empty() {
                continue;
            }
            match load_photo(path, self.config.white_threshold) {
                Ok(photo) => {
                    for placement in placements {
                        let resized =
                            imageops::resize(&photo, placement.width, placement.height, FilterType::CatmullRom);
                        paste_with_alpha(&mut canvas, &resized, placement.x, placement.y);
                    }
                }
                Err(e) => log::warn!("Skipping photo slot {} ({:?}): {}", slot, path, e),
            }
        }

        let font = self.load_typeface()?;
        let serial = rng.gen_range(SERIAL_RANGE);
        for placement in &layout.texts {
            let text = match placement.item {
                CardText::Fin => fin.to_string(),
                CardText::Field(field) => fields.get(field).to_string(),
                CardText::Fan => fields.fan.clone(),
                CardText::Expiry => dates.expiry_line(),
                CardText::Serial => format!(" {}", serial),
            };
            draw_multiline(&mut canvas, &font, placement, &text);
        }

        let path = self.store.unique_path("id", "png", SUFFIX_LEN, rng);
        fs::create_dir_all(self.store.dir())?;
        DynamicImage::ImageRgba8(canvas)
            .to_rgb8()
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| CardError::IoError(format!("Failed to write card {:?}: {}", path, e)))?;
        log::info!("Card written to {:?} (serial {})", path, serial);

        Ok(ComposedCard {
            path,
            serial: Some(serial),
        })
    }

    fn load_template(&self) -> RgbaImage {
        let path = &self.config.template_path;
        match image::open(path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                log::warn!(
                    "{}",
                    CardError::TemplateMissing(format!("{:?}: {}; using a blank canvas", path, e))
                );
                RgbaImage::from_pixel(
                    self.config.canvas_width,
                    self.config.canvas_height,
                    Rgba([BLANK[0], BLANK[1], BLANK[2], 255]),
                )
            }
        }
    }

    fn load_typeface(&self) -> Result<FontArc, CardError> {
        match self.configured_typeface() {
            Ok(font) => Ok(font),
            Err(e) => {
                log::warn!("{}; using the bundled one", e);
                FontArc::try_from_slice(FALLBACK_TYPEFACE)
                    .map_err(|e| CardError::TypefaceMissing(format!("Bundled typeface unusable: {}", e)))
            }
        }
    }

    fn configured_typeface(&self) -> Result<FontArc, CardError> {
        let path = &self.config.font_path;
        let bytes = fs::read(path)
            .map_err(|e| CardError::TypefaceMissing(format!("{:?} missing ({})", path, e)))?;
        FontArc::try_from_vec(bytes)
            .map_err(|e| CardError::TypefaceMissing(format!("{:?} unreadable ({})", path, e)))
    }

    /// Write a plain white card so callers always get a file back.
    fn write_blank<R: Rng + ?Sized>(&self, rng: &mut R) -> PathBuf {
        let path = self.store.unique_path("id", "png", SUFFIX_LEN, rng);
        let blank = RgbImage::from_pixel(self.config.canvas_width, self.config.canvas_height, Rgb(BLANK));
        let written = fs::create_dir_all(self.store.dir())
            .map_err(CardError::from)
            .and_then(|_| blank.save_with_format(&path, ImageFormat::Png).map_err(CardError::from));
        if let Err(e) = written {
            log::error!("Failed to write blank card {:?}: {}", path, e);
        }
        path
    }
}

fn load_photo(path: &Path, threshold: u8) -> Result<RgbaImage, CardError> {
    // Uploaded photos keep a .png name even when the bytes are not PNG
    let mut img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgba8();
    strip_background(&mut img, threshold);
    Ok(img)
}

/// Paste `src` at `(x, y)` using its own alpha channel as the mask.
pub fn paste_with_alpha(canvas: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for (sx, sy, pixel) in src.enumerate_pixels() {
        let (cx, cy) = (x + i64::from(sx), y + i64::from(sy));
        if cx < 0 || cy < 0 || cx >= cw || cy >= ch {
            continue;
        }
        let alpha = u32::from(pixel[3]);
        if alpha == 0 {
            continue;
        }
        let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
        for c in 0..4 {
            let blended = (u32::from(pixel[c]) * alpha + u32::from(dst[c]) * (255 - alpha) + 127) / 255;
            dst[c] = blended as u8;
        }
    }
}

/// Convert an em size in pixels to the ascent-to-descent scale ab_glyph uses.
fn px_scale(font: &FontArc, size: f32) -> PxScale {
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => PxScale::from(size * font.height_unscaled() / upem),
        _ => PxScale::from(size),
    }
}

fn draw_multiline(canvas: &mut RgbaImage, font: &FontArc, placement: &TextPlacement, text: &str) {
    let scale = px_scale(font, placement.size);
    let line_height = font.as_scaled(scale).ascent() + placement.spacing;
    for (i, line) in text.split('\n').enumerate() {
        if line.is_empty() {
            continue;
        }
        let y = placement.y + (i as f32 * line_height).round() as i32;
        draw_text_mut(canvas, TEXT_COLOR, placement.x, y, scale, font, line);
    }
}
