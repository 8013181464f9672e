use crate::models::FieldName;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page space with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Rect { x0, y0, x1, y1 }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}

/// Where one field lives on the source document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRegion {
    pub field: FieldName,
    pub rect: Rect,
    /// Multiline fields use `"| "` as an in-text line break marker.
    pub multiline: bool,
}

pub fn default_field_regions() -> Vec<FieldRegion> {
    let region = |field, x0, y0, x1, y1, multiline| FieldRegion {
        field,
        rect: Rect::new(x0, y0, x1, y1),
        multiline,
    };
    vec![
        region(FieldName::FullName, 50.0, 360.0, 300.0, 372.0, true),
        region(FieldName::Region, 50.0, 400.0, 300.0, 410.0, true),
        region(FieldName::DateOfBirth, 50.0, 430.0, 300.0, 435.0, false),
        region(FieldName::Zone, 50.0, 460.0, 400.0, 470.0, true),
        region(FieldName::Sex, 50.0, 500.0, 300.0, 510.0, false),
        region(FieldName::Woreda, 50.0, 527.0, 300.0, 537.0, true),
        region(FieldName::Nationality, 50.0, 560.0, 300.0, 575.0, false),
        region(FieldName::Phone, 50.0, 600.0, 300.0, 625.0, false),
    ]
}

/// A resized copy of one image slot pasted onto the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoPlacement {
    pub slot: usize,
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
}

/// Everything that can be written as text on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardText {
    Fin,
    Field(FieldName),
    Fan,
    Expiry,
    Serial,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextPlacement {
    pub item: CardText,
    pub x: i32,
    pub y: i32,
    /// Font size in pixels per em.
    pub size: f32,
    /// Extra pixels between lines of multiline text.
    pub spacing: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardLayout {
    pub photos: Vec<PhotoPlacement>,
    pub texts: Vec<TextPlacement>,
}

impl CardLayout {
    pub fn text(&self, item: CardText) -> Option<&TextPlacement> {
        self.texts.iter().find(|t| t.item == item)
    }

    pub fn photos_for_slot(&self, slot: usize) -> impl Iterator<Item = &PhotoPlacement> {
        self.photos.iter().filter(move |p| p.slot == slot)
    }
}

impl Default for CardLayout {
    fn default() -> Self {
        let photo = |slot, width, height, x, y| PhotoPlacement {
            slot,
            width,
            height,
            x,
            y,
        };
        let text = |item, x, y, size, spacing| TextPlacement {
            item,
            x,
            y,
            size,
            spacing,
        };

        CardLayout {
            photos: vec![
                photo(0, 310, 400, 65, 200),
                photo(0, 100, 135, 800, 450),
                photo(1, 530, 550, 1550, 30),
            ],
            texts: vec![
                text(CardText::Fin, 1265, 545, 25.0, 4.0),
                text(CardText::Field(FieldName::FullName), 405, 170, 37.0, 8.0),
                text(CardText::Field(FieldName::DateOfBirth), 405, 305, 32.0, 4.0),
                text(CardText::Field(FieldName::Sex), 405, 375, 32.0, 4.0),
                text(CardText::Field(FieldName::Nationality), 1130, 165, 32.0, 4.0),
                text(CardText::Field(FieldName::Region), 1130, 235, 28.0, 5.0),
                text(CardText::Field(FieldName::Zone), 1130, 315, 28.0, 5.0),
                text(CardText::Field(FieldName::Woreda), 1130, 390, 28.0, 5.0),
                text(CardText::Field(FieldName::Phone), 1130, 65, 32.0, 4.0),
                text(CardText::Fan, 470, 500, 32.0, 4.0),
                text(CardText::Expiry, 405, 440, 32.0, 4.0),
                text(CardText::Serial, 1930, 595, 26.0, 4.0),
            ],
        }
    }
}
