pub mod config;
pub mod data;
pub mod layout;

pub use config::CardConfig;
pub use data::*;
pub use layout::{CardLayout, CardText, FieldRegion, PhotoPlacement, Rect, TextPlacement};
