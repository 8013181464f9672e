pub mod card_generator;
pub mod models;
pub mod processing;
pub mod utils;
pub mod validation;

pub use card_generator::CardGenerator;
pub use models::{CardConfig, Fields, GeneratedCard, ImageSlots};
pub use utils::CardError;
pub use validation::GenerationRequest;
