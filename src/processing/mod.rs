pub mod composer;
pub mod dates;
pub mod extraction;
pub mod fonts;
pub mod images;
pub mod pdf;
pub mod photo;
pub mod text_layer;

pub use composer::{CardComposer, ComposedCard};
pub use dates::{to_ethiopian, CardDates, EthiopianDate};
pub use extraction::FieldExtractor;
pub use images::ImageRecovery;
pub use pdf::{PdfDocument, PdfPage};
pub use photo::{strip_background, PhotoNormalizer};
