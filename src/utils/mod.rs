pub mod artifacts;
pub mod error;

pub use artifacts::ArtifactStore;
pub use error::CardError;

#[cfg(test)]
pub(crate) mod test_pdf;
