use crate::models::CardConfig;
use crate::utils::{ArtifactStore, CardError};
use image::{ImageFormat, Rgba, RgbaImage};
use rand::Rng;
use std::path::{Path, PathBuf};

const SUFFIX_LEN: usize = 5;

/// Make every pixel whose red, green and blue channels all exceed
/// `threshold` fully transparent. Applying it twice changes nothing.
pub fn strip_background(img: &mut RgbaImage, threshold: u8) {
    for pixel in img.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        if r > threshold && g > threshold && b > threshold {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }
}

/// Turns an uploaded portrait into a PNG with its white backdrop removed.
pub struct PhotoNormalizer {
    store: ArtifactStore,
    threshold: u8,
}

impl PhotoNormalizer {
    pub fn new(config: &CardConfig) -> Self {
        PhotoNormalizer {
            store: ArtifactStore::new(&config.image_dir),
            threshold: config.white_threshold,
        }
    }

    /// Persist and clean up an uploaded photo.
    ///
    /// Returns `None` for a missing or empty upload, or when the upload
    /// cannot be written at all. Once the raw bytes are on disk the path is
    /// returned even if decoding fails, in which case the file still holds
    /// the upload as received.
    pub fn normalize<R: Rng + ?Sized>(&self, upload: Option<&[u8]>, rng: &mut R) -> Option<PathBuf> {
        let bytes = match upload {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => {
                log::debug!("No photo uploaded");
                return None;
            }
        };

        let path = match self.store.write("photo", "png", SUFFIX_LEN, bytes, rng) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Failed to save uploaded photo: {}", e);
                return None;
            }
        };

        if let Err(e) = self.rewrite(bytes, &path) {
            log::warn!("Photo {:?} kept as uploaded: {}", path, e);
        }
        path.exists().then_some(path)
    }

    fn rewrite(&self, bytes: &[u8], path: &Path) -> Result<(), CardError> {
        let mut img = image::load_from_memory(bytes)
            .map_err(|e| CardError::ImageDecodeError(format!("Failed to load photo: {}", e)))?
            .to_rgba8();
        strip_background(&mut img, self.threshold);
        img.save_with_format(path, ImageFormat::Png)
            .map_err(|e| CardError::IoError(format!("Failed to write {:?}: {}", path, e)))?;
        Ok(())
    }
}
