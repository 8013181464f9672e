use crate::utils::CardError;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

/// Names and writes short-lived artifacts inside one directory.
///
/// Every file is named `{prefix}_{hex}.{ext}` where `hex` is drawn from the
/// caller's random source. Collisions are possible but unlikely; an existing
/// file with the same name is overwritten.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        ArtifactStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Random lowercase hex string of `len` characters.
    pub fn random_suffix<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        (0..len)
            .map(|_| HEX[rng.gen_range(0..16)] as char)
            .collect()
    }

    pub fn unique_path<R: Rng + ?Sized>(
        &self,
        prefix: &str,
        ext: &str,
        suffix_len: usize,
        rng: &mut R,
    ) -> PathBuf {
        let suffix = Self::random_suffix(rng, suffix_len);
        self.dir.join(format!("{}_{}.{}", prefix, suffix, ext))
    }

    /// Write `bytes` under a freshly generated name and return the path.
    pub fn write<R: Rng + ?Sized>(
        &self,
        prefix: &str,
        ext: &str,
        suffix_len: usize,
        bytes: &[u8],
        rng: &mut R,
    ) -> Result<PathBuf, CardError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.unique_path(prefix, ext, suffix_len, rng);
        fs::write(&path, bytes)
            .map_err(|e| CardError::IoError(format!("Failed to write {:?}: {}", path, e)))?;
        Ok(path)
    }

    /// Best-effort removal of artifacts that should not outlive a failed call.
    pub fn discard(paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = fs::remove_file(path) {
                log::debug!("Could not remove artifact {:?}: {}", path, e);
            }
        }
    }
}
