// ABOUTME: Content-addressed cache of orientation-normalized image copies
// ABOUTME: Names each copy by the SHA-256 of its source path so repeat displays skip conversion

use super::tools::ExternalTools;
use crate::constants::overlay::IDENTITY_ORIENTATIONS;
use crate::constants::tools::CONVERT;
use crate::error::{Result, TermpixError};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct NormalizedCache {
    cache_dir: PathBuf,
}

impl Default for NormalizedCache {
    fn default() -> Self {
        Self::new(default_cache_directory())
    }
}

impl NormalizedCache {
    /// The directory is created lazily on the first normalization
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn path_for(&self, source: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(source.as_os_str().as_encoded_bytes());
        let hash = format!("{:x}", hasher.finalize());

        self.cache_dir.join(format!("{}.png", hash))
    }

    /// Path the overlay helper should load for `source`.
    ///
    /// Upright images are used as-is. Rotated or mirrored ones are converted
    /// once into the cache directory and reused afterwards.
    pub fn resolve(&self, tools: &dyn ExternalTools, source: &Path) -> Result<PathBuf> {
        let orientation = tools.orientation(source)?;
        if IDENTITY_ORIENTATIONS.contains(&orientation.as_str()) {
            return Ok(source.to_path_buf());
        }

        let normalized = self.path_for(source);
        if normalized.exists() {
            log::debug!(
                "Normalized cache hit: {} -> {}",
                source.display(),
                normalized.display()
            );
            return Ok(normalized);
        }

        log::debug!(
            "Normalizing {} orientation of {}",
            orientation,
            source.display()
        );
        fs::create_dir_all(&self.cache_dir)?;
        tools.normalize_orientation(source, &normalized)?;

        if !normalized.exists() {
            return Err(TermpixError::tool(CONVERT, "normalized copy was not written"));
        }
        Ok(normalized)
    }
}

/// `<user cache dir>/termpix/normalized`, or the temp dir when there is none
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("termpix")
        .join("normalized")
}
