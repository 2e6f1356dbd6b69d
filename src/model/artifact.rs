//! Model artifact persistence
//!
//! The artifact is a single JSON document. Saves are atomic: the document is
//! written next to the target and renamed over it, so a crash mid-write never
//! leaves a truncated model behind.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::CropModel;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O error ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact {path} is not a valid model: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact {path} is inconsistent: {reason}")]
    Inconsistent { path: PathBuf, reason: String },
}

impl ArtifactError {
    /// True when the artifact simply does not exist yet.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Save a model to disk atomically (write temp file, then rename).
pub fn save(model: &CropModel, path: &Path) -> Result<(), ArtifactError> {
    let io_err = |source: std::io::Error| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_vec(model).map_err(|source| ArtifactError::Format {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp_path = path.with_extension("json.tmp");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(&tmp_path, &json).map_err(io_err)?;
    std::fs::rename(&tmp_path, path).map_err(io_err)?;
    tracing::info!(path = %path.display(), bytes = json.len(), "Model artifact saved");
    Ok(())
}

/// Load and sanity-check a model from disk.
pub fn load(path: &Path) -> Result<CropModel, ArtifactError> {
    let data = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let model: CropModel = serde_json::from_slice(&data).map_err(|source| ArtifactError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    model
        .check_consistency()
        .map_err(|e| ArtifactError::Inconsistent {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(model)
}
