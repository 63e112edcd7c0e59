use super::validator::{ValidationResult, validate};
use relative_path::RelativePathBuf;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Failed to create {path}: {source}")]
    Create { path: PathBuf, source: io::Error },
    #[error("Working directory {0} is not writable after initialization")]
    NotWritable(PathBuf),
}

/// Fixed layout the rest of the application expects inside the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkdirLayout {
    pub directories: Vec<RelativePathBuf>,
    /// Empty files created when absent, never overwritten
    pub marker_files: Vec<RelativePathBuf>,
}

impl Default for WorkdirLayout {
    fn default() -> Self {
        Self {
            directories: ["converted", "configs", "data", "screenshots", "shaders"]
                .into_iter()
                .map(RelativePathBuf::from)
                .collect(),
            // Keeps media scanners out of the workdir
            marker_files: vec![RelativePathBuf::from(".nomedia")],
        }
    }
}

impl WorkdirLayout {
    /// Just the directory itself
    pub fn empty() -> Self {
        Self {
            directories: Vec::new(),
            marker_files: Vec::new(),
        }
    }
}

/// Create `path` and its layout, then confirm it validates as ready.
///
/// Idempotent: an already initialized directory is left as it is. The directory is
/// created with `create_dir`, not `create_dir_all`; a parent that vanished since
/// validation is reported as a failure instead of being recreated.
pub fn initialize(path: &Path, layout: &WorkdirLayout) -> Result<(), InitError> {
    if !path.is_dir() {
        log::info!("Creating working directory {}", path.display());
        fs::create_dir(path).map_err(|source| InitError::Create {
            path: path.to_path_buf(),
            source,
        })?;
    }

    for directory in &layout.directories {
        let absolute = directory.to_path(path);
        fs::create_dir_all(&absolute).map_err(|source| InitError::Create {
            path: absolute.clone(),
            source,
        })?;
    }

    for marker in &layout.marker_files {
        let absolute = marker.to_path(path);
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&absolute)
            .map_err(|source| InitError::Create {
                path: absolute.clone(),
                source,
            })?;
    }

    match validate(path) {
        ValidationResult::Ready(_) => Ok(()),
        _ => Err(InitError::NotWritable(path.to_path_buf())),
    }
}
