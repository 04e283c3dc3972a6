/// File movement primitives and the relocation history.
///
/// Every pass that touches the destination tree goes through [`FileOrganizer`]
/// so that directory creation, moves and deletions fail with the same typed
/// errors. Relocations made by the duplicate-detection pass are recorded in a
/// [`MoveHistory`] persisted next to the other control files, which is what
/// makes restoring them possible.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// A single relocation performed while staging duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Where the file lived before it was staged.
    pub original_path: PathBuf,
    /// Where the file lives now.
    pub new_path: PathBuf,
    /// Identifier of the fingerprint group the file was staged into.
    pub group: String,
}

/// Every relocation performed by one or more duplicate-detection runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveHistory {
    /// RFC 3339 timestamp of the run that created the history.
    pub timestamp: String,
    /// The destination root the relocations happened under.
    pub base_path: PathBuf,
    /// Relocations in the order they were performed.
    pub operations: Vec<MoveRecord>,
}

impl MoveHistory {
    /// Creates an empty history for a destination root.
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            base_path,
            operations: Vec::new(),
        }
    }

    /// Saves the history as pretty-printed JSON.
    pub fn save(&self, history_path: &Path) -> OrganizeResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            OrganizeError::InvalidHistoryFormat {
                reason: format!("JSON serialization failed: {}", e),
            }
        })?;

        fs::write(history_path, json).map_err(|e| OrganizeError::HistoryWriteFailed {
            path: history_path.to_path_buf(),
            source: e,
        })
    }

    /// Loads a history file, returning `None` when there is none.
    pub fn load(history_path: &Path) -> OrganizeResult<Option<Self>> {
        if !history_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(history_path).map_err(|e| {
            OrganizeError::HistoryReadFailed {
                path: history_path.to_path_buf(),
                source: e,
            }
        })?;

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| OrganizeError::InvalidHistoryFormat {
                reason: format!("JSON parse error: {}", e),
            })
    }

    /// Appends `records` to the history stored at `history_path`, creating it
    /// if needed. Nothing is written when `records` is empty.
    pub fn append(
        history_path: &Path,
        base_path: &Path,
        records: Vec<MoveRecord>,
    ) -> OrganizeResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut history =
            Self::load(history_path)?.unwrap_or_else(|| Self::new(base_path.to_path_buf()));
        history.operations.extend(records);
        history.save(history_path)
    }

    pub fn delete(history_path: &Path) -> OrganizeResult<()> {
        if history_path.exists() {
            fs::remove_file(history_path).map_err(|e| OrganizeError::HistoryWriteFailed {
                path: history_path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// Errors that can occur while organizing the destination tree.
#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to walk directory tree: {source}")]
    Walk {
        #[from]
        source: walkdir::Error,
    },

    #[error("Failed to read the first bytes of {}: {source}", path.display())]
    Fingerprint {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Refusing to overwrite existing path {}", path.display())]
    DestinationExists { path: PathBuf },

    #[error("Failed to remove {}: {source}", path.display())]
    RemoveFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid base path {}: {source}", path.display())]
    InvalidBasePath {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {}: {source}", path.display())]
    ListReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    ListWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write history file {}: {source}", path.display())]
    HistoryWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read history file {}: {source}", path.display())]
    HistoryReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid history file format: {reason}")]
    InvalidHistoryFormat { reason: String },

    #[error("Failed to start copy workers: {reason}")]
    WorkerPool { reason: String },

    #[error("Failed to set up pass log: {reason}")]
    LogSetup { reason: String },
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Filesystem primitives shared by every pass.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Fails with `InvalidBasePath` unless `path` is an existing directory.
    pub fn require_dir(path: &Path) -> OrganizeResult<()> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(OrganizeError::InvalidBasePath {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            }),
            Err(e) => Err(OrganizeError::InvalidBasePath {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Creates `path` and any missing parents. Existing directories are fine.
    pub fn create_dir_all(path: &Path) -> OrganizeResult<()> {
        fs::create_dir_all(path).map_err(|e| OrganizeError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Moves `from` to `to`, refusing to replace anything already at `to`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use filene::file_organizer::FileOrganizer;
    /// use std::path::Path;
    ///
    /// FileOrganizer::move_path(
    ///     Path::new("/dest/a/x.jpg"),
    ///     Path::new("/dest/__duplicated__/g/a____x.jpg"),
    /// )
    /// .expect("move failed");
    /// ```
    pub fn move_path(from: &Path, to: &Path) -> OrganizeResult<()> {
        if to.exists() {
            return Err(OrganizeError::DestinationExists {
                path: to.to_path_buf(),
            });
        }

        fs::rename(from, to).map_err(|e| OrganizeError::FileMoveFailure {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: e,
        })
    }

    pub fn remove_file(path: &Path) -> OrganizeResult<()> {
        fs::remove_file(path).map_err(|e| OrganizeError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Returns `dir/file_name`, or the first free `dir/<stem>_<n>.<ext>` if
    /// that path is taken.
    pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
        let candidate = dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }

        let as_path = Path::new(file_name);
        let stem = as_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        let extension = as_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned());

        let mut counter = 1;
        loop {
            let name = match &extension {
                Some(ext) => format!("{}_{}.{}", stem, counter, ext),
                None => format!("{}_{}", stem, counter),
            };
            let candidate = dir.join(name);
            if !candidate.exists() {
                return candidate;
            }
            counter += 1;
        }
    }
}
