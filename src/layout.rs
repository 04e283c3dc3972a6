//! Where things live under the destination root.
//!
//! ```text
//! <to_dir>/
//! ├── .filene/                 metadata: control lists, history, pass logs
//! │   ├── copyList.txt
//! │   ├── outputDirSet.txt
//! │   ├── errorList.txt
//! │   ├── duplicationHistory.json
//! │   └── *.log
//! ├── __duplicated__/          staging: one subdirectory per duplicate group
//! ├── documents/ images/ musics/ videos/ others/
//! ```

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::file_organizer::{FileOrganizer, OrganizeResult};

pub const METADATA_DIR_NAME: &str = ".filene";
pub const STAGING_DIR_NAME: &str = "__duplicated__";

pub const COPY_LIST_FILE_NAME: &str = "copyList.txt";
pub const OUTPUT_DIR_SET_FILE_NAME: &str = "outputDirSet.txt";
pub const ERROR_LIST_FILE_NAME: &str = "errorList.txt";
pub const HISTORY_FILE_NAME: &str = "duplicationHistory.json";

/// Separates source and destination on a copy-list line.
pub const COPY_LIST_SEPARATOR: &str = "#-#-#$%&**&%$#-#-#";

/// Finder metadata file, never listed, fingerprinted or moved.
pub const IGNORED_FILE_NAME: &str = ".DS_Store";

/// Paths of the destination tree.
#[derive(Debug, Clone)]
pub struct DestinationLayout {
    root: PathBuf,
}

impl DestinationLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR_NAME)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR_NAME)
    }

    pub fn copy_list_path(&self) -> PathBuf {
        self.metadata_dir().join(COPY_LIST_FILE_NAME)
    }

    /// Where a previous copy list is kept when a new listing starts.
    pub fn copy_list_backup_path(&self, now: DateTime<Local>) -> PathBuf {
        self.metadata_dir().join(format!(
            "{}_{}",
            COPY_LIST_FILE_NAME,
            now.format("%Y%m%d%H%M%S")
        ))
    }

    pub fn output_dir_set_path(&self) -> PathBuf {
        self.metadata_dir().join(OUTPUT_DIR_SET_FILE_NAME)
    }

    pub fn error_list_path(&self) -> PathBuf {
        self.metadata_dir().join(ERROR_LIST_FILE_NAME)
    }

    pub fn history_path(&self) -> PathBuf {
        self.metadata_dir().join(HISTORY_FILE_NAME)
    }

    /// Creates the destination root and its metadata directory.
    pub fn ensure_metadata_dir(&self) -> OrganizeResult<()> {
        FileOrganizer::create_dir_all(&self.metadata_dir())
    }
}

/// Whether `path` names the ignored Finder file.
pub fn is_ignored_file(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name == IGNORED_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_layout_paths() {
        let layout = DestinationLayout::new("/dest");
        assert_eq!(layout.metadata_dir(), PathBuf::from("/dest/.filene"));
        assert_eq!(layout.staging_dir(), PathBuf::from("/dest/__duplicated__"));
        assert_eq!(
            layout.copy_list_path(),
            PathBuf::from("/dest/.filene/copyList.txt")
        );
        assert_eq!(
            layout.error_list_path(),
            PathBuf::from("/dest/.filene/errorList.txt")
        );
    }

    #[test]
    fn test_copy_list_backup_name() {
        let layout = DestinationLayout::new("/dest");
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            layout.copy_list_backup_path(now),
            PathBuf::from("/dest/.filene/copyList.txt_20240309070501")
        );
    }

    #[test]
    fn test_is_ignored_file() {
        assert!(is_ignored_file(Path::new("/a/b/.DS_Store")));
        assert!(is_ignored_file(Path::new(".DS_Store")));
        assert!(!is_ignored_file(Path::new("/a/b/.DS_Store.jpg")));
        assert!(!is_ignored_file(Path::new("/a/.DS_Store/x.jpg")));
    }
}
