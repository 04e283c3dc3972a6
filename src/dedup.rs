//! Destructive de-duplication: the first file of each fingerprint survives,
//! every later one is deleted.

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

use crate::file_organizer::{FileOrganizer, OrganizeError, OrganizeResult};
use crate::fingerprint::{Fingerprint, read_prefix};
use crate::layout::DestinationLayout;
use crate::walker::TreeWalker;

#[derive(Debug, Default)]
pub struct DeDuplicationReport {
    pub files_seen: usize,
    pub empty_files: usize,
    /// Files kept, one per fingerprint.
    pub kept: usize,
    /// Deleted files, in walk order.
    pub removed: Vec<PathBuf>,
}

/// Deletes every file whose fingerprint was already seen earlier in the walk.
///
/// The walk is in file-name order, so the survivor of each group is the one
/// that sorts first. Failing to delete a file aborts the pass.
pub fn de_duplicate(layout: &DestinationLayout) -> OrganizeResult<DeDuplicationReport> {
    FileOrganizer::require_dir(layout.root())?;

    let walker = TreeWalker::new(layout.root()).skip_dir(layout.metadata_dir());
    let mut kept: HashMap<Fingerprint, PathBuf> = HashMap::new();
    let mut report = DeDuplicationReport::default();

    for path in walker.files() {
        let path = path?;
        report.files_seen += 1;

        let fingerprint = read_prefix(&path).map_err(|e| OrganizeError::Fingerprint {
            path: path.clone(),
            source: e,
        })?;
        let Some(fingerprint) = fingerprint else {
            info!("size 0 {}", path.display());
            report.empty_files += 1;
            continue;
        };

        if let Some(original) = kept.get(&fingerprint) {
            info!("[keep:{}] [remove:{}]", original.display(), path.display());
            FileOrganizer::remove_file(&path)?;
            report.removed.push(path);
        } else {
            kept.insert(fingerprint, path);
        }
    }

    report.kept = kept.len();
    info!(
        "{} files seen, {} kept, {} removed",
        report.files_seen,
        report.kept,
        report.removed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_later_duplicates_removed() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("a/x.jpg"), "same").unwrap();
        fs::write(root.join("b/x.jpg"), "same").unwrap();
        fs::write(root.join("b/y.jpg"), "different").unwrap();
        fs::write(root.join("b/empty.txt"), "").unwrap();

        let report = de_duplicate(&DestinationLayout::new(root)).unwrap();

        assert_eq!(report.files_seen, 4);
        assert_eq!(report.empty_files, 1);
        assert_eq!(report.kept, 2);
        assert_eq!(report.removed, vec![root.join("b/x.jpg")]);
        assert!(root.join("a/x.jpg").exists());
        assert!(root.join("b/y.jpg").exists());
        assert!(root.join("b/empty.txt").exists());
    }

    #[test]
    fn test_metadata_dir_untouched() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let layout = DestinationLayout::new(root);
        layout.ensure_metadata_dir().unwrap();
        fs::write(root.join("a.log"), "START").unwrap();
        fs::write(layout.metadata_dir().join("b.log"), "START").unwrap();

        let report = de_duplicate(&layout).unwrap();

        assert!(report.removed.is_empty());
        assert!(layout.metadata_dir().join("b.log").exists());
    }
}
