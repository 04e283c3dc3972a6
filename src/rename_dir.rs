//! Directory repair passes: stripping the flattening artifact from directory
//! names, and flattening the duplicate staging area back into the root.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::file_organizer::{FileOrganizer, OrganizeError, OrganizeResult};
use crate::layout::DestinationLayout;
use crate::walker::TreeWalker;

/// What flattening `/Volumes/HD-LCU3/...` source paths leaves in directory
/// names.
pub const VOLUME_ARTIFACT: &str = "___Volumes___HD-LCU3___";

#[derive(Debug, Default)]
pub struct RenameReport {
    /// `(old, new)` pairs in the order they were renamed.
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// Directories whose name would have become empty.
    pub skipped: Vec<PathBuf>,
}

/// Removes every occurrence of `artifact` from directory names under the
/// destination root, renaming each directory within its own parent.
///
/// Children are handled before their parents. Renaming onto a path that
/// already exists is an error.
pub fn rename_dirs(layout: &DestinationLayout, artifact: &str) -> OrganizeResult<RenameReport> {
    FileOrganizer::require_dir(layout.root())?;

    let walker = TreeWalker::new(layout.root()).skip_dir(layout.metadata_dir());
    let mut report = RenameReport::default();

    for dir in walker.dirs_deepest_first() {
        let dir = dir?;
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !name.contains(artifact) {
            continue;
        }

        let stripped = name.replace(artifact, "");
        if stripped.is_empty() {
            warn!("{} is only the artifact, leaving it", dir.display());
            report.skipped.push(dir);
            continue;
        }

        let target = dir.with_file_name(&stripped);
        info!("[oldPath:{}] [newPath:{}]", dir.display(), target.display());
        FileOrganizer::move_path(&dir, &target)?;
        report.renamed.push((dir, target));
    }

    Ok(report)
}

#[derive(Debug, Default)]
pub struct MoveDirReport {
    /// `(staged, destination)` pairs.
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Group directories removed once emptied.
    pub removed_dirs: usize,
}

/// Moves every staged duplicate up into the destination root, then removes
/// the emptied group directories. The staging directory itself is kept.
///
/// A name already taken in the root gets a numeric suffix.
pub fn move_dir(layout: &DestinationLayout) -> OrganizeResult<MoveDirReport> {
    FileOrganizer::require_dir(layout.root())?;
    let staging = layout.staging_dir();
    let mut report = MoveDirReport::default();

    if !staging.is_dir() {
        info!("no staging directory at {}", staging.display());
        return Ok(report);
    }

    // Collected up front: the moves below empty the tree being walked.
    let staged: Vec<PathBuf> = TreeWalker::new(&staging)
        .files()
        .collect::<Result<_, _>>()?;

    for from in staged {
        let Some(name) = from.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let to = FileOrganizer::unique_destination(layout.root(), &name);
        info!("[oldPath:{}] [newPath:{}]", from.display(), to.display());
        FileOrganizer::move_path(&from, &to)?;
        report.moved.push((from, to));
    }

    report.removed_dirs = remove_empty_dirs(&staging)?;
    Ok(report)
}

/// Removes empty directories strictly below `root`, deepest first. Returns
/// how many were removed.
pub(crate) fn remove_empty_dirs(root: &Path) -> OrganizeResult<usize> {
    let mut removed = 0;
    for dir in TreeWalker::new(root).dirs_deepest_first() {
        let dir = dir?;
        let is_empty = fs::read_dir(&dir)
            .map_err(|e| OrganizeError::RemoveFailed {
                path: dir.clone(),
                source: e,
            })?
            .next()
            .is_none();
        if is_empty {
            fs::remove_dir(&dir).map_err(|e| OrganizeError::RemoveFailed {
                path: dir.clone(),
                source: e,
            })?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rename_strips_artifact_in_place() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let original = root.join("images/___Volumes___HD-LCU3___photos___");
        fs::create_dir_all(&original).unwrap();
        fs::write(original.join("x.jpg"), "x").unwrap();

        let report = rename_dirs(&DestinationLayout::new(root), VOLUME_ARTIFACT).unwrap();

        let renamed = root.join("images/photos___");
        assert_eq!(report.renamed, vec![(original.clone(), renamed.clone())]);
        assert!(!original.exists());
        assert!(renamed.join("x.jpg").exists());
    }

    #[test]
    fn test_rename_leading_artifact_becomes_plain_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let original = root.join("___Volumes___HD-LCU3___photos");
        fs::create_dir_all(&original).unwrap();
        fs::write(original.join("x.jpg"), "x").unwrap();

        let report = rename_dirs(&DestinationLayout::new(root), VOLUME_ARTIFACT).unwrap();

        assert_eq!(report.renamed, vec![(original.clone(), root.join("photos"))]);
        assert!(report.skipped.is_empty());
        assert!(!original.exists());
        assert_eq!(fs::read_to_string(root.join("photos/x.jpg")).unwrap(), "x");
    }

    #[test]
    fn test_rename_nested_children_first() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a___Volumes___HD-LCU3___/b___Volumes___HD-LCU3___"))
            .unwrap();

        let report = rename_dirs(&DestinationLayout::new(root), VOLUME_ARTIFACT).unwrap();

        assert_eq!(report.renamed.len(), 2);
        assert!(root.join("a/b").is_dir());
    }

    #[test]
    fn test_rename_leaves_other_dirs_and_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("plain")).unwrap();
        fs::write(root.join("plain/___Volumes___HD-LCU3___.txt"), "f").unwrap();
        fs::create_dir_all(root.join("lower___volumes___hd-lcu3___")).unwrap();

        let report = rename_dirs(&DestinationLayout::new(root), VOLUME_ARTIFACT).unwrap();

        assert!(report.renamed.is_empty());
        assert!(root.join("plain/___Volumes___HD-LCU3___.txt").exists());
        assert!(root.join("lower___volumes___hd-lcu3___").exists());
    }

    #[test]
    fn test_rename_artifact_only_name_skipped() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join(VOLUME_ARTIFACT)).unwrap();

        let report = rename_dirs(&DestinationLayout::new(root), VOLUME_ARTIFACT).unwrap();

        assert_eq!(report.skipped, vec![root.join(VOLUME_ARTIFACT)]);
        assert!(root.join(VOLUME_ARTIFACT).exists());
    }

    #[test]
    fn test_rename_onto_existing_is_fatal() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("photos")).unwrap();
        fs::create_dir_all(root.join("___Volumes___HD-LCU3___photos")).unwrap();

        let result = rename_dirs(&DestinationLayout::new(root), VOLUME_ARTIFACT);
        assert!(matches!(result, Err(OrganizeError::DestinationExists { .. })));
    }

    #[test]
    fn test_move_dir_flattens_staging() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let layout = DestinationLayout::new(root);
        let group = layout.staging_dir().join("group-1");
        fs::create_dir_all(&group).unwrap();
        fs::write(group.join("a____x.jpg"), "a").unwrap();
        fs::write(group.join("b____x.jpg"), "b").unwrap();
        fs::write(root.join("a____x.jpg"), "already here").unwrap();

        let report = move_dir(&layout).unwrap();

        assert_eq!(report.moved.len(), 2);
        assert_eq!(report.removed_dirs, 1);
        assert_eq!(fs::read_to_string(root.join("a____x_1.jpg")).unwrap(), "a");
        assert_eq!(fs::read_to_string(root.join("b____x.jpg")).unwrap(), "b");
        assert_eq!(fs::read_to_string(root.join("a____x.jpg")).unwrap(), "already here");
        assert!(!group.exists());
        assert!(layout.staging_dir().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_empty_dirs_reports_unreadable_dir() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let locked = temp_dir.path().join("group-1");
        fs::create_dir_all(locked.join("inner")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permission bits are not enforced for this user.
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = remove_empty_dirs(temp_dir.path());

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(result.is_err());
        assert!(locked.join("inner").exists());
    }

    #[test]
    fn test_move_dir_without_staging() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let report = move_dir(&DestinationLayout::new(temp_dir.path())).unwrap();
        assert!(report.moved.is_empty());
    }
}
