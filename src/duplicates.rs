//! Duplicate detection by byte-prefix fingerprint.
//!
//! The destination tree is walked once. Files are grouped by [`Fingerprint`];
//! the first file of a group (the primary) stays where it is until a second
//! file with the same fingerprint turns up. At that point a group directory
//! `<dest>/__duplicated__/<group-id>/` is created, the primary is moved into
//! it, and every later member follows. Singletons are never touched.
//!
//! Any failure to read a prefix or to move a file aborts the pass: the
//! in-memory groups assume that recorded paths match the disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::file_organizer::{FileOrganizer, MoveHistory, MoveRecord, OrganizeError, OrganizeResult};
use crate::fingerprint::{Fingerprint, read_prefix};
use crate::layout::{DestinationLayout, is_ignored_file};
use crate::namer::with_parent_dir_name;
use crate::walker::TreeWalker;

/// Source of fresh group identifiers.
pub trait GroupIds {
    fn next_id(&mut self) -> String;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomGroupIds;

impl GroupIds for RandomGroupIds {
    fn next_id(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

impl<F: FnMut() -> String> GroupIds for F {
    fn next_id(&mut self) -> String {
        self()
    }
}

/// One file in a fingerprint group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    /// Where the file was found.
    pub original: PathBuf,
    /// Where the file lives once the group is materialized.
    pub assigned: PathBuf,
}

/// Files sharing one fingerprint, in the order they were found.
#[derive(Debug, Clone)]
pub struct FingerprintGroup {
    id: String,
    dir: PathBuf,
    members: Vec<GroupMember>,
}

impl FingerprintGroup {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The staging subdirectory the group is (or would be) materialized in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }

    /// The first file seen with this fingerprint.
    pub fn primary(&self) -> &GroupMember {
        &self.members[0]
    }

    /// Whether files have actually been moved into the group directory.
    pub fn is_materialized(&self) -> bool {
        self.members.len() > 1
    }
}

/// What happened to one visited file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
    /// Ignored file, or already inside the staging directory.
    Ignored,
    /// Zero-length file, never grouped.
    Empty,
    /// First file with its fingerprint; left in place.
    Primary,
    /// Moved into a group directory. `moved` holds the primary as well when
    /// this was the second member.
    Relocated { group: String, moved: Vec<GroupMember> },
}

/// Groups files by fingerprint and stages duplicates.
///
/// Owns the whole fingerprint map; one grouper serves one traversal.
/// Every move is recorded as soon as it succeeds, so the relocations stay
/// complete even when a later move in the same visit fails.
pub struct DuplicateGrouper<G: GroupIds = RandomGroupIds> {
    staging_dir: PathBuf,
    groups: HashMap<Fingerprint, FingerprintGroup>,
    relocations: Vec<MoveRecord>,
    ids: G,
}

impl DuplicateGrouper<RandomGroupIds> {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self::with_ids(staging_dir, RandomGroupIds)
    }
}

impl<G: GroupIds> DuplicateGrouper<G> {
    pub fn with_ids(staging_dir: impl Into<PathBuf>, ids: G) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            groups: HashMap::new(),
            relocations: Vec::new(),
            ids,
        }
    }

    /// Processes one file from the walk.
    pub fn visit(&mut self, path: &Path) -> OrganizeResult<Visit> {
        if is_ignored_file(path) || path.starts_with(&self.staging_dir) {
            return Ok(Visit::Ignored);
        }

        let fingerprint = read_prefix(path).map_err(|e| OrganizeError::Fingerprint {
            path: path.to_path_buf(),
            source: e,
        })?;
        let Some(fingerprint) = fingerprint else {
            info!("size 0 {}", path.display());
            return Ok(Visit::Empty);
        };

        let Some(group) = self.groups.get_mut(&fingerprint) else {
            let id = self.ids.next_id();
            let dir = self.staging_dir.join(&id);
            let assigned = dir.join(with_parent_dir_name(path));
            debug!("new group {} for {}", id, path.display());
            self.groups.insert(
                fingerprint,
                FingerprintGroup {
                    id,
                    dir,
                    members: vec![GroupMember {
                        original: path.to_path_buf(),
                        assigned,
                    }],
                },
            );
            return Ok(Visit::Primary);
        };

        let mut moved = Vec::with_capacity(2);
        if group.members.len() == 1 {
            FileOrganizer::create_dir_all(&group.dir)?;
            let primary = &group.members[0];
            info!(
                "[oldPath:{}] [newPath:{}]",
                primary.original.display(),
                primary.assigned.display()
            );
            FileOrganizer::move_path(&primary.original, &primary.assigned)?;
            self.relocations.push(move_record(&group.id, primary));
            moved.push(primary.clone());
        }

        let assigned = FileOrganizer::unique_destination(&group.dir, &with_parent_dir_name(path));
        info!(
            "[oldPath:{}] [newPath:{}]",
            path.display(),
            assigned.display()
        );
        FileOrganizer::move_path(path, &assigned)?;

        let member = GroupMember {
            original: path.to_path_buf(),
            assigned,
        };
        self.relocations.push(move_record(&group.id, &member));
        group.members.push(member.clone());
        moved.push(member);

        Ok(Visit::Relocated {
            group: group.id.clone(),
            moved,
        })
    }

    /// Drains the moves performed since the last call, in the order they
    /// happened.
    pub fn take_relocations(&mut self) -> Vec<MoveRecord> {
        std::mem::take(&mut self.relocations)
    }

    /// All groups seen so far, singletons included.
    pub fn groups(&self) -> impl Iterator<Item = &FingerprintGroup> {
        self.groups.values()
    }

    pub fn into_groups(self) -> Vec<FingerprintGroup> {
        self.groups.into_values().collect()
    }
}

fn move_record(group: &str, member: &GroupMember) -> MoveRecord {
    MoveRecord {
        original_path: member.original.clone(),
        new_path: member.assigned.clone(),
        group: group.to_string(),
    }
}

/// Outcome of a check-duplication pass.
#[derive(Debug, Default)]
pub struct DuplicationReport {
    /// Files fingerprinted, empty ones included.
    pub files_seen: usize,
    pub empty_files: usize,
    /// Files whose fingerprint was seen only once.
    pub unique_files: usize,
    /// Groups with two or more members, sorted by primary path.
    pub groups: Vec<FingerprintGroup>,
}

impl DuplicationReport {
    /// Number of files now living in the staging directory.
    pub fn relocated_files(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }
}

/// Runs the check-duplication pass over the destination tree.
///
/// The staging and metadata directories are not walked, so running the pass
/// again leaves already-staged groups alone. Every relocation is appended to
/// the duplication history for a later restore.
pub fn check_duplication<G: GroupIds>(
    layout: &DestinationLayout,
    ids: G,
) -> OrganizeResult<DuplicationReport> {
    FileOrganizer::require_dir(layout.root())?;
    layout.ensure_metadata_dir()?;
    FileOrganizer::create_dir_all(&layout.staging_dir())?;

    let walker = TreeWalker::new(layout.root())
        .skip_dir(layout.staging_dir())
        .skip_dir(layout.metadata_dir());
    let mut grouper = DuplicateGrouper::with_ids(layout.staging_dir(), ids);
    let mut report = DuplicationReport::default();

    // The history is written even when a later file aborts the pass, so
    // files already moved can still be restored.
    let walked: OrganizeResult<()> = (|| {
        for path in walker.files() {
            let path = path?;
            match grouper.visit(&path)? {
                Visit::Ignored => continue,
                Visit::Empty => report.empty_files += 1,
                Visit::Primary | Visit::Relocated { .. } => {}
            }
            report.files_seen += 1;
        }
        Ok(())
    })();

    MoveHistory::append(
        &layout.history_path(),
        layout.root(),
        grouper.take_relocations(),
    )?;
    walked?;

    let (mut groups, singletons): (Vec<_>, Vec<_>) = grouper
        .into_groups()
        .into_iter()
        .partition(FingerprintGroup::is_materialized);
    groups.sort_by(|a, b| a.primary().original.cmp(&b.primary().original));
    report.unique_files = singletons.len();
    report.groups = groups;

    info!(
        "{} files seen, {} duplicate groups, {} files staged",
        report.files_seen,
        report.groups.len(),
        report.relocated_files()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sequential_ids() -> impl FnMut() -> String {
        let mut next = 0;
        move || {
            next += 1;
            format!("group-{}", next)
        }
    }

    fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_primary_stays_in_place() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let a = write(root, "a/x.jpg", b"same");
        let mut grouper = DuplicateGrouper::with_ids(root.join("__duplicated__"), sequential_ids());

        assert_eq!(grouper.visit(&a).unwrap(), Visit::Primary);

        assert!(a.exists());
        assert!(!root.join("__duplicated__").exists());
        let group = grouper.groups().next().expect("group missing");
        assert_eq!(group.id(), "group-1");
        assert_eq!(
            group.primary().assigned,
            root.join("__duplicated__/group-1/a____x.jpg")
        );
        assert!(!group.is_materialized());
    }

    #[test]
    fn test_second_member_materializes_group() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let staging = root.join("__duplicated__");
        let a = write(root, "a/x.jpg", b"same");
        let b = write(root, "b/x.jpg", b"same");
        let mut grouper = DuplicateGrouper::with_ids(&staging, sequential_ids());

        grouper.visit(&a).unwrap();
        let visit = grouper.visit(&b).unwrap();

        let expected_a = staging.join("group-1/a____x.jpg");
        let expected_b = staging.join("group-1/b____x.jpg");
        assert_eq!(
            visit,
            Visit::Relocated {
                group: "group-1".to_string(),
                moved: vec![
                    GroupMember { original: a.clone(), assigned: expected_a.clone() },
                    GroupMember { original: b.clone(), assigned: expected_b.clone() },
                ],
            }
        );
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(expected_a.exists());
        assert!(expected_b.exists());
    }

    #[test]
    fn test_third_member_joins_existing_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let staging = root.join("__duplicated__");
        let a = write(root, "a/x.jpg", b"same");
        let b = write(root, "b/x.jpg", b"same");
        let c = write(root, "c/y.jpg", b"same");
        let mut grouper = DuplicateGrouper::with_ids(&staging, sequential_ids());

        grouper.visit(&a).unwrap();
        grouper.visit(&b).unwrap();
        let visit = grouper.visit(&c).unwrap();

        match visit {
            Visit::Relocated { moved, .. } => {
                assert_eq!(moved.len(), 1, "primary must not be moved twice");
                assert_eq!(moved[0].assigned, staging.join("group-1/c____y.jpg"));
            }
            other => panic!("unexpected visit {:?}", other),
        }
        let group = grouper.groups().next().unwrap();
        assert_eq!(group.members().len(), 3);
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 1);
    }

    #[test]
    fn test_distinct_prefixes_never_grouped() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let a = write(root, "a/x.jpg", b"one");
        let b = write(root, "b/x.jpg", b"two");
        let mut grouper = DuplicateGrouper::with_ids(root.join("__duplicated__"), sequential_ids());

        assert_eq!(grouper.visit(&a).unwrap(), Visit::Primary);
        assert_eq!(grouper.visit(&b).unwrap(), Visit::Primary);
        assert_eq!(grouper.groups().count(), 2);
        assert!(a.exists() && b.exists());
    }

    #[test]
    fn test_empty_and_ignored_files_skipped() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let staging = root.join("__duplicated__");
        let empty = write(root, "a/empty.txt", b"");
        let finder = write(root, "a/.DS_Store", b"finder");
        let staged = write(root, "__duplicated__/old/a____x.jpg", b"finder");
        let mut grouper = DuplicateGrouper::with_ids(&staging, sequential_ids());

        assert_eq!(grouper.visit(&empty).unwrap(), Visit::Empty);
        assert_eq!(grouper.visit(&finder).unwrap(), Visit::Ignored);
        assert_eq!(grouper.visit(&staged).unwrap(), Visit::Ignored);
        assert_eq!(grouper.groups().count(), 0);
        assert!(empty.exists() && finder.exists() && staged.exists());
    }

    #[test]
    fn test_same_derived_name_is_suffixed() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let staging = root.join("__duplicated__");
        let a = write(root, "p/a/x.jpg", b"same");
        let b = write(root, "q/a/x.jpg", b"same");
        let mut grouper = DuplicateGrouper::with_ids(&staging, sequential_ids());

        grouper.visit(&a).unwrap();
        grouper.visit(&b).unwrap();

        assert!(staging.join("group-1/a____x.jpg").exists());
        assert!(staging.join("group-1/a____x_1.jpg").exists());
    }

    #[test]
    fn test_unreadable_file_is_fatal() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut grouper =
            DuplicateGrouper::with_ids(temp_dir.path().join("__duplicated__"), sequential_ids());

        let result = grouper.visit(&temp_dir.path().join("vanished.jpg"));
        assert!(matches!(result, Err(OrganizeError::Fingerprint { .. })));
    }

    #[test]
    fn test_check_duplication_scenario() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        write(root, "a/x.jpg", b"identical bytes");
        write(root, "b/x.jpg", b"identical bytes");
        write(root, "c/unique.jpg", b"nothing like it");
        let layout = DestinationLayout::new(root);

        let report = check_duplication(&layout, sequential_ids()).unwrap();

        assert_eq!(report.files_seen, 3);
        assert_eq!(report.unique_files, 1);
        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.members().len(), 2);
        assert!(root.join("__duplicated__").join(group.id()).join("a____x.jpg").exists());
        assert!(root.join("__duplicated__").join(group.id()).join("b____x.jpg").exists());
        assert!(root.join("c/unique.jpg").exists());

        let history = MoveHistory::load(&layout.history_path()).unwrap().unwrap();
        assert_eq!(history.operations.len(), 2);
        assert_eq!(history.operations[0].original_path, root.join("a/x.jpg"));
    }

    #[test]
    fn test_failed_second_move_keeps_primary_in_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let primary = write(root, "a/x.jpg", b"identical bytes");
        // `longparent____<name>` is longer than the file system allows.
        let long_name = format!("{}.jpg", "y".repeat(246));
        let second = write(root, &format!("longparent/{}", long_name), b"identical bytes");
        let layout = DestinationLayout::new(root);

        let result = check_duplication(&layout, sequential_ids());

        assert!(matches!(result, Err(OrganizeError::FileMoveFailure { .. })));
        assert!(!primary.exists());
        assert!(second.exists());
        let history = MoveHistory::load(&layout.history_path())
            .unwrap()
            .expect("history must be written after an aborted pass");
        assert_eq!(
            history.operations,
            vec![MoveRecord {
                original_path: primary,
                new_path: root.join("__duplicated__/group-1/a____x.jpg"),
                group: "group-1".to_string(),
            }]
        );
        assert!(history.operations[0].new_path.exists());
    }

    #[test]
    fn test_relocations_recorded_per_move() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let staging = root.join("__duplicated__");
        let a = write(root, "a/x.jpg", b"same");
        let b = write(root, "b/x.jpg", b"same");
        let mut grouper = DuplicateGrouper::with_ids(&staging, sequential_ids());

        grouper.visit(&a).unwrap();
        assert!(grouper.take_relocations().is_empty());
        grouper.visit(&b).unwrap();

        let relocations = grouper.take_relocations();
        assert_eq!(relocations.len(), 2);
        assert_eq!(relocations[0].original_path, a);
        assert_eq!(relocations[1].original_path, b);
        assert!(grouper.take_relocations().is_empty());
    }

    #[test]
    fn test_check_duplication_is_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        write(root, "a/x.jpg", b"identical bytes");
        write(root, "b/x.jpg", b"identical bytes");
        let layout = DestinationLayout::new(root);

        check_duplication(&layout, sequential_ids()).unwrap();
        let second = check_duplication(&layout, sequential_ids()).unwrap();

        assert_eq!(second.files_seen, 0);
        assert!(second.groups.is_empty());
        let history = MoveHistory::load(&layout.history_path()).unwrap().unwrap();
        assert_eq!(history.operations.len(), 2);
    }

    #[test]
    fn test_check_duplication_missing_root() {
        let layout = DestinationLayout::new("/non/existent/dest");
        assert!(check_duplication(&layout, RandomGroupIds).is_err());
    }
}
