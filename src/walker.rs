//! Lazy directory traversal.
//!
//! Passes consume the walk as an iterator of `Result`s and stop at the first
//! `Err`, which is how traversal errors abort a whole pass.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::layout::is_ignored_file;

/// Depth-first walker over one root, with whole subtrees excluded.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: PathBuf,
    skipped_dirs: Vec<PathBuf>,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            skipped_dirs: Vec::new(),
        }
    }

    /// Excludes `dir` and everything under it from the walk.
    pub fn skip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skipped_dirs.push(dir.into());
        self
    }

    /// Regular files under the root in file-name order, minus `.DS_Store`.
    ///
    /// Symlinks are not followed and are not reported.
    pub fn files(&self) -> impl Iterator<Item = Result<PathBuf, walkdir::Error>> + use<> {
        let skipped = self.skipped_dirs.clone();
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !is_skipped(entry, &skipped))
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() && !is_ignored_file(entry.path()) => {
                    Some(Ok(entry.into_path()))
                }
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
    }

    /// Directories strictly below the root, children before their parent.
    ///
    /// A directory is yielded only after everything inside it, so renaming it
    /// never invalidates the rest of the walk.
    pub fn dirs_deepest_first(
        &self,
    ) -> impl Iterator<Item = Result<PathBuf, walkdir::Error>> + use<> {
        let skipped = self.skipped_dirs.clone();
        WalkDir::new(&self.root)
            .min_depth(1)
            .contents_first(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !is_skipped(entry, &skipped))
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_dir() => Some(Ok(entry.into_path())),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
    }
}

fn is_skipped(entry: &DirEntry, skipped: &[PathBuf]) -> bool {
    entry.file_type().is_dir() && skipped.iter().any(|dir| entry.path() == Path::new(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn relative(root: &Path, paths: Vec<PathBuf>) -> Vec<String> {
        paths
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_files_sorted_and_filtered() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("b/nested")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("b/nested/z.jpg"), "z").unwrap();
        fs::write(root.join("b/y.jpg"), "y").unwrap();
        fs::write(root.join("a/x.jpg"), "x").unwrap();
        fs::write(root.join("a/.DS_Store"), "finder").unwrap();

        let files: Vec<_> = TreeWalker::new(root)
            .files()
            .collect::<Result<_, _>>()
            .expect("walk failed");

        assert_eq!(
            relative(root, files),
            vec!["a/x.jpg", "b/nested/z.jpg", "b/y.jpg"]
        );
    }

    #[test]
    fn test_skip_dir_excludes_subtree() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("__duplicated__/g")).unwrap();
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::write(root.join("__duplicated__/g/a.jpg"), "a").unwrap();
        fs::write(root.join("keep/b.jpg"), "b").unwrap();

        let files: Vec<_> = TreeWalker::new(root)
            .skip_dir(root.join("__duplicated__"))
            .files()
            .collect::<Result<_, _>>()
            .expect("walk failed");

        assert_eq!(relative(root, files), vec!["keep/b.jpg"]);
    }

    #[test]
    fn test_dirs_deepest_first() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("p/q")).unwrap();
        fs::create_dir_all(root.join("r")).unwrap();
        fs::write(root.join("p/file.txt"), "f").unwrap();

        let dirs: Vec<_> = TreeWalker::new(root)
            .dirs_deepest_first()
            .collect::<Result<_, _>>()
            .expect("walk failed");

        assert_eq!(relative(root, dirs), vec!["p/q", "p", "r"]);
    }

    #[test]
    fn test_missing_root_yields_error() {
        let mut files = TreeWalker::new("/non/existent/root").files();
        assert!(matches!(files.next(), Some(Err(_))));
    }
}
