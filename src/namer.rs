//! Output file and directory names.
//!
//! Every function here is pure: the same input always gives the same name
//! and nothing touches the filesystem.

use chrono::{DateTime, Local};
use std::path::{Component, Path};

/// Joins the parent directory name and the file name of a staged duplicate.
pub const PARENT_SEPARATOR: &str = "____";

/// Replaces each `/` when a source directory is flattened into one name.
pub const FLATTEN_SEPARATOR: &str = "___";

/// Used when a path has no parent to borrow a name from.
pub const ROOT_NAME: &str = "root";

/// Prefixes a file name with its parent directory name, so files with the
/// same name from different directories can share one directory.
///
/// `photos/2019/x.jpg` becomes `2019____x.jpg`. Empty segments left by
/// trailing or repeated separators are skipped in favour of the next outer
/// segment.
///
/// # Examples
///
/// ```
/// use filene::namer::with_parent_dir_name;
/// use std::path::Path;
///
/// assert_eq!(with_parent_dir_name(Path::new("/dest/a/x.jpg")), "a____x.jpg");
/// assert_eq!(with_parent_dir_name(Path::new("/dest/a//x.jpg/")), "a____x.jpg");
/// ```
pub fn with_parent_dir_name(path: &Path) -> String {
    let mut segments = path.components().rev().filter_map(|component| match component {
        Component::Normal(name) => Some(name.to_string_lossy()),
        _ => None,
    });

    let file_name = segments.next().unwrap_or_default();
    let parent = segments
        .find(|segment| !segment.is_empty())
        .unwrap_or_else(|| ROOT_NAME.into());

    format!("{}{}{}", parent, PARENT_SEPARATOR, file_name)
}

/// Flattens the parent directory of `path` into a single directory name by
/// replacing every `/` with `___`.
///
/// `/Volumes/HD-LCU3/photos/x.jpg` becomes `___Volumes___HD-LCU3___photos___`.
/// This is the source of the artifact the rename-dir pass strips later.
pub fn flattened_dir_name(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let dir = match raw.rfind('/') {
        Some(idx) => &raw[..=idx],
        None => "",
    };

    if dir.is_empty() {
        ROOT_NAME.to_string()
    } else {
        dir.replace('/', FLATTEN_SEPARATOR)
    }
}

/// Formats a creation time the way renamed copies are prefixed.
pub fn format_created_time(created: &DateTime<Local>) -> String {
    created.format("%Y-%m-%dT%Hh%Mm%Ss").to_string()
}

/// Name for a copied file when renaming is enabled:
/// `<created>_<token>_<original name>`.
pub fn renamed_file_name(created: &DateTime<Local>, token: &str, file_name: &str) -> String {
    format!("{}_{}_{}", format_created_time(created), token, file_name)
}
