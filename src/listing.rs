//! The listing pass and the output-directory pass.
//!
//! Listing walks the source tree and decides, for every file, where its copy
//! will go. Nothing is copied here: the decisions are written to the copy
//! list and the output-directory set in the metadata directory, which the
//! next two passes consume.

use chrono::{DateTime, Local};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{CompiledFilters, Config};
use crate::file_category::{Category, ExtensionMapper, detect_extension};
use crate::file_organizer::{FileOrganizer, OrganizeError, OrganizeResult};
use crate::layout::{COPY_LIST_SEPARATOR, DestinationLayout};
use crate::namer::{flattened_dir_name, renamed_file_name};
use crate::walker::TreeWalker;

/// One planned copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyEntry {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl CopyEntry {
    /// Formats the entry as a copy-list line, without the newline.
    pub fn to_line(&self) -> String {
        format!(
            "{}{}{}",
            self.from.display(),
            COPY_LIST_SEPARATOR,
            self.to.display()
        )
    }

    /// Parses a copy-list line. `None` when the separator is missing or
    /// either side is empty.
    pub fn parse(line: &str) -> Option<Self> {
        let (from, to) = line.split_once(COPY_LIST_SEPARATOR)?;
        if from.is_empty() || to.is_empty() {
            return None;
        }
        Some(Self {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
        })
    }
}

#[derive(Debug, Default)]
pub struct ListingReport {
    /// Files written to the copy list, per destination category.
    pub by_category: BTreeMap<Category, usize>,
    /// Files outside the target selector.
    pub not_target: usize,
    /// Files rejected by the filter rules.
    pub filtered: usize,
    /// Distinct destination directories recorded.
    pub output_dirs: usize,
    /// Where the previous copy list was moved, if there was one.
    pub copy_list_backup: Option<PathBuf>,
}

impl ListingReport {
    pub fn listed(&self) -> usize {
        self.by_category.values().sum()
    }
}

/// Lists every selected file under `from_dir` into the copy list and records
/// the directories the copies will need.
///
/// A copy list left by an earlier run is kept under a timestamped name. The
/// category directories for the selector are created under the destination
/// root. Any traversal error aborts the pass.
pub fn list_up(config: &Config, filters: &CompiledFilters) -> OrganizeResult<ListingReport> {
    FileOrganizer::require_dir(&config.from_dir)?;
    let layout = DestinationLayout::new(&config.to_dir);
    layout.ensure_metadata_dir()?;

    let mut report = ListingReport {
        copy_list_backup: backup_copy_list(&layout, Local::now())?,
        ..Default::default()
    };

    for category in config.target_exts.categories() {
        FileOrganizer::create_dir_all(&layout.root().join(category.dir_name()))?;
    }

    let copy_list_path = layout.copy_list_path();
    let file = File::create(&copy_list_path).map_err(|e| OrganizeError::ListWriteFailed {
        path: copy_list_path.clone(),
        source: e,
    })?;
    let mut copy_list = BufWriter::new(file);
    let write_err = |e: std::io::Error| OrganizeError::ListWriteFailed {
        path: copy_list_path.clone(),
        source: e,
    };

    let mapper = ExtensionMapper::from_lists(&config.exts);
    let mut output_dirs = BTreeSet::new();
    let walker = TreeWalker::new(&config.from_dir).skip_dir(&config.to_dir);

    for path in walker.files() {
        let path = path?;

        if !filters.should_include(&path) {
            debug!("[FILTERED] {}", path.display());
            report.filtered += 1;
            continue;
        }

        let category = mapper.categorize(detect_extension(&path).as_deref());
        if !config.target_exts.accepts(category) {
            debug!("[NOT_TARGET] {}", path.display());
            report.not_target += 1;
            continue;
        }

        let entry = plan_copy(config, &path, category)?;
        info!("{}", path.display());
        if let Some(parent) = entry.to.parent() {
            output_dirs.insert(parent.to_path_buf());
        }
        writeln!(copy_list, "{}", entry.to_line()).map_err(write_err)?;
        *report.by_category.entry(category).or_insert(0) += 1;
    }
    copy_list.flush().map_err(write_err)?;

    write_output_dir_set(&layout, &output_dirs)?;
    report.output_dirs = output_dirs.len();

    info!(
        "{} files listed, {} not targeted, {} filtered",
        report.listed(),
        report.not_target,
        report.filtered
    );
    Ok(report)
}

/// Destination of one source file:
/// `<to_dir>/<category>/<flattened source dir>/<file name>`.
fn plan_copy(config: &Config, from: &Path, category: Category) -> OrganizeResult<CopyEntry> {
    let file_name = from
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let out_name = if config.rename {
        let created = created_time(from)?;
        let token = uuid::Uuid::new_v4().to_string();
        renamed_file_name(&created, &token, &file_name)
    } else {
        file_name
    };

    let to = config
        .to_dir
        .join(category.dir_name())
        .join(flattened_dir_name(from))
        .join(out_name);

    Ok(CopyEntry {
        from: from.to_path_buf(),
        to,
    })
}

/// Birth time where the platform records one, modification time otherwise.
fn created_time(path: &Path) -> OrganizeResult<DateTime<Local>> {
    let meta = fs::metadata(path).map_err(|e| OrganizeError::ListReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    let time = meta
        .created()
        .or_else(|_| meta.modified())
        .map_err(|e| OrganizeError::ListReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(DateTime::<Local>::from(time))
}

fn backup_copy_list(
    layout: &DestinationLayout,
    now: DateTime<Local>,
) -> OrganizeResult<Option<PathBuf>> {
    let current = layout.copy_list_path();
    if !current.exists() {
        return Ok(None);
    }

    let backup = layout.copy_list_backup_path(now);
    info!("backing up {} to {}", current.display(), backup.display());
    FileOrganizer::move_path(&current, &backup)?;
    Ok(Some(backup))
}

fn write_output_dir_set(layout: &DestinationLayout, dirs: &BTreeSet<PathBuf>) -> OrganizeResult<()> {
    let path = layout.output_dir_set_path();
    let contents: String = dirs
        .iter()
        .map(|dir| format!("{}\n", dir.display()))
        .collect();

    fs::write(&path, contents).map_err(|e| OrganizeError::ListWriteFailed { path, source: e })
}

#[derive(Debug, Default)]
pub struct OutputDirReport {
    pub created: usize,
    pub failed: Vec<PathBuf>,
}

/// Creates every directory named in the output-directory set.
///
/// Failing to create one directory is logged and the pass moves on; the
/// copies into it will land in the error list later.
pub fn create_output_dirs(layout: &DestinationLayout) -> OrganizeResult<OutputDirReport> {
    let path = layout.output_dir_set_path();
    let contents = fs::read_to_string(&path).map_err(|e| OrganizeError::ListReadFailed {
        path: path.clone(),
        source: e,
    })?;

    let mut report = OutputDirReport::default();
    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        let dir = PathBuf::from(line);
        match FileOrganizer::create_dir_all(&dir) {
            Ok(()) => {
                info!("created: {}", dir.display());
                report.created += 1;
            }
            Err(e) => {
                warn!("{}", e);
                report.failed.push(dir);
            }
        }
    }
    Ok(report)
}
