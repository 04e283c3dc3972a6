/// Restoring staged duplicates to where they were found.
///
/// The duplicate-detection pass records every relocation in the duplication
/// history. This module replays that history backwards, moving each staged
/// file back to its original path.
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::file_organizer::{FileOrganizer, MoveHistory, MoveRecord, OrganizeError, OrganizeResult};
use crate::layout::DestinationLayout;
use crate::rename_dir::remove_empty_dirs;

/// Represents the result of a restore.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files moved back.
    pub restored_files: usize,
    /// Files that could not be moved back, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files no longer at their staged location.
    pub skipped_files: Vec<(PathBuf, String)>,
    /// Files that were in the way and got renamed aside.
    pub backups: Vec<PathBuf>,
}

impl UndoReport {
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// True when nothing failed. Skipped files do not count as failures.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty()
    }
}

enum Restore {
    Restored { backup: Option<PathBuf> },
    Skipped(String),
}

pub struct UndoManager;

impl UndoManager {
    /// Moves every staged duplicate back to its original location, newest
    /// relocation first.
    ///
    /// # Edge Cases Handled
    ///
    /// * **File not found**: skipped, e.g. when it was deleted or moved since
    /// * **Something at the original path**: that file is renamed to
    ///   `<name>.bak.<timestamp>` first
    /// * **Original directory gone**: recreated
    /// * **Missing history**: an error, there is nothing to restore
    ///
    /// The history file is deleted only when no restore failed. Emptied group
    /// directories are removed from the staging area.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use filene::layout::DestinationLayout;
    /// use filene::undo::UndoManager;
    ///
    /// let layout = DestinationLayout::new("/Users/me/organised");
    /// match UndoManager::restore_duplicates(&layout) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Restore failed: {}", e),
    /// }
    /// ```
    pub fn restore_duplicates(layout: &DestinationLayout) -> OrganizeResult<UndoReport> {
        FileOrganizer::require_dir(layout.root())?;

        let history_path = layout.history_path();
        let history =
            MoveHistory::load(&history_path)?.ok_or_else(|| OrganizeError::InvalidHistoryFormat {
                reason: format!("no duplication history at {}", history_path.display()),
            })?;

        let mut report = UndoReport::default();
        for record in history.operations.iter().rev() {
            match Self::restore_file(record) {
                Ok(Restore::Restored { backup }) => {
                    info!(
                        "[oldPath:{}] [newPath:{}]",
                        record.new_path.display(),
                        record.original_path.display()
                    );
                    report.restored_files += 1;
                    report.backups.extend(backup);
                }
                Ok(Restore::Skipped(reason)) => {
                    warn!("skipped {}: {}", record.new_path.display(), reason);
                    report.skipped_files.push((record.new_path.clone(), reason));
                }
                Err(e) => {
                    warn!("{}", e);
                    report
                        .failed_restores
                        .push((record.new_path.clone(), e.to_string()));
                }
            }
        }

        let staging = layout.staging_dir();
        if staging.is_dir() {
            remove_empty_dirs(&staging)?;
        }

        if report.is_complete_success() {
            MoveHistory::delete(&history_path)?;
        }

        Ok(report)
    }

    fn restore_file(record: &MoveRecord) -> OrganizeResult<Restore> {
        if !record.new_path.exists() {
            return Ok(Restore::Skipped(
                "File not found at expected location".to_string(),
            ));
        }

        if let Some(parent) = record.original_path.parent() {
            FileOrganizer::create_dir_all(parent)?;
        }

        let backup = if record.original_path.exists() {
            let backup = Self::generate_backup_path(&record.original_path);
            fs::rename(&record.original_path, &backup).map_err(|e| {
                OrganizeError::FileMoveFailure {
                    from: record.original_path.clone(),
                    to: backup.clone(),
                    source: e,
                }
            })?;
            Some(backup)
        } else {
            None
        };

        FileOrganizer::move_path(&record.new_path, &record.original_path)?;
        Ok(Restore::Restored { backup })
    }

    /// `file.txt` becomes `file.txt.bak.20251109-143052`.
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let backup_name = format!("{}.bak.{}", filename, timestamp);

        match original_path.parent() {
            Some(parent) => FileOrganizer::unique_destination(parent, &backup_name),
            None => PathBuf::from(backup_name),
        }
    }
}
