//! Command-line interface module for filene.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing and configuration overrides
//! - The operation selector and its integer codes
//! - Pass orchestration, one log file per pass
//! - Console reporting of each pass's outcome

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::error;

use crate::config::Config;
use crate::copy::exec_copy;
use crate::dedup::de_duplicate;
use crate::duplicates::{RandomGroupIds, check_duplication};
use crate::file_organizer::{FileOrganizer, OrganizeResult};
use crate::layout::DestinationLayout;
use crate::listing::{create_output_dirs, list_up};
use crate::logging::PassLog;
use crate::output::OutputFormatter;
use crate::rename_dir::{move_dir, rename_dirs};
use crate::undo::UndoManager;

/// Command-line arguments. Anything given here overrides the config file.
#[derive(Debug, Parser)]
#[command(
    name = "filene",
    version,
    about = "Sort a file collection into category directories, then find, stage and merge duplicates."
)]
pub struct Cli {
    /// Configuration file (default: ./config/config.toml, then ~/.config/filene/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Pass to run, by code (1-9) or name (e.g. check-duplication)
    #[arg(short, long, value_name = "OP")]
    pub operation: Option<Operation>,

    /// Source root, overriding from_dir
    #[arg(long, value_name = "DIR")]
    pub from: Option<PathBuf>,

    /// Destination root, overriding to_dir
    #[arg(long, value_name = "DIR")]
    pub to: Option<PathBuf>,

    /// More console output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Applies command-line overrides to a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(operation) = self.operation {
            config.operation = operation;
        }
        if let Some(from) = &self.from {
            config.from_dir = from.clone();
        }
        if let Some(to) = &self.to {
            config.to_dir = to.clone();
        }
    }
}

/// The pass selected for a run.
///
/// In the config file an operation is its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Operation {
    /// List source files into the copy list.
    Prepare,
    /// Create the directories recorded by the listing.
    CreateOutputDirs,
    /// Copy every listed file.
    Copy,
    /// Stage duplicate groups under `__duplicated__`.
    CheckDuplication,
    /// Delete duplicates, keeping the first of each group.
    DeDuplication,
    /// Strip the flattening artifact from directory names.
    RenameDir,
    /// Flatten the staging directory into the destination root.
    MoveDir,
    /// Move staged duplicates back where they were found.
    RestoreDuplication,
    /// Prepare, CreateOutputDirs and Copy, in that order.
    All,
}

/// One pass over the destination tree. An [`Operation`] runs one or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Prepare,
    CreateOutputDirs,
    Copy,
    CheckDuplication,
    DeDuplication,
    RenameDir,
    MoveDir,
    RestoreDuplication,
}

impl Pass {
    /// Log file the pass writes under the metadata directory.
    pub fn log_file_name(&self) -> &'static str {
        match self {
            Pass::Prepare => "listUp.log",
            Pass::CreateOutputDirs => "createOutputDir.log",
            Pass::Copy => "execCopy.log",
            Pass::CheckDuplication => "checkDuplication.log",
            Pass::DeDuplication => "deDuplication.log",
            Pass::RenameDir => "renameDir.log",
            Pass::MoveDir => "moveDir.log",
            Pass::RestoreDuplication => "restoreDuplication.log",
        }
    }
}

impl From<Pass> for Operation {
    fn from(pass: Pass) -> Self {
        match pass {
            Pass::Prepare => Operation::Prepare,
            Pass::CreateOutputDirs => Operation::CreateOutputDirs,
            Pass::Copy => Operation::Copy,
            Pass::CheckDuplication => Operation::CheckDuplication,
            Pass::DeDuplication => Operation::DeDuplication,
            Pass::RenameDir => Operation::RenameDir,
            Pass::MoveDir => Operation::MoveDir,
            Pass::RestoreDuplication => Operation::RestoreDuplication,
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Operation::from(*self), f)
    }
}

impl Operation {
    const NAMED: [Operation; 9] = [
        Operation::Prepare,
        Operation::CreateOutputDirs,
        Operation::Copy,
        Operation::CheckDuplication,
        Operation::DeDuplication,
        Operation::RenameDir,
        Operation::MoveDir,
        Operation::RestoreDuplication,
        Operation::All,
    ];

    pub fn code(&self) -> u8 {
        match self {
            Operation::Prepare => 1,
            Operation::CreateOutputDirs => 2,
            Operation::Copy => 3,
            Operation::CheckDuplication => 4,
            Operation::DeDuplication => 5,
            Operation::RenameDir => 6,
            Operation::MoveDir => 7,
            Operation::RestoreDuplication => 8,
            Operation::All => 9,
        }
    }

    /// Kebab-case name accepted on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Prepare => "prepare",
            Operation::CreateOutputDirs => "create-output-dirs",
            Operation::Copy => "copy",
            Operation::CheckDuplication => "check-duplication",
            Operation::DeDuplication => "de-duplication",
            Operation::RenameDir => "rename-dir",
            Operation::MoveDir => "move-dir",
            Operation::RestoreDuplication => "restore-duplication",
            Operation::All => "all",
        }
    }

    /// Passes this operation runs, in order.
    pub fn steps(&self) -> Vec<Pass> {
        match self {
            Operation::Prepare => vec![Pass::Prepare],
            Operation::CreateOutputDirs => vec![Pass::CreateOutputDirs],
            Operation::Copy => vec![Pass::Copy],
            Operation::CheckDuplication => vec![Pass::CheckDuplication],
            Operation::DeDuplication => vec![Pass::DeDuplication],
            Operation::RenameDir => vec![Pass::RenameDir],
            Operation::MoveDir => vec![Pass::MoveDir],
            Operation::RestoreDuplication => vec![Pass::RestoreDuplication],
            Operation::All => vec![Pass::Prepare, Pass::CreateOutputDirs, Pass::Copy],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl TryFrom<u8> for Operation {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::NAMED
            .into_iter()
            .find(|op| op.code() == code)
            .ok_or_else(|| format!("unknown operation code {} (expected 1-9)", code))
    }
}

impl From<Operation> for u8 {
    fn from(operation: Operation) -> Self {
        operation.code()
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::try_from(code);
        }
        Self::NAMED
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown operation '{}'", s))
    }
}

/// Runs the configured operation against the configured roots.
///
/// Every step opens its own log under `<to_dir>/.filene/`. In the combined
/// mode a step only starts once the previous one has finished, and the first
/// failing step stops the run.
///
/// # Examples
///
/// ```no_run
/// use filene::cli::{Operation, run_cli};
/// use filene::config::Config;
///
/// let config = Config::new("/Volumes/HD-LCU3", "/Users/me/organised");
/// if let Err(e) = run_cli(Operation::CheckDuplication, &config, 0) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(operation: Operation, config: &Config, verbose: u8) -> OrganizeResult<()> {
    let layout = DestinationLayout::new(&config.to_dir);
    for step in operation.steps() {
        run_pass(step, config, &layout, verbose)?;
    }
    Ok(())
}

fn run_pass(
    pass: Pass,
    config: &Config,
    layout: &DestinationLayout,
    verbose: u8,
) -> OrganizeResult<()> {
    // Listing is the only pass allowed to create the destination root.
    if pass != Pass::Prepare {
        FileOrganizer::require_dir(layout.root())?;
    }

    let log = PassLog::open(layout, pass.log_file_name(), verbose)?;
    OutputFormatter::header(&pass.to_string());

    log.in_scope(|| {
        let result = execute(pass, config, layout);
        if let Err(e) = &result {
            error!("{}", e);
        }
        result
    })
}

fn execute(pass: Pass, config: &Config, layout: &DestinationLayout) -> OrganizeResult<()> {
    match pass {
        Pass::Prepare => {
            OutputFormatter::info(&format!(
                "Listing {} into {}",
                config.from_dir.display(),
                config.to_dir.display()
            ));
            let filters = config.compile_filters()?;
            let report = list_up(config, &filters)?;
            if let Some(backup) = &report.copy_list_backup {
                OutputFormatter::info(&format!("Previous copy list kept as {}", backup.display()));
            }
            OutputFormatter::summary_table(&report.by_category, report.listed());
            if report.not_target + report.filtered > 0 {
                OutputFormatter::info(&format!(
                    "Not targeted: {}, filtered out: {}",
                    report.not_target, report.filtered
                ));
            }
            OutputFormatter::success(&format!(
                "{} output directories recorded",
                report.output_dirs
            ));
        }
        Pass::CreateOutputDirs => {
            let report = create_output_dirs(layout)?;
            OutputFormatter::success(&format!("Created {} directories", report.created));
            for dir in &report.failed {
                OutputFormatter::warning(&format!("Could not create {}", dir.display()));
            }
        }
        Pass::Copy => {
            let progress = OutputFormatter::create_progress_bar(0);
            let report = exec_copy(layout, config.copy_concurrency, &progress)?;
            progress.finish_with_message("done");
            OutputFormatter::success(&format!("Copied {} files", report.copied));
            if report.failed + report.malformed > 0 {
                OutputFormatter::warning(&format!(
                    "{} copies failed, {} malformed lines; see {}",
                    report.failed,
                    report.malformed,
                    layout.error_list_path().display()
                ));
            }
        }
        Pass::CheckDuplication => {
            let report = check_duplication(layout, RandomGroupIds)?;
            OutputFormatter::info(&format!(
                "{} files checked, {} empty, {} unique",
                report.files_seen, report.empty_files, report.unique_files
            ));
            OutputFormatter::success(&format!(
                "{} duplicate groups, {} files staged in {}",
                report.groups.len(),
                report.relocated_files(),
                layout.staging_dir().display()
            ));
        }
        Pass::DeDuplication => {
            let report = de_duplicate(layout)?;
            OutputFormatter::success(&format!(
                "Kept {} files, removed {} duplicates",
                report.kept,
                report.removed.len()
            ));
        }
        Pass::RenameDir => {
            let report = rename_dirs(layout, &config.rename_artifact)?;
            OutputFormatter::success(&format!("Renamed {} directories", report.renamed.len()));
            for dir in &report.skipped {
                OutputFormatter::warning(&format!("Left {} as is", dir.display()));
            }
        }
        Pass::MoveDir => {
            let report = move_dir(layout)?;
            OutputFormatter::success(&format!(
                "Moved {} files, removed {} group directories",
                report.moved.len(),
                report.removed_dirs
            ));
        }
        Pass::RestoreDuplication => {
            let report = UndoManager::restore_duplicates(layout)?;
            OutputFormatter::success(&format!("Restored {} files", report.restored_files));
            for (path, reason) in &report.skipped_files {
                OutputFormatter::warning(&format!("Skipped {}: {}", path.display(), reason));
            }
            for backup in &report.backups {
                OutputFormatter::info(&format!("Backed up conflicting file to {}", backup.display()));
            }
            if !report.is_complete_success() {
                for (path, reason) in &report.failed_restores {
                    OutputFormatter::error(&format!("{}: {}", path.display(), reason));
                }
                OutputFormatter::warning("History file was NOT deleted due to failures.");
            }
        }
    }
    Ok(())
}
