//! Bulk copy of the planned copy list.
//!
//! The only concurrent pass. Each line of the copy list is an independent
//! task on a bounded rayon pool; a task that fails writes a line to the
//! error list and the pass carries on.

use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::file_organizer::{OrganizeError, OrganizeResult};
use crate::layout::DestinationLayout;
use crate::listing::CopyEntry;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    pub failed: usize,
    /// Copy-list lines that could not be parsed.
    pub malformed: usize,
}

/// Where a single copy stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyStage {
    OpenSource,
    CreateDestination,
    Stream,
}

/// Copies every pair in the copy list, `available cores × concurrency_factor`
/// at a time.
///
/// Only a missing copy list or a pool that cannot start are errors. Failed
/// copies are appended to the error list, in the form that tells which step
/// failed.
pub fn exec_copy(
    layout: &DestinationLayout,
    concurrency_factor: usize,
    progress: &ProgressBar,
) -> OrganizeResult<CopyReport> {
    let copy_list_path = layout.copy_list_path();
    let contents =
        fs::read_to_string(&copy_list_path).map_err(|e| OrganizeError::ListReadFailed {
            path: copy_list_path.clone(),
            source: e,
        })?;

    layout.ensure_metadata_dir()?;
    let error_list_path = layout.error_list_path();
    let error_list = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&error_list_path)
        .map_err(|e| OrganizeError::ListWriteFailed {
            path: error_list_path.clone(),
            source: e,
        })?;
    let error_list = Mutex::new(error_list);

    let mut report = CopyReport::default();
    let mut entries = Vec::new();
    for line in contents.lines().filter(|l| !l.is_empty()) {
        match CopyEntry::parse(line) {
            Some(entry) => entries.push(entry),
            None => {
                warn!("malformed copy-list line: {}", line);
                record_error(&error_list, line);
                report.malformed += 1;
            }
        }
    }

    let cores = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let workers = cores * concurrency_factor.max(1);
    info!("NumCPU: {}, workers: {}", cores, workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| OrganizeError::WorkerPool {
            reason: e.to_string(),
        })?;

    progress.set_length(entries.len() as u64);
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());

    let outcomes: Vec<Result<(), CopyStage>> = pool.install(|| {
        entries
            .par_iter()
            .map(|entry| {
                tracing::dispatcher::with_default(&dispatch, || {
                    let outcome = copy_file(entry);
                    if let Err(stage) = outcome {
                        record_error(&error_list, &error_line(entry, stage));
                    }
                    progress.inc(1);
                    outcome
                })
            })
            .collect()
    });

    report.copied = outcomes.iter().filter(|o| o.is_ok()).count();
    report.failed = outcomes.len() - report.copied;
    info!(
        "{} copied, {} failed, {} malformed",
        report.copied, report.failed, report.malformed
    );
    Ok(report)
}

fn copy_file(entry: &CopyEntry) -> Result<(), CopyStage> {
    let mut from = File::open(&entry.from).map_err(|e| {
        warn!("failed to open {}: {}", entry.from.display(), e);
        CopyStage::OpenSource
    })?;
    let mut to = File::create(&entry.to).map_err(|e| {
        warn!("failed to create {}: {}", entry.to.display(), e);
        CopyStage::CreateDestination
    })?;
    io::copy(&mut from, &mut to).map_err(|e| {
        warn!(
            "failed to copy {} to {}: {}",
            entry.from.display(),
            entry.to.display(),
            e
        );
        CopyStage::Stream
    })?;

    info!(
        "copied:[from:{}] [to:{}]",
        entry.from.display(),
        entry.to.display()
    );
    Ok(())
}

fn error_line(entry: &CopyEntry, stage: CopyStage) -> String {
    match stage {
        CopyStage::OpenSource => entry.from.display().to_string(),
        CopyStage::CreateDestination => entry.to.display().to_string(),
        CopyStage::Stream => format!(
            "[from:{}] [to:{}]",
            entry.from.display(),
            entry.to.display()
        ),
    }
}

fn record_error(error_list: &Mutex<File>, line: &str) {
    let mut file = error_list.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Err(e) = writeln!(file, "{}", line) {
        warn!("failed to write error list: {}", e);
    }
}
