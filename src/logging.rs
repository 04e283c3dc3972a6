//! Per-pass log files.
//!
//! Every pass writes its own log under the metadata directory
//! (`<dest>/.filene/<pass>.log`) and mirrors events to stderr. The subscriber
//! is scoped to the pass rather than installed globally, so the combined
//! mode can switch log files between its steps.

use chrono::Local;
use tracing::level_filters::LevelFilter;
use tracing::{Dispatch, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::file_organizer::{OrganizeError, OrganizeResult};
use crate::layout::DestinationLayout;

/// Stderr verbosity for a `-v` count.
pub fn stderr_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// An open pass log. Events are flushed when it is dropped.
pub struct PassLog {
    dispatch: Dispatch,
    _guard: WorkerGuard,
}

impl PassLog {
    /// Opens (appending) `<dest>/.filene/<file_name>`, creating the metadata
    /// directory if needed.
    ///
    /// The file level comes from `RUST_LOG` and defaults to `info`.
    pub fn open(layout: &DestinationLayout, file_name: &str, verbose: u8) -> OrganizeResult<Self> {
        layout.ensure_metadata_dir()?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(layout.metadata_dir())
            .map_err(|e| OrganizeError::LogSetup {
                reason: e.to_string(),
            })?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let file_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .with_filter(file_filter);
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .with_filter(stderr_level(verbose));

        let subscriber = tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            _guard: guard,
        })
    }

    /// Runs `pass` with this log as the current subscriber, framed by
    /// `START` and `END` lines.
    pub fn in_scope<T>(&self, pass: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, || {
            info!("START: {}", Local::now().to_rfc3339());
            let result = pass();
            info!("END  : {}", Local::now().to_rfc3339());
            result
        })
    }
}
