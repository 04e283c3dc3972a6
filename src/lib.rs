//! filene - sort a file collection into category directories, then find,
//! stage and merge duplicates.
//!
//! A run is one pass over a source or destination tree:
//! listing, output-directory creation and copying build the organized tree;
//! duplicate checking stages files with the same leading bytes under
//! `__duplicated__/<group>/`; the remaining passes delete, flatten, repair
//! or restore.

pub mod cli;
pub mod config;
pub mod copy;
pub mod dedup;
pub mod duplicates;
pub mod file_category;
pub mod file_organizer;
pub mod fingerprint;
pub mod layout;
pub mod listing;
pub mod logging;
pub mod namer;
pub mod output;
pub mod rename_dir;
pub mod undo;
pub mod walker;

pub use config::{CompiledFilters, Config, ConfigError};
pub use duplicates::{DuplicateGrouper, DuplicationReport, check_duplication};
pub use file_category::{Category, ExtensionMapper, TargetSelector};
pub use file_organizer::{FileOrganizer, MoveHistory, OrganizeError, OrganizeResult};
pub use layout::DestinationLayout;
pub use undo::{UndoManager, UndoReport};

pub use cli::{Cli, Operation, Pass, run_cli};
