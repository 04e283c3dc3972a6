//! Run configuration and file filtering rules.
//!
//! Configuration is read once at startup from a TOML file and is immutable
//! afterwards. It names the source and destination roots, the extension lists
//! used for category routing, which category a listing run targets, and which
//! pass to run.
//!
//! # Configuration File Format
//!
//! ```toml
//! from_dir = "/Volumes/HD-LCU3"
//! to_dir = "/Users/me/organised"
//! target_exts = "all"
//! rename = false
//! operation = 9
//!
//! [exts]
//! documents = [".pdf", ".txt"]
//! images = [".jpg", ".png"]
//! musics = [".mp3"]
//! videos = [".mp4"]
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = ["Thumbs.db"]
//! patterns = ["**/cache/**"]
//! extensions = ["tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Operation;
use crate::file_category::TargetSelector;
use crate::rename_dir::VOLUME_ARTIFACT;

/// Errors that can occur during configuration loading and filtering.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// No configuration file was found in any lookup location.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Complete configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the tree to list and copy from.
    pub from_dir: PathBuf,
    /// Root of the organized tree; every pass after listing works here.
    pub to_dir: PathBuf,
    /// Which category a listing run picks up.
    #[serde(default)]
    pub target_exts: TargetSelector,
    /// Extension allow-lists per category.
    #[serde(default)]
    pub exts: ExtensionLists,
    /// Rename copied files to `<created>_<token>_<name>`.
    #[serde(default)]
    pub rename: bool,
    /// Pass to run when the command line does not pick one.
    #[serde(default = "default_operation")]
    pub operation: Operation,
    /// Copy workers per available core.
    #[serde(default = "default_copy_concurrency")]
    pub copy_concurrency: usize,
    /// Literal the rename-dir pass strips from directory names.
    #[serde(default = "default_rename_artifact")]
    pub rename_artifact: String,
    /// Exclusion rules for the listing pass.
    #[serde(default)]
    pub filters: FilterRules,
}

fn default_operation() -> Operation {
    Operation::All
}

fn default_copy_concurrency() -> usize {
    6
}

fn default_rename_artifact() -> String {
    VOLUME_ARTIFACT.to_string()
}

/// Extension allow-lists, one per routed category.
///
/// Entries may be written with or without the leading dot; matching is
/// case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionLists {
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub musics: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
}

impl Default for ExtensionLists {
    fn default() -> Self {
        let owned = |exts: &[&str]| exts.iter().map(|e| e.to_string()).collect();
        Self {
            documents: owned(&[
                "pdf", "txt", "doc", "docx", "md", "rtf", "odt", "html", "htm", "xls", "xlsx",
                "csv", "ppt", "pptx", "pages", "numbers", "key",
            ]),
            images: owned(&[
                "jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif", "heic", "heif", "svg",
                "raw", "cr2", "nef", "arw", "dng",
            ]),
            musics: owned(&["mp3", "wav", "ogg", "flac", "aac", "m4a", "wma", "aiff", "alac"]),
            videos: owned(&[
                "mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "3gp", "m4v", "mts", "mpg",
                "mpeg",
            ]),
        }
    }
}

impl Config {
    /// Builds a configuration with defaults for everything but the two roots.
    pub fn new(from_dir: impl Into<PathBuf>, to_dir: impl Into<PathBuf>) -> Self {
        Self {
            from_dir: from_dir.into(),
            to_dir: to_dir.into(),
            target_exts: TargetSelector::default(),
            exts: ExtensionLists::default(),
            rename: false,
            operation: default_operation(),
            copy_concurrency: default_copy_concurrency(),
            rename_artifact: default_rename_artifact(),
            filters: FilterRules::default(),
        }
    }

    /// Load configuration from a file.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `config/config.toml` in the current directory
    /// 3. Look for `~/.config/filene/config.toml` in home directory
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` when none of the locations has a file, since
    /// the source and destination roots have no sensible default.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from("config").join("config.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("filene")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Err(ConfigError::ConfigNotFound(local_config))
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&content)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.to_dir.as_os_str().is_empty() {
            return Err(ConfigError::ConfigInvalid(
                "to_dir must not be empty".to_string(),
            ));
        }
        if self.copy_concurrency == 0 {
            return Err(ConfigError::ConfigInvalid(
                "copy_concurrency must be at least 1".to_string(),
            ));
        }
        if self.rename_artifact.is_empty() {
            return Err(ConfigError::ConfigInvalid(
                "rename_artifact must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Compile the filter rules into matchers for the listing pass.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding files from listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.tmp", "**/cache/**").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "bak", "tmp", "log").
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Compiled filter rules, ready for matching.
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Check if a file should be listed (not excluded).
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches_any(&self.include_patterns, file_path) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches_any(&self.exclude_patterns, file_path) {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    fn matches_any(&self, patterns: &[Pattern], file_path: &Path) -> bool {
        patterns.iter().any(|pattern| pattern.matches_path(file_path))
    }
}
