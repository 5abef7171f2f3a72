//! Runtime settings and file filtering configuration.
//!
//! Settings are loaded from a TOML file and consumed as an immutable value
//! for the duration of one organization pass. The lookup order is:
//! 1. An explicitly provided path
//! 2. `.desktidy.toml` in the current directory
//! 3. `~/.config/desktidy/config.toml`
//! 4. Built-in defaults matching a stock home directory layout
//!
//! # Configuration File Format
//!
//! ```toml
//! [roots]
//! downloads = "/Users/me/Downloads"
//! desktop = "/Users/me/Desktop"
//!
//! [organizer]
//! manual_folder = "Manual"
//! review_folder = "Review"
//! review_threshold_days = 14
//! scan_interval_secs = 3600
//!
//! [grouping]
//! max_edits = 3
//! min_prefix_len = 4
//! min_group_size = 2
//!
//! [filters]
//! enable_hidden_files = false
//! exclude_filenames = [".DS_Store", ".localized"]
//! exclude_patterns = ["*.download", "*.crdownload", "*.part"]
//! exclude_regex = []
//!
//! [tags]
//! manual_color = "red"
//! review_color = "blue"
//! ```

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur while loading or compiling configuration.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// The category table file could not be parsed.
    CategoriesInvalid {
        /// The file that failed to parse.
        path: PathBuf,
        /// The reason parsing failed.
        reason: String,
    },
    /// Invalid glob pattern provided.
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::CategoriesInvalid { path, reason } => {
                write!(f, "Invalid category table {}: {}", path.display(), reason)
            }
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid glob pattern '{}'", pattern)
            }
            ConfigError::InvalidRegexPattern { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level settings for one organization pass.
///
/// Every section is optional in the file; missing sections fall back to
/// defaults that mirror the stock behavior (Downloads + Desktop, 14-day
/// review threshold, hourly scans).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub roots: RootSettings,
    pub organizer: OrganizerSettings,
    pub grouping: GroupingSettings,
    pub filters: FilterRules,
    pub tags: TagSettings,
}

/// The directories a pass organizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RootSettings {
    /// Downloads directory. Defaults to `$HOME/Downloads`.
    pub downloads: Option<PathBuf>,
    /// Desktop directory. Defaults to `$HOME/Desktop`.
    pub desktop: Option<PathBuf>,
}

/// Tunables for the organizer and the access monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerSettings {
    /// Name of the exclusion folder that is never touched.
    pub manual_folder: String,
    /// Name of the folder stale files are promoted to.
    pub review_folder: String,
    /// Files unaccessed for this many days qualify for Review.
    pub review_threshold_days: u64,
    /// Seconds between daemon passes.
    pub scan_interval_secs: u64,
    /// Optional JSON file overriding the built-in category table.
    pub categories_file: Option<PathBuf>,
}

impl Default for OrganizerSettings {
    fn default() -> Self {
        Self {
            manual_folder: "Manual".to_string(),
            review_folder: "Review".to_string(),
            review_threshold_days: 14,
            scan_interval_secs: 3600,
            categories_file: None,
        }
    }
}

/// Tunables for the similarity grouper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingSettings {
    /// Two base keys strictly closer than this edit distance belong together.
    pub max_edits: usize,
    /// Minimum shared prefix length for same-day date grouping.
    pub min_prefix_len: usize,
    /// Clusters smaller than this stay as singletons.
    pub min_group_size: usize,
}

impl Default for GroupingSettings {
    fn default() -> Self {
        Self {
            max_edits: 3,
            min_prefix_len: 4,
            min_group_size: 2,
        }
    }
}

/// Rules for excluding files from organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Whether to organize hidden files (starting with "."). Defaults to false.
    pub enable_hidden_files: bool,
    /// Exact filenames to leave alone (e.g., ".DS_Store").
    pub exclude_filenames: Vec<String>,
    /// Glob patterns to leave alone (e.g., "*.crdownload" for in-flight downloads).
    pub exclude_patterns: Vec<String>,
    /// File extensions to leave alone.
    pub exclude_extensions: Vec<String>,
    /// Regex patterns to leave alone (for advanced users).
    pub exclude_regex: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            exclude_filenames: vec![".DS_Store".to_string(), ".localized".to_string()],
            exclude_patterns: vec![
                "*.download".to_string(),
                "*.crdownload".to_string(),
                "*.part".to_string(),
            ],
            exclude_extensions: Vec::new(),
            exclude_regex: Vec::new(),
        }
    }
}

/// Colors used when labeling the special folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagSettings {
    pub manual_color: String,
    pub review_color: String,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            manual_color: "red".to_string(),
            review_color: "blue".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a file, with fallback to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read or parsed, or if a discovered file is malformed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".desktidy.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("desktidy")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// The roots a pass operates on: configured values, or the user's
    /// Downloads and Desktop directories.
    pub fn organized_roots(&self) -> Vec<PathBuf> {
        let home = std::env::var("HOME").map(PathBuf::from).ok();

        let downloads = self
            .roots
            .downloads
            .clone()
            .or_else(|| home.as_ref().map(|h| h.join("Downloads")));
        let desktop = self
            .roots
            .desktop
            .clone()
            .or_else(|| home.as_ref().map(|h| h.join("Desktop")));

        downloads.into_iter().chain(desktop).collect()
    }

    /// Staleness threshold for the access monitor.
    pub fn review_threshold(&self) -> Duration {
        Duration::from_secs(self.organizer.review_threshold_days * 24 * 60 * 60)
    }

    /// Interval between daemon passes.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.organizer.scan_interval_secs)
    }

    /// Compile filter rules into optimized structures for matching.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Compiled, optimized filter structures for efficient file matching.
///
/// Pre-processes all filter rules (glob patterns, regex patterns, etc.)
/// so matching does not reparse patterns on each file.
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = rules
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = rules
            .exclude_regex
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
            exclude_filenames: rules.exclude_filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
        })
    }

    /// Check whether a file should take part in organization.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Hidden file filter - if hidden and disabled, exclude
    /// 2. Exact filename match - if matched, exclude
    /// 3. File extension match - if matched, exclude
    /// 4. Glob pattern match - if matched, exclude
    /// 5. Regex pattern match - if matched, exclude
    /// 6. Default: include
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

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

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches(&file_name))
        {
            return false;
        }

        if self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
        {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_behavior() {
        let settings = Settings::default();
        assert_eq!(settings.organizer.manual_folder, "Manual");
        assert_eq!(settings.organizer.review_folder, "Review");
        assert_eq!(settings.organizer.review_threshold_days, 14);
        assert_eq!(settings.organizer.scan_interval_secs, 3600);
        assert_eq!(settings.grouping.max_edits, 3);
        assert_eq!(settings.grouping.min_group_size, 2);
        assert!(!settings.filters.enable_hidden_files);
    }

    #[test]
    fn test_parse_partial_file() {
        let settings: Settings = toml::from_str(
            r#"
            [organizer]
            review_threshold_days = 30

            [grouping]
            max_edits = 2
            "#,
        )
        .expect("valid settings");

        assert_eq!(settings.organizer.review_threshold_days, 30);
        assert_eq!(settings.grouping.max_edits, 2);
        // Untouched sections keep their defaults.
        assert_eq!(settings.organizer.manual_folder, "Manual");
        assert_eq!(settings.grouping.min_prefix_len, 4);
    }

    #[test]
    fn test_review_threshold_duration() {
        let settings = Settings::default();
        assert_eq!(
            settings.review_threshold(),
            Duration::from_secs(14 * 24 * 60 * 60)
        );
    }

    #[test]
    fn test_explicit_roots_win() {
        let mut settings = Settings::default();
        settings.roots.downloads = Some(PathBuf::from("/srv/inbox"));
        settings.roots.desktop = Some(PathBuf::from("/srv/desk"));

        let roots = settings.organized_roots();
        assert_eq!(
            roots,
            vec![PathBuf::from("/srv/inbox"), PathBuf::from("/srv/desk")]
        );
    }

    #[test]
    fn test_hidden_files_excluded_by_default() {
        let filters = Settings::default().compile_filters().unwrap();
        assert!(!filters.should_include(Path::new(".DS_Store")));
        assert!(!filters.should_include(Path::new(".hidden")));
        assert!(filters.should_include(Path::new("report.pdf")));
    }

    #[test]
    fn test_in_flight_downloads_excluded() {
        let filters = Settings::default().compile_filters().unwrap();
        assert!(!filters.should_include(Path::new("movie.mkv.part")));
        assert!(!filters.should_include(Path::new("big.iso.crdownload")));
        assert!(filters.should_include(Path::new("movie.mkv")));
    }

    #[test]
    fn test_exclude_extensions_case_insensitive() {
        let mut settings = Settings::default();
        settings.filters.exclude_extensions = vec!["tmp".to_string()];
        let filters = settings.compile_filters().unwrap();

        assert!(!filters.should_include(Path::new("scratch.tmp")));
        assert!(!filters.should_include(Path::new("scratch.TMP")));
        assert!(filters.should_include(Path::new("scratch.txt")));
    }

    #[test]
    fn test_exclude_regex() {
        let mut settings = Settings::default();
        settings.filters.exclude_regex = vec![r"^Screenshot .*\.png$".to_string()];
        let filters = settings.compile_filters().unwrap();

        assert!(!filters.should_include(Path::new("Screenshot 2024-01-05.png")));
        assert!(filters.should_include(Path::new("diagram.png")));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let mut settings = Settings::default();
        settings.filters.exclude_regex = vec!["[invalid(".to_string()];
        assert!(settings.compile_filters().is_err());
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let mut settings = Settings::default();
        settings.filters.exclude_patterns = vec!["[invalid".to_string()];
        assert!(settings.compile_filters().is_err());
    }

    #[test]
    fn test_malformed_toml_is_rejected() {
        let result: Result<Settings, _> = toml::from_str("organizer = \"oops\"");
        assert!(result.is_err());
    }
}
