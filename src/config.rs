//! Configuration loading and validation.
//!
//! Configuration names the directory to watch, the extension → folder rules,
//! and optional ignore rules for files that must never be relocated
//! (hidden files, in-flight download artifacts, and so on).
//!
//! # Configuration File Format
//!
//! The native format is TOML:
//!
//! ```toml
//! watch_directory = "/home/user/Downloads"
//!
//! [rules]
//! ".pdf" = "documents"
//! ".jpg" = "images"
//! ".zip" = "archives"
//!
//! [ignore]
//! include_hidden = false
//! filenames = ["Thumbs.db"]
//! patterns = ["*.part", "*.crdownload"]
//! ```
//!
//! Files ending in `.json` are parsed as JSON with the same structure, for
//! compatibility with `config.json` setups.

use crate::classifier::ExtensionMap;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Errors that can occur while loading or validating configuration.
///
/// All of these are fatal at startup: the watch loop is never entered with a
/// broken configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML or JSON syntax or structure.
    ConfigInvalid(String),
    /// The configured watch directory does not exist or is not a directory.
    WatchDirInvalid(PathBuf),
    /// A rule key or value failed validation.
    RuleInvalid {
        /// The extension key of the offending rule.
        extension: String,
        /// Why the rule was rejected.
        reason: String,
    },
    /// Invalid glob pattern in the ignore rules.
    InvalidIgnorePattern(String),
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
            ConfigError::WatchDirInvalid(path) => {
                write!(
                    f,
                    "Watch directory does not exist or is not a directory: {}",
                    path.display()
                )
            }
            ConfigError::RuleInvalid { extension, reason } => {
                write!(f, "Invalid rule for '{}': {}", extension, reason)
            }
            ConfigError::InvalidIgnorePattern(pattern) => {
                write!(f, "Invalid ignore pattern '{}'", pattern)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Raw configuration as deserialized from TOML or JSON, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Path to the directory under observation.
    pub watch_directory: String,

    /// Extension → destination folder rules.
    pub rules: HashMap<String, String>,

    /// Rules for files that must never be moved.
    #[serde(default)]
    pub ignore: IgnoreRules,
}

/// Rules for excluding files from organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgnoreRules {
    /// Whether hidden files (leading dot) may be moved. Defaults to false.
    ///
    /// This is deliberately stricter than plain extension matching: a
    /// `.hidden.pdf` stays put under the defaults even though its extension
    /// is mapped, since dotfiles are usually tool state rather than arrivals.
    #[serde(default)]
    pub include_hidden: bool,

    /// Exact filenames to skip (e.g., "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to skip (e.g., "*.part", "*.crdownload").
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl ConfigFile {
    /// Load configuration, trying well-known locations when no path is given.
    ///
    /// Lookup order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. `tidywatch.toml` in the current directory
    /// 3. `config.json` in the current directory
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` when no configuration can be
    /// located, or a parse error for a file that exists but is malformed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_toml = PathBuf::from("tidywatch.toml");
        if local_toml.exists() {
            return Self::load_from_file(&local_toml);
        }

        let local_json = PathBuf::from("config.json");
        if local_json.exists() {
            return Self::load_from_file(&local_json);
        }

        Err(ConfigError::ConfigNotFound(local_toml))
    }

    /// Load configuration from a specific file.
    ///
    /// The format is chosen by extension: `.json` files are parsed as JSON,
    /// everything else as TOML.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
        }
    }

    /// Validate the raw configuration into the engine's runtime form.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch directory is missing, a rule is invalid,
    /// or an ignore pattern fails to compile.
    pub fn validate(self) -> Result<WatchConfig, ConfigError> {
        let watch_dir = PathBuf::from(&self.watch_directory);
        if !watch_dir.is_dir() {
            return Err(ConfigError::WatchDirInvalid(watch_dir));
        }
        // Absolute form so log lines and moves are unambiguous regardless of
        // the process working directory.
        let watch_dir = watch_dir
            .canonicalize()
            .map_err(|_| ConfigError::WatchDirInvalid(PathBuf::from(&self.watch_directory)))?;

        let mut seen: HashSet<String> = HashSet::new();
        for (ext, folder) in &self.rules {
            validate_rule(ext, folder)?;
            let normalized = ExtensionMap::normalize_extension(ext);
            if !seen.insert(normalized.clone()) {
                return Err(ConfigError::RuleInvalid {
                    extension: ext.clone(),
                    reason: format!("duplicate rule for '{}'", normalized),
                });
            }
        }

        let ignores = CompiledIgnores::new(&self.ignore)?;

        Ok(WatchConfig {
            watch_dir,
            rules: ExtensionMap::new(self.rules),
            ignores,
        })
    }
}

/// Rejects empty, absolute, and path-traversing destination folder values.
///
/// Destinations may contain separators ("media/images"): the resolver creates
/// parent segments as needed. They must stay inside the watch directory.
fn validate_rule(ext: &str, folder: &str) -> Result<(), ConfigError> {
    let trimmed = ext.trim_start_matches('.');
    if trimmed.is_empty() || trimmed.contains('/') || trimmed.contains('\\') {
        return Err(ConfigError::RuleInvalid {
            extension: ext.to_string(),
            reason: "extension must be a plain suffix like '.pdf'".to_string(),
        });
    }

    if folder.is_empty() {
        return Err(ConfigError::RuleInvalid {
            extension: ext.to_string(),
            reason: "destination folder must not be empty".to_string(),
        });
    }

    let dest = Path::new(folder);
    if dest.is_absolute() {
        return Err(ConfigError::RuleInvalid {
            extension: ext.to_string(),
            reason: "destination folder must be relative to the watch directory".to_string(),
        });
    }
    for component in dest.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(ConfigError::RuleInvalid {
                    extension: ext.to_string(),
                    reason: "destination folder must not contain '..' or '.' segments".to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Validated runtime configuration consumed by the watch loop.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Absolute path of the directory under observation.
    pub watch_dir: PathBuf,
    /// Extension → folder classification rules.
    pub rules: ExtensionMap,
    /// Compiled ignore rules.
    pub ignores: CompiledIgnores,
}

/// Pre-compiled ignore rules for efficient per-file matching.
#[derive(Debug, Clone)]
pub struct CompiledIgnores {
    include_hidden: bool,
    filenames: HashSet<String>,
    patterns: Vec<Pattern>,
}

impl CompiledIgnores {
    fn new(rules: &IgnoreRules) -> Result<Self, ConfigError> {
        let patterns = rules
            .patterns
            .iter()
            .map(|p| Pattern::new(p).map_err(|_| ConfigError::InvalidIgnorePattern(p.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include_hidden: rules.include_hidden,
            filenames: rules.filenames.iter().cloned().collect(),
            patterns,
        })
    }

    /// Defaults: hidden files skipped, no explicit excludes.
    pub fn default_rules() -> Self {
        Self {
            include_hidden: false,
            filenames: HashSet::new(),
            patterns: Vec::new(),
        }
    }

    /// Returns true when a file name should be skipped by the scanner.
    pub fn is_ignored(&self, file_name: &str) -> bool {
        if !self.include_hidden && file_name.starts_with('.') {
            return true;
        }
        if self.filenames.contains(file_name) {
            return true;
        }
        self.patterns.iter().any(|p| p.matches(file_name))
    }
}
