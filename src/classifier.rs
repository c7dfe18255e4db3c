//! Extension-based file classification.
//!
//! Maps a lower-cased file extension (including the leading dot, e.g. ".pdf")
//! to the name of the destination folder the file should be moved into.
//! The mapping is built once from validated configuration and is immutable
//! for the lifetime of the process.

use std::collections::HashMap;
use std::path::Path;

/// An immutable extension → destination-folder mapping.
///
/// Keys are stored lower-cased with a leading dot so that lookups are a
/// single normalized `HashMap` probe.
#[derive(Debug, Clone)]
pub struct ExtensionMap {
    rules: HashMap<String, String>,
}

impl ExtensionMap {
    /// Builds a map from already-validated rules.
    ///
    /// Keys are normalized here (lower-cased, leading dot added if missing)
    /// so callers may pass either "pdf" or ".PDF".
    pub fn new(rules: HashMap<String, String>) -> Self {
        let rules = rules
            .into_iter()
            .map(|(ext, folder)| (Self::normalize_extension(&ext), folder))
            .collect();
        Self { rules }
    }

    /// Lower-cases an extension and ensures the leading dot.
    pub fn normalize_extension(ext: &str) -> String {
        let lower = ext.to_lowercase();
        if lower.starts_with('.') {
            lower
        } else {
            format!(".{}", lower)
        }
    }

    /// Looks up the destination folder for a file name.
    ///
    /// Returns `None` for files without an extension and for extensions not
    /// present in the map. Never an error: unmapped files are simply skipped
    /// by the scanner.
    pub fn classify(&self, file_name: &str) -> Option<&str> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())?;
        self.rules
            .get(&format!(".{}", ext.to_lowercase()))
            .map(String::as_str)
    }

    /// Number of configured rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
