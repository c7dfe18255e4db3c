//! Directory scanning: turning the current contents of the watch directory
//! into a list of move candidates.
//!
//! A scan is a single eager snapshot of the direct children of the watch
//! directory. It never recurses: destination folders created by the engine
//! live inside the watch directory, and descending into them would re-process
//! files that were already moved. Entries created or removed while the
//! snapshot is being taken are picked up by the next triggered scan.

use crate::config::CompiledIgnores;
use crate::classifier::ExtensionMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A file eligible for relocation, produced by a scan and consumed
/// immediately by the mover. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCandidate {
    /// The file's name within the watch directory.
    pub file_name: String,
    /// Absolute path of the file before the move.
    pub source: PathBuf,
    /// Destination folder name, relative to the watch directory.
    pub dest_folder: String,
}

/// Errors that make a whole scan pass fail.
///
/// Fatal to the pass, not to the engine: the watch loop logs it and keeps
/// waiting for the next notification, unless the watch directory itself has
/// vanished.
#[derive(Debug)]
pub enum ScanError {
    /// The watch directory could not be read.
    DirUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The watch directory no longer exists.
    DirVanished(PathBuf),
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::DirUnreadable { path, source } => {
                write!(f, "Cannot read directory {}: {}", path.display(), source)
            }
            ScanError::DirVanished(path) => {
                write!(f, "Watch directory vanished: {}", path.display())
            }
        }
    }
}

impl std::error::Error for ScanError {}

/// Scans the direct children of `watch_dir` and yields a candidate for every
/// regular file whose extension is mapped and which no ignore rule excludes.
///
/// Idempotent by construction: a candidate that was moved is no longer a
/// child of `watch_dir`, so running the scan again with no intervening
/// filesystem change yields nothing.
///
/// # Errors
///
/// Returns `ScanError::DirVanished` when the watch directory itself is gone,
/// `ScanError::DirUnreadable` for any other listing failure.
pub fn scan(
    watch_dir: &Path,
    rules: &ExtensionMap,
    ignores: &CompiledIgnores,
) -> Result<Vec<MoveCandidate>, ScanError> {
    let entries = fs::read_dir(watch_dir).map_err(|e| {
        if watch_dir.is_dir() {
            ScanError::DirUnreadable {
                path: watch_dir.to_path_buf(),
                source: e,
            }
        } else {
            ScanError::DirVanished(watch_dir.to_path_buf())
        }
    })?;

    let mut candidates = Vec::new();

    for entry in entries.flatten() {
        // Directories are never classified, even when their name ends in a
        // mapped extension.
        match entry.file_type() {
            Ok(file_type) if file_type.is_file() => {}
            _ => continue,
        }

        let file_name = match entry.file_name().into_string() {
            Ok(name) => name,
            // Non-UTF-8 names cannot be matched against the rules; leave
            // them in place.
            Err(_) => continue,
        };

        if ignores.is_ignored(&file_name) {
            continue;
        }

        if let Some(dest_folder) = rules.classify(&file_name) {
            candidates.push(MoveCandidate {
                source: entry.path(),
                dest_folder: dest_folder.to_string(),
                file_name,
            });
        }
    }

    // read_dir order is platform-dependent; sort for deterministic passes.
    candidates.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(candidates)
}
