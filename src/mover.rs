//! File relocation: collision-safe destination resolution and the physical
//! move, with per-file error containment.
//!
//! Every failure here is scoped to one candidate. The watch loop logs it and
//! carries on with the remaining candidates, so one bad file never stops
//! monitoring of the rest.

use crate::scanner::MoveCandidate;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Errors that can occur while moving a single file.
#[derive(Debug)]
pub enum MoveError {
    /// Failed to create the destination directory.
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The source file disappeared between the scan and the move.
    SourceVanished { file_name: String },
    /// The file kept changing across stability probes; retried on a later pass.
    NotSettled { file_name: String },
    /// Even the disambiguated destination name was already taken.
    DestinationOccupied { path: PathBuf },
    /// The rename itself failed (permissions, cross-device, full disk).
    RenameFailed {
        file_name: String,
        destination: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for MoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::SourceVanished { file_name } => {
                write!(f, "Source file vanished before move: {}", file_name)
            }
            Self::NotSettled { file_name } => {
                write!(f, "File still being written, deferred: {}", file_name)
            }
            Self::DestinationOccupied { path } => {
                write!(
                    f,
                    "Disambiguated destination already exists: {}",
                    path.display()
                )
            }
            Self::RenameFailed {
                file_name,
                destination,
                source,
            } => {
                write!(
                    f,
                    "Failed to move {} to {}: {}",
                    file_name,
                    destination.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for MoveError {}

/// A successfully completed move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// The file's original name.
    pub file_name: String,
    /// Destination folder name, relative to the watch directory.
    pub dest_folder: String,
    /// The final absolute path actually used (suffix included on collision).
    pub destination: PathBuf,
}

/// Last suffix handed out, kept strictly increasing across the process so
/// that two collisions within the same millisecond still get distinct names.
static LAST_SUFFIX: AtomicU64 = AtomicU64::new(0);

/// Produces the next disambiguation suffix.
///
/// Fuses the wall clock with a monotonic floor: the result is
/// `max(previous + 1, now_millis)`. Across restarts the millisecond clock
/// keeps suffixes from colliding with names minted by an earlier run.
fn next_suffix() -> u64 {
    let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let prev = LAST_SUFFIX
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
            Some(prev.max(now_ms.saturating_sub(1)) + 1)
        })
        .unwrap_or(0);
    prev.max(now_ms.saturating_sub(1)) + 1
}

/// Inserts a suffix between a file's base name and its extension:
/// `report.pdf` → `report_<suffix>.pdf`.
fn disambiguate(file_name: &str, suffix: u64) -> String {
    let path = Path::new(file_name);
    match (path.file_stem().and_then(|s| s.to_str()), path.extension()) {
        (Some(stem), Some(ext)) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        _ => format!("{}_{}", file_name, suffix),
    }
}

/// Computes a destination path that did not exist at resolution time.
///
/// Ensures the destination folder exists under the watch directory (parent
/// segments included). If `folder/file_name` is taken, a single disambiguated
/// name is derived; if that too is taken the move fails rather than looping.
/// The returned path is advisory, not reserved: a race between resolution and
/// the rename is tolerated by the caller.
///
/// # Errors
///
/// `DirectoryCreationFailed` when the folder cannot be created,
/// `DestinationOccupied` on a secondary collision.
pub fn resolve_destination(
    watch_dir: &Path,
    dest_folder: &str,
    file_name: &str,
) -> Result<PathBuf, MoveError> {
    let folder = watch_dir.join(dest_folder);
    fs::create_dir_all(&folder).map_err(|e| MoveError::DirectoryCreationFailed {
        path: folder.clone(),
        source: e,
    })?;

    let destination = folder.join(file_name);
    if !destination.exists() {
        return Ok(destination);
    }

    let fallback = folder.join(disambiguate(file_name, next_suffix()));
    if fallback.exists() {
        return Err(MoveError::DestinationOccupied { path: fallback });
    }
    Ok(fallback)
}

/// How long to wait for a file to stop changing before moving it.
///
/// A file freshly dropped into the watch directory may still be mid-write.
/// Instead of a fixed sleep, the file's size and modification time are
/// sampled twice per probe; the move proceeds only once two consecutive
/// samples agree. A heuristic, not a guarantee: a writer that pauses longer
/// than the probe interval can still slip through.
#[derive(Debug, Clone, Copy)]
pub struct SettlePolicy {
    /// Delay between the two samples of each probe.
    pub interval: Duration,
    /// How many probes to attempt before giving up on the file for this pass.
    pub max_probes: u32,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_probes: 4,
        }
    }
}

impl SettlePolicy {
    /// Skip stability probing entirely. Used by tests and one-shot runs over
    /// directories with no concurrent writers.
    pub fn immediate() -> Self {
        Self {
            interval: Duration::ZERO,
            max_probes: 0,
        }
    }

    /// Blocks until two consecutive samples of the file agree.
    ///
    /// # Errors
    ///
    /// `SourceVanished` when the file disappears during probing,
    /// `NotSettled` when it is still changing after the last probe.
    fn wait_for_stable(&self, source: &Path, file_name: &str) -> Result<(), MoveError> {
        if self.max_probes == 0 {
            return Ok(());
        }

        let sample = |path: &Path| -> Result<(u64, Option<std::time::SystemTime>), MoveError> {
            let meta = fs::metadata(path).map_err(|_| MoveError::SourceVanished {
                file_name: file_name.to_string(),
            })?;
            Ok((meta.len(), meta.modified().ok()))
        };

        let mut before = sample(source)?;
        for _ in 0..self.max_probes {
            std::thread::sleep(self.interval);
            let after = sample(source)?;
            if after == before {
                return Ok(());
            }
            before = after;
        }

        Err(MoveError::NotSettled {
            file_name: file_name.to_string(),
        })
    }
}

/// Moves one candidate into its destination folder.
///
/// Waits for the source to settle, resolves a collision-free destination,
/// then renames. Cross-device moves are reported as `RenameFailed`; no copy
/// fallback is attempted.
pub fn move_candidate(
    watch_dir: &Path,
    candidate: &MoveCandidate,
    settle: &SettlePolicy,
) -> Result<MoveOutcome, MoveError> {
    settle.wait_for_stable(&candidate.source, &candidate.file_name)?;

    let destination = resolve_destination(watch_dir, &candidate.dest_folder, &candidate.file_name)?;

    fs::rename(&candidate.source, &destination).map_err(|e| {
        if candidate.source.exists() {
            MoveError::RenameFailed {
                file_name: candidate.file_name.clone(),
                destination: destination.clone(),
                source: e,
            }
        } else {
            MoveError::SourceVanished {
                file_name: candidate.file_name.clone(),
            }
        }
    })?;

    Ok(MoveOutcome {
        file_name: candidate.file_name.clone(),
        dest_folder: candidate.dest_folder.clone(),
        destination,
    })
}
