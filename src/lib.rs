//! tidywatch - automatic directory organization
//!
//! Watches a single directory (non-recursive) for newly-arrived files and
//! relocates each one into a sub-directory chosen by file extension, resolving
//! name collisions with a monotonic suffix. Configuration (watch directory,
//! extension rules, ignore rules) is loaded once at startup and immutable for
//! the process lifetime.

pub mod classifier;
pub mod config;
pub mod mover;
pub mod output;
pub mod scanner;
pub mod watcher;

pub use classifier::ExtensionMap;
pub use config::{ConfigError, ConfigFile, WatchConfig};
pub use mover::{MoveError, MoveOutcome, SettlePolicy};
pub use scanner::{MoveCandidate, ScanError};
pub use watcher::{LoopEvent, PassReport, WatchError, WatchLoop};
