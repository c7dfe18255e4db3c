//! The watch loop: event subscription, burst debouncing, and strictly
//! serialized scan-and-move passes.
//!
//! The `notify` watcher delivers raw filesystem events from a background
//! thread into an mpsc channel. A single consumer loop coalesces bursts of
//! notifications into one trigger, runs a pass (scan, then move each
//! candidate), and emits a `LoopEvent` per pass for the caller to render.
//! Because the consumer is the only thread that ever runs a pass, two passes
//! can never race over the same directory.

use crate::config::WatchConfig;
use crate::mover::{self, MoveError, MoveOutcome, SettlePolicy};
use crate::scanner::{self, ScanError};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Errors that terminate the watch loop.
#[derive(Debug)]
pub enum WatchError {
    /// The subscription to the watch directory could not be established.
    Subscribe(notify::Error),
    /// The watch directory disappeared while the loop was running.
    TargetVanished(PathBuf),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::Subscribe(e) => write!(f, "Failed to watch directory: {}", e),
            WatchError::TargetVanished(path) => {
                write!(f, "Watch directory vanished: {}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {}

/// The outcome of one scan-and-move pass.
///
/// Each candidate succeeds or fails independently; a pass with failures is
/// still a completed pass.
#[derive(Debug)]
pub struct PassReport {
    /// Files relocated in this pass.
    pub moved: Vec<MoveOutcome>,
    /// Per-file failures, by file name.
    pub failed: Vec<(String, MoveError)>,
}

impl PassReport {
    /// True when the pass found nothing to do and nothing went wrong.
    pub fn is_quiet(&self) -> bool {
        self.moved.is_empty() && self.failed.is_empty()
    }
}

/// An event emitted by the loop for the output collaborator to render.
#[derive(Debug)]
pub enum LoopEvent {
    /// A pass ran to completion (possibly with per-file failures).
    PassCompleted(PassReport),
    /// The pass could not even list the directory; the loop continues.
    ScanFailed(ScanError),
}

/// Runs one scan-and-move pass over the watch directory.
///
/// Candidates are processed in order; a candidate's failure never stops the
/// rest. This is the unit the loop serializes, and the entry point for
/// one-shot (`--once`) runs.
///
/// # Errors
///
/// Returns the underlying `ScanError` when the directory listing itself
/// fails; per-candidate failures are reported inside the `PassReport`.
pub fn run_pass(config: &WatchConfig, settle: &SettlePolicy) -> Result<PassReport, ScanError> {
    let candidates = scanner::scan(&config.watch_dir, &config.rules, &config.ignores)?;

    let mut report = PassReport {
        moved: Vec::new(),
        failed: Vec::new(),
    };

    for candidate in candidates {
        match mover::move_candidate(&config.watch_dir, &candidate, settle) {
            Ok(outcome) => report.moved.push(outcome),
            Err(e) => report.failed.push((candidate.file_name.clone(), e)),
        }
    }

    Ok(report)
}

/// Owns the notify subscription and drives passes until shutdown.
pub struct WatchLoop {
    config: WatchConfig,
    settle: SettlePolicy,
    /// Quiet gap that ends a burst of notifications.
    debounce: Duration,
    /// Upper bound on how long a continuous event stream may defer a pass.
    max_coalesce: Duration,
    /// How often the shutdown flag is polled while idle.
    poll_interval: Duration,
}

impl WatchLoop {
    /// Creates a loop with default debounce and settling behavior.
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            settle: SettlePolicy::default(),
            debounce: Duration::from_millis(250),
            max_coalesce: Duration::from_secs(2),
            poll_interval: Duration::from_millis(200),
        }
    }

    /// Overrides the settling policy (tests use a fast one).
    pub fn with_settle(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    /// Overrides the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Subscribes to the watch directory and processes notifications until
    /// `shutdown` is set.
    ///
    /// Files already present at startup are organized by an initial pass
    /// before the first notification is awaited. Shutdown is polled between
    /// waits, so an in-flight pass always completes; the subscription is torn
    /// down when the loop returns.
    ///
    /// # Errors
    ///
    /// `Subscribe` when the watcher cannot be established, `TargetVanished`
    /// when the watch directory disappears mid-run. Transient scan failures
    /// are emitted as `LoopEvent::ScanFailed` and do not end the loop.
    pub fn run(
        &self,
        shutdown: &Arc<AtomicBool>,
        mut on_event: impl FnMut(LoopEvent),
    ) -> Result<(), WatchError> {
        let (tx, rx) = mpsc::channel::<()>();

        // Any kind of change inside the target (creation, modification,
        // rename) triggers a rescan; the pass itself decides what is
        // actionable, so the event payload is irrelevant. Watcher errors
        // trigger a pass too: the scan then discovers a vanished target
        // instead of the loop idling forever.
        let mut watcher = RecommendedWatcher::new(
            move |_res: Result<notify::Event, notify::Error>| {
                let _ = tx.send(());
            },
            notify::Config::default(),
        )
        .map_err(WatchError::Subscribe)?;

        watcher
            .watch(&self.config.watch_dir, RecursiveMode::NonRecursive)
            .map_err(WatchError::Subscribe)?;

        // Startup pass: whatever is already sitting in the directory gets
        // organized without waiting for an event.
        self.trigger_pass(&mut on_event)?;

        while !shutdown.load(Ordering::Relaxed) {
            match rx.recv_timeout(self.poll_interval) {
                Ok(()) => {
                    self.coalesce_burst(&rx);
                    self.trigger_pass(&mut on_event)?;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Dropping the watcher tears down the subscription.
        Ok(())
    }

    /// Drains follow-up notifications until a quiet gap of `debounce`, so a
    /// burst of events becomes a single pass. A never-quiet stream is cut off
    /// after `max_coalesce` so the pass cannot be deferred forever.
    fn coalesce_burst(&self, rx: &mpsc::Receiver<()>) {
        let deadline = Instant::now() + self.max_coalesce;
        while Instant::now() < deadline {
            if rx.recv_timeout(self.debounce).is_err() {
                break;
            }
        }
    }

    fn trigger_pass(&self, on_event: &mut impl FnMut(LoopEvent)) -> Result<(), WatchError> {
        match run_pass(&self.config, &self.settle) {
            Ok(report) => {
                on_event(LoopEvent::PassCompleted(report));
                Ok(())
            }
            Err(ScanError::DirVanished(path)) => Err(WatchError::TargetVanished(path)),
            Err(e) => {
                // Transient (permission blip): long-running monitoring should
                // survive it.
                on_event(LoopEvent::ScanFailed(e));
                Ok(())
            }
        }
    }
}
