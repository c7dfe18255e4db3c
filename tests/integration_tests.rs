//! Integration tests for tidywatch.
//!
//! These exercise the full pipeline end to end: configuration loading and
//! validation, scan-and-move passes, collision handling, and the live watch
//! loop driven by real filesystem notifications.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use tidywatch::classifier::ExtensionMap;
use tidywatch::config::{CompiledIgnores, ConfigFile, WatchConfig};
use tidywatch::mover::SettlePolicy;
use tidywatch::watcher::{self, LoopEvent, WatchError, WatchLoop};

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary watch directory with helpers for seeding files and asserting
/// on the resulting layout.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        TestFixture {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn create_file(&self, name: &str, content: &[u8]) {
        fs::write(self.path().join(name), content).expect("Failed to write file");
    }

    fn create_subdir(&self, name: &str) {
        fs::create_dir_all(self.path().join(name)).expect("Failed to create subdirectory");
    }

    /// A config mapping .jpg→images and .txt→docs over this fixture.
    fn config(&self) -> WatchConfig {
        let mut rules = HashMap::new();
        rules.insert(".jpg".to_string(), "images".to_string());
        rules.insert(".txt".to_string(), "docs".to_string());
        WatchConfig {
            watch_dir: self.path().to_path_buf(),
            rules: ExtensionMap::new(rules),
            ignores: CompiledIgnores::default_rules(),
        }
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_missing(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// Polls until `rel_path` exists or the timeout elapses.
    fn wait_for_file(&self, rel_path: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let path = self.path().join(rel_path);
        while Instant::now() < deadline {
            if path.is_file() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }
}

// ============================================================================
// Single-pass behavior
// ============================================================================

#[test]
fn test_pass_organizes_mixed_directory() {
    let fixture = TestFixture::new();
    fixture.create_file("a.jpg", b"image");
    fixture.create_file("b.txt", b"text");
    fixture.create_file("c.exe", b"binary");
    fixture.create_subdir("old");

    let report = watcher::run_pass(&fixture.config(), &SettlePolicy::immediate()).unwrap();

    assert_eq!(report.moved.len(), 2);
    assert!(report.failed.is_empty());
    fixture.assert_file_exists("images/a.jpg");
    fixture.assert_file_exists("docs/b.txt");
    fixture.assert_file_exists("c.exe");
    assert!(fixture.path().join("old").is_dir());
    fixture.assert_file_missing("a.jpg");
    fixture.assert_file_missing("b.txt");
}

#[test]
fn test_pass_round_trip_preserves_content() {
    let fixture = TestFixture::new();
    let content: Vec<u8> = (0..=255).collect();
    fixture.create_file("blob.jpg", &content);

    let report = watcher::run_pass(&fixture.config(), &SettlePolicy::immediate()).unwrap();

    assert_eq!(report.moved.len(), 1);
    let moved = fs::read(&report.moved[0].destination).unwrap();
    assert_eq!(moved, content);
    fixture.assert_file_missing("blob.jpg");
}

#[test]
fn test_second_pass_with_no_changes_is_quiet() {
    let fixture = TestFixture::new();
    fixture.create_file("a.jpg", b"image");
    fixture.create_file("unmapped.exe", b"stays");

    let config = fixture.config();
    let first = watcher::run_pass(&config, &SettlePolicy::immediate()).unwrap();
    assert_eq!(first.moved.len(), 1);

    let second = watcher::run_pass(&config, &SettlePolicy::immediate()).unwrap();
    assert!(second.is_quiet());
    // The unmapped file persists but never becomes a candidate.
    fixture.assert_file_exists("unmapped.exe");
}

#[test]
fn test_collision_keeps_both_files() {
    let fixture = TestFixture::new();
    fixture.create_subdir("docs");
    fixture.create_file("docs/b.txt", b"already there");
    fixture.create_file("b.txt", b"newly arrived");

    let report = watcher::run_pass(&fixture.config(), &SettlePolicy::immediate()).unwrap();

    assert_eq!(report.moved.len(), 1);
    let destination = &report.moved[0].destination;

    // The original is untouched, the newcomer got a suffixed name.
    assert_eq!(
        fs::read(fixture.path().join("docs/b.txt")).unwrap(),
        b"already there"
    );
    assert_eq!(fs::read(destination).unwrap(), b"newly arrived");

    let dest_name = destination.file_name().unwrap().to_string_lossy();
    assert!(dest_name.starts_with("b_") && dest_name.ends_with(".txt"));

    let entries = fs::read_dir(fixture.path().join("docs")).unwrap().count();
    assert_eq!(entries, 2);
}

#[test]
fn test_repeated_collisions_accumulate_unique_names() {
    let fixture = TestFixture::new();
    let config = fixture.config();

    for round in 0..4 {
        fixture.create_file("b.txt", format!("round {}", round).as_bytes());
        let report = watcher::run_pass(&config, &SettlePolicy::immediate()).unwrap();
        assert_eq!(report.moved.len(), 1, "round {} should move one file", round);
        assert!(report.failed.is_empty());
    }

    let entries = fs::read_dir(fixture.path().join("docs")).unwrap().count();
    assert_eq!(entries, 4);
}

#[test]
fn test_destination_folders_created_only_when_needed() {
    let fixture = TestFixture::new();
    fixture.create_file("a.jpg", b"image");

    watcher::run_pass(&fixture.config(), &SettlePolicy::immediate()).unwrap();

    assert!(fixture.path().join("images").is_dir());
    // No .txt arrived, so docs/ was never created.
    assert!(!fixture.path().join("docs").exists());
}

// ============================================================================
// Configuration pipeline
// ============================================================================

#[test]
fn test_end_to_end_from_toml_config() {
    let fixture = TestFixture::new();
    fixture.create_file("photo.JPG", b"image");
    fixture.create_file("notes.txt", b"text");
    fixture.create_file("movie.mkv.part", b"partial");

    let config_path = fixture.path().join("tidywatch.toml");
    fs::write(
        &config_path,
        format!(
            r#"
watch_directory = "{}"

[rules]
".jpg" = "images"
".txt" = "docs"

[ignore]
patterns = ["*.part", "*.toml"]
"#,
            fixture.path().display()
        ),
    )
    .unwrap();

    let config = ConfigFile::load_from_file(&config_path)
        .unwrap()
        .validate()
        .unwrap();
    let report = watcher::run_pass(&config, &SettlePolicy::immediate()).unwrap();

    // Case-insensitive classification; ignore patterns honored.
    assert_eq!(report.moved.len(), 2);
    fixture.assert_file_exists("images/photo.JPG");
    fixture.assert_file_exists("docs/notes.txt");
    fixture.assert_file_exists("movie.mkv.part");
}

#[test]
fn test_end_to_end_from_json_config() {
    let fixture = TestFixture::new();
    fixture.create_file("report.pdf", b"pdf");

    let config_path = fixture.path().join("config.json");
    fs::write(
        &config_path,
        format!(
            r#"{{ "watch_directory": "{}", "rules": {{ ".pdf": "documents" }} }}"#,
            fixture.path().display()
        ),
    )
    .unwrap();

    let config = ConfigFile::load_from_file(&config_path)
        .unwrap()
        .validate()
        .unwrap();
    let report = watcher::run_pass(&config, &SettlePolicy::immediate()).unwrap();

    assert_eq!(report.moved.len(), 1);
    fixture.assert_file_exists("documents/report.pdf");
}

#[test]
fn test_missing_watch_directory_refuses_to_start() {
    let config = ConfigFile {
        watch_directory: "/definitely/not/a/real/path".to_string(),
        rules: HashMap::from([(".pdf".to_string(), "documents".to_string())]),
        ignore: Default::default(),
    };

    assert!(config.validate().is_err());
}

// ============================================================================
// Live watch loop
// ============================================================================

#[test]
fn test_watch_loop_startup_pass_organizes_existing_files() {
    let fixture = TestFixture::new();
    fixture.create_file("preexisting.txt", b"already here");

    let shutdown = Arc::new(AtomicBool::new(false));
    let watch_loop = WatchLoop::new(fixture.config())
        .with_settle(SettlePolicy::immediate())
        .with_debounce(Duration::from_millis(50));

    let handle = {
        let shutdown = Arc::clone(&shutdown);
        std::thread::spawn(move || watch_loop.run(&shutdown, |_| {}))
    };

    assert!(
        fixture.wait_for_file("docs/preexisting.txt", Duration::from_secs(5)),
        "startup pass should organize files present before the loop started"
    );

    shutdown.store(true, Ordering::Relaxed);
    handle.join().unwrap().unwrap();
}

#[test]
fn test_watch_loop_reacts_to_new_files() {
    let fixture = TestFixture::new();

    let shutdown = Arc::new(AtomicBool::new(false));
    let watch_loop = WatchLoop::new(fixture.config())
        .with_settle(SettlePolicy::immediate())
        .with_debounce(Duration::from_millis(50));

    let (report_tx, report_rx) = std::sync::mpsc::channel();
    let handle = {
        let shutdown = Arc::clone(&shutdown);
        std::thread::spawn(move || {
            watch_loop.run(&shutdown, move |event| {
                if let LoopEvent::PassCompleted(report) = event {
                    if !report.is_quiet() {
                        let _ = report_tx.send(report);
                    }
                }
            })
        })
    };

    // Give the subscription a moment to establish, then drop files in.
    std::thread::sleep(Duration::from_millis(300));
    fixture.create_file("a.jpg", b"image");
    fixture.create_file("b.txt", b"text");

    assert!(
        fixture.wait_for_file("images/a.jpg", Duration::from_secs(10)),
        "watch loop should pick up newly created files"
    );
    assert!(fixture.wait_for_file("docs/b.txt", Duration::from_secs(10)));

    // At least one non-quiet pass was reported with real outcomes.
    let report = report_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("a pass report should have been emitted");
    assert!(!report.moved.is_empty());

    shutdown.store(true, Ordering::Relaxed);
    handle.join().unwrap().unwrap();

    fixture.assert_file_missing("a.jpg");
    fixture.assert_file_missing("b.txt");
}

#[test]
fn test_watch_loop_fails_fast_when_directory_vanishes() {
    // Watch a subdirectory so it can be deleted out from under the loop.
    let outer = TestFixture::new();
    let watched = outer.path().join("inbox");
    fs::create_dir(&watched).unwrap();

    let mut rules = HashMap::new();
    rules.insert(".txt".to_string(), "docs".to_string());
    let config = WatchConfig {
        watch_dir: watched.clone(),
        rules: ExtensionMap::new(rules),
        ignores: CompiledIgnores::default_rules(),
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let watch_loop = WatchLoop::new(config)
        .with_settle(SettlePolicy::immediate())
        .with_debounce(Duration::from_millis(50));

    let handle = {
        let shutdown = Arc::clone(&shutdown);
        std::thread::spawn(move || watch_loop.run(&shutdown, |_| {}))
    };

    std::thread::sleep(Duration::from_millis(300));
    fs::remove_dir(&watched).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }

    // Capture whether the loop ended on its own before releasing it via the
    // shutdown flag, so a hung loop fails the test instead of leaking.
    let failed_fast = handle.is_finished();
    shutdown.store(true, Ordering::Relaxed);
    let result = handle.join().unwrap();

    assert!(
        failed_fast,
        "loop must terminate when the watch directory vanishes, not idle"
    );
    assert!(matches!(result, Err(WatchError::TargetVanished(_))));
}

#[test]
fn test_watch_loop_shutdown_is_prompt() {
    let fixture = TestFixture::new();

    let shutdown = Arc::new(AtomicBool::new(false));
    let watch_loop = WatchLoop::new(fixture.config()).with_settle(SettlePolicy::immediate());

    let handle = {
        let shutdown = Arc::clone(&shutdown);
        std::thread::spawn(move || watch_loop.run(&shutdown, |_| {}))
    };

    std::thread::sleep(Duration::from_millis(200));
    shutdown.store(true, Ordering::Relaxed);

    let start = Instant::now();
    handle.join().unwrap().unwrap();
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "loop should exit shortly after the shutdown flag is set"
    );
}
