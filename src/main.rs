use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tidywatch::config::ConfigFile;
use tidywatch::mover::SettlePolicy;
use tidywatch::output::OutputFormatter;
use tidywatch::scanner;
use tidywatch::watcher::{self, WatchLoop};

/// Watch a directory and sort incoming files into subdirectories by extension.
#[derive(Parser)]
#[command(name = "tidywatch", version, about)]
struct Cli {
    /// Path to the configuration file (TOML, or JSON for .json paths).
    /// Defaults to tidywatch.toml, then config.json, in the current directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single scan-and-move pass and exit instead of watching.
    #[arg(long)]
    once: bool,

    /// List what would be moved without touching anything (implies a single pass).
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = match ConfigFile::load(cli.config.as_deref()).and_then(ConfigFile::validate) {
        Ok(config) => config,
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            process::exit(1);
        }
    };

    OutputFormatter::info(&format!(
        "Monitoring: {} ({} rules)",
        config.watch_dir.display(),
        config.rules.len()
    ));
    if config.rules.is_empty() {
        OutputFormatter::warning("No rules configured; nothing will ever be moved.");
    }

    if cli.dry_run {
        match scanner::scan(&config.watch_dir, &config.rules, &config.ignores) {
            Ok(candidates) => {
                if candidates.is_empty() {
                    OutputFormatter::plain("Nothing to organize.");
                }
                for candidate in candidates {
                    OutputFormatter::dry_run_notice(&format!(
                        "{} -> {}/",
                        candidate.file_name, candidate.dest_folder
                    ));
                }
            }
            Err(e) => {
                OutputFormatter::error(&e.to_string());
                process::exit(1);
            }
        }
        return;
    }

    if cli.once {
        match watcher::run_pass(&config, &SettlePolicy::default()) {
            Ok(report) => OutputFormatter::render_report(&report),
            Err(e) => {
                OutputFormatter::error(&e.to_string());
                process::exit(1);
            }
        }
        return;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&shutdown)) {
            OutputFormatter::warning(&format!("Failed to register signal handler: {}", e));
        }
    }

    let watch_loop = WatchLoop::new(config);
    match watch_loop.run(&shutdown, |event| OutputFormatter::render_event(&event)) {
        Ok(()) => OutputFormatter::plain("Monitoring stopped."),
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            process::exit(1);
        }
    }
}
