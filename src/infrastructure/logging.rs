//! Logging system configuration and initialization
//!
//! - Console output on stderr; stdout carries command reports only
//! - Optional daily-rolling file output, plain or JSON
//! - `RUST_LOG` overrides the configured level and module filters
//! - Old log files are pruned on startup

use anyhow::{Result, anyhow};
use chrono::Utc;
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "catalog-sync.log";

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

struct UtcTimeFormatter;

impl FormatTime for UtcTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

/// Configured directory, or `logs/` under the per-user data directory
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    config.log_dir.clone().unwrap_or_else(|| {
        crate::infrastructure::config::ConfigManager::get_app_data_dir()
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_default())
            .join("logs")
    })
}

/// Build the filter: `RUST_LOG` wins, otherwise the configured level plus
/// per-module directives (dropped entirely at trace level).
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&config.level);
        if !config.level.eq_ignore_ascii_case("trace") {
            let mut modules: Vec<_> = config.module_filters.iter().collect();
            modules.sort();
            for (module, level) in modules {
                match format!("{module}={level}").parse() {
                    Ok(directive) => filter = filter.add_directive(directive),
                    Err(e) => eprintln!("Ignoring log filter {module}={level}: {e}"),
                }
            }
        }
        filter
    })
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!("No logging output configured"));
    }

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_timer(UtcTimeFormatter)
            .with_target(false)
            .boxed()
    });

    let log_dir = get_log_directory(config);
    let file_layer = if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        if config.auto_cleanup_logs {
            cleanup_old_logs(&log_dir, config.max_files)?;
        }

        let (file_writer, file_guard) = non_blocking(rolling::daily(&log_dir, LOG_FILE_PREFIX));
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(file_guard);

        let layer = if config.json_format {
            fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(UtcTimeFormatter)
                .with_target(true)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(UtcTimeFormatter)
                .with_target(false)
                .with_ansi(false)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    Registry::default()
        .with(build_env_filter(config))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging system initialized (level: {})", config.level);
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
    }
    Ok(())
}

/// Remove all but the newest `max_files` log files in `log_dir`.
///
/// Returns the number of files removed.
pub fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX));
        if path.is_file() && is_log {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(max_files as usize) {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }
    Ok(removed)
}
