//! Tracing setup for the two run modes.
//!
//! CLI commands log to stderr. `deskbook host` owns stdout for the
//! native-messaging protocol, so it logs to `{state_dir}/logs/host-{ts}.log`.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DESKBOOK_LOG";

fn env_filter() -> EnvFilter {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

pub(crate) fn init_stderr() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter())
        .try_init()
        .ok();
}

/// Route logs to a fresh file under `log_dir`. Keep the guard alive for as
/// long as logging should reach the file.
pub(crate) fn init_host_file(log_dir: &Path) -> Result<WorkerGuard> {
    let (writer, guard) = create_host_log_writer(log_dir)?;
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(env_filter())
        .try_init()
        .ok();
    Ok(guard)
}

pub(crate) fn create_host_log_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;
    let file_name = format!("host-{}.log", Utc::now().format("%Y%m%d-%H%M%S"));
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    Ok(tracing_appender::non_blocking(file_appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_log_writer_creates_timestamped_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log_dir = tmp.path().join("logs");
        let (writer, _guard) = create_host_log_writer(&log_dir).unwrap();
        drop(writer);

        let names: Vec<String> = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 1);
        let stem = names[0]
            .strip_prefix("host-")
            .and_then(|rest| rest.strip_suffix(".log"))
            .unwrap();
        // YYYYMMDD-HHMMSS
        assert_eq!(stem.len(), 15);
        assert_eq!(stem.chars().nth(8), Some('-'));
    }

    #[test]
    fn test_host_log_writer_fails_on_unusable_dir() {
        assert!(create_host_log_writer(Path::new("/dev/null/logs")).is_err());
    }
}
