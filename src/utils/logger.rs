//! Logging setup and log-file maintenance
//!
//! A probe session writes to four sinks:
//! - console at the configured level
//! - `test_session_<YYYYmmdd_HHMMSS>.log` with everything at DEBUG and above
//! - `main.<date>.log`, rotated daily with the five newest files kept
//! - `errors.<date>.log` with ERROR events only

#![allow(dead_code)]

use std::fmt::Display;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, Rotation};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const SESSION_PREFIX: &str = "test_session_";
const SESSION_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAIN_LOG_PREFIX: &str = "main";
const ERROR_LOG_PREFIX: &str = "errors";
const MAX_ROTATED_FILES: usize = 5;
const CRATE_TARGET: &str = "api_discovery";

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Where and how much to log
#[derive(Clone, Debug)]
pub struct LogSettings {
    pub level: LogLevel,
    /// Directory for the file sinks; console only when `None`
    pub log_dir: Option<PathBuf>,
}

impl LogSettings {
    pub fn console(level: LogLevel) -> Self {
        Self {
            level,
            log_dir: None,
        }
    }

    pub fn with_files(level: LogLevel, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level,
            log_dir: Some(log_dir.into()),
        }
    }
}

/// Keeps the non-blocking writers flushing until dropped
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
    session_file: Option<PathBuf>,
}

impl LogGuards {
    pub fn session_file(&self) -> Option<&Path> {
        self.session_file.as_deref()
    }
}

/// Install the global subscriber
pub fn init_logging(settings: &LogSettings) -> Result<LogGuards> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{CRATE_TARGET}={}",
            settings.level.to_tracing_level()
        ))
    });

    let console = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(console_filter);

    let Some(dir) = settings.log_dir.as_deref() else {
        tracing_subscriber::registry()
            .with(console)
            .try_init()
            .context("Failed to install log subscriber")?;
        return Ok(LogGuards {
            _guards: Vec::new(),
            session_file: None,
        });
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let session_name = session_file_name(Local::now().naive_local());
    let (session_writer, session_guard) =
        tracing_appender::non_blocking(rolling::never(dir, &session_name));
    let (main_writer, main_guard) = tracing_appender::non_blocking(rotating_appender(
        dir,
        MAIN_LOG_PREFIX,
    )?);
    let (error_writer, error_guard) = tracing_appender::non_blocking(rotating_appender(
        dir,
        ERROR_LOG_PREFIX,
    )?);

    let session = fmt::layer()
        .with_ansi(false)
        .with_writer(session_writer)
        .with_filter(file_targets());
    let main = fmt::layer()
        .with_ansi(false)
        .with_writer(main_writer)
        .with_filter(file_targets());
    let errors = fmt::layer()
        .with_ansi(false)
        .with_writer(error_writer)
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(console)
        .with(session)
        .with(main)
        .with(errors)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(LogGuards {
        _guards: vec![session_guard, main_guard, error_guard],
        session_file: Some(dir.join(session_name)),
    })
}

/// DEBUG for this crate, WARN for HTTP and TLS dependencies
fn file_targets() -> Targets {
    Targets::new()
        .with_target(CRATE_TARGET, LevelFilter::DEBUG)
        .with_default(LevelFilter::WARN)
}

fn rotating_appender(dir: &Path, prefix: &str) -> Result<rolling::RollingFileAppender> {
    rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(MAX_ROTATED_FILES)
        .build(dir)
        .with_context(|| format!("Failed to create {prefix} log in {}", dir.display()))
}

pub fn session_file_name(at: NaiveDateTime) -> String {
    format!("{SESSION_PREFIX}{}.log", at.format(SESSION_TIME_FORMAT))
}

/// Timestamp encoded in a session log file name
pub fn parse_session_time(file_name: &str) -> Option<NaiveDateTime> {
    let stamp = file_name
        .strip_prefix(SESSION_PREFIX)?
        .strip_suffix(".log")?;
    NaiveDateTime::parse_from_str(stamp, SESSION_TIME_FORMAT).ok()
}

fn is_rotating_log(file_name: &str) -> bool {
    [MAIN_LOG_PREFIX, ERROR_LOG_PREFIX].iter().any(|prefix| {
        file_name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.') && rest.contains("log"))
    })
}

// ---------------------------------------------------------------------------
// Session helpers
// ---------------------------------------------------------------------------

pub fn log_session_start(base_url: &str) {
    let rule = "=".repeat(80);
    info!("{rule}");
    info!("TEST SESSION STARTED");
    info!("Base URL: {base_url}");
    info!("{rule}");
}

pub fn log_test_start(name: &str, params: &[(&str, String)]) {
    info!("{}", "=".repeat(80));
    info!("TEST START: {name}");
    if !params.is_empty() {
        let rendered: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        info!("Parameters: {}", rendered.join(", "));
    }
}

pub fn log_test_end(name: &str, passed: bool, duration_secs: f64) {
    let line = format_test_end(name, passed, duration_secs);
    if passed {
        info!("{line}");
    } else {
        tracing::warn!("{line}");
    }
}

pub fn log_api_request(
    request_num: usize,
    method: &str,
    endpoint: &str,
    status_code: u16,
    elapsed_secs: f64,
) {
    info!(
        "{}",
        format_api_request(request_num, method, endpoint, status_code, elapsed_secs)
    );
}

pub fn log_metric(name: &str, value: impl Display, unit: &str) {
    info!("{}", format_metric(name, value, unit));
}

pub fn format_test_end(name: &str, passed: bool, duration_secs: f64) -> String {
    let (symbol, status) = if passed { ("✓", "PASSED") } else { ("✗", "FAILED") };
    format!("TEST END: {name} - {symbol} {status} ({duration_secs:.2}s)")
}

pub fn format_api_request(
    request_num: usize,
    method: &str,
    endpoint: &str,
    status_code: u16,
    elapsed_secs: f64,
) -> String {
    let symbol = if status_code == 200 { "✓" } else { "✗" };
    format!("Request #{request_num}: {symbol} {method} {endpoint} → {status_code} ({elapsed_secs:.3}s)")
}

pub fn format_metric(name: &str, value: impl Display, unit: &str) -> String {
    if unit.is_empty() {
        format!("METRIC: {name} = {value}")
    } else {
        format!("METRIC: {name} = {value} {unit}")
    }
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// Overview of the log directory
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LogStats {
    pub total_files: usize,
    pub total_size_mb: f64,
    pub session_logs: usize,
    pub rotating_logs: usize,
    pub oldest_session: Option<String>,
    pub newest_session: Option<String>,
}

fn log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read log directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn remove_files(files: impl IntoIterator<Item = PathBuf>) -> Result<usize> {
    let mut removed = 0;
    for path in files {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        removed += 1;
    }
    Ok(removed)
}

pub fn get_log_stats(dir: &Path) -> Result<LogStats> {
    let files = log_files(dir)?;

    let mut total_bytes = 0u64;
    let mut sessions: Vec<(NaiveDateTime, String)> = Vec::new();
    let mut rotating_logs = 0;

    for path in &files {
        total_bytes += std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let name = file_name(path);
        if let Some(at) = parse_session_time(&name) {
            sessions.push((at, name));
        } else if is_rotating_log(&name) {
            rotating_logs += 1;
        }
    }
    sessions.sort();

    let size_mb = total_bytes as f64 / (1024.0 * 1024.0);
    Ok(LogStats {
        total_files: files.len(),
        total_size_mb: (size_mb * 100.0).round() / 100.0,
        session_logs: sessions.len(),
        rotating_logs,
        oldest_session: sessions.first().map(|(_, n)| n.clone()),
        newest_session: sessions.last().map(|(_, n)| n.clone()),
    })
}

/// Delete every file in the log directory
pub fn purge_all_logs(dir: &Path) -> Result<usize> {
    let removed = remove_files(log_files(dir)?)?;
    info!("Purged {removed} log files from {}", dir.display());
    Ok(removed)
}

/// Delete the rotating main and error logs, keeping session logs
pub fn clear_main_logs(dir: &Path) -> Result<usize> {
    let files = log_files(dir)?
        .into_iter()
        .filter(|p| is_rotating_log(&file_name(p)));
    remove_files(files)
}

/// Delete session logs older than `days`
pub fn purge_old_sessions(dir: &Path, days: i64) -> Result<usize> {
    let cutoff = Local::now().naive_local() - ChronoDuration::days(days);
    purge_sessions_before(dir, cutoff)
}

pub fn purge_sessions_before(dir: &Path, cutoff: NaiveDateTime) -> Result<usize> {
    let files = log_files(dir)?.into_iter().filter(|p| {
        parse_session_time(&file_name(p)).is_some_and(|at| at < cutoff)
    });
    remove_files(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    #[test]
    fn test_file_targets_hide_dependency_debug() {
        let targets = file_targets();
        assert!(targets.would_enable("api_discovery::probes::discovery", &Level::DEBUG));
        assert!(!targets.would_enable("api_discovery", &Level::TRACE));
        assert!(!targets.would_enable("hyper_util::client::legacy", &Level::DEBUG));
        assert!(!targets.would_enable("rustls::client", &Level::INFO));
        assert!(targets.would_enable("reqwest::connect", &Level::WARN));
    }

    fn touch(dir: &Path, name: &str, bytes: usize) {
        std::fs::write(dir.join(name), vec![b'x'; bytes]).unwrap();
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("unknown"), None);
    }

    #[test]
    fn test_session_file_name() {
        let name = session_file_name(at(7));
        assert_eq!(name, "test_session_20260307_140509.log");
        assert_eq!(parse_session_time(&name), Some(at(7)));
        assert_eq!(parse_session_time("main.log"), None);
        assert_eq!(parse_session_time("test_session_garbage.log"), None);
    }

    #[test]
    fn test_rotating_log_names() {
        assert!(is_rotating_log("main.log"));
        assert!(is_rotating_log("main.2026-03-07.log"));
        assert!(is_rotating_log("errors.log.1"));
        assert!(!is_rotating_log("maintenance.txt"));
        assert!(!is_rotating_log("test_session_20260307_140509.log"));
    }

    #[test]
    fn test_formatters() {
        assert_eq!(
            format_test_end("Health Check", true, 1.234),
            "TEST END: Health Check - ✓ PASSED (1.23s)"
        );
        assert_eq!(
            format_test_end("Burst", false, 0.5),
            "TEST END: Burst - ✗ FAILED (0.50s)"
        );
        assert_eq!(
            format_api_request(3, "GET", "/api/test/4", 429, 0.0456),
            "Request #3: ✗ GET /api/test/4 → 429 (0.046s)"
        );
        assert_eq!(
            format_metric("avg_response_time", "0.123", "s"),
            "METRIC: avg_response_time = 0.123 s"
        );
        assert_eq!(format_metric("requests", 10, ""), "METRIC: requests = 10");
    }

    #[test]
    fn test_log_stats() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &session_file_name(at(1)), 10);
        touch(dir.path(), &session_file_name(at(5)), 10);
        touch(dir.path(), "main.2026-03-05.log", 10);
        touch(dir.path(), "errors.2026-03-05.log", 10);

        let stats = get_log_stats(dir.path()).unwrap();
        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.session_logs, 2);
        assert_eq!(stats.rotating_logs, 2);
        assert_eq!(stats.total_size_mb, 0.0);
        assert_eq!(
            stats.oldest_session.as_deref(),
            Some("test_session_20260301_140509.log")
        );
        assert_eq!(
            stats.newest_session.as_deref(),
            Some("test_session_20260305_140509.log")
        );
    }

    #[test]
    fn test_stats_of_missing_dir() {
        let dir = tempdir().unwrap();
        let stats = get_log_stats(&dir.path().join("absent")).unwrap();
        assert_eq!(stats, LogStats::default());
    }

    #[test]
    fn test_purge_sessions_before() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &session_file_name(at(1)), 1);
        touch(dir.path(), &session_file_name(at(10)), 1);
        touch(dir.path(), "main.log", 1);

        let removed = purge_sessions_before(dir.path(), at(5)).unwrap();
        assert_eq!(removed, 1);

        let stats = get_log_stats(dir.path()).unwrap();
        assert_eq!(stats.session_logs, 1);
        assert_eq!(stats.rotating_logs, 1);
    }

    #[test]
    fn test_clear_and_purge_all() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &session_file_name(at(1)), 1);
        touch(dir.path(), "main.log", 1);
        touch(dir.path(), "errors.log", 1);

        assert_eq!(clear_main_logs(dir.path()).unwrap(), 2);
        assert_eq!(get_log_stats(dir.path()).unwrap().total_files, 1);

        assert_eq!(purge_all_logs(dir.path()).unwrap(), 1);
        assert_eq!(get_log_stats(dir.path()).unwrap().total_files, 0);
    }
}
