//! Structured logging setup shared by the riostat binary and its tests.
//!
//! Logs always go to a side channel (stderr and/or a rolling file) so that
//! stdout stays reserved for the rate table.

use crate::config::{EnvError, EnvParser};
use anyhow::Result;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{Subscriber, dispatcher};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, fmt,
    fmt::writer::{BoxMakeWriter, MakeWriterExt},
    util::SubscriberInitExt,
};

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human oriented.
    Pretty,
    /// One JSON object per event.
    Json,
    /// Single-line text.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level (trace, debug, info, warn, error, off).
    pub level: String,
    pub format: LogFormat,
    /// Optional path for a daily rolling log file.
    pub file_path: Option<PathBuf>,
    /// Per-target level overrides.
    pub targets: BTreeMap<String, String>,
    pub with_target: bool,
    pub with_file_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            file_path: None,
            targets: BTreeMap::new(),
            with_target: true,
            with_file_line: false,
        }
    }
}

impl LogConfig {
    /// Build a configuration from the parser's `*_LOG_*` variables.
    ///
    /// - `RIOSTAT_LOG_LEVEL`
    /// - `RIOSTAT_LOG_FORMAT` (pretty|json|compact)
    /// - `RIOSTAT_LOG_FILE` (daily rolling file)
    /// - `RIOSTAT_LOG_TARGETS` (comma-separated `target=level`)
    ///
    /// A bad level or format is recorded on `parser` and the default is used
    /// in its place, so logging can still come up before the caller reports
    /// the error. Malformed target entries are skipped.
    pub fn from_env(parser: &mut EnvParser, default_level: &str) -> Self {
        let mut config = Self {
            level: parser.get_log_level("LOG_LEVEL", default_level).value,
            ..Self::default()
        };

        let format = parser.get_string("LOG_FORMAT", "");
        if let Some(var) = format.env_var
            && !format.value.trim().is_empty()
        {
            match LogFormat::parse(&format.value) {
                Some(parsed) => config.format = parsed,
                None => parser.record(EnvError::InvalidValue {
                    var,
                    expected: "pretty, json or compact".to_string(),
                    value: format.value,
                }),
            }
        }

        let file = parser.get_string("LOG_FILE", "").value;
        if !file.trim().is_empty() {
            config.file_path = Some(PathBuf::from(file));
        }

        config.targets = parse_target_overrides(&parser.get_string("LOG_TARGETS", "").value);
        config
    }

    /// Override the base level.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Effective filter; `RUST_LOG` wins when it parses.
    pub fn env_filter(&self) -> EnvFilter {
        if std::env::var_os("RUST_LOG").is_some()
            && let Ok(filter) = EnvFilter::try_from_default_env()
        {
            return filter;
        }

        let mut filter = self.level.clone();
        for (target, level) in &self.targets {
            filter.push_str(&format!(",{target}={level}"));
        }
        EnvFilter::new(filter)
    }
}

/// Keeps the non-blocking file writer alive. Hold it until exit.
pub struct LoggingGuards {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global tracing subscriber on stderr, plus the log file if one
/// is configured.
///
/// If a global subscriber is already installed the call leaves it in place
/// and returns `Ok`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards> {
    let filter = config.env_filter();
    let (writer, file_guard) = build_writer(config);
    let ansi = file_guard.is_none() && config.format != LogFormat::Json;

    let builder = fmt::Subscriber::builder()
        .with_writer(writer)
        .with_target(config.with_target)
        .with_file(config.with_file_line)
        .with_line_number(config.with_file_line)
        .with_env_filter(filter)
        .with_ansi(ansi);

    match config.format {
        LogFormat::Pretty => install(builder.pretty().finish(), file_guard),
        LogFormat::Json => install(builder.json().finish(), file_guard),
        LogFormat::Compact => install(builder.compact().finish(), file_guard),
    }
}

fn build_writer(config: &LogConfig) -> (BoxMakeWriter, Option<WorkerGuard>) {
    let console = BoxMakeWriter::new(std::io::stderr);

    let Some(path) = config.file_path.as_ref() else {
        return (console, None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_else(|| OsStr::new("riostat.log"));
    let appender = tracing_appender::rolling::daily(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    (BoxMakeWriter::new(console.and(non_blocking)), Some(guard))
}

fn install<S>(subscriber: S, file_guard: Option<WorkerGuard>) -> Result<LoggingGuards>
where
    S: Subscriber + Send + Sync + 'static,
{
    if !dispatcher::has_been_set() {
        subscriber.try_init()?;
    }

    Ok(LoggingGuards {
        _file_guard: file_guard,
    })
}

fn parse_target_overrides(value: &str) -> BTreeMap<String, String> {
    value
        .split(',')
        .filter_map(|entry| entry.trim().split_once('='))
        .filter_map(|(target, level)| {
            let target = target.trim();
            let level = level.trim().to_lowercase();
            (!target.is_empty() && is_valid_level(&level)).then(|| (target.to_string(), level))
        })
        .collect()
}

pub(crate) fn is_valid_level(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error" | "off")
}
