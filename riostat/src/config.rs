//! Sampler configuration.
//!
//! The interval comes from the command line (or its default); everything
//! else is read from `RIOSTAT_*` environment variables and rarely needs
//! changing.

use crate::collect::CommandSource;
use crate::collect::source::{DEFAULT_COMMAND, DEFAULT_FETCH_TIMEOUT};
use riostat_common::{ConfigSource, EnvError, EnvParser, Sourced};
use std::num::NonZeroU64;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default sampling interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_INTERVAL: NonZeroU64 = NonZeroU64::new(DEFAULT_INTERVAL_SECS).unwrap();

const MAX_FETCH_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment configuration: {}", join(.0))]
    Env(Vec<EnvError>),
}

fn join(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The sampling interval as given on the command line, or the default.
pub fn interval_from_cli(arg: Option<NonZeroU64>) -> Sourced<NonZeroU64> {
    match arg {
        Some(secs) => Sourced::new(secs, ConfigSource::CommandLine),
        None => Sourced::default_value(DEFAULT_INTERVAL),
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Seconds between cycle starts, and the divisor for every rate.
    pub interval_secs: Sourced<NonZeroU64>,
    /// Upper bound on one report command run.
    pub fetch_timeout: Sourced<Duration>,
    /// Report command argv.
    pub source_command: Sourced<Vec<String>>,
}

impl SamplerConfig {
    /// Built-in defaults for everything but the interval.
    pub fn new(interval_secs: Sourced<NonZeroU64>) -> Self {
        Self {
            interval_secs,
            fetch_timeout: Sourced::default_value(DEFAULT_FETCH_TIMEOUT),
            source_command: Sourced::default_value(
                DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect(),
            ),
        }
    }

    /// Read overrides from the environment.
    ///
    /// - `RIOSTAT_FETCH_TIMEOUT_SECS` (1..=3600, default 30)
    /// - `RIOSTAT_SOURCE_COMMAND` (whitespace-separated argv, default `rados df -f json`)
    ///
    /// Fails if `parser` holds any error, including ones recorded before this
    /// call (e.g. a bad `RIOSTAT_LOG_LEVEL`).
    pub fn load_with(
        parser: &mut EnvParser,
        interval_secs: Sourced<NonZeroU64>,
    ) -> Result<Self, ConfigError> {
        let fetch_timeout = parser
            .get_u64_range(
                "FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT.as_secs(),
                1,
                MAX_FETCH_TIMEOUT_SECS,
            )
            .map(Duration::from_secs);
        let source_command = parser.get_argv("SOURCE_COMMAND", DEFAULT_COMMAND);

        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }

        debug!(
            interval_secs = interval_secs.value.get(),
            interval_source = %interval_secs.source,
            fetch_timeout = ?fetch_timeout.value,
            fetch_timeout_source = %fetch_timeout.source,
            command = ?source_command.value,
            command_source = %source_command.source,
            "Loaded sampler configuration"
        );

        Ok(Self {
            interval_secs,
            fetch_timeout,
            source_command,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.value.get())
    }

    /// The report source described by this configuration.
    pub fn command_source(&self) -> CommandSource {
        CommandSource::new(self.source_command.value.clone(), self.fetch_timeout.value)
    }
}
