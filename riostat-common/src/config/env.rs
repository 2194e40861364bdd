//! Environment variable parsing with validation.
//!
//! Errors are collected rather than returned one at a time so that a single
//! startup failure can report every bad `RIOSTAT_*` variable at once.

use super::source::Sourced;
use crate::logging::is_valid_level;
use std::env;
use thiserror::Error;

/// Problems found while reading `RIOSTAT_*` variables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("{var} is set but empty")]
    Empty { var: String },

    #[error("invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

/// Reads prefixed environment variables and accumulates validation errors.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Parser for the `RIOSTAT_` prefix.
    pub fn new() -> Self {
        Self::with_prefix("RIOSTAT_")
    }

    pub fn with_prefix(prefix: &'static str) -> Self {
        Self {
            prefix,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    /// Record a problem found by a caller-side check of a raw value.
    pub fn record(&mut self, error: EnvError) {
        self.errors.push(error);
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub fn get_string(&mut self, name: &str, default: &str) -> Sourced<String> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => Sourced::from_env(value, var_name),
            Err(_) => Sourced::default_value(default.to_string()),
        }
    }

    /// Read a u64 bounded to `min..=max`. Bad values record an error and
    /// yield the default.
    pub fn get_u64_range(&mut self, name: &str, default: u64, min: u64, max: u64) -> Sourced<u64> {
        let var_name = self.var_name(name);
        let Ok(value) = env::var(&var_name) else {
            return Sourced::default_value(default);
        };

        match value.trim().parse::<u64>() {
            Ok(n) if (min..=max).contains(&n) => Sourced::from_env(n, var_name),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name.clone(),
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                Sourced::from_env(default, var_name)
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "unsigned 64-bit integer".to_string(),
                    value,
                });
                Sourced::default_value(default)
            }
        }
    }

    /// Read a whitespace-separated argument vector, e.g. `rados df -f json`.
    ///
    /// A variable that is set but blank is an error: there is no program to run.
    pub fn get_argv(&mut self, name: &str, default: &[&str]) -> Sourced<Vec<String>> {
        let var_name = self.var_name(name);
        let fallback = || default.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        match env::var(&var_name) {
            Ok(value) => {
                let argv: Vec<String> = value.split_whitespace().map(str::to_string).collect();
                if argv.is_empty() {
                    self.errors.push(EnvError::Empty {
                        var: var_name.clone(),
                    });
                    Sourced::from_env(fallback(), var_name)
                } else {
                    Sourced::from_env(argv, var_name)
                }
            }
            Err(_) => Sourced::default_value(fallback()),
        }
    }

    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => {
                let lower = value.trim().to_lowercase();
                if is_valid_level(&lower) {
                    Sourced::from_env(lower, var_name)
                } else {
                    self.errors.push(EnvError::InvalidLogLevel {
                        var: var_name.clone(),
                        value,
                    });
                    Sourced::from_env(default.to_string(), var_name)
                }
            }
            Err(_) => Sourced::default_value(default.to_string()),
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}
