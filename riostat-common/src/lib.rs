//! riostat - common library
//!
//! Logging and environment configuration shared by the riostat binary and
//! its integration tests.

#![deny(unsafe_code)]

pub mod config;
pub mod logging;

pub use config::{ConfigSource, EnvError, EnvParser, Sourced};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
