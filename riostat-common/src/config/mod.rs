//! Typed environment configuration.

mod env;
mod source;

pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};
