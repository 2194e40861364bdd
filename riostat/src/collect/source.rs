//! Runs the external usage report command.

use std::future::Future;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default report command.
pub const DEFAULT_COMMAND: &[&str] = &["rados", "df", "-f", "json"];

/// Default upper bound on a single report invocation.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from running the report command.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("no report command configured")]
    EmptyCommand,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} wrote non-UTF-8 output")]
    InvalidUtf8 { program: String },
}

/// Something that can produce one raw report document per call.
pub trait SnapshotSource {
    /// Fetch a raw report. Each call is independent.
    fn fetch(&mut self) -> impl Future<Output = Result<String, SourceError>>;
}

/// Report source backed by a child process.
#[derive(Debug, Clone)]
pub struct CommandSource {
    argv: Vec<String>,
    timeout: Duration,
}

impl Default for CommandSource {
    fn default() -> Self {
        Self {
            argv: DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl CommandSource {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl SnapshotSource for CommandSource {
    async fn fetch(&mut self) -> Result<String, SourceError> {
        let (program, args) = self.argv.split_first().ok_or(SourceError::EmptyCommand)?;
        let start = Instant::now();

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: program.clone(),
                source,
            })?;

        // On timeout the future owning `child` is dropped, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| SourceError::Spawn {
                program: program.clone(),
                source,
            })?,
            Err(_) => {
                // Reported once by the caller, like every other fetch error.
                debug!(program = %program, timeout = ?self.timeout, "Report command timed out");
                return Err(SourceError::TimedOut {
                    program: program.clone(),
                    timeout: self.timeout,
                });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(SourceError::Failed {
                program: program.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        if !stderr.is_empty() {
            warn!(program = %program, stderr = %stderr, "Report command wrote to stderr");
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| SourceError::InvalidUtf8 {
            program: program.clone(),
        })?;

        debug!(
            program = %program,
            bytes = stdout.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched usage report"
        );

        Ok(stdout)
    }
}
