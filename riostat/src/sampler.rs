//! Fixed-interval sampling loop.
//!
//! Each cycle fetches a report, decodes it into the snapshot store, diffs it
//! against the previous snapshot and renders the rates. The loop then sleeps
//! for whatever is left of the interval, so cycle starts stay `interval`
//! apart no matter how long the work took. A cycle that overruns is followed
//! immediately by the next one; nothing is skipped or batched.

use crate::collect::{SnapshotError, SnapshotSource, SourceError};
use crate::delta::compute_rates;
use crate::render::render_table;
use crate::store::SnapshotStore;
use std::future::Future;
use std::io::{self, Write};
use std::num::NonZeroU64;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where the loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    /// No snapshot to diff against yet.
    Priming,
    /// Steady state: every cycle renders a table.
    Sampling,
    /// A fetch, decode or output error stopped the loop.
    Terminated,
}

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("failed to write rate table: {0}")]
    Output(#[from] io::Error),

    #[error("sampler has already terminated")]
    Terminated,
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Rows rendered, or `None` for the priming cycle.
    pub rows: Option<usize>,
    /// Time spent fetching, decoding and rendering.
    pub elapsed: Duration,
}

/// Drives the fetch → decode → diff → render cycle.
pub struct Sampler<S, W> {
    source: S,
    out: W,
    store: SnapshotStore,
    interval_secs: NonZeroU64,
    state: SamplerState,
    cycles: u64,
}

impl<S: SnapshotSource, W: Write> Sampler<S, W> {
    pub fn new(source: S, out: W, interval_secs: NonZeroU64) -> Self {
        Self {
            source,
            out,
            store: SnapshotStore::new(),
            interval_secs,
            state: SamplerState::Priming,
            cycles: 0,
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.get())
    }

    /// Completed cycles, priming included.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Run one cycle without sleeping afterwards.
    ///
    /// Any error moves the sampler to [`SamplerState::Terminated`]; later
    /// calls fail with [`SamplerError::Terminated`].
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SamplerError> {
        if self.state == SamplerState::Terminated {
            return Err(SamplerError::Terminated);
        }

        let start = Instant::now();
        match self.step().await {
            Ok(rows) => {
                self.cycles += 1;
                let elapsed = start.elapsed();
                debug!(
                    cycle = self.cycles,
                    rows = ?rows,
                    collected_at = ?self.store.current().and_then(|s| s.collected_at),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Cycle complete"
                );
                Ok(CycleReport { rows, elapsed })
            }
            Err(err) => {
                self.state = SamplerState::Terminated;
                // The caller reports the error to the user.
                debug!(cycle = self.cycles + 1, error = %err, "Sampling stopped");
                Err(err)
            }
        }
    }

    async fn step(&mut self) -> Result<Option<usize>, SamplerError> {
        let raw = self.source.fetch().await?;
        self.store.ingest(&raw)?;

        let Some((prev, curr)) = self.store.pair() else {
            info!("First snapshot collected; rates start next cycle");
            self.state = SamplerState::Sampling;
            return Ok(None);
        };

        let rows = compute_rates(prev, curr, self.interval_secs);
        render_table(&mut self.out, &rows)?;
        self.state = SamplerState::Sampling;
        Ok(Some(rows.len()))
    }

    /// Sample until an error occurs or `shutdown` resolves.
    ///
    /// `shutdown` is only observed between cycles; a report command that is
    /// already running is allowed to finish (or time out) first.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), SamplerError>
    where
        F: Future<Output = ()>,
    {
        let interval = self.interval();
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval_secs.get(), "Sampler started");

        loop {
            let report = self.run_cycle().await?;
            let pause = remaining_sleep(interval, report.elapsed);

            if pause.is_none() {
                warn!(
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    interval_secs = self.interval_secs.get(),
                    "Cycle overran the sampling interval"
                );
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(cycles = self.cycles, "Shutdown requested; sampler stopping");
                    return Ok(());
                }
                _ = pause_for(pause) => {}
            }
        }
    }
}

/// Time left in the interval after `elapsed` of work, if any.
pub fn remaining_sleep(interval: Duration, elapsed: Duration) -> Option<Duration> {
    interval.checked_sub(elapsed).filter(|d| !d.is_zero())
}

async fn pause_for(pause: Option<Duration>) {
    if let Some(duration) = pause {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::snapshot::fixtures::{pool, report};
    use crate::delta::{MIB, PoolRates};
    use std::collections::VecDeque;
    use tracing::{Level, info};
    use tracing_subscriber::fmt;

    fn init_test_logging() {
        let _ = fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    fn secs(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).expect("non-zero interval")
    }

    /// Replays canned reports, taking `work` of (tokio) time per fetch.
    struct ScriptedSource {
        reports: VecDeque<String>,
        work: Duration,
        fetched_at: Vec<Instant>,
    }

    impl ScriptedSource {
        fn new(reports: impl IntoIterator<Item = String>, work: Duration) -> Self {
            Self {
                reports: reports.into_iter().collect(),
                work,
                fetched_at: Vec::new(),
            }
        }

        fn gaps(&self) -> Vec<Duration> {
            self.fetched_at
                .windows(2)
                .map(|w| w[1].duration_since(w[0]))
                .collect()
        }
    }

    impl SnapshotSource for ScriptedSource {
        async fn fetch(&mut self) -> Result<String, SourceError> {
            self.fetched_at.push(Instant::now());
            tokio::time::sleep(self.work).await;
            self.reports.pop_front().ok_or_else(|| SourceError::Failed {
                program: "rados".to_string(),
                code: 1,
                stderr: "cluster unreachable".to_string(),
            })
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn reports(count: u64) -> Vec<String> {
        (0..count)
            .map(|i| report(&[pool("rbd", [i * 500, i * 10 * MIB, i * 50, 0, i, 0])]))
            .collect()
    }

    fn assert_gap(gap: Duration, expected: Duration) {
        assert!(
            gap >= expected && gap - expected < Duration::from_millis(5),
            "gap {gap:?} not within tolerance of {expected:?}"
        );
    }

    #[tokio::test]
    async fn test_priming_cycle_renders_nothing() {
        init_test_logging();
        info!("TEST START: test_priming_cycle_renders_nothing");

        let source = ScriptedSource::new(reports(1), Duration::ZERO);
        let mut sampler = Sampler::new(source, Vec::new(), secs(5));
        assert_eq!(sampler.state(), SamplerState::Priming);

        let report = sampler.run_cycle().await.expect("priming should succeed");

        assert_eq!(report.rows, None);
        assert_eq!(sampler.state(), SamplerState::Sampling);
        assert!(sampler.output().is_empty());
        assert_eq!(sampler.cycles(), 1);

        info!("TEST PASS: test_priming_cycle_renders_nothing");
    }

    #[tokio::test]
    async fn test_second_cycle_renders_rates() {
        init_test_logging();
        info!("TEST START: test_second_cycle_renders_rates");

        let source = ScriptedSource::new(reports(2), Duration::ZERO);
        let mut sampler = Sampler::new(source, Vec::new(), secs(5));

        sampler.run_cycle().await.expect("priming should succeed");
        let report = sampler.run_cycle().await.expect("sampling should succeed");
        assert_eq!(report.rows, Some(1));

        let mut expected = Vec::new();
        render_table(
            &mut expected,
            &[PoolRates {
                name: "rbd".to_string(),
                write_ops: 100,
                write_mib: 2,
                read_ops: 10,
                read_mib: 0,
                objects: 0,
                size_mib: 0,
                counter_reset: false,
            }],
        )
        .expect("render to Vec");

        assert_eq!(sampler.output(), &expected);

        info!("TEST PASS: test_second_cycle_renders_rates");
    }

    #[tokio::test]
    async fn test_fetch_failure_terminates() {
        init_test_logging();
        info!("TEST START: test_fetch_failure_terminates");

        let source = ScriptedSource::new(Vec::new(), Duration::ZERO);
        let mut sampler = Sampler::new(source, Vec::new(), secs(5));

        let err = sampler.run_cycle().await.expect_err("fetch should fail");
        info!(error = %err, "RESULT: got expected error");
        assert!(matches!(err, SamplerError::Source(SourceError::Failed { .. })));
        assert_eq!(sampler.state(), SamplerState::Terminated);

        let again = sampler.run_cycle().await.expect_err("terminated is final");
        assert!(matches!(again, SamplerError::Terminated));
        assert_eq!(sampler.source().fetched_at.len(), 1);

        info!("TEST PASS: test_fetch_failure_terminates");
    }

    #[tokio::test]
    async fn test_decode_failure_terminates() {
        init_test_logging();
        info!("TEST START: test_decode_failure_terminates");

        let mut script = reports(1);
        script.push("2024-01-01 00:00:00 monclient: hunting for new mon".to_string());
        let source = ScriptedSource::new(script, Duration::ZERO);
        let mut sampler = Sampler::new(source, Vec::new(), secs(5));

        sampler.run_cycle().await.expect("priming should succeed");
        let err = sampler.run_cycle().await.expect_err("decode should fail");

        assert!(matches!(err, SamplerError::Snapshot(_)));
        assert_eq!(sampler.state(), SamplerState::Terminated);
        assert!(sampler.output().is_empty());

        info!("TEST PASS: test_decode_failure_terminates");
    }

    #[tokio::test]
    async fn test_output_failure_terminates() {
        init_test_logging();
        info!("TEST START: test_output_failure_terminates");

        let source = ScriptedSource::new(reports(2), Duration::ZERO);
        let mut sampler = Sampler::new(source, BrokenPipe, secs(1));

        sampler.run_cycle().await.expect("priming writes nothing");
        let err = sampler.run_cycle().await.expect_err("write should fail");

        assert!(matches!(err, SamplerError::Output(_)));
        assert_eq!(sampler.state(), SamplerState::Terminated);

        info!("TEST PASS: test_output_failure_terminates");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_starts_are_one_interval_apart() {
        init_test_logging();
        info!("TEST START: test_cycle_starts_are_one_interval_apart");

        // 1.5s of work per cycle inside a 5s interval.
        let source = ScriptedSource::new(reports(4), Duration::from_millis(1500));
        let mut sampler = Sampler::new(source, Vec::new(), secs(5));

        let result = sampler.run(std::future::pending()).await;
        assert!(matches!(result, Err(SamplerError::Source(_))));

        let gaps = sampler.source().gaps();
        info!(gaps = ?gaps, "RESULT: gaps between cycle starts");
        assert_eq!(gaps.len(), 4);
        for gap in gaps {
            assert_gap(gap, Duration::from_secs(5));
        }

        info!("TEST PASS: test_cycle_starts_are_one_interval_apart");
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_starts_next_cycle_immediately() {
        init_test_logging();
        info!("TEST START: test_overrun_starts_next_cycle_immediately");

        // Each fetch takes 7s against a 5s interval: no sleep, no skipped cycle.
        let source = ScriptedSource::new(reports(3), Duration::from_secs(7));
        let mut sampler = Sampler::new(source, Vec::new(), secs(5));

        let result = sampler.run(std::future::pending()).await;
        assert!(result.is_err());

        let gaps = sampler.source().gaps();
        info!(gaps = ?gaps, "RESULT: gaps between cycle starts");
        assert_eq!(gaps.len(), 3);
        for gap in gaps {
            assert_gap(gap, Duration::from_secs(7));
        }
        assert_eq!(sampler.cycles(), 3);

        info!("TEST PASS: test_overrun_starts_next_cycle_immediately");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_between_cycles() {
        init_test_logging();
        info!("TEST START: test_shutdown_stops_between_cycles");

        let source = ScriptedSource::new(reports(100), Duration::ZERO);
        let mut sampler = Sampler::new(source, Vec::new(), secs(5));

        // Cycles start at 0s, 5s and 10s; shutdown lands in the third sleep.
        let shutdown = tokio::time::sleep(Duration::from_secs(12));
        sampler.run(shutdown).await.expect("shutdown is a clean exit");

        assert_eq!(sampler.cycles(), 3);
        assert_eq!(sampler.state(), SamplerState::Sampling);
        let blocks = String::from_utf8_lossy(sampler.output())
            .matches("wr. IOPS")
            .count();
        assert_eq!(blocks, 2);

        info!("TEST PASS: test_shutdown_stops_between_cycles");
    }

    #[test]
    fn test_remaining_sleep() {
        let interval = Duration::from_secs(5);
        assert_eq!(
            remaining_sleep(interval, Duration::from_millis(1200)),
            Some(Duration::from_millis(3800))
        );
        assert_eq!(remaining_sleep(interval, Duration::ZERO), Some(interval));
        assert_eq!(remaining_sleep(interval, interval), None);
        assert_eq!(remaining_sleep(interval, Duration::from_secs(9)), None);
    }
}
