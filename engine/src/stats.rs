use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

static CLOCK_FAILURE_LOGGED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: i64,
}

impl Timestamp {
    #[cfg(unix)]
    pub fn now() -> Self {
        use nix::time::{ClockId, clock_gettime};
        Self::from_clock(
            clock_gettime(ClockId::CLOCK_MONOTONIC)
                .map(|ts| (ts.tv_sec() as i64, ts.tv_nsec() as i64)),
        )
    }

    /// A failed clock read yields `0.000000000`; the first failure is logged.
    pub fn from_clock<E: fmt::Display>(reading: Result<(i64, i64), E>) -> Self {
        match reading {
            Ok((sec, nsec)) => Self { sec, nsec },
            Err(err) => {
                if !CLOCK_FAILURE_LOGGED.swap(true, Ordering::Relaxed) {
                    warn!("clock_gettime(CLOCK_MONOTONIC) failed, reporting zero timestamps: {err}");
                }
                Self::default()
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        self.sec == 0 && self.nsec == 0
    }

    #[cfg(not(unix))]
    pub fn now() -> Self {
        use std::sync::OnceLock;
        use std::time::Instant;
        static ZERO: OnceLock<Instant> = OnceLock::new();
        let elapsed = ZERO.get_or_init(Instant::now).elapsed();
        Self {
            sec: elapsed.as_secs() as i64,
            nsec: elapsed.subsec_nanos() as i64,
        }
    }
}

/// What one pacing cycle saw and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub wakeup: Timestamp,
    pub playback_available: i64,
    pub capture_available: i64,
    pub pollout: bool,
    pub pollin: bool,
    pub playback_written: usize,
    pub capture_read: usize,
    pub fill: usize,
    pub drain: usize,
    pub cycles: u64,
    pub valid: bool,
}

impl Observation {
    pub fn moved_frames(&self) -> bool {
        self.capture_read > 0 || self.playback_written > 0
    }
}

/// Pre-sized observation store filled index by index during a run.
#[derive(Debug)]
pub struct StatsSampler {
    records: Vec<Observation>,
    recorded: usize,
}

impl StatsSampler {
    pub fn new(sample_size: usize) -> Self {
        Self {
            records: vec![Observation::default(); sample_size],
            recorded: 0,
        }
    }

    pub fn sample_size(&self) -> usize {
        self.records.len()
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn is_full(&self) -> bool {
        self.recorded >= self.records.len()
    }

    pub fn record(&mut self, index: usize, observation: Observation) {
        assert!(
            index < self.records.len(),
            "sample index {index} out of range for {} records",
            self.records.len()
        );
        self.records[index] = observation;
        self.recorded = self.recorded.max(index + 1);
    }

    /// The records before the first invalid one.
    pub fn finalize(mut self) -> Vec<Observation> {
        let valid = self
            .records
            .iter()
            .position(|record| !record.valid)
            .unwrap_or(self.records.len());
        self.records.truncate(valid);
        self.records
    }
}

/// An observation with the running totals folded in at report time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    #[serde(flatten)]
    pub observation: Observation,
    pub total_written: u64,
    pub total_read: u64,
    pub diff: i64,
}

pub fn report_rows(observations: &[Observation]) -> impl Iterator<Item = ReportRow> + '_ {
    observations
        .iter()
        .take_while(|observation| observation.valid)
        .scan((0_u64, 0_u64), |(written, read), observation| {
            *written += observation.playback_written as u64;
            *read += observation.capture_read as u64;
            Some(ReportRow {
                observation: *observation,
                total_written: *written,
                total_read: *read,
                diff: *read as i64 - *written as i64,
            })
        })
}
