//! CPU utilization from `/proc/stat`.
//!
//! The kernel exposes monotonically increasing tick counters per CPU. A
//! [`UtilizationTracker`] remembers the last totals it saw and turns each
//! refresh into a per-period delta, which is what the LEDs display.

use std::fs;
use std::ops::Sub;
use std::path::{Path, PathBuf};

use crate::Error;

/// Default path to the kernel CPU accounting file.
pub const STAT_PATH: &str = "/proc/stat";

/// Number of leading counters read from every `cpu` record. Anything after
/// them (steal, guest, guest_nice) is ignored.
pub const FIELD_COUNT: usize = 7;

/// Tick counters for one CPU, or for all of them.
///
/// Used both for totals since boot and for the difference between two
/// refreshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UtilizationSample {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl UtilizationSample {
    pub fn total(&self) -> u64 {
        self.fields().iter().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    /// Non-idle share of [`total`](Self::total), in `[0.0, 1.0]`.
    ///
    /// An all-zero sample (nothing elapsed) reports `0.0`.
    pub fn busy_fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        total.saturating_sub(self.idle) as f64 / total as f64
    }

    pub fn fields(&self) -> [u64; FIELD_COUNT] {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
        ]
    }
}

impl From<[u64; FIELD_COUNT]> for UtilizationSample {
    fn from(f: [u64; FIELD_COUNT]) -> Self {
        Self {
            user: f[0],
            nice: f[1],
            system: f[2],
            idle: f[3],
            iowait: f[4],
            irq: f[5],
            softirq: f[6],
        }
    }
}

/// Field-wise difference. A counter that went backwards (CPU hotplug,
/// counter reset) contributes zero rather than wrapping.
impl Sub for UtilizationSample {
    type Output = UtilizationSample;

    fn sub(self, older: Self) -> Self::Output {
        Self {
            user: self.user.saturating_sub(older.user),
            nice: self.nice.saturating_sub(older.nice),
            system: self.system.saturating_sub(older.system),
            idle: self.idle.saturating_sub(older.idle),
            iowait: self.iowait.saturating_sub(older.iowait),
            irq: self.irq.saturating_sub(older.irq),
            softirq: self.softirq.saturating_sub(older.softirq),
        }
    }
}

/// Stateful reader of `/proc/stat` that produces per-refresh deltas.
///
/// At least one [`refresh`](Self::refresh) (or [`ingest`](Self::ingest))
/// must happen before the deltas mean anything; until then they are zero.
#[derive(Debug, Clone)]
pub struct UtilizationTracker {
    path: PathBuf,
    total: UtilizationSample,
    total_delta: UtilizationSample,
    cores: Vec<UtilizationSample>,
    core_deltas: Vec<UtilizationSample>,
}

impl Default for UtilizationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UtilizationTracker {
    pub fn new() -> Self {
        Self::with_path(STAT_PATH)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            total: UtilizationSample::default(),
            total_delta: UtilizationSample::default(),
            cores: Vec::new(),
            core_deltas: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the accounting file and updates totals and deltas.
    ///
    /// On error nothing is changed.
    pub fn refresh(&mut self) -> Result<(), Error> {
        let content = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        self.ingest(&content)
    }

    /// Applies one snapshot of `/proc/stat`-formatted text.
    ///
    /// The first line is the aggregate record and must carry at least
    /// [`FIELD_COUNT`] counters. Following `cpuN` lines are assigned core
    /// indices 0, 1, 2, ... in file order; the first line that is not a
    /// complete core record ends the scan.
    pub fn ingest(&mut self, content: &str) -> Result<(), Error> {
        let mut lines = content.lines();

        let mut tokens = lines.next().unwrap_or_default().split_whitespace();
        // Label ("cpu") is not checked.
        tokens.next();
        let aggregate = parse_counters(tokens).map_err(|found| {
            Error::parse(
                &self.path,
                format!("aggregate record: expected {FIELD_COUNT} fields but found {found}"),
            )
        })?;

        let cores: Vec<UtilizationSample> = lines.map_while(parse_core_record).collect();

        self.total_delta = aggregate - self.total;
        self.total = aggregate;

        for (id, sample) in cores.into_iter().enumerate() {
            match self.cores.get_mut(id) {
                Some(previous) => {
                    self.core_deltas[id] = sample - *previous;
                    *previous = sample;
                }
                None => {
                    tracing::debug!(core = id, "new cpu core observed");
                    self.cores.push(sample);
                    self.core_deltas.push(sample);
                }
            }
        }

        Ok(())
    }

    /// Aggregate ticks since boot, as of the last refresh.
    pub fn total(&self) -> &UtilizationSample {
        &self.total
    }

    /// Aggregate ticks accumulated between the last two refreshes.
    pub fn total_delta(&self) -> &UtilizationSample {
        &self.total_delta
    }

    pub fn core(&self, id: usize) -> Option<&UtilizationSample> {
        self.cores.get(id)
    }

    pub fn core_delta(&self, id: usize) -> Option<&UtilizationSample> {
        self.core_deltas.get(id)
    }

    pub fn core_deltas(&self) -> &[UtilizationSample] {
        &self.core_deltas
    }

    /// Number of distinct cores seen so far. Never decreases.
    pub fn core_count(&self) -> usize {
        self.cores.len()
    }
}

/// Reads the first [`FIELD_COUNT`] numeric tokens. On failure returns how
/// many were read successfully.
fn parse_counters<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Result<UtilizationSample, usize> {
    let mut fields = [0u64; FIELD_COUNT];
    for (found, slot) in fields.iter_mut().enumerate() {
        match tokens.next().and_then(|t| t.parse::<u64>().ok()) {
            Some(value) => *slot = value,
            None => return Err(found),
        }
    }
    Ok(UtilizationSample::from(fields))
}

fn parse_core_record(line: &str) -> Option<UtilizationSample> {
    let mut tokens = line.split_whitespace();
    let label = tokens.next()?;
    if !is_core_label(label) {
        return None;
    }
    parse_counters(tokens).ok()
}

fn is_core_label(label: &str) -> bool {
    label
        .strip_prefix("cpu")
        .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
}
