//! System memory utilization via `/proc/meminfo`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::Error;

/// Default path to the kernel memory info file.
pub const MEMINFO_PATH: &str = "/proc/meminfo";

/// The four `/proc/meminfo` values the daemon cares about, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    pub total: u64,
    pub free: u64,
    pub buffers: u64,
    pub cached: u64,
}

impl MemoryCounters {
    /// Parses `/proc/meminfo`-formatted text.
    ///
    /// Unknown labels are skipped along with the rest of their line. A
    /// recognised label that is absent reads as zero.
    pub fn parse(content: &str, source_path: &Path) -> Result<Self, Error> {
        let mut counters = Self::default();

        for line in content.lines() {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let slot = match key {
                "MemTotal:" => &mut counters.total,
                "MemFree:" => &mut counters.free,
                "Buffers:" => &mut counters.buffers,
                "Cached:" => &mut counters.cached,
                _ => continue,
            };

            let raw = tokens.next().unwrap_or_default();
            *slot = raw.parse::<u64>().map_err(|_| {
                Error::parse(
                    source_path,
                    format!("expected integer kB value for {key} got '{raw}'"),
                )
            })?;
        }

        Ok(counters)
    }

    /// Share of memory that is neither free nor reclaimable cache.
    pub fn busy_fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let used = self
            .total
            .saturating_sub(self.free)
            .saturating_sub(self.buffers)
            .saturating_sub(self.cached);
        used as f64 / self.total as f64
    }
}

/// Latest memory reading. Every refresh replaces it wholesale.
#[derive(Debug, Clone)]
pub struct MemorySample {
    path: PathBuf,
    counters: MemoryCounters,
}

impl Default for MemorySample {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySample {
    pub fn new() -> Self {
        Self::with_path(MEMINFO_PATH)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            counters: MemoryCounters::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the memory source. On error the previous reading is kept.
    pub fn refresh(&mut self) -> Result<(), Error> {
        let content = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        self.ingest(&content)
    }

    pub fn ingest(&mut self, content: &str) -> Result<(), Error> {
        self.counters = MemoryCounters::parse(content, &self.path)?;
        Ok(())
    }

    pub fn counters(&self) -> &MemoryCounters {
        &self.counters
    }

    pub fn utilization(&self) -> f64 {
        self.counters.busy_fraction()
    }
}
