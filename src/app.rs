use crate::config::{Config, LedsConfig};
use crate::device::{Connector, Dispatch, Link, Sleeper};
use crate::system::{MemorySample, UtilizationTracker};

/// What one tick measured and how the peripheral took it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Aggregate CPU busy fraction, `None` if `/proc/stat` could not be read.
    pub total: Option<f64>,
    pub cores: Vec<f64>,
    pub memory: Option<f64>,
    /// First command status that was not [`Dispatch::Sent`], else `Sent`.
    /// `None` when nothing was sent.
    pub dispatch: Option<Dispatch>,
}

impl TickReport {
    fn note(&mut self, status: Dispatch) {
        if self.dispatch.is_none_or(Dispatch::is_sent) {
            self.dispatch = Some(status);
        }
    }
}

pub struct App<C: Connector, S: Sleeper> {
    pub cpu: UtilizationTracker,
    pub memory: MemorySample,
    pub link: Link<C, S>,
    leds: LedsConfig,
    verify_identity: bool,
    idle_timeout: Option<bool>,
}

impl<C: Connector, S: Sleeper> App<C, S> {
    pub fn new(config: &Config, link: Link<C, S>) -> Self {
        for channel in config.leds.invalid_channels() {
            tracing::warn!(channel, "configured LED channel does not exist, it will be ignored");
        }

        Self {
            cpu: UtilizationTracker::with_path(&config.sources.stat_path),
            memory: MemorySample::with_path(&config.sources.meminfo_path),
            link,
            leds: config.leds.clone(),
            verify_identity: config.device.verify_identity,
            idle_timeout: config.device.idle_timeout,
        }
    }

    /// Primes the counters and tries to bring up the peripheral.
    ///
    /// Nothing here is fatal: an absent or foreign device is logged and the
    /// link keeps retrying on every tick.
    pub fn startup(&mut self) {
        if let Err(err) = self.cpu.refresh() {
            tracing::warn!(%err, "failed to obtain cpu utilization");
        }
        if let Err(err) = self.memory.refresh() {
            tracing::warn!(%err, "failed to obtain memory utilization");
        }
        self.connect();
    }

    /// Makes sure the link is open. A fresh connection has just reset the
    /// microcontroller, so it is verified, blanked and given the configured
    /// idle timeout before any level is sent.
    fn connect(&mut self) -> bool {
        if self.link.is_open() {
            return true;
        }
        if !self.link.ready() {
            return false;
        }

        if self.verify_identity {
            match self.link.identify() {
                Ok(()) => tracing::info!("successfully opened communications with the peripheral"),
                Err(err) => tracing::warn!(%err, "peripheral did not identify itself"),
            }
            if !self.link.is_open() {
                return false;
            }
        }
        if !self.link.set_all_channels_duty(0).is_sent() {
            return false;
        }
        if let Some(enable) = self.idle_timeout
            && !self.link.set_idle_timeout(enable).is_sent()
        {
            return false;
        }
        true
    }

    /// Refreshes both sources and pushes the new levels to the LEDs.
    ///
    /// A source that fails to refresh leaves its channels untouched. Once a
    /// command fails the rest of the tick is skipped; the next tick
    /// reconnects.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let mut levels = Vec::new();

        match self.cpu.refresh() {
            Ok(()) => {
                report.total = Some(self.cpu.total_delta().busy_fraction());
                report.cores = self
                    .cpu
                    .core_deltas()
                    .iter()
                    .map(|d| d.busy_fraction())
                    .collect();
                levels.extend(self.cpu_levels());
            }
            Err(err) => tracing::warn!(%err, "cpu refresh failed"),
        }

        match self.memory.refresh() {
            Ok(()) => {
                let busy = self.memory.utilization();
                report.memory = Some(busy);
                levels.extend(self.leds.memory.map(|channel| (channel, busy)));
            }
            Err(err) => tracing::warn!(%err, "memory refresh failed"),
        }

        if levels.is_empty() {
            return report;
        }
        if !self.connect() {
            report.note(Dispatch::Unavailable);
            return report;
        }
        for (channel, busy) in levels {
            let status = self.link.set_channel_intensity(channel, busy);
            report.note(status);
            if matches!(status, Dispatch::Unavailable | Dispatch::Dropped) {
                break;
            }
        }

        report
    }

    /// Pairs each CPU channel with the busy fraction it should show.
    fn cpu_levels(&self) -> Vec<(usize, f64)> {
        let per_core = self.cpu.core_count() == self.leds.cpu.len();
        let total = self.cpu.total_delta().busy_fraction();
        self.leds
            .cpu
            .iter()
            .enumerate()
            .map(|(core, &channel)| {
                let busy = if per_core {
                    self.cpu.core_delta(core).map_or(total, |d| d.busy_fraction())
                } else {
                    total
                };
                (channel, busy)
            })
            .collect()
    }

    /// Darkens the LEDs if configured to, then closes the link.
    pub fn shutdown(&mut self) {
        if self.leds.blank_on_exit && self.link.is_open() {
            self.link.set_all_channels_duty(0);
        }
        self.link.release();
    }
}
