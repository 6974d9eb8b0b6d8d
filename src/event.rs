use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Tick,
    Shutdown,
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    _task: tokio::task::JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();

        let task = tokio::spawn(async move {
            let mut tick_interval = tokio::time::interval(tick_rate);
            // Reopening the device blocks the thread for seconds. Ticks missed
            // meanwhile must not fire back to back, or the next CPU delta
            // spans microseconds and reads as idle.
            tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval fires immediately; startup
            // already sampled the counters.
            tick_interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_signal() => {
                        let _ = tx.send(Event::Shutdown);
                        break;
                    }
                    _ = tick_interval.tick() => {
                        if tx.send(Event::Tick).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self { rx, _task: task }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!(%err, "cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn emits_ticks_at_the_configured_rate() {
        let mut events = EventHandler::new(Duration::from_millis(500));
        assert_eq!(events.next().await, Some(Event::Tick));
        assert_eq!(events.next().await, Some(Event::Tick));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_runtime_does_not_burst_ticks() {
        let tick_rate = Duration::from_millis(500);
        let mut events = EventHandler::new(tick_rate);
        assert_eq!(events.next().await, Some(Event::Tick));

        tokio::time::advance(Duration::from_millis(2000)).await;

        let mut arrivals = Vec::new();
        for _ in 0..4 {
            assert_eq!(events.next().await, Some(Event::Tick));
            arrivals.push(tokio::time::Instant::now());
        }
        for pair in arrivals.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= tick_rate, "ticks {gap:?} apart after a stall");
        }
    }
}
