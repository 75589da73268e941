use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Configuration for a room's expiry sweep.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// How often to look for an expired mover. `None` disables the sweep
    /// and leaves timeouts to be detected at the next move.
    pub interval: Option<Duration>,
    /// Random delay (0..max) added to the first sweep so rooms started in
    /// the same instant do not all wake together.
    pub initial_jitter: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: None,
            initial_jitter: Duration::from_millis(250),
        }
    }
}

impl SweepConfig {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Default::default()
        }
    }
}

/// Returned by [`SweepTimer::wait_for_sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepInfo {
    /// Starts at 1.
    pub sweep: u64,
}

/// Periodic wake-up for one room actor.
///
/// The timer starts disarmed. The room arms it when a timed match starts
/// and disarms it when the match ends; while disarmed or disabled,
/// [`wait_for_sweep`](Self::wait_for_sweep) pends forever and the
/// surrounding `select!` only serves commands.
pub struct SweepTimer {
    config: SweepConfig,
    next: Option<Instant>,
    sweeps: u64,
}

impl SweepTimer {
    pub fn new(config: SweepConfig) -> Self {
        Self {
            config,
            next: None,
            sweeps: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(SweepConfig::default())
    }

    /// Schedules the first sweep one interval (plus jitter) from now.
    /// Does nothing when the sweep is disabled or already armed.
    pub fn arm(&mut self) {
        let Some(interval) = self.config.interval else {
            return;
        };
        if self.next.is_some() {
            return;
        }
        let jitter_ms = u64::try_from(self.config.initial_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        } else {
            Duration::ZERO
        };
        self.next = Some(Instant::now() + interval + jitter);
        debug!(interval_ms = interval.as_millis() as u64, "sweep armed");
    }

    pub fn disarm(&mut self) {
        if self.next.take().is_some() {
            debug!(sweeps = self.sweeps, "sweep disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.next.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.config.interval.is_some()
    }

    pub fn sweep_count(&self) -> u64 {
        self.sweeps
    }

    /// Waits for the next sweep. Pends forever when disarmed.
    pub async fn wait_for_sweep(&mut self) -> SweepInfo {
        let (next, interval) = match (self.next, self.config.interval) {
            (Some(next), Some(interval)) => (next, interval),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        // Always from now, not from the missed deadline.
        self.next = Some(Instant::now() + interval);
        self.sweeps += 1;
        trace!(sweep = self.sweeps, "sweep fired");

        SweepInfo { sweep: self.sweeps }
    }
}
