//! Inactivity-triggered flush of the UART to USB channel.
//!
//! UART bytes arrive one at a time and only reach the host when a buffer fills up. A periodic
//! tick checks whether any buffer was produced since the previous tick; if none was, whatever
//! sits in the partially filled buffer is forced out. The added latency for the tail of a burst
//! is therefore at most one period.

use embassy_time::Duration;
use portable_atomic::{AtomicU32, Ordering};

use crate::channel::Channel;
use crate::error::ChannelError;

/// Default period of the flush policy.
pub const FLUSH_PERIOD: Duration = Duration::from_millis(50);

/// Default number of ticks between two heartbeat lines on the diagnostic interface (one minute).
pub const HEARTBEAT_TICKS: u32 = 1200;

/// Count of buffers produced on the UART to USB channel since the last tick.
///
/// Incremented from notification context, read and cleared only by the periodic task.
pub struct ActivityCounter(AtomicU32);

impl ActivityCounter {
    pub const fn new() -> Self {
        ActivityCounter(AtomicU32::new(0))
    }

    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the count and resets it to zero in one step.
    pub fn take(&self) -> u32 {
        self.0.swap(0, Ordering::AcqRel)
    }

    pub fn peek(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for ActivityCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// What a flow policy tick did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowTick {
    /// The bridge is not active.
    Inactive,
    /// Buffers were produced during the period; no flush needed.
    Skipped { produced: u32 },
    /// A partial buffer was forced out.
    Flushed,
    /// Nothing was produced and nothing is pending.
    Idle,
    /// The flush was refused by the channel.
    Failed(ChannelError),
}

/// Periodic flush decision plus heartbeat bookkeeping.
pub struct FlowPolicy {
    period: Duration,
    heartbeat_ticks: u32,
    ticks: u32,
    elapsed_ticks: u64,
}

impl FlowPolicy {
    pub const fn new(period: Duration, heartbeat_ticks: u32) -> Self {
        FlowPolicy {
            period,
            heartbeat_ticks,
            ticks: 0,
            elapsed_ticks: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Restarts the heartbeat and uptime bookkeeping; called when the bridge becomes active.
    pub fn restart(&mut self) {
        self.ticks = 0;
        self.elapsed_ticks = 0;
    }

    /// Runs one tick against `channel`, given the activity counted since the previous tick.
    pub fn tick<const N: usize, const D: usize>(
        &mut self,
        produced: u32,
        channel: &mut Channel<N, D>,
    ) -> FlowTick {
        self.elapsed_ticks += 1;

        if produced != 0 {
            return FlowTick::Skipped { produced };
        }

        match channel.force_flush() {
            Ok(true) => FlowTick::Flushed,
            Ok(false) => FlowTick::Idle,
            Err(e) => FlowTick::Failed(e),
        }
    }

    /// Returns the time the bridge has been active, in milliseconds, once every
    /// `heartbeat_ticks` ticks.
    pub fn heartbeat_due(&mut self) -> Option<u64> {
        if self.heartbeat_ticks == 0 {
            return None;
        }

        self.ticks += 1;
        if self.ticks < self.heartbeat_ticks {
            return None;
        }

        self.ticks = 0;
        Some(self.elapsed_ticks * self.period.as_millis())
    }
}
