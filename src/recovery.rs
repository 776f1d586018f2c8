use core::fmt;

use crate::channel::{Channel, TransferSize};
use crate::error::{ChannelError, ResetError};
use crate::peripheral::Peripheral;

/// Classification of a channel reset, kept for diagnostics only.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetOutcome {
    Success,
    NotFound,
    NotConfigured,
    SyncFailure,
    Unknown,
}

impl From<Result<(), ResetError>> for ResetOutcome {
    fn from(result: Result<(), ResetError>) -> Self {
        match result {
            Ok(()) => ResetOutcome::Success,
            Err(ResetError::NotFound) => ResetOutcome::NotFound,
            Err(ResetError::NotConfigured) => ResetOutcome::NotConfigured,
            Err(ResetError::SyncFailure) => ResetOutcome::SyncFailure,
            Err(ResetError::Unknown) => ResetOutcome::Unknown,
        }
    }
}

impl fmt::Display for ResetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResetOutcome::Success => "success",
            ResetOutcome::NotFound => "resource not found",
            ResetOutcome::NotConfigured => "not configured",
            ResetOutcome::SyncFailure => "synchronization failure",
            ResetOutcome::Unknown => "unknown error",
        })
    }
}

/// Result of handling one fault.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Recovery {
    pub reset: ResetOutcome,
    pub restart: Result<(), ChannelError>,
}

/// Fault handler for a manual channel: reset, then restart the transfer no matter how the reset
/// went.
///
/// A failed reset leaves the channel faulted, so the restart fails too and the channel stays dead
/// until the next reconfiguration recreates it. Failures are counted but never change what
/// happens on the next fault.
#[derive(Debug, Default)]
pub struct ErrorRecovery {
    faults: u32,
    consecutive_reset_failures: u32,
}

impl ErrorRecovery {
    pub const fn new() -> Self {
        ErrorRecovery {
            faults: 0,
            consecutive_reset_failures: 0,
        }
    }

    pub fn recover<const N: usize, const D: usize, P: Peripheral>(
        &mut self,
        channel: &mut Channel<N, D>,
        hw: &mut P,
    ) -> Recovery {
        self.faults = self.faults.wrapping_add(1);

        let reset = ResetOutcome::from(channel.reset(hw));
        if reset == ResetOutcome::Success {
            self.consecutive_reset_failures = 0;
        } else {
            self.consecutive_reset_failures =
                self.consecutive_reset_failures.saturating_add(1);
            warn!(
                "channel reset failed ({} in a row): {}",
                self.consecutive_reset_failures,
                reset
            );
        }

        let restart = channel.start_transfer(TransferSize::Unbounded);
        if let Err(e) = restart {
            error!("transfer restart failed: {}", e);
        }

        Recovery { reset, restart }
    }

    /// Faults handled since creation.
    pub fn faults(&self) -> u32 {
        self.faults
    }

    /// Resets that failed since the last successful one.
    pub fn consecutive_reset_failures(&self) -> u32 {
        self.consecutive_reset_failures
    }
}
