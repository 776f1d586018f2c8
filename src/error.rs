use core::fmt;

/// Errors raised by a [`Channel`](crate::Channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// The producer or consumer endpoint is not configured.
    NotConfigured,
    /// The peripheral could not reserve buffer memory for the channel.
    NoResources,
    /// Buffer size or count is zero or above the channel's capacity.
    InvalidConfig,
    /// The operation is not available in the channel's mode.
    InvalidMode,
    /// No transfer is running on the channel.
    NotRunning,
    /// A transfer is already outstanding.
    Busy,
    /// Every buffer of the ring is owned by the consumer side.
    WouldBlock,
    /// A commit was requested but no produced buffer is waiting.
    NothingProduced,
    /// The commit count is larger than the produced buffer.
    BadCount,
    /// A previous reset failed; the channel must be recreated.
    Faulted,
}

/// Reasons a hardware abort, and therefore a channel reset, can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetError {
    /// The channel or socket handle does not exist.
    NotFound,
    /// The channel is not configured.
    NotConfigured,
    /// The peripheral lock could not be taken.
    SyncFailure,
    /// Any other failure.
    Unknown,
}

/// Errors reported by a [`Peripheral`](crate::Peripheral) implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralError {
    /// The endpoint or socket is not configured.
    NotConfigured,
    /// Buffer or endpoint memory is exhausted.
    NoResources,
    /// The peripheral rejected the requested settings.
    Rejected,
    /// Any other failure.
    Failure,
}

/// Outcome of a rejected control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlError {
    /// The request is refused in the current state; the transport must stall.
    Stall,
    /// The payload is shorter than the request requires.
    BadSize,
    /// The request code is not handled by the addressed interface.
    Unsupported,
    /// The UART refused the new line coding. The previous configuration stays in effect.
    Apply(PeripheralError),
}

impl ControlError {
    /// Whether the failure leaves the bridge unable to continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ControlError::Apply(_))
    }

    /// The fatal error this failure escalates to, if any.
    pub fn fatal(&self) -> Option<FatalError> {
        match *self {
            ControlError::Apply(e) => Some(FatalError::LineCoding(e)),
            _ => None,
        }
    }
}

/// Errors returned by the diagnostic output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagnosticError {
    /// The bridge is inactive; nothing is written.
    NotStarted,
    /// Every diagnostic buffer is waiting for the host; the message is dropped.
    Busy,
}

/// Conditions after which the bridge cannot make forward progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FatalError {
    /// The bridge configuration does not fit the compiled capacities.
    InvalidConfig,
    /// An endpoint could not be enabled or disabled.
    Endpoint(PeripheralError),
    /// A channel could not be created.
    ChannelCreate(ChannelError),
    /// A channel transfer could not be started.
    ChannelStart(ChannelError),
    /// The UART refused a line coding.
    LineCoding(PeripheralError),
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::InvalidConfig => f.write_str("invalid bridge configuration"),
            FatalError::Endpoint(e) => write!(f, "endpoint setup failed: {:?}", e),
            FatalError::ChannelCreate(e) => write!(f, "channel creation failed: {:?}", e),
            FatalError::ChannelStart(e) => write!(f, "channel start failed: {:?}", e),
            FatalError::LineCoding(e) => write!(f, "line coding rejected: {:?}", e),
        }
    }
}
