//! Text lines written to the host on the diagnostic interface.

use core::fmt::{self, Write};

use heapless::Vec;

use crate::recovery::Recovery;

/// Status line reported on the diagnostic interface.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notice {
    /// The host drained a UART to USB buffer.
    Consumed { count: usize },
    /// The UART to USB transfer faulted and was reset.
    Fault(Recovery),
    ProducerSuspended,
    ConsumerSuspended,
    Aborted,
    /// Periodic sign of life.
    Heartbeat { uptime_ms: u64 },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Consumed { count } => write!(f, "[uart-usb] consumed {} bytes\r\n", count),
            Notice::Fault(recovery) => {
                write!(f, "[uart-usb] transfer error, reset: {}", recovery.reset)?;
                match recovery.restart {
                    Ok(()) => f.write_str(", transfer restarted\r\n"),
                    Err(e) => write!(f, ", restart failed: {:?}\r\n", e),
                }
            }
            Notice::ProducerSuspended => f.write_str("[uart-usb] producer suspended\r\n"),
            Notice::ConsumerSuspended => f.write_str("[uart-usb] consumer suspended\r\n"),
            Notice::Aborted => f.write_str("[uart-usb] transfer aborted\r\n"),
            Notice::Heartbeat { uptime_ms } => {
                write!(f, "Dbg Port Alive | Uptime: {} ms\r\n", uptime_ms)
            }
        }
    }
}

/// Fixed-capacity text sink that silently drops whatever does not fit.
#[derive(Default)]
pub struct LineWriter<const N: usize> {
    buf: Vec<u8, N>,
    truncated: bool,
}

impl<const N: usize> LineWriter<N> {
    pub const fn new() -> Self {
        LineWriter {
            buf: Vec::new(),
            truncated: false,
        }
    }

    /// Formats `args` into a fresh writer.
    pub fn format(args: fmt::Arguments<'_>) -> Self {
        let mut w = Self::new();
        // write_str never fails, so neither does formatting.
        let _ = w.write_fmt(args);
        w
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends one byte, or drops it when the writer is full.
    pub fn push(&mut self, byte: u8) {
        self.truncated |= self.buf.push(byte).is_err();
    }

    /// Whether text was dropped for lack of space.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.truncated = false;
    }
}

impl<const N: usize> Write for LineWriter<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = N - self.buf.len();
        let count = s.len().min(room);

        // Cannot fail, `count` fits.
        let _ = self.buf.extend_from_slice(&s.as_bytes()[..count]);
        self.truncated |= count < s.len();

        Ok(())
    }
}
