use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::bridge::BridgeEngine;
use crate::config::MAX_PACKET_SIZE;
use crate::diag::LineWriter;
use crate::error::DiagnosticError;
use crate::peripheral::Peripheral;

impl embedded_io::Error for DiagnosticError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            DiagnosticError::NotStarted => embedded_io::ErrorKind::NotConnected,
            DiagnosticError::Busy => embedded_io::ErrorKind::OutOfMemory,
        }
    }
}

/// Line-buffered writer for the diagnostic interface.
///
/// Bytes are collected until a `\n`, an explicit flush, or a full packet, and each chunk is then
/// queued as one packet. Delivery is best effort: a chunk that finds every diagnostic buffer
/// waiting for the host is dropped.
pub struct DiagnosticWriter<'a, M: RawMutex, P: Peripheral> {
    bridge: &'a BridgeEngine<M, P>,
    line: LineWriter<MAX_PACKET_SIZE>,
    dropped: usize,
}

impl<'a, M: RawMutex, P: Peripheral> DiagnosticWriter<'a, M, P> {
    pub fn new(bridge: &'a BridgeEngine<M, P>) -> Self {
        DiagnosticWriter {
            bridge,
            line: LineWriter::new(),
            dropped: 0,
        }
    }

    /// Number of chunks dropped because the host was not reading.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn commit(&mut self) -> Result<(), DiagnosticError> {
        if self.line.is_empty() {
            return Ok(());
        }

        let result = self.bridge.diagnostic_print(self.line.as_bytes());
        self.line.clear();

        match result {
            Ok(_) => Ok(()),
            Err(DiagnosticError::Busy) => {
                self.dropped += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl<M: RawMutex, P: Peripheral> embedded_io::ErrorType for DiagnosticWriter<'_, M, P> {
    type Error = DiagnosticError;
}

impl<M: RawMutex, P: Peripheral> embedded_io::Write for DiagnosticWriter<'_, M, P> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if !self.bridge.is_active() {
            self.line.clear();
            return Err(DiagnosticError::NotStarted);
        }

        let packet_size = self.bridge.config().packet_size;

        for &byte in buf {
            self.line.push(byte);

            if byte == b'\n' || self.line.len() >= packet_size {
                self.commit()?;
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.commit()
    }
}

impl<M: RawMutex, P: Peripheral> fmt::Write for DiagnosticWriter<'_, M, P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        embedded_io::Write::write_all(self, s.as_bytes()).map_err(|_| fmt::Error)
    }
}
