//! Byte pumps between the bridge and an `embedded-hal` serial port, for UARTs driven by the
//! CPU instead of DMA sockets.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::serial;

use crate::bridge::BridgeEngine;
use crate::error::ChannelError;
use crate::peripheral::Peripheral;

/// Bytes moved per lock of the bridge.
const CHUNK: usize = 32;

/// Failure of a pump.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PumpError<E> {
    /// The bridge refused the data, usually because it is not active.
    Bridge(ChannelError),
    /// The serial port reported an error.
    Serial(E),
}

impl<E> From<ChannelError> for PumpError<E> {
    fn from(e: ChannelError) -> Self {
        PumpError::Bridge(e)
    }
}

/// Result of one [`pump_rx`] run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxCount {
    /// Bytes handed to the host.
    pub accepted: usize,
    /// Bytes read from the UART while every buffer was waiting for the host.
    pub dropped: usize,
}

/// Reads the UART until it has nothing more and feeds the bytes to the UART to USB channel.
///
/// Like a hardware FIFO overrun, bytes that arrive while the channel is full are lost.
pub fn pump_rx<M, P, R>(
    bridge: &BridgeEngine<M, P>,
    uart: &mut R,
) -> Result<RxCount, PumpError<R::Error>>
where
    M: RawMutex,
    P: Peripheral,
    R: serial::Read<u8>,
{
    let mut count = RxCount::default();
    let mut chunk = [0u8; CHUNK];

    loop {
        let mut len = 0;
        let mut drained = false;

        while len < CHUNK {
            match uart.read() {
                Ok(byte) => {
                    chunk[len] = byte;
                    len += 1;
                }
                Err(nb::Error::WouldBlock) => {
                    drained = true;
                    break;
                }
                Err(nb::Error::Other(e)) => return Err(PumpError::Serial(e)),
            }
        }

        if len != 0 {
            let accepted = bridge.uart_received(&chunk[..len])?;
            count.accepted += accepted;
            count.dropped += len - accepted;
        }

        if drained {
            break;
        }
    }

    if count.dropped != 0 {
        warn!("uart rx overrun, {} bytes dropped", count.dropped);
    }

    Ok(count)
}

/// Writes queued host data to the UART until the UART stops taking bytes or nothing is left.
/// Returns the number of bytes written.
pub fn pump_tx<M, P, W>(bridge: &BridgeEngine<M, P>, uart: &mut W) -> Result<usize, W::Error>
where
    M: RawMutex,
    P: Peripheral,
    W: serial::Write<u8>,
{
    let mut total = 0;

    loop {
        let written = bridge.uart_transmit(usize::MAX, |data| {
            for (i, &byte) in data.iter().enumerate() {
                match uart.write(byte) {
                    Ok(()) => {}
                    Err(nb::Error::WouldBlock) => return Ok(i),
                    Err(nb::Error::Other(e)) => return Err(e),
                }
            }
            Ok(data.len())
        })?;

        if written == 0 {
            break;
        }
        total += written;
    }

    Ok(total)
}
