use embassy_time::Duration;

use crate::flow::{FLUSH_PERIOD, HEARTBEAT_TICKS};
use crate::peripheral::EndpointId;

/// Largest USB bulk packet the bridge supports (SuperSpeed).
pub const MAX_PACKET_SIZE: usize = 1024;

/// Largest buffer count of any bridge channel.
pub const MAX_BUFFER_COUNT: usize = 8;

/// Largest buffer size of the UART to USB channel.
pub const MAX_UART_BUFFER_SIZE: usize = 256;

/// Addresses of every endpoint and socket the bridge uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Endpoints {
    /// Bulk OUT, host to UART.
    pub usb_out: EndpointId,
    /// Bulk IN, UART to host.
    pub usb_in: EndpointId,
    /// CDC notification endpoint of the serial interface.
    pub notify: EndpointId,
    /// Bulk IN of the diagnostic interface.
    pub diag_in: EndpointId,
    /// Bulk OUT of the diagnostic interface. Enabled but never read.
    pub diag_out: EndpointId,
    /// CDC notification endpoint of the diagnostic interface.
    pub diag_notify: EndpointId,
    pub uart_rx: EndpointId,
    pub uart_tx: EndpointId,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            usb_out: EndpointId(0x01),
            usb_in: EndpointId(0x81),
            notify: EndpointId(0x82),
            diag_in: EndpointId(0x83),
            diag_out: EndpointId(0x03),
            diag_notify: EndpointId(0x84),
            uart_rx: EndpointId::UART_RX,
            uart_tx: EndpointId::UART_TX,
        }
    }
}

/// Bridge tuning.
///
/// `packet_size` comes from the USB stack once the link speed is known (64 for full speed, 512
/// for high speed, 1024 for SuperSpeed).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeConfig {
    pub endpoints: Endpoints,
    /// Bulk packet size, also the buffer size of the host to UART and diagnostic channels.
    pub packet_size: usize,
    /// Packet size of the serial interface's notification endpoint.
    pub notify_packet_size: usize,
    /// Packet size of the diagnostic interface's notification endpoint.
    pub diag_notify_packet_size: usize,
    /// Buffer count of both data channels.
    pub buffer_count: usize,
    /// Buffer size of the UART to host channel. Kept small so slow UART traffic fills buffers
    /// quickly.
    pub uart_buffer_size: usize,
    pub diag_buffer_count: usize,
    pub flush_period: Duration,
    /// Flush ticks between heartbeat lines; zero disables the heartbeat.
    pub heartbeat_ticks: u32,
}

impl BridgeConfig {
    /// Configuration for a given bulk packet size, everything else at defaults.
    pub fn with_packet_size(packet_size: usize) -> Self {
        BridgeConfig {
            packet_size,
            ..Default::default()
        }
    }

    /// Checks every size against the compiled capacities.
    pub fn validate(&self) -> bool {
        let size_ok = |size: usize, max: usize| size != 0 && size <= max;

        size_ok(self.packet_size, MAX_PACKET_SIZE)
            && size_ok(self.notify_packet_size, MAX_PACKET_SIZE)
            && size_ok(self.diag_notify_packet_size, MAX_PACKET_SIZE)
            && size_ok(self.buffer_count, MAX_BUFFER_COUNT)
            && size_ok(self.uart_buffer_size, MAX_UART_BUFFER_SIZE)
            && size_ok(self.diag_buffer_count, MAX_BUFFER_COUNT)
            && self.flush_period != Duration::from_ticks(0)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            endpoints: Endpoints::default(),
            packet_size: 512,
            notify_packet_size: 64,
            diag_notify_packet_size: 64,
            buffer_count: 8,
            uart_buffer_size: 32,
            diag_buffer_count: 4,
            flush_period: FLUSH_PERIOD,
            heartbeat_ticks: HEARTBEAT_TICKS,
        }
    }
}
