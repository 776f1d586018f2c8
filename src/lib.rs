//! USB to UART bridge engine with CDC-ACM line coding control.
//!
//! The bridge moves bytes between a USB bulk endpoint pair and a UART in both directions. Host
//! data goes to the UART through an auto-forwarded [`Channel`]; UART data is collected in small
//! buffers that are committed to the host one by one, and a periodic flush policy forces out a
//! partially filled buffer once the line goes quiet. A second CDC interface carries diagnostic
//! text to the host.
//!
//! The engine does not talk to silicon itself. Everything hardware specific sits behind the
//! [`Peripheral`] trait, and the USB stack and interrupt glue call into [`BridgeEngine`] for
//! transport events, control requests and data.
//!
//! Example
//! =======
//!
//! ```no_run
//! # use usbd_uart_bridge::*;
//! # struct Board;
//! # impl Peripheral for Board {
//! #     fn configure_endpoint(&mut self, _: EndpointId, _: EndpointSettings) -> Result<(), PeripheralError> { Ok(()) }
//! #     fn disable_endpoint(&mut self, _: EndpointId) -> Result<(), PeripheralError> { Ok(()) }
//! #     fn flush_endpoint(&mut self, _: EndpointId) {}
//! #     fn is_configured(&self, _: EndpointId) -> bool { true }
//! #     fn reserve(&mut self, _: usize) -> Result<(), PeripheralError> { Ok(()) }
//! #     fn release(&mut self, _: usize) {}
//! #     fn abort(&mut self, _: EndpointId) -> Result<(), ResetError> { Ok(()) }
//! #     fn apply_line_coding(&mut self, _: &LineCoding) -> Result<(), PeripheralError> { Ok(()) }
//! # }
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//!
//! let bridge: BridgeEngine<CriticalSectionRawMutex, _> =
//!     BridgeEngine::new(BridgeConfig::with_packet_size(512), Board).unwrap();
//!
//! // SET_CONFIGURATION from the host
//! bridge.transport_event(TransportEvent::Configured).unwrap();
//!
//! // UART receive interrupt
//! bridge.uart_received(b"OK\r\n").unwrap();
//!
//! // every 50 ms, normally from `run_flow_policy`
//! bridge.flow_tick();
//!
//! // bulk IN token
//! let mut packet = [0u8; 512];
//! match bridge.usb_transmit(&mut packet) {
//!     Ok(count) => {
//!         // send &packet[..count]
//!     }
//!     Err(ChannelError::WouldBlock) => { /* nothing to send, NAK */ }
//!     Err(err) => { /* bridge not active */ }
//! }
//! ```

#![no_std]

#[macro_use]
mod fmt;

mod bridge;
mod buffer;
mod cdc_acm;
mod channel;
mod config;
mod control;
mod diag;
mod error;
mod flow;
mod io;
mod peripheral;
mod recovery;
mod uart;

pub use crate::bridge::*;
pub use crate::cdc_acm::*;
pub use crate::channel::*;
pub use crate::config::*;
pub use crate::control::*;
pub use crate::diag::{LineWriter, Notice};
pub use crate::error::*;
pub use crate::flow::*;
pub use crate::io::DiagnosticWriter;
pub use crate::peripheral::*;
pub use crate::recovery::*;
pub use crate::uart::*;
pub use embedded_io;
pub use usb_device::control::Request;
