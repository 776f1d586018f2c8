use crate::cdc_acm::LineCoding;
use crate::error::{PeripheralError, ResetError};

/// Address of a data source or sink: a USB endpoint, a UART socket or the CPU socket.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointId(pub u16);

impl EndpointId {
    /// Software producer or consumer, used by channels whose one side is the CPU.
    pub const CPU: EndpointId = EndpointId(0x3F00);

    /// UART receive socket.
    pub const UART_RX: EndpointId = EndpointId(0x0300);

    /// UART transmit socket.
    pub const UART_TX: EndpointId = EndpointId(0x0301);
}

/// USB transfer type of an endpoint.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointKind {
    Bulk,
    Interrupt,
}

/// Settings handed to [`Peripheral::configure_endpoint`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointSettings {
    pub kind: EndpointKind,
    pub packet_size: u16,
}

/// Hardware the bridge drives: USB endpoints, DMA buffer memory and the UART block.
///
/// Every method is called with the engine's lock held and must return quickly. Implementations
/// for real silicon wrap the vendor driver; tests use an in-memory mock.
pub trait Peripheral {
    /// Enables `endpoint` with the given settings.
    fn configure_endpoint(
        &mut self,
        endpoint: EndpointId,
        settings: EndpointSettings,
    ) -> Result<(), PeripheralError>;

    /// Disables `endpoint`.
    fn disable_endpoint(&mut self, endpoint: EndpointId) -> Result<(), PeripheralError>;

    /// Drops any data held in the endpoint FIFO.
    fn flush_endpoint(&mut self, endpoint: EndpointId);

    /// Whether `endpoint` can currently take part in a channel.
    fn is_configured(&self, endpoint: EndpointId) -> bool;

    /// Reserves `bytes` of buffer memory for a channel.
    fn reserve(&mut self, bytes: usize) -> Result<(), PeripheralError>;

    /// Returns memory obtained with [`reserve`](Peripheral::reserve).
    fn release(&mut self, bytes: usize);

    /// Aborts whatever transfer is in flight on `endpoint`.
    fn abort(&mut self, endpoint: EndpointId) -> Result<(), ResetError>;

    /// Programs the UART with `coding`.
    fn apply_line_coding(&mut self, coding: &LineCoding) -> Result<(), PeripheralError>;
}
