#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use usbd_uart_bridge::{
    BridgeConfig, BridgeEngine, EndpointId, EndpointSettings, LineCoding, Peripheral,
    PeripheralError, ResetError, TransportEvent,
};

pub type TestBridge = BridgeEngine<NoopRawMutex, MockPeripheral>;

// ---------------------------------------------------------------------------
// Mock peripheral
// ---------------------------------------------------------------------------

/// In-memory stand-in for the USB controller, DMA memory and UART block.
pub struct MockPeripheral {
    pub enabled: HashSet<EndpointId>,
    pub settings: Vec<(EndpointId, EndpointSettings)>,
    pub flushed: Vec<EndpointId>,
    /// `configure_endpoint` fails for this endpoint.
    pub fail_endpoint: Option<EndpointId>,
    pub memory: usize,
    pub reserved: usize,
    /// Results returned by successive `abort` calls; `Ok` once empty.
    pub abort_results: VecDeque<Result<(), ResetError>>,
    pub reject_coding: bool,
    pub applied: Vec<LineCoding>,
}

impl MockPeripheral {
    pub fn new() -> Self {
        MockPeripheral {
            enabled: HashSet::new(),
            settings: Vec::new(),
            flushed: Vec::new(),
            fail_endpoint: None,
            memory: 64 * 1024,
            reserved: 0,
            abort_results: VecDeque::new(),
            reject_coding: false,
            applied: Vec::new(),
        }
    }
}

impl Peripheral for MockPeripheral {
    fn configure_endpoint(
        &mut self,
        endpoint: EndpointId,
        settings: EndpointSettings,
    ) -> Result<(), PeripheralError> {
        if self.fail_endpoint == Some(endpoint) {
            return Err(PeripheralError::Failure);
        }
        self.enabled.insert(endpoint);
        self.settings.push((endpoint, settings));
        Ok(())
    }

    fn disable_endpoint(&mut self, endpoint: EndpointId) -> Result<(), PeripheralError> {
        self.enabled.remove(&endpoint);
        Ok(())
    }

    fn flush_endpoint(&mut self, endpoint: EndpointId) {
        self.flushed.push(endpoint);
    }

    fn is_configured(&self, endpoint: EndpointId) -> bool {
        // Sockets of the UART block and the CPU always exist.
        endpoint == EndpointId::CPU
            || endpoint == EndpointId::UART_RX
            || endpoint == EndpointId::UART_TX
            || self.enabled.contains(&endpoint)
    }

    fn reserve(&mut self, bytes: usize) -> Result<(), PeripheralError> {
        if self.reserved + bytes > self.memory {
            return Err(PeripheralError::NoResources);
        }
        self.reserved += bytes;
        Ok(())
    }

    fn release(&mut self, bytes: usize) {
        self.reserved -= bytes;
    }

    fn abort(&mut self, _endpoint: EndpointId) -> Result<(), ResetError> {
        self.abort_results.pop_front().unwrap_or(Ok(()))
    }

    fn apply_line_coding(&mut self, coding: &LineCoding) -> Result<(), PeripheralError> {
        if self.reject_coding {
            return Err(PeripheralError::Rejected);
        }
        self.applied.push(*coding);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock UART
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartFault;

/// Serial port fed from `rx` and writing into `tx`, with `tx_room` bytes of transmit FIFO left.
pub struct MockUart {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub tx_room: usize,
    pub fail_rx: bool,
}

impl MockUart {
    pub fn new() -> Self {
        MockUart {
            rx: VecDeque::new(),
            tx: Vec::new(),
            tx_room: usize::MAX,
            fail_rx: false,
        }
    }

    pub fn receive(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }
}

impl embedded_hal::serial::Read<u8> for MockUart {
    type Error = UartFault;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        if self.fail_rx {
            return Err(nb::Error::Other(UartFault));
        }
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

impl embedded_hal::serial::Write<u8> for MockUart {
    type Error = UartFault;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        if self.tx_room == 0 {
            return Err(nb::Error::WouldBlock);
        }
        self.tx_room -= 1;
        self.tx.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn bridge() -> TestBridge {
    bridge_with(BridgeConfig::default(), MockPeripheral::new())
}

pub fn bridge_with(config: BridgeConfig, hw: MockPeripheral) -> TestBridge {
    match BridgeEngine::new(config, hw) {
        Ok(bridge) => bridge,
        Err(e) => panic!("bridge setup failed: {}", e),
    }
}

pub fn active_bridge() -> TestBridge {
    let bridge = bridge();
    bridge.transport_event(TransportEvent::Configured).unwrap();
    bridge
}

/// Reads every bulk IN packet the host would currently get.
pub fn drain_usb(bridge: &TestBridge) -> Vec<u8> {
    let mut out = Vec::new();
    let mut packet = [0u8; 1024];
    while let Ok(n) = bridge.usb_transmit(&mut packet) {
        out.extend_from_slice(&packet[..n]);
    }
    out
}

/// Reads every pending diagnostic packet, one entry per packet.
pub fn drain_diagnostic(bridge: &TestBridge) -> Vec<String> {
    let mut lines = Vec::new();
    let mut packet = [0u8; 1024];
    while let Ok(n) = bridge.diagnostic_transmit(&mut packet) {
        lines.push(String::from_utf8_lossy(&packet[..n]).into_owned());
    }
    lines
}
