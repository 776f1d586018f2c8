use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Ticker;
use portable_atomic::{AtomicBool, Ordering};
use usb_device::control::Request;

use crate::cdc_acm::{ControlLineState, LineCoding};
use crate::channel::{
    Channel, ChannelConfig, ChannelEvent, ChannelMode, Notifications, TransferSize,
};
use crate::config::{BridgeConfig, MAX_BUFFER_COUNT, MAX_PACKET_SIZE, MAX_UART_BUFFER_SIZE};
use crate::control::{
    ControlPlane, ControlRequest, ControlResponse, ControlTarget, DiagnosticControl,
};
use crate::diag::{LineWriter, Notice};
use crate::error::{ChannelError, ControlError, DiagnosticError, FatalError};
use crate::flow::{ActivityCounter, FlowPolicy, FlowTick};
use crate::peripheral::{EndpointId, EndpointKind, EndpointSettings, Peripheral};
use crate::recovery::ErrorRecovery;

/// Longest status line the bridge itself writes to the diagnostic interface.
const NOTICE_LEN: usize = 128;

type UsbToUartChannel = Channel<MAX_PACKET_SIZE, MAX_BUFFER_COUNT>;
type UartToUsbChannel = Channel<MAX_UART_BUFFER_SIZE, MAX_BUFFER_COUNT>;
type DiagnosticChannel = Channel<MAX_PACKET_SIZE, MAX_BUFFER_COUNT>;

/// The three channels of an active bridge.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelId {
    /// Host to UART, auto forwarded.
    UsbToUart,
    /// UART to host, manually committed.
    UartToUsb,
    /// CPU to host on the diagnostic interface.
    Diagnostic,
}

/// Bus events reported by the USB stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportEvent {
    /// The host selected a configuration.
    Configured,
    Reset,
    Connected,
    Disconnected,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeState {
    Inactive,
    Active,
}

struct Channels {
    usb_to_uart: UsbToUartChannel,
    uart_to_usb: UartToUsbChannel,
    diagnostic: DiagnosticChannel,
}

impl Channels {
    fn destroy<P: Peripheral>(self, hw: &mut P) {
        self.usb_to_uart.destroy(hw);
        self.uart_to_usb.destroy(hw);
        self.diagnostic.destroy(hw);
    }
}

struct Inner<P> {
    hw: P,
    channels: Option<Channels>,
    recovery: ErrorRecovery,
    policy: FlowPolicy,
}

/// USB to UART bridge.
///
/// One engine owns the hardware, the three channels and the serial line configuration. It is
/// shared by reference between the USB stack callbacks, the DMA/UART interrupt glue and the
/// periodic flush task ([`run_flow_policy`](BridgeEngine::run_flow_policy)). `M` selects the
/// lock: `CriticalSectionRawMutex` when any caller runs in interrupt context.
///
/// Data only moves while the bridge is active, that is between a
/// [`TransportEvent::Configured`] and the next reset or disconnect.
pub struct BridgeEngine<M: RawMutex, P: Peripheral> {
    config: BridgeConfig,
    inner: Mutex<M, RefCell<Inner<P>>>,
    active: AtomicBool,
    activity: ActivityCounter,
    control: ControlPlane<M>,
}

impl<M: RawMutex, P: Peripheral> BridgeEngine<M, P> {
    /// Creates an inactive bridge and programs the UART with the default line coding.
    pub fn new(config: BridgeConfig, mut hw: P) -> Result<Self, FatalError> {
        if !config.validate() {
            return Err(FatalError::InvalidConfig);
        }

        let control = ControlPlane::new();
        control
            .apply(LineCoding::DEFAULT, &mut hw)
            .map_err(FatalError::LineCoding)?;

        Ok(BridgeEngine {
            config,
            inner: Mutex::new(RefCell::new(Inner {
                hw,
                channels: None,
                recovery: ErrorRecovery::new(),
                policy: FlowPolicy::new(config.flush_period, config.heartbeat_ticks),
            })),
            active: AtomicBool::new(false),
            activity: ActivityCounter::new(),
            control,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> BridgeState {
        if self.is_active() {
            BridgeState::Active
        } else {
            BridgeState::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// The line coding currently programmed into the UART.
    pub fn line_coding(&self) -> LineCoding {
        self.control.line_coding()
    }

    pub fn line_state(&self) -> ControlLineState {
        self.control.line_state()
    }

    pub fn dtr(&self) -> bool {
        self.line_state().dtr
    }

    pub fn rts(&self) -> bool {
        self.line_state().rts
    }

    /// UART to USB buffers produced since the last flow policy tick.
    pub fn pending_packets(&self) -> u32 {
        self.activity.peek()
    }

    /// Runs `f` with exclusive access to the hardware.
    pub fn with_peripheral<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        self.inner.lock(|inner| f(&mut inner.borrow_mut().hw))
    }

    /// Drives the bridge lifecycle.
    ///
    /// `Configured` tears down a running bridge and builds a fresh one. Every other event tears
    /// it down. If bring-up fails, nothing created so far is left behind and the bridge stays
    /// inactive.
    pub fn transport_event(&self, event: TransportEvent) -> Result<(), FatalError> {
        debug!("transport event: {}", event);

        self.stop();

        match event {
            TransportEvent::Configured => self.start(),
            TransportEvent::Reset | TransportEvent::Connected | TransportEvent::Disconnected => {
                Ok(())
            }
        }
    }

    fn start(&self) -> Result<(), FatalError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let inner = &mut *inner;

            enable_endpoints(&self.config, &mut inner.hw)?;

            match create_channels(&self.config, &mut inner.hw) {
                Ok(channels) => inner.channels = Some(channels),
                Err(e) => {
                    disable_endpoints(&self.config, &mut inner.hw);
                    return Err(e);
                }
            }

            inner.recovery = ErrorRecovery::new();
            inner.policy.restart();
            self.activity.take();
            self.active.store(true, Ordering::Release);

            info!("bridge active, packet size {}", self.config.packet_size);
            Ok(())
        })
    }

    fn stop(&self) {
        self.active.store(false, Ordering::Release);

        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let inner = &mut *inner;

            if let Some(channels) = inner.channels.take() {
                channels.destroy(&mut inner.hw);
                disable_endpoints(&self.config, &mut inner.hw);
                info!("bridge stopped");
            }
        })
    }

    /// Handles a class or interface request from the USB stack. `data` is the payload of the
    /// data stage for OUT requests.
    pub fn control_request(
        &self,
        req: &Request,
        data: &[u8],
    ) -> Result<ControlResponse, ControlError> {
        let (target, request) = ControlRequest::parse(req)?;

        if !self.is_active() {
            return Err(ControlError::Stall);
        }

        match (target, request) {
            (_, ControlRequest::FunctionSuspend) => Ok(ControlResponse::Accepted),
            (ControlTarget::Diagnostic, request) => DiagnosticControl.handle(request),
            (ControlTarget::Serial, ControlRequest::SetLineCoding) => self
                .inner
                .lock(|inner| {
                    self.control
                        .set_line_coding(data, &mut inner.borrow_mut().hw)
                })
                .map(|_| ControlResponse::Accepted),
            (ControlTarget::Serial, ControlRequest::GetLineCoding) => {
                Ok(ControlResponse::Data(self.control.get_line_coding()))
            }
            (ControlTarget::Serial, ControlRequest::SetControlLineState(value)) => self
                .control
                .set_control_line_state(self.is_active(), value)
                .map(|_| ControlResponse::Accepted),
        }
    }

    /// UART receive path. Returns the number of bytes taken; fewer than `data.len()` when every
    /// buffer is waiting for the host.
    pub fn uart_received(&self, data: &[u8]) -> Result<usize, ChannelError> {
        self.with_active(|inner, channels| {
            let written = channels.uart_to_usb.write(data)?;
            self.dispatch_uart_events(inner, channels);
            Ok(written)
        })
    }

    /// One bulk OUT packet from the host. Returns the bytes kept, or
    /// [`ChannelError::WouldBlock`] when the UART is not keeping up and the host must be NAKed.
    pub fn usb_received(&self, packet: &[u8]) -> Result<usize, ChannelError> {
        self.with_active(|_, channels| channels.usb_to_uart.write_packet(packet))
    }

    /// Fills the next bulk IN packet for the host.
    pub fn usb_transmit(&self, out: &mut [u8]) -> Result<usize, ChannelError> {
        self.with_active(|inner, channels| {
            let count = channels.uart_to_usb.read_packet(out)?;
            self.dispatch_uart_events(inner, channels);
            Ok(count)
        })
    }

    /// Hands up to `max_count` bytes from the host to `f`, which returns how many it sent to the
    /// UART. Returns `Ok(0)` when nothing is queued or the bridge is inactive.
    pub fn uart_transmit<E>(
        &self,
        max_count: usize,
        f: impl FnOnce(&[u8]) -> Result<usize, E>,
    ) -> Result<usize, E> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            match inner.channels.as_mut() {
                Some(channels) => channels.usb_to_uart.read(max_count, f),
                None => Ok(0),
            }
        })
    }

    /// Fills the next bulk IN packet of the diagnostic interface.
    pub fn diagnostic_transmit(&self, out: &mut [u8]) -> Result<usize, ChannelError> {
        self.with_active(|_, channels| channels.diagnostic.read_packet(out))
    }

    /// Delivers a notification raised by the transfer hardware.
    ///
    /// The UART to USB channel is the only one with a listener; events for the other channels
    /// are logged and dropped.
    pub fn notify(&self, channel: ChannelId, event: ChannelEvent) {
        if channel != ChannelId::UartToUsb {
            trace!("unhandled {} event on {}", event, channel);
            return;
        }

        let _ = self.with_active(|inner, channels| {
            self.handle_uart_event(inner, channels, event);
            Ok(())
        });
    }

    /// Queues `msg` on the diagnostic interface as one packet, cut to the buffer size.
    pub fn diagnostic_print(&self, msg: &[u8]) -> Result<usize, DiagnosticError> {
        if !self.is_active() {
            return Err(DiagnosticError::NotStarted);
        }
        if msg.is_empty() {
            return Ok(0);
        }

        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let channels = inner
                .channels
                .as_mut()
                .ok_or(DiagnosticError::NotStarted)?;

            match channels.diagnostic.write_packet(msg) {
                Ok(count) => Ok(count),
                Err(ChannelError::WouldBlock) => Err(DiagnosticError::Busy),
                Err(_) => Err(DiagnosticError::NotStarted),
            }
        })
    }

    /// Formats `args` and queues the text like [`diagnostic_print`](Self::diagnostic_print).
    pub fn diagnostic_print_fmt(
        &self,
        args: fmt::Arguments<'_>,
    ) -> Result<usize, DiagnosticError> {
        if !self.is_active() {
            return Err(DiagnosticError::NotStarted);
        }

        let line = LineWriter::<MAX_PACKET_SIZE>::format(args);
        self.diagnostic_print(line.as_bytes())
    }

    /// One run of the flush policy: forwards a partially filled UART buffer if nothing was
    /// produced since the previous tick, and writes the heartbeat when it is due.
    pub fn flow_tick(&self) -> FlowTick {
        if !self.is_active() {
            return FlowTick::Inactive;
        }

        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let inner = &mut *inner;
            let channels = match inner.channels.as_mut() {
                Some(channels) => channels,
                None => return FlowTick::Inactive,
            };

            let produced = self.activity.take();
            let tick = inner.policy.tick(produced, &mut channels.uart_to_usb);
            let parts = Parts {
                hw: &mut inner.hw,
                recovery: &mut inner.recovery,
            };
            self.dispatch_uart_events(parts, channels);

            if let FlowTick::Failed(e) = tick {
                warn!("flush failed: {}", e);
            }

            if let Some(uptime_ms) = inner.policy.heartbeat_due() {
                post(&mut channels.diagnostic, Notice::Heartbeat { uptime_ms });
            }

            tick
        })
    }

    /// Periodic flush task. Never returns; spawn it once next to the USB task.
    pub async fn run_flow_policy(&self) -> ! {
        let mut ticker = Ticker::every(self.config.flush_period);

        loop {
            ticker.next().await;
            let tick = self.flow_tick();
            trace!("flow tick: {}", tick);
        }
    }

    fn with_active<R>(
        &self,
        f: impl FnOnce(Parts<'_, P>, &mut Channels) -> Result<R, ChannelError>,
    ) -> Result<R, ChannelError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let inner = &mut *inner;

            match inner.channels.as_mut() {
                Some(channels) => {
                    let parts = Parts {
                        hw: &mut inner.hw,
                        recovery: &mut inner.recovery,
                    };
                    f(parts, channels)
                }
                None => Err(ChannelError::NotRunning),
            }
        })
    }

    fn dispatch_uart_events(&self, mut parts: Parts<'_, P>, channels: &mut Channels) {
        while let Some(event) = channels.uart_to_usb.poll_event() {
            self.handle_uart_event(parts.reborrow(), channels, event);
        }
    }

    /// Listener of the UART to USB channel.
    fn handle_uart_event(
        &self,
        parts: Parts<'_, P>,
        channels: &mut Channels,
        event: ChannelEvent,
    ) {
        let notice = match event {
            ChannelEvent::Produced { count, wrap_up } => {
                if let Err(e) = channels.uart_to_usb.commit(count) {
                    warn!("commit of {} bytes failed: {}", count, e);
                }
                // Forced flushes are not UART activity.
                if !wrap_up {
                    self.activity.record();
                }
                return;
            }
            ChannelEvent::Consumed { count } => Notice::Consumed { count },
            ChannelEvent::Error => {
                warn!("uart to usb transfer error");
                Notice::Fault(parts.recovery.recover(&mut channels.uart_to_usb, parts.hw))
            }
            ChannelEvent::ProducerSuspended => Notice::ProducerSuspended,
            ChannelEvent::ConsumerSuspended => Notice::ConsumerSuspended,
            ChannelEvent::Aborted => Notice::Aborted,
        };

        post(&mut channels.diagnostic, notice);
    }
}

/// Mutable pieces of the engine state a channel listener needs besides the channels.
struct Parts<'a, P> {
    hw: &'a mut P,
    recovery: &'a mut ErrorRecovery,
}

impl<P> Parts<'_, P> {
    fn reborrow(&mut self) -> Parts<'_, P> {
        Parts {
            hw: &mut *self.hw,
            recovery: &mut *self.recovery,
        }
    }
}

/// Writes a status line to the diagnostic interface. Dropped when the host is not reading.
fn post(diagnostic: &mut DiagnosticChannel, notice: Notice) {
    let line = LineWriter::<NOTICE_LEN>::format(format_args!("{}", notice));

    if diagnostic.write_packet(line.as_bytes()).is_err() {
        trace!("diagnostic line dropped");
    }
}

fn endpoint_table(config: &BridgeConfig) -> [(EndpointId, EndpointSettings); 6] {
    let ep = &config.endpoints;
    let bulk = EndpointSettings {
        kind: EndpointKind::Bulk,
        packet_size: config.packet_size as u16,
    };
    let interrupt = |size: usize| EndpointSettings {
        kind: EndpointKind::Interrupt,
        packet_size: size as u16,
    };

    [
        (ep.usb_out, bulk),
        (ep.usb_in, bulk),
        (ep.notify, interrupt(config.notify_packet_size)),
        (ep.diag_notify, interrupt(config.diag_notify_packet_size)),
        (ep.diag_in, bulk),
        (ep.diag_out, bulk),
    ]
}

fn enable_endpoints<P: Peripheral>(config: &BridgeConfig, hw: &mut P) -> Result<(), FatalError> {
    let table = endpoint_table(config);

    for (i, &(endpoint, settings)) in table.iter().enumerate() {
        if let Err(e) = hw.configure_endpoint(endpoint, settings) {
            error!("enabling endpoint {} failed: {}", endpoint, e);

            for &(enabled, _) in table[..i].iter().rev() {
                let _ = hw.disable_endpoint(enabled);
            }
            return Err(FatalError::Endpoint(e));
        }
    }

    Ok(())
}

fn disable_endpoints<P: Peripheral>(config: &BridgeConfig, hw: &mut P) {
    for (endpoint, _) in endpoint_table(config) {
        hw.flush_endpoint(endpoint);
        if let Err(e) = hw.disable_endpoint(endpoint) {
            warn!("disabling endpoint {} failed: {}", endpoint, e);
        }
    }
}

fn create_channels<P: Peripheral>(
    config: &BridgeConfig,
    hw: &mut P,
) -> Result<Channels, FatalError> {
    let ep = &config.endpoints;

    let mut usb_to_uart = UsbToUartChannel::create(
        ChannelConfig {
            mode: ChannelMode::Auto,
            buffer_size: config.packet_size,
            buffer_count: config.buffer_count,
            producer: ep.usb_out,
            consumer: ep.uart_tx,
            notifications: Notifications::empty(),
        },
        hw,
    )
    .map_err(FatalError::ChannelCreate)?;

    let mut uart_to_usb = match UartToUsbChannel::create(
        ChannelConfig {
            mode: ChannelMode::Manual,
            buffer_size: config.uart_buffer_size,
            buffer_count: config.buffer_count,
            producer: ep.uart_rx,
            consumer: ep.usb_in,
            notifications: Notifications::PRODUCED,
        },
        hw,
    ) {
        Ok(channel) => channel,
        Err(e) => {
            usb_to_uart.destroy(hw);
            return Err(FatalError::ChannelCreate(e));
        }
    };

    let mut diagnostic = match DiagnosticChannel::create(
        ChannelConfig {
            mode: ChannelMode::ManualOut,
            buffer_size: config.packet_size,
            buffer_count: config.diag_buffer_count,
            producer: EndpointId::CPU,
            consumer: ep.diag_in,
            notifications: Notifications::empty(),
        },
        hw,
    ) {
        Ok(channel) => channel,
        Err(e) => {
            usb_to_uart.destroy(hw);
            uart_to_usb.destroy(hw);
            return Err(FatalError::ChannelCreate(e));
        }
    };

    let started = usb_to_uart
        .start_transfer(TransferSize::Unbounded)
        .and_then(|_| uart_to_usb.start_transfer(TransferSize::Unbounded))
        .and_then(|_| diagnostic.start_transfer(TransferSize::Unbounded));

    let channels = Channels {
        usb_to_uart,
        uart_to_usb,
        diagnostic,
    };

    match started {
        Ok(()) => Ok(channels),
        Err(e) => {
            channels.destroy(hw);
            Err(FatalError::ChannelStart(e))
        }
    }
}
