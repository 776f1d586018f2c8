use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use usb_device::control::{Recipient, Request, RequestType};

use crate::cdc_acm::*;
use crate::error::{ControlError, PeripheralError};
use crate::peripheral::Peripheral;

/// Successful answer to a control request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlResponse {
    /// Acknowledge the status stage.
    Accepted,
    /// Send these bytes in the data stage.
    Data([u8; LINE_CODING_LEN]),
}

/// Interface a control request is addressed to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlTarget {
    Serial,
    Diagnostic,
}

/// Control requests the bridge understands.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlRequest {
    SetLineCoding,
    GetLineCoding,
    SetControlLineState(u16),
    /// Standard SET_FEATURE / CLEAR_FEATURE(FUNCTION_SUSPEND) addressed to an interface.
    FunctionSuspend,
}

impl ControlRequest {
    /// Decodes a setup packet. Requests that are neither CDC class requests nor function suspend
    /// requests are left to the USB stack.
    pub fn parse(req: &Request) -> Result<(ControlTarget, ControlRequest), ControlError> {
        if req.recipient != Recipient::Interface {
            return Err(ControlError::Unsupported);
        }

        let target = if req.index == DIAGNOSTIC_INTERFACE {
            ControlTarget::Diagnostic
        } else {
            ControlTarget::Serial
        };

        let request = match (req.request_type, req.request) {
            (RequestType::Standard, Request::SET_FEATURE | Request::CLEAR_FEATURE)
                if req.value == 0 =>
            {
                ControlRequest::FunctionSuspend
            }
            (RequestType::Class, REQ_SET_LINE_CODING) => ControlRequest::SetLineCoding,
            (RequestType::Class, REQ_GET_LINE_CODING) => ControlRequest::GetLineCoding,
            (RequestType::Class, REQ_SET_CONTROL_LINE_STATE) => {
                ControlRequest::SetControlLineState(req.value)
            }
            _ => return Err(ControlError::Unsupported),
        };

        Ok((target, request))
    }
}

/// Owner of the authoritative line coding of the serial interface.
///
/// The cached value only changes after the UART accepted the new settings, and it is replaced as
/// a whole, so readers never see a half-applied configuration.
pub struct ControlPlane<M: RawMutex> {
    line_coding: Mutex<M, Cell<LineCoding>>,
    line_state: Mutex<M, Cell<ControlLineState>>,
}

impl<M: RawMutex> ControlPlane<M> {
    pub const fn new() -> Self {
        ControlPlane {
            line_coding: Mutex::new(Cell::new(LineCoding::DEFAULT)),
            line_state: Mutex::new(Cell::new(ControlLineState {
                dtr: false,
                rts: false,
            })),
        }
    }

    /// Gets the current line coding.
    pub fn line_coding(&self) -> LineCoding {
        self.line_coding.lock(|c| c.get())
    }

    /// Gets the last DTR/RTS state signalled by the host.
    pub fn line_state(&self) -> ControlLineState {
        self.line_state.lock(|c| c.get())
    }

    /// Programs `coding` into the UART and caches it on success. Used at startup, where a failure
    /// is fatal.
    pub fn apply<P: Peripheral>(
        &self,
        coding: LineCoding,
        hw: &mut P,
    ) -> Result<(), PeripheralError> {
        hw.apply_line_coding(&coding)?;

        self.line_coding.lock(|c| c.set(coding));
        Ok(())
    }

    /// SET_LINE_CODING. On failure the previous coding stays in effect.
    pub fn set_line_coding<P: Peripheral>(
        &self,
        data: &[u8],
        hw: &mut P,
    ) -> Result<LineCoding, ControlError> {
        let coding = LineCoding::from_wire(data)?;

        if let Err(e) = self.apply(coding, hw) {
            error!("uart rejected line coding: {}", e);
            return Err(ControlError::Apply(e));
        }

        info!(
            "line coding: {} baud, stop {}, parity {}",
            coding.data_rate,
            coding.stop_bits,
            coding.parity_type
        );
        Ok(coding)
    }

    /// GET_LINE_CODING.
    pub fn get_line_coding(&self) -> [u8; LINE_CODING_LEN] {
        self.line_coding().to_wire()
    }

    /// SET_CONTROL_LINE_STATE. Only acknowledged while the bridge is active.
    pub fn set_control_line_state(&self, active: bool, value: u16) -> Result<(), ControlError> {
        if !active {
            return Err(ControlError::Stall);
        }

        self.line_state.lock(|c| c.set(ControlLineState::from(value)));
        Ok(())
    }
}

impl<M: RawMutex> Default for ControlPlane<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Control handler of the diagnostic interface.
///
/// The interface enumerates as a serial port but has no line behind it: codings are read and
/// dropped, and reads always report 115200 8N1.
pub struct DiagnosticControl;

impl DiagnosticControl {
    pub const LINE_CODING: [u8; LINE_CODING_LEN] = [0x00, 0xC2, 0x01, 0x00, 0x00, 0x00, 0x08];

    pub fn handle(&self, request: ControlRequest) -> Result<ControlResponse, ControlError> {
        match request {
            ControlRequest::SetLineCoding
            | ControlRequest::SetControlLineState(_)
            | ControlRequest::FunctionSuspend => Ok(ControlResponse::Accepted),
            ControlRequest::GetLineCoding => Ok(ControlResponse::Data(Self::LINE_CODING)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::mock::MockPeripheral;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use usb_device::UsbDirection;

    fn class(request: u8, value: u16, index: u16) -> Request {
        Request {
            direction: UsbDirection::Out,
            request_type: RequestType::Class,
            recipient: Recipient::Interface,
            request,
            value,
            index,
            length: 0,
        }
    }

    #[test]
    fn set_then_get() {
        let cp = ControlPlane::<NoopRawMutex>::new();
        let mut hw = MockPeripheral::new();
        let wire = [0x80, 0x25, 0x00, 0x00, 0x02, 0x01, 0x08];

        let coding = cp.set_line_coding(&wire, &mut hw).unwrap();

        assert_eq!(coding.data_rate, 9600);
        assert_eq!(coding.stop_bits, StopBits::Two);
        assert_eq!(coding.parity_type, ParityType::Odd);
        assert_eq!(hw.applied, [coding]);
        assert_eq!(cp.get_line_coding(), wire);
    }

    #[test]
    fn starts_at_default() {
        let cp = ControlPlane::<NoopRawMutex>::new();

        assert_eq!(cp.get_line_coding(), [0x00, 0xC2, 0x01, 0x00, 0x00, 0x00, 0x08]);
    }

    #[test]
    fn short_payload_leaves_coding_alone() {
        let cp = ControlPlane::<NoopRawMutex>::new();
        let mut hw = MockPeripheral::new();

        assert_eq!(
            cp.set_line_coding(&[0x80, 0x25, 0x00], &mut hw),
            Err(ControlError::BadSize)
        );
        assert!(hw.applied.is_empty());
        assert_eq!(cp.line_coding(), LineCoding::DEFAULT);
    }

    #[test]
    fn rejected_apply_keeps_previous_coding() {
        let cp = ControlPlane::<NoopRawMutex>::new();
        let mut hw = MockPeripheral::new();
        hw.reject_coding = true;

        let err = cp
            .set_line_coding(&[0x80, 0x25, 0x00, 0x00, 0x00, 0x00, 0x08], &mut hw)
            .unwrap_err();

        assert_eq!(err, ControlError::Apply(PeripheralError::Rejected));
        assert!(err.is_fatal());
        assert_eq!(cp.line_coding(), LineCoding::DEFAULT);
    }

    #[test]
    fn control_line_state_requires_active_bridge() {
        let cp = ControlPlane::<NoopRawMutex>::new();

        assert_eq!(cp.set_control_line_state(false, 0x0003), Err(ControlError::Stall));
        assert_eq!(cp.line_state(), ControlLineState::default());

        cp.set_control_line_state(true, 0x0001).unwrap();
        assert_eq!(
            cp.line_state(),
            ControlLineState {
                dtr: true,
                rts: false
            }
        );
    }

    #[test]
    fn diagnostic_interface_is_fixed() {
        let diag = DiagnosticControl;

        assert_eq!(
            diag.handle(ControlRequest::SetLineCoding),
            Ok(ControlResponse::Accepted)
        );
        assert_eq!(
            diag.handle(ControlRequest::GetLineCoding),
            Ok(ControlResponse::Data([0x00, 0xC2, 0x01, 0x00, 0x00, 0x00, 0x08]))
        );
        assert_eq!(
            diag.handle(ControlRequest::SetControlLineState(1)),
            Ok(ControlResponse::Accepted)
        );
    }

    #[test]
    fn parse_routes_by_interface() {
        assert_eq!(
            ControlRequest::parse(&class(REQ_GET_LINE_CODING, 0, 0)),
            Ok((ControlTarget::Serial, ControlRequest::GetLineCoding))
        );
        assert_eq!(
            ControlRequest::parse(&class(REQ_SET_LINE_CODING, 0, DIAGNOSTIC_INTERFACE)),
            Ok((ControlTarget::Diagnostic, ControlRequest::SetLineCoding))
        );
        assert_eq!(
            ControlRequest::parse(&class(REQ_SET_CONTROL_LINE_STATE, 3, 0)),
            Ok((ControlTarget::Serial, ControlRequest::SetControlLineState(3)))
        );
    }

    #[test]
    fn parse_rejects_unknown_requests() {
        assert_eq!(
            ControlRequest::parse(&class(0x23, 0, 0)),
            Err(ControlError::Unsupported)
        );

        let mut vendor = class(REQ_SET_LINE_CODING, 0, 0);
        vendor.request_type = RequestType::Vendor;
        assert_eq!(ControlRequest::parse(&vendor), Err(ControlError::Unsupported));

        let mut device = class(REQ_SET_LINE_CODING, 0, 0);
        device.recipient = Recipient::Device;
        assert_eq!(ControlRequest::parse(&device), Err(ControlError::Unsupported));
    }

    #[test]
    fn parse_function_suspend() {
        let mut req = class(Request::SET_FEATURE, 0, 0);
        req.request_type = RequestType::Standard;

        assert_eq!(
            ControlRequest::parse(&req),
            Ok((ControlTarget::Serial, ControlRequest::FunctionSuspend))
        );

        req.value = 1;
        assert_eq!(ControlRequest::parse(&req), Err(ControlError::Unsupported));
    }
}
