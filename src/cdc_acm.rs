use crate::error::ControlError;

/// This should be used as `device_class` when building the `UsbDevice`.
pub const USB_CLASS_CDC: u8 = 0x02;

pub const REQ_SET_LINE_CODING: u8 = 0x20;
pub const REQ_GET_LINE_CODING: u8 = 0x21;
pub const REQ_SET_CONTROL_LINE_STATE: u8 = 0x22;

/// Length of the SET_LINE_CODING / GET_LINE_CODING payload.
pub const LINE_CODING_LEN: usize = 7;

/// Interface index of the diagnostic CDC interface. Every other index addresses the primary
/// serial interface.
pub const DIAGNOSTIC_INTERFACE: u16 = 0x02;

/// The data bits byte is not interpreted; eight is always reported back.
const DATA_BITS: u8 = 8;

/// Number of stop bits for LineCoding
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// 1 stop bit
    One,

    /// 2 stop bits
    Two,

    /// A selector the UART has no encoding for (1.5 stop bits or garbage). Kept as received and
    /// handed to the peripheral unchanged.
    Unsupported(u8),
}

impl From<u8> for StopBits {
    fn from(value: u8) -> Self {
        match value {
            0 => StopBits::One,
            2 => StopBits::Two,
            other => StopBits::Unsupported(other),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(value: StopBits) -> Self {
        match value {
            StopBits::One => 0,
            StopBits::Two => 2,
            // Reported as set, not folded into `Two`.
            StopBits::Unsupported(raw) => raw,
        }
    }
}

/// Parity for LineCoding
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParityType {
    None,
    Odd,
    Even,
}

impl From<u8> for ParityType {
    /// Mark, space and unknown selectors fall back to no parity.
    fn from(value: u8) -> Self {
        match value {
            1 => ParityType::Odd,
            2 => ParityType::Even,
            _ => ParityType::None,
        }
    }
}

impl From<ParityType> for u8 {
    fn from(value: ParityType) -> Self {
        match value {
            ParityType::None => 0,
            ParityType::Odd => 1,
            ParityType::Even => 2,
        }
    }
}

/// Line coding parameters
///
/// This is provided by the host for specifying the standard UART parameters such as baud rate. The
/// bridge applies it to the UART and caches the last accepted value for GET_LINE_CODING.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineCoding {
    pub data_rate: u32,
    pub stop_bits: StopBits,
    pub parity_type: ParityType,
    pub tx_enable: bool,
    pub rx_enable: bool,
}

impl LineCoding {
    /// 115200 baud, one stop bit, no parity.
    pub const DEFAULT: LineCoding = LineCoding {
        data_rate: 115_200,
        stop_bits: StopBits::One,
        parity_type: ParityType::None,
        tx_enable: true,
        rx_enable: true,
    };

    /// Decodes a SET_LINE_CODING payload. Bytes past the seventh are ignored.
    pub fn from_wire(data: &[u8]) -> Result<LineCoding, ControlError> {
        if data.len() < LINE_CODING_LEN {
            return Err(ControlError::BadSize);
        }

        Ok(LineCoding {
            data_rate: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            stop_bits: data[4].into(),
            parity_type: data[5].into(),
            tx_enable: true,
            rx_enable: true,
        })
    }

    /// Encodes the GET_LINE_CODING response.
    pub fn to_wire(&self) -> [u8; LINE_CODING_LEN] {
        let rate = self.data_rate.to_le_bytes();

        [
            rate[0],
            rate[1],
            rate[2],
            rate[3],
            self.stop_bits.into(),
            self.parity_type.into(),
            DATA_BITS,
        ]
    }
}

impl Default for LineCoding {
    fn default() -> Self {
        LineCoding::DEFAULT
    }
}

/// DTR and RTS as last signalled by SET_CONTROL_LINE_STATE.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlLineState {
    pub dtr: bool,
    pub rts: bool,
}

impl From<u16> for ControlLineState {
    fn from(value: u16) -> Self {
        ControlLineState {
            dtr: value & 0x0001 != 0,
            rts: value & 0x0002 != 0,
        }
    }
}
