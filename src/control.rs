//! CDC class control requests
//!
//! Host-side serial drivers issue these requests while opening the port,
//! so every handler must accept all nine standard codes. [`NoopControl`]
//! accepts them and does nothing; [`LineStateControl`] also remembers the
//! line coding and modem control lines.

use core::fmt;

/// Standard CDC class request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CdcRequest {
    /// Issue a protocol command on the communication interface
    SendEncapsulatedCommand,
    /// Fetch the response to an encapsulated command
    GetEncapsulatedResponse,
    /// Set a communication feature
    SetCommFeature,
    /// Read a communication feature
    GetCommFeature,
    /// Reset a communication feature to default
    ClearCommFeature,
    /// Set baud rate, stop bits, parity and data bits
    SetLineCoding,
    /// Read the current line coding
    GetLineCoding,
    /// Set DTR/RTS
    SetControlLineState,
    /// Send a break of `value` milliseconds
    SendBreak,
}

impl CdcRequest {
    /// All requests, in code order
    pub const ALL: [Self; 9] = [
        Self::SendEncapsulatedCommand,
        Self::GetEncapsulatedResponse,
        Self::SetCommFeature,
        Self::GetCommFeature,
        Self::ClearCommFeature,
        Self::SetLineCoding,
        Self::GetLineCoding,
        Self::SetControlLineState,
        Self::SendBreak,
    ];

    /// Decode a `bRequest` value
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::SendEncapsulatedCommand),
            0x01 => Some(Self::GetEncapsulatedResponse),
            0x02 => Some(Self::SetCommFeature),
            0x03 => Some(Self::GetCommFeature),
            0x04 => Some(Self::ClearCommFeature),
            0x20 => Some(Self::SetLineCoding),
            0x21 => Some(Self::GetLineCoding),
            0x22 => Some(Self::SetControlLineState),
            0x23 => Some(Self::SendBreak),
            _ => None,
        }
    }

    /// `bRequest` value
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::SendEncapsulatedCommand => 0x00,
            Self::GetEncapsulatedResponse => 0x01,
            Self::SetCommFeature => 0x02,
            Self::GetCommFeature => 0x03,
            Self::ClearCommFeature => 0x04,
            Self::SetLineCoding => 0x20,
            Self::GetLineCoding => 0x21,
            Self::SetControlLineState => 0x22,
            Self::SendBreak => 0x23,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CdcRequest {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "CDC req 0x{:02X}", self.code());
    }
}

impl fmt::Display for CdcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CDC req 0x{:02X}", self.code())
    }
}

/// Rejection from a control handler; the stack stalls the request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlError {
    /// Request understood but refused
    Rejected,
    /// Data stage shorter than the request needs
    ShortPayload,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => f.write_str("request rejected"),
            Self::ShortPayload => f.write_str("payload too short"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ControlError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Rejected => defmt::write!(f, "Rejected"),
            Self::ShortPayload => defmt::write!(f, "ShortPayload"),
        }
    }
}

/// Strategy for CDC class requests
pub trait ControlHandler {
    /// Handle one request
    ///
    /// `value` is the setup packet's `wValue`; `data` is the data stage
    /// (host-to-device payload, or the buffer to fill for IN requests).
    fn control(&mut self, request: CdcRequest, value: u16, data: &mut [u8])
        -> Result<(), ControlError>;
}

/// Accept every request without effect
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopControl;

impl ControlHandler for NoopControl {
    fn control(
        &mut self,
        _request: CdcRequest,
        _value: u16,
        _data: &mut [u8],
    ) -> Result<(), ControlError> {
        Ok(())
    }
}

/// Line coding (baud rate, etc.)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineCoding {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8, 16)
    pub data_bits: u8,
    /// Stop bits (1, 1.5, 2)
    pub stop_bits: StopBits,
    /// Parity
    pub parity: Parity,
}

impl LineCoding {
    /// Encoded length on the wire
    pub const LEN: usize = 7;

    /// 115200 baud, 8 data bits, no parity, one stop bit
    pub const DEFAULT: Self = Self {
        baud_rate: 115_200,
        data_bits: 8,
        stop_bits: StopBits::One,
        parity: Parity::None,
    };

    /// Decode the 7-byte `SET_LINE_CODING` payload
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: &[u8; Self::LEN] = bytes.get(..Self::LEN)?.try_into().ok()?;
        let data_bits = raw[6];
        if !matches!(data_bits, 5..=8 | 16) {
            return None;
        }
        Some(Self {
            baud_rate: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            stop_bits: StopBits::from_code(raw[4])?,
            parity: Parity::from_code(raw[5])?,
            data_bits,
        })
    }

    /// Encode as the 7-byte `GET_LINE_CODING` response
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; Self::LEN] {
        let baud = self.baud_rate.to_le_bytes();
        [
            baud[0],
            baud[1],
            baud[2],
            baud[3],
            self.stop_bits.code(),
            self.parity.code(),
            self.data_bits,
        ]
    }
}

impl Default for LineCoding {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Stop bits configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopBits {
    /// One stop bit
    #[default]
    One,
    /// One and a half stop bits
    OnePointFive,
    /// Two stop bits
    Two,
}

impl StopBits {
    const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::One),
            1 => Some(Self::OnePointFive),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    const fn code(self) -> u8 {
        match self {
            Self::One => 0,
            Self::OnePointFive => 1,
            Self::Two => 2,
        }
    }
}

/// Parity configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
    /// Mark parity
    Mark,
    /// Space parity
    Space,
}

impl Parity {
    const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Odd),
            2 => Some(Self::Even),
            3 => Some(Self::Mark),
            4 => Some(Self::Space),
            _ => None,
        }
    }

    const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Odd => 1,
            Self::Even => 2,
            Self::Mark => 3,
            Self::Space => 4,
        }
    }
}

/// DTR/RTS control signals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlSignals {
    /// Data Terminal Ready
    pub dtr: bool,
    /// Request To Send
    pub rts: bool,
}

impl ControlSignals {
    /// Decode `SET_CONTROL_LINE_STATE` `wValue`
    #[must_use]
    pub const fn from_value(value: u16) -> Self {
        Self {
            dtr: value & 0x0001 != 0,
            rts: value & 0x0002 != 0,
        }
    }

    /// Check if host is connected (DTR set)
    #[must_use]
    pub const fn connected(&self) -> bool {
        self.dtr
    }
}

/// Accept every request and keep line coding and control lines
#[derive(Clone, Copy, Debug)]
pub struct LineStateControl {
    coding: LineCoding,
    signals: ControlSignals,
    breaks: u32,
}

impl LineStateControl {
    /// Create with 115200 8N1 and both lines low
    #[must_use]
    pub const fn new() -> Self {
        Self {
            coding: LineCoding::DEFAULT,
            signals: ControlSignals {
                dtr: false,
                rts: false,
            },
            breaks: 0,
        }
    }

    /// Last line coding set by the host
    #[must_use]
    pub const fn line_coding(&self) -> LineCoding {
        self.coding
    }

    /// Last DTR/RTS state set by the host
    #[must_use]
    pub const fn signals(&self) -> ControlSignals {
        self.signals
    }

    /// Number of `SEND_BREAK` requests seen
    #[must_use]
    pub const fn breaks(&self) -> u32 {
        self.breaks
    }
}

impl Default for LineStateControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlHandler for LineStateControl {
    fn control(
        &mut self,
        request: CdcRequest,
        value: u16,
        data: &mut [u8],
    ) -> Result<(), ControlError> {
        match request {
            CdcRequest::SetLineCoding => match LineCoding::from_bytes(data) {
                Some(coding) => {
                    debug!("line coding {} baud", coding.baud_rate);
                    self.coding = coding;
                }
                None => debug!("ignoring malformed line coding ({} bytes)", data.len()),
            },
            CdcRequest::GetLineCoding => {
                let encoded = self.coding.to_bytes();
                let n = data.len().min(LineCoding::LEN);
                data[..n].copy_from_slice(&encoded[..n]);
            }
            CdcRequest::SetControlLineState => {
                self.signals = ControlSignals::from_value(value);
                debug!("DTR={} RTS={}", self.signals.dtr, self.signals.rts);
            }
            CdcRequest::SendBreak => self.breaks = self.breaks.wrapping_add(1),
            CdcRequest::SendEncapsulatedCommand
            | CdcRequest::GetEncapsulatedResponse
            | CdcRequest::SetCommFeature
            | CdcRequest::GetCommFeature
            | CdcRequest::ClearCommFeature => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for request in CdcRequest::ALL {
            assert_eq!(CdcRequest::from_code(request.code()), Some(request));
        }
        assert_eq!(CdcRequest::from_code(0x42), None);
    }

    #[test]
    fn line_coding_rejects_bad_parity() {
        let mut bytes = LineCoding::default().to_bytes();
        bytes[5] = 9;
        assert!(LineCoding::from_bytes(&bytes).is_none());
    }

    #[test]
    fn control_signals_from_value() {
        let s = ControlSignals::from_value(0x0003);
        assert!(s.dtr && s.rts);
        assert!(s.connected());
        assert!(!ControlSignals::from_value(0x0002).connected());
    }
}
