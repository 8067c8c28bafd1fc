//! AT Command Vocabulary
//!
//! The adapter's command set is closed, so commands are modelled as an enum
//! and rendered in one place.

use crate::error::ElmError;
use crate::protocol::{BusProtocol, IdWidth};
use std::fmt;

/// Commands understood by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtCommand {
    /// `AT Z`: hardware reset
    Reset,
    /// `AT D`: restore factory defaults
    Defaults,
    /// `AT E0`: disable command echo
    EchoOff,
    /// `AT I`: identification string
    Identify,
    /// `AT SP <code>`: select the bus protocol
    SelectProtocol(BusProtocol),
    /// `0100`: supported-PIDs query, forces the bus to initialize
    ForceBusInit,
    /// `AT DPN`: describe the negotiated protocol by number
    DescribeProtocolNumber,
    /// `AT AL`: allow messages longer than 7 bytes
    AllowLongMessages,
    /// `AT H1`: print header bytes
    HeadersOn,
    /// `AT CAF0`: disable CAN auto-formatting
    AutoFormatOff,
    /// `AT S0`: no spaces between bytes
    SpacesOff,
    /// `AT STFF`: response timeout at its maximum
    MaxTimeout,
    /// `AT MA`: monitor all bus traffic
    MonitorAll,
    /// `AT CF <hex>`: acceptance filter
    CanFilter(AcceptanceValue),
    /// `AT CM <hex>`: acceptance mask
    CanMask(AcceptanceValue),
    /// Text the adapter rejects with `?`, used to get back to the prompt
    Resynchronize,
}

/// A filter or mask value together with the width it is written at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptanceValue {
    value: u32,
    width: IdWidth,
}

impl AcceptanceValue {
    /// Build a value, rejecting anything that does not fit `width`
    pub fn new(value: u32, width: IdWidth) -> Result<Self, ElmError> {
        if value > width.max_id() {
            return Err(ElmError::InvalidId(value));
        }
        Ok(Self { value, width })
    }

    /// An 11-bit value; upper bits are dropped
    pub fn standard(value: u16) -> Self {
        Self {
            value: u32::from(value) & IdWidth::Standard.max_id(),
            width: IdWidth::Standard,
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn width(&self) -> IdWidth {
        self.width
    }
}

impl fmt::Display for AcceptanceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.width {
            IdWidth::Standard => write!(f, "{:03X}", self.value),
            IdWidth::Extended => write!(f, "{:08X}", self.value),
        }
    }
}

impl AtCommand {
    /// Bytes to put on the wire, without the carriage return
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtCommand::Reset => f.write_str("AT Z"),
            AtCommand::Defaults => f.write_str("AT D"),
            AtCommand::EchoOff => f.write_str("AT E0"),
            AtCommand::Identify => f.write_str("AT I"),
            AtCommand::SelectProtocol(protocol) => write!(f, "AT SP {}", protocol.code()),
            AtCommand::ForceBusInit => f.write_str("0100"),
            AtCommand::DescribeProtocolNumber => f.write_str("AT DPN"),
            AtCommand::AllowLongMessages => f.write_str("AT AL"),
            AtCommand::HeadersOn => f.write_str("AT H1"),
            AtCommand::AutoFormatOff => f.write_str("AT CAF0"),
            AtCommand::SpacesOff => f.write_str("AT S0"),
            AtCommand::MaxTimeout => f.write_str("AT STFF"),
            AtCommand::MonitorAll => f.write_str("AT MA"),
            AtCommand::CanFilter(value) => write!(f, "AT CF {}", value),
            AtCommand::CanMask(value) => write!(f, "AT CM {}", value),
            AtCommand::Resynchronize => f.write_str("RESYNC PROMPT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_rendering() {
        assert_eq!(AtCommand::Reset.to_string(), "AT Z");
        assert_eq!(AtCommand::MaxTimeout.to_string(), "AT STFF");
        assert_eq!(
            AtCommand::SelectProtocol(BusProtocol::J1939).to_bytes(),
            b"AT SP A".to_vec()
        );
        assert_eq!(AtCommand::ForceBusInit.to_bytes(), b"0100".to_vec());
    }

    #[test]
    fn test_filter_values_are_zero_padded() {
        let filter = AtCommand::CanFilter(AcceptanceValue::standard(0x4DA));
        let mask = AtCommand::CanMask(AcceptanceValue::standard(0x7));
        assert_eq!(filter.to_string(), "AT CF 4DA");
        assert_eq!(mask.to_string(), "AT CM 007");

        let extended = AcceptanceValue::new(0x18DA_F110, IdWidth::Extended).unwrap();
        assert_eq!(AtCommand::CanFilter(extended).to_string(), "AT CF 18DAF110");
    }

    #[test]
    fn test_acceptance_value_range() {
        assert!(AcceptanceValue::new(0x800, IdWidth::Standard).is_err());
        assert!(AcceptanceValue::new(0x2000_0000, IdWidth::Extended).is_err());
        assert_eq!(AcceptanceValue::standard(0xFFFF).value(), 0x7FF);
    }

    #[test]
    fn test_resync_is_not_an_at_command() {
        let text = AtCommand::Resynchronize.to_string();
        assert!(!text.starts_with("AT"));
        assert!(!text.contains('>'));
    }
}
