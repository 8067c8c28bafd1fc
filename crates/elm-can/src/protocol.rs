//! Vehicle Bus Protocol Selector
//!
//! The ELM327 addresses its protocols by a single character (`AT SP <code>`).

use crate::error::ElmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vehicle bus protocols supported by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BusProtocol {
    /// Automatic protocol detection (everything except User1 and User2)
    #[default]
    Auto,
    /// SAE J1850 PWM (41.6 kbaud)
    J1850Pwm,
    /// SAE J1850 VPW (10.4 kbaud)
    J1850Vpw,
    /// ISO 9141-2 (5 baud init)
    Iso9141_2,
    /// ISO 14230-4 KWP (5 baud init)
    Iso14230_4Kwp,
    /// ISO 14230-4 KWP (fast init)
    Iso14230_4KwpFast,
    /// ISO 15765-4 CAN (11 bit ID, 500 kbaud)
    Iso15765_4Can11bit500,
    /// ISO 15765-4 CAN (29 bit ID, 500 kbaud)
    Iso15765_4Can29bit500,
    /// ISO 15765-4 CAN (11 bit ID, 250 kbaud)
    Iso15765_4Can11bit250,
    /// ISO 15765-4 CAN (29 bit ID, 250 kbaud)
    Iso15765_4Can29bit250,
    /// SAE J1939 CAN (29 bit ID, 250 kbaud)
    J1939,
    /// User1 CAN (11 bit ID, 125 kbaud by default)
    User1Can,
    /// User2 CAN (11 bit ID, 50 kbaud by default)
    User2Can,
}

/// Width of the arbitration ID printed in the adapter's header bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdWidth {
    /// 11-bit IDs, 3 hex digits
    #[default]
    Standard,
    /// 29-bit IDs, 8 hex digits
    Extended,
}

impl IdWidth {
    /// Number of hex digits the adapter uses for this width
    pub fn hex_digits(&self) -> usize {
        match self {
            IdWidth::Standard => 3,
            IdWidth::Extended => 8,
        }
    }

    /// Largest arbitration ID representable at this width
    pub fn max_id(&self) -> u32 {
        match self {
            IdWidth::Standard => 0x7FF,
            IdWidth::Extended => 0x1FFF_FFFF,
        }
    }
}

impl BusProtocol {
    const ALL: [BusProtocol; 13] = [
        BusProtocol::Auto,
        BusProtocol::J1850Pwm,
        BusProtocol::J1850Vpw,
        BusProtocol::Iso9141_2,
        BusProtocol::Iso14230_4Kwp,
        BusProtocol::Iso14230_4KwpFast,
        BusProtocol::Iso15765_4Can11bit500,
        BusProtocol::Iso15765_4Can29bit500,
        BusProtocol::Iso15765_4Can11bit250,
        BusProtocol::Iso15765_4Can29bit250,
        BusProtocol::J1939,
        BusProtocol::User1Can,
        BusProtocol::User2Can,
    ];

    /// Every protocol, in adapter table order
    pub fn all() -> &'static [BusProtocol] {
        &Self::ALL
    }

    /// The single-character code used by `AT SP`
    pub fn code(&self) -> char {
        match self {
            BusProtocol::Auto => '0',
            BusProtocol::J1850Pwm => '1',
            BusProtocol::J1850Vpw => '2',
            BusProtocol::Iso9141_2 => '3',
            BusProtocol::Iso14230_4Kwp => '4',
            BusProtocol::Iso14230_4KwpFast => '5',
            BusProtocol::Iso15765_4Can11bit500 => '6',
            BusProtocol::Iso15765_4Can29bit500 => '7',
            BusProtocol::Iso15765_4Can11bit250 => '8',
            BusProtocol::Iso15765_4Can29bit250 => '9',
            BusProtocol::J1939 => 'A',
            BusProtocol::User1Can => 'B',
            BusProtocol::User2Can => 'C',
        }
    }

    /// Look up a protocol by its code (case-insensitive)
    pub fn from_code(code: char) -> Option<Self> {
        let code = code.to_ascii_uppercase();
        Self::ALL.iter().copied().find(|p| p.code() == code)
    }

    /// Human-readable name as printed in the adapter datasheet
    pub fn description(&self) -> &'static str {
        match self {
            BusProtocol::Auto => "Autodetect",
            BusProtocol::J1850Pwm => "SAE J1850 PWM (41.6 kbaud)",
            BusProtocol::J1850Vpw => "SAE J1850 VPW (10.4 kbaud)",
            BusProtocol::Iso9141_2 => "ISO 9141-2 (5 baud init)",
            BusProtocol::Iso14230_4Kwp => "ISO 14230-4 KWP (5 baud init)",
            BusProtocol::Iso14230_4KwpFast => "ISO 14230-4 KWP (fast init)",
            BusProtocol::Iso15765_4Can11bit500 => "ISO 15765-4 CAN (11 bit ID, 500 kbaud)",
            BusProtocol::Iso15765_4Can29bit500 => "ISO 15765-4 CAN (29 bit ID, 500 kbaud)",
            BusProtocol::Iso15765_4Can11bit250 => "ISO 15765-4 CAN (11 bit ID, 250 kbaud)",
            BusProtocol::Iso15765_4Can29bit250 => "ISO 15765-4 CAN (29 bit ID, 250 kbaud)",
            BusProtocol::J1939 => "SAE J1939 CAN (29 bit ID, 250 kbaud)",
            BusProtocol::User1Can => "User1 CAN (11 bit ID, 125 kbaud)",
            BusProtocol::User2Can => "User2 CAN (11 bit ID, 50 kbaud)",
        }
    }

    /// Check if this is a CAN protocol
    pub fn is_can(&self) -> bool {
        matches!(
            self,
            BusProtocol::Iso15765_4Can11bit500
                | BusProtocol::Iso15765_4Can29bit500
                | BusProtocol::Iso15765_4Can11bit250
                | BusProtocol::Iso15765_4Can29bit250
                | BusProtocol::J1939
                | BusProtocol::User1Can
                | BusProtocol::User2Can
        )
    }

    /// Header width the adapter prints while monitoring this protocol
    pub fn id_width(&self) -> IdWidth {
        match self {
            BusProtocol::Iso15765_4Can29bit500
            | BusProtocol::Iso15765_4Can29bit250
            | BusProtocol::J1939 => IdWidth::Extended,
            _ => IdWidth::Standard,
        }
    }

    /// Parse the reply to `AT DPN`.
    ///
    /// The adapter answers with the protocol code, prefixed by `A` when the
    /// protocol was found by autodetection (`"A6"`). A lone `"A"` is J1939.
    /// Returns the protocol and whether it was chosen automatically.
    pub fn from_dpn(reply: &str) -> Option<(Self, bool)> {
        let reply = reply.trim();
        let mut chars = reply.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(code), None, None) => Self::from_code(code).map(|p| (p, false)),
            (Some('A'), Some(code), None) => Self::from_code(code).map(|p| (p, true)),
            _ => None,
        }
    }
}

impl fmt::Display for BusProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

impl FromStr for BusProtocol {
    type Err = ElmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => {
                Self::from_code(code).ok_or_else(|| ElmError::UnsupportedProtocol(s.to_string()))
            }
            _ => Err(ElmError::UnsupportedProtocol(s.to_string())),
        }
    }
}

impl TryFrom<String> for BusProtocol {
    type Error = ElmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BusProtocol> for String {
    fn from(protocol: BusProtocol) -> Self {
        protocol.code().to_string()
    }
}
