//! Session configuration

use crate::protocol::BusProtocol;
use serde::{Deserialize, Serialize};

/// Where the adapter lives and which bus protocol to select
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Serial device path (e.g., "/dev/ttyUSB0" or "COM3")
    pub device: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Protocol passed to `AT SP`
    pub protocol: BusProtocol,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 500_000,
            protocol: BusProtocol::Auto,
        }
    }
}
