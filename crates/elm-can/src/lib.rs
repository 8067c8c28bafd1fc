//! ELM327 CAN Monitoring
//!
//! This crate drives ELM327-compatible OBD-II adapters over a serial link:
//! framing of the adapter's prompt-terminated replies, the initialization
//! sequence that puts the adapter into CAN monitor mode, decoding of
//! monitored lines, and planning of 11-bit acceptance filters.

mod command;
mod config;
mod error;
mod filter;
mod frame;
pub mod mock;
mod protocol;
mod session;
mod transport;

pub use command::{AcceptanceValue, AtCommand};
pub use config::SessionConfig;
pub use error::ElmError;
pub use filter::{compute_whitelist, FilterMask, STANDARD_ID_MASK};
pub use frame::{
    decode_line, decode_line_with, CanFrame, RawLine, Record, MAX_PAYLOAD, UNRECOGNIZED_ID,
};
pub use mock::MockAdapter;
pub use protocol::{BusProtocol, IdWidth};
pub use session::{AdapterInfo, Elm327};
pub use transport::{LineRead, Link, Transport, CARRIAGE_RETURN, PROMPT};
