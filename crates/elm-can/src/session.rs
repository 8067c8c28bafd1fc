//! ELM327 Session Controller
//!
//! Brings an adapter from an unknown state into CAN monitor mode and back to
//! its idle prompt. Every exchange goes through a single owned [`Transport`],
//! so only one command can be in flight at a time.

use crate::command::{AcceptanceValue, AtCommand};
use crate::config::SessionConfig;
use crate::error::ElmError;
use crate::filter::FilterMask;
use crate::frame::{decode_line_with, Record};
use crate::protocol::{BusProtocol, IdWidth};
use crate::transport::{LineRead, Link, Transport};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

/// Prefix every compatible adapter puts in its identification string
const IDENTIFICATION_PREFIX: &str = "ELM";

/// What the adapter reported during [`Elm327::reset`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Reply to `AT I`, surrounding whitespace trimmed
    pub identification: String,
    /// Protocol reported by `AT DPN`, if the reply was understood
    pub negotiated: Option<BusProtocol>,
    /// Whether the adapter found the protocol by autodetection
    pub automatic: bool,
}

/// Session with an ELM327-compatible adapter
pub struct Elm327<L = SerialStream> {
    transport: Transport<L>,
    /// Protocol selected with `AT SP`
    protocol: BusProtocol,
    /// Protocol the adapter settled on during reset
    negotiated: Option<BusProtocol>,
    /// Whether `AT MA` output is being read
    streaming: bool,
}

impl Elm327<SerialStream> {
    /// Open the serial device named in `config`
    pub fn open(config: &SessionConfig) -> Result<Self, ElmError> {
        info!(
            "Opening ELM327 adapter on {} at {} baud",
            config.device, config.baud_rate
        );
        let stream = tokio_serial::new(config.device.as_str(), config.baud_rate)
            .open_native_async()?;
        Ok(Self::new(stream, config.protocol))
    }
}

impl<L: Link> Elm327<L> {
    /// Wrap an already open link
    pub fn new(link: L, protocol: BusProtocol) -> Self {
        Self {
            transport: Transport::new(link),
            protocol,
            negotiated: None,
            streaming: false,
        }
    }

    /// Send a command and collect its reply up to the prompt
    async fn exchange(&mut self, command: AtCommand) -> Result<String, ElmError> {
        debug!("Sending {}", command);
        self.transport.send(&command.to_bytes()).await?;
        let reply = self.transport.receive_until_prompt().await?;
        let reply = String::from_utf8_lossy(&reply).into_owned();
        debug!("{} -> {:?}", command, reply);
        Ok(reply)
    }

    /// Get back to the idle prompt from any state.
    ///
    /// Sends something the adapter rejects and drains the reply. Also stops
    /// monitor mode, since any input interrupts it.
    pub async fn resynchronize(&mut self) -> Result<(), ElmError> {
        self.exchange(AtCommand::Resynchronize).await?;
        self.streaming = false;
        Ok(())
    }

    /// Run the initialization sequence.
    ///
    /// Only the identification reply is checked; a mismatch means the link is
    /// not talking to an ELM327 at all and is returned as
    /// [`ElmError::NotAnElm327`].
    pub async fn reset(&mut self) -> Result<AdapterInfo, ElmError> {
        info!("Resetting ELM327 adapter (protocol {})", self.protocol);
        self.resynchronize().await?;

        self.exchange(AtCommand::Reset).await?;
        self.exchange(AtCommand::Defaults).await?;
        self.exchange(AtCommand::EchoOff).await?;

        let identification = self.exchange(AtCommand::Identify).await?.trim().to_string();
        if !identification.starts_with(IDENTIFICATION_PREFIX) {
            error!("Unexpected identification string: {:?}", identification);
            return Err(ElmError::NotAnElm327(identification));
        }
        info!("Adapter identified as {}", identification);

        self.exchange(AtCommand::SelectProtocol(self.protocol)).await?;

        let init = self.exchange(AtCommand::ForceBusInit).await?;
        if init.contains("UNABLE TO CONNECT") {
            warn!("Bus initialization failed: {:?}", init.trim());
        }

        let report = self.exchange(AtCommand::DescribeProtocolNumber).await?;
        let (negotiated, automatic) = match BusProtocol::from_dpn(&report) {
            Some((protocol, automatic)) => {
                info!("Negotiated protocol {} (automatic: {})", protocol, automatic);
                (Some(protocol), automatic)
            }
            None => {
                warn!("Could not parse protocol report {:?}", report.trim());
                (None, false)
            }
        };
        self.negotiated = negotiated;

        self.exchange(AtCommand::AllowLongMessages).await?;
        self.exchange(AtCommand::HeadersOn).await?;
        self.exchange(AtCommand::AutoFormatOff).await?;
        self.exchange(AtCommand::SpacesOff).await?;
        self.exchange(AtCommand::MaxTimeout).await?;

        info!("ELM327 adapter ready");
        Ok(AdapterInfo {
            identification,
            negotiated,
            automatic,
        })
    }

    /// Enter monitor mode. The command gets no prompt; the adapter streams
    /// bus lines until interrupted.
    pub async fn start_streaming(&mut self) -> Result<(), ElmError> {
        self.resynchronize().await?;
        debug!("Sending {}", AtCommand::MonitorAll);
        self.transport.send(&AtCommand::MonitorAll.to_bytes()).await?;
        self.streaming = true;
        info!("Monitoring CAN traffic");
        Ok(())
    }

    /// Read the next record from monitor mode.
    ///
    /// Waits for a full line. Once [`Record::EndOfStream`] is returned the
    /// session is idle again and further calls fail until streaming restarts.
    pub async fn next_record(&mut self) -> Result<Record, ElmError> {
        if !self.streaming {
            return Err(ElmError::NotStreaming);
        }

        let record = match self.transport.receive_line().await? {
            LineRead::Prompt => Record::EndOfStream,
            LineRead::Line(line) => decode_line_with(&line, self.id_width()),
        };
        if record.is_end_of_stream() {
            debug!("Adapter left monitor mode");
            self.streaming = false;
        }
        Ok(record)
    }

    /// Leave monitor mode and restore the prompt
    pub async fn stop_streaming(&mut self) -> Result<(), ElmError> {
        self.resynchronize().await?;
        info!("Stopped monitoring CAN traffic");
        Ok(())
    }

    /// Send a filter/mask pair. 11-bit values are written as 3 hex digits;
    /// if either value needs 29 bits both are written as 8.
    pub async fn set_exact(&mut self, filter: u32, mask: u32) -> Result<(), ElmError> {
        let width = if filter <= IdWidth::Standard.max_id() && mask <= IdWidth::Standard.max_id() {
            IdWidth::Standard
        } else {
            IdWidth::Extended
        };
        let filter = AcceptanceValue::new(filter, width)?;
        let mask = AcceptanceValue::new(mask, width)?;

        self.resynchronize().await?;
        self.exchange(AtCommand::CanFilter(filter)).await?;
        self.exchange(AtCommand::CanMask(mask)).await?;
        info!("Acceptance filter {} mask {}", filter, mask);
        Ok(())
    }

    /// Send only the filter half of the pair
    pub async fn set_filter(&mut self, filter: u32) -> Result<(), ElmError> {
        let filter = Self::acceptance_value(filter)?;
        self.resynchronize().await?;
        self.exchange(AtCommand::CanFilter(filter)).await?;
        Ok(())
    }

    /// Send only the mask half of the pair
    pub async fn set_mask(&mut self, mask: u32) -> Result<(), ElmError> {
        let mask = Self::acceptance_value(mask)?;
        self.resynchronize().await?;
        self.exchange(AtCommand::CanMask(mask)).await?;
        Ok(())
    }

    /// Pass exactly one ID
    pub async fn set_match(&mut self, id: u32) -> Result<(), ElmError> {
        match u16::try_from(id) {
            Ok(standard) if id <= IdWidth::Standard.max_id() => {
                let plan = FilterMask::exact(standard);
                self.set_exact(u32::from(plan.filter), u32::from(plan.mask)).await
            }
            _ => self.set_exact(id, IdWidth::Extended.max_id()).await,
        }
    }

    /// Pass every 11-bit ID whose set bits lie inside `bits`
    pub async fn set_within(&mut self, bits: u16) -> Result<FilterMask, ElmError> {
        let plan = FilterMask::within(bits);
        self.set_exact(u32::from(plan.filter), u32::from(plan.mask)).await?;
        Ok(plan)
    }

    /// Plan and send a pair passing every ID in `ids` (11-bit only)
    pub async fn set_whitelist(&mut self, ids: &[u16]) -> Result<FilterMask, ElmError> {
        if let Some(&id) = ids.iter().find(|&&id| u32::from(id) > IdWidth::Standard.max_id()) {
            return Err(ElmError::InvalidId(u32::from(id)));
        }
        let plan = FilterMask::whitelist(ids);
        debug!("Whitelist {:03X?} -> {:?}", ids, plan);
        self.set_exact(u32::from(plan.filter), u32::from(plan.mask)).await?;
        Ok(plan)
    }

    fn acceptance_value(value: u32) -> Result<AcceptanceValue, ElmError> {
        if value <= IdWidth::Standard.max_id() {
            AcceptanceValue::new(value, IdWidth::Standard)
        } else {
            AcceptanceValue::new(value, IdWidth::Extended)
        }
    }

    /// Header width used to decode monitor lines
    fn id_width(&self) -> IdWidth {
        self.negotiated.unwrap_or(self.protocol).id_width()
    }

    /// Get the configured protocol
    pub fn protocol(&self) -> BusProtocol {
        self.protocol
    }

    /// Protocol the adapter reported during the last reset
    pub fn negotiated(&self) -> Option<BusProtocol> {
        self.negotiated
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn get_ref(&self) -> &L {
        self.transport.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut L {
        self.transport.get_mut()
    }

    pub fn into_inner(self) -> L {
        self.transport.into_inner()
    }
}
