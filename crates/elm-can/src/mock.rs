//! In-Memory Adapter
//!
//! A [`Link`] that behaves like an ELM327 closely enough to drive a full
//! session without hardware: echo, prompts, identification, protocol report,
//! acceptance filter commands and monitor mode. When it has nothing left to
//! send, reads report end-of-file instead of waiting.

use crate::error::ElmError;
use crate::transport::{Link, CARRIAGE_RETURN, PROMPT};
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

const DEFAULT_IDENTIFICATION: &str = "ELM327 v1.5";
const DEFAULT_PROTOCOL_REPORT: &str = "A6";
const DEFAULT_BUS_INIT_REPLY: &str = "SEARCHING...\r7E8064100BE3FA813";

/// Simulated adapter for tests and demos
#[derive(Debug)]
pub struct MockAdapter {
    /// Bytes waiting to be read by the host
    pending: VecDeque<u8>,
    /// Every byte the host wrote
    written: Vec<u8>,
    /// Command text received since the last carriage return
    command: Vec<u8>,
    /// Commands seen, as written
    commands: Vec<String>,
    /// False for a scripted link that never answers
    emulate: bool,
    echo: bool,
    monitoring: bool,
    /// Discarding input after monitor mode was interrupted
    swallowing: bool,
    identification: String,
    protocol_report: String,
    bus_init_reply: String,
    bus_traffic: Vec<String>,
    prompt_after_traffic: bool,
    protocol: Option<char>,
    filter: Option<String>,
    mask: Option<String>,
    discards: usize,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    /// An emulated ELM327 v1.5 that negotiates 11-bit 500 kbaud CAN
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            written: Vec::new(),
            command: Vec::new(),
            commands: Vec::new(),
            emulate: true,
            echo: true,
            monitoring: false,
            swallowing: false,
            identification: DEFAULT_IDENTIFICATION.to_string(),
            protocol_report: DEFAULT_PROTOCOL_REPORT.to_string(),
            bus_init_reply: DEFAULT_BUS_INIT_REPLY.to_string(),
            bus_traffic: Vec::new(),
            prompt_after_traffic: false,
            protocol: None,
            filter: None,
            mask: None,
            discards: 0,
        }
    }

    /// A link that only plays back `bytes` and records writes
    pub fn raw(bytes: &[u8]) -> Self {
        Self {
            pending: bytes.iter().copied().collect(),
            emulate: false,
            ..Self::new()
        }
    }

    /// Reply to `AT I` (and the banner after `AT Z`)
    pub fn with_identification(mut self, identification: impl Into<String>) -> Self {
        self.identification = identification.into();
        self
    }

    /// Reply to `AT DPN`
    pub fn with_protocol_report(mut self, report: impl Into<String>) -> Self {
        self.protocol_report = report.into();
        self
    }

    /// Reply to `0100`
    pub fn with_bus_init_reply(mut self, reply: impl Into<String>) -> Self {
        self.bus_init_reply = reply.into();
        self
    }

    /// Lines printed after `AT MA`
    pub fn with_bus_traffic<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bus_traffic = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Return to the prompt once the bus traffic is exhausted
    pub fn ending_with_prompt(mut self) -> Self {
        self.prompt_after_traffic = true;
        self
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Commands received, in order
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Protocol code selected with `AT SP`
    pub fn protocol(&self) -> Option<char> {
        self.protocol
    }

    /// Last value sent with `AT CF`
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Last value sent with `AT CM`
    pub fn mask(&self) -> Option<&str> {
        self.mask.as_deref()
    }

    /// How many times the host cleared the link buffers
    pub fn discards(&self) -> usize {
        self.discards
    }

    fn queue(&mut self, text: &str) {
        self.pending.extend(text.as_bytes());
    }

    fn reply(&mut self, text: &str) {
        self.queue(text);
        self.queue("\r\r");
        self.pending.push_back(PROMPT);
    }

    fn receive(&mut self, bytes: &[u8]) {
        self.written.extend_from_slice(bytes);
        if !self.emulate {
            return;
        }

        for &byte in bytes {
            if self.monitoring {
                self.monitoring = false;
                self.swallowing = true;
                self.pending.clear();
                self.reply("STOPPED");
            }
            if self.swallowing {
                if byte == CARRIAGE_RETURN {
                    self.swallowing = false;
                }
                continue;
            }
            if byte == CARRIAGE_RETURN {
                let command = std::mem::take(&mut self.command);
                self.execute(&String::from_utf8_lossy(&command));
            } else {
                self.command.push(byte);
            }
        }
    }

    fn execute(&mut self, raw: &str) {
        self.commands.push(raw.to_string());
        if self.echo {
            self.queue(raw);
            self.queue("\r");
        }

        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "ATZ" => {
                self.echo = true;
                let banner = format!("\r\r{}", self.identification);
                self.reply(&banner);
            }
            "ATD" => {
                self.echo = true;
                self.reply("OK");
            }
            "ATE0" => {
                self.echo = false;
                self.reply("OK");
            }
            "ATI" => {
                let identification = self.identification.clone();
                self.reply(&identification);
            }
            "0100" => {
                let reply = self.bus_init_reply.clone();
                self.reply(&reply);
            }
            "ATDPN" => {
                let report = self.protocol_report.clone();
                self.reply(&report);
            }
            "ATAL" | "ATH1" | "ATCAF0" | "ATS0" | "ATSTFF" => self.reply("OK"),
            "ATMA" => self.start_monitoring(),
            other => {
                if let Some(code) = other.strip_prefix("ATSP") {
                    self.select_protocol(code);
                } else if let Some(value) = other.strip_prefix("ATCF") {
                    self.filter = Self::acceptance_value(value);
                    self.ack(self.filter.is_some());
                } else if let Some(value) = other.strip_prefix("ATCM") {
                    self.mask = Self::acceptance_value(value);
                    self.ack(self.mask.is_some());
                } else {
                    self.reply("?");
                }
            }
        }
    }

    fn select_protocol(&mut self, code: &str) {
        let mut chars = code.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_digit() || ('A'..='C').contains(&c) => {
                self.protocol = Some(c);
                self.reply("OK");
            }
            _ => self.reply("?"),
        }
    }

    fn acceptance_value(value: &str) -> Option<String> {
        let valid = matches!(value.len(), 3 | 8) && value.chars().all(|c| c.is_ascii_hexdigit());
        valid.then(|| value.to_string())
    }

    fn ack(&mut self, ok: bool) {
        self.reply(if ok { "OK" } else { "?" });
    }

    fn start_monitoring(&mut self) {
        self.monitoring = true;
        let traffic = std::mem::take(&mut self.bus_traffic);
        for line in &traffic {
            self.queue(line);
            self.pending.push_back(CARRIAGE_RETURN);
        }
        if self.prompt_after_traffic {
            self.monitoring = false;
            self.pending.push_back(PROMPT);
        }
    }
}

impl Link for MockAdapter {
    fn discard_buffers(&mut self) -> Result<(), ElmError> {
        self.pending.clear();
        self.discards += 1;
        Ok(())
    }
}

impl AsyncRead for MockAdapter {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let n = buf.remaining().min(this.pending.len());
        let chunk: Vec<u8> = this.pending.drain(..n).collect();
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockAdapter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().receive(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn exchange(adapter: &mut MockAdapter, command: &str) -> String {
        adapter.write_all(command.as_bytes()).await.unwrap();
        adapter.write_all(b"\r").await.unwrap();
        let mut out = Vec::new();
        adapter.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_echo_until_disabled() {
        let mut adapter = MockAdapter::new();
        assert_eq!(exchange(&mut adapter, "AT E0").await, "AT E0\rOK\r\r>");
        assert_eq!(exchange(&mut adapter, "AT I").await, "ELM327 v1.5\r\r>");
    }

    #[tokio::test]
    async fn test_unknown_command_is_rejected() {
        let mut adapter = MockAdapter::new();
        exchange(&mut adapter, "AT E0").await;
        assert_eq!(exchange(&mut adapter, "hello").await, "?\r\r>");
        assert_eq!(exchange(&mut adapter, "AT SP Z").await, "?\r\r>");
    }

    #[tokio::test]
    async fn test_monitor_stops_on_input() {
        let mut adapter = MockAdapter::new().with_bus_traffic(["4DA 01", "201 02"]);
        exchange(&mut adapter, "AT E0").await;
        adapter.write_all(b"AT MA\r").await.unwrap();
        assert!(adapter.is_monitoring());
        assert_eq!(exchange(&mut adapter, "x").await, "STOPPED\r\r>");
        assert!(!adapter.is_monitoring());
    }

    #[tokio::test]
    async fn test_filter_commands_are_recorded() {
        let mut adapter = MockAdapter::new();
        exchange(&mut adapter, "AT E0").await;
        assert_eq!(exchange(&mut adapter, "AT CF 4DA").await, "OK\r\r>");
        assert_eq!(exchange(&mut adapter, "AT CM 7FE").await, "OK\r\r>");
        assert_eq!(adapter.filter(), Some("4DA"));
        assert_eq!(adapter.mask(), Some("7FE"));
    }
}
