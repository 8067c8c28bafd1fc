//! Byte-Level Request/Response Framing
//!
//! The adapter ends every response with a `>` prompt and separates lines with
//! carriage returns. Reads are done one byte at a time so nothing past the
//! sentinel is ever consumed.

use crate::error::ElmError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialStream};
use tracing::trace;

/// Idle prompt the adapter prints when it is ready for a command
pub const PROMPT: u8 = b'>';

/// Command and line terminator
pub const CARRIAGE_RETURN: u8 = b'\r';

/// Duplex byte channel to the adapter
pub trait Link: AsyncRead + AsyncWrite + Unpin + Send {
    /// Drop any unread input and unflushed output held by the driver
    fn discard_buffers(&mut self) -> Result<(), ElmError>;
}

impl Link for SerialStream {
    fn discard_buffers(&mut self) -> Result<(), ElmError> {
        self.clear(ClearBuffer::All)?;
        Ok(())
    }
}

/// Outcome of reading one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line, carriage return stripped
    Line(Vec<u8>),
    /// The prompt arrived before a carriage return
    Prompt,
}

/// Exclusive owner of the link
pub struct Transport<L> {
    link: L,
}

impl<L: Link> Transport<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    /// Clear stale state, then write `command` followed by a carriage return
    pub async fn send(&mut self, command: &[u8]) -> Result<(), ElmError> {
        self.link.discard_buffers()?;

        let mut buf = Vec::with_capacity(command.len() + 1);
        buf.extend_from_slice(command);
        buf.push(CARRIAGE_RETURN);

        trace!("-> {:?}", String::from_utf8_lossy(command));
        self.link.write_all(&buf).await?;
        self.link.flush().await?;
        Ok(())
    }

    /// Read everything up to the prompt. The prompt itself is consumed but
    /// not returned. Waits as long as the adapter stays silent.
    pub async fn receive_until_prompt(&mut self) -> Result<Vec<u8>, ElmError> {
        let mut output = Vec::new();
        loop {
            let byte = self.link.read_u8().await?;
            if byte == PROMPT {
                break;
            }
            output.push(byte);
        }
        trace!("<- {:?}", String::from_utf8_lossy(&output));
        Ok(output)
    }

    /// Read one carriage-return terminated line
    pub async fn receive_line(&mut self) -> Result<LineRead, ElmError> {
        let mut output = Vec::new();
        loop {
            match self.link.read_u8().await? {
                CARRIAGE_RETURN => return Ok(LineRead::Line(output)),
                PROMPT => return Ok(LineRead::Prompt),
                byte => output.push(byte),
            }
        }
    }

    pub fn get_ref(&self) -> &L {
        &self.link
    }

    pub fn get_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_inner(self) -> L {
        self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAdapter;
    use proptest::prelude::*;

    fn transport_with(bytes: &[u8]) -> Transport<MockAdapter> {
        Transport::new(MockAdapter::raw(bytes))
    }

    #[tokio::test]
    async fn test_send_appends_carriage_return() {
        let mut transport = transport_with(b"");
        transport.send(b"AT I").await.unwrap();
        assert_eq!(transport.get_ref().written(), b"AT I\r");
    }

    #[tokio::test]
    async fn test_send_discards_stale_input() {
        let mut transport = transport_with(b"stale>");
        transport.send(b"AT I").await.unwrap();
        assert!(matches!(
            transport.receive_until_prompt().await,
            Err(ElmError::LinkClosed)
        ));
    }

    #[tokio::test]
    async fn test_receive_until_prompt_leaves_trailing_bytes() {
        let mut transport = transport_with(b"OK\r\r>7E8\r");
        assert_eq!(transport.receive_until_prompt().await.unwrap(), b"OK\r\r".to_vec());
        assert_eq!(
            transport.receive_line().await.unwrap(),
            LineRead::Line(b"7E8".to_vec())
        );
    }

    #[tokio::test]
    async fn test_receive_line_reports_early_prompt() {
        let mut transport = transport_with(b"7E80641>\r");
        assert_eq!(transport.receive_line().await.unwrap(), LineRead::Prompt);
    }

    #[tokio::test]
    async fn test_receive_line_empty_line() {
        let mut transport = transport_with(b"\r4DA\r");
        assert_eq!(transport.receive_line().await.unwrap(), LineRead::Line(Vec::new()));
        assert_eq!(
            transport.receive_line().await.unwrap(),
            LineRead::Line(b"4DA".to_vec())
        );
    }

    #[tokio::test]
    async fn test_closed_link_is_an_error() {
        let mut transport = transport_with(b"NO PROMPT");
        assert!(matches!(
            transport.receive_until_prompt().await,
            Err(ElmError::LinkClosed)
        ));
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #[test]
        fn prop_receive_until_prompt_returns_prefix(
            body in proptest::collection::vec(any::<u8>().prop_filter("no prompt", |b| *b != PROMPT), 0..256)
        ) {
            let mut input = body.clone();
            input.push(PROMPT);
            let received = block_on(transport_with(&input).receive_until_prompt()).unwrap();
            prop_assert_eq!(received, body);
        }

        #[test]
        fn prop_prompt_before_carriage_return_ends_line(
            head in proptest::collection::vec(
                any::<u8>().prop_filter("no terminators", |b| *b != PROMPT && *b != CARRIAGE_RETURN),
                0..64,
            ),
            tail in proptest::collection::vec(any::<u8>(), 0..64)
        ) {
            let mut input = head;
            input.push(PROMPT);
            input.extend(tail);
            let line = block_on(transport_with(&input).receive_line()).unwrap();
            prop_assert_eq!(line, LineRead::Prompt);
        }
    }
}
