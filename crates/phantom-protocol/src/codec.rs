//! Tokio codec for CRLF-framed control lines.
//!
//! [`ControlCodec`] splits the control byte stream into lines at the real CRLF
//! terminator and writes commands or response text back with the terminator
//! appended. The escaped `\r\n` separator inside multi-line responses is plain
//! text to the codec and survives framing untouched.
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use phantom_protocol::{Command, ControlCodec, parse_response};
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//!
//! # async fn example() -> phantom_core::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:7115").await?;
//! let mut framed = Framed::new(stream, ControlCodec::new());
//!
//! framed.send(Command::get("info.name")).await?;
//! if let Some(line) = framed.next().await {
//!     println!("{:?}", parse_response(&line?)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Limits
//!
//! A peer that never sends the terminator makes the decoder wait for more
//! input indefinitely; callers bound the wait with a timeout. Unterminated
//! input longer than the maximum line length is rejected with
//! `Error::LineTooLong` so a misbehaving peer cannot grow the buffer without
//! bound.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::Command;
use phantom_core::{Error, Result, constants::LINE_TERMINATOR};

/// Default maximum line length in bytes (64 KB).
///
/// `get` replies for list-valued attributes are the longest lines the camera
/// sends and stay well below this.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

const TERMINATOR: &[u8] = LINE_TERMINATOR.as_bytes();

/// CRLF line codec for the control connection.
#[derive(Debug, Clone)]
pub struct ControlCodec {
    max_line_length: usize,

    /// Offset up to which the buffer has already been searched for a
    /// terminator.
    next_index: usize,
}

impl ControlCodec {
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    fn write_line(&self, line: &str, dst: &mut BytesMut) -> Result<()> {
        if line.len() > self.max_line_length {
            return Err(Error::LineTooLong {
                size: line.len(),
                max_size: self.max_line_length,
            });
        }
        dst.reserve(line.len() + TERMINATOR.len());
        dst.put_slice(line.as_bytes());
        dst.put_slice(TERMINATOR);
        Ok(())
    }
}

impl Default for ControlCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ControlCodec {
    type Item = String;
    type Error = Error;

    /// Extract the next line, without its terminator.
    ///
    /// # Errors
    /// - `Error::LineTooLong` if no terminator appears within the limit
    /// - `Error::InvalidEncoding` if the line is not valid UTF-8
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        // Back up one byte in case the previous read ended between CR and LF.
        let search_from = self.next_index.saturating_sub(TERMINATOR.len() - 1);

        let found = src[search_from..]
            .windows(TERMINATOR.len())
            .position(|w| w == TERMINATOR)
            .map(|offset| search_from + offset);

        match found {
            Some(end) => {
                self.next_index = 0;
                let frame = src.split_to(end + TERMINATOR.len());
                let line = std::str::from_utf8(&frame[..end]).map_err(|_| Error::InvalidEncoding)?;
                Ok(Some(line.to_string()))
            }
            None if src.len() > self.max_line_length => Err(Error::LineTooLong {
                size: src.len(),
                max_size: self.max_line_length,
            }),
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }
}

impl Encoder<Command> for ControlCodec {
    type Error = Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<()> {
        self.write_line(&item.to_string(), dst)
    }
}

impl Encoder<&Command> for ControlCodec {
    type Error = Error;

    fn encode(&mut self, item: &Command, dst: &mut BytesMut) -> Result<()> {
        self.write_line(&item.to_string(), dst)
    }
}

impl Encoder<String> for ControlCodec {
    type Error = Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.write_line(&item, dst)
    }
}

impl Encoder<&str> for ControlCodec {
    type Error = Error;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<()> {
        self.write_line(item, dst)
    }
}
