//! Wire framing.
//!
//! Requests are single text-headed lines:
//!
//! ```text
//! NONCE COMMAND LEN BODY\n
//! ```
//!
//! Replies carry a four byte nonce and a separator, a decimal length
//! terminated by a space, and exactly that many body bytes:
//!
//! ```text
//! NNNN_LEN BODY
//! ```

use std::fmt;
use std::io::{Read, Write};

use bytes::Bytes;

use crate::error::{ProtocolError, ProtocolResult};

/// Size of the nonce echoed between replies and requests.
pub const NONCE_LEN: usize = 4;

/// Longest length field accepted, including its terminating space.
pub const MAX_LENGTH_FIELD: usize = 11;

/// Most body bytes reserved up front; larger bodies grow as they arrive.
const BODY_PREALLOC: usize = 64 * 1024;

/// Commands a worker can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Fetch the job parameters.
    Params,
    /// Rewind the input path cursor.
    ResetInputs,
    /// Fetch the next input path.
    NextInput,
    /// Fetch the next batch of entries.
    Next,
    /// Emit results.
    Out,
    /// Emit a system message.
    SysMsg,
    /// Emit a diagnostic line.
    Log,
    /// Signal completion.
    Done,
    /// Liveness check.
    Ping,
}

impl Command {
    /// Wire name of the command.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Params => "params",
            Command::ResetInputs => "resetinputs",
            Command::NextInput => "nextinput",
            Command::Next => "next",
            Command::Out => "out",
            Command::SysMsg => "sysmsg",
            Command::Log => "log",
            Command::Done => "done",
            Command::Ping => "ping",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nonce of the last reply; empty until the first reply arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Nonce(Option<[u8; NONCE_LEN]>);

impl Nonce {
    /// Bytes echoed in the next request.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.0 {
            Some(n) => n,
            None => &[],
        }
    }
}

/// A reply frame as read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    /// Nonce to echo in the next request.
    pub nonce: Nonce,
    /// Raw reply body.
    pub body: Bytes,
}

/// Write one request frame and flush it.
pub fn write_request<W: Write + ?Sized>(
    writer: &mut W,
    nonce: &Nonce,
    command: Command,
    body: &[u8],
) -> ProtocolResult<()> {
    let header = format!(" {} {} ", command.as_str(), body.len());
    let mut frame = Vec::with_capacity(NONCE_LEN + header.len() + body.len() + 1);
    frame.extend_from_slice(nonce.as_bytes());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(body);
    frame.push(b'\n');

    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read one reply frame.
///
/// The body is read through a reader limited to the declared length, so a
/// large declared length costs nothing until the bytes arrive. A stream
/// that ends early is a frame error, and nothing past the body is consumed.
pub fn read_reply<R: Read + ?Sized>(reader: &mut R) -> ProtocolResult<ReplyFrame> {
    let mut header = [0u8; NONCE_LEN + 1];
    reader
        .read_exact(&mut header)
        .map_err(|e| ProtocolError::from_read(e, "reply nonce"))?;
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&header[..NONCE_LEN]);

    let len = read_length(reader)?;
    let mut body = Vec::with_capacity(len.min(BODY_PREALLOC));
    let read = (&mut *reader)
        .take(len as u64)
        .read_to_end(&mut body)
        .map_err(|e| ProtocolError::from_read(e, "reply body"))?;
    if read < len {
        return Err(ProtocolError::frame(format!(
            "stream ended inside reply body ({read} of {len} bytes)"
        )));
    }

    Ok(ReplyFrame {
        nonce: Nonce(Some(nonce)),
        body: Bytes::from(body),
    })
}

fn read_length<R: Read + ?Sized>(reader: &mut R) -> ProtocolResult<usize> {
    let mut field = Vec::with_capacity(MAX_LENGTH_FIELD);
    let mut byte = [0u8; 1];
    while field.len() < MAX_LENGTH_FIELD {
        reader
            .read_exact(&mut byte)
            .map_err(|e| ProtocolError::from_read(e, "reply length"))?;
        match byte[0] {
            b' ' if !field.is_empty() => {
                // Only ASCII digits were pushed.
                let text = String::from_utf8_lossy(&field);
                return text
                    .parse::<usize>()
                    .map_err(|_| ProtocolError::frame(format!("invalid length ({text})")));
            }
            b'0'..=b'9' => field.push(byte[0]),
            other => {
                field.push(other);
                return Err(ProtocolError::frame(format!(
                    "invalid length ({})",
                    String::from_utf8_lossy(&field)
                )));
            }
        }
    }
    Err(ProtocolError::frame(format!(
        "invalid length ({})",
        String::from_utf8_lossy(&field)
    )))
}
