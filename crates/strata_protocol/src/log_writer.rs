//! Diagnostic output routed through the channel.
//!
//! The protocol stream belongs to the channel, so formatted log lines are
//! sent to the host as `log` commands. When the channel is in the middle of
//! a request (including when the request itself logs), the line goes to
//! stderr instead.

use std::io::{self, Write};

use tracing_subscriber::fmt::MakeWriter;

use crate::channel::SharedChannel;

/// [`MakeWriter`] forwarding each formatted event to the host.
#[derive(Clone)]
pub struct ChannelLog {
    channel: SharedChannel,
}

impl ChannelLog {
    /// Forward through `channel`.
    pub fn new(channel: SharedChannel) -> Self {
        Self { channel }
    }
}

impl<'a> MakeWriter<'a> for ChannelLog {
    type Writer = LogLine<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine {
            channel: &self.channel,
            buf: Vec::new(),
        }
    }
}

/// Buffer for one formatted event, forwarded when dropped.
pub struct LogLine<'a> {
    channel: &'a SharedChannel,
    buf: Vec<u8>,
}

impl Write for LogLine<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogLine<'_> {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
        if lines.peek().is_none() {
            return;
        }

        let mut stderr = io::stderr().lock();
        match self.channel.try_lock() {
            Some(mut channel) => {
                for line in lines {
                    if let Err(e) = channel.log(line) {
                        let _ = writeln!(stderr, "{line} [log forwarding failed: {e}]");
                    }
                }
            }
            None => {
                for line in lines {
                    let _ = writeln!(stderr, "{line}");
                }
            }
        }
    }
}
