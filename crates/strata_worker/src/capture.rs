//! Standard output captured into `log` commands.
//!
//! Frames are written to a duplicate of the original stdout descriptor.
//! Descriptor 1 itself is pointed at a pipe, and every line read from the
//! pipe is sent to the host with `log`, so text printed by a strategy never
//! lands inside a frame.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::thread::{self, JoinHandle};

use nix::libc::STDOUT_FILENO;
use nix::unistd::{dup2, pipe};
use strata_protocol::SharedChannel;

/// Descriptor 1 redirected into a pipe until [`finish`](Self::finish).
pub(crate) struct StdoutCapture {
    original: OwnedFd,
    pipe: Option<File>,
    forwarder: Option<JoinHandle<()>>,
    restored: bool,
}

impl StdoutCapture {
    /// Redirect descriptor 1 and return the writer for protocol frames.
    ///
    /// Lines printed before [`forward`](Self::forward) is called wait in
    /// the pipe.
    pub(crate) fn begin() -> io::Result<(File, Self)> {
        let original = io::stdout().as_fd().try_clone_to_owned()?;
        let frames = File::from(original.try_clone()?);
        let (read, write) = pipe()?;
        io::stdout().flush()?;
        dup2(write.as_raw_fd(), STDOUT_FILENO)?;
        drop(write);
        tracing::trace!("stdout redirected");
        Ok((
            frames,
            Self {
                original,
                pipe: Some(File::from(read)),
                forwarder: None,
                restored: false,
            },
        ))
    }

    /// Start sending captured lines to the host.
    pub(crate) fn forward(&mut self, channel: SharedChannel) -> io::Result<()> {
        let Some(pipe) = self.pipe.take() else {
            return Ok(());
        };
        let handle = thread::Builder::new()
            .name("strata-stdout".into())
            .spawn(move || forward_lines(pipe, &channel))?;
        self.forwarder = Some(handle);
        Ok(())
    }

    /// Restore descriptor 1 and wait until every captured line is sent.
    pub(crate) fn finish(mut self) -> io::Result<()> {
        self.restore()?;
        self.pipe.take();
        if let Some(handle) = self.forwarder.take() {
            handle
                .join()
                .map_err(|_| io::Error::other("stdout forwarder panicked"))?;
        }
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        io::stdout().flush()?;
        dup2(self.original.as_raw_fd(), STDOUT_FILENO)?;
        self.restored = true;
        Ok(())
    }
}

impl Drop for StdoutCapture {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "restoring stdout failed");
        }
    }
}

/// Send each non-blank line of `pipe` as a `log` command until end of
/// stream. Lines are still drained after the host stops answering.
fn forward_lines(pipe: File, channel: &SharedChannel) {
    let mut reader = BufReader::new(pipe);
    let mut line = Vec::new();
    let mut connected = true;
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "reading captured stdout failed");
                break;
            }
        }
        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() || !connected {
            continue;
        }
        let sent = channel.lock().log(text);
        if let Err(e) = sent {
            connected = false;
            tracing::warn!(error = %e, "captured stdout no longer forwarded");
        }
    }
}
