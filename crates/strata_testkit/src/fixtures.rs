//! In-memory host for driving a worker channel.
//!
//! [`ScriptedHost`] answers each request as it is written, by command:
//! `params` returns the configured parameters, `nextinput` walks the
//! configured input paths, `next` hands out the queued entry batches and
//! everything else is acknowledged with an empty reply. Every request is
//! recorded for inspection.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use strata_codec::{decode, encode, Value};
use strata_protocol::{Channel, ChannelConfig, GREETING};
use tempfile::TempDir;

/// A request as written by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Echoed nonce, empty before the first reply.
    pub nonce: Vec<u8>,
    /// Command name.
    pub command: String,
    /// Raw body.
    pub body: Vec<u8>,
}

#[derive(Default)]
struct HostState {
    params: Option<Vec<u8>>,
    inputs: Vec<Vec<u8>>,
    input_cursor: usize,
    batches: VecDeque<Vec<u8>>,
    inbound: VecDeque<u8>,
    pending: Vec<u8>,
    requests: Vec<Request>,
    replies: u32,
}

impl HostState {
    fn push_reply(&mut self, body: &[u8]) {
        self.replies += 1;
        let header = format!("{:04} {} ", self.replies % 10_000, body.len());
        self.inbound.extend(header.as_bytes());
        self.inbound.extend(body);
    }

    fn respond(&mut self, request: &Request) {
        let body = match request.command.as_str() {
            "params" => self.params.clone().unwrap_or_default(),
            "resetinputs" => {
                self.input_cursor = 0;
                Vec::new()
            }
            "nextinput" => match self.inputs.get(self.input_cursor) {
                Some(path) => {
                    self.input_cursor += 1;
                    encode(&Value::bytes(path)).unwrap_or_default()
                }
                None => Vec::new(),
            },
            "next" => self.batches.pop_front().unwrap_or_default(),
            _ => Vec::new(),
        };
        self.push_reply(&body);
    }

    /// Parse and answer every complete request in `pending`.
    fn drain_requests(&mut self) -> io::Result<()> {
        while let Some(request) = parse_request(&mut self.pending)? {
            self.respond(&request);
            self.requests.push(request);
        }
        Ok(())
    }
}

fn parse_request(pending: &mut Vec<u8>) -> io::Result<Option<Request>> {
    let mut fields = Vec::with_capacity(3);
    let mut start = 0;
    for _ in 0..3 {
        let Some(space) = pending[start..].iter().position(|b| *b == b' ') else {
            return Ok(None);
        };
        fields.push(&pending[start..start + space]);
        start += space + 1;
    }
    let len: usize = std::str::from_utf8(fields[2])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad request length"))?;
    if pending.len() < start + len + 1 {
        return Ok(None);
    }
    if pending[start + len] != b'\n' {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "request not terminated by a newline",
        ));
    }

    let request = Request {
        nonce: fields[0].to_vec(),
        command: String::from_utf8_lossy(fields[1]).into_owned(),
        body: pending[start..start + len].to_vec(),
    };
    pending.drain(..start + len + 1);
    Ok(Some(request))
}

/// A host that answers requests by command.
#[derive(Clone, Default)]
pub struct ScriptedHost {
    state: Arc<Mutex<HostState>>,
}

impl ScriptedHost {
    /// A host with no parameters, inputs or entries, and no greeting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the greeting, as a real host sends before anything else.
    pub fn with_greeting(self) -> Self {
        self.with_raw_greeting(GREETING)
    }

    /// Queue an arbitrary first reply in place of the greeting.
    pub fn with_raw_greeting(self, body: &[u8]) -> Self {
        self.state.lock().push_reply(body);
        self
    }

    /// Reply to `params` with `params`.
    pub fn with_params(self, params: &Value) -> Self {
        self.state.lock().params = Some(encode(params).unwrap_or_default());
        self
    }

    /// Input paths returned by `nextinput`.
    pub fn with_inputs<P: AsRef<Path>>(self, paths: &[P]) -> Self {
        self.state.lock().inputs = paths
            .iter()
            .map(|p| p.as_ref().to_string_lossy().into_owned().into_bytes())
            .collect();
        self
    }

    /// Queue one `next` batch holding `entries` as `[key, value]` pairs.
    pub fn with_batch(self, entries: Vec<(Value, Value)>) -> Self {
        let batch = Value::List(
            entries
                .into_iter()
                .map(|(k, v)| Value::List(vec![k, v]))
                .collect(),
        );
        self.with_raw_batch(encode(&batch).unwrap_or_default())
    }

    /// Queue one raw `next` reply.
    pub fn with_raw_batch(self, body: impl Into<Vec<u8>>) -> Self {
        self.state.lock().batches.push_back(body.into());
        self
    }

    /// Reader end for the worker.
    pub fn reader(&self) -> HostReader {
        HostReader {
            state: Arc::clone(&self.state),
        }
    }

    /// Writer end for the worker.
    pub fn writer(&self) -> HostWriter {
        HostWriter {
            state: Arc::clone(&self.state),
        }
    }

    /// A channel on this host, without the greeting exchange.
    pub fn channel(&self, config: ChannelConfig) -> Channel {
        Channel::unchecked(self.reader(), self.writer(), config)
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    /// Command names of every request seen so far.
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .requests
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }

    /// Bodies of the requests with command `command`.
    pub fn bodies(&self, command: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.command == command)
            .map(|r| r.body.clone())
            .collect()
    }

    /// Items emitted with `out`, decoded, in order.
    ///
    /// # Panics
    ///
    /// Panics if an `out` body is not a list of encoded values.
    pub fn outputs(&self) -> Vec<Value> {
        let mut items = Vec::new();
        for body in self.bodies("out") {
            let Value::List(frame) = decode(&body).expect("out body") else {
                panic!("out body is not a list");
            };
            for item in frame {
                let encoded = item.as_bytes().expect("out item is a byte string");
                items.push(decode(encoded).expect("out item"));
            }
        }
        items
    }

    /// `(key, value)` of every `sysmsg`.
    ///
    /// # Panics
    ///
    /// Panics if a body is not a two-item list.
    pub fn sysmsgs(&self) -> Vec<(String, Value)> {
        self.bodies("sysmsg")
            .iter()
            .map(|body| {
                let Value::List(pair) = decode(body).expect("sysmsg body") else {
                    panic!("sysmsg body is not a list");
                };
                let mut pair = pair.into_iter();
                let key = pair.next().expect("sysmsg key");
                let value = pair.next().expect("sysmsg value");
                (key.as_text().expect("text key").to_string(), value)
            })
            .collect()
    }

    /// Serve a worker running in another process until it closes its end.
    ///
    /// Requests are read from `requests` (the worker's stdout) and replies
    /// are written to `replies` (its stdin).
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidData`] if the worker writes anything
    /// that is not a well-formed request, and any I/O error of either
    /// stream.
    pub fn relay<R: Read, W: Write>(&self, mut requests: R, mut replies: W) -> io::Result<()> {
        let mut buf = [0u8; 8192];
        let mut writer = self.writer();
        loop {
            let n = match requests.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            writer.write_all(&buf[..n])?;
            let outgoing: Vec<u8> = self.state.lock().inbound.drain(..).collect();
            if !outgoing.is_empty() {
                replies.write_all(&outgoing)?;
                replies.flush()?;
            }
        }
        let pending = self.state.lock().pending.len();
        if pending > 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{pending} bytes after the last complete request"),
            ));
        }
        Ok(())
    }

    /// Lines sent with `log`.
    pub fn logs(&self) -> Vec<String> {
        self.bodies("log")
            .iter()
            .filter_map(|body| decode(body).ok())
            .filter_map(|v| v.as_text().map(str::to_string))
            .collect()
    }
}

/// Worker-side reader of a [`ScriptedHost`].
pub struct HostReader {
    state: Arc<Mutex<HostState>>,
}

impl Read for HostReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// Worker-side writer of a [`ScriptedHost`].
pub struct HostWriter {
    state: Arc<Mutex<HostState>>,
}

impl Write for HostWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.pending.extend_from_slice(buf);
        state.drain_requests()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write `data` to a file in a fresh temporary directory.
///
/// The directory is removed when the returned guard is dropped.
pub fn temp_input(name: &str, data: &[u8]) -> io::Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let path = dir.path().join(name);
    std::fs::write(&path, data)?;
    Ok((dir, path))
}
