//! Synchronous request/reply channel to the host.

use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use strata_codec::{decode_with, encode, DecodeOptions, Encoder, LazyIter, LazyList, Value};

use crate::config::ChannelConfig;
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::{self, Command, Nonce};

/// Greeting the host sends before anything else.
pub const GREETING: &[u8] = b"2:ok";

/// A decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The reply body was empty.
    Empty,
    /// The body was a list, exposed as a lazily decoded sequence.
    Stream(LazyList),
    /// The body was a single value.
    Value(Value),
}

impl Reply {
    /// The reply as a single value, materializing streams.
    pub fn into_value(self) -> ProtocolResult<Option<Value>> {
        match self {
            Reply::Empty => Ok(None),
            Reply::Value(v) => Ok(Some(v)),
            Reply::Stream(lazy) => Ok(Some(Value::List(lazy.to_vec()?))),
        }
    }
}

/// One duplex session with the host.
///
/// Strictly one request in flight: every request blocks until its reply has
/// been read completely.
pub struct Channel {
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    nonce: Nonce,
    config: ChannelConfig,
}

impl Channel {
    /// Open a session: wait for the host greeting, then ping.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Handshake`] if the first reply is anything
    /// other than the greeting.
    pub fn connect<R, W>(reader: R, writer: W, config: ChannelConfig) -> ProtocolResult<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let mut channel = Self::unchecked(reader, writer, config);
        let greeting = channel.recv()?;
        if &greeting[..] != GREETING {
            return Err(ProtocolError::Handshake {
                received: String::from_utf8_lossy(&greeting).into_owned(),
            });
        }
        channel.ping()?;
        tracing::debug!("channel open");
        Ok(channel)
    }

    /// Create a channel without the greeting exchange.
    ///
    /// Used by test hosts that script the stream from the first request.
    pub fn unchecked<R, W>(reader: R, writer: W, config: ChannelConfig) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            nonce: Nonce::default(),
            config,
        }
    }

    /// Channel configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Send a request and read its reply.
    pub fn communicate(&mut self, command: Command, body: &[u8]) -> ProtocolResult<Reply> {
        self.communicate_with(command, body, DecodeOptions::default())
    }

    /// Send a request and decode its reply with `options`.
    pub fn communicate_with(
        &mut self,
        command: Command,
        body: &[u8],
        options: DecodeOptions,
    ) -> ProtocolResult<Reply> {
        frame::write_request(&mut self.writer, &self.nonce, command, body)?;
        let reply = self.recv()?;
        tracing::trace!(%command, sent = body.len(), received = reply.len(), "exchange");

        if reply.is_empty() {
            Ok(Reply::Empty)
        } else if reply[0] == strata_codec::tag::LIST {
            Ok(Reply::Stream(LazyList::with_options(reply, options)))
        } else {
            Ok(Reply::Value(decode_with(reply, options)?))
        }
    }

    fn recv(&mut self) -> ProtocolResult<Bytes> {
        let frame = frame::read_reply(&mut self.reader)?;
        self.nonce = frame.nonce;
        Ok(frame.body)
    }

    /// Fetch the job parameters. An empty reply yields an empty mapping.
    pub fn params(&mut self) -> ProtocolResult<Value> {
        Ok(self
            .communicate(Command::Params, b"")?
            .into_value()?
            .unwrap_or(Value::Map(Vec::new())))
    }

    /// Rewind the input cursor and collect every input path.
    pub fn inputs(&mut self) -> ProtocolResult<Vec<Vec<u8>>> {
        self.communicate(Command::ResetInputs, b"")?;
        let mut paths = Vec::new();
        loop {
            match self.communicate(Command::NextInput, b"")? {
                Reply::Empty => break,
                Reply::Value(Value::Bytes(path)) if path.is_empty() => break,
                Reply::Value(Value::Bytes(path)) => paths.push(path),
                Reply::Value(Value::Text(path)) if path.is_empty() => break,
                Reply::Value(Value::Text(path)) => paths.push(path.into_bytes()),
                other => {
                    return Err(ProtocolError::unexpected(
                        "nextinput",
                        format!("expected a path, got {other:?}"),
                    ))
                }
            }
        }
        Ok(paths)
    }

    /// Fetch the next batch of entries.
    ///
    /// Returns `None` once the host has no more batches.
    pub fn next_batch(&mut self, options: DecodeOptions) -> ProtocolResult<Option<LazyIter>> {
        match self.communicate_with(Command::Next, b"", options)? {
            Reply::Empty => Ok(None),
            Reply::Stream(lazy) => Ok(Some(lazy.iter())),
            Reply::Value(v) => Err(ProtocolError::unexpected(
                "next",
                format!("expected a list of entries, got {v}"),
            )),
        }
    }

    /// Emit results.
    ///
    /// Each value is encoded and carried as a byte string inside the `out`
    /// list. Unchunked output goes in a single frame. Chunked output is
    /// split so that no frame body exceeds the configured limit; an item
    /// that alone exceeds it is sent in a frame of its own.
    ///
    /// Returns the number of frames sent.
    pub fn output<I>(&mut self, values: I, chunked: bool) -> ProtocolResult<usize>
    where
        I: IntoIterator<Item = Value>,
    {
        let limit = self.config.max_output_frame;
        let mut batch = Encoder::new();
        batch.begin_list();
        let mut pending = 0usize;
        let mut frames = 0usize;

        for value in values {
            let item = encode(&value)?;
            let item_len = sized_len(item.len());
            if chunked && pending > 0 && batch.len() + item_len + 1 > limit {
                self.flush_output(&mut batch)?;
                frames += 1;
                pending = 0;
            }
            batch.write_sized(None, &item);
            pending += 1;
        }

        if pending > 0 || (!chunked && frames == 0) {
            self.flush_output(&mut batch)?;
            frames += 1;
        }
        Ok(frames)
    }

    fn flush_output(&mut self, batch: &mut Encoder) -> ProtocolResult<()> {
        let mut full = std::mem::replace(batch, Encoder::new());
        full.end();
        batch.begin_list();
        tracing::debug!(bytes = full.len(), "out");
        self.communicate(Command::Out, full.as_bytes())?;
        Ok(())
    }

    /// Emit a keyed system message.
    pub fn output_sys(&mut self, key: &str, value: Value) -> ProtocolResult<Reply> {
        let body = encode(&Value::List(vec![Value::bytes(key), value]))?;
        self.communicate(Command::SysMsg, &body)
    }

    /// Emit one diagnostic line.
    pub fn log(&mut self, msg: &str) -> ProtocolResult<()> {
        let body = encode(&Value::bytes(msg))?;
        self.communicate(Command::Log, &body)?;
        Ok(())
    }

    /// Signal completion.
    pub fn done(&mut self) -> ProtocolResult<()> {
        self.communicate(Command::Done, b"")?;
        Ok(())
    }

    /// Liveness check.
    pub fn ping(&mut self) -> ProtocolResult<()> {
        self.communicate(Command::Ping, b"")?;
        Ok(())
    }
}

/// Encoded size of a byte string with a payload of `len` bytes.
fn sized_len(len: usize) -> usize {
    let mut digits = 1;
    let mut n = len;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits + 1 + len
}

/// A channel shared between the worker and its diagnostic writer.
#[derive(Clone)]
pub struct SharedChannel {
    inner: Arc<Mutex<Channel>>,
}

impl SharedChannel {
    /// Share a channel.
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: Arc::new(Mutex::new(channel)),
        }
    }

    /// Lock the channel for a request.
    pub fn lock(&self) -> MutexGuard<'_, Channel> {
        self.inner.lock()
    }

    /// Lock the channel if no request is in flight.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Channel>> {
        self.inner.try_lock()
    }

    /// Iterate over `(key, value)` entries, fetching batches as needed.
    ///
    /// The channel is locked only while a batch is being fetched, so
    /// diagnostics emitted while consuming entries still reach the host.
    pub fn entries(&self, options: DecodeOptions) -> Entries {
        Entries {
            channel: self.clone(),
            options,
            batch: None,
            finished: false,
        }
    }
}

/// Iterator over host entries. Ends at the first empty entry.
pub struct Entries {
    channel: SharedChannel,
    options: DecodeOptions,
    batch: Option<LazyIter>,
    finished: bool,
}

impl Entries {
    fn fail(&mut self, err: ProtocolError) -> Option<ProtocolResult<(Value, Value)>> {
        self.finished = true;
        Some(Err(err))
    }
}

impl Iterator for Entries {
    type Item = ProtocolResult<(Value, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let Some(batch) = self.batch.as_mut() else {
                let next = self.channel.lock().next_batch(self.options);
                match next {
                    Ok(Some(batch)) => self.batch = Some(batch),
                    Ok(None) => self.finished = true,
                    Err(e) => return self.fail(e),
                }
                continue;
            };

            match batch.next() {
                None => self.batch = None,
                Some(Err(e)) => return self.fail(e.into()),
                Some(Ok(Value::List(entry))) if entry.is_empty() => self.finished = true,
                Some(Ok(Value::List(entry))) if entry.len() == 2 => {
                    let mut pair = entry.into_iter();
                    if let (Some(key), Some(value)) = (pair.next(), pair.next()) {
                        return Some(Ok((key, value)));
                    }
                }
                Some(Ok(other)) => {
                    return self.fail(ProtocolError::unexpected(
                        "next",
                        format!("entry is not a pair: {other}"),
                    ))
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Writer whose contents remain inspectable after the channel takes it.
    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn reply(body: &[u8]) -> Vec<u8> {
        let mut out = format!("n{:03} {} ", 0, body.len()).into_bytes();
        out.extend_from_slice(body);
        out
    }

    fn script(bodies: &[&[u8]]) -> Cursor<Vec<u8>> {
        Cursor::new(bodies.iter().flat_map(|b| reply(b)).collect())
    }

    fn channel(bodies: &[&[u8]], config: ChannelConfig) -> (Channel, Sink) {
        let sink = Sink::default();
        (Channel::unchecked(script(bodies), sink.clone(), config), sink)
    }

    #[test]
    fn handshake_accepts_greeting_then_pings() {
        let sink = Sink::default();
        Channel::connect(script(&[b"2:ok", b""]), sink.clone(), ChannelConfig::default())
            .unwrap();
        assert_eq!(&sink.0.lock()[..], b"n000 ping 0 \n");
    }

    #[test]
    fn handshake_rejects_anything_else() {
        let err = Channel::connect(
            script(&[b"3:bad"]),
            Sink::default(),
            ChannelConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ProtocolError::Handshake { received } if received == "3:bad"));
    }

    #[test]
    fn reply_kinds() {
        let (mut ch, _) = channel(&[b"", b"i5e", b"l1:ae"], ChannelConfig::default());
        assert_eq!(ch.communicate(Command::Ping, b"").unwrap(), Reply::Empty);
        assert_eq!(
            ch.communicate(Command::Ping, b"").unwrap(),
            Reply::Value(Value::Integer(5))
        );
        let stream = ch.communicate(Command::Ping, b"").unwrap();
        assert_eq!(
            stream.into_value().unwrap(),
            Some(Value::List(vec![Value::bytes("a")]))
        );
    }

    #[test]
    fn params_and_inputs() {
        let (mut ch, sink) = channel(
            &[b"d4:typeu5:modele", b"", b"5:/a/b1", b"5:/a/b2", b"0:"],
            ChannelConfig::default(),
        );
        let params = ch.params().unwrap();
        assert_eq!(params.get("type").and_then(Value::as_text), Some("model"));

        let inputs = ch.inputs().unwrap();
        assert_eq!(inputs, vec![b"/a/b1".to_vec(), b"/a/b2".to_vec()]);

        let written = String::from_utf8(sink.0.lock().clone()).unwrap();
        assert_eq!(
            written,
            " params 0 \nn000 resetinputs 0 \nn000 nextinput 0 \n\
             n000 nextinput 0 \nn000 nextinput 0 \n"
        );
    }

    #[test]
    fn entries_span_batches_and_stop_at_empty_entry() {
        let (ch, _) = channel(
            &[b"ll1:ai1eel1:bi2eee", b"ll1:ci3eelee"],
            ChannelConfig::default(),
        );
        let shared = SharedChannel::new(ch);
        let entries: Vec<_> = shared
            .entries(DecodeOptions::default())
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(
            entries,
            vec![
                (Value::bytes("a"), Value::Integer(1)),
                (Value::bytes("b"), Value::Integer(2)),
                (Value::bytes("c"), Value::Integer(3)),
            ]
        );
    }

    #[test]
    fn malformed_entry_is_an_error() {
        let (ch, _) = channel(&[b"li1ee"], ChannelConfig::default());
        let shared = SharedChannel::new(ch);
        let mut entries = shared.entries(DecodeOptions::default());
        assert!(matches!(
            entries.next(),
            Some(Err(ProtocolError::UnexpectedReply { command: "next", .. }))
        ));
        assert!(entries.next().is_none());
    }

    #[test]
    fn output_wraps_encoded_items() {
        let (mut ch, sink) = channel(&[b""], ChannelConfig::default());
        let frames = ch
            .output(vec![Value::Integer(1), Value::bytes("ab")], false)
            .unwrap();
        assert_eq!(frames, 1);
        assert_eq!(&sink.0.lock()[..], b" out 13 l3:i1e4:2:abe\n");
    }

    #[test]
    fn chunked_output_respects_frame_limit() {
        let limit = 64;
        let items: Vec<Value> = (0..20).map(|i| Value::bytes(format!("item-{i:02}"))).collect();
        let replies = vec![&b""[..]; 20];
        let (mut ch, sink) = channel(&replies, ChannelConfig::default().with_max_output_frame(limit));

        let frames = ch.output(items.clone(), true).unwrap();
        assert!(frames > 1);

        let written = sink.0.lock().clone();
        let mut recovered = Vec::new();
        for line in written.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
            let body_start = line.iter().rposition(|b| *b == b' ').unwrap() + 1;
            let body = &line[body_start..];
            assert!(body.len() <= limit, "frame of {} bytes", body.len());
            let list = strata_codec::decode(body).unwrap();
            for item in list.as_list().unwrap() {
                recovered.push(strata_codec::decode(item.as_bytes().unwrap()).unwrap());
            }
        }
        assert_eq!(recovered, items);
    }

    #[test]
    fn oversize_item_travels_alone() {
        let (mut ch, sink) = channel(
            &[b"", b"", b""],
            ChannelConfig::default().with_max_output_frame(16),
        );
        let big = Value::bytes("x".repeat(40));
        let frames = ch
            .output(vec![Value::Integer(1), big, Value::Integer(2)], true)
            .unwrap();
        assert_eq!(frames, 3);
        let written = sink.0.lock().clone();
        assert_eq!(written.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count(), 3);
    }

    #[test]
    fn sysmsg_and_log_bodies() {
        let (mut ch, sink) = channel(&[b"", b""], ChannelConfig::default());
        ch.output_sys("size", Value::Integer(3)).unwrap();
        ch.log("hello").unwrap();
        assert_eq!(
            &sink.0.lock()[..],
            b" sysmsg 11 l4:sizei3ee\nn000 log 7 5:hello\n"
        );
    }

    #[test]
    fn sized_len_counts_digits() {
        assert_eq!(sized_len(0), 2);
        assert_eq!(sized_len(9), 11);
        assert_eq!(sized_len(10), 13);
    }
}
