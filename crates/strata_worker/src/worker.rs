//! A worker session with the host.

use std::io::{Read, Write};
use std::path::PathBuf;

use strata_codec::{DecodeOptions, JsonDoc, JsonMode, Value};
use strata_protocol::{Channel, Entries, SharedChannel};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::event::{Event, PROFILE_DONE};
use crate::logging;
use crate::profile::Profile;

/// A connected worker: the shared channel, the job parameters and the
/// runtime configuration.
pub struct Worker {
    channel: SharedChannel,
    pub(crate) params: Value,
    config: WorkerConfig,
}

impl Worker {
    /// Connect to the host and fetch the job parameters.
    ///
    /// In testing mode the greeting exchange is skipped.
    pub fn connect<R, W>(reader: R, writer: W, config: WorkerConfig) -> WorkerResult<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let channel = if config.testing {
            Channel::unchecked(reader, writer, config.channel_config())
        } else {
            Channel::connect(reader, writer, config.channel_config())?
        };
        Self::from_channel(channel, config)
    }

    /// Wrap an open channel and fetch the job parameters.
    pub fn from_channel(mut channel: Channel, config: WorkerConfig) -> WorkerResult<Self> {
        let params = channel.params()?;
        tracing::debug!(params = %params, "connected");
        Ok(Self {
            channel: SharedChannel::new(channel),
            params,
            config,
        })
    }

    /// Forward `tracing` diagnostics to the host.
    pub fn init_logging(&self) -> WorkerResult<()> {
        logging::init_logging(&self.channel, &self.config.log_filter)
    }

    /// The shared channel.
    pub fn channel(&self) -> &SharedChannel {
        &self.channel
    }

    /// The job parameters.
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Parameter `name` as text.
    pub fn param_text(&self, name: &str) -> Option<&str> {
        self.params.get(name)?.as_text()
    }

    /// The runtime configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Paths of every input of the job.
    pub fn inputs(&self) -> WorkerResult<Vec<PathBuf>> {
        let paths = self.channel.lock().inputs()?;
        Ok(paths
            .into_iter()
            .map(|p| PathBuf::from(String::from_utf8_lossy(&p).into_owned()))
            .collect())
    }

    /// Iterate over the profiles of the job.
    pub fn profiles(&self) -> Profiles {
        Profiles {
            entries: self.channel.entries(DecodeOptions::default()),
        }
    }

    /// Visit each profile together with its events, then write the profile
    /// back.
    ///
    /// Events the visitor leaves unread are drained before the profile is
    /// written. Embedded JSON in events stays raw until it is asked for.
    ///
    /// Returns the number of profiles visited.
    pub fn profile_events<F>(&self, mut visit: F) -> WorkerResult<usize>
    where
        F: FnMut(&mut Profile, &mut Events<'_>) -> WorkerResult<()>,
    {
        let options = DecodeOptions::default().json(JsonMode::Raw);
        let mut entries = self.channel.entries(options);
        let mut visited = 0;
        while let Some(entry) = entries.next() {
            let (_, data) = entry?;
            let mut profile = Profile::from_entry_with(data, options)?;
            let mut events = Events {
                entries: &mut entries,
                finished: false,
            };
            visit(&mut profile, &mut events)?;
            let skipped = events.drain()?;
            if skipped > 0 {
                tracing::debug!(skipped, "drained unread events");
            }
            self.write_profile(&profile)?;
            visited += 1;
        }
        Ok(visited)
    }

    /// Stamp `profile` to expire `days` after the day of `params.group`.
    pub fn set_expire(&self, profile: &mut Profile, days: i64) -> WorkerResult<()> {
        let group = self
            .param_text("group")
            .ok_or_else(|| WorkerError::config("params.group is not set"))?;
        profile.set_expire(days, group)
    }

    /// Write `profile` back to the host.
    pub fn write_profile(&self, profile: &Profile) -> WorkerResult<()> {
        let entry = profile.to_value(self.config.part_size)?;
        self.output([entry], false)?;
        Ok(())
    }

    /// Emit results. Returns the number of frames sent.
    pub fn output<I>(&self, values: I, chunked: bool) -> WorkerResult<usize>
    where
        I: IntoIterator<Item = Value>,
    {
        Ok(self.channel.lock().output(values, chunked)?)
    }

    /// Emit JSON documents as embedded JSON, in one frame.
    pub fn output_json<I>(&self, docs: I) -> WorkerResult<usize>
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        self.output(docs.into_iter().map(|d| Value::Json(JsonDoc::Parsed(d))), false)
    }

    /// Emit a keyed system message.
    pub fn output_sys(&self, key: &str, value: Value) -> WorkerResult<()> {
        self.channel.lock().output_sys(key, value)?;
        Ok(())
    }

    /// Signal completion.
    pub fn done(&self) -> WorkerResult<()> {
        Ok(self.channel.lock().done()?)
    }
}

/// Iterator over the profiles of a job.
pub struct Profiles {
    entries: Entries,
}

impl Iterator for Profiles {
    type Item = WorkerResult<Profile>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        Some(
            entry
                .map_err(WorkerError::from)
                .and_then(|(_, data)| Profile::from_entry(data)),
        )
    }
}

/// The events of one profile. Ends at the `profile_done` marker.
pub struct Events<'a> {
    entries: &'a mut Entries,
    finished: bool,
}

impl Events<'_> {
    /// Consume the remaining events, returning how many there were.
    pub fn drain(&mut self) -> WorkerResult<usize> {
        let mut count = 0;
        for event in self.by_ref() {
            event?;
            count += 1;
        }
        Ok(count)
    }
}

impl Iterator for Events<'_> {
    type Item = WorkerResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.entries.next() {
            None => {
                self.finished = true;
                None
            }
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e.into()))
            }
            Some(Ok((_, entry))) if entry.as_text() == Some(PROFILE_DONE) => {
                self.finished = true;
                None
            }
            Some(Ok((_, entry))) => Some(Event::from_value(entry)),
        }
    }
}
