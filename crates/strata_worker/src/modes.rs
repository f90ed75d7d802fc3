//! Strategy modes, selected by `params.type`.
//!
//! - `model`: map profiles to key/value pairs and write out the index they
//!   form.
//! - `insight`: load the model written by earlier jobs, optionally narrowed
//!   to `params.segments`, and emit JSON widgets.
//! - `chain`: run pipelines over the profiles and emit their outputs.

use std::fmt;
use std::fs;

use bytes::Bytes;
use strata_codec::Value;
use strata_pipeline::{DispatchConfig, Dispatcher, Pipeline};
use strata_segment::{Index, MemoryIndex, Query, Segment, SegmentedView, Values};

use crate::error::{WorkerError, WorkerResult};
use crate::profile::Profile;
use crate::worker::Worker;

/// A worker mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Build a model index from profiles.
    Model,
    /// Summarize a model into widgets.
    Insight,
    /// Run pipelines over profiles.
    Chain,
}

impl Mode {
    /// Parse a `params.type` value.
    pub fn parse(name: &str) -> WorkerResult<Self> {
        match name {
            "model" => Ok(Mode::Model),
            "insight" => Ok(Mode::Insight),
            "chain" => Ok(Mode::Chain),
            other => Err(WorkerError::UnknownMode {
                mode: other.to_string(),
            }),
        }
    }

    /// The `params.type` name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Model => "model",
            Mode::Insight => "insight",
            Mode::Chain => "chain",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps one profile to `(key, value)` postings of the model.
pub type ModelFn = Box<dyn FnMut(&Profile) -> WorkerResult<Vec<(Bytes, Bytes)>>>;

/// Turns a model and the job parameters into widget documents.
pub type InsightFn = Box<dyn FnOnce(&Model<'_>, &Value) -> WorkerResult<Vec<serde_json::Value>>>;

/// Builds the pipelines of a chain from the job parameters.
pub type ChainFn = Box<dyn FnOnce(&Value) -> WorkerResult<Vec<Pipeline<Profile, Value>>>>;

/// The strategies a worker can run, one per mode.
#[derive(Default)]
pub struct Strategies {
    model: Option<ModelFn>,
    insight: Option<InsightFn>,
    chain: Option<ChainFn>,
}

impl Strategies {
    /// No strategies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `model` strategy.
    pub fn model<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Profile) -> WorkerResult<Vec<(Bytes, Bytes)>> + 'static,
    {
        self.model = Some(Box::new(f));
        self
    }

    /// Sets the `insight` strategy.
    pub fn insight<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Model<'_>, &Value) -> WorkerResult<Vec<serde_json::Value>> + 'static,
    {
        self.insight = Some(Box::new(f));
        self
    }

    /// Sets the `chain` strategy.
    pub fn chain<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Value) -> WorkerResult<Vec<Pipeline<Profile, Value>>> + 'static,
    {
        self.chain = Some(Box::new(f));
        self
    }
}

/// The model seen by an insight strategy.
pub enum Model<'a> {
    /// The whole model.
    Full(&'a MemoryIndex),
    /// The model narrowed to the members of every segment.
    Segmented(SegmentedView<'a, MemoryIndex>),
}

impl Model<'_> {
    /// Returns true if the model is narrowed to segments.
    pub fn is_segmented(&self) -> bool {
        matches!(self, Model::Segmented(_))
    }

    /// Segment labels, empty for a full model.
    pub fn labels(&self) -> &[String] {
        match self {
            Model::Full(_) => &[],
            Model::Segmented(view) => view.labels(),
        }
    }

    /// Returns true if `key` is in the model.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        match self {
            Model::Full(index) => index.contains_key(key),
            Model::Segmented(view) => view.contains_key(key),
        }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        match self {
            Model::Full(index) => index.len(),
            Model::Segmented(view) => view.len(),
        }
    }

    /// Returns true if the model has no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys.
    pub fn keys(&self) -> Values<'_> {
        match self {
            Model::Full(index) => index.keys(),
            Model::Segmented(view) => view.keys(),
        }
    }

    /// Values under `key`.
    pub fn lookup(&self, key: &[u8]) -> WorkerResult<Values<'_>> {
        match self {
            Model::Full(index) => Ok(index.lookup(key)),
            Model::Segmented(view) => Ok(view.lookup(key)?),
        }
    }

    /// Number of values under `key`.
    pub fn count(&self, key: &[u8]) -> WorkerResult<usize> {
        Ok(self.lookup(key)?.count())
    }

    /// Distinct values across all keys.
    pub fn unique_values(&self) -> WorkerResult<Values<'_>> {
        match self {
            Model::Full(index) => Ok(index.unique_values()),
            Model::Segmented(view) => Ok(view.unique_values()?),
        }
    }

    /// Values matching `query`.
    pub fn query(&self, query: &Query) -> WorkerResult<Values<'_>> {
        match self {
            Model::Full(index) => Ok(index.query(query, None)?),
            Model::Segmented(view) => Ok(view.query(query)?),
        }
    }
}

impl Worker {
    /// The mode named by `params.type`.
    pub fn mode(&self) -> WorkerResult<Mode> {
        let name = self
            .param_text("type")
            .ok_or_else(|| WorkerError::config("params.type is not set"))?;
        Mode::parse(name)
    }

    /// Run the strategy for the job's mode, then signal completion.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::UnknownMode`] for an unknown `params.type`,
    /// [`WorkerError::Config`] if no strategy is set for the mode, and
    /// [`WorkerError::PipelinesFailed`] if a chain pipeline failed. In every
    /// error case `done` is not sent.
    pub fn run(self, strategies: Strategies) -> WorkerResult<()> {
        self.run_mode(strategies)?;
        self.done()
    }

    /// Run the strategy for the job's mode without signalling completion.
    pub fn run_mode(&self, strategies: Strategies) -> WorkerResult<()> {
        let mode = self.mode()?;
        tracing::info!(mode = %mode, "running");
        let missing = || WorkerError::config(format!("no {mode} strategy"));
        match mode {
            Mode::Model => self.run_model(strategies.model.ok_or_else(missing)?),
            Mode::Insight => self.run_insight(strategies.insight.ok_or_else(missing)?),
            Mode::Chain => self.run_chain(strategies.chain.ok_or_else(missing)?),
        }
    }

    fn run_model(&self, mut strategy: ModelFn) -> WorkerResult<()> {
        let mut index = MemoryIndex::new();
        for profile in self.profiles() {
            for (key, value) in strategy(&profile?)? {
                index.insert(key, value);
            }
        }
        let size = index.encode()?.len();
        tracing::info!(keys = index.len(), bytes = size, "model built");
        self.output([index.to_value()], false)?;
        self.output_sys("size", Value::Integer(i64::try_from(size).unwrap_or(i64::MAX)))
    }

    fn run_insight(&self, strategy: InsightFn) -> WorkerResult<()> {
        let mut index = MemoryIndex::new();
        for path in self.inputs()? {
            let data = fs::read(&path)?;
            index.merge(MemoryIndex::decode(&data)?);
        }

        let widgets = match self.segments()? {
            Some(segments) => {
                let view = SegmentedView::restricted(&index, &segments)?
                    .with_labels(self.segment_labels()?);
                strategy(&Model::Segmented(view), &self.params)?
            }
            None => strategy(&Model::Full(&index), &self.params)?,
        };
        tracing::info!(widgets = widgets.len(), "insight done");
        self.output_json(widgets)?;
        Ok(())
    }

    fn run_chain(&self, strategy: ChainFn) -> WorkerResult<()> {
        let pipelines = strategy(&self.params)?;
        let mut dispatcher = Dispatcher::start(pipelines, DispatchConfig::default())?;
        for profile in self.profiles() {
            let profile = match profile {
                Ok(profile) => profile,
                Err(e) => {
                    dispatcher.close();
                    return Err(e);
                }
            };
            if !dispatcher.dispatch(&profile) {
                break;
            }
        }

        let report = dispatcher.close();
        let failed: Vec<String> = report.failures().map(|(name, _)| name.to_string()).collect();
        self.output(report.into_outputs(), true)?;
        if failed.is_empty() {
            Ok(())
        } else {
            Err(WorkerError::PipelinesFailed { failed })
        }
    }

    /// Segments from `params.segments`: a list of lists of member ids.
    fn segments(&self) -> WorkerResult<Option<Vec<Segment>>> {
        let Some(param) = self.params.get("segments") else {
            return Ok(None);
        };
        let lists = param
            .as_list()
            .ok_or_else(|| WorkerError::config("params.segments is not a list"))?;
        let mut segments = Vec::with_capacity(lists.len());
        for list in lists {
            let members = list
                .as_list()
                .ok_or_else(|| WorkerError::config("a segment is not a list"))?;
            let mut segment = Segment::new();
            for member in members {
                let id = match member {
                    Value::Bytes(id) => id.as_slice(),
                    Value::Text(id) => id.as_bytes(),
                    other => {
                        return Err(WorkerError::config(format!(
                            "segment member is not a string: {other}"
                        )))
                    }
                };
                segment.insert(Bytes::copy_from_slice(id));
            }
            segments.push(segment);
        }
        Ok(Some(segments))
    }

    fn segment_labels(&self) -> WorkerResult<Vec<String>> {
        let Some(param) = self.params.get("segment_labels") else {
            return Ok(Vec::new());
        };
        let labels = param
            .as_list()
            .ok_or_else(|| WorkerError::config("params.segment_labels is not a list"))?;
        labels
            .iter()
            .map(|label| {
                label
                    .as_text()
                    .map(str::to_string)
                    .ok_or_else(|| WorkerError::config(format!("segment label {label}")))
            })
            .collect()
    }
}
