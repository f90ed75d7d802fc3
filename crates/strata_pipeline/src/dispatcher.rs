//! One source, many pipelines, one item in flight.
//!
//! Every pipeline runs on its own thread behind a capacity-one item channel
//! and an acknowledgement channel. The control thread hands each source
//! item to the pipelines in turn and waits for the acknowledgement before
//! moving on, so at most one pipeline runs at any time and every pipeline
//! sees the items in source order.

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::config::DispatchConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::feed::{Ack, Feed, FeedState, Message};
use crate::report::{PipelineReport, RunReport};

/// Output stream of a pipeline.
pub type Stream<O> = Box<dyn Iterator<Item = PipelineResult<O>>>;

type Body<T, O> = Box<dyn FnOnce(Feed<T>) -> PipelineResult<Stream<O>> + Send>;

/// A named pipeline: a function from the item feed to an output stream.
///
/// The body runs on the pipeline's own thread, so the stream it returns
/// does not need to be `Send`.
pub struct Pipeline<T, O> {
    name: String,
    body: Body<T, O>,
}

impl<T, O> Pipeline<T, O> {
    /// Create a pipeline from its body.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(Feed<T>) -> PipelineResult<Stream<O>> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct Worker<T, O> {
    name: String,
    items: Sender<Message<T>>,
    acks: Receiver<Ack>,
    handle: JoinHandle<PipelineResult<Vec<O>>>,
    failed: bool,
}

/// Drives a set of pipelines over one source.
pub struct Dispatcher<T, O> {
    workers: Vec<Worker<T, O>>,
    config: DispatchConfig,
    aborted: bool,
}

impl<T, O> Dispatcher<T, O>
where
    T: Clone + Send + 'static,
    O: Send + 'static,
{
    /// Start one thread per pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Setup`] if a thread cannot be spawned.
    pub fn start(pipelines: Vec<Pipeline<T, O>>, config: DispatchConfig) -> PipelineResult<Self> {
        let mut workers = Vec::with_capacity(pipelines.len());
        for pipeline in pipelines {
            let (item_tx, item_rx) = bounded(1);
            let (ack_tx, ack_rx) = bounded(1);
            let body = pipeline.body;
            let handle = thread::Builder::new()
                .name(format!("pipeline-{}", pipeline.name))
                .spawn(move || drive(body, item_rx, ack_tx))
                .map_err(|e| PipelineError::setup(format!("{}: {e}", pipeline.name)))?;
            workers.push(Worker {
                name: pipeline.name,
                items: item_tx,
                acks: ack_rx,
                handle,
                failed: false,
            });
        }
        tracing::debug!(pipelines = workers.len(), "dispatcher started");
        Ok(Self {
            workers,
            config,
            aborted: false,
        })
    }

    /// Hand one item to every live pipeline, in order.
    ///
    /// Returns `false` once the scan should stop: either a pipeline failed
    /// with `stop_on_error` set, or no pipeline is left to feed.
    pub fn dispatch(&mut self, item: &T) -> bool {
        if self.aborted {
            return false;
        }
        for worker in self.workers.iter_mut().filter(|w| !w.failed) {
            let delivered = worker.items.send(Message::Item(item.clone())).is_ok()
                && worker.acks.recv() == Ok(Ack::Done);
            if !delivered {
                worker.failed = true;
                tracing::warn!(pipeline = %worker.name, "pipeline stopped accepting items");
                if self.config.stop_on_error {
                    self.aborted = true;
                    return false;
                }
            }
        }
        self.workers.iter().any(|w| !w.failed)
    }

    /// Close every pipeline and collect the results.
    pub fn close(self) -> RunReport<O> {
        let aborted = self.aborted;
        let mut pipelines = Vec::with_capacity(self.workers.len());

        for worker in self.workers {
            // A worker that already exited has dropped its receiver.
            let _ = worker.items.send(Message::Close { aborted });
            let result = match worker.handle.join() {
                Ok(Ok(_)) if worker.failed => Err(PipelineError::Disconnected),
                Ok(result) => result,
                Err(payload) => Err(PipelineError::from_panic(payload)),
            };
            if let Err(e) = &result {
                tracing::error!(pipeline = %worker.name, error = %e, "pipeline failed");
            }
            pipelines.push(PipelineReport {
                name: worker.name,
                result,
            });
        }

        RunReport { pipelines, aborted }
    }
}

/// Run `pipelines` over `source` and report.
pub fn run<T, O, I>(source: I, pipelines: Vec<Pipeline<T, O>>, config: DispatchConfig) -> RunReport<O>
where
    T: Clone + Send + 'static,
    O: Send + 'static,
    I: IntoIterator<Item = T>,
{
    let mut dispatcher = match Dispatcher::start(pipelines, config) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(error = %e, "dispatcher failed to start");
            return RunReport {
                pipelines: vec![PipelineReport {
                    name: "dispatcher".into(),
                    result: Err(e),
                }],
                aborted: true,
            };
        }
    };
    for item in source {
        if !dispatcher.dispatch(&item) {
            break;
        }
    }
    dispatcher.close()
}

/// Pipeline thread body.
fn drive<T, O>(
    body: Body<T, O>,
    items: Receiver<Message<T>>,
    acks: Sender<Ack>,
) -> PipelineResult<Vec<O>> {
    let state = Rc::new(FeedState::default());
    let feed = Feed::new(items.clone(), acks.clone(), Rc::clone(&state));

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> PipelineResult<Vec<O>> {
        let stream = body(feed)?;
        let mut outputs = Vec::new();
        for output in stream {
            if state.aborted.get() {
                break;
            }
            outputs.push(output?);
        }
        Ok(outputs)
    }))
    .unwrap_or_else(|payload| Err(PipelineError::from_panic(payload)));

    let ack = if outcome.is_ok() { Ack::Done } else { Ack::Failed };

    // Release the control thread if it is waiting on an item we hold.
    if state.pending_ack.replace(false) {
        let _ = acks.send(ack);
    } else if outcome.is_err() && !state.closed.get() {
        // Failed before taking an item: report on the next handoff.
        match items.recv() {
            Ok(Message::Item(_)) => {
                let _ = acks.send(Ack::Failed);
            }
            Ok(Message::Close { .. }) | Err(_) => state.closed.set(true),
        }
    }

    // The stream stopped before the feed closed. Keep acknowledging until
    // the control thread closes us; after a failure it sends nothing more.
    while !state.closed.get() {
        match items.recv() {
            Ok(Message::Item(_)) => {
                let _ = acks.send(ack);
            }
            Ok(Message::Close { aborted }) => {
                state.aborted.set(aborted);
                state.closed.set(true);
            }
            Err(_) => state.closed.set(true),
        }
    }

    if state.aborted.get() {
        return outcome.map(|_| Vec::new());
    }
    outcome
}
