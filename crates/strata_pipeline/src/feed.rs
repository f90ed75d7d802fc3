//! Pipeline-side end of the handoff.

use std::cell::Cell;
use std::rc::Rc;

use crossbeam::channel::{Receiver, Sender};

/// Control thread to pipeline thread.
pub(crate) enum Message<T> {
    /// The next source item.
    Item(T),
    /// No more items. `aborted` is set when the scan stopped early.
    Close { aborted: bool },
}

/// Pipeline thread to control thread, once per delivered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ack {
    /// The pipeline is done with the item.
    Done,
    /// The pipeline failed and wants no more items.
    Failed,
}

/// Handoff state shared by a [`Feed`] and the thread driving it.
#[derive(Debug, Default)]
pub(crate) struct FeedState {
    /// An item was delivered and has not been acknowledged yet.
    pub(crate) pending_ack: Cell<bool>,
    /// The close message has been received.
    pub(crate) closed: Cell<bool>,
    /// The close message carried the abort flag.
    pub(crate) aborted: Cell<bool>,
}

/// The source items, as seen by one pipeline.
///
/// Pulling the next item acknowledges the previous one, which is what
/// releases the control thread to hand the item to the next pipeline.
pub struct Feed<T> {
    items: Receiver<Message<T>>,
    acks: Sender<Ack>,
    state: Rc<FeedState>,
}

impl<T> Feed<T> {
    pub(crate) fn new(
        items: Receiver<Message<T>>,
        acks: Sender<Ack>,
        state: Rc<FeedState>,
    ) -> Self {
        Self { items, acks, state }
    }

    /// Whether the scan was stopped early.
    pub fn aborted(&self) -> bool {
        self.state.aborted.get()
    }
}

impl<T> Iterator for Feed<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.state.closed.get() {
            return None;
        }
        if self.state.pending_ack.replace(false) {
            // The control thread only goes away after sending close.
            let _ = self.acks.send(Ack::Done);
        }
        match self.items.recv() {
            Ok(Message::Item(item)) => {
                self.state.pending_ack.set(true);
                Some(item)
            }
            Ok(Message::Close { aborted }) => {
                self.state.aborted.set(aborted);
                self.state.closed.set(true);
                None
            }
            Err(_) => {
                self.state.closed.set(true);
                None
            }
        }
    }
}
