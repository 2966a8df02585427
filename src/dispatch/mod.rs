//! Hand-off from the reader thread (and voice jobs) to the consuming context.
//!
//! Producers push [`Delivery`] values into a channel; the consumer calls
//! [`EventQueue::drain`] from its own loop and every registered callback runs
//! there, in arrival order. Callbacks never run on the reader thread.

mod reader;
#[cfg(test)]
mod tests;

use crate::protocol::Event;
use crate::voice::VoiceUpdate;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

pub use reader::{publish_event, spawn_reader, ReaderExit, ReaderHandle};

/// Conditions the consumer should hear about that are not protocol events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkNotice {
    /// The link failed and live updates have stopped. Sent at most once.
    LinkLost(String),
    /// An event was observed but could not be written to the event log.
    StorageFailed(String),
}

/// One item travelling through the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(Event),
    Notice(LinkNotice),
    Voice(VoiceUpdate),
}

/// Producer side, cloned into every background thread.
pub type DeliverySender = Sender<Delivery>;

type Callback<T> = Box<dyn FnMut(&T)>;

/// Consumer-owned queue of pending deliveries plus the callbacks they feed.
pub struct EventQueue {
    tx: DeliverySender,
    rx: Receiver<Delivery>,
    event_subscribers: Vec<Callback<Event>>,
    notice_subscribers: Vec<Callback<LinkNotice>>,
    voice_subscribers: Vec<Callback<VoiceUpdate>>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            event_subscribers: Vec::new(),
            notice_subscribers: Vec::new(),
            voice_subscribers: Vec::new(),
        }
    }

    pub fn sender(&self) -> DeliverySender {
        self.tx.clone()
    }

    pub fn subscribe_events(&mut self, callback: impl FnMut(&Event) + 'static) {
        self.event_subscribers.push(Box::new(callback));
    }

    pub fn subscribe_notices(&mut self, callback: impl FnMut(&LinkNotice) + 'static) {
        self.notice_subscribers.push(Box::new(callback));
    }

    pub fn subscribe_voice(&mut self, callback: impl FnMut(&VoiceUpdate) + 'static) {
        self.voice_subscribers.push(Box::new(callback));
    }

    /// Deliver everything queued so far without blocking.
    ///
    /// Returns how many deliveries were handed to subscribers.
    pub fn drain(&mut self) -> usize {
        let mut delivered = 0;
        loop {
            match self.rx.try_recv() {
                Ok(delivery) => {
                    self.deliver(&delivery);
                    delivered += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return delivered,
            }
        }
    }

    /// Wait up to `timeout` for the first delivery, then drain the rest.
    pub fn wait_and_drain(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(delivery) => {
                self.deliver(&delivery);
                1 + self.drain()
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn deliver(&mut self, delivery: &Delivery) {
        match delivery {
            Delivery::Event(event) => {
                for callback in &mut self.event_subscribers {
                    callback(event);
                }
            }
            Delivery::Notice(notice) => {
                for callback in &mut self.notice_subscribers {
                    callback(notice);
                }
            }
            Delivery::Voice(update) => {
                for callback in &mut self.voice_subscribers {
                    callback(update);
                }
            }
        }
    }
}
