use super::{Delivery, DeliverySender, LinkNotice};
use crate::journal::EventJournal;
use crate::link::{LineReader, ReadOutcome, SharedWriter};
use crate::protocol::{decode_line, Event};
use crate::{error_chain, log_debug, log_debug_content};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Why the reader thread stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// The stop flag was raised or the consumer went away.
    Shutdown,
    /// A fatal link error ended the loop.
    LinkLost,
    /// The thread panicked.
    Panicked,
}

/// Owner's handle on the reader thread.
pub struct ReaderHandle {
    stop_flag: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<ReaderExit>>,
}

impl ReaderHandle {
    /// Ask the loop to stop after its current read returns.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| handle.is_finished())
    }

    /// Stop the loop and wait for the thread. Blocks for at most one read timeout.
    pub fn shutdown(mut self) -> ReaderExit {
        self.request_stop();
        self.join()
    }

    fn join(&mut self) -> ReaderExit {
        let Some(handle) = self.handle.take() else {
            return ReaderExit::Shutdown;
        };
        match handle.join() {
            Ok(exit) => exit,
            Err(_) => {
                log_debug("reader thread panicked");
                ReaderExit::Panicked
            }
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.request_stop();
            let _ = self.join();
        }
    }
}

/// Log `event`, then queue it for subscribers.
///
/// A failed append queues [`LinkNotice::StorageFailed`] and the event is still
/// delivered. Returns `false` once the consumer side of the queue is gone.
pub fn publish_event(journal: &EventJournal, tx: &DeliverySender, event: Event) -> bool {
    if let Err(err) = journal.record(&event.description()) {
        let message = error_chain(&err);
        log_debug(&format!("event log append failed: {message}"));
        let _ = tx.send(Delivery::Notice(LinkNotice::StorageFailed(message)));
    }
    tx.send(Delivery::Event(event)).is_ok()
}

/// Start the thread that reads, decodes, logs, and forwards inbound lines.
///
/// Every decoded event is appended to `journal` before it is queued, so the
/// log keeps decode order. On a fatal read error the write half is closed and
/// a single [`LinkNotice::LinkLost`] is queued.
pub fn spawn_reader(
    mut reader: Box<dyn LineReader>,
    writer: SharedWriter,
    journal: Arc<EventJournal>,
    tx: DeliverySender,
    label: String,
) -> ReaderHandle {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop_flag);

    let handle = thread::spawn(move || {
        log_debug(&format!("reader thread started for {label}"));
        loop {
            if thread_stop.load(Ordering::Relaxed) {
                log_debug("reader thread stopping on request");
                return ReaderExit::Shutdown;
            }
            let line = match reader.read_line() {
                Ok(ReadOutcome::Line(line)) => line,
                Ok(ReadOutcome::Timeout) => continue,
                Err(err) => {
                    if thread_stop.load(Ordering::Relaxed) {
                        return ReaderExit::Shutdown;
                    }
                    let message = error_chain(&err);
                    log_debug(&format!("link {label} lost: {message}"));
                    tracing::warn!(link = %label, error = %message, "link lost");
                    writer.close();
                    let _ = tx.send(Delivery::Notice(LinkNotice::LinkLost(message)));
                    return ReaderExit::LinkLost;
                }
            };

            log_debug_content(&format!("rx line: {line:?}"));
            let Some(event) = decode_line(&line) else {
                continue;
            };
            if !publish_event(&journal, &tx, event) {
                log_debug("event queue dropped; reader thread exiting");
                return ReaderExit::Shutdown;
            }
        }
    });

    ReaderHandle {
        stop_flag,
        handle: Some(handle),
    }
}
