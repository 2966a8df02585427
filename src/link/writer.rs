use super::{LineWriter, LinkError, LinkState};
use crate::lock_or_recover;
use std::sync::{Arc, Mutex};

/// Cloneable handle to the link's write side.
///
/// Every write takes the same lock for the whole line, so lines from
/// concurrent issuers never interleave. Closing drops the underlying writer;
/// later writes fail with [`LinkError::Closed`].
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<Mutex<Option<Box<dyn LineWriter>>>>,
}

impl SharedWriter {
    pub(super) fn new(writer: Box<dyn LineWriter>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(writer))),
        }
    }

    /// Write one terminated line. An I/O failure closes the link.
    pub fn write_line(&self, line: &str) -> Result<(), LinkError> {
        let mut slot = lock_or_recover(&self.inner, "link writer");
        let Some(writer) = slot.as_mut() else {
            return Err(LinkError::Closed);
        };
        match writer.write_line(line) {
            Ok(()) => Ok(()),
            Err(err) => {
                crate::log_debug(&format!("link write failed, closing link: {err}"));
                *slot = None;
                Err(err)
            }
        }
    }

    pub fn state(&self) -> LinkState {
        if lock_or_recover(&self.inner, "link writer").is_some() {
            LinkState::Open
        } else {
            LinkState::Closed
        }
    }

    /// Drop the write half. Idempotent.
    pub fn close(&self) {
        let writer = lock_or_recover(&self.inner, "link writer").take();
        if writer.is_some() {
            crate::log_debug("link writer closed");
        }
    }
}
