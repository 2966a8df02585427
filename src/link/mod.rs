//! Byte-stream link to the sensor unit.
//!
//! The link is split into its two halves as soon as it opens:
//! - the [`LineReader`] is moved into the reader thread and is never shared
//! - the [`SharedWriter`] is cloned into every component that issues commands
//!   and serializes their writes behind one lock
//!
//! Both halves are trait objects so tests and replay mode can substitute the
//! in-memory doubles from [`memory`].

pub mod memory;
mod serial;
mod writer;

use std::io;

pub use serial::{available_ports, open_serial, PortInfo};
pub use writer::SharedWriter;

/// Result of one bounded read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One complete line without its terminator.
    Line(String),
    /// Nothing arrived within the read timeout. Not an error.
    Timeout,
}

/// Whether the link can still carry traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Open,
    Closed,
}

/// Failures on the physical channel. Every variant is fatal to the link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to open serial port '{port}'")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial port '{0}' is already open in this process")]
    AlreadyOpen(String),

    #[error("link I/O failed")]
    Io(#[from] io::Error),

    #[error("remote end disconnected")]
    Disconnected,

    #[error("link is closed")]
    Closed,
}

/// Read side of the link. Exactly one reader exists per link.
pub trait LineReader: Send {
    /// Block for at most the link's read timeout waiting for one line.
    fn read_line(&mut self) -> Result<ReadOutcome, LinkError>;
}

/// Write side of the link.
pub trait LineWriter: Send {
    /// Write `line` (already terminated) in full before returning.
    fn write_line(&mut self, line: &str) -> Result<(), LinkError>;
}

/// An open link, not yet split between reader thread and command issuers.
pub struct Link {
    reader: Box<dyn LineReader>,
    writer: SharedWriter,
    label: String,
}

impl Link {
    pub fn new(
        label: impl Into<String>,
        reader: Box<dyn LineReader>,
        writer: Box<dyn LineWriter>,
    ) -> Self {
        Self {
            reader,
            writer: SharedWriter::new(writer),
            label: label.into(),
        }
    }

    /// Human-readable name of the channel (port path, replay file, ...).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn into_parts(self) -> (Box<dyn LineReader>, SharedWriter) {
        (self.reader, self.writer)
    }
}
