//! In-memory link halves for tests and replay mode.

use super::{LineReader, LineWriter, Link, LinkError, ReadOutcome};
use crate::lock_or_recover;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// What a [`ScriptedReader`] does once its script runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenExhausted {
    /// Report [`LinkError::Disconnected`], like a cable being pulled.
    Disconnect,
    /// Keep returning [`ReadOutcome::Timeout`] after sleeping for the given time.
    Idle(Duration),
}

/// Reader that plays back a fixed sequence of read results.
pub struct ScriptedReader {
    script: VecDeque<Result<ReadOutcome, LinkError>>,
    when_exhausted: WhenExhausted,
}

impl ScriptedReader {
    pub fn new(
        script: impl IntoIterator<Item = Result<ReadOutcome, LinkError>>,
        when_exhausted: WhenExhausted,
    ) -> Self {
        Self {
            script: script.into_iter().collect(),
            when_exhausted,
        }
    }

    /// Every line arrives in order, then the link disconnects.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            lines
                .into_iter()
                .map(|line| Ok(ReadOutcome::Line(line.into()))),
            WhenExhausted::Disconnect,
        )
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self) -> Result<ReadOutcome, LinkError> {
        if let Some(next) = self.script.pop_front() {
            return next;
        }
        match self.when_exhausted {
            WhenExhausted::Disconnect => Err(LinkError::Disconnected),
            WhenExhausted::Idle(pause) => {
                thread::sleep(pause);
                Ok(ReadOutcome::Timeout)
            }
        }
    }
}

/// Reader fed line by line from another thread.
///
/// Waits up to `timeout` per read, like a serial port with a read timeout.
/// Dropping every sender disconnects the link.
pub struct ChannelReader {
    rx: Receiver<String>,
    timeout: Duration,
}

impl ChannelReader {
    pub fn channel(timeout: Duration) -> (Sender<String>, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (tx, Self { rx, timeout })
    }
}

impl LineReader for ChannelReader {
    fn read_line(&mut self) -> Result<ReadOutcome, LinkError> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(RecvTimeoutError::Timeout) => Ok(ReadOutcome::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Disconnected),
        }
    }
}

/// Writer that keeps every byte it is given. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    written: Arc<Mutex<String>>,
    byte_at_a_time: bool,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one byte at a time and yield between bytes, so unsynchronized
    /// callers would visibly splice their lines.
    pub fn byte_at_a_time() -> Self {
        Self {
            written: Arc::default(),
            byte_at_a_time: true,
        }
    }

    /// Everything written so far.
    pub fn raw(&self) -> String {
        lock_or_recover(&self.written, "recording writer").clone()
    }

    /// Complete lines written so far, without terminators.
    pub fn lines(&self) -> Vec<String> {
        let raw = self.raw();
        let complete = match raw.rfind('\n') {
            Some(end) => &raw[..end],
            None => return Vec::new(),
        };
        complete.split('\n').map(str::to_string).collect()
    }
}

impl LineWriter for RecordingWriter {
    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        if !self.byte_at_a_time {
            lock_or_recover(&self.written, "recording writer").push_str(line);
            return Ok(());
        }
        for ch in line.chars() {
            lock_or_recover(&self.written, "recording writer").push(ch);
            thread::yield_now();
        }
        Ok(())
    }
}

/// A link that reads `lines` and records whatever is written to it.
pub fn scripted_link<I, S>(lines: I) -> (Link, RecordingWriter)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let recorder = RecordingWriter::new();
    let link = Link::new(
        "scripted",
        Box::new(ScriptedReader::from_lines(lines)),
        Box::new(recorder.clone()),
    );
    (link, recorder)
}
