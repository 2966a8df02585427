//! The ground station: link, reader thread, command path, voice, and log
//! wired together behind the consumer-facing operations.

use crate::control::{CommandError, CommandOrigin, CommandSender};
use crate::dispatch::{publish_event, spawn_reader, EventQueue, LinkNotice, ReaderExit, ReaderHandle};
use crate::journal::{query_log, EventJournal, LogRecord, StorageError};
use crate::link::{Link, LinkState};
use crate::log_debug;
use crate::protocol::{Command, Event};
use crate::voice::{start_voice_job, VoiceJob, VoicePipeline, VoicePipelineError, VoiceUpdate};
use std::sync::Arc;
use std::time::Duration;

pub struct GroundStation {
    queue: EventQueue,
    reader: Option<ReaderHandle>,
    commands: CommandSender,
    journal: Arc<EventJournal>,
    voice: Arc<VoicePipeline>,
    voice_job: Option<VoiceJob>,
    link_label: String,
}

impl GroundStation {
    /// Split `link`, start the reader thread, and get ready to accept commands.
    pub fn start(link: Link, journal: Arc<EventJournal>, voice: VoicePipeline) -> Self {
        let link_label = link.label().to_string();
        let (reader, writer) = link.into_parts();
        let queue = EventQueue::new();
        let reader = spawn_reader(
            reader,
            writer.clone(),
            Arc::clone(&journal),
            queue.sender(),
            link_label.clone(),
        );
        log_debug(&format!("ground station started on {link_label}"));
        Self {
            queue,
            reader: Some(reader),
            commands: CommandSender::new(writer, Arc::clone(&journal)),
            journal,
            voice: Arc::new(voice),
            voice_job: None,
            link_label,
        }
    }

    pub fn link_label(&self) -> &str {
        &self.link_label
    }

    pub fn link_state(&self) -> LinkState {
        self.commands.writer().state()
    }

    pub fn subscribe_events(&mut self, callback: impl FnMut(&Event) + 'static) {
        self.queue.subscribe_events(callback);
    }

    pub fn subscribe_notices(&mut self, callback: impl FnMut(&LinkNotice) + 'static) {
        self.queue.subscribe_notices(callback);
    }

    pub fn subscribe_voice(&mut self, callback: impl FnMut(&VoiceUpdate) + 'static) {
        self.queue.subscribe_voice(callback);
    }

    /// Write one manual command and record it.
    pub fn send_command(&self, command: Command) -> Result<LogRecord, CommandError> {
        self.commands.send(command, CommandOrigin::Manual)
    }

    /// Raise an object alert without hardware, as if the unit had sent
    /// `OBJECT`. It is logged and delivered exactly like a received event.
    pub fn simulate_object_detection(&self) {
        log_debug("simulated object detection");
        publish_event(&self.journal, &self.queue.sender(), Event::ObjectDetected);
    }

    /// Start a voice run in the background.
    ///
    /// Fails immediately with [`VoicePipelineError::Busy`] while another run
    /// is in flight, and with the preflight error when audio or the
    /// classifier is missing.
    pub fn start_voice_command(&mut self) -> Result<(), VoicePipelineError> {
        if self.voice_job.as_ref().is_some_and(|job| !job.is_finished()) {
            return Err(VoicePipelineError::Busy);
        }
        if let Some(previous) = self.voice_job.take() {
            let _ = previous.wait();
        }
        let job = start_voice_job(
            Arc::clone(&self.voice),
            self.commands.clone(),
            self.queue.sender(),
        )?;
        self.voice_job = Some(job);
        Ok(())
    }

    pub fn voice_busy(&self) -> bool {
        self.voice_job.as_ref().is_some_and(|job| !job.is_finished())
    }

    pub fn query_log(&self, filter: &str) -> Result<Vec<LogRecord>, StorageError> {
        query_log(self.journal.path(), filter)
    }

    /// Run callbacks for everything queued so far.
    pub fn drain(&mut self) -> usize {
        self.queue.drain()
    }

    /// Wait up to `timeout` for something to arrive, then drain.
    pub fn pump(&mut self, timeout: Duration) -> usize {
        self.queue.wait_and_drain(timeout)
    }

    /// True once the reader thread has exited on its own.
    pub fn reader_finished(&self) -> bool {
        self.reader.as_ref().map_or(true, ReaderHandle::is_finished)
    }

    /// Stop the reader, wait for any voice run, close the link, and flush
    /// the remaining deliveries to subscribers.
    pub fn shutdown(mut self) -> ReaderExit {
        let exit = self
            .reader
            .take()
            .map_or(ReaderExit::Shutdown, ReaderHandle::shutdown);
        if let Some(job) = self.voice_job.take() {
            let _ = job.wait();
        }
        self.commands.writer().close();
        self.queue.drain();
        log_debug(&format!("ground station stopped ({exit:?})"));
        exit
    }
}
