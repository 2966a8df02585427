//! Outbound command path shared by the console and the voice pipeline.

use crate::journal::{EventJournal, LogRecord, StorageError};
use crate::link::{LinkError, SharedWriter};
use crate::protocol::{encode_command, Command};
use serde::Serialize;
use std::sync::Arc;

/// Who asked for a command. Only changes how it is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOrigin {
    Manual,
    Voice,
}

/// Log wording for a command issued from `origin`.
pub fn command_description(command: Command, origin: CommandOrigin) -> String {
    match (origin, command) {
        (CommandOrigin::Manual, Command::TurnOn) => "Command: ON".to_string(),
        (CommandOrigin::Manual, Command::TurnOff) => "Command: OFF".to_string(),
        (CommandOrigin::Manual, Command::RequestTemperature) => "Requested Temperature".to_string(),
        (CommandOrigin::Manual, Command::RequestLight) => "Requested Light".to_string(),
        (CommandOrigin::Voice, command) => format!("Voice Command: {}", command.wire_text()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Nothing reached the unit.
    #[error("command could not be sent")]
    Link(#[from] LinkError),

    /// The command was sent but its log row is missing.
    #[error("command was sent but not logged")]
    Journal(#[from] StorageError),
}

/// Writes commands to the link and records them.
#[derive(Clone)]
pub struct CommandSender {
    writer: SharedWriter,
    journal: Arc<EventJournal>,
}

impl CommandSender {
    pub fn new(writer: SharedWriter, journal: Arc<EventJournal>) -> Self {
        Self { writer, journal }
    }

    /// One write attempt; the log row is added only once the line is out.
    pub fn send(&self, command: Command, origin: CommandOrigin) -> Result<LogRecord, CommandError> {
        let line = encode_command(command);
        if let Err(err) = self.writer.write_line(&line) {
            crate::log_debug(&format!("send {command} failed: {err}"));
            return Err(err.into());
        }
        tracing::info!(command = %command, origin = ?origin, "command sent");
        let record = self
            .journal
            .record(&command_description(command, origin))?;
        Ok(record)
    }

    pub fn writer(&self) -> &SharedWriter {
        &self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::memory::{RecordingWriter, ScriptedReader};
    use crate::link::{Link, LinkState};
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::thread;

    fn sender_with(recorder: &RecordingWriter, name: &str) -> (CommandSender, PathBuf) {
        let path = env::temp_dir().join(format!(
            "groundlink_control_{name}_{}.csv",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        let journal = Arc::new(EventJournal::open(&path).expect("open journal"));
        let link = Link::new(
            "test",
            Box::new(ScriptedReader::from_lines(Vec::<String>::new())),
            Box::new(recorder.clone()),
        );
        let (_, writer) = link.into_parts();
        (CommandSender::new(writer, journal), path)
    }

    #[test]
    fn descriptions_follow_origin() {
        assert_eq!(
            command_description(Command::TurnOn, CommandOrigin::Manual),
            "Command: ON"
        );
        assert_eq!(
            command_description(Command::RequestLight, CommandOrigin::Manual),
            "Requested Light"
        );
        assert_eq!(
            command_description(Command::TurnOff, CommandOrigin::Voice),
            "Voice Command: OFF"
        );
    }

    #[test]
    fn send_writes_line_then_logs() {
        let recorder = RecordingWriter::new();
        let (sender, path) = sender_with(&recorder, "send");
        let record = sender
            .send(Command::RequestTemperature, CommandOrigin::Manual)
            .expect("send");
        assert_eq!(recorder.raw(), "GET_TEMP\n");
        assert_eq!(record.description, "Requested Temperature");
        let logged = sender.journal.query("").expect("query");
        assert_eq!(logged, vec![record]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn closed_link_sends_and_logs_nothing() {
        let recorder = RecordingWriter::new();
        let (sender, path) = sender_with(&recorder, "closed");
        sender.writer().close();
        assert_eq!(sender.writer().state(), LinkState::Closed);
        let err = sender
            .send(Command::TurnOn, CommandOrigin::Manual)
            .expect_err("closed link");
        assert!(matches!(err, CommandError::Link(LinkError::Closed)));
        assert!(recorder.raw().is_empty());
        assert!(sender.journal.query("").expect("query").is_empty());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn concurrent_commands_produce_whole_lines() {
        for round in 0..20 {
            let recorder = RecordingWriter::byte_at_a_time();
            let (sender, path) = sender_with(&recorder, &format!("race{round}"));
            let on = sender.clone();
            let temp = sender.clone();
            let a = thread::spawn(move || on.send(Command::TurnOn, CommandOrigin::Manual));
            let b = thread::spawn(move || {
                temp.send(Command::RequestTemperature, CommandOrigin::Manual)
            });
            a.join().expect("join").expect("send on");
            b.join().expect("join").expect("send temp");

            let mut lines = recorder.lines();
            lines.sort();
            assert_eq!(lines, vec!["GET_TEMP".to_string(), "ON".to_string()]);
            assert!(recorder.raw().ends_with('\n'));
            let _ = fs::remove_file(path);
        }
    }
}
