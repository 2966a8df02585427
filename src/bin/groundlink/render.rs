//! Console output for events, notices, voice progress, and history.

use groundlink::dispatch::LinkNotice;
use groundlink::journal::LogRecord;
use groundlink::protocol::{Command, Event};
use groundlink::voice::{VoiceStage, VoiceUpdate};
use serde::Serialize;

/// Prints either human-readable lines or one JSON object per line.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Renderer {
    json: bool,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum NoticeJson<'a> {
    LinkLost { reason: &'a str },
    StorageFailed { reason: &'a str },
}

impl Renderer {
    pub(crate) fn new(json: bool) -> Self {
        Self { json }
    }

    pub(crate) fn event(&self, event: &Event) -> String {
        if self.json {
            return to_json(event);
        }
        match event {
            Event::ObjectDetected => "🚨 Object Detected!".to_string(),
            Event::ObjectCleared => "✅ Object Cleared".to_string(),
            Event::Temperature { value } => format!("🌡  Temperature: {value} °C"),
            Event::LightLevel { value } => format!("💡 Light Intensity: {value}"),
            Event::Unrecognized { raw } => format!("Received: {raw}"),
        }
    }

    pub(crate) fn notice(&self, notice: &LinkNotice) -> String {
        if self.json {
            return to_json(&match notice {
                LinkNotice::LinkLost(reason) => NoticeJson::LinkLost { reason },
                LinkNotice::StorageFailed(reason) => NoticeJson::StorageFailed { reason },
            });
        }
        match notice {
            LinkNotice::LinkLost(reason) => format!("⚠ Link lost: {reason}. Live updates stopped."),
            LinkNotice::StorageFailed(reason) => format!("⚠ Event not logged: {reason}"),
        }
    }

    pub(crate) fn voice(&self, update: &VoiceUpdate) -> String {
        if self.json {
            return to_json(update);
        }
        match update {
            VoiceUpdate::Stage {
                stage: VoiceStage::Capturing,
            } => "🎙 Speak ON or OFF...".to_string(),
            VoiceUpdate::Stage { stage } => format!("   voice: {}", stage.label()),
            VoiceUpdate::Completed { outcome } => {
                let mut line = match outcome.command {
                    Command::TurnOn => "🟢 System turned ON (voice)".to_string(),
                    _ => "🔴 System turned OFF (voice)".to_string(),
                };
                if let Some(err) = &outcome.log_error {
                    line.push_str(&format!(" [not logged: {err}]"));
                }
                line
            }
            VoiceUpdate::Failed { reason } => format!("✖ Voice command failed: {reason}"),
        }
    }

    pub(crate) fn record(&self, record: &LogRecord) -> String {
        if self.json {
            return to_json(record);
        }
        format!("{}  {}", record.timestamp_text(), record.description)
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|err| format!("{{\"error\":\"{err}\"}}"))
}
