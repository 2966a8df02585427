//! Line protocol spoken with the sensor unit.
//!
//! Inbound lines decode into [`Event`]s; outbound [`Command`]s encode into
//! lines. Both directions are plain ASCII terminated by [`LINE_TERMINATOR`].
//! Decoding is total: anything the table below does not name comes back as
//! [`Event::Unrecognized`] so a noisy link never stops the reader.
//!
//! | Direction | Line | Meaning |
//! |---|---|---|
//! | in | `OBJECT` | object detected |
//! | in | `CLEAR` | object no longer detected |
//! | in | `TEMP:<v>` | temperature reading |
//! | in | `LIGHT:<v>` | light-level reading |
//! | out | `ON` / `OFF` | activate / deactivate |
//! | out | `GET_TEMP` / `GET_LIGHT` | request a reading |

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Terminator appended to every outbound line.
pub const LINE_TERMINATOR: &str = "\n";

const TEMPERATURE_PREFIX: &str = "TEMP";
const LIGHT_PREFIX: &str = "LIGHT";

// ============================================================================
// Events (unit → station)
// ============================================================================

/// A fact decoded from one inbound line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    ObjectDetected,
    ObjectCleared,
    /// Reading is passed through untouched; the unit decides its format.
    Temperature { value: String },
    LightLevel { value: String },
    /// Any line the protocol does not name, trimmed.
    Unrecognized { raw: String },
}

impl Event {
    /// Text recorded in the event log for this event.
    pub fn description(&self) -> String {
        match self {
            Event::ObjectDetected => "Object Detected".to_string(),
            Event::ObjectCleared => "Object Cleared".to_string(),
            Event::Temperature { value } => format!("Temperature: {value} °C"),
            Event::LightLevel { value } => format!("Light Intensity: {value}"),
            Event::Unrecognized { raw } => format!("Unrecognized: {raw}"),
        }
    }
}

/// Decode one inbound line.
///
/// Returns `None` for blank lines, which carry no event.
pub fn decode_line(line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let event = match line {
        "OBJECT" => Event::ObjectDetected,
        "CLEAR" => Event::ObjectCleared,
        _ => match line.split_once(':') {
            Some((TEMPERATURE_PREFIX, value)) => Event::Temperature {
                value: value.to_string(),
            },
            Some((LIGHT_PREFIX, value)) => Event::LightLevel {
                value: value.to_string(),
            },
            _ => Event::Unrecognized {
                raw: line.to_string(),
            },
        },
    };
    Some(event)
}

// ============================================================================
// Commands (station → unit)
// ============================================================================

/// An instruction for the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    TurnOn,
    TurnOff,
    RequestTemperature,
    RequestLight,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::TurnOn,
        Command::TurnOff,
        Command::RequestTemperature,
        Command::RequestLight,
    ];

    /// Canonical wire text, without the terminator.
    pub fn wire_text(self) -> &'static str {
        match self {
            Command::TurnOn => "ON",
            Command::TurnOff => "OFF",
            Command::RequestTemperature => "GET_TEMP",
            Command::RequestLight => "GET_LIGHT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_text())
    }
}

/// Encode a command as the exact bytes written to the link.
pub fn encode_command(command: Command) -> String {
    format!("{}{LINE_TERMINATOR}", command.wire_text())
}

/// Error returned when console text names no command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command '{0}' (expected on, off, temp, or light)")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(Command::TurnOn),
            "off" => Ok(Command::TurnOff),
            "temp" | "get_temp" | "get-temp" | "temperature" => Ok(Command::RequestTemperature),
            "light" | "get_light" | "get-light" => Ok(Command::RequestLight),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_object_and_clear() {
        assert_eq!(decode_line("OBJECT"), Some(Event::ObjectDetected));
        assert_eq!(decode_line("CLEAR"), Some(Event::ObjectCleared));
    }

    #[test]
    fn trims_whitespace_and_carriage_returns() {
        assert_eq!(decode_line("  OBJECT\r\n"), Some(Event::ObjectDetected));
        assert_eq!(
            decode_line("TEMP:25\r"),
            Some(Event::Temperature {
                value: "25".to_string()
            })
        );
    }

    #[test]
    fn readings_keep_raw_remainder_after_first_colon() {
        assert_eq!(
            decode_line("TEMP:23.5"),
            Some(Event::Temperature {
                value: "23.5".to_string()
            })
        );
        assert_eq!(
            decode_line("LIGHT:812:extra"),
            Some(Event::LightLevel {
                value: "812:extra".to_string()
            })
        );
        assert_eq!(
            decode_line("TEMP:"),
            Some(Event::Temperature {
                value: String::new()
            })
        );
    }

    #[test]
    fn blank_lines_produce_no_event() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("   \r\n"), None);
    }

    #[test]
    fn unknown_lines_pass_through_untouched() {
        for raw in ["object", "HELLO", "TEMP 25", "HUMIDITY:40", ":::", "\u{fffd}\u{fffd}"] {
            assert_eq!(
                decode_line(raw),
                Some(Event::Unrecognized {
                    raw: raw.to_string()
                }),
                "line {raw:?}"
            );
        }
    }

    #[test]
    fn decoding_is_deterministic() {
        for raw in ["OBJECT", "TEMP:1", "LIGHT:2", "noise", ""] {
            assert_eq!(decode_line(raw), decode_line(raw));
        }
    }

    #[test]
    fn encodes_every_command_with_terminator() {
        assert_eq!(encode_command(Command::TurnOn), "ON\n");
        assert_eq!(encode_command(Command::TurnOff), "OFF\n");
        assert_eq!(encode_command(Command::RequestTemperature), "GET_TEMP\n");
        assert_eq!(encode_command(Command::RequestLight), "GET_LIGHT\n");
    }

    #[test]
    fn outbound_lines_read_back_as_their_canonical_text() {
        for command in Command::ALL {
            let line = encode_command(command);
            assert_eq!(line.trim(), command.wire_text());
            assert_eq!(
                decode_line(&line),
                Some(Event::Unrecognized {
                    raw: command.wire_text().to_string()
                })
            );
        }
    }

    #[test]
    fn event_descriptions_match_log_wording() {
        assert_eq!(Event::ObjectDetected.description(), "Object Detected");
        assert_eq!(
            Event::Temperature {
                value: "23".to_string()
            }
            .description(),
            "Temperature: 23 °C"
        );
        assert_eq!(
            Event::LightLevel {
                value: "300".to_string()
            }
            .description(),
            "Light Intensity: 300"
        );
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_string(&Event::Temperature {
            value: "21".to_string(),
        })
        .expect("serialize");
        assert_eq!(json, r#"{"event":"temperature","value":"21"}"#);
        let json = serde_json::to_string(&Event::ObjectDetected).expect("serialize");
        assert_eq!(json, r#"{"event":"object_detected"}"#);
    }

    #[test]
    fn parses_console_command_names() {
        assert_eq!("ON".parse::<Command>(), Ok(Command::TurnOn));
        assert_eq!(" off ".parse::<Command>(), Ok(Command::TurnOff));
        assert_eq!("temp".parse::<Command>(), Ok(Command::RequestTemperature));
        assert_eq!("get_light".parse::<Command>(), Ok(Command::RequestLight));
        assert!("toggle".parse::<Command>().is_err());
    }
}
