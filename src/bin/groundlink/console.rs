//! Stdin command reader for the interactive console.

use crossbeam_channel::Sender;
use groundlink::log_debug;
use groundlink::protocol::Command;
use std::io::{self, BufRead};
use std::thread;

/// One line typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsoleInput {
    Send(Command),
    Voice,
    SimulateObject,
    History(String),
    Help,
    Quit,
    Unknown(String),
}

pub(crate) const HELP: &str = "\
Commands:
  on | off          switch the unit on or off
  temp | light      request a temperature or light reading
  voice             speak ON or OFF
  simulate          raise an object alert without hardware
  history [filter]  show logged records containing filter
  help              show this list
  quit              exit";

/// Parse one console line. Blank lines yield `None`.
pub(crate) fn parse_input(line: &str) -> Option<ConsoleInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let input = match word.to_ascii_lowercase().as_str() {
        "voice" | "v" => ConsoleInput::Voice,
        "simulate" | "sim" => ConsoleInput::SimulateObject,
        "history" | "h" => ConsoleInput::History(rest.to_string()),
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" | "q" => ConsoleInput::Quit,
        _ => match word.parse::<Command>() {
            Ok(command) if rest.is_empty() => ConsoleInput::Send(command),
            _ => ConsoleInput::Unknown(line.to_string()),
        },
    };
    Some(input)
}

/// Read stdin on its own thread. The channel closes when stdin does.
pub(crate) fn spawn_input_thread(tx: Sender<ConsoleInput>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    log_debug(&format!("stdin read error: {err}"));
                    break;
                }
            };
            let Some(input) = parse_input(&line) else {
                continue;
            };
            let quit = input == ConsoleInput::Quit;
            if tx.send(input).is_err() || quit {
                return;
            }
        }
    })
}
