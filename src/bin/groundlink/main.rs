//! GroundLink console entrypoint.
//!
//! # Architecture
//!
//! - Reader thread: decodes serial lines, logs them, and queues events
//! - Input thread: reads console commands from stdin
//! - Main loop: drains the event queue and runs console commands
//! - Voice worker: one short-lived thread per voice command

mod cli_utils;
mod console;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, TryRecvError};
use groundlink::audio::{self, Recorder, SharedAudio, WavSource};
use groundlink::config::AppConfig;
use groundlink::dispatch::LinkNotice;
use groundlink::journal::{query_log, EventJournal};
use groundlink::link::memory::{RecordingWriter, ScriptedReader};
use groundlink::link::{open_serial, Link};
use groundlink::station::GroundStation;
use groundlink::voice::{load_classifier, VoicePipeline};
use groundlink::{init_logging, init_tracing, install_panic_hook, log_debug, log_file_path};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli_utils::{list_input_devices, list_ports};
use crate::console::{spawn_input_thread, ConsoleInput, HELP};
use crate::render::Renderer;

/// Max pending console lines before the input thread blocks.
const INPUT_CHANNEL_CAPACITY: usize = 64;

/// How long one main-loop pass waits for queued deliveries.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    let mut config = AppConfig::parse();
    if config.list_input_devices {
        list_input_devices()?;
        return Ok(());
    }
    if config.list_ports {
        list_ports()?;
        return Ok(());
    }

    config.validate()?;
    init_logging(&config);
    init_tracing(&config);
    install_panic_hook();
    log_debug("=== GroundLink Started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let renderer = Renderer::new(config.json);

    if let Some(filter) = &config.history {
        return print_history(&config.log_file, filter, renderer);
    }

    let journal = Arc::new(
        EventJournal::open(&config.log_file)
            .with_context(|| format!("cannot use event log {}", config.log_file.display()))?,
    );

    if let Some(path) = &config.replay {
        let link = replay_link(path)?;
        let voice = VoicePipeline::new(None, None, config.voice_config());
        let station = GroundStation::start(link, journal, voice);
        return run_replay(station, renderer);
    }

    let link = open_serial(&config.port_config())
        .with_context(|| format!("cannot open serial port {}", config.port))?;

    if let Some(target) = config.send {
        let voice = VoicePipeline::new(None, None, config.voice_config());
        let station = GroundStation::start(link, journal, voice);
        return run_single_command(station, target.command(), &config, renderer);
    }

    let voice = build_voice_pipeline(&config);
    let station = GroundStation::start(link, journal, voice);
    run_console(station, renderer)
}

fn print_history(log_file: &Path, filter: &str, renderer: Renderer) -> Result<()> {
    let records = query_log(log_file, filter)?;
    if records.is_empty() {
        println!("No data found yet.");
        return Ok(());
    }
    for record in &records {
        println!("{}", renderer.record(record));
    }
    Ok(())
}

/// A link that plays back a captured transcript; writes go nowhere.
fn replay_link(path: &Path) -> Result<Link> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read replay file {}", path.display()))?;
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    log_debug(&format!("replaying {} lines from {}", lines.len(), path.display()));
    Ok(Link::new(
        path.display().to_string(),
        Box::new(ScriptedReader::from_lines(lines)),
        Box::new(RecordingWriter::new()),
    ))
}

fn build_voice_pipeline(config: &AppConfig) -> VoicePipeline {
    let audio: Option<SharedAudio> = match &config.voice_wav {
        Some(path) => Some(audio::shared(WavSource::new(path))),
        None => match Recorder::new(config.input_device.as_deref()) {
            Ok(recorder) => {
                log_debug(&format!("voice input: {}", recorder.device_name()));
                Some(audio::shared(recorder))
            }
            Err(err) => {
                log_debug(&format!("voice input unavailable: {err:#}"));
                eprintln!("Voice commands disabled: {err:#}");
                None
            }
        },
    };
    let classifier = match load_classifier(&config.model) {
        Ok(classifier) => Some(classifier),
        Err(err) => {
            eprintln!("Voice commands disabled: {err}");
            None
        }
    };
    VoicePipeline::new(audio, classifier, config.voice_config())
}

fn subscribe_output(station: &mut GroundStation, renderer: Renderer) {
    station.subscribe_events(move |event| println!("{}", renderer.event(event)));
    station.subscribe_notices(move |notice| println!("{}", renderer.notice(notice)));
    station.subscribe_voice(move |update| println!("{}", renderer.voice(update)));
}

fn run_replay(mut station: GroundStation, renderer: Renderer) -> Result<()> {
    station.subscribe_events(move |event| println!("{}", renderer.event(event)));
    station.subscribe_notices(move |notice| {
        // The transcript running out shows up as a lost link.
        if let LinkNotice::StorageFailed(_) = notice {
            println!("{}", renderer.notice(notice));
        }
    });
    while !station.reader_finished() {
        station.pump(POLL_INTERVAL);
    }
    station.shutdown();
    Ok(())
}

fn run_single_command(
    mut station: GroundStation,
    command: groundlink::protocol::Command,
    config: &AppConfig,
    renderer: Renderer,
) -> Result<()> {
    subscribe_output(&mut station, renderer);
    let result = station.send_command(command);
    if result.is_ok() && !config.json {
        println!("→ Sent {command}");
    }
    // Give the unit one read timeout to answer.
    let deadline = Instant::now() + Duration::from_millis(config.read_timeout_ms);
    while result.is_ok() && Instant::now() < deadline && !station.reader_finished() {
        station.pump(POLL_INTERVAL);
    }
    station.shutdown();
    result.map(|_| ()).map_err(anyhow::Error::from)
}

fn run_console(mut station: GroundStation, renderer: Renderer) -> Result<()> {
    subscribe_output(&mut station, renderer);
    let (tx, rx) = bounded(INPUT_CHANNEL_CAPACITY);
    // Detached: a blocked stdin read must not hold up exit.
    let _input = spawn_input_thread(tx);

    println!(
        "GroundLink connected to {}. Type 'help' for commands.",
        station.link_label()
    );
    'main: loop {
        station.pump(POLL_INTERVAL);
        loop {
            let input = match rx.try_recv() {
                Ok(input) => input,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'main,
            };
            if !handle_input(&mut station, input, renderer) {
                break 'main;
            }
        }
    }

    let exit = station.shutdown();
    log_debug(&format!("=== GroundLink Stopped ({exit:?}) ==="));
    Ok(())
}

/// Returns `false` when the console should exit.
fn handle_input(station: &mut GroundStation, input: ConsoleInput, renderer: Renderer) -> bool {
    match input {
        ConsoleInput::Send(command) => match station.send_command(command) {
            Ok(_) => println!("→ Sent {command}"),
            Err(err) => println!("✖ {}", groundlink::error_chain(&err)),
        },
        ConsoleInput::Voice => {
            if let Err(err) = station.start_voice_command() {
                println!("✖ {err}");
            }
        }
        ConsoleInput::SimulateObject => station.simulate_object_detection(),
        ConsoleInput::History(filter) => match station.query_log(&filter) {
            Ok(records) if records.is_empty() => println!("No data found yet."),
            Ok(records) => {
                for record in &records {
                    println!("{}", renderer.record(record));
                }
            }
            Err(err) => println!("✖ {}", groundlink::error_chain(&err)),
        },
        ConsoleInput::Help => println!("{HELP}"),
        ConsoleInput::Quit => return false,
        ConsoleInput::Unknown(text) => {
            println!("Unknown command '{text}'. Type 'help' for commands.")
        }
    }
    true
}
