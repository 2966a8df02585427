use anyhow::Result;
use groundlink::{audio, link};

fn split_test_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

pub(crate) fn list_input_devices() -> Result<()> {
    // GROUNDLINK_TEST_DEVICES stands in for real hardware in tests.
    let devices = if let Ok(raw) = std::env::var("GROUNDLINK_TEST_DEVICES") {
        split_test_list(&raw)
    } else {
        audio::Recorder::list_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err}");
            Vec::new()
        })
    };

    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}

pub(crate) fn list_ports() -> Result<()> {
    let ports: Vec<(String, String)> = if let Ok(raw) = std::env::var("GROUNDLINK_TEST_PORTS") {
        split_test_list(&raw)
            .into_iter()
            .map(|name| (name, "test".to_string()))
            .collect()
    } else {
        link::available_ports()
            .unwrap_or_else(|err| {
                eprintln!("Failed to list serial ports: {err}");
                Vec::new()
            })
            .into_iter()
            .map(|port| (port.name, port.description))
            .collect()
    };

    if ports.is_empty() {
        println!("No serial ports detected.");
    } else {
        println!("Available serial ports:");
        for (name, description) in ports {
            println!("  - {name} ({description})");
        }
    }
    Ok(())
}
