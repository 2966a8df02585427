use super::{LineReader, LineWriter, Link, LinkError, ReadOutcome};
use crate::config::PortConfig;
use crate::{log_debug, log_debug_content};
use serialport::{SerialPort, SerialPortType};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Longest inbound line kept before it is handed on unterminated.
const MAX_LINE_BYTES: usize = 4096;

/// One serial handle per process; set while a [`Link`] from [`open_serial`] is alive.
static SERIAL_OPEN: AtomicBool = AtomicBool::new(false);

/// Clears [`SERIAL_OPEN`] once both halves of the port are dropped.
struct OpenGuard;

impl Drop for OpenGuard {
    fn drop(&mut self) {
        SERIAL_OPEN.store(false, Ordering::SeqCst);
        log_debug("serial port released");
    }
}

/// Open the configured serial port and split it into link halves.
pub fn open_serial(config: &PortConfig) -> Result<Link, LinkError> {
    if SERIAL_OPEN
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(LinkError::AlreadyOpen(config.port.clone()));
    }
    let guard = Arc::new(OpenGuard);

    let open_err = |source| LinkError::Open {
        port: config.port.clone(),
        source,
    };
    let mut port = serialport::new(&config.port, config.baud)
        .timeout(config.read_timeout)
        .open()
        .map_err(open_err)?;
    // Boards with native USB only start talking once DTR is asserted.
    if let Err(err) = port.write_data_terminal_ready(true) {
        log_debug(&format!("serial port {}: could not assert DTR: {err}", config.port));
    }
    let write_half = port.try_clone().map_err(open_err)?;

    log_debug(&format!(
        "serial port {} opened at {} baud (read timeout {:?})",
        config.port, config.baud, config.read_timeout
    ));
    tracing::info!(
        port = %config.port,
        baud = config.baud,
        "link opened"
    );

    let reader = SerialLineReader {
        inner: BufReader::new(port),
        pending: Vec::new(),
        _guard: Arc::clone(&guard),
    };
    let writer = SerialLineWriter {
        port: write_half,
        _guard: guard,
    };
    Ok(Link::new(config.port.clone(), Box::new(reader), Box::new(writer)))
}

struct SerialLineReader {
    inner: BufReader<Box<dyn SerialPort>>,
    /// Bytes of a line whose terminator has not arrived yet.
    pending: Vec<u8>,
    _guard: Arc<OpenGuard>,
}

impl LineReader for SerialLineReader {
    fn read_line(&mut self) -> Result<ReadOutcome, LinkError> {
        let outcome = read_capped_line(&mut self.inner, &mut self.pending)?;
        if let ReadOutcome::Line(line) = &outcome {
            log_debug_content(&format!("serial rx: {line:?}"));
        }
        Ok(outcome)
    }
}

/// Read up to the next `\n`, keeping partial lines in `pending` across
/// timeouts. A line that reaches [`MAX_LINE_BYTES`] without a terminator is
/// returned as-is so a noisy link cannot grow the buffer forever.
fn read_capped_line<R: BufRead>(
    inner: &mut R,
    pending: &mut Vec<u8>,
) -> Result<ReadOutcome, LinkError> {
    let room = MAX_LINE_BYTES.saturating_sub(pending.len()).max(1) as u64;
    match inner.take(room).read_until(b'\n', pending) {
        Ok(_) if pending.last() == Some(&b'\n') => Ok(ReadOutcome::Line(take_line(pending))),
        Ok(_) if pending.len() >= MAX_LINE_BYTES => {
            log_debug(&format!(
                "inbound line exceeded {MAX_LINE_BYTES} bytes without a terminator"
            ));
            Ok(ReadOutcome::Line(take_line(pending)))
        }
        // EOF, possibly in the middle of a line.
        Ok(_) => Err(LinkError::Disconnected),
        Err(err) if is_timeout(&err) => Ok(ReadOutcome::Timeout),
        Err(err) if err.kind() == ErrorKind::Interrupted => Ok(ReadOutcome::Timeout),
        Err(err) => Err(LinkError::Io(err)),
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

/// Drain `pending` into a string without its `\n` / `\r\n` terminator.
fn take_line(pending: &mut Vec<u8>) -> String {
    let mut bytes = std::mem::take(pending);
    while matches!(bytes.last(), Some(b'\n' | b'\r')) {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

struct SerialLineWriter {
    port: Box<dyn SerialPort>,
    _guard: Arc<OpenGuard>,
}

impl LineWriter for SerialLineWriter {
    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        self.port.write_all(line.as_bytes())?;
        self.port.flush()?;
        log_debug_content(&format!("serial tx: {line:?}"));
        Ok(())
    }
}

/// A serial device found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// Enumerate serial devices for `--list-ports`.
pub fn available_ports() -> anyhow::Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|info| PortInfo {
            description: describe_port_type(&info.port_type),
            name: info.port_name,
        })
        .collect())
}

fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial device");
            format!("{product} ({:04x}:{:04x})", usb.vid, usb.pid)
        }
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}
