//! # Line Source Module
//!
//! Line-oriented reads from an open serial port.
//!
//! The wedge loop only sees the [`LineSource`] trait, so it can be driven by a
//! real [`SerialConnection`] or by a test double.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use log::{debug, error, info};
use tokio_serial::{DataBits, FlowControl, SerialPort, SerialPortBuilder};

use super::config::{Parity, SerialConfig, StopBits};
use crate::error::{Result, WedgeError};

/// line terminator sent by the instrument
pub const LINE_TERMINATOR: u8 = b'\n';

/// longest unterminated line kept before it is handed out anyway
pub const MAX_LINE_LEN: usize = 4096;

/// size of a single read from the port
const READ_CHUNK: usize = 256;

/// One line as received, terminator included. Empty when a read timed out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawLine(Vec<u8>);

impl RawLine {
    /// the idle result of a timed out read
    pub fn empty() -> Self {
        Self::default()
    }

    /// is the line empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decodes the line as text, replacing invalid UTF-8 sequences.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<Vec<u8>> for RawLine {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for RawLine {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

/// A blocking source of lines, owned by exactly one wedge loop at a time.
#[cfg_attr(test, mockall::automock)]
pub trait LineSource {
    /// Waits at most `timeout` for a complete line.
    ///
    /// Returns an empty [`RawLine`] when nothing arrived in time, and
    /// [`WedgeError::ConnectionLost`] when the transport is gone.
    fn read_line(&mut self, timeout: Duration) -> Result<RawLine>;

    /// Releases the underlying handle. Safe to call more than once.
    fn close(&mut self);
}

/// Splits a byte stream into terminated lines, keeping the unfinished tail.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    /// append received bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Takes the next complete line, if one is buffered.
    ///
    /// A tail longer than [`MAX_LINE_LEN`] without a terminator is returned as a
    /// line of its own.
    pub fn take_line(&mut self) -> Option<RawLine> {
        if let Some(pos) = self.pending.iter().position(|b| *b == LINE_TERMINATOR) {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            return Some(RawLine(line));
        }
        if self.pending.len() >= MAX_LINE_LEN {
            return Some(RawLine(std::mem::take(&mut self.pending)));
        }
        None
    }

    /// number of buffered bytes without a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// drop everything buffered
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// An open serial port read line by line.
pub struct SerialConnection {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
    framer: LineFramer,
}

impl SerialConnection {
    /// Opens the port named in `config` with its line settings.
    ///
    /// # Errors
    ///
    /// Returns [`WedgeError::DeviceUnavailable`] when the port does not exist, is
    /// claimed by another process, or the settings cannot be applied. The open
    /// is attempted once.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = builder_for(config)?.open().map_err(|e| {
            error!("Failed to open serial port {}: {}", config.port(), e);
            WedgeError::device_unavailable(config.port(), e.to_string())
        })?;
        info!("Opened serial port: {config}");
        Ok(Self {
            port_name: config.port().to_string(),
            port: Some(port),
            framer: LineFramer::default(),
        })
    }
}

impl LineSource for SerialConnection {
    fn read_line(&mut self, timeout: Duration) -> Result<RawLine> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.framer.take_line() {
                return Ok(line);
            }
            let Some(port) = self.port.as_mut() else {
                return Err(WedgeError::connection_lost(format!(
                    "{} is closed",
                    self.port_name
                )));
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(RawLine::empty());
            }
            port.set_timeout(remaining)
                .map_err(|e| WedgeError::connection_lost(e.to_string()))?;
            match port.read(&mut chunk) {
                Ok(0) => {
                    return Err(WedgeError::connection_lost(format!(
                        "{} reported end of stream",
                        self.port_name
                    )));
                }
                Ok(n) => self.framer.push(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(RawLine::empty());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(WedgeError::connection_lost(e.to_string())),
            }
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Closed serial port: {}", self.port_name);
        }
        self.framer.clear();
    }
}

impl Drop for SerialConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Lists the serial ports present on this machine.
///
/// # Errors
///
/// Returns [`WedgeError::DeviceUnavailable`] if the OS enumeration fails.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| WedgeError::device_unavailable("*", e.to_string()))?;
    let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
    debug!("Found {} serial ports", names.len());
    Ok(names)
}

/// Translates the config into the serial backend's builder.
///
/// The backend cannot express 9 data bits, 1.5 stop bits, or mark/space
/// parity, so those are reported as an unusable device setup.
fn builder_for(config: &SerialConfig) -> Result<SerialPortBuilder> {
    let unsupported =
        |what: String| WedgeError::device_unavailable(config.port(), format!("{what} not supported"));

    let data_bits = match config.byte_size() {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        other => return Err(unsupported(format!("{other} data bits"))),
    };
    let parity = match config.parity() {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
        other => return Err(unsupported(format!("{other} parity"))),
    };
    let stop_bits = match config.stop_bits() {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
        other => return Err(unsupported(format!("{other} stop bits"))),
    };

    Ok(tokio_serial::new(config.port(), config.baud_rate())
        .data_bits(data_bits)
        .parity(parity)
        .stop_bits(stop_bits)
        .flow_control(FlowControl::None)
        .timeout(config.read_timeout()))
}
