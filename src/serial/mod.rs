//! Serial port access: line settings and line-oriented reads.

pub mod config;
pub mod source;

pub use config::{COMMON_BAUD_RATES, Parity, SerialConfig, SerialConfigBuilder, StopBits};
pub use source::{LineSource, RawLine, SerialConnection, list_ports};
