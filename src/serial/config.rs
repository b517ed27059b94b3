use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, WedgeError};

/// serial port baud rate
pub const COMMON_BAUD_RATES: &[u32] = &[
    300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 28800, 38400, 57600, 115200,
];

/// default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// default byte size
pub const DEFAULT_BYTE_SIZE: u8 = 8;
/// default read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// serial port parity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parity {
    None,
    /// Default for the balances the wedge was first used with; override per device.
    #[default]
    Odd,
    Even,
    Mark,
    Space,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::None => write!(f, "None"),
            Parity::Odd => write!(f, "Odd"),
            Parity::Even => write!(f, "Even"),
            Parity::Mark => write!(f, "Mark"),
            Parity::Space => write!(f, "Space"),
        }
    }
}

impl FromStr for Parity {
    type Err = WedgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "none" => Ok(Parity::None),
            "o" | "odd" => Ok(Parity::Odd),
            "e" | "even" => Ok(Parity::Even),
            "m" | "mark" => Ok(Parity::Mark),
            "s" | "space" => Ok(Parity::Space),
            other => Err(WedgeError::invalid_config(format!("unknown parity '{other}'"))),
        }
    }
}

/// serial port stop bits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopBits::One => write!(f, "1"),
            StopBits::OnePointFive => write!(f, "1.5"),
            StopBits::Two => write!(f, "2"),
        }
    }
}

impl FromStr for StopBits {
    type Err = WedgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" => Ok(StopBits::One),
            "1.5" => Ok(StopBits::OnePointFive),
            "2" => Ok(StopBits::Two),
            other => Err(WedgeError::invalid_config(format!(
                "stop bits must be 1, 1.5 or 2, got '{other}'"
            ))),
        }
    }
}

/// Line settings for one serial connection.
///
/// Built once through [`SerialConfig::builder`] and never mutated afterwards,
/// so the settings a connection was opened with cannot drift while it runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialConfig {
    port: String,
    baud_rate: u32,
    parity: Parity,
    byte_size: u8,
    stop_bits: StopBits,
    read_timeout: Duration,
}

impl SerialConfig {
    /// Starts a configuration for `port` with the default line settings.
    pub fn builder(port: impl Into<String>) -> SerialConfigBuilder {
        SerialConfigBuilder {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::default(),
            byte_size: DEFAULT_BYTE_SIZE,
            stop_bits: StopBits::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// get port name
    pub fn port(&self) -> &str {
        &self.port
    }
    /// get baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
    /// get parity
    pub fn parity(&self) -> Parity {
        self.parity
    }
    /// get byte size
    pub fn byte_size(&self) -> u8 {
        self.byte_size
    }
    /// get stop bits
    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }
    /// get read timeout
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} baud, {} data bits, {} parity, {} stop bits, {:?} timeout",
            self.port, self.baud_rate, self.byte_size, self.parity, self.stop_bits, self.read_timeout
        )
    }
}

/// serial config builder
#[derive(Clone, Debug)]
pub struct SerialConfigBuilder {
    port: String,
    baud_rate: u32,
    parity: Parity,
    byte_size: u8,
    stop_bits: StopBits,
    read_timeout: Duration,
}

impl SerialConfigBuilder {
    /// set baud rate
    #[must_use]
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
    /// set parity
    #[must_use]
    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }
    /// set byte size
    #[must_use]
    pub fn byte_size(mut self, byte_size: u8) -> Self {
        self.byte_size = byte_size;
        self
    }
    /// set stop bits
    #[must_use]
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }
    /// set read timeout
    #[must_use]
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Validates the settings and freezes them into a [`SerialConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`WedgeError::InvalidConfig`] for an empty port name, a zero baud
    /// rate, a byte size outside `5..=9`, or a zero read timeout.
    pub fn build(self) -> Result<SerialConfig> {
        if self.port.trim().is_empty() {
            return Err(WedgeError::invalid_config("No Port Selected"));
        }
        if self.baud_rate == 0 {
            return Err(WedgeError::invalid_config("baud rate must be positive"));
        }
        if !(5..=9).contains(&self.byte_size) {
            return Err(WedgeError::invalid_config(format!(
                "byte size must be between 5 and 9, got {}",
                self.byte_size
            )));
        }
        if self.read_timeout.is_zero() {
            return Err(WedgeError::invalid_config("read timeout must be non-zero"));
        }
        Ok(SerialConfig {
            port: self.port,
            baud_rate: self.baud_rate,
            parity: self.parity,
            byte_size: self.byte_size,
            stop_bits: self.stop_bits,
            read_timeout: self.read_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SerialConfig::builder("COM3").build().unwrap();
        assert_eq!(config.port(), "COM3");
        assert_eq!(config.baud_rate(), 9600);
        assert_eq!(config.parity(), Parity::Odd);
        assert_eq!(config.byte_size(), 8);
        assert_eq!(config.stop_bits(), StopBits::One);
        assert_eq!(config.read_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_builder_overrides() {
        let config = SerialConfig::builder("/dev/ttyUSB0")
            .baud_rate(115200)
            .parity(Parity::None)
            .byte_size(7)
            .stop_bits(StopBits::Two)
            .read_timeout(Duration::from_millis(250))
            .build()
            .unwrap();
        assert_eq!(config.baud_rate(), 115200);
        assert_eq!(config.parity(), Parity::None);
        assert_eq!(config.byte_size(), 7);
        assert_eq!(config.stop_bits(), StopBits::Two);
        assert_eq!(config.read_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_empty_port_rejected() {
        let err = SerialConfig::builder("  ").build().unwrap_err();
        assert!(err.to_string().contains("No Port Selected"));
    }

    #[test]
    fn test_zero_baud_rejected() {
        assert!(SerialConfig::builder("COM1").baud_rate(0).build().is_err());
    }

    #[test]
    fn test_byte_size_range() {
        assert!(SerialConfig::builder("COM1").byte_size(4).build().is_err());
        assert!(SerialConfig::builder("COM1").byte_size(10).build().is_err());
        for size in 5..=9 {
            assert!(SerialConfig::builder("COM1").byte_size(size).build().is_ok());
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = SerialConfig::builder("COM1")
            .read_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(WedgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_parse_parity() {
        assert_eq!("odd".parse::<Parity>().unwrap(), Parity::Odd);
        assert_eq!("E".parse::<Parity>().unwrap(), Parity::Even);
        assert_eq!("Space".parse::<Parity>().unwrap(), Parity::Space);
        assert!("parity".parse::<Parity>().is_err());
    }

    #[test]
    fn test_parse_stop_bits() {
        assert_eq!("1".parse::<StopBits>().unwrap(), StopBits::One);
        assert_eq!("1.5".parse::<StopBits>().unwrap(), StopBits::OnePointFive);
        assert_eq!("2".parse::<StopBits>().unwrap(), StopBits::Two);
        assert!("3".parse::<StopBits>().is_err());
    }

    #[test]
    fn test_common_baud_rates_include_default() {
        assert!(COMMON_BAUD_RATES.contains(&DEFAULT_BAUD_RATE));
    }
}
