//! # Error Module
//!
//! This module provides custom error types for the `serial_wedge` application.
//! It uses the `thiserror` crate for ergonomic error handling.
//!
//! A reading without a numeric token is not an error and has no variant here;
//! the token extractor reports it as `None`.

use thiserror::Error;

/// Result type alias for `serial_wedge` operations.
pub type Result<T> = std::result::Result<T, WedgeError>;

/// Main error type for the `serial_wedge` application.
#[derive(Debug, Error)]
pub enum WedgeError {
    /// The port is missing, busy, or cannot be opened with the requested settings.
    #[error("Failed to open serial port '{port_name}': {reason}")]
    DeviceUnavailable { port_name: String, reason: String },

    /// The device went away while the connection was open.
    #[error("Serial connection lost: {0}")]
    ConnectionLost(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The platform refused a synthetic keystroke.
    #[error("Keystroke injection failed: {0}")]
    Keystroke(String),

    /// A wedge loop is already bound to the connection.
    #[error("Communication loop already started")]
    AlreadyRunning,

    /// There is no wedge loop to stop or finish.
    #[error("Communication loop is not running")]
    NotRunning,

    /// The worker thread panicked instead of returning the connection.
    #[error("Communication thread panicked")]
    WorkerPanicked,

    /// I/O error outside the serial read path, e.g. spawning the worker thread.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WedgeError {
    /// Creates a new device unavailable error.
    #[must_use]
    pub fn device_unavailable(port_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            port_name: port_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new connection lost error.
    #[must_use]
    pub fn connection_lost(msg: impl Into<String>) -> Self {
        Self::ConnectionLost(msg.into())
    }

    /// Creates a new invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates a new keystroke error.
    #[must_use]
    pub fn keystroke(msg: impl Into<String>) -> Self {
        Self::Keystroke(msg.into())
    }

    /// Returns `true` if the error means the device disappeared mid-session.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}
