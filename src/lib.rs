//! # Serial Wedge
//!
//! A keyboard wedge: numeric readings from a serial instrument (scale,
//! caliper, meter) are typed into whichever application has focus, each
//! followed by Enter.
//!
//! ## Architecture
//!
//! The project is organized into the following modules:
//!
//! - [`serial`]: Line settings and line-oriented serial reads
//! - [`wedge`]: Token extraction, keystroke injection and the background loop
//! - [`session`]: The owner that starts, stops and cleans up a loop
//! - [`error`]: Custom error types for the application

pub mod error;
pub mod serial;
pub mod session;
pub mod wedge;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::error::*;
    pub use crate::serial::{LineSource, Parity, SerialConfig, SerialConnection, StopBits};
    pub use crate::session::Session;
    pub use crate::wedge::{EnigoEmitter, KeystrokeEmitter, WedgeLoop, WedgeSignal};
}
