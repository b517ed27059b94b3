//! The keyboard wedge: serial readings in, keystrokes out.

pub mod keystroke;
pub mod runner;
pub mod state;
pub mod token;

pub use keystroke::{EnigoEmitter, Key, KeystrokeEmitter};
pub use runner::{Iteration, WedgeHandle, WedgeLoop, WedgeSignal};
pub use state::{AbortHandle, LoopState};
pub use token::extract_token;
