//! Synthetic keyboard input.

use std::fmt;

use enigo::{Direction, Enigo, Keyboard, Settings};
use log::debug;

use crate::error::{Result, WedgeError};

/// keys the wedge presses besides literal text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Enter,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Enter => write!(f, "Enter"),
        }
    }
}

impl From<Key> for enigo::Key {
    fn from(key: Key) -> Self {
        match key {
            Key::Enter => enigo::Key::Return,
        }
    }
}

/// Platform capability that types into whatever window has focus.
#[cfg_attr(test, mockall::automock)]
pub trait KeystrokeEmitter {
    /// Types `text` as a run of character keystrokes.
    fn type_text(&mut self, text: &str) -> Result<()>;

    /// Pushes `key` down.
    fn press(&mut self, key: Key) -> Result<()>;

    /// Lets `key` back up.
    fn release(&mut self, key: Key) -> Result<()>;

    /// Presses and then releases `key`. The release is skipped if the press
    /// was refused.
    fn press_and_release(&mut self, key: Key) -> Result<()> {
        self.press(key)?;
        self.release(key)
    }
}

/// [`KeystrokeEmitter`] backed by the OS input APIs through `enigo`.
pub struct EnigoEmitter {
    enigo: Enigo,
}

impl EnigoEmitter {
    /// Connects to the platform input system.
    ///
    /// # Errors
    ///
    /// Returns [`WedgeError::Keystroke`] when no input backend is reachable,
    /// e.g. a Linux session without an X server.
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| WedgeError::keystroke(e.to_string()))?;
        debug!("Keyboard injection ready");
        Ok(Self { enigo })
    }
}

impl KeystrokeEmitter for EnigoEmitter {
    fn type_text(&mut self, text: &str) -> Result<()> {
        self.enigo
            .text(text)
            .map_err(|e| WedgeError::keystroke(e.to_string()))
    }

    fn press(&mut self, key: Key) -> Result<()> {
        self.enigo
            .key(key.into(), Direction::Press)
            .map_err(|e| WedgeError::keystroke(e.to_string()))
    }

    fn release(&mut self, key: Key) -> Result<()> {
        self.enigo
            .key(key.into(), Direction::Release)
            .map_err(|e| WedgeError::keystroke(e.to_string()))
    }
}
