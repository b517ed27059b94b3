//! # Session Module
//!
//! The owner of a connection and its wedge loop.
//!
//! A [`Session`] starts at most one loop at a time, forwards stop requests, and
//! closes the connection once the loop reports back. Starting twice or
//! stopping with nothing running means the caller's state machine is broken;
//! both are logged as errors and refused.

use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{Result, WedgeError};
use crate::serial::LineSource;
use crate::wedge::{KeystrokeEmitter, WedgeHandle, WedgeLoop, WedgeSignal};

/// Bookkeeping for the single active wedge loop.
pub struct Session<S> {
    signals: UnboundedSender<WedgeSignal>,
    active: Option<WedgeHandle<S>>,
}

impl<S> Session<S>
where
    S: LineSource + Send + 'static,
{
    /// Creates an idle session whose loops report on `signals`.
    pub fn new(signals: UnboundedSender<WedgeSignal>) -> Self {
        Self {
            signals,
            active: None,
        }
    }

    /// is a loop bound to the connection
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Spawns a wedge loop over `source`.
    ///
    /// # Errors
    ///
    /// [`WedgeError::AlreadyRunning`] if a loop is active; `source` is dropped.
    /// [`WedgeError::Io`] if the worker thread cannot be spawned.
    pub fn start<E, F>(&mut self, source: S, make_emitter: F, timeout: Duration) -> Result<()>
    where
        E: KeystrokeEmitter,
        F: FnOnce() -> Result<E> + Send + 'static,
    {
        if self.active.is_some() {
            error!("Communication loop already started, something seriously wrong happened");
            return Err(WedgeError::AlreadyRunning);
        }
        let handle = WedgeLoop::spawn(source, make_emitter, timeout, self.signals.clone())?;
        self.active = Some(handle);
        info!("Connected");
        Ok(())
    }

    /// Asks the active loop to stop. Completion arrives as
    /// [`WedgeSignal::Aborted`], after which [`Session::finish`] must be called.
    ///
    /// # Errors
    ///
    /// [`WedgeError::NotRunning`] if no loop is active.
    pub fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.active.as_ref() else {
            error!("Communication loop already aborted, something seriously wrong happened");
            return Err(WedgeError::NotRunning);
        };
        if handle.request_abort() {
            info!("Disconnecting...");
        }
        Ok(())
    }

    /// Handles a loop's completion signal: joins the worker and closes the
    /// connection it hands back. A worker that panicked has already dropped
    /// the connection; the slot is cleared all the same so a new loop can start.
    ///
    /// # Errors
    ///
    /// [`WedgeError::NotRunning`] if no loop is active.
    pub fn finish(&mut self, signal: &WedgeSignal) -> Result<()> {
        let Some(handle) = self.active.take() else {
            error!("Received {signal:?} with no communication loop running");
            return Err(WedgeError::NotRunning);
        };
        match handle.join() {
            Ok(mut source) => source.close(),
            Err(e) => error!("{e}, connection dropped with it"),
        }
        match signal {
            WedgeSignal::Aborted => info!("Disconnected"),
            WedgeSignal::DeviceDisconnected(reason) => warn!("Device Disconnected: {reason}"),
            WedgeSignal::EmitterUnavailable(reason) => {
                error!("Keyboard injection unavailable: {reason}")
            }
            WedgeSignal::WorkerPanicked => error!("Communication loop crashed"),
        }
        Ok(())
    }
}
