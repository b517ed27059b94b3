//! # Runner Module
//!
//! The read → parse → type cycle and the worker thread it runs on.
//!
//! The loop owns its [`LineSource`] while it runs and hands it back when it
//! exits, so closing the connection stays with the owner. Completion is
//! reported once, as a [`WedgeSignal`] on the channel given at spawn time.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc::UnboundedSender;

use super::keystroke::{Key, KeystrokeEmitter};
use super::state::{AbortHandle, LoopState};
use super::token::token_from_line;
use crate::error::{Result, WedgeError};
use crate::serial::LineSource;

/// name of the worker thread
const WORKER_NAME: &str = "wedge-loop";

/// Completion notification sent from the loop to its owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WedgeSignal {
    /// the loop stopped because the owner asked it to
    Aborted,
    /// the device went away; the connection is dead
    DeviceDisconnected(String),
    /// the keyboard backend could not be reached, nothing was read
    EmitterUnavailable(String),
    /// the worker thread panicked; the source went down with it
    WorkerPanicked,
}

/// What a single iteration did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Iteration {
    /// the read timed out
    Idle,
    /// a line arrived without a numeric token
    NoToken,
    /// the token was typed, followed by Enter
    Emitted(String),
    /// the token was found but the keyboard backend refused it
    Dropped(String),
}

/// One wedge loop bound to one line source.
pub struct WedgeLoop<S, E> {
    source: S,
    emitter: E,
    timeout: Duration,
    handle: AbortHandle,
}

impl<S, E> WedgeLoop<S, E>
where
    S: LineSource,
    E: KeystrokeEmitter,
{
    /// Binds a loop to `source`, reading with `timeout` per iteration.
    pub fn new(source: S, emitter: E, timeout: Duration) -> Self {
        Self::with_handle(source, emitter, timeout, AbortHandle::new())
    }

    fn with_handle(source: S, emitter: E, timeout: Duration, handle: AbortHandle) -> Self {
        Self {
            source,
            emitter,
            timeout,
            handle,
        }
    }

    /// handle for requesting an abort from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.clone()
    }

    /// current state
    pub fn state(&self) -> LoopState {
        self.handle.state()
    }

    /// Runs one read → parse → type cycle.
    ///
    /// # Errors
    ///
    /// Returns the source's error, normally [`WedgeError::ConnectionLost`].
    /// A missing token is `Ok(Iteration::NoToken)`.
    pub fn step(&mut self) -> Result<Iteration> {
        let line = self.source.read_line(self.timeout)?;
        if line.is_empty() {
            return Ok(Iteration::Idle);
        }
        let Some(token) = token_from_line(&line) else {
            debug!("No reading in line {:?}", line.to_text());
            return Ok(Iteration::NoToken);
        };
        match self.emit(&token) {
            Ok(()) => {
                debug!("Typed reading {token}");
                Ok(Iteration::Emitted(token))
            }
            Err(e) => {
                warn!("Dropped reading {token}: {e}");
                Ok(Iteration::Dropped(token))
            }
        }
    }

    /// The whole token goes out before Enter; abort is only checked between
    /// iterations, so a reading is never cut short.
    fn emit(&mut self, token: &str) -> Result<()> {
        self.emitter.type_text(token)?;
        self.emitter.press_and_release(Key::Enter)
    }

    /// Loops until aborted or disconnected, signals the outcome once, and
    /// returns the still-open source to the caller.
    pub fn run(mut self, signals: &UnboundedSender<WedgeSignal>) -> S {
        info!("Wedge loop started");
        let signal = loop {
            if self.handle.state().is_abort_requested() {
                info!("Wedge loop aborted");
                break WedgeSignal::Aborted;
            }
            if let Err(e) = self.step() {
                warn!("Device disconnected: {e}");
                break WedgeSignal::DeviceDisconnected(e.to_string());
            }
        };
        self.handle.mark_stopped();
        send_signal(signals, signal);
        self.source
    }
}

impl<S, E> WedgeLoop<S, E>
where
    S: LineSource + Send + 'static,
    E: KeystrokeEmitter,
{
    /// Starts a loop on its own thread.
    ///
    /// The emitter is built on the worker thread by `make_emitter`, since
    /// platform input handles may not be movable between threads. If that
    /// fails the loop signals [`WedgeSignal::EmitterUnavailable`] without
    /// reading anything.
    ///
    /// # Errors
    ///
    /// Returns [`WedgeError::Io`] if the thread cannot be spawned.
    pub fn spawn<F>(
        source: S,
        make_emitter: F,
        timeout: Duration,
        signals: UnboundedSender<WedgeSignal>,
    ) -> Result<WedgeHandle<S>>
    where
        F: FnOnce() -> Result<E> + Send + 'static,
    {
        let abort = AbortHandle::new();
        let worker_abort = abort.clone();
        let join = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                let _guard = PanicGuard {
                    handle: worker_abort.clone(),
                    signals: signals.clone(),
                };
                match make_emitter() {
                    Ok(emitter) => {
                        WedgeLoop::with_handle(source, emitter, timeout, worker_abort).run(&signals)
                    }
                    Err(e) => {
                        error!("Keyboard injection unavailable: {e}");
                        worker_abort.mark_stopped();
                        send_signal(&signals, WedgeSignal::EmitterUnavailable(e.to_string()));
                        source
                    }
                }
            })?;
        Ok(WedgeHandle { abort, join })
    }
}

/// Sends [`WedgeSignal::WorkerPanicked`] if the worker unwinds, so the owner
/// is never left waiting for a signal that cannot come.
struct PanicGuard {
    handle: AbortHandle,
    signals: UnboundedSender<WedgeSignal>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Wedge loop panicked");
            self.handle.mark_stopped();
            send_signal(&self.signals, WedgeSignal::WorkerPanicked);
        }
    }
}

/// Owner's side of a spawned loop.
pub struct WedgeHandle<S> {
    abort: AbortHandle,
    join: JoinHandle<S>,
}

impl<S> WedgeHandle<S> {
    /// See [`AbortHandle::request_abort`].
    pub fn request_abort(&self) -> bool {
        self.abort.request_abort()
    }

    /// current state
    pub fn state(&self) -> LoopState {
        self.abort.state()
    }

    /// Waits for the worker and takes back the source.
    ///
    /// # Errors
    ///
    /// Returns [`WedgeError::WorkerPanicked`] if the worker panicked.
    pub fn join(self) -> Result<S> {
        self.join.join().map_err(|_| WedgeError::WorkerPanicked)
    }
}

fn send_signal(signals: &UnboundedSender<WedgeSignal>, signal: WedgeSignal) {
    if let Err(e) = signals.send(signal) {
        error!("Owner dropped the signal channel, lost {:?}", e.0);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use mockall::Sequence;
    use tokio::sync::mpsc;

    use super::*;
    use crate::serial::RawLine;
    use crate::serial::source::MockLineSource;
    use crate::wedge::keystroke::MockKeystrokeEmitter;
    use crate::wedge::keystroke::recording::{Keystroke, RecordingEmitter};

    const TIMEOUT: Duration = Duration::from_millis(20);

    /// A source that yields `lines` in order, then reports the device unplugged.
    fn scripted_source(lines: Vec<&'static str>) -> MockLineSource {
        let mut source = MockLineSource::new();
        let total = lines.len() + 1;
        let mut lines = lines.into_iter();
        source
            .expect_read_line()
            .times(total)
            .returning(move |_| match lines.next() {
                Some(line) => Ok(RawLine::from(line)),
                None => Err(WedgeError::connection_lost("device unplugged")),
            });
        source.expect_close().returning(|| ());
        source
    }

    /// A source that always times out after sleeping for the timeout.
    fn idle_source() -> MockLineSource {
        let mut source = MockLineSource::new();
        source.expect_read_line().returning(|timeout| {
            thread::sleep(timeout);
            Ok(RawLine::empty())
        });
        source.expect_close().returning(|| ());
        source
    }

    fn expect_typed(emitter: &mut MockKeystrokeEmitter, seq: &mut Sequence, token: &'static str) {
        emitter
            .expect_type_text()
            .withf(move |text| text == token)
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(()));
        emitter
            .expect_press_and_release()
            .withf(|key| *key == Key::Enter)
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(()));
    }

    fn silent_emitter() -> MockKeystrokeEmitter {
        let mut emitter = MockKeystrokeEmitter::new();
        emitter.expect_type_text().never();
        emitter.expect_press_and_release().never();
        emitter
    }

    #[test]
    fn test_negative_reading_typed_then_enter() {
        let emitter = RecordingEmitter::default();
        let mut wedge = WedgeLoop::new(
            scripted_source(vec!["-45.6\r\n"]),
            emitter.clone(),
            TIMEOUT,
        );
        assert_eq!(wedge.step().unwrap(), Iteration::Emitted("-45.6".to_string()));
        assert_eq!(
            emitter.events(),
            vec![
                Keystroke::Text("-45.6".to_string()),
                Keystroke::Press(Key::Enter),
                Keystroke::Release(Key::Enter),
            ]
        );
        assert!(wedge.state().is_running());
        assert!(wedge.step().unwrap_err().is_connection_lost());
    }

    #[test]
    fn test_line_without_numbers_types_nothing() {
        let mut wedge = WedgeLoop::new(
            scripted_source(vec!["no numbers here\r\n"]),
            silent_emitter(),
            TIMEOUT,
        );
        assert_eq!(wedge.step().unwrap(), Iteration::NoToken);
        assert_eq!(wedge.state(), LoopState::Running);
        assert!(wedge.step().is_err());
    }

    #[test]
    fn test_integer_reading_types_nothing() {
        let mut wedge =
            WedgeLoop::new(scripted_source(vec!["1234\r\n"]), silent_emitter(), TIMEOUT);
        assert_eq!(wedge.step().unwrap(), Iteration::NoToken);
        assert!(wedge.step().is_err());
    }

    #[test]
    fn test_empty_read_is_idle() {
        let mut wedge = WedgeLoop::new(idle_source(), silent_emitter(), TIMEOUT);
        assert_eq!(wedge.step().unwrap(), Iteration::Idle);
        assert_eq!(wedge.state(), LoopState::Running);
    }

    #[test]
    fn test_only_leftmost_reading_typed() {
        let mut emitter = MockKeystrokeEmitter::new();
        let mut seq = Sequence::new();
        expect_typed(&mut emitter, &mut seq, "3.14");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let wedge = WedgeLoop::new(scripted_source(vec!["3.14 and 2.71\n"]), emitter, TIMEOUT);
        let _source = wedge.run(&tx);
        assert!(matches!(
            rx.try_recv(),
            Ok(WedgeSignal::DeviceDisconnected(_))
        ));
    }

    #[test]
    fn test_disconnect_signalled_once_without_further_reads() {
        let mut emitter = MockKeystrokeEmitter::new();
        let mut seq = Sequence::new();
        expect_typed(&mut emitter, &mut seq, "1.5");
        expect_typed(&mut emitter, &mut seq, "2.5");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let wedge = WedgeLoop::new(
            scripted_source(vec!["1.5\n", "", "2.5\n"]),
            emitter,
            TIMEOUT,
        );
        let handle = wedge.abort_handle();
        let _source = wedge.run(&tx);
        drop(tx);

        assert_eq!(
            rx.blocking_recv(),
            Some(WedgeSignal::DeviceDisconnected(
                "Serial connection lost: device unplugged".to_string()
            ))
        );
        assert_eq!(rx.blocking_recv(), None);
        assert!(handle.state().is_stopped());
    }

    #[test]
    fn test_abort_before_first_iteration_reads_nothing() {
        let mut source = MockLineSource::new();
        source.expect_read_line().never();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let wedge = WedgeLoop::new(source, silent_emitter(), TIMEOUT);
        wedge.abort_handle().request_abort();
        let _source = wedge.run(&tx);
        assert_eq!(rx.try_recv(), Ok(WedgeSignal::Aborted));
    }

    #[test]
    fn test_rejected_keystroke_does_not_stop_loop() {
        let mut emitter = MockKeystrokeEmitter::new();
        let mut seq = Sequence::new();
        emitter
            .expect_type_text()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(WedgeError::keystroke("window lost focus")));
        expect_typed(&mut emitter, &mut seq, "8.8");

        let mut wedge = WedgeLoop::new(scripted_source(vec!["7.7\n", "8.8\n"]), emitter, TIMEOUT);
        assert_eq!(wedge.step().unwrap(), Iteration::Dropped("7.7".to_string()));
        assert_eq!(wedge.step().unwrap(), Iteration::Emitted("8.8".to_string()));
        assert!(wedge.step().is_err());
    }

    #[test]
    fn test_spawned_loop_aborts_within_timeout() {
        let timeout = Duration::from_millis(50);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = WedgeLoop::spawn(idle_source(), || Ok(silent_emitter()), timeout, tx).unwrap();

        thread::sleep(timeout * 3);
        assert!(handle.state().is_running());

        let requested = Instant::now();
        assert!(handle.request_abort());
        assert_eq!(rx.blocking_recv(), Some(WedgeSignal::Aborted));
        assert!(requested.elapsed() < timeout * 2);

        assert!(handle.state().is_stopped());
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_spawned_loop_reports_disconnect() {
        let mut emitter = MockKeystrokeEmitter::new();
        let mut seq = Sequence::new();
        expect_typed(&mut emitter, &mut seq, "-0.25");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = WedgeLoop::spawn(
            scripted_source(vec!["  - 0 . 2 5  g\r\n"]),
            move || Ok(emitter),
            TIMEOUT,
            tx,
        )
        .unwrap();

        assert!(matches!(
            rx.blocking_recv(),
            Some(WedgeSignal::DeviceDisconnected(_))
        ));
        assert_eq!(rx.blocking_recv(), None);
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_spawned_loop_without_keyboard_backend() {
        let mut source = MockLineSource::new();
        source.expect_read_line().never();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = WedgeLoop::<_, MockKeystrokeEmitter>::spawn(
            source,
            || Err(WedgeError::keystroke("no display")),
            TIMEOUT,
            tx,
        )
        .unwrap();

        assert_eq!(
            rx.blocking_recv(),
            Some(WedgeSignal::EmitterUnavailable(
                "Keystroke injection failed: no display".to_string()
            ))
        );
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_panicking_emitter_still_signals() {
        let mut emitter = MockKeystrokeEmitter::new();
        emitter
            .expect_type_text()
            .returning(|_| panic!("keyboard backend crashed"));

        let mut source = MockLineSource::new();
        source
            .expect_read_line()
            .returning(|_| Ok(RawLine::from("9.81\n")));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = WedgeLoop::spawn(source, move || Ok(emitter), TIMEOUT, tx).unwrap();

        assert_eq!(rx.blocking_recv(), Some(WedgeSignal::WorkerPanicked));
        assert!(handle.state().is_stopped());
        assert!(matches!(handle.join(), Err(WedgeError::WorkerPanicked)));
    }
}
