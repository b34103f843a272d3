use std::cell::Cell;
use std::io::BufRead;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

/// Unified event type consumed by the session runner
#[derive(Clone, Debug, PartialEq)]
pub enum ScoutEvent {
    Line(String),
    Tick,
    Closed,
}

/// Source of driver events (command lines, timer ticks)
pub trait ScoutEventSource {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<ScoutEvent, RecvTimeoutError>;
}

/// Production event source: one thread reading command lines. Timer ticks
/// are fed into the same channel through [`LineEventSource::ticker`].
pub struct LineEventSource {
    tx: Sender<ScoutEvent>,
    rx: Receiver<ScoutEvent>,
}

impl LineEventSource {
    pub fn new<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel();
        let line_tx = tx.clone();

        thread::spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(ScoutEvent::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = line_tx.send(ScoutEvent::Closed);
        });

        Self { tx, rx }
    }

    pub fn stdin() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()))
    }

    pub fn ticker(&self) -> ThreadTicker {
        ThreadTicker::new(self.tx.clone())
    }
}

impl ScoutEventSource for LineEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<ScoutEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<ScoutEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<ScoutEvent>) -> Self {
        Self { rx }
    }
}

impl ScoutEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<ScoutEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that hands the driver one event at a time
pub struct Runner<E: ScoutEventSource> {
    event_source: E,
    wait: Duration,
}

impl<E: ScoutEventSource> Runner<E> {
    pub fn new(event_source: E, wait: Duration) -> Self {
        Self { event_source, wait }
    }

    /// Blocks up to the wait interval. `None` means nothing arrived; a
    /// disconnected source is reported as `Closed`.
    pub fn step(&self) -> Option<ScoutEvent> {
        match self.event_source.recv_timeout(self.wait) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(ScoutEvent::Closed),
        }
    }
}

/// Starts a repeating tick. Dropping the returned handle cancels it.
pub trait TickScheduler {
    type Handle;

    fn schedule(&self, interval: Duration) -> Self::Handle;
}

/// Ticker backed by a thread that posts [`ScoutEvent::Tick`] into a channel
#[derive(Clone, Debug)]
pub struct ThreadTicker {
    tx: Sender<ScoutEvent>,
}

impl ThreadTicker {
    pub fn new(tx: Sender<ScoutEvent>) -> Self {
        Self { tx }
    }
}

impl TickScheduler for ThreadTicker {
    type Handle = TickTask;

    fn schedule(&self, interval: Duration) -> TickTask {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let tx = self.tx.clone();

        let join = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if tx.send(ScoutEvent::Tick).is_err() {
                        break;
                    }
                }
                // stop signal or handle dropped
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        TickTask {
            stop: Some(stop_tx),
            join: Some(join),
        }
    }
}

/// Handle to a running [`ThreadTicker`] task
#[derive(Debug)]
pub struct TickTask {
    stop: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Drop for TickTask {
    fn drop(&mut self) {
        // closing the stop channel wakes the thread immediately
        self.stop.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
        debug!("tick task cancelled");
    }
}

/// Ticker that never fires on its own; it only counts live handles so tests
/// can assert that no tick outlives a pause, finish, or reset.
#[derive(Clone, Debug, Default)]
pub struct ManualTicker {
    active: Rc<Cell<usize>>,
    scheduled: Rc<Cell<usize>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles currently alive
    pub fn active(&self) -> usize {
        self.active.get()
    }

    /// Number of handles ever created
    pub fn scheduled(&self) -> usize {
        self.scheduled.get()
    }
}

impl TickScheduler for ManualTicker {
    type Handle = ManualTick;

    fn schedule(&self, _interval: Duration) -> ManualTick {
        self.active.set(self.active.get() + 1);
        self.scheduled.set(self.scheduled.get() + 1);
        ManualTick {
            active: Rc::clone(&self.active),
        }
    }
}

#[derive(Debug)]
pub struct ManualTick {
    active: Rc<Cell<usize>>,
}

impl Drop for ManualTick {
    fn drop(&mut self) {
        self.active.set(self.active.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn step_returns_none_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let runner = Runner::new(es, Duration::from_millis(1));

        assert_eq!(runner.step(), None);
    }

    #[test]
    fn step_reports_closed_when_sender_is_gone() {
        let (tx, rx) = mpsc::channel::<ScoutEvent>();
        drop(tx);
        let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(1));

        assert_eq!(runner.step(), Some(ScoutEvent::Closed));
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(ScoutEvent::Line("start".into())).unwrap();
        let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(10));

        assert_eq!(runner.step(), Some(ScoutEvent::Line("start".into())));
    }

    #[test]
    fn line_source_emits_lines_then_closed() {
        let es = LineEventSource::new(Cursor::new("start\npause\n"));
        let runner = Runner::new(es, Duration::from_secs(2));

        assert_eq!(runner.step(), Some(ScoutEvent::Line("start".into())));
        assert_eq!(runner.step(), Some(ScoutEvent::Line("pause".into())));
        assert_eq!(runner.step(), Some(ScoutEvent::Closed));
    }

    #[test]
    fn thread_ticker_posts_ticks_until_dropped() {
        let (tx, rx) = mpsc::channel();
        let ticker = ThreadTicker::new(tx);

        let task = ticker.schedule(Duration::from_millis(2));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)),
            Ok(ScoutEvent::Tick)
        );
        drop(task);

        // drain whatever was queued before cancellation, then nothing more
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());
    }

    #[test]
    fn manual_ticker_tracks_live_handles() {
        let ticker = ManualTicker::new();
        let a = ticker.schedule(Duration::from_millis(100));
        let b = ticker.schedule(Duration::from_millis(100));
        assert_eq!(ticker.active(), 2);

        drop(a);
        assert_eq!(ticker.active(), 1);
        drop(b);
        assert_eq!(ticker.active(), 0);
        assert_eq!(ticker.scheduled(), 2);
    }
}
