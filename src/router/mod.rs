//! Input router: fans capture threads into one dispatch worker.
//!
//! Adapters enqueue events from their own threads onto a multi-producer
//! channel; a single worker thread drains it, runs the tracker engine, and
//! invokes subscriber callbacks.  One consumer means subscribers observe
//! events strictly in arrival order and the tracker never needs its lock
//! held across a callback.
//!
//! Lifecycle follows the adapters' contract: `start()` unwinds everything
//! it brought up when any adapter fails, and `stop()` always finishes
//! cleanup before reporting the first failure it swallowed along the way.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::adapter::{
    join_with_timeout, ErrorCallback, EventCallback, GamepadInputAdapter, HookAdapter,
    InputAdapter, InputError, JOIN_TIMEOUT,
};
use crate::config::SkillRule;
use crate::input::InputEvent;
use crate::tracker::TrackerEngine;

/// How often the worker re-checks its stop flag while the queue is idle.
const QUEUE_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Receives each event together with the rules it triggered (possibly
/// none), after the tracker has run.
pub type TriggeredCallback = Arc<dyn Fn(&InputEvent, &[SkillRule]) + Send + Sync>;

enum QueueEntry {
    Event(InputEvent),
    /// Wakes the worker so it notices the stop flag without waiting out
    /// the poll timeout.
    Shutdown,
}

#[derive(Default)]
struct Subscribers {
    on_event: Mutex<Option<EventCallback>>,
    on_triggered: Mutex<Option<TriggeredCallback>>,
    on_error: Mutex<Option<ErrorCallback>>,
}

impl Subscribers {
    fn error(&self, error: InputError) {
        let callback = self
            .on_error
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        match callback {
            Some(callback) => callback(error),
            None => log::warn!("router fault (no error callback): {error}"),
        }
    }
}

// ---------------------------------------------------------------------------
// InputRouter
// ---------------------------------------------------------------------------

/// Owns the device adapters, the dispatch queue, and the tracker engine.
pub struct InputRouter {
    adapters: Vec<Box<dyn InputAdapter>>,
    tracker: Arc<Mutex<TrackerEngine>>,
    subscribers: Arc<Subscribers>,
    tx: Sender<QueueEntry>,
    rx: Receiver<QueueEntry>,
    /// Gate for producers; closed before adapter teardown so late events
    /// from stopping capture threads are dropped, not queued.
    accepting: Arc<AtomicBool>,
    worker_stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    running: bool,
}

impl InputRouter {
    /// Router over the standard three adapters: keyboard, mouse, gamepad.
    pub fn new() -> Self {
        Self::with_adapters(vec![
            Box::new(HookAdapter::keyboard()),
            Box::new(HookAdapter::mouse()),
            Box::new(GamepadInputAdapter::system_default()),
        ])
    }

    /// Router over caller-supplied adapters, in start order.
    pub fn with_adapters(mut adapters: Vec<Box<dyn InputAdapter>>) -> Self {
        let (tx, rx) = unbounded();
        let subscribers = Arc::new(Subscribers::default());
        let accepting = Arc::new(AtomicBool::new(false));

        for adapter in &mut adapters {
            let tx = tx.clone();
            let accepting = Arc::clone(&accepting);
            adapter.set_event_callback(Some(Arc::new(move |event: InputEvent| {
                if accepting.load(Ordering::Relaxed) {
                    let _ = tx.send(QueueEntry::Event(event));
                }
            })));
            let subscribers = Arc::clone(&subscribers);
            adapter.set_error_callback(Some(Arc::new(move |error| subscribers.error(error))));
        }

        Self {
            adapters,
            tracker: Arc::new(Mutex::new(TrackerEngine::new())),
            subscribers,
            tx,
            rx,
            accepting,
            worker_stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Install or clear the per-event subscriber.  Takes effect
    /// immediately, even while running.
    pub fn set_event_callback(&self, callback: Option<EventCallback>) {
        *self
            .subscribers
            .on_event
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = callback;
    }

    /// Install or clear the triggered-skills subscriber.
    pub fn set_triggered_callback(&self, callback: Option<TriggeredCallback>) {
        *self
            .subscribers
            .on_triggered
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = callback;
    }

    /// Install or clear the runtime error subscriber.
    pub fn set_error_callback(&self, callback: Option<ErrorCallback>) {
        *self
            .subscribers
            .on_error
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = callback;
    }

    /// Replace the rule set the tracker evaluates.  Held-modifier state is
    /// discarded.
    pub fn set_skill_rules(&self, rules: impl IntoIterator<Item = SkillRule>) {
        self.tracker
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .set_skill_rules(rules);
    }

    /// Clear the tracker's held-modifier state without touching the rules.
    pub fn reset_keys(&self) {
        self.tracker
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .reset_keys();
    }

    /// Inject one already-normalized event as if an adapter captured it.
    /// Dropped while the router is not running.
    pub fn route_input_event(&self, event: InputEvent) {
        if self.accepting.load(Ordering::Relaxed) {
            let _ = self.tx.send(QueueEntry::Event(event));
        }
    }

    /// Start the dispatch worker, then every adapter in order.
    ///
    /// When any adapter fails to start, the ones already started are
    /// stopped again (in reverse order) and the worker is torn down before
    /// the error propagates; a failed `start()` leaves nothing running.
    pub fn start(&mut self) -> Result<(), InputError> {
        if self.running {
            return Ok(());
        }

        // Stale events from a previous session must not leak into this one.
        while self.rx.try_recv().is_ok() {}

        self.worker_stop = Arc::new(AtomicBool::new(false));
        let worker = DispatchWorker {
            rx: self.rx.clone(),
            tracker: Arc::clone(&self.tracker),
            subscribers: Arc::clone(&self.subscribers),
            stop: Arc::clone(&self.worker_stop),
        };
        let handle = thread::Builder::new()
            .name("input-router".into())
            .spawn(move || worker.run())
            .map_err(|e| InputError::WorkerStart(e.to_string()))?;
        self.worker = Some(handle);
        self.accepting.store(true, Ordering::Relaxed);

        for index in 0..self.adapters.len() {
            if let Err(error) = self.adapters[index].start() {
                log::warn!(
                    "{} adapter failed to start, rolling back: {error}",
                    self.adapters[index].family()
                );
                for started in self.adapters[..index].iter_mut().rev() {
                    if let Err(stop_error) = started.stop() {
                        log::warn!(
                            "{} adapter failed to stop during rollback: {stop_error}",
                            started.family()
                        );
                    }
                }
                self.accepting.store(false, Ordering::Relaxed);
                self.shutdown_worker();
                return Err(error);
            }
        }

        self.running = true;
        log::debug!("input router started ({} adapters)", self.adapters.len());
        Ok(())
    }

    /// Stop every adapter and the dispatch worker.
    ///
    /// Cleanup always runs to completion; if any adapter failed to stop,
    /// the first failure is reported after everything else has been torn
    /// down.
    pub fn stop(&mut self) -> Result<(), InputError> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        self.accepting.store(false, Ordering::Relaxed);

        let total = self.adapters.len();
        let mut failures: Vec<InputError> = Vec::new();
        for adapter in self.adapters.iter_mut().rev() {
            if let Err(error) = adapter.stop() {
                log::warn!("{} adapter failed to stop: {error}", adapter.family());
                failures.push(error);
            }
        }

        self.shutdown_worker();
        log::debug!("input router stopped");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(InputError::StopIncomplete {
                failed: failures.len(),
                total,
                first: failures[0].to_string(),
            })
        }
    }

    fn shutdown_worker(&mut self) {
        self.worker_stop.store(true, Ordering::Relaxed);
        let _ = self.tx.send(QueueEntry::Shutdown);
        if let Some(handle) = self.worker.take() {
            join_with_timeout(handle, JOIN_TIMEOUT, "router worker");
        }
        while self.rx.try_recv().is_ok() {}
    }
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputRouter {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            log::warn!("router teardown incomplete: {error}");
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch worker
// ---------------------------------------------------------------------------

struct DispatchWorker {
    rx: Receiver<QueueEntry>,
    tracker: Arc<Mutex<TrackerEngine>>,
    subscribers: Arc<Subscribers>,
    stop: Arc<AtomicBool>,
}

impl DispatchWorker {
    fn run(self) {
        loop {
            // Drain what is already queued before honoring the stop flag so
            // no accepted event is silently lost at shutdown.
            if self.stop.load(Ordering::Relaxed) && self.rx.is_empty() {
                break;
            }
            match self.rx.recv_timeout(QUEUE_POLL_TIMEOUT) {
                Ok(QueueEntry::Event(event)) => self.dispatch(event),
                Ok(QueueEntry::Shutdown) => continue,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::debug!("router dispatch loop exited");
    }

    /// Run one event through the tracker and both subscribers.  A panic
    /// anywhere in the match-then-notify sequence is contained to this
    /// event and forwarded as a dispatch fault; the worker keeps running.
    fn dispatch(&self, event: InputEvent) {
        let on_event = self
            .subscribers
            .on_event
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let on_triggered = self
            .subscribers
            .on_triggered
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let triggered = self
                .tracker
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .process_event(&event);
            if let Some(callback) = on_event {
                callback(event.clone());
            }
            if let Some(callback) = on_triggered {
                callback(&event, &triggered);
            }
        }));
        if result.is_err() {
            self.subscribers.error(InputError::Dispatch(format!(
                "subscriber panicked on {} {}",
                event.source, event.code
            )));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
