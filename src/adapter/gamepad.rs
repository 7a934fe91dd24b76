//! Gamepad polling adapter.
//!
//! Unlike the hook families, gamepads are polled: a dedicated thread asks
//! the backend for pending device events every ~10 ms.  On top of plain
//! button down/up translation the adapter
//!
//! - reconciles the backend's device list on hot-plug notifications, and
//! - synthesizes virtual button presses from the analog trigger axes using
//!   a two-threshold hysteresis (press at ≥ 0.5 rising, release at ≤ 0.25
//!   falling) with per-axis latched state, so a held trigger is emitted
//!   exactly once.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::input::{InputEvent, InputSource, RawCode};

use super::{join_with_timeout, EventCallback, ErrorCallback, InputAdapter, InputError, JOIN_TIMEOUT};

/// Default poll interval for the gamepad thread.
pub const GAMEPAD_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Cadence at which the backend re-enumerates devices to pick up newly
/// connected pads.
const DEVICE_RESCAN_INTERVAL: Duration = Duration::from_secs(1);

const TRIGGER_PRESS_THRESHOLD: f32 = 0.5;
const TRIGGER_RELEASE_THRESHOLD: f32 = 0.25;

/// Analog trigger axes and the virtual button each one synthesizes.
const TRIGGER_AXIS_TO_BUTTON: [(u32, u32); 2] = [(4, 4), (5, 5)];

fn trigger_button_for_axis(axis: u32) -> Option<u32> {
    TRIGGER_AXIS_TO_BUTTON
        .iter()
        .find(|(a, _)| *a == axis)
        .map(|(_, button)| *button)
}

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

/// Connected gamepad metadata used for UI labeling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamepadDeviceInfo {
    pub index: usize,
    pub name: String,
    pub button_count: usize,
}

/// One raw notification delivered by a [`GamepadBackend`] poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PadEvent {
    /// A physical button changed state.
    Button { button: u32, pressed: bool },
    /// An analog axis moved.  `value` is 0.0–1.0 for trigger axes.
    Axis { axis: u32, value: f32 },
    /// A device appeared or disappeared; the adapter will reconcile.
    DeviceChange,
}

/// Pluggable gamepad capture mechanism.
///
/// `open` must fail without leaving partial resources behind; `poll` and
/// `rescan` faults are forwarded to the error callback and never stop the
/// poll loop; `close` is infallible teardown.
pub trait GamepadBackend: Send {
    fn open(&mut self) -> Result<(), InputError>;
    fn poll(&mut self, out: &mut Vec<PadEvent>) -> Result<(), InputError>;
    fn rescan(&mut self) -> Result<(), InputError>;
    fn devices(&self) -> Vec<GamepadDeviceInfo>;
    fn close(&mut self);
}

/// Backend for platforms without gamepad capture support: no devices, no
/// events, every call succeeds.
pub struct NullGamepadBackend;

impl GamepadBackend for NullGamepadBackend {
    fn open(&mut self) -> Result<(), InputError> {
        log::debug!("gamepad capture not supported on this platform");
        Ok(())
    }

    fn poll(&mut self, _out: &mut Vec<PadEvent>) -> Result<(), InputError> {
        Ok(())
    }

    fn rescan(&mut self) -> Result<(), InputError> {
        Ok(())
    }

    fn devices(&self) -> Vec<GamepadDeviceInfo> {
        Vec::new()
    }

    fn close(&mut self) {}
}

fn system_backend() -> Box<dyn GamepadBackend> {
    #[cfg(target_os = "linux")]
    {
        Box::new(super::backend::evdev::EvdevGamepadBackend::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(NullGamepadBackend)
    }
}

/// Return connected gamepads with their reported button counts.
///
/// Enumeration failures yield an empty list; this is a labeling aid, not a
/// capture path.
pub fn list_connected_gamepads() -> Vec<GamepadDeviceInfo> {
    let mut backend = system_backend();
    let devices = match backend.open() {
        Ok(()) => backend.devices(),
        Err(error) => {
            log::debug!("gamepad enumeration failed: {error}");
            Vec::new()
        }
    };
    backend.close();
    devices
}

// ---------------------------------------------------------------------------
// GamepadInputAdapter
// ---------------------------------------------------------------------------

/// Global gamepad adapter driving a [`GamepadBackend`] on a poll thread.
pub struct GamepadInputAdapter {
    backend: Arc<Mutex<Box<dyn GamepadBackend>>>,
    event_callback: Arc<Mutex<Option<EventCallback>>>,
    error_callback: Arc<Mutex<Option<ErrorCallback>>>,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    running: bool,
}

impl GamepadInputAdapter {
    pub fn new(backend: Box<dyn GamepadBackend>) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            event_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            poll_interval: GAMEPAD_POLL_INTERVAL,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
            running: false,
        }
    }

    /// Adapter over the platform's capture mechanism (evdev on Linux).
    pub fn system_default() -> Self {
        Self::new(system_backend())
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Snapshot of the devices the backend currently tracks.
    ///
    /// The poll thread holds the backend lock during each poll, so this
    /// waits briefly instead of blocking; an unresponsive backend yields an
    /// empty list rather than a hang.
    pub fn devices(&self) -> Vec<GamepadDeviceInfo> {
        let deadline = Instant::now() + Duration::from_millis(100);
        loop {
            match self.backend.try_lock() {
                Ok(backend) => return backend.devices(),
                Err(TryLockError::Poisoned(poisoned)) => return poisoned.into_inner().devices(),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        log::warn!("gamepad backend busy; reporting no devices");
                        return Vec::new();
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    fn forwarding_error_sink(&self) -> ErrorCallback {
        let slot = Arc::clone(&self.error_callback);
        Arc::new(move |error| {
            let callback = slot.lock().unwrap_or_else(|p| p.into_inner()).clone();
            match callback {
                Some(callback) => callback(error),
                None => log::warn!("gamepad adapter fault (no error callback): {error}"),
            }
        })
    }
}

impl InputAdapter for GamepadInputAdapter {
    fn family(&self) -> InputSource {
        InputSource::Gamepad
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_event_callback(&mut self, callback: Option<EventCallback>) {
        *self.event_callback.lock().unwrap_or_else(|p| p.into_inner()) = callback;
    }

    fn set_error_callback(&mut self, callback: Option<ErrorCallback>) {
        *self.error_callback.lock().unwrap_or_else(|p| p.into_inner()) = callback;
    }

    fn start(&mut self) -> Result<(), InputError> {
        if self.running {
            return Ok(());
        }

        {
            let mut backend = self.backend.lock().unwrap_or_else(|p| p.into_inner());
            if let Err(error) = backend.open() {
                backend.close();
                return Err(error);
            }
        }

        self.stop = Arc::new(AtomicBool::new(false));
        let worker = PollWorker {
            backend: Arc::clone(&self.backend),
            event_callback: Arc::clone(&self.event_callback),
            errors: self.forwarding_error_sink(),
            stop: Arc::clone(&self.stop),
            poll_interval: self.poll_interval,
            axis_latched: HashMap::new(),
        };

        let handle = thread::Builder::new()
            .name("gamepad-adapter".into())
            .spawn(move || worker.run())
            .map_err(|e| InputError::BackendStart {
                family: InputSource::Gamepad,
                message: e.to_string(),
            });

        match handle {
            Ok(handle) => {
                self.handle = Some(handle);
                self.running = true;
                log::debug!("gamepad adapter started");
                Ok(())
            }
            Err(error) => {
                self.stop.store(true, Ordering::Relaxed);
                self.backend
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .close();
                Err(error)
            }
        }
    }

    fn stop(&mut self) -> Result<(), InputError> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        self.stop.store(true, Ordering::Relaxed);
        let mut joined = true;
        if let Some(handle) = self.handle.take() {
            joined = join_with_timeout(handle, JOIN_TIMEOUT, "gamepad adapter");
        }
        if joined {
            self.backend
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .close();
        } else {
            // The detached poll thread may never release the backend lock;
            // a blocking lock here would hang shutdown.
            match self.backend.try_lock() {
                Ok(mut backend) => backend.close(),
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().close(),
                Err(TryLockError::WouldBlock) => {
                    log::warn!(
                        "gamepad backend still held by the detached poll thread; \
                         abandoning device handles"
                    );
                }
            }
        }
        log::debug!("gamepad adapter stopped");
        Ok(())
    }
}

impl Drop for GamepadInputAdapter {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ---------------------------------------------------------------------------
// Poll worker
// ---------------------------------------------------------------------------

struct PollWorker {
    backend: Arc<Mutex<Box<dyn GamepadBackend>>>,
    event_callback: Arc<Mutex<Option<EventCallback>>>,
    errors: ErrorCallback,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    /// Virtual trigger button -> currently latched as held.
    axis_latched: HashMap<u32, bool>,
}

impl PollWorker {
    fn run(mut self) {
        let mut events = Vec::new();
        let mut last_rescan = Instant::now();

        while !self.stop.load(Ordering::Relaxed) {
            events.clear();
            let result = self
                .backend
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .poll(&mut events);
            match result {
                Ok(()) => {
                    for event in events.drain(..) {
                        self.handle_event(event, &mut last_rescan);
                    }
                }
                Err(error) => (self.errors)(error),
            }

            if last_rescan.elapsed() >= DEVICE_RESCAN_INTERVAL {
                self.rescan(&mut last_rescan);
            }

            thread::sleep(self.poll_interval);
        }
        log::debug!("gamepad poll loop exited");
    }

    fn handle_event(&mut self, event: PadEvent, last_rescan: &mut Instant) {
        match event {
            PadEvent::Button { button, pressed } => self.emit(button, pressed),
            PadEvent::Axis { axis, value } => self.handle_axis(axis, value),
            PadEvent::DeviceChange => self.rescan(last_rescan),
        }
    }

    /// Two-threshold hysteresis with per-button latched state.
    fn handle_axis(&mut self, axis: u32, value: f32) {
        let Some(button) = trigger_button_for_axis(axis) else {
            return;
        };
        let latched = self.axis_latched.get(&button).copied().unwrap_or(false);
        if !latched && value >= TRIGGER_PRESS_THRESHOLD {
            self.axis_latched.insert(button, true);
            self.emit(button, true);
        } else if latched && value <= TRIGGER_RELEASE_THRESHOLD {
            self.axis_latched.insert(button, false);
            self.emit(button, false);
        }
    }

    fn rescan(&mut self, last_rescan: &mut Instant) {
        *last_rescan = Instant::now();
        let result = self
            .backend
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .rescan();
        if let Err(error) = result {
            (self.errors)(error);
        }
    }

    fn emit(&self, button: u32, pressed: bool) {
        let Some(callback) = self
            .event_callback
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
        else {
            return;
        };
        let Some(event) = InputEvent::new(RawCode::Int(button.into()), InputSource::Gamepad, pressed)
        else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
            (self.errors)(InputError::Dispatch(
                "gamepad event callback panicked".into(),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
