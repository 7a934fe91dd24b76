//! Device adapters: background capture threads behind one common contract.
//!
//! Each adapter wraps a pluggable capture backend, runs it on a dedicated
//! OS thread, and emits canonical [`InputEvent`]s through a caller-supplied
//! callback.  The contract every family implements identically:
//!
//! - `start()` is idempotent and unwinds fully on backend failure, leaving
//!   `is_running() == false`.
//! - `stop()` is idempotent, joins the capture thread with a bounded
//!   timeout, and swallows teardown errors so shutdown always completes.
//! - Raw codes that fail normalization are dropped silently; backend faults
//!   are forwarded to the injected error callback instead of crashing the
//!   capture thread.

pub mod backend;
pub mod gamepad;
pub mod hook;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::input::{InputEvent, InputSource};

pub use gamepad::{
    list_connected_gamepads, GamepadBackend, GamepadDeviceInfo, GamepadInputAdapter, PadEvent,
};
pub use hook::{HookAdapter, HookBackend, RawSink};

/// How long `stop()` waits for a capture thread before detaching it.
pub(crate) const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Callbacks and errors
// ---------------------------------------------------------------------------

/// Receives each normalized event on the capture thread that produced it.
pub type EventCallback = Arc<dyn Fn(InputEvent) + Send + Sync>;

/// Receives runtime faults that must not terminate a capture thread.
pub type ErrorCallback = Arc<dyn Fn(InputError) + Send + Sync>;

/// Faults surfaced by adapters and the router.
///
/// Lifecycle failures (`BackendStart`, `StopIncomplete`) propagate to the
/// caller; everything else flows through the error callback and is
/// contained per event.
#[derive(Debug, Error)]
pub enum InputError {
    /// The capture backend could not be brought up; nothing was left running.
    #[error("{family} capture backend failed to start: {message}")]
    BackendStart {
        family: InputSource,
        message: String,
    },

    /// The capture backend reported a fault while running.
    #[error("{family} capture fault: {message}")]
    Capture {
        family: InputSource,
        message: String,
    },

    /// Gamepad device enumeration failed.
    #[error("gamepad device scan failed: {0}")]
    DeviceScan(String),

    /// The router's dispatch worker thread could not be spawned.
    #[error("dispatch worker failed to start: {0}")]
    WorkerStart(String),

    /// One or more adapters failed to stop; cleanup still completed.
    #[error("{failed} of {total} adapters failed to stop cleanly; first: {first}")]
    StopIncomplete {
        failed: usize,
        total: usize,
        first: String,
    },

    /// A subscriber panicked while one event was being dispatched.
    #[error("event dispatch failed: {0}")]
    Dispatch(String),
}

// ---------------------------------------------------------------------------
// InputAdapter
// ---------------------------------------------------------------------------

/// Contract implemented by the keyboard, mouse, and gamepad adapters.
pub trait InputAdapter: Send {
    /// Device family this adapter captures.
    fn family(&self) -> InputSource;

    /// Whether the capture thread is currently up.
    fn is_running(&self) -> bool;

    /// Install or clear the event sink.  Takes effect immediately, even
    /// while the capture thread is running.
    fn set_event_callback(&mut self, callback: Option<EventCallback>);

    /// Install or clear the runtime error sink.
    fn set_error_callback(&mut self, callback: Option<ErrorCallback>);

    /// Bring capture up.  No-op when already running.
    fn start(&mut self) -> Result<(), InputError>;

    /// Request shutdown, join the capture thread with a bounded timeout,
    /// and release device handles.  No-op when not running.
    fn stop(&mut self) -> Result<(), InputError>;
}

// ---------------------------------------------------------------------------
// Thread teardown helper
// ---------------------------------------------------------------------------

/// Join `handle` within `timeout`, detaching the thread if it does not
/// exit in time.  Some hook APIs cannot be interrupted while blocked; the
/// detached thread discards events via its stop flag until process exit.
///
/// Returns `false` when the thread was detached, so callers know it may
/// still hold shared resources (locks, device handles).
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, label: &str) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            log::warn!("{label}: capture thread still blocked after {timeout:?}; detaching");
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    if handle.join().is_err() {
        log::warn!("{label}: capture thread panicked before shutdown");
    }
    true
}
