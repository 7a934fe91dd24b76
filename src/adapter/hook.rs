//! Press/release adapter shared by the keyboard and mouse families.
//!
//! The two families differ only in which backend filters the OS hook and
//! in the family tag stamped onto emitted events, so one generic
//! [`HookAdapter`] covers both.  The backend owns the blocking listen loop;
//! the adapter owns lifecycle, normalization, and callback fan-out.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::input::{InputEvent, InputSource, RawCode};

use super::{join_with_timeout, EventCallback, ErrorCallback, InputAdapter, InputError, JOIN_TIMEOUT};

/// Receives raw press/release codes from a backend's capture thread.
pub type RawSink = Arc<dyn Fn(RawCode, bool) + Send + Sync>;

// ---------------------------------------------------------------------------
// HookBackend
// ---------------------------------------------------------------------------

/// A blocking OS hook that a [`HookAdapter`] runs on a dedicated thread.
///
/// `spawn` must either return a running capture thread or fail with no
/// resources left allocated.  The capture loop must consult `stop` on every
/// delivery and discard events once it is set; loops that cannot be
/// interrupted are detached by the adapter after a bounded join.
pub trait HookBackend: Send {
    fn spawn(
        &mut self,
        sink: RawSink,
        errors: ErrorCallback,
        stop: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, InputError>;
}

// ---------------------------------------------------------------------------
// HookAdapter
// ---------------------------------------------------------------------------

/// Global press/release adapter for one device family.
pub struct HookAdapter {
    family: InputSource,
    backend: Box<dyn HookBackend>,
    event_callback: Arc<Mutex<Option<EventCallback>>>,
    error_callback: Arc<Mutex<Option<ErrorCallback>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    running: bool,
}

impl HookAdapter {
    pub fn new(family: InputSource, backend: Box<dyn HookBackend>) -> Self {
        Self {
            family,
            backend,
            event_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
            running: false,
        }
    }

    /// Keyboard adapter backed by the system-wide rdev hook.
    pub fn keyboard() -> Self {
        Self::new(
            InputSource::Keyboard,
            Box::new(super::backend::rdev::RdevKeyboardBackend),
        )
    }

    /// Mouse adapter backed by the system-wide rdev hook.
    pub fn mouse() -> Self {
        Self::new(
            InputSource::Mouse,
            Box::new(super::backend::rdev::RdevMouseBackend),
        )
    }

    fn forwarding_error_sink(&self) -> ErrorCallback {
        let slot = Arc::clone(&self.error_callback);
        let family = self.family;
        Arc::new(move |error| {
            let callback = slot.lock().unwrap_or_else(|p| p.into_inner()).clone();
            match callback {
                Some(callback) => callback(error),
                None => log::warn!("{family} adapter fault (no error callback): {error}"),
            }
        })
    }

    fn raw_sink(&self, errors: ErrorCallback) -> RawSink {
        let slot = Arc::clone(&self.event_callback);
        let family = self.family;
        Arc::new(move |raw, pressed| {
            let Some(callback) = slot.lock().unwrap_or_else(|p| p.into_inner()).clone() else {
                return;
            };
            // Unrecognized codes are expected; drop them without a sound.
            let Some(event) = InputEvent::new(raw, family, pressed) else {
                return;
            };
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                errors(InputError::Dispatch(format!(
                    "{family} event callback panicked"
                )));
            }
        })
    }
}

impl InputAdapter for HookAdapter {
    fn family(&self) -> InputSource {
        self.family
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

        // Fresh flag per session so a detached thread from a previous
        // session keeps seeing its own stop request.
        self.stop = Arc::new(AtomicBool::new(false));
        let errors = self.forwarding_error_sink();
        let sink = self.raw_sink(Arc::clone(&errors));

        match self.backend.spawn(sink, errors, Arc::clone(&self.stop)) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.running = true;
                log::debug!("{} adapter started", self.family);
                Ok(())
            }
            Err(error) => {
                self.stop.store(true, Ordering::Relaxed);
                self.handle = None;
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
        if let Some(handle) = self.handle.take() {
            join_with_timeout(handle, JOIN_TIMEOUT, &format!("{} adapter", self.family));
        }
        log::debug!("{} adapter stopped", self.family);
        Ok(())
    }
}

impl Drop for HookAdapter {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
