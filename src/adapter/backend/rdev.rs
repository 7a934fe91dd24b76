//! Keyboard and mouse hook backends built on `rdev::listen`.
//!
//! `rdev::listen` is a blocking call with no graceful shutdown API, so each
//! backend runs it on its own OS thread and relies on the adapter's stop
//! flag: once set, the callback discards events, and the adapter detaches
//! the thread after a bounded join.  The blocked thread holds no resources
//! that need explicit cleanup.
//!
//! Each backend owns one explicit translation function from rdev's event
//! types into [`RawCode`]; unmapped keys translate to `None` and are never
//! seen by the normalizer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::adapter::hook::{HookBackend, RawSink};
use crate::adapter::{ErrorCallback, InputError};
use crate::input::{InputSource, RawCode};

fn spawn_listener(
    family: InputSource,
    thread_name: &str,
    sink: RawSink,
    errors: ErrorCallback,
    stop: Arc<AtomicBool>,
    translate: fn(&rdev::EventType) -> Option<(RawCode, bool)>,
) -> Result<JoinHandle<()>, InputError> {
    thread::Builder::new()
        .name(thread_name.into())
        .spawn(move || {
            let result = rdev::listen(move |event| {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                if let Some((raw, pressed)) = translate(&event.event_type) {
                    sink(raw, pressed);
                }
            });
            if let Err(error) = result {
                let message = format!("{error:?}");
                log::error!("{family} hook: rdev::listen exited: {message}");
                errors(InputError::Capture { family, message });
            }
        })
        .map_err(|e| InputError::BackendStart {
            family,
            message: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Keyboard
// ---------------------------------------------------------------------------

/// System-wide keyboard hook.
pub struct RdevKeyboardBackend;

impl HookBackend for RdevKeyboardBackend {
    fn spawn(
        &mut self,
        sink: RawSink,
        errors: ErrorCallback,
        stop: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, InputError> {
        spawn_listener(
            InputSource::Keyboard,
            "keyboard-capture",
            sink,
            errors,
            stop,
            translate_keyboard,
        )
    }
}

fn translate_keyboard(event_type: &rdev::EventType) -> Option<(RawCode, bool)> {
    match event_type {
        rdev::EventType::KeyPress(key) => raw_code_from_key(*key).map(|raw| (raw, true)),
        rdev::EventType::KeyRelease(key) => raw_code_from_key(*key).map(|raw| (raw, false)),
        _ => None,
    }
}

/// Map an [`rdev::Key`] to the raw code the keyboard normalizer accepts.
///
/// Keys outside the tracked set (space, arrows, media keys, …) map to
/// `None` and are skipped at the hook.
fn raw_code_from_key(key: rdev::Key) -> Option<RawCode> {
    use rdev::Key;

    let text = match key {
        Key::KeyA => "a",
        Key::KeyB => "b",
        Key::KeyC => "c",
        Key::KeyD => "d",
        Key::KeyE => "e",
        Key::KeyF => "f",
        Key::KeyG => "g",
        Key::KeyH => "h",
        Key::KeyI => "i",
        Key::KeyJ => "j",
        Key::KeyK => "k",
        Key::KeyL => "l",
        Key::KeyM => "m",
        Key::KeyN => "n",
        Key::KeyO => "o",
        Key::KeyP => "p",
        Key::KeyQ => "q",
        Key::KeyR => "r",
        Key::KeyS => "s",
        Key::KeyT => "t",
        Key::KeyU => "u",
        Key::KeyV => "v",
        Key::KeyW => "w",
        Key::KeyX => "x",
        Key::KeyY => "y",
        Key::KeyZ => "z",

        Key::Num0 => "d0",
        Key::Num1 => "d1",
        Key::Num2 => "d2",
        Key::Num3 => "d3",
        Key::Num4 => "d4",
        Key::Num5 => "d5",
        Key::Num6 => "d6",
        Key::Num7 => "d7",
        Key::Num8 => "d8",
        Key::Num9 => "d9",

        Key::F1 => "f1",
        Key::F2 => "f2",
        Key::F3 => "f3",
        Key::F4 => "f4",
        Key::F5 => "f5",
        Key::F6 => "f6",
        Key::F7 => "f7",
        Key::F8 => "f8",
        Key::F9 => "f9",
        Key::F10 => "f10",
        Key::F11 => "f11",
        Key::F12 => "f12",

        Key::Kp0 => "numpad0",
        Key::Kp1 => "numpad1",
        Key::Kp2 => "numpad2",
        Key::Kp3 => "numpad3",
        Key::Kp4 => "numpad4",
        Key::Kp5 => "numpad5",
        Key::Kp6 => "numpad6",
        Key::Kp7 => "numpad7",
        Key::Kp8 => "numpad8",
        Key::Kp9 => "numpad9",

        Key::ShiftLeft => "lshift",
        Key::ShiftRight => "rshift",
        Key::Alt => "lalt",
        Key::AltGr => "ralt",
        Key::ControlLeft => "lctrl",
        Key::ControlRight => "rctrl",

        Key::Escape => "esc",
        Key::Return => "enter",
        Key::Tab => "tab",
        Key::Backspace => "back",

        Key::Comma => ",",
        Key::SemiColon => ";",
        Key::Quote => "'",
        Key::LeftBracket => "[",
        Key::RightBracket => "]",
        Key::BackQuote => "~",
        Key::Minus | Key::KpMinus => "-",
        Key::Equal | Key::KpPlus => "+",

        // Raw platform keycodes take the virtual-key path; out-of-range
        // values are dropped by the normalizer.
        Key::Unknown(code) => return Some(RawCode::Int(code.into())),

        _ => return None,
    };
    Some(RawCode::Text(text.to_string()))
}

// ---------------------------------------------------------------------------
// Mouse
// ---------------------------------------------------------------------------

/// System-wide mouse button hook.
pub struct RdevMouseBackend;

impl HookBackend for RdevMouseBackend {
    fn spawn(
        &mut self,
        sink: RawSink,
        errors: ErrorCallback,
        stop: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, InputError> {
        spawn_listener(
            InputSource::Mouse,
            "mouse-capture",
            sink,
            errors,
            stop,
            translate_mouse,
        )
    }
}

fn translate_mouse(event_type: &rdev::EventType) -> Option<(RawCode, bool)> {
    match event_type {
        rdev::EventType::ButtonPress(button) => {
            raw_code_from_button(*button).map(|raw| (raw, true))
        }
        rdev::EventType::ButtonRelease(button) => {
            raw_code_from_button(*button).map(|raw| (raw, false))
        }
        _ => None,
    }
}

/// Map an [`rdev::Button`] to the mouse normalizer's 0–4 index space.
///
/// Side buttons arrive as `Unknown` with platform codes: X11 reports 8/9,
/// Windows reports 1/2.  Anything else is outside the five-button space
/// and is dropped.
fn raw_code_from_button(button: rdev::Button) -> Option<RawCode> {
    let index: i64 = match button {
        rdev::Button::Left => 0,
        rdev::Button::Right => 1,
        rdev::Button::Middle => 2,
        rdev::Button::Unknown(1) | rdev::Button::Unknown(8) => 3,
        rdev::Button::Unknown(2) | rdev::Button::Unknown(9) => 4,
        rdev::Button::Unknown(_) => return None,
    };
    Some(RawCode::Int(index))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
