//! Device-agnostic input event contract.
//!
//! Every capture backend reports raw codes in whatever shape its OS API
//! uses — virtual-key integers, key names, button indices, legacy display
//! labels.  [`RawCode`] is the small tagged union those shapes are reduced
//! to at the adapter boundary, and [`normalize`] maps it into one canonical
//! string code per physical input per device family.
//!
//! [`InputEvent`] is the immutable value consumed by the tracker engine.
//! Construction returns `None` when the raw code cannot be normalized for
//! the declared family, so the hot capture-callback path stays free of
//! errors and allocations for unrecognized inputs.

pub mod normalize;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use normalize::{
    infer_input_source, normalize_gamepad_code, normalize_input_code, normalize_keyboard_code,
    normalize_mouse_code, parse_input_source,
};

// ---------------------------------------------------------------------------
// InputSource
// ---------------------------------------------------------------------------

/// Supported input device families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Keyboard,
    Mouse,
    Gamepad,
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputSource::Keyboard => "keyboard",
            InputSource::Mouse => "mouse",
            InputSource::Gamepad => "gamepad",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// RawCode
// ---------------------------------------------------------------------------

/// A raw input code as delivered by a capture backend.
///
/// Each adapter owns one explicit translation function from its backend's
/// native event type into this union; nothing else in the crate ever sees a
/// backend-specific code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCode {
    /// A textual identifier: key name, alias, or legacy display label.
    Text(String),
    /// A numeric identifier: virtual-key value or button index.
    Int(i64),
}

impl From<&str> for RawCode {
    fn from(value: &str) -> Self {
        RawCode::Text(value.to_string())
    }
}

impl From<String> for RawCode {
    fn from(value: String) -> Self {
        RawCode::Text(value)
    }
}

impl From<i64> for RawCode {
    fn from(value: i64) -> Self {
        RawCode::Int(value)
    }
}

impl From<i32> for RawCode {
    fn from(value: i32) -> Self {
        RawCode::Int(value.into())
    }
}

impl From<u32> for RawCode {
    fn from(value: u32) -> Self {
        RawCode::Int(value.into())
    }
}

// ---------------------------------------------------------------------------
// InputEvent
// ---------------------------------------------------------------------------

/// Normalized event shape consumed by the tracker engine.
///
/// Never mutated after construction.  `timestamp` is wall-clock seconds at
/// the moment of the OS notification; routing order is decided by queue
/// arrival, not by this value.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    /// Canonical code, e.g. `"F8"`, `"MOUSE2"`, `"Buttons7"`.
    pub code: String,
    /// Device family the event originated from.
    pub source: InputSource,
    /// Wall-clock seconds since the Unix epoch.
    pub timestamp: f64,
    /// `true` for press, `false` for release.
    pub pressed: bool,
}

impl InputEvent {
    /// Build an event from a raw code, stamping it with the current time.
    ///
    /// Returns `None` when the code does not normalize for `source`.
    pub fn new(raw: impl Into<RawCode>, source: InputSource, pressed: bool) -> Option<Self> {
        Self::with_timestamp(raw, source, unix_time_secs(), pressed)
    }

    /// Build an event with an explicit timestamp.
    pub fn with_timestamp(
        raw: impl Into<RawCode>,
        source: InputSource,
        timestamp: f64,
        pressed: bool,
    ) -> Option<Self> {
        let code = normalize_input_code(&raw.into(), Some(source))?;
        Some(Self {
            code,
            source,
            timestamp,
            pressed,
        })
    }

    /// Build an event from a keyboard adapter payload.
    pub fn keyboard(raw: impl Into<RawCode>, pressed: bool) -> Option<Self> {
        Self::new(raw, InputSource::Keyboard, pressed)
    }

    /// Build an event from a mouse adapter payload.
    pub fn mouse(raw: impl Into<RawCode>, pressed: bool) -> Option<Self> {
        Self::new(raw, InputSource::Mouse, pressed)
    }

    /// Build an event from a gamepad adapter payload.
    pub fn gamepad(raw: impl Into<RawCode>, pressed: bool) -> Option<Self> {
        Self::new(raw, InputSource::Gamepad, pressed)
    }
}

/// Wall-clock seconds since the Unix epoch.
pub(crate) fn unix_time_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_event_normalizes_code() {
        let event = InputEvent::keyboard("f8", true).expect("event");
        assert_eq!(event.code, "F8");
        assert_eq!(event.source, InputSource::Keyboard);
        assert!(event.pressed);
    }

    #[test]
    fn unrecognized_code_yields_none() {
        assert!(InputEvent::keyboard("definitely-not-a-key", true).is_none());
        assert!(InputEvent::mouse(99, true).is_none());
    }

    #[test]
    fn explicit_timestamp_is_preserved() {
        let event = InputEvent::with_timestamp("a", InputSource::Keyboard, 12.5, false)
            .expect("event");
        assert_eq!(event.timestamp, 12.5);
        assert!(!event.pressed);
    }

    #[test]
    fn gamepad_event_from_button_index() {
        let event = InputEvent::gamepad(7, false).expect("event");
        assert_eq!(event.code, "Buttons7");
        assert_eq!(event.source, InputSource::Gamepad);
    }
}
