//! Raw-code normalization into per-family canonical tokens.
//!
//! Pure functions, no state.  Matching is case-insensitive and ignores
//! non-alphanumeric separators, so `"Left Shift"`, `"left-shift"` and
//! `"LShiftKey"` all resolve to the same canonical token.  Unrecognized
//! input yields `None`, never an error, so adapters can silently skip keys
//! outside the tracked set.

use super::{InputSource, RawCode};

/// Lowercase a token and strip everything that is not ASCII alphanumeric.
fn simplify_token(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Parse a token consisting only of ASCII digits.
fn parse_digits(token: &str) -> Option<i64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

// ---------------------------------------------------------------------------
// Input source aliases and inference
// ---------------------------------------------------------------------------

/// Resolve a device-family alias (`"kbd"`, `"controller"`, `"pad"`, …).
pub fn parse_input_source(value: &str) -> Option<InputSource> {
    match simplify_token(value).as_str() {
        "keyboard" | "key" | "keys" | "kbd" => Some(InputSource::Keyboard),
        "mouse" => Some(InputSource::Mouse),
        "gamepad" | "controller" | "joystick" | "pad" => Some(InputSource::Gamepad),
        _ => None,
    }
}

/// Infer the device family from the shape of a raw code.
///
/// Mouse-shaped tokens win over gamepad-shaped ones (`"button1"` is a mouse
/// alias), gamepad button tokens are recognized next, and any other text
/// defaults to keyboard.  Integers infer mouse for indices 0–4 and gamepad
/// for any other non-negative value.
pub fn infer_input_source(raw: &RawCode) -> Option<InputSource> {
    match raw {
        RawCode::Int(value) => {
            if mouse_index_code(*value).is_some() {
                Some(InputSource::Mouse)
            } else if buttons_index_code(*value).is_some() {
                Some(InputSource::Gamepad)
            } else {
                None
            }
        }
        RawCode::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            let token = simplify_token(strip_keyboard_prefix(text));
            if token.is_empty() {
                return None;
            }
            if mouse_alias(&token).is_some() || token.starts_with("mouse") {
                return Some(InputSource::Mouse);
            }
            if is_gamepad_token(&token) {
                return Some(InputSource::Gamepad);
            }
            Some(InputSource::Keyboard)
        }
    }
}

fn is_gamepad_token(token: &str) -> bool {
    if token.starts_with("joystickoffset") {
        return true;
    }
    for prefix in ["buttons", "gamepadbutton", "button"] {
        if let Some(rest) = token.strip_prefix(prefix) {
            if parse_digits(rest).is_some() {
                return true;
            }
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Keyboard
// ---------------------------------------------------------------------------

fn strip_keyboard_prefix(text: &str) -> &str {
    let lowered = text.to_ascii_lowercase();
    for prefix in ["key.", "keys.", "keyboard."] {
        if lowered.starts_with(prefix) {
            return &text[prefix.len()..];
        }
    }
    text
}

/// Punctuation characters matched against the raw text before any
/// separator stripping (the separators are the characters themselves).
fn punctuation_alias(text: &str) -> Option<&'static str> {
    match text {
        "," => Some("OemComma"),
        "~" => Some("OemTilde"),
        "[" => Some("OemOpenBrackets"),
        "]" => Some("OemCloseBrackets"),
        ":" | ";" => Some("OemSemicolon"),
        "'" => Some("OemQuotes"),
        "+" => Some("Add"),
        "-" => Some("Subtract"),
        _ => None,
    }
}

fn keyboard_alias(token: &str) -> Option<&'static str> {
    match token {
        "esc" | "escape" => Some("Escape"),
        "enter" | "return" => Some("Return"),
        "tab" => Some("Tab"),
        "back" | "backspace" => Some("Back"),
        "lshift" | "leftshift" | "shiftl" | "shiftleft" | "shiftlkey" | "lshiftkey" => {
            Some("LShiftKey")
        }
        "rshift" | "rightshift" | "shiftr" | "shiftright" | "shiftrkey" | "rshiftkey" => {
            Some("RShiftKey")
        }
        "lalt" | "leftalt" | "altleft" | "altl" | "lmenu" => Some("LMenu"),
        "ralt" | "rightalt" | "altright" | "altr" | "rmenu" => Some("RMenu"),
        "lcontrol" | "leftcontrol" | "controlleft" | "lctrl" | "ctrll" | "lcontrolkey" => {
            Some("LControlKey")
        }
        "rcontrol" | "rightcontrol" | "controlright" | "rctrl" | "ctrlr" | "rcontrolkey" => {
            Some("RControlKey")
        }
        "comma" | "oemcomma" => Some("OemComma"),
        "tilde" | "oemtilde" => Some("OemTilde"),
        "openbracket" | "leftbracket" | "oemopenbrackets" => Some("OemOpenBrackets"),
        "closebracket" | "rightbracket" | "oemclosebrackets" => Some("OemCloseBrackets"),
        "semicolon" | "oemsemicolon" => Some("OemSemicolon"),
        "quote" | "apostrophe" | "oemquotes" => Some("OemQuotes"),
        "add" | "plus" => Some("Add"),
        "subtract" | "minus" => Some("Subtract"),
        _ => None,
    }
}

fn normalize_keyboard_vk(vk: i64) -> Option<String> {
    match vk {
        65..=90 => Some(((vk as u8) as char).to_string()),
        48..=57 => Some(format!("D{}", vk - 48)),
        _ => None,
    }
}

/// Normalize raw keyboard key identifiers to canonical tracker names.
pub fn normalize_keyboard_code(raw: &RawCode) -> Option<String> {
    let text = match raw {
        RawCode::Int(vk) => return normalize_keyboard_vk(*vk),
        RawCode::Text(text) => text.trim(),
    };
    if text.is_empty() {
        return None;
    }

    if let Some(alias) = punctuation_alias(text) {
        return Some(alias.to_string());
    }

    let text = strip_keyboard_prefix(text);
    if let Some(alias) = punctuation_alias(text) {
        return Some(alias.to_string());
    }

    let token = simplify_token(text);
    if token.is_empty() {
        return None;
    }

    if let Some(alias) = keyboard_alias(&token) {
        return Some(alias.to_string());
    }

    if let Some(rest) = token.strip_prefix('f') {
        if (1..=2).contains(&rest.len()) {
            if let Some(number) = parse_digits(rest) {
                return Some(format!("F{number}"));
            }
        }
    }

    for prefix in ["numpad", "num"] {
        if let Some(rest) = token.strip_prefix(prefix) {
            if rest.len() == 1 && parse_digits(rest).is_some() {
                return Some(format!("NumPad{rest}"));
            }
        }
    }

    if let Some(rest) = token.strip_prefix('d') {
        if rest.len() == 1 && parse_digits(rest).is_some() {
            return Some(format!("D{rest}"));
        }
    }

    if token.len() == 1 {
        let c = token.as_bytes()[0];
        if c.is_ascii_alphabetic() {
            return Some(token.to_ascii_uppercase());
        }
        if c.is_ascii_digit() {
            return Some(format!("D{token}"));
        }
    }

    if let Some(rest) = token.strip_prefix("vk") {
        if let Some(vk) = parse_digits(rest) {
            return normalize_keyboard_vk(vk);
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Mouse
// ---------------------------------------------------------------------------

fn mouse_index_code(index: i64) -> Option<&'static str> {
    match index {
        0 => Some("MOUSE1"),
        1 => Some("MOUSE2"),
        2 => Some("MOUSE3"),
        3 => Some("MOUSEX1"),
        4 => Some("MOUSEX2"),
        _ => None,
    }
}

fn mouse_alias(token: &str) -> Option<&'static str> {
    match token {
        "mouse1" | "left" | "lbutton" | "buttonleft" | "button1" => Some("MOUSE1"),
        "mouse2" | "right" | "rbutton" | "buttonright" | "button2" => Some("MOUSE2"),
        "mouse3" | "middle" | "mbutton" | "buttonmiddle" | "button3" => Some("MOUSE3"),
        "mousex1" | "x1" | "xbutton1" | "buttonx1" | "button4" => Some("MOUSEX1"),
        "mousex2" | "x2" | "xbutton2" | "buttonx2" | "button5" => Some("MOUSEX2"),
        _ => None,
    }
}

/// Normalize raw mouse button identifiers to `MOUSE1`..`MOUSEX2`.
pub fn normalize_mouse_code(raw: &RawCode) -> Option<String> {
    let text = match raw {
        RawCode::Int(index) => return mouse_index_code(*index).map(str::to_string),
        RawCode::Text(text) => text,
    };

    let token = simplify_token(text);
    if token.is_empty() {
        return None;
    }

    if let Some(alias) = mouse_alias(&token) {
        return Some(alias.to_string());
    }

    if let Some(index) = parse_digits(&token) {
        return mouse_index_code(index).map(str::to_string);
    }

    if let Some(rest) = token.strip_prefix("mousex") {
        if let Some(index) = parse_digits(rest) {
            if index == 1 || index == 2 {
                return Some(format!("MOUSEX{index}"));
            }
        }
        return None;
    }

    if let Some(rest) = token.strip_prefix("mouse") {
        if let Some(index) = parse_digits(rest) {
            return mouse_index_code(index - 1).map(str::to_string);
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Gamepad
// ---------------------------------------------------------------------------

// Indices 48–57 come in from legacy configuration data that stored ASCII
// digit codes for the first ten buttons; they collapse to Buttons0..9.
fn buttons_index_code(value: i64) -> Option<String> {
    match value {
        48..=57 => Some(format!("Buttons{}", value - 48)),
        v if v >= 0 => Some(format!("Buttons{v}")),
        _ => None,
    }
}

/// Normalize raw gamepad button identifiers to `Buttons0`..`ButtonsN`.
pub fn normalize_gamepad_code(raw: &RawCode) -> Option<String> {
    let text = match raw {
        RawCode::Int(index) => return buttons_index_code(*index),
        RawCode::Text(text) => text,
    };

    let mut token = simplify_token(text);
    if token.is_empty() {
        return None;
    }

    if let Some(rest) = token.strip_prefix("joystickoffset") {
        token = rest.to_string();
    }

    for prefix in ["buttons", "gamepadbutton", "button"] {
        if let Some(rest) = token.strip_prefix(prefix) {
            if let Some(index) = parse_digits(rest) {
                return buttons_index_code(index);
            }
        }
    }

    if let Some(index) = parse_digits(&token) {
        return buttons_index_code(index);
    }

    None
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Normalize a raw input code, optionally with an explicit family hint.
///
/// Without a hint the family is inferred from the code's shape; `None` is
/// returned when neither inference nor normalization succeeds.
pub fn normalize_input_code(raw: &RawCode, hint: Option<InputSource>) -> Option<String> {
    let source = hint.or_else(|| infer_input_source(raw))?;
    match source {
        InputSource::Keyboard => normalize_keyboard_code(raw),
        InputSource::Mouse => normalize_mouse_code(raw),
        InputSource::Gamepad => normalize_gamepad_code(raw),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn kb(raw: &str) -> Option<String> {
        normalize_keyboard_code(&RawCode::from(raw))
    }

    // ---- Keyboard ----------------------------------------------------------

    #[test]
    fn letters_and_digits_from_virtual_keys() {
        assert_eq!(normalize_keyboard_code(&RawCode::Int(65)).as_deref(), Some("A"));
        assert_eq!(normalize_keyboard_code(&RawCode::Int(90)).as_deref(), Some("Z"));
        assert_eq!(normalize_keyboard_code(&RawCode::Int(48)).as_deref(), Some("D0"));
        assert_eq!(normalize_keyboard_code(&RawCode::Int(57)).as_deref(), Some("D9"));
        assert_eq!(normalize_keyboard_code(&RawCode::Int(13)), None);
    }

    #[test]
    fn function_numpad_and_digit_rows() {
        assert_eq!(kb("f8").as_deref(), Some("F8"));
        assert_eq!(kb("F12").as_deref(), Some("F12"));
        assert_eq!(kb("NumPad3").as_deref(), Some("NumPad3"));
        assert_eq!(kb("num7").as_deref(), Some("NumPad7"));
        assert_eq!(kb("d4").as_deref(), Some("D4"));
        assert_eq!(kb("5").as_deref(), Some("D5"));
        assert_eq!(kb("q").as_deref(), Some("Q"));
    }

    #[test]
    fn modifier_aliases_collapse_to_one_token() {
        for alias in ["lshift", "Left Shift", "shift-left", "LShiftKey"] {
            assert_eq!(kb(alias).as_deref(), Some("LShiftKey"), "alias {alias:?}");
        }
        for alias in ["rctrl", "ControlRight", "right control"] {
            assert_eq!(kb(alias).as_deref(), Some("RControlKey"), "alias {alias:?}");
        }
        assert_eq!(kb("lalt").as_deref(), Some("LMenu"));
    }

    #[test]
    fn punctuation_and_legacy_forms() {
        assert_eq!(kb(",").as_deref(), Some("OemComma"));
        assert_eq!(kb("+").as_deref(), Some("Add"));
        assert_eq!(kb("-").as_deref(), Some("Subtract"));
        assert_eq!(kb(";").as_deref(), Some("OemSemicolon"));
        assert_eq!(kb("[").as_deref(), Some("OemOpenBrackets"));
        assert_eq!(kb("key.f3").as_deref(), Some("F3"));
        assert_eq!(kb("vk66").as_deref(), Some("B"));
    }

    #[test]
    fn keyboard_normalization_is_idempotent_and_total() {
        let mut supported: Vec<String> = Vec::new();
        supported.extend((b'a'..=b'z').map(|c| (c as char).to_string()));
        supported.extend((0..=9).map(|d| d.to_string()));
        supported.extend((1..=12).map(|n| format!("F{n}")));
        supported.extend((0..=9).map(|n| format!("NumPad{n}")));
        supported.extend(
            [",", "~", "[", "]", ";", "'", "+", "-", "lshift", "rshift", "lalt", "ralt",
             "lctrl", "rctrl", "esc", "enter", "tab", "back"]
                .iter()
                .map(|s| s.to_string()),
        );

        for raw in supported {
            let first = kb(&raw).unwrap_or_else(|| panic!("{raw:?} must normalize"));
            let second = kb(&first).expect("canonical form must re-normalize");
            assert_eq!(first, second, "idempotence for {raw:?}");
        }
    }

    // ---- Mouse -------------------------------------------------------------

    #[test]
    fn mouse_indices_and_aliases() {
        assert_eq!(normalize_mouse_code(&RawCode::Int(0)).as_deref(), Some("MOUSE1"));
        assert_eq!(normalize_mouse_code(&RawCode::Int(4)).as_deref(), Some("MOUSEX2"));
        assert_eq!(normalize_mouse_code(&RawCode::Int(5)), None);
        assert_eq!(normalize_mouse_code(&"left".into()).as_deref(), Some("MOUSE1"));
        assert_eq!(normalize_mouse_code(&"Button5".into()).as_deref(), Some("MOUSEX2"));
        assert_eq!(normalize_mouse_code(&"mouse3".into()).as_deref(), Some("MOUSE3"));
        assert_eq!(normalize_mouse_code(&"x1".into()).as_deref(), Some("MOUSEX1"));
        assert_eq!(normalize_mouse_code(&"MOUSEX2".into()).as_deref(), Some("MOUSEX2"));
    }

    // ---- Gamepad -----------------------------------------------------------

    #[test]
    fn legacy_ascii_digit_button_remap() {
        assert_eq!(normalize_gamepad_code(&RawCode::Int(48)).as_deref(), Some("Buttons0"));
        assert_eq!(normalize_gamepad_code(&RawCode::Int(57)).as_deref(), Some("Buttons9"));
        assert_eq!(normalize_gamepad_code(&RawCode::Int(12)).as_deref(), Some("Buttons12"));
        assert_eq!(normalize_gamepad_code(&RawCode::Int(-1)), None);
    }

    #[test]
    fn gamepad_text_forms() {
        assert_eq!(normalize_gamepad_code(&"Buttons4".into()).as_deref(), Some("Buttons4"));
        assert_eq!(
            normalize_gamepad_code(&"GamePad Button 4".into()).as_deref(),
            Some("Buttons4")
        );
        assert_eq!(
            normalize_gamepad_code(&"JoystickOffset.Buttons7".into()).as_deref(),
            Some("Buttons7")
        );
        assert_eq!(normalize_gamepad_code(&"button11".into()).as_deref(), Some("Buttons11"));
        assert_eq!(normalize_gamepad_code(&"3".into()).as_deref(), Some("Buttons3"));
    }

    #[test]
    fn virtual_trigger_buttons_round_trip() {
        // Trigger-axis synthesis emits plain indices; they must normalize the
        // same way real buttons do, in both directions.
        let synthesized = normalize_gamepad_code(&RawCode::Int(4)).expect("code");
        assert_eq!(synthesized, "Buttons4");
        assert_eq!(
            normalize_gamepad_code(&RawCode::Text(synthesized.clone())).as_deref(),
            Some(synthesized.as_str())
        );
    }

    // ---- Inference ---------------------------------------------------------

    #[test]
    fn family_inference_from_token_shape() {
        let infer = |raw: &str| infer_input_source(&RawCode::from(raw));
        assert_eq!(infer("MOUSEX1"), Some(InputSource::Mouse));
        assert_eq!(infer("button1"), Some(InputSource::Mouse)); // mouse alias wins
        assert_eq!(infer("Buttons7"), Some(InputSource::Gamepad));
        assert_eq!(infer("gamepadbutton2"), Some(InputSource::Gamepad));
        assert_eq!(infer("JoystickOffset.Buttons3"), Some(InputSource::Gamepad));
        assert_eq!(infer("F8"), Some(InputSource::Keyboard));
        assert_eq!(infer("anything else"), Some(InputSource::Keyboard));
        assert_eq!(infer(""), None);
    }

    #[test]
    fn family_inference_from_integers() {
        assert_eq!(infer_input_source(&RawCode::Int(2)), Some(InputSource::Mouse));
        assert_eq!(infer_input_source(&RawCode::Int(7)), Some(InputSource::Gamepad));
        assert_eq!(infer_input_source(&RawCode::Int(-3)), None);
    }

    #[test]
    fn source_aliases() {
        assert_eq!(parse_input_source("kbd"), Some(InputSource::Keyboard));
        assert_eq!(parse_input_source("Controller"), Some(InputSource::Gamepad));
        assert_eq!(parse_input_source("mouse"), Some(InputSource::Mouse));
        assert_eq!(parse_input_source("touchpad"), None);
    }

    #[test]
    fn dispatch_with_and_without_hint() {
        assert_eq!(
            normalize_input_code(&"f1".into(), Some(InputSource::Keyboard)).as_deref(),
            Some("F1")
        );
        // No hint: inference routes "Buttons4" to the gamepad rules.
        assert_eq!(normalize_input_code(&"Buttons4".into(), None).as_deref(), Some("Buttons4"));
        assert_eq!(normalize_input_code(&"".into(), None), None);
    }
}
