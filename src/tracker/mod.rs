//! Input-event driven skill matching.
//!
//! [`TrackerEngine`] applies select/skill hold rules against normalized
//! [`InputEvent`]s.  For combo rules the select key acts as a held
//! modifier: the skill fires when its skill key is pressed while the
//! configured select key is currently held.
//!
//! The engine is only ever touched by the router's worker thread, so it
//! carries no synchronization of its own.  Held-modifier state lives in a
//! side map keyed by rule id; the [`SkillRule`] values stay plain
//! configuration data.

use std::collections::HashMap;

use crate::config::SkillRule;
use crate::input::{infer_input_source, normalize_input_code, InputEvent, RawCode};

/// Match a configured key string against an incoming canonical event code.
///
/// Configured strings may be in legacy or alias form (`"GamePad Button 4"`,
/// `"lshift"`), so they are re-resolved through the normalizer — inferring
/// their own family, falling back to the event's — before a
/// case-insensitive comparison.
fn matches_event_code(config_code: Option<&str>, event: &InputEvent) -> bool {
    let Some(config_code) = config_code else {
        return false;
    };
    let raw = RawCode::Text(config_code.to_string());
    let source = infer_input_source(&raw).unwrap_or(event.source);
    match normalize_input_code(&raw, Some(source)) {
        Some(normalized) => normalized.eq_ignore_ascii_case(&event.code),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// TrackerEngine
// ---------------------------------------------------------------------------

/// Per-skill Idle/Armed state machine over the configured rule set.
#[derive(Debug, Default)]
pub struct TrackerEngine {
    rules: Vec<SkillRule>,
    /// Rule id -> select key currently held.  Entirely transient; cleared
    /// whenever the rule set is replaced or a session starts/stops.
    held: HashMap<i64, bool>,
}

impl TrackerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked rule set.  All held-modifier state is discarded,
    /// so re-enabled or newly installed combo rules always require a fresh
    /// select-key press.
    pub fn set_skill_rules(&mut self, rules: impl IntoIterator<Item = SkillRule>) {
        self.rules = rules.into_iter().collect();
        self.held.clear();
    }

    /// Clear held-modifier state without touching the rule set.  Called at
    /// session boundaries so no armed state leaks across sessions.
    pub fn reset_keys(&mut self) {
        self.held.clear();
    }

    pub fn rules(&self) -> &[SkillRule] {
        &self.rules
    }

    fn select_key_held(&self, rule_id: i64) -> bool {
        self.held.get(&rule_id).copied().unwrap_or(false)
    }

    /// Consume one normalized event and return the skills that should fire.
    ///
    /// Press events evaluate all skill-key matches before any select-key
    /// state is updated, so a single event can never arm and trigger the
    /// same rule — including rules whose skill and select keys are the same
    /// code.  Release events only disarm; they never trigger.
    pub fn process_event(&mut self, event: &InputEvent) -> Vec<SkillRule> {
        if !event.pressed {
            for rule in &self.rules {
                if rule.is_enabled && matches_event_code(rule.select_key.as_deref(), event) {
                    self.held.insert(rule.id, false);
                }
            }
            return Vec::new();
        }

        let mut triggered = Vec::new();
        for rule in &self.rules {
            if !rule.is_enabled {
                continue;
            }
            if matches_event_code(rule.skill_key.as_deref(), event)
                && (rule.select_key.is_none() || self.select_key_held(rule.id))
            {
                triggered.push(rule.clone());
            }
        }

        let mut armed = Vec::new();
        for rule in &self.rules {
            if rule.is_enabled && matches_event_code(rule.select_key.as_deref(), event) {
                armed.push(rule.id);
            }
        }
        for rule_id in armed {
            self.held.insert(rule_id, true);
        }

        triggered
    }
}

/// One-shot helper: process a single event against a rule set with no
/// retained state.
pub fn process_input_event(
    event: &InputEvent,
    rules: impl IntoIterator<Item = SkillRule>,
) -> Vec<SkillRule> {
    let mut engine = TrackerEngine::new();
    engine.set_skill_rules(rules);
    engine.process_event(event)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputSource;

    fn rule(id: i64, select_key: Option<&str>, skill_key: &str) -> SkillRule {
        SkillRule {
            id,
            select_key: select_key.map(str::to_string),
            skill_key: Some(skill_key.to_string()),
            ..SkillRule::default()
        }
    }

    fn press(code: &str, source: InputSource) -> InputEvent {
        InputEvent::with_timestamp(code, source, 0.0, true).expect("event")
    }

    fn release(code: &str, source: InputSource) -> InputEvent {
        InputEvent::with_timestamp(code, source, 0.0, false).expect("event")
    }

    fn ids(triggered: &[SkillRule]) -> Vec<i64> {
        triggered.iter().map(|r| r.id).collect()
    }

    #[test]
    fn plain_rule_fires_on_skill_key_press() {
        let mut engine = TrackerEngine::new();
        engine.set_skill_rules([rule(1, None, "F8")]);

        let triggered = engine.process_event(&press("F8", InputSource::Keyboard));
        assert_eq!(ids(&triggered), vec![1]);
        // Releases never trigger.
        assert!(engine
            .process_event(&release("F8", InputSource::Keyboard))
            .is_empty());
    }

    #[test]
    fn combo_rule_requires_held_select_key() {
        let mut engine = TrackerEngine::new();
        engine.set_skill_rules([rule(7, Some("Buttons4"), "Buttons0")]);

        // Skill key before select key: nothing.
        assert!(engine
            .process_event(&press("Buttons0", InputSource::Gamepad))
            .is_empty());

        // Hold select, then skill: fires.
        engine.process_event(&press("Buttons4", InputSource::Gamepad));
        let triggered = engine.process_event(&press("Buttons0", InputSource::Gamepad));
        assert_eq!(ids(&triggered), vec![7]);

        // Release select, skill again: nothing.
        engine.process_event(&release("Buttons4", InputSource::Gamepad));
        assert!(engine
            .process_event(&press("Buttons0", InputSource::Gamepad))
            .is_empty());
    }

    #[test]
    fn select_press_cannot_arm_and_trigger_in_one_event() {
        // Skill key and select key are the same code; the press that arms
        // the rule must not also fire it.
        let mut engine = TrackerEngine::new();
        engine.set_skill_rules([rule(3, Some("F5"), "F5")]);

        assert!(engine
            .process_event(&press("F5", InputSource::Keyboard))
            .is_empty());
        // Now armed; second press both fires and stays armed.
        let triggered = engine.process_event(&press("F5", InputSource::Keyboard));
        assert_eq!(ids(&triggered), vec![3]);
    }

    #[test]
    fn disabled_rules_are_skipped_entirely() {
        let mut engine = TrackerEngine::new();
        let mut disabled = rule(4, Some("LShiftKey"), "Q");
        disabled.is_enabled = false;
        engine.set_skill_rules([disabled]);

        // Neither arms nor triggers while disabled.
        engine.process_event(&press("LShiftKey", InputSource::Keyboard));
        assert!(engine
            .process_event(&press("Q", InputSource::Keyboard))
            .is_empty());
    }

    #[test]
    fn reenabling_requires_a_fresh_press_sequence() {
        let mut engine = TrackerEngine::new();
        let combo = rule(9, Some("LShiftKey"), "Q");
        engine.set_skill_rules([combo.clone()]);

        // Arm while enabled.
        engine.process_event(&press("LShiftKey", InputSource::Keyboard));

        // Disable mid-hold (config layer replaces the rule set)...
        let mut disabled = combo.clone();
        disabled.is_enabled = false;
        engine.set_skill_rules([disabled]);
        // ...and re-enable.
        engine.set_skill_rules([combo]);

        // No residual arm state: skill alone does nothing.
        assert!(engine
            .process_event(&press("Q", InputSource::Keyboard))
            .is_empty());
        engine.process_event(&press("LShiftKey", InputSource::Keyboard));
        assert_eq!(
            ids(&engine.process_event(&press("Q", InputSource::Keyboard))),
            vec![9]
        );
    }

    #[test]
    fn legacy_config_strings_match_canonical_events() {
        let mut engine = TrackerEngine::new();
        engine.set_skill_rules([rule(2, Some("GamePad Button 4"), "gamepadbutton0")]);

        engine.process_event(&press("Buttons4", InputSource::Gamepad));
        let triggered = engine.process_event(&press("Buttons0", InputSource::Gamepad));
        assert_eq!(ids(&triggered), vec![2]);
    }

    #[test]
    fn reset_keys_disarms_all_rules() {
        let mut engine = TrackerEngine::new();
        engine.set_skill_rules([rule(5, Some("MOUSE2"), "MOUSE1")]);

        engine.process_event(&press("MOUSE2", InputSource::Mouse));
        engine.reset_keys();
        assert!(engine
            .process_event(&press("MOUSE1", InputSource::Mouse))
            .is_empty());
    }

    #[test]
    fn multiple_rules_share_one_event() {
        let mut engine = TrackerEngine::new();
        engine.set_skill_rules([
            rule(1, None, "F1"),
            rule(2, None, "F1"),
            rule(3, None, "F2"),
        ]);
        let triggered = engine.process_event(&press("F1", InputSource::Keyboard));
        assert_eq!(ids(&triggered), vec![1, 2]);
    }

    #[test]
    fn one_shot_helper_matches_plain_rules() {
        let triggered = process_input_event(
            &press("F8", InputSource::Keyboard),
            [rule(11, None, "f8")],
        );
        assert_eq!(ids(&triggered), vec![11]);
    }
}
