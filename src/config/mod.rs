//! Configuration domain model: profiles, skill rules, and settings.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so the embedding application can round-trip them through whatever store
//! it uses; this crate itself never reads or writes files.  Field aliases
//! accept the PascalCase names found in configs written by older builds.
//!
//! [`Settings::ensure_defaults`] is the repair pass: deserialized data may
//! be partial or inconsistent, and repair preserves whatever is usable
//! instead of rejecting the whole document.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PROFILE_ID: i64 = 0;
pub const DEFAULT_PROFILE_NAME: &str = "Default";
pub const DEFAULT_SKILL_KEY: &str = "MOUSE2";
pub const DEFAULT_SKILL_DURATION_SECS: f64 = 5.0;

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A named group of skill rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    #[serde(alias = "Id")]
    pub id: i64,
    #[serde(alias = "Name")]
    pub name: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            id: DEFAULT_PROFILE_ID,
            name: DEFAULT_PROFILE_NAME.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// SkillRule
// ---------------------------------------------------------------------------

/// One configured skill trigger.
///
/// Key fields hold canonical codes, but legacy alias forms are accepted
/// too; the tracker re-resolves them on every match.  `select_key` of
/// `None` makes this a plain single-key rule.  Held-modifier state is NOT
/// stored here; the tracker engine keeps it in a side map keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillRule {
    #[serde(alias = "Id")]
    pub id: i64,
    #[serde(alias = "ProfileId")]
    pub profile_id: i64,
    #[serde(alias = "IconFileName")]
    pub icon_file_name: String,
    /// Countdown length started when the rule fires.
    #[serde(alias = "TimeLength", alias = "time_length")]
    pub duration_secs: f64,
    #[serde(alias = "IsEnabled")]
    pub is_enabled: bool,
    #[serde(alias = "SelectKey")]
    pub select_key: Option<String>,
    #[serde(alias = "SkillKey")]
    pub skill_key: Option<String>,
}

impl Default for SkillRule {
    fn default() -> Self {
        Self {
            id: 0,
            profile_id: DEFAULT_PROFILE_ID,
            icon_file_name: String::new(),
            duration_secs: DEFAULT_SKILL_DURATION_SECS,
            is_enabled: true,
            select_key: None,
            skill_key: Some(DEFAULT_SKILL_KEY.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Top-level settings document: profiles plus their skill rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(alias = "LastSelectedProfileId")]
    pub last_selected_profile_id: i64,
    #[serde(alias = "SkillItems", alias = "skill_items")]
    pub skill_rules: Vec<SkillRule>,
    #[serde(alias = "Profiles")]
    pub profiles: Vec<Profile>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_selected_profile_id: DEFAULT_PROFILE_ID,
            skill_rules: Vec::new(),
            profiles: vec![Profile::default()],
        }
    }
}

impl Settings {
    /// Repair invalid or partial state while preserving usable data.
    ///
    /// - The default profile always exists and the selected profile always
    ///   refers to a real one.
    /// - Rules pointing at a missing profile are re-homed to the selected
    ///   profile.
    /// - Negative durations fall back to the default duration.
    pub fn ensure_defaults(&mut self) {
        if self.profiles.is_empty() {
            self.profiles.push(Profile::default());
        } else if !self.profiles.iter().any(|p| p.id == DEFAULT_PROFILE_ID) {
            self.profiles.insert(0, Profile::default());
        }

        let profile_ids: Vec<i64> = self.profiles.iter().map(|p| p.id).collect();
        if !profile_ids.contains(&self.last_selected_profile_id) {
            self.last_selected_profile_id = DEFAULT_PROFILE_ID;
        }

        for rule in &mut self.skill_rules {
            if !profile_ids.contains(&rule.profile_id) {
                rule.profile_id = self.last_selected_profile_id;
            }
            if rule.duration_secs < 0.0 || !rule.duration_secs.is_finite() {
                rule.duration_secs = DEFAULT_SKILL_DURATION_SECS;
            }
        }
    }

    /// Rules belonging to one profile, in document order.
    pub fn rules_for_profile(&self, profile_id: i64) -> Vec<SkillRule> {
        self.skill_rules
            .iter()
            .filter(|rule| rule.profile_id == profile_id)
            .cloned()
            .collect()
    }

    /// Rules of the currently selected profile.
    pub fn selected_rules(&self) -> Vec<SkillRule> {
        self.rules_for_profile(self.last_selected_profile_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
