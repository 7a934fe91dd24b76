//! Input-capture and cooldown-trigger engine for a game-companion overlay.
//!
//! The crate observes keyboard, mouse, and gamepad activity system-wide,
//! normalizes every device's raw codes into one canonical event shape,
//! matches events against configured skill rules (including held-modifier
//! combos), and drives per-skill countdown timers for a presentation layer
//! to render.
//!
//! # Layers
//!
//! 1. [`input`] — canonical codes, event type, and the pure normalizer.
//! 2. [`adapter`] — per-device capture threads behind one
//!    [`adapter::InputAdapter`] contract (rdev hooks, evdev gamepad poll).
//! 3. [`router`] — multi-producer queue with a single dispatch worker
//!    running the [`tracker`] engine.
//! 4. [`countdown`] — timer lifecycle keyed by skill id.
//! 5. [`runtime`] — session controller wiring triggers into countdowns.
//!
//! A minimal embedding:
//!
//! ```no_run
//! use skill_tracker::config::SkillRule;
//! use skill_tracker::runtime::TrackerRuntime;
//!
//! let mut runtime = TrackerRuntime::new();
//! runtime.set_skill_rules([SkillRule {
//!     id: 1,
//!     skill_key: Some("F8".into()),
//!     duration_secs: 8.0,
//!     ..SkillRule::default()
//! }]);
//! runtime.start()?;
//! // ... periodically: runtime.countdown().lock().unwrap().emit_updates(None);
//! runtime.stop()?;
//! # Ok::<(), skill_tracker::adapter::InputError>(())
//! ```

pub mod adapter;
pub mod config;
pub mod countdown;
pub mod input;
pub mod router;
pub mod runtime;
pub mod tracker;

pub use adapter::{InputAdapter, InputError};
pub use config::{Profile, Settings, SkillRule};
pub use countdown::{CountdownEvent, CountdownEventKind, CountdownService};
pub use input::{InputEvent, InputSource};
pub use router::InputRouter;
pub use runtime::TrackerRuntime;
pub use tracker::TrackerEngine;
