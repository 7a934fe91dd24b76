//! OS capture backends behind the adapter traits.
//!
//! `rdev` supplies the system-wide keyboard and mouse hooks on every
//! platform; `evdev` reads gamepads from `/dev/input` on Linux.  Everything
//! above this module is backend-agnostic.

pub mod rdev;

#[cfg(target_os = "linux")]
pub mod evdev;
