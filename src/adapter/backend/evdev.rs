//! Linux gamepad backend reading `/dev/input` through `evdev`.
//!
//! Devices are selected by capability (a gamepad advertises `BTN_SOUTH` or
//! `BTN_MODE`) and drained on every poll; an empty queue reads as
//! `WouldBlock` and simply yields no events.  Removal
//! shows up as a read error on the dead handle; the backend drops it and
//! reports a device change so the adapter reconciles.  Newly plugged pads
//! are picked up by the adapter's periodic rescan.
//!
//! Button codes are shifted into a 0-based index space (`BTN_SOUTH` = 0),
//! and the two analog triggers (`ABS_Z` / `ABS_RZ`) are presented as
//! logical axes 4 and 5 with values scaled into 0.0–1.0 using each
//! device's reported axis limits, matching the adapter's trigger-axis
//! table.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use evdev::{AbsoluteAxisType, Device, InputEventKind, Key};

use crate::adapter::gamepad::{GamepadBackend, GamepadDeviceInfo, PadEvent};
use crate::adapter::InputError;

const INPUT_DIR: &str = "/dev/input";

/// First and last gamepad button codes (BTN_SOUTH..=BTN_THUMBR).
const BTN_GAMEPAD_FIRST: u16 = 0x130;
const BTN_GAMEPAD_LAST: u16 = 0x13e;

/// Trigger travel assumed when a device does not report axis limits;
/// 0–255 is what common pads advertise.
const DEFAULT_TRIGGER_RANGE: (f32, f32) = (0.0, 255.0);

/// Logical axis indices the adapter's hysteresis table expects.
const LEFT_TRIGGER_AXIS: u32 = 4;
const RIGHT_TRIGGER_AXIS: u32 = 5;

struct PadDevice {
    path: PathBuf,
    device: Device,
    name: String,
    button_count: usize,
    /// Logical trigger axis -> (min, max) raw travel, from the device's
    /// reported axis limits.
    trigger_ranges: HashMap<u32, (f32, f32)>,
}

/// Gamepad capture over evdev device nodes.
pub struct EvdevGamepadBackend {
    devices: Vec<PadDevice>,
}

impl EvdevGamepadBackend {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    fn holds(&self, path: &Path) -> bool {
        self.devices.iter().any(|pad| pad.path == path)
    }
}

impl Default for EvdevGamepadBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn is_gamepad(device: &Device) -> bool {
    device
        .supported_keys()
        .map(|keys| keys.contains(Key::BTN_SOUTH) || keys.contains(Key::BTN_MODE))
        .unwrap_or(false)
}

fn gamepad_button_count(device: &Device) -> usize {
    device
        .supported_keys()
        .map(|keys| {
            keys.iter()
                .filter(|key| (BTN_GAMEPAD_FIRST..=BTN_GAMEPAD_LAST).contains(&key.code()))
                .count()
        })
        .unwrap_or(0)
}

fn trigger_axis(axis: AbsoluteAxisType) -> Option<u32> {
    match axis {
        AbsoluteAxisType::ABS_Z => Some(LEFT_TRIGGER_AXIS),
        AbsoluteAxisType::ABS_RZ => Some(RIGHT_TRIGGER_AXIS),
        _ => None,
    }
}

/// Read the device's reported travel for both trigger axes.  Devices that
/// report no usable limits fall back to the 0–255 default at poll time.
fn trigger_ranges(device: &Device) -> HashMap<u32, (f32, f32)> {
    let mut ranges = HashMap::new();
    let Ok(abs_state) = device.get_abs_state() else {
        return ranges;
    };
    for axis in [AbsoluteAxisType::ABS_Z, AbsoluteAxisType::ABS_RZ] {
        let Some(logical) = trigger_axis(axis) else {
            continue;
        };
        let info = abs_state[axis.0 as usize];
        if info.maximum > info.minimum {
            ranges.insert(logical, (info.minimum as f32, info.maximum as f32));
        }
    }
    ranges
}

/// Scale a raw trigger reading into 0.0–1.0 within its device range.
fn scale_trigger(value: i32, (min, max): (f32, f32)) -> f32 {
    ((value as f32 - min) / (max - min)).clamp(0.0, 1.0)
}

impl GamepadBackend for EvdevGamepadBackend {
    fn open(&mut self) -> Result<(), InputError> {
        match self.rescan() {
            Ok(()) => Ok(()),
            Err(error) => {
                self.close();
                Err(error)
            }
        }
    }

    fn poll(&mut self, out: &mut Vec<PadEvent>) -> Result<(), InputError> {
        let mut dead = Vec::new();

        for (index, pad) in self.devices.iter_mut().enumerate() {
            match pad.device.fetch_events() {
                Ok(events) => {
                    for event in events {
                        match event.kind() {
                            InputEventKind::Key(key) => {
                                let code = key.code();
                                // value 2 is autorepeat; only edges matter.
                                if (BTN_GAMEPAD_FIRST..=BTN_GAMEPAD_LAST).contains(&code)
                                    && event.value() != 2
                                {
                                    out.push(PadEvent::Button {
                                        button: (code - BTN_GAMEPAD_FIRST).into(),
                                        pressed: event.value() == 1,
                                    });
                                }
                            }
                            InputEventKind::AbsAxis(axis) => {
                                if let Some(logical) = trigger_axis(axis) {
                                    let range = pad
                                        .trigger_ranges
                                        .get(&logical)
                                        .copied()
                                        .unwrap_or(DEFAULT_TRIGGER_RANGE);
                                    out.push(PadEvent::Axis {
                                        axis: logical,
                                        value: scale_trigger(event.value(), range),
                                    });
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {}
                Err(error) => {
                    log::warn!(
                        "gamepad {} ({}) read failed, dropping handle: {error}",
                        pad.name,
                        pad.path.display()
                    );
                    dead.push(index);
                }
            }
        }

        if !dead.is_empty() {
            for index in dead.into_iter().rev() {
                self.devices.remove(index);
            }
            out.push(PadEvent::DeviceChange);
        }
        Ok(())
    }

    fn rescan(&mut self) -> Result<(), InputError> {
        let entries = fs::read_dir(INPUT_DIR)
            .map_err(|e| InputError::DeviceScan(format!("{INPUT_DIR}: {e}")))?;

        for entry in entries.flatten() {
            let path = entry.path();
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if !file_name.starts_with("event") || self.holds(&path) {
                continue;
            }

            // Permission errors are routine for nodes we cannot read.
            let device = match Device::open(&path) {
                Ok(device) => device,
                Err(error) => {
                    log::trace!("skipping {}: {error}", path.display());
                    continue;
                }
            };
            if !is_gamepad(&device) {
                continue;
            }

            let name = device.name().unwrap_or("Unknown gamepad").to_string();
            let button_count = gamepad_button_count(&device);
            let trigger_ranges = trigger_ranges(&device);
            log::debug!(
                "tracking gamepad {} ({}), {} buttons",
                name,
                path.display(),
                button_count
            );
            self.devices.push(PadDevice {
                path,
                device,
                name,
                button_count,
                trigger_ranges,
            });
        }

        self.devices.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(())
    }

    fn devices(&self) -> Vec<GamepadDeviceInfo> {
        self.devices
            .iter()
            .enumerate()
            .map(|(index, pad)| GamepadDeviceInfo {
                index,
                name: pad.name.clone(),
                button_count: pad.button_count,
            })
            .collect()
    }

    fn close(&mut self) {
        self.devices.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
