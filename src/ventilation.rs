//! Translating user-facing ventilation choices into ECO mode/speed bytes.

use serde::{Deserialize, Serialize};

use crate::types::VentilationPreset;

pub const MIN_FAN_LEVEL: u8 = 0;
pub const MAX_FAN_LEVEL: u8 = 4;

/// Mode byte used when the current mode is unknown or a runtime-only code.
const DEFAULT_MODE: u8 = 4;
/// Codes at or above this value only appear in `mode_state`, never in writes.
const RUNTIME_MODE_FLOOR: i64 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanSpeed {
    Off,
    Sleep,
    Vel1,
    Vel2,
    Vel3,
    Auto,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 6] = [
        FanSpeed::Off,
        FanSpeed::Sleep,
        FanSpeed::Vel1,
        FanSpeed::Vel2,
        FanSpeed::Vel3,
        FanSpeed::Auto,
    ];

    pub fn code(&self) -> u8 {
        match self {
            FanSpeed::Off => 0,
            FanSpeed::Sleep => 1,
            FanSpeed::Vel1 => 2,
            FanSpeed::Vel2 => 3,
            FanSpeed::Vel3 => 4,
            FanSpeed::Auto => 16,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| i64::from(s.code()) == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FanSpeed::Off => "off",
            FanSpeed::Sleep => "sleep",
            FanSpeed::Vel1 => "vel1",
            FanSpeed::Vel2 => "vel2",
            FanSpeed::Vel3 => "vel3",
            FanSpeed::Auto => "auto",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|speed| speed.as_str() == s)
    }
}

pub fn fan_level_to_percentage(level: u8) -> u8 {
    let level = level.min(MAX_FAN_LEVEL);
    (u16::from(level) * 100 / u16::from(MAX_FAN_LEVEL)) as u8
}

pub fn percentage_to_fan_level(percentage: u8) -> u8 {
    let pct = f64::from(percentage.min(100));
    let level = (pct / 100.0 * f64::from(MAX_FAN_LEVEL)).round() as u8;
    level.clamp(MIN_FAN_LEVEL, MAX_FAN_LEVEL)
}

/// Mode and speed bytes for one `eco/send/` write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VentilationCommand {
    pub mode: u8,
    pub speed: u8,
}

impl VentilationCommand {
    pub fn off() -> Self {
        Self { mode: 0, speed: 0 }
    }

    /// Switches airflow direction, keeping the running speed (never 0).
    pub fn for_preset(preset: VentilationPreset, current_level: Option<u8>) -> Self {
        let speed = current_level.unwrap_or(MAX_FAN_LEVEL).max(1);
        Self {
            mode: preset.code(),
            speed,
        }
    }

    pub fn for_percentage(percentage: u8, current_mode: Option<i64>) -> Self {
        Self {
            mode: writable_mode(current_mode),
            speed: percentage_to_fan_level(percentage),
        }
    }

    pub fn for_speed(speed: FanSpeed, current_mode: Option<i64>) -> Self {
        if speed == FanSpeed::Off {
            return Self::off();
        }
        Self {
            mode: writable_mode(current_mode),
            speed: speed.code(),
        }
    }
}

fn writable_mode(current_mode: Option<i64>) -> u8 {
    match current_mode {
        Some(mode) if (0..RUNTIME_MODE_FLOOR).contains(&mode) => mode as u8,
        _ => DEFAULT_MODE,
    }
}
