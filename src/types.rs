use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::{THERMOSTAT_MODEL, VENTILATION_MODEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    #[default]
    Off,
    Heat,
    Auto,
}

impl HvacMode {
    /// Integer code used by `C800/scrivi/`.
    pub fn vendor_code(&self) -> u8 {
        match self {
            HvacMode::Off => 0,
            HvacMode::Heat => 1,
            HvacMode::Auto => 2,
        }
    }

    /// Reads the runtime `hvac_mode` / `config.mode` code. Unknown codes are off.
    pub fn from_vendor_code(code: &str) -> Self {
        match code.trim() {
            "2" => HvacMode::Auto,
            "1" => HvacMode::Heat,
            _ => HvacMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Auto => "auto",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Some(HvacMode::Off),
            "heat" => Some(HvacMode::Heat),
            "auto" => Some(HvacMode::Auto),
            _ => None,
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ECO airflow direction as exposed to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VentilationPreset {
    OutdoorIntake,
    IndoorExhaust,
    #[serde(rename = "alternating_45s")]
    Alternating45s,
    AlternatingSensor,
}

impl VentilationPreset {
    pub const ALL: [VentilationPreset; 4] = [
        VentilationPreset::OutdoorIntake,
        VentilationPreset::IndoorExhaust,
        VentilationPreset::Alternating45s,
        VentilationPreset::AlternatingSensor,
    ];

    /// Maps `mode_state` / `mode_set`. Code 132 is the runtime form of the
    /// sensor-driven alternating mode.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(VentilationPreset::OutdoorIntake),
            2 => Some(VentilationPreset::IndoorExhaust),
            3 => Some(VentilationPreset::Alternating45s),
            4 | 132 => Some(VentilationPreset::AlternatingSensor),
            _ => None,
        }
    }

    /// Mode byte written into the trama.
    pub fn code(&self) -> u8 {
        match self {
            VentilationPreset::OutdoorIntake => 1,
            VentilationPreset::IndoorExhaust => 2,
            VentilationPreset::Alternating45s => 3,
            VentilationPreset::AlternatingSensor => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VentilationPreset::OutdoorIntake => "outdoor_intake",
            VentilationPreset::IndoorExhaust => "indoor_exhaust",
            VentilationPreset::Alternating45s => "alternating_45s",
            VentilationPreset::AlternatingSensor => "alternating_sensor",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFamily {
    /// C800 chrono-thermostats, queried one id at a time.
    Thermostat,
    /// ECO / ECOCOMFORT ventilation units, queried in one batch.
    Ventilation,
}

/// Canonical device state after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: Option<String>,
    pub serial: Option<String>,
    pub model_family: Option<String>,
    pub model_variant: Option<String>,
    pub version: Option<String>,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub outdoor_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub hvac_mode: HvacMode,
    pub hvac_mode_raw: Option<String>,
    /// Native 0..=4 level: off, sleep, vel1, vel2, vel3.
    pub fan_level: Option<u8>,
    pub fan_speed_raw: Option<i64>,
    pub ventilation_preset: Option<VentilationPreset>,
    pub fan_mode_raw: Option<i64>,
    pub raw_config: Map<String, Value>,
    /// Whole entry after nested-JSON expansion.
    pub raw: Map<String, Value>,
}

impl DeviceRecord {
    pub fn family(&self) -> Option<DeviceFamily> {
        match self.model_family.as_deref() {
            Some(THERMOSTAT_MODEL) => Some(DeviceFamily::Thermostat),
            Some(VENTILATION_MODEL) => Some(DeviceFamily::Ventilation),
            _ => None,
        }
    }

    pub fn is_thermostat(&self) -> bool {
        self.family() == Some(DeviceFamily::Thermostat)
    }

    pub fn is_ventilation(&self) -> bool {
        self.family() == Some(DeviceFamily::Ventilation)
    }

    /// Whether the ventilation unit is running, if its speed is known.
    pub fn is_fan_on(&self) -> Option<bool> {
        self.fan_level.map(|level| level > 0)
    }
}
