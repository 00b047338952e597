//! Reshapes the cloud's device payloads into [`DeviceRecord`]s.
//!
//! Endpoint generations disagree on field names, nest sub-documents as
//! stringified JSON, and wrap device lists in different envelope keys. Each
//! logical attribute is therefore resolved through an ordered alias list; the
//! first *present* field (exists, not null, not a blank string) wins. Every
//! derivation is total: bad input yields an absent value, never an error.

use serde_json::{Map, Value};

use crate::protocol::scalar_string;
use crate::types::{DeviceRecord, HvacMode, VentilationPreset};
use crate::ventilation::{MAX_FAN_LEVEL, MIN_FAN_LEVEL};

const ENVELOPE_KEYS: &[&str] = &["data", "devices", "results", "items"];
const NESTED_JSON_FIELDS: &[&str] = &["model", "config"];

const CURRENT_TEMPERATURE: &[&str] = &["t_amb", "tamb"];
const TARGET_TEMPERATURE: &[&str] = &["tmanw", "tmans", "tset"];
const OUTDOOR_TEMPERATURE: &[&str] = &["outside_temperature", "outdoor_temperature"];
const HUMIDITY: &[&str] = &["humidity", "rh"];
const SERIAL: &[&str] = &["crono_sn", "multi_sn", "serial"];
const FAN_SPEED: &[&str] = &["speed_state", "speed_set"];
const VENTILATION_MODE: &[&str] = &["mode_state", "mode_set"];
const HVAC_MODE: &str = "hvac_mode";

/// Scheduled ECO states report native levels 1..=4 shifted by this offset.
const TRANSLATED_FAN_LEVELS: std::ops::RangeInclusive<i64> = 16..=19;
const TRANSLATED_FAN_OFFSET: i64 = 15;

/// Device entries from a response envelope, or the envelope itself when the
/// endpoint returns a bare list.
pub fn device_list(envelope: &Value) -> &[Value] {
    if let Value::Array(items) = envelope {
        return items;
    }
    ENVELOPE_KEYS
        .iter()
        .find_map(|key| envelope.get(*key).and_then(|v| v.as_array()))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn normalize_devices(envelope: &Value) -> Vec<DeviceRecord> {
    device_list(envelope)
        .iter()
        .filter_map(|entry| entry.as_object())
        .filter_map(|entry| normalize_device(expand_nested_json(entry)))
        .collect()
}

/// Replaces stringified `model` / `config` sub-documents with their parsed
/// value. Strings that are not JSON stay as they are.
pub fn expand_nested_json(entry: &Map<String, Value>) -> Map<String, Value> {
    let mut device = entry.clone();
    for field in NESTED_JSON_FIELDS {
        if let Some(Value::String(text)) = device.get(*field)
            && let Ok(parsed) = serde_json::from_str::<Value>(text)
        {
            device.insert((*field).to_string(), parsed);
        }
    }
    device
}

fn normalize_device(device: Map<String, Value>) -> Option<DeviceRecord> {
    let id = device
        .get("id")
        .and_then(scalar_string)
        .filter(|id| !id.is_empty())?;

    let (model_family, model_variant) = match device.get("model") {
        Some(Value::Object(model)) => (
            model.get("modello").and_then(scalar_string),
            model.get("tipo").and_then(scalar_string),
        ),
        Some(Value::String(model)) if !model.trim().is_empty() => (Some(model.clone()), None),
        _ => (None, None),
    };

    let raw_config = match device.get("config") {
        Some(Value::Object(config)) => config.clone(),
        _ => Map::new(),
    };

    let hvac_mode_raw = hvac_mode_raw(&device, &raw_config);
    let fan_speed_raw = first_int(&device, FAN_SPEED);
    let fan_mode_raw = first_int(&device, VENTILATION_MODE);

    Some(DeviceRecord {
        id,
        name: first_present(&device, &["name"]).and_then(scalar_string),
        serial: first_present(&device, SERIAL).and_then(scalar_string),
        model_family,
        model_variant,
        version: first_present(&device, &["version"]).and_then(scalar_string),
        current_temperature: first_present(&device, CURRENT_TEMPERATURE).and_then(as_float),
        target_temperature: first_present(&device, TARGET_TEMPERATURE).and_then(as_float),
        outdoor_temperature: first_present(&device, OUTDOOR_TEMPERATURE).and_then(as_float),
        humidity: first_present(&device, HUMIDITY).and_then(as_float),
        hvac_mode: hvac_mode_raw
            .as_deref()
            .map(HvacMode::from_vendor_code)
            .unwrap_or_default(),
        hvac_mode_raw,
        fan_level: fan_speed_raw.map(fan_level),
        fan_speed_raw,
        ventilation_preset: fan_mode_raw.and_then(VentilationPreset::from_code),
        fan_mode_raw,
        raw_config,
        raw: device,
    })
}

/// Runtime `hvac_mode`, falling back to the configured `config.mode`.
fn hvac_mode_raw(device: &Map<String, Value>, config: &Map<String, Value>) -> Option<String> {
    first_present(device, &[HVAC_MODE])
        .or_else(|| first_present(config, &["mode"]))
        .and_then(scalar_string)
        .map(|mode| mode.trim().to_string())
}

/// Maps a raw ECO speed to the native 0..=4 scale.
pub fn fan_level(raw: i64) -> u8 {
    let level = if TRANSLATED_FAN_LEVELS.contains(&raw) {
        raw - TRANSLATED_FAN_OFFSET
    } else {
        raw
    };
    level.clamp(i64::from(MIN_FAN_LEVEL), i64::from(MAX_FAN_LEVEL)) as u8
}

fn first_present<'a>(device: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| device.get(*alias))
        .find(|value| is_present(value))
}

/// Runtime/configured pairs: a runtime value that is not a number falls
/// through to the configured one.
fn first_int(device: &Map<String, Value>, aliases: &[&str]) -> Option<i64> {
    aliases
        .iter()
        .filter_map(|alias| device.get(*alias))
        .find_map(as_int)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
