use serde_json::{Value, json};
use uuid::Uuid;

pub const STATUS_OK: &str = "OK";
pub const STATUS_NO_AUTH: &str = "NO_AUTH";

pub const HEADER_TOKEN_ID: &str = "Tokenid";
pub const HEADER_TOKEN: &str = "Token";

/// Model name of the only thermostat family that accepts writes.
pub const THERMOSTAT_MODEL: &str = "C800WiFi";
pub const VENTILATION_MODEL: &str = "ECO";

pub fn status_of(envelope: &Value) -> Option<&str> {
    envelope.get("status").and_then(|v| v.as_str())
}

/// Client metadata the login endpoint expects next to the credentials.
pub fn login_body() -> Value {
    json!({
        "manufacturer": "Homebridge",
        "model": "NodeJS",
        "platform": "IntelliClimaHomebridge",
        "version": "1.0.0",
        "serial": "unknown",
        "uuid": Uuid::new_v4().to_string().to_uppercase(),
        "language": "english"
    })
}

pub fn thermostat_query_body(device_id: &str) -> Value {
    json!({
        "IDs": device_id,
        "ECOs": "",
        "includi_eco": true,
        "includi_ledot": true
    })
}

pub fn ventilation_query_body(eco_ids: &[String]) -> Value {
    json!({
        "IDs": "",
        "ECOs": eco_ids.join(","),
        "C900s": "",
        "RHINOs": "",
        "ECO3s": "",
        "includi_eco": true,
        "includi_ledot": true,
        "includi_c900": true,
        "includi_rhino": true,
        "includi_eco3": true
    })
}

pub fn thermostat_write_body(serial: &str, target_temperature: f64, mode_code: u8) -> Value {
    json!({
        "serial": serial,
        "w_Tset_Tman": target_temperature,
        "mode": mode_code
    })
}

pub fn ventilation_write_body(trama: &str) -> Value {
    json!({ "trama": trama })
}

/// Renders a JSON scalar the way the cloud's ids and serials are compared:
/// strings as-is, everything else through its JSON text.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
