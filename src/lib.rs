//! Client for the Intelliclima cloud: C800WiFi thermostats and ECOCOMFORT
//! ventilation units.

mod checksum;
mod client;
mod endpoint;
mod error;
mod frame;
mod logger;
mod normalize;
mod protocol;
mod session;
mod transport;
mod types;
mod ventilation;

pub use checksum::crc8;
pub use client::{DEFAULT_API_FOLDER, DEFAULT_BASE_URL, IntelliclimaClient, IntelliclimaClientBuilder};
pub use endpoint::{EndpointPlan, Operation, PathVars, negotiate};
pub use error::{Error, ErrorKind, Result};
pub use frame::{DecodedFrame, EcoFrame, encode_frame, normalize_serial, verify_acknowledgement};
pub use logger::MessageLogMode;
pub use normalize::{device_list, expand_nested_json, fan_level, normalize_devices};
pub use protocol::{THERMOSTAT_MODEL, VENTILATION_MODEL};
pub use session::{Credentials, DeviceIds, Discovery, Session, SessionState};
pub use transport::{DEFAULT_TIMEOUT, HttpTransport, Method, Request, Response, Transport};
pub use types::*;
pub use ventilation::{
    FanSpeed, MAX_FAN_LEVEL, MIN_FAN_LEVEL, VentilationCommand, fan_level_to_percentage,
    percentage_to_fan_level,
};
