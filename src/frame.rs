//! ECO "trama" frames: the hex command sent to `eco/send/` and echoed back
//! by the cloud as acknowledgement.
//!
//! Layout (16 bytes, 32 hex characters):
//!
//! ```text
//! 0A 00 00 | SS SS | 00 0E 2F 00 50 | 00 00 | MM | VV | CC | 0D
//! start      serial  fixed            pad     mode speed crc  end
//! ```
//!
//! `SS SS` are the last four digits of the 8-digit serial, written as-is
//! (decimal digits are valid hex nibbles).

use crate::checksum::crc8;
use crate::protocol::STATUS_OK;
use crate::{Error, Result};

const FRAME_START: &str = "0A0000";
const FRAME_FIXED: &str = "000E2F0050";
const FRAME_PAD: &str = "0000";
const FRAME_END: &str = "0D";
const FRAME_LEN: usize = 32;
const SERIAL_DIGITS: usize = 8;

/// A validated ECO command. The checksum is derived, never supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcoFrame {
    serial: String,
    mode: u8,
    speed: u8,
    checksum: u8,
}

impl EcoFrame {
    pub fn new(serial: &str, mode: i32, speed: i32) -> Result<Self> {
        let mode = frame_byte("mode", mode)?;
        let speed = frame_byte("speed", speed)?;
        let serial = normalize_serial(serial)?;
        let checksum = crc8(&hex_to_bytes(&body_hex(&serial, mode, speed))?);
        Ok(Self {
            serial,
            mode,
            speed,
            checksum,
        })
    }

    /// Normalized 8-digit serial.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{:02X}{FRAME_END}",
            body_hex(&self.serial, self.mode, self.speed),
            self.checksum
        )
    }

    /// Splits a captured trama into its fields. Only the last four serial
    /// digits travel in the frame, so the full serial is not recoverable.
    pub fn decode(trama: &str) -> Result<DecodedFrame> {
        let trama = trama.trim().to_ascii_uppercase();
        if trama.len() != FRAME_LEN {
            return Err(Error::InvalidTrama(format!(
                "expected {FRAME_LEN} hex characters, got {}",
                trama.len()
            )));
        }
        let bytes = hex_to_bytes(&trama)?;
        Ok(DecodedFrame {
            start: bytes[0],
            serial_suffix: trama[6..10].to_string(),
            fixed_middle: trama[10..24].to_string(),
            mode: bytes[12],
            speed: bytes[13],
            checksum: bytes[14],
            end: bytes[15],
            checksum_valid: crc8(&bytes[..14]) == bytes[14],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub start: u8,
    pub serial_suffix: String,
    pub fixed_middle: String,
    pub mode: u8,
    pub speed: u8,
    pub checksum: u8,
    pub end: u8,
    pub checksum_valid: bool,
}

/// Builds the uppercase hex trama for `serial`, `mode` and `speed`.
pub fn encode_frame(serial: &str, mode: i32, speed: i32) -> Result<String> {
    Ok(EcoFrame::new(serial, mode, speed)?.encode())
}

/// Strips non-digits and left-pads to the 8-digit form the cloud echoes back.
pub fn normalize_serial(serial: &str) -> Result<String> {
    let digits: String = serial.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > SERIAL_DIGITS {
        return Err(Error::InvalidSerial(serial.to_string()));
    }
    Ok(format!("{digits:0>8}"))
}

/// Checks an `eco/send/` response against the frame that was sent.
///
/// The cloud sometimes prefixes the echoed trama with an informational token
/// such as `SERVERECO`, so a response that ends with the expected frame is
/// accepted. An empty trama is accepted as well.
pub fn verify_acknowledgement(
    expected_frame: &str,
    expected_serial: &str,
    response_status: &str,
    response_serial: &str,
    response_trama: &str,
) -> Result<()> {
    if response_status != STATUS_OK {
        return Err(Error::UnexpectedStatus {
            expected: STATUS_OK.to_string(),
            got: response_status.to_string(),
        });
    }

    let expected_serial = normalize_serial(expected_serial)?;
    if !response_serial.is_empty() && response_serial != expected_serial {
        return Err(Error::SerialMismatch {
            expected: expected_serial,
            got: response_serial.to_string(),
        });
    }

    let expected_frame = expected_frame.to_ascii_uppercase();
    let response_trama = response_trama.to_ascii_uppercase();
    if response_trama.is_empty() || response_trama.ends_with(&expected_frame) {
        return Ok(());
    }
    Err(Error::TramaMismatch {
        expected: expected_frame,
        got: response_trama,
    })
}

fn frame_byte(field: &'static str, value: i32) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::InvalidFrameField { field, value })
}

fn body_hex(serial: &str, mode: u8, speed: u8) -> String {
    let suffix = &serial[serial.len() - 4..];
    format!("{FRAME_START}{suffix}{FRAME_FIXED}{FRAME_PAD}{mode:02X}{speed:02X}")
}

fn hex_to_bytes(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::InvalidTrama(format!("{text}: {e}")))
}
