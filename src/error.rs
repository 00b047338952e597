use std::fmt;

use crate::endpoint::Operation;

/// Coarse classification consulted by callers and the endpoint negotiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad credentials or an expired session. The session has been cleared.
    Authentication,
    /// Transient transport failure; retrying the whole operation is safe.
    Communication,
    /// Unexpected payload, rejected input or acknowledgement mismatch.
    Protocol,
}

#[derive(Debug)]
pub enum Error {
    AuthenticationFailed(String),
    Http(reqwest::Error),
    Timeout,
    HttpStatus(u16),
    Io(std::io::Error),
    Json(serde_json::Error),
    UnexpectedPayload(String),
    InvalidFrameField { field: &'static str, value: i32 },
    InvalidSerial(String),
    InvalidTrama(String),
    UnexpectedStatus { expected: String, got: String },
    SerialMismatch { expected: String, got: String },
    TramaMismatch { expected: String, got: String },
    UnsupportedModel(Option<String>),
    MissingSerial,
    NoEndpoint(Operation),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AuthenticationFailed(_) => ErrorKind::Authentication,
            Error::Http(_) | Error::Timeout | Error::HttpStatus(_) | Error::Io(_) => {
                ErrorKind::Communication
            }
            _ => ErrorKind::Protocol,
        }
    }

    pub fn is_authentication_failure(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AuthenticationFailed(msg) => write!(f, "authentication failed: {msg}"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::HttpStatus(status) => write!(f, "unexpected HTTP status {status}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Json(e) => write!(f, "invalid JSON payload: {e}"),
            Error::UnexpectedPayload(msg) => write!(f, "unexpected payload: {msg}"),
            Error::InvalidFrameField { field, value } => {
                write!(f, "invalid ECO {field} byte: {value}")
            }
            Error::InvalidSerial(serial) => write!(f, "invalid ECO serial format: {serial:?}"),
            Error::InvalidTrama(msg) => write!(f, "invalid trama: {msg}"),
            Error::UnexpectedStatus { expected, got } => {
                write!(f, "unexpected response status: expected={expected} got={got}")
            }
            Error::SerialMismatch { expected, got } => {
                write!(f, "ECO write acknowledged with unexpected serial: expected={expected} got={got}")
            }
            Error::TramaMismatch { expected, got } => {
                write!(f, "ECO write acknowledged with unexpected trama: expected={expected} got={got}")
            }
            Error::UnsupportedModel(model) => write!(
                f,
                "only C800WiFi supports writes, got model {}",
                model.as_deref().unwrap_or("<none>")
            ),
            Error::MissingSerial => write!(f, "missing ECO serial"),
            Error::NoEndpoint(op) => write!(f, "no endpoint configured for {op}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(Error::AuthenticationFailed("x".into()).is_authentication_failure());
        assert_eq!(Error::Timeout.kind(), ErrorKind::Communication);
        assert_eq!(Error::HttpStatus(503).kind(), ErrorKind::Communication);
        assert_eq!(Error::MissingSerial.kind(), ErrorKind::Protocol);
        assert_eq!(
            Error::NoEndpoint(Operation::Login).kind(),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn mismatch_messages_name_both_sides() {
        let err = Error::TramaMismatch {
            expected: "AA".into(),
            got: "BB".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("expected=AA"));
        assert!(msg.contains("got=BB"));
    }
}
