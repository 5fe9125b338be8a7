use serde::Serialize;
use thiserror::Error;

const PERMISSION_HINT: &str = "Camera access was denied. Allow camera access for this site \
    in your browser or device settings, then try again.";
const NOT_FOUND_HINT: &str = "No camera was found on this device.";
const FORMAT_HINT: &str = "Please scan a borrower profile code.";

/// Errors raised by the QR identity exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Payload is not valid JSON: {0}")]
    MalformedPayload(String),

    #[error("Payload is not a borrower profile: {0}")]
    UnrecognizedFormat(String),

    #[error("Camera permission was denied")]
    PermissionDenied,

    #[error("No capture device available")]
    DeviceNotFound,

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to encode QR code: {0}")]
    EncodingFailed(String),
}

/// Discriminant of an [`ExchangeError`], without the detail text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPayload,
    UnrecognizedFormat,
    PermissionDenied,
    DeviceNotFound,
    DeviceUnavailable,
    EncodingFailed,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::UnrecognizedFormat => "unrecognized_format",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::DeviceNotFound => "device_not_found",
            ErrorKind::DeviceUnavailable => "device_unavailable",
            ErrorKind::EncodingFailed => "encoding_failed",
        }
    }
}

impl ExchangeError {
    pub fn kind(&self) -> ErrorKind {
        use ExchangeError::*;

        match self {
            MalformedPayload(_) => ErrorKind::MalformedPayload,
            UnrecognizedFormat(_) => ErrorKind::UnrecognizedFormat,
            PermissionDenied => ErrorKind::PermissionDenied,
            DeviceNotFound => ErrorKind::DeviceNotFound,
            DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            EncodingFailed(_) => ErrorKind::EncodingFailed,
        }
    }

    /// The text shown to the user next to the retry affordance.
    pub fn user_message(&self) -> String {
        use ExchangeError::*;

        match self {
            PermissionDenied => PERMISSION_HINT.to_string(),
            DeviceNotFound => NOT_FOUND_HINT.to_string(),
            DeviceUnavailable(reason) => format!("Unable to start the camera: {reason}"),
            MalformedPayload(_) | UnrecognizedFormat(_) => FORMAT_HINT.to_string(),
            EncodingFailed(reason) => format!("Unable to generate the QR code: {reason}"),
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::MalformedPayload(err.to_string())
    }
}
