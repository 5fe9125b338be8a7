//! Identity payload carried inside profile QR codes.
//!
//! Wire format is UTF-8 JSON with the keys `userId`, `name`, `phone`, `type`
//! and `timestamp`. Unknown keys are ignored on decode.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::errors::ExchangeError;

/// Discriminator value for borrower profile payloads.
pub const BORROWER_PROFILE: &str = "borrower-profile";

const REQUIRED_KEYS: [&str; 3] = ["userId", "name", "phone"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadKind {
    #[serde(rename = "borrower-profile")]
    BorrowerProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPayload {
    #[serde(rename = "userId")]
    pub subject_id: String,

    #[serde(rename = "name")]
    pub display_name: String,

    #[serde(rename = "phone")]
    pub contact_phone: String,

    #[serde(rename = "type")]
    pub kind: PayloadKind,

    /// ISO-8601 issue time. Advisory only, never checked for freshness.
    #[serde(
        rename = "timestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub issued_at: Option<String>,
}

impl IdentityPayload {
    pub fn new(
        subject_id: impl Into<String>,
        display_name: impl Into<String>,
        contact_phone: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            display_name: display_name.into(),
            contact_phone: contact_phone.into(),
            kind: PayloadKind::BorrowerProfile,
            issued_at: Some(issued_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    pub fn to_json(&self) -> Result<String, ExchangeError> {
        serde_json::to_string(self).map_err(|e| ExchangeError::EncodingFailed(e.to_string()))
    }
}

/// Serializes a borrower profile payload stamped with the current time.
pub fn encode(
    subject_id: &str,
    display_name: &str,
    contact_phone: &str,
) -> Result<String, ExchangeError> {
    encode_at(subject_id, display_name, contact_phone, Utc::now())
}

pub fn encode_at(
    subject_id: &str,
    display_name: &str,
    contact_phone: &str,
    issued_at: DateTime<Utc>,
) -> Result<String, ExchangeError> {
    IdentityPayload::new(subject_id, display_name, contact_phone, issued_at).to_json()
}

/// Parses and validates a scanned payload.
///
/// Text that is not JSON is a [`ExchangeError::MalformedPayload`]; JSON with the
/// wrong shape or discriminator is a [`ExchangeError::UnrecognizedFormat`].
pub fn decode(raw: &str) -> Result<IdentityPayload, ExchangeError> {
    let value: Value = serde_json::from_str(raw)?;

    let Value::Object(fields) = value else {
        return Err(ExchangeError::UnrecognizedFormat(
            "payload is not a JSON object".to_string(),
        ));
    };

    check_shape(&fields)?;

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| ExchangeError::UnrecognizedFormat(e.to_string()))
}

fn check_shape(fields: &Map<String, Value>) -> Result<(), ExchangeError> {
    match fields.get("type").and_then(Value::as_str) {
        Some(BORROWER_PROFILE) => {}
        Some(other) => {
            return Err(ExchangeError::UnrecognizedFormat(format!(
                "unexpected payload type `{other}`"
            )));
        }
        None => {
            return Err(ExchangeError::UnrecognizedFormat(
                "missing payload type".to_string(),
            ));
        }
    }

    for key in REQUIRED_KEYS {
        if !fields.get(key).is_some_and(Value::is_string) {
            return Err(ExchangeError::UnrecognizedFormat(format!(
                "missing field `{key}`"
            )));
        }
    }

    if fields
        .get("userId")
        .and_then(Value::as_str)
        .is_some_and(str::is_empty)
    {
        return Err(ExchangeError::UnrecognizedFormat(
            "empty field `userId`".to_string(),
        ));
    }

    Ok(())
}
