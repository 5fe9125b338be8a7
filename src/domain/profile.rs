//! Borrower profiles as seen by the exchange, and the port used to fetch them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{errors::ExchangeError, qr::payload};

const ID_KEYS: &[&str] = &["id", "_id", "userId", "user_id"];
const NAME_KEYS: &[&str] = &["name", "fullName", "full_name", "displayName", "display_name"];
const FIRST_NAME_KEYS: &[&str] = &["firstName", "first_name"];
const LAST_NAME_KEYS: &[&str] = &["lastName", "last_name"];
const PHONE_KEYS: &[&str] = &[
    "phone",
    "phoneNumber",
    "phone_number",
    "contactPhone",
    "contact_phone",
    "mobile",
];

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile {0} not found")]
    NotFound(String),

    #[error("Profile service failure: {0}")]
    Upstream(String),

    #[error("Invalid profile record: {0}")]
    InvalidRecord(String),
}

/// Canonical borrower profile. Everything past the service boundary uses this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerProfile {
    pub id: String,
    pub display_name: String,
    pub phone: String,
}

impl BorrowerProfile {
    /// Identity payload for this profile, stamped with the current time.
    pub fn to_payload(&self) -> Result<String, ExchangeError> {
        payload::encode(&self.id, &self.display_name, &self.phone)
    }
}

/// A profile record as the backend sends it, before normalization.
///
/// Backends disagree on key casing (`phone_number` vs `phoneNumber`), so the
/// record stays an untyped map until [`BorrowerProfile::try_from`] picks the
/// first key present for each field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawProfileRecord(Map<String, Value>);

impl RawProfileRecord {
    /// Accepts a bare record or one wrapped in a `{ "data": ... }` envelope.
    pub fn from_value(value: Value) -> Result<Self, ProfileError> {
        let Value::Object(mut fields) = value else {
            return Err(ProfileError::InvalidRecord(
                "expected a JSON object".to_string(),
            ));
        };
        if let Some(Value::Object(data)) = fields.remove("data") {
            return Ok(Self(data));
        }
        Ok(Self(fields))
    }

    fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.0.get(*key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    fn display_name(&self) -> Option<String> {
        if let Some(name) = self.first_text(NAME_KEYS) {
            return Some(name);
        }
        let parts: Vec<String> = [FIRST_NAME_KEYS, LAST_NAME_KEYS]
            .into_iter()
            .filter_map(|keys| self.first_text(keys))
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

impl TryFrom<RawProfileRecord> for BorrowerProfile {
    type Error = ProfileError;

    fn try_from(record: RawProfileRecord) -> Result<Self, Self::Error> {
        let id = record
            .first_text(ID_KEYS)
            .ok_or_else(|| ProfileError::InvalidRecord("missing profile id".to_string()))?;

        Ok(Self {
            id,
            display_name: record.display_name().unwrap_or_default(),
            phone: record.first_text(PHONE_KEYS).unwrap_or_default(),
        })
    }
}

/// Opaque access to the loan-management backend.
#[async_trait]
pub trait ProfileService: Send + Sync + 'static {
    async fn fetch_profile(&self, id: &str) -> Result<BorrowerProfile, ProfileError>;
}
