//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::DomainError;

/// Unique identifier for a User.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random UserId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a UserId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A registered user who can own funding sources.
///
/// The aadhaar and PAN numbers are stored encrypted; this struct carries the
/// decrypted values and exists only on read paths that need them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Phone number, unique across users, used for receiver lookup.
    pub phone: String,
    /// 12-digit national id.
    pub aadhaar: String,
    /// Permanent account number (tax id), shape `AAAAA9999A`.
    pub pan: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user after validating every field.
    pub fn new(
        name: String,
        phone: String,
        aadhaar: String,
        pan: String,
    ) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError("name cannot be empty".into()));
        }
        validate_phone(&phone)?;
        validate_aadhaar(&aadhaar)?;
        validate_pan(&pan)?;

        Ok(Self {
            id: UserId::new(),
            name,
            phone,
            aadhaar,
            pan: pan.to_uppercase(),
            created_at: Utc::now(),
        })
    }

    /// Reconstructs a user from storage fields.
    pub fn from_parts(
        id: UserId,
        name: String,
        phone: String,
        aadhaar: String,
        pan: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            phone,
            aadhaar,
            pan,
            created_at,
        }
    }
}

/// Phone numbers are 10 to 15 digits, no separators.
pub fn validate_phone(phone: &str) -> Result<(), DomainError> {
    if phone.len() < 10 || phone.len() > 15 || !phone.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::ValidationError(
            "phone must be 10 to 15 digits".into(),
        ));
    }
    Ok(())
}

fn validate_aadhaar(aadhaar: &str) -> Result<(), DomainError> {
    if aadhaar.len() != 12 || !aadhaar.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::ValidationError(
            "aadhaar must be exactly 12 digits".into(),
        ));
    }
    Ok(())
}

fn validate_pan(pan: &str) -> Result<(), DomainError> {
    let bytes = pan.as_bytes();
    let ok = bytes.len() == 10
        && bytes[..5].iter().all(|b| b.is_ascii_uppercase())
        && bytes[5..9].iter().all(|b| b.is_ascii_digit())
        && bytes[9].is_ascii_uppercase();
    if !ok {
        return Err(DomainError::ValidationError(
            "PAN must match AAAAA9999A".into(),
        ));
    }
    Ok(())
}
