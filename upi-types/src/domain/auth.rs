//! Access token domain type and the verified caller identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::UserId;

/// Unique identifier for an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(Uuid);

impl TokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TokenId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A bearer token bound to one user. Only the SHA-256 digest is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: TokenId,
    pub user_id: UserId,
    pub token_digest: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl AuthToken {
    pub fn new(user_id: UserId, token_digest: String, label: String) -> Self {
        Self {
            id: TokenId::new(),
            user_id,
            token_digest,
            label,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }
}

/// The authenticated caller, resolved once at the request boundary and
/// passed explicitly into every service call. Nothing downstream consults
/// ambient request state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub phone: String,
}
