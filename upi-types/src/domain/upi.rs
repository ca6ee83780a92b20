//! Virtual payment addresses (UPI addresses).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::DomainError;

/// Handles a generated address may end with.
pub const UPI_HANDLES: [&str; 5] = ["@oksbi", "@okaxis", "@okicici", "@okhdfcbank", "@okyesbank"];

/// A virtual payment address like `ravi42@oksbi`.
///
/// Every funding source carries exactly one address, and every address maps
/// to at most one funding source; the storage layer enforces the uniqueness
/// through a single registry shared by accounts and credit lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(transparent)]
pub struct UpiAddress(String);

impl UpiAddress {
    /// Parses an address, enforcing the `local@handle` shape.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let Some((local, _handle)) = trimmed.split_once('@') else {
            return Err(DomainError::ValidationError(format!(
                "invalid UPI address: {raw}"
            )));
        };
        if local.is_empty() || trimmed.len() > 50 {
            return Err(DomainError::ValidationError(format!(
                "invalid UPI address: {raw}"
            )));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// Proposes a fresh address for `holder_name`.
    ///
    /// The local part is the lowercased alphanumeric form of the name
    /// (falling back to `user`), followed by a 1..=9999 suffix; the handle is
    /// drawn from [`UPI_HANDLES`]. Collisions are possible and are resolved
    /// by the caller retrying against the registry constraint.
    pub fn generate(holder_name: &str) -> Self {
        let mut base: String = holder_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();
        if base.is_empty() {
            base.push_str("user");
        }
        base.truncate(20);

        // Uuid v4 bytes double as the entropy source so this crate stays
        // free of IO and RNG dependencies.
        let seed = Uuid::new_v4();
        let bytes = seed.as_bytes();
        let suffix = 1 + (u16::from_be_bytes([bytes[0], bytes[1]]) % 9999) as u32;
        let handle = UPI_HANDLES[(bytes[2] as usize) % UPI_HANDLES.len()];

        Self(format!("{base}{suffix}{handle}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UpiAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
