//! Credit line domain model (bank-anchored and network-issued).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::account::AccountId;
use super::money::Money;
use super::upi::UpiAddress;
use super::user::UserId;
use crate::error::DomainError;

/// Credit limits granted at activation, in rupees.
pub const CREDIT_LIMIT_POOL_RUPEES: [i64; 6] = [20_000, 35_000, 50_000, 75_000, 90_000, 100_000];

/// Unique identifier for a CreditLine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct CreditLineId(Uuid);

impl CreditLineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for CreditLineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CreditLineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CreditLineId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Who issued the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CreditLineKind {
    /// Anchored to one of the holder's deposit accounts.
    Bank,
    /// Issued by the payments network, no anchor account.
    Network,
}

impl CreditLineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditLineKind::Bank => "bank",
            CreditLineKind::Network => "network",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw {
            "bank" => Ok(CreditLineKind::Bank),
            "network" => Ok(CreditLineKind::Network),
            other => Err(DomainError::ValidationError(format!(
                "unknown credit line kind: {other}"
            ))),
        }
    }
}

/// A revolving credit line. The second funding-source variant.
///
/// Invariant: `0 <= available_credit <= credit_limit`. Spending decreases
/// `available_credit`; paying the line back restores it, never past the
/// limit. A line with no PIN digest can receive but never authorize an
/// outbound debit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLine {
    pub id: CreditLineId,
    pub user_id: UserId,
    pub kind: CreditLineKind,
    /// Present iff `kind == Bank`.
    pub anchor_account_id: Option<AccountId>,
    pub credit_limit: Money,
    pub available_credit: Money,
    pub pin_digest: Option<String>,
    pub pin_length: Option<u8>,
    pub upi_address: UpiAddress,
    pub created_at: DateTime<Utc>,
}

impl CreditLine {
    /// Reconstructs a credit line from storage fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: CreditLineId,
        user_id: UserId,
        kind: CreditLineKind,
        anchor_account_id: Option<AccountId>,
        credit_limit: Money,
        available_credit: Money,
        pin_digest: Option<String>,
        pin_length: Option<u8>,
        upi_address: UpiAddress,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            kind,
            anchor_account_id,
            credit_limit,
            available_credit,
            pin_digest,
            pin_length,
            upi_address,
            created_at,
        }
    }

    /// A line is active once its holder has set a PIN.
    pub fn is_active(&self) -> bool {
        self.pin_digest.is_some()
    }

    /// Checks whether a spend of `amount` fits in the remaining credit.
    pub fn has_sufficient_credit(&self, amount: &Money) -> bool {
        self.available_credit.gte(amount)
    }

    /// Checks the repayment ceiling: `available + amount <= limit`.
    pub fn can_accept_repayment(&self, amount: &Money) -> bool {
        match self.available_credit.checked_add(*amount) {
            Ok(total) => self.credit_limit.gte(&total),
            Err(_) => false,
        }
    }

    /// Spends from the line, reducing available credit.
    pub fn spend(&mut self, amount: Money) -> Result<(), DomainError> {
        self.available_credit = self.available_credit.checked_sub(amount)?;
        Ok(())
    }

    /// Repays the line, restoring available credit up to the limit.
    pub fn repay(&mut self, amount: Money) -> Result<(), DomainError> {
        let restored = self.available_credit.checked_add(amount)?;
        if !self.credit_limit.gte(&restored) {
            return Err(DomainError::CreditLimitExceeded {
                limit: self.credit_limit.paise(),
                would_be: restored.paise(),
            });
        }
        self.available_credit = restored;
        Ok(())
    }

    /// Picks an activation limit from the fixed pool.
    pub fn draw_limit() -> Money {
        let seed = Uuid::new_v4();
        let idx = (seed.as_bytes()[0] as usize) % CREDIT_LIMIT_POOL_RUPEES.len();
        // Pool values are small enough that the conversion cannot fail.
        Money::new(CREDIT_LIMIT_POOL_RUPEES[idx] * 100).unwrap_or_else(|_| Money::zero())
    }
}
