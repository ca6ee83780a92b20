//! Monetary values in paise (smallest INR unit).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Largest amount a single transfer may carry: ₹999,999,999,999.99.
pub const MAX_TRANSFER_PAISE: i64 = 99_999_999_999_999;

/// Monetary amount in paise.
///
/// Stored as an integer count of the smallest unit to avoid floating-point
/// precision issues. All arithmetic is checked; balances can never silently
/// wrap or go negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value. Negative amounts are rejected.
    pub fn new(paise: i64) -> Result<Self, DomainError> {
        if paise < 0 {
            return Err(DomainError::NegativeAmount);
        }
        Ok(Self(paise))
    }

    /// Zero paise.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Whole-rupee constructor, mostly for tests and fixed limits.
    pub fn from_rupees(rupees: i64) -> Result<Self, DomainError> {
        rupees
            .checked_mul(100)
            .ok_or(DomainError::AmountOverflow)
            .and_then(Self::new)
    }

    /// Amount in paise.
    pub fn paise(&self) -> i64 {
        self.0
    }

    /// True for amounts a transfer is allowed to carry: positive and within
    /// the ₹999,999,999,999.99 ceiling.
    pub fn is_valid_transfer_amount(&self) -> bool {
        self.0 > 0 && self.0 <= MAX_TRANSFER_PAISE
    }

    /// Checked addition. Fails on i64 overflow.
    pub fn checked_add(&self, other: Money) -> Result<Money, DomainError> {
        self.0
            .checked_add(other.0)
            .ok_or(DomainError::AmountOverflow)
            .map(Money)
    }

    /// Checked subtraction. Fails if the result would be negative.
    pub fn checked_sub(&self, other: Money) -> Result<Money, DomainError> {
        if self.0 < other.0 {
            return Err(DomainError::InsufficientFunds {
                available: self.0,
                requested: other.0,
            });
        }
        Ok(Money(self.0 - other.0))
    }

    /// Returns true if this amount covers `other`.
    pub fn gte(&self, other: &Money) -> bool {
        self.0 >= other.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = self.0 / 100;
        let minor = (self.0 % 100).abs();
        write!(f, "₹{}.{:02}", major, minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_creation() {
        let money = Money::new(1000).unwrap();
        assert_eq!(money.paise(), 1000);
    }

    #[test]
    fn test_negative_money_fails() {
        let result = Money::new(-100);
        assert!(matches!(result, Err(DomainError::NegativeAmount)));
    }

    #[test]
    fn test_from_rupees() {
        let money = Money::from_rupees(600).unwrap();
        assert_eq!(money.paise(), 60000);
    }

    #[test]
    fn test_checked_sub_insufficient() {
        let a = Money::new(100).unwrap();
        let b = Money::new(200).unwrap();
        assert!(matches!(
            a.checked_sub(b),
            Err(DomainError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_transfer_amount_bounds() {
        assert!(!Money::zero().is_valid_transfer_amount());
        assert!(Money::new(1).unwrap().is_valid_transfer_amount());
        assert!(
            Money::new(MAX_TRANSFER_PAISE)
                .unwrap()
                .is_valid_transfer_amount()
        );
        assert!(
            !Money::new(MAX_TRANSFER_PAISE + 1)
                .unwrap()
                .is_valid_transfer_amount()
        );
    }

    #[test]
    fn test_money_display() {
        let money = Money::new(1050).unwrap();
        assert_eq!(format!("{}", money), "₹10.50");
    }
}
