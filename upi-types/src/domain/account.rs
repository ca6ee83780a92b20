//! Bank account domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::bank::{BankId, IfscId};
use super::money::Money;
use super::upi::UpiAddress;
use super::user::UserId;
use crate::error::DomainError;

/// Unique identifier for a BankAccount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Creates a new random AccountId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an AccountId from an existing UUID.
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

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Deposit account categories offered at link time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Saving,
    Current,
    Salary,
    FixedDeposit,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Saving => "saving",
            AccountType::Current => "current",
            AccountType::Salary => "salary",
            AccountType::FixedDeposit => "fixed_deposit",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw {
            "saving" => Ok(AccountType::Saving),
            "current" => Ok(AccountType::Current),
            "salary" => Ok(AccountType::Salary),
            "fixed_deposit" => Ok(AccountType::FixedDeposit),
            other => Err(DomainError::ValidationError(format!(
                "unknown account type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A linked deposit account. One funding-source variant of the ledger.
///
/// `account_number` is encrypted at rest; this struct carries the decrypted
/// value. The balance invariant is `balance >= 0` after every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: AccountId,
    pub user_id: UserId,
    pub bank_id: BankId,
    pub ifsc_id: IfscId,
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: Money,
    /// SHA-256 digest of the account PIN.
    pub pin_digest: String,
    pub pin_length: u8,
    /// Default receiving account when the user is addressed by phone.
    /// Exactly one account per user holds this flag.
    pub is_primary: bool,
    pub upi_address: UpiAddress,
    pub created_at: DateTime<Utc>,
}

impl BankAccount {
    /// Reconstructs an account from storage fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: AccountId,
        user_id: UserId,
        bank_id: BankId,
        ifsc_id: IfscId,
        account_number: String,
        account_type: AccountType,
        balance: Money,
        pin_digest: String,
        pin_length: u8,
        is_primary: bool,
        upi_address: UpiAddress,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            bank_id,
            ifsc_id,
            account_number,
            account_type,
            balance,
            pin_digest,
            pin_length,
            is_primary,
            upi_address,
            created_at,
        }
    }

    /// Checks whether a debit of `amount` would keep the balance at or above
    /// zero.
    pub fn has_sufficient_funds(&self, amount: &Money) -> bool {
        self.balance.gte(amount)
    }

    /// Credits (adds) money to the account.
    pub fn credit(&mut self, amount: Money) -> Result<(), DomainError> {
        self.balance = self.balance.checked_add(amount)?;
        Ok(())
    }

    /// Debits (subtracts) money from the account.
    pub fn debit(&mut self, amount: Money) -> Result<(), DomainError> {
        self.balance = self.balance.checked_sub(amount)?;
        Ok(())
    }

    /// Account number shown to clients: `XXXX XXXX <last4>`.
    pub fn masked_number(&self) -> String {
        masked_account_number(&self.account_number)
    }
}

/// Masks all but the last four digits of an account number.
pub fn masked_account_number(number: &str) -> String {
    let last4 = if number.len() >= 4 {
        &number[number.len() - 4..]
    } else {
        number
    };
    format!("XXXX XXXX {last4}")
}

/// Account numbers are 9 to 18 digits.
pub fn validate_account_number(number: &str) -> Result<(), DomainError> {
    if number.len() < 9 || number.len() > 18 || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::ValidationError(
            "account number must be 9 to 18 digits".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_account(balance: i64) -> BankAccount {
        BankAccount::from_parts(
            AccountId::new(),
            UserId::new(),
            BankId::new(),
            IfscId::new(),
            "123456789012".into(),
            AccountType::Saving,
            Money::new(balance).unwrap(),
            "digest".into(),
            4,
            true,
            UpiAddress::parse("ravi1@oksbi").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn test_account_credit_and_debit() {
        let mut account = sample_account(0);
        account.credit(Money::new(1000).unwrap()).unwrap();
        account.debit(Money::new(300).unwrap()).unwrap();
        assert_eq!(account.balance.paise(), 700);
    }

    #[test]
    fn test_debit_below_zero_fails() {
        let mut account = sample_account(100);
        let result = account.debit(Money::new(200).unwrap());
        assert!(matches!(result, Err(DomainError::InsufficientFunds { .. })));
        assert_eq!(account.balance.paise(), 100);
    }

    #[test]
    fn test_sufficiency() {
        let account = sample_account(500);
        assert!(account.has_sufficient_funds(&Money::new(500).unwrap()));
        assert!(!account.has_sufficient_funds(&Money::new(501).unwrap()));
    }

    #[test]
    fn test_masked_number() {
        let account = sample_account(0);
        assert_eq!(account.masked_number(), "XXXX XXXX 9012");
    }

    #[test]
    fn test_account_number_validation() {
        assert!(validate_account_number("123456789").is_ok());
        assert!(validate_account_number("12345678").is_err());
        assert!(validate_account_number("12345678901234567890").is_err());
        assert!(validate_account_number("12345678a").is_err());
    }
}
