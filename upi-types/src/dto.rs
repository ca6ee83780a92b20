//! Data Transfer Objects for the API and repository boundaries.
//!
//! Transfer requests arrive with one-of optional reference fields (the wire
//! keeps the familiar shape); `sender_ref`/`receiver_ref` normalize them into
//! tagged enums before any business logic runs, so nothing downstream
//! branches on nullable pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    AccountId, AccountType, BankId, CreditLineId, CreditLineKind, Money, PartyRef,
    TransactionStatus, TransferKind, TxnRef, UpiAddress, UserId,
};
use crate::error::DomainError;

// ─────────────────────────────────────────────────────────────────────────────
// Registration & identity
// ─────────────────────────────────────────────────────────────────────────────

/// Request to register a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ravi Kumar")]
    pub name: String,
    /// 10 to 15 digits, unique across users.
    #[schema(example = "9876543210")]
    pub phone: String,
    /// 12-digit national id. Stored encrypted.
    pub aadhaar: String,
    /// PAN, shape `AAAAA9999A`. Stored encrypted.
    pub pan: String,
}

/// Response after registering. The access token is shown exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
    /// Bearer token for subsequent requests. Only its digest is stored.
    pub access_token: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────────────────────────

/// Request to link a bank account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkAccountRequest {
    pub bank_id: BankId,
    /// 9 to 18 digits. Stored encrypted; uniqueness enforced on a digest.
    pub account_number: String,
    pub account_type: AccountType,
    /// 4 to 6 digits.
    pub pin: String,
    pub pin_confirmation: String,
}

/// One linked account as shown to its owner. Balance is deliberately absent;
/// reading it requires the PIN-gated balance operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: AccountId,
    pub bank_name: String,
    pub masked_account_number: String,
    pub account_type: AccountType,
    pub is_primary: bool,
    pub upi_address: UpiAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifsc: Option<IfscResponse>,
    pub created_at: DateTime<Utc>,
}

/// IFSC directory record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IfscResponse {
    #[schema(example = "SBIN0001234")]
    pub ifsc_code: String,
    pub bank_name: String,
    pub branch: String,
    pub city: String,
    pub state: String,
}

/// A bank available for account linking.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BankResponse {
    pub id: BankId,
    pub name: String,
    pub code: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Credit lines
// ─────────────────────────────────────────────────────────────────────────────

/// Request to activate a bank-anchored credit line.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivateBankLineRequest {
    /// The caller's deposit account the line is anchored to.
    pub account_id: AccountId,
}

/// One credit line as shown to its holder.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreditLineResponse {
    pub id: CreditLineId,
    pub kind: CreditLineKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_account_id: Option<AccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    /// Paise.
    pub credit_limit: i64,
    /// Paise.
    pub available_credit: i64,
    /// True once a PIN has been set; inactive lines cannot send.
    pub is_active: bool,
    pub upi_address: UpiAddress,
    pub created_at: DateTime<Utc>,
}

/// Request to set a credit line PIN.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetPinRequest {
    /// 4 to 6 digits.
    pub pin: String,
    pub pin_confirmation: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Balance / sufficiency
// ─────────────────────────────────────────────────────────────────────────────

/// PIN-gated balance enquiry for any funding source the caller owns.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceRequest {
    /// Account id or credit line id.
    pub source_id: Uuid,
    pub pin: String,
}

/// Available balance or credit, in paise.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub source_id: Uuid,
    pub available: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Transfers
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized sender reference. Built once from the request's one-of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderRef {
    Account(AccountId),
    CreditUpi(UpiAddress),
}

/// Normalized receiver reference for account transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverRef {
    Account(AccountId),
    Upi(UpiAddress),
    Phone(String),
}

impl ReceiverRef {
    /// The reference as it would be recorded if resolution never completed.
    pub fn as_party_ref(&self) -> PartyRef {
        match self {
            ReceiverRef::Account(id) => PartyRef::account(*id),
            ReceiverRef::Upi(addr) => PartyRef::upi(addr.clone()),
            ReceiverRef::Phone(number) => PartyRef::phone(number.clone()),
        }
    }
}

/// Request to move money to a bank account (peer-to-peer).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferToAccountRequest {
    /// Paise. Must be positive and within the transfer ceiling.
    #[schema(example = 60000)]
    pub amount: i64,
    /// Sender, variant 1: one of the caller's deposit accounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_account_id: Option<AccountId>,
    /// Sender, variant 2: a credit line addressed by its UPI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_upi: Option<UpiAddress>,
    /// Receiver, variant 1: account id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_account_id: Option<AccountId>,
    /// Receiver, variant 2: UPI address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upi_address: Option<UpiAddress>,
    /// Receiver, variant 3: phone number, resolved to the holder's primary
    /// account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub pin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TransferToAccountRequest {
    /// Normalizes the sender fields; exactly one must be present.
    pub fn sender_ref(&self) -> Result<SenderRef, DomainError> {
        normalize_sender(self.from_account_id, self.credit_upi.clone())
    }

    /// Normalizes the receiver fields. Phone wins, then account id, then
    /// UPI address; at least one must be present.
    pub fn receiver_ref(&self) -> Result<ReceiverRef, DomainError> {
        if let Some(phone) = &self.phone {
            return Ok(ReceiverRef::Phone(phone.clone()));
        }
        if let Some(id) = self.to_account_id {
            return Ok(ReceiverRef::Account(id));
        }
        if let Some(addr) = &self.upi_address {
            return Ok(ReceiverRef::Upi(addr.clone()));
        }
        Err(DomainError::ValidationError(
            "receiver account, UPI address or phone is required".into(),
        ))
    }
}

/// Request to pay a bank credit line (bill payment).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PayToCreditLineRequest {
    /// Paise.
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_account_id: Option<AccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_upi: Option<UpiAddress>,
    /// The bank credit line being paid.
    pub to_credit_line_id: CreditLineId,
    pub pin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PayToCreditLineRequest {
    pub fn sender_ref(&self) -> Result<SenderRef, DomainError> {
        normalize_sender(self.from_account_id, self.credit_upi.clone())
    }
}

fn normalize_sender(
    from_account_id: Option<AccountId>,
    credit_upi: Option<UpiAddress>,
) -> Result<SenderRef, DomainError> {
    match (from_account_id, credit_upi) {
        (Some(id), None) => Ok(SenderRef::Account(id)),
        (None, Some(addr)) => Ok(SenderRef::CreditUpi(addr)),
        (Some(_), Some(_)) => Err(DomainError::ValidationError(
            "provide either a sender account or a credit UPI, not both".into(),
        )),
        (None, None) => Err(DomainError::ValidationError(
            "sender account or credit UPI is required".into(),
        )),
    }
}

/// Whoever received the money, summarized for the sender's receipt.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReceiverSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upi_address: Option<UpiAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
}

/// Receipt for a completed transfer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferResponse {
    pub txn_ref: TxnRef,
    pub kind: TransferKind,
    /// Paise.
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
    pub receiver: ReceiverSummary,
}

// ─────────────────────────────────────────────────────────────────────────────
// History
// ─────────────────────────────────────────────────────────────────────────────

/// Relative time window for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DateRange {
    #[serde(rename = "24h")]
    Last24Hours,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "14d")]
    Last14Days,
    #[serde(rename = "1m")]
    LastMonth,
    #[serde(rename = "3m")]
    Last3Months,
}

impl DateRange {
    /// Oldest `created_at` the window includes, relative to `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateRange::Last24Hours => now - chrono::Duration::hours(24),
            DateRange::Last7Days => now - chrono::Duration::days(7),
            DateRange::Last14Days => now - chrono::Duration::days(14),
            DateRange::LastMonth => now - chrono::Duration::days(30),
            DateRange::Last3Months => now - chrono::Duration::days(90),
        }
    }
}

/// Fixed rupee buckets for amount filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AmountRange {
    #[serde(rename = "upto_1000")]
    Upto1000,
    #[serde(rename = "1000_10000")]
    From1000To10000,
    #[serde(rename = "10000_15000")]
    From10000To15000,
    #[serde(rename = "15000_25000")]
    From15000To25000,
    #[serde(rename = "25000_50000")]
    From25000To50000,
    #[serde(rename = "50000_75000")]
    From50000To75000,
    #[serde(rename = "75000_100000")]
    From75000To100000,
}

impl AmountRange {
    /// Inclusive bucket bounds in paise. `None` lower bound means zero.
    pub fn bounds_paise(&self) -> (i64, i64) {
        match self {
            AmountRange::Upto1000 => (0, 1_000_00),
            AmountRange::From1000To10000 => (1_000_00, 10_000_00),
            AmountRange::From10000To15000 => (10_000_00, 15_000_00),
            AmountRange::From15000To25000 => (15_000_00, 25_000_00),
            AmountRange::From25000To50000 => (25_000_00, 50_000_00),
            AmountRange::From50000To75000 => (50_000_00, 75_000_00),
            AmountRange::From75000To100000 => (75_000_00, 100_000_00),
        }
    }
}

/// Which side of the transfer the caller was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    SendMoney,
    ReceiveMoney,
    SelfTransfer,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::SendMoney => "send_money",
            Direction::ReceiveMoney => "receive_money",
            Direction::SelfTransfer => "self_transfer",
        }
    }
}

/// History listings are paged in fixed windows.
pub const HISTORY_PAGE_SIZE: u32 = 20;

/// Query parameters for the transaction history listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct HistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransferKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_range: Option<AmountRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// 1-based page number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Display info for the other party of a transfer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PartyDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upi_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
}

/// One row in the caller's transaction history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub txn_ref: TxnRef,
    pub kind: TransferKind,
    pub status: TransactionStatus,
    /// Paise.
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub direction: Direction,
    pub counterparty: PartyDetail,
    pub created_at: DateTime<Utc>,
}

/// A page of history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryPage {
    pub items: Vec<HistoryEntry>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Caller's role in a recorded transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionRole {
    Sender,
    Receiver,
}

/// Full detail of one recorded transfer, shaped for the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionDetailResponse {
    pub txn_ref: TxnRef,
    pub kind: TransferKind,
    pub status: TransactionStatus,
    /// Paise.
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub role: TransactionRole,
    pub sender: PartyDetail,
    pub receiver: PartyDetail,
    pub created_at: DateTime<Utc>,
}

/// A counterparty the caller paid recently.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecentReceiver {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upi_address: Option<String>,
    pub last_paid_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository-port inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the store needs to persist a new bank account. The plaintext
/// account number is encrypted by the adapter; `holder_name` seeds the UPI
/// address proposal.
#[derive(Debug, Clone)]
pub struct NewBankAccount {
    pub user_id: UserId,
    pub bank_id: BankId,
    pub ifsc_id: crate::domain::IfscId,
    pub holder_name: String,
    pub account_number: String,
    pub account_type: AccountType,
    pub pin_digest: String,
    pub pin_length: u8,
}

/// Inputs for activating a credit line.
#[derive(Debug, Clone)]
pub struct NewCreditLine {
    pub user_id: UserId,
    pub kind: CreditLineKind,
    pub anchor_account_id: Option<AccountId>,
    pub holder_name: String,
    pub credit_limit: Money,
}

/// One leg of an atomic ledger application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerLeg {
    Account(AccountId),
    CreditLine(CreditLineId),
}

/// An atomic two-leg value movement: debit one source, credit the other,
/// all within one storage transaction.
#[derive(Debug, Clone, Copy)]
pub struct ApplyTransfer {
    pub debit: LedgerLeg,
    pub credit: LedgerLeg,
    pub amount: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_normalization_requires_exactly_one() {
        let mut req = TransferToAccountRequest {
            amount: 100,
            from_account_id: None,
            credit_upi: None,
            to_account_id: Some(AccountId::new()),
            upi_address: None,
            phone: None,
            pin: "1234".into(),
            description: None,
        };
        assert!(req.sender_ref().is_err());

        req.from_account_id = Some(AccountId::new());
        assert!(matches!(req.sender_ref(), Ok(SenderRef::Account(_))));

        req.credit_upi = Some(UpiAddress::parse("a@oksbi").unwrap());
        assert!(req.sender_ref().is_err());
    }

    #[test]
    fn test_receiver_normalization_priority() {
        let req = TransferToAccountRequest {
            amount: 100,
            from_account_id: Some(AccountId::new()),
            credit_upi: None,
            to_account_id: Some(AccountId::new()),
            upi_address: Some(UpiAddress::parse("b@okaxis").unwrap()),
            phone: Some("9876543210".into()),
            pin: "1234".into(),
            description: None,
        };
        assert!(matches!(req.receiver_ref(), Ok(ReceiverRef::Phone(_))));
    }

    #[test]
    fn test_receiver_required() {
        let req = TransferToAccountRequest {
            amount: 100,
            from_account_id: Some(AccountId::new()),
            credit_upi: None,
            to_account_id: None,
            upi_address: None,
            phone: None,
            pin: "1234".into(),
            description: None,
        };
        assert!(req.receiver_ref().is_err());
    }

    #[test]
    fn test_amount_range_bounds() {
        let (lo, hi) = AmountRange::From1000To10000.bounds_paise();
        assert_eq!(lo, 100_000);
        assert_eq!(hi, 1_000_000);
    }

    #[test]
    fn test_date_range_query_rename() {
        let q: HistoryQuery = serde_json::from_str(r#"{"date_range":"24h"}"#).unwrap();
        assert_eq!(q.date_range, Some(DateRange::Last24Hours));
    }
}
