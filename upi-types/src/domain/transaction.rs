//! Transfer record domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::account::AccountId;
use super::bank::BankId;
use super::money::Money;
use super::upi::UpiAddress;
use super::user::UserId;
use crate::error::DomainError;

/// Unique internal identifier for a Transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random TransactionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a TransactionId from an existing UUID.
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

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Externally visible transaction reference, `TXN<utc-timestamp><4 digits>`.
///
/// The timestamp makes references sortable at a glance; the random suffix
/// keeps them unique in practice. Collisions are still possible, so the
/// store holds a unique constraint and the writer regenerates on conflict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TxnRef(String);

impl TxnRef {
    /// Generates a reference for an attempt starting at `at`.
    pub fn generate(at: DateTime<Utc>) -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        let suffix = 1000 + u16::from_be_bytes([bytes[0], bytes[1]]) % 9000;
        Self(format!("TXN{}{}", at.format("%Y%m%d%H%M%S"), suffix))
    }

    /// Parses a reference, enforcing the `TXN` + 18 digits shape.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let rest = raw
            .strip_prefix("TXN")
            .ok_or_else(|| DomainError::ValidationError(format!("invalid txn ref: {raw}")))?;
        if rest.len() != 18 || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::ValidationError(format!(
                "invalid txn ref: {raw}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which funding-source family the sender debited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Debit from a deposit account.
    Bank,
    /// Debit from a credit line addressed by its UPI.
    CreditUpi,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Bank => "bank",
            TransferKind::CreditUpi => "credit_upi",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw {
            "bank" => Ok(TransferKind::Bank),
            "credit_upi" => Ok(TransferKind::CreditUpi),
            other => Err(DomainError::ValidationError(format!(
                "unknown transfer kind: {other}"
            ))),
        }
    }
}

/// Lifecycle status of a recorded transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(DomainError::ValidationError(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}

/// One side of a recorded transfer.
///
/// Senders are an account or a UPI address; receivers may additionally be a
/// bank (when a credit line anchored at that bank was paid) or, on failed
/// attempts only, the phone number the caller presented before resolution
/// got anywhere. The store maps each variant onto its own column, keeping
/// exactly one reference per side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartyRef {
    Account { id: AccountId },
    Upi { address: UpiAddress },
    Bank { id: BankId },
    Phone { number: String },
}

impl PartyRef {
    pub fn account(id: AccountId) -> Self {
        Self::Account { id }
    }

    pub fn upi(address: UpiAddress) -> Self {
        Self::Upi { address }
    }

    pub fn bank(id: BankId) -> Self {
        Self::Bank { id }
    }

    pub fn phone(number: impl Into<String>) -> Self {
        Self::Phone {
            number: number.into(),
        }
    }

    /// Valid as a sender reference: accounts and UPI addresses only.
    pub fn is_valid_sender(&self) -> bool {
        matches!(self, PartyRef::Account { .. } | PartyRef::Upi { .. })
    }
}

/// An immutable record of one transfer attempt.
///
/// Every attempt that enters orchestration produces exactly one record with
/// a terminal status. Balances live in the funding sources; this is the
/// audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransactionId,
    pub txn_ref: TxnRef,
    pub kind: TransferKind,
    pub status: TransactionStatus,
    pub amount: Money,
    pub description: Option<String>,
    pub sender: PartyRef,
    pub receiver: PartyRef,
    /// Resolved sender owner, when resolution got that far.
    pub from_user_id: Option<UserId>,
    /// Resolved receiver owner, when resolution got that far.
    pub to_user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Builds a record for a committed transfer.
    #[allow(clippy::too_many_arguments)]
    pub fn completed(
        txn_ref: TxnRef,
        kind: TransferKind,
        amount: Money,
        sender: PartyRef,
        receiver: PartyRef,
        description: Option<String>,
        from_user_id: Option<UserId>,
        to_user_id: Option<UserId>,
    ) -> Result<Self, DomainError> {
        Self::build(
            TransactionStatus::Completed,
            txn_ref,
            kind,
            amount,
            sender,
            receiver,
            description,
            from_user_id,
            to_user_id,
        )
    }

    /// Builds a record for an attempt that aborted after orchestration began.
    #[allow(clippy::too_many_arguments)]
    pub fn failed(
        txn_ref: TxnRef,
        kind: TransferKind,
        amount: Money,
        sender: PartyRef,
        receiver: PartyRef,
        description: Option<String>,
        from_user_id: Option<UserId>,
        to_user_id: Option<UserId>,
    ) -> Result<Self, DomainError> {
        Self::build(
            TransactionStatus::Failed,
            txn_ref,
            kind,
            amount,
            sender,
            receiver,
            description,
            from_user_id,
            to_user_id,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        status: TransactionStatus,
        txn_ref: TxnRef,
        kind: TransferKind,
        amount: Money,
        sender: PartyRef,
        receiver: PartyRef,
        description: Option<String>,
        from_user_id: Option<UserId>,
        to_user_id: Option<UserId>,
    ) -> Result<Self, DomainError> {
        if !sender.is_valid_sender() {
            return Err(DomainError::ValidationError(
                "sender reference cannot be a bank".into(),
            ));
        }
        Ok(Self {
            id: TransactionId::new(),
            txn_ref,
            kind,
            status,
            amount,
            description,
            sender,
            receiver,
            from_user_id,
            to_user_id,
            created_at: Utc::now(),
        })
    }

    /// Reconstructs a record from storage fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: TransactionId,
        txn_ref: TxnRef,
        kind: TransferKind,
        status: TransactionStatus,
        amount: Money,
        description: Option<String>,
        sender: PartyRef,
        receiver: PartyRef,
        from_user_id: Option<UserId>,
        to_user_id: Option<UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            txn_ref,
            kind,
            status,
            amount,
            description,
            sender,
            receiver,
            from_user_id,
            to_user_id,
            created_at,
        }
    }
}
