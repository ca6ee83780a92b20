//! Shared database types with feature-gated fields for SQLite and PostgreSQL.

use sqlx::FromRow;

use upi_types::{
    AccountId, AccountType, Bank, BankAccount, BankId, CallerIdentity, CreditLine, CreditLineId,
    CreditLineKind, IfscDetail, IfscId, Money, Notification, NotificationId, NotificationStatus,
    PartyRef, RecentReceiver, RepoError, TransactionId, TransactionStatus, TransferKind,
    TransferRecord, TxnRef, UpiAddress, User, UserId,
};

use crate::crypto::FieldCipher;

// ─────────────────────────────────────────────────────────────────────────────
// Feature-gated imports
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(feature = "sqlite"))]
use chrono::{DateTime, Utc};
#[cfg(not(feature = "sqlite"))]
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
pub(crate) fn parse_uuid(raw: &str) -> Result<uuid::Uuid, RepoError> {
    uuid::Uuid::parse_str(raw).map_err(|e| RepoError::Database(e.to_string()))
}

#[cfg(feature = "sqlite")]
pub(crate) fn parse_ts(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, RepoError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| RepoError::Database(e.to_string()))
}

#[cfg(feature = "sqlite")]
pub(crate) fn parse_opt_ts(
    raw: Option<String>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, RepoError> {
    raw.map(|s| parse_ts(&s)).transpose()
}

fn parse_upi(raw: &str) -> Result<UpiAddress, RepoError> {
    UpiAddress::parse(raw).map_err(|e| RepoError::Database(e.to_string()))
}

/// Which side of a recorded transfer the viewer was on. Rows reach the
/// viewer's history via `from_user_id` or `to_user_id`, so a row that is
/// neither side's match can only be a receive.
pub(crate) fn direction_for(record: &TransferRecord, viewer: UserId) -> upi_types::Direction {
    let is_sender = record.from_user_id == Some(viewer);
    let is_receiver = record.to_user_id == Some(viewer);
    match (is_sender, is_receiver) {
        (true, true) => upi_types::Direction::SelfTransfer,
        (true, false) => upi_types::Direction::SendMoney,
        _ => upi_types::Direction::ReceiveMoney,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// User row from database. Aadhaar and PAN come back encrypted.
#[derive(FromRow)]
pub struct DbUser {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub name: String,
    pub phone: String,
    pub aadhaar_enc: String,
    pub pan_enc: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,
}

impl DbUser {
    /// Convert database row to domain User, decrypting KYC fields.
    pub fn into_domain(self, cipher: &FieldCipher) -> Result<User, RepoError> {
        let aadhaar = cipher.decrypt(&self.aadhaar_enc)?;
        let pan = cipher.decrypt(&self.pan_enc)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, created_at) = (UserId::from_uuid(self.id), self.created_at);

        #[cfg(feature = "sqlite")]
        let (id, created_at) = (
            UserId::from_uuid(parse_uuid(&self.id)?),
            parse_ts(&self.created_at)?,
        );

        Ok(User::from_parts(
            id,
            self.name,
            self.phone,
            aadhaar,
            pan,
            created_at,
        ))
    }
}

/// Bank directory row.
#[derive(FromRow)]
pub struct DbBank {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub name: String,
    pub code: String,
}

impl DbBank {
    pub fn into_domain(self) -> Result<Bank, RepoError> {
        #[cfg(not(feature = "sqlite"))]
        let id = BankId::from_uuid(self.id);

        #[cfg(feature = "sqlite")]
        let id = BankId::from_uuid(parse_uuid(&self.id)?);

        Ok(Bank {
            id,
            name: self.name,
            code: self.code,
        })
    }
}

/// IFSC branch row.
#[derive(FromRow)]
pub struct DbIfsc {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    #[cfg(not(feature = "sqlite"))]
    pub bank_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub bank_id: String,

    pub ifsc_code: String,
    pub branch: String,
    pub city: String,
    pub state: String,
}

impl DbIfsc {
    pub fn into_domain(self) -> Result<IfscDetail, RepoError> {
        #[cfg(not(feature = "sqlite"))]
        let (id, bank_id) = (IfscId::from_uuid(self.id), BankId::from_uuid(self.bank_id));

        #[cfg(feature = "sqlite")]
        let (id, bank_id) = (
            IfscId::from_uuid(parse_uuid(&self.id)?),
            BankId::from_uuid(parse_uuid(&self.bank_id)?),
        );

        Ok(IfscDetail {
            id,
            bank_id,
            ifsc_code: self.ifsc_code,
            branch: self.branch,
            city: self.city,
            state: self.state,
        })
    }
}

/// Bank account row. The account number comes back encrypted.
#[derive(FromRow)]
pub struct DbBankAccount {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    #[cfg(not(feature = "sqlite"))]
    pub bank_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub bank_id: String,

    #[cfg(not(feature = "sqlite"))]
    pub ifsc_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub ifsc_id: String,

    pub account_number_enc: String,
    pub account_type: String,
    pub balance: i64,
    pub pin_digest: String,
    pub pin_length: i32,

    #[cfg(not(feature = "sqlite"))]
    pub is_primary: bool,
    #[cfg(feature = "sqlite")]
    pub is_primary: i64,

    pub upi_address: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,
}

impl DbBankAccount {
    /// Convert database row to domain BankAccount, decrypting the number.
    pub fn into_domain(self, cipher: &FieldCipher) -> Result<BankAccount, RepoError> {
        let account_number = cipher.decrypt(&self.account_number_enc)?;
        let account_type =
            AccountType::parse(&self.account_type).map_err(|e| RepoError::Database(e.to_string()))?;
        let balance = Money::new(self.balance).map_err(RepoError::Domain)?;
        let upi_address = parse_upi(&self.upi_address)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, user_id, bank_id, ifsc_id, is_primary, created_at) = (
            AccountId::from_uuid(self.id),
            UserId::from_uuid(self.user_id),
            BankId::from_uuid(self.bank_id),
            IfscId::from_uuid(self.ifsc_id),
            self.is_primary,
            self.created_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, user_id, bank_id, ifsc_id, is_primary, created_at) = (
            AccountId::from_uuid(parse_uuid(&self.id)?),
            UserId::from_uuid(parse_uuid(&self.user_id)?),
            BankId::from_uuid(parse_uuid(&self.bank_id)?),
            IfscId::from_uuid(parse_uuid(&self.ifsc_id)?),
            self.is_primary != 0,
            parse_ts(&self.created_at)?,
        );

        Ok(BankAccount::from_parts(
            id,
            user_id,
            bank_id,
            ifsc_id,
            account_number,
            account_type,
            balance,
            self.pin_digest,
            self.pin_length as u8,
            is_primary,
            upi_address,
            created_at,
        ))
    }
}

/// Credit line row.
#[derive(FromRow)]
pub struct DbCreditLine {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    pub kind: String,

    #[cfg(not(feature = "sqlite"))]
    pub anchor_account_id: Option<Uuid>,
    #[cfg(feature = "sqlite")]
    pub anchor_account_id: Option<String>,

    pub credit_limit: i64,
    pub available_credit: i64,
    pub pin_digest: Option<String>,
    pub pin_length: Option<i32>,
    pub upi_address: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,
}

impl DbCreditLine {
    pub fn into_domain(self) -> Result<CreditLine, RepoError> {
        let kind =
            CreditLineKind::parse(&self.kind).map_err(|e| RepoError::Database(e.to_string()))?;
        let credit_limit = Money::new(self.credit_limit).map_err(RepoError::Domain)?;
        let available_credit = Money::new(self.available_credit).map_err(RepoError::Domain)?;
        let upi_address = parse_upi(&self.upi_address)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, user_id, anchor_account_id, created_at) = (
            CreditLineId::from_uuid(self.id),
            UserId::from_uuid(self.user_id),
            self.anchor_account_id.map(AccountId::from_uuid),
            self.created_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, user_id, anchor_account_id, created_at) = (
            CreditLineId::from_uuid(parse_uuid(&self.id)?),
            UserId::from_uuid(parse_uuid(&self.user_id)?),
            self.anchor_account_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?
                .map(AccountId::from_uuid),
            parse_ts(&self.created_at)?,
        );

        Ok(CreditLine::from_parts(
            id,
            user_id,
            kind,
            anchor_account_id,
            credit_limit,
            available_credit,
            self.pin_digest,
            self.pin_length.map(|n| n as u8),
            upi_address,
            created_at,
        ))
    }
}

/// Transaction record row. Party references are fanned out over one-of
/// columns; conversion folds them back into tagged `PartyRef`s.
#[derive(FromRow)]
pub struct DbTransferRecord {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub txn_ref: String,
    pub kind: String,
    pub status: String,
    pub amount: i64,
    pub description: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub from_account_id: Option<Uuid>,
    #[cfg(feature = "sqlite")]
    pub from_account_id: Option<String>,

    pub from_upi: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub to_account_id: Option<Uuid>,
    #[cfg(feature = "sqlite")]
    pub to_account_id: Option<String>,

    pub to_upi: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub to_bank_id: Option<Uuid>,
    #[cfg(feature = "sqlite")]
    pub to_bank_id: Option<String>,

    pub to_phone: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub from_user_id: Option<Uuid>,
    #[cfg(feature = "sqlite")]
    pub from_user_id: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub to_user_id: Option<Uuid>,
    #[cfg(feature = "sqlite")]
    pub to_user_id: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,
}

impl DbTransferRecord {
    pub fn into_domain(self) -> Result<TransferRecord, RepoError> {
        let txn_ref =
            TxnRef::parse(&self.txn_ref).map_err(|e| RepoError::Database(e.to_string()))?;
        let kind =
            TransferKind::parse(&self.kind).map_err(|e| RepoError::Database(e.to_string()))?;
        let status =
            TransactionStatus::parse(&self.status).map_err(|e| RepoError::Database(e.to_string()))?;
        let amount = Money::new(self.amount).map_err(RepoError::Domain)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, from_account_id, to_account_id, to_bank_id, from_user_id, to_user_id, created_at) = (
            TransactionId::from_uuid(self.id),
            self.from_account_id,
            self.to_account_id,
            self.to_bank_id,
            self.from_user_id,
            self.to_user_id,
            self.created_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, from_account_id, to_account_id, to_bank_id, from_user_id, to_user_id, created_at) = (
            TransactionId::from_uuid(parse_uuid(&self.id)?),
            self.from_account_id.as_deref().map(parse_uuid).transpose()?,
            self.to_account_id.as_deref().map(parse_uuid).transpose()?,
            self.to_bank_id.as_deref().map(parse_uuid).transpose()?,
            self.from_user_id.as_deref().map(parse_uuid).transpose()?,
            self.to_user_id.as_deref().map(parse_uuid).transpose()?,
            parse_ts(&self.created_at)?,
        );

        let sender = match (from_account_id, self.from_upi) {
            (Some(account_id), _) => PartyRef::account(AccountId::from_uuid(account_id)),
            (None, Some(addr)) => PartyRef::upi(parse_upi(&addr)?),
            (None, None) => {
                return Err(RepoError::Database(
                    "transaction row has no sender reference".to_string(),
                ));
            }
        };

        let receiver = if let Some(account_id) = to_account_id {
            PartyRef::account(AccountId::from_uuid(account_id))
        } else if let Some(addr) = self.to_upi {
            PartyRef::upi(parse_upi(&addr)?)
        } else if let Some(bank_id) = to_bank_id {
            PartyRef::bank(BankId::from_uuid(bank_id))
        } else if let Some(number) = self.to_phone {
            PartyRef::phone(number)
        } else {
            return Err(RepoError::Database(
                "transaction row has no receiver reference".to_string(),
            ));
        };

        Ok(TransferRecord::from_parts(
            id,
            txn_ref,
            kind,
            status,
            amount,
            self.description,
            sender,
            receiver,
            from_user_id.map(UserId::from_uuid),
            to_user_id.map(UserId::from_uuid),
            created_at,
        ))
    }
}

/// Queued notification row.
#[derive(FromRow)]
pub struct DbNotification {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    pub title: String,
    pub body: String,

    #[cfg(not(feature = "sqlite"))]
    pub data: serde_json::Value,
    #[cfg(feature = "sqlite")]
    pub data: String,

    pub status: String,
    pub attempts: i32,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub sent_at: Option<DateTime<Utc>>,
    #[cfg(feature = "sqlite")]
    pub sent_at: Option<String>,
}

impl DbNotification {
    pub fn into_domain(self) -> Result<Notification, RepoError> {
        let status = NotificationStatus::parse(&self.status).ok_or_else(|| {
            RepoError::Database(format!("unknown notification status: {}", self.status))
        })?;

        #[cfg(not(feature = "sqlite"))]
        let (id, user_id, data, created_at, sent_at) = (
            self.id,
            self.user_id,
            self.data,
            self.created_at,
            self.sent_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, user_id, data, created_at, sent_at) = (
            parse_uuid(&self.id)?,
            parse_uuid(&self.user_id)?,
            serde_json::from_str(&self.data).map_err(|e| RepoError::Database(e.to_string()))?,
            parse_ts(&self.created_at)?,
            parse_opt_ts(self.sent_at)?,
        );

        Ok(Notification {
            id: NotificationId::from_uuid(id),
            user_id: UserId::from_uuid(user_id),
            title: self.title,
            body: self.body,
            data,
            status,
            attempts: self.attempts,
            created_at,
            sent_at,
        })
    }
}

/// Verified caller row from the token join.
#[derive(FromRow)]
pub struct DbCallerIdentity {
    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    pub phone: String,
}

impl DbCallerIdentity {
    pub fn into_domain(self) -> Result<CallerIdentity, RepoError> {
        #[cfg(not(feature = "sqlite"))]
        let user_id = UserId::from_uuid(self.user_id);

        #[cfg(feature = "sqlite")]
        let user_id = UserId::from_uuid(parse_uuid(&self.user_id)?);

        Ok(CallerIdentity {
            user_id,
            phone: self.phone,
        })
    }
}

/// Grouped recent-receiver row; the UPI address is looked up separately.
#[derive(FromRow)]
pub struct DbRecentReceiver {
    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    pub name: String,

    #[cfg(not(feature = "sqlite"))]
    pub last_paid_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub last_paid_at: String,
}

impl DbRecentReceiver {
    pub fn into_domain(self, upi_address: Option<String>) -> Result<RecentReceiver, RepoError> {
        #[cfg(not(feature = "sqlite"))]
        let (user_id, last_paid_at) = (UserId::from_uuid(self.user_id), self.last_paid_at);

        #[cfg(feature = "sqlite")]
        let (user_id, last_paid_at) = (
            UserId::from_uuid(parse_uuid(&self.user_id)?),
            parse_ts(&self.last_paid_at)?,
        );

        Ok(RecentReceiver {
            user_id: Some(user_id),
            name: Some(self.name),
            upi_address,
            last_paid_at,
        })
    }
}

/// Balance-only row for guarded-update diagnostics.
#[derive(FromRow)]
pub struct DbBalance {
    pub balance: i64,
}

/// Available-credit row for sufficiency and ceiling checks.
#[derive(FromRow)]
pub struct DbCreditAvail {
    pub available_credit: i64,
    pub credit_limit: i64,
}
