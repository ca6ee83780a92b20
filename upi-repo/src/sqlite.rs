//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use uuid::Uuid;

use upi_types::{
    AccountId, ApplyTransfer, AuthToken, Bank, BankAccount, BankId, CallerIdentity, CreditLine,
    CreditLineId, CreditLineKind, DomainError, HISTORY_PAGE_SIZE, HistoryEntry, HistoryPage,
    HistoryQuery, IfscDetail, IfscId, LedgerLeg, LedgerRepository, Money, NewBankAccount,
    NewCreditLine, Notification, NotificationId, NotificationStatus, PartyDetail, PartyRef,
    RecentReceiver, RepoError, TransferRecord, TxnRef, UpiAddress, User, UserId,
};

use crate::crypto::{self, FieldCipher};
use crate::types::{
    DbBalance, DbBank, DbBankAccount, DbCallerIdentity, DbCreditAvail, DbCreditLine, DbIfsc,
    DbNotification, DbRecentReceiver, DbTransferRecord, DbUser, direction_for,
};

const TRANSACTION_COLUMNS: &str = "id, txn_ref, kind, status, amount, description, \
     from_account_id, from_upi, to_account_id, to_upi, to_bank_id, to_phone, \
     from_user_id, to_user_id, created_at";

const ACCOUNT_COLUMNS: &str = "id, user_id, bank_id, ifsc_id, account_number_enc, account_type, \
     balance, pin_digest, pin_length, is_primary, upi_address, created_at";

const CREDIT_LINE_COLUMNS: &str = "id, user_id, kind, anchor_account_id, credit_limit, \
     available_credit, pin_digest, pin_length, upi_address, created_at";

/// Attempts before giving up on finding a free UPI address.
const UPI_CLAIM_ATTEMPTS: usize = 5;

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
    cipher: FieldCipher,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &SqlitePool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_tables.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_seed_directory.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str, cipher: FieldCipher) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            // Remove query parameters
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        run_migrations(&pool).await?;

        Ok(Self { pool, cipher })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }

    /// Claims a fresh UPI address in the shared registry, retrying on
    /// collisions within the surrounding transaction.
    async fn claim_upi_address(
        db_tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        holder_name: &str,
        owner_kind: &str,
        owner_id: &str,
        claimed_at: &str,
    ) -> Result<UpiAddress, RepoError> {
        for _ in 0..UPI_CLAIM_ATTEMPTS {
            let candidate = UpiAddress::generate(holder_name);

            let result = sqlx::query(
                r#"INSERT OR IGNORE INTO upi_addresses (address, owner_kind, owner_id, claimed_at)
                   VALUES (?, ?, ?, ?)"#,
            )
            .bind(candidate.as_str())
            .bind(owner_kind)
            .bind(owner_id)
            .bind(claimed_at)
            .execute(&mut **db_tx)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

            if result.rows_affected() == 1 {
                return Ok(candidate);
            }
        }

        Err(RepoError::Conflict(
            "could not allocate a free UPI address".to_string(),
        ))
    }

    /// Display detail for one side of a recorded transfer.
    async fn party_detail(
        &self,
        party: &PartyRef,
        user_id: Option<UserId>,
    ) -> Result<PartyDetail, RepoError> {
        let mut detail = PartyDetail::default();

        if let Some(uid) = user_id {
            if let Some(user) = self.get_user(uid).await? {
                detail.name = Some(user.name);
            }
        }

        match party {
            PartyRef::Account { id } => {
                if let Some(account) = self.get_account(*id).await? {
                    self.fill_account_detail(&mut detail, &account).await?;
                }
            }
            PartyRef::Upi { address } => {
                detail.upi_address = Some(address.as_str().to_string());
                if let Some(account) = self.find_account_by_upi(address).await? {
                    self.fill_account_detail(&mut detail, &account).await?;
                } else if let Some(line) = self.find_credit_line_by_upi(address).await? {
                    if detail.name.is_none() {
                        if let Some(owner) = self.get_user(line.user_id).await? {
                            detail.name = Some(owner.name);
                        }
                    }
                    if let Some(anchor_id) = line.anchor_account_id {
                        if let Some(anchor) = self.get_account(anchor_id).await? {
                            if let Some(bank) = self.get_bank(anchor.bank_id).await? {
                                detail.bank_name = Some(bank.name);
                            }
                        }
                    }
                }
            }
            PartyRef::Bank { id } => {
                if let Some(bank) = self.get_bank(*id).await? {
                    detail.bank_name = Some(bank.name);
                }
            }
            PartyRef::Phone { number } => {
                if detail.name.is_none() {
                    if let Some(user) = self.find_user_by_phone(number).await? {
                        detail.name = Some(user.name);
                    }
                }
            }
        }

        Ok(detail)
    }

    async fn fill_account_detail(
        &self,
        detail: &mut PartyDetail,
        account: &BankAccount,
    ) -> Result<(), RepoError> {
        detail.upi_address = Some(account.upi_address.as_str().to_string());
        detail.masked_account_number = Some(account.masked_number());
        if let Some(bank) = self.get_bank(account.bank_id).await? {
            detail.bank_name = Some(bank.name);
        }
        if detail.name.is_none() {
            if let Some(owner) = self.get_user(account.user_id).await? {
                detail.name = Some(owner.name);
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerRepository for SqliteRepo {
    async fn create_user(&self, user: &User) -> Result<(), RepoError> {
        let aadhaar_enc = self.cipher.encrypt(&user.aadhaar)?;
        let pan_enc = self.cipher.encrypt(&user.pan)?;
        let aadhaar_digest = crypto::field_digest(&user.aadhaar);
        let pan_digest = crypto::field_digest(&user.pan);

        let taken: Option<(i64,)> = sqlx::query_as(
            r#"SELECT 1 FROM users WHERE phone = ? OR aadhaar_digest = ? OR pan_digest = ? LIMIT 1"#,
        )
        .bind(&user.phone)
        .bind(&aadhaar_digest)
        .bind(&pan_digest)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if taken.is_some() {
            return Err(RepoError::Conflict(
                "phone, aadhaar or PAN already registered".to_string(),
            ));
        }

        sqlx::query(
            r#"INSERT INTO users (id, name, phone, aadhaar_enc, aadhaar_digest, pan_enc, pan_digest, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&aadhaar_enc)
        .bind(&aadhaar_digest)
        .bind(&pan_enc)
        .bind(&pan_digest)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        let row: Option<DbUser> = sqlx::query_as(
            r#"SELECT id, name, phone, aadhaar_enc, pan_enc, created_at FROM users WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(|r| r.into_domain(&self.cipher)).transpose()
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, RepoError> {
        let row: Option<DbUser> = sqlx::query_as(
            r#"SELECT id, name, phone, aadhaar_enc, pan_enc, created_at FROM users WHERE phone = ?"#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(|r| r.into_domain(&self.cipher)).transpose()
    }

    async fn store_token(&self, token: &AuthToken) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO auth_tokens (id, user_id, token_digest, label, created_at, last_used_at)
               VALUES (?, ?, ?, ?, ?, NULL)"#,
        )
        .bind(token.id.to_string())
        .bind(token.user_id.to_string())
        .bind(&token.token_digest)
        .bind(&token.label)
        .bind(token.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn identity_by_token_digest(
        &self,
        digest: &str,
    ) -> Result<Option<CallerIdentity>, RepoError> {
        let row: Option<DbCallerIdentity> = sqlx::query_as(
            r#"SELECT u.id AS user_id, u.phone AS phone
               FROM auth_tokens t
               JOIN users u ON u.id = t.user_id
               WHERE t.token_digest = ?"#,
        )
        .bind(digest)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query(r#"UPDATE auth_tokens SET last_used_at = ? WHERE token_digest = ?"#)
            .bind(Utc::now().to_rfc3339())
            .bind(digest)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.into_domain().map(Some)
    }

    async fn list_banks(&self) -> Result<Vec<Bank>, RepoError> {
        let rows: Vec<DbBank> =
            sqlx::query_as(r#"SELECT id, name, code FROM banks ORDER BY name ASC"#)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbBank::into_domain).collect()
    }

    async fn get_bank(&self, id: BankId) -> Result<Option<Bank>, RepoError> {
        let row: Option<DbBank> = sqlx::query_as(r#"SELECT id, name, code FROM banks WHERE id = ?"#)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbBank::into_domain).transpose()
    }

    async fn random_ifsc_for_bank(
        &self,
        bank_id: BankId,
    ) -> Result<Option<IfscDetail>, RepoError> {
        let row: Option<DbIfsc> = sqlx::query_as(
            r#"SELECT id, bank_id, ifsc_code, branch, city, state FROM ifsc_details
               WHERE bank_id = ? ORDER BY RANDOM() LIMIT 1"#,
        )
        .bind(bank_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbIfsc::into_domain).transpose()
    }

    async fn find_ifsc(&self, code: &str) -> Result<Option<IfscDetail>, RepoError> {
        let row: Option<DbIfsc> = sqlx::query_as(
            r#"SELECT id, bank_id, ifsc_code, branch, city, state FROM ifsc_details
               WHERE ifsc_code = ?"#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbIfsc::into_domain).transpose()
    }

    async fn get_ifsc(&self, id: IfscId) -> Result<Option<IfscDetail>, RepoError> {
        let row: Option<DbIfsc> = sqlx::query_as(
            r#"SELECT id, bank_id, ifsc_code, branch, city, state FROM ifsc_details
               WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbIfsc::into_domain).transpose()
    }

    async fn create_account(&self, new: NewBankAccount) -> Result<BankAccount, RepoError> {
        let account_number_enc = self.cipher.encrypt(&new.account_number)?;
        let account_number_digest = crypto::field_digest(&new.account_number);

        let id = Uuid::new_v4();
        let now = Utc::now();
        let id_str = id.to_string();
        let created_at_str = now.to_rfc3339();

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let linked: Option<(i64,)> = sqlx::query_as(
            r#"SELECT 1 FROM bank_accounts WHERE account_number_digest = ? LIMIT 1"#,
        )
        .bind(&account_number_digest)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if linked.is_some() {
            return Err(RepoError::Conflict(
                "account number already linked".to_string(),
            ));
        }

        // First linked account becomes the primary receiving account.
        let (count,): (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM bank_accounts WHERE user_id = ?"#)
                .bind(new.user_id.to_string())
                .fetch_one(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
        let is_primary = count == 0;

        let upi_address = Self::claim_upi_address(
            &mut db_tx,
            &new.holder_name,
            "account",
            &id_str,
            &created_at_str,
        )
        .await?;

        sqlx::query(
            r#"INSERT INTO bank_accounts
               (id, user_id, bank_id, ifsc_id, account_number_enc, account_number_digest,
                account_type, balance, pin_digest, pin_length, is_primary, upi_address, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id_str)
        .bind(new.user_id.to_string())
        .bind(new.bank_id.to_string())
        .bind(new.ifsc_id.to_string())
        .bind(&account_number_enc)
        .bind(&account_number_digest)
        .bind(new.account_type.as_str())
        .bind(&new.pin_digest)
        .bind(new.pin_length as i32)
        .bind(is_primary as i64)
        .bind(upi_address.as_str())
        .bind(&created_at_str)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(BankAccount::from_parts(
            AccountId::from_uuid(id),
            new.user_id,
            new.bank_id,
            new.ifsc_id,
            new.account_number,
            new.account_type,
            Money::zero(),
            new.pin_digest,
            new.pin_length,
            is_primary,
            upi_address,
            now,
        ))
    }

    async fn list_accounts_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<BankAccount>, RepoError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE user_id = ? ORDER BY created_at ASC"
        );
        let rows: Vec<DbBankAccount> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|r| r.into_domain(&self.cipher))
            .collect()
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<BankAccount>, RepoError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE id = ?");
        let row: Option<DbBankAccount> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(|r| r.into_domain(&self.cipher)).transpose()
    }

    async fn find_account_by_upi(
        &self,
        address: &UpiAddress,
    ) -> Result<Option<BankAccount>, RepoError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE upi_address = ?");
        let row: Option<DbBankAccount> = sqlx::query_as(&sql)
            .bind(address.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(|r| r.into_domain(&self.cipher)).transpose()
    }

    async fn primary_account_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<BankAccount>, RepoError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE user_id = ? AND is_primary = 1"
        );
        let row: Option<DbBankAccount> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(|r| r.into_domain(&self.cipher)).transpose()
    }

    async fn create_credit_line(&self, new: NewCreditLine) -> Result<CreditLine, RepoError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let id_str = id.to_string();
        let created_at_str = now.to_rfc3339();
        let user_id_str = new.user_id.to_string();

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        match new.kind {
            CreditLineKind::Bank => {
                let anchor = new.anchor_account_id.ok_or_else(|| {
                    RepoError::Domain(DomainError::ValidationError(
                        "bank credit line requires an anchor account".to_string(),
                    ))
                })?;

                let dup: Option<(i64,)> = sqlx::query_as(
                    r#"SELECT 1 FROM credit_lines
                       WHERE user_id = ? AND kind = 'bank' AND anchor_account_id = ? LIMIT 1"#,
                )
                .bind(&user_id_str)
                .bind(anchor.to_string())
                .fetch_optional(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

                if dup.is_some() {
                    return Err(RepoError::Conflict(
                        "credit line already active for this account".to_string(),
                    ));
                }
            }
            CreditLineKind::Network => {
                let dup: Option<(i64,)> = sqlx::query_as(
                    r#"SELECT 1 FROM credit_lines WHERE user_id = ? AND kind = 'network' LIMIT 1"#,
                )
                .bind(&user_id_str)
                .fetch_optional(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

                if dup.is_some() {
                    return Err(RepoError::Conflict(
                        "network credit line already active".to_string(),
                    ));
                }
            }
        }

        let upi_address = Self::claim_upi_address(
            &mut db_tx,
            &new.holder_name,
            "credit_line",
            &id_str,
            &created_at_str,
        )
        .await?;

        sqlx::query(
            r#"INSERT INTO credit_lines
               (id, user_id, kind, anchor_account_id, credit_limit, available_credit,
                pin_digest, pin_length, upi_address, created_at)
               VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)"#,
        )
        .bind(&id_str)
        .bind(&user_id_str)
        .bind(new.kind.as_str())
        .bind(new.anchor_account_id.map(|a| a.to_string()))
        .bind(new.credit_limit.paise())
        .bind(new.credit_limit.paise())
        .bind(upi_address.as_str())
        .bind(&created_at_str)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(CreditLine::from_parts(
            CreditLineId::from_uuid(id),
            new.user_id,
            new.kind,
            new.anchor_account_id,
            new.credit_limit,
            new.credit_limit,
            None,
            None,
            upi_address,
            now,
        ))
    }

    async fn list_credit_lines_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CreditLine>, RepoError> {
        let sql = format!(
            "SELECT {CREDIT_LINE_COLUMNS} FROM credit_lines WHERE user_id = ? ORDER BY created_at ASC"
        );
        let rows: Vec<DbCreditLine> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbCreditLine::into_domain).collect()
    }

    async fn get_credit_line(&self, id: CreditLineId) -> Result<Option<CreditLine>, RepoError> {
        let sql = format!("SELECT {CREDIT_LINE_COLUMNS} FROM credit_lines WHERE id = ?");
        let row: Option<DbCreditLine> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbCreditLine::into_domain).transpose()
    }

    async fn find_credit_line_by_upi(
        &self,
        address: &UpiAddress,
    ) -> Result<Option<CreditLine>, RepoError> {
        let sql = format!("SELECT {CREDIT_LINE_COLUMNS} FROM credit_lines WHERE upi_address = ?");
        let row: Option<DbCreditLine> = sqlx::query_as(&sql)
            .bind(address.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbCreditLine::into_domain).transpose()
    }

    async fn set_credit_line_pin(
        &self,
        id: CreditLineId,
        pin_digest: &str,
        pin_length: u8,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE credit_lines SET pin_digest = ?, pin_length = ? WHERE id = ?"#,
        )
        .bind(pin_digest)
        .bind(pin_length as i32)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }

    async fn apply_transfer(&self, req: ApplyTransfer) -> Result<(), RepoError> {
        let amount = req.amount.paise();

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        // Debit leg. The WHERE clause carries the sufficiency check, so a
        // stale read can never overdraw; zero rows means missing or short.
        match req.debit {
            LedgerLeg::Account(id) => {
                let id_str = id.to_string();
                let result = sqlx::query(
                    r#"UPDATE bank_accounts SET balance = balance - ?
                       WHERE id = ? AND balance >= ?"#,
                )
                .bind(amount)
                .bind(&id_str)
                .bind(amount)
                .execute(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

                if result.rows_affected() == 0 {
                    let row: Option<DbBalance> =
                        sqlx::query_as(r#"SELECT balance FROM bank_accounts WHERE id = ?"#)
                            .bind(&id_str)
                            .fetch_optional(&mut *db_tx)
                            .await
                            .map_err(|e| RepoError::Database(e.to_string()))?;

                    let account = row.ok_or(RepoError::NotFound)?;
                    return Err(RepoError::Domain(DomainError::InsufficientFunds {
                        available: account.balance,
                        requested: amount,
                    }));
                }
            }
            LedgerLeg::CreditLine(id) => {
                let id_str = id.to_string();
                let result = sqlx::query(
                    r#"UPDATE credit_lines SET available_credit = available_credit - ?
                       WHERE id = ? AND available_credit >= ?"#,
                )
                .bind(amount)
                .bind(&id_str)
                .bind(amount)
                .execute(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

                if result.rows_affected() == 0 {
                    let row: Option<DbCreditAvail> = sqlx::query_as(
                        r#"SELECT available_credit, credit_limit FROM credit_lines WHERE id = ?"#,
                    )
                    .bind(&id_str)
                    .fetch_optional(&mut *db_tx)
                    .await
                    .map_err(|e| RepoError::Database(e.to_string()))?;

                    let line = row.ok_or(RepoError::NotFound)?;
                    return Err(RepoError::Domain(DomainError::InsufficientFunds {
                        available: line.available_credit,
                        requested: amount,
                    }));
                }
            }
        }

        // Credit leg. Crediting a line is a repayment and must respect the
        // limit ceiling.
        match req.credit {
            LedgerLeg::Account(id) => {
                let result =
                    sqlx::query(r#"UPDATE bank_accounts SET balance = balance + ? WHERE id = ?"#)
                        .bind(amount)
                        .bind(id.to_string())
                        .execute(&mut *db_tx)
                        .await
                        .map_err(|e| RepoError::Database(e.to_string()))?;

                if result.rows_affected() == 0 {
                    return Err(RepoError::NotFound);
                }
            }
            LedgerLeg::CreditLine(id) => {
                let id_str = id.to_string();
                let result = sqlx::query(
                    r#"UPDATE credit_lines SET available_credit = available_credit + ?
                       WHERE id = ? AND available_credit + ? <= credit_limit"#,
                )
                .bind(amount)
                .bind(&id_str)
                .bind(amount)
                .execute(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

                if result.rows_affected() == 0 {
                    let row: Option<DbCreditAvail> = sqlx::query_as(
                        r#"SELECT available_credit, credit_limit FROM credit_lines WHERE id = ?"#,
                    )
                    .bind(&id_str)
                    .fetch_optional(&mut *db_tx)
                    .await
                    .map_err(|e| RepoError::Database(e.to_string()))?;

                    let line = row.ok_or(RepoError::NotFound)?;
                    return Err(RepoError::Domain(DomainError::CreditLimitExceeded {
                        limit: line.credit_limit,
                        would_be: line.available_credit + amount,
                    }));
                }
            }
        }

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn record_transfer(&self, record: &TransferRecord) -> Result<(), RepoError> {
        let (from_account_id, from_upi) = match &record.sender {
            PartyRef::Account { id } => (Some(id.to_string()), None),
            PartyRef::Upi { address } => (None, Some(address.as_str().to_string())),
            PartyRef::Bank { .. } | PartyRef::Phone { .. } => {
                return Err(RepoError::Domain(DomainError::ValidationError(
                    "sender reference must be an account or UPI address".to_string(),
                )));
            }
        };

        let (to_account_id, to_upi, to_bank_id, to_phone) = match &record.receiver {
            PartyRef::Account { id } => (Some(id.to_string()), None, None, None),
            PartyRef::Upi { address } => (None, Some(address.as_str().to_string()), None, None),
            PartyRef::Bank { id } => (None, None, Some(id.to_string()), None),
            PartyRef::Phone { number } => (None, None, None, Some(number.clone())),
        };

        let result = sqlx::query(
            r#"INSERT INTO transactions
               (id, txn_ref, kind, status, amount, description,
                from_account_id, from_upi, to_account_id, to_upi, to_bank_id, to_phone,
                from_user_id, to_user_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.txn_ref.as_str())
        .bind(record.kind.as_str())
        .bind(record.status.as_str())
        .bind(record.amount.paise())
        .bind(&record.description)
        .bind(from_account_id)
        .bind(from_upi)
        .bind(to_account_id)
        .bind(to_upi)
        .bind(to_bank_id)
        .bind(to_phone)
        .bind(record.from_user_id.map(|u| u.to_string()))
        .bind(record.to_user_id.map(|u| u.to_string()))
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                RepoError::Conflict("transaction reference already used".to_string()),
            ),
            Err(e) => Err(RepoError::Database(e.to_string())),
        }
    }

    async fn find_transaction_by_ref(
        &self,
        txn_ref: &TxnRef,
    ) -> Result<Option<TransferRecord>, RepoError> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE txn_ref = ?");
        let row: Option<DbTransferRecord> = sqlx::query_as(&sql)
            .bind(txn_ref.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbTransferRecord::into_domain).transpose()
    }

    async fn history_for_user(
        &self,
        user_id: UserId,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, RepoError> {
        let uid = user_id.to_string();
        let status = query.status.map(|s| s.as_str());
        let kind = query.kind.map(|k| k.as_str());
        let cutoff = query
            .date_range
            .map(|r| r.cutoff(Utc::now()).to_rfc3339());
        let (amount_lo, amount_hi) = match query.amount_range {
            Some(range) => {
                let (lo, hi) = range.bounds_paise();
                (Some(lo), Some(hi))
            }
            None => (None, None),
        };
        let direction = query.direction.map(|d| d.as_str());

        let page = query.page.unwrap_or(1).max(1);
        let offset = ((page - 1) * HISTORY_PAGE_SIZE) as i64;

        let filter = r#"
            WHERE (from_user_id = ?1 OR to_user_id = ?1)
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL OR kind = ?3)
              AND (?4 IS NULL OR created_at >= ?4)
              AND (?5 IS NULL OR (amount >= ?5 AND amount <= ?6))
              AND (?7 IS NULL
                   OR (?7 = 'send_money' AND from_user_id = ?1
                       AND (to_user_id IS NULL OR to_user_id <> ?1))
                   OR (?7 = 'receive_money' AND to_user_id = ?1 AND from_user_id <> ?1)
                   OR (?7 = 'self_transfer' AND from_user_id = ?1 AND to_user_id = ?1))"#;

        let count_sql = format!("SELECT COUNT(*) FROM transactions {filter}");
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(&uid)
            .bind(status)
            .bind(kind)
            .bind(&cutoff)
            .bind(amount_lo)
            .bind(amount_hi)
            .bind(direction)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        let page_sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions {filter}
             ORDER BY created_at DESC LIMIT ?8 OFFSET ?9"
        );
        let rows: Vec<DbTransferRecord> = sqlx::query_as(&page_sql)
            .bind(&uid)
            .bind(status)
            .bind(kind)
            .bind(&cutoff)
            .bind(amount_lo)
            .bind(amount_hi)
            .bind(direction)
            .bind(HISTORY_PAGE_SIZE as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_domain()?;
            let direction = direction_for(&record, user_id);
            let (party, party_user) = match direction {
                upi_types::Direction::ReceiveMoney => (&record.sender, record.from_user_id),
                _ => (&record.receiver, record.to_user_id),
            };
            let counterparty = self.party_detail(party, party_user).await?;

            items.push(HistoryEntry {
                txn_ref: record.txn_ref,
                kind: record.kind,
                status: record.status,
                amount: record.amount.paise(),
                description: record.description,
                direction,
                counterparty,
                created_at: record.created_at,
            });
        }

        Ok(HistoryPage {
            items,
            page,
            per_page: HISTORY_PAGE_SIZE,
            total,
        })
    }

    async fn recent_receivers(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<RecentReceiver>, RepoError> {
        let rows: Vec<DbRecentReceiver> = sqlx::query_as(
            r#"SELECT t.to_user_id AS user_id, u.name AS name, MAX(t.created_at) AS last_paid_at
               FROM transactions t
               JOIN users u ON u.id = t.to_user_id
               WHERE t.from_user_id = ?1 AND t.status = 'completed' AND t.to_user_id <> ?1
               GROUP BY t.to_user_id, u.name
               ORDER BY last_paid_at DESC
               LIMIT ?2"#,
        )
        .bind(user_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let mut receivers = Vec::with_capacity(rows.len());
        for row in rows {
            let upi: Option<(String,)> = sqlx::query_as(
                r#"SELECT upi_address FROM bank_accounts WHERE user_id = ? AND is_primary = 1"#,
            )
            .bind(&row.user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

            receivers.push(row.into_domain(upi.map(|(addr,)| addr))?);
        }

        Ok(receivers)
    }

    async fn enqueue_notification(&self, notification: &Notification) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO notifications (id, user_id, title, body, data, status, attempts, created_at, sent_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)"#,
        )
        .bind(notification.id.to_string())
        .bind(notification.user_id.to_string())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.data.to_string())
        .bind(notification.status.as_str())
        .bind(notification.attempts)
        .bind(notification.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn pending_notifications(&self, limit: u32) -> Result<Vec<Notification>, RepoError> {
        let rows: Vec<DbNotification> = sqlx::query_as(
            r#"SELECT id, user_id, title, body, data, status, attempts, created_at, sent_at
               FROM notifications
               WHERE status = 'pending'
               ORDER BY created_at ASC
               LIMIT ?"#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbNotification::into_domain).collect()
    }

    async fn mark_notification(
        &self,
        id: NotificationId,
        status: NotificationStatus,
    ) -> Result<(), RepoError> {
        let sent_at = if status == NotificationStatus::Sent {
            Some(Utc::now().to_rfc3339())
        } else {
            None
        };

        sqlx::query(
            r#"UPDATE notifications
               SET status = ?, attempts = attempts + 1, sent_at = ?
               WHERE id = ?"#,
        )
        .bind(status.as_str())
        .bind(sent_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }
}
