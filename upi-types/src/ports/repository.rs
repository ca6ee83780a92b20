//! Repository port trait.
//!
//! The primary port of the hexagon. Storage adapters (Postgres, SQLite,
//! in-memory test doubles) implement this trait; the application service
//! depends only on it.

use crate::domain::{
    AccountId, AuthToken, Bank, BankAccount, BankId, CallerIdentity, CreditLine, CreditLineId,
    IfscDetail, IfscId, Notification, NotificationId, NotificationStatus, TransferRecord, TxnRef,
    UpiAddress, User, UserId,
};
use crate::dto::{ApplyTransfer, HistoryPage, HistoryQuery, NewBankAccount, NewCreditLine,
    RecentReceiver};
use crate::error::RepoError;

/// The storage port for the UPI ledger.
///
/// `apply_transfer` is the only operation that moves value and MUST be
/// atomic: implementations combine the sufficiency check and both leg
/// mutations under one storage transaction with row-level serialization.
#[async_trait::async_trait]
pub trait LedgerRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────
    // Users & identity
    // ─────────────────────────────────────────────────────────────────────────

    /// Persists a new user. Fails with Conflict if the phone is taken.
    async fn create_user(&self, user: &User) -> Result<(), RepoError>;

    /// Gets a user by id.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError>;

    /// Finds a user by phone number.
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, RepoError>;

    /// Stores an access token (digest only).
    async fn store_token(&self, token: &AuthToken) -> Result<(), RepoError>;

    /// Resolves the caller behind a presented token digest.
    async fn identity_by_token_digest(
        &self,
        digest: &str,
    ) -> Result<Option<CallerIdentity>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Bank / IFSC directory (read-only)
    // ─────────────────────────────────────────────────────────────────────────

    /// All banks available for linking.
    async fn list_banks(&self) -> Result<Vec<Bank>, RepoError>;

    /// Gets one bank.
    async fn get_bank(&self, id: BankId) -> Result<Option<Bank>, RepoError>;

    /// Picks a random branch of the given bank, used at account link time.
    async fn random_ifsc_for_bank(&self, bank_id: BankId)
    -> Result<Option<IfscDetail>, RepoError>;

    /// Looks up a branch record by IFSC code.
    async fn find_ifsc(&self, code: &str) -> Result<Option<IfscDetail>, RepoError>;

    /// Gets a branch record by id.
    async fn get_ifsc(&self, id: IfscId) -> Result<Option<IfscDetail>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Bank accounts
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a bank account with a freshly claimed UPI address.
    ///
    /// The adapter encrypts the account number, enforces number uniqueness
    /// via its digest, claims the address in the shared registry, and marks
    /// the account primary when it is the user's first, all in one storage
    /// transaction.
    async fn create_account(&self, new: NewBankAccount) -> Result<BankAccount, RepoError>;

    /// All accounts belonging to a user.
    async fn list_accounts_for_user(&self, user_id: UserId)
    -> Result<Vec<BankAccount>, RepoError>;

    /// Gets an account by id.
    async fn get_account(&self, id: AccountId) -> Result<Option<BankAccount>, RepoError>;

    /// Finds an account by its UPI address.
    async fn find_account_by_upi(
        &self,
        address: &UpiAddress,
    ) -> Result<Option<BankAccount>, RepoError>;

    /// The user's primary (default receiving) account, if any.
    async fn primary_account_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<BankAccount>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Credit lines
    // ─────────────────────────────────────────────────────────────────────────

    /// Activates a credit line with a freshly claimed UPI address.
    ///
    /// Fails with Conflict when the user already holds a line for the same
    /// anchor account (bank kind) or any network line (network kind).
    async fn create_credit_line(&self, new: NewCreditLine) -> Result<CreditLine, RepoError>;

    /// All credit lines belonging to a user.
    async fn list_credit_lines_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CreditLine>, RepoError>;

    /// Gets a credit line by id.
    async fn get_credit_line(&self, id: CreditLineId) -> Result<Option<CreditLine>, RepoError>;

    /// Finds a credit line by its UPI address.
    async fn find_credit_line_by_upi(
        &self,
        address: &UpiAddress,
    ) -> Result<Option<CreditLine>, RepoError>;

    /// Sets or replaces a credit line's PIN digest.
    async fn set_credit_line_pin(
        &self,
        id: CreditLineId,
        pin_digest: &str,
        pin_length: u8,
    ) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger (MUST be atomic)
    // ─────────────────────────────────────────────────────────────────────────

    /// Atomically debits one funding source and credits another.
    ///
    /// Sufficiency (and, for credit-line credits, the limit ceiling) is
    /// re-checked under the same row locks that guard the mutation, so
    /// concurrent transfers cannot act on stale reads. Either both legs
    /// apply or neither does.
    async fn apply_transfer(&self, req: ApplyTransfer) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Transaction records
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends one transfer record. Fails with Conflict on a duplicate
    /// txn_ref; callers regenerate and retry.
    async fn record_transfer(&self, record: &TransferRecord) -> Result<(), RepoError>;

    /// Looks up a record by its external reference.
    async fn find_transaction_by_ref(
        &self,
        txn_ref: &TxnRef,
    ) -> Result<Option<TransferRecord>, RepoError>;

    /// Pages through a user's history, newest first, with filters applied.
    async fn history_for_user(
        &self,
        user_id: UserId,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, RepoError>;

    /// Distinct counterparties the user most recently paid.
    async fn recent_receivers(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<RecentReceiver>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Notification queue
    // ─────────────────────────────────────────────────────────────────────────

    /// Queues a notification for background delivery.
    async fn enqueue_notification(&self, notification: &Notification) -> Result<(), RepoError>;

    /// Oldest pending notifications, up to `limit`.
    async fn pending_notifications(&self, limit: u32) -> Result<Vec<Notification>, RepoError>;

    /// Marks a notification after a delivery attempt and bumps the counter.
    async fn mark_notification(
        &self,
        id: NotificationId,
        status: NotificationStatus,
    ) -> Result<(), RepoError>;
}
