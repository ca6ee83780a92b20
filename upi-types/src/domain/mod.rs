//! Domain models for the UPI ledger service.

pub mod account;
pub mod auth;
pub mod bank;
pub mod credit_line;
pub mod money;
pub mod notification;
pub mod transaction;
pub mod upi;
pub mod user;

pub use account::{AccountId, AccountType, BankAccount, masked_account_number};
pub use auth::{AuthToken, CallerIdentity, TokenId};
pub use bank::{Bank, BankId, IfscDetail, IfscId};
pub use credit_line::{CREDIT_LIMIT_POOL_RUPEES, CreditLine, CreditLineId, CreditLineKind};
pub use money::{MAX_TRANSFER_PAISE, Money};
pub use notification::{Notification, NotificationId, NotificationStatus};
pub use transaction::{
    PartyRef, TransactionId, TransactionStatus, TransferKind, TransferRecord, TxnRef,
};
pub use upi::{UPI_HANDLES, UpiAddress};
pub use user::{User, UserId};
