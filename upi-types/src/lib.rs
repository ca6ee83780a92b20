//! # UPI Types
//!
//! Domain types and port traits for the UPI ledger service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, funding sources, transfer records)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    AccountId, AccountType, AuthToken, Bank, BankAccount, BankId, CREDIT_LIMIT_POOL_RUPEES,
    CallerIdentity, CreditLine, CreditLineId, CreditLineKind, IfscDetail, IfscId,
    MAX_TRANSFER_PAISE, Money, Notification, NotificationId, NotificationStatus, PartyRef,
    TokenId, TransactionId, TransactionStatus, TransferKind, TransferRecord, TxnRef, UpiAddress,
    User, UserId,
};
pub use dto::*;
pub use error::{AppError, DomainError, RepoError};
pub use ports::LedgerRepository;
