//! Port traits (interfaces for adapters).
//!
//! The application layer depends on these contracts, never on concrete
//! storage or transport implementations.

mod repository;

pub use repository::LedgerRepository;
