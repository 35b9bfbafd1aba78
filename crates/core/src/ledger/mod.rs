//! Stored-value balance ledger.
//!
//! This module implements the database-free half of the ledger:
//! - Request and receipt types for credit, debit and adjustment
//! - Amount and line-item validation
//! - Balance planning that never lets a balance go negative
//! - Error types for ledger operations
//! - Post-commit hook contract

pub mod error;
pub mod hooks;
pub mod service;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;

pub use error::LedgerError;
pub use hooks::{ChannelHook, CommitHook, CommittedEvent};
pub use service::LedgerService;
pub use types::{
    AccountRef, AdjustRequest, BalanceChange, CreditRequest, DebitRequest, LedgerReceipt,
    LineItemInput, PlannedOperation, TransactionKind,
};
