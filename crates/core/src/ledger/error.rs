//! Ledger error types.
//!
//! Every failure except [`LedgerError::AuditWriteDegraded`] leaves balances
//! and history exactly as they were before the call.

use kasse_shared::error::AppError;
use kasse_shared::types::{AccountId, Money, MoneyError};
use thiserror::Error;

use super::types::{AccountRef, LedgerReceipt};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Input Errors ==========
    /// The referenced account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountRef),

    /// Amount is zero, has the wrong sign, or is not an exact cent amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A cart entry is malformed (zero quantity, negative price, overflow).
    #[error("Invalid line item: {0}")]
    InvalidLineItem(String),

    /// Cart total does not equal the sum of its line items.
    #[error("Amount {total} does not match line items total {items_total}")]
    LineItemMismatch {
        /// Amount requested by the caller.
        total: Money,
        /// Sum of quantity × unit price over all line items.
        items_total: Money,
    },

    // ========== Business Rule Errors ==========
    /// Applying the operation would make the balance negative.
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Balance read inside the unit of work.
        balance: Money,
        /// Amount that would have been removed.
        requested: Money,
    },

    // ========== Concurrency Errors ==========
    /// The account kept changing underneath the operation.
    #[error("Account {account_id} was modified concurrently ({attempts} attempts)")]
    ConcurrentModification {
        /// The contended account.
        account_id: AccountId,
        /// Attempts made before giving up.
        attempts: u32,
    },

    // ========== Storage Errors ==========
    /// The unit of work could not be committed.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// The operation committed but its audit entry could not be written.
    #[error("Transaction {} committed without audit entry: {reason}", receipt.transaction_id)]
    AuditWriteDegraded {
        /// Receipt of the committed operation.
        receipt: Box<LedgerReceipt>,
        /// Why the audit write failed.
        reason: String,
    },
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidLineItem(_) => "INVALID_LINE_ITEM",
            Self::LineItemMismatch { .. } => "LINE_ITEM_MISMATCH",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            Self::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            Self::AuditWriteDegraded { .. } => "AUDIT_WRITE_DEGRADED",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 202 Accepted - the balance change is durable
            Self::AuditWriteDegraded { .. } => 202,

            // 400 Bad Request - validation errors
            Self::InvalidAmount(_) | Self::InvalidLineItem(_) | Self::LineItemMismatch { .. } => {
                400
            }

            // 404 Not Found
            Self::AccountNotFound(_) => 404,

            // 409 Conflict - concurrency errors
            Self::ConcurrentModification { .. } => 409,

            // 422 Unprocessable Entity
            Self::InsufficientFunds { .. } => 422,

            // 500 Internal Server Error
            Self::PersistenceFailure(_) => 500,
        }
    }

    /// Returns true if re-submitting the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    /// Receipt of the operation if it committed despite the error.
    #[must_use]
    pub fn committed_receipt(&self) -> Option<&LedgerReceipt> {
        match self {
            Self::AuditWriteDegraded { receipt, .. } => Some(receipt.as_ref()),
            _ => None,
        }
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        Self::InvalidAmount(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::AccountNotFound(_) => Self::NotFound(message),
            LedgerError::InvalidAmount(_)
            | LedgerError::InvalidLineItem(_)
            | LedgerError::LineItemMismatch { .. } => Self::Validation(message),
            LedgerError::InsufficientFunds { .. } => Self::BusinessRule(message),
            LedgerError::ConcurrentModification { .. } => Self::Conflict(message),
            LedgerError::PersistenceFailure(_) => Self::Database(message),
            LedgerError::AuditWriteDegraded { .. } => Self::Degraded(message),
        }
    }
}
