//! Storage error types and `DbErr` classification.

use std::str::FromStr;

use kasse_core::ledger::LedgerError;
use kasse_shared::error::AppError;
use kasse_shared::types::AccountId;
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use thiserror::Error;

/// Errors from the read side of the transaction log and audit trail.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A stored value could not be decoded.
    #[error("Corrupt {column} value '{value}'")]
    Corrupt {
        /// Column holding the value.
        column: &'static str,
        /// Raw stored value.
        value: String,
    },

    /// An aggregate does not fit in its type.
    #[error("{0} overflows")]
    Overflow(&'static str),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Corrupt { .. } | StoreError::Overflow(_) => {
                Self::Internal(err.to_string())
            }
            StoreError::Database(_) => Self::Database(err.to_string()),
        }
    }
}

/// Decodes a stored text column into a typed value.
pub(crate) fn decode<T: FromStr>(column: &'static str, value: &str) -> Result<T, StoreError> {
    value.parse().map_err(|_| StoreError::Corrupt {
        column,
        value: value.to_string(),
    })
}

/// True if the error is a lost race that a fresh attempt may win.
///
/// PostgreSQL reports serialization failures and deadlocks as `40001` and
/// `40P01`. SQLite reports `SQLITE_BUSY` (5) and `SQLITE_LOCKED` (6), or
/// one of the extended busy codes: 261 (recovery), 517 (snapshot) and 773
/// (timeout).
pub fn is_transient(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Conn(runtime) | DbErr::Exec(runtime) | DbErr::Query(runtime) => runtime,
        _ => return false,
    };
    let RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) = runtime else {
        return false;
    };
    matches!(
        db_err.code().as_deref(),
        Some("40001" | "40P01" | "5" | "6" | "261" | "517" | "773")
    )
}

/// Maps a database error raised inside a ledger unit of work.
///
/// Lost races on a known account become
/// [`LedgerError::ConcurrentModification`] so the engine retries them.
/// Everything else is a [`LedgerError::PersistenceFailure`].
pub fn ledger_error(err: DbErr, account_id: Option<AccountId>) -> LedgerError {
    match account_id {
        Some(account_id) if is_transient(&err) => LedgerError::ConcurrentModification {
            account_id,
            attempts: 1,
        },
        _ => LedgerError::PersistenceFailure(err.to_string()),
    }
}

/// True if the error is a unique constraint violation.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
