//! Ledger service for request validation and balance planning.
//!
//! Everything here is pure: the database layer reads the current balance
//! inside its unit of work and asks [`LedgerService::apply`] what the new
//! balance is.

use kasse_shared::types::Money;

use super::error::LedgerError;
use super::types::{
    AdjustRequest, BalanceChange, CreditRequest, DebitRequest, LedgerReceipt, PlannedOperation,
    TransactionKind,
};
use super::validation::{validate_line_items, validate_non_zero, validate_positive};

/// Description recorded on a credit when the caller gives none.
pub const DEFAULT_CREDIT_DESCRIPTION: &str = "Balance top-up";

/// Description recorded on a debit when the caller gives none.
pub const DEFAULT_DEBIT_DESCRIPTION: &str = "Purchase";

/// Description recorded on an adjustment when the caller gives none.
pub const DEFAULT_ADJUSTMENT_DESCRIPTION: &str = "Manual adjustment";

/// Ledger service for request validation and balance planning.
///
/// This service contains pure business logic with no database dependencies.
pub struct LedgerService;

impl LedgerService {
    /// Validates a top-up request.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] if the amount is not positive.
    pub fn prepare_credit(request: CreditRequest) -> Result<PlannedOperation, LedgerError> {
        validate_positive(request.amount)?;

        Ok(PlannedOperation {
            kind: TransactionKind::Credit,
            account: request.account,
            delta: request.amount,
            actor_id: request.actor_id,
            line_items: Vec::new(),
            description: describe(request.description, DEFAULT_CREDIT_DESCRIPTION),
        })
    }

    /// Validates a checkout request.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] if the amount is not positive,
    /// and a line-item error if the cart does not add up.
    pub fn prepare_debit(request: DebitRequest) -> Result<PlannedOperation, LedgerError> {
        validate_positive(request.amount)?;
        validate_line_items(request.amount, &request.line_items)?;

        let delta = request
            .amount
            .checked_neg()
            .ok_or_else(|| LedgerError::InvalidAmount("amount is out of range".to_string()))?;

        Ok(PlannedOperation {
            kind: TransactionKind::Debit,
            account: request.account,
            delta,
            actor_id: request.actor_id,
            line_items: request.line_items,
            description: describe(request.description, DEFAULT_DEBIT_DESCRIPTION),
        })
    }

    /// Validates an administrative correction.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] if the amount is zero.
    pub fn prepare_adjust(request: AdjustRequest) -> Result<PlannedOperation, LedgerError> {
        validate_non_zero(request.amount)?;

        Ok(PlannedOperation {
            kind: TransactionKind::Adjustment,
            account: request.account,
            delta: request.amount,
            actor_id: request.actor_id,
            line_items: Vec::new(),
            description: describe(request.description, DEFAULT_ADJUSTMENT_DESCRIPTION),
        })
    }

    /// Applies a signed delta to a balance read inside the unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientFunds`] if the result would be
    /// negative and [`LedgerError::InvalidAmount`] on overflow.
    pub fn apply(current: Money, delta: Money) -> Result<BalanceChange, LedgerError> {
        let new = current
            .checked_add(delta)
            .ok_or_else(|| LedgerError::InvalidAmount("resulting balance is out of range".to_string()))?;

        if new.is_negative() {
            return Err(LedgerError::InsufficientFunds {
                balance: current,
                requested: delta.checked_abs().unwrap_or(delta),
            });
        }

        Ok(BalanceChange {
            previous: current,
            delta,
            new,
        })
    }

    /// Audit entry text for a committed operation.
    #[must_use]
    pub fn audit_details(operation: &PlannedOperation, receipt: &LedgerReceipt) -> String {
        let mut details = format!(
            "{} of {} on {} ({}), new balance {}",
            operation.kind,
            receipt.amount,
            receipt.account_id,
            operation.account,
            receipt.new_balance,
        );
        if !operation.line_items.is_empty() {
            details.push_str(&format!(", {} line items", operation.line_items.len()));
        }
        details.push_str(&format!(", transaction {}", receipt.transaction_id));
        details
    }
}

fn describe(description: Option<String>, default: &str) -> String {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| default.to_string())
}
