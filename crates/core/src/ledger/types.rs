//! Ledger domain types for balance-affecting operations.
//!
//! Requests come from the checkout, top-up and adjustment collaborators
//! with inputs they have already validated (actor identity, amount, cart).
//! The engine turns each request into a [`PlannedOperation`] and, once the
//! unit of work commits, hands back a [`LedgerReceipt`].

use std::fmt;
use std::str::FromStr;

use kasse_shared::types::{AccountId, CatalogItemId, Money, TransactionId};
use serde::{Deserialize, Serialize};

use crate::audit::AuditAction;

/// How a caller identifies the account whose balance changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "value")]
pub enum AccountRef {
    /// Internal account identifier.
    Id(AccountId),
    /// External card number printed on the customer's card.
    Card(String),
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "account {id}"),
            Self::Card(card) => write!(f, "card '{card}'"),
        }
    }
}

impl From<AccountId> for AccountRef {
    fn from(id: AccountId) -> Self {
        Self::Id(id)
    }
}

/// Kind of balance-affecting event recorded in the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Top-up: balance increases.
    Credit,
    /// Purchase/checkout: balance decreases.
    Debit,
    /// Administrative correction in either direction.
    Adjustment,
}

impl TransactionKind {
    /// Audit action recorded alongside a transaction of this kind.
    #[must_use]
    pub const fn audit_action(self) -> AuditAction {
        match self {
            Self::Credit => AuditAction::BalanceTopup,
            Self::Debit => AuditAction::Transaction,
            Self::Adjustment => AuditAction::ManualAdjustment,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(format!("Unknown transaction kind: {other}")),
        }
    }
}

/// One cart entry with the price captured when the item was scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemInput {
    /// Catalog item sold.
    pub catalog_item_id: CatalogItemId,
    /// Number of units (at least 1).
    pub quantity: u32,
    /// Unit price at scan time; never re-read at commit time.
    pub unit_price: Money,
}

impl LineItemInput {
    /// `unit_price × quantity`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

/// Top-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditRequest {
    /// Account to credit.
    pub account: AccountRef,
    /// Positive amount to add.
    pub amount: Money,
    /// Authenticated actor performing the top-up.
    pub actor_id: AccountId,
    /// Optional free-text description.
    pub description: Option<String>,
}

/// Checkout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitRequest {
    /// Account to charge.
    pub account: AccountRef,
    /// Positive cart total.
    pub amount: Money,
    /// Authenticated cashier performing the checkout.
    pub actor_id: AccountId,
    /// Cart entries with price snapshots.
    pub line_items: Vec<LineItemInput>,
    /// Optional free-text description.
    pub description: Option<String>,
}

/// Administrative correction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustRequest {
    /// Account to correct.
    pub account: AccountRef,
    /// Signed, non-zero amount.
    pub amount: Money,
    /// Authenticated administrator performing the correction.
    pub actor_id: AccountId,
    /// Optional free-text description.
    pub description: Option<String>,
}

/// A validated operation, ready to be applied inside a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOperation {
    /// Transaction kind to record.
    pub kind: TransactionKind,
    /// Target account.
    pub account: AccountRef,
    /// Signed balance delta.
    pub delta: Money,
    /// Actor performing the operation.
    pub actor_id: AccountId,
    /// Cart entries (debits only).
    pub line_items: Vec<LineItemInput>,
    /// Description stored on the transaction.
    pub description: String,
}

/// Balance before and after applying a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    /// Balance read inside the unit of work.
    pub previous: Money,
    /// Signed delta applied.
    pub delta: Money,
    /// Resulting balance, never negative.
    pub new: Money,
}

/// Outcome of a committed ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Identifier of the recorded transaction.
    pub transaction_id: TransactionId,
    /// Account whose balance changed.
    pub account_id: AccountId,
    /// Kind of transaction recorded.
    pub kind: TransactionKind,
    /// Signed amount applied to the balance.
    pub amount: Money,
    /// Balance after the operation.
    pub new_balance: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_audit_actions() {
        assert_eq!(TransactionKind::Credit.audit_action(), AuditAction::BalanceTopup);
        assert_eq!(TransactionKind::Debit.audit_action(), AuditAction::Transaction);
        assert_eq!(
            TransactionKind::Adjustment.audit_action(),
            AuditAction::ManualAdjustment
        );
    }

    #[test]
    fn test_kind_parse() {
        for kind in [
            TransactionKind::Credit,
            TransactionKind::Debit,
            TransactionKind::Adjustment,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
        assert!("refund".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_line_total() {
        let item = LineItemInput {
            catalog_item_id: CatalogItemId::new(),
            quantity: 2,
            unit_price: Money::from_cents(1000),
        };
        assert_eq!(item.line_total(), Some(Money::from_cents(2000)));

        let huge = LineItemInput {
            quantity: u32::MAX,
            unit_price: Money::from_cents(i64::MAX),
            ..item
        };
        assert_eq!(huge.line_total(), None);
    }

    #[test]
    fn test_account_ref_display() {
        assert_eq!(AccountRef::Card("4711".into()).to_string(), "card '4711'");
        let id = AccountId::new();
        assert_eq!(AccountRef::from(id).to_string(), format!("account {id}"));
    }
}
