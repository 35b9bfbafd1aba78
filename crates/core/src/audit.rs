//! Audit trail vocabulary.
//!
//! Every administrative or security-relevant action is recorded with one of
//! these kinds. The string form is what gets stored.

use std::fmt;
use std::str::FromStr;

use kasse_shared::types::AccountId;
use serde::{Deserialize, Serialize};

/// Kind of audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Actor signed in.
    Login,
    /// Actor signed out.
    Logout,
    /// Account created.
    CreateAccount,
    /// Account edited.
    EditAccount,
    /// Account deleted.
    DeleteAccount,
    /// Catalog item created.
    CreateItem,
    /// Catalog item edited.
    EditItem,
    /// Catalog item deleted.
    DeleteItem,
    /// Balance credited.
    BalanceTopup,
    /// Purchase debited.
    Transaction,
    /// Balance corrected by an administrator.
    ManualAdjustment,
}

impl AuditAction {
    /// All actions, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Login,
        Self::Logout,
        Self::CreateAccount,
        Self::EditAccount,
        Self::DeleteAccount,
        Self::CreateItem,
        Self::EditItem,
        Self::DeleteItem,
        Self::BalanceTopup,
        Self::Transaction,
        Self::ManualAdjustment,
    ];

    /// Stored name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::CreateAccount => "create_account",
            Self::EditAccount => "edit_account",
            Self::DeleteAccount => "delete_account",
            Self::CreateItem => "create_item",
            Self::EditItem => "edit_item",
            Self::DeleteItem => "delete_item",
            Self::BalanceTopup => "balance_topup",
            Self::Transaction => "transaction",
            Self::ManualAdjustment => "manual_adjustment",
        }
    }

    /// True for actions written by the ledger engine.
    #[must_use]
    pub const fn is_ledger_event(self) -> bool {
        matches!(
            self,
            Self::BalanceTopup | Self::Transaction | Self::ManualAdjustment
        )
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("Unknown audit action: {s}"))
    }
}

/// An audit entry about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    /// Who performed the action.
    pub actor_id: AccountId,
    /// What was done.
    pub action: AuditAction,
    /// Human-readable details.
    pub details: String,
}

impl NewAuditEntry {
    /// Creates a new audit entry.
    #[must_use]
    pub fn new(actor_id: AccountId, action: AuditAction, details: impl Into<String>) -> Self {
        Self {
            actor_id,
            action,
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_actions() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_unknown_action() {
        assert!("refund".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_ledger_events() {
        let ledger: Vec<_> = AuditAction::ALL
            .into_iter()
            .filter(|a| a.is_ledger_event())
            .collect();
        assert_eq!(
            ledger,
            vec![
                AuditAction::BalanceTopup,
                AuditAction::Transaction,
                AuditAction::ManualAdjustment
            ]
        );
    }
}
