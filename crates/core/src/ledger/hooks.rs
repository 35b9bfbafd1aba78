//! Post-commit hooks.
//!
//! Hooks run after a unit of work has durably committed. They are the seam
//! for receipt emails and similar notifications, which live outside the
//! ledger. A hook cannot fail the operation.

use tokio::sync::mpsc;

use super::types::LedgerReceipt;

/// Event delivered to hooks after a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEvent {
    /// Receipt of the committed operation.
    pub receipt: LedgerReceipt,
    /// Description stored on the transaction.
    pub description: String,
    /// False when the audit entry could not be written.
    pub audited: bool,
}

/// Observer of committed ledger operations.
///
/// Implementations must not panic. The engine catches an unwinding panic
/// and logs it, but release builds abort on panic, which would take the
/// process down after the commit.
pub trait CommitHook: Send + Sync {
    /// Called once per committed operation, on the engine's task. Keep it
    /// short and hand slow work to another task.
    fn on_commit(&self, event: &CommittedEvent);
}

/// Forwards committed events to an mpsc consumer.
#[derive(Debug, Clone)]
pub struct ChannelHook {
    sender: mpsc::UnboundedSender<CommittedEvent>,
}

impl ChannelHook {
    /// Creates a hook and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CommittedEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl CommitHook for ChannelHook {
    fn on_commit(&self, event: &CommittedEvent) {
        if self.sender.send(event.clone()).is_err() {
            tracing::warn!(
                transaction_id = %event.receipt.transaction_id,
                "commit hook receiver dropped, event discarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use kasse_shared::types::{AccountId, Money, TransactionId};

    use super::*;
    use crate::ledger::types::TransactionKind;

    fn event() -> CommittedEvent {
        CommittedEvent {
            receipt: LedgerReceipt {
                transaction_id: TransactionId::new(),
                account_id: AccountId::new(),
                kind: TransactionKind::Credit,
                amount: Money::from_cents(500),
                new_balance: Money::from_cents(500),
            },
            description: "Balance top-up".into(),
            audited: true,
        }
    }

    #[test]
    fn test_channel_hook_forwards_events() {
        let (hook, mut receiver) = ChannelHook::new();
        let sent = event();
        hook.on_commit(&sent);
        assert_eq!(receiver.try_recv().unwrap(), sent);
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (hook, receiver) = ChannelHook::new();
        drop(receiver);
        hook.on_commit(&event());
    }
}
