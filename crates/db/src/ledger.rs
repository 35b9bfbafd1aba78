//! Ledger engine: atomic credit, debit and adjustment.
//!
//! Each operation is one database transaction that reads the account,
//! writes the new balance, appends the transaction with its line items and
//! appends the audit entry. The audit insert runs in a savepoint so that a
//! failing audit write cannot take the financial change down with it.
//!
//! Operations on the same account are serialized by locking the account row
//! for the length of the unit, with the account's `version` column as a
//! second check. A unit that still loses the race, or times out waiting for
//! the lock, is re-run from a fresh read up to `max_retries` times after a
//! jittered backoff. Units on different accounts never touch the same row.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use kasse_core::audit::NewAuditEntry;
use kasse_core::ledger::{
    AdjustRequest, CommitHook, CommittedEvent, CreditRequest, DebitRequest, LedgerError,
    LedgerReceipt, LedgerService, PlannedOperation,
};
use kasse_shared::config::LedgerConfig;
use kasse_shared::types::TransactionId;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::ledger_error;
use crate::repositories::{
    AccountRepository, AuditRepository, NewTransaction, TransactionLogRepository,
};

/// Result of one committed unit of work.
struct Committed {
    receipt: LedgerReceipt,
    audit: Result<(), String>,
}

/// Applies balance-affecting operations atomically.
///
/// Cheap to clone; clones share the connection pool and hooks.
#[derive(Clone)]
pub struct LedgerEngine {
    db: DatabaseConnection,
    config: LedgerConfig,
    hooks: Vec<Arc<dyn CommitHook>>,
}

impl fmt::Debug for LedgerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerEngine")
            .field("config", &self.config)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

impl LedgerEngine {
    /// Creates a ledger engine.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self {
            db,
            config,
            hooks: Vec::new(),
        }
    }

    /// Registers a hook that observes every committed operation.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn CommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Adds a positive amount to an account's balance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a non-positive amount, `AccountNotFound`
    /// if the reference does not resolve, and the storage errors described
    /// on [`LedgerError`].
    pub async fn credit(&self, request: CreditRequest) -> Result<LedgerReceipt, LedgerError> {
        let operation = LedgerService::prepare_credit(request)?;
        self.execute(operation).await
    }

    /// Charges a checkout to an account.
    ///
    /// Line items carry the price captured at scan time and are stored as-is.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientFunds` if the balance does not cover the amount,
    /// in addition to the errors of [`LedgerEngine::credit`] and the
    /// line-item errors.
    pub async fn debit(&self, request: DebitRequest) -> Result<LedgerReceipt, LedgerError> {
        let operation = LedgerService::prepare_debit(request)?;
        self.execute(operation).await
    }

    /// Applies an administrative correction of either sign.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for zero and `InsufficientFunds` if a negative
    /// correction exceeds the balance, plus the usual storage errors.
    pub async fn adjust(&self, request: AdjustRequest) -> Result<LedgerReceipt, LedgerError> {
        let operation = LedgerService::prepare_adjust(request)?;
        self.execute(operation).await
    }

    /// Runs the operation on its own task so that dropping the caller's
    /// future cannot interrupt a unit of work halfway.
    async fn execute(&self, operation: PlannedOperation) -> Result<LedgerReceipt, LedgerError> {
        let engine = self.clone();
        let span = info_span!(
            "ledger",
            operation = %operation.kind,
            account = %operation.account,
        );

        tokio::spawn(async move { engine.run(operation).await }.instrument(span))
            .await
            .map_err(|e| LedgerError::PersistenceFailure(format!("ledger task failed: {e}")))?
    }

    async fn run(&self, operation: PlannedOperation) -> Result<LedgerReceipt, LedgerError> {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt: u32 = 1;

        loop {
            let result = self
                .attempt(&operation)
                .instrument(info_span!("attempt", attempt))
                .await;

            match result {
                Ok(committed) => return self.finish(&operation, committed),
                Err(LedgerError::ConcurrentModification { account_id, .. }) => {
                    if attempt >= max_attempts {
                        warn!(
                            account_id = %account_id,
                            attempts = attempt,
                            "giving up after repeated concurrent modifications"
                        );
                        return Err(LedgerError::ConcurrentModification {
                            account_id,
                            attempts: attempt,
                        });
                    }

                    debug!(account_id = %account_id, attempt, "concurrent modification, retrying");
                    tokio::time::sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(error = %err, "ledger operation rejected");
                    return Err(err);
                }
            }
        }
    }

    /// Linear backoff plus up to one base step of jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.retry_backoff_ms;
        let jitter = rand::random_range(0..=base);
        Duration::from_millis(base.saturating_mul(u64::from(attempt)).saturating_add(jitter))
    }

    /// One unit of work. Any early return drops the transaction, which
    /// rolls it back.
    async fn attempt(&self, operation: &PlannedOperation) -> Result<Committed, LedgerError> {
        let account_id = AccountRepository::resolve_id(&self.db, &operation.account).await?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| ledger_error(e, Some(account_id)))?;

        let account = AccountRepository::lock(&txn, account_id, &operation.account).await?;
        let change = AccountRepository::apply_balance_delta(&txn, &account, operation.delta).await?;

        let receipt = LedgerReceipt {
            transaction_id: TransactionId::new(),
            account_id: account.id,
            kind: operation.kind,
            amount: change.delta,
            new_balance: change.new,
        };

        TransactionLogRepository::append(
            &txn,
            &NewTransaction {
                id: receipt.transaction_id,
                account_id: account.id,
                actor_id: operation.actor_id,
                kind: operation.kind,
                amount: change.delta,
                balance_after: change.new,
                description: Some(operation.description.clone()),
            },
            &operation.line_items,
        )
        .await
        .map_err(|e| ledger_error(e, Some(account.id)))?;

        let audit = Self::write_audit(&txn, operation, &receipt).await;

        txn.commit()
            .await
            .map_err(|e| ledger_error(e, Some(account.id)))?;

        Ok(Committed { receipt, audit })
    }

    /// Writes the audit entry in a savepoint of the unit of work.
    async fn write_audit(
        txn: &DatabaseTransaction,
        operation: &PlannedOperation,
        receipt: &LedgerReceipt,
    ) -> Result<(), String> {
        let savepoint = txn.begin().await.map_err(|e| e.to_string())?;

        let entry = NewAuditEntry::new(
            operation.actor_id,
            operation.kind.audit_action(),
            LedgerService::audit_details(operation, receipt),
        );

        match AuditRepository::append(&savepoint, entry).await {
            Ok(_) => savepoint.commit().await.map_err(|e| e.to_string()),
            Err(err) => {
                if let Err(rollback) = savepoint.rollback().await {
                    warn!(error = %rollback, "failed to roll back audit savepoint");
                }
                Err(err.to_string())
            }
        }
    }

    fn finish(
        &self,
        operation: &PlannedOperation,
        committed: Committed,
    ) -> Result<LedgerReceipt, LedgerError> {
        let Committed { receipt, audit } = committed;

        let event = CommittedEvent {
            receipt: receipt.clone(),
            description: operation.description.clone(),
            audited: audit.is_ok(),
        };
        for hook in &self.hooks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook.on_commit(&event)));
            if outcome.is_err() {
                error!(
                    transaction_id = %receipt.transaction_id,
                    "commit hook panicked, operation stays committed"
                );
            }
        }

        match audit {
            Ok(()) => {
                info!(
                    transaction_id = %receipt.transaction_id,
                    account_id = %receipt.account_id,
                    amount = %receipt.amount,
                    new_balance = %receipt.new_balance,
                    "ledger operation committed"
                );
                Ok(receipt)
            }
            Err(reason) => {
                error!(
                    target: "kasse::audit",
                    transaction_id = %receipt.transaction_id,
                    account_id = %receipt.account_id,
                    action = %operation.kind.audit_action(),
                    error = %reason,
                    "ledger operation committed without audit entry, backfill required"
                );
                Err(LedgerError::AuditWriteDegraded {
                    receipt: Box::new(receipt),
                    reason,
                })
            }
        }
    }
}
