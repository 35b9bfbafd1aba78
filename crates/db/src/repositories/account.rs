//! Account store.
//!
//! Administrative CRUD writes its audit entry in the same database
//! transaction. The balance is only ever changed through
//! [`AccountRepository::apply_balance_delta`], which needs an open
//! transaction and is called by the ledger engine.

use chrono::{DateTime, Utc};
use kasse_core::audit::{AuditAction, NewAuditEntry};
use kasse_core::ledger::{AccountRef, BalanceChange, LedgerError, LedgerService};
use kasse_shared::error::AppError;
use kasse_shared::types::{AccountId, Money};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};

use super::audit::AuditRepository;
use crate::entities::accounts::{self, AccountRole};
use crate::entities::transactions;
use crate::error::{StoreError, decode, is_unique_violation, ledger_error};

/// Error types for account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Card number is already assigned to another account.
    #[error("Card number '{0}' is already in use")]
    DuplicateCardNumber(String),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountRef),

    /// Cannot delete an account that has transaction history.
    #[error("Cannot delete account: account has {0} transactions")]
    HasTransactions(u64),

    /// Input failed validation.
    #[error("Invalid account input: {0}")]
    Invalid(String),

    /// A stored row could not be decoded.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        let message = err.to_string();
        match err {
            AccountError::DuplicateCardNumber(_) => Self::Conflict(message),
            AccountError::AccountNotFound(_) => Self::NotFound(message),
            AccountError::HasTransactions(_) => Self::BusinessRule(message),
            AccountError::Invalid(_) => Self::Validation(message),
            AccountError::Store(store) => store.into(),
            AccountError::Database(_) => Self::Database(message),
        }
    }
}

/// A stored-value account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account identifier.
    pub id: AccountId,
    /// Holder's display name.
    pub name: String,
    /// External card number, unique across accounts.
    pub card_number: String,
    /// Contact address for receipts.
    pub email: Option<String>,
    /// Holder's role.
    pub role: AccountRole,
    /// Current balance.
    pub balance: Money,
    /// Optimistic concurrency token, bumped on every balance change.
    pub version: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<accounts::Model> for Account {
    type Error = StoreError;

    fn try_from(model: accounts::Model) -> Result<Self, Self::Error> {
        let role = AccountRole::try_from(model.role.as_str()).map_err(|_| StoreError::Corrupt {
            column: "accounts.role",
            value: model.role.clone(),
        })?;

        Ok(Self {
            id: decode("accounts.id", &model.id)?,
            name: model.name,
            card_number: model.card_number,
            email: model.email,
            role,
            balance: Money::from_cents(model.balance_cents),
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    /// Holder's display name.
    pub name: String,
    /// External card number (must be unique).
    pub card_number: String,
    /// Contact address for receipts.
    pub email: Option<String>,
    /// Holder's role.
    pub role: AccountRole,
}

/// Input for updating an account. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateAccountInput {
    /// Holder's display name.
    pub name: Option<String>,
    /// External card number (must stay unique).
    pub card_number: Option<String>,
    /// Contact address; `Some(None)` clears it.
    pub email: Option<Option<String>>,
    /// Holder's role.
    pub role: Option<AccountRole>,
}

/// Account repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an account with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Name or card number is blank
    /// - Card number is already in use
    /// - Database operation fails
    pub async fn create_account(
        &self,
        actor_id: AccountId,
        input: CreateAccountInput,
    ) -> Result<Account, AccountError> {
        let name = required("name", &input.name)?;
        let card_number = required("card number", &input.card_number)?;

        let txn = self.db.begin().await?;

        ensure_card_available(&txn, &card_number, None).await?;

        let id = AccountId::new();
        let now = Utc::now();
        let model = accounts::ActiveModel {
            id: Set(id.to_string()),
            name: Set(name),
            card_number: Set(card_number.clone()),
            email: Set(input.email),
            role: Set(input.role.as_str().to_string()),
            balance_cents: Set(0),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| card_conflict(e, &card_number))?;

        let account = Account::try_from(model)?;

        AuditRepository::append(
            &txn,
            NewAuditEntry::new(
                actor_id,
                AuditAction::CreateAccount,
                format!(
                    "Created {} account {} '{}' with card {}",
                    account.role, account.id, account.name, account.card_number
                ),
            ),
        )
        .await?;

        txn.commit().await?;
        Ok(account)
    }

    /// Updates account details. The balance cannot be changed here.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Account does not exist
    /// - New card number is already in use
    /// - Database operation fails
    pub async fn update_account(
        &self,
        actor_id: AccountId,
        id: AccountId,
        input: UpdateAccountInput,
    ) -> Result<Account, AccountError> {
        let txn = self.db.begin().await?;

        let existing = accounts::Entity::find_by_id(id.to_string())
            .one(&txn)
            .await?
            .ok_or(AccountError::AccountNotFound(AccountRef::Id(id)))?;

        let mut changes = Vec::new();
        let mut active: accounts::ActiveModel = existing.clone().into();

        if let Some(name) = input.name {
            let name = required("name", &name)?;
            if name != existing.name {
                changes.push(format!("name '{}' -> '{name}'", existing.name));
                active.name = Set(name);
            }
        }

        let mut new_card = None;
        if let Some(card_number) = input.card_number {
            let card_number = required("card number", &card_number)?;
            if card_number != existing.card_number {
                ensure_card_available(&txn, &card_number, Some(id)).await?;
                changes.push(format!(
                    "card {} -> {card_number}",
                    existing.card_number
                ));
                active.card_number = Set(card_number.clone());
                new_card = Some(card_number);
            }
        }

        if let Some(email) = input.email
            && email != existing.email
        {
            changes.push("email".to_string());
            active.email = Set(email);
        }

        if let Some(role) = input.role
            && role.as_str() != existing.role
        {
            changes.push(format!("role {} -> {role}", existing.role));
            active.role = Set(role.as_str().to_string());
        }

        if changes.is_empty() {
            txn.commit().await?;
            return Ok(Account::try_from(existing)?);
        }

        active.updated_at = Set(Utc::now());
        let model = active.update(&txn).await.map_err(|e| match &new_card {
            Some(card) => card_conflict(e, card),
            None => AccountError::Database(e),
        })?;

        AuditRepository::append(
            &txn,
            NewAuditEntry::new(
                actor_id,
                AuditAction::EditAccount,
                format!("Edited account {id}: {}", changes.join(", ")),
            ),
        )
        .await?;

        txn.commit().await?;
        Ok(Account::try_from(model)?)
    }

    /// Deletes an account that has no transaction history.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist, has transactions,
    /// or the database operation fails.
    pub async fn delete_account(
        &self,
        actor_id: AccountId,
        id: AccountId,
    ) -> Result<(), AccountError> {
        let txn = self.db.begin().await?;

        let existing = accounts::Entity::find_by_id(id.to_string())
            .one(&txn)
            .await?
            .ok_or(AccountError::AccountNotFound(AccountRef::Id(id)))?;

        let history = transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(id.to_string()))
            .count(&txn)
            .await?;
        if history > 0 {
            return Err(AccountError::HasTransactions(history));
        }

        accounts::Entity::delete_by_id(id.to_string())
            .exec(&txn)
            .await?;

        AuditRepository::append(
            &txn,
            NewAuditEntry::new(
                actor_id,
                AuditAction::DeleteAccount,
                format!(
                    "Deleted account {id} '{}' with card {}",
                    existing.name, existing.card_number
                ),
            ),
        )
        .await?;

        txn.commit().await?;
        Ok(())
    }

    /// Finds an account by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::AccountNotFound`] if there is no such account.
    pub async fn find_by_id(&self, id: AccountId) -> Result<Account, AccountError> {
        find_model(&self.db, &AccountRef::Id(id))
            .await?
            .ok_or(AccountError::AccountNotFound(AccountRef::Id(id)))
            .and_then(|model| Ok(Account::try_from(model)?))
    }

    /// Finds an account by its external card number.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::AccountNotFound`] if no account carries the card.
    pub async fn find_by_card_number(&self, card_number: &str) -> Result<Account, AccountError> {
        let reference = AccountRef::Card(card_number.to_string());
        match find_model(&self.db, &reference).await? {
            Some(model) => Ok(Account::try_from(model)?),
            None => Err(AccountError::AccountNotFound(reference)),
        }
    }

    /// Lists all accounts ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AccountError> {
        let rows = accounts::Entity::find()
            .order_by_asc(accounts::Column::Name)
            .order_by_asc(accounts::Column::Id)
            .all(&self.db)
            .await?;

        rows.into_iter()
            .map(|model| Account::try_from(model).map_err(AccountError::from))
            .collect()
    }

    /// Returns true if at least one administrator exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn has_admin(&self) -> Result<bool, DbErr> {
        let admins = accounts::Entity::find()
            .filter(accounts::Column::Role.eq(AccountRole::Admin.as_str()))
            .count(&self.db)
            .await?;
        Ok(admins > 0)
    }

    /// Sum of all account balances.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the sum does not fit.
    pub async fn system_balance(&self) -> Result<Money, AccountError> {
        let balances: Vec<i64> = accounts::Entity::find()
            .select_only()
            .column(accounts::Column::BalanceCents)
            .into_tuple()
            .all(&self.db)
            .await?;

        balances
            .into_iter()
            .try_fold(Money::ZERO, |acc, cents| acc.checked_add(Money::from_cents(cents)))
            .ok_or_else(|| AccountError::Invalid("system balance overflows".to_string()))
    }

    /// Resolves an account reference to its identifier.
    ///
    /// Identifier references are returned as-is. Card references are looked
    /// up outside any unit of work; the card number never changes the row a
    /// unit locks, only which row that is.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if the card is unknown.
    pub async fn resolve_id<C: ConnectionTrait>(
        conn: &C,
        reference: &AccountRef,
    ) -> Result<AccountId, LedgerError> {
        if let AccountRef::Id(id) = reference {
            return Ok(*id);
        }

        let model = find_model(conn, reference)
            .await
            .map_err(|e| ledger_error(e, None))?
            .ok_or_else(|| LedgerError::AccountNotFound(reference.clone()))?;

        decode("accounts.id", &model.id)
            .map_err(|e: StoreError| LedgerError::PersistenceFailure(e.to_string()))
    }

    /// Reads an account for update inside a unit of work.
    ///
    /// On PostgreSQL the row is read with `SELECT ... FOR UPDATE`, so a
    /// competing unit waits for this one to finish instead of failing its
    /// version check. SQLite has no row locks: a no-op write claims the
    /// database write lock before the read, which queues contenders in the
    /// busy handler rather than failing them with a stale snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if the account does not exist,
    /// [`LedgerError::ConcurrentModification`] if the lock could not be taken
    /// in time, and [`LedgerError::PersistenceFailure`] otherwise.
    pub async fn lock(
        txn: &DatabaseTransaction,
        id: AccountId,
        reference: &AccountRef,
    ) -> Result<Account, LedgerError> {
        let not_found = || LedgerError::AccountNotFound(reference.clone());

        let model = if txn.get_database_backend() == DbBackend::Sqlite {
            let claimed = accounts::Entity::update_many()
                .col_expr(
                    accounts::Column::Version,
                    Expr::col(accounts::Column::Version).into(),
                )
                .filter(accounts::Column::Id.eq(id.to_string()))
                .exec(txn)
                .await
                .map_err(|e| ledger_error(e, Some(id)))?;
            if claimed.rows_affected == 0 {
                return Err(not_found());
            }

            accounts::Entity::find_by_id(id.to_string()).one(txn).await
        } else {
            accounts::Entity::find_by_id(id.to_string())
                .lock_exclusive()
                .one(txn)
                .await
        };

        let model = model
            .map_err(|e| ledger_error(e, Some(id)))?
            .ok_or_else(not_found)?;

        Account::try_from(model).map_err(|e| LedgerError::PersistenceFailure(e.to_string()))
    }

    /// Applies a signed delta to an account read in the same unit of work.
    ///
    /// The update only matches while the account still has the version that
    /// was read. If another unit changed it in between, nothing is written
    /// and [`LedgerError::ConcurrentModification`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientFunds`] if the balance would go
    /// negative, [`LedgerError::ConcurrentModification`] on a lost race, and
    /// [`LedgerError::PersistenceFailure`] for other database errors.
    pub async fn apply_balance_delta(
        txn: &DatabaseTransaction,
        account: &Account,
        delta: Money,
    ) -> Result<BalanceChange, LedgerError> {
        let change = LedgerService::apply(account.balance, delta)?;

        let result = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::BalanceCents,
                Expr::value(change.new.cents()),
            )
            .col_expr(
                accounts::Column::Version,
                Expr::col(accounts::Column::Version).add(1),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(accounts::Column::Id.eq(account.id.to_string()))
            .filter(accounts::Column::Version.eq(account.version))
            .exec(txn)
            .await
            .map_err(|e| ledger_error(e, Some(account.id)))?;

        if result.rows_affected == 0 {
            return Err(LedgerError::ConcurrentModification {
                account_id: account.id,
                attempts: 1,
            });
        }

        Ok(change)
    }
}

async fn find_model<C: ConnectionTrait>(
    conn: &C,
    reference: &AccountRef,
) -> Result<Option<accounts::Model>, DbErr> {
    match reference {
        AccountRef::Id(id) => accounts::Entity::find_by_id(id.to_string()).one(conn).await,
        AccountRef::Card(card) => {
            accounts::Entity::find()
                .filter(accounts::Column::CardNumber.eq(card.trim()))
                .one(conn)
                .await
        }
    }
}

async fn ensure_card_available<C: ConnectionTrait>(
    conn: &C,
    card_number: &str,
    except: Option<AccountId>,
) -> Result<(), AccountError> {
    let mut query = accounts::Entity::find().filter(accounts::Column::CardNumber.eq(card_number));
    if let Some(id) = except {
        query = query.filter(accounts::Column::Id.ne(id.to_string()));
    }

    if query.count(conn).await? > 0 {
        return Err(AccountError::DuplicateCardNumber(card_number.to_string()));
    }
    Ok(())
}

fn card_conflict(err: DbErr, card_number: &str) -> AccountError {
    if is_unique_violation(&err) {
        AccountError::DuplicateCardNumber(card_number.to_string())
    } else {
        AccountError::Database(err)
    }
}

fn required(field: &str, value: &str) -> Result<String, AccountError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AccountError::Invalid(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("name", "  Ada ").unwrap(), "Ada");
        assert!(matches!(
            required("name", "   "),
            Err(AccountError::Invalid(_))
        ));
    }

    #[test]
    fn test_role_round_trip() {
        for role in [AccountRole::Admin, AccountRole::Cashier, AccountRole::Customer] {
            assert_eq!(AccountRole::try_from(role.as_str()).unwrap(), role);
        }
        assert!(AccountRole::try_from("owner").is_err());
    }

    #[test]
    fn test_corrupt_role_is_reported() {
        let now = Utc::now();
        let model = accounts::Model {
            id: AccountId::new().to_string(),
            name: "Ada".into(),
            card_number: "1001".into(),
            email: None,
            role: "owner".into(),
            balance_cents: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            Account::try_from(model),
            Err(StoreError::Corrupt { column: "accounts.role", .. })
        ));
    }

    #[test]
    fn test_app_error_mapping() {
        let app: AppError = AccountError::DuplicateCardNumber("1001".into()).into();
        assert_eq!(app.status_code(), 409);
        let app: AppError = AccountError::HasTransactions(3).into();
        assert_eq!(app.status_code(), 422);
    }
}
