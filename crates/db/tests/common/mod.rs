//! Shared fixtures for integration tests.

#![allow(dead_code)]

use kasse_core::ledger::{AccountRef, CreditRequest};
use kasse_db::entities::accounts::AccountRole;
use kasse_db::migration::{Migrator, MigratorTrait};
use kasse_db::repositories::{Account, AccountRepository, CreateAccountInput};
use kasse_db::LedgerEngine;
use kasse_shared::config::LedgerConfig;
use kasse_shared::types::{AccountId, Money};
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sqlx::sqlite::SqliteJournalMode;
use tempfile::TempDir;

/// Fresh, migrated in-memory database.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// Fresh, migrated file database in WAL mode behind a pool of several
/// connections, so that units of work genuinely overlap.
///
/// The directory must outlive the connection.
pub async fn setup_file_db(busy_timeout: Duration) -> (TempDir, DatabaseConnection) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");

    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options
        .max_connections(8)
        .min_connections(1)
        .sqlx_logging(false)
        .map_sqlx_sqlite_opts(move |opts| {
            opts.journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(busy_timeout)
        });
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    (dir, db)
}

pub fn engine(db: &DatabaseConnection) -> LedgerEngine {
    LedgerEngine::new(
        db.clone(),
        LedgerConfig {
            max_retries: 3,
            retry_backoff_ms: 1,
        },
    )
}

/// Creates an account through the account store.
pub async fn create_account(
    db: &DatabaseConnection,
    card_number: &str,
    role: AccountRole,
) -> Account {
    AccountRepository::new(db.clone())
        .create_account(
            AccountId::new(),
            CreateAccountInput {
                name: format!("Holder {card_number}"),
                card_number: card_number.to_string(),
                email: None,
                role,
            },
        )
        .await
        .unwrap()
}

/// Creates a customer account and tops it up to `cents`.
pub async fn funded_customer(
    db: &DatabaseConnection,
    card_number: &str,
    cents: i64,
) -> Account {
    let account = create_account(db, card_number, AccountRole::Customer).await;
    if cents > 0 {
        engine(db)
            .credit(CreditRequest {
                account: AccountRef::Id(account.id),
                amount: Money::from_cents(cents),
                actor_id: AccountId::new(),
                description: Some("Opening balance".to_string()),
            })
            .await
            .unwrap();
    }
    AccountRepository::new(db.clone())
        .find_by_id(account.id)
        .await
        .unwrap()
}

pub async fn balance_of(db: &DatabaseConnection, id: AccountId) -> Money {
    AccountRepository::new(db.clone())
        .find_by_id(id)
        .await
        .unwrap()
        .balance
}
