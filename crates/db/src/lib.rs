//! Database layer with `SeaORM` entities, repositories and the ledger engine.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repositories for accounts, catalog, transaction log and audit trail
//! - The ledger engine that ties them into atomic operations
//! - Database migrations

pub mod entities;
pub mod error;
pub mod ledger;
pub mod migration;
pub mod repositories;

pub use error::StoreError;
pub use ledger::LedgerEngine;
pub use repositories::{
    AccountRepository, AuditRepository, CatalogRepository, TransactionLogRepository,
};

use kasse_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection from configuration.
///
/// An in-memory SQLite database lives and dies with its connection, so the
/// pool is pinned to a single connection for such URLs.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());

    if is_in_memory_sqlite(&config.url) {
        options.max_connections(1).min_connections(1);
    } else {
        options
            .max_connections(config.max_connections)
            .min_connections(config.min_connections);
    }
    options.sqlx_logging(false);

    Database::connect(options).await
}

fn is_in_memory_sqlite(url: &str) -> bool {
    url.starts_with("sqlite:") && (url.contains(":memory:") || url.contains("mode=memory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory_sqlite("sqlite::memory:"));
        assert!(is_in_memory_sqlite("sqlite:file:kasse?mode=memory&cache=shared"));
        assert!(!is_in_memory_sqlite("sqlite://kasse.db?mode=rwc"));
        assert!(!is_in_memory_sqlite("postgres://localhost/kasse"));
    }
}
