//! `SeaORM` entity definitions.
//!
//! Identifiers are stored as their canonical UUID text and money as `BIGINT`
//! cents so the same schema works on PostgreSQL and SQLite.

pub mod accounts;
pub mod audit_log;
pub mod catalog_items;
pub mod transaction_items;
pub mod transactions;

pub mod prelude {
    //! Entity re-exports.

    pub use super::accounts::Entity as Accounts;
    pub use super::audit_log::Entity as AuditLog;
    pub use super::catalog_items::Entity as CatalogItems;
    pub use super::transaction_items::Entity as TransactionItems;
    pub use super::transactions::Entity as Transactions;
}
