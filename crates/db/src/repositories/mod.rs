//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod account;
pub mod audit;
pub mod catalog;
pub mod transaction_log;

pub use account::{
    Account, AccountError, AccountRepository, CreateAccountInput, UpdateAccountInput,
};
pub use audit::{AuditEntry, AuditRepository};
pub use catalog::{CatalogError, CatalogItem, CatalogRepository};
pub use transaction_log::{
    LineItemRecord, NewTransaction, ProductSales, RevenueSummary, SalesOrder,
    TransactionLogRepository, TransactionRecord,
};
