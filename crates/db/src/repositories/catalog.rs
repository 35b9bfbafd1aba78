//! Catalog lookup.
//!
//! Only what checkout needs: items with a unique barcode and a price, and a
//! snapshot of that price taken when the item is scanned.

use chrono::{DateTime, Utc};
use kasse_core::audit::{AuditAction, NewAuditEntry};
use kasse_core::ledger::LineItemInput;
use kasse_shared::error::AppError;
use kasse_shared::types::{AccountId, CatalogItemId, Money};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

use super::audit::AuditRepository;
use crate::entities::catalog_items;
use crate::error::{StoreError, decode, is_unique_violation};

/// Error types for catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Barcode is already assigned to another item.
    #[error("Barcode '{0}' is already in use")]
    DuplicateBarcode(String),

    /// No item carries this barcode.
    #[error("No catalog item with barcode '{0}'")]
    UnknownBarcode(String),

    /// Input failed validation.
    #[error("Invalid catalog input: {0}")]
    Invalid(String),

    /// A stored row could not be decoded.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::DuplicateBarcode(_) => Self::Conflict(message),
            CatalogError::UnknownBarcode(_) => Self::NotFound(message),
            CatalogError::Invalid(_) => Self::Validation(message),
            CatalogError::Store(store) => store.into(),
            CatalogError::Database(_) => Self::Database(message),
        }
    }
}

/// A sellable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Item identifier.
    pub id: CatalogItemId,
    /// Unique barcode.
    pub barcode: String,
    /// Display name.
    pub name: String,
    /// Current unit price.
    pub price: Money,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<catalog_items::Model> for CatalogItem {
    type Error = StoreError;

    fn try_from(model: catalog_items::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: decode("catalog_items.id", &model.id)?,
            barcode: model.barcode,
            name: model.name,
            price: Money::from_cents(model.price_cents),
            created_at: model.created_at,
        })
    }
}

/// Catalog repository.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    db: DatabaseConnection,
}

impl CatalogRepository {
    /// Creates a new catalog repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a catalog item and records it in the audit trail.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is invalid, the barcode is taken, or
    /// the database operation fails.
    pub async fn create_item(
        &self,
        actor_id: AccountId,
        barcode: &str,
        name: &str,
        price: Money,
    ) -> Result<CatalogItem, CatalogError> {
        let barcode = barcode.trim();
        let name = name.trim();
        if barcode.is_empty() || name.is_empty() {
            return Err(CatalogError::Invalid(
                "barcode and name must not be empty".to_string(),
            ));
        }
        if price.is_negative() {
            return Err(CatalogError::Invalid(format!(
                "price {price} must not be negative"
            )));
        }

        let txn = self.db.begin().await?;

        let taken = catalog_items::Entity::find()
            .filter(catalog_items::Column::Barcode.eq(barcode))
            .count(&txn)
            .await?;
        if taken > 0 {
            return Err(CatalogError::DuplicateBarcode(barcode.to_string()));
        }

        let model = catalog_items::ActiveModel {
            id: Set(CatalogItemId::new().to_string()),
            barcode: Set(barcode.to_string()),
            name: Set(name.to_string()),
            price_cents: Set(price.cents()),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CatalogError::DuplicateBarcode(barcode.to_string())
            } else {
                CatalogError::Database(e)
            }
        })?;

        let item = CatalogItem::try_from(model)?;

        AuditRepository::append(
            &txn,
            NewAuditEntry::new(
                actor_id,
                AuditAction::CreateItem,
                format!(
                    "Created item {} '{}' ({}) at {}",
                    item.id, item.name, item.barcode, item.price
                ),
            ),
        )
        .await?;

        txn.commit().await?;
        Ok(item)
    }

    /// Finds an item by barcode.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_barcode(&self, barcode: &str) -> Result<Option<CatalogItem>, CatalogError> {
        let model = catalog_items::Entity::find()
            .filter(catalog_items::Column::Barcode.eq(barcode.trim()))
            .one(&self.db)
            .await?;

        Ok(model.map(CatalogItem::try_from).transpose()?)
    }

    /// Lists all items ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_items(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let rows = catalog_items::Entity::find()
            .order_by_asc(catalog_items::Column::Name)
            .all(&self.db)
            .await?;

        rows.into_iter()
            .map(|model| CatalogItem::try_from(model).map_err(CatalogError::from))
            .collect()
    }

    /// Scans an item: captures its current price into a cart entry.
    ///
    /// Later price changes do not affect the returned entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the barcode is unknown, the quantity is zero, or
    /// the query fails.
    pub async fn snapshot(
        &self,
        barcode: &str,
        quantity: u32,
    ) -> Result<LineItemInput, CatalogError> {
        if quantity == 0 {
            return Err(CatalogError::Invalid(
                "quantity must be at least 1".to_string(),
            ));
        }

        let item = self
            .find_by_barcode(barcode)
            .await?
            .ok_or_else(|| CatalogError::UnknownBarcode(barcode.trim().to_string()))?;

        Ok(LineItemInput {
            catalog_item_id: item.id,
            quantity,
            unit_price: item.price,
        })
    }

    /// Changes an item's price. Existing line items keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the item does not exist or the update fails.
    pub async fn update_price(
        &self,
        actor_id: AccountId,
        id: CatalogItemId,
        price: Money,
    ) -> Result<CatalogItem, CatalogError> {
        if price.is_negative() {
            return Err(CatalogError::Invalid(format!(
                "price {price} must not be negative"
            )));
        }

        let txn = self.db.begin().await?;

        let existing = catalog_items::Entity::find_by_id(id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| {
                CatalogError::Store(StoreError::NotFound {
                    entity: "Catalog item",
                    id: id.to_string(),
                })
            })?;
        let old_price = Money::from_cents(existing.price_cents);

        let mut active: catalog_items::ActiveModel = existing.into();
        active.price_cents = Set(price.cents());
        let model = active.update(&txn).await?;

        AuditRepository::append(
            &txn,
            NewAuditEntry::new(
                actor_id,
                AuditAction::EditItem,
                format!("Changed price of item {id} from {old_price} to {price}"),
            ),
        )
        .await?;

        txn.commit().await?;
        Ok(CatalogItem::try_from(model)?)
    }
}
