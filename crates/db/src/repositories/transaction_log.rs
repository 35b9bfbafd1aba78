//! Transaction log repository.
//!
//! Append-only record of every balance-affecting event. Rows are written
//! inside the ledger engine's unit of work and never updated or deleted.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use kasse_core::ledger::{LineItemInput, TransactionKind};
use kasse_shared::types::{AccountId, CatalogItemId, LineItemId, Money, TransactionId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::{catalog_items, transaction_items, transactions};
use crate::error::{StoreError, decode};

/// A transaction about to be appended.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Pre-allocated identifier.
    pub id: TransactionId,
    /// Account whose balance changed.
    pub account_id: AccountId,
    /// Actor who performed the operation.
    pub actor_id: AccountId,
    /// Kind of event.
    pub kind: TransactionKind,
    /// Signed amount applied.
    pub amount: Money,
    /// Balance after the operation.
    pub balance_after: Money,
    /// Free-text description.
    pub description: Option<String>,
}

/// A recorded line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemRecord {
    /// Line item identifier.
    pub id: LineItemId,
    /// Item sold.
    pub catalog_item_id: CatalogItemId,
    /// Units sold.
    pub quantity: u32,
    /// Price snapshot at scan time.
    pub unit_price: Money,
    /// `quantity × unit_price`.
    pub line_total: Money,
}

/// A recorded transaction with its line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Transaction identifier.
    pub id: TransactionId,
    /// Account whose balance changed.
    pub account_id: AccountId,
    /// Actor who performed the operation.
    pub actor_id: AccountId,
    /// Kind of event.
    pub kind: TransactionKind,
    /// Signed amount applied.
    pub amount: Money,
    /// Balance after the operation.
    pub balance_after: Money,
    /// Free-text description.
    pub description: Option<String>,
    /// When the transaction was recorded.
    pub created_at: DateTime<Utc>,
    /// Line items in scan order.
    pub items: Vec<LineItemRecord>,
}

impl TransactionRecord {
    fn from_model(
        model: transactions::Model,
        items: Vec<LineItemRecord>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            id: decode("transactions.id", &model.id)?,
            account_id: decode("transactions.account_id", &model.account_id)?,
            actor_id: decode("transactions.actor_id", &model.actor_id)?,
            kind: decode("transactions.kind", &model.kind)?,
            amount: Money::from_cents(model.amount_cents),
            balance_after: Money::from_cents(model.balance_after_cents),
            description: model.description,
            created_at: model.created_at,
            items,
        })
    }
}

impl TryFrom<transaction_items::Model> for LineItemRecord {
    type Error = StoreError;

    fn try_from(model: transaction_items::Model) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(model.quantity).map_err(|_| StoreError::Corrupt {
            column: "transaction_items.quantity",
            value: model.quantity.to_string(),
        })?;

        Ok(Self {
            id: decode("transaction_items.id", &model.id)?,
            catalog_item_id: decode("transaction_items.catalog_item_id", &model.catalog_item_id)?,
            quantity,
            unit_price: Money::from_cents(model.unit_price_cents),
            line_total: Money::from_cents(model.line_total_cents),
        })
    }
}

/// Checkout revenue over the reporting windows of the stats screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueSummary {
    /// Since midnight UTC.
    pub today: Money,
    /// Since the first of the month, UTC.
    pub this_month: Money,
    /// Since the first transaction.
    pub all_time: Money,
}

/// Ranking of a product sales report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalesOrder {
    /// Most units sold first.
    BestSelling,
    /// Fewest units sold first, including items never sold.
    WorstSelling,
}

/// Units sold and revenue for one catalog item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSales {
    /// Catalog item.
    pub catalog_item_id: CatalogItemId,
    /// Current display name.
    pub name: String,
    /// Units sold over all checkouts.
    pub quantity: u64,
    /// Sum of line totals at the prices captured at scan time.
    pub revenue: Money,
}

/// Transaction log repository.
#[derive(Debug, Clone)]
pub struct TransactionLogRepository {
    db: DatabaseConnection,
}

impl TransactionLogRepository {
    /// Creates a new transaction log repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Appends a transaction and its line items inside a unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if an insert fails or a line total overflows.
    pub async fn append(
        txn: &DatabaseTransaction,
        transaction: &NewTransaction,
        items: &[LineItemInput],
    ) -> Result<TransactionId, DbErr> {
        transactions::ActiveModel {
            id: Set(transaction.id.to_string()),
            account_id: Set(transaction.account_id.to_string()),
            actor_id: Set(transaction.actor_id.to_string()),
            kind: Set(transaction.kind.as_str().to_string()),
            amount_cents: Set(transaction.amount.cents()),
            balance_after_cents: Set(transaction.balance_after.cents()),
            description: Set(transaction.description.clone()),
            created_at: Set(Utc::now()),
        }
        .insert(txn)
        .await?;

        if items.is_empty() {
            return Ok(transaction.id);
        }

        let rows = items
            .iter()
            .zip(0_i64..)
            .map(|(item, position)| {
                let line_total = item
                    .line_total()
                    .ok_or_else(|| DbErr::Custom("line total overflows".to_string()))?;
                Ok(transaction_items::ActiveModel {
                    id: Set(LineItemId::new().to_string()),
                    transaction_id: Set(transaction.id.to_string()),
                    position: Set(position),
                    catalog_item_id: Set(item.catalog_item_id.to_string()),
                    quantity: Set(i64::from(item.quantity)),
                    unit_price_cents: Set(item.unit_price.cents()),
                    line_total_cents: Set(line_total.cents()),
                })
            })
            .collect::<Result<Vec<_>, DbErr>>()?;

        transaction_items::Entity::insert_many(rows)
            .exec_without_returning(txn)
            .await?;

        Ok(transaction.id)
    }

    /// Finds a transaction with its line items.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such transaction.
    pub async fn find(&self, id: TransactionId) -> Result<TransactionRecord, StoreError> {
        let model = transactions::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "Transaction",
                id: id.to_string(),
            })?;

        let mut items = self.load_items(&[model.id.clone()]).await?;
        let lines = items.remove(&model.id).unwrap_or_default();
        TransactionRecord::from_model(model, lines)
    }

    /// Lists an account's transactions, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn list_for_account(
        &self,
        account_id: AccountId,
        limit: u64,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let models = transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(account_id.to_string()))
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
        let mut items = self.load_items(&ids).await?;

        models
            .into_iter()
            .map(|model| {
                let lines = items.remove(&model.id).unwrap_or_default();
                TransactionRecord::from_model(model, lines)
            })
            .collect()
    }

    /// Checkout revenue recorded at or after `since`.
    ///
    /// Only debits count. Top-ups and adjustments move money between the
    /// till and the accounts but are not sales.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the sum does not fit.
    pub async fn revenue_since(&self, since: DateTime<Utc>) -> Result<Money, StoreError> {
        self.revenue(Some(since)).await
    }

    /// Revenue for today, this month and all time, relative to `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a sum does not fit.
    pub async fn revenue_summary(&self, now: DateTime<Utc>) -> Result<RevenueSummary, StoreError> {
        let today = now.date_naive();
        let month = today.with_day(1).unwrap_or(today);

        Ok(RevenueSummary {
            today: self.revenue_since(today.and_time(NaiveTime::MIN).and_utc()).await?,
            this_month: self.revenue_since(month.and_time(NaiveTime::MIN).and_utc()).await?,
            all_time: self.revenue(None).await?,
        })
    }

    async fn revenue(&self, since: Option<DateTime<Utc>>) -> Result<Money, StoreError> {
        let mut query = transactions::Entity::find()
            .select_only()
            .column(transactions::Column::AmountCents)
            .filter(transactions::Column::Kind.eq(TransactionKind::Debit.as_str()));
        if let Some(since) = since {
            query = query.filter(transactions::Column::CreatedAt.gte(since));
        }
        let amounts: Vec<i64> = query.into_tuple().all(&self.db).await?;

        // Debits are stored negative
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, cents| acc.checked_sub(Money::from_cents(cents)))
            .ok_or(StoreError::Overflow("revenue"))
    }

    /// Ranks catalog items by units sold and returns the first `limit`.
    ///
    /// Items that were never sold are included with zero units. Ties are
    /// broken by name.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails, a row cannot be decoded or a sum
    /// does not fit.
    pub async fn product_sales(
        &self,
        order: SalesOrder,
        limit: usize,
    ) -> Result<Vec<ProductSales>, StoreError> {
        let items = catalog_items::Entity::find().all(&self.db).await?;
        let lines: Vec<(String, i64, i64)> = transaction_items::Entity::find()
            .select_only()
            .column(transaction_items::Column::CatalogItemId)
            .column(transaction_items::Column::Quantity)
            .column(transaction_items::Column::LineTotalCents)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut totals: HashMap<String, (u64, Money)> = HashMap::new();
        for (catalog_item_id, quantity, line_total_cents) in lines {
            let quantity = u64::try_from(quantity).map_err(|_| StoreError::Corrupt {
                column: "transaction_items.quantity",
                value: quantity.to_string(),
            })?;
            let (units, revenue) = totals.entry(catalog_item_id).or_insert((0, Money::ZERO));
            *units = units
                .checked_add(quantity)
                .ok_or(StoreError::Overflow("units sold"))?;
            *revenue = revenue
                .checked_add(Money::from_cents(line_total_cents))
                .ok_or(StoreError::Overflow("product revenue"))?;
        }

        let mut sales = items
            .into_iter()
            .map(|item| {
                let (quantity, revenue) = totals.get(&item.id).copied().unwrap_or((0, Money::ZERO));
                Ok(ProductSales {
                    catalog_item_id: decode("catalog_items.id", &item.id)?,
                    name: item.name,
                    quantity,
                    revenue,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        match order {
            SalesOrder::BestSelling => {
                sales.sort_by(|a, b| {
                    (Reverse(a.quantity), &a.name).cmp(&(Reverse(b.quantity), &b.name))
                });
            }
            SalesOrder::WorstSelling => {
                sales.sort_by(|a, b| (a.quantity, &a.name).cmp(&(b.quantity, &b.name)));
            }
        }
        sales.truncate(limit);
        Ok(sales)
    }

    async fn load_items(
        &self,
        transaction_ids: &[String],
    ) -> Result<HashMap<String, Vec<LineItemRecord>>, StoreError> {
        let mut grouped: HashMap<String, Vec<LineItemRecord>> = HashMap::new();
        if transaction_ids.is_empty() {
            return Ok(grouped);
        }

        let rows = transaction_items::Entity::find()
            .filter(transaction_items::Column::TransactionId.is_in(transaction_ids.iter().cloned()))
            .order_by_asc(transaction_items::Column::TransactionId)
            .order_by_asc(transaction_items::Column::Position)
            .all(&self.db)
            .await?;

        for row in rows {
            let transaction_id = row.transaction_id.clone();
            grouped
                .entry(transaction_id)
                .or_default()
                .push(LineItemRecord::try_from(row)?);
        }
        Ok(grouped)
    }
}
