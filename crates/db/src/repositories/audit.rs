//! Audit trail repository.
//!
//! Append-only: there is no update or delete.

use chrono::{DateTime, Utc};
use kasse_core::audit::{AuditAction, NewAuditEntry};
use kasse_shared::types::{AccountId, AuditEntryId, PageRequest, PageResponse};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::audit_log;
use crate::error::{StoreError, decode};

/// A recorded audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Entry identifier.
    pub id: AuditEntryId,
    /// Who performed the action.
    pub actor_id: AccountId,
    /// What was done.
    pub action: AuditAction,
    /// Human-readable details.
    pub details: String,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<audit_log::Model> for AuditEntry {
    type Error = StoreError;

    fn try_from(model: audit_log::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: decode("audit_log.id", &model.id)?,
            actor_id: decode("audit_log.actor_id", &model.actor_id)?,
            action: decode("audit_log.action", &model.action)?,
            details: model.details,
            created_at: model.created_at,
        })
    }
}

/// Audit trail repository.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    db: DatabaseConnection,
}

impl AuditRepository {
    /// Creates a new audit repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Appends an entry using any connection, including an open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn append<C: ConnectionTrait>(
        conn: &C,
        entry: NewAuditEntry,
    ) -> Result<AuditEntryId, DbErr> {
        let id = AuditEntryId::new();

        audit_log::ActiveModel {
            id: Set(id.to_string()),
            actor_id: Set(entry.actor_id.to_string()),
            action: Set(entry.action.as_str().to_string()),
            details: Set(entry.details),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        Ok(id)
    }

    /// Lists entries, most recent first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored row cannot be decoded.
    pub async fn list_paged(
        &self,
        request: &PageRequest,
    ) -> Result<PageResponse<AuditEntry>, StoreError> {
        let total = audit_log::Entity::find().count(&self.db).await?;

        let rows = audit_log::Entity::find()
            .order_by_desc(audit_log::Column::CreatedAt)
            .order_by_desc(audit_log::Column::Id)
            .offset(request.offset())
            .limit(request.limit())
            .all(&self.db)
            .await?;

        let entries = rows
            .into_iter()
            .map(AuditEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResponse::new(
            entries,
            request.page,
            request.per_page,
            total,
        ))
    }

    /// Counts entries recorded for an action.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_by_action(&self, action: AuditAction) -> Result<u64, DbErr> {
        audit_log::Entity::find()
            .filter(audit_log::Column::Action.eq(action.as_str()))
            .count(&self.db)
            .await
    }
}
