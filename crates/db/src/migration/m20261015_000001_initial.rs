//! Initial schema: accounts, catalog, transaction log and audit trail.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Accounts::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::CardNumber).string().not_null())
                    .col(ColumnDef::new(Accounts::Email).string().null())
                    .col(ColumnDef::new(Accounts::Role).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Accounts::BalanceCents)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Accounts::BalanceCents).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Accounts::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Card lookup for checkout and self-service top-up
        manager
            .create_index(
                Index::create()
                    .name("idx_accounts_card_number")
                    .table(Accounts::Table)
                    .col(Accounts::CardNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CatalogItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CatalogItems::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CatalogItems::Barcode).string().not_null())
                    .col(ColumnDef::new(CatalogItems::Name).string().not_null())
                    .col(
                        ColumnDef::new(CatalogItems::PriceCents)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(CatalogItems::PriceCents).gte(0)),
                    )
                    .col(
                        ColumnDef::new(CatalogItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_catalog_items_barcode")
                    .table(CatalogItems::Table)
                    .col(CatalogItems::Barcode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::AccountId).string().not_null())
                    .col(ColumnDef::new(Transactions::ActorId).string().not_null())
                    .col(ColumnDef::new(Transactions::Kind).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::BalanceAfterCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Description).string().null())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_account")
                            .from(Transactions::Table, Transactions::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Account history, most recent first
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_account_created")
                    .table(Transactions::Table)
                    .col(Transactions::AccountId)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TransactionItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransactionItems::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TransactionItems::TransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionItems::Position)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionItems::CatalogItemId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionItems::Quantity)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(TransactionItems::Quantity).gte(1)),
                    )
                    .col(
                        ColumnDef::new(TransactionItems::UnitPriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionItems::LineTotalCents)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_items_transaction")
                            .from(TransactionItems::Table, TransactionItems::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_items_catalog_item")
                            .from(TransactionItems::Table, TransactionItems::CatalogItemId)
                            .to(CatalogItems::Table, CatalogItems::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transaction_items_transaction")
                    .table(TransactionItems::Table)
                    .col(TransactionItems::TransactionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuditLog::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AuditLog::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(AuditLog::ActorId).string().not_null())
                    .col(ColumnDef::new(AuditLog::Action).string_len(32).not_null())
                    .col(ColumnDef::new(AuditLog::Details).text().not_null())
                    .col(
                        ColumnDef::new(AuditLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_log_created")
                    .table(AuditLog::Table)
                    .col(AuditLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TransactionItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CatalogItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    Name,
    CardNumber,
    Email,
    Role,
    BalanceCents,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CatalogItems {
    Table,
    Id,
    Barcode,
    Name,
    PriceCents,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    AccountId,
    ActorId,
    Kind,
    AmountCents,
    BalanceAfterCents,
    Description,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TransactionItems {
    Table,
    Id,
    TransactionId,
    Position,
    CatalogItemId,
    Quantity,
    UnitPriceCents,
    LineTotalCents,
}

#[derive(DeriveIden)]
enum AuditLog {
    Table,
    Id,
    ActorId,
    Action,
    Details,
    CreatedAt,
}
