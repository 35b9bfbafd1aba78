//! Account store, catalog and audit trail integration tests.

mod common;

use kasse_core::audit::AuditAction;
use kasse_core::ledger::{AccountRef, LedgerError};
use kasse_db::entities::accounts::AccountRole;
use kasse_db::repositories::{
    AccountError, AccountRepository, AuditRepository, CatalogError, CatalogRepository,
    CreateAccountInput, UpdateAccountInput,
};
use kasse_shared::types::{AccountId, Money, PageRequest};
use sea_orm::TransactionTrait;

use common::{create_account, funded_customer, setup_db};

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn test_create_account_starts_at_zero() {
    let db = setup_db().await;
    let repo = AccountRepository::new(db.clone());

    let account = repo
        .create_account(
            AccountId::new(),
            CreateAccountInput {
                name: "  Ada Lovelace ".to_string(),
                card_number: " 3001 ".to_string(),
                email: Some("ada@example.com".to_string()),
                role: AccountRole::Customer,
            },
        )
        .await
        .unwrap();

    assert_eq!(account.name, "Ada Lovelace");
    assert_eq!(account.card_number, "3001");
    assert_eq!(account.balance, Money::ZERO);
    assert_eq!(account.version, 0);

    let found = repo.find_by_card_number(" 3001").await.unwrap();
    assert_eq!(found.id, account.id);
    assert_eq!(found.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn test_duplicate_card_number_is_rejected() {
    let db = setup_db().await;
    let repo = AccountRepository::new(db.clone());
    create_account(&db, "3002", AccountRole::Customer).await;
    let other = create_account(&db, "3003", AccountRole::Customer).await;

    let err = repo
        .create_account(
            AccountId::new(),
            CreateAccountInput {
                name: "Twin".to_string(),
                card_number: "3002".to_string(),
                email: None,
                role: AccountRole::Customer,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::DuplicateCardNumber(ref c) if c == "3002"));

    let err = repo
        .update_account(
            AccountId::new(),
            other.id,
            UpdateAccountInput {
                card_number: Some("3002".to_string()),
                ..UpdateAccountInput::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::DuplicateCardNumber(_)));
    assert_eq!(repo.find_by_id(other.id).await.unwrap().card_number, "3003");
}

#[tokio::test]
async fn test_update_account_is_audited_and_keeps_balance() {
    let db = setup_db().await;
    let repo = AccountRepository::new(db.clone());
    let account = funded_customer(&db, "3004", 1500).await;

    let updated = repo
        .update_account(
            AccountId::new(),
            account.id,
            UpdateAccountInput {
                name: Some("Renamed".to_string()),
                role: Some(AccountRole::Cashier),
                ..UpdateAccountInput::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.role, AccountRole::Cashier);
    assert_eq!(updated.balance, Money::from_cents(1500));

    let audit = AuditRepository::new(db.clone());
    assert_eq!(audit.count_by_action(AuditAction::EditAccount).await.unwrap(), 1);
}

#[tokio::test]
async fn test_update_unknown_account() {
    let db = setup_db().await;
    let err = AccountRepository::new(db.clone())
        .update_account(AccountId::new(), AccountId::new(), UpdateAccountInput::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::AccountNotFound(AccountRef::Id(_))));
}

#[tokio::test]
async fn test_delete_refused_with_history() {
    let db = setup_db().await;
    let repo = AccountRepository::new(db.clone());
    let account = funded_customer(&db, "3005", 100).await;

    let err = repo
        .delete_account(AccountId::new(), account.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::HasTransactions(1)));
    assert!(repo.find_by_id(account.id).await.is_ok());
}

#[tokio::test]
async fn test_delete_account_without_history() {
    let db = setup_db().await;
    let repo = AccountRepository::new(db.clone());
    let account = create_account(&db, "3006", AccountRole::Customer).await;

    repo.delete_account(AccountId::new(), account.id)
        .await
        .unwrap();

    let err = repo.find_by_id(account.id).await.unwrap_err();
    assert!(matches!(err, AccountError::AccountNotFound(_)));
    let err = repo.find_by_card_number("3006").await.unwrap_err();
    assert!(matches!(err, AccountError::AccountNotFound(AccountRef::Card(_))));

    let audit = AuditRepository::new(db.clone());
    assert_eq!(audit.count_by_action(AuditAction::DeleteAccount).await.unwrap(), 1);
}

#[tokio::test]
async fn test_list_accounts_and_system_balance() {
    let db = setup_db().await;
    let repo = AccountRepository::new(db.clone());
    assert!(!repo.has_admin().await.unwrap());

    funded_customer(&db, "3007", 1200).await;
    funded_customer(&db, "3008", 345).await;
    create_account(&db, "3009", AccountRole::Admin).await;

    let accounts = repo.list_accounts().await.unwrap();
    let names: Vec<&str> = accounts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["Holder 3007", "Holder 3008", "Holder 3009"]);

    assert!(repo.has_admin().await.unwrap());
    assert_eq!(repo.system_balance().await.unwrap(), Money::from_cents(1545));
}

#[tokio::test]
async fn test_stale_version_is_a_concurrent_modification() {
    let db = setup_db().await;
    let repo = AccountRepository::new(db.clone());
    let stale = create_account(&db, "3015", AccountRole::Customer).await;
    let fresh = repo.find_by_id(stale.id).await.unwrap();

    // Bump the version behind the stale snapshot's back
    let txn = db.begin().await.unwrap();
    let change = AccountRepository::apply_balance_delta(&txn, &fresh, Money::from_cents(100))
        .await
        .unwrap();
    assert_eq!(change.new, Money::from_cents(100));
    txn.commit().await.unwrap();

    let txn = db.begin().await.unwrap();
    let err = AccountRepository::apply_balance_delta(&txn, &stale, Money::from_cents(100))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::ConcurrentModification { attempts: 1, .. }
    ));
    assert!(err.is_retryable());
    txn.rollback().await.unwrap();

    let current = repo.find_by_id(stale.id).await.unwrap();
    assert_eq!(current.balance, Money::from_cents(100));
    assert_eq!(current.version, 1);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_catalog_rejects_duplicate_barcode() {
    let db = setup_db().await;
    let catalog = CatalogRepository::new(db.clone());
    let admin = AccountId::new();

    catalog
        .create_item(admin, "5000001", "Tea", Money::from_cents(250))
        .await
        .unwrap();
    let err = catalog
        .create_item(admin, " 5000001 ", "Other tea", Money::from_cents(300))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateBarcode(ref b) if b == "5000001"));

    let err = catalog
        .create_item(admin, "5000002", "Refund", Money::from_cents(-1))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Invalid(_)));

    assert_eq!(catalog.list_items().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_snapshot_captures_current_price() {
    let db = setup_db().await;
    let catalog = CatalogRepository::new(db.clone());
    let admin = AccountId::new();
    let item = catalog
        .create_item(admin, "5000003", "Bagel", Money::from_cents(180))
        .await
        .unwrap();

    let before = catalog.snapshot("5000003", 3).await.unwrap();
    catalog
        .update_price(admin, item.id, Money::from_cents(200))
        .await
        .unwrap();
    let after = catalog.snapshot("5000003", 3).await.unwrap();

    assert_eq!(before.catalog_item_id, item.id);
    assert_eq!(before.unit_price, Money::from_cents(180));
    assert_eq!(after.unit_price, Money::from_cents(200));
    assert_eq!(after.line_total(), Some(Money::from_cents(600)));

    assert!(matches!(
        catalog.snapshot("5000003", 0).await.unwrap_err(),
        CatalogError::Invalid(_)
    ));
    assert!(matches!(
        catalog.snapshot("9999999", 1).await.unwrap_err(),
        CatalogError::UnknownBarcode(_)
    ));

    let audit = AuditRepository::new(db.clone());
    assert_eq!(audit.count_by_action(AuditAction::CreateItem).await.unwrap(), 1);
    assert_eq!(audit.count_by_action(AuditAction::EditItem).await.unwrap(), 1);
}

// ============================================================================
// Audit trail
// ============================================================================

#[tokio::test]
async fn test_audit_pages_most_recent_first() {
    let db = setup_db().await;
    let admin = create_account(&db, "3010", AccountRole::Admin).await;
    for card in ["3011", "3012", "3013", "3014"] {
        create_account(&db, card, AccountRole::Customer).await;
    }

    let audit = AuditRepository::new(db.clone());
    let first = audit.list_paged(&PageRequest::new(1, 2)).await.unwrap();
    assert_eq!(first.meta.total, 5);
    assert_eq!(first.meta.total_pages, 3);
    assert_eq!(first.data.len(), 2);
    assert!(first.data[0].details.contains("3014"));
    assert!(first.data[1].details.contains("3013"));

    let last = audit.list_paged(&PageRequest::new(3, 2)).await.unwrap();
    assert_eq!(last.data.len(), 1);
    assert_eq!(last.data[0].action, AuditAction::CreateAccount);
    assert!(last.data[0].details.contains(&admin.id.to_string()));

    let beyond = audit.list_paged(&PageRequest::new(4, 2)).await.unwrap();
    assert!(beyond.data.is_empty());
    assert_eq!(beyond.meta.total, 5);
}
