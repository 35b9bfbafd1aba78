//! Bootstraps a Kasse database.
//!
//! Runs pending migrations and creates the default administrator when no
//! administrator exists yet. With `--demo` it also adds a few catalog items
//! and a funded customer for local development.
//!
//! Usage: cargo run --bin seeder [-- --demo]

use anyhow::Context;
use kasse_core::ledger::{AccountRef, CreditRequest};
use kasse_db::entities::accounts::AccountRole;
use kasse_db::migration::{Migrator, MigratorTrait};
use kasse_db::repositories::{AccountError, CreateAccountInput};
use kasse_db::{AccountRepository, CatalogRepository, LedgerEngine, connect_with};
use kasse_shared::AppConfig;
use kasse_shared::config::LoggingConfig;
use kasse_shared::types::{AccountId, Money};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Actor recorded for rows the seeder creates before any account exists.
const SYSTEM_ACTOR: AccountId = AccountId::from_uuid(Uuid::nil());

const DEMO_CUSTOMER_CARD: &str = "1000000001";

const DEMO_ITEMS: [(&str, &str, i64); 4] = [
    ("4006381333931", "Coffee", 180),
    ("4006381333948", "Tea", 120),
    ("4006381333955", "Croissant", 220),
    ("4006381333962", "Mineral water", 90),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    let db = connect_with(&config.database)
        .await
        .context("failed to connect to database")?;
    Migrator::up(&db, None)
        .await
        .context("failed to run migrations")?;
    info!("Database schema is up to date");

    let accounts = AccountRepository::new(db.clone());
    let admin_id = seed_admin(&accounts, &config).await?;

    if std::env::args().any(|arg| arg == "--demo") {
        let ledger = LedgerEngine::new(db.clone(), config.ledger.clone());
        seed_demo(&db, &accounts, &ledger, admin_id).await?;
    }

    info!("Seeding complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Returns the identifier of the administrator used as actor for demo data.
async fn seed_admin(accounts: &AccountRepository, config: &AppConfig) -> anyhow::Result<AccountId> {
    let card = &config.seed.admin_card_number;

    if accounts.has_admin().await? {
        info!("Administrator already present, skipping");
        return Ok(match accounts.find_by_card_number(card).await {
            Ok(admin) => admin.id,
            Err(_) => SYSTEM_ACTOR,
        });
    }

    let admin = accounts
        .create_account(
            SYSTEM_ACTOR,
            CreateAccountInput {
                name: config.seed.admin_name.clone(),
                card_number: card.clone(),
                email: None,
                role: AccountRole::Admin,
            },
        )
        .await
        .context("failed to create administrator")?;

    info!(account_id = %admin.id, card_number = %admin.card_number, "Created administrator");
    Ok(admin.id)
}

async fn seed_demo(
    db: &DatabaseConnection,
    accounts: &AccountRepository,
    ledger: &LedgerEngine,
    admin_id: AccountId,
) -> anyhow::Result<()> {
    let catalog = CatalogRepository::new(db.clone());
    let mut inserted = 0;
    for (barcode, name, cents) in DEMO_ITEMS {
        if catalog.find_by_barcode(barcode).await?.is_some() {
            continue;
        }
        catalog
            .create_item(admin_id, barcode, name, Money::from_cents(cents))
            .await?;
        inserted += 1;
    }
    info!(inserted, "Seeded demo catalog items");

    let customer = accounts
        .create_account(
            admin_id,
            CreateAccountInput {
                name: "Demo Customer".to_string(),
                card_number: DEMO_CUSTOMER_CARD.to_string(),
                email: None,
                role: AccountRole::Customer,
            },
        )
        .await;

    match customer {
        Ok(customer) => {
            let receipt = ledger
                .credit(CreditRequest {
                    account: AccountRef::Id(customer.id),
                    amount: Money::from_cents(2000),
                    actor_id: admin_id,
                    description: Some("Demo opening balance".to_string()),
                })
                .await?;
            info!(
                account_id = %customer.id,
                balance = %receipt.new_balance,
                "Created demo customer"
            );
        }
        Err(AccountError::DuplicateCardNumber(_)) => {
            warn!(card_number = DEMO_CUSTOMER_CARD, "Demo customer already exists, skipping");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
