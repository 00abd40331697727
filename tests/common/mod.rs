#![allow(dead_code)]

use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use serde_json::{json, Value};

use mpa_public_api::database::{DatabaseManager, MemoryStore, Model, PgStore, Store, Validations};
use mpa_public_api::documents::DocumentsApi;
use mpa_public_api::services::DocumentService;
use mpa_public_api::user_management::AccountsApi;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn accounts() -> AccountsApi {
    init_tracing();
    AccountsApi::in_memory()
}

pub fn service() -> DocumentService {
    init_tracing();
    DocumentService::new(AccountsApi::in_memory(), DocumentsApi::in_memory())
}

/// Valid account attributes for `email` with the given role
pub fn account(email: &str, role: &str) -> Value {
    let first = email.split('@').next().unwrap_or(email);
    json!({
        "email": email,
        "first_name": first,
        "last_name": "Tester",
        "role": role,
    })
}

/// Ten accounts: four guests, the rest members
pub async fn seed_accounts(api: &AccountsApi) -> Result<()> {
    for i in 0..10 {
        let role = if i % 3 == 0 { "guest" } else { "member" };
        api.create_strict(account(&format!("user{}@x.com", i), role))
            .await
            .with_context(|| format!("seeding user{}", i))?;
    }
    Ok(())
}

/// A `people` table with no declared columns, for arbitrary attribute sets
pub fn people_store() -> Arc<dyn Store> {
    init_tracing();
    Arc::new(MemoryStore::new(
        Model::new("people").validations(Validations::new().presence_of("name")),
    ))
}

/// Postgres store on a fresh uniquely named accounts table, or `None` when
/// `DATABASE_URL` is not set. Drop the table with `drop_table`.
pub async fn pg_accounts() -> Result<Option<(Arc<PgStore>, String)>> {
    init_tracing();
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping postgres test");
        return Ok(None);
    }
    let pool = DatabaseManager::main_pool().await.context("connecting to main database")?;
    let table = format!("accounts_{}", uuid::Uuid::new_v4().simple());
    let ddl = format!(
        "CREATE TABLE \"{}\" (
            id BIGSERIAL PRIMARY KEY,
            email TEXT,
            first_name TEXT,
            last_name TEXT,
            role TEXT,
            administrator BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        table
    );
    sqlx::query(&ddl).execute(&pool).await.context("creating test table")?;

    let model = Model::new(table.clone())
        .columns(["email", "first_name", "last_name", "role", "administrator"])
        .validations(
            Validations::new()
                .presence_of("email")
                .presence_of("first_name")
                .presence_of("last_name")
                .uniqueness_of("email"),
        );
    Ok(Some((Arc::new(PgStore::new(model, pool)), table)))
}

pub async fn drop_table(store: &PgStore, table: &str) -> Result<()> {
    sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
        .execute(store.pool())
        .await?;
    Ok(())
}
