mod common;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use mpa_public_api::database::Store;
use mpa_public_api::user_management::AccountDto;
use mpa_public_api::{DataTransferObject, Predicate, PublicApi};

// Runs against DATABASE_URL/DATABASE_NAME on a throwaway table; skipped without DATABASE_URL.
#[tokio::test]
async fn postgres_store_round_trip() -> Result<()> {
    let Some((store, table)) = common::pg_accounts().await? else {
        return Ok(());
    };
    let result = exercise(Arc::clone(&store) as Arc<dyn Store>).await;
    common::drop_table(&store, &table).await?;
    result
}

async fn exercise(store: Arc<dyn Store>) -> Result<()> {
    let accounts = PublicApi::<AccountDto>::new(store);

    let ada = accounts.create_strict(common::account("ada@x.com", "guest")).await?;
    let ada_id = ada.id().context("id")?;
    assert!(!ada.is_administrator());
    assert!(ada.as_dto().str("created_at").is_some());

    assert!(accounts.create(common::account("ada@x.com", "guest")).await?.is_none());
    assert!(accounts.create(json!({ "email": "x@y.com" })).await?.is_none());

    let promoted = accounts.update_strict(ada_id, json!({ "administrator": true })).await?;
    assert!(promoted.is_administrator());
    assert_eq!(accounts.count_where(&Predicate::by("administrator", true)).await?, 1);

    // Validation runs on the merged row; update_by does not validate at all
    assert!(accounts.update(ada_id, json!({ "last_name": null })).await?.is_none());
    assert_eq!(accounts.update_by(&Predicate::by("id", ada_id), json!({ "last_name": null })).await?, 1);
    let cleared = accounts.find(ada_id).await?.context("ada")?;
    assert_eq!(cleared.last_name(), None);
    assert_eq!(cleared.full_name(), "ada");

    accounts.create_strict(common::account("bob@x.com", "guest")).await?;
    accounts.upsert(&Predicate::by("email", "cid@x.com"), json!({ "first_name": "cid", "last_name": "C" })).await?;
    accounts.upsert(&Predicate::by("email", "cid@x.com"), json!({ "role": "member" })).await?;

    assert_eq!(accounts.count().await?, 3);
    assert_eq!(accounts.pluck(&["email"]).await?, vec![json!("ada@x.com"), json!("bob@x.com"), json!("cid@x.com")]);
    assert_eq!(accounts.last().await?.and_then(|a| a.role().map(str::to_string)), Some("member".to_string()));

    let by_query = accounts.query(|q| q.filter(json!({ "email": { "$like": "%b%" } }))).await?;
    assert_eq!(by_query.len(), 1);

    assert!(accounts.find(ada_id + 1000).await?.is_none());
    assert!(accounts.delete_strict(ada_id).await?);
    assert!(!accounts.delete(ada_id).await?);
    assert_eq!(accounts.delete_all().await?, 2);
    Ok(())
}
