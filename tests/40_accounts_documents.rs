mod common;

use anyhow::{Context, Result};
use serde_json::json;

use mpa_public_api::{DataTransferObject, Predicate};

#[tokio::test]
async fn documents_reach_owners_only_through_gateways() -> Result<()> {
    let service = common::service();
    let accounts = service.accounts();
    let documents = service.documents();

    let ada = accounts.create_strict(common::account("ada@x.com", "member")).await?;
    let ada_id = ada.id().context("ada id")?;
    let body = "Analytical engine notes. ".repeat(10);
    let doc = documents
        .create_strict(json!({ "title": "Engine", "body": body, "account_id": ada_id, "state": "draft" }))
        .await?;

    let excerpt = doc.excerpt().context("excerpt")?;
    assert!(excerpt.ends_with("..."), "excerpt: {}", excerpt);
    assert!(excerpt.starts_with("Analytical engine notes."));

    let joined = service
        .document_with_owner(doc.id().context("doc id")?)
        .await?
        .context("document")?;
    assert_eq!(joined.owner.as_ref().map(|o| o.full_name()), Some("ada Tester"));

    let serialized = serde_json::to_value(&joined)?;
    assert_eq!(serialized["owner"]["email"], json!("ada@x.com"));
    assert_eq!(serialized["document"]["state"], json!("draft"));
    Ok(())
}

#[tokio::test]
async fn documents_require_title_and_owner() -> Result<()> {
    let service = common::service();
    let documents = service.documents();

    assert!(documents.create(json!({ "body": "untitled" })).await?.is_none());
    let err = documents.create_strict(json!({ "title": " " })).await.unwrap_err();
    let errors = err.validation_errors().context("validation errors")?;
    assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["account_id", "title"]);
    Ok(())
}

#[tokio::test]
async fn state_changes_through_update_by() -> Result<()> {
    let service = common::service();
    let documents = service.documents();
    for title in ["a", "b", "c"] {
        documents
            .create_strict(json!({ "title": title, "account_id": 1, "state": "draft" }))
            .await?;
    }
    documents.update(2, json!({ "state": "published" })).await?;

    let archived = documents
        .update_by(&Predicate::by("state", "draft"), json!({ "state": "archived" }))
        .await?;
    assert_eq!(archived, 2);
    assert_eq!(documents.pluck(&["state"]).await?, vec![json!("archived"), json!("published"), json!("archived")]);
    assert_eq!(documents.for_account(1).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn unknown_email_has_no_documents() -> Result<()> {
    let service = common::service();
    assert!(service.documents_for_owner_email("ghost@x.com").await?.is_empty());
    assert!(service.accounts().find_by_email("ghost@x.com").await?.is_none());
    Ok(())
}
