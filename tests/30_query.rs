mod common;

use anyhow::Result;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use mpa_public_api::database::Query;
use mpa_public_api::dto::{Dto, DtoSchema};
use mpa_public_api::filter::SortDirection;
use mpa_public_api::{DataTransferObject, GatewayError, Predicate, PublicApi};

static PERSON: Lazy<DtoSchema> = Lazy::new(|| {
    DtoSchema::new("PersonDto")
        .attribute("id")
        .attribute("name")
        .attribute("age")
        .attribute_with("city", |v| Ok(if v.is_null() { json!("unknown") } else { v }))
});

#[derive(Debug, Clone, PartialEq)]
struct PersonDto(Dto);

impl DataTransferObject for PersonDto {
    fn schema() -> &'static DtoSchema {
        &PERSON
    }

    fn from_dto(dto: Dto) -> Self {
        Self(dto)
    }

    fn as_dto(&self) -> &Dto {
        &self.0
    }
}

impl PersonDto {
    fn name(&self) -> &str {
        self.0.str("name").unwrap_or_default()
    }
}

async fn people() -> Result<PublicApi<PersonDto>> {
    let api = PublicApi::<PersonDto>::new(common::people_store());
    api.batch_create(vec![
        json!({ "name": "ann", "age": 31, "city": "Oslo" }),
        json!({ "name": "bob", "age": 17, "city": "Rome" }),
        json!({ "name": "cid", "age": 45 }),
        json!({ "name": "dee", "age": null, "city": "Oslo" }),
        json!({ "name": "Eve", "age": 22, "city": "Lima" }),
    ])
    .await?;
    Ok(api)
}

fn names(list: &[PersonDto]) -> Vec<&str> {
    list.iter().map(PersonDto::name).collect()
}

#[tokio::test]
async fn query_accepts_operator_filters() -> Result<()> {
    let api = people().await?;

    let adults = api.query(|q| q.filter(json!({ "age": { "$gte": 18 } }))).await?;
    assert_eq!(names(&adults), vec!["ann", "cid", "Eve"]);

    let either = api
        .query(|q| q.filter(json!({ "$or": [{ "city": "Rome" }, { "age": { "$between": [40, 50] } }] })))
        .await?;
    assert_eq!(names(&either), vec!["bob", "cid"]);

    let listed = api.query(|q| q.filter(json!({ "name": { "$in": ["dee", "ann", "zed"] } }))).await?;
    assert_eq!(names(&listed), vec!["ann", "dee"]);

    let like = api.query(|q| q.filter(json!({ "name": { "$ilike": "e%" } }))).await?;
    assert_eq!(names(&like), vec!["Eve"]);
    Ok(())
}

#[tokio::test]
async fn null_comparisons_never_match() -> Result<()> {
    let api = people().await?;

    // dee has no age: neither side of the comparison includes her
    let young = api.query(|q| q.filter(json!({ "age": { "$lt": 30 } }))).await?;
    let old = api.query(|q| q.filter(json!({ "$not": { "age": { "$lt": 30 } } }))).await?;
    assert_eq!(names(&young), vec!["bob", "Eve"]);
    assert_eq!(names(&old), vec!["ann", "cid"]);

    let unaged = api.where_by(&Predicate::by("age", Value::Null)).await?;
    assert_eq!(names(&unaged), vec!["dee"]);

    let not_oslo = api.query(|q| q.filter(json!({ "city": { "$ne": "Oslo" } }))).await?;
    assert_eq!(names(&not_oslo), vec!["bob", "Eve"]);
    Ok(())
}

#[tokio::test]
async fn query_orders_and_pages() -> Result<()> {
    let api = people().await?;

    let by_age = api.query(|q| q.order_by("age", SortDirection::Desc)).await?;
    assert_eq!(names(&by_age), vec!["dee", "cid", "ann", "Eve", "bob"]);

    let page = api
        .query(|q| q.filter(json!({ "age": { "$ne": null } })).order("age").offset(1).limit(2))
        .await?;
    assert_eq!(names(&page), vec!["Eve", "ann"]);

    let reversed = api.query(|q| q.reverse_order().limit(2)).await?;
    assert_eq!(names(&reversed), vec!["Eve", "dee"]);
    Ok(())
}

#[tokio::test]
async fn transforms_apply_to_query_results() -> Result<()> {
    let api = people().await?;
    let cid = api.find_by(&Predicate::by("name", "cid")).await?.expect("cid");
    assert_eq!(cid.as_dto().value("city"), json!("unknown"));
    Ok(())
}

#[tokio::test]
async fn malformed_queries_are_invalid_input() -> Result<()> {
    let api = people().await?;
    let bad_op = api.query(|q| q.filter(json!({ "age": { "$near": 3 } }))).await;
    assert!(matches!(bad_op, Err(GatewayError::InvalidInput(_))), "got {:?}", bad_op.map(|v| v.len()));

    let bad_order = api.query(|q| q.order("age sideways")).await;
    assert!(matches!(bad_order, Err(GatewayError::InvalidInput(_))));

    let unscoped = api.query(|_| Query::new()).await?;
    assert_eq!(unscoped.len(), 5);
    Ok(())
}
