//! Documents owned by accounts

use std::ops::Deref;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::database::{MemoryStore, Model, PgStore, Store, Validations};
use crate::dto::{read, DataTransferObject, Dto, DtoSchema};
use crate::filter::Predicate;
use crate::public_api::gateway::Result;
use crate::public_api::PublicApi;

pub const TABLE: &str = "documents";

const EXCERPT_CHARS: usize = 80;

pub fn model() -> Model {
    Model::new(TABLE)
        .columns(["title", "body", "account_id", "state"])
        .validations(Validations::new().presence_of("title").presence_of("account_id"))
}

/// First `EXCERPT_CHARS` characters of the body, with an ellipsis when cut
pub fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= EXCERPT_CHARS {
        return body.to_string();
    }
    let cut: String = body.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

static SCHEMA: Lazy<DtoSchema> = Lazy::new(|| {
    DtoSchema::new("DocumentDto")
        .attribute("id")
        .attribute("title")
        .attribute("body")
        .attribute("account_id")
        .attribute("state")
        .attribute("created_at")
        .attribute("updated_at")
        .computed("excerpt", |source| {
            Ok(match read(source, "body") {
                Value::String(body) => Value::String(excerpt(&body)),
                _ => Value::Null,
            })
        })
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DocumentDto(Dto);

impl DataTransferObject for DocumentDto {
    fn schema() -> &'static DtoSchema {
        &SCHEMA
    }

    fn from_dto(dto: Dto) -> Self {
        Self(dto)
    }

    fn as_dto(&self) -> &Dto {
        &self.0
    }
}

impl DocumentDto {
    pub fn title(&self) -> Option<&str> {
        self.0.str("title")
    }

    pub fn body(&self) -> Option<&str> {
        self.0.str("body")
    }

    pub fn account_id(&self) -> Option<i64> {
        self.0.i64("account_id")
    }

    pub fn state(&self) -> Option<&str> {
        self.0.str("state")
    }

    pub fn excerpt(&self) -> Option<&str> {
        self.0.str("excerpt")
    }
}

/// Public boundary for documents
#[derive(Clone)]
pub struct DocumentsApi {
    api: PublicApi<DocumentDto>,
}

impl DocumentsApi {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { api: PublicApi::new(store) }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new(model())))
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(PgStore::new(model(), pool)))
    }

    pub async fn for_account(&self, account_id: i64) -> Result<Vec<DocumentDto>> {
        self.api.where_by(&Predicate::by("account_id", account_id)).await
    }
}

impl Deref for DocumentsApi {
    type Target = PublicApi<DocumentDto>;

    fn deref(&self) -> &Self::Target {
        &self.api
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn excerpt_truncates_long_bodies() {
        assert_eq!(excerpt("  short  "), "short");
        let long = "word ".repeat(40);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.chars().count() <= EXCERPT_CHARS + 3);
    }

    #[test]
    fn excerpt_is_null_without_body() {
        let dto = DocumentDto::build(&json!({ "id": 1, "title": "T" })).unwrap();
        assert_eq!(dto.excerpt(), None);
        assert_eq!(dto.as_dto().value("excerpt"), Value::Null);
    }
}
