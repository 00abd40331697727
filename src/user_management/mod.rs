//! Accounts: the user-management side of the application, reachable from
//! the rest of the crate only through `AccountsApi`.

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

pub const TABLE: &str = "accounts";

/// Table definition and validation rules for accounts
pub fn model() -> Model {
    Model::new(TABLE)
        .columns(["email", "first_name", "last_name", "role", "administrator"])
        .validations(
            Validations::new()
                .presence_of("email")
                .presence_of("first_name")
                .presence_of("last_name")
                .uniqueness_of("email")
                .custom("email", |value| match value.as_str() {
                    Some(email) if email.contains('@') => Ok(()),
                    _ => Err("is invalid".to_string()),
                }),
        )
}

static SCHEMA: Lazy<DtoSchema> = Lazy::new(|| {
    DtoSchema::new("AccountDto")
        .attribute("id")
        .attribute("email")
        .attribute("first_name")
        .attribute("last_name")
        .computed("full_name", |source| {
            let parts: Vec<String> = ["first_name", "last_name"]
                .iter()
                .filter_map(|name| read(source, name).as_str().map(str::to_string))
                .filter(|part| !part.is_empty())
                .collect();
            Ok(Value::String(parts.join(" ")))
        })
        .attribute("role")
        .attribute("administrator?")
        .attribute("created_at")
        .attribute("updated_at")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AccountDto(Dto);

impl DataTransferObject for AccountDto {
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

impl AccountDto {
    pub fn email(&self) -> Option<&str> {
        self.0.str("email")
    }

    pub fn first_name(&self) -> Option<&str> {
        self.0.str("first_name")
    }

    pub fn last_name(&self) -> Option<&str> {
        self.0.str("last_name")
    }

    pub fn full_name(&self) -> &str {
        self.0.str("full_name").unwrap_or_default()
    }

    pub fn role(&self) -> Option<&str> {
        self.0.str("role")
    }

    /// Reader for `administrator?`
    pub fn is_administrator(&self) -> bool {
        self.0.bool("administrator?").unwrap_or(false)
    }
}

/// Public boundary for accounts
#[derive(Clone)]
pub struct AccountsApi {
    api: PublicApi<AccountDto>,
}

impl AccountsApi {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { api: PublicApi::new(store) }
    }

    /// Accounts kept in process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new(model())))
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(PgStore::new(model(), pool)))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<AccountDto>> {
        self.api.find_by(&Predicate::by("email", email)).await
    }

    pub async fn administrators(&self) -> Result<Vec<AccountDto>> {
        self.api.where_by(&Predicate::by("administrator", true)).await
    }
}

impl Deref for AccountsApi {
    type Target = PublicApi<AccountDto>;

    fn deref(&self) -> &Self::Target {
        &self.api
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_name_skips_missing_parts() {
        let dto = AccountDto::build(&json!({ "first_name": "Ada", "last_name": null })).unwrap();
        assert_eq!(dto.full_name(), "Ada");
        let dto = AccountDto::build(&json!({ "first_name": "Ada", "last_name": "Lovelace" })).unwrap();
        assert_eq!(dto.full_name(), "Ada Lovelace");
    }

    #[tokio::test]
    async fn email_must_look_like_an_address() {
        let accounts = AccountsApi::in_memory();
        let err = accounts
            .create_strict(json!({ "email": "nope", "first_name": "A", "last_name": "B" }))
            .await
            .unwrap_err();
        assert_eq!(err.validation_errors().unwrap().on("email"), ["is invalid".to_string()]);
    }

    #[tokio::test]
    async fn administrators_reads_the_flag() {
        let accounts = AccountsApi::in_memory();
        accounts
            .create_strict(json!({ "email": "root@x.com", "first_name": "R", "last_name": "T", "administrator": true }))
            .await
            .unwrap();
        accounts
            .create_strict(json!({ "email": "user@x.com", "first_name": "U", "last_name": "S", "administrator": false }))
            .await
            .unwrap();

        let admins = accounts.administrators().await.unwrap();
        assert_eq!(admins.len(), 1);
        assert!(admins[0].is_administrator());
        let user = accounts.find_by_email("user@x.com").await.unwrap().unwrap();
        assert!(!user.is_administrator());
    }
}
