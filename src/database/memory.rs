use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::database::model::Model;
use crate::database::query_builder::Query;
use crate::database::record::{sanitize_attributes, timestamp_string, Record};
use crate::database::store::{check_columns, log_operation, Store, StoreError};
use crate::filter::Filter;
use crate::types::Operation;

/// In-process table: ids start at 1 and natural order is id ascending
pub struct MemoryStore {
    model: Model,
    table: RwLock<Table>,
}

struct Table {
    rows: BTreeMap<i64, Record>,
    next_id: i64,
}

impl Table {
    /// Whether a row other than `except` already holds `value` in `field`
    fn taken(&self, field: &str, value: &Value, except: Option<i64>) -> bool {
        self.rows
            .iter()
            .any(|(id, row)| Some(*id) != except && row.get(field) == Some(value))
    }

    fn matching<'a>(&'a self, filter: &'a Filter) -> impl Iterator<Item = &'a Record> + 'a {
        self.rows.values().filter(move |row| filter.matches(row.fields()))
    }
}

impl MemoryStore {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            table: RwLock::new(Table { rows: BTreeMap::new(), next_id: 1 }),
        }
    }

    fn filter(&self, query: &Query) -> Result<Filter, StoreError> {
        let filter = query.to_filter(self.model.table())?;
        check_columns(&self.model, filter.referenced_columns())?;
        Ok(filter)
    }

    fn prepare(&self, attributes: Map<String, Value>) -> Result<Map<String, Value>, StoreError> {
        let attributes = sanitize_attributes(attributes);
        check_columns(&self.model, attributes.keys().map(String::as_str))?;
        Ok(attributes)
    }

    fn sorted_page(&self, filter: &Filter, table: &Table) -> Vec<Record> {
        let mut rows: Vec<Record> = table.matching(filter).cloned().collect();
        rows.sort_by(|a, b| filter.compare(a.fields(), b.fields()));
        filter.page(rows)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn model(&self) -> &Model {
        &self.model
    }

    async fn find(&self, id: i64) -> Result<Option<Record>, StoreError> {
        let started = Instant::now();
        let table = self.table.read().await;
        let found = table.rows.get(&id).cloned();
        log_operation(Operation::Select, self.model.table(), started, &format!("id {}", id));
        Ok(found)
    }

    async fn select(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        let started = Instant::now();
        let filter = self.filter(query)?;
        let table = self.table.read().await;
        let rows = self.sorted_page(&filter, &table);
        log_operation(Operation::Select, self.model.table(), started, &format!("{} rows", rows.len()));
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        let started = Instant::now();
        let filter = self.filter(query)?;
        let table = self.table.read().await;
        let count = table.matching(&filter).count() as u64;
        log_operation(Operation::Count, self.model.table(), started, &format!("{} rows", count));
        Ok(count)
    }

    async fn pluck(&self, query: &Query, columns: &[String]) -> Result<Vec<Vec<Value>>, StoreError> {
        let started = Instant::now();
        let filter = self.filter(query)?;
        check_columns(&self.model, columns.iter().map(String::as_str))?;
        let table = self.table.read().await;
        let values: Vec<Vec<Value>> = self
            .sorted_page(&filter, &table)
            .iter()
            .map(|row| columns.iter().map(|column| row.value(column)).collect())
            .collect();
        log_operation(Operation::Select, self.model.table(), started, &format!("pluck {} rows", values.len()));
        Ok(values)
    }

    async fn insert(&self, attributes: Map<String, Value>) -> Result<Record, StoreError> {
        let started = Instant::now();
        let attributes = self.prepare(attributes)?;
        let mut table = self.table.write().await;

        self.model
            .validate(&attributes, &|field, value| table.taken(field, value, None))?;

        let id = table.next_id;
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::from(id));
        fields.extend(attributes);
        let mut record = Record::from_row(fields);
        if self.model.has_timestamps() {
            let now = timestamp_string(Utc::now());
            record.set_system_field("created_at", now.clone());
            record.set_system_field("updated_at", now);
        }

        table.next_id += 1;
        table.rows.insert(id, record.clone());
        log_operation(Operation::Create, self.model.table(), started, &format!("id {}", id));
        Ok(record)
    }

    async fn update(&self, id: i64, attributes: Map<String, Value>) -> Result<Option<Record>, StoreError> {
        let started = Instant::now();
        let mut table = self.table.write().await;

        let Some(existing) = table.rows.get(&id) else {
            return Ok(None);
        };
        let attributes = self.prepare(attributes)?;
        let merged = existing.merged(&attributes);
        self.model
            .validate(&merged, &|field, value| table.taken(field, value, Some(id)))?;

        let touch = self.model.has_timestamps();
        let Some(record) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if record.apply_changes(&attributes) && touch {
            record.set_system_field("updated_at", timestamp_string(Utc::now()));
        }
        let updated = record.clone();
        log_operation(Operation::Update, self.model.table(), started, &format!("id {}", id));
        Ok(Some(updated))
    }

    async fn update_all(&self, query: &Query, attributes: Map<String, Value>) -> Result<u64, StoreError> {
        let started = Instant::now();
        let attributes = self.prepare(attributes)?;
        let filter = self.filter(query)?;
        let touch = self.model.has_timestamps();
        let now = timestamp_string(Utc::now());

        let mut table = self.table.write().await;
        let mut updated = 0u64;
        for record in table.rows.values_mut() {
            if !filter.matches(record.fields()) {
                continue;
            }
            record.apply_changes(&attributes);
            if touch && !attributes.is_empty() {
                record.set_system_field("updated_at", now.clone());
            }
            updated += 1;
        }
        log_operation(Operation::Update, self.model.table(), started, &format!("{} rows", updated));
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let started = Instant::now();
        let mut table = self.table.write().await;
        let removed = table.rows.remove(&id).is_some();
        log_operation(Operation::Delete, self.model.table(), started, &format!("id {}", id));
        Ok(removed)
    }

    async fn delete_all(&self, query: &Query) -> Result<u64, StoreError> {
        let started = Instant::now();
        let filter = self.filter(query)?;
        let mut table = self.table.write().await;
        let before = table.rows.len();
        table.rows.retain(|_, row| !filter.matches(row.fields()));
        let removed = (before - table.rows.len()) as u64;
        log_operation(Operation::Delete, self.model.table(), started, &format!("{} rows", removed));
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::validation::Validations;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::new(
            Model::new("accounts")
                .columns(["email", "role"])
                .validations(Validations::new().presence_of("email").uniqueness_of("email")),
        )
    }

    #[tokio::test]
    async fn assigns_sequential_ids_and_timestamps() {
        let store = store();
        let a = store.insert(attrs(json!({ "email": "a@x.com" }))).await.unwrap();
        let b = store.insert(attrs(json!({ "email": "b@x.com", "id": 40 }))).await.unwrap();
        assert_eq!(a.id(), Some(1));
        assert_eq!(b.id(), Some(2));
        assert!(a.created_at().is_some());
        assert_eq!(a.created_at(), a.updated_at());
    }

    #[tokio::test]
    async fn failed_validation_leaves_table_untouched() {
        let store = store();
        store.insert(attrs(json!({ "email": "a@x.com" }))).await.unwrap();
        let err = store.insert(attrs(json!({ "email": "a@x.com" }))).await.unwrap_err();
        match err {
            StoreError::Validation(errors) => assert!(errors.contains("email")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.count(&Query::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_allows_keeping_own_unique_value() {
        let store = store();
        let row = store.insert(attrs(json!({ "email": "a@x.com", "role": "guest" }))).await.unwrap();
        let id = row.id().unwrap();
        let updated = store
            .update(id, attrs(json!({ "email": "a@x.com", "role": "member" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("role"), Some(&json!("member")));
        assert!(store.update(999, attrs(json!({ "role": "x" }))).await.unwrap().is_none());
        assert!(store.update(999, attrs(json!({ "nickname": "x" }))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_columns_are_rejected() {
        let store = store();
        let err = store.insert(attrs(json!({ "email": "a@x.com", "nickname": "z" }))).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { ref column, .. } if column == "nickname"));
        let err = store.select(&Query::new().where_eq("nickname", "z")).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }

    #[tokio::test]
    async fn update_all_skips_validation() {
        let store = store();
        store.insert(attrs(json!({ "email": "a@x.com", "role": "guest" }))).await.unwrap();
        store.insert(attrs(json!({ "email": "b@x.com", "role": "guest" }))).await.unwrap();
        let updated = store
            .update_all(&Query::new().where_eq("role", "guest"), attrs(json!({ "email": null })))
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(store.count(&Query::new().where_eq("email", Value::Null)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn select_orders_and_pages() {
        let store = store();
        for (email, role) in [("c@x.com", "b"), ("a@x.com", "a"), ("b@x.com", "b")] {
            store.insert(attrs(json!({ "email": email, "role": role }))).await.unwrap();
        }
        let rows = store
            .select(&Query::new().order("role desc, email").limit(2))
            .await
            .unwrap();
        let emails: Vec<Value> = rows.iter().map(|r| r.value("email")).collect();
        assert_eq!(emails, vec![json!("b@x.com"), json!("c@x.com")]);

        let plucked = store
            .pluck(&Query::new().where_eq("role", "b"), &["id".to_string(), "email".to_string()])
            .await
            .unwrap();
        assert_eq!(plucked, vec![vec![json!(1), json!("c@x.com")], vec![json!(3), json!("b@x.com")]]);
    }
}
