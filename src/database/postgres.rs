use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::model::Model;
use crate::database::query_builder::Query;
use crate::database::record::{sanitize_attributes, timestamp_string, Record};
use crate::database::store::{check_columns, log_operation, Store, StoreError};
use crate::filter::filter_where::quote_identifier;
use crate::filter::{Filter, SqlResult};
use crate::types::Operation;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Postgres-backed table. The table must have an `id BIGSERIAL` primary key
/// and, when the model keeps timestamps, `created_at`/`updated_at` columns.
pub struct PgStore {
    model: Model,
    pool: PgPool,
}

impl PgStore {
    pub fn new(model: Model, pool: PgPool) -> Self {
        Self { model, pool }
    }

    /// Store on a pooled connection to `database_name`
    pub async fn connect(model: Model, database_name: &str) -> Result<Self, StoreError> {
        let pool = DatabaseManager::pool(database_name).await?;
        Ok(Self::new(model, pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn filter(&self, query: &Query) -> Result<Filter, StoreError> {
        let filter = query.to_filter(self.model.table())?;
        check_columns(&self.model, filter.referenced_columns())?;
        Ok(filter)
    }

    fn by_id(&self, id: i64) -> Result<Filter, StoreError> {
        self.filter(&Query::new().where_eq("id", id))
    }

    fn prepare(&self, attributes: Map<String, Value>) -> Result<Map<String, Value>, StoreError> {
        let attributes = sanitize_attributes(attributes);
        check_columns(&self.model, attributes.keys().map(String::as_str))?;
        Ok(attributes)
    }

    async fn fetch_all(&self, sql: &SqlResult) -> Result<Vec<Record>, StoreError> {
        let rows = bind_all(sqlx::query(&sql.query), &sql.params).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| Record::from_row(row_to_map(row))).collect())
    }

    async fn fetch_optional(&self, sql: &SqlResult) -> Result<Option<Record>, StoreError> {
        let row = bind_all(sqlx::query(&sql.query), &sql.params).fetch_optional(&self.pool).await?;
        Ok(row.map(|row| Record::from_row(row_to_map(&row))))
    }

    /// Unique fields whose value is already held by another row
    async fn taken_fields(&self, attributes: &Map<String, Value>, except: Option<i64>) -> Result<HashSet<String>, StoreError> {
        let mut taken = HashSet::new();
        for field in self.model.rules().unique_fields() {
            let value = match attributes.get(field) {
                Some(value) if !value.is_null() => value.clone(),
                _ => continue,
            };
            let mut query = Query::new().where_eq(field, value);
            if let Some(id) = except {
                query = query.filter(serde_json::json!({ "id": { "$ne": id } }));
            }
            if self.count(&query).await? > 0 {
                taken.insert(field.to_string());
            }
        }
        Ok(taken)
    }

    async fn validate(&self, attributes: &Map<String, Value>, except: Option<i64>) -> Result<(), StoreError> {
        let taken = self.taken_fields(attributes, except).await?;
        self.model.validate(attributes, &|field, _| taken.contains(field))?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    fn model(&self) -> &Model {
        &self.model
    }

    async fn find(&self, id: i64) -> Result<Option<Record>, StoreError> {
        let started = Instant::now();
        let sql = self.by_id(id)?.to_sql();
        let found = self.fetch_optional(&sql).await?;
        log_operation(Operation::Select, self.model.table(), started, &sql.query);
        Ok(found)
    }

    async fn select(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        let started = Instant::now();
        let sql = self.filter(query)?.to_sql();
        let rows = self.fetch_all(&sql).await?;
        log_operation(Operation::Select, self.model.table(), started, &sql.query);
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        let started = Instant::now();
        let sql = self.filter(query)?.to_count_sql();
        let row = bind_all(sqlx::query(&sql.query), &sql.params).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        log_operation(Operation::Count, self.model.table(), started, &sql.query);
        Ok(count.max(0) as u64)
    }

    async fn pluck(&self, query: &Query, columns: &[String]) -> Result<Vec<Vec<Value>>, StoreError> {
        let started = Instant::now();
        let mut filter = self.filter(query)?;
        check_columns(&self.model, columns.iter().map(String::as_str))?;
        filter.select(columns.to_vec())?;
        let sql = filter.to_sql();
        let rows = self.fetch_all(&sql).await?;
        log_operation(Operation::Select, self.model.table(), started, &sql.query);
        Ok(rows
            .iter()
            .map(|row| columns.iter().map(|column| row.value(column)).collect())
            .collect())
    }

    async fn insert(&self, attributes: Map<String, Value>) -> Result<Record, StoreError> {
        let started = Instant::now();
        let attributes = self.prepare(attributes)?;
        self.validate(&attributes, None).await?;

        let mut columns = Vec::with_capacity(attributes.len() + 2);
        let mut values = Vec::with_capacity(attributes.len() + 2);
        let mut params = Vec::with_capacity(attributes.len());
        for (column, value) in &attributes {
            columns.push(quote_identifier(column));
            if value.is_null() {
                values.push("NULL".to_string());
            } else {
                params.push(value.clone());
                values.push(format!("${}", params.len()));
            }
        }
        if self.model.has_timestamps() {
            for column in ["created_at", "updated_at"] {
                columns.push(quote_identifier(column));
                values.push("NOW()".to_string());
            }
        }

        let table = quote_identifier(self.model.table());
        let query = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                table,
                columns.join(", "),
                values.join(", ")
            )
        };
        let row = bind_all(sqlx::query(&query), &params).fetch_one(&self.pool).await?;
        let record = Record::from_row(row_to_map(&row));
        log_operation(Operation::Create, self.model.table(), started, &query);
        Ok(record)
    }

    async fn update(&self, id: i64, attributes: Map<String, Value>) -> Result<Option<Record>, StoreError> {
        let started = Instant::now();
        let Some(existing) = self.find(id).await? else {
            return Ok(None);
        };
        let attributes = self.prepare(attributes)?;
        self.validate(&existing.merged(&attributes), Some(id)).await?;

        let changes = existing.changes(&attributes);
        if changes.is_empty() {
            return Ok(Some(existing));
        }
        let touch = self.model.has_timestamps().then_some("updated_at");
        let mut sql = self.by_id(id)?.to_update_sql(&changes, touch)?;
        sql.query.push_str(" RETURNING *");
        let updated = self.fetch_optional(&sql).await?;
        log_operation(Operation::Update, self.model.table(), started, &sql.query);
        Ok(updated)
    }

    async fn update_all(&self, query: &Query, attributes: Map<String, Value>) -> Result<u64, StoreError> {
        let started = Instant::now();
        let attributes = self.prepare(attributes)?;
        if attributes.is_empty() {
            return self.count(query).await;
        }
        let touch = self.model.has_timestamps().then_some("updated_at");
        let sql = self.filter(query)?.to_update_sql(&attributes, touch)?;
        let result = bind_all(sqlx::query(&sql.query), &sql.params).execute(&self.pool).await?;
        log_operation(Operation::Update, self.model.table(), started, &sql.query);
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let started = Instant::now();
        let sql = self.by_id(id)?.to_delete_sql();
        let result = bind_all(sqlx::query(&sql.query), &sql.params).execute(&self.pool).await?;
        log_operation(Operation::Delete, self.model.table(), started, &sql.query);
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self, query: &Query) -> Result<u64, StoreError> {
        let started = Instant::now();
        let sql = self.filter(query)?.to_delete_sql();
        let result = bind_all(sqlx::query(&sql.query), &sql.params).execute(&self.pool).await?;
        log_operation(Operation::Delete, self.model.table(), started, &sql.query);
        Ok(result.rows_affected())
    }
}

fn bind_all<'q>(mut q: PgQuery<'q>, params: &'q [Value]) -> PgQuery<'q> {
    for param in params {
        q = bind_param(q, param);
    }
    q
}

fn bind_param<'q>(q: PgQuery<'q>, v: &'q Value) -> PgQuery<'q> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => q.bind(sqlx::types::Json(v)),
    }
}

/// Decode a row into JSON by Postgres column type
fn row_to_map(row: &PgRow) -> Map<String, Value> {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, i, column.type_info().name()).unwrap_or_else(|e| {
            tracing::warn!("Failed to decode column '{}': {}", column.name(), e);
            Value::Null
        });
        map.insert(column.name().to_string(), value);
    }
    map
}

fn decode_column(row: &PgRow, i: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "INT8" => row.try_get::<Option<i64>, _>(i)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(i)?.map(Value::from),
        "INT2" => row.try_get::<Option<i16>, _>(i)?.map(Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(i)?.map(|f| Value::from(f as f64)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.map(Value::from),
        "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(Value::from),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(i)?.map(Value::from),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(i)?
            .map(|at| Value::from(timestamp_string(at))),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(i)?
            .map(|at| Value::from(timestamp_string(at.and_utc()))),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(i)?.map(|d| Value::from(d.to_string())),
        "UUID" => row.try_get::<Option<Uuid>, _>(i)?.map(|u| Value::from(u.to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(i)?,
        other => {
            tracing::warn!("Unsupported column type {}, reading as NULL", other);
            None
        }
    };
    Ok(value.unwrap_or(Value::Null))
}
