use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::database::query_builder::Query;
use crate::database::record::{into_attributes, Record};
use crate::database::store::Store;
use crate::database::validation::ValidationErrors;
use crate::dto::DataTransferObject;
use crate::filter::Predicate;

use super::batch::{BatchFailure, BatchOutcome};
use super::error::GatewayError;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// The only entry point for reading and writing one entity.
///
/// Bound to exactly one store (injected at construction) and one DTO type.
/// Every row that leaves the gateway is materialized as `D`; store records
/// never cross it. `pluck` is the one escape hatch and returns plain values.
pub struct PublicApi<D> {
    store: Arc<dyn Store>,
    _dto: PhantomData<fn() -> D>,
}

impl<D> Clone for PublicApi<D> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), _dto: PhantomData }
    }
}

impl<D: DataTransferObject> PublicApi<D> {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, _dto: PhantomData }
    }

    /// Table name of the bound store
    pub fn entity(&self) -> &str {
        self.store.model().table()
    }

    // ========================================
    // Reads
    // ========================================

    pub async fn find(&self, id: i64) -> Result<Option<D>> {
        self.store.find(id).await?.map(|record| wrap(&record)).transpose()
    }

    /// First match of the predicate in id order
    pub async fn find_by(&self, predicate: &Predicate) -> Result<Option<D>> {
        let query = scoped(predicate)?.limit(1).uncapped();
        let mut found = self.run(&query).await?;
        Ok(found.pop())
    }

    pub async fn all(&self) -> Result<Vec<D>> {
        self.run(&Query::new()).await
    }

    pub async fn where_by(&self, predicate: &Predicate) -> Result<Vec<D>> {
        self.run(&scoped(predicate)?).await
    }

    pub async fn first(&self) -> Result<Option<D>> {
        Ok(self.first_n(1).await?.into_iter().next())
    }

    /// Up to `n` rows from the start of id order
    pub async fn first_n(&self, n: usize) -> Result<Vec<D>> {
        self.run(&Query::new().limit(clamp(n)).uncapped()).await
    }

    pub async fn last(&self) -> Result<Option<D>> {
        Ok(self.last_n(1).await?.pop())
    }

    /// Up to `n` rows from the end of id order, returned ascending
    pub async fn last_n(&self, n: usize) -> Result<Vec<D>> {
        let mut rows = self.run(&Query::new().reverse_order().limit(clamp(n)).uncapped()).await?;
        rows.reverse();
        Ok(rows)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.store.count(&Query::new()).await?)
    }

    pub async fn count_where(&self, predicate: &Predicate) -> Result<u64> {
        Ok(self.store.count(&scoped(predicate)?).await?)
    }

    pub async fn exists(&self, predicate: &Predicate) -> Result<bool> {
        Ok(self.count_where(predicate).await? > 0)
    }

    /// Raw column values in id order, without building DTOs. One column gives
    /// one scalar per row; several give one array per row.
    pub async fn pluck<S: AsRef<str>>(&self, columns: &[S]) -> Result<Vec<Value>> {
        if columns.is_empty() {
            return Err(GatewayError::InvalidInput("pluck requires at least one column".to_string()));
        }
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let rows = self.store.pluck(&Query::new(), &columns).await?;
        let single = columns.len() == 1;
        Ok(rows
            .into_iter()
            .map(|mut row| if single { row.pop().unwrap_or(Value::Null) } else { Value::Array(row) })
            .collect())
    }

    /// Refine a store query beyond exact-equality predicates. Limits given
    /// here are capped by `FILTER_MAX_LIMIT`.
    pub async fn query<F>(&self, build: F) -> Result<Vec<D>>
    where
        F: FnOnce(Query) -> Query,
    {
        self.run(&build(Query::new())).await
    }

    // ========================================
    // Writes
    // ========================================

    /// `None` when validation fails
    pub async fn create(&self, attributes: Value) -> Result<Option<D>> {
        match self.create_strict(attributes).await {
            Ok(dto) => Ok(Some(dto)),
            Err(GatewayError::Validation(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_strict(&self, attributes: Value) -> Result<D> {
        let attributes = into_attributes(attributes)?;
        self.insert(attributes).await
    }

    /// Best-effort: entries that fail validation are left out of the result
    pub async fn batch_create(&self, entries: Vec<Value>) -> Result<Vec<D>> {
        Ok(self.batch_create_report(entries).await?.created)
    }

    /// Like `batch_create`, also reporting which entries were rejected and why.
    /// Entries are written one at a time; an error other than a validation
    /// failure stops the batch and earlier entries stay written.
    pub async fn batch_create_report(&self, entries: Vec<Value>) -> Result<BatchOutcome<D>> {
        let mut outcome = BatchOutcome::new();
        for (index, entry) in entries.into_iter().enumerate() {
            let attributes = match into_attributes(entry) {
                Ok(attributes) => attributes,
                Err(e) => {
                    let mut errors = ValidationErrors::new();
                    errors.add("base", e.to_string());
                    outcome.failures.push(BatchFailure { index, errors });
                    continue;
                }
            };
            match self.insert(attributes).await {
                Ok(dto) => outcome.created.push(dto),
                Err(GatewayError::Validation(errors)) => {
                    tracing::debug!("{} batch entry {} rejected: {}", self.entity(), index, errors);
                    outcome.failures.push(BatchFailure { index, errors });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcome)
    }

    /// `None` when the id does not exist or validation fails
    pub async fn update(&self, id: i64, attributes: Value) -> Result<Option<D>> {
        match self.update_strict(id, attributes).await {
            Ok(dto) => Ok(Some(dto)),
            Err(GatewayError::Validation(_) | GatewayError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn update_strict(&self, id: i64, attributes: Value) -> Result<D> {
        let attributes = into_attributes(attributes)?;
        match self.store.update(id, attributes).await? {
            Some(record) => wrap(&record),
            None => Err(self.not_found(id)),
        }
    }

    /// Unchecked bulk update; returns the number of rows matched
    pub async fn update_by(&self, predicate: &Predicate, attributes: Value) -> Result<u64> {
        let query = scoped(predicate)?;
        let attributes = into_attributes(attributes)?;
        Ok(self.store.update_all(&query, attributes).await?)
    }

    /// `false` when the id does not exist
    pub async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.store.delete(id).await?)
    }

    pub async fn delete_strict(&self, id: i64) -> Result<bool> {
        if self.delete(id).await? {
            Ok(true)
        } else {
            Err(self.not_found(id))
        }
    }

    pub async fn delete_by(&self, predicate: &Predicate) -> Result<u64> {
        Ok(self.store.delete_all(&scoped(predicate)?).await?)
    }

    /// Removes every row of the entity
    pub async fn delete_all(&self) -> Result<u64> {
        Ok(self.store.delete_all(&Query::new()).await?)
    }

    /// Find by `predicate` and update it with `attributes`, or create a row
    /// from the predicate merged with `attributes`.
    pub async fn upsert(&self, predicate: &Predicate, attributes: Value) -> Result<D> {
        let attributes = into_attributes(attributes)?;
        match self.find_by(predicate).await? {
            Some(existing) => {
                let id = existing.id().ok_or_else(|| {
                    GatewayError::InvalidInput(format!("{} row has no id", self.entity()))
                })?;
                self.update_strict(id, Value::Object(attributes)).await
            }
            None => {
                let mut merged: Map<String, Value> = predicate.fields().clone();
                merged.extend(attributes);
                self.insert(merged).await
            }
        }
    }

    async fn insert(&self, attributes: Map<String, Value>) -> Result<D> {
        let record = self.store.insert(attributes).await?;
        wrap(&record)
    }

    async fn run(&self, query: &Query) -> Result<Vec<D>> {
        let records = self.store.select(query).await?;
        records.iter().map(wrap::<D>).collect()
    }

    fn not_found(&self, id: i64) -> GatewayError {
        GatewayError::NotFound { entity: self.entity().to_string(), id }
    }
}

fn wrap<D: DataTransferObject>(record: &Record) -> Result<D> {
    Ok(D::build(record)?)
}

fn scoped(predicate: &Predicate) -> Result<Query> {
    predicate.validate()?;
    Ok(Query::new().where_predicate(predicate))
}

fn clamp(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
