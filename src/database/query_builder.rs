use serde_json::{json, Value};

use crate::filter::{Filter, FilterData, FilterError, Predicate, SortDirection};

/// Store-agnostic query handed to `Store` implementations and to
/// `PublicApi::query` callers. Nothing is validated until a store turns
/// it into a `Filter` for its table.
#[derive(Debug, Clone, Default)]
pub struct Query {
    wheres: Vec<Value>,
    order: Vec<String>,
    limit: Option<i32>,
    offset: Option<i32>,
    reversed: bool,
    uncapped: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`, or `column IS NULL` for `null`
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut clause = serde_json::Map::new();
        clause.insert(column.into(), json!({ "$eq": value.into() }));
        self.wheres.push(Value::Object(clause));
        self
    }

    pub fn where_predicate(mut self, predicate: &Predicate) -> Self {
        if !predicate.is_empty() {
            self.wheres.push(predicate.to_where());
        }
        self
    }

    /// Any where clause of the filter language, e.g. `{"age": {"$gte": 21}}`.
    /// Successive calls are ANDed.
    pub fn filter(mut self, where_clause: Value) -> Self {
        self.wheres.push(where_clause);
        self
    }

    /// Order spec such as `"created_at desc, id"`; successive calls append
    pub fn order(mut self, spec: impl Into<String>) -> Self {
        self.order.push(spec.into());
        self
    }

    pub fn order_by(self, column: impl Into<String>, direction: SortDirection) -> Self {
        let spec = format!("{} {}", column.into(), direction.to_sql());
        self.order(spec)
    }

    /// Drop any previously requested ordering
    pub fn unordered(mut self) -> Self {
        self.order.clear();
        self.reversed = false;
        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Exempt limit and offset from the configured `FILTER_MAX_LIMIT` cap.
    /// Only for limits the gateway sets itself, never for caller input.
    pub(crate) fn uncapped(mut self) -> Self {
        self.uncapped = true;
        self
    }

    /// Flip the effective order; with no explicit order this means `id DESC`
    pub fn reverse_order(mut self) -> Self {
        self.reversed = !self.reversed;
        self
    }

    pub fn filter_data(&self) -> FilterData {
        let where_clause = match self.wheres.len() {
            0 => None,
            1 => Some(self.wheres[0].clone()),
            _ => Some(json!({ "$and": self.wheres })),
        };
        let order = if self.order.is_empty() { None } else { Some(json!(self.order)) };
        FilterData {
            select: None,
            where_clause,
            order,
            limit: self.limit,
            offset: self.offset,
        }
    }

    /// Validate against `table` and build the executable filter
    pub fn to_filter(&self, table: &str) -> Result<Filter, FilterError> {
        let mut filter = Filter::new(table)?;
        let mut data = self.filter_data();
        if self.uncapped {
            let (limit, offset) = (data.limit.take(), data.offset.take());
            filter.assign(data)?;
            filter.uncapped_limit(limit, offset)?;
        } else {
            filter.assign(data)?;
        }
        if self.reversed {
            filter.reverse_order();
        }
        Ok(filter)
    }
}
