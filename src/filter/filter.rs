use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{quote_identifier, FilterWhere};
use super::types::{Condition, FilterData, FilterOrderInfo, SortDirection, SqlResult};

/// Validated filter for one table. Renders to SQL for Postgres and
/// evaluates directly against JSON rows for the in-memory store.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    conditions: Vec<Condition>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        validate_identifier(&table_name).map_err(FilterError::InvalidTableName)?;
        Ok(Self {
            table_name,
            select_columns: vec![],
            conditions: vec![],
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select { self.select(select)?; }
        if let Some(where_clause) = data.where_clause { self.where_clause(&where_clause)?; }
        if let Some(order) = data.order { self.order(&order)?; }
        if data.limit.is_some() || data.offset.is_some() { self.limit(data.limit, data.offset)?; }
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            if column == "*" { continue; }
            validate_identifier(column).map_err(FilterError::InvalidColumn)?;
        }
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: &Value) -> Result<&mut Self, FilterError> {
        let max_depth = crate::config::CONFIG.filter.max_nested_depth;
        self.conditions = FilterWhere::parse(conditions, max_depth)?;
        Ok(self)
    }

    pub fn order(&mut self, order_spec: &Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: Option<i32>, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        let max_limit = crate::config::CONFIG.filter.max_limit;
        self.apply_limit(limit, offset, max_limit)
    }

    /// Limit without the configured cap, for limits set by library code
    pub(crate) fn uncapped_limit(&mut self, limit: Option<i32>, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        self.apply_limit(limit, offset, None)
    }

    fn apply_limit(&mut self, limit: Option<i32>, offset: Option<i32>, max_limit: Option<i32>) -> Result<&mut Self, FilterError> {
        if let Some(l) = limit { if l < 0 { return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string())); } }
        if let Some(off) = offset { if off < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); } }

        let max_limit = max_limit.unwrap_or(i32::MAX);
        let applied_limit = limit.map(|l| {
            if l > max_limit {
                if crate::config::CONFIG.filter.debug_logging {
                    tracing::warn!("Limit {} exceeds max {}, capping to max", l, max_limit);
                }
                max_limit
            } else {
                l
            }
        });

        self.limit = applied_limit;
        self.offset = offset;
        Ok(self)
    }

    /// All column names referenced by select, where and order
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self
            .select_columns
            .iter()
            .filter(|c| c.as_str() != "*")
            .map(String::as_str)
            .collect();
        for condition in &self.conditions {
            columns.extend(condition.columns());
        }
        columns.extend(self.order_data.iter().map(|o| o.column.as_str()));
        columns
    }

    // ========================================
    // SQL rendering
    // ========================================

    pub fn to_sql(&self) -> SqlResult {
        let select_clause = self.build_select_clause();
        let (where_clause, params) = FilterWhere::generate(&self.conditions, 0);
        let order_clause = FilterOrder::generate(&self.effective_order());
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT {}", select_clause),
            format!("FROM {}", quote_identifier(&self.table_name)),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        SqlResult { query, params }
    }

    pub fn to_where_sql(&self, starting_param_index: usize) -> SqlResult {
        let (query, params) = FilterWhere::generate(&self.conditions, starting_param_index);
        SqlResult { query, params }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql(0);
        let query = format!(
            "SELECT COUNT(*) as count FROM {} WHERE {}",
            quote_identifier(&self.table_name),
            where_result.query
        );
        SqlResult { query, params: where_result.params }
    }

    pub fn to_delete_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql(0);
        let query = format!("DELETE FROM {} WHERE {}", quote_identifier(&self.table_name), where_result.query);
        SqlResult { query, params: where_result.params }
    }

    /// `UPDATE ... SET` for every row matching the where part. NULL values are
    /// inlined so they need no typed parameter.
    pub fn to_update_sql(&self, changes: &Map<String, Value>, touch_column: Option<&str>) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(0);
        let mut params = where_result.params;
        let mut assignments = Vec::with_capacity(changes.len() + 1);
        for (column, value) in changes {
            validate_identifier(column).map_err(FilterError::InvalidColumn)?;
            if value.is_null() {
                assignments.push(format!("{} = NULL", quote_identifier(column)));
            } else {
                params.push(value.clone());
                assignments.push(format!("{} = ${}", quote_identifier(column), params.len()));
            }
        }
        if let Some(column) = touch_column {
            assignments.push(format!("{} = NOW()", quote_identifier(column)));
        }
        if assignments.is_empty() {
            return Err(FilterError::InvalidOperatorData("UPDATE requires at least one column".to_string()));
        }

        let query = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(&self.table_name),
            assignments.join(", "),
            where_result.query
        );
        Ok(SqlResult { query, params })
    }

    // ========================================
    // In-memory evaluation
    // ========================================

    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        FilterWhere::matches(&self.conditions, row)
    }

    /// Row ordering including the implicit trailing `id` ascending tie-break
    pub fn compare(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        FilterOrder::compare(&self.effective_order(), a, b)
    }

    /// Apply offset and limit to already-sorted rows
    pub fn page<T>(&self, rows: Vec<T>) -> Vec<T> {
        let offset = self.offset.unwrap_or(0).max(0) as usize;
        let rows = rows.into_iter().skip(offset);
        match self.limit {
            Some(limit) => rows.take(limit.max(0) as usize).collect(),
            None => rows.collect(),
        }
    }

    /// Flip every sort direction, including the implicit `id` tie-break
    pub fn reverse_order(&mut self) -> &mut Self {
        self.order_data = self
            .effective_order()
            .into_iter()
            .map(|mut info| {
                info.sort = info.sort.reversed();
                info
            })
            .collect();
        self
    }

    /// Explicit order plus `id ASC` unless id is already ordered on, so both
    /// stores return rows in the same deterministic order.
    fn effective_order(&self) -> Vec<FilterOrderInfo> {
        let mut order = self.order_data.clone();
        if !order.iter().any(|o| o.column == "id") {
            order.push(FilterOrderInfo { column: "id".to_string(), sort: SortDirection::Asc });
        }
        order
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>().join(", ")
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

/// Identifiers are `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => Err("identifier cannot be empty".to_string()),
        Some(first) if !(first.is_ascii_alphabetic() || first == '_') => {
            Err(format!("Invalid identifier format: {}", name))
        }
        Some(_) if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') => {
            Err(format!("Invalid identifier format: {}", name))
        }
        Some(_) => Ok(()),
    }
}
