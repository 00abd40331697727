use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::validate_identifier;
use super::types::{Condition, FilterOp};

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    /// Parse a JSON where clause into a condition tree. `null` yields no conditions.
    pub fn parse(where_data: &Value, max_depth: u32) -> Result<Vec<Condition>, FilterError> {
        match where_data {
            Value::Null => Ok(vec![]),
            Value::Object(obj) => Self::parse_object(obj, 0, max_depth),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_object(obj: &Map<String, Value>, depth: u32, max_depth: u32) -> Result<Vec<Condition>, FilterError> {
        if depth > max_depth {
            return Err(FilterError::TooDeep(max_depth));
        }
        let mut conditions = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                conditions.push(Self::parse_logical_operator(key, value, depth, max_depth)?);
            } else {
                conditions.extend(Self::parse_field_condition(key, value)?);
            }
        }
        Ok(conditions)
    }

    fn parse_logical_operator(op: &str, value: &Value, depth: u32, max_depth: u32) -> Result<Condition, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut parts = Vec::with_capacity(arr.len());
                for v in arr {
                    let obj = v
                        .as_object()
                        .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} entries must be objects", op)))?;
                    parts.push(Condition::And(Self::parse_object(obj, depth + 1, max_depth)?));
                }
                Ok(if op == "$and" { Condition::And(parts) } else { Condition::Or(parts) })
            }
            "$not" => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$not requires object".to_string()))?;
                let inner = Self::parse_object(obj, depth + 1, max_depth)?;
                Ok(Condition::Not(Box::new(Condition::And(inner))))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Condition>, FilterError> {
        validate_identifier(field).map_err(FilterError::InvalidColumn)?;

        if let Value::Object(obj) = value {
            let mut out = Vec::with_capacity(obj.len());
            for (op_key, op_val) in obj {
                let operator =
                    FilterOp::from_key(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                Self::validate_operator_data(operator, op_val)?;
                out.push(Condition::Field { column: field.to_string(), operator, data: op_val.clone() });
            }
            Ok(out)
        } else {
            // Implicit equality: { field: value }
            Ok(vec![Condition::Field { column: field.to_string(), operator: FilterOp::Eq, data: value.clone() }])
        }
    }

    fn validate_operator_data(operator: FilterOp, data: &Value) -> Result<(), FilterError> {
        match operator {
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => Ok(()),
                _ => Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string())),
            },
            FilterOp::Like | FilterOp::ILike => match data {
                Value::String(_) => Ok(()),
                _ => Err(FilterError::InvalidOperatorData("$like/$ilike require a string pattern".to_string())),
            },
            _ => Ok(()),
        }
    }

    // ========================================
    // SQL generation
    // ========================================

    /// Render conditions as a SQL boolean expression with `$n` placeholders
    /// numbered after `starting_param_index`.
    pub fn generate(conditions: &[Condition], starting_param_index: usize) -> (String, Vec<Value>) {
        let mut filter_where = Self { param_values: vec![], param_index: starting_param_index };
        let sql = filter_where.build_all(conditions, " AND ");
        (sql, filter_where.param_values)
    }

    fn build_all(&mut self, conditions: &[Condition], joiner: &str) -> String {
        if conditions.is_empty() {
            return if joiner == " OR " { "1=0".to_string() } else { "1=1".to_string() };
        }
        let parts: Vec<String> = conditions.iter().map(|c| self.build_sql_condition(c)).collect();
        parts.join(joiner)
    }

    fn build_sql_condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::And(items) => format!("({})", self.build_all(items, " AND ")),
            Condition::Or(items) => format!("({})", self.build_all(items, " OR ")),
            Condition::Not(inner) => format!("NOT ({})", self.build_sql_condition(inner)),
            Condition::Field { column, operator, data } => self.build_field_condition(column, *operator, data),
        }
    }

    fn build_field_condition(&mut self, column: &str, operator: FilterOp, data: &Value) -> String {
        let quoted_column = quote_identifier(column);
        match operator {
            FilterOp::Eq => {
                if data.is_null() { format!("{} IS NULL", quoted_column) }
                else { format!("{} = {}", quoted_column, self.param(data.clone())) }
            }
            FilterOp::Ne => {
                if data.is_null() { format!("{} IS NOT NULL", quoted_column) }
                else { format!("{} <> {}", quoted_column, self.param(data.clone())) }
            }
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                let negate = operator == FilterOp::NIn;
                if values.is_empty() {
                    return if negate { "1=1".to_string() } else { "1=0".to_string() };
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if negate { "NOT IN" } else { "IN" };
                format!("{} {} ({})", quoted_column, keyword, params.join(", "))
            }
            FilterOp::Between => {
                let (low, high) = match data {
                    Value::Array(values) if values.len() == 2 => (values[0].clone(), values[1].clone()),
                    _ => (Value::Null, Value::Null),
                };
                format!("{} BETWEEN {} AND {}", quoted_column, self.param(low), self.param(high))
            }
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    // ========================================
    // In-memory evaluation
    // ========================================

    /// Evaluate conditions against a row. SQL three-valued logic applies:
    /// a comparison involving NULL is unknown, and unknown rows do not match.
    pub fn matches(conditions: &[Condition], row: &Map<String, Value>) -> bool {
        Self::eval_all(conditions, row) == Some(true)
    }

    fn eval_all(conditions: &[Condition], row: &Map<String, Value>) -> Option<bool> {
        let mut result = Some(true);
        for condition in conditions {
            match Self::eval(condition, row) {
                Some(false) => return Some(false),
                None => result = None,
                Some(true) => {}
            }
        }
        result
    }

    fn eval(condition: &Condition, row: &Map<String, Value>) -> Option<bool> {
        match condition {
            Condition::And(items) => Self::eval_all(items, row),
            Condition::Or(items) => {
                let mut result = Some(false);
                for item in items {
                    match Self::eval(item, row) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Condition::Not(inner) => Self::eval(inner, row).map(|b| !b),
            Condition::Field { column, operator, data } => {
                let value = row.get(column).unwrap_or(&Value::Null);
                Self::eval_field(value, *operator, data)
            }
        }
    }

    fn eval_field(value: &Value, operator: FilterOp, data: &Value) -> Option<bool> {
        match operator {
            FilterOp::Eq if data.is_null() => Some(value.is_null()),
            FilterOp::Ne if data.is_null() => Some(!value.is_null()),
            _ if value.is_null() => None,
            FilterOp::Eq => values_equal(value, data),
            FilterOp::Ne => values_equal(value, data).map(|b| !b),
            FilterOp::Gt => compare_values(value, data).map(|o| o == Ordering::Greater),
            FilterOp::Gte => compare_values(value, data).map(|o| o != Ordering::Less),
            FilterOp::Lt => compare_values(value, data).map(|o| o == Ordering::Less),
            FilterOp::Lte => compare_values(value, data).map(|o| o != Ordering::Greater),
            FilterOp::Like | FilterOp::ILike => {
                let pattern = data.as_str()?;
                let text = scalar_text(value)?;
                Some(if operator == FilterOp::ILike {
                    like_match(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like_match(&text, pattern)
                })
            }
            FilterOp::In | FilterOp::NIn => {
                let values = match data {
                    Value::Array(values) => values.as_slice(),
                    other => std::slice::from_ref(other),
                };
                let mut result = Some(false);
                for candidate in values {
                    if candidate.is_null() {
                        result = None;
                        continue;
                    }
                    if values_equal(value, candidate) == Some(true) {
                        result = Some(true);
                        break;
                    }
                }
                if operator == FilterOp::NIn { result.map(|b| !b) } else { result }
            }
            FilterOp::Between => {
                let Value::Array(bounds) = data else { return None };
                let (low, high) = (bounds.first()?, bounds.get(1)?);
                let above = compare_values(value, low)? != Ordering::Less;
                let below = compare_values(value, high)? != Ordering::Greater;
                Some(above && below)
            }
        }
    }
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Order two JSON scalars the way Postgres would order the same column values.
/// Mixed or non-scalar types are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => Some(i.cmp(&j)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Array(_), _) | (Value::Object(_), _) | (_, Value::Array(_)) | (_, Value::Object(_)) => Some(a == b),
        _ => compare_values(a, b).map(|o| o == Ordering::Equal),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LikeToken {
    Any,
    One,
    Char(char),
}

/// Postgres LIKE tokens: `%` any run, `_` one character, `\` escapes the next
/// character. A trailing `\` is kept as a literal backslash.
fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::Any,
            '_' => LikeToken::One,
            '\\' => LikeToken::Char(chars.next().unwrap_or('\\')),
            other => LikeToken::Char(other),
        });
    }
    tokens
}

/// SQL LIKE matching against the tokens of `pattern`
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern = like_tokens(pattern);
    let (mut t, mut p) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        let step = match pattern.get(p) {
            Some(LikeToken::One) => true,
            Some(LikeToken::Char(c)) => *c == text[t],
            _ => false,
        };
        if step {
            t += 1;
            p += 1;
        } else if pattern.get(p) == Some(&LikeToken::Any) {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            p = star_p + 1;
            t = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    while pattern.get(p) == Some(&LikeToken::Any) {
        p += 1;
    }
    p == pattern.len()
}
