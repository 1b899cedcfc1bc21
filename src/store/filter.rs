//! Metadata filters in the `where` document style of vector databases.
//!
//! ```json
//! {"type": "pdf"}
//! {"size": {"$gte": 1000}}
//! {"$or": [{"type": {"$in": ["xlsx", "xls"]}}, {"author": "Sam"}]}
//! ```
//! Several keys in one object combine with `$and`. A key missing from the
//! metadata only satisfies `$ne` and `$nin`.

use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

use crate::loader::{Metadata, MetadataValue};

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("filter must be a JSON object")]
    NotAnObject,

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("'{0}' expects a non-empty array of filters")]
    ExpectedFilterList(String),

    #[error("'{0}' expects an array of scalar values")]
    ExpectedValueList(String),

    #[error("'{op}' on '{key}' expects a number")]
    ExpectedNumber { key: String, op: String },

    #[error("value for '{0}' must be a string, number or boolean")]
    ExpectedScalar(String),

    #[error("condition on '{0}' has no operator")]
    EmptyCondition(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(MetadataValue),
    Ne(MetadataValue),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    In(Vec<MetadataValue>),
    Nin(Vec<MetadataValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every sub-filter holds; an empty list always holds.
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Field { key: String, condition: Condition },
}

impl Filter {
    /// Parse a filter document.
    pub fn parse(value: &Value) -> Result<Self, FilterError> {
        let object = value.as_object().ok_or(FilterError::NotAnObject)?;

        let mut clauses = Vec::with_capacity(object.len());
        for (key, value) in object {
            match key.as_str() {
                "$and" => clauses.push(Filter::And(parse_list(key, value)?)),
                "$or" => clauses.push(Filter::Or(parse_list(key, value)?)),
                op if op.starts_with('$') => {
                    return Err(FilterError::UnknownOperator(op.to_string()));
                }
                field => clauses.extend(parse_field(field, value)?),
            }
        }

        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        })
    }

    /// `type $in kinds`.
    pub fn kind_in<S: AsRef<str>>(kinds: &[S]) -> Self {
        Filter::Field {
            key: "type".to_string(),
            condition: Condition::In(
                kinds
                    .iter()
                    .map(|k| MetadataValue::String(k.as_ref().trim_start_matches('.').to_lowercase()))
                    .collect(),
            ),
        }
    }

    /// Combine optional filters with `$and`; `None` when there is nothing to combine.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Option<Self> {
        let mut filters: Vec<Filter> = filters.into_iter().collect();
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::And(filters)),
        }
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(metadata)),
            Filter::Field { key, condition } => condition.matches(metadata.get(key)),
        }
    }
}

impl Condition {
    fn matches(&self, value: Option<&MetadataValue>) -> bool {
        let Some(value) = value else {
            return matches!(self, Condition::Ne(_) | Condition::Nin(_));
        };
        match self {
            Condition::Eq(expected) => values_equal(value, expected),
            Condition::Ne(expected) => !values_equal(value, expected),
            Condition::Gt(bound) => compare(value, *bound).is_some_and(Ordering::is_gt),
            Condition::Gte(bound) => compare(value, *bound).is_some_and(Ordering::is_ge),
            Condition::Lt(bound) => compare(value, *bound).is_some_and(Ordering::is_lt),
            Condition::Lte(bound) => compare(value, *bound).is_some_and(Ordering::is_le),
            Condition::In(options) => options.iter().any(|o| values_equal(value, o)),
            Condition::Nin(options) => !options.iter().any(|o| values_equal(value, o)),
        }
    }
}

fn values_equal(a: &MetadataValue, b: &MetadataValue) -> bool {
    match (a, b) {
        (MetadataValue::String(x), MetadataValue::String(y)) => x == y,
        (MetadataValue::Bool(x), MetadataValue::Bool(y)) => x == y,
        (MetadataValue::Int(x), MetadataValue::Int(y)) => x == y,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn compare(value: &MetadataValue, bound: f64) -> Option<Ordering> {
    value.as_f64()?.partial_cmp(&bound)
}

fn parse_list(op: &str, value: &Value) -> Result<Vec<Filter>, FilterError> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| FilterError::ExpectedFilterList(op.to_string()))?;
    items.iter().map(Filter::parse).collect()
}

fn parse_field(key: &str, value: &Value) -> Result<Vec<Filter>, FilterError> {
    let Some(ops) = value.as_object() else {
        let condition = Condition::Eq(parse_scalar(key, value)?);
        return Ok(vec![Filter::Field {
            key: key.to_string(),
            condition,
        }]);
    };

    if ops.is_empty() {
        return Err(FilterError::EmptyCondition(key.to_string()));
    }

    ops.iter()
        .map(|(op, operand)| {
            let number = || {
                operand.as_f64().ok_or_else(|| FilterError::ExpectedNumber {
                    key: key.to_string(),
                    op: op.clone(),
                })
            };
            let condition = match op.as_str() {
                "$eq" => Condition::Eq(parse_scalar(key, operand)?),
                "$ne" => Condition::Ne(parse_scalar(key, operand)?),
                "$gt" => Condition::Gt(number()?),
                "$gte" => Condition::Gte(number()?),
                "$lt" => Condition::Lt(number()?),
                "$lte" => Condition::Lte(number()?),
                "$in" => Condition::In(parse_scalars(key, op, operand)?),
                "$nin" => Condition::Nin(parse_scalars(key, op, operand)?),
                other => return Err(FilterError::UnknownOperator(other.to_string())),
            };
            Ok(Filter::Field {
                key: key.to_string(),
                condition,
            })
        })
        .collect()
}

fn parse_scalars(key: &str, op: &str, value: &Value) -> Result<Vec<MetadataValue>, FilterError> {
    let items = value
        .as_array()
        .ok_or_else(|| FilterError::ExpectedValueList(op.to_string()))?;
    items.iter().map(|item| parse_scalar(key, item)).collect()
}

fn parse_scalar(key: &str, value: &Value) -> Result<MetadataValue, FilterError> {
    match value {
        Value::String(s) => Ok(MetadataValue::String(s.clone())),
        Value::Bool(b) => Ok(MetadataValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(MetadataValue::Int(i)),
            None => n
                .as_f64()
                .map(MetadataValue::Float)
                .ok_or_else(|| FilterError::ExpectedScalar(key.to_string())),
        },
        _ => Err(FilterError::ExpectedScalar(key.to_string())),
    }
}
