//! Match predicates
//!
//! A [`Predicate`] is the typed form of a store match document. It can be:
//! - built directly by pipeline builders (`Predicate::eq`, `Predicate::and`, ...)
//! - compiled from a JSON filter document ([`Predicate::from_json`])
//! - rendered back to store-native JSON for logging ([`Predicate::to_json`])
//!
//! Matching follows document-store semantics: a dotted path that crosses an
//! array matches when any element satisfies the condition, and range
//! comparisons only succeed between values of the same type bracket.

use crate::error::{StoreError, StoreResult};
use crate::value::{parse_datetime, Document, Value};
use regex::RegexBuilder;
use std::cmp::Ordering;

/// Boolean match condition over a document
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every document
    All,
    /// Field equals value
    Eq(String, Value),
    /// Field does not equal value
    Ne(String, Value),
    /// Field greater than value
    Gt(String, Value),
    /// Field greater than or equal to value
    Gte(String, Value),
    /// Field less than value
    Lt(String, Value),
    /// Field less than or equal to value
    Lte(String, Value),
    /// Field equals any of the values
    In(String, Vec<Value>),
    /// Field equals none of the values
    Nin(String, Vec<Value>),
    /// String field matches pattern
    Regex {
        /// Dotted field path
        path: String,
        /// Regular expression source
        pattern: String,
        /// Case-insensitive matching
        case_insensitive: bool,
    },
    /// Field presence
    Exists(String, bool),
    /// All clauses match
    And(Vec<Predicate>),
    /// At least one clause matches
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Equality clause
    #[must_use]
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(path.into(), value.into())
    }

    /// Inequality clause
    #[must_use]
    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(path.into(), value.into())
    }

    /// Greater-than-or-equal clause
    #[must_use]
    pub fn gte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(path.into(), value.into())
    }

    /// Less-than-or-equal clause
    #[must_use]
    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(path.into(), value.into())
    }

    /// Set membership clause
    #[must_use]
    pub fn is_in<V: Into<Value>>(path: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(path.into(), values.into_iter().map(Into::into).collect())
    }

    /// Set exclusion clause
    #[must_use]
    pub fn not_in<V: Into<Value>>(
        path: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Nin(path.into(), values.into_iter().map(Into::into).collect())
    }

    /// Case-insensitive substring search for literal text
    #[must_use]
    pub fn contains_ignore_case(path: impl Into<String>, text: &str) -> Self {
        Self::Regex {
            path: path.into(),
            pattern: regex::escape(text),
            case_insensitive: true,
        }
    }

    /// Conjunction, flattening nested `And` and dropping `All`
    #[must_use]
    pub fn and(clauses: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for clause in clauses {
            match clause {
                Predicate::All => {}
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Predicate::All,
            1 => flat.swap_remove(0),
            _ => Predicate::And(flat),
        }
    }

    /// Disjunction
    #[must_use]
    pub fn or(clauses: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(clauses.into_iter().collect())
    }

    /// Combine with another predicate
    #[must_use]
    pub fn and_also(self, other: Predicate) -> Self {
        Predicate::and([self, other])
    }

    /// Check whether this predicate matches everything
    #[inline]
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Predicate::All)
    }

    /// Evaluate against a document
    ///
    /// # Errors
    /// `StoreError::InvalidFilter` when a regex clause does not compile
    pub fn matches(&self, doc: &Document) -> StoreResult<bool> {
        Ok(match self {
            Predicate::All => true,
            Predicate::Eq(path, target) => field_equals(doc, path, target),
            Predicate::Ne(path, target) => !field_equals(doc, path, target),
            Predicate::Gt(path, target) => field_compares(doc, path, target, Ordering::is_gt),
            Predicate::Gte(path, target) => field_compares(doc, path, target, Ordering::is_ge),
            Predicate::Lt(path, target) => field_compares(doc, path, target, Ordering::is_lt),
            Predicate::Lte(path, target) => field_compares(doc, path, target, Ordering::is_le),
            Predicate::In(path, values) => values.iter().any(|v| field_equals(doc, path, v)),
            Predicate::Nin(path, values) => !values.iter().any(|v| field_equals(doc, path, v)),
            Predicate::Regex {
                path,
                pattern,
                case_insensitive,
            } => {
                let re = RegexBuilder::new(pattern)
                    .case_insensitive(*case_insensitive)
                    .build()
                    .map_err(|e| StoreError::InvalidFilter(format!("regex '{pattern}': {e}")))?;
                candidates(doc, path)
                    .iter()
                    .any(|v| v.as_str().is_some_and(|s| re.is_match(s)))
            }
            Predicate::Exists(path, wanted) => doc.resolve_all(path).is_empty() != *wanted,
            Predicate::And(clauses) => {
                for clause in clauses {
                    if !clause.matches(doc)? {
                        return Ok(false);
                    }
                }
                true
            }
            Predicate::Or(clauses) => {
                for clause in clauses {
                    if clause.matches(doc)? {
                        return Ok(true);
                    }
                }
                false
            }
        })
    }

    /// Compile a JSON filter document
    ///
    /// Supports field equality, `$eq $ne $gt $gte $lt $lte $in $nin $regex
    /// $exists` and `$and $or`. String operands of range comparisons that
    /// parse as dates are compared as dates.
    ///
    /// # Errors
    /// `StoreError::InvalidFilter` for unknown operators or malformed operands
    pub fn from_json(filter: &serde_json::Value) -> StoreResult<Predicate> {
        let map = filter
            .as_object()
            .ok_or_else(|| StoreError::InvalidFilter("filter must be a JSON object".into()))?;

        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            match key.as_str() {
                "$and" | "$or" => {
                    let items = value.as_array().ok_or_else(|| {
                        StoreError::InvalidFilter(format!("{key} expects an array"))
                    })?;
                    let inner = items
                        .iter()
                        .map(Predicate::from_json)
                        .collect::<StoreResult<Vec<_>>>()?;
                    clauses.push(if key == "$and" {
                        Predicate::and(inner)
                    } else {
                        Predicate::or(inner)
                    });
                }
                op if op.starts_with('$') => {
                    return Err(StoreError::InvalidFilter(format!(
                        "unsupported top-level operator {op}"
                    )));
                }
                field => clauses.extend(compile_field(field, value)?),
            }
        }
        Ok(Predicate::and(clauses))
    }

    /// Render as store-native JSON
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let op = |path: &str, name: &str, v: serde_json::Value| json!({ path: { name: v } });
        match self {
            Predicate::All => json!({}),
            Predicate::Eq(path, v) => json!({ path: v.to_extended_json() }),
            Predicate::Ne(path, v) => op(path, "$ne", v.to_extended_json()),
            Predicate::Gt(path, v) => op(path, "$gt", v.to_extended_json()),
            Predicate::Gte(path, v) => op(path, "$gte", v.to_extended_json()),
            Predicate::Lt(path, v) => op(path, "$lt", v.to_extended_json()),
            Predicate::Lte(path, v) => op(path, "$lte", v.to_extended_json()),
            Predicate::In(path, vs) => op(path, "$in", values_json(vs)),
            Predicate::Nin(path, vs) => op(path, "$nin", values_json(vs)),
            Predicate::Regex {
                path,
                pattern,
                case_insensitive,
            } => {
                let options = if *case_insensitive { "i" } else { "" };
                json!({ path: { "$regex": pattern, "$options": options } })
            }
            Predicate::Exists(path, flag) => op(path, "$exists", json!(flag)),
            Predicate::And(clauses) => {
                json!({ "$and": clauses.iter().map(Predicate::to_json).collect::<Vec<_>>() })
            }
            Predicate::Or(clauses) => {
                json!({ "$or": clauses.iter().map(Predicate::to_json).collect::<Vec<_>>() })
            }
        }
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::All
    }
}

fn values_json(values: &[Value]) -> serde_json::Value {
    serde_json::Value::Array(values.iter().map(Value::to_extended_json).collect())
}

// Leaves plus the elements of array leaves.
fn candidates<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for leaf in doc.resolve_all(path) {
        out.push(leaf);
        if let Value::Array(items) = leaf {
            out.extend(items.iter());
        }
    }
    out
}

fn field_equals(doc: &Document, path: &str, target: &Value) -> bool {
    let found = candidates(doc, path);
    if found.is_empty() {
        return target.is_null();
    }
    found.iter().any(|v| v.loose_eq(target))
}

fn field_compares(doc: &Document, path: &str, target: &Value, accept: fn(Ordering) -> bool) -> bool {
    candidates(doc, path)
        .iter()
        .any(|v| v.comparable(target).is_some_and(accept))
}

fn is_literal_wrapper(map: &serde_json::Map<String, serde_json::Value>) -> bool {
    ["$oid", "$date", "$numberLong", "$numberDouble", "$numberDecimal"]
        .iter()
        .any(|k| map.contains_key(*k))
}

fn compile_field(field: &str, value: &serde_json::Value) -> StoreResult<Vec<Predicate>> {
    let operators = match value.as_object() {
        Some(map) if !map.is_empty() && !is_literal_wrapper(map) && map.keys().all(|k| k.starts_with('$')) => map,
        _ => return Ok(vec![Predicate::Eq(field.to_string(), operand(value)?)]),
    };

    let path = field.to_string();
    let mut clauses = Vec::with_capacity(operators.len());
    for (op, arg) in operators {
        let clause = match op.as_str() {
            "$eq" => Predicate::Eq(path.clone(), operand(arg)?),
            "$ne" => Predicate::Ne(path.clone(), operand(arg)?),
            "$gt" => Predicate::Gt(path.clone(), range_operand(arg)?),
            "$gte" => Predicate::Gte(path.clone(), range_operand(arg)?),
            "$lt" => Predicate::Lt(path.clone(), range_operand(arg)?),
            "$lte" => Predicate::Lte(path.clone(), range_operand(arg)?),
            "$in" => Predicate::In(path.clone(), list_operand(op, arg)?),
            "$nin" => Predicate::Nin(path.clone(), list_operand(op, arg)?),
            "$regex" => {
                let pattern = arg
                    .as_str()
                    .ok_or_else(|| StoreError::InvalidFilter("$regex expects a string".into()))?;
                let case_insensitive = operators
                    .get("$options")
                    .and_then(serde_json::Value::as_str)
                    .is_some_and(|o| o.contains('i'));
                Predicate::Regex {
                    path: path.clone(),
                    pattern: pattern.to_string(),
                    case_insensitive,
                }
            }
            "$options" => continue,
            "$exists" => Predicate::Exists(path.clone(), arg.as_bool().unwrap_or(true)),
            other => {
                return Err(StoreError::InvalidFilter(format!(
                    "unsupported operator {other} on '{field}'"
                )))
            }
        };
        clauses.push(clause);
    }
    Ok(clauses)
}

fn operand(value: &serde_json::Value) -> StoreResult<Value> {
    Value::from_extended_json(value.clone())
}

fn range_operand(value: &serde_json::Value) -> StoreResult<Value> {
    if let Some(dt) = value.as_str().and_then(parse_datetime) {
        return Ok(Value::DateTime(dt));
    }
    operand(value)
}

fn list_operand(op: &str, value: &serde_json::Value) -> StoreResult<Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| StoreError::InvalidFilter(format!("{op} expects an array")))?
        .iter()
        .map(operand)
        .collect()
}
