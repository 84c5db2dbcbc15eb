//! Result normalization
//!
//! Pure, synchronous shaping of store rows into JSON-safe values:
//! - identifiers rendered as 24-char hex strings, dates as RFC 3339
//! - zero-safe ratios rounded to two decimals
//! - 1-based ranks by output position
//! - urgency classification of aged inventory
//! - typed field access on result rows ([`RowExt`])

use crate::error::{MetricsError, MetricsResult};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use shelf_store::{Document, Value};
use std::fmt;

/// Convert a stored value to JSON with stable identifier rendering
#[must_use]
pub fn to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Double(d) => serde_json::Number::from_f64(*d).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.clone()),
        Value::ObjectId(id) => Json::String(id.to_hex()),
        Value::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Document(doc) => document_to_json(doc),
    }
}

/// Convert a document to a JSON object, recursively
#[must_use]
pub fn document_to_json(doc: &Document) -> serde_json::Value {
    serde_json::Value::Object(doc.iter().map(|(k, v)| (k.clone(), to_json(v))).collect())
}

/// Round to two decimal places
#[inline]
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator` rounded to two decimals, `0.0` when the denominator is zero
#[inline]
#[must_use]
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        round2(numerator / denominator)
    }
}

/// Share of `part` in `whole` as a percentage, `0.0` when `whole` is zero
#[inline]
#[must_use]
pub fn percentage(part: f64, whole: f64) -> f64 {
    safe_ratio(part * 100.0, whole)
}

/// Discount of offer price against MRP as a percentage, `0.0` when MRP is not positive
#[must_use]
pub fn discount_percentage(mrp: f64, offer: f64) -> f64 {
    if mrp > 0.0 {
        round2((mrp - offer) / mrp * 100.0)
    } else {
        0.0
    }
}

/// 1-based rank for an output position
#[inline]
#[must_use]
pub fn rank(index: usize) -> u32 {
    u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1))
}

/// Inventory staleness classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Up to 15 days
    Low,
    /// 16 to 30 days
    Medium,
    /// 31 to 60 days
    High,
    /// More than 60 days
    Critical,
}

impl Urgency {
    /// Classify days in inventory
    #[must_use]
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d > 60 => Urgency::Critical,
            d if d > 30 => Urgency::High,
            d if d > 15 => Urgency::Medium,
            _ => Urgency::Low,
        }
    }

    /// Lowercase label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed field access on result rows
pub trait RowExt {
    /// Number at path, `default` when missing or non-numeric
    fn f64_or(&self, path: &str, default: f64) -> f64;

    /// Non-negative count at path, 0 when missing
    fn u64_or_zero(&self, path: &str) -> u64;

    /// Integer at path (doubles truncated), `default` when missing
    fn i64_or(&self, path: &str, default: i64) -> i64;

    /// String at path, `default` when missing or not a string
    fn str_or(&self, path: &str, default: &str) -> String;

    /// Optional string at path
    fn opt_string(&self, path: &str) -> Option<String>;

    /// Identifier at path rendered as string (hex for ObjectId), empty when missing
    fn id_string(&self, path: &str) -> String;

    /// Required integer at path
    ///
    /// # Errors
    /// `MetricsError::MalformedResult` when missing or not integral
    fn require_i64(&self, path: &str, operation: &'static str) -> MetricsResult<i64>;
}

impl RowExt for Document {
    fn f64_or(&self, path: &str, default: f64) -> f64 {
        self.get_f64(path).unwrap_or(default)
    }

    fn u64_or_zero(&self, path: &str) -> u64 {
        self.get_i64(path)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn i64_or(&self, path: &str, default: i64) -> i64 {
        match self.get_path(path) {
            Some(Value::Int(i)) => *i,
            Some(Value::Double(d)) if d.is_finite() => *d as i64,
            _ => default,
        }
    }

    fn str_or(&self, path: &str, default: &str) -> String {
        self.get_str(path).unwrap_or(default).to_string()
    }

    fn opt_string(&self, path: &str) -> Option<String> {
        self.get_str(path).map(str::to_string)
    }

    fn id_string(&self, path: &str) -> String {
        match self.get_path(path) {
            Some(Value::ObjectId(id)) => id.to_hex(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Int(i)) => i.to_string(),
            _ => String::new(),
        }
    }

    fn require_i64(&self, path: &str, operation: &'static str) -> MetricsResult<i64> {
        match self.get_path(path) {
            Some(v) => v.as_i64().ok_or_else(|| {
                MetricsError::malformed(
                    operation,
                    format!("field '{path}' should be an integer, got {}", v.type_name()),
                )
            }),
            None => Err(MetricsError::malformed(
                operation,
                format!("field '{path}' is missing"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shelf_store::{doc, ObjectId};

    #[test]
    fn identifiers_become_hex_recursively() {
        let id = ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60718").unwrap();
        let row = doc! {
            "_id" => id,
            "items" => vec![Value::from(doc! { "_id" => id })],
            "nested" => doc! { "ref" => id },
        };
        let json = document_to_json(&row);
        assert_eq!(json["_id"], "64b7f0c2a1b2c3d4e5f60718");
        assert_eq!(json["items"][0]["_id"], "64b7f0c2a1b2c3d4e5f60718");
        assert_eq!(json["nested"]["ref"], "64b7f0c2a1b2c3d4e5f60718");
    }

    #[test]
    fn ratios_and_discounts() {
        assert_eq!(safe_ratio(10.0, 3.0), 3.33);
        assert_eq!(safe_ratio(5.0, 0.0), 0.0);
        assert_eq!(percentage(7.0, 10.0), 70.0);
        assert_eq!(discount_percentage(100.0, 85.0), 15.0);
        assert_eq!(discount_percentage(0.0, 10.0), 0.0);
    }

    #[test]
    fn urgency_boundaries() {
        let cases = [
            (0, Urgency::Low),
            (15, Urgency::Low),
            (16, Urgency::Medium),
            (30, Urgency::Medium),
            (31, Urgency::High),
            (60, Urgency::High),
            (61, Urgency::Critical),
        ];
        for (days, expected) in cases {
            assert_eq!(Urgency::from_days(days), expected, "days={days}");
        }
        assert_eq!(serde_json::to_value(Urgency::Critical).unwrap(), "critical");
    }

    #[test]
    fn ranks_start_at_one() {
        assert_eq!(rank(0), 1);
        assert_eq!(rank(9), 10);
    }

    #[test]
    fn row_access() {
        let row = doc! { "n" => 3, "s" => "x", "f" => 1.5, "bad" => "y" };
        assert_eq!(row.u64_or_zero("n"), 3);
        assert_eq!(row.u64_or_zero("missing"), 0);
        assert_eq!(row.i64_or("f", 0), 1);
        assert_eq!(row.str_or("missing", "Unknown"), "Unknown");
        assert_eq!(row.f64_or("f", 0.0), 1.5);
        assert!(matches!(
            row.require_i64("bad", "test"),
            Err(MetricsError::MalformedResult { .. })
        ));
    }

    proptest! {
        #[test]
        fn safe_ratio_zero_denominator(n in -1.0e9f64..1.0e9) {
            prop_assert_eq!(safe_ratio(n, 0.0), 0.0);
        }

        #[test]
        fn safe_ratio_rounds_quotient(n in -1.0e6f64..1.0e6, d in 1.0f64..1.0e4) {
            let expected = (n / d * 100.0).round() / 100.0;
            prop_assert_eq!(safe_ratio(n, d), expected);
        }

        #[test]
        fn urgency_is_monotonic(a in 0i64..200, b in 0i64..200) {
            if a <= b {
                prop_assert!(Urgency::from_days(a) <= Urgency::from_days(b));
            }
        }
    }
}
