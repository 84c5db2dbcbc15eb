//! Document value model
//!
//! Store-engine-agnostic representation of stored documents:
//! - [`ObjectId`]: 12-byte opaque identifier rendered as 24 hex characters
//! - [`Value`]: tagged scalar / array / document value
//! - [`Document`]: insertion-ordered field map with dotted-path access
//!
//! Values round-trip through MongoDB extended JSON (`{"$oid": ..}`,
//! `{"$date": ..}`) so datasets exported from a live store load unchanged.

use crate::error::{ObjectIdError, StoreError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque 12-byte document identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Create from raw bytes
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Generate a process-unique identifier (seconds timestamp + counter)
    #[must_use]
    pub fn generate() -> Self {
        let secs = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
        let counter = OBJECT_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..].copy_from_slice(&counter.to_be_bytes());
        Self(bytes)
    }

    /// Lowercase hex rendering
    #[inline]
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse 24 hex characters
    ///
    /// # Errors
    /// `ObjectIdError` when the text is not exactly 24 hex digits
    pub fn parse_str(text: &str) -> Result<Self, ObjectIdError> {
        if text.len() != 24 {
            return Err(ObjectIdError(text.to_string()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(text, &mut bytes).map_err(|_| ObjectIdError(text.to_string()))?;
        Ok(Self(bytes))
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse_str(&text).map_err(serde::de::Error::custom)
    }
}

/// Stored value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// Double precision float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Opaque identifier
    ObjectId(ObjectId),
    /// UTC timestamp
    DateTime(DateTime<Utc>),
    /// Ordered sequence
    Array(Vec<Value>),
    /// Nested document
    Document(Document),
}

impl Value {
    /// Type name used in diagnostics
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::ObjectId(_) => "objectId",
            Value::DateTime(_) => "date",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
        }
    }

    /// Check for null
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric value as f64
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Integral value as i64
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Double(d) if d.fract() == 0.0 && d.is_finite() => Some(*d as i64),
            _ => None,
        }
    }

    /// String slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Identifier
    #[inline]
    #[must_use]
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    /// Timestamp
    #[inline]
    #[must_use]
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Array elements
    #[inline]
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Nested document
    #[inline]
    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Truthiness for boolean expression operators
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Double(d) => *d != 0.0,
            _ => true,
        }
    }

    // Cross-type ordering bracket, numbers share one bracket.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 1,
            Value::Int(_) | Value::Double(_) => 2,
            Value::String(_) => 3,
            Value::Document(_) => 4,
            Value::Array(_) => 5,
            Value::ObjectId(_) => 7,
            Value::Bool(_) => 8,
            Value::DateTime(_) => 9,
        }
    }

    /// Total order across all values (used by sort stages)
    #[must_use]
    pub fn compare(&self, other: &Value) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Document(a), Value::Document(b)) => {
                Value::Document(a.clone())
                    .canonical_key()
                    .cmp(&Value::Document(b.clone()).canonical_key())
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        }
    }

    /// Ordering only within the same type bracket (range query semantics)
    #[must_use]
    pub fn comparable(&self, other: &Value) -> Option<Ordering> {
        (self.type_rank() == other.type_rank()).then(|| self.compare(other))
    }

    /// Equality with numeric widening (`Int(3) == Double(3.0)`)
    #[inline]
    #[must_use]
    pub fn loose_eq(&self, other: &Value) -> bool {
        self.comparable(other) == Some(Ordering::Equal)
    }

    /// Canonical text used as a grouping / set-membership key
    #[must_use]
    pub fn canonical_key(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => format!("b:{b}"),
            Value::Int(_) | Value::Double(_) => {
                // +0.0 folds negative zero
                format!("n:{}", self.as_f64().unwrap_or_default() + 0.0)
            }
            Value::String(s) => format!("s:{s:?}"),
            Value::ObjectId(id) => format!("o:{}", id.to_hex()),
            Value::DateTime(dt) => format!("d:{}", dt.timestamp_millis()),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::canonical_key).collect();
                format!("[{}]", parts.join(","))
            }
            Value::Document(doc) => {
                let parts: Vec<String> = doc
                    .iter()
                    .map(|(k, v)| format!("{k:?}={}", v.canonical_key()))
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
        }
    }

    /// Convert from MongoDB extended JSON
    ///
    /// # Errors
    /// `StoreError::ExtendedJson` for malformed `$oid` / `$date` wrappers
    pub fn from_extended_json(json: serde_json::Value) -> Result<Value, StoreError> {
        use serde_json::Value as Json;

        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n
                    .as_f64()
                    .map(Value::Double)
                    .ok_or_else(|| StoreError::ExtendedJson(format!("unsupported number {n}"))),
            },
            Json::String(s) => Ok(Value::String(s)),
            Json::Array(items) => items
                .into_iter()
                .map(Value::from_extended_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Json::Object(map) => {
                if map.len() == 1 {
                    if let Some(wrapped) = unwrap_extended(&map)? {
                        return Ok(wrapped);
                    }
                }
                let mut doc = Document::new();
                for (key, value) in map {
                    doc.insert(key, Value::from_extended_json(value)?);
                }
                Ok(Value::Document(doc))
            }
        }
    }

    /// Convert to MongoDB extended JSON (relaxed form)
    #[must_use]
    pub fn to_extended_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::ObjectId(id) => serde_json::json!({ "$oid": id.to_hex() }),
            Value::DateTime(dt) => {
                serde_json::json!({ "$date": dt.to_rfc3339_opts(SecondsFormat::Millis, true) })
            }
            Value::Array(items) => Json::Array(items.iter().map(Value::to_extended_json).collect()),
            Value::Document(doc) => doc.to_extended_json(),
        }
    }
}

fn unwrap_extended(
    map: &serde_json::Map<String, serde_json::Value>,
) -> Result<Option<Value>, StoreError> {
    use serde_json::Value as Json;

    if let Some(oid) = map.get("$oid") {
        let text = oid
            .as_str()
            .ok_or_else(|| StoreError::ExtendedJson("$oid must be a string".into()))?;
        return Ok(Some(Value::ObjectId(ObjectId::parse_str(text)?)));
    }
    if let Some(date) = map.get("$date") {
        let parsed = match date {
            Json::String(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::ExtendedJson(format!("bad $date '{text}': {e}")))?,
            Json::Number(n) => millis_to_datetime(n.as_i64())?,
            Json::Object(inner) => millis_to_datetime(
                inner
                    .get("$numberLong")
                    .and_then(Json::as_str)
                    .and_then(|s| s.parse().ok()),
            )?,
            other => return Err(StoreError::ExtendedJson(format!("bad $date {other}"))),
        };
        return Ok(Some(Value::DateTime(parsed)));
    }
    if let Some(long) = map.get("$numberLong").and_then(Json::as_str) {
        return long
            .parse()
            .map(|i| Some(Value::Int(i)))
            .map_err(|_| StoreError::ExtendedJson(format!("bad $numberLong '{long}'")));
    }
    if let Some(double) = map
        .get("$numberDouble")
        .or_else(|| map.get("$numberDecimal"))
        .and_then(Json::as_str)
    {
        return double
            .parse()
            .map(|d| Some(Value::Double(d)))
            .map_err(|_| StoreError::ExtendedJson(format!("bad number '{double}'")));
    }
    Ok(None)
}

/// Parse an ISO-8601 timestamp leniently
///
/// Accepts RFC 3339 with offset, naive date-time (read as UTC) and bare
/// dates (midnight UTC).
#[must_use]
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn millis_to_datetime(millis: Option<i64>) -> Result<DateTime<Utc>, StoreError> {
    millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| StoreError::ExtendedJson("bad $date milliseconds".into()))
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::ObjectId(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Insertion-ordered document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document(IndexMap<String, Value>);

impl Document {
    /// Create empty document
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Top-level field
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Remove top-level field preserving order of the rest
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Check for top-level field
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of top-level fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if document has no fields
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Field at dotted path, descending through nested documents only
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Document(doc) => doc.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Expression-style path lookup: arrays along the path are mapped
    ///
    /// `items.quantity` on `{items: [{quantity: 1}, {quantity: 2}]}` yields `[1, 2]`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let segments: Vec<&str> = path.split('.').collect();
        let (head, rest) = segments.split_first()?;
        lookup_in(self.0.get(*head)?, rest)
    }

    /// Predicate-style path resolution: every leaf reachable through arrays
    #[must_use]
    pub fn resolve_all(&self, path: &str) -> Vec<&Value> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut out = Vec::new();
        if let Some((head, rest)) = segments.split_first() {
            if let Some(value) = self.0.get(*head) {
                resolve_in(value, rest, &mut out);
            }
        }
        out
    }

    /// Set value at dotted path, creating intermediate documents
    pub fn set_path(&mut self, path: &str, value: Value) {
        match path.split_once('.') {
            None => {
                self.0.insert(path.to_string(), value);
            }
            Some((head, rest)) => {
                let entry = self
                    .0
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Document(Document::new()));
                if !matches!(entry, Value::Document(_)) {
                    *entry = Value::Document(Document::new());
                }
                if let Value::Document(child) = entry {
                    child.set_path(rest, value);
                }
            }
        }
    }

    /// Remove value at dotted path
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        match path.split_once('.') {
            None => self.remove(path),
            Some((head, rest)) => match self.0.get_mut(head) {
                Some(Value::Document(child)) => child.remove_path(rest),
                _ => None,
            },
        }
    }

    /// String at path
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(Value::as_str)
    }

    /// Number at path
    #[must_use]
    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get_path(path).and_then(Value::as_f64)
    }

    /// Integer at path
    #[must_use]
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get_path(path).and_then(Value::as_i64)
    }

    /// Identifier at path
    #[must_use]
    pub fn get_object_id(&self, path: &str) -> Option<ObjectId> {
        self.get_path(path).and_then(Value::as_object_id)
    }

    /// Timestamp at path
    #[must_use]
    pub fn get_datetime(&self, path: &str) -> Option<DateTime<Utc>> {
        self.get_path(path).and_then(Value::as_datetime)
    }

    /// Nested document at path
    #[must_use]
    pub fn get_document(&self, path: &str) -> Option<&Document> {
        self.get_path(path).and_then(Value::as_document)
    }

    /// Array at path
    #[must_use]
    pub fn get_array(&self, path: &str) -> Option<&[Value]> {
        self.get_path(path).and_then(Value::as_array)
    }

    /// Convert from an extended JSON object
    ///
    /// # Errors
    /// `StoreError::ExtendedJson` when the input is not an object or holds bad wrappers
    pub fn from_extended_json(json: serde_json::Value) -> Result<Document, StoreError> {
        match Value::from_extended_json(json)? {
            Value::Document(doc) => Ok(doc),
            other => Err(StoreError::ExtendedJson(format!(
                "expected document, got {}",
                other.type_name()
            ))),
        }
    }

    /// Convert to extended JSON object
    #[must_use]
    pub fn to_extended_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_extended_json()))
                .collect(),
        )
    }
}

fn lookup_in(value: &Value, segments: &[&str]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        Value::Document(doc) => doc.get(head).and_then(|v| lookup_in(v, rest)),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter(|item| matches!(item, Value::Document(_)))
                .filter_map(|item| lookup_in(item, segments))
                .collect(),
        )),
        _ => None,
    }
}

fn resolve_in<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Document(doc) => {
            if let Some(child) = doc.get(head) {
                resolve_in(child, rest, out);
            }
        }
        Value::Array(items) => {
            for item in items.iter().filter(|i| matches!(i, Value::Document(_))) {
                resolve_in(item, segments, out);
            }
        }
        _ => {}
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Build a [`Document`] from `key => value` pairs
///
/// ```
/// use shelf_store::doc;
/// let order = doc! { "status" => "COMPLETED", "total" => 120.5 };
/// assert_eq!(order.get_str("status"), Some("COMPLETED"));
/// ```
#[macro_export]
macro_rules! doc {
    () => { $crate::Document::new() };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut document = $crate::Document::new();
        $( document.insert($key, $value); )+
        document
    }};
}
