//! Typed aggregation stage language
//!
//! Pipelines are built from [`Stage`]s operating on documents:
//! - `Match`, `Unwind`, `Group`, `Lookup`, `Project`, `AddFields`
//! - `Sort`, `Skip`, `Limit`, `Count`
//! - `Facet` for parallel sub-pipelines over the same input
//!
//! Computed values inside stages are [`Expr`] trees; group outputs are
//! [`Accumulator`]s. Every pipeline renders to store-native JSON through
//! [`Pipeline::to_json`] for debug logging.

use crate::predicate::Predicate;
use crate::store::Collection;
use crate::value::Value;
use serde_json::json;

/// Computed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Dotted field path (`$items.quantity`)
    Field(String),
    /// Constant value
    Literal(Value),
    /// Nested document of expressions
    Object(Vec<(String, Expr)>),
    /// Calendar year of a date
    Year(Box<Expr>),
    /// Calendar month (1-12) of a date
    Month(Box<Expr>),
    /// Hour of day (0-23, UTC) of a date
    Hour(Box<Expr>),
    /// Length of an array
    Size(Box<Expr>),
    /// String rendering
    ToString(Box<Expr>),
    /// Round number to decimal places
    Round(Box<Expr>, u32),
    /// Element at index (negative counts from the end)
    ArrayElemAt(Box<Expr>, i64),
    /// First expression unless null or missing, then second
    IfNull(Box<Expr>, Box<Expr>),
    /// `left >= right`
    Gte(Box<Expr>, Box<Expr>),
    /// `left < right`
    Lt(Box<Expr>, Box<Expr>),
    /// All operands truthy
    And(Vec<Expr>),
    /// First branch whose case is truthy, otherwise default
    Switch {
        /// `(case, then)` pairs
        branches: Vec<(Expr, Expr)>,
        /// Value when no branch matches
        default: Box<Expr>,
    },
}

impl Expr {
    /// Field reference
    #[inline]
    #[must_use]
    pub fn field(path: impl Into<String>) -> Self {
        Expr::Field(path.into())
    }

    /// Constant
    #[inline]
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Null constant (group-all key)
    #[inline]
    #[must_use]
    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    /// Nested document
    #[must_use]
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Expr)>) -> Self {
        Expr::Object(fields.into_iter().map(|(k, e)| (k.into(), e)).collect())
    }

    /// Year of date
    #[must_use]
    pub fn year(self) -> Self {
        Expr::Year(Box::new(self))
    }

    /// Month of date
    #[must_use]
    pub fn month(self) -> Self {
        Expr::Month(Box::new(self))
    }

    /// Hour of date
    #[must_use]
    pub fn hour(self) -> Self {
        Expr::Hour(Box::new(self))
    }

    /// Array length
    #[must_use]
    pub fn size(self) -> Self {
        Expr::Size(Box::new(self))
    }

    /// String rendering
    #[must_use]
    pub fn to_string_expr(self) -> Self {
        Expr::ToString(Box::new(self))
    }

    /// Round to places
    #[must_use]
    pub fn round(self, places: u32) -> Self {
        Expr::Round(Box::new(self), places)
    }

    /// Element at index
    #[must_use]
    pub fn elem_at(self, index: i64) -> Self {
        Expr::ArrayElemAt(Box::new(self), index)
    }

    /// Replace null / missing with fallback
    #[must_use]
    pub fn if_null(self, fallback: Expr) -> Self {
        Expr::IfNull(Box::new(self), Box::new(fallback))
    }

    /// `self >= other`
    #[must_use]
    pub fn gte(self, other: Expr) -> Self {
        Expr::Gte(Box::new(self), Box::new(other))
    }

    /// `self < other`
    #[must_use]
    pub fn lt(self, other: Expr) -> Self {
        Expr::Lt(Box::new(self), Box::new(other))
    }

    /// Half-open range check `low <= self < high`
    #[must_use]
    pub fn within(self, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Expr::And(vec![
            self.clone().gte(Expr::lit(low)),
            self.lt(Expr::lit(high)),
        ])
    }

    /// Render as store-native JSON
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let unary = |name: &str, e: &Expr| json!({ name: e.to_json() });
        match self {
            Expr::Field(path) => json!(format!("${path}")),
            Expr::Literal(v) => v.to_extended_json(),
            Expr::Object(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, e)| (k.clone(), e.to_json())).collect(),
            ),
            Expr::Year(e) => unary("$year", e),
            Expr::Month(e) => unary("$month", e),
            Expr::Hour(e) => unary("$hour", e),
            Expr::Size(e) => unary("$size", e),
            Expr::ToString(e) => unary("$toString", e),
            Expr::Round(e, places) => json!({ "$round": [e.to_json(), places] }),
            Expr::ArrayElemAt(e, index) => json!({ "$arrayElemAt": [e.to_json(), index] }),
            Expr::IfNull(a, b) => json!({ "$ifNull": [a.to_json(), b.to_json()] }),
            Expr::Gte(a, b) => json!({ "$gte": [a.to_json(), b.to_json()] }),
            Expr::Lt(a, b) => json!({ "$lt": [a.to_json(), b.to_json()] }),
            Expr::And(items) => json!({ "$and": items.iter().map(Expr::to_json).collect::<Vec<_>>() }),
            Expr::Switch { branches, default } => json!({
                "$switch": {
                    "branches": branches
                        .iter()
                        .map(|(case, then)| json!({ "case": case.to_json(), "then": then.to_json() }))
                        .collect::<Vec<_>>(),
                    "default": default.to_json(),
                }
            }),
        }
    }
}

/// Group accumulator
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Numeric sum (non-numeric values ignored)
    Sum(Expr),
    /// Numeric mean, null when no numeric input
    Avg(Expr),
    /// Value from the first document of the group
    First(Expr),
    /// All values in input order
    Push(Expr),
    /// Distinct values in first-seen order
    AddToSet(Expr),
}

impl Accumulator {
    /// Count documents (`$sum: 1`)
    #[inline]
    #[must_use]
    pub fn count() -> Self {
        Accumulator::Sum(Expr::lit(1))
    }

    /// Sum of field
    #[inline]
    #[must_use]
    pub fn sum(path: &str) -> Self {
        Accumulator::Sum(Expr::field(path))
    }

    /// First value of field
    #[inline]
    #[must_use]
    pub fn first(path: &str) -> Self {
        Accumulator::First(Expr::field(path))
    }

    /// Distinct values of field
    #[inline]
    #[must_use]
    pub fn add_to_set(path: &str) -> Self {
        Accumulator::AddToSet(Expr::field(path))
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Accumulator::Sum(e) => json!({ "$sum": e.to_json() }),
            Accumulator::Avg(e) => json!({ "$avg": e.to_json() }),
            Accumulator::First(e) => json!({ "$first": e.to_json() }),
            Accumulator::Push(e) => json!({ "$push": e.to_json() }),
            Accumulator::AddToSet(e) => json!({ "$addToSet": e.to_json() }),
        }
    }
}

/// Projection of a single output field
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Keep the input field
    Include,
    /// Drop the input field
    Exclude,
    /// Computed value
    Computed(Expr),
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

impl SortOrder {
    fn to_json(self) -> serde_json::Value {
        match self {
            SortOrder::Ascending => json!(1),
            SortOrder::Descending => json!(-1),
        }
    }
}

/// Single pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep matching documents
    Match(Predicate),
    /// One output document per array element
    Unwind {
        /// Dotted path of the array field
        path: String,
        /// Keep documents whose array is missing, null or empty
        preserve_empty: bool,
    },
    /// Group by key expression
    Group {
        /// Group key (`_id` of output)
        key: Expr,
        /// Output fields
        fields: Vec<(String, Accumulator)>,
    },
    /// Left outer join against another collection
    Lookup {
        /// Joined collection
        from: Collection,
        /// Field of the input document
        local_field: String,
        /// Field of the joined document
        foreign_field: String,
        /// Output array field
        as_field: String,
    },
    /// Reshape documents
    Project(Vec<(String, Projection)>),
    /// Add or replace computed fields
    AddFields(Vec<(String, Expr)>),
    /// Stable sort by keys
    Sort(Vec<(String, SortOrder)>),
    /// Drop leading documents
    Skip(u64),
    /// Keep leading documents
    Limit(u64),
    /// Single document `{field: n}`, nothing when input is empty
    Count(String),
    /// Named sub-pipelines over the same input, one output document
    Facet(Vec<(String, Pipeline)>),
}

impl Stage {
    /// Stage operator name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Unwind { .. } => "$unwind",
            Stage::Group { .. } => "$group",
            Stage::Lookup { .. } => "$lookup",
            Stage::Project(_) => "$project",
            Stage::AddFields(_) => "$addFields",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
            Stage::Count(_) => "$count",
            Stage::Facet(_) => "$facet",
        }
    }

    /// Render as store-native JSON
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let body = match self {
            Stage::Match(p) => p.to_json(),
            Stage::Unwind {
                path,
                preserve_empty,
            } => {
                if *preserve_empty {
                    json!({ "path": format!("${path}"), "preserveNullAndEmptyArrays": true })
                } else {
                    json!(format!("${path}"))
                }
            }
            Stage::Group { key, fields } => {
                let mut map = serde_json::Map::new();
                map.insert("_id".into(), key.to_json());
                for (name, acc) in fields {
                    map.insert(name.clone(), acc.to_json());
                }
                serde_json::Value::Object(map)
            }
            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => json!({
                "from": from.name(),
                "localField": local_field,
                "foreignField": foreign_field,
                "as": as_field,
            }),
            Stage::Project(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(name, projection)| {
                        let v = match projection {
                            Projection::Include => json!(1),
                            Projection::Exclude => json!(0),
                            Projection::Computed(e) => e.to_json(),
                        };
                        (name.clone(), v)
                    })
                    .collect(),
            ),
            Stage::AddFields(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, e)| (k.clone(), e.to_json())).collect(),
            ),
            Stage::Sort(keys) => serde_json::Value::Object(
                keys.iter().map(|(k, o)| (k.clone(), o.to_json())).collect(),
            ),
            Stage::Skip(n) | Stage::Limit(n) => json!(n),
            Stage::Count(field) => json!(field),
            Stage::Facet(branches) => serde_json::Value::Object(
                branches
                    .iter()
                    .map(|(k, p)| (k.clone(), p.to_json()))
                    .collect(),
            ),
        };
        json!({ self.name(): body })
    }
}

/// Ordered sequence of stages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Create empty pipeline
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append arbitrary stage
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append `$match`
    #[must_use]
    pub fn matching(self, predicate: Predicate) -> Self {
        self.stage(Stage::Match(predicate))
    }

    /// Append `$unwind` dropping documents without elements
    #[must_use]
    pub fn unwind(self, path: impl Into<String>) -> Self {
        self.stage(Stage::Unwind {
            path: path.into(),
            preserve_empty: false,
        })
    }

    /// Append `$unwind` keeping documents without elements
    #[must_use]
    pub fn unwind_preserving(self, path: impl Into<String>) -> Self {
        self.stage(Stage::Unwind {
            path: path.into(),
            preserve_empty: true,
        })
    }

    /// Append `$group`
    #[must_use]
    pub fn group<K: Into<String>>(
        self,
        key: Expr,
        fields: impl IntoIterator<Item = (K, Accumulator)>,
    ) -> Self {
        self.stage(Stage::Group {
            key,
            fields: fields.into_iter().map(|(k, a)| (k.into(), a)).collect(),
        })
    }

    /// Append `$lookup`
    #[must_use]
    pub fn lookup(
        self,
        from: Collection,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        self.stage(Stage::Lookup {
            from,
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
        })
    }

    /// Append `$lookup` on `_id` followed by a preserving `$unwind` of the result
    #[must_use]
    pub fn join_one(self, from: Collection, local_field: &str, as_field: &str) -> Self {
        self.lookup(from, local_field, "_id", as_field)
            .unwind_preserving(as_field)
    }

    /// Append `$project`
    #[must_use]
    pub fn project<K: Into<String>>(
        self,
        fields: impl IntoIterator<Item = (K, Projection)>,
    ) -> Self {
        self.stage(Stage::Project(
            fields.into_iter().map(|(k, p)| (k.into(), p)).collect(),
        ))
    }

    /// Append `$addFields`
    #[must_use]
    pub fn add_fields<K: Into<String>>(self, fields: impl IntoIterator<Item = (K, Expr)>) -> Self {
        self.stage(Stage::AddFields(
            fields.into_iter().map(|(k, e)| (k.into(), e)).collect(),
        ))
    }

    /// Append `$sort`
    #[must_use]
    pub fn sort<K: Into<String>>(self, keys: impl IntoIterator<Item = (K, SortOrder)>) -> Self {
        self.stage(Stage::Sort(
            keys.into_iter().map(|(k, o)| (k.into(), o)).collect(),
        ))
    }

    /// Append `$skip`
    #[must_use]
    pub fn skip(self, n: u64) -> Self {
        self.stage(Stage::Skip(n))
    }

    /// Append `$limit`
    #[must_use]
    pub fn limit(self, n: u64) -> Self {
        self.stage(Stage::Limit(n))
    }

    /// Append `$count`
    #[must_use]
    pub fn count(self, field: impl Into<String>) -> Self {
        self.stage(Stage::Count(field.into()))
    }

    /// Append `$facet`
    #[must_use]
    pub fn facet<K: Into<String>>(self, branches: impl IntoIterator<Item = (K, Pipeline)>) -> Self {
        self.stage(Stage::Facet(
            branches.into_iter().map(|(k, p)| (k.into(), p)).collect(),
        ))
    }

    /// Stages in order
    #[inline]
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Number of stages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check for empty pipeline
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Render as store-native JSON array
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.stages.iter().map(Stage::to_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_appends_in_order() {
        let pipeline = Pipeline::new()
            .matching(Predicate::eq("status", "COMPLETED"))
            .unwind("items")
            .sort([("total", SortOrder::Descending)])
            .limit(5);
        let names: Vec<_> = pipeline.stages().iter().map(Stage::name).collect();
        assert_eq!(names, vec!["$match", "$unwind", "$sort", "$limit"]);
    }

    #[test]
    fn join_one_unwinds_preserving() {
        let pipeline = Pipeline::new().join_one(Collection::Units, "product_info.unit", "unit_info");
        assert_eq!(pipeline.len(), 2);
        assert!(matches!(
            pipeline.stages()[1],
            Stage::Unwind { preserve_empty: true, .. }
        ));
    }

    #[test]
    fn renders_native_json() {
        let pipeline = Pipeline::new()
            .group(
                Expr::object([
                    ("year", Expr::field("createdAt").year()),
                    ("month", Expr::field("createdAt").month()),
                ]),
                [("totalRevenue", Accumulator::sum("total"))],
            )
            .sort([("_id.year", SortOrder::Ascending)]);

        assert_eq!(
            pipeline.to_json(),
            json!([
                { "$group": {
                    "_id": { "year": { "$year": "$createdAt" }, "month": { "$month": "$createdAt" } },
                    "totalRevenue": { "$sum": "$total" }
                } },
                { "$sort": { "_id.year": 1 } }
            ])
        );
    }

    #[test]
    fn within_builds_half_open_range() {
        let expr = Expr::field("hour").within(6, 12);
        assert_eq!(
            expr.to_json(),
            json!({ "$and": [{ "$gte": ["$hour", 6] }, { "$lt": ["$hour", 12] }] })
        );
    }
}
