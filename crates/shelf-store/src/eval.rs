//! In-process evaluation of the stage language
//!
//! Executes [`Stage`]s over owned documents with document-store semantics:
//! - groups keep first-seen order of keys
//! - sorts are stable, missing sort keys order as null
//! - `$count` emits nothing for empty input
//! - expressions distinguish missing (`None`) from explicit null

use crate::error::{StoreError, StoreResult};
use crate::pipeline::{Accumulator, Expr, Projection, SortOrder, Stage};
use crate::store::Collection;
use crate::value::{Document, Value};
use chrono::{Datelike, Timelike};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Documents of every collection visible to `$lookup`
pub(crate) type Snapshot = HashMap<Collection, Vec<Document>>;

impl Expr {
    /// Evaluate against a document; `None` means the value is missing
    ///
    /// # Errors
    /// `StoreError::Expression` when an operand has the wrong type
    pub fn evaluate(&self, doc: &Document) -> StoreResult<Option<Value>> {
        match self {
            Expr::Field(path) => Ok(doc.lookup(path)),
            Expr::Literal(v) => Ok(Some(v.clone())),
            Expr::Object(fields) => {
                let mut out = Document::new();
                for (name, expr) in fields {
                    if let Some(v) = expr.evaluate(doc)? {
                        out.insert(name.clone(), v);
                    }
                }
                Ok(Some(Value::Document(out)))
            }
            Expr::Year(e) => date_part(e, doc, "$year", |dt| i64::from(dt.year())),
            Expr::Month(e) => date_part(e, doc, "$month", |dt| i64::from(dt.month())),
            Expr::Hour(e) => date_part(e, doc, "$hour", |dt| i64::from(dt.hour())),
            Expr::Size(e) => match e.evaluate(doc)? {
                Some(Value::Array(items)) => Ok(Some(Value::Int(
                    i64::try_from(items.len()).unwrap_or(i64::MAX),
                ))),
                other => Err(StoreError::expression(
                    "$size",
                    format!(
                        "argument must be an array, got {}",
                        other.as_ref().map_or("missing", Value::type_name)
                    ),
                )),
            },
            Expr::ToString(e) => Ok(e.evaluate(doc)?.and_then(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(Value::String(s)),
                Value::ObjectId(id) => Some(Value::String(id.to_hex())),
                Value::Int(i) => Some(Value::String(i.to_string())),
                Value::Double(d) => Some(Value::String(d.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                Value::DateTime(dt) => Some(Value::String(dt.to_rfc3339())),
                other => Some(Value::String(other.canonical_key())),
            })),
            Expr::Round(e, places) => match e.evaluate(doc)? {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Int(i)) => Ok(Some(Value::Int(i))),
                Some(Value::Double(d)) => Ok(Some(Value::Double(round_to(d, *places)))),
                Some(other) => Err(StoreError::expression(
                    "$round",
                    format!("expected number, got {}", other.type_name()),
                )),
            },
            Expr::ArrayElemAt(e, index) => Ok(match e.evaluate(doc)? {
                Some(Value::Array(items)) => {
                    let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
                    let at = if *index < 0 { len + index } else { *index };
                    usize::try_from(at).ok().and_then(|i| items.get(i).cloned())
                }
                _ => None,
            }),
            Expr::IfNull(a, b) => match a.evaluate(doc)? {
                Some(v) if !v.is_null() => Ok(Some(v)),
                _ => b.evaluate(doc),
            },
            Expr::Gte(a, b) => compare(a, b, doc).map(|o| Some(Value::Bool(o.is_ge()))),
            Expr::Lt(a, b) => compare(a, b, doc).map(|o| Some(Value::Bool(o.is_lt()))),
            Expr::And(items) => {
                for item in items {
                    if !item.evaluate(doc)?.is_some_and(|v| v.truthy()) {
                        return Ok(Some(Value::Bool(false)));
                    }
                }
                Ok(Some(Value::Bool(true)))
            }
            Expr::Switch { branches, default } => {
                for (case, then) in branches {
                    if case.evaluate(doc)?.is_some_and(|v| v.truthy()) {
                        return then.evaluate(doc);
                    }
                }
                default.evaluate(doc)
            }
        }
    }
}

fn date_part(
    expr: &Expr,
    doc: &Document,
    stage: &'static str,
    part: fn(&chrono::DateTime<chrono::Utc>) -> i64,
) -> StoreResult<Option<Value>> {
    match expr.evaluate(doc)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::DateTime(dt)) => Ok(Some(Value::Int(part(&dt)))),
        Some(other) => Err(StoreError::expression(
            stage,
            format!("can't convert from {} to date", other.type_name()),
        )),
    }
}

fn compare(a: &Expr, b: &Expr, doc: &Document) -> StoreResult<Ordering> {
    let left = a.evaluate(doc)?.unwrap_or(Value::Null);
    let right = b.evaluate(doc)?.unwrap_or(Value::Null);
    Ok(left.compare(&right))
}

#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places.min(15) as i32);
    (value * factor).round() / factor
}

enum AccState {
    Sum { int: i64, float: f64, is_float: bool },
    Avg { total: f64, count: u32 },
    First(Option<Value>),
    Push(Vec<Value>),
    AddToSet(HashSet<String>, Vec<Value>),
}

impl AccState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => AccState::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            Accumulator::Avg(_) => AccState::Avg {
                total: 0.0,
                count: 0,
            },
            Accumulator::First(_) => AccState::First(None),
            Accumulator::Push(_) => AccState::Push(Vec::new()),
            Accumulator::AddToSet(_) => AccState::AddToSet(HashSet::new(), Vec::new()),
        }
    }

    fn feed(&mut self, acc: &Accumulator, doc: &Document) -> StoreResult<()> {
        let expr = match acc {
            Accumulator::Sum(e)
            | Accumulator::Avg(e)
            | Accumulator::First(e)
            | Accumulator::Push(e)
            | Accumulator::AddToSet(e) => e,
        };
        let value = expr.evaluate(doc)?;
        match self {
            AccState::Sum {
                int,
                float,
                is_float,
            } => match value {
                Some(Value::Int(i)) => *int = int.saturating_add(i),
                Some(Value::Double(d)) => {
                    *float += d;
                    *is_float = true;
                }
                _ => {}
            },
            AccState::Avg { total, count } => {
                if let Some(n) = value.as_ref().and_then(Value::as_f64) {
                    *total += n;
                    *count += 1;
                }
            }
            AccState::First(slot) => {
                if slot.is_none() {
                    *slot = Some(value.unwrap_or(Value::Null));
                }
            }
            AccState::Push(items) => {
                if let Some(v) = value {
                    items.push(v);
                }
            }
            AccState::AddToSet(seen, items) => {
                if let Some(v) = value {
                    if seen.insert(v.canonical_key()) {
                        items.push(v);
                    }
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> Value {
        match self {
            AccState::Sum {
                int,
                float,
                is_float,
            } => {
                if is_float {
                    Value::Double(float + int as f64)
                } else {
                    Value::Int(int)
                }
            }
            AccState::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Double(total / f64::from(count))
                }
            }
            AccState::First(v) => v.unwrap_or(Value::Null),
            AccState::Push(items) | AccState::AddToSet(_, items) => Value::Array(items),
        }
    }
}

/// Run stages over input documents
pub(crate) fn execute(
    mut docs: Vec<Document>,
    stages: &[Stage],
    snapshot: &Snapshot,
) -> StoreResult<Vec<Document>> {
    for stage in stages {
        docs = apply(stage, docs, snapshot)?;
    }
    Ok(docs)
}

fn apply(stage: &Stage, docs: Vec<Document>, snapshot: &Snapshot) -> StoreResult<Vec<Document>> {
    match stage {
        Stage::Match(predicate) => {
            let mut out = Vec::with_capacity(docs.len());
            for doc in docs {
                if predicate.matches(&doc)? {
                    out.push(doc);
                }
            }
            Ok(out)
        }
        Stage::Unwind {
            path,
            preserve_empty,
        } => Ok(unwind(docs, path, *preserve_empty)),
        Stage::Group { key, fields } => group(docs, key, fields),
        Stage::Lookup {
            from,
            local_field,
            foreign_field,
            as_field,
        } => {
            let foreign = snapshot.get(from).map_or(&[][..], Vec::as_slice);
            Ok(docs
                .into_iter()
                .map(|doc| lookup(doc, foreign, local_field, foreign_field, as_field))
                .collect())
        }
        Stage::Project(fields) => docs.iter().map(|doc| project(doc, fields)).collect(),
        Stage::AddFields(fields) => docs
            .into_iter()
            .map(|mut doc| -> StoreResult<Document> {
                for (name, expr) in fields {
                    if let Some(v) = expr.evaluate(&doc)? {
                        doc.set_path(name, v);
                    }
                }
                Ok(doc)
            })
            .collect(),
        Stage::Sort(keys) => {
            let mut docs = docs;
            docs.sort_by(|a, b| sort_cmp(a, b, keys));
            Ok(docs)
        }
        Stage::Skip(n) => Ok(docs
            .into_iter()
            .skip(usize::try_from(*n).unwrap_or(usize::MAX))
            .collect()),
        Stage::Limit(n) => Ok(docs
            .into_iter()
            .take(usize::try_from(*n).unwrap_or(usize::MAX))
            .collect()),
        Stage::Count(field) => {
            if docs.is_empty() {
                return Ok(Vec::new());
            }
            let n = i64::try_from(docs.len()).unwrap_or(i64::MAX);
            let mut out = Document::new();
            out.insert(field.clone(), n);
            Ok(vec![out])
        }
        Stage::Facet(branches) => {
            let mut out = Document::new();
            for (name, pipeline) in branches {
                let rows = execute(docs.clone(), pipeline.stages(), snapshot)?;
                out.insert(
                    name.clone(),
                    Value::Array(rows.into_iter().map(Value::Document).collect()),
                );
            }
            Ok(vec![out])
        }
    }
}

fn unwind(docs: Vec<Document>, path: &str, preserve_empty: bool) -> Vec<Document> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.get_path(path).cloned() {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    copy.set_path(path, item);
                    out.push(copy);
                }
            }
            Some(Value::Array(_)) => {
                if preserve_empty {
                    let mut copy = doc;
                    copy.remove_path(path);
                    out.push(copy);
                }
            }
            None | Some(Value::Null) => {
                if preserve_empty {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    out
}

fn group(
    docs: Vec<Document>,
    key: &Expr,
    fields: &[(String, Accumulator)],
) -> StoreResult<Vec<Document>> {
    let mut groups: IndexMap<String, (Value, Vec<AccState>)> = IndexMap::new();
    for doc in &docs {
        let id = key.evaluate(doc)?.unwrap_or(Value::Null);
        let entry = groups.entry(id.canonical_key()).or_insert_with(|| {
            (
                id,
                fields.iter().map(|(_, acc)| AccState::new(acc)).collect(),
            )
        });
        for ((_, acc), state) in fields.iter().zip(entry.1.iter_mut()) {
            state.feed(acc, doc)?;
        }
    }

    Ok(groups
        .into_values()
        .map(|(id, states)| {
            let mut out = Document::new();
            out.insert("_id", id);
            for ((name, _), state) in fields.iter().zip(states) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect())
}

fn lookup(
    mut doc: Document,
    foreign: &[Document],
    local_field: &str,
    foreign_field: &str,
    as_field: &str,
) -> Document {
    let locals = match doc.lookup(local_field) {
        Some(Value::Array(items)) => items,
        Some(v) => vec![v],
        None => vec![Value::Null],
    };

    let matched: Vec<Value> = foreign
        .iter()
        .filter(|candidate| {
            let values = candidate.resolve_all(foreign_field);
            if values.is_empty() {
                return locals.iter().any(Value::is_null);
            }
            values
                .iter()
                .any(|fv| locals.iter().any(|lv| lv.loose_eq(fv)))
        })
        .cloned()
        .map(Value::Document)
        .collect();

    doc.set_path(as_field, Value::Array(matched));
    doc
}

fn project(doc: &Document, fields: &[(String, Projection)]) -> StoreResult<Document> {
    let inclusion = fields
        .iter()
        .any(|(_, p)| !matches!(p, Projection::Exclude));

    if !inclusion {
        let mut out = doc.clone();
        for (name, _) in fields {
            out.remove_path(name);
        }
        return Ok(out);
    }

    let mut out = Document::new();
    let id_excluded = fields
        .iter()
        .any(|(name, p)| name == "_id" && matches!(p, Projection::Exclude));
    let id_listed = fields.iter().any(|(name, _)| name == "_id");
    if !id_excluded && !id_listed {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }

    for (name, projection) in fields {
        match projection {
            Projection::Include => {
                if let Some(v) = doc.get_path(name) {
                    out.set_path(name, v.clone());
                }
            }
            Projection::Exclude => {}
            Projection::Computed(expr) => {
                if let Some(v) = expr.evaluate(doc)? {
                    out.set_path(name, v);
                }
            }
        }
    }
    Ok(out)
}

fn sort_cmp(a: &Document, b: &Document, keys: &[(String, SortOrder)]) -> Ordering {
    for (path, order) in keys {
        let left = a.get_path(path).unwrap_or(&Value::Null);
        let right = b.get_path(path).unwrap_or(&Value::Null);
        let ord = match order {
            SortOrder::Ascending => left.compare(right),
            SortOrder::Descending => right.compare(left),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::pipeline::Pipeline;
    use crate::predicate::Predicate;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn run(docs: Vec<Document>, pipeline: &Pipeline) -> Vec<Document> {
        execute(docs, pipeline.stages(), &Snapshot::new()).unwrap()
    }

    fn order(customer: &str, total: i64, items: Vec<Document>) -> Document {
        doc! {
            "customer" => doc! { "id" => customer },
            "total" => total,
            "items" => items.into_iter().map(Value::Document).collect::<Vec<_>>(),
        }
    }

    #[test]
    fn group_keeps_first_seen_order() {
        let docs = vec![
            order("b", 10, vec![]),
            order("a", 5, vec![]),
            order("b", 7, vec![]),
        ];
        let rows = run(
            docs,
            &Pipeline::new().group(
                Expr::field("customer.id"),
                [("spent", Accumulator::sum("total")), ("n", Accumulator::count())],
            ),
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_str("_id"), Some("b"));
        assert_eq!(rows[0].get_i64("spent"), Some(17));
        assert_eq!(rows[0].get_i64("n"), Some(2));
        assert_eq!(rows[1].get_str("_id"), Some("a"));
    }

    #[test]
    fn sum_mixes_ints_and_doubles() {
        let docs = vec![doc! { "v" => 1 }, doc! { "v" => 2.5 }, doc! { "v" => "x" }];
        let rows = run(docs, &Pipeline::new().group(Expr::null(), [("s", Accumulator::sum("v"))]));
        assert_eq!(rows[0].get("s"), Some(&Value::Double(3.5)));
    }

    #[test]
    fn unwind_drops_or_preserves_empty() {
        let docs = vec![
            order("a", 1, vec![doc! { "q" => 1 }, doc! { "q" => 2 }]),
            order("b", 1, vec![]),
        ];
        assert_eq!(run(docs.clone(), &Pipeline::new().unwind("items")).len(), 2);
        let kept = run(docs, &Pipeline::new().unwind_preserving("items"));
        assert_eq!(kept.len(), 3);
        assert!(kept[2].get("items").is_none());
    }

    #[test]
    fn sort_is_stable_and_nulls_first() {
        let docs = vec![
            doc! { "k" => 1, "tag" => "first" },
            doc! { "tag" => "missing" },
            doc! { "k" => 1, "tag" => "second" },
        ];
        let rows = run(docs, &Pipeline::new().sort([("k", SortOrder::Ascending)]));
        let tags: Vec<_> = rows.iter().map(|d| d.get_str("tag").unwrap()).collect();
        assert_eq!(tags, vec!["missing", "first", "second"]);
    }

    #[test]
    fn count_is_empty_for_no_input() {
        assert!(run(vec![], &Pipeline::new().count("count")).is_empty());
        let rows = run(vec![doc! {}, doc! {}], &Pipeline::new().count("count"));
        assert_eq!(rows[0].get_i64("count"), Some(2));
    }

    #[test]
    fn facet_runs_branches_on_same_input() {
        let docs: Vec<Document> = (0..5).map(|i| doc! { "i" => i }).collect();
        let rows = run(
            docs,
            &Pipeline::new().facet([
                ("page", Pipeline::new().skip(2).limit(2)),
                ("total", Pipeline::new().count("count")),
            ]),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_array("page").map(<[Value]>::len), Some(2));
        assert_eq!(rows[0].get_i64("total.0.count"), Some(5));
    }

    #[test]
    fn lookup_joins_by_foreign_key() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            Collection::Categories,
            vec![doc! { "_id" => "c1", "name" => "Dairy" }],
        );
        let docs = vec![doc! { "category" => "c1" }, doc! { "category" => "c2" }];
        let pipeline = Pipeline::new().join_one(Collection::Categories, "category", "category_info");
        let rows = execute(docs, pipeline.stages(), &snapshot).unwrap();
        assert_eq!(rows[0].get_str("category_info.name"), Some("Dairy"));
        assert!(rows[1].get("category_info").is_none());
    }

    #[test]
    fn switch_buckets_hours() {
        let bucket = Expr::Switch {
            branches: vec![(Expr::field("hour").within(6, 12), Expr::lit("Morning"))],
            default: Box::new(Expr::lit("Night")),
        };
        let at = |h: i64| doc! { "hour" => h };
        assert_eq!(bucket.evaluate(&at(6)).unwrap(), Some(Value::from("Morning")));
        assert_eq!(bucket.evaluate(&at(12)).unwrap(), Some(Value::from("Night")));
    }

    #[test]
    fn date_parts_and_type_errors() {
        let d = doc! { "at" => Utc.with_ymd_and_hms(2025, 2, 3, 19, 0, 0).unwrap(), "s" => "x" };
        assert_eq!(Expr::field("at").month().evaluate(&d).unwrap(), Some(Value::Int(2)));
        assert_eq!(Expr::field("at").hour().evaluate(&d).unwrap(), Some(Value::Int(19)));
        assert_eq!(Expr::field("none").year().evaluate(&d).unwrap(), None);
        assert!(Expr::field("s").year().evaluate(&d).is_err());
        assert!(Expr::field("s").size().evaluate(&d).is_err());
    }

    #[test]
    fn project_inclusion_and_exclusion() {
        let d = doc! { "_id" => 1, "a" => 1, "b" => 2 };
        let inc = project(&d, &[("a".into(), Projection::Include)]).unwrap();
        assert_eq!(inc, doc! { "_id" => 1, "a" => 1 });
        let exc = project(&d, &[("_id".into(), Projection::Exclude)]).unwrap();
        assert_eq!(exc, doc! { "a" => 1, "b" => 2 });
        let mixed = project(
            &d,
            &[
                ("_id".into(), Projection::Exclude),
                ("c".into(), Projection::Computed(Expr::field("b"))),
            ],
        )
        .unwrap();
        assert_eq!(mixed, doc! { "c" => 2 });
    }

    #[test]
    fn match_stage_filters() {
        let docs = vec![doc! { "s" => "A" }, doc! { "s" => "B" }];
        let rows = run(docs, &Pipeline::new().matching(Predicate::eq("s", "B")));
        assert_eq!(rows.len(), 1);
    }
}
