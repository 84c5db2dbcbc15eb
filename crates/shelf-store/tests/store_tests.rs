//! Store-level scenarios: datasets, joins and ordering properties

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use shelf_store::prelude::*;

const DATASET: &str = r#"{
    "orders": [
        { "_id": { "$oid": "650000000000000000000001" }, "status": "COMPLETED", "total": 100,
          "createdAt": { "$date": "2025-01-15T08:00:00Z" },
          "items": [{ "_id": { "$oid": "660000000000000000000001" }, "quantity": 2, "subTotal": 40 }] },
        { "_id": { "$oid": "650000000000000000000002" }, "status": "COMPLETED", "total": 50.5,
          "createdAt": { "$date": "2025-01-20T19:30:00Z" },
          "items": [{ "_id": { "$oid": "660000000000000000000001" }, "quantity": 1, "subTotal": 20 }] },
        { "_id": { "$oid": "650000000000000000000003" }, "status": "PENDING", "total": 70,
          "createdAt": { "$date": "2025-02-02T13:00:00Z" },
          "items": [] }
    ],
    "products": [
        { "_id": { "$oid": "660000000000000000000001" }, "ProductName": "Rice", "category": { "$oid": "670000000000000000000001" } }
    ],
    "categories": [
        { "_id": { "$oid": "670000000000000000000001" }, "name": "Grains" }
    ]
}"#;

#[tokio::test]
async fn monthly_revenue_groups_chronologically() {
    let store = MemoryStore::from_extended_json_str(DATASET).unwrap();
    let pipeline = Pipeline::new()
        .group(
            Expr::object([
                ("year", Expr::field("createdAt").year()),
                ("month", Expr::field("createdAt").month()),
            ]),
            [("totalRevenue", Accumulator::sum("total"))],
        )
        .sort([("_id.year", SortOrder::Ascending), ("_id.month", SortOrder::Ascending)]);

    let rows = store.aggregate(Collection::Orders, &pipeline).await.unwrap();
    let months: Vec<_> = rows
        .iter()
        .map(|r| (r.get_i64("_id.month").unwrap(), r.get_f64("totalRevenue").unwrap()))
        .collect();
    assert_eq!(months, vec![(1, 150.5), (2, 70.0)]);
}

#[tokio::test]
async fn unwind_lookup_chain_resolves_category() {
    let store = MemoryStore::from_extended_json_str(DATASET).unwrap();
    let pipeline = Pipeline::new()
        .unwind("items")
        .group(
            Expr::field("items._id"),
            [("units_sold", Accumulator::sum("items.quantity"))],
        )
        .join_one(Collection::Products, "_id", "product_info")
        .join_one(Collection::Categories, "product_info.category", "category_info");

    let rows = store.aggregate(Collection::Orders, &pipeline).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_i64("units_sold"), Some(3));
    assert_eq!(rows[0].get_str("category_info.name"), Some("Grains"));
}

#[tokio::test]
async fn exported_json_reloads() {
    let store = MemoryStore::from_extended_json_str(DATASET).unwrap();
    let rows = store
        .find(Collection::Orders, &Predicate::All, &FindOptions::new())
        .await
        .unwrap();
    let exported = serde_json::json!({
        "orders": rows.iter().map(Document::to_extended_json).collect::<Vec<_>>()
    });
    let reloaded = MemoryStore::from_extended_json(exported).unwrap();
    assert_eq!(reloaded.len(Collection::Orders), 3);
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|i| Value::Int(i64::from(i))),
        (-1.0e6f64..1.0e6).prop_map(Value::Double),
        "[a-z]{0,6}".prop_map(Value::String),
    ]
}

proptest! {
    #[test]
    fn compare_is_antisymmetric(a in scalar(), b in scalar()) {
        prop_assert_eq!(a.compare(&b), b.compare(&a).reverse());
    }

    #[test]
    fn equal_keys_iff_loose_equal(a in scalar(), b in scalar()) {
        prop_assert_eq!(a.canonical_key() == b.canonical_key(), a.loose_eq(&b));
    }
}
