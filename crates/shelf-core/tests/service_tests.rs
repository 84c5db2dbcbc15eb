//! Scenario tests for the analytics and assistant facades

use pretty_assertions::assert_eq;
use shelf_advisor::{Advisor, AdvisorError, ProviderHandle, Source, StockRecommendation};
use shelf_core::prelude::*;
use shelf_core::{FixedClock, MetricValue, QueryDefaults};
use shelf_store::{Collection, ObjectId};
use shelf_test_utils::{days_ago, fixed_now, ProductBuilder, ScriptedProvider, StoreFixture};
use std::sync::Arc;

fn analytics(fixture: &StoreFixture) -> AnalyticsService {
    AnalyticsService::new(fixture.shared(), QueryDefaults::default())
        .with_clock(Arc::new(FixedClock(fixed_now())))
}

fn assistant(fixture: &StoreFixture, advisor: Advisor) -> AssistantService {
    AssistantService::new(analytics(fixture), advisor)
}

fn scripted(provider: &Arc<ScriptedProvider>) -> Advisor {
    Advisor::new(ProviderHandle::Available(provider.clone()))
}

#[test]
fn unknown_metric_name_is_rejected() {
    let err = "revenue-per-aisle".parse::<MetricKind>().unwrap_err();
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn time_of_day_metric_reports_every_band() {
    let fixture = StoreFixture::new();
    let milk = fixture.add_product(fixture.product("Milk"));
    fixture.add_order(fixture.order().item(milk, "Milk", 1.0, 40.0));

    let value = analytics(&fixture)
        .metric(
            MetricKind::TimeOfDay,
            &FilterParams::new(fixture.store_id.to_hex()),
            None,
        )
        .await
        .unwrap();
    let MetricValue::TimeOfDay(bands) = value else {
        panic!("expected time-of-day bands, got {value:?}");
    };
    assert_eq!(bands.len(), 4);
    assert_eq!(bands.iter().map(|b| b.orders_count).sum::<u64>(), 1);
}

#[tokio::test]
async fn revenue_metric_sums_totals() {
    let fixture = StoreFixture::new();
    let rice = fixture.add_product(fixture.product("Rice"));
    fixture.add_order(fixture.order().item(rice, "Rice", 2.0, 60.0));
    fixture.add_order(fixture.order().item(rice, "Rice", 1.0, 60.0));

    let value = analytics(&fixture)
        .metric(
            MetricKind::Revenue,
            &FilterParams::new(fixture.store_id.to_hex()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(value, MetricValue::Amount(180.0));
}

#[tokio::test]
async fn missing_store_is_not_found() {
    let fixture = StoreFixture::new();
    let err = analytics(&fixture)
        .store_performance(&ObjectId::generate().to_hex(), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn limits_are_bounded() {
    let fixture = StoreFixture::new();
    let service = analytics(&fixture);
    let params = FilterParams::new(fixture.store_id.to_hex());

    let zero = service.top_selling_products(&params, Some(0)).await.unwrap_err();
    assert_eq!(zero.http_status(), 400);

    let page = RecentOrdersQuery::new(500);
    let too_many = service.recent_orders(&params, &page).await.unwrap_err();
    assert_eq!(too_many.http_status(), 400);

    let bad_page = RecentOrdersQuery::new(10).with_page(0);
    let err = service.recent_orders(&params, &bad_page).await.unwrap_err();
    assert!(err.is_client_error());
}

#[tokio::test]
async fn unsold_products_use_the_service_clock() {
    let fixture = StoreFixture::new();
    fixture.add_product(fixture.product("Old Jam").created_at(days_ago(70)));
    let sold = fixture.add_product(fixture.product("Bread"));
    fixture.add_order(fixture.order().created_at(days_ago(2)).item(sold, "Bread", 1.0, 30.0));

    let report = analytics(&fixture)
        .unsold_products(&fixture.store_id.to_hex(), None)
        .await
        .unwrap();
    assert_eq!(report.total_products, 1);
    assert_eq!(report.unsold_products[0].product_name, "Old Jam");
    assert_eq!(report.unsold_products[0].days_in_inventory, 70);
}

#[tokio::test]
async fn huge_periods_are_rejected() {
    let fixture = StoreFixture::new();
    let service = analytics(&fixture);
    let store = fixture.store_id.to_hex();

    let unsold = service
        .unsold_products(&store, Some(1_000_000_000_000))
        .await
        .unwrap_err();
    assert_eq!(unsold.http_status(), 400);

    let performance = service
        .store_performance(&store, Some(i64::MAX))
        .await
        .unwrap_err();
    assert_eq!(performance.http_status(), 400);
}

#[tokio::test]
async fn metrics_treat_overlong_lookback_as_full_history() {
    let fixture = StoreFixture::new();
    fixture.add_product(fixture.product("Old Jam").created_at(days_ago(70)));
    let sold = fixture.add_product(fixture.product("Bread"));
    fixture.add_order(fixture.order().created_at(days_ago(400)).item(sold, "Bread", 1.0, 30.0));

    let report = analytics(&fixture)
        .metrics()
        .unsold_products(fixture.store_id, 1_000_000_000_000, fixed_now())
        .await
        .unwrap();
    assert_eq!(report.total_products, 1);
    assert_eq!(report.unsold_products[0].product_name, "Old Jam");
}

#[tokio::test]
async fn ask_without_provider_uses_fallback_filter_and_template() {
    let fixture = StoreFixture::new();
    fixture.add_product(fixture.product("Basmati Rice"));
    fixture.add_product(fixture.product("Draft Item").status("PENDING"));

    let answer = assistant(&fixture, Advisor::unavailable())
        .ask(&fixture.store_id.to_hex(), "  rice  ")
        .await
        .unwrap();
    assert_eq!(answer.query, "rice");
    assert_eq!(answer.products_found, 1);
    assert_eq!(answer.filter_source, Source::Fallback);
    assert_eq!(answer.response_source, Source::Fallback);
    assert_eq!(
        answer.response,
        "Found 1 products for 'rice'. Top results: Basmati Rice. Would you like more details?"
    );
    assert_eq!(answer.session_id.len(), 16);
}

#[tokio::test]
async fn ask_scopes_translated_filter_to_the_store() {
    let fixture = StoreFixture::new();
    fixture.add_product(fixture.product("Sugar").price(60.0, 45.0));
    fixture.add_product(fixture.product("Rice").price(100.0, 90.0));
    // Cheaper product of another store.
    fixture.store.insert(
        Collection::Products,
        ProductBuilder::new(ObjectId::generate(), "Salt")
            .price(20.0, 10.0)
            .build(),
    );

    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(r#"```json
{"offerPrice": {"$lt": 50}, "seller": "someone-else"}
```"#)
            .reply("Sugar is available for under 50."),
    );
    let answer = assistant(&fixture, scripted(&provider))
        .ask(&fixture.store_id.to_hex(), "products under 50")
        .await
        .unwrap();

    assert_eq!(answer.products_found, 1);
    assert_eq!(answer.filter_source, Source::Provider);
    assert_eq!(answer.response, "Sugar is available for under 50.");
    assert_eq!(provider.requests().len(), 2);
}

#[tokio::test]
async fn ask_rejects_blank_question() {
    let fixture = StoreFixture::new();
    let err = assistant(&fixture, Advisor::unavailable())
        .ask(&fixture.store_id.to_hex(), "   ")
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn substitutes_fall_back_to_candidate_order() {
    let fixture = StoreFixture::new();
    let dairy = fixture.add_category("Dairy");
    let soap = fixture.add_category("Soap");
    let milk = fixture.add_product(fixture.product("Milk").price(55.0, 50.0).category(dairy));
    fixture.add_product(fixture.product("Curd").price(65.0, 60.0).category(dairy));
    fixture.add_product(fixture.product("Butter").price(45.0, 40.0).category(dairy));
    fixture.add_product(fixture.product("Lux").category(soap));

    let report = assistant(&fixture, Advisor::unavailable())
        .substitutes(&fixture.store_id.to_hex(), &milk.to_hex(), None)
        .await
        .unwrap();

    assert_eq!(report.original_product.name, "Milk");
    assert_eq!(report.source, Source::Fallback);
    let names: Vec<_> = report.substitutes.iter().map(|s| s.product_name.as_str()).collect();
    assert_eq!(names, ["Curd", "Butter"]);
    let scores: Vec<_> = report.substitutes.iter().map(|s| s.similarity_score).collect();
    assert_eq!(scores, [0.8, 0.7]);
    let deltas: Vec<_> = report.substitutes.iter().map(|s| s.price_difference).collect();
    assert_eq!(deltas, [10.0, -10.0]);
}

#[tokio::test]
async fn substitutes_accept_valid_provider_ranking() {
    let fixture = StoreFixture::new();
    let dairy = fixture.add_category("Dairy");
    let milk = fixture.add_product(fixture.product("Milk").price(55.0, 50.0).category(dairy));
    let curd = fixture.add_product(fixture.product("Curd").price(65.0, 60.0).category(dairy));

    let reply = format!(
        r#"[{{"product_id": "{}", "product_name": "Curd", "similarity_score": 0.9, "price_difference": 10.0, "reason": "Same dairy aisle"}}]"#,
        curd.to_hex()
    );
    let provider = Arc::new(ScriptedProvider::new().reply(&reply));
    let report = assistant(&fixture, scripted(&provider))
        .substitutes(&fixture.store_id.to_hex(), &milk.to_hex(), Some(3))
        .await
        .unwrap();

    assert_eq!(report.source, Source::Provider);
    assert_eq!(report.substitutes.len(), 1);
    assert_eq!(report.substitutes[0].reason, "Same dairy aisle");
}

#[tokio::test]
async fn substitutes_for_missing_product_is_not_found() {
    let fixture = StoreFixture::new();
    let err = assistant(&fixture, Advisor::unavailable())
        .substitutes(&fixture.store_id.to_hex(), &ObjectId::generate().to_hex(), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn substitutes_reject_out_of_range_top_n() {
    let fixture = StoreFixture::new();
    let milk = fixture.add_product(fixture.product("Milk"));
    let err = assistant(&fixture, Advisor::unavailable())
        .substitutes(&fixture.store_id.to_hex(), &milk.to_hex(), Some(11))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn discounts_fall_back_with_aged_count() {
    let fixture = StoreFixture::new();
    fixture.add_product(fixture.product("Old Jam").created_at(days_ago(45)));
    fixture.add_product(fixture.product("New Jam").created_at(days_ago(10)));

    let provider = Arc::new(ScriptedProvider::new().fail(AdvisorError::Provider {
        status: 429,
        message: "rate limited".into(),
    }));
    let report = assistant(&fixture, scripted(&provider))
        .discounts(&fixture.store_id.to_hex())
        .await
        .unwrap();

    assert_eq!(report.source, Source::Fallback);
    assert_eq!(
        report.recommendations.quick_actions[0],
        "Apply 20-30% discount to 1 products over 30 days old"
    );
    assert_eq!(report.generated_at, fixed_now().to_rfc3339());
}

#[tokio::test]
async fn stock_alerts_without_provider_use_fixed_recommendation() {
    let fixture = StoreFixture::new();
    fixture.add_product(fixture.product("Flour").stock(80));
    fixture.add_product(fixture.product("Oil").stock(200));
    fixture.add_product(fixture.product("Salt").stock(5));

    let alerts = assistant(&fixture, Advisor::unavailable())
        .stock_alerts(&fixture.store_id.to_hex())
        .await
        .unwrap();

    let names: Vec<_> = alerts.alerts.iter().map(|a| a.item.product_name.as_str()).collect();
    assert_eq!(names, ["Oil", "Flour", "Salt"]);
    let fixed = StockRecommendation::unavailable();
    assert!(alerts
        .alerts
        .iter()
        .all(|a| a.recommendation == fixed.recommendation && a.source == Source::Fallback));
}

#[tokio::test]
async fn stock_alert_uses_provider_recommendation() {
    let fixture = StoreFixture::new();
    fixture.add_product(fixture.product("Oil").stock(200));

    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(r#"{"recommendation": "Bundle with flour", "reasoning": "Stock is high"}"#),
    );
    let alerts = assistant(&fixture, scripted(&provider))
        .stock_alerts(&fixture.store_id.to_hex())
        .await
        .unwrap();

    assert_eq!(alerts.alerts.len(), 1);
    assert_eq!(alerts.alerts[0].recommendation, "Bundle with flour");
    assert_eq!(alerts.alerts[0].source, Source::Provider);
    assert!(provider.requests()[0].json_mode);
}

#[tokio::test]
async fn quick_analysis_covers_each_low_stock_product() {
    let fixture = StoreFixture::new();
    let dairy = fixture.add_category("Dairy");
    fixture.add_product(fixture.product("Milk").category(dairy).stock(0).unavailable());
    fixture.add_product(fixture.product("Curd").category(dairy));
    fixture.add_product(fixture.product("Butter").category(dairy));

    let analysis = assistant(&fixture, Advisor::unavailable())
        .quick_analysis(&fixture.store_id.to_hex(), None)
        .await
        .unwrap();

    assert_eq!(analysis.results.len(), 1);
    let entry = &analysis.results[0];
    assert_eq!(entry.product_name, "Milk");
    assert_eq!(entry.substitutes.len(), 2);
    assert!(entry.substitutes.iter().all(|s| s.product_name != "Milk"));
}

mod properties {
    use super::*;
    use proptest::prelude::*;
    use shelf_store::MemoryStore;

    proptest! {
        #[test]
        fn limit_accepted_iff_within_bounds(limit in 0u64..1_000, max in 1u64..500) {
            let defaults = QueryDefaults { max_limit: max, ..QueryDefaults::default() };
            let service = AnalyticsService::new(Arc::new(MemoryStore::new()), defaults);
            let accepted = service.resolve_limit(Some(limit)).is_ok();
            prop_assert_eq!(accepted, (1..=max).contains(&limit));
        }
    }
}
