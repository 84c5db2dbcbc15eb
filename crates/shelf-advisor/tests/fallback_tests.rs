//! Fallback behavior of the advisor flows with no provider configured

use proptest::prelude::*;
use shelf_advisor::prelude::*;
use shelf_advisor::{fallback_substitutes, ProductBrief};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn brief(id: usize, price: f64) -> ProductBrief {
    ProductBrief {
        product_id: format!("p{id}"),
        product_name: format!("Product {id}"),
        offer_price: price,
        category: None,
    }
}

proptest! {
    #[test]
    fn every_query_maps_to_fallback_filter(query in ".{0,80}") {
        let advisor = Advisor::unavailable();
        let translated = runtime().block_on(advisor.translate_filter(&query));
        prop_assert_eq!(translated.filter, fallback_filter());
        prop_assert_eq!(translated.source, Source::Fallback);
    }

    #[test]
    fn fallback_scores_strictly_decrease(n in 1usize..15, top_n in 1usize..15) {
        let candidates: Vec<_> = (0..n).map(|i| brief(i, 10.0)).collect();
        let subs = fallback_substitutes(&brief(99, 12.5), &candidates, top_n.min(n));
        prop_assert_eq!(subs.len(), top_n.min(n));
        for pair in subs.windows(2) {
            prop_assert!(pair[0].similarity_score > pair[1].similarity_score);
        }
        prop_assert!(subs.iter().all(|s| (s.price_difference + 2.5).abs() < 1e-9));
    }
}

#[tokio::test]
async fn substitutes_for_three_of_five() {
    let candidates: Vec<_> = (0..5).map(|i| brief(i, 20.0)).collect();
    let advice = Advisor::unavailable()
        .suggest_substitutes(&brief(99, 25.0), &candidates, 3)
        .await;
    assert!(advice.is_fallback());
    let scores: Vec<f64> = advice.value.iter().map(|s| s.similarity_score).collect();
    assert_eq!(scores, vec![0.8, 0.7, 0.6]);
}

#[tokio::test]
async fn top_n_bounded_by_candidates() {
    let candidates: Vec<_> = (0..2).map(|i| brief(i, 20.0)).collect();
    let advice = Advisor::unavailable()
        .suggest_substitutes(&brief(99, 25.0), &candidates, 5)
        .await;
    assert_eq!(advice.value.len(), 2);
}
