//! `shelf` - run analytics and assistant operations over a JSON dataset
//!
//! The dataset is loaded into an in-memory store; every subcommand prints
//! its result as pretty JSON on stdout. Logs go to stderr.

mod cli;

use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use serde::Serialize;
use shelf_core::{AnalyticsService, AssistantService, MetricKind, ShelfConfig};
use shelf_store::{Collection, DocumentStore, MemoryStore};
use std::sync::Arc;
use tracing::info;

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_store(path: &std::path::Path) -> Result<Arc<dyn DocumentStore>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset {}", path.display()))?;
    let store = MemoryStore::from_extended_json_str(&text)
        .with_context(|| format!("failed to load dataset {}", path.display()))?;
    let documents: usize = Collection::ALL.into_iter().map(|c| store.len(c)).sum();
    info!(path = %path.display(), documents, "Loaded dataset");
    Ok(Arc::new(store))
}

async fn run(
    name: &str,
    args: &ArgMatches,
    analytics: &AnalyticsService,
    assistant: &AssistantService,
) -> Result<()> {
    let limit = args.try_get_one::<u64>("limit").ok().flatten().copied();
    let days = args.try_get_one::<i64>("days").ok().flatten().copied();
    let top_n = args.try_get_one::<usize>("top-n").ok().flatten().copied();

    match name {
        "stores" => print(&analytics.stores().await?),
        "performance" => print(&analytics.store_performance(&cli::store(args), days).await?),
        "metric" => {
            let metric: MetricKind = args
                .get_one::<String>("name")
                .ok_or_else(|| anyhow!("metric name is required"))?
                .parse()?;
            print(&analytics.metric(metric, &cli::filter_params(args), limit).await?)
        }
        "top-products" => print(
            &analytics
                .top_selling_products(&cli::filter_params(args), limit)
                .await?,
        ),
        "low-products" => print(
            &analytics
                .low_selling_products(&cli::filter_params(args), limit)
                .await?,
        ),
        "categories" if args.get_flag("sales") => {
            print(&analytics.category_sales(&cli::filter_params(args)).await?)
        }
        "categories" => print(&analytics.category_distribution(&cli::filter_params(args)).await?),
        "unsold" => print(&analytics.unsold_products(&cli::store(args), days).await?),
        "low-stock" => print(&analytics.low_stock_products(&cli::store(args), limit).await?),
        "recent-orders" => {
            let query = cli::recent_orders_query(args, analytics.defaults().default_limit);
            print(&analytics.recent_orders(&cli::filter_params(args), &query).await?)
        }
        "ask" => {
            let question = args
                .get_one::<String>("question")
                .ok_or_else(|| anyhow!("question is required"))?;
            print(&assistant.ask(&cli::store(args), question).await?)
        }
        "substitutes" => {
            let product = args
                .get_one::<String>("product")
                .ok_or_else(|| anyhow!("product identifier is required"))?;
            print(&assistant.substitutes(&cli::store(args), product, top_n).await?)
        }
        "discounts" => print(&assistant.discounts(&cli::store(args)).await?),
        "stock-alerts" => print(&assistant.stock_alerts(&cli::store(args)).await?),
        "quick-analysis" => print(&assistant.quick_analysis(&cli::store(args), top_n).await?),
        other => Err(anyhow!("unknown command '{other}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::command().get_matches();
    let global = cli::GlobalOptions::from_matches(&matches)
        .ok_or_else(|| anyhow!("--data is required"))?;
    shelf_core::telemetry::init(global.json_logs);

    let config = ShelfConfig::load(global.config.as_deref()).context("failed to load configuration")?;
    let store = load_store(&global.data)?;
    let assistant = AssistantService::from_config(store.clone(), &config)?;
    let analytics = AnalyticsService::new(store, config.queries);
    info!(provider = assistant.advisor().is_available(), "Services ready");

    let Some((name, args)) = matches.subcommand() else {
        return Err(anyhow!("a subcommand is required"));
    };
    run(name, args, &analytics, &assistant).await
}
