//! Command-line definition

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use shelf_core::{FilterParams, RecentOrdersQuery};
use std::path::PathBuf;

/// Global options shared by every subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GlobalOptions {
    pub(crate) data: PathBuf,
    pub(crate) config: Option<PathBuf>,
    pub(crate) json_logs: bool,
}

impl GlobalOptions {
    pub(crate) fn from_matches(matches: &ArgMatches) -> Option<Self> {
        Some(Self {
            data: matches.get_one::<PathBuf>("data")?.clone(),
            config: matches.get_one::<PathBuf>("config").cloned(),
            json_logs: matches.get_flag("json-logs"),
        })
    }
}

fn store_arg() -> Arg {
    Arg::new("store")
        .long("store")
        .required(true)
        .help("Store identifier (24 hex characters)")
}

fn filter_args() -> [Arg; 5] {
    [
        store_arg(),
        Arg::new("from")
            .long("from")
            .help("Inclusive lower bound on creation date (ISO-8601)"),
        Arg::new("to")
            .long("to")
            .help("Inclusive upper bound on creation date (ISO-8601)"),
        Arg::new("status").long("status").help("Exact order or product status"),
        Arg::new("category").long("category").help("Category identifier"),
    ]
}

fn limit_arg() -> Arg {
    Arg::new("limit")
        .long("limit")
        .value_parser(value_parser!(u64))
        .help("Maximum number of rows")
}

fn days_arg() -> Arg {
    Arg::new("days")
        .long("days")
        .value_parser(value_parser!(i64))
        .help("Lookback window in days")
}

fn top_n_arg() -> Arg {
    Arg::new("top-n")
        .long("top-n")
        .value_parser(value_parser!(usize))
        .help("Substitutes per product (1-10)")
}

/// Build the `shelf` command
pub(crate) fn command() -> Command {
    Command::new("shelf")
        .version(shelf_core::VERSION)
        .about("Grocery store analytics over an extended-JSON dataset")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("data")
                .long("data")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Dataset file: an object of collection name to document array"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(Command::new("stores").about("List approved, active stores"))
        .subcommand(
            Command::new("performance")
                .about("Order outcomes, revenue and payouts of a store")
                .arg(store_arg())
                .arg(days_arg()),
        )
        .subcommand(
            Command::new("metric")
                .about("Compute a named metric")
                .arg(
                    Arg::new("name")
                        .required(true)
                        .help("Metric name, e.g. revenue, time-of-day, top-customers"),
                )
                .args(filter_args())
                .arg(limit_arg()),
        )
        .subcommand(
            Command::new("top-products")
                .about("Best-selling products")
                .args(filter_args())
                .arg(limit_arg()),
        )
        .subcommand(
            Command::new("low-products")
                .about("Worst-selling products")
                .args(filter_args())
                .arg(limit_arg()),
        )
        .subcommand(
            Command::new("categories")
                .about("Category distribution over order lines")
                .args(filter_args())
                .arg(
                    Arg::new("sales")
                        .long("sales")
                        .action(ArgAction::SetTrue)
                        .help("Rank categories by sales share instead"),
                ),
        )
        .subcommand(
            Command::new("unsold")
                .about("Products without sales in the lookback window")
                .arg(store_arg())
                .arg(days_arg()),
        )
        .subcommand(
            Command::new("low-stock")
                .about("Products flagged unavailable, lowest stock first")
                .arg(store_arg())
                .arg(limit_arg()),
        )
        .subcommand(
            Command::new("recent-orders")
                .about("One page of orders, newest first")
                .args(filter_args())
                .arg(limit_arg())
                .arg(
                    Arg::new("page")
                        .long("page")
                        .value_parser(value_parser!(i64))
                        .default_value("1")
                        .help("1-based page number"),
                )
                .arg(
                    Arg::new("search")
                        .long("search")
                        .help("Substring of order number, customer name or phone"),
                )
                .arg(Arg::new("order-type").long("order-type").help("Exact order type")),
        )
        .subcommand(
            Command::new("ask")
                .about("Answer a free-text question about the catalog")
                .arg(store_arg())
                .arg(Arg::new("question").required(true).help("Question text")),
        )
        .subcommand(
            Command::new("substitutes")
                .about("Suggest substitutes for a product")
                .arg(store_arg())
                .arg(Arg::new("product").required(true).help("Product identifier"))
                .arg(top_n_arg()),
        )
        .subcommand(
            Command::new("discounts")
                .about("Discount strategy for aged inventory")
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("stock-alerts")
                .about("Highest-stock products with a recommendation each")
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("quick-analysis")
                .about("Substitutes for every low-stock product")
                .arg(store_arg())
                .arg(top_n_arg()),
        )
}

/// Store identifier of a subcommand
pub(crate) fn store(matches: &ArgMatches) -> String {
    matches.get_one::<String>("store").cloned().unwrap_or_default()
}

/// Common filter parameters of a subcommand
pub(crate) fn filter_params(matches: &ArgMatches) -> FilterParams {
    FilterParams {
        store_id: store(matches),
        date_from: matches.get_one::<String>("from").cloned(),
        date_to: matches.get_one::<String>("to").cloned(),
        status: matches.get_one::<String>("status").cloned(),
        category_id: matches.get_one::<String>("category").cloned(),
    }
}

/// Page request of `recent-orders`, using `default_limit` when no limit is given
pub(crate) fn recent_orders_query(matches: &ArgMatches, default_limit: u64) -> RecentOrdersQuery {
    let limit = matches.get_one::<u64>("limit").copied().unwrap_or(default_limit);
    let mut query = RecentOrdersQuery::new(i64::try_from(limit).unwrap_or(i64::MAX))
        .with_page(matches.get_one::<i64>("page").copied().unwrap_or(1));
    if let Some(search) = matches.get_one::<String>("search") {
        query = query.with_search(search.clone());
    }
    if let Some(order_type) = matches.get_one::<String>("order-type") {
        query = query.with_order_type(order_type.clone());
    }
    query
}
