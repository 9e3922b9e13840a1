//! Synthetic market with log-normal budgets and bids and a uniformly drawn query stream.
//!
//! There is no known best strategy here. The scenario checks the properties every strategy must
//! keep on arbitrary input: budgets never go negative, revenue never exceeds the offline optimum,
//! the ratio stays in [0, 1] and a fixed seed reproduces the same estimate.

use crate::allocator::process;
use crate::catalog::{AdvertiserId, BidderCatalog, BidderRecord};
use crate::estimator;
use crate::market::Market;
use crate::scenarios::Validation;
use crate::strategies::StrategyType;
use crate::utils::{self, DEFAULT_SEED};
use crate::logger::{Logger, LogEvent};
use crate::logln;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::Distribution;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "random_market",
    run,
});

const NUM_ADVERTISERS: u64 = 20;
const NUM_KEYWORDS: usize = 50;
const MAX_BIDDERS_PER_KEYWORD: usize = 5;
const NUM_QUERIES: usize = 2000;
const TRIALS: usize = 20;

fn prepare_market() -> Result<Market, Box<dyn std::error::Error>> {
    let budget_dist = utils::lognormal_dist(100.0, 30.0)?;
    let bid_dist = utils::lognormal_dist(1.0, 0.5)?;
    let mut rng_budgets = StdRng::seed_from_u64(utils::get_seed(1));
    let mut rng_bids = StdRng::seed_from_u64(utils::get_seed(2));
    let mut rng_queries = StdRng::seed_from_u64(utils::get_seed(3));

    let budgets: Vec<f64> = (0..NUM_ADVERTISERS)
        .map(|_| budget_dist.sample(&mut rng_budgets))
        .collect();

    let keywords: Vec<String> = (0..NUM_KEYWORDS).map(|k| format!("keyword {}", k)).collect();
    let mut records = Vec::new();
    for keyword in &keywords {
        let num_bidders = rng_bids.gen_range(1..=MAX_BIDDERS_PER_KEYWORD);
        let bidders: Vec<AdvertiserId> = (0..NUM_ADVERTISERS).choose_multiple(&mut rng_bids, num_bidders);
        for advertiser_id in bidders {
            records.push(BidderRecord {
                advertiser_id,
                keyword: keyword.clone(),
                bid_value: bid_dist.sample(&mut rng_bids),
                budget: Some(budgets[advertiser_id as usize]),
            });
        }
    }
    let catalog = BidderCatalog::from_records(records)?;

    let queries: Vec<String> = (0..NUM_QUERIES)
        .filter_map(|_| keywords.choose(&mut rng_queries).cloned())
        .collect();

    Ok(Market::new(catalog, queries))
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let mut market = prepare_market()?;
    market.printout(logger);
    let optimal_revenue = market.catalog.total_initial_budget();

    logln!(logger, LogEvent::Scenario, "");
    let mut validation = Validation::new();

    for strategy_type in StrategyType::ALL {
        let name = strategy_type.name();
        let strategy = strategy_type.create_strategy();

        market.catalog.reset();
        let revenue = process(&market.queries, strategy.as_ref(), &mut market.catalog);
        let lowest_budget = market
            .catalog
            .advertisers()
            .map(|advertiser| advertiser.remaining_budget)
            .fold(f64::INFINITY, f64::min);
        validation.check(logger, lowest_budget >= 0.0,
            format!("{}: no budget goes negative (lowest remaining {:.4})", name, lowest_budget));
        validation.check(logger, revenue <= optimal_revenue,
            format!("{}: revenue stays within the optimum: {:.2} <= {:.2}", name, revenue, optimal_revenue));

        let result = market.run_variant(strategy_type, TRIALS, DEFAULT_SEED, logger);
        validation.check(logger, (0.0..=1.0).contains(&result.estimate.ratio),
            format!("{}: competitive ratio within [0, 1]: {:.4}", name, result.estimate.ratio));

        let repeated = estimator::estimate(&market.queries, strategy.as_ref(), &mut market.catalog, TRIALS, DEFAULT_SEED);
        validation.check(logger, repeated == result.estimate.ratio,
            format!("{}: same seed reproduces the ratio: {:.6} = {:.6}", name, repeated, result.estimate.ratio));
    }

    validation.finish(scenario_name)
}
