//! Two advertisers with equal budgets share keyword "x", only advertiser 1 bids on "y".
//! The stream brings all "x" queries first, then all "y" queries.
//!
//! - Greedy: ties on "x" go to advertiser 1, which is exhausted before any "y" arrives
//!
//! - Balance and MSVV: "x" alternates between both, leaving half of advertiser 1's budget for "y"

use crate::catalog::{BidderCatalog, BidderRecord};
use crate::market::Market;
use crate::scenarios::Validation;
use crate::strategies::StrategyType;
use crate::utils::DEFAULT_SEED;
use crate::logger::{Logger, LogEvent};
use crate::logln;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "greedy_tie_trap",
    run,
});

const BUDGET: f64 = 100.0;
const QUERIES_PER_KEYWORD: usize = 100;

fn prepare_market() -> Result<Market, Box<dyn std::error::Error>> {
    let record = |advertiser_id, keyword: &str| BidderRecord {
        advertiser_id,
        keyword: keyword.to_string(),
        bid_value: 1.0,
        budget: Some(BUDGET),
    };
    let catalog = BidderCatalog::from_records(vec![
        record(1, "x"),
        record(2, "x"),
        record(1, "y"),
    ])?;

    let mut queries = vec!["x".to_string(); QUERIES_PER_KEYWORD];
    queries.extend(vec!["y".to_string(); QUERIES_PER_KEYWORD]);
    Ok(Market::new(catalog, queries))
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let mut market = prepare_market()?;
    market.printout(logger);

    let greedy = market.run_variant(StrategyType::GREEDY, 20, DEFAULT_SEED, logger);
    let balance = market.run_variant(StrategyType::BALANCE, 20, DEFAULT_SEED, logger);
    let msvv = market.run_variant(StrategyType::MSVV, 20, DEFAULT_SEED, logger);

    logln!(logger, LogEvent::Scenario, "");
    let mut validation = Validation::new();

    validation.check(logger, greedy.revenue == BUDGET,
        format!("Greedy exhausts advertiser 1 on \"x\" and earns only one budget: {:.2} = {:.2}", greedy.revenue, BUDGET));

    validation.check(logger, balance.revenue > greedy.revenue,
        format!("Balance earns more than Greedy in stream order: {:.2} > {:.2}", balance.revenue, greedy.revenue));

    validation.check(logger, msvv.revenue > greedy.revenue,
        format!("MSVV earns more than Greedy in stream order: {:.2} > {:.2}", msvv.revenue, greedy.revenue));

    validation.check(logger, balance.revenue == 1.5 * BUDGET,
        format!("Balance splits \"x\" evenly and serves half of \"y\": {:.2} = {:.2}", balance.revenue, 1.5 * BUDGET));

    validation.finish(scenario_name)
}
