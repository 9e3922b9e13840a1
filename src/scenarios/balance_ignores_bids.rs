//! A rich advertiser bids little and a poorer advertiser bids a lot on the same keyword.
//!
//! Balance only looks at remaining budgets, so the rich low bidder wins every query. Greedy and
//! MSVV both keep serving the high bidder, MSVV because its discount never drops the high bid
//! below the untouched low bid before the stream ends.

use crate::catalog::{BidderCatalog, BidderRecord};
use crate::market::Market;
use crate::scenarios::Validation;
use crate::strategies::StrategyType;
use crate::utils::DEFAULT_SEED;
use crate::logger::{Logger, LogEvent};
use crate::logln;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "balance_ignores_bids",
    run,
});

fn prepare_market() -> Result<Market, Box<dyn std::error::Error>> {
    let catalog = BidderCatalog::from_records(vec![
        BidderRecord { advertiser_id: 1, keyword: "x".to_string(), bid_value: 10.0, budget: Some(100.0) },
        BidderRecord { advertiser_id: 2, keyword: "x".to_string(), bid_value: 1.0, budget: Some(200.0) },
    ])?;
    Ok(Market::new(catalog, vec!["x".to_string(); 10]))
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let mut market = prepare_market()?;
    market.printout(logger);

    let greedy = market.run_variant(StrategyType::GREEDY, 10, DEFAULT_SEED, logger);
    let balance = market.run_variant(StrategyType::BALANCE, 10, DEFAULT_SEED, logger);
    let msvv = market.run_variant(StrategyType::MSVV, 10, DEFAULT_SEED, logger);

    logln!(logger, LogEvent::Scenario, "");
    let mut validation = Validation::new();

    validation.check(logger, balance.revenue == 10.0,
        format!("Balance gives every query to the richer low bidder: {:.2} = 10.00", balance.revenue));

    validation.check(logger, greedy.revenue > balance.revenue,
        format!("Greedy earns more than Balance: {:.2} > {:.2}", greedy.revenue, balance.revenue));

    validation.check(logger, msvv.revenue > balance.revenue,
        format!("MSVV earns more than Balance: {:.2} > {:.2}", msvv.revenue, balance.revenue));

    validation.check(logger, msvv.estimate.ratio > balance.estimate.ratio,
        format!("MSVV competitive ratio is above Balance: {:.4} > {:.4}", msvv.estimate.ratio, balance.estimate.ratio));

    validation.finish(scenario_name)
}
