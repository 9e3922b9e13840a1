use crate::allocator::{AllocationRun, AllocationStat};
use crate::catalog::BidderCatalog;
use crate::dataset::{self, DatasetError};
use crate::estimator::{CompetitiveRatioEstimator, RatioEstimate};
use crate::strategies::StrategyType;
use crate::logger::{Logger, LogEvent};
use crate::{logln, warnln};
use std::path::Path;

/// Market containing the bidder catalog and the query stream
/// This groups together everything one strategy run consumes
pub struct Market {
    pub catalog: BidderCatalog,
    pub queries: Vec<String>,
}

/// Outcome of running one strategy over a market
pub struct VariantResult {
    /// Revenue of the single pass in the original query order
    pub revenue: f64,
    /// Statistics of that pass
    pub stat: AllocationStat,
    pub estimate: RatioEstimate,
}

impl VariantResult {
    /// The two result lines of a strategy run: revenue of the pass in query order, then the
    /// competitive ratio, both at full precision
    pub fn output_lines(&self) -> [String; 2] {
        [format!("{:?}", self.revenue), format!("{:?}", self.estimate.ratio)]
    }
}

impl Market {
    pub fn new(catalog: BidderCatalog, queries: Vec<String>) -> Self {
        Self { catalog, queries }
    }

    /// Load the bidder table and query stream from files
    pub fn load(bidders_path: &Path, queries_path: &Path) -> Result<Self, DatasetError> {
        let catalog = dataset::load_catalog(bidders_path)?;
        let queries = dataset::load_queries(queries_path)?;
        Ok(Self::new(catalog, queries))
    }

    /// Print initialization information about the market
    pub fn printout(&self, logger: &mut Logger) {
        logln!(logger, LogEvent::Allocation, "Loaded {} advertisers", self.catalog.advertiser_count());
        logln!(logger, LogEvent::Allocation, "Loaded {} keywords", self.catalog.keyword_count());
        logln!(logger, LogEvent::Allocation, "Loaded {} queries", self.queries.len());
        if self.queries.is_empty() {
            warnln!(logger, LogEvent::Allocation, "query stream is empty, every revenue will be 0");
        }
        logln!(logger, LogEvent::Allocation, "Optimal revenue (sum of budgets): {:.2}", self.catalog.total_initial_budget());
    }

    /// Run one strategy: a single pass in the given order, then the randomized ratio estimate
    /// Budgets start fresh for the pass and are reset again when the estimate is done
    pub fn run_variant(&mut self, strategy_type: StrategyType, trials: usize, seed: u64, logger: &mut Logger) -> VariantResult {
        let strategy = strategy_type.create_strategy();

        self.catalog.reset();
        let run = AllocationRun::new(&self.queries, strategy.as_ref(), &mut self.catalog, logger);
        let stat = AllocationStat::new(&self.catalog, &run);
        logln!(logger, LogEvent::Allocation, "\n=== {} ===", strategy.strategy_name());
        stat.printout(logger);

        let estimate = CompetitiveRatioEstimator::new(seed, trials)
            .estimate(&self.queries, strategy.as_ref(), &mut self.catalog, logger);
        logln!(logger, LogEvent::Allocation, "Mean revenue over {} trials: {:.2}, competitive ratio: {:.4}",
            trials, estimate.mean_revenue, estimate.ratio);

        VariantResult {
            revenue: run.total_revenue,
            stat,
            estimate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::record;

    fn market() -> Market {
        let catalog = BidderCatalog::from_records(vec![
            record(1, "a", 2.0, Some(10.0)),
            record(2, "a", 1.0, Some(10.0)),
            record(2, "b", 1.0, None),
        ])
        .unwrap();
        let queries = ["a", "b", "a", "a", "b", "c"].iter().map(|q| q.to_string()).collect();
        Market::new(catalog, queries)
    }

    #[test]
    fn test_run_variant_leaves_budgets_reset() {
        let mut market = market();
        let mut logger = Logger::new();
        let result = market.run_variant(StrategyType::GREEDY, 10, 0, &mut logger);

        assert_eq!(result.revenue, 8.0);
        // Every order earns 8 of the 20 in budgets
        assert_eq!(result.output_lines(), ["8.0".to_string(), "0.4".to_string()]);
        assert_eq!(result.stat.overall_stat.no_bidders_count, 1);
        assert_eq!(result.estimate.trial_revenues.len(), 10);
        for advertiser in market.catalog.advertisers() {
            assert_eq!(advertiser.remaining_budget, advertiser.initial_budget);
        }
    }

    #[test]
    fn test_run_variant_is_repeatable() {
        let mut market = market();
        let mut logger = Logger::new();
        let first = market.run_variant(StrategyType::MSVV, 15, 3, &mut logger);
        let second = market.run_variant(StrategyType::MSVV, 15, 3, &mut logger);
        assert_eq!(first.revenue, second.revenue);
        assert_eq!(first.estimate, second.estimate);
    }

    #[test]
    fn test_output_lines_keep_full_precision() {
        let mut market = market();
        let mut logger = Logger::new();
        let mut result = market.run_variant(StrategyType::BALANCE, 5, 0, &mut logger);
        result.revenue = 7.25;
        result.estimate.ratio = 0.941176;
        assert_eq!(result.output_lines(), ["7.25".to_string(), "0.941176".to_string()]);
    }
}
