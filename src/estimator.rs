//! Monte-Carlo estimate of a strategy's competitive ratio.
//!
//! The offline optimum is approximated by the sum of all budgets, which is what a clairvoyant
//! allocator could collect when bids are small against budgets. Each trial shuffles the working
//! copy of the query stream further, resets the budgets and runs one online pass.

use crate::allocator::process;
use crate::catalog::BidderCatalog;
use crate::strategies::StrategyTrait;
use crate::logger::{Logger, LogEvent};
use crate::logln;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Result of a competitive ratio estimate
#[derive(Debug, Clone, PartialEq)]
pub struct RatioEstimate {
    /// Revenue of each trial, in trial order
    pub trial_revenues: Vec<f64>,
    pub mean_revenue: f64,
    pub optimal_revenue: f64,
    pub ratio: f64,
}

pub struct CompetitiveRatioEstimator<R: Rng = StdRng> {
    rng: R,
    trials: usize,
}

impl CompetitiveRatioEstimator<StdRng> {
    /// Estimator with a generator seeded from `seed`
    pub fn new(seed: u64, trials: usize) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), trials)
    }
}

impl<R: Rng> CompetitiveRatioEstimator<R> {
    pub fn with_rng(rng: R, trials: usize) -> Self {
        Self { rng, trials }
    }

    /// Run all trials and average their revenue against the offline optimum
    ///
    /// The generator state carries over from one trial's shuffle to the next, and over to the
    /// next call of `estimate`. Budgets are reset before every trial and once more at the end.
    pub fn estimate(&mut self, queries: &[String], strategy: &dyn StrategyTrait, catalog: &mut BidderCatalog, logger: &mut Logger) -> RatioEstimate {
        let optimal_revenue = catalog.total_initial_budget();
        let mut permuted = queries.to_vec();
        let mut trial_revenues = Vec::with_capacity(self.trials);

        for trial in 0..self.trials {
            permuted.shuffle(&mut self.rng);
            catalog.reset();
            let revenue = process(&permuted, strategy, catalog);
            logln!(logger, LogEvent::Trial, "{} trial {}: revenue {:.2}", strategy.strategy_name(), trial + 1, revenue);
            trial_revenues.push(revenue);
        }
        catalog.reset();

        let mean_revenue = if trial_revenues.is_empty() {
            0.0
        } else {
            trial_revenues.iter().sum::<f64>() / trial_revenues.len() as f64
        };
        let ratio = if optimal_revenue > 0.0 { mean_revenue / optimal_revenue } else { 0.0 };

        RatioEstimate {
            trial_revenues,
            mean_revenue,
            optimal_revenue,
            ratio,
        }
    }
}

/// Competitive ratio of `strategy` over `trials` permutations drawn from `seed`
pub fn estimate(queries: &[String], strategy: &dyn StrategyTrait, catalog: &mut BidderCatalog, trials: usize, seed: u64) -> f64 {
    let mut logger = Logger::new();
    CompetitiveRatioEstimator::new(seed, trials)
        .estimate(queries, strategy, catalog, &mut logger)
        .ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::record;
    use crate::strategies::{StrategyGreedy, StrategyType};
    use float_cmp::{ApproxEq, F64Margin};

    fn contested_market() -> (BidderCatalog, Vec<String>) {
        let catalog = BidderCatalog::from_records(vec![
            record(1, "x", 1.0, Some(6.0)),
            record(2, "x", 1.0, Some(6.0)),
            record(2, "y", 1.0, None),
            record(3, "y", 2.0, Some(4.0)),
            record(3, "z", 1.0, None),
        ])
        .unwrap();
        let mut queries = Vec::new();
        for _ in 0..8 {
            queries.push("x".to_string());
        }
        for _ in 0..5 {
            queries.push("y".to_string());
        }
        for _ in 0..3 {
            queries.push("z".to_string());
        }
        (catalog, queries)
    }

    #[test]
    fn test_ratio_is_bounded() {
        let (mut catalog, queries) = contested_market();
        for strategy_type in StrategyType::ALL {
            let ratio = estimate(&queries, strategy_type.create_strategy().as_ref(), &mut catalog, 25, 0);
            assert!((0.0..=1.0).contains(&ratio), "{} ratio {}", strategy_type.name(), ratio);
        }
    }

    #[test]
    fn test_same_seed_same_ratio() {
        let (mut catalog, queries) = contested_market();
        for strategy_type in StrategyType::ALL {
            let strategy = strategy_type.create_strategy();
            let first = estimate(&queries, strategy.as_ref(), &mut catalog, 40, 11);
            let second = estimate(&queries, strategy.as_ref(), &mut catalog, 40, 11);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_injected_generator_matches_seeded_estimator() {
        let (mut catalog, queries) = contested_market();
        let mut logger = Logger::new();
        let seeded = CompetitiveRatioEstimator::new(5, 10).estimate(&queries, &StrategyGreedy, &mut catalog, &mut logger);
        let injected = CompetitiveRatioEstimator::with_rng(StdRng::seed_from_u64(5), 10)
            .estimate(&queries, &StrategyGreedy, &mut catalog, &mut logger);
        assert_eq!(seeded, injected);
        assert_eq!(seeded.trial_revenues.len(), 10);
    }

    #[test]
    fn test_budgets_reset_between_trials() {
        // Each trial can spend every budget in full, which only holds if budgets start fresh
        let mut catalog = BidderCatalog::from_records(vec![
            record(1, "x", 2.0, Some(4.0)),
            record(2, "y", 3.0, Some(3.0)),
        ])
        .unwrap();
        let queries: Vec<String> = ["x", "y", "x", "y"].iter().map(|q| q.to_string()).collect();
        let mut logger = Logger::new();
        let result = CompetitiveRatioEstimator::new(1, 20).estimate(&queries, &StrategyGreedy, &mut catalog, &mut logger);

        assert!(result.trial_revenues.iter().all(|&revenue| revenue == 7.0));
        assert_eq!(result.optimal_revenue, 7.0);
        assert!(result.ratio.approx_eq(1.0, F64Margin::default()));
        assert_eq!(catalog.remaining_budget(1), 4.0);
        assert_eq!(catalog.remaining_budget(2), 3.0);
    }

    #[test]
    fn test_mean_revenue_over_optimal() {
        let (mut catalog, queries) = contested_market();
        let mut logger = Logger::new();
        let result = CompetitiveRatioEstimator::new(2, 30).estimate(&queries, &StrategyGreedy, &mut catalog, &mut logger);
        let mean = result.trial_revenues.iter().sum::<f64>() / 30.0;
        assert!(result.mean_revenue.approx_eq(mean, F64Margin::default()));
        assert_eq!(result.optimal_revenue, 16.0);
        assert!(result.ratio.approx_eq(mean / 16.0, F64Margin::default()));
    }

    #[test]
    fn test_zero_trials() {
        let (mut catalog, queries) = contested_market();
        let ratio = estimate(&queries, &StrategyGreedy, &mut catalog, 0, 0);
        assert_eq!(ratio, 0.0);
    }
}
