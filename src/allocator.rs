//! This file contains the online allocation pass: the query stream is consumed in order and every
//! query is decided on the spot, charging the winner's budget before the next query is seen.
//!
//! `process` is the lean version used inside the randomized trials, it only sums revenue.
//! `AllocationRun` records each decision as well so that `AllocationStat` can report on it.

use crate::catalog::{AdvertiserId, BidderCatalog};
use crate::strategies::{StrategyTrait, Winner};
use crate::logger::{Logger, LogEvent};
use crate::{errln, log, logln};
use crate::utils::VERBOSE_QUERIES;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

/// One line of the per-query decision log
#[derive(Debug, Serialize)]
struct QueryLogRow<'a> {
    strategy: &'a str,
    keyword: &'a str,
    advertiser: Option<AdvertiserId>,
    charge: f64,
    outcome: &'static str,
}

impl<'a> QueryLogRow<'a> {
    fn new(strategy: &'a str, keyword: &'a str, winner: &Winner) -> Self {
        let outcome = match winner {
            Winner::Advertiser { .. } => "WON",
            Winner::NO_BIDDERS => "NO_BIDDERS",
            Winner::BUDGETS_EXHAUSTED => "BUDGETS_EXHAUSTED",
        };
        Self {
            strategy,
            keyword,
            advertiser: winner.advertiser_id(),
            charge: winner.charge(),
            outcome,
        }
    }
}

const QUERY_LOG_COLUMNS: [&str; 5] = ["strategy", "keyword", "advertiser", "charge", "outcome"];

/// Run `write` against an in-memory csv writer and return what it produced
fn to_csv_line<F>(write: F) -> Result<String, csv::Error>
where
    F: FnOnce(&mut csv::Writer<Vec<u8>>) -> Result<(), csv::Error>,
{
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    write(&mut writer)?;
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Header line of the per-query decision log
pub fn query_log_header() -> Result<String, csv::Error> {
    to_csv_line(|writer| writer.write_record(QUERY_LOG_COLUMNS))
}

/// Decide one query and charge the winner
fn allocate_query(keyword: &str, strategy: &dyn StrategyTrait, catalog: &mut BidderCatalog) -> Winner {
    let winner = strategy.select(catalog.eligible_bidders(keyword), catalog);
    if let Winner::Advertiser { advertiser_id, charge } = winner {
        catalog.charge(advertiser_id, charge);
    }
    winner
}

/// Run one pass over `queries` in order and return the total revenue
/// Budgets in `catalog` are charged in place and are not reset afterwards
pub fn process(queries: &[String], strategy: &dyn StrategyTrait, catalog: &mut BidderCatalog) -> f64 {
    queries
        .iter()
        .map(|keyword| allocate_query(keyword, strategy, catalog).charge())
        .sum()
}

/// Container for the outcome of one pass
/// Note: results are matched to queries by index
pub struct AllocationRun {
    pub results: Vec<Winner>,
    pub total_revenue: f64,
}

impl AllocationRun {
    /// Run one pass over `queries`, recording every decision
    pub fn new(queries: &[String], strategy: &dyn StrategyTrait, catalog: &mut BidderCatalog, logger: &mut Logger) -> Self {
        let verbose = VERBOSE_QUERIES.load(Ordering::Relaxed) && logger.is_listening(LogEvent::Query);
        let mut results = Vec::with_capacity(queries.len());
        let mut total_revenue = 0.0;

        for keyword in queries {
            let winner = allocate_query(keyword, strategy, catalog);
            total_revenue += winner.charge();

            if verbose {
                let row = QueryLogRow::new(strategy.strategy_name(), keyword, &winner);
                match to_csv_line(|writer| writer.serialize(&row)) {
                    Ok(line) => log!(logger, LogEvent::Query, "{}", line),
                    Err(e) => errln!(logger, LogEvent::Query, "cannot write query log row for '{}': {}", keyword, e),
                }
            }

            results.push(winner);
        }

        Self { results, total_revenue }
    }
}

/// Statistics for a single advertiser
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertiserStat {
    pub advertiser_id: AdvertiserId,
    pub queries_won: usize,
    pub total_charge: f64,
    pub initial_budget: f64,
    pub remaining_budget: f64,
}

impl AdvertiserStat {
    pub fn fraction_spent(&self) -> f64 {
        self.total_charge / self.initial_budget
    }
}

/// Overall statistics for one pass
#[derive(Debug, Clone, PartialEq)]
pub struct OverallStat {
    pub queries: usize,
    pub matched_count: usize,
    pub no_bidders_count: usize,
    pub budgets_exhausted_count: usize,
    pub total_revenue: f64,
}

pub struct AllocationStat {
    pub advertiser_stats: Vec<AdvertiserStat>,
    pub overall_stat: OverallStat,
}

impl AllocationStat {
    /// Generate statistics from the catalog state right after `run`
    pub fn new(catalog: &BidderCatalog, run: &AllocationRun) -> Self {
        let mut advertiser_stats: BTreeMap<AdvertiserId, AdvertiserStat> = catalog
            .advertisers()
            .map(|advertiser| (advertiser.advertiser_id, AdvertiserStat {
                advertiser_id: advertiser.advertiser_id,
                queries_won: 0,
                total_charge: 0.0,
                initial_budget: advertiser.initial_budget,
                remaining_budget: advertiser.remaining_budget,
            }))
            .collect();

        let mut overall_stat = OverallStat {
            queries: run.results.len(),
            matched_count: 0,
            no_bidders_count: 0,
            budgets_exhausted_count: 0,
            total_revenue: 0.0,
        };

        for winner in &run.results {
            match winner {
                Winner::Advertiser { advertiser_id, charge } => {
                    overall_stat.matched_count += 1;
                    overall_stat.total_revenue += charge;
                    if let Some(stat) = advertiser_stats.get_mut(advertiser_id) {
                        stat.queries_won += 1;
                        stat.total_charge += charge;
                    }
                }
                Winner::NO_BIDDERS => overall_stat.no_bidders_count += 1,
                Winner::BUDGETS_EXHAUSTED => overall_stat.budgets_exhausted_count += 1,
            }
        }

        Self {
            advertiser_stats: advertiser_stats.into_values().collect(),
            overall_stat,
        }
    }

    /// Output per-advertiser statistics
    pub fn printout_advertisers(&self, logger: &mut Logger, event: LogEvent) {
        for stat in &self.advertiser_stats {
            logln!(logger, event, "Advertiser {}: won {} queries, spent {:.2} / {:.2} ({:.1}%), remaining {:.2}",
                stat.advertiser_id,
                stat.queries_won,
                stat.total_charge,
                stat.initial_budget,
                stat.fraction_spent() * 100.0,
                stat.remaining_budget);
        }
    }

    /// Output only overall statistics
    pub fn printout_overall(&self, logger: &mut Logger) {
        logln!(logger, LogEvent::Allocation, "\n=== Allocation Statistics ===");
        logln!(logger, LogEvent::Allocation, "Queries (matched/total): {} / {}",
            self.overall_stat.matched_count,
            self.overall_stat.queries);
        logln!(logger, LogEvent::Allocation, "Unmatched (no bidders/budgets exhausted): {} / {}",
            self.overall_stat.no_bidders_count,
            self.overall_stat.budgets_exhausted_count);
        logln!(logger, LogEvent::Allocation, "Total Revenue: {:.2}", self.overall_stat.total_revenue);
    }

    pub fn printout(&self, logger: &mut Logger) {
        logln!(logger, LogEvent::Allocation, "\n=== Advertiser Statistics ===");
        self.printout_advertisers(logger, LogEvent::Allocation);
        self.printout_overall(logger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::record;
    use crate::logger::BufferReceiver;
    use crate::strategies::{StrategyBalance, StrategyGreedy, StrategyType};

    fn queries(keywords: &[&str]) -> Vec<String> {
        keywords.iter().map(|k| k.to_string()).collect()
    }

    fn mixed_catalog() -> BidderCatalog {
        BidderCatalog::from_records(vec![
            record(1, "shoes", 4.0, Some(10.0)),
            record(2, "shoes", 3.0, Some(12.0)),
            record(2, "boots", 5.0, None),
            record(3, "boots", 5.0, Some(7.0)),
            record(3, "hats", 1.5, None),
        ])
        .unwrap()
    }

    #[test]
    fn test_greedy_example() {
        let mut catalog = BidderCatalog::from_records(vec![
            record(1, "shoes", 10.0, Some(5.0)),
            record(2, "shoes", 8.0, Some(20.0)),
        ])
        .unwrap();
        let mut logger = Logger::new();
        let run = AllocationRun::new(&queries(&["shoes"]), &StrategyGreedy, &mut catalog, &mut logger);
        assert_eq!(run.total_revenue, 8.0);
        assert_eq!(run.results, vec![Winner::Advertiser { advertiser_id: 2, charge: 8.0 }]);
        assert_eq!(catalog.remaining_budget(2), 12.0);
        assert_eq!(catalog.remaining_budget(1), 5.0);
    }

    #[test]
    fn test_balance_tie_example() {
        let mut catalog = BidderCatalog::from_records(vec![
            record(1, "x", 5.0, Some(10.0)),
            record(2, "x", 5.0, Some(10.0)),
        ])
        .unwrap();
        let revenue = process(&queries(&["x"]), &StrategyBalance, &mut catalog);
        assert_eq!(revenue, 5.0);
        assert_eq!(catalog.remaining_budget(1), 5.0);
        assert_eq!(catalog.remaining_budget(2), 10.0);
    }

    #[test]
    fn test_empty_queries_leave_budgets_untouched() {
        for strategy_type in StrategyType::ALL {
            let mut catalog = mixed_catalog();
            let revenue = process(&[], strategy_type.create_strategy().as_ref(), &mut catalog);
            assert_eq!(revenue, 0.0);
            for advertiser in catalog.advertisers() {
                assert_eq!(advertiser.remaining_budget, advertiser.initial_budget);
            }
        }
    }

    #[test]
    fn test_unknown_keyword_contributes_nothing() {
        let mut catalog = mixed_catalog();
        let mut logger = Logger::new();
        let run = AllocationRun::new(&queries(&["socks", "socks"]), &StrategyGreedy, &mut catalog, &mut logger);
        assert_eq!(run.total_revenue, 0.0);
        assert_eq!(run.results, vec![Winner::NO_BIDDERS, Winner::NO_BIDDERS]);
    }

    #[test]
    fn test_budgets_non_increasing_and_bounded() {
        let stream = queries(&["shoes", "boots", "shoes", "hats", "boots", "shoes", "boots", "shoes", "hats", "boots"]);
        for strategy_type in StrategyType::ALL {
            let strategy = strategy_type.create_strategy();
            let mut catalog = mixed_catalog();
            let mut previous: Vec<f64> = catalog.advertisers().map(|a| a.remaining_budget).collect();
            for keyword in &stream {
                process(std::slice::from_ref(keyword), strategy.as_ref(), &mut catalog);
                let current: Vec<f64> = catalog.advertisers().map(|a| a.remaining_budget).collect();
                for ((before, after), advertiser) in previous.iter().zip(&current).zip(catalog.advertisers()) {
                    assert!(after <= before, "{} raised a budget", strategy.strategy_name());
                    assert!(*after >= 0.0 && *after <= advertiser.initial_budget);
                }
                previous = current;
            }
        }
    }

    #[test]
    fn test_revenue_is_sum_of_charges() {
        let stream = queries(&["shoes", "boots", "boots", "hats", "shoes", "boots", "shoes", "shoes"]);
        for strategy_type in StrategyType::ALL {
            let mut catalog = mixed_catalog();
            let mut logger = Logger::new();
            let run = AllocationRun::new(&stream, strategy_type.create_strategy().as_ref(), &mut catalog, &mut logger);
            let sum: f64 = run.results.iter().map(|w| w.charge()).sum();
            assert_eq!(run.total_revenue, sum);

            let spent: f64 = catalog.advertisers().map(|a| a.initial_budget - a.remaining_budget).sum();
            assert!((spent - run.total_revenue).abs() < 1e-9);
        }
    }

    #[test]
    fn test_process_matches_recorded_run() {
        let stream = queries(&["boots", "boots", "shoes", "hats", "boots"]);
        for strategy_type in StrategyType::ALL {
            let strategy = strategy_type.create_strategy();
            let mut catalog = mixed_catalog();
            let revenue = process(&stream, strategy.as_ref(), &mut catalog);
            catalog.reset();
            let mut logger = Logger::new();
            let run = AllocationRun::new(&stream, strategy.as_ref(), &mut catalog, &mut logger);
            assert_eq!(revenue, run.total_revenue);
        }
    }

    #[test]
    fn test_allocation_stat_counts() {
        // boots: advertisers 2 and 3 both bid 5, greedy picks 2 until its 12 runs out after two wins
        let stream = queries(&["boots", "boots", "boots", "boots", "socks"]);
        let mut catalog = mixed_catalog();
        let mut logger = Logger::new();
        let run = AllocationRun::new(&stream, &StrategyGreedy, &mut catalog, &mut logger);
        let stat = AllocationStat::new(&catalog, &run);

        assert_eq!(stat.overall_stat.queries, 5);
        assert_eq!(stat.overall_stat.matched_count, 3);
        assert_eq!(stat.overall_stat.budgets_exhausted_count, 1);
        assert_eq!(stat.overall_stat.no_bidders_count, 1);
        assert_eq!(stat.overall_stat.total_revenue, 15.0);

        let by_id: Vec<(AdvertiserId, usize)> = stat.advertiser_stats.iter().map(|s| (s.advertiser_id, s.queries_won)).collect();
        assert_eq!(by_id, vec![(1, 0), (2, 2), (3, 1)]);
        assert_eq!(stat.advertiser_stats[1].remaining_budget, 2.0);
    }

    #[test]
    fn test_query_log_is_valid_csv() {
        let mut catalog = BidderCatalog::from_records(vec![record(1, "shoes, \"red\"", 2.0, Some(10.0))]).unwrap();
        let mut logger = Logger::new();
        let (receiver, buffer) = BufferReceiver::new(vec![LogEvent::Query]);
        logger.add_receiver(receiver);

        VERBOSE_QUERIES.store(true, Ordering::Relaxed);
        AllocationRun::new(&queries(&["shoes, \"red\"", "socks"]), &StrategyGreedy, &mut catalog, &mut logger);
        VERBOSE_QUERIES.store(false, Ordering::Relaxed);

        let text = format!("{}{}", query_log_header().unwrap(), buffer.borrow());
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let rows: Vec<Vec<String>> = reader
            .records()
            .map(|record| record.unwrap().iter().map(|field| field.to_string()).collect())
            .collect();
        let header: Vec<String> = reader.headers().unwrap().iter().map(|field| field.to_string()).collect();

        assert_eq!(header, QUERY_LOG_COLUMNS.to_vec());
        assert_eq!(rows, vec![
            vec!["greedy", "shoes, \"red\"", "1", "2.0", "WON"],
            vec!["greedy", "socks", "", "0.0", "NO_BIDDERS"],
        ]);
    }
}
