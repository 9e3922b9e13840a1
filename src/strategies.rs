//! Matching strategies decide which advertiser wins a single query.
//!
//! All three strategies share the same shape: filter the keyword's bidders down to those who can
//! still afford their own bid, score the rest, take the highest score. Equal scores go to the
//! lower advertiser id. They differ only in the score:
//!
//! - Greedy: the bid itself
//!
//! - Balance: the advertiser's remaining budget
//!
//! - MSVV: the bid discounted by psi(fraction of budget spent) = 1 - e^(fraction - 1)
//!
//! The winner is always charged its unscaled bid.

use crate::catalog::{AdvertiserId, Bid, BidderCatalog};

/// Represents the outcome of a single query
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum Winner {
    Advertiser {
        advertiser_id: AdvertiserId,
        charge: f64,
    },
    /// Nobody registered a bid for the keyword
    NO_BIDDERS,
    /// Bidders exist but none can afford its bid
    BUDGETS_EXHAUSTED,
}

impl Winner {
    /// Revenue collected for this query (0.0 without a winner)
    pub fn charge(&self) -> f64 {
        match self {
            Winner::Advertiser { charge, .. } => *charge,
            _ => 0.0,
        }
    }

    pub fn advertiser_id(&self) -> Option<AdvertiserId> {
        match self {
            Winner::Advertiser { advertiser_id, .. } => Some(*advertiser_id),
            _ => None,
        }
    }
}

/// Trait for online matching strategies
pub trait StrategyTrait {
    /// Pick the winner among `eligible_bidders` given the catalog's current budgets
    /// Only bidders whose remaining budget covers their bid may win
    fn select(&self, eligible_bidders: &[Bid], catalog: &BidderCatalog) -> Winner;

    /// Get the strategy name
    fn strategy_name(&self) -> &'static str;
}

/// Score every affordable bidder and return the highest scoring one
/// Ties go to the lower advertiser id regardless of slice order
fn select_highest_score<F>(eligible_bidders: &[Bid], catalog: &BidderCatalog, score: F) -> Winner
where
    F: Fn(&Bid, f64, f64) -> f64,
{
    if eligible_bidders.is_empty() {
        return Winner::NO_BIDDERS;
    }

    let mut best: Option<(f64, &Bid)> = None;
    for bid in eligible_bidders {
        let advertiser = match catalog.advertiser(bid.advertiser_id) {
            Some(advertiser) => advertiser,
            None => continue,
        };
        if !advertiser.can_afford(bid.bid_value) {
            continue;
        }
        let bid_score = score(bid, advertiser.remaining_budget, advertiser.fraction_spent());
        let is_better = match best {
            None => true,
            Some((best_score, best_bid)) => {
                bid_score > best_score
                    || (bid_score == best_score && bid.advertiser_id < best_bid.advertiser_id)
            }
        };
        if is_better {
            best = Some((bid_score, bid));
        }
    }

    match best {
        Some((_, bid)) => Winner::Advertiser {
            advertiser_id: bid.advertiser_id,
            charge: bid.bid_value,
        },
        None => Winner::BUDGETS_EXHAUSTED,
    }
}

/// Highest bid wins
pub struct StrategyGreedy;

impl StrategyTrait for StrategyGreedy {
    fn select(&self, eligible_bidders: &[Bid], catalog: &BidderCatalog) -> Winner {
        select_highest_score(eligible_bidders, catalog, |bid, _, _| bid.bid_value)
    }

    fn strategy_name(&self) -> &'static str {
        "greedy"
    }
}

/// Largest remaining budget wins
pub struct StrategyBalance;

impl StrategyTrait for StrategyBalance {
    fn select(&self, eligible_bidders: &[Bid], catalog: &BidderCatalog) -> Winner {
        select_highest_score(eligible_bidders, catalog, |_, remaining_budget, _| remaining_budget)
    }

    fn strategy_name(&self) -> &'static str {
        "balance"
    }
}

/// Bid scaled by how much budget is left wins
pub struct StrategyMsvv;

/// Discount applied to a bid once `fraction_spent` of the budget is gone
/// Falls from 1 - 1/e at no spend to 0 at full spend
pub fn msvv_psi(fraction_spent: f64) -> f64 {
    1.0 - (fraction_spent - 1.0).exp()
}

impl StrategyTrait for StrategyMsvv {
    fn select(&self, eligible_bidders: &[Bid], catalog: &BidderCatalog) -> Winner {
        select_highest_score(eligible_bidders, catalog, |bid, _, fraction_spent| {
            bid.bid_value * msvv_psi(fraction_spent)
        })
    }

    fn strategy_name(&self) -> &'static str {
        "msvv"
    }
}

/// Strategy selector as named on the command line
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyType {
    GREEDY,
    BALANCE,
    MSVV,
}

impl StrategyType {
    pub const ALL: [StrategyType; 3] = [StrategyType::GREEDY, StrategyType::BALANCE, StrategyType::MSVV];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "greedy" => Some(StrategyType::GREEDY),
            "balance" => Some(StrategyType::BALANCE),
            "msvv" => Some(StrategyType::MSVV),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.create_strategy().strategy_name()
    }

    pub fn create_strategy(&self) -> Box<dyn StrategyTrait> {
        match self {
            StrategyType::GREEDY => Box::new(StrategyGreedy),
            StrategyType::BALANCE => Box::new(StrategyBalance),
            StrategyType::MSVV => Box::new(StrategyMsvv),
        }
    }
}
