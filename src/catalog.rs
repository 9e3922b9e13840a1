//! The bidder catalog holds every advertiser's budget and every registered bid, keyed by keyword.
//!
//! Bids never change after construction. Remaining budgets are the only mutable state and are
//! charged by the allocator one winning query at a time. `reset()` restores them before a new
//! trial so depleted budgets never leak from one pass into the next.

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Advertiser identifier as it appears in the bidder table
pub type AdvertiserId = u64;

/// Errors raised while building a catalog from bidder records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("advertiser {advertiser_id} has non-positive budget {budget}")]
    NonPositiveBudget { advertiser_id: AdvertiserId, budget: f64 },
    #[error("advertiser {advertiser_id} has non-finite budget")]
    NonFiniteBudget { advertiser_id: AdvertiserId },
    #[error("advertiser {advertiser_id} has no budget on any row")]
    MissingBudget { advertiser_id: AdvertiserId },
    #[error("advertiser {advertiser_id} has conflicting budgets {first} and {second}")]
    ConflictingBudget { advertiser_id: AdvertiserId, first: f64, second: f64 },
    #[error("advertiser {advertiser_id} bids more than once on keyword '{keyword}'")]
    DuplicateBid { advertiser_id: AdvertiserId, keyword: String },
    #[error("advertiser {advertiser_id} has invalid bid {bid_value} on keyword '{keyword}'")]
    InvalidBid { advertiser_id: AdvertiserId, keyword: String, bid_value: f64 },
}

/// One row of the bidder table
/// The budget may be absent on all but one row of each advertiser
#[derive(Debug, Clone, PartialEq)]
pub struct BidderRecord {
    pub advertiser_id: AdvertiserId,
    pub keyword: String,
    pub bid_value: f64,
    pub budget: Option<f64>,
}

/// An advertiser and its budget state for the current trial
#[derive(Debug, Clone, PartialEq)]
pub struct Advertiser {
    pub advertiser_id: AdvertiserId,
    pub initial_budget: f64,
    pub remaining_budget: f64,
}

impl Advertiser {
    /// Share of the initial budget already charged in this trial, in [0, 1]
    pub fn fraction_spent(&self) -> f64 {
        (self.initial_budget - self.remaining_budget) / self.initial_budget
    }

    pub fn can_afford(&self, amount: f64) -> bool {
        self.remaining_budget >= amount
    }
}

/// A registered bid of one advertiser on one keyword
#[derive(Debug, Clone, PartialEq)]
pub struct Bid {
    pub advertiser_id: AdvertiserId,
    pub bid_value: f64,
}

pub struct BidderCatalog {
    advertisers: BTreeMap<AdvertiserId, Advertiser>,
    /// Bid lists are kept sorted by ascending advertiser id
    bids_by_keyword: HashMap<String, Vec<Bid>>,
}

impl BidderCatalog {
    /// Build a catalog from bidder records, validating budgets and bids
    pub fn from_records<I>(records: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = BidderRecord>,
    {
        let mut budgets: BTreeMap<AdvertiserId, Option<f64>> = BTreeMap::new();
        let mut bids_by_keyword: HashMap<String, Vec<Bid>> = HashMap::new();

        for record in records {
            if !record.bid_value.is_finite() || record.bid_value < 0.0 {
                return Err(CatalogError::InvalidBid {
                    advertiser_id: record.advertiser_id,
                    keyword: record.keyword,
                    bid_value: record.bid_value,
                });
            }

            let known_budget = budgets.entry(record.advertiser_id).or_insert(None);
            if let Some(budget) = record.budget {
                if !budget.is_finite() {
                    return Err(CatalogError::NonFiniteBudget { advertiser_id: record.advertiser_id });
                }
                match *known_budget {
                    Some(first) if first != budget => {
                        return Err(CatalogError::ConflictingBudget {
                            advertiser_id: record.advertiser_id,
                            first,
                            second: budget,
                        });
                    }
                    _ => *known_budget = Some(budget),
                }
            }

            let bids = bids_by_keyword.entry(record.keyword.clone()).or_default();
            if bids.iter().any(|bid| bid.advertiser_id == record.advertiser_id) {
                return Err(CatalogError::DuplicateBid {
                    advertiser_id: record.advertiser_id,
                    keyword: record.keyword,
                });
            }
            bids.push(Bid {
                advertiser_id: record.advertiser_id,
                bid_value: record.bid_value,
            });
        }

        let mut advertisers = BTreeMap::new();
        for (advertiser_id, budget) in budgets {
            let budget = budget.ok_or(CatalogError::MissingBudget { advertiser_id })?;
            if budget <= 0.0 {
                return Err(CatalogError::NonPositiveBudget { advertiser_id, budget });
            }
            advertisers.insert(advertiser_id, Advertiser {
                advertiser_id,
                initial_budget: budget,
                remaining_budget: budget,
            });
        }

        for bids in bids_by_keyword.values_mut() {
            bids.sort_by_key(|bid| bid.advertiser_id);
        }

        Ok(Self { advertisers, bids_by_keyword })
    }

    /// Bids registered for exactly this keyword, sorted by advertiser id
    /// An unknown keyword has no bidders
    pub fn eligible_bidders(&self, keyword: &str) -> &[Bid] {
        self.bids_by_keyword
            .get(keyword)
            .map(|bids| bids.as_slice())
            .unwrap_or(&[])
    }

    pub fn advertiser(&self, advertiser_id: AdvertiserId) -> Option<&Advertiser> {
        self.advertisers.get(&advertiser_id)
    }

    /// Advertisers in ascending id order
    pub fn advertisers(&self) -> impl Iterator<Item = &Advertiser> {
        self.advertisers.values()
    }

    pub fn advertiser_count(&self) -> usize {
        self.advertisers.len()
    }

    pub fn keyword_count(&self) -> usize {
        self.bids_by_keyword.len()
    }

    /// Remaining budget, or 0.0 for an unknown advertiser
    pub fn remaining_budget(&self, advertiser_id: AdvertiserId) -> f64 {
        self.advertisers
            .get(&advertiser_id)
            .map(|advertiser| advertiser.remaining_budget)
            .unwrap_or(0.0)
    }

    /// Reduce the advertiser's remaining budget by `amount`
    /// The caller has already checked that the advertiser can afford it
    pub fn charge(&mut self, advertiser_id: AdvertiserId, amount: f64) {
        debug_assert!(amount >= 0.0, "negative charge {} for advertiser {}", amount, advertiser_id);
        match self.advertisers.get_mut(&advertiser_id) {
            Some(advertiser) => {
                debug_assert!(
                    advertiser.can_afford(amount),
                    "charge {} exceeds remaining budget {} of advertiser {}",
                    amount, advertiser.remaining_budget, advertiser_id
                );
                advertiser.remaining_budget -= amount;
            }
            None => debug_assert!(false, "charge for unknown advertiser {}", advertiser_id),
        }
    }

    /// Restore every remaining budget to the initial budget
    pub fn reset(&mut self) {
        for advertiser in self.advertisers.values_mut() {
            advertiser.remaining_budget = advertiser.initial_budget;
        }
    }

    /// Sum of all initial budgets, the offline optimum when bids are small against budgets
    pub fn total_initial_budget(&self) -> f64 {
        self.advertisers.values().map(|advertiser| advertiser.initial_budget).sum()
    }
}

#[cfg(test)]
pub(crate) fn record(advertiser_id: AdvertiserId, keyword: &str, bid_value: f64, budget: Option<f64>) -> BidderRecord {
    BidderRecord {
        advertiser_id,
        keyword: keyword.to_string(),
        bid_value,
        budget,
    }
}
