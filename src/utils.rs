use rand_distr::{LogNormal, NormalError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Number of randomized permutations used for the competitive ratio
pub const DEFAULT_TRIALS: usize = 100;

/// Seed of the permutation generator when none is given
pub const DEFAULT_SEED: u64 = 0;

pub const DEFAULT_BIDDERS_PATH: &str = "bidder_dataset.csv";
pub const DEFAULT_QUERIES_PATH: &str = "queries.txt";

/// When set, every query decision of the deterministic pass is written out
pub static VERBOSE_QUERIES: AtomicBool = AtomicBool::new(false);

/// Base seed for synthetic scenario data, advanced by the scenario iteration loop
pub static RAND_SEED: AtomicU64 = AtomicU64::new(0);

/// Seed for one random stream of a scenario, offset from the current base seed
pub fn get_seed(offset: u64) -> u64 {
    RAND_SEED.load(Ordering::Relaxed).wrapping_add(offset)
}

/// Convert mean and standard deviation to log-normal distribution parameters
/// Returns (μ, σ) for LogNormal(μ, σ) that approximates the given mean and stddev
///
/// To convert from mean (m) and stddev (s):
/// - σ = sqrt(ln(1 + s²/m²))
/// - μ = ln(m) - σ²/2
fn lognormal_from_mean_stddev(mean: f64, stddev: f64) -> (f64, f64) {
    let variance = stddev * stddev;
    let sigma_squared = (1.0 + variance / (mean * mean)).ln();
    let sigma = sigma_squared.sqrt();
    let mu = mean.ln() - sigma_squared / 2.0;
    (mu, sigma)
}

/// Log-normal distribution with the given mean and standard deviation
pub fn lognormal_dist(mean: f64, stddev: f64) -> Result<LogNormal<f64>, NormalError> {
    let (mu, sigma) = lognormal_from_mean_stddev(mean, stddev);
    LogNormal::new(mu, sigma)
}
